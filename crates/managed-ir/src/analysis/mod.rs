// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Whole-module analysis and transformation passes.

pub mod constant_field_propagation;
pub mod once_reduction;
pub mod possible_constants;
pub mod struct_values;
pub mod type_hierarchy;

pub use constant_field_propagation::ConstantFieldPropagation;
pub use once_reduction::OnceReduction;
pub use possible_constants::{PossibleConstants, MAX_CONSTANT_VALUES};
pub use struct_values::StructValuesMap;
pub use type_hierarchy::{SubTypes, TypeHierarchyPropagator};
