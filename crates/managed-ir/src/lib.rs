// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! ManagedIR
//!
//! A structured, typed IR for a managed bytecode with garbage-collected
//! struct types and mutable globals, together with whole-module
//! optimization passes over it. The passes are closed-world: they assume
//! every allocation, write and call relevant to the module is visible in
//! the module.

pub mod analysis;
pub mod cfg;
pub mod data;
pub mod parallel;
pub mod pass;
pub mod refinalize;

pub use analysis::{ConstantFieldPropagation, OnceReduction};
pub use data::expr::{BinaryOp, Expr, ExprKind};
pub use data::functions::{FuncId, Function, Global, GlobalId};
pub use data::literal::Literal;
pub use data::structure::{Field, StructDef};
pub use data::types::{HeapType, Type, TypeSystem};
pub use data::{Module, ModuleEnv};
pub use pass::{Pass, PassError, PassOptions, PassRunner};
pub use refinalize::refinalize;
