// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Struct heap type definitions

use crate::data::types::{HeapType, Type};

/// A nominally declared aggregate type: a fixed ordered list of field
/// slots and an optional declared supertype. Subtypes extend their
/// supertype's field list; the shared prefix keeps identical layout.
#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: String,
    pub supertype: Option<HeapType>,
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub ty: Type,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Type) -> Field {
        Field {
            name: name.into(),
            ty,
        }
    }
}

impl StructDef {
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}
