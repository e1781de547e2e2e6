// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Module-level IR data structures

pub mod expr;
pub mod functions;
pub mod literal;
pub mod structure;
pub mod types;

use crate::data::functions::{FuncId, Function, Global, GlobalId};
use crate::data::structure::StructDef;
use crate::data::types::{HeapType, Type, TypeSystem};

/// A whole program: struct heap types, globals and functions. Items are
/// addressed by their index in the respective table.
#[derive(Debug, Clone)]
pub struct Module {
    pub type_system: TypeSystem,
    pub structs: Vec<StructDef>,
    pub globals: Vec<Global>,
    pub functions: Vec<Function>,
}

impl Default for Module {
    fn default() -> Self {
        Module::new()
    }
}

impl Module {
    pub fn new() -> Module {
        Module {
            type_system: TypeSystem::Nominal,
            structs: Vec::new(),
            globals: Vec::new(),
            functions: Vec::new(),
        }
    }

    /// Declare a struct type. Panics if the declared supertype does not
    /// exist or if the new struct does not extend its supertype's field
    /// list as a prefix.
    pub fn add_struct(&mut self, def: StructDef) -> HeapType {
        if let Some(supertype) = def.supertype {
            let parent = self
                .structs
                .get(supertype)
                .unwrap_or_else(|| panic!("struct `{}` extends unknown type {}", def.name, supertype));
            let shared = parent
                .fields
                .iter()
                .zip(def.fields.iter())
                .all(|(a, b)| a.ty == b.ty);
            if def.fields.len() < parent.fields.len() || !shared {
                panic!(
                    "struct `{}` does not preserve the field layout of `{}`",
                    def.name, parent.name
                );
            }
        }
        self.structs.push(def);
        self.structs.len() - 1
    }

    pub fn add_global(&mut self, global: Global) -> GlobalId {
        self.globals.push(global);
        self.globals.len() - 1
    }

    pub fn add_function(&mut self, function: Function) -> FuncId {
        self.functions.push(function);
        self.functions.len() - 1
    }

    pub fn get_struct(&self, heap: HeapType) -> &StructDef {
        &self.structs[heap]
    }

    pub fn get_function(&self, id: FuncId) -> &Function {
        &self.functions[id]
    }

    pub fn get_global(&self, id: GlobalId) -> &Global {
        &self.globals[id]
    }

    pub fn function_named(&self, name: &str) -> Option<FuncId> {
        self.functions.iter().position(|f| f.name == name)
    }

    pub fn global_named(&self, name: &str) -> Option<GlobalId> {
        self.globals.iter().position(|g| g.name == name)
    }

    /// The field type of a struct slot, following the reference type of
    /// the access expression.
    pub fn field_type(&self, heap: HeapType, index: usize) -> Type {
        self.structs[heap].fields[index].ty
    }
}

/// Immutable module-level view that stays readable while function bodies
/// are rewritten in parallel: struct and global tables plus every
/// function's result type.
pub struct ModuleEnv<'a> {
    pub type_system: TypeSystem,
    pub structs: &'a [StructDef],
    pub globals: &'a [Global],
    pub results: &'a [Type],
}

impl ModuleEnv<'_> {
    pub fn field_type(&self, heap: HeapType, index: usize) -> Type {
        self.structs[heap].fields[index].ty
    }
}
