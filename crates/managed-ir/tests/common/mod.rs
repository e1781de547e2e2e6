// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

#![allow(dead_code)]

use managed_ir::{HeapType, Module, Pass, PassError, PassOptions, PassRunner, Type};

pub fn run(pass: Box<dyn Pass>, module: &mut Module) -> Result<(), PassError> {
    run_with(pass, module, options())
}

pub fn run_with(
    pass: Box<dyn Pass>,
    module: &mut Module,
    options: PassOptions,
) -> Result<(), PassError> {
    let mut runner = PassRunner::new(options);
    runner.add_pass(pass);
    runner.run(module)
}

pub fn options() -> PassOptions {
    PassOptions {
        workers: 2,
        ..PassOptions::default()
    }
}

pub fn ref_to(heap: HeapType) -> Type {
    Type::Ref {
        heap,
        nullable: false,
    }
}
