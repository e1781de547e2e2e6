// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Scoped-thread fan-out over the module's function table.
//!
//! The function table is taken out of the module for the duration of the
//! walk, so workers get disjoint `&mut Function` slices while the rest of
//! the module stays readable through a `ModuleEnv`. Every function has a
//! dedicated scratch slot; no slot is touched by more than one worker.

use std::mem;

use itertools::Itertools;

use crate::data::functions::{FuncId, Function};
use crate::data::{Module, ModuleEnv};

pub fn for_each_function<S, F>(module: &mut Module, scratch: &mut [S], workers: usize, f: F)
where
    S: Send,
    F: Fn(&ModuleEnv, FuncId, &mut Function, &mut S) + Sync,
{
    assert_eq!(scratch.len(), module.functions.len());

    let mut functions = mem::take(&mut module.functions);
    let results = functions.iter().map(|func| func.results).collect_vec();
    let env = ModuleEnv {
        type_system: module.type_system,
        structs: &module.structs,
        globals: &module.globals,
        results: &results,
    };

    let total = functions.len();
    if total > 0 {
        let chunk_size = total.div_ceil(workers.max(1));
        std::thread::scope(|scope| {
            for (chunk_index, (funcs, slots)) in functions
                .chunks_mut(chunk_size)
                .zip(scratch.chunks_mut(chunk_size))
                .enumerate()
            {
                let env = &env;
                let f = &f;
                scope.spawn(move || {
                    let base = chunk_index * chunk_size;
                    for (offset, (func, slot)) in
                        funcs.iter_mut().zip(slots.iter_mut()).enumerate()
                    {
                        f(env, base + offset, func, slot);
                    }
                });
            }
        });
    }

    module.functions = functions;
}
