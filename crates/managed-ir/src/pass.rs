// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Pass trait and runner.

use log::debug;
use thiserror::Error;

use crate::data::types::TypeSystem;
use crate::data::Module;

#[derive(Debug, Error)]
pub enum PassError {
    #[error("{pass} requires nominal typing, but the module declares {found:?} typing")]
    RequiresNominalTyping {
        pass: &'static str,
        found: TypeSystem,
    },
}

/// Options shared by all passes in a runner.
#[derive(Debug, Clone)]
pub struct PassOptions {
    /// When greater than zero, passes avoid rewrites that grow code size.
    pub shrink_level: u32,
    /// Number of worker threads for per-function phases.
    pub workers: usize,
}

impl Default for PassOptions {
    fn default() -> Self {
        PassOptions {
            shrink_level: 0,
            workers: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }
}

/// A whole-module transformation.
pub trait Pass {
    /// A name suitable for logging and diagnostics.
    fn name(&self) -> &'static str;

    fn run(&mut self, module: &mut Module, options: &PassOptions) -> Result<(), PassError>;
}

/// Runs a sequence of passes over a module, stopping at the first error.
#[derive(Default)]
pub struct PassRunner {
    options: PassOptions,
    passes: Vec<Box<dyn Pass>>,
}

impl PassRunner {
    pub fn new(options: PassOptions) -> PassRunner {
        PassRunner {
            options,
            passes: Vec::new(),
        }
    }

    pub fn add_pass(&mut self, pass: Box<dyn Pass>) {
        self.passes.push(pass);
    }

    pub fn options(&self) -> &PassOptions {
        &self.options
    }

    pub fn run(&mut self, module: &mut Module) -> Result<(), PassError> {
        for pass in &mut self.passes {
            debug!("running pass `{}`", pass.name());
            pass.run(module, &self.options)?;
        }
        Ok(())
    }
}
