// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Once reduction.
//!
//! A "once" function is guarded by a global so that it runs a single
//! time:
//!
//! ```text
//! global foo_once = 0;
//!
//! fn foo() {
//!     if foo_once { return; }
//!     foo_once = 1;
//!     // ..do some work..
//! }
//! ```
//!
//! If the guard global is used for nothing else, then a second call to
//! `foo` along a path that already called it does nothing, and can be
//! removed. The same goes for redundant writes to the guard itself.
//! Knowledge of which guards a function definitely sets is propagated
//! through call sites to a fixed point, so the reduction also works
//! across helper functions.

use std::collections::{BTreeMap, BTreeSet};
use std::mem;
use std::sync::atomic::{AtomicBool, Ordering};

use itertools::Itertools;
use log::debug;

use crate::cfg::dominance::DomTree;
use crate::cfg::Cfg;
use crate::data::expr::{Expr, ExprKind};
use crate::data::functions::{FuncId, Function, GlobalId};
use crate::data::types::Type;
use crate::data::Module;
use crate::parallel;
use crate::pass::{Pass, PassError, PassOptions};

pub struct OnceReduction;

struct OptInfo {
    /// Whether each global is still plausibly a once guard. Guards are
    /// demoted concurrently during the scan; the only transition is
    /// true to false, so relaxed stores suffice.
    once_globals: Vec<AtomicBool>,

    /// The guard global of each once function, if it is one.
    once_funcs: Vec<Option<GlobalId>>,

    /// For each function, the guards that are definitely set once a call
    /// to it returns. Grows monotonically across driver iterations.
    once_globals_set_in_funcs: Vec<BTreeSet<GlobalId>>,
}

impl OptInfo {
    fn is_once_global(&self, global: GlobalId) -> bool {
        self.once_globals[global].load(Ordering::Relaxed)
    }

    fn demote(&self, global: GlobalId) {
        self.once_globals[global].store(false, Ordering::Relaxed);
    }
}

impl Pass for OnceReduction {
    fn name(&self) -> &'static str {
        "once-reduction"
    }

    fn run(&mut self, module: &mut Module, options: &PassOptions) -> Result<(), PassError> {
        let num_funcs = module.functions.len();

        // A guard candidate must be a defined integer global with a
        // constant initializer; everything else is demoted up front.
        let once_globals = module
            .globals
            .iter()
            .map(|global| {
                AtomicBool::new(
                    global.ty.is_integer()
                        && global.init.as_ref().is_some_and(|init| init.is_constant()),
                )
            })
            .collect_vec();
        let mut info = OptInfo {
            once_globals,
            once_funcs: vec![None; num_funcs],
            once_globals_set_in_funcs: vec![BTreeSet::new(); num_funcs],
        };

        // Scan the module to find out which globals and functions are
        // once. Each worker writes only its own function's slot; guard
        // demotion goes through the atomic flags.
        let mut recognized: Vec<Option<GlobalId>> = vec![None; num_funcs];
        {
            let info = &info;
            parallel::for_each_function(
                module,
                &mut recognized,
                options.workers,
                |_env, _id, func, slot| {
                    *slot = scan_function(func, info);
                },
            );
        }
        info.once_funcs = recognized;

        // The scan may have disproven a guard after its function was
        // recognized; such functions are not once after all.
        for func_guard in info.once_funcs.iter_mut() {
            if let Some(global) = *func_guard {
                if !info.once_globals[global].load(Ordering::Relaxed) {
                    *func_guard = None;
                }
            }
        }

        // Seed each once function's summary with its own guard.
        let mut found_once = false;
        for func in 0..num_funcs {
            if let Some(global) = info.once_funcs[func] {
                info.once_globals_set_in_funcs[func].insert(global);
                found_once = true;
            }
        }
        if !found_once {
            return Ok(());
        }
        debug!(
            "once-reduction: {} once functions",
            info.once_funcs.iter().flatten().count()
        );

        // Optimize, iterating as long as the summaries keep growing:
        // a growing total means information is still propagating to
        // callers. Monotonicity bounds the number of iterations.
        let mut last_total = 0;
        loop {
            let mut new_summaries: Vec<BTreeSet<GlobalId>> = vec![BTreeSet::new(); num_funcs];
            {
                let info = &info;
                parallel::for_each_function(
                    module,
                    &mut new_summaries,
                    options.workers,
                    |_env, id, func, slot| {
                        *slot = optimize_function(func, id, info);
                    },
                );
            }
            info.once_globals_set_in_funcs = new_summaries;

            let total: usize = info.once_globals_set_in_funcs.iter().map(|s| s.len()).sum();
            debug_assert!(total >= last_total);
            if total > last_total {
                last_total = total;
            } else {
                return Ok(());
            }
        }
    }
}

/// Tally global reads and validate global writes for one function, and
/// recognize the once prologue. Returns the guard global if the function
/// is once.
fn scan_function(func: &Function, info: &OptInfo) -> Option<GlobalId> {
    // All the globals this function reads. Any read outside the once
    // prologue could make behavior depend on the guard's specific value,
    // which we refuse to reason about.
    let mut read_globals: BTreeMap<GlobalId, usize> = BTreeMap::new();

    func.body.walk_post(&mut |e| match &e.kind {
        ExprKind::GlobalGet { global } => {
            *read_globals.entry(*global).or_default() += 1;
        }
        ExprKind::GlobalSet { global, value } => {
            if !value.ty.is_integer() {
                // Either a type we do not care about, or an unreachable
                // write that never happens.
                return;
            }
            if let Some(c) = value.literal().and_then(|literal| literal.integer()) {
                if c > 0 {
                    // A non-zero constant, which is what a guard wants.
                    return;
                }
            }
            // Not a constant, or zero.
            info.demote(*global);
        }
        _ => {}
    });

    let mut recognized = None;
    // TODO: support once functions with params or results?
    if func.params.is_empty() && func.results == Type::None {
        if let Some(global) = match_once_prologue(&func.body) {
            // Tentatively once; the guard may still be disproven by
            // another function, and the driver will demote us then.
            recognized = Some(global);
            // The prologue's own read is fine.
            if let Some(count) = read_globals.get_mut(&global) {
                *count -= 1;
            }
        }
    }

    for (global, count) in read_globals {
        if count > 0 {
            info.demote(global);
        }
    }

    recognized
}

/// Match the body prologue
///
/// ```text
/// if guard { return; }
/// guard = C;
/// ```
///
/// returning the guard global. The write must be reachable, otherwise it
/// never actually runs.
fn match_once_prologue(body: &Expr) -> Option<GlobalId> {
    let ExprKind::Block { list } = &body.kind else {
        return None;
    };
    if list.len() < 2 {
        return None;
    }
    let ExprKind::If {
        condition,
        if_true,
        if_false: None,
    } = &list[0].kind
    else {
        return None;
    };
    let ExprKind::GlobalGet { global } = &condition.kind else {
        return None;
    };
    if !matches!(if_true.kind, ExprKind::Return { value: None }) {
        return None;
    }
    let ExprKind::GlobalSet {
        global: set_global, ..
    } = &list[1].kind
    else {
        return None;
    };
    if set_global != global || list[1].ty == Type::Unreachable {
        return None;
    }
    Some(*global)
}

/// Decide whether a recorded expression is relevant to the walk.
fn is_tracked(e: &Expr) -> bool {
    matches!(
        e.kind,
        ExprKind::Call { .. } | ExprKind::GlobalSet { .. }
    )
}

/// Remove provably redundant guard writes and once calls in one
/// function, and compute which guards it definitely sets before any
/// normal return.
fn optimize_function(func: &mut Function, id: FuncId, info: &OptInfo) -> BTreeSet<GlobalId> {
    let (mut summary, to_nop) = plan_function(&func.body, info);
    if !to_nop.is_empty() {
        apply_nops(&mut func.body, &to_nop);
    }
    // A once function always sets its guard before a normal return:
    // either the prologue write runs, or the guard was already set.
    if let Some(global) = info.once_funcs[id] {
        summary.insert(global);
    }
    summary
}

fn plan_function(body: &Expr, info: &OptInfo) -> (BTreeSet<GlobalId>, BTreeSet<usize>) {
    let cfg = Cfg::build(body, is_tracked);
    let dom_tree = DomTree::compute(&cfg);

    // Per block, the guards known to be written when the block ends. A
    // block inherits the state of its immediate dominator: everything
    // written there has definitely happened by the time we run.
    // TODO: we could also intersect information from all the preds.
    let mut written: Vec<BTreeSet<GlobalId>> = vec![BTreeSet::new(); cfg.len()];
    let mut to_nop: BTreeSet<usize> = BTreeSet::new();

    for block in 0..cfg.len() {
        if block > 0 {
            match dom_tree.idoms[block] {
                // An unreachable block; leave it to dead-code removal.
                None => continue,
                Some(parent) => written[block] = written[parent].clone(),
            }
        }

        for &(seq, expr) in &cfg.blocks[block].contents {
            match &expr.kind {
                ExprKind::GlobalSet { global, value } => {
                    if info.is_once_global(*global) {
                        // Guards with non-constant writes were demoted.
                        assert!(value.is_constant());
                        if !written[block].insert(*global) {
                            to_nop.insert(seq);
                        }
                    }
                }
                ExprKind::Call { target, operands } => {
                    if let Some(global) = info.once_funcs[*target] {
                        assert!(operands.is_empty());
                        if !written[block].insert(global) {
                            to_nop.insert(seq);
                        }
                    } else {
                        // Not a once function, but it may definitely set
                        // some guards before returning.
                        let callee = &info.once_globals_set_in_funcs[*target];
                        written[block].extend(callee.iter().copied());
                    }
                }
                other => unreachable!("unexpected expression in block contents: {:?}", other),
            }
        }
    }

    // The entry block's state holds on every path through the function,
    // so it is a sound (if conservative) summary for our callers.
    // TODO: aside from the entry block, we could intersect the exits.
    (mem::take(&mut written[0]), to_nop)
}

/// Replace the decided expressions with no-ops. The walk repeats the
/// numbering the CFG assigned: a post-order count of tracked nodes.
fn apply_nops(body: &mut Expr, to_nop: &BTreeSet<usize>) {
    let mut seq = 0usize;
    body.walk_post_mut(&mut |e| {
        if is_tracked(e) {
            if to_nop.contains(&seq) {
                *e = Expr::nop();
            }
            seq += 1;
        }
    });
}
