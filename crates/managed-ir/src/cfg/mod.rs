// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Basic-block control-flow graph over the structured expression tree.
//!
//! The IR has no loop or branch-to-label constructs, so the only control
//! splits come from `If`; `Return` and `Unreachable` terminate a block
//! and leave any code behind them in a predecessor-less block. Blocks are
//! created in forward program order, which makes the block index order a
//! valid reverse postorder for the dataflow downstream.

pub mod dominance;

use crate::data::expr::{Expr, ExprKind};

pub type BlockId = usize;

/// A basic block. `contents` records, in evaluation order, the
/// expressions the caller asked to track, each tagged with its position
/// in the function-wide post-order numbering of tracked expressions.
#[derive(Debug)]
pub struct BasicBlock<'a> {
    pub preds: Vec<BlockId>,
    pub succs: Vec<BlockId>,
    pub contents: Vec<(usize, &'a Expr)>,
}

impl BasicBlock<'_> {
    fn new() -> Self {
        BasicBlock {
            preds: Vec::new(),
            succs: Vec::new(),
            contents: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct Cfg<'a> {
    pub blocks: Vec<BasicBlock<'a>>,
}

impl<'a> Cfg<'a> {
    /// Build the CFG of a function body, recording every expression for
    /// which `track` returns true in its containing block.
    pub fn build(body: &'a Expr, track: impl Fn(&Expr) -> bool) -> Cfg<'a> {
        let mut builder = Builder {
            blocks: vec![BasicBlock::new()],
            current: 0,
            next_seq: 0,
            track,
        };
        builder.walk(body);
        Cfg {
            blocks: builder.blocks,
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}

struct Builder<'a, F> {
    blocks: Vec<BasicBlock<'a>>,
    current: BlockId,
    next_seq: usize,
    track: F,
}

impl<'a, F: Fn(&Expr) -> bool> Builder<'a, F> {
    fn start_block(&mut self) -> BlockId {
        self.blocks.push(BasicBlock::new());
        self.current = self.blocks.len() - 1;
        self.current
    }

    fn link(&mut self, from: BlockId, to: BlockId) {
        self.blocks[from].succs.push(to);
        self.blocks[to].preds.push(from);
    }

    fn walk(&mut self, expr: &'a Expr) {
        match &expr.kind {
            ExprKind::If {
                condition,
                if_true,
                if_false,
            } => {
                self.walk(condition);
                let cond_end = self.current;

                let then_start = self.start_block();
                self.link(cond_end, then_start);
                self.walk(if_true);
                let then_end = self.current;

                match if_false {
                    Some(other) => {
                        let else_start = self.start_block();
                        self.link(cond_end, else_start);
                        self.walk(other);
                        let else_end = self.current;

                        let merge = self.start_block();
                        self.link(then_end, merge);
                        self.link(else_end, merge);
                    }
                    None => {
                        let merge = self.start_block();
                        self.link(cond_end, merge);
                        self.link(then_end, merge);
                    }
                }
            }
            ExprKind::Return { value } => {
                if let Some(inner) = value {
                    self.walk(inner);
                }
                // Code after a return is unreachable; it goes into a
                // fresh block with no predecessors.
                self.start_block();
            }
            ExprKind::Unreachable => {
                self.start_block();
            }
            _ => {
                expr.for_each_child(&mut |child| self.walk(child));
                if (self.track)(expr) {
                    let seq = self.next_seq;
                    self.next_seq += 1;
                    self.blocks[self.current].contents.push((seq, expr));
                }
            }
        }
    }
}
