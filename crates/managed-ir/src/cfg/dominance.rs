// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Immediate-dominator computation over the basic-block CFG.
//!
//! Iterative dataflow in the style of Cooper-Harvey-Kennedy: blocks are
//! numbered in reverse postorder by construction, so `intersect` can walk
//! idom chains by comparing indices. Blocks that are unreachable from the
//! entry end up with no immediate dominator.

use crate::cfg::{BlockId, Cfg};

#[derive(Debug)]
pub struct DomTree {
    /// The immediate dominator of each block. The entry block is its own
    /// idom; unreachable blocks have none.
    pub idoms: Vec<Option<BlockId>>,
}

impl DomTree {
    pub fn compute(cfg: &Cfg) -> DomTree {
        let num_blocks = cfg.blocks.len();
        let mut idoms: Vec<Option<BlockId>> = vec![None; num_blocks];
        if num_blocks == 0 {
            return DomTree { idoms };
        }
        idoms[0] = Some(0);

        let mut changed = true;
        while changed {
            changed = false;
            for block in 1..num_blocks {
                let mut new_idom: Option<BlockId> = None;
                for &pred in &cfg.blocks[block].preds {
                    if idoms[pred].is_none() {
                        // Unreachable predecessor, contributes nothing.
                        continue;
                    }
                    new_idom = Some(match new_idom {
                        None => pred,
                        Some(current) => intersect(&idoms, pred, current),
                    });
                }
                if new_idom.is_some() && idoms[block] != new_idom {
                    idoms[block] = new_idom;
                    changed = true;
                }
            }
        }

        DomTree { idoms }
    }
}

fn intersect(idoms: &[Option<BlockId>], mut b1: BlockId, mut b2: BlockId) -> BlockId {
    while b1 != b2 {
        while b1 > b2 {
            b1 = idoms[b1].expect("reachable block has an idom");
        }
        while b2 > b1 {
            b2 = idoms[b2].expect("reachable block has an idom");
        }
    }
    b1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cfg::Cfg;
    use crate::data::expr::{Expr, ExprKind};

    fn call(target: usize) -> Expr {
        Expr::call(target, vec![], crate::data::types::Type::None)
    }

    #[test]
    fn diamond_merge_is_dominated_by_the_split() {
        // if c { f() } else { g() }; h()
        let body = Expr::block(vec![
            Expr::if_(Expr::i32(1), call(0), Some(call(1))),
            call(2),
        ]);
        let cfg = Cfg::build(&body, |e| matches!(e.kind, ExprKind::Call { .. }));
        let dom = DomTree::compute(&cfg);

        // entry=0, then=1, else=2, merge=3
        assert_eq!(dom.idoms[0], Some(0));
        assert_eq!(dom.idoms[1], Some(0));
        assert_eq!(dom.idoms[2], Some(0));
        assert_eq!(dom.idoms[3], Some(0));
    }

    #[test]
    fn unreachable_block_has_no_idom() {
        let body = Expr::block(vec![Expr::return_(None), call(0)]);
        let cfg = Cfg::build(&body, |e| matches!(e.kind, ExprKind::Call { .. }));
        let dom = DomTree::compute(&cfg);
        assert_eq!(dom.idoms[1], None);
    }

    #[test]
    fn nested_ifs_chain_through_their_merges() {
        // if a { f() }; if b { g() }
        let body = Expr::block(vec![
            Expr::if_(Expr::i32(1), call(0), None),
            Expr::if_(Expr::i32(1), call(1), None),
        ]);
        let cfg = Cfg::build(&body, |e| matches!(e.kind, ExprKind::Call { .. }));
        let dom = DomTree::compute(&cfg);

        // entry=0, then1=1, merge1=2, then2=3, merge2=4
        assert_eq!(dom.idoms[1], Some(0));
        assert_eq!(dom.idoms[2], Some(0));
        assert_eq!(dom.idoms[3], Some(2));
        assert_eq!(dom.idoms[4], Some(2));
    }
}
