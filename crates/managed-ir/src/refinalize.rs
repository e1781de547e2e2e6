// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Leaf-to-root refresh of stored expression types.
//!
//! Rewrites substitute subtrees whose types can be narrower than what the
//! surrounding nodes were built with, most visibly when a subtree becomes
//! unreachable. After mutating a function body, passes run the refresh so
//! every stored type matches the node's children again.

use crate::data::expr::{Expr, ExprKind};
use crate::data::types::Type;
use crate::data::ModuleEnv;

/// Recompute the stored result types of an expression tree bottom-up.
pub fn refinalize(expr: &mut Expr, env: &ModuleEnv) {
    expr.walk_post_mut(&mut |e| {
        let ty = match &e.kind {
            ExprKind::Nop => Type::None,
            ExprKind::Unreachable => Type::Unreachable,
            // Leaf types come from the declaration site, not the tree.
            ExprKind::Const(_) | ExprKind::LocalGet { .. } | ExprKind::GlobalGet { .. } => e.ty,
            ExprKind::GlobalSet { value, .. } => stmt_type(&[value.as_ref()]),
            ExprKind::Call { target, operands } => {
                if operands.iter().any(|o| o.ty == Type::Unreachable) {
                    Type::Unreachable
                } else {
                    env.results[*target]
                }
            }
            ExprKind::StructNew { heap, operands } => {
                if operands.iter().any(|o| o.ty == Type::Unreachable) {
                    Type::Unreachable
                } else {
                    Type::Ref {
                        heap: *heap,
                        nullable: false,
                    }
                }
            }
            ExprKind::StructGet { reference, index } => match reference.ty.heap_type() {
                Some(heap) => env.field_type(heap, *index),
                None => Type::Unreachable,
            },
            ExprKind::StructSet {
                reference, value, ..
            } => stmt_type(&[reference.as_ref(), value.as_ref()]),
            ExprKind::RefAsNonNull { reference } => {
                if reference.ty == Type::Unreachable {
                    Type::Unreachable
                } else {
                    reference.ty.non_nullable()
                }
            }
            ExprKind::Drop { value } => stmt_type(&[value.as_ref()]),
            ExprKind::Binary { left, right, .. } => {
                if left.ty == Type::Unreachable || right.ty == Type::Unreachable {
                    Type::Unreachable
                } else {
                    Type::I32
                }
            }
            ExprKind::Select {
                condition,
                if_true,
                if_false,
            } => {
                if condition.ty == Type::Unreachable
                    || if_true.ty == Type::Unreachable
                    || if_false.ty == Type::Unreachable
                {
                    Type::Unreachable
                } else {
                    Type::join(if_true.ty, if_false.ty)
                }
            }
            ExprKind::If {
                condition,
                if_true,
                if_false,
            } => {
                if condition.ty == Type::Unreachable {
                    Type::Unreachable
                } else {
                    match if_false {
                        Some(other) => Type::join(if_true.ty, other.ty),
                        None => Type::None,
                    }
                }
            }
            ExprKind::Block { list } => list.last().map_or(Type::None, |last| last.ty),
            ExprKind::Sequence { second, .. } => second.ty,
            ExprKind::Return { .. } => Type::Unreachable,
        };
        e.ty = ty;
    });
}

fn stmt_type(children: &[&Expr]) -> Type {
    if children.iter().any(|c| c.ty == Type::Unreachable) {
        Type::Unreachable
    } else {
        Type::None
    }
}
