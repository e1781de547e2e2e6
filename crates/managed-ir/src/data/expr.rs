// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Expression tree for ManagedIR
//!
//! Every expression carries the static result type it was built with.
//! Rewrites that substitute children can invalidate stored types; the
//! refinalizer recomputes them leaf-to-root afterwards.

use crate::data::functions::{FuncId, GlobalId};
use crate::data::literal::Literal;
use crate::data::types::{HeapType, Type};

/// Traverse the direct children of an expression kind, in evaluation
/// order. Pass `as_expr_ref` for immutable access, `as_expr_mut` for
/// mutable access; actions expand inline.
macro_rules! for_each_expr {
    ($target:expr, $deref:ident, |$value:ident| $action:expr) => {
        match $target {
            ExprKind::Nop
            | ExprKind::Unreachable
            | ExprKind::Const(_)
            | ExprKind::LocalGet { .. }
            | ExprKind::GlobalGet { .. } => {}
            ExprKind::GlobalSet { value, .. } => {
                let $value = value.$deref();
                $action;
            }
            ExprKind::Call { operands, .. } | ExprKind::StructNew { operands, .. } => {
                for $value in operands {
                    $action;
                }
            }
            ExprKind::StructGet { reference, .. } | ExprKind::RefAsNonNull { reference } => {
                let $value = reference.$deref();
                $action;
            }
            ExprKind::StructSet {
                reference, value, ..
            } => {
                let $value = reference.$deref();
                $action;
                let $value = value.$deref();
                $action;
            }
            ExprKind::Drop { value } => {
                let $value = value.$deref();
                $action;
            }
            ExprKind::Binary { left, right, .. } => {
                let $value = left.$deref();
                $action;
                let $value = right.$deref();
                $action;
            }
            ExprKind::Select {
                condition,
                if_true,
                if_false,
            } => {
                let $value = condition.$deref();
                $action;
                let $value = if_true.$deref();
                $action;
                let $value = if_false.$deref();
                $action;
            }
            ExprKind::If {
                condition,
                if_true,
                if_false,
            } => {
                let $value = condition.$deref();
                $action;
                let $value = if_true.$deref();
                $action;
                if let Some(other) = if_false {
                    let $value = other.$deref();
                    $action;
                }
            }
            ExprKind::Block { list } => {
                for $value in list {
                    $action;
                }
            }
            ExprKind::Sequence { first, second } => {
                let $value = first.$deref();
                $action;
                let $value = second.$deref();
                $action;
            }
            ExprKind::Return { value } => {
                if let Some(inner) = value {
                    let $value = inner.$deref();
                    $action;
                }
            }
        }
    };
}

/// Comparison operators usable in the two-value rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    EqI32,
    EqI64,
    EqF32,
    EqF64,
}

impl BinaryOp {
    /// The equality operator for values of the given type, if one exists.
    /// References are not comparable here.
    pub fn eq_for(ty: Type) -> Option<BinaryOp> {
        match ty {
            Type::I32 => Some(BinaryOp::EqI32),
            Type::I64 => Some(BinaryOp::EqI64),
            Type::F32 => Some(BinaryOp::EqF32),
            Type::F64 => Some(BinaryOp::EqF64),
            _ => None,
        }
    }
}

/// An expression node together with its static result type.
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub kind: ExprKind,
    pub ty: Type,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Nop,
    Unreachable,
    Const(Literal),
    LocalGet {
        index: usize,
    },
    GlobalGet {
        global: GlobalId,
    },
    GlobalSet {
        global: GlobalId,
        value: Box<Expr>,
    },
    Call {
        target: FuncId,
        operands: Vec<Expr>,
    },
    /// Allocation of a struct. An empty operand list allocates with the
    /// implicit default value in every field.
    StructNew {
        heap: HeapType,
        operands: Vec<Expr>,
    },
    StructGet {
        reference: Box<Expr>,
        index: usize,
    },
    StructSet {
        reference: Box<Expr>,
        index: usize,
        value: Box<Expr>,
    },
    RefAsNonNull {
        reference: Box<Expr>,
    },
    Drop {
        value: Box<Expr>,
    },
    Select {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    If {
        condition: Box<Expr>,
        if_true: Box<Expr>,
        if_false: Option<Box<Expr>>,
    },
    Block {
        list: Vec<Expr>,
    },
    Sequence {
        first: Box<Expr>,
        second: Box<Expr>,
    },
    Return {
        value: Option<Box<Expr>>,
    },
}

impl Expr {
    /// Visit the direct children in evaluation order.
    pub fn for_each_child<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        for_each_expr!(&self.kind, as_expr_ref, |child| f(child));
    }

    /// Visit the direct children mutably, in evaluation order.
    pub fn for_each_child_mut(&mut self, f: &mut impl FnMut(&mut Expr)) {
        for_each_expr!(&mut self.kind, as_expr_mut, |child| f(child));
    }

    /// Post-order walk: children first, then the node itself.
    pub fn walk_post<'a>(&'a self, f: &mut impl FnMut(&'a Expr)) {
        self.for_each_child(&mut |child| child.walk_post(f));
        f(self);
    }

    /// Post-order walk with mutable access. The callback may replace the
    /// node wholesale; replacements are not revisited.
    pub fn walk_post_mut(&mut self, f: &mut impl FnMut(&mut Expr)) {
        self.for_each_child_mut(&mut |child| child.walk_post_mut(f));
        f(self);
    }

    pub fn is_constant(&self) -> bool {
        matches!(self.kind, ExprKind::Const(_))
    }

    pub fn literal(&self) -> Option<Literal> {
        match self.kind {
            ExprKind::Const(literal) => Some(literal),
            _ => None,
        }
    }
}

// Constructors. Result types are computed at build time with the same
// rules the refinalizer applies after mutation.
impl Expr {
    pub fn nop() -> Expr {
        Expr {
            kind: ExprKind::Nop,
            ty: Type::None,
        }
    }

    pub fn unreachable() -> Expr {
        Expr {
            kind: ExprKind::Unreachable,
            ty: Type::Unreachable,
        }
    }

    pub fn cnst(literal: Literal, ty: Type) -> Expr {
        Expr {
            kind: ExprKind::Const(literal),
            ty,
        }
    }

    pub fn i32(value: i32) -> Expr {
        Expr::cnst(Literal::I32(value), Type::I32)
    }

    pub fn i64(value: i64) -> Expr {
        Expr::cnst(Literal::I64(value), Type::I64)
    }

    pub fn local_get(index: usize, ty: Type) -> Expr {
        Expr {
            kind: ExprKind::LocalGet { index },
            ty,
        }
    }

    pub fn global_get(global: GlobalId, ty: Type) -> Expr {
        Expr {
            kind: ExprKind::GlobalGet { global },
            ty,
        }
    }

    pub fn global_set(global: GlobalId, value: Expr) -> Expr {
        let ty = stmt_type(&[&value]);
        Expr {
            kind: ExprKind::GlobalSet {
                global,
                value: Box::new(value),
            },
            ty,
        }
    }

    pub fn call(target: FuncId, operands: Vec<Expr>, results: Type) -> Expr {
        let ty = if operands.iter().any(|o| o.ty == Type::Unreachable) {
            Type::Unreachable
        } else {
            results
        };
        Expr {
            kind: ExprKind::Call { target, operands },
            ty,
        }
    }

    pub fn struct_new(heap: HeapType, operands: Vec<Expr>) -> Expr {
        let ty = if operands.iter().any(|o| o.ty == Type::Unreachable) {
            Type::Unreachable
        } else {
            Type::Ref {
                heap,
                nullable: false,
            }
        };
        Expr {
            kind: ExprKind::StructNew { heap, operands },
            ty,
        }
    }

    pub fn struct_get(reference: Expr, index: usize, field_ty: Type) -> Expr {
        let ty = if reference.ty == Type::Unreachable {
            Type::Unreachable
        } else {
            field_ty
        };
        Expr {
            kind: ExprKind::StructGet {
                reference: Box::new(reference),
                index,
            },
            ty,
        }
    }

    pub fn struct_set(reference: Expr, index: usize, value: Expr) -> Expr {
        let ty = stmt_type(&[&reference, &value]);
        Expr {
            kind: ExprKind::StructSet {
                reference: Box::new(reference),
                index,
                value: Box::new(value),
            },
            ty,
        }
    }

    pub fn ref_as_non_null(reference: Expr) -> Expr {
        let ty = if reference.ty == Type::Unreachable {
            Type::Unreachable
        } else {
            reference.ty.non_nullable()
        };
        Expr {
            kind: ExprKind::RefAsNonNull {
                reference: Box::new(reference),
            },
            ty,
        }
    }

    pub fn drop_(value: Expr) -> Expr {
        let ty = stmt_type(&[&value]);
        Expr {
            kind: ExprKind::Drop {
                value: Box::new(value),
            },
            ty,
        }
    }

    pub fn select(condition: Expr, if_true: Expr, if_false: Expr) -> Expr {
        let ty = if condition.ty == Type::Unreachable
            || if_true.ty == Type::Unreachable
            || if_false.ty == Type::Unreachable
        {
            Type::Unreachable
        } else {
            Type::join(if_true.ty, if_false.ty)
        };
        Expr {
            kind: ExprKind::Select {
                condition: Box::new(condition),
                if_true: Box::new(if_true),
                if_false: Box::new(if_false),
            },
            ty,
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        let ty = if left.ty == Type::Unreachable || right.ty == Type::Unreachable {
            Type::Unreachable
        } else {
            Type::I32
        };
        Expr {
            kind: ExprKind::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            ty,
        }
    }

    pub fn if_(condition: Expr, if_true: Expr, if_false: Option<Expr>) -> Expr {
        let ty = if condition.ty == Type::Unreachable {
            Type::Unreachable
        } else {
            match &if_false {
                Some(other) => Type::join(if_true.ty, other.ty),
                None => Type::None,
            }
        };
        Expr {
            kind: ExprKind::If {
                condition: Box::new(condition),
                if_true: Box::new(if_true),
                if_false: if_false.map(Box::new),
            },
            ty,
        }
    }

    pub fn block(list: Vec<Expr>) -> Expr {
        let ty = list.last().map_or(Type::None, |last| last.ty);
        Expr {
            kind: ExprKind::Block { list },
            ty,
        }
    }

    pub fn sequence(first: Expr, second: Expr) -> Expr {
        let ty = second.ty;
        Expr {
            kind: ExprKind::Sequence {
                first: Box::new(first),
                second: Box::new(second),
            },
            ty,
        }
    }

    pub fn return_(value: Option<Expr>) -> Expr {
        Expr {
            kind: ExprKind::Return {
                value: value.map(Box::new),
            },
            ty: Type::Unreachable,
        }
    }
}

/// Result type of a statement-like node: none, unless a child already
/// failed to complete.
fn stmt_type(children: &[&Expr]) -> Type {
    if children.iter().any(|c| c.ty == Type::Unreachable) {
        Type::Unreachable
    } else {
        Type::None
    }
}

/// Conversion helpers for the traversal macro.
trait AsExprRef<'a> {
    fn as_expr_ref(&'a self) -> &'a Expr;
}

impl<'a> AsExprRef<'a> for Box<Expr> {
    fn as_expr_ref(&'a self) -> &'a Expr {
        self.as_ref()
    }
}

impl<'a> AsExprRef<'a> for Expr {
    fn as_expr_ref(&'a self) -> &'a Expr {
        self
    }
}

trait AsExprMut<'a> {
    fn as_expr_mut(&'a mut self) -> &'a mut Expr;
}

impl<'a> AsExprMut<'a> for Box<Expr> {
    fn as_expr_mut(&'a mut self) -> &'a mut Expr {
        self.as_mut()
    }
}

impl<'a> AsExprMut<'a> for Expr {
    fn as_expr_mut(&'a mut self) -> &'a mut Expr {
        self
    }
}
