// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Constant field propagation.
//!
//! Finds struct fields that are only ever written with constant values,
//! anywhere in the module, and replaces reads of them with those values.
//! The classic beneficiary is a vtable type whose slots always receive
//! the same function reference.
//!
//! The analysis assumes a closed world: no struct type escapes the
//! module, so the allocations and writes we see are all there are.

use std::iter;

use log::debug;

use crate::analysis::possible_constants::PossibleConstants;
use crate::analysis::struct_values::StructValuesMap;
use crate::analysis::type_hierarchy::TypeHierarchyPropagator;
use crate::data::expr::{BinaryOp, Expr, ExprKind};
use crate::data::functions::Function;
use crate::data::structure::StructDef;
use crate::data::types::{HeapType, Type, TypeSystem};
use crate::data::{Module, ModuleEnv};
use crate::parallel;
use crate::pass::{Pass, PassError, PassOptions};
use crate::refinalize::refinalize;

pub struct ConstantFieldPropagation;

/// What one function (or the module's global initializers) observed:
/// values given to fields at allocations, and values written to fields.
#[derive(Debug, Clone, Default)]
struct ScanResult {
    new_infos: StructValuesMap,
    set_infos: StructValuesMap,
}

impl Pass for ConstantFieldPropagation {
    fn name(&self) -> &'static str {
        "constant-field-propagation"
    }

    fn run(&mut self, module: &mut Module, options: &PassOptions) -> Result<(), PassError> {
        // The hierarchy propagation below is meaningless under structural
        // subtyping; refuse before touching anything.
        if module.type_system != TypeSystem::Nominal {
            return Err(PassError::RequiresNominalTyping {
                pass: self.name(),
                found: module.type_system,
            });
        }

        // Find and analyze all writes inside each function.
        let mut scans = vec![ScanResult::default(); module.functions.len()];
        parallel::for_each_function(module, &mut scans, options.workers, |env, _id, func, scan| {
            scan_expr(&func.body, env.structs, scan);
        });

        // Allocations can also live in global initializers.
        let mut module_scan = ScanResult::default();
        for global in &module.globals {
            if let Some(init) = &global.init {
                scan_expr(init, &module.structs, &mut module_scan);
            }
        }

        // Combine the per-function data into module-level maps.
        let mut combined_new = StructValuesMap::default();
        let mut combined_set = StructValuesMap::default();
        for scan in scans.iter().chain(iter::once(&module_scan)) {
            scan.new_infos.combine_into(&mut combined_new);
            scan.set_infos.combine_into(&mut combined_set);
        }

        // Lift the observations along the subtype hierarchy. A read at
        // type T can observe an allocation of any subtype of T, so
        // allocation data flows to supertypes. A write through a
        // reference typed U can land on any subtype of U, and a read at
        // T can observe writes typed at supertypes of T, so write data
        // flows both ways.
        let propagator = TypeHierarchyPropagator::new(&module.structs);
        propagator.propagate_to_supertypes(&mut combined_new);
        propagator.propagate_to_super_and_subtypes(&mut combined_set);

        // A read can observe either kind of write; join both maps.
        let mut infos = combined_new;
        combined_set.combine_into(&mut infos);

        if infos.is_empty() {
            debug!("constant-field-propagation: no field writes anywhere");
        }

        let shrink = options.shrink_level > 0;
        let mut unused = vec![(); module.functions.len()];
        parallel::for_each_function(module, &mut unused, options.workers, |env, _id, func, _slot| {
            optimize_function(func, env, &infos, shrink);
        });

        Ok(())
    }
}

/// Record every allocation and field write in an expression tree.
fn scan_expr(expr: &Expr, structs: &[StructDef], scan: &mut ScanResult) {
    expr.walk_post(&mut |e| match &e.kind {
        ExprKind::StructNew { heap, operands } => {
            if e.ty == Type::Unreachable {
                return;
            }
            let fields = &structs[*heap].fields;
            let slots = scan.new_infos.entry(*heap, fields.len());
            if operands.is_empty() {
                // Allocation with implicit defaults.
                for (slot, field) in slots.iter_mut().zip(fields) {
                    slot.note_default(field.ty);
                }
            } else {
                for (slot, operand) in slots.iter_mut().zip(operands) {
                    note_operand(slot, operand);
                }
            }
        }
        ExprKind::StructSet {
            reference,
            index,
            value,
        } => {
            let Some(heap) = reference.ty.heap_type() else {
                return;
            };
            if value.ty == Type::Unreachable {
                return;
            }
            if is_field_copy(heap, *index, value) {
                // Copying a field onto itself introduces no values that
                // the subtype analysis does not already account for.
                return;
            }
            let slots = scan.set_infos.entry(heap, structs[heap].fields.len());
            note_operand(&mut slots[*index], value);
        }
        _ => {}
    });
}

fn note_operand(info: &mut PossibleConstants, operand: &Expr) {
    match operand.literal() {
        Some(literal) => {
            info.note(literal);
        }
        None => info.note_unknown(),
    }
}

/// A write whose value is a read of the same field of the same type.
fn is_field_copy(heap: HeapType, index: usize, value: &Expr) -> bool {
    match &value.kind {
        ExprKind::StructGet {
            reference,
            index: read_index,
        } => *read_index == index && reference.ty.heap_type() == Some(heap),
        _ => false,
    }
}

/// Rewrite the field reads of one function against the final lattice.
fn optimize_function(func: &mut Function, env: &ModuleEnv, infos: &StructValuesMap, shrink: bool) {
    let unwritten = PossibleConstants::default();
    let mut changed = false;

    func.body.walk_post_mut(&mut |e| {
        let ExprKind::StructGet { reference, index } = &e.kind else {
            return;
        };
        let Some(heap) = reference.ty.heap_type() else {
            return;
        };
        // No entry at all means nothing was ever noted for the type.
        let info = infos.get_field(heap, *index).unwrap_or(&unwritten);

        if !info.has_noted() {
            // This field is never written anywhere in the module, so no
            // struct carrying it is ever created and this read cannot be
            // reached. Keep the reference for its side effects and trap.
            let reference = take_reference(e);
            *e = Expr::sequence(Expr::drop_(reference), Expr::unreachable());
            changed = true;
            return;
        }

        if !info.is_constant() {
            return;
        }

        let result_ty = e.ty;
        match info.constant_values() {
            &[value] => {
                // The read always produces this value. It would have
                // trapped on a null reference, so keep that trap.
                let reference = take_reference(e);
                *e = Expr::sequence(
                    Expr::drop_(Expr::ref_as_non_null(reference)),
                    Expr::cnst(value, result_ty),
                );
                changed = true;
            }
            &[first, second] => {
                if shrink {
                    // Two constants plus a comparison only grow the code.
                    return;
                }
                // References may not be comparable; without a runtime
                // comparison we cannot pick between the values.
                let Some(op) = BinaryOp::eq_for(result_ty) else {
                    return;
                };
                // Emit `read == first ? first : second`, keeping the
                // original read as the comparison operand. The select has
                // exactly one of the two values at the right times, which
                // lets later passes specialize each side.
                let read = std::mem::replace(e, Expr::nop());
                *e = Expr::select(
                    Expr::binary(op, read, Expr::cnst(first, result_ty)),
                    Expr::cnst(first, result_ty),
                    Expr::cnst(second, result_ty),
                );
                changed = true;
            }
            _ => {
                // Three or more values: no rewrite.
            }
        }
    });

    if changed {
        // Substitutions can narrow subexpression types.
        refinalize(&mut func.body, env);
    }
}

/// Take ownership of a `StructGet`'s reference operand, leaving a
/// placeholder behind for the caller to overwrite.
fn take_reference(e: &mut Expr) -> Expr {
    let old = std::mem::replace(e, Expr::nop());
    match old.kind {
        ExprKind::StructGet { reference, .. } => *reference,
        _ => unreachable!("caller matched a struct read"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::literal::Literal;
    use crate::data::structure::Field;

    fn one_struct() -> Vec<StructDef> {
        vec![StructDef {
            name: "t".to_string(),
            supertype: None,
            fields: vec![Field::new("f", Type::I32)],
        }]
    }

    #[test]
    fn scan_notes_allocation_operands() {
        let structs = one_struct();
        let mut scan = ScanResult::default();
        scan_expr(
            &Expr::drop_(Expr::struct_new(0, vec![Expr::i32(42)])),
            &structs,
            &mut scan,
        );
        let info = scan.new_infos.get_field(0, 0).unwrap();
        assert_eq!(info.constant_values(), &[Literal::I32(42)]);
        assert!(scan.set_infos.get(0).is_none());
    }

    #[test]
    fn scan_notes_defaults_for_empty_allocations() {
        let structs = one_struct();
        let mut scan = ScanResult::default();
        scan_expr(&Expr::drop_(Expr::struct_new(0, vec![])), &structs, &mut scan);
        let info = scan.new_infos.get_field(0, 0).unwrap();
        assert_eq!(info.constant_values(), &[Literal::I32(0)]);
    }

    #[test]
    fn scan_treats_non_constant_writes_as_unknown() {
        let structs = one_struct();
        let reference = Expr::local_get(
            0,
            Type::Ref {
                heap: 0,
                nullable: false,
            },
        );
        let mut scan = ScanResult::default();
        scan_expr(
            &Expr::struct_set(reference, 0, Expr::local_get(1, Type::I32)),
            &structs,
            &mut scan,
        );
        let info = scan.set_infos.get_field(0, 0).unwrap();
        assert!(info.has_noted());
        assert!(!info.is_constant());
    }

    #[test]
    fn scan_ignores_field_copies() {
        let structs = one_struct();
        let reference = || {
            Expr::local_get(
                0,
                Type::Ref {
                    heap: 0,
                    nullable: false,
                },
            )
        };
        let copy = Expr::struct_set(
            reference(),
            0,
            Expr::struct_get(reference(), 0, Type::I32),
        );
        let mut scan = ScanResult::default();
        scan_expr(&copy, &structs, &mut scan);
        assert!(scan
            .set_infos
            .get_field(0, 0)
            .is_none_or(|info| !info.has_noted()));
    }
}
