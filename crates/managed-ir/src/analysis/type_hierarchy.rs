// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Propagation of per-field lattice values along the declared subtype
//! hierarchy.
//!
//! Allocations know the exact type being created, so their information is
//! only visible through reads at supertypes. Writes go through references
//! whose static type may differ from the actual object's type in either
//! direction, so their information must flow both ways.

use std::collections::{BTreeSet, VecDeque};

use crate::analysis::struct_values::StructValuesMap;
use crate::data::structure::StructDef;
use crate::data::types::HeapType;

/// The inverted subtype relation of a module's declared structs.
pub struct SubTypes {
    supertypes: Vec<Option<HeapType>>,
    subtypes: Vec<Vec<HeapType>>,
    field_counts: Vec<usize>,
}

impl SubTypes {
    pub fn new(structs: &[StructDef]) -> SubTypes {
        let supertypes = structs.iter().map(|def| def.supertype).collect();
        let mut subtypes = vec![Vec::new(); structs.len()];
        for (heap, def) in structs.iter().enumerate() {
            if let Some(supertype) = def.supertype {
                subtypes[supertype].push(heap);
            }
        }
        SubTypes {
            supertypes,
            subtypes,
            field_counts: structs.iter().map(|def| def.field_count()).collect(),
        }
    }

    pub fn supertype(&self, heap: HeapType) -> Option<HeapType> {
        self.supertypes[heap]
    }

    pub fn subtypes(&self, heap: HeapType) -> &[HeapType] {
        &self.subtypes[heap]
    }
}

/// Breadth-first join walk over the subtype graph: types whose lattice
/// changed push their neighbors until nothing moves.
pub struct TypeHierarchyPropagator {
    sub_types: SubTypes,
}

impl TypeHierarchyPropagator {
    pub fn new(structs: &[StructDef]) -> TypeHierarchyPropagator {
        TypeHierarchyPropagator {
            sub_types: SubTypes::new(structs),
        }
    }

    pub fn propagate_to_supertypes(&self, map: &mut StructValuesMap) {
        self.propagate(map, true, false);
    }

    pub fn propagate_to_super_and_subtypes(&self, map: &mut StructValuesMap) {
        self.propagate(map, true, true);
    }

    fn propagate(&self, map: &mut StructValuesMap, to_super: bool, to_sub: bool) {
        let mut queue: VecDeque<HeapType> = map.types().collect();
        let mut queued: BTreeSet<HeapType> = queue.iter().copied().collect();

        while let Some(heap) = queue.pop_front() {
            queued.remove(&heap);
            let source = map.get(heap).expect("queued type has an entry").to_vec();

            if to_super {
                if let Some(supertype) = self.sub_types.supertype(heap) {
                    // Only the field prefix shared with the supertype
                    // exists up there.
                    let shared = self.sub_types.field_counts[supertype];
                    let dest = map.entry(supertype, shared);
                    let mut changed = false;
                    for index in 0..shared {
                        changed |= dest[index].combine(&source[index]);
                    }
                    if changed && queued.insert(supertype) {
                        queue.push_back(supertype);
                    }
                }
            }

            if to_sub {
                for &subtype in self.sub_types.subtypes(heap) {
                    let dest = map.entry(subtype, self.sub_types.field_counts[subtype]);
                    let mut changed = false;
                    for (index, info) in source.iter().enumerate() {
                        changed |= dest[index].combine(info);
                    }
                    if changed && queued.insert(subtype) {
                        queue.push_back(subtype);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::possible_constants::PossibleConstants;
    use crate::data::literal::Literal;
    use crate::data::structure::{Field, StructDef};
    use crate::data::types::Type;

    fn hierarchy() -> Vec<StructDef> {
        // a <- b <- c, one i32 field each
        let field = || vec![Field::new("f", Type::I32)];
        vec![
            StructDef {
                name: "a".to_string(),
                supertype: None,
                fields: field(),
            },
            StructDef {
                name: "b".to_string(),
                supertype: Some(0),
                fields: field(),
            },
            StructDef {
                name: "c".to_string(),
                supertype: Some(1),
                fields: field(),
            },
        ]
    }

    fn noted(value: i32) -> PossibleConstants {
        let mut info = PossibleConstants::default();
        info.note(Literal::I32(value));
        info
    }

    #[test]
    fn allocations_flow_upward_only() {
        let structs = hierarchy();
        let mut map = StructValuesMap::default();
        map.entry(1, 1)[0] = noted(7);

        TypeHierarchyPropagator::new(&structs).propagate_to_supertypes(&mut map);

        assert_eq!(map.get_field(0, 0).unwrap().constant_values(), &[Literal::I32(7)]);
        assert!(map.get_field(2, 0).is_none() || !map.get_field(2, 0).unwrap().has_noted());
    }

    #[test]
    fn writes_flow_in_both_directions() {
        let structs = hierarchy();
        let mut map = StructValuesMap::default();
        map.entry(1, 1)[0] = noted(7);

        TypeHierarchyPropagator::new(&structs).propagate_to_super_and_subtypes(&mut map);

        for heap in 0..3 {
            assert_eq!(
                map.get_field(heap, 0).unwrap().constant_values(),
                &[Literal::I32(7)],
                "type {} must see the write",
                heap
            );
        }
    }

    #[test]
    fn propagation_joins_rather_than_overwrites() {
        let structs = hierarchy();
        let mut map = StructValuesMap::default();
        map.entry(0, 1)[0] = noted(1);
        map.entry(1, 1)[0] = noted(2);

        TypeHierarchyPropagator::new(&structs).propagate_to_supertypes(&mut map);

        let at_root = map.get_field(0, 0).unwrap();
        assert!(at_root.is_constant());
        assert_eq!(at_root.constant_values().len(), 2);
    }
}
