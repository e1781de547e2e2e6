// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-(type, field) lattice maps.

use std::collections::BTreeMap;

use crate::analysis::possible_constants::PossibleConstants;
use crate::data::types::HeapType;

/// Maps each struct heap type to one lattice value per field slot.
/// Entries are created on demand, sized to the type's field count;
/// a missing entry means nothing was ever noted for that type.
#[derive(Debug, Clone, Default)]
pub struct StructValuesMap {
    entries: BTreeMap<HeapType, Vec<PossibleConstants>>,
}

impl StructValuesMap {
    /// The lattice row for a type, created unwritten if absent.
    pub fn entry(&mut self, heap: HeapType, field_count: usize) -> &mut [PossibleConstants] {
        self.entries
            .entry(heap)
            .or_insert_with(|| vec![PossibleConstants::default(); field_count])
    }

    pub fn get(&self, heap: HeapType) -> Option<&[PossibleConstants]> {
        self.entries.get(&heap).map(|row| row.as_slice())
    }

    pub fn get_field(&self, heap: HeapType, index: usize) -> Option<&PossibleConstants> {
        self.entries.get(&heap).map(|row| &row[index])
    }

    pub fn types(&self) -> impl Iterator<Item = HeapType> + '_ {
        self.entries.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Pointwise-join every row of this map into `out`.
    pub fn combine_into(&self, out: &mut StructValuesMap) {
        for (&heap, row) in &self.entries {
            let dest = out.entry(heap, row.len());
            for (info, other) in dest.iter_mut().zip(row) {
                info.combine(other);
            }
        }
    }
}
