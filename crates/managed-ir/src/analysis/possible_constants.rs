// Copyright (c) The ManagedIR Contributors
// SPDX-License-Identifier: Apache-2.0

//! Abstract domain tracking the constant values a field can hold.

use std::fmt;
use std::fmt::{Display, Formatter};

use smallvec::SmallVec;

use crate::data::literal::Literal;
use crate::data::types::Type;

/// The maximum number of distinct constant values we are willing to
/// track. Anything beyond this makes the value unknown.
pub const MAX_CONSTANT_VALUES: usize = 2;

/// What we know about the values written to a particular place: nothing
/// yet (unwritten), a small set of constants, or unknown once we see a
/// non-constant write or too many distinct constants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PossibleConstants {
    /// Whether any value has been noted at all.
    noted: bool,
    /// The constants seen so far. Empty while nothing was noted, and
    /// empty again once the value became unknown.
    values: SmallVec<[Literal; MAX_CONSTANT_VALUES]>,
}

impl PossibleConstants {
    /// Incorporate a written constant. Returns whether anything changed.
    pub fn note(&mut self, literal: Literal) -> bool {
        if !self.noted {
            self.values.push(literal);
            self.noted = true;
            return true;
        }

        // Once non-constant, always non-constant.
        if !self.is_constant() {
            return false;
        }

        if self.values.contains(&literal) {
            return false;
        }

        if self.values.len() == MAX_CONSTANT_VALUES {
            self.note_unknown();
        } else {
            self.values.push(literal);
        }
        true
    }

    /// Note a value we cannot reason about.
    pub fn note_unknown(&mut self) {
        self.values.clear();
        self.noted = true;
    }

    /// Note the implicit zero value of a field type.
    pub fn note_default(&mut self, field_ty: Type) {
        self.note(Literal::zero(field_ty));
    }

    /// Merge the knowledge of another lattice value into this one, as if
    /// every observation noted there had been noted here. Returns whether
    /// anything changed.
    pub fn combine(&mut self, other: &PossibleConstants) -> bool {
        if !other.noted {
            return false;
        }
        if !self.noted {
            *self = other.clone();
            return true;
        }
        if !self.is_constant() {
            return false;
        }
        if !other.is_constant() {
            self.note_unknown();
            return true;
        }

        let mut changed = false;
        for value in &other.values {
            if self.note(*value) {
                changed = true;
            }
            if !self.is_constant() {
                break;
            }
        }
        changed
    }

    /// Whether the value is known to be one of a small set of constants.
    pub fn is_constant(&self) -> bool {
        self.noted && !self.values.is_empty()
    }

    /// Whether anything was ever noted.
    pub fn has_noted(&self) -> bool {
        self.noted
    }

    /// The constants seen. Only valid while `is_constant()`.
    pub fn constant_values(&self) -> &[Literal] {
        debug_assert!(self.is_constant());
        &self.values
    }
}

impl Display for PossibleConstants {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        if !self.has_noted() {
            write!(f, "unwritten")?;
        } else if !self.is_constant() {
            write!(f, "unknown")?;
        } else {
            for (i, value) in self.values.iter().enumerate() {
                if i > 0 {
                    write!(f, " ")?;
                }
                write!(f, "{}", value)?;
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_note_is_a_change() {
        let mut info = PossibleConstants::default();
        assert!(!info.has_noted());
        assert!(info.note(Literal::I32(1)));
        assert!(info.is_constant());
        assert_eq!(info.constant_values(), &[Literal::I32(1)]);
    }

    #[test]
    fn repeated_note_is_not_a_change() {
        let mut info = PossibleConstants::default();
        info.note(Literal::I32(1));
        assert!(!info.note(Literal::I32(1)));
        assert_eq!(info.constant_values(), &[Literal::I32(1)]);
    }

    #[test]
    fn exceeding_the_cap_becomes_unknown() {
        let mut info = PossibleConstants::default();
        assert!(info.note(Literal::I32(1)));
        assert!(info.note(Literal::I32(2)));
        assert!(info.is_constant());
        assert!(info.note(Literal::I32(3)));
        assert!(info.has_noted());
        assert!(!info.is_constant());
        // Unknown is absorbing.
        assert!(!info.note(Literal::I32(4)));
    }

    #[test]
    fn null_and_funcref_are_distinct_constants() {
        let mut info = PossibleConstants::default();
        info.note(Literal::Null);
        info.note(Literal::Func(7));
        assert!(info.is_constant());
        assert_eq!(info.constant_values().len(), 2);
    }

    #[test]
    fn combine_from_unwritten_copies() {
        let mut a = PossibleConstants::default();
        let mut b = PossibleConstants::default();
        b.note(Literal::I64(9));
        assert!(a.combine(&b));
        assert_eq!(a, b);
        assert!(!a.combine(&b));
    }

    #[test]
    fn combine_with_unknown_poisons() {
        let mut a = PossibleConstants::default();
        a.note(Literal::I32(1));
        let mut b = PossibleConstants::default();
        b.note_unknown();
        assert!(a.combine(&b));
        assert!(!a.is_constant());
    }

    #[test]
    fn combine_past_the_cap_is_unknown() {
        let mut a = PossibleConstants::default();
        a.note(Literal::I32(1));
        let mut b = PossibleConstants::default();
        b.note(Literal::I32(2));
        b.note(Literal::I32(3));
        assert!(a.combine(&b));
        assert!(a.has_noted());
        assert!(!a.is_constant());
    }

    #[test]
    fn default_notes_the_zero_value() {
        let mut info = PossibleConstants::default();
        info.note_default(Type::I32);
        assert_eq!(info.constant_values(), &[Literal::I32(0)]);

        let mut refs = PossibleConstants::default();
        refs.note_default(Type::FuncRef { nullable: true });
        assert_eq!(refs.constant_values(), &[Literal::Null]);
    }
}
