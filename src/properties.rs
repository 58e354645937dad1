//! Property override payloads.
//!
//! A payload is a transform expression, optionally extended with a
//! `flags(HEX)` clause that ORs record flag bits into the instance:
//!
//! ```text
//! pos(0,0,-5/5),rot(0,0,0/360R),flags(0x00000800)
//! ```

use serde::{Deserialize, Serialize};

use crate::error::ParseError;
use crate::form::FormId;
use crate::host::ObjectRef;
use crate::rng::RngMode;
use crate::transform::{clause_name, split_clauses, Transform};

/// True when an optional rule field carries something. Blank and `NONE` do not.
#[must_use]
pub fn is_present(field: &str) -> bool {
    let field = field.trim();
    !field.is_empty() && !field.eq_ignore_ascii_case("NONE")
}

/// Override bundle applied to a resolved instance.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ObjectProperties {
    /// Position, rotation and scale overrides.
    pub transform: Transform,
    /// Bits OR-ed into the instance flags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub record_flags: Option<u32>,
    /// Seeding mode inherited from the owning rule's chance.
    #[serde(default)]
    pub mode: RngMode,
}

impl ObjectProperties {
    /// Parses a payload. Unknown or malformed clauses are returned as errors and
    /// otherwise ignored.
    pub fn parse(text: &str) -> (Self, Vec<ParseError>) {
        let mut properties = Self::default();
        let mut errors = Vec::new();
        if !is_present(text) {
            return (properties, errors);
        }

        for clause in split_clauses(text) {
            match properties.transform.parse_clause(clause) {
                Ok(true) => continue,
                Ok(false) => {}
                Err(err) => {
                    errors.push(err);
                    continue;
                }
            }
            if clause_name(clause) == "flags" {
                match parse_flags(clause) {
                    Some(bits) => properties.record_flags = Some(properties.record_flags.unwrap_or(0) | bits),
                    None => errors.push(ParseError::malformed("flags", clause)),
                }
            } else {
                errors.push(ParseError::malformed("properties", clause));
            }
        }

        (properties, errors)
    }

    /// Sets the seeding mode used when applying.
    #[must_use]
    pub fn with_mode(mut self, mode: RngMode) -> Self {
        self.mode = mode;
        self
    }

    /// True when at least one override is present.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.transform.is_valid() || self.record_flags.is_some_and(|bits| bits != 0)
    }

    /// Applies every override to `reference`.
    pub fn apply(&self, reference: &mut ObjectRef) {
        self.transform.apply(reference, self.mode);
        if let Some(bits) = self.record_flags {
            reference.flags |= bits;
        }
    }
}

fn parse_flags(clause: &str) -> Option<u32> {
    let inner = clause.split_once('(')?.1.strip_suffix(')')?;
    FormId::from_hex(inner).map(FormId::raw)
}
