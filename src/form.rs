//! Form identities and textual identifiers.
//!
//! A form is anything the host can look up by a 32-bit id: templates, placed
//! references, locations, keywords. Rule files name forms either by hex id
//! (optionally qualified by the source that defines it) or by editor id.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::host::FormResolver;

/// Numeric identity of a form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FormId(u32);

impl FormId {
    /// Wraps a raw id.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw id.
    #[must_use]
    pub const fn raw(self) -> u32 {
        self.0
    }

    /// Parses a hex literal, with or without a `0x` prefix.
    #[must_use]
    pub fn from_hex(s: &str) -> Option<Self> {
        let digits = strip_hex_prefix(s.trim());
        if digits.is_empty() || digits.len() > 8 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self)
    }
}

impl fmt::Display for FormId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:08X}", self.0)
    }
}

impl From<u32> for FormId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

fn strip_hex_prefix(s: &str) -> &str {
    s.strip_prefix("0x")
        .or_else(|| s.strip_prefix("0X"))
        .unwrap_or(s)
}

/// The kinds of form the resolution core distinguishes.
///
/// Everything the filter evaluator and leveled expansion do not care about is
/// `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormKind {
    /// A location; matches itself and its descendants.
    Location,
    /// A region a cell can belong to.
    Region,
    /// A keyword on a location or instance.
    Keyword,
    /// An interior or exterior cell.
    Cell,
    /// A leveled list expanded by the host.
    LeveledItem,
    /// Any other form.
    Other,
}

/// A textual reference to a form, before resolution.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    /// Bare hex literal, used as-is.
    Form(FormId),
    /// `hexid~source`: an id local to the named source.
    Qualified {
        /// Id relative to the defining source.
        local: u32,
        /// Name of the defining source (plugin file).
        source: String,
    },
    /// Editor id lookup.
    EditorId(String),
}

impl Identifier {
    /// Classifies a token. Returns `None` for blank tokens.
    #[must_use]
    pub fn parse(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }

        if let Some((local, source)) = token.split_once('~') {
            let local = FormId::from_hex(local)?;
            let source = source.trim();
            if source.is_empty() {
                return None;
            }
            return Some(Self::Qualified {
                local: local.raw(),
                source: source.to_string(),
            });
        }

        if let Some(id) = FormId::from_hex(token) {
            return Some(Self::Form(id));
        }

        Some(Self::EditorId(token.to_string()))
    }

    /// Resolves this identifier through the host.
    ///
    /// Bare hex literals resolve to themselves even when the host does not know
    /// them yet; some forms (cells) are only loaded later.
    pub fn resolve(&self, forms: &dyn FormResolver) -> Option<FormId> {
        match self {
            Self::Form(id) => {
                if forms.kind_of(*id).is_none() {
                    debug!("[{id}] not loaded yet, keeping raw formID");
                }
                Some(*id)
            }
            Self::Qualified { local, source } => forms.lookup_in_source(*local, source),
            Self::EditorId(edid) => forms.lookup_editor_id(edid),
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Form(id) => write!(f, "{id}"),
            Self::Qualified { local, source } => write!(f, "{local:X}~{source}"),
            Self::EditorId(edid) => write!(f, "{edid}"),
        }
    }
}

/// Parses and resolves a token in one step.
pub fn resolve_token(token: &str, forms: &dyn FormResolver) -> Option<FormId> {
    Identifier::parse(token)?.resolve(forms)
}
