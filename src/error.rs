//! Error types for formswap.
//!
//! Every failure in this crate is local: a rule line that cannot be parsed is
//! rejected with a [`ParseError`] and loading moves on to the next line. Query
//! paths never return errors; a miss is the normal "nothing overrides this"
//! outcome.

use std::path::PathBuf;

use thiserror::Error;

use crate::form::FormId;

/// Errors produced while turning a textual rule line into a rule record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A token did not resolve to a form.
    #[error("{field} formID not found: [{token}]")]
    UnresolvedIdentifier {
        /// Rule field the token came from.
        field: &'static str,
        /// The token as written.
        token: String,
    },

    /// Every member of a target pool failed to resolve.
    #[error("{field} formID not found (no resolvable targets)")]
    EmptyTargetSet {
        /// Rule field the pool came from.
        field: &'static str,
    },

    /// A swap to itself with no overrides.
    #[error("BASE formID == SWAP formID ({base})")]
    SelfReferentialSwap {
        /// The base, which is also the target.
        base: FormId,
    },

    /// A chance, transform or properties expression did not parse.
    #[error("malformed {kind} expression: [{text}]")]
    MalformedExpression {
        /// Expression kind.
        kind: &'static str,
        /// Offending text.
        text: String,
    },

    /// A required `|` field is missing.
    #[error("rule line has no field #{index}")]
    MissingField {
        /// Zero-based field index.
        index: usize,
    },
}

impl ParseError {
    /// Creates an unresolved-identifier error for the given field.
    #[must_use]
    pub fn unresolved(field: &'static str, token: impl Into<String>) -> Self {
        Self::UnresolvedIdentifier {
            field,
            token: token.into(),
        }
    }

    /// Creates a malformed-expression error.
    #[must_use]
    pub fn malformed(kind: &'static str, text: impl Into<String>) -> Self {
        Self::MalformedExpression {
            kind,
            text: text.into(),
        }
    }
}

/// Errors raised by a configuration source while producing sections.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The file could not be read.
    #[error("couldn't read {path}: {source}")]
    Io {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The source has no such path or could not make sense of it.
    #[error("couldn't parse {path}: {reason}")]
    Unreadable {
        /// File path.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },
}

/// Top-level error type for formswap.
#[derive(Debug, Error)]
pub enum SwapError {
    /// Rule line error.
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Source error.
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Invalid configuration.
    #[error("Config error: {message}")]
    Config {
        /// What is wrong with it.
        message: String,
    },
}

impl SwapError {
    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Returns true if this is a parse error.
    #[must_use]
    pub const fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_))
    }

    /// Returns true if this is a source error.
    #[must_use]
    pub const fn is_source(&self) -> bool {
        matches!(self, Self::Source(_))
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }
}

/// Result type alias for formswap operations.
pub type SwapResult<T> = Result<T, SwapError>;
