//! # formswap - rule-driven base object swapping
//!
//! Rule files declare, per template or per placed instance, what an object
//! should become when it loads and which transform overrides to apply.
//! Rules live in five tables (template swaps, conditional template swaps,
//! reference swaps, property overrides, conditional property overrides) and
//! are resolved by priority: the last rule loaded wins, per-instance rules beat
//! template rules, and a rule whose chance gate or filters fail falls through
//! to the next candidate.
//!
//! ## Core Concepts
//!
//! - **Rule**: one line, `base|targets[|properties][|chance]`
//! - **Conditional section**: `[Forms|Loc,-Keyword]`, gated on a world context snapshot
//! - **Chance**: `chance(N)` or `chance(R,N)`; seeded by the object id unless `R`
//! - **Properties**: `pos(...)`, `rot(...)`, `scale(...)`, with relative (`R`) axes
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use formswap::{DirectorySource, InMemoryHost, Manager, ManagerConfig, ObjectRef};
//!
//! let config = ManagerConfig::default();
//! let source = Arc::new(DirectorySource::from_config(&config));
//! let host = Arc::new(InMemoryHost::new());
//! let manager = Manager::with_host(config, source, host);
//!
//! let mut reference = ObjectRef::placed(ref_id, base_id);
//! let resolution = manager.resolve(&reference, base_id, None);
//! resolution.apply_properties(&mut reference);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

// Core types
pub mod chance;
pub mod error;
pub mod form;
pub mod rng;

// Rule expressions and records
pub mod filter;
pub mod properties;
pub mod rule;
pub mod transform;

// Tables, sources, and resolution
pub mod config;
pub mod conflict;
pub mod host;
pub mod manager;
pub mod source;
pub mod table;

// Re-export primary types at crate root for convenience
pub use chance::Chance;
pub use config::ManagerConfig;
pub use conflict::{Conflict, ConflictRecord, ConflictReport};
pub use error::{ParseError, SourceError, SwapError, SwapResult};
pub use filter::{ConditionFilters, FilterEntry, KeywordRef, WorldContext};
pub use form::{FormId, FormKind, Identifier};
pub use host::{FormResolver, InMemoryHost, LeveledListEvaluator, ObjectRef, Placement, WorldContextProvider};
pub use manager::{Manager, Resolution};
pub use properties::ObjectProperties;
pub use rng::{RandomGenerator, RngMode};
pub use rule::{ConditionalGroup, PropertyRule, RuleKind, RuleOrigin, RuleRecord, SwapRule, TargetSet};
pub use source::{ConfigSource, DirectorySource, InMemorySource, Section};
pub use table::{RuleTables, TableKind};
pub use transform::{AxisGroup, ScaleRange, Transform, Vec3};
