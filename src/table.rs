//! Rule tables.
//!
//! Each table maps a form id to its records in load order; the last record
//! loaded has the highest priority. Tables are filled once during load and
//! only read afterwards.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::filter::ConditionFilters;
use crate::form::FormId;
use crate::rule::{ConditionalGroup, PropertyRule, SwapRule};

/// Records keyed by base form (or reference) id, oldest first.
pub type RuleTable<T> = HashMap<FormId, Vec<T>>;

/// Scans `records` from newest to oldest and returns the first hit.
///
/// `pick` decides per record whether its gates pass and its payload is
/// usable; a record that yields `None` is skipped, not a failure of the scan.
pub fn find_newest<'a, T, R>(records: &'a [T], pick: impl FnMut(&'a T) -> Option<R>) -> Option<R> {
    records.iter().rev().find_map(pick)
}

/// Looks `key` up, falling back to the material swap id only when `key` misses.
pub fn bucket<'a, T>(table: &'a RuleTable<T>, key: FormId, fallback: Option<FormId>) -> Option<&'a [T]> {
    table
        .get(&key)
        .or_else(|| fallback.and_then(|id| table.get(&id)))
        .map(Vec::as_slice)
}

/// Appends `rule` to the conditional bucket for `base`, merging into the
/// newest group when it came from the same section.
pub fn push_conditional<T>(
    table: &mut RuleTable<ConditionalGroup<T>>,
    base: FormId,
    filters: &Arc<ConditionFilters>,
    section: usize,
    rule: T,
) {
    let groups = table.entry(base).or_default();
    match groups.last_mut() {
        Some(group) if group.section == section => group.rules.push(rule),
        _ => groups.push(ConditionalGroup::new(Arc::clone(filters), section, rule)),
    }
}

/// Identifies one of the rule tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TableKind {
    /// Template-keyed swaps (`[Forms]`).
    Forms,
    /// Conditional template-keyed swaps (`[Forms|...]`).
    ConditionalForms,
    /// Reference-keyed swaps (`[References]`).
    References,
    /// Property overrides (`[Properties]`, `[Transforms]`).
    Properties,
    /// Conditional property overrides.
    ConditionalProperties,
}

impl fmt::Display for TableKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Forms => write!(f, "Forms"),
            Self::ConditionalForms => write!(f, "Conditional Forms"),
            Self::References => write!(f, "References"),
            Self::Properties => write!(f, "Properties"),
            Self::ConditionalProperties => write!(f, "Conditional Properties"),
        }
    }
}

/// The five rule tables.
#[derive(Debug, Default)]
pub struct RuleTables {
    /// `[References]`, keyed by instance id.
    pub swap_refs: RuleTable<SwapRule>,
    /// `[Forms|...]`, keyed by template.
    pub swap_forms_conditional: RuleTable<ConditionalGroup<SwapRule>>,
    /// `[Forms]`, keyed by template.
    pub swap_forms: RuleTable<SwapRule>,
    /// `[Properties]` and `[Transforms]`, keyed by template or instance.
    pub ref_properties: RuleTable<PropertyRule>,
    /// Conditional property sections, keyed by template.
    pub ref_properties_conditional: RuleTable<ConditionalGroup<PropertyRule>>,
}

impl RuleTables {
    /// Number of keyed buckets in a table.
    #[must_use]
    pub fn len(&self, kind: TableKind) -> usize {
        match kind {
            TableKind::Forms => self.swap_forms.len(),
            TableKind::ConditionalForms => self.swap_forms_conditional.len(),
            TableKind::References => self.swap_refs.len(),
            TableKind::Properties => self.ref_properties.len(),
            TableKind::ConditionalProperties => self.ref_properties_conditional.len(),
        }
    }

    /// True when no table holds any record.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            TableKind::Forms,
            TableKind::ConditionalForms,
            TableKind::References,
            TableKind::Properties,
            TableKind::ConditionalProperties,
        ]
        .into_iter()
        .all(|kind| self.len(kind) == 0)
    }
}
