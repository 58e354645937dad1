//! Conditional filters.
//!
//! A conditional section header like `[Forms|MarkarthLocation,-LocTypeDungeon]`
//! carries a filter set. Entries prefixed with `-` go to the `NOT` list, the rest
//! to the `MATCH` list. Tokens that do not resolve to a form are kept as raw
//! keyword strings and matched by name.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::form::{FormId, FormKind, Identifier};
use crate::host::FormResolver;

/// A keyword attached to a location, with its editor id for string matching.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRef {
    /// Keyword form.
    pub id: FormId,
    /// Keyword editor id.
    pub editor_id: String,
}

impl KeywordRef {
    /// Creates a keyword reference.
    #[must_use]
    pub fn new(id: FormId, editor_id: impl Into<String>) -> Self {
        Self {
            id,
            editor_id: editor_id.into(),
        }
    }
}

/// Read-only snapshot of where an object currently is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldContext {
    /// Current location, if any.
    pub location: Option<FormId>,
    /// Ancestors of the current location, nearest first.
    #[serde(default)]
    pub location_parents: Vec<FormId>,
    /// Keywords carried by the current location.
    #[serde(default)]
    pub location_keywords: Vec<KeywordRef>,
    /// Regions the current cell belongs to.
    #[serde(default)]
    pub regions: Vec<FormId>,
    /// Current cell.
    pub cell: Option<FormId>,
    /// Keywords the instance itself has.
    #[serde(default)]
    pub reference_keywords: Vec<FormId>,
    /// Keyword editor ids exposed by the base template.
    #[serde(default)]
    pub base_keywords: Vec<String>,
}

impl WorldContext {
    /// Sets the current location and its parent chain.
    #[must_use]
    pub fn at_location(mut self, location: FormId, parents: Vec<FormId>) -> Self {
        self.location = Some(location);
        self.location_parents = parents;
        self
    }

    /// Sets the current cell.
    #[must_use]
    pub fn in_cell(mut self, cell: FormId) -> Self {
        self.cell = Some(cell);
        self
    }

    /// Adds a region membership.
    #[must_use]
    pub fn with_region(mut self, region: FormId) -> Self {
        self.regions.push(region);
        self
    }

    /// Adds a location keyword.
    #[must_use]
    pub fn with_location_keyword(mut self, keyword: KeywordRef) -> Self {
        self.location_keywords.push(keyword);
        self
    }

    /// Adds a keyword to the instance.
    #[must_use]
    pub fn with_reference_keyword(mut self, keyword: FormId) -> Self {
        self.reference_keywords.push(keyword);
        self
    }

    /// Adds a base template keyword by editor id.
    #[must_use]
    pub fn with_base_keyword(mut self, editor_id: impl Into<String>) -> Self {
        self.base_keywords.push(editor_id.into());
        self
    }

    fn matches_form(&self, id: FormId, kind: FormKind) -> bool {
        match kind {
            FormKind::Location => self
                .location
                .is_some_and(|loc| loc == id || self.location_parents.contains(&id)),
            FormKind::Region => self.regions.contains(&id),
            FormKind::Keyword => {
                let on_location = self.location.is_some()
                    && self.location_keywords.iter().any(|kw| kw.id == id);
                on_location || self.reference_keywords.contains(&id)
            }
            FormKind::Cell => self.cell == Some(id),
            FormKind::LeveledItem | FormKind::Other => false,
        }
    }

    fn matches_keyword_string(&self, editor_id: &str) -> bool {
        if self.location.is_some()
            && self
                .location_keywords
                .iter()
                .any(|kw| kw.editor_id == editor_id)
        {
            return true;
        }
        self.base_keywords.iter().any(|kw| kw == editor_id)
    }

    /// Returns true if a single filter entry matches this context.
    #[must_use]
    pub fn matches_entry(&self, entry: &FilterEntry) -> bool {
        match entry {
            FilterEntry::Form { id, kind } => self.matches_form(*id, *kind),
            FilterEntry::Keyword(editor_id) => self.matches_keyword_string(editor_id),
        }
    }
}

/// One entry of a filter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterEntry {
    /// A resolved form and the kind it had when the filter was built.
    Form {
        /// Resolved form.
        id: FormId,
        /// Kind the entry is matched as.
        kind: FormKind,
    },
    /// An unresolved token, matched against keyword editor ids.
    Keyword(String),
}

impl fmt::Display for FilterEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Form { id, .. } => write!(f, "{id}"),
            Self::Keyword(edid) => write!(f, "{edid}"),
        }
    }
}

/// Positive and negative filter lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConditionFilters {
    /// At least one must match, when non-empty.
    pub matches: Vec<FilterEntry>,
    /// None may match.
    pub not: Vec<FilterEntry>,
}

impl ConditionFilters {
    /// Builds a filter set from raw condition tokens.
    pub fn parse<S: AsRef<str>>(conditions: &[S], forms: &dyn FormResolver) -> Self {
        let mut filters = Self {
            matches: Vec::with_capacity(conditions.len()),
            not: Vec::with_capacity(conditions.len()),
        };

        for condition in conditions {
            let condition = condition.as_ref().trim();
            let (negate, condition) = match condition.strip_prefix('-') {
                Some(rest) => (true, rest.trim()),
                None => (false, condition),
            };
            if condition.is_empty() {
                continue;
            }

            let entry = match Identifier::parse(condition).and_then(|id| id.resolve(forms)) {
                Some(id) => FilterEntry::Form {
                    id,
                    // Unknown hex ids are most likely cells, which load late.
                    kind: forms.kind_of(id).unwrap_or(FormKind::Cell),
                },
                None => {
                    info!("\t\tFilter [{condition}] INFO - unable to find form, treating filter as keyword");
                    FilterEntry::Keyword(condition.to_string())
                }
            };

            if negate {
                filters.not.push(entry);
            } else {
                filters.matches.push(entry);
            }
        }

        filters
    }

    /// True when neither list has entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.matches.is_empty() && self.not.is_empty()
    }

    /// Evaluates the filter set against a context snapshot.
    ///
    /// Any `NOT` hit rejects. Otherwise, a non-empty `MATCH` list needs at
    /// least one hit.
    #[must_use]
    pub fn evaluate(&self, context: &WorldContext) -> bool {
        if self.not.iter().any(|entry| context.matches_entry(entry)) {
            return false;
        }
        if !self.matches.is_empty() && !self.matches.iter().any(|entry| context.matches_entry(entry)) {
            return false;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::InMemoryHost;

    const SKYRIM: FormId = FormId::new(0x0001_6BB4);
    const WHITERUN_HOLD: FormId = FormId::new(0x0001_6772);
    const WHITERUN: FormId = FormId::new(0x0001_8A56);
    const TUNDRA: FormId = FormId::new(0x0000_0C40);
    const LOC_TYPE_CITY: FormId = FormId::new(0x0001_3168);
    const CELL: FormId = FormId::new(0x0000_9732);

    fn host() -> InMemoryHost {
        let host = InMemoryHost::new();
        host.add_form(SKYRIM, FormKind::Location, Some("SkyrimLocation"));
        host.add_form(WHITERUN_HOLD, FormKind::Location, Some("WhiterunHoldLocation"));
        host.add_form(WHITERUN, FormKind::Location, Some("WhiterunLocation"));
        host.add_form(TUNDRA, FormKind::Region, Some("WhiterunTundraRegion"));
        host.add_form(LOC_TYPE_CITY, FormKind::Keyword, Some("LocTypeCity"));
        host
    }

    fn in_whiterun() -> WorldContext {
        WorldContext::default()
            .at_location(WHITERUN, vec![WHITERUN_HOLD, SKYRIM])
            .with_region(TUNDRA)
            .with_location_keyword(KeywordRef::new(LOC_TYPE_CITY, "LocTypeCity"))
            .in_cell(CELL)
    }

    #[test]
    fn test_parse_splits_negations() {
        let filters = ConditionFilters::parse(&["WhiterunLocation", "-LocTypeCity", "-SomeMagicWord"], &host());
        assert_eq!(
            filters.matches,
            vec![FilterEntry::Form {
                id: WHITERUN,
                kind: FormKind::Location
            }]
        );
        assert_eq!(filters.not.len(), 2);
        assert_eq!(filters.not[1], FilterEntry::Keyword("SomeMagicWord".to_string()));
    }

    #[test]
    fn test_unknown_hex_is_treated_as_cell() {
        let filters = ConditionFilters::parse(&["00009732"], &host());
        assert_eq!(
            filters.matches,
            vec![FilterEntry::Form {
                id: CELL,
                kind: FormKind::Cell
            }]
        );
        assert!(filters.evaluate(&in_whiterun()));
    }

    #[test]
    fn test_empty_filters_always_match() {
        let filters = ConditionFilters::default();
        assert!(filters.is_empty());
        assert!(filters.evaluate(&WorldContext::default()));
    }

    #[test]
    fn test_location_matches_ancestors() {
        let filters = ConditionFilters::parse(&["SkyrimLocation"], &host());
        assert!(filters.evaluate(&in_whiterun()));
        assert!(!filters.evaluate(&WorldContext::default()));
    }

    #[test]
    fn test_not_overrides_match() {
        let filters = ConditionFilters::parse(&["WhiterunLocation", "-SkyrimLocation"], &host());
        assert!(!filters.evaluate(&in_whiterun()));
    }

    #[test]
    fn test_match_requires_one_hit() {
        let filters = ConditionFilters::parse(&["WhiterunTundraRegion", "SomethingElse"], &host());
        assert!(filters.evaluate(&in_whiterun()));

        let filters = ConditionFilters::parse(&["SomethingElse"], &host());
        assert!(!filters.evaluate(&in_whiterun()));
    }

    #[test]
    fn test_keyword_on_location_or_reference() {
        let filters = ConditionFilters::parse(&["LocTypeCity"], &host());
        assert!(filters.evaluate(&in_whiterun()));

        let on_ref = WorldContext::default().with_reference_keyword(LOC_TYPE_CITY);
        assert!(filters.evaluate(&on_ref));
    }

    #[test]
    fn test_keyword_string_matches_base_keywords() {
        let filters = ConditionFilters::parse(&["ActivatorLever"], &host());
        let ctx = WorldContext::default().with_base_keyword("ActivatorLever");
        assert!(filters.evaluate(&ctx));
        assert!(!filters.evaluate(&in_whiterun()));
    }

    #[test]
    fn test_other_kinds_never_match() {
        let host = host();
        let misc = host.add_form(FormId::new(0xF), FormKind::Other, Some("Gold001"));
        let filters = ConditionFilters::parse(&["Gold001"], &host);
        assert_eq!(
            filters.matches,
            vec![FilterEntry::Form {
                id: misc,
                kind: FormKind::Other
            }]
        );
        assert!(!filters.evaluate(&in_whiterun()));
    }
}
