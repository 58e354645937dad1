//! Rule records.
//!
//! Rule lines are pipe-delimited:
//!
//! ```text
//! base|targets[|properties][|chance]      swap rules
//! base|properties[|chance]                property rules
//! base|transform[|traits]                 transform rules
//! ```
//!
//! `base` and each target are identifiers (`hexid~source`, hex literal or
//! editor id). Several comma-separated targets form a pool from which one is
//! drawn per instance. A record is immutable once parsed.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use crate::chance::Chance;
use crate::error::ParseError;
use crate::filter::ConditionFilters;
use crate::form::{resolve_token, FormId};
use crate::host::{FormResolver, ObjectRef};
use crate::properties::{is_present, ObjectProperties};
use crate::rng::{salt, RandomGenerator, RngMode};
use crate::transform::Transform;

/// What a section's lines are parsed as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleKind {
    /// `base|targets[|properties][|chance]`.
    Swap,
    /// `base|properties[|chance]`.
    Property,
    /// `base|transform[|traits]`.
    Transform,
}

impl fmt::Display for RuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Swap => write!(f, "swap"),
            Self::Property => write!(f, "property"),
            Self::Transform => write!(f, "transform"),
        }
    }
}

/// Where a record came from, kept for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleOrigin {
    /// Source the line was read from.
    pub path: String,
    /// The raw line.
    pub record: String,
}

impl RuleOrigin {
    fn new(path: &str, record: &str) -> Self {
        Self {
            path: path.to_string(),
            record: record.to_string(),
        }
    }

    /// The line without its base field.
    #[must_use]
    pub fn payload(&self) -> &str {
        self.record
            .split_once('|')
            .map_or(self.record.as_str(), |(_, rest)| rest)
    }

    /// The base field as written.
    #[must_use]
    pub fn base_text(&self) -> &str {
        self.record.split('|').next().unwrap_or_default().trim()
    }
}

/// Common view over rule records used by table scans and conflict detection.
pub trait RuleRecord {
    /// The record's chance gate.
    fn chance(&self) -> Chance;
    /// Provenance.
    fn origin(&self) -> &RuleOrigin;
}

/// Replacement candidates of a swap rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetSet {
    /// One replacement.
    Single(FormId),
    /// Ordered by id so seeded picks are reproducible across runs.
    Pool(BTreeSet<FormId>),
}

impl TargetSet {
    /// Parses a target expression. Unresolvable pool members are dropped.
    pub fn parse(text: &str, forms: &dyn FormResolver) -> Result<Self, ParseError> {
        if !text.contains(',') {
            let token = text.trim();
            return resolve_token(token, forms)
                .map(Self::Single)
                .ok_or_else(|| ParseError::unresolved("SWAP", token));
        }

        let mut pool = BTreeSet::new();
        for token in text.split(',') {
            let token = token.trim();
            match resolve_token(token, forms) {
                Some(id) => {
                    pool.insert(id);
                }
                None => error!("\t\t\tfail : [{token}] (SWAP formID not found)"),
            }
        }
        if pool.is_empty() {
            return Err(ParseError::EmptyTargetSet { field: "SWAP" });
        }
        Ok(Self::Pool(pool))
    }

    /// Number of candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Pool(pool) => pool.len(),
        }
    }

    /// True if there are no candidates.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True if `id` is a candidate.
    #[must_use]
    pub fn contains(&self, id: FormId) -> bool {
        match self {
            Self::Single(single) => *single == id,
            Self::Pool(pool) => pool.contains(&id),
        }
    }

    /// Picks one candidate for `reference`.
    pub fn pick(&self, reference: FormId, mode: RngMode) -> Option<FormId> {
        match self {
            Self::Single(id) => Some(*id),
            Self::Pool(pool) => {
                if pool.is_empty() {
                    return None;
                }
                let index = RandomGenerator::for_mode(mode, reference, salt::SELECT).generate_index(pool.len());
                pool.iter().nth(index).copied()
            }
        }
    }
}

fn split_fields(line: &str) -> Result<Vec<&str>, ParseError> {
    let fields: Vec<&str> = line.split('|').map(str::trim).collect();
    if fields.len() < 2 {
        return Err(ParseError::MissingField { index: 1 });
    }
    Ok(fields)
}

fn resolve_base(token: &str, forms: &dyn FormResolver) -> Result<FormId, ParseError> {
    resolve_token(token, forms).ok_or_else(|| ParseError::unresolved("BASE", token))
}

fn parse_chance(text: &str, line: &str) -> Chance {
    if !is_present(text) {
        return Chance::default();
    }
    Chance::parse(text).unwrap_or_else(|err| {
        warn!("\t\t\t\t[{line}] {err}, using default chance");
        Chance::default()
    })
}

fn parse_properties(text: &str, line: &str) -> ObjectProperties {
    let (properties, errors) = ObjectProperties::parse(text);
    for err in errors {
        warn!("\t\t\t\t[{line}] {err}, ignored");
    }
    properties
}

/// A rule replacing a base (or a specific reference) with another form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwapRule {
    /// Replacement candidates.
    pub targets: TargetSet,
    /// Overrides carried along with the swap; may be empty.
    pub properties: ObjectProperties,
    /// Gate and seeding mode.
    pub chance: Chance,
    /// Source path and raw line.
    pub origin: RuleOrigin,
}

impl SwapRule {
    /// Parses a swap line, returning the base it is keyed by.
    pub fn parse(path: &str, line: &str, forms: &dyn FormResolver) -> Result<(FormId, Self), ParseError> {
        let fields = split_fields(line)?;
        let base = resolve_base(fields[0], forms)?;
        let targets = TargetSet::parse(fields[1], forms)?;

        // Optional fields may come in either order; chance is recognised by shape.
        let mut properties_text = "";
        let mut chance_text = "";
        for extra in fields.iter().skip(2).copied() {
            if chance_text.is_empty() && Chance::looks_like(extra) {
                chance_text = extra;
            } else if properties_text.is_empty() {
                properties_text = extra;
            }
        }

        if targets == TargetSet::Single(base) && !is_present(properties_text) {
            return Err(ParseError::SelfReferentialSwap { base });
        }

        let chance = parse_chance(chance_text, line);
        let properties = parse_properties(properties_text, line).with_mode(chance.mode());

        Ok((
            base,
            Self {
                targets,
                properties,
                chance,
                origin: RuleOrigin::new(path, line),
            },
        ))
    }

    /// Rolls the chance gate and draws a target for `reference`. The target
    /// must be a form the host knows.
    pub fn resolve_target(&self, reference: &ObjectRef, forms: &dyn FormResolver) -> Option<FormId> {
        if !self.chance.passes(reference.id) {
            return None;
        }
        let target = self.targets.pick(reference.id, self.chance.mode())?;
        forms.kind_of(target).map(|_| target)
    }
}

impl RuleRecord for SwapRule {
    fn chance(&self) -> Chance {
        self.chance
    }

    fn origin(&self) -> &RuleOrigin {
        &self.origin
    }
}

/// A rule that only overrides properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyRule {
    /// Overrides to apply.
    pub properties: ObjectProperties,
    /// Gate and seeding mode.
    pub chance: Chance,
    /// Source path and raw line.
    pub origin: RuleOrigin,
}

impl PropertyRule {
    /// Parses a property line, returning the base it is keyed by.
    pub fn parse(path: &str, line: &str, forms: &dyn FormResolver) -> Result<(FormId, Self), ParseError> {
        let fields = split_fields(line)?;
        let base = resolve_base(fields[0], forms)?;
        let chance = parse_chance(fields.get(2).copied().unwrap_or_default(), line);
        let properties = parse_properties(fields[1], line).with_mode(chance.mode());

        Ok((
            base,
            Self {
                properties,
                chance,
                origin: RuleOrigin::new(path, line),
            },
        ))
    }

    /// Parses a transform line (`base|transform[|traits]`) into a property rule
    /// whose payload is only the transform.
    pub fn parse_transform(path: &str, line: &str, forms: &dyn FormResolver) -> Result<(FormId, Self), ParseError> {
        let fields = split_fields(line)?;
        let base = resolve_base(fields[0], forms)?;
        let traits = parse_chance(fields.get(2).copied().unwrap_or_default(), line);

        let (transform, errors) = Transform::parse(fields[1]);
        for err in errors {
            warn!("\t\t\t\t[{line}] {err}, axis group ignored");
        }
        if !transform.is_valid() {
            warn!("\t\t\t\t[{line}] no usable transform");
        }

        Ok((
            base,
            Self {
                properties: ObjectProperties {
                    transform,
                    record_flags: None,
                    mode: traits.mode(),
                },
                chance: traits,
                origin: RuleOrigin::new(path, line),
            },
        ))
    }

    /// True if the chance gate passes for `reference` and the payload is non-empty.
    #[must_use]
    pub fn has_valid_properties(&self, reference: FormId) -> bool {
        self.chance.passes(reference) && self.properties.is_valid()
    }
}

impl RuleRecord for PropertyRule {
    fn chance(&self) -> Chance {
        self.chance
    }

    fn origin(&self) -> &RuleOrigin {
        &self.origin
    }
}

/// Records a conditional section contributed for one base, behind one filter set.
#[derive(Debug, Clone)]
pub struct ConditionalGroup<T> {
    /// Filters of the section, shared by every group it produced.
    pub filters: Arc<ConditionFilters>,
    /// Load-order index of the section the group came from.
    pub section: usize,
    /// Records in line order.
    pub rules: Vec<T>,
}

impl<T> ConditionalGroup<T> {
    /// A group holding a single record.
    #[must_use]
    pub fn new(filters: Arc<ConditionFilters>, section: usize, rule: T) -> Self {
        Self {
            filters,
            section,
            rules: vec![rule],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::FormKind;
    use crate::host::InMemoryHost;

    const BASE: FormId = FormId::new(0x0001_2345);
    const TARGET: FormId = FormId::new(0x0005_4321);

    fn host() -> InMemoryHost {
        let host = InMemoryHost::new();
        host.add_form(BASE, FormKind::Other, Some("ChairBase"));
        host.add_form(TARGET, FormKind::Other, Some("ChairFancy"));
        host.add_form(FormId::new(0xA), FormKind::Other, Some("A"));
        host.add_form(FormId::new(0xB), FormKind::Other, Some("B"));
        host.add_form(FormId::new(0xC), FormKind::Other, Some("C"));
        host
    }

    #[test]
    fn test_parse_swap_with_chance_in_third_field() {
        let (base, rule) = SwapRule::parse("a.ini", "00012345|00054321|chance(50)", &host()).unwrap();
        assert_eq!(base, BASE);
        assert_eq!(rule.targets, TargetSet::Single(TARGET));
        assert_eq!(rule.chance.value(), 50);
        assert!(!rule.properties.is_valid());
        assert_eq!(rule.origin.payload(), "00054321|chance(50)");
    }

    #[test]
    fn test_parse_swap_with_properties_and_chance() {
        let (_, rule) = SwapRule::parse("a.ini", "ChairBase|ChairFancy|scale(2)|chance(R,10)", &host()).unwrap();
        assert!(rule.properties.is_valid());
        assert_eq!(rule.chance.value(), 10);
        assert_eq!(rule.chance.mode(), RngMode::TrueRandom);
        assert_eq!(rule.properties.mode, RngMode::TrueRandom);
    }

    #[test]
    fn test_self_reference_rejected_without_properties() {
        let err = SwapRule::parse("a.ini", "ChairBase|ChairBase", &host()).unwrap_err();
        assert_eq!(err, ParseError::SelfReferentialSwap { base: BASE });

        assert!(SwapRule::parse("a.ini", "ChairBase|ChairBase|someprop", &host()).is_ok());
    }

    #[test]
    fn test_unresolvable_fields_rejected() {
        let host = host();
        assert!(matches!(
            SwapRule::parse("a.ini", "Nope|ChairFancy", &host),
            Err(ParseError::UnresolvedIdentifier { field: "BASE", .. })
        ));
        assert!(matches!(
            SwapRule::parse("a.ini", "ChairBase|Nope", &host),
            Err(ParseError::UnresolvedIdentifier { field: "SWAP", .. })
        ));
        assert_eq!(
            SwapRule::parse("a.ini", "ChairBase|Nope,AlsoNope", &host).unwrap_err(),
            ParseError::EmptyTargetSet { field: "SWAP" }
        );
        assert_eq!(
            SwapRule::parse("a.ini", "ChairBase", &host).unwrap_err(),
            ParseError::MissingField { index: 1 }
        );
    }

    #[test]
    fn test_pool_drops_bad_members_and_picks_within() {
        let host = host();
        let (_, rule) = SwapRule::parse("a.ini", "ChairBase|A,B,C,Missing", &host).unwrap();
        assert_eq!(rule.targets.len(), 3);
        for i in 0..200u32 {
            let reference = ObjectRef::placed(FormId::new(0xFF00_0000 | i), BASE);
            let picked = rule.resolve_target(&reference, &host).unwrap();
            assert!(rule.targets.contains(picked));
            assert_eq!(rule.resolve_target(&reference, &host), Some(picked));
        }
    }

    #[test]
    fn test_unloaded_target_does_not_resolve() {
        let host = host();
        let (_, rule) = SwapRule::parse("a.ini", "ChairBase|0000BEEF", &host).unwrap();
        let reference = ObjectRef::placed(FormId::new(0x99), BASE);
        assert_eq!(rule.resolve_target(&reference, &host), None);
    }

    #[test]
    fn test_property_rule_validity() {
        let host = host();
        let (_, rule) = PropertyRule::parse("a.ini", "ChairBase|pos(0,0,10R)", &host).unwrap();
        assert!(rule.has_valid_properties(FormId::new(1)));

        let (_, empty) = PropertyRule::parse("a.ini", "ChairBase|NONE", &host).unwrap();
        assert!(!empty.has_valid_properties(FormId::new(1)));

        let (_, never) = PropertyRule::parse("a.ini", "ChairBase|scale(2)|chance(0)", &host).unwrap();
        assert!(!never.has_valid_properties(FormId::new(1)));
    }

    #[test]
    fn test_transform_rule_carries_traits() {
        let (_, rule) = PropertyRule::parse_transform("a.ini", "ChairBase|rot(0,0,0/360)|R", &host()).unwrap();
        assert!(rule.properties.transform.rotation.is_some());
        assert_eq!(rule.properties.mode, RngMode::TrueRandom);
        assert!(rule.chance.is_certain());
    }
}
