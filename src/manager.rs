//! The resolution manager.
//!
//! Owns the five rule tables, loads them once on first use, and answers "what
//! replaces this object, and which overrides apply". Loading is guarded by a
//! `OnceLock`, so concurrent first callers block until the tables are ready
//! and every later query reads them without locking.
//!
//! Swap resolution tries, in order:
//! 1. reference-keyed swaps (persistent references only),
//! 2. conditional template swaps,
//! 3. template swaps.
//!
//! Property resolution runs the same three tiers independently, falling
//! through any tier that yields no valid payload.

use std::cell::OnceCell;
use std::collections::HashSet;
use std::sync::{Arc, OnceLock, PoisonError, RwLock};

use tracing::{debug, error, info, warn};

use crate::config::ManagerConfig;
use crate::conflict::ConflictReport;
use crate::error::ParseError;
use crate::filter::{ConditionFilters, WorldContext};
use crate::form::{FormId, FormKind};
use crate::host::{FormResolver, LeveledListEvaluator, ObjectRef, WorldContextProvider};
use crate::properties::ObjectProperties;
use crate::rule::{PropertyRule, RuleKind, SwapRule};
use crate::source::{ConfigSource, Section};
use crate::table::{bucket, find_newest, push_conditional, RuleTable, RuleTables, TableKind};

/// Outcome of a resolution query.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Resolution {
    /// Replacement base, if any rule swaps the object.
    pub swap: Option<FormId>,
    /// Overrides to apply, if any tier produced a valid payload.
    pub properties: Option<ObjectProperties>,
}

impl Resolution {
    /// True when nothing overrides the object.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.swap.is_none() && self.properties.is_none()
    }

    /// Applies the resolved overrides to `reference`, if any.
    pub fn apply_properties(&self, reference: &mut ObjectRef) {
        if let Some(properties) = &self.properties {
            properties.apply(reference);
        }
    }
}

#[derive(Debug, Default)]
struct Loaded {
    tables: RuleTables,
    conflicts: ConflictReport,
}

fn has_properties(properties: Option<&ObjectProperties>) -> bool {
    properties.is_some_and(ObjectProperties::is_valid)
}

/// Process-wide swap rule service.
pub struct Manager {
    config: ManagerConfig,
    source: Arc<dyn ConfigSource>,
    forms: Arc<dyn FormResolver>,
    world: Arc<dyn WorldContextProvider>,
    leveled: Arc<dyn LeveledListEvaluator>,
    loaded: OnceLock<Loaded>,
    leveled_resolved: RwLock<HashSet<FormId>>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.config)
            .field("loaded", &self.loaded.get().is_some())
            .finish_non_exhaustive()
    }
}

impl Manager {
    /// Creates a manager over the given collaborators. Nothing is loaded yet.
    pub fn new(
        config: ManagerConfig,
        source: Arc<dyn ConfigSource>,
        forms: Arc<dyn FormResolver>,
        world: Arc<dyn WorldContextProvider>,
        leveled: Arc<dyn LeveledListEvaluator>,
    ) -> Self {
        Self {
            config,
            source,
            forms,
            world,
            leveled,
            loaded: OnceLock::new(),
            leveled_resolved: RwLock::new(HashSet::new()),
        }
    }

    /// Creates a manager whose host implements every collaborator trait.
    pub fn with_host<H>(config: ManagerConfig, source: Arc<dyn ConfigSource>, host: Arc<H>) -> Self
    where
        H: FormResolver + WorldContextProvider + LeveledListEvaluator + 'static,
    {
        Self::new(config, source, host.clone(), host.clone(), host)
    }

    /// Loads every source once. Later calls are no-ops.
    pub fn load_once(&self) {
        self.loaded();
    }

    /// True once the tables have been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded.get().is_some()
    }

    /// The loaded tables (loading them first if needed).
    pub fn tables(&self) -> &RuleTables {
        &self.loaded().tables
    }

    /// True if load found shadowed rules.
    pub fn has_conflicts(&self) -> bool {
        !self.loaded().conflicts.is_empty()
    }

    /// The conflicts found at load.
    pub fn conflict_report(&self) -> &ConflictReport {
        &self.loaded().conflicts
    }

    /// Records that a reference's leveled replacement has been expanded.
    /// Returns false if it was already recorded.
    pub fn mark_leveled_resolved(&self, reference: &ObjectRef) -> bool {
        self.leveled_resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(reference.id)
    }

    fn unmark_leveled_resolved(&self, reference: &ObjectRef) {
        self.leveled_resolved
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&reference.id);
    }

    /// True if a reference's leveled replacement was already expanded.
    pub fn is_leveled_resolved(&self, reference: &ObjectRef) -> bool {
        self.leveled_resolved
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&reference.id)
    }

    fn loaded(&self) -> &Loaded {
        self.loaded.get_or_init(|| self.load())
    }

    fn load(&self) -> Loaded {
        info!("{:*^30}", "INI");

        let paths = self.source.discover();
        if paths.is_empty() {
            warn!(
                "No .{} files with {} suffix were found, aborting...",
                self.config.extension, self.config.suffix
            );
            return Loaded::default();
        }
        info!("{} matching inis found...", paths.len());

        let mut tables = RuleTables::default();
        let mut section_index = 0usize;
        for path in &paths {
            info!("INI : {path}");
            let sections = match self.source.read(path) {
                Ok(sections) => sections,
                Err(err) => {
                    error!("\tcouldn't read INI: {err}");
                    continue;
                }
            };
            for section in &sections {
                section_index += 1;
                self.load_section(&mut tables, path, section, section_index);
            }
        }

        info!("{:*^30}", "RESULT");
        info!("{} form-form swaps", tables.len(TableKind::Forms));
        info!("{} conditional form swaps", tables.len(TableKind::ConditionalForms));
        info!("{} ref-form swaps", tables.len(TableKind::References));
        info!("{} ref property overrides", tables.len(TableKind::Properties));
        info!(
            "{} conditional ref property overrides",
            tables.len(TableKind::ConditionalProperties)
        );

        let conflicts = ConflictReport::from_tables(&tables);
        if self.config.report_conflicts {
            info!("{:*^30}", "CONFLICTS");
            conflicts.log(&tables);
        }
        info!("{:*^30}", "END");

        Loaded { tables, conflicts }
    }

    fn load_section(&self, tables: &mut RuleTables, path: &str, section: &Section, index: usize) {
        if section.keys.is_empty() {
            return;
        }
        let forms = self.forms.as_ref();
        let header = section.header();

        if let Some(conditions) = header.conditions {
            info!("\treading [{}] : {} conditions", header.category, conditions.len());
            let filters = Arc::new(ConditionFilters::parse(&conditions, forms));

            if header.category.eq_ignore_ascii_case("Forms") {
                info!("\t\t\t{} form swaps found", section.keys.len());
                let table = &mut tables.swap_forms_conditional;
                parse_lines(path, &section.keys, forms, RuleKind::Swap, SwapRule::parse, |base, rule| {
                    push_conditional(table, base, &filters, index, rule);
                });
            } else {
                info!("\t\t\t{} ref property overrides found", section.keys.len());
                let table = &mut tables.ref_properties_conditional;
                parse_lines(path, &section.keys, forms, RuleKind::Property, PropertyRule::parse, |base, rule| {
                    push_conditional(table, base, &filters, index, rule);
                });
            }
            return;
        }

        info!("\treading [{}]", header.category);
        let category = header.category;
        if category.eq_ignore_ascii_case("Transforms") {
            info!("\t\t\t{} ref transform overrides found", section.keys.len());
            let table = &mut tables.ref_properties;
            parse_lines(path, &section.keys, forms, RuleKind::Transform, PropertyRule::parse_transform, |base, rule| {
                push(table, base, rule);
            });
        } else if category.eq_ignore_ascii_case("Properties") {
            info!("\t\t\t{} ref property overrides found", section.keys.len());
            let table = &mut tables.ref_properties;
            parse_lines(path, &section.keys, forms, RuleKind::Property, PropertyRule::parse, |base, rule| {
                push(table, base, rule);
            });
        } else {
            info!("\t\t\t{} swaps found", section.keys.len());
            let table = if category.eq_ignore_ascii_case("Forms") {
                &mut tables.swap_forms
            } else {
                &mut tables.swap_refs
            };
            parse_lines(path, &section.keys, forms, RuleKind::Swap, SwapRule::parse, |base, rule| {
                push(table, base, rule);
            });
        }
    }

    /// Resolves the replacement base and property overrides for `reference`.
    ///
    /// `material_swap` is a secondary lookup key, used by every template-keyed
    /// table when the primary key has no bucket.
    pub fn resolve(&self, reference: &ObjectRef, base: FormId, material_swap: Option<FormId>) -> Resolution {
        let tables = self.tables();
        let context = OnceCell::new();

        let mut swapped = None;
        if !reference.created {
            swapped = self.swap_from(&tables.swap_refs, reference, reference.id, material_swap);
        }
        if swapped.is_none() {
            swapped = self.conditional_swap(tables, reference, base, material_swap, &context);
        }
        if swapped.is_none() {
            swapped = self.swap_from(&tables.swap_forms, reference, base, material_swap);
        }

        let (mut swap, mut properties) = match swapped {
            Some((target, properties)) => (Some(target), Some(properties)),
            None => (None, None),
        };

        if let Some(target) = swap {
            swap = self.expand_leveled(reference, target);
        }

        if !has_properties(properties.as_ref()) && !reference.created {
            properties = Self::properties_from(&tables.ref_properties, reference, reference.id, material_swap);
        }
        if !has_properties(properties.as_ref()) {
            properties = self.conditional_properties(tables, reference, base, material_swap, &context);
        }
        if !has_properties(properties.as_ref()) {
            properties = Self::properties_from(&tables.ref_properties, reference, base, material_swap);
        }

        Resolution {
            swap,
            properties: properties.filter(ObjectProperties::is_valid),
        }
    }

    /// Conditional swap lookup on its own.
    pub fn swap_form_conditional(
        &self,
        reference: &ObjectRef,
        base: FormId,
        material_swap: Option<FormId>,
    ) -> Option<(FormId, ObjectProperties)> {
        self.conditional_swap(self.tables(), reference, base, material_swap, &OnceCell::new())
    }

    /// Conditional property lookup on its own.
    pub fn object_properties_conditional(
        &self,
        reference: &ObjectRef,
        base: FormId,
        material_swap: Option<FormId>,
    ) -> Option<ObjectProperties> {
        self.conditional_properties(self.tables(), reference, base, material_swap, &OnceCell::new())
    }

    fn context<'c>(&self, cell: &'c OnceCell<WorldContext>, reference: &ObjectRef, base: FormId) -> &'c WorldContext {
        cell.get_or_init(|| self.world.snapshot(reference, base))
    }

    fn swap_from(
        &self,
        table: &RuleTable<SwapRule>,
        reference: &ObjectRef,
        key: FormId,
        material_swap: Option<FormId>,
    ) -> Option<(FormId, ObjectProperties)> {
        let rules = bucket(table, key, material_swap)?;
        find_newest(rules, |rule| {
            rule.resolve_target(reference, self.forms.as_ref())
                .map(|target| (target, rule.properties))
        })
    }

    fn conditional_swap(
        &self,
        tables: &RuleTables,
        reference: &ObjectRef,
        base: FormId,
        material_swap: Option<FormId>,
        context: &OnceCell<WorldContext>,
    ) -> Option<(FormId, ObjectProperties)> {
        let groups = bucket(&tables.swap_forms_conditional, base, material_swap)?;
        let context = self.context(context, reference, base);
        let group = find_newest(groups, |group| group.filters.evaluate(context).then_some(group))?;
        find_newest(&group.rules, |rule| {
            rule.resolve_target(reference, self.forms.as_ref())
                .map(|target| (target, rule.properties))
        })
    }

    fn properties_from(
        table: &RuleTable<PropertyRule>,
        reference: &ObjectRef,
        key: FormId,
        material_swap: Option<FormId>,
    ) -> Option<ObjectProperties> {
        let rules = bucket(table, key, material_swap)?;
        find_newest(rules, |rule| rule.has_valid_properties(reference.id).then_some(rule.properties))
    }

    fn conditional_properties(
        &self,
        tables: &RuleTables,
        reference: &ObjectRef,
        base: FormId,
        material_swap: Option<FormId>,
        context: &OnceCell<WorldContext>,
    ) -> Option<ObjectProperties> {
        let groups = bucket(&tables.ref_properties_conditional, base, material_swap)?;
        let context = self.context(context, reference, base);
        let group = find_newest(groups, |group| group.filters.evaluate(context).then_some(group))?;
        find_newest(&group.rules, |rule| rule.has_valid_properties(reference.id).then_some(rule.properties))
    }

    /// Expands a leveled replacement into a concrete form, once per reference.
    fn expand_leveled(&self, reference: &ObjectRef, target: FormId) -> Option<FormId> {
        if self.forms.kind_of(target) != Some(FormKind::LeveledItem) {
            return Some(target);
        }
        // Claim the reference before evaluating so concurrent queries expand it once.
        if !self.mark_leveled_resolved(reference) {
            debug!("[{}] leveled swap already expanded", reference.id);
            return None;
        }
        let concrete = self.leveled.evaluate(target, reference);
        if concrete.is_none() {
            debug!("[{}] leveled list {target} produced nothing", reference.id);
            self.unmark_leveled_resolved(reference);
            return Some(target);
        }
        concrete
    }
}

fn push<T>(table: &mut RuleTable<T>, base: FormId, rule: T) {
    table.entry(base).or_default().push(rule);
}

fn parse_lines<T>(
    path: &str,
    keys: &[String],
    forms: &dyn FormResolver,
    kind: RuleKind,
    parse: impl Fn(&str, &str, &dyn FormResolver) -> Result<(FormId, T), ParseError>,
    mut insert: impl FnMut(FormId, T),
) {
    for line in keys {
        match parse(path, line, forms) {
            Ok((base, rule)) => insert(base, rule),
            Err(err) => error!("\t\t\t\tfail : [{line}] ({kind} rule: {err})"),
        }
    }
}
