//! Conflict detection for rule authors.
//!
//! A conflict is a bucket with more than one record where the newest record is
//! not randomized: it always wins, so every older record is dead. Randomized
//! winners (chance below 100) can let older records through and are not
//! reported. Conflicts are informational only and never change resolution.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::form::FormId;
use crate::rule::RuleRecord;
use crate::table::{RuleTable, RuleTables, TableKind};

/// One record taking part in a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// The line without its base field.
    pub payload: String,
    /// Source the line came from.
    pub path: String,
}

impl ConflictRecord {
    fn of<T: RuleRecord>(rule: &T) -> Self {
        Self {
            payload: rule.origin().payload().to_string(),
            path: rule.origin().path.clone(),
        }
    }
}

/// A shadowed bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    /// Table the bucket belongs to.
    pub table: TableKind,
    /// Key of the bucket.
    pub base: FormId,
    /// The base as written in the winning line.
    pub base_text: String,
    /// Newest record, the one that always wins.
    pub winner: ConflictRecord,
    /// Shadowed records, newest first.
    pub losers: Vec<ConflictRecord>,
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "\t{}", self.base_text)?;
        writeln!(f, "\t\twinning record : {} ({})", self.winner.payload, self.winner.path)?;
        writeln!(f, "\t\t{} conflicts", self.losers.len())?;
        for loser in &self.losers {
            writeln!(f, "\t\t\t{} ({})", loser.payload, loser.path)?;
        }
        Ok(())
    }
}

/// Finds every conflict in one table, ordered by base id.
pub fn detect<T: RuleRecord>(table: TableKind, rules: &RuleTable<T>) -> Vec<Conflict> {
    let mut conflicts: Vec<Conflict> = rules
        .iter()
        .filter(|(_, records)| records.len() > 1)
        .filter_map(|(base, records)| {
            let (winner, older) = records.split_last()?;
            if !winner.chance().is_certain() {
                return None;
            }
            Some(Conflict {
                table,
                base: *base,
                base_text: winner.origin().base_text().to_string(),
                winner: ConflictRecord::of(winner),
                losers: older.iter().rev().map(ConflictRecord::of).collect(),
            })
        })
        .collect();
    conflicts.sort_by_key(|c| c.base);
    conflicts
}

/// All conflicts found after a load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConflictReport {
    /// Conflicts ordered by table, then base.
    pub conflicts: Vec<Conflict>,
}

impl ConflictReport {
    /// Scans the unconditional tables.
    #[must_use]
    pub fn from_tables(tables: &RuleTables) -> Self {
        let mut conflicts = detect(TableKind::Forms, &tables.swap_forms);
        conflicts.extend(detect(TableKind::References, &tables.swap_refs));
        conflicts.extend(detect(TableKind::Properties, &tables.ref_properties));
        Self { conflicts }
    }

    /// True when nothing is shadowed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Conflicts found in one table.
    pub fn for_table(&self, table: TableKind) -> impl Iterator<Item = &Conflict> {
        self.conflicts.iter().filter(move |c| c.table == table)
    }

    /// Emits the report through `tracing`, one block per non-empty table.
    pub fn log(&self, tables: &RuleTables) {
        for table in [TableKind::Forms, TableKind::References, TableKind::Properties] {
            if tables.len(table) == 0 {
                continue;
            }
            info!("[{table}]");
            let mut any = false;
            for conflict in self.for_table(table) {
                any = true;
                warn!("{}", conflict.to_string().trim_end());
            }
            if !any {
                info!("\tNo conflicts found");
            }
        }
    }
}

impl fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.conflicts.is_empty() {
            return writeln!(f, "No conflicts found");
        }
        let mut current = None;
        for conflict in &self.conflicts {
            if current != Some(conflict.table) {
                writeln!(f, "[{}]", conflict.table)?;
                current = Some(conflict.table);
            }
            write!(f, "{conflict}")?;
        }
        Ok(())
    }
}
