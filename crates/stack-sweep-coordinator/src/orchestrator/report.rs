//! Run summaries
//!
//! Aggregates per-resource outcomes into counts per domain, keeps every
//! resource with its outcome (deletions in their own list, labeled by how
//! they were confirmed), and renders the result as tables or JSON.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use serde::Serialize;
use stack_sweep_common::{
    Deletion, Domain, OutcomeKind, ResourceDescriptor, ResourceKind, RunOutcome,
};
use strum::IntoEnumIterator;
use tracing::info;

/// One resource and how it ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutcomeRecord {
    pub kind: ResourceKind,
    pub domain: Domain,
    pub name: String,
    pub id: String,
    #[serde(flatten)]
    pub outcome: RunOutcome,
}

/// A domain that could not be enumerated
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedDomain {
    pub domain: Domain,
    pub reason: String,
}

/// Aggregated result of one run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    dry_run: bool,
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    counts: BTreeMap<Domain, BTreeMap<OutcomeKind, usize>>,
    deleted: Vec<OutcomeRecord>,
    outcomes: Vec<OutcomeRecord>,
    skipped_domains: Vec<SkippedDomain>,
    warnings: Vec<String>,
}

/// Build a summary from finished outcomes
pub fn summarize<I>(outcomes: I, dry_run: bool) -> RunSummary
where
    I: IntoIterator<Item = (ResourceDescriptor, RunOutcome)>,
{
    let mut summary = RunSummary::new(dry_run);
    for (descriptor, outcome) in outcomes {
        summary.record(&descriptor, outcome);
    }
    summary.finish();
    summary
}

impl RunSummary {
    pub fn new(dry_run: bool) -> Self {
        Self {
            dry_run,
            started_at: Utc::now(),
            finished_at: None,
            counts: BTreeMap::new(),
            deleted: Vec::new(),
            outcomes: Vec::new(),
            skipped_domains: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn record(&mut self, descriptor: &ResourceDescriptor, outcome: RunOutcome) {
        *self
            .counts
            .entry(descriptor.domain())
            .or_default()
            .entry(outcome.kind())
            .or_default() += 1;

        let deleted = outcome.is_deleted();
        let record = OutcomeRecord {
            kind: descriptor.kind(),
            domain: descriptor.domain(),
            name: descriptor.name().to_string(),
            id: descriptor.id().to_string(),
            outcome,
        };
        if deleted {
            self.deleted.push(record);
        } else {
            self.outcomes.push(record);
        }
    }

    pub fn skip_domain(&mut self, domain: Domain, reason: impl Into<String>) {
        self.skipped_domains.push(SkippedDomain {
            domain,
            reason: reason.into(),
        });
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Number of resources in `domain` that ended as `kind`
    pub fn count(&self, domain: Domain, kind: OutcomeKind) -> usize {
        self.counts
            .get(&domain)
            .and_then(|by_kind| by_kind.get(&kind))
            .copied()
            .unwrap_or(0)
    }

    /// Number of resources across all domains that ended as `kind`
    pub fn total(&self, kind: OutcomeKind) -> usize {
        self.counts
            .values()
            .filter_map(|by_kind| by_kind.get(&kind))
            .sum()
    }

    /// Number of resources seen by the run
    pub fn resource_count(&self) -> usize {
        self.counts.values().flat_map(|by_kind| by_kind.values()).sum()
    }

    /// Every deleted resource with its [`Deletion`] label, in the order they
    /// were recorded
    pub fn deleted(&self) -> &[OutcomeRecord] {
        &self.deleted
    }

    /// Number of deleted resources confirmed as `how`
    pub fn deletions(&self, how: Deletion) -> usize {
        self.deleted
            .iter()
            .filter(|r| r.outcome == RunOutcome::Deleted(how))
            .count()
    }

    /// Every outcome that is not a deletion, in the order they were recorded
    pub fn outcomes(&self) -> &[OutcomeRecord] {
        &self.outcomes
    }

    /// Outcomes that indicate something went wrong
    pub fn failures(&self) -> impl Iterator<Item = &OutcomeRecord> {
        self.outcomes.iter().filter(|r| r.outcome.is_failure())
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn skipped_domains(&self) -> &[SkippedDomain] {
        &self.skipped_domains
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Per-domain outcome counts as a table
    pub fn counts_table(&self) -> Table {
        let kinds: Vec<OutcomeKind> = OutcomeKind::iter()
            .filter(|kind| self.total(*kind) > 0 || *kind == OutcomeKind::Deleted)
            .collect();

        let mut header = vec![Cell::new("Domain")];
        header.extend(kinds.iter().map(|kind| Cell::new(kind.as_ref())));

        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(header);

        for domain in Domain::ALL {
            let skipped = self.skipped_domains.iter().any(|s| s.domain == domain);
            if !skipped && !self.counts.contains_key(&domain) {
                continue;
            }
            let mut row = vec![Cell::new(domain)];
            row.extend(kinds.iter().map(|kind| {
                if skipped {
                    Cell::new("-")
                } else {
                    let count = self.count(domain, *kind);
                    let cell = Cell::new(count);
                    if count > 0 && kind.is_failure() {
                        cell.fg(Color::Red)
                    } else {
                        cell
                    }
                }
            }));
            table.add_row(row);
        }

        table
    }

    /// Deleted resources, one row each
    pub fn deleted_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Kind"),
                Cell::new("Name"),
                Cell::new("ID"),
                Cell::new("Deletion"),
            ]);

        for record in &self.deleted {
            let how = match &record.outcome {
                RunOutcome::Deleted(how) => how.as_ref(),
                _ => "",
            };
            table.add_row(vec![
                Cell::new(record.kind.label()),
                Cell::new(&record.name),
                Cell::new(&record.id),
                Cell::new(how),
            ]);
        }

        table
    }

    /// Failures and cancellations, one row per resource
    pub fn details_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL_CONDENSED)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                Cell::new("Kind"),
                Cell::new("Name"),
                Cell::new("ID"),
                Cell::new("Outcome"),
                Cell::new("Reason"),
            ]);

        for record in self
            .outcomes
            .iter()
            .filter(|r| r.outcome.kind() != OutcomeKind::SkippedNoMatch)
        {
            table.add_row(vec![
                Cell::new(record.kind.label()),
                Cell::new(&record.name),
                Cell::new(&record.id),
                Cell::new(record.outcome.kind()),
                Cell::new(record.outcome.reason().unwrap_or("")),
            ]);
        }

        table
    }

    /// Print the summary tables to stdout
    pub fn print(&self) {
        let mode = if self.dry_run { " (dry run)" } else { "" };
        println!("\n=== Cleanup Report{mode} ===\n");

        if self.resource_count() == 0 && self.skipped_domains.is_empty() {
            println!("There are no resources to delete.");
        } else {
            println!("{}", self.counts_table());
        }

        if !self.deleted.is_empty() {
            println!("\n{}", self.deleted_table());
        }

        let listed = self
            .outcomes
            .iter()
            .filter(|r| r.outcome.kind() != OutcomeKind::SkippedNoMatch)
            .count();
        if listed > 0 {
            println!("\n{}", self.details_table());
        }

        for skipped in &self.skipped_domains {
            println!("Skipped {}: {}", skipped.domain, skipped.reason);
        }
        for warning in &self.warnings {
            println!("Warning: {warning}");
        }

        let not_matched = self.total(OutcomeKind::SkippedNoMatch);
        if not_matched > 0 {
            println!("\n{not_matched} resource(s) did not match the filter");
        }
        if self.dry_run {
            println!("\nDry run: nothing was deleted.");
        }
    }

    /// Write the summary as pretty-printed JSON
    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run summary")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run summary to {}", path.display()))?;
        info!(path = %path.display(), "Run summary written");
        Ok(())
    }
}
