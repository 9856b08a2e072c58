//! Per-run state
//!
//! One [`RunContext`] is built at startup and handed to every stage. It
//! owns the report, the surrogate key counters and the run date; nothing in
//! the pipeline keeps module-level state.

use crate::error::{LoadError, Result};
use crate::output::{AuditStamp, KeyCounter};
use crate::parser::SanityCheck;
use crate::report::QcReport;
use crate::snapshot::KeyedTable;
use indexmap::IndexMap;
use std::path::PathBuf;

/// Date format of the audit columns.
pub const LOAD_DATE_FORMAT: &str = "%m/%d/%Y";

/// The three external run toggles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunToggles {
    /// Stop after the report; touch neither the database nor output files
    pub qc_only: bool,
    /// Minimum record count for every input file
    pub min_records: usize,
    /// Strain marker load only: process just the reference strain
    pub reference_strain_only: bool,
}

pub struct RunContext {
    pub toggles: RunToggles,
    pub load_date: String,
    pub report: QcReport,
    pub curation_log: PathBuf,
    pub output_dir: PathBuf,
    counters: IndexMap<&'static str, KeyCounter>,
}

impl RunContext {
    /// Stamps the load date once, from the local clock.
    pub fn new(toggles: RunToggles, report: QcReport, curation_log: PathBuf, output_dir: PathBuf) -> Self {
        let load_date = chrono::Local::now().format(LOAD_DATE_FORMAT).to_string();
        Self::with_load_date(toggles, report, curation_log, output_dir, load_date)
    }

    pub fn with_load_date(
        toggles: RunToggles,
        report: QcReport,
        curation_log: PathBuf,
        output_dir: PathBuf,
        load_date: impl Into<String>,
    ) -> Self {
        Self {
            toggles,
            load_date: load_date.into(),
            report,
            curation_log,
            output_dir,
            counters: IndexMap::new(),
        }
    }

    pub fn sanity_check(&self) -> SanityCheck {
        SanityCheck::new(self.toggles.min_records)
    }

    pub fn audit(&self, user_key: i64) -> AuditStamp {
        AuditStamp::new(user_key, self.load_date.clone())
    }

    /// Start a key sequence for `table`. Re-registering keeps the existing counter.
    pub fn register_counter(&mut self, table: KeyedTable, first_key: i64) {
        self.counters
            .entry(table.table)
            .or_insert_with(|| KeyCounter::starting_at(first_key));
    }

    pub fn next_key(&mut self, table: KeyedTable) -> Result<i64> {
        self.counters
            .get_mut(table.table)
            .map(KeyCounter::next_key)
            .ok_or_else(|| LoadError::config(format!("no key counter registered for {}", table.table)))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::SecondaryIdPolicy;
    use crate::snapshot::{ACCESSION_TABLE, STRAIN_MARKER_TABLE};

    fn context() -> RunContext {
        RunContext::with_load_date(
            RunToggles::default(),
            QcReport::strain_marker(SecondaryIdPolicy::Load),
            PathBuf::from("curator.log"),
            PathBuf::from("."),
            "10/19/2026",
        )
    }

    #[test]
    fn test_counters_are_independent() {
        let mut ctx = context();
        ctx.register_counter(STRAIN_MARKER_TABLE, 1000);
        ctx.register_counter(ACCESSION_TABLE, 5000);
        assert_eq!(ctx.next_key(STRAIN_MARKER_TABLE).unwrap(), 1000);
        assert_eq!(ctx.next_key(ACCESSION_TABLE).unwrap(), 5000);
        assert_eq!(ctx.next_key(STRAIN_MARKER_TABLE).unwrap(), 1001);

        ctx.register_counter(STRAIN_MARKER_TABLE, 1);
        assert_eq!(ctx.next_key(STRAIN_MARKER_TABLE).unwrap(), 1002);
    }

    #[test]
    fn test_unregistered_counter_is_an_error() {
        let mut ctx = context();
        assert!(ctx.next_key(ACCESSION_TABLE).is_err());
    }

    #[test]
    fn test_load_date_format() {
        let ctx = RunContext::new(
            RunToggles::default(),
            QcReport::strain_marker(SecondaryIdPolicy::Load),
            PathBuf::from("curator.log"),
            PathBuf::from("."),
        );
        let parts: Vec<&str> = ctx.load_date.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[2].len(), 4);
        assert_eq!(ctx.audit(1600).date, ctx.load_date);
    }
}
