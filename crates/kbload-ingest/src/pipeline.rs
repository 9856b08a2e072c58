//! Run orchestration
//!
//! A [`StagedLoad`] has already parsed, resolved and classified everything in
//! memory. [`execute`] takes it the rest of the way in a fixed order: report,
//! abort on fatal grouping failures, stop for QC-only runs, delete the prior
//! load, write the BCP files, close them together, then bulk load.

use crate::context::RunContext;
use crate::error::{LoadError, Result};
use crate::loader::{DeleteScope, LoadTarget};
use crate::output::OutputSet;
use crate::report::append_to_log;
use std::path::PathBuf;
use tracing::{info, warn};

/// A finished output file and the table it loads into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkFile {
    pub table: &'static str,
    pub path: PathBuf,
}

impl BulkFile {
    pub fn new(table: &'static str, path: impl Into<PathBuf>) -> Self {
        Self {
            table,
            path: path.into(),
        }
    }
}

/// One load whose outcome is fully decided before anything is written.
pub trait StagedLoad {
    fn name(&self) -> &'static str;

    /// Grouping keys that did not resolve. Any entry aborts the run once the
    /// report has been written.
    fn unresolved_groupings(&self) -> Vec<String> {
        Vec::new()
    }

    /// Rows of the previous run to remove before reloading.
    fn delete_scope(&self) -> DeleteScope;

    /// Plural noun used in the curation log's deletion line.
    fn deleted_noun(&self) -> &'static str;

    /// Serialize every accepted record, assigning keys as rows are written.
    /// Returns the files to bulk load, in load order. Hand-off files that are
    /// not loaded here are opened on `outputs` but not returned.
    fn write_outputs(&self, ctx: &mut RunContext, outputs: &mut OutputSet) -> Result<Vec<BulkFile>>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Report written; database and output files untouched
    QcOnly,
    Loaded { deleted: u64, tables: Vec<(String, u64)> },
}

pub async fn execute(
    load: &dyn StagedLoad,
    ctx: &mut RunContext,
    target: Option<&dyn LoadTarget>,
) -> Result<RunOutcome> {
    ctx.report.append_to(&ctx.curation_log)?;
    info!(load = load.name(), log = %ctx.curation_log.display(), "Curation report written");

    let unresolved = load.unresolved_groupings();
    if !unresolved.is_empty() {
        return Err(LoadError::UnresolvedGrouping(unresolved));
    }

    if ctx.toggles.qc_only {
        info!(load = load.name(), "QC-only run, stopping after report");
        return Ok(RunOutcome::QcOnly);
    }

    let Some(target) = target else {
        return Err(LoadError::config(
            "a full load needs a database connection; rerun with --qc-only or build with the database feature",
        ));
    };

    let scope = load.delete_scope();
    let deleted = target.delete_prior(&scope).await?;
    append_to_log(
        &ctx.curation_log,
        &format!("\nDeleting {} {}\n\n", deleted, load.deleted_noun()),
    )?;

    let mut outputs = OutputSet::new();
    let written = load.write_outputs(ctx, &mut outputs);
    let closed = outputs.close_all();
    let bulk_files = written?;
    let closed = closed?;
    info!(load = load.name(), files = closed.len(), "Output files closed");

    let mut tables = Vec::with_capacity(bulk_files.len());
    for file in &bulk_files {
        let rows = target.bulk_load(file.table, &file.path).await?;
        tables.push((file.table.to_string(), rows));
    }

    if tables.is_empty() {
        warn!(load = load.name(), "Nothing was bulk loaded");
    }
    Ok(RunOutcome::Loaded { deleted, tables })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::SecondaryIdPolicy;
    use crate::context::RunToggles;
    use crate::output::{AccessionReferenceRow, AuditStamp};
    use crate::report::{BucketKind, QcReport};
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl LoadTarget for Recorder {
        async fn delete_prior(&self, scope: &DeleteScope) -> Result<u64> {
            self.calls.lock().unwrap().push(format!("delete {scope}"));
            Ok(4)
        }

        async fn bulk_load(&self, table: &str, file: &Path) -> Result<u64> {
            let rows = std::fs::read_to_string(file).unwrap().lines().count() as u64;
            self.calls.lock().unwrap().push(format!("load {table}"));
            Ok(rows)
        }
    }

    struct OneRow {
        unresolved: Vec<String>,
    }

    impl StagedLoad for OneRow {
        fn name(&self) -> &'static str {
            "test"
        }

        fn unresolved_groupings(&self) -> Vec<String> {
            self.unresolved.clone()
        }

        fn delete_scope(&self) -> DeleteScope {
            DeleteScope::CreatedBy {
                table: "ACC_AccessionReference",
                user_key: 9,
            }
        }

        fn deleted_noun(&self) -> &'static str {
            "References"
        }

        fn write_outputs(&self, ctx: &mut RunContext, outputs: &mut OutputSet) -> Result<Vec<BulkFile>> {
            let path = ctx.output_dir.join("ref.bcp");
            let idx = outputs.open(&path)?;
            let audit = AuditStamp::new(9, ctx.load_date.clone());
            outputs.writer(idx)?.write_row(&AccessionReferenceRow {
                accession_key: 1,
                refs_key: 2,
                audit: &audit,
            })?;
            Ok(vec![BulkFile::new("ACC_AccessionReference", path)])
        }
    }

    fn context(dir: &Path, qc_only: bool) -> RunContext {
        let mut report = QcReport::strain_marker(SecondaryIdPolicy::Load);
        report.log(BucketKind::StrandMissing, "line 3");
        RunContext::with_load_date(
            RunToggles {
                qc_only,
                ..Default::default()
            },
            report,
            dir.join("curator.log"),
            dir.to_path_buf(),
            "10/19/2026",
        )
    }

    #[tokio::test]
    async fn test_full_run_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path(), false);
        let target = Recorder::default();
        let load = OneRow { unresolved: vec![] };

        let outcome = execute(&load, &mut ctx, Some(&target)).await.unwrap();
        assert_eq!(
            outcome,
            RunOutcome::Loaded {
                deleted: 4,
                tables: vec![("ACC_AccessionReference".to_string(), 1)],
            }
        );

        let calls = target.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        assert!(calls[0].starts_with("delete"));
        assert_eq!(calls[1], "load ACC_AccessionReference");

        let log = std::fs::read_to_string(dir.path().join("curator.log")).unwrap();
        assert!(log.contains("line 3"));
        assert!(log.ends_with("\nDeleting 4 References\n\n"));
    }

    #[tokio::test]
    async fn test_qc_only_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path(), true);
        let target = Recorder::default();
        let load = OneRow { unresolved: vec![] };

        let outcome = execute(&load, &mut ctx, Some(&target)).await.unwrap();
        assert_eq!(outcome, RunOutcome::QcOnly);
        assert!(target.calls.lock().unwrap().is_empty());
        assert!(!dir.path().join("ref.bcp").exists());
        assert!(dir.path().join("curator.log").exists());
    }

    #[tokio::test]
    async fn test_unresolved_grouping_aborts_after_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path(), false);
        let target = Recorder::default();
        let load = OneRow {
            unresolved: vec!["CAST/EiJ".to_string()],
        };

        let err = execute(&load, &mut ctx, Some(&target)).await.unwrap_err();
        assert!(matches!(err, LoadError::UnresolvedGrouping(_)));
        assert_eq!(err.exit_code(), 1);
        assert!(target.calls.lock().unwrap().is_empty());
        assert!(dir.path().join("curator.log").exists());
        assert!(!dir.path().join("ref.bcp").exists());
    }

    #[tokio::test]
    async fn test_full_run_without_target_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = context(dir.path(), false);
        let load = OneRow { unresolved: vec![] };

        let err = execute(&load, &mut ctx, None).await.unwrap_err();
        assert!(matches!(err, LoadError::Config(_)));
    }
}
