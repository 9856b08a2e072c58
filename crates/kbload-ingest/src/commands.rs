//! Subcommand entry points
//!
//! Wires configuration, the snapshot source and the load target together,
//! then hands the prepared load to [`pipeline::execute`].

use crate::config::{RelationshipLoadConfig, StrainMarkerLoadConfig};
use crate::context::{RunContext, RunToggles};
use crate::error::Result;
use crate::jobs::{RelationshipLoad, StrainMarkerLoad};
use crate::loader::LoadTarget;
use crate::pipeline::{self, RunOutcome};
use crate::report::QcReport;
use crate::snapshot::{FileSnapshotSource, SnapshotSource};
use crate::RunArgs;
use tracing::info;

/// Where reference rows come from and where new rows go.
struct Backend {
    snapshot: Box<dyn SnapshotSource>,
    target: Option<Box<dyn LoadTarget>>,
}

impl Backend {
    fn target(&self) -> Option<&dyn LoadTarget> {
        self.target.as_deref()
    }
}

#[cfg(feature = "database")]
async fn connect(args: &RunArgs) -> Result<Backend> {
    use crate::db::{create_pool, DbConfig};
    use crate::loader::PgLoadTarget;
    use crate::snapshot::PgSnapshotSource;

    if args.qc_only {
        if let Some(ref path) = args.snapshot {
            return Ok(Backend {
                snapshot: Box::new(FileSnapshotSource::from_path(path)?),
                target: None,
            });
        }
    }

    let pool = create_pool(&DbConfig::from_env()?).await?;
    let snapshot: Box<dyn SnapshotSource> = match args.snapshot {
        Some(ref path) => Box::new(FileSnapshotSource::from_path(path)?),
        None => Box::new(PgSnapshotSource::new(pool.clone())),
    };
    let target: Option<Box<dyn LoadTarget>> = if args.qc_only {
        None
    } else {
        Some(Box::new(PgLoadTarget::new(pool)))
    };
    Ok(Backend { snapshot, target })
}

#[cfg(not(feature = "database"))]
async fn connect(args: &RunArgs) -> Result<Backend> {
    use crate::error::LoadError;

    if !args.qc_only {
        return Err(LoadError::config(
            "built without the database feature; only --qc-only runs are possible",
        ));
    }
    let Some(ref path) = args.snapshot else {
        return Err(LoadError::config(
            "built without the database feature; --snapshot <FILE> is required",
        ));
    };
    Ok(Backend {
        snapshot: Box::new(FileSnapshotSource::from_path(path)?),
        target: None,
    })
}

fn toggles(args: &RunArgs, reference_strain_only: bool) -> RunToggles {
    RunToggles {
        qc_only: args.qc_only,
        min_records: args.min_records,
        reference_strain_only,
    }
}

pub async fn relationships(args: &RunArgs) -> Result<RunOutcome> {
    let config = RelationshipLoadConfig::from_env()?;
    config.validate()?;
    let backend = connect(args).await?;

    let mut ctx = RunContext::new(
        toggles(args, false),
        QcReport::relationship(config.secondary_id_policy),
        config.curation_log.clone(),
        config.output_dir.clone(),
    );
    info!(qc_only = args.qc_only, min_records = args.min_records, "Starting relationship load");

    let load = RelationshipLoad::prepare(config, backend.snapshot.as_ref(), &mut ctx).await?;
    pipeline::execute(&load, &mut ctx, backend.target()).await
}

pub async fn strain_markers(args: &RunArgs, reference_strain_only: bool) -> Result<RunOutcome> {
    let config = StrainMarkerLoadConfig::from_env()?;
    config.validate(reference_strain_only)?;
    let backend = connect(args).await?;

    let mut ctx = RunContext::new(
        toggles(args, reference_strain_only),
        QcReport::strain_marker(config.secondary_id_policy),
        config.curation_log.clone(),
        config.output_dir.clone(),
    );
    info!(
        qc_only = args.qc_only,
        min_records = args.min_records,
        reference_strain_only,
        "Starting strain marker load"
    );

    let load = StrainMarkerLoad::prepare(config, backend.snapshot.as_ref(), &mut ctx).await?;
    pipeline::execute(&load, &mut ctx, backend.target()).await
}
