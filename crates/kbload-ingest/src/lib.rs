//! kbload Ingest Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Batch curation loads for the mouse knowledge base.
//!
//! # Overview
//!
//! Each load parses its input files, resolves identifiers against a
//! read-only snapshot of the reference tables, classifies every record into
//! an outcome bucket, appends a curation report to the curator log and, unless
//! the run is QC-only, replaces the previous load's rows through bulk copy.
//!
//! - **Relationships** (`kbload relationships`): MP phenotype terms linked to
//!   EMAPA anatomy terms through UBERON cross-references
//! - **Strain markers** (`kbload strain-markers`): MGP strain gene models and
//!   the MGI C57BL/6J reference strain genes

pub mod classify;
pub mod commands;
pub mod config;
pub mod context;
#[cfg(feature = "database")]
pub mod db;
pub mod error;
pub mod jobs;
pub mod loader;
pub mod output;
pub mod parser;
pub mod pipeline;
pub mod report;
pub mod resolve;
pub mod snapshot;

// Re-export commonly used types
pub use context::{RunContext, RunToggles};
pub use error::{LoadError, Result};
pub use pipeline::{execute, RunOutcome, StagedLoad};

use clap::builder::FalseyValueParser;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// kbload - knowledge base curation loads
#[derive(Parser, Debug)]
#[command(name = "kbload")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load MP to EMAPA relationships through UBERON
    Relationships {
        #[command(flatten)]
        run: RunArgs,
    },

    /// Load MGP and B6 strain markers
    StrainMarkers {
        #[command(flatten)]
        run: RunArgs,

        /// Process only the C57BL/6J reference strain
        #[arg(long, env = "B6_ONLY", value_parser = FalseyValueParser::new())]
        reference_strain_only: bool,
    },
}

impl Commands {
    /// Load name used for the rolling log file prefix.
    pub fn load_name(&self) -> &'static str {
        match self {
            Commands::Relationships { .. } => "relationships",
            Commands::StrainMarkers { .. } => "strain-markers",
        }
    }
}

/// Toggles shared by every load.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Write the curation report and stop; the database and output files are left alone
    #[arg(long, env = "QC_ONLY", value_parser = FalseyValueParser::new())]
    pub qc_only: bool,

    /// Minimum number of records every input file must hold
    #[arg(long, env = "MIN_RECORDS", default_value_t = 0)]
    pub min_records: usize,

    /// Read the reference snapshot from a JSON export instead of the database
    #[arg(long, value_name = "FILE")]
    pub snapshot: Option<PathBuf>,
}
