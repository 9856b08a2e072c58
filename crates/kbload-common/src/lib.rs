//! kbload Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Utilities shared by every knowledge-base load job.
//!
//! - **Logging**: process-wide `tracing` subscriber setup (console, rolling
//!   file, text or JSON)
//! - **Accession**: splitting MGI-style accession IDs into the prefix and
//!   numeric parts stored alongside them
//!
//! # Example
//!
//! ```no_run
//! use kbload_common::accession::AccessionId;
//! use kbload_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     init_logging(&LogConfig::from_env()?)?;
//!     let acc = AccessionId::split("MGP_CAROLIEiJ_G0013919");
//!     tracing::info!(prefix = %acc.prefix, "split accession");
//!     Ok(())
//! }
//! ```

pub mod accession;
pub mod logging;

pub use accession::AccessionId;
