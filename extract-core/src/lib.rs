//! # extract-core
//!
//! Mining standalone sub-proofs from Lean 4 libraries.
//!
//! Every candidate tactic in a source file is wrapped in a `to_theorem`
//! marker, the file is elaborated once by a Lean REPL, and the diagnostics the
//! marker reports are turned into self-contained theorem statements. Each
//! statement is re-checked in a fresh session before it is kept.
//!
//! ## Core Components
//!
//! - **Lean**: REPL subprocess sessions and the JSON protocol types
//! - **Extraction**: instrumentation, granularity filtering, diagnostic
//!   aggregation and verification
//! - **Orchestrator**: parallel processing of whole source trees
//! - **Artifacts**: task discovery and on-disk outputs
//!
//! ## Example
//!
//! ```rust,ignore
//! use extract_core::{ExtractionConfig, Orchestrator};
//!
//! let orchestrator = Orchestrator::new(ExtractionConfig::from_env()?);
//! let tasks = orchestrator.collect_tasks()?;
//! let report = orchestrator.run(tasks).await?;
//! println!("accepted {} sub-proofs", report.total_records());
//! ```

pub mod artifacts;
pub mod config;
pub mod error;
pub mod extraction;
pub mod lake;
pub mod lean;
pub mod orchestrator;

// Re-exports for convenience
pub use artifacts::{collect_tasks, count_records, merge_records, FileTask};
pub use config::{DirectoryPair, ExtractionConfig};
pub use error::{Error, Result};
pub use extraction::{
    extract_records, filter_by_length, graded_variants, instrument, Extraction, ExtractionRecord,
    Library, SessionVerifier, SourceFile, TacticMatcher, Verify,
};
pub use lake::LakeBuilder;
pub use lean::{LeanMessage, LeanResponse, MessageSeverity, Position, Session, SessionConfig};
pub use orchestrator::{process_file, FileContext, FileOutcome, Orchestrator, RunReport};
