//! Running extraction over many files in parallel.
//!
//! The orchestrator:
//! 1. checks the build preconditions once
//! 2. loads the auxiliary block and tactic matcher once
//! 3. processes every [`FileTask`] on its own tokio task, bounded by a semaphore
//! 4. optionally merges the per-file record files of each target tree
//!
//! File tasks share nothing mutable. Each owns its REPL sessions, and a
//! failing file is logged and reported without affecting the others.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

use crate::artifacts::{self, FileTask};
use crate::config::ExtractionConfig;
use crate::error::{Error, Result};
use crate::extraction::{
    extract_records, filter_by_length, graded_variants, instrument, marker_count, Extraction,
    SessionVerifier, SourceFile, TacticMatcher,
};
use crate::lake::LakeBuilder;
use crate::lean::{Session, SessionConfig};

/// Result of processing one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileOutcome {
    /// Source file.
    pub source: PathBuf,
    /// Statement file written for it.
    pub target: PathBuf,
    /// Markers left in the submitted source.
    pub markers: usize,
    /// Records accepted after verification.
    pub records: usize,
    /// Why the file produced nothing, if it failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FileOutcome {
    fn failed(task: &FileTask, error: impl ToString) -> Self {
        Self {
            source: task.source.clone(),
            target: task.target.clone(),
            markers: 0,
            records: 0,
            error: Some(error.to_string()),
        }
    }

    /// Whether the file was processed without error.
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

/// Summary of one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// One outcome per task, in task order.
    pub outcomes: Vec<FileOutcome>,
    /// Merged record files with their element counts.
    #[serde(default)]
    pub merged: Vec<(PathBuf, usize)>,
}

impl RunReport {
    /// Records accepted across all files.
    pub fn total_records(&self) -> usize {
        self.outcomes.iter().map(|o| o.records).sum()
    }

    /// Markers submitted across all files.
    pub fn total_markers(&self) -> usize {
        self.outcomes.iter().map(|o| o.markers).sum()
    }

    /// Outcomes of files that failed.
    pub fn failures(&self) -> impl Iterator<Item = &FileOutcome> {
        self.outcomes.iter().filter(|o| !o.succeeded())
    }

    /// Wall-clock duration of the run.
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Immutable inputs shared by every file task.
#[derive(Debug)]
pub struct FileContext {
    /// Sessions for extraction and verification.
    pub session: SessionConfig,
    /// Auxiliary block defining the marker tactic.
    pub aux_block: Arc<str>,
    /// Candidate tactic matcher.
    pub matcher: TacticMatcher,
    /// Granularity threshold; 1 or less disables filtering.
    pub min_sibling_tactics: usize,
    /// Thresholds to write graded variants of the annotated source for.
    pub graded_thresholds: Vec<usize>,
}

impl FileContext {
    /// Number of lines the auxiliary block shifts the source by.
    pub fn aux_line_count(&self) -> usize {
        self.aux_block.matches('\n').count()
    }
}

/// Extract records from one file and write its artifacts.
///
/// Outputs of a previous run are removed first, so a file that fails here
/// leaves no records behind.
pub async fn process_file(task: &FileTask, ctx: &FileContext) -> Result<FileOutcome> {
    artifacts::clear_outputs(task)?;

    let source = SourceFile::load(&task.source)?;
    let instrumented = instrument(&source.lines, &ctx.aux_block, &ctx.matcher);

    for (threshold, variant) in graded_variants(&instrumented.lines, &ctx.graded_thresholds) {
        artifacts::write_graded(task, threshold, &variant.concat())?;
    }

    let lines = if ctx.min_sibling_tactics > 1 {
        filter_by_length(&instrumented.lines, ctx.min_sibling_tactics)
    } else {
        instrumented.lines.clone()
    };
    let markers = marker_count(&lines);
    let text = lines.concat();
    artifacts::write_fullcontext(task, &text)?;

    let header = source.library.theorem_header(&instrumented.open_lines);

    let extraction = if markers == 0 {
        debug!(file = %task.source.display(), "No candidate tactics, skipping submission");
        Extraction::default()
    } else {
        let mut session = Session::open(ctx.session.clone()).await?;
        let submitted = session.submit(&text).await;
        if let Err(e) = session.close().await {
            warn!(file = %task.source.display(), "Extraction session did not shut down cleanly: {}", e);
        }
        let messages = submitted?;

        let verifier = SessionVerifier::new(ctx.session.clone());
        extract_records(&source, &header, ctx.aux_line_count(), messages, &verifier).await?
    };

    artifacts::write_outputs(task, &header, &extraction)?;

    info!(
        file = %task.source.display(),
        "inserted {} markers, accepted {} goals",
        markers,
        extraction.records.len()
    );

    Ok(FileOutcome {
        source: task.source.clone(),
        target: task.target.clone(),
        markers,
        records: extraction.records.len(),
        error: None,
    })
}

/// Runs extraction for a set of file tasks.
pub struct Orchestrator {
    config: Arc<ExtractionConfig>,
}

impl Orchestrator {
    pub fn new(config: ExtractionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    /// Tasks for every configured directory pair.
    pub fn collect_tasks(&self) -> Result<Vec<FileTask>> {
        let mut tasks = Vec::new();
        for pair in &self.config.directories {
            info!(source = %pair.source.display(), dest = %pair.target.display(), "Preparing directory");
            tasks.extend(artifacts::collect_tasks(&pair.source, &pair.target)?);
        }
        Ok(tasks)
    }

    /// Check build preconditions and load the shared inputs.
    ///
    /// Any error here is fatal to the run.
    pub async fn prepare(&self) -> Result<FileContext> {
        let config = &self.config;

        let lake = if config.skip_build && config.session_override.is_some() {
            None
        } else {
            Some(LakeBuilder::locate(config.lake_path.as_deref())?)
        };

        if !config.skip_build {
            if let Some(lake) = &lake {
                lake.ensure_artifacts(&config.math_dir, &config.repl_dir).await?;
            }
        }

        let aux_block = std::fs::read_to_string(&config.aux_block_path)
            .map_err(|e| Error::io(&config.aux_block_path, e))?;
        let matcher = TacticMatcher::new(config.tactic_patterns.as_slice())?;

        let lake_program = lake
            .map(|l| l.lake().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("lake"));

        Ok(FileContext {
            session: config.session_config(&lake_program),
            aux_block: Arc::from(aux_block),
            matcher,
            min_sibling_tactics: config.min_sibling_tactics,
            graded_thresholds: config.graded_thresholds.clone(),
        })
    }

    /// Process `tasks` concurrently and wait for all of them.
    pub async fn run(&self, tasks: Vec<FileTask>) -> Result<RunReport> {
        let started_at = Utc::now();
        let ctx = Arc::new(self.prepare().await?);
        let semaphore = Arc::new(Semaphore::new(self.config.max_workers.max(1)));

        info!(
            files = tasks.len(),
            workers = self.config.max_workers,
            threshold = self.config.min_sibling_tactics,
            "Starting extraction"
        );

        let mut pending = Vec::with_capacity(tasks.len());
        let mut handles = Vec::with_capacity(tasks.len());
        for task in tasks {
            pending.push(task.clone());
            let permit = Arc::clone(&semaphore)
                .acquire_owned()
                .await
                .map_err(|e| Error::Internal(format!("worker pool closed: {}", e)))?;
            let ctx = Arc::clone(&ctx);

            let handle = tokio::spawn(async move {
                let _permit = permit;
                match process_file(&task, &ctx).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        error!(file = %task.source.display(), "Extraction failed: {}", e);
                        FileOutcome::failed(&task, e)
                    }
                }
            });
            handles.push(handle);
        }

        let outcomes: Vec<FileOutcome> = join_all(handles)
            .await
            .into_iter()
            .zip(&pending)
            .map(|(joined, task)| match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(file = %task.source.display(), "Extraction worker panicked: {}", e);
                    FileOutcome::failed(task, format!("worker panicked: {}", e))
                }
            })
            .collect();

        let merged = if self.config.merge_outputs {
            let targets: Vec<&Path> = self
                .config
                .directories
                .iter()
                .map(|p| p.target.as_path())
                .collect();
            match artifacts::merge_records(&targets) {
                Ok(merged) => merged,
                Err(e) => {
                    warn!("Merging record files failed: {}", e);
                    Vec::new()
                }
            }
        } else {
            Vec::new()
        };

        let report = RunReport {
            started_at,
            finished_at: Utc::now(),
            outcomes,
            merged,
        };

        info!(
            files = report.outcomes.len(),
            failed = report.failures().count(),
            markers = report.total_markers(),
            records = report.total_records(),
            "Extraction finished"
        );

        Ok(report)
    }
}
