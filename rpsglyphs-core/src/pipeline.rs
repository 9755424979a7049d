//! Generation Pipeline - Single Entry Point
//!
//! Every run goes through preflight before the first invocation.
//! Invocations are strictly sequential.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::compositor::{CompositeError, Compositor, MIN_MAGICK_VERSION};
use crate::hashing::{compute_job_hash, compute_manifest_hash, hash_file};
use crate::identity::{Augment, Element};
use crate::layout::Layout;
use crate::plan::{plan, Combination, Family, Recipe};
use crate::validation::{FailureMode, PreflightInput, ValidationResult, Validator, ViolationSeverity};
use crate::ENGINE_VERSION;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Preflight failed: {0}")]
    PreflightFailed(String),

    #[error("{tool} {found} is older than the required {required}")]
    ToolVersionMismatch {
        tool: String,
        found: String,
        required: String,
    },

    #[error("Compositing {stem} failed: {source}")]
    Composite {
        stem: String,
        #[source]
        source: CompositeError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// What to do when an invocation fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Abort at the first failure; outputs already written stay on disk
    #[default]
    FailFast,
    /// Record every failure and report them together
    KeepGoing,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub failure_mode: FailureMode,
    pub error_policy: ErrorPolicy,
    /// Delete outputs no longer in the plan
    pub prune: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedAsset {
    pub stem: String,
    pub family: Family,
    pub recipe: Recipe,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratedAsset {
    pub stem: String,
    pub family: Family,
    pub path: PathBuf,
    /// `None` when the compositor writes no files or `path` is unreadable
    pub hash: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkippedAsset {
    pub stem: String,
    pub missing: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailedAsset {
    pub stem: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    pub id: String,
    pub engine_version: String,
    pub compositor: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub job_hash: String,
    pub manifest_hash: String,
    pub planned: usize,
    pub validation: ValidationResult,
    pub outputs: Vec<GeneratedAsset>,
    pub skipped: Vec<SkippedAsset>,
    pub failures: Vec<FailedAsset>,
    pub pruned: Vec<PathBuf>,
}

impl RunReport {
    pub fn success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// The generation pipeline - owns the compositor and the identity sets
pub struct GenerationPipeline<C: Compositor> {
    compositor: C,
    validator: Validator,
    layout: Layout,
    sources_dir: PathBuf,
    output_dir: PathBuf,
    elements: Vec<Element>,
    augments: Vec<Augment>,
}

impl<C: Compositor> GenerationPipeline<C> {
    /// Outputs go to `assets_dir`, sources are read from `assets_dir/sources`.
    pub fn new(compositor: C, assets_dir: impl Into<PathBuf>) -> Self {
        let output_dir = assets_dir.into();
        Self {
            compositor,
            validator: Validator::new(),
            layout: Layout::default(),
            sources_dir: output_dir.join("sources"),
            output_dir,
            elements: Element::ALL.to_vec(),
            augments: Augment::ALL.to_vec(),
        }
    }

    pub fn with_sources_dir(mut self, sources_dir: impl Into<PathBuf>) -> Self {
        self.sources_dir = sources_dir.into();
        self
    }

    pub fn with_layout(mut self, layout: Layout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_elements(mut self, elements: &[Element]) -> Self {
        self.elements = elements.to_vec();
        self
    }

    pub fn with_augments(mut self, augments: &[Augment]) -> Self {
        self.augments = augments.to_vec();
        self
    }

    pub fn compositor(&self) -> &C {
        &self.compositor
    }

    pub fn plan(&self) -> Vec<Combination> {
        plan(&self.elements, &self.augments)
    }

    pub fn planned_assets(&self) -> Vec<PlannedAsset> {
        self.plan()
            .into_iter()
            .map(|c| PlannedAsset {
                stem: c.stem(),
                family: c.family(),
                recipe: c.recipe(&self.layout, &self.sources_dir, &self.output_dir),
            })
            .collect()
    }

    pub fn preflight(&self, mode: FailureMode) -> ValidationResult {
        let combinations = self.plan();
        let input = PreflightInput::for_plan(
            &self.layout,
            &self.sources_dir,
            &self.output_dir,
            &combinations,
        );
        self.validator.preflight(&input, mode)
    }

    fn check_tool_version(&self) -> Result<(), PipelineError> {
        let Some(found) = self.compositor.version() else {
            log::debug!("Version of {} unknown, skipping check", self.compositor.name());
            return Ok(());
        };
        let required = semver::Version::parse(MIN_MAGICK_VERSION)
            .map_err(|e| PipelineError::PreflightFailed(format!("Invalid minimum version: {e}")))?;

        if found < required {
            return Err(PipelineError::ToolVersionMismatch {
                tool: self.compositor.name().to_string(),
                found: found.to_string(),
                required: required.to_string(),
            });
        }
        log::debug!("Using {} {}", self.compositor.name(), found);
        Ok(())
    }

    /// Generate every planned output.
    ///
    /// Preflight errors under `FailureMode::Block` abort before anything is
    /// written. Invocation failures follow `options.error_policy`.
    pub fn run(&mut self, options: &RunOptions) -> Result<RunReport, PipelineError> {
        let started_at = Utc::now();
        let combinations = self.plan();
        log::info!(
            "Generating {} glyphs into {}",
            combinations.len(),
            self.output_dir.display()
        );

        self.check_tool_version()?;

        let validation = self.preflight(options.failure_mode);
        for v in &validation.violations {
            match v.severity {
                ViolationSeverity::Error => log::error!("{}: {}", v.rule, v.message),
                ViolationSeverity::Warning => log::warn!("{}: {}", v.rule, v.message),
                ViolationSeverity::Info => log::info!("{}: {}", v.rule, v.message),
            }
        }
        if !validation.valid {
            let messages: Vec<_> = validation.violations.iter()
                .filter(|v| v.severity == ViolationSeverity::Error)
                .map(|v| format!("{}: {}", v.rule, v.message))
                .collect();
            return Err(PipelineError::PreflightFailed(messages.join("; ")));
        }
        let missing = validation.missing_sources();

        let writes = self.compositor.writes_outputs();
        if writes {
            fs::create_dir_all(&self.output_dir)?;
        }

        let mut outputs = vec![];
        let mut skipped = vec![];
        let mut failures = vec![];

        for combination in &combinations {
            let stem = combination.stem();

            let absent: Vec<String> = combination.identities()
                .into_iter()
                .filter(|key| missing.contains(*key))
                .map(str::to_string)
                .collect();
            if !absent.is_empty() {
                log::warn!("Skipping {}: missing {}", stem, absent.join(", "));
                skipped.push(SkippedAsset { stem, missing: absent });
                continue;
            }

            let recipe = combination.recipe(&self.layout, &self.sources_dir, &self.output_dir);
            log::debug!("{} {:?}", self.compositor.name(), recipe.magick_args());

            match self.compositor.composite(&recipe) {
                Ok(()) => {
                    let hash = if writes {
                        match hash_file(&recipe.output) {
                            Ok(h) => Some(h),
                            Err(e) => {
                                log::warn!("{} reported success but {} is unreadable: {}",
                                    self.compositor.name(), recipe.output.display(), e);
                                None
                            }
                        }
                    } else {
                        None
                    };
                    outputs.push(GeneratedAsset {
                        stem,
                        family: combination.family(),
                        hash,
                        path: recipe.output,
                    });
                }
                Err(e) => {
                    log::error!("{}: {}", stem, e);
                    match options.error_policy {
                        ErrorPolicy::FailFast => {
                            return Err(PipelineError::Composite { stem, source: e });
                        }
                        ErrorPolicy::KeepGoing => {
                            failures.push(FailedAsset { stem, error: e.to_string() });
                        }
                    }
                }
            }
        }

        let pruned = if options.prune && writes {
            self.prune_stale()?
        } else if options.prune {
            log::warn!("{} writes nothing, not pruning", self.compositor.name());
            vec![]
        } else {
            vec![]
        };

        let mut report = RunReport {
            id: Uuid::new_v4().to_string(),
            engine_version: ENGINE_VERSION.to_string(),
            compositor: self.compositor.name().to_string(),
            started_at,
            finished_at: Utc::now(),
            job_hash: compute_job_hash(&self.layout, &combinations, ENGINE_VERSION)?,
            manifest_hash: String::new(),  // Computed after
            planned: combinations.len(),
            validation,
            outputs,
            skipped,
            failures,
            pruned,
        };
        report.manifest_hash = compute_manifest_hash(&report)?;

        log::info!(
            "Done: {} written, {} skipped, {} failed, {} pruned",
            report.outputs.len(),
            report.skipped.len(),
            report.failures.len(),
            report.pruned.len()
        );
        Ok(report)
    }

    /// Delete `*.png` files in the output directory that the full
    /// element/augment plan does not produce. Element and augment filters
    /// never widen what counts as stale.
    ///
    /// Refuses to touch anything when sources and outputs share a directory.
    pub fn prune_stale(&self) -> Result<Vec<PathBuf>, PipelineError> {
        if !self.output_dir.is_dir() {
            return Ok(vec![]);
        }
        if same_dir(&self.output_dir, &self.sources_dir) {
            log::warn!("Sources live in the output directory, not pruning");
            return Ok(vec![]);
        }

        let expected: BTreeSet<String> = plan(&Element::ALL, &Augment::ALL)
            .iter()
            .map(|c| c.stem())
            .collect();
        let mut pruned = vec![];

        for entry in fs::read_dir(&self.output_dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().map_or(true, |e| e != "png") {
                continue;
            }
            let stale = path
                .file_stem()
                .and_then(|s| s.to_str())
                .map_or(false, |stem| !expected.contains(stem));
            if stale {
                log::info!("Pruning {}", path.display());
                fs::remove_file(&path)?;
                pruned.push(path);
            }
        }

        pruned.sort();
        Ok(pruned)
    }
}

fn same_dir(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Write a run report as pretty JSON
pub fn write_manifest(report: &RunReport, path: &Path) -> Result<(), PipelineError> {
    let json = serde_json::to_string_pretty(report)?;
    fs::write(path, json)?;
    Ok(())
}
