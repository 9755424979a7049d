//! Preflight Validation - Rule/Policy Separation
//!
//! Rules produce structured violations.
//! Policy decides whether the run may proceed.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::Path;

use crate::layout::Layout;
use crate::plan::Combination;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ViolationSeverity {
    Error,
    Warning,
    Info,
}

/// What to do when source images are missing
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum FailureMode {
    /// Abort before any compositing
    #[default]
    Block,
    /// Skip the combinations that need a missing source
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationViolation {
    pub rule: String,
    pub severity: ViolationSeverity,
    pub message: String,
    /// Identity key or path the violation is about
    pub subject: Option<String>,
    pub expected: Option<String>,
    pub actual: Option<String>,
    pub remediation: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub failure_mode: FailureMode,
    pub violations: Vec<ValidationViolation>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        self.violations.iter().any(|v| v.severity == ViolationSeverity::Error)
    }

    /// Identity keys with no source image on disk
    pub fn missing_sources(&self) -> BTreeSet<String> {
        self.violations
            .iter()
            .filter(|v| v.rule == SourcePresenceRule.name())
            .filter_map(|v| v.subject.clone())
            .collect()
    }
}

/// Everything a rule may look at before the first invocation
pub struct PreflightInput<'a> {
    pub layout: &'a Layout,
    pub sources_dir: &'a Path,
    pub output_dir: &'a Path,
    pub identities: BTreeSet<&'static str>,
}

impl<'a> PreflightInput<'a> {
    pub fn for_plan(
        layout: &'a Layout,
        sources_dir: &'a Path,
        output_dir: &'a Path,
        combinations: &[Combination],
    ) -> Self {
        let identities = combinations
            .iter()
            .flat_map(|c| c.identities())
            .collect();
        Self { layout, sources_dir, output_dir, identities }
    }
}

/// Validation rule trait - produces violations
pub trait ValidationRule {
    fn name(&self) -> &'static str;
    fn validate(&self, input: &PreflightInput) -> Vec<ValidationViolation>;
}

// --- Concrete Rules ---

pub struct SourcePresenceRule;

impl ValidationRule for SourcePresenceRule {
    fn name(&self) -> &'static str { "source_presence" }

    fn validate(&self, input: &PreflightInput) -> Vec<ValidationViolation> {
        input.identities
            .iter()
            .filter_map(|key| {
                let path = input.sources_dir.join(format!("{key}.png"));
                if path.is_file() {
                    return None;
                }
                Some(ValidationViolation {
                    rule: self.name().to_string(),
                    severity: ViolationSeverity::Error,
                    message: format!("Missing source image for '{key}'"),
                    subject: Some(key.to_string()),
                    expected: Some(path.display().to_string()),
                    actual: None,
                    remediation: vec![format!("Add {}", path.display())],
                })
            })
            .collect()
    }
}

pub struct BadgeBoundsRule;

impl ValidationRule for BadgeBoundsRule {
    fn name(&self) -> &'static str { "badge_bounds" }

    fn validate(&self, input: &PreflightInput) -> Vec<ValidationViolation> {
        let canvas = &input.layout.canvas;
        [("augment", input.layout.augment_badge), ("aspect", input.layout.aspect_badge)]
            .into_iter()
            .filter(|(_, geometry)| !geometry.fits_within(canvas))
            .map(|(badge, geometry)| ValidationViolation {
                rule: self.name().to_string(),
                severity: ViolationSeverity::Warning,
                message: format!("The {badge} badge extends beyond the canvas and will be clipped"),
                subject: Some(badge.to_string()),
                expected: Some(format!("within {}", canvas.size_arg())),
                actual: Some(geometry.to_string()),
                remediation: vec!["Move or shrink the badge in the layout".to_string()],
            })
            .collect()
    }
}

pub struct BadgeOverlapRule;

impl ValidationRule for BadgeOverlapRule {
    fn name(&self) -> &'static str { "badge_overlap" }

    fn validate(&self, input: &PreflightInput) -> Vec<ValidationViolation> {
        let augment = input.layout.augment_badge;
        let aspect = input.layout.aspect_badge;
        if !augment.intersects(&aspect) {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Warning,
            message: "Aspect badge covers part of the augment badge".to_string(),
            subject: None,
            expected: Some("disjoint badges".to_string()),
            actual: Some(format!("{augment} and {aspect}")),
            remediation: vec!["Separate the badge geometries".to_string()],
        }]
    }
}

pub struct OutputDirRule;

impl ValidationRule for OutputDirRule {
    fn name(&self) -> &'static str { "output_dir" }

    fn validate(&self, input: &PreflightInput) -> Vec<ValidationViolation> {
        if input.output_dir.is_dir() {
            return vec![];
        }
        vec![ValidationViolation {
            rule: self.name().to_string(),
            severity: ViolationSeverity::Info,
            message: "Output directory does not exist and will be created".to_string(),
            subject: Some(input.output_dir.display().to_string()),
            expected: None,
            actual: None,
            remediation: vec![],
        }]
    }
}

/// Validator orchestrates rules and applies policy
pub struct Validator {
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new() -> Self {
        Self {
            rules: vec![
                Box::new(SourcePresenceRule),
                Box::new(BadgeBoundsRule),
                Box::new(BadgeOverlapRule),
                Box::new(OutputDirRule),
            ],
        }
    }

    pub fn preflight(&self, input: &PreflightInput, mode: FailureMode) -> ValidationResult {
        let violations: Vec<_> = self.rules
            .iter()
            .flat_map(|rule| rule.validate(input))
            .collect();

        let has_errors = violations.iter()
            .any(|v| v.severity == ViolationSeverity::Error);

        ValidationResult {
            // Skip never blocks; the pipeline drops affected combinations instead
            valid: mode == FailureMode::Skip || !has_errors,
            failure_mode: mode,
            violations,
        }
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new()
    }
}
