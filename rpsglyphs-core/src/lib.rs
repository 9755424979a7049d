//! RPS Glyphs Core - Sprite Glyph Compositor
//!
//! Builds every element / aspect / augment glyph by layering source PNGs
//! onto a transparent canvas. Pixel work is delegated to a `Compositor`.
//!
//! # Output Families
//! 1. Bare: `<element>.png`
//! 2. Augmented: `<element>-<augment>.png`
//! 3. Enchanted: `<element>-<aspect>.png`
//! 4. Augmented-enchanted: `<element>-<aspect>-<augment>.png`

pub mod identity;
pub mod layout;
pub mod plan;
pub mod compositor;
pub mod validation;
pub mod hashing;
pub mod pipeline;

pub use identity::{Augment, Element, IdentityError};
pub use layout::{Canvas, Geometry, Layout};
pub use plan::{plan, expected_count, Combination, Family, Recipe};
pub use compositor::{Compositor, CompositeError, DryRunCompositor, MagickCompositor};
pub use validation::{FailureMode, ValidationResult, ValidationViolation, ViolationSeverity};
pub use hashing::{compute_manifest_hash, compute_job_hash, canonical_json};
pub use pipeline::{GenerationPipeline, RunOptions, RunReport, ErrorPolicy, PipelineError, write_manifest};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
