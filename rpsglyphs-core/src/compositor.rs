//! Compositor Seam - The Only Place Pixels Are Touched
//!
//! The generator never composites itself; it hands a `Recipe` to a
//! `Compositor`. Production shells out to ImageMagick.

use semver::Version;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use thiserror::Error;

use crate::plan::Recipe;

/// The `magick` entry point first shipped with ImageMagick 7.
pub const MIN_MAGICK_VERSION: &str = "7.0.0";

#[derive(Debug, Error)]
pub enum CompositeError {
    #[error("Failed to launch {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: io::Error,
    },

    #[error("{program} failed writing {} (exit code {code:?}): {stderr}", .output.display())]
    ToolFailed {
        program: String,
        output: PathBuf,
        code: Option<i32>,
        stderr: String,
    },
}

pub trait Compositor {
    fn name(&self) -> &str;

    /// Write `recipe.output`, blocking until done
    fn composite(&mut self, recipe: &Recipe) -> Result<(), CompositeError>;

    /// Tool version, if it can be determined
    fn version(&self) -> Option<Version> {
        None
    }

    /// Whether a successful `composite` leaves a file at `recipe.output`
    fn writes_outputs(&self) -> bool {
        true
    }
}

/// Runs `magick` once per recipe
pub struct MagickCompositor {
    program: PathBuf,
}

impl MagickCompositor {
    pub fn new() -> Self {
        Self::with_program("magick")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self { program: program.into() }
    }

    fn program_name(&self) -> String {
        self.program.display().to_string()
    }
}

impl Default for MagickCompositor {
    fn default() -> Self {
        Self::new()
    }
}

impl Compositor for MagickCompositor {
    fn name(&self) -> &str {
        self.program.to_str().unwrap_or("magick")
    }

    fn composite(&mut self, recipe: &Recipe) -> Result<(), CompositeError> {
        let output = Command::new(&self.program)
            .args(recipe.magick_args())
            .output()
            .map_err(|source| CompositeError::Spawn {
                program: self.program_name(),
                source,
            })?;

        if !output.status.success() {
            return Err(CompositeError::ToolFailed {
                program: self.program_name(),
                output: recipe.output.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(())
    }

    fn version(&self) -> Option<Version> {
        let output = match Command::new(&self.program).arg("-version").output() {
            Ok(o) => o,
            Err(e) => {
                log::debug!("Could not query {} version: {}", self.program_name(), e);
                return None;
            }
        };
        parse_magick_version(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Parse the `Version: ImageMagick 7.1.1-29 Q16-HDRI ...` banner line.
pub fn parse_magick_version(banner: &str) -> Option<Version> {
    let line = banner.lines().find(|l| l.trim_start().starts_with("Version:"))?;
    let mut tokens = line.split_whitespace();
    tokens.find(|t| *t == "ImageMagick")?;
    let release = tokens.next()?;
    let core = release.split('-').next()?;
    Version::parse(core).ok()
}

/// Records recipes instead of running anything
#[derive(Debug, Default)]
pub struct DryRunCompositor {
    pub recipes: Vec<Recipe>,
}

impl DryRunCompositor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Compositor for DryRunCompositor {
    fn name(&self) -> &str {
        "dry-run"
    }

    fn composite(&mut self, recipe: &Recipe) -> Result<(), CompositeError> {
        self.recipes.push(recipe.clone());
        Ok(())
    }

    fn writes_outputs(&self) -> bool {
        false
    }
}
