//! Generation Plan - Which Glyphs Exist and How They Are Layered
//!
//! Layers are always drawn base element, then augment badge, then aspect badge.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::OsString;
use std::iter;
use std::path::{Path, PathBuf};

use crate::identity::{Augment, Element};
use crate::layout::{Canvas, Geometry, Layout};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Bare,
    Augmented,
    Enchanted,
    AugmentedEnchanted,
}

/// One output glyph: element, optional aspect, optional augment
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Combination {
    pub element: Element,
    pub aspect: Option<Element>,
    pub augment: Option<Augment>,
}

impl Combination {
    /// Returns `None` for an element enchanted with itself.
    pub fn new(element: Element, aspect: Option<Element>, augment: Option<Augment>) -> Option<Self> {
        if aspect == Some(element) {
            return None;
        }
        Some(Self { element, aspect, augment })
    }

    pub fn family(&self) -> Family {
        match (self.aspect, self.augment) {
            (None, None) => Family::Bare,
            (None, Some(_)) => Family::Augmented,
            (Some(_), None) => Family::Enchanted,
            (Some(_), Some(_)) => Family::AugmentedEnchanted,
        }
    }

    /// `element[-aspect][-augment]`
    pub fn stem(&self) -> String {
        let mut stem = self.element.key().to_string();
        if let Some(aspect) = self.aspect {
            stem.push('-');
            stem.push_str(aspect.key());
        }
        if let Some(augment) = self.augment {
            stem.push('-');
            stem.push_str(augment.key());
        }
        stem
    }

    /// Source identities in layer order
    pub fn identities(&self) -> Vec<&'static str> {
        let mut keys = vec![self.element.key()];
        keys.extend(self.augment.map(|a| a.key()));
        keys.extend(self.aspect.map(|a| a.key()));
        keys
    }

    pub fn recipe(&self, layout: &Layout, sources_dir: &Path, output_dir: &Path) -> Recipe {
        let source = |key: &str| sources_dir.join(format!("{key}.png"));

        let mut layers = vec![Layer {
            source: source(self.element.key()),
            geometry: None,
        }];
        if let Some(augment) = self.augment {
            layers.push(Layer {
                source: source(augment.key()),
                geometry: Some(layout.augment_badge),
            });
        }
        if let Some(aspect) = self.aspect {
            layers.push(Layer {
                source: source(aspect.key()),
                geometry: Some(layout.aspect_badge),
            });
        }

        Recipe {
            canvas: layout.canvas,
            layers,
            output: output_dir.join(format!("{}.png", self.stem())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub source: PathBuf,
    /// `None` composites at full canvas size
    pub geometry: Option<Geometry>,
}

/// Everything the compositor needs for a single output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub canvas: Canvas,
    pub layers: Vec<Layer>,
    pub output: PathBuf,
}

impl Recipe {
    /// `-size WxH -depth D xc:none <layer> [-geometry G] -composite ... <output>`
    pub fn magick_args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec![
            "-size".into(),
            self.canvas.size_arg().into(),
            "-depth".into(),
            self.canvas.depth.to_string().into(),
            "xc:none".into(),
        ];
        for layer in &self.layers {
            args.push(layer.source.clone().into_os_string());
            if let Some(geometry) = layer.geometry {
                args.push("-geometry".into());
                args.push(geometry.to_string().into());
            }
            args.push("-composite".into());
        }
        args.push(self.output.clone().into_os_string());
        args
    }
}

/// Enumerate every combination for the given identity sets.
///
/// Duplicates are ignored and iteration follows key order. Per element the
/// order is bare, augmented, then each aspect followed by its augmented
/// variants.
pub fn plan(elements: &[Element], augments: &[Augment]) -> Vec<Combination> {
    let elements: BTreeSet<Element> = elements.iter().copied().collect();
    let augments: BTreeSet<Augment> = augments.iter().copied().collect();

    let mut combinations = Vec::with_capacity(expected_count(elements.len(), augments.len()));
    for &element in &elements {
        let aspects = iter::once(None).chain(elements.iter().copied().map(Some));
        for aspect in aspects {
            let variants = iter::once(None).chain(augments.iter().copied().map(Some));
            for augment in variants {
                // Self-paired aspects come back as None and drop out here
                combinations.extend(Combination::new(element, aspect, augment));
            }
        }
    }
    combinations
}

/// bare + augmented + enchanted + augmented-enchanted
pub fn expected_count(elements: usize, augments: usize) -> usize {
    let aspects = elements.saturating_sub(1);
    elements + elements * augments + elements * aspects + elements * aspects * augments
}
