//! Contract Invariant Tests
//!
//! These tests verify which glyphs exist and how each one is layered.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use rpsglyphs_core::{
    plan, expected_count, Augment, Combination, CompositeError, Compositor, DryRunCompositor,
    Element, ErrorPolicy, FailureMode, Family, GenerationPipeline, Layout, PipelineError, Recipe,
    RunOptions, write_manifest,
};
use semver::Version;

/// Fails every recipe whose output stem matches the predicate
struct FailingCompositor {
    fails: fn(&str) -> bool,
    calls: Vec<String>,
}

impl Compositor for FailingCompositor {
    fn name(&self) -> &str { "failing" }

    fn composite(&mut self, recipe: &Recipe) -> Result<(), CompositeError> {
        let stem = output_stem(recipe);
        self.calls.push(stem.clone());
        if (self.fails)(&stem) {
            return Err(CompositeError::ToolFailed {
                program: "failing".to_string(),
                output: recipe.output.clone(),
                code: Some(1),
                stderr: "unable to open image".to_string(),
            });
        }
        Ok(())
    }
}

/// Writes the argument list as the file body
struct FileWritingCompositor;

impl Compositor for FileWritingCompositor {
    fn name(&self) -> &str { "file-writer" }

    fn composite(&mut self, recipe: &Recipe) -> Result<(), CompositeError> {
        let body = format!("{:?}", recipe.magick_args());
        fs::write(&recipe.output, body).map_err(|source| CompositeError::Spawn {
            program: "file-writer".to_string(),
            source,
        })
    }
}

/// Claims success without producing a file
struct SilentCompositor;

impl Compositor for SilentCompositor {
    fn name(&self) -> &str { "silent" }

    fn composite(&mut self, _recipe: &Recipe) -> Result<(), CompositeError> {
        Ok(())
    }
}

struct AncientCompositor;

impl Compositor for AncientCompositor {
    fn name(&self) -> &str { "magick" }

    fn composite(&mut self, _recipe: &Recipe) -> Result<(), CompositeError> {
        panic!("must not composite with an unsupported tool");
    }

    fn version(&self) -> Option<Version> {
        Some(Version::new(6, 9, 11))
    }
}

fn output_stem(recipe: &Recipe) -> String {
    recipe.output.file_stem().unwrap().to_string_lossy().into_owned()
}

/// Temp assets dir with every source image present
fn seeded_assets() -> (tempfile::TempDir, PathBuf) {
    let tmp = tempfile::tempdir().unwrap();
    let assets = tmp.path().join("assets");
    let sources = assets.join("sources");
    fs::create_dir_all(&sources).unwrap();
    for key in Element::ALL.iter().map(|e| e.key()).chain(Augment::ALL.iter().map(|a| a.key())) {
        fs::write(sources.join(format!("{key}.png")), key.as_bytes()).unwrap();
    }
    (tmp, assets)
}

fn png_stems(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().path())
        .filter(|p| p.extension().map_or(false, |e| e == "png"))
        .map(|p| p.file_stem().unwrap().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn invariant_full_plan_has_196_unique_outputs() {
    let combos = plan(&Element::ALL, &Augment::ALL);
    assert_eq!(combos.len(), 196);
    assert_eq!(combos.len(), expected_count(7, 3));

    let stems: BTreeSet<_> = combos.iter().map(|c| c.stem()).collect();
    assert_eq!(stems.len(), 196);
}

#[test]
fn invariant_family_counts() {
    let combos = plan(&Element::ALL, &Augment::ALL);
    let count = |family: Family| combos.iter().filter(|c| c.family() == family).count();

    assert_eq!(count(Family::Bare), 7);
    assert_eq!(count(Family::Augmented), 21);
    assert_eq!(count(Family::Enchanted), 42);
    assert_eq!(count(Family::AugmentedEnchanted), 126);
}

#[test]
fn invariant_no_self_pairing() {
    let combos = plan(&Element::ALL, &Augment::ALL);
    assert!(combos.iter().all(|c| c.aspect != Some(c.element)));

    let stems: BTreeSet<_> = combos.iter().map(|c| c.stem()).collect();
    for element in Element::ALL {
        assert!(stems.contains(element.key()));
        assert!(!stems.contains(&format!("{element}-{element}")));
    }
}

#[test]
fn invariant_fire_water_parry_scenario() {
    let (_tmp, assets) = seeded_assets();
    let mut pipeline = GenerationPipeline::new(DryRunCompositor::new(), &assets)
        .with_elements(&[Element::Water, Element::Fire])
        .with_augments(&[Augment::Parry]);

    let report = pipeline.run(&RunOptions::default()).unwrap();
    assert!(report.success());
    assert_eq!(report.planned, 8);

    let stems: BTreeSet<_> = report.outputs.iter().map(|o| o.stem.as_str()).collect();
    let expected: BTreeSet<_> = [
        "fire", "water",
        "fire-parry", "water-parry",
        "fire-water", "water-fire",
        "fire-water-parry", "water-fire-parry",
    ]
    .into_iter()
    .collect();
    assert_eq!(stems, expected);
    assert_eq!(pipeline.compositor().recipes.len(), 8);
}

#[test]
fn invariant_every_recipe_starts_from_transparent_canvas() {
    let layout = Layout::default();
    for combo in plan(&Element::ALL, &Augment::ALL) {
        let recipe = combo.recipe(&layout, Path::new("assets/sources"), Path::new("assets"));
        let args: Vec<_> = recipe.magick_args().iter()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(&args[..5], &["-size", "128x128", "-depth", "8", "xc:none"]);
        assert_eq!(args[5], format!("assets/sources/{}.png", combo.element));
        assert_eq!(args.last().unwrap(), &format!("assets/{}.png", combo.stem()));
    }
}

#[test]
fn invariant_augment_layer_precedes_aspect() {
    let layout = Layout::default();
    for combo in plan(&Element::ALL, &Augment::ALL) {
        let recipe = combo.recipe(&layout, Path::new("src"), Path::new("out"));
        let geometries: Vec<_> = recipe.layers.iter().map(|l| l.geometry).collect();

        let expected = match combo.family() {
            Family::Bare => vec![None],
            Family::Augmented => vec![None, Some(layout.augment_badge)],
            Family::Enchanted => vec![None, Some(layout.aspect_badge)],
            Family::AugmentedEnchanted => {
                vec![None, Some(layout.augment_badge), Some(layout.aspect_badge)]
            }
        };
        assert_eq!(geometries, expected, "layer order for {}", combo.stem());
    }
}

#[test]
fn invariant_fail_fast_stops_at_first_failure() {
    let (_tmp, assets) = seeded_assets();
    let compositor = FailingCompositor { fails: |stem| stem == "earth", calls: vec![] };
    let mut pipeline = GenerationPipeline::new(compositor, &assets);

    let err = pipeline.run(&RunOptions::default()).unwrap_err();
    match err {
        PipelineError::Composite { stem, .. } => assert_eq!(stem, "earth"),
        other => panic!("expected Composite error, got {other:?}"),
    }

    // Every air glyph, then the failing earth glyph, then nothing
    let calls = &pipeline.compositor().calls;
    assert_eq!(calls.len(), expected_count(7, 3) / 7 + 1);
    assert_eq!(calls.last().unwrap(), "earth");
}

#[test]
fn invariant_keep_going_reports_every_failure() {
    let (_tmp, assets) = seeded_assets();
    let compositor = FailingCompositor { fails: |stem| stem.ends_with("-parry"), calls: vec![] };
    let mut pipeline = GenerationPipeline::new(compositor, &assets);

    let options = RunOptions {
        error_policy: ErrorPolicy::KeepGoing,
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).unwrap();

    assert!(!report.success());
    assert_eq!(report.failures.len(), 7 + 42);
    assert_eq!(report.outputs.len(), 196 - 49);
    assert_eq!(pipeline.compositor().calls.len(), 196);
}

#[test]
fn invariant_missing_source_blocks_before_any_invocation() {
    let (_tmp, assets) = seeded_assets();
    fs::remove_file(assets.join("sources/water.png")).unwrap();
    let mut pipeline = GenerationPipeline::new(DryRunCompositor::new(), &assets);

    let err = pipeline.run(&RunOptions::default()).unwrap_err();
    assert!(matches!(err, PipelineError::PreflightFailed(_)));
    assert!(err.to_string().contains("water"));
    assert!(pipeline.compositor().recipes.is_empty());
}

#[test]
fn invariant_missing_source_skip_mode() {
    let (_tmp, assets) = seeded_assets();
    fs::remove_file(assets.join("sources/water.png")).unwrap();
    let mut pipeline = GenerationPipeline::new(DryRunCompositor::new(), &assets);

    let options = RunOptions {
        failure_mode: FailureMode::Skip,
        ..RunOptions::default()
    };
    let report = pipeline.run(&options).unwrap();

    assert!(report.success());
    assert_eq!(report.outputs.len(), expected_count(6, 3));
    assert_eq!(report.skipped.len(), 196 - expected_count(6, 3));
    assert!(report.skipped.iter().all(|s| s.missing == vec!["water".to_string()]));
    assert!(report.outputs.iter().all(|o| !o.stem.contains("water")));
}

#[test]
fn invariant_rerun_is_idempotent() {
    let (_tmp, assets) = seeded_assets();
    let mut pipeline = GenerationPipeline::new(FileWritingCompositor, &assets);

    let first = pipeline.run(&RunOptions::default()).unwrap();
    let stems_after_first = png_stems(&assets);
    let second = pipeline.run(&RunOptions::default()).unwrap();

    assert_eq!(stems_after_first.len(), 196);
    assert_eq!(png_stems(&assets), stems_after_first);
    assert_eq!(first.job_hash, second.job_hash);

    let hashes = |r: &rpsglyphs_core::RunReport| -> Vec<_> {
        r.outputs.iter().map(|o| o.hash.clone()).collect()
    };
    assert_eq!(hashes(&first), hashes(&second));
    assert!(first.outputs.iter().all(|o| o.hash.is_some()));
}

#[test]
fn invariant_prune_removes_only_stale_glyphs() {
    let (_tmp, assets) = seeded_assets();
    fs::write(assets.join("lava.png"), b"old").unwrap();
    fs::write(assets.join("notes.txt"), b"keep").unwrap();
    let mut pipeline = GenerationPipeline::new(FileWritingCompositor, &assets);

    let options = RunOptions { prune: true, ..RunOptions::default() };
    let report = pipeline.run(&options).unwrap();

    assert_eq!(report.pruned, vec![assets.join("lava.png")]);
    assert!(assets.join("notes.txt").exists());
    assert!(assets.join("sources/fire.png").exists());
    assert_eq!(png_stems(&assets).len(), 196);
}

#[test]
fn invariant_default_run_never_prunes() {
    let (_tmp, assets) = seeded_assets();
    fs::write(assets.join("lava.png"), b"old").unwrap();
    let mut pipeline = GenerationPipeline::new(FileWritingCompositor, &assets)
        .with_elements(&[Element::Fire]);

    let report = pipeline.run(&RunOptions::default()).unwrap();
    assert!(report.pruned.is_empty());
    assert!(assets.join("lava.png").exists());
}

#[test]
fn invariant_filtered_prune_keeps_full_plan_glyphs() {
    let (_tmp, assets) = seeded_assets();
    fs::write(assets.join("water.png"), b"from a full run").unwrap();
    fs::write(assets.join("water-fire-combo.png"), b"from a full run").unwrap();
    fs::write(assets.join("lava.png"), b"old").unwrap();
    let mut pipeline = GenerationPipeline::new(FileWritingCompositor, &assets)
        .with_elements(&[Element::Fire])
        .with_augments(&[Augment::Parry]);

    let options = RunOptions { prune: true, ..RunOptions::default() };
    let report = pipeline.run(&options).unwrap();

    assert_eq!(report.pruned, vec![assets.join("lava.png")]);
    assert!(assets.join("water.png").exists());
    assert!(assets.join("water-fire-combo.png").exists());
}

#[test]
fn invariant_dry_run_writes_and_hashes_nothing() {
    let (_tmp, assets) = seeded_assets();
    fs::write(assets.join("fire.png"), b"left over from an earlier run").unwrap();
    fs::write(assets.join("lava.png"), b"old").unwrap();
    let mut pipeline = GenerationPipeline::new(DryRunCompositor::new(), &assets)
        .with_elements(&[Element::Fire])
        .with_augments(&[]);

    let options = RunOptions { prune: true, ..RunOptions::default() };
    let report = pipeline.run(&options).unwrap();

    assert_eq!(report.outputs.len(), 1);
    assert_eq!(report.outputs[0].hash, None);
    assert!(report.pruned.is_empty());
    assert!(assets.join("lava.png").exists());
}

#[test]
fn invariant_dry_run_does_not_create_output_dir() {
    let (tmp, assets) = seeded_assets();
    let output = tmp.path().join("fresh");
    let mut pipeline = GenerationPipeline::new(DryRunCompositor::new(), &output)
        .with_sources_dir(assets.join("sources"))
        .with_elements(&[Element::Rock]);

    let report = pipeline.run(&RunOptions::default()).unwrap();
    assert_eq!(report.outputs.len(), expected_count(1, 3));
    assert!(!output.exists());
}

#[test]
fn invariant_missing_output_after_success_has_no_hash() {
    let (_tmp, assets) = seeded_assets();
    let mut pipeline = GenerationPipeline::new(SilentCompositor, &assets)
        .with_elements(&[Element::Air])
        .with_augments(&[Augment::Combo]);

    let report = pipeline.run(&RunOptions::default()).unwrap();
    assert!(report.success());
    assert_eq!(report.outputs.len(), 2);
    assert!(report.outputs.iter().all(|o| o.hash.is_none()));
}

#[test]
fn invariant_manifest_round_trips_report() {
    let (tmp, assets) = seeded_assets();
    let mut pipeline = GenerationPipeline::new(DryRunCompositor::new(), &assets)
        .with_elements(&[Element::Rock, Element::Paper])
        .with_augments(&[Augment::Combo]);
    let report = pipeline.run(&RunOptions::default()).unwrap();

    let path = tmp.path().join("manifest.json");
    write_manifest(&report, &path).unwrap();

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
    assert_eq!(json["planned"], 8);
    assert_eq!(json["manifest_hash"], report.manifest_hash.as_str());
    assert_eq!(json["outputs"].as_array().unwrap().len(), 8);
    assert!(!report.manifest_hash.is_empty());
}

#[test]
fn invariant_old_tool_is_rejected() {
    let (_tmp, assets) = seeded_assets();
    let mut pipeline = GenerationPipeline::new(AncientCompositor, &assets);

    let err = pipeline.run(&RunOptions::default()).unwrap_err();
    assert!(matches!(err, PipelineError::ToolVersionMismatch { .. }));
    assert!(err.to_string().contains("6.9.11"));
}

#[test]
fn invariant_combination_constructor_matches_plan() {
    let combos: BTreeSet<_> = plan(&Element::ALL, &Augment::ALL).into_iter().collect();
    for element in Element::ALL {
        for aspect in Element::ALL {
            let combo = Combination::new(element, Some(aspect), Some(Augment::Armored));
            assert_eq!(combo.is_some(), element != aspect);
            if let Some(combo) = combo {
                assert!(combos.contains(&combo));
            }
        }
    }
}
