//! RPS Glyphs CLI - Regenerates every glyph under ./assets
//!
//! Commands: generate (default), plan, check
//! Outputs JSON to stdout, logs to stderr
//! Returns non-zero on generation or validation failure

use clap::{Args, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use std::path::PathBuf;
use std::process::ExitCode;

use rpsglyphs_core::{
    Augment, Compositor, DryRunCompositor, Element, ErrorPolicy, FailureMode, GenerationPipeline,
    Layout, MagickCompositor, PipelineError, RunOptions, write_manifest,
};

#[derive(Parser)]
#[command(name = "rpsglyphs-cli")]
#[command(about = "RPS Glyphs CLI - Sprite Glyph Compositor")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Directory generated glyphs are written to
    #[arg(short, long, global = true, default_value = "assets")]
    assets_dir: PathBuf,

    /// Directory holding <identity>.png sources [default: <assets-dir>/sources]
    #[arg(short, long, global = true)]
    sources_dir: Option<PathBuf>,

    /// JSON layout overriding canvas size and badge geometry
    #[arg(short, long, global = true)]
    layout: Option<PathBuf>,

    /// ImageMagick 7 executable
    #[arg(long, global = true, default_value = "magick")]
    magick: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite every glyph (default)
    Generate(GenerateArgs),

    /// List planned outputs and their recipes
    Plan {
        #[command(flatten)]
        filters: Filters,
    },

    /// Run preflight validation only
    Check {
        #[command(flatten)]
        filters: Filters,

        #[arg(long, value_enum, default_value_t = MissingSource::Block)]
        on_missing_source: MissingSource,
    },
}

#[derive(Args, Default)]
struct Filters {
    /// Restrict to these elements (repeatable)
    #[arg(long = "element")]
    elements: Vec<Element>,

    /// Restrict to these augments (repeatable)
    #[arg(long = "augment")]
    augments: Vec<Augment>,
}

#[derive(Args, Default)]
struct GenerateArgs {
    #[command(flatten)]
    filters: Filters,

    /// Continue past failed invocations and report them at the end
    #[arg(long)]
    keep_going: bool,

    #[arg(long, value_enum, default_value_t = MissingSource::Block)]
    on_missing_source: MissingSource,

    /// Plan and validate without invoking the compositor
    #[arg(long)]
    dry_run: bool,

    /// Delete stale glyphs not in the plan
    #[arg(long, conflicts_with_all = ["elements", "augments", "dry_run"])]
    prune: bool,

    /// Write the run report to this path
    #[arg(long)]
    manifest: Option<PathBuf>,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum MissingSource {
    /// Abort before compositing anything
    #[default]
    Block,
    /// Skip glyphs that need the missing source
    Skip,
}

impl From<MissingSource> for FailureMode {
    fn from(value: MissingSource) -> Self {
        match value {
            MissingSource::Block => FailureMode::Block,
            MissingSource::Skip => FailureMode::Skip,
        }
    }
}

/// Where to read sources and write glyphs
struct Dirs {
    assets: PathBuf,
    sources: PathBuf,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or("info")
    )
    .init();

    let cli = Cli::parse();

    let layout = match &cli.layout {
        Some(path) => match Layout::load_from_file(path) {
            Ok(l) => l,
            Err(e) => {
                eprintln!(r#"{{"error": "Failed to load layout: {}"}}"#, e);
                return ExitCode::FAILURE;
            }
        },
        None => Layout::default(),
    };

    let dirs = Dirs {
        sources: cli.sources_dir.unwrap_or_else(|| cli.assets_dir.join("sources")),
        assets: cli.assets_dir,
    };
    let magick = MagickCompositor::with_program(cli.magick);

    // No subcommand regenerates everything
    let command = cli.command.unwrap_or_else(|| Commands::Generate(GenerateArgs::default()));

    match command {
        Commands::Plan { filters } => {
            let pipeline = build_pipeline(magick, &dirs, layout, &filters);
            print_json(&pipeline.planned_assets())
        }

        Commands::Check { filters, on_missing_source } => {
            let pipeline = build_pipeline(magick, &dirs, layout, &filters);
            let result = pipeline.preflight(on_missing_source.into());
            let code = print_json(&result);
            if result.valid {
                code
            } else {
                ExitCode::from(2)  // Validation failure
            }
        }

        Commands::Generate(args) => {
            if args.dry_run {
                let pipeline = build_pipeline(DryRunCompositor::new(), &dirs, layout, &args.filters);
                generate(pipeline, &args)
            } else {
                let pipeline = build_pipeline(magick, &dirs, layout, &args.filters);
                generate(pipeline, &args)
            }
        }
    }
}

fn build_pipeline<C: Compositor>(
    compositor: C,
    dirs: &Dirs,
    layout: Layout,
    filters: &Filters,
) -> GenerationPipeline<C> {
    let mut pipeline = GenerationPipeline::new(compositor, &dirs.assets)
        .with_sources_dir(&dirs.sources)
        .with_layout(layout);

    if !filters.elements.is_empty() {
        pipeline = pipeline.with_elements(&filters.elements);
    }
    if !filters.augments.is_empty() {
        pipeline = pipeline.with_augments(&filters.augments);
    }
    pipeline
}

fn generate<C: Compositor>(mut pipeline: GenerationPipeline<C>, args: &GenerateArgs) -> ExitCode {
    let options = RunOptions {
        failure_mode: args.on_missing_source.into(),
        error_policy: if args.keep_going {
            ErrorPolicy::KeepGoing
        } else {
            ErrorPolicy::FailFast
        },
        prune: args.prune,
    };

    let report = match pipeline.run(&options) {
        Ok(r) => r,
        Err(e) => {
            let output = serde_json::json!({
                "success": false,
                "error": e.to_string(),
            });
            print_json(&output);
            return match e {
                PipelineError::Io(_) | PipelineError::SerializationError(_) => ExitCode::FAILURE,
                _ => ExitCode::from(2),  // Generation failure
            };
        }
    };

    if let Some(path) = &args.manifest {
        if let Err(e) = write_manifest(&report, path) {
            log::error!("Failed to write manifest {}: {}", path.display(), e);
            return ExitCode::FAILURE;
        }
    }

    let success = report.success();
    let output = serde_json::json!({
        "success": success,
        "dry_run": args.dry_run,
        "report": report,
    });
    let code = print_json(&output);

    if success {
        code
    } else {
        ExitCode::from(2)
    }
}

fn print_json<T: Serialize>(value: &T) -> ExitCode {
    match serde_json::to_string_pretty(value) {
        Ok(json) => {
            println!("{}", json);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!(r#"{{"error": "Failed to serialize output: {}"}}"#, e);
            ExitCode::FAILURE
        }
    }
}
