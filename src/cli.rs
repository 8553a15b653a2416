use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};

use crate::dataset::{self, Selection, Session, DEFAULT_MAX_DISPLAY_WIDTH};
use crate::index;
use crate::layout::{self, Mode};
use crate::renderer;
use crate::scan;
use crate::select;
use crate::sync;

#[derive(Parser, Debug)]
#[command(
    name = "caseview",
    version,
    about = "Compare rendered simulation case images side by side, in a grid, as a blink pair, or as an animation"
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List case directories under the root
    Cases(CasesArgs),
    /// List variable image folders for one case
    Variables(VariablesArgs),
    /// Show the per-view frame index of one case
    Index(IndexArgs),
    /// List camera views available in every selected case
    Views(ViewsArgs),
    /// Render one synchronized comparison sheet
    Render(RenderArgs),
    /// Render a comparison sheet per timeline position of the master case
    Animate(AnimateArgs),
    /// Copy the original full-resolution asset of one frame
    Export(ExportArgs),
}

#[derive(Args, Debug)]
struct CasesArgs {
    /// Directory containing the 3-digit case directories
    #[arg(long)]
    root: PathBuf,
}

#[derive(Args, Debug)]
struct VariablesArgs {
    #[arg(long)]
    root: PathBuf,
    /// Case id, e.g. 001
    #[arg(long)]
    case: String,
}

#[derive(Args, Debug)]
struct IndexArgs {
    #[arg(long)]
    root: PathBuf,
    #[arg(long)]
    case: String,
    /// Variable image folder, e.g. slices_U
    #[arg(long)]
    variable: String,
    /// Emit the index as JSON instead of a table
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct ViewsArgs {
    #[arg(long)]
    root: PathBuf,
    /// Comma-separated case ids; the first is the master
    #[arg(long)]
    cases: String,
    #[arg(long)]
    variable: String,
}

#[derive(Args, Debug)]
struct RenderArgs {
    #[arg(long)]
    root: PathBuf,
    /// Comma-separated case ids; the first is the master
    #[arg(long)]
    cases: String,
    #[arg(long)]
    variable: String,
    /// Camera view label as parsed from the filenames
    #[arg(long)]
    view: String,
    /// Timeline position, bounded by the master case's sequence
    #[arg(long, default_value_t = 0)]
    position: usize,
    /// side-by-side, grid, or blink
    #[arg(long, default_value = "side-by-side")]
    mode: String,
    /// Which case of a blink pair is active (0 or 1)
    #[arg(long, default_value_t = 0)]
    active: usize,
    /// Display raster width budget in pixels
    #[arg(long, default_value_t = DEFAULT_MAX_DISPLAY_WIDTH)]
    max_width: u32,
    /// Output image path
    #[arg(long)]
    out: PathBuf,
}

#[derive(Args, Debug)]
struct AnimateArgs {
    #[arg(long)]
    root: PathBuf,
    /// Comma-separated case ids; the first is the master
    #[arg(long)]
    cases: String,
    #[arg(long)]
    variable: String,
    #[arg(long)]
    view: String,
    /// Display raster width budget in pixels
    #[arg(long, default_value_t = DEFAULT_MAX_DISPLAY_WIDTH)]
    max_width: u32,
    /// Directory receiving frame_NNNNNN.png sheets
    #[arg(long)]
    out_dir: PathBuf,
}

#[derive(Args, Debug)]
struct ExportArgs {
    #[arg(long)]
    root: PathBuf,
    #[arg(long)]
    case: String,
    #[arg(long)]
    variable: String,
    #[arg(long)]
    view: String,
    #[arg(long, default_value_t = 0)]
    position: usize,
    /// Destination for the untouched original asset
    #[arg(long)]
    out: PathBuf,
}

pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Cases(args) => run_cases(args),
        Commands::Variables(args) => run_variables(args),
        Commands::Index(args) => run_index(args),
        Commands::Views(args) => run_views(args),
        Commands::Render(args) => run_render(args),
        Commands::Animate(args) => run_animate(args),
        Commands::Export(args) => run_export(args),
    }
}

fn run_cases(args: CasesArgs) -> Result<()> {
    let cases = scan::list_cases(&args.root);
    if cases.is_empty() {
        log::warn!("no case directories under {}", args.root.display());
    }
    for case_id in cases {
        println!("{case_id}");
    }
    Ok(())
}

fn run_variables(args: VariablesArgs) -> Result<()> {
    let variables = scan::list_variables(&args.root, &args.case);
    if variables.is_empty() {
        log::warn!("no image folders for case {}", args.case);
    }
    for variable in variables {
        println!("{variable}");
    }
    Ok(())
}

fn run_index(args: IndexArgs) -> Result<()> {
    select::validate_selection(&[args.case.clone()], &args.variable, None, None)
        .map_err(anyhow::Error::msg)?;

    let case_index = index::build_case_index(&args.root, &args.case, &args.variable);
    let summary = index::summarize(&args.case, &args.variable, &case_index);

    if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("failed to serialize index summary")?
        );
        return Ok(());
    }

    if summary.views.is_empty() {
        println!("case {} has no data for {}", args.case, args.variable);
        return Ok(());
    }
    for view in &summary.views {
        println!(
            "{}: {} frame(s), keys {}..{}",
            view.view, view.frames, view.first_key, view.last_key
        );
    }
    Ok(())
}

fn run_views(args: ViewsArgs) -> Result<()> {
    let case_ids = select::parse_case_list(&args.cases).map_err(anyhow::Error::msg)?;
    select::validate_selection(&case_ids, &args.variable, None, None)
        .map_err(anyhow::Error::msg)?;

    let dataset = dataset::assemble_metadata_only(&Selection {
        base_path: args.root.clone(),
        case_ids: case_ids.clone(),
        variable: args.variable.clone(),
        max_display_width: 0,
    });

    if dataset.is_empty() {
        log::warn!("no selected case has data for {}", args.variable);
    }
    let views = sync::common_views(&dataset, &case_ids);
    if views.is_empty() {
        log::warn!("no view is present in every selected case");
    }
    for view in views {
        println!("{view}");
    }
    Ok(())
}

fn run_render(args: RenderArgs) -> Result<()> {
    let case_ids = select::parse_case_list(&args.cases).map_err(anyhow::Error::msg)?;
    let mode = select::parse_mode(&args.mode).map_err(anyhow::Error::msg)?;
    if mode == Mode::Animated {
        bail!("animated output has its own command; use `caseview animate`.");
    }
    select::validate_selection(&case_ids, &args.variable, Some(&args.view), Some(mode))
        .map_err(anyhow::Error::msg)?;

    let mut session = Session::new();
    let dataset = session.load(&Selection {
        base_path: args.root.clone(),
        case_ids: case_ids.clone(),
        variable: args.variable.clone(),
        max_display_width: args.max_width,
    });

    let timeline = sync::master_len(&dataset, &case_ids, &args.view);
    if timeline == 0 {
        bail!(
            "master case {} has no frames for view '{}' in {}",
            case_ids[0],
            args.view,
            args.variable
        );
    }
    let position = args.position.min(timeline - 1);
    if position != args.position {
        log::debug!("position {} clamped to master timeline end {}", args.position, position);
    }

    let resolved = sync::resolve(&dataset, &case_ids, &args.view, position);
    for slot in &resolved {
        if slot.frame.is_none() {
            log::warn!("case {} is missing view '{}'", slot.case_id, args.view);
        }
    }

    let input = layout::prepare(mode, resolved, args.active)?;
    match &input {
        layout::RenderInput::Blink { frames, active } => {
            let (path_a, path_b) = blink_pair_paths(&args.out);
            let [sheet_a, sheet_b] = renderer::render_blink(frames);
            renderer::save_sheet(&path_a, &sheet_a)?;
            renderer::save_sheet(&path_b, &sheet_b)?;
            println!(
                "wrote {} and {} (active: case {})",
                path_a.display(),
                path_b.display(),
                frames[*active].case_id
            );
        }
        layout::RenderInput::Tiled { .. } => {
            let sheet = renderer::render_sheet(&input);
            renderer::save_sheet(&args.out, &sheet)?;
            println!("wrote {}", args.out.display());
        }
    }

    if dataset.dropped_frames() > 0 {
        log::info!("{} unreadable frame(s) were dropped during load", dataset.dropped_frames());
    }
    Ok(())
}

fn run_animate(args: AnimateArgs) -> Result<()> {
    let case_ids = select::parse_case_list(&args.cases).map_err(anyhow::Error::msg)?;
    select::validate_selection(&case_ids, &args.variable, Some(&args.view), Some(Mode::Animated))
        .map_err(anyhow::Error::msg)?;

    let mut session = Session::new();
    let dataset = session.load(&Selection {
        base_path: args.root.clone(),
        case_ids: case_ids.clone(),
        variable: args.variable.clone(),
        max_display_width: args.max_width,
    });

    let inputs = layout::prepare_animation(&dataset, &case_ids, &args.view);
    if inputs.is_empty() {
        bail!(
            "master case {} has no frames for view '{}' in {}",
            case_ids[0],
            args.view,
            args.variable
        );
    }

    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("failed to create {}", args.out_dir.display()))?;
    for (position, input) in inputs.iter().enumerate() {
        let sheet = renderer::render_sheet(input);
        let path = args.out_dir.join(renderer::animation_frame_name(position));
        renderer::save_sheet(&path, &sheet)?;
    }

    println!("wrote {} frame sheet(s) to {}", inputs.len(), args.out_dir.display());
    Ok(())
}

fn run_export(args: ExportArgs) -> Result<()> {
    select::validate_selection(&[args.case.clone()], &args.variable, Some(&args.view), None)
        .map_err(anyhow::Error::msg)?;

    let case_index = index::build_case_index(&args.root, &args.case, &args.variable);
    let Some(sequence) = case_index.sequence(&args.view) else {
        bail!(
            "case {} has no view '{}' in {}",
            args.case,
            args.view,
            args.variable
        );
    };

    let position = args.position.min(sequence.len().saturating_sub(1));
    // Export always reads the original asset, never the display raster.
    let source = &sequence[position].source_path;
    fs::copy(source, &args.out).with_context(|| {
        format!(
            "failed to copy {} to {}",
            source.display(),
            args.out.display()
        )
    })?;

    println!("exported {} to {}", source.display(), args.out.display());
    Ok(())
}

fn blink_pair_paths(out: &Path) -> (PathBuf, PathBuf) {
    let stem = out
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("blink");
    let extension = out
        .extension()
        .and_then(|value| value.to_str())
        .unwrap_or("png");
    let parent = out.parent().unwrap_or_else(|| Path::new(""));
    (
        parent.join(format!("{stem}_a.{extension}")),
        parent.join(format!("{stem}_b.{extension}")),
    )
}
