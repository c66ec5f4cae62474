// ============================================================================
// MaskPaint CLI: headless mask painting via command-line arguments
// ============================================================================
//
// Usage examples:
//   maskpaint -i photo.jpg -c edits.txt                  (writes photo_GT.png next to the input)
//   maskpaint -i photo.jpg --mask old.png -c fix.txt -o fixed.png
//   maskpaint -i "shots/*.jpg" -c outline.txt --output-dir masks/
//   maskpaint -i photo.jpg -c edits.txt --data-url       (prints a PNG data URL)
//   maskpaint --root-data-path data --category cats --index 3 -c edits.txt
//
// All processing runs synchronously, one input at a time.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;

use clap::Parser;

use crate::commands::{ScriptCommand, parse_script};
use crate::dataset::{Dataset, natural_cmp};
use crate::error::MaskResult;
use crate::io::{self, LocalFileStore, MaskKey};
use crate::session::EditorSession;
use crate::settings::MaskSettings;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MaskPaint headless mask painter.
///
/// Replays an edit script (strokes, fills, undo/redo) onto the mask of each
/// input image and saves the result as PNG.
#[derive(Parser, Debug)]
#[command(
    name = "maskpaint",
    about = "MaskPaint headless binary mask painter",
    long_about = "Paint binary (black/white) masks over images without a GUI.\n\
                  An edit script lists one command per line:\n  \
                  stroke_start X Y | stroke_move X Y | stroke_end | stroke X1,Y1 X2,Y2 ...\n  \
                  fill X Y | undo | redo | size N | grow N | shrink N\n  \
                  color white|black | switch_color | new W H\n\n\
                  Example:\n  \
                  maskpaint -i photo.jpg -c edits.txt -o photo_GT.png\n  \
                  maskpaint --root-data-path data --category cats --index 0 -c edits.txt"
)]
pub struct CliArgs {
    /// Input image(s). Glob patterns accepted (e.g. "*.jpg", "shots/*.png").
    #[arg(
        short,
        long,
        num_args = 1..,
        required_unless_present = "category",
        conflicts_with = "category"
    )]
    pub input: Vec<String>,

    /// Existing mask to start from (single input only). A mask of a
    /// different size is stretched to the image.
    #[arg(long, value_name = "FILE")]
    pub mask: Option<PathBuf>,

    /// Edit script to replay on each mask. Without it the starting mask is
    /// saved unchanged.
    #[arg(short, long, value_name = "SCRIPT")]
    pub commands: Option<PathBuf>,

    /// Output file path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Masks are named `<stem>_GT.png`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Print each mask as a `data:image/png;base64,` URL on stdout instead of
    /// writing it.
    #[arg(long)]
    pub data_url: bool,

    /// Dataset root containing `<category>/Images` and `<category>/Masks`.
    /// Defaults to `root_data_path` from the settings file.
    #[arg(long, value_name = "DIR")]
    pub root_data_path: Option<PathBuf>,

    /// Dataset category to edit (dataset mode).
    #[arg(long, requires = "index")]
    pub category: Option<String>,

    /// Image index within the category, in natural file-name order.
    #[arg(long, requires = "category")]
    pub index: Option<usize>,

    /// Undo depth (overrides the settings file).
    #[arg(long, value_name = "N")]
    pub history_size: Option<usize>,

    /// Flood-fill per-channel tolerance, 0-255 (overrides the settings file).
    #[arg(long, value_name = "0-255")]
    pub tolerance: Option<u8>,

    /// Disable the one-pixel bleed after flood fills.
    #[arg(long)]
    pub no_bleed: bool,

    /// Settings file to use instead of the per-user one.
    #[arg(long, value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Print per-file timing and mirror the log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Settings from `--settings` (or the per-user file) with flag overrides.
    pub fn resolve_settings(&self) -> MaskSettings {
        let mut settings = match &self.settings {
            Some(path) => MaskSettings::load_from(path),
            None => MaskSettings::load(),
        };
        if let Some(n) = self.history_size {
            settings.history_size = n;
        }
        if let Some(t) = self.tolerance {
            settings.fill_tolerance = t;
        }
        if self.no_bleed {
            settings.bleed = false;
        }
        if let Some(root) = &self.root_data_path {
            settings.root_data_path = root.clone();
        }
        settings
    }
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all masks succeeded, `1` = one or more failed.
pub fn run(args: CliArgs) -> ExitCode {
    let settings = args.resolve_settings();
    tracing::debug!("settings: {:?}", settings);

    let commands: Vec<ScriptCommand> = match &args.commands {
        Some(path) => match std::fs::read_to_string(path) {
            Ok(src) => match parse_script(&src) {
                Ok(cmds) => cmds,
                Err(e) => {
                    eprintln!("error: {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            },
            Err(e) => {
                eprintln!("error: could not read commands '{}': {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => Vec::new(),
    };

    if let (Some(category), Some(index)) = (&args.category, args.index) {
        return run_dataset(&args, &settings, category, index, &commands);
    }

    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }
    if inputs.len() > 1 && args.mask.is_some() {
        eprintln!("error: --mask can only be used with a single input file.");
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            eprintln!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let target = if args.data_url {
            Target::DataUrl
        } else {
            match build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref()) {
                Some(path) => Target::File(path),
                None => {
                    eprintln!("  error: cannot determine output path for '{}'.", input_path.display());
                    any_failure = true;
                    continue;
                }
            }
        };

        match run_one(input_path, args.mask.as_deref(), &commands, &settings, &target) {
            Ok(written) => {
                if let Some(path) = written
                    && (args.verbose || multi)
                {
                    eprintln!(
                        "  → {} ({:.0}ms)",
                        path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                tracing::error!("{}: {}", input_path.display(), e);
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-mask processing pipeline
// ============================================================================

/// Where a finished mask goes.
enum Target {
    /// `--output` path or a directory-derived `<stem>_GT.png`.
    File(PathBuf),
    DataUrl,
}

#[tracing::instrument(skip_all, fields(input = %input.display()))]
fn run_one(
    input: &Path,
    mask: Option<&Path>,
    commands: &[ScriptCommand],
    settings: &MaskSettings,
    target: &Target,
) -> MaskResult<Option<PathBuf>> {
    // -- Step 1: Load ----------------------------------------------------
    let loaded = io::load_source(input, mask)?;
    let mut session = EditorSession::from_image(loaded, settings)?;

    // -- Step 2: Replay edits --------------------------------------------
    session.apply_all(commands)?;

    // -- Step 3: Save ----------------------------------------------------
    match target {
        Target::DataUrl => {
            println!("{}", session.export_data_url()?);
            Ok(None)
        }
        Target::File(path) => {
            let dir = path.parent().unwrap_or(Path::new("."));
            let store = LocalFileStore::new(dir);
            let key = session.file_key();
            // Derived `<stem>_GT.png` names go through the store; explicit
            // --output paths are written as given.
            if store.path_for(&key) == *path {
                Ok(Some(session.save(&store, &key)?))
            } else {
                if !dir.as_os_str().is_empty() {
                    std::fs::create_dir_all(dir)?;
                }
                io::write_png(session.buffer(), path)?;
                tracing::info!("wrote {}", path.display());
                Ok(Some(path.clone()))
            }
        }
    }
}

fn run_dataset(
    args: &CliArgs,
    settings: &MaskSettings,
    category: &str,
    index: usize,
    commands: &[ScriptCommand],
) -> ExitCode {
    let dataset = Dataset::new(&settings.root_data_path);
    let key = MaskKey::Dataset {
        category: category.to_string(),
        index,
    };

    let result = dataset
        .load(category, index)
        .and_then(|loaded| EditorSession::from_image(loaded, settings))
        .and_then(|mut session| {
            session.apply_all(commands)?;
            if args.data_url {
                println!("{}", session.export_data_url()?);
                Ok(None)
            } else {
                session.save(&dataset, &key).map(Some)
            }
        });

    match result {
        Ok(Some(path)) => {
            if args.verbose {
                eprintln!("  → {}", path.display());
            }
            ExitCode::SUCCESS
        }
        Ok(None) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("{}/{}: {}", category, index, e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Turn `--input` arguments into the files to process.
///
/// An argument naming an existing file is taken literally; anything else is
/// a glob whose file matches are taken in natural name order.  A file reached
/// through several arguments is processed once, at its first position.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut seen: HashSet<PathBuf> = HashSet::new();
    let mut inputs = Vec::new();
    for pattern in patterns {
        for path in expand_input(pattern) {
            if seen.insert(path.clone()) {
                inputs.push(path);
            }
        }
    }
    inputs
}

fn expand_input(pattern: &str) -> Vec<PathBuf> {
    let literal = Path::new(pattern);
    if literal.is_file() {
        return vec![literal.to_path_buf()];
    }

    let entries = match glob::glob(pattern) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!("invalid glob '{}': {}", pattern, e);
            eprintln!("warning: invalid glob '{}': {}", pattern, e);
            return Vec::new();
        }
    };
    let mut files: Vec<PathBuf> = entries.filter_map(Result::ok).filter(|p| p.is_file()).collect();
    if files.is_empty() {
        tracing::warn!("'{}' matched no files", pattern);
        eprintln!("warning: '{}' matched no files.", pattern);
    }
    files.sort_by(|a, b| natural_cmp(&a.to_string_lossy(), &b.to_string_lossy()));
    files
}

/// Compute the mask path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, single-file input)
/// 2. `--output-dir` joined with `<stem>_GT.png`
/// 3. Fallback: `<stem>_GT.png` next to the input
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let name = input.file_name()?.to_string_lossy().into_owned();
    let file = io::suggested_mask_name(Some(&name));

    match output_dir {
        Some(dir) => Some(dir.join(file)),
        None => Some(input.parent().unwrap_or(Path::new(".")).join(file)),
    }
}
