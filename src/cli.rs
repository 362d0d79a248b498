// ============================================================================
// MaskFE CLI — headless mask painting via replayed gesture scripts
// ============================================================================
//
// Usage examples:
//   maskfe --input photo.png --script edits.txt --output photo_mask.png
//   maskfe -i shots/*.jpg --script box.txt --output-dir masks/
//   maskfe -i photo.png --script edits.txt --container 800x600 --verbose
//
// No GUI is opened in CLI mode. Each input is loaded, the script's pointer
// and control events are fed through the same `MaskEditor` the GUI uses, and
// the binary mask is written as PNG.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::str::FromStr;
use std::time::Instant;

use clap::Parser;

use crate::components::tools::ToolMode;
use crate::editor::MaskEditor;
use crate::io::{IMAGE_EXTENSIONS, MaskError, mask_file_name, save_mask_png};
use crate::ops::transform::ScreenPos;
use crate::settings::EditorSettings;

#[cfg(test)]
#[path = "cli_test.rs"]
mod cli_test;

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// MaskFE headless mask painter.
#[derive(Parser, Debug)]
#[command(
    name = "maskfe",
    about = "MaskFE headless mask painter",
    long_about = "Replay a gesture script against image files and write the binary\n\
                  mask (white = painted, black = untouched) without opening the GUI.\n\n\
                  Example:\n  \
                  maskfe --input photo.png --script edits.txt --output photo_mask.png\n  \
                  maskfe -i *.jpg --script box.txt --output-dir masks/"
)]
pub struct CliArgs {
    /// Input image(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Gesture script replayed on each input.
    /// If omitted, an empty (all-black) mask is written.
    #[arg(short, long, value_name = "SCRIPT")]
    pub script: Option<PathBuf>,

    /// Output mask path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing. Masks are named `<stem>_mask.png`.
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Canvas area the script's screen coordinates refer to, e.g. `800x600`.
    /// When omitted the image is shown at its native size.
    #[arg(long, value_name = "WxH", value_parser = parse_container)]
    pub container: Option<(f64, f64)>,

    /// Print per-file timing and history information, and mirror the editor
    /// log to stderr.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i")
    }
}

fn parse_container(s: &str) -> Result<(f64, f64), String> {
    let (w, h) = s
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WxH, got '{}'", s))?;
    let w: f64 = w.trim().parse().map_err(|_| format!("bad width in '{}'", s))?;
    let h: f64 = h.trim().parse().map_err(|_| format!("bad height in '{}'", s))?;
    if w <= 0.0 || h <= 0.0 {
        return Err(format!("container must be positive, got '{}'", s));
    }
    Ok((w, h))
}

// ============================================================================
// Gesture scripts
// ============================================================================

/// One line of a gesture script. Coordinates are screen pixels relative to
/// the canvas area.
#[derive(Clone, Debug, PartialEq)]
pub enum ScriptCommand {
    Tool(ToolMode),
    Color(String),
    Opacity(f32),
    Brush(f64),
    Zoom(f64),
    ResetZoom,
    Container(f64, f64),
    Down(ScreenPos),
    Move(ScreenPos),
    Up(ScreenPos),
    Leave,
    Wheel(ScreenPos, f64),
    /// Down at the first point, moves through the rest, up at the last.
    Stroke(Vec<ScreenPos>),
    Click(ScreenPos),
    Undo,
    Redo,
    Clear,
}

/// Parse a whole script. Blank lines and lines starting with `#` are
/// skipped (a `#` later in the line belongs to a hex color); the first
/// malformed line aborts with its 1-based line number.
pub fn parse_script(src: &str) -> Result<Vec<ScriptCommand>, MaskError> {
    let mut commands = Vec::new();
    for (idx, raw) in src.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let cmd = parse_line(line).map_err(|message| MaskError::InvalidScript { line: idx + 1, message })?;
        commands.push(cmd);
    }
    Ok(commands)
}

fn parse_line(line: &str) -> Result<ScriptCommand, String> {
    let mut words = line.split_whitespace();
    let Some(verb) = words.next() else {
        return Err("empty command".to_string());
    };
    let args: Vec<&str> = words.collect();

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "tool" => {
            let [mode] = args[..] else { return Err(arity(verb, "<mode>")) };
            ScriptCommand::Tool(ToolMode::from_str(mode)?)
        }
        // Colors may contain spaces: `rgba(255, 0, 0, 1)`.
        "color" => {
            if args.is_empty() {
                return Err(arity(verb, "<css color>"));
            }
            ScriptCommand::Color(args.join(" "))
        }
        "opacity" => {
            let [v] = args[..] else { return Err(arity(verb, "<0..1>")) };
            let v: f32 = number(v)?;
            if !(0.0..=1.0).contains(&v) {
                return Err(format!("opacity {} is outside 0..1", v));
            }
            ScriptCommand::Opacity(v)
        }
        "brush" => {
            let [v] = args[..] else { return Err(arity(verb, "<px>")) };
            ScriptCommand::Brush(number(v)?)
        }
        "zoom" => {
            let [v] = args[..] else { return Err(arity(verb, "<percent>")) };
            ScriptCommand::Zoom(number(v)?)
        }
        "reset-zoom" => {
            no_args(verb, &args)?;
            ScriptCommand::ResetZoom
        }
        "container" => {
            let [w, h] = args[..] else { return Err(arity(verb, "<w> <h>")) };
            ScriptCommand::Container(number(w)?, number(h)?)
        }
        "down" => ScriptCommand::Down(point(verb, &args)?),
        "move" => ScriptCommand::Move(point(verb, &args)?),
        "up" => ScriptCommand::Up(point(verb, &args)?),
        "click" => ScriptCommand::Click(point(verb, &args)?),
        "leave" => {
            no_args(verb, &args)?;
            ScriptCommand::Leave
        }
        "wheel" => {
            let [x, y, dy] = args[..] else { return Err(arity(verb, "<x> <y> <dy>")) };
            ScriptCommand::Wheel(ScreenPos::new(number(x)?, number(y)?), number(dy)?)
        }
        "stroke" => {
            if args.len() < 4 || args.len() % 2 != 0 {
                return Err(arity(verb, "<x1> <y1> <x2> <y2> ..."));
            }
            let points = args
                .chunks(2)
                .map(|xy| -> Result<ScreenPos, String> { Ok(ScreenPos::new(number(xy[0])?, number(xy[1])?)) })
                .collect::<Result<Vec<_>, _>>()?;
            ScriptCommand::Stroke(points)
        }
        "undo" => {
            no_args(verb, &args)?;
            ScriptCommand::Undo
        }
        "redo" => {
            no_args(verb, &args)?;
            ScriptCommand::Redo
        }
        "clear" => {
            no_args(verb, &args)?;
            ScriptCommand::Clear
        }
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(cmd)
}

fn number<T: FromStr>(s: &str) -> Result<T, String> {
    s.parse::<T>().map_err(|_| format!("'{}' is not a number", s))
}

fn point(verb: &str, args: &[&str]) -> Result<ScreenPos, String> {
    let [x, y] = args[..] else { return Err(arity(verb, "<x> <y>")) };
    Ok(ScreenPos::new(number(x)?, number(y)?))
}

fn no_args(verb: &str, args: &[&str]) -> Result<(), String> {
    if args.is_empty() { Ok(()) } else { Err(format!("'{}' takes no arguments", verb)) }
}

fn arity(verb: &str, usage: &str) -> String {
    format!("usage: {} {}", verb, usage)
}

/// Feed parsed commands into an editor that already has an image.
pub fn replay(editor: &mut MaskEditor, commands: &[ScriptCommand]) -> Result<(), MaskError> {
    for cmd in commands {
        match cmd {
            ScriptCommand::Tool(mode) => editor.set_tool_mode(*mode),
            ScriptCommand::Color(css) => {
                if !editor.set_mask_color_str(css) {
                    return Err(MaskError::InvalidColor(css.clone()));
                }
            }
            ScriptCommand::Opacity(v) => editor.set_opacity(*v),
            ScriptCommand::Brush(px) => editor.set_brush_size(*px),
            ScriptCommand::Zoom(pct) => editor.set_zoom(*pct),
            ScriptCommand::ResetZoom => editor.reset_zoom(),
            ScriptCommand::Container(w, h) => editor.set_container_size(*w, *h),
            ScriptCommand::Down(p) => editor.on_pointer_down(*p),
            ScriptCommand::Move(p) => {
                editor.on_pointer_move(*p);
                editor.on_frame();
            }
            ScriptCommand::Up(p) => editor.on_pointer_up(*p),
            ScriptCommand::Leave => editor.on_pointer_leave(),
            ScriptCommand::Wheel(p, dy) => editor.on_wheel(*p, *dy),
            ScriptCommand::Stroke(points) => {
                if let Some((first, rest)) = points.split_first() {
                    editor.on_pointer_down(*first);
                    for p in rest {
                        editor.on_pointer_move(*p);
                    }
                    editor.on_pointer_up(*points.last().unwrap_or(first));
                }
            }
            ScriptCommand::Click(p) => {
                editor.on_pointer_down(*p);
                editor.on_pointer_up(*p);
            }
            ScriptCommand::Undo => editor.undo(),
            ScriptCommand::Redo => editor.redo(),
            ScriptCommand::Clear => editor.clear_mask(),
        }
    }
    Ok(())
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    if args.verbose {
        crate::logger::set_echo(true);
    }

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

    // Parse the script once; a broken script fails every input the same way.
    let commands = match &args.script {
        Some(path) => {
            let src = match std::fs::read_to_string(path) {
                Ok(src) => src,
                Err(e) => {
                    eprintln!("error: could not read script '{}': {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            };
            match parse_script(&src) {
                Ok(cmds) => cmds,
                Err(e) => {
                    eprintln!("error: {}: {}", path.display(), e);
                    return ExitCode::FAILURE;
                }
            }
        }
        None => Vec::new(),
    };

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!("error: could not create output directory '{}': {}", dir.display(), e);
        return ExitCode::FAILURE;
    }

    let settings = EditorSettings::load();
    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }

        let file_start = Instant::now();
        let output_path = build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref());

        match run_one(input_path, &output_path, &commands, &settings, args.container, args.verbose) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    input: &Path,
    output: &Path,
    commands: &[ScriptCommand],
    settings: &EditorSettings,
    container: Option<(f64, f64)>,
    verbose: bool,
) -> Result<(), MaskError> {
    let mut editor = MaskEditor::new(settings.clone());
    if let Some((w, h)) = container {
        editor.set_container_size(w, h);
    }

    // -- Step 1: Load ----------------------------------------------------
    editor.load_image(input.to_path_buf());
    editor.wait_for_image()?;

    // -- Step 2: Replay ---------------------------------------------------
    replay(&mut editor, commands)?;
    if verbose {
        println!(
            "  {} command(s), history length {}, zoom {}%",
            commands.len(),
            editor.history().len(),
            editor.zoom_percentage()
        );
    }

    // -- Step 3: Save ----------------------------------------------------
    let encoded = editor
        .get_mask_data()
        .ok_or_else(|| MaskError::Encode("no mask to export".to_string()))?;
    save_mask_png(&encoded, output)
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
/// Literal paths are taken as given; glob matches are filtered to image
/// extensions so `shots/*` does not pick up sidecar files.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();
    let push = |path: PathBuf, result: &mut Vec<PathBuf>| {
        if !result.contains(&path) {
            result.push(path);
        }
    };

    for pattern in patterns {
        let literal = Path::new(pattern);
        if literal.exists() {
            push(literal.to_path_buf(), &mut result);
            continue;
        }

        let entries = match glob::glob(pattern) {
            Ok(entries) => entries,
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
                continue;
            }
        };
        let before = result.len();
        for path in entries.flatten().filter(|p| has_image_extension(p)) {
            push(path, &mut result);
        }
        if result.len() == before {
            eprintln!("warning: pattern '{}' matched no images.", pattern);
        }
    }

    result
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(e)))
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output`
/// 2. `--output-dir` joined with `<stem>_mask.png`
/// 3. `<stem>_mask.png` next to the input
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> PathBuf {
    if let Some(out) = output {
        return out.to_path_buf();
    }
    let name = mask_file_name(input);
    match output_dir {
        Some(dir) => dir.join(name),
        None => input.parent().unwrap_or(Path::new(".")).join(name),
    }
}
