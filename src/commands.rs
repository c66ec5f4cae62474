//! Textual edit commands.
//!
//! One verb per line; blank lines and `#` comments are skipped:
//!
//! ```text
//! new 640 480
//! size 8
//! stroke 10,10 120,40 200,45
//! color black
//! fill 300 200
//! undo
//! ```

use std::fmt;
use std::str::FromStr;

use crate::components::tools::MaskColor;
use crate::error::{MaskError, MaskResult};

/// A single discrete edit applied to an [`EditorSession`](crate::session::EditorSession).
#[derive(Clone, Debug, PartialEq)]
pub enum MaskCommand {
    StrokeStart { x: f32, y: f32 },
    StrokeMove { x: f32, y: f32 },
    StrokeEnd,
    /// A whole drag in one command: start, moves, end.
    Stroke(Vec<(f32, f32)>),
    Fill { x: f32, y: f32 },
    Undo,
    Redo,
    SetBrushSize(i64),
    /// Relative size change (`grow N` / `shrink N`).
    AdjustBrushSize(i64),
    SetColor(MaskColor),
    SwitchColor,
    NewBuffer { width: u32, height: u32 },
}

impl fmt::Display for MaskCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MaskCommand::StrokeStart { x, y } => write!(f, "stroke_start {} {}", x, y),
            MaskCommand::StrokeMove { x, y } => write!(f, "stroke_move {} {}", x, y),
            MaskCommand::StrokeEnd => f.write_str("stroke_end"),
            MaskCommand::Stroke(points) => {
                f.write_str("stroke")?;
                for (x, y) in points {
                    write!(f, " {},{}", x, y)?;
                }
                Ok(())
            }
            MaskCommand::Fill { x, y } => write!(f, "fill {} {}", x, y),
            MaskCommand::Undo => f.write_str("undo"),
            MaskCommand::Redo => f.write_str("redo"),
            MaskCommand::SetBrushSize(n) => write!(f, "size {}", n),
            MaskCommand::AdjustBrushSize(n) if *n < 0 => write!(f, "shrink {}", -n),
            MaskCommand::AdjustBrushSize(n) => write!(f, "grow {}", n),
            MaskCommand::SetColor(c) => write!(f, "color {}", c),
            MaskCommand::SwitchColor => f.write_str("switch_color"),
            MaskCommand::NewBuffer { width, height } => write!(f, "new {} {}", width, height),
        }
    }
}

// ---- argument helpers ----

fn number<T: FromStr>(verb: &str, arg: Option<&str>) -> Result<T, String> {
    let arg = arg.ok_or_else(|| format!("'{}' is missing an argument", verb))?;
    arg.parse()
        .map_err(|_| format!("'{}': '{}' is not a valid number", verb, arg))
}

fn coordinate(verb: &str, args: &[&str]) -> Result<(f32, f32), String> {
    if args.len() != 2 {
        return Err(format!("'{}' expects X Y, got {} argument(s)", verb, args.len()));
    }
    let x: f32 = number(verb, Some(args[0]))?;
    let y: f32 = number(verb, Some(args[1]))?;
    if !x.is_finite() || !y.is_finite() {
        return Err(format!("'{}': coordinates must be finite", verb));
    }
    Ok((x, y))
}

fn single<T: FromStr>(verb: &str, args: &[&str]) -> Result<T, String> {
    if args.len() > 1 {
        return Err(format!("'{}' takes one argument, got {}", verb, args.len()));
    }
    number(verb, args.first().copied())
}

fn no_args(verb: &str, args: &[&str]) -> Result<(), String> {
    if args.is_empty() {
        Ok(())
    } else {
        Err(format!("'{}' takes no arguments", verb))
    }
}

fn point(token: &str) -> Result<(f32, f32), String> {
    let (x, y) = token
        .split_once(',')
        .ok_or_else(|| format!("stroke point '{}' must be X,Y", token))?;
    coordinate("stroke", &[x.trim(), y.trim()])
}

fn parse_line(line: &str) -> Result<MaskCommand, String> {
    let mut tokens = line.split_whitespace();
    let verb = tokens.next().ok_or_else(|| "empty command".to_string())?;
    let args: Vec<&str> = tokens.collect();

    let cmd = match verb.to_ascii_lowercase().as_str() {
        "stroke_start" => {
            let (x, y) = coordinate(verb, &args)?;
            MaskCommand::StrokeStart { x, y }
        }
        "stroke_move" => {
            let (x, y) = coordinate(verb, &args)?;
            MaskCommand::StrokeMove { x, y }
        }
        "stroke_end" => {
            no_args(verb, &args)?;
            MaskCommand::StrokeEnd
        }
        "stroke" => {
            if args.is_empty() {
                return Err("'stroke' needs at least one X,Y point".to_string());
            }
            MaskCommand::Stroke(args.iter().map(|t| point(t)).collect::<Result<_, _>>()?)
        }
        "fill" => {
            let (x, y) = coordinate(verb, &args)?;
            MaskCommand::Fill { x, y }
        }
        "undo" => {
            no_args(verb, &args)?;
            MaskCommand::Undo
        }
        "redo" => {
            no_args(verb, &args)?;
            MaskCommand::Redo
        }
        "size" => MaskCommand::SetBrushSize(single(verb, &args)?),
        "grow" => MaskCommand::AdjustBrushSize(single::<u32>(verb, &args)? as i64),
        "shrink" => MaskCommand::AdjustBrushSize(-(single::<u32>(verb, &args)? as i64)),
        "color" => {
            if args.len() != 1 {
                return Err("'color' expects white or black".to_string());
            }
            MaskCommand::SetColor(args[0].parse().map_err(|e: MaskError| e.to_string())?)
        }
        "switch_color" => {
            no_args(verb, &args)?;
            MaskCommand::SwitchColor
        }
        "new" => {
            if args.len() != 2 {
                return Err("'new' expects W H".to_string());
            }
            MaskCommand::NewBuffer {
                width: number(verb, Some(args[0]))?,
                height: number(verb, Some(args[1]))?,
            }
        }
        other => return Err(format!("unknown command '{}'", other)),
    };
    Ok(cmd)
}

impl FromStr for MaskCommand {
    type Err = MaskError;

    /// Parse a single command line (no comment handling).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_line(s.trim()).map_err(|msg| MaskError::parse(1, msg))
    }
}

/// A parsed command and the 1-based script line it came from.
#[derive(Clone, Debug, PartialEq)]
pub struct ScriptCommand {
    pub line: usize,
    pub command: MaskCommand,
}

/// Parse a whole command script.  Errors carry the 1-based line number.
pub fn parse_script(source: &str) -> MaskResult<Vec<ScriptCommand>> {
    let mut commands = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let line = match raw.split_once('#') {
            Some((code, _)) => code,
            None => raw,
        }
        .trim();
        if line.is_empty() {
            continue;
        }
        let command = parse_line(line).map_err(|msg| MaskError::parse(idx + 1, msg))?;
        commands.push(ScriptCommand {
            line: idx + 1,
            command,
        });
    }
    Ok(commands)
}
