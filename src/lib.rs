//! MaskPaint: binary mask painting over raw RGBA buffers.
//!
//! An [`EditorSession`] owns one [`PixelBuffer`] together with the brush and
//! fill tools and a bounded undo/redo history.  Masks are loaded from a plain
//! image file or a category/index [`Dataset`], edited through the session API
//! or a textual [`MaskCommand`] script, and exported as PNG.

pub mod canvas;
pub mod cli;
pub mod commands;
pub mod components;
pub mod dataset;
pub mod error;
pub mod io;
pub mod logger;
pub mod ops;
pub mod session;
pub mod settings;

pub use canvas::{CanvasSnapshot, PixelBuffer};
pub use commands::{MaskCommand, ScriptCommand, parse_script};
pub use components::history::HistoryManager;
pub use components::tools::{MaskColor, ToolState};
pub use dataset::Dataset;
pub use error::{MaskError, MaskResult};
pub use io::{LoadedImage, LocalFileStore, MaskKey, MaskStore};
pub use ops::flood_fill::FillOutcome;
pub use session::{EditorSession, SessionOptions};
pub use settings::MaskSettings;
