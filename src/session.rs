use std::path::PathBuf;
use uuid::Uuid;

use crate::canvas::PixelBuffer;
use crate::commands::{MaskCommand, ScriptCommand};
use crate::components::history::HistoryManager;
use crate::components::tools::{MaskColor, ToolState};
use crate::error::{MaskError, MaskResult};
use crate::io::{self, LoadedImage, MaskKey, MaskStore};
use crate::ops::flood_fill::{self, FillOutcome};
use crate::ops::stroke::StrokeRasterizer;
use crate::settings::MaskSettings;

/// Optional capabilities of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SessionOptions {
    /// Whether `fill` is available.
    pub flood_fill: bool,
    /// Run the one-pixel bleed pass after each fill.
    pub bleed: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            flood_fill: true,
            bleed: true,
        }
    }
}

// ============================================================================
// EDITOR SESSION
// ============================================================================

/// One mask being edited: the pixel buffer plus everything that acts on it.
///
/// Every gesture that changes pixels records exactly one history entry before
/// touching the buffer.  Rejected commands leave the session as it was.
pub struct EditorSession {
    pub id: Uuid,
    buffer: PixelBuffer,
    tools: ToolState,
    history: HistoryManager,
    stroke: StrokeRasterizer,
    options: SessionOptions,
    /// File name of the image this mask belongs to, when known.
    source_name: Option<String>,
    is_dirty: bool,
}

impl EditorSession {
    /// Empty (black) mask of the given size with default tools.
    pub fn new(width: u32, height: u32) -> MaskResult<Self> {
        Self::with_settings(width, height, &MaskSettings::default())
    }

    pub fn with_settings(width: u32, height: u32, settings: &MaskSettings) -> MaskResult<Self> {
        let mut tools = ToolState::default();
        tools.set_brush_size(settings.brush_size as i64)?;
        tools.set_spacing(settings.brush_spacing)?;
        tools.set_color(settings.default_color);
        tools.tolerance = settings.fill_tolerance;

        let session = Self {
            id: Uuid::new_v4(),
            buffer: PixelBuffer::new(width, height)?,
            tools,
            history: HistoryManager::new(settings.history_size),
            stroke: StrokeRasterizer::new(),
            options: SessionOptions {
                flood_fill: settings.flood_fill,
                bleed: settings.bleed,
            },
            source_name: None,
            is_dirty: false,
        };
        tracing::debug!(session = %session.id, "new session {}×{}", width, height);
        Ok(session)
    }

    /// Session over a loaded image, starting from its existing mask if any.
    pub fn from_image(loaded: LoadedImage, settings: &MaskSettings) -> MaskResult<Self> {
        let mut session = Self::with_settings(loaded.width, loaded.height, settings)?;
        session.load(loaded)?;
        Ok(session)
    }

    // ---- accessors ----

    pub fn buffer(&self) -> &PixelBuffer {
        &self.buffer
    }

    pub fn tools(&self) -> &ToolState {
        &self.tools
    }

    pub fn history(&self) -> &HistoryManager {
        &self.history
    }

    pub fn options(&self) -> SessionOptions {
        self.options
    }

    pub fn set_options(&mut self, options: SessionOptions) {
        self.options = options;
    }

    pub fn source_name(&self) -> Option<&str> {
        self.source_name.as_deref()
    }

    pub fn is_dirty(&self) -> bool {
        self.is_dirty
    }

    pub fn is_stroking(&self) -> bool {
        self.stroke.is_active()
    }

    // ---- buffer lifecycle ----

    /// Replace the buffer with a fresh `width × height` one, optionally
    /// initialised from raw RGBA bytes.  History and any stroke are reset.
    pub fn new_buffer(&mut self, width: u32, height: u32, initial: Option<Vec<u8>>) -> MaskResult<()> {
        let buffer = match initial {
            Some(raw) => PixelBuffer::from_raw(width, height, raw)?,
            None => PixelBuffer::new(width, height)?,
        };
        self.replace_buffer(buffer);
        tracing::info!(session = %self.id, "new buffer {}×{}", width, height);
        Ok(())
    }

    /// Switch to another image.  History belongs to the previous image and
    /// is dropped.
    pub fn load(&mut self, loaded: LoadedImage) -> MaskResult<()> {
        let buffer = loaded.to_buffer()?;
        self.replace_buffer(buffer);
        tracing::info!(
            session = %self.id,
            "loaded {} ({}×{}, {})",
            loaded.source_name.as_deref().unwrap_or("<unnamed>"),
            loaded.width,
            loaded.height,
            if loaded.mask.is_some() { "existing mask" } else { "empty mask" }
        );
        self.source_name = loaded.source_name;
        Ok(())
    }

    fn replace_buffer(&mut self, buffer: PixelBuffer) {
        self.stroke.end();
        self.history.clear();
        self.buffer = buffer;
        self.source_name = None;
        self.is_dirty = false;
    }

    // ---- strokes ----

    /// Begin a drag at `(x, y)`.  Records one history entry for the whole
    /// drag and stamps the first disc.  An unfinished previous drag is ended.
    pub fn stroke_start(&mut self, x: f32, y: f32) -> MaskResult<()> {
        self.buffer.check_point(x, y)?;
        self.stroke.end();
        self.history.begin_mutation(&self.buffer);
        self.stroke.begin(&mut self.buffer, (x, y), &self.tools)?;
        self.is_dirty = true;
        tracing::debug!(
            session = %self.id,
            "stroke start ({}, {}) r={} {}",
            x,
            y,
            self.tools.brush_size(),
            self.tools.color()
        );
        Ok(())
    }

    /// Continue the current drag.  Returns the number of stamps placed; `0`
    /// when no drag is in progress (the move is ignored).
    pub fn stroke_move(&mut self, x: f32, y: f32) -> MaskResult<usize> {
        if !self.stroke.is_active() {
            return Ok(0);
        }
        self.stroke.draw_point(&mut self.buffer, (x, y), &self.tools)
    }

    pub fn stroke_end(&mut self) {
        if self.stroke.is_active() {
            tracing::debug!(session = %self.id, "stroke end");
        }
        self.stroke.end();
    }

    /// A complete drag through `points`.  All points are validated before
    /// anything is painted, so a bad point leaves the buffer untouched.
    pub fn stroke(&mut self, points: &[(f32, f32)]) -> MaskResult<()> {
        let Some((&(x0, y0), rest)) = points.split_first() else {
            return Err(MaskError::tool_state("a stroke needs at least one point"));
        };
        for &(x, y) in points {
            self.buffer.check_point(x, y)?;
        }
        self.stroke_start(x0, y0)?;
        for &(x, y) in rest {
            self.stroke_move(x, y)?;
        }
        self.stroke_end();
        Ok(())
    }

    // ---- flood fill ----

    /// Flood fill from `(x, y)` with the current color.  A fill that would
    /// change nothing does not touch the history.
    pub fn fill(&mut self, x: f32, y: f32) -> MaskResult<FillOutcome> {
        if !self.options.flood_fill {
            return Err(MaskError::tool_state("flood fill is disabled for this session"));
        }
        self.buffer.check_point(x, y)?;
        self.stroke_end();

        let color = self.tools.color().rgba();
        if self.buffer.get(x.floor() as u32, y.floor() as u32)? == color {
            tracing::debug!(session = %self.id, "fill ({}, {}) already {}", x, y, self.tools.color());
            return Ok(FillOutcome::Unchanged);
        }

        self.history.begin_mutation(&self.buffer);
        let outcome = flood_fill::flood_fill(
            &mut self.buffer,
            (x, y),
            color,
            self.tools.tolerance,
            self.options.bleed,
        )?;
        self.is_dirty = true;
        tracing::debug!(session = %self.id, "fill ({}, {}) -> {:?}", x, y, outcome);
        Ok(outcome)
    }

    // ---- history ----

    /// Returns `false` when there was nothing to undo.
    pub fn undo(&mut self) -> MaskResult<bool> {
        self.stroke_end();
        let undone = self.history.undo(&mut self.buffer)?;
        if undone {
            self.is_dirty = true;
            tracing::debug!(session = %self.id, "undo ({} left)", self.history.undo_count());
        }
        Ok(undone)
    }

    /// Returns `false` when there was nothing to redo.
    pub fn redo(&mut self) -> MaskResult<bool> {
        self.stroke_end();
        let redone = self.history.redo(&mut self.buffer)?;
        if redone {
            self.is_dirty = true;
            tracing::debug!(session = %self.id, "redo ({} left)", self.history.redo_count());
        }
        Ok(redone)
    }

    // ---- tool state ----

    pub fn set_brush_size(&mut self, size: i64) -> MaskResult<()> {
        self.tools.set_brush_size(size)
    }

    pub fn adjust_brush_size(&mut self, delta: i64) -> MaskResult<()> {
        self.tools.adjust_brush_size(delta)
    }

    pub fn set_color(&mut self, color: MaskColor) {
        self.tools.set_color(color);
    }

    pub fn switch_color(&mut self) -> MaskColor {
        self.tools.switch_color()
    }

    pub fn set_spacing(&mut self, spacing: f32) -> MaskResult<()> {
        self.tools.set_spacing(spacing)
    }

    pub fn set_tolerance(&mut self, tolerance: u8) {
        self.tools.tolerance = tolerance;
    }

    // ---- commands ----

    /// Apply one textual command.
    pub fn apply(&mut self, command: &MaskCommand) -> MaskResult<()> {
        match command {
            MaskCommand::StrokeStart { x, y } => self.stroke_start(*x, *y),
            MaskCommand::StrokeMove { x, y } => self.stroke_move(*x, *y).map(|_| ()),
            MaskCommand::StrokeEnd => {
                self.stroke_end();
                Ok(())
            }
            MaskCommand::Stroke(points) => self.stroke(points),
            MaskCommand::Fill { x, y } => self.fill(*x, *y).map(|_| ()),
            MaskCommand::Undo => self.undo().map(|_| ()),
            MaskCommand::Redo => self.redo().map(|_| ()),
            MaskCommand::SetBrushSize(n) => self.set_brush_size(*n),
            MaskCommand::AdjustBrushSize(d) => self.adjust_brush_size(*d),
            MaskCommand::SetColor(c) => {
                self.set_color(*c);
                Ok(())
            }
            MaskCommand::SwitchColor => {
                self.switch_color();
                Ok(())
            }
            MaskCommand::NewBuffer { width, height } => self.new_buffer(*width, *height, None),
        }
    }

    /// Replay a parsed script, stopping at the first failure.  The error is
    /// wrapped in [`MaskError::Command`] with the script line it came from;
    /// [`MaskError::root`] gives back the original kind.
    pub fn apply_all(&mut self, script: &[ScriptCommand]) -> MaskResult<usize> {
        for step in script {
            if let Err(e) = self.apply(&step.command) {
                self.stroke_end();
                tracing::debug!(session = %self.id, "line {} `{}` failed: {}", step.line, step.command, e);
                return Err(e.at_line(step.line));
            }
        }
        self.stroke_end();
        Ok(script.len())
    }

    // ---- export ----

    /// The current mask as PNG bytes.
    pub fn export_png(&self) -> MaskResult<Vec<u8>> {
        io::encode_png(&self.buffer)
    }

    /// The current mask as a `data:image/png;base64,...` URL.
    pub fn export_data_url(&self) -> MaskResult<String> {
        Ok(io::png_data_url(&self.export_png()?))
    }

    /// Key under which this mask is saved outside a dataset.
    pub fn file_key(&self) -> MaskKey {
        MaskKey::File {
            source_name: self.source_name.clone(),
        }
    }

    /// Encode and hand the mask to `store`.  Clears the dirty flag on success.
    pub fn save(&mut self, store: &dyn MaskStore, key: &MaskKey) -> MaskResult<PathBuf> {
        let png = self.export_png()?;
        let path = store.save_mask(key, &png)?;
        self.is_dirty = false;
        tracing::info!(session = %self.id, "saved {} bytes to {}", png.len(), path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::parse_script;
    use image::Rgba;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn white_pixels(s: &EditorSession) -> usize {
        s.buffer().as_raw().chunks(4).filter(|p| *p == WHITE.0).count()
    }

    #[test]
    fn one_drag_is_one_undo_step() {
        let mut s = EditorSession::new(50, 50).unwrap();
        s.stroke_start(5.0, 5.0).unwrap();
        for i in 1..20 {
            s.stroke_move(5.0 + i as f32 * 2.0, 5.0).unwrap();
        }
        s.stroke_end();
        assert_eq!(s.history().undo_count(), 1);
        assert!(white_pixels(&s) > 0);

        assert!(s.undo().unwrap());
        assert_eq!(white_pixels(&s), 0);
        assert!(!s.undo().unwrap());
    }

    #[test]
    fn move_without_start_is_ignored() {
        let mut s = EditorSession::new(10, 10).unwrap();
        assert_eq!(s.stroke_move(3.0, 3.0).unwrap(), 0);
        assert_eq!(white_pixels(&s), 0);
        assert!(!s.history().can_undo());
    }

    #[test]
    fn rejected_brush_size_keeps_the_previous_radius() {
        let mut a = EditorSession::new(40, 40).unwrap();
        a.set_brush_size(3).unwrap();
        assert!(matches!(a.set_brush_size(0), Err(MaskError::InvalidToolState(_))));
        a.stroke(&[(20.0, 20.0)]).unwrap();

        let mut b = EditorSession::new(40, 40).unwrap();
        b.set_brush_size(3).unwrap();
        b.stroke(&[(20.0, 20.0)]).unwrap();

        assert_eq!(a.buffer(), b.buffer());
        assert_eq!(a.tools().brush_size(), 3);
    }

    #[test]
    fn redo_is_a_no_op_after_a_new_stroke() {
        let mut s = EditorSession::new(30, 30).unwrap();
        s.stroke(&[(5.0, 5.0), (25.0, 5.0)]).unwrap();
        s.undo().unwrap();
        s.stroke(&[(5.0, 20.0)]).unwrap();
        let before = s.buffer().clone();
        assert!(!s.redo().unwrap());
        assert_eq!(s.buffer(), &before);
    }

    #[test]
    fn undo_redo_round_trip_is_exact() {
        let mut s = EditorSession::new(30, 30).unwrap();
        s.stroke(&[(2.0, 2.0), (28.0, 28.0)]).unwrap();
        s.set_color(MaskColor::Black);
        s.stroke(&[(2.0, 28.0), (28.0, 2.0)]).unwrap();
        let edited = s.buffer().clone();
        s.undo().unwrap();
        assert_ne!(s.buffer(), &edited);
        s.redo().unwrap();
        assert_eq!(s.buffer(), &edited);
    }

    #[test]
    fn fill_no_op_keeps_redo_and_history() {
        let mut s = EditorSession::new(20, 20).unwrap();
        s.stroke(&[(10.0, 10.0)]).unwrap();
        s.undo().unwrap();
        s.set_color(MaskColor::Black);
        assert_eq!(s.fill(3.0, 3.0).unwrap(), FillOutcome::Unchanged);
        assert!(s.history().can_redo());
        assert!(!s.history().can_undo());
    }

    #[test]
    fn fill_records_history_and_clears_redo() {
        let mut s = EditorSession::new(20, 20).unwrap();
        s.stroke(&[(10.0, 10.0)]).unwrap();
        s.undo().unwrap();
        let outcome = s.fill(0.0, 0.0).unwrap();
        assert!(outcome.changed());
        assert_eq!(white_pixels(&s), 400);
        assert!(!s.history().can_redo());
        s.undo().unwrap();
        assert_eq!(white_pixels(&s), 0);
    }

    #[test]
    fn disabled_fill_is_rejected_without_side_effects() {
        let settings = MaskSettings {
            flood_fill: false,
            ..MaskSettings::default()
        };
        let mut s = EditorSession::with_settings(8, 8, &settings).unwrap();
        assert!(matches!(s.fill(1.0, 1.0), Err(MaskError::InvalidToolState(_))));
        assert!(!s.history().can_undo());
        assert_eq!(s.buffer().get(1, 1).unwrap(), BLACK);
    }

    #[test]
    fn tolerance_and_bleed_can_change_mid_session() {
        let mut raw = [0u8, 0, 0, 255].repeat(6);
        raw[12..16].copy_from_slice(&[40, 40, 40, 255]);
        let mut s = EditorSession::new(6, 1).unwrap();
        s.new_buffer(6, 1, Some(raw)).unwrap();
        s.set_options(SessionOptions {
            flood_fill: true,
            bleed: false,
        });
        assert!(!s.options().bleed);

        s.set_tolerance(10);
        s.fill(0.0, 0.0).unwrap();
        assert_eq!(white_pixels(&s), 3);
        assert_eq!(s.buffer().get(3, 0).unwrap(), Rgba([40, 40, 40, 255]));

        s.undo().unwrap();
        s.set_tolerance(64);
        s.fill(0.0, 0.0).unwrap();
        assert_eq!(white_pixels(&s), 6);
    }

    #[test]
    fn out_of_bounds_start_records_nothing() {
        let mut s = EditorSession::new(10, 10).unwrap();
        assert!(matches!(s.stroke_start(10.0, 0.0), Err(MaskError::OutOfBounds { .. })));
        assert!(!s.history().can_undo());
        assert!(!s.is_stroking());
        assert!(s.stroke(&[(1.0, 1.0), (12.0, 1.0)]).is_err());
        assert_eq!(white_pixels(&s), 0);
        assert!(!s.history().can_undo());
    }

    #[test]
    fn new_buffer_resets_history() {
        let mut s = EditorSession::new(10, 10).unwrap();
        s.stroke(&[(5.0, 5.0)]).unwrap();
        s.new_buffer(4, 2, Some(vec![255; 4 * 2 * 4])).unwrap();
        assert_eq!(s.buffer().dimensions(), (4, 2));
        assert!(!s.history().can_undo());
        assert_eq!(white_pixels(&s), 8);
        assert!(s.new_buffer(4, 2, Some(vec![0; 3])).is_err());
        assert_eq!(s.buffer().dimensions(), (4, 2));
    }

    #[test]
    fn history_size_comes_from_settings() {
        let settings = MaskSettings {
            history_size: 2,
            ..MaskSettings::default()
        };
        let mut s = EditorSession::with_settings(10, 10, &settings).unwrap();
        for x in [1.0, 4.0, 7.0] {
            s.stroke(&[(x, 5.0)]).unwrap();
        }
        assert_eq!(s.history().undo_count(), 2);
    }

    #[test]
    fn script_replay_reports_the_failing_command() {
        let mut s = EditorSession::new(16, 16).unwrap();
        let cmds = parse_script("size 2\nstroke 1,1 14,14\nsize 0\n").unwrap();
        let err = s.apply_all(&cmds).unwrap_err();
        assert!(matches!(err, MaskError::Command { line: 3, .. }));
        assert!(matches!(err.root(), MaskError::InvalidToolState(_)));
        assert_eq!(s.tools().brush_size(), 2);
        assert_eq!(s.history().undo_count(), 1);
    }

    #[test]
    fn failing_line_is_counted_through_comments() {
        let mut s = EditorSession::new(10, 10).unwrap();
        let cmds = parse_script("# header comment\n\n# another\nsize 2\nfill 50 50\n").unwrap();
        let err = s.apply_all(&cmds).unwrap_err();
        assert!(matches!(err, MaskError::Command { line: 5, .. }));
        assert!(matches!(err.root(), MaskError::OutOfBounds { x: 50, y: 50, .. }));
        assert!(!s.history().can_undo());
    }

    #[test]
    fn export_produces_a_png_data_url() {
        let s = EditorSession::new(3, 3).unwrap();
        let url = s.export_data_url().unwrap();
        let (media, png) = io::decode_data_url(&url).unwrap();
        assert_eq!(media, "image/png");
        let decoded = io::decode_image_bytes(&png).unwrap();
        assert_eq!(decoded.as_raw().as_slice(), s.buffer().as_raw());
    }
}
