use std::collections::VecDeque;

use crate::canvas::{CanvasSnapshot, PixelBuffer};
use crate::error::{MaskError, MaskResult};

pub const DEFAULT_HISTORY_SIZE: usize = 5;

// ============================================================================
// HISTORY MANAGER - bounded undo/redo over full-canvas snapshots
// ============================================================================

/// Linear undo/redo history.
///
/// `past` holds the states before each gesture (most recent at the back) and
/// is capped at `max_history_size`; the oldest entry is evicted first.
/// `future` holds states undone since the last edit and is dropped as soon as
/// a new edit begins.  One entry per gesture, never per pixel.
pub struct HistoryManager {
    past: VecDeque<CanvasSnapshot>,
    future: Vec<CanvasSnapshot>,
    max_history_size: usize,
    /// Running byte total across both stacks.
    total_memory: usize,
}

impl Default for HistoryManager {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}

impl HistoryManager {
    pub fn new(max_history_size: usize) -> Self {
        Self {
            past: VecDeque::new(),
            future: Vec::new(),
            max_history_size,
            total_memory: 0,
        }
    }

    /// Record the state of `buffer` before an edit and drop the redo chain.
    pub fn begin_mutation(&mut self, buffer: &PixelBuffer) {
        for snap in self.future.drain(..) {
            self.total_memory = self.total_memory.saturating_sub(snap.memory_bytes());
        }
        self.push_past(buffer.snapshot());
    }

    /// Step back one gesture.  Returns `false` (and does nothing) when there
    /// is nothing to undo.
    pub fn undo(&mut self, buffer: &mut PixelBuffer) -> MaskResult<bool> {
        let Some(previous) = self.past.pop_back() else {
            return Ok(false);
        };
        if let Err(e) = check_fits(&previous, buffer) {
            self.past.push_back(previous);
            return Err(e);
        }
        self.total_memory = self.total_memory.saturating_sub(previous.memory_bytes());
        let current = buffer.snapshot();
        buffer.restore(previous)?;
        self.total_memory += current.memory_bytes();
        self.future.push(current);
        Ok(true)
    }

    /// Re-apply the most recently undone gesture.  Returns `false` when there
    /// is nothing to redo.
    pub fn redo(&mut self, buffer: &mut PixelBuffer) -> MaskResult<bool> {
        let Some(next) = self.future.pop() else {
            return Ok(false);
        };
        if let Err(e) = check_fits(&next, buffer) {
            self.future.push(next);
            return Err(e);
        }
        self.total_memory = self.total_memory.saturating_sub(next.memory_bytes());
        let current = buffer.snapshot();
        buffer.restore(next)?;
        self.push_past(current);
        Ok(true)
    }

    fn push_past(&mut self, snapshot: CanvasSnapshot) {
        self.total_memory += snapshot.memory_bytes();
        self.past.push_back(snapshot);
        self.prune();
    }

    /// Evict oldest snapshots beyond the depth limit.
    fn prune(&mut self) {
        while self.past.len() > self.max_history_size {
            if let Some(removed) = self.past.pop_front() {
                self.total_memory = self.total_memory.saturating_sub(removed.memory_bytes());
            }
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.past.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.future.is_empty()
    }

    pub fn undo_count(&self) -> usize {
        self.past.len()
    }

    pub fn redo_count(&self) -> usize {
        self.future.len()
    }

    pub fn capacity(&self) -> usize {
        self.max_history_size
    }

    /// Bytes held by both stacks (O(1) via cached total).
    pub fn memory_usage(&self) -> usize {
        self.total_memory
    }

    pub fn clear(&mut self) {
        self.past.clear();
        self.future.clear();
        self.total_memory = 0;
    }
}

/// Snapshots from a previous image can never be restored into this one.
fn check_fits(snapshot: &CanvasSnapshot, buffer: &PixelBuffer) -> MaskResult<()> {
    if snapshot.dimensions() != buffer.dimensions() {
        return Err(MaskError::DimensionMismatch {
            expected: buffer.dimensions(),
            actual: snapshot.dimensions(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn shade(v: u8) -> Rgba<u8> {
        Rgba([v, v, v, 255])
    }

    /// Buffer whose pixel (0, 0) encodes which edit produced it.
    fn edit(history: &mut HistoryManager, buf: &mut PixelBuffer, v: u8) {
        history.begin_mutation(buf);
        buf.set(0, 0, shade(v)).unwrap();
    }

    #[test]
    fn undo_then_redo_restores_bytes_exactly() {
        let mut buf = PixelBuffer::new(4, 4).unwrap();
        let mut history = HistoryManager::default();
        edit(&mut history, &mut buf, 10);
        edit(&mut history, &mut buf, 20);
        let before = buf.as_raw().to_vec();

        assert!(history.undo(&mut buf).unwrap());
        assert_eq!(buf.get(0, 0).unwrap(), shade(10));
        assert!(history.redo(&mut buf).unwrap());
        assert_eq!(buf.as_raw(), before.as_slice());
    }

    #[test]
    fn empty_history_is_a_silent_no_op() {
        let mut buf = PixelBuffer::new(2, 2).unwrap();
        let before = buf.clone();
        let mut history = HistoryManager::default();
        assert!(!history.undo(&mut buf).unwrap());
        assert!(!history.redo(&mut buf).unwrap());
        assert_eq!(buf, before);
    }

    #[test]
    fn oldest_snapshot_is_evicted_first() {
        let mut buf = PixelBuffer::new(2, 2).unwrap();
        let mut history = HistoryManager::new(5);
        // Six edits: states 0 (initial black), 1..=5 precede edits 1..=6.
        for v in 1..=6 {
            edit(&mut history, &mut buf, v);
        }
        assert_eq!(history.undo_count(), 5);

        let mut undone = 0;
        while history.undo(&mut buf).unwrap() {
            undone += 1;
        }
        assert_eq!(undone, 5);
        // The initial (black) state is unreachable; the oldest kept is edit 1.
        assert_eq!(buf.get(0, 0).unwrap(), shade(1));
    }

    #[test]
    fn new_edit_clears_the_redo_chain() {
        let mut buf = PixelBuffer::new(2, 2).unwrap();
        let mut history = HistoryManager::default();
        edit(&mut history, &mut buf, 1);
        edit(&mut history, &mut buf, 2);
        history.undo(&mut buf).unwrap();
        assert!(history.can_redo());

        edit(&mut history, &mut buf, 3);
        assert!(!history.can_redo());
        let snapshot = buf.clone();
        assert!(!history.redo(&mut buf).unwrap());
        assert_eq!(buf, snapshot);
    }

    #[test]
    fn redo_respects_the_depth_limit() {
        let mut buf = PixelBuffer::new(2, 2).unwrap();
        let mut history = HistoryManager::new(2);
        edit(&mut history, &mut buf, 1);
        edit(&mut history, &mut buf, 2);
        history.undo(&mut buf).unwrap();
        history.undo(&mut buf).unwrap();
        assert_eq!(history.redo_count(), 2);
        history.redo(&mut buf).unwrap();
        history.redo(&mut buf).unwrap();
        assert_eq!(history.undo_count(), 2);
        assert_eq!(buf.get(0, 0).unwrap(), shade(2));
    }

    #[test]
    fn memory_usage_tracks_both_stacks() {
        let mut buf = PixelBuffer::new(4, 4).unwrap();
        let mut history = HistoryManager::new(3);
        let frame = 4 * 4 * 4;
        for v in 1..=5 {
            edit(&mut history, &mut buf, v);
        }
        assert_eq!(history.memory_usage(), 3 * frame);
        assert_eq!(history.capacity(), 3);
        history.undo(&mut buf).unwrap();
        assert_eq!(history.memory_usage(), 3 * frame);
        history.clear();
        assert_eq!(history.memory_usage(), 0);
        assert!(!history.can_undo());
    }

    #[test]
    fn mismatched_snapshot_leaves_history_intact() {
        let mut buf = PixelBuffer::new(2, 2).unwrap();
        let mut history = HistoryManager::default();
        edit(&mut history, &mut buf, 1);
        let mut other = PixelBuffer::new(3, 3).unwrap();
        assert!(history.undo(&mut other).is_err());
        assert_eq!(history.undo_count(), 1);
        assert!(history.undo(&mut buf).unwrap());
    }
}
