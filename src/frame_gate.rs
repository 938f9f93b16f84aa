//! Serialises frame recording against resize callbacks.
//!
//! Resize observers and animation callbacks can both ask for a frame. Only one
//! frame is recorded at a time; a resize that arrives while a frame is open is
//! parked (latest size wins) and handed back when the next frame begins.

use std::cell::Cell;

#[derive(Debug, Default)]
pub struct FrameGate {
    busy: Cell<bool>,
    pending_resize: Cell<Option<(u32, u32)>>,
    skipped: Cell<u64>,
}

/// Open frame. Dropping it reopens the gate.
#[derive(Debug)]
pub struct FrameTicket<'a> {
    gate: &'a FrameGate,
    /// Resize parked since the previous frame, to apply before recording.
    pub resize: Option<(u32, u32)>,
}

impl Drop for FrameTicket<'_> {
    fn drop(&mut self) {
        self.gate.busy.set(false);
    }
}

impl FrameGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Begin a frame, or `None` if one is already being recorded.
    pub fn begin(&self) -> Option<FrameTicket<'_>> {
        if self.busy.replace(true) {
            self.skipped.set(self.skipped.get() + 1);
            return None;
        }
        Some(FrameTicket {
            gate: self,
            resize: self.pending_resize.take(),
        })
    }

    /// Park a resize for the next frame.
    pub fn defer_resize(&self, width: u32, height: u32) {
        self.pending_resize.set(Some((width, height)));
    }

    pub fn is_busy(&self) -> bool {
        self.busy.get()
    }

    pub fn has_pending_resize(&self) -> bool {
        self.pending_resize.get().is_some()
    }

    /// Frames refused because another was in flight.
    pub fn skipped_frames(&self) -> u64 {
        self.skipped.get()
    }
}
