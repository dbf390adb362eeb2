//! Capture: a range of bytes in the current input chunk belonging to a value
//! in progress (design §4.2).
//!
//! The source this is grounded on marks a suspended capture with a sentinel
//! pointer value. §9's Design Notes call that out explicitly as a hack to
//! re-architect away, so this is a tagged sum type instead: a capture is
//! either absent, active at some offset in the *current* chunk, or suspended
//! across a chunk boundary (to be re-anchored at offset 0 of the next chunk).

use crate::error::{ErrorKind, ParserError};
use crate::multipart::MultipartRouter;
use crate::sink::Sink;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CaptureState {
    None,
    Active(usize),
    Suspended,
}

#[derive(Debug)]
pub(crate) struct Capture {
    state: CaptureState,
}

impl Capture {
    pub(crate) fn new() -> Self {
        Self {
            state: CaptureState::None,
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        matches!(self.state, CaptureState::Active(_))
    }

    /// Records a start offset in the chunk currently being scanned. Requires
    /// no capture is already active.
    pub(crate) fn begin(&mut self, offset: usize, pos: usize) -> Result<(), ParserError> {
        if self.state != CaptureState::None {
            return Err(ParserError::new(
                ErrorKind::Internal("capture already active"),
                pos,
            ));
        }
        self.state = CaptureState::Active(offset);
        Ok(())
    }

    /// Forwards `chunk[start..end)` to the multipart router with
    /// `can_alias=true`, then clears the capture.
    pub(crate) fn end<S: Sink>(
        &mut self,
        router: &mut MultipartRouter,
        chunk: &[u8],
        end: usize,
        pos: usize,
        sink: &mut S,
    ) -> Result<(), ParserError> {
        let start = match self.state {
            CaptureState::Active(start) => start,
            _ => {
                return Err(ParserError::new(
                    ErrorKind::Internal("capture end without active capture"),
                    pos,
                ))
            }
        };
        router.text(chunk, start..end, true, pos, sink)?;
        self.state = CaptureState::None;
        Ok(())
    }

    /// Called when a chunk is exhausted while a capture is still active:
    /// forwards the partial slice with `can_alias=false`, forcing the
    /// multipart router (and ultimately the accumulator) to copy it, then
    /// marks the capture suspended so `resume` re-anchors it on the next
    /// chunk.
    pub(crate) fn suspend<S: Sink>(
        &mut self,
        router: &mut MultipartRouter,
        chunk: &[u8],
        pos: usize,
        sink: &mut S,
    ) -> Result<(), ParserError> {
        if let CaptureState::Active(start) = self.state {
            router.text(chunk, start..chunk.len(), false, pos, sink)?;
            self.state = CaptureState::Suspended;
        }
        Ok(())
    }

    /// Called at the start of every `parse` invocation. If the capture was
    /// suspended across the chunk boundary, re-anchors it at the start of the
    /// new chunk.
    pub(crate) fn resume(&mut self) {
        if self.state == CaptureState::Suspended {
            self.state = CaptureState::Active(0);
        }
    }
}
