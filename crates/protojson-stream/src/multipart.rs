//! Multipart text router (design §4.3): directs accumulated or captured text
//! either to the [`Accumulator`] for later inspection (member names, numbers,
//! enum names, bytes fields, map keys) or eagerly to the sink's string
//! handler (regular `string` fields, so chunks flow without buffering).

use core::ops::Range;

use prost_reflect::FieldDescriptor;

use crate::accumulator::Accumulator;
use crate::error::{ErrorKind, ParserError};
use crate::sink::Sink;

#[derive(Debug, Clone, PartialEq)]
enum State {
    Inactive,
    Accumulate,
    PushEagerly(FieldDescriptor),
    /// `ignore_unknown_fields`: text is scanned (to keep the lexer in sync)
    /// but thrown away instead of accumulated or forwarded.
    Discard,
}

#[derive(Debug)]
pub(crate) struct MultipartRouter {
    state: State,
    accumulator: Accumulator,
}

impl MultipartRouter {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Inactive,
            accumulator: Accumulator::new(),
        }
    }

    pub(crate) fn is_active(&self) -> bool {
        !matches!(self.state, State::Inactive)
    }

    pub(crate) fn start_accum(&mut self) {
        self.accumulator.clear();
        self.state = State::Accumulate;
    }

    pub(crate) fn start_push(&mut self, selector: FieldDescriptor) {
        self.accumulator.clear();
        self.state = State::PushEagerly(selector);
    }

    pub(crate) fn start_discard(&mut self) {
        self.accumulator.clear();
        self.state = State::Discard;
    }

    /// Routes `chunk[range]` per the current state: buffered into the
    /// accumulator, or forwarded immediately to the sink's string-chunk
    /// handler.
    pub(crate) fn text<S: Sink>(
        &mut self,
        chunk: &[u8],
        range: Range<usize>,
        can_alias: bool,
        pos: usize,
        sink: &mut S,
    ) -> Result<(), ParserError>
    where
        S: Sink,
    {
        match &self.state {
            State::Inactive => Err(ParserError::new(
                ErrorKind::Internal("multipart text with no active value"),
                pos,
            )),
            State::Accumulate => self.accumulator.append(chunk, range, can_alias, pos),
            State::PushEagerly(field) => {
                let field = field.clone();
                sink.put_string_chunk(&field, &chunk[range])
                    .map_err(|e| ParserError::new(ErrorKind::SinkError(e.to_string().into()), pos))
            }
            State::Discard => Ok(()),
        }
    }

    /// Routes a literal byte sequence synthesized by escape expansion (not
    /// sliced from any input chunk). `real_chunk` materializes any
    /// previously aliased accumulator content; see
    /// [`Accumulator::append_literal`].
    pub(crate) fn push_literal<S: Sink>(
        &mut self,
        real_chunk: &[u8],
        literal: &[u8],
        pos: usize,
        sink: &mut S,
    ) -> Result<(), ParserError> {
        match &self.state {
            State::Inactive => Err(ParserError::new(
                ErrorKind::Internal("multipart text with no active value"),
                pos,
            )),
            State::Accumulate => self.accumulator.append_literal(real_chunk, literal, pos),
            State::PushEagerly(field) => {
                let field = field.clone();
                sink.put_string_chunk(&field, literal)
                    .map_err(|e| ParserError::new(ErrorKind::SinkError(e.to_string().into()), pos))
            }
            State::Discard => Ok(()),
        }
    }

    pub(crate) fn accumulator(&self) -> &Accumulator {
        &self.accumulator
    }

    pub(crate) fn accumulator_mut(&mut self) -> &mut Accumulator {
        &mut self.accumulator
    }

    pub(crate) fn end(&mut self) {
        self.state = State::Inactive;
        self.accumulator.clear();
    }
}
