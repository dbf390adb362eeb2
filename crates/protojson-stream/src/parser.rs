//! The driving loop (design §2 component 9, §4.7, §4.9): ties the lexical
//! state machine, frame stack, capture, multipart router, and schema binder
//! together into the `parse`/`end` push API.
//!
//! Grounded on the teacher's hand-written recursive-descent `Parser` in
//! `parser.rs`, generalized from "build an untyped `Value` tree" to "drive
//! sink calls against a schema". Per §9's Design Notes, the generated Ragel
//! table and its `fcall`/`fret` nested-value recursion are not ported
//! literally; [`crate::frame::FrameStack`] is the explicit stack, and this
//! file is a hand-written state dispatch exactly as the design permits.

use std::sync::Arc;

use prost_reflect::{Cardinality, DynamicMessage, FieldDescriptor, Kind};

use crate::base64;
use crate::capture::Capture;
use crate::error::{ErrorKind, ParserError};
use crate::escape::{simple_escape, HexAccumulator};
use crate::frame::{Frame, FrameStack, OpenKind, Punct, Target};
use crate::machine::{is_digit, is_json_whitespace, LexState, Literal, NumberStage};
use crate::multipart::MultipartRouter;
use crate::number::{self, Number};
use crate::options::ParserOptions;
use crate::schema::ParserMethod;
use crate::sink::{DynamicMessageSink, Sink};

fn sink_err<E: core::fmt::Display>(pos: usize) -> impl FnOnce(E) -> ParserError {
    move |e| ParserError::new(ErrorKind::SinkError(e.to_string().into()), pos)
}

/// Where the document as a whole stands; distinguishes "nothing parsed yet"
/// and "root closed" from "inside the root", both of which have an empty
/// frame stack at the boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocState {
    BeforeRoot,
    InRoot,
    AfterRoot,
}

/// What kind of string is currently being scanned, set when the opening `"`
/// is consumed and read back when the closing `"` is found. Resolves the
/// ambiguity between member names, `bytes`/`string` field values, enum text,
/// and unknown-field values that must be scanned but discarded.
enum ScanKind {
    MemberName,
    Enum(FieldDescriptor),
    StringOrBytes(FieldDescriptor),
    SkipValue,
}

enum ValueTarget {
    Field(FieldDescriptor),
    Skip,
}

fn map_entry_descriptor(
    field: &FieldDescriptor,
    pos: usize,
) -> Result<prost_reflect::MessageDescriptor, ParserError> {
    match field.kind() {
        Kind::Message(desc) if desc.is_map_entry() => Ok(desc),
        _ => Err(ParserError::new(ErrorKind::MapEntryMissingKeyOrValue, pos)),
    }
}

/// Drives a sequence of `parse` calls against chunked input, dispatching
/// semantic events to a [`Sink`] as JSON tokens are recognized.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use prost_reflect::{DescriptorPool, DynamicMessage};
/// use protojson_stream::{parse_all_to_message, ParserMethod, ParserOptions};
/// # fn doctest(pool: DescriptorPool) -> Result<(), Box<dyn std::error::Error>> {
/// let root = pool.get_message_by_name("example.Widget").unwrap();
/// let method = ParserMethod::cached(root);
/// let message = parse_all_to_message(method, br#"{"id":1}"#, ParserOptions::default())?;
/// # let _ = message;
/// # Ok(())
/// # }
/// ```
pub struct Parser<S: Sink> {
    method: Arc<ParserMethod>,
    options: ParserOptions,
    frames: FrameStack,
    lex: LexState,
    doc: DocState,
    capture: Capture,
    multipart: MultipartRouter,
    hex: HexAccumulator,
    scan_kind: Option<ScanKind>,
    sink: S,
}

impl<S: Sink> Parser<S> {
    pub fn new(method: Arc<ParserMethod>, sink: S, options: ParserOptions) -> Self {
        Self {
            method,
            options,
            frames: FrameStack::new(options.max_depth),
            lex: LexState::Idle,
            doc: DocState::BeforeRoot,
            capture: Capture::new(),
            multipart: MultipartRouter::new(),
            hex: HexAccumulator::new(),
            scan_kind: None,
            sink,
        }
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Feeds one chunk of input. Returns the number of bytes consumed, which
    /// is always `chunk.len()` on success (a partial token carries its state
    /// forward rather than being rejected); on error it is the number of
    /// bytes consumed *before* the failing byte.
    pub fn parse(&mut self, chunk: &[u8]) -> Result<usize, ParserError> {
        self.capture.resume();
        let mut i = 0usize;
        match self.run(chunk, &mut i) {
            Ok(()) => {
                self.capture
                    .suspend(&mut self.multipart, chunk, i, &mut self.sink)?;
                Ok(i)
            }
            Err(e) => {
                tracing::debug!(pos = e.pos, kind = %e.kind, "parse failed");
                Err(e)
            }
        }
    }

    /// Signals end of input. Fails if the document was left open (an
    /// unterminated object/array/string, or nothing was parsed at all).
    pub fn end(&mut self) -> Result<(), ParserError> {
        if self.doc != DocState::AfterRoot || !self.frames.is_empty() {
            return Err(ParserError::new(ErrorKind::UnexpectedEof, 0));
        }
        Ok(())
    }

    fn run(&mut self, chunk: &[u8], i: &mut usize) -> Result<(), ParserError> {
        loop {
            let made_progress = match self.lex {
                LexState::Idle => {
                    if *i >= chunk.len() {
                        return Ok(());
                    }
                    self.dispatch_idle(chunk, i)?
                }
                LexState::InLiteral { literal, matched } => {
                    self.resume_literal(chunk, i, literal, matched)?
                }
                LexState::InString => self.resume_string(chunk, i)?,
                LexState::InStringEscape => self.resume_string_escape(chunk, i)?,
                LexState::InStringUnicodeEscape { remaining } => {
                    self.resume_unicode_escape(chunk, i, remaining)?
                }
                LexState::InNumber { stage } => self.resume_number(chunk, i, stage)?,
            };
            if !made_progress {
                return Ok(());
            }
        }
    }

    // -- token dispatch ----------------------------------------------------

    fn dispatch_idle(&mut self, chunk: &[u8], i: &mut usize) -> Result<bool, ParserError> {
        while *i < chunk.len() && is_json_whitespace(chunk[*i]) {
            *i += 1;
        }
        if *i >= chunk.len() {
            return Ok(false);
        }
        let pos = *i;
        let c = chunk[*i];

        if self.frames.is_empty() {
            return match self.doc {
                DocState::BeforeRoot => {
                    if c != b'{' {
                        return Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), pos));
                    }
                    *i += 1;
                    self.begin_object(pos)?;
                    self.doc = DocState::InRoot;
                    Ok(true)
                }
                DocState::AfterRoot => {
                    Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), pos))
                }
                DocState::InRoot => {
                    unreachable!("InRoot implies a frame is open")
                }
            };
        }

        let top = self.frames.top().expect("checked non-empty above");
        let is_brace = top.is_brace_frame();
        let punct = top.punct;

        match punct {
            Punct::Start | Punct::AfterComma => {
                if is_brace {
                    if c == b'}' {
                        if punct == Punct::AfterComma {
                            return Err(ParserError::new(
                                ErrorKind::UnexpectedChar(c as char),
                                pos,
                            ));
                        }
                        *i += 1;
                        self.end_object(pos)?;
                        return Ok(true);
                    }
                    if c != b'"' {
                        return Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), pos));
                    }
                    *i += 1;
                    self.begin_member_name(*i)?;
                    self.resume_string(chunk, i)
                } else {
                    if c == b']' {
                        if punct == Punct::AfterComma {
                            return Err(ParserError::new(
                                ErrorKind::UnexpectedChar(c as char),
                                pos,
                            ));
                        }
                        *i += 1;
                        self.end_array(pos)?;
                        return Ok(true);
                    }
                    self.begin_value(chunk, i, c, pos)
                }
            }
            Punct::AfterKey => {
                if c != b':' {
                    return Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), pos));
                }
                *i += 1;
                self.frames.top_mut().unwrap().punct = Punct::AfterColon;
                Ok(true)
            }
            Punct::AfterColon => self.begin_value(chunk, i, c, pos),
            Punct::AfterValue => {
                if c == b',' {
                    *i += 1;
                    self.frames.top_mut().unwrap().punct = Punct::AfterComma;
                    return Ok(true);
                }
                let closer_matches = if is_brace { c == b'}' } else { c == b']' };
                if closer_matches {
                    *i += 1;
                    if is_brace {
                        self.end_object(pos)?;
                    } else {
                        self.end_array(pos)?;
                    }
                    return Ok(true);
                }
                Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), pos))
            }
        }
    }

    fn begin_value(
        &mut self,
        chunk: &[u8],
        i: &mut usize,
        c: u8,
        pos: usize,
    ) -> Result<bool, ParserError> {
        match c {
            b'"' => {
                *i += 1;
                match self.current_target(pos)? {
                    ValueTarget::Skip => self.begin_skip_value_string(*i)?,
                    ValueTarget::Field(field) => match field.kind() {
                        Kind::String | Kind::Bytes => self.begin_string_value(*i, field)?,
                        Kind::Enum(_) => self.begin_enum_value(*i, field)?,
                        _ => {
                            return Err(ParserError::new(
                                ErrorKind::StringForNonStringField(field.name().into()),
                                pos,
                            ))
                        }
                    },
                }
                self.resume_string(chunk, i)
            }
            b'{' => {
                *i += 1;
                self.begin_object(pos)?;
                Ok(true)
            }
            b'[' => {
                *i += 1;
                self.begin_array(pos)?;
                Ok(true)
            }
            b't' | b'f' | b'n' => {
                let literal = Literal::starting(c).expect("matched t/f/n above");
                *i += 1;
                self.resume_literal(chunk, i, literal, 1)
            }
            b'-' | b'0'..=b'9' => {
                self.begin_number(pos)?;
                let stage = if c == b'-' {
                    NumberStage::Sign
                } else {
                    NumberStage::IntegerFirstDigit
                };
                self.resume_number(chunk, i, stage)
            }
            _ => Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), pos)),
        }
    }

    fn current_target(&self, pos: usize) -> Result<ValueTarget, ParserError> {
        match self.frames.top() {
            Some(f) => match &f.target {
                Target::Field(fd) => Ok(ValueTarget::Field(fd.clone())),
                Target::Skip => Ok(ValueTarget::Skip),
                Target::AwaitingName => Err(ParserError::new(
                    ErrorKind::Internal("value started with no pending field"),
                    pos,
                )),
            },
            None => Err(ParserError::new(
                ErrorKind::Internal("value started with no open frame"),
                pos,
            )),
        }
    }

    // -- literals ------------------------------------------------------------

    fn resume_literal(
        &mut self,
        chunk: &[u8],
        i: &mut usize,
        literal: Literal,
        mut matched: u8,
    ) -> Result<bool, ParserError> {
        let text = literal.text();
        while (matched as usize) < text.len() {
            if *i >= chunk.len() {
                self.lex = LexState::InLiteral { literal, matched };
                return Ok(false);
            }
            let c = chunk[*i];
            if c != text[matched as usize] {
                return Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), *i));
            }
            *i += 1;
            matched += 1;
        }
        self.lex = LexState::Idle;
        let pos = *i;
        match literal {
            Literal::Null => {}
            Literal::True | Literal::False => {
                if let ValueTarget::Field(field) = self.current_target(pos)? {
                    if !matches!(field.kind(), Kind::Bool) {
                        return Err(ParserError::new(
                            ErrorKind::BoolForNonBoolField(field.name().into()),
                            pos,
                        ));
                    }
                    let value = matches!(literal, Literal::True);
                    self.sink
                        .put_bool(&field, value)
                        .map_err(sink_err(pos))?;
                }
            }
        }
        self.after_value(pos)?;
        Ok(true)
    }

    // -- numbers ---------------------------------------------------------

    fn begin_number(&mut self, pos: usize) -> Result<(), ParserError> {
        self.multipart.start_accum();
        self.capture.begin(pos, pos)
    }

    fn resume_number(
        &mut self,
        chunk: &[u8],
        i: &mut usize,
        mut stage: NumberStage,
    ) -> Result<bool, ParserError> {
        loop {
            if *i >= chunk.len() {
                self.lex = LexState::InNumber { stage };
                return Ok(false);
            }
            let c = chunk[*i];
            let pos = *i;
            match stage {
                NumberStage::Sign => {
                    if c == b'-' {
                        *i += 1;
                    }
                    stage = NumberStage::IntegerFirstDigit;
                }
                NumberStage::IntegerFirstDigit => {
                    if !is_digit(c) {
                        return Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), pos));
                    }
                    *i += 1;
                    stage = if c == b'0' {
                        NumberStage::IntegerZero
                    } else {
                        NumberStage::IntegerDigits
                    };
                }
                NumberStage::IntegerZero => {
                    if is_digit(c) {
                        return Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), pos));
                    } else if c == b'.' {
                        *i += 1;
                        stage = NumberStage::FractionFirstDigit;
                    } else if c == b'e' || c == b'E' {
                        *i += 1;
                        stage = NumberStage::ExponentSign;
                    } else {
                        return self.finish_number(chunk, i, pos);
                    }
                }
                NumberStage::IntegerDigits => {
                    if is_digit(c) {
                        *i += 1;
                    } else if c == b'.' {
                        *i += 1;
                        stage = NumberStage::FractionFirstDigit;
                    } else if c == b'e' || c == b'E' {
                        *i += 1;
                        stage = NumberStage::ExponentSign;
                    } else {
                        return self.finish_number(chunk, i, pos);
                    }
                }
                NumberStage::FractionFirstDigit => {
                    if !is_digit(c) {
                        return Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), pos));
                    }
                    *i += 1;
                    stage = NumberStage::FractionDigits;
                }
                NumberStage::FractionDigits => {
                    if is_digit(c) {
                        *i += 1;
                    } else if c == b'e' || c == b'E' {
                        *i += 1;
                        stage = NumberStage::ExponentSign;
                    } else {
                        return self.finish_number(chunk, i, pos);
                    }
                }
                NumberStage::ExponentSign => {
                    if c == b'+' || c == b'-' {
                        *i += 1;
                    }
                    stage = NumberStage::ExponentFirstDigit;
                }
                NumberStage::ExponentFirstDigit => {
                    if !is_digit(c) {
                        return Err(ParserError::new(ErrorKind::UnexpectedChar(c as char), pos));
                    }
                    *i += 1;
                    stage = NumberStage::ExponentDigits;
                }
                NumberStage::ExponentDigits => {
                    if is_digit(c) {
                        *i += 1;
                    } else {
                        return self.finish_number(chunk, i, pos);
                    }
                }
            }
        }
    }

    fn finish_number(
        &mut self,
        chunk: &[u8],
        _i: &mut usize,
        end: usize,
    ) -> Result<bool, ParserError> {
        self.capture
            .end(&mut self.multipart, chunk, end, end, &mut self.sink)?;
        let text: Vec<u8> = self.multipart.accumulator().get(chunk).to_vec();
        self.multipart.end();
        self.lex = LexState::Idle;
        if let ValueTarget::Field(field) = self.current_target(end)? {
            let value = number::parse(&text, &field, end)?;
            self.emit_number(&field, value, end)?;
        }
        self.after_value(end)?;
        Ok(true)
    }

    fn emit_number(
        &mut self,
        field: &FieldDescriptor,
        value: Number,
        pos: usize,
    ) -> Result<(), ParserError> {
        match value {
            Number::I32(v) => self.sink.put_i32(field, v).map_err(sink_err(pos)),
            Number::I64(v) => self.sink.put_i64(field, v).map_err(sink_err(pos)),
            Number::U32(v) => self.sink.put_u32(field, v).map_err(sink_err(pos)),
            Number::U64(v) => self.sink.put_u64(field, v).map_err(sink_err(pos)),
            Number::F32(v) => self.sink.put_f32(field, v).map_err(sink_err(pos)),
            Number::F64(v) => self.sink.put_f64(field, v).map_err(sink_err(pos)),
        }
    }

    // -- strings -----------------------------------------------------------

    fn begin_member_name(&mut self, start: usize) -> Result<(), ParserError> {
        let is_skip = self
            .frames
            .top()
            .expect("member name scanned inside an open frame")
            .is_skip();
        if is_skip {
            self.multipart.start_discard();
        } else {
            self.multipart.start_accum();
        }
        self.scan_kind = Some(ScanKind::MemberName);
        self.capture.begin(start, start)
    }

    fn begin_string_value(&mut self, pos: usize, field: FieldDescriptor) -> Result<(), ParserError> {
        self.frames.push(
            Frame {
                kind: OpenKind::StringValue(field.clone()),
                message: None,
                name_table: None,
                target: Target::Field(field.clone()),
                punct: Punct::Start,
            },
            pos,
        )?;
        self.sink.start_string(&field).map_err(sink_err(pos))?;
        if matches!(field.kind(), Kind::Bytes) {
            self.multipart.start_accum();
        } else {
            self.multipart.start_push(field.clone());
        }
        self.scan_kind = Some(ScanKind::StringOrBytes(field));
        self.capture.begin(pos, pos)
    }

    fn begin_enum_value(&mut self, pos: usize, field: FieldDescriptor) -> Result<(), ParserError> {
        self.multipart.start_accum();
        self.scan_kind = Some(ScanKind::Enum(field));
        self.capture.begin(pos, pos)
    }

    fn begin_skip_value_string(&mut self, pos: usize) -> Result<(), ParserError> {
        self.multipart.start_discard();
        self.scan_kind = Some(ScanKind::SkipValue);
        self.capture.begin(pos, pos)
    }

    fn resume_string(&mut self, chunk: &[u8], i: &mut usize) -> Result<bool, ParserError> {
        while *i < chunk.len() && chunk[*i] != b'"' && chunk[*i] != b'\\' {
            *i += 1;
        }
        if *i >= chunk.len() {
            self.lex = LexState::InString;
            return Ok(false);
        }
        let end = *i;
        self.capture
            .end(&mut self.multipart, chunk, end, end, &mut self.sink)?;
        let c = chunk[*i];
        *i += 1;
        if c == b'"' {
            return self.finish_string(chunk, end);
        }
        self.lex = LexState::InStringEscape;
        Ok(true)
    }

    fn resume_string_escape(&mut self, chunk: &[u8], i: &mut usize) -> Result<bool, ParserError> {
        if *i >= chunk.len() {
            return Ok(false);
        }
        let c = chunk[*i];
        let pos = *i;
        *i += 1;
        if c == b'u' {
            self.hex.reset();
            self.lex = LexState::InStringUnicodeEscape { remaining: 4 };
            return Ok(true);
        }
        let byte = simple_escape(c)
            .ok_or_else(|| ParserError::new(ErrorKind::UnexpectedChar(c as char), pos))?;
        self.multipart
            .push_literal(chunk, &[byte], pos, &mut self.sink)?;
        self.capture.begin(*i, *i)?;
        self.lex = LexState::InString;
        Ok(true)
    }

    fn resume_unicode_escape(
        &mut self,
        chunk: &[u8],
        i: &mut usize,
        mut remaining: u8,
    ) -> Result<bool, ParserError> {
        while remaining > 0 {
            if *i >= chunk.len() {
                self.lex = LexState::InStringUnicodeEscape { remaining };
                return Ok(false);
            }
            let c = chunk[*i];
            let pos = *i;
            self.hex.push_digit(c, pos)?;
            *i += 1;
            remaining -= 1;
        }
        let len = self.hex.encoded_len();
        let bytes = self.hex.encode_utf8();
        self.multipart
            .push_literal(chunk, &bytes[..len], *i, &mut self.sink)?;
        self.capture.begin(*i, *i)?;
        self.lex = LexState::InString;
        Ok(true)
    }

    fn finish_string(&mut self, chunk: &[u8], end_pos: usize) -> Result<bool, ParserError> {
        self.lex = LexState::Idle;
        match self
            .scan_kind
            .take()
            .expect("finish_string only reached after a scan began")
        {
            ScanKind::MemberName => {
                let is_skip_container = self.frames.top().map_or(false, |f| f.is_skip());
                if is_skip_container {
                    self.multipart.end();
                    let top = self.frames.top_mut().expect("checked above");
                    top.target = Target::Skip;
                    top.punct = Punct::AfterKey;
                } else {
                    let name: Vec<u8> = self.multipart.accumulator().get(chunk).to_vec();
                    self.multipart.end();
                    self.handle_end_membername(&name, end_pos)?;
                }
            }
            ScanKind::Enum(field) => {
                let name: Vec<u8> = self.multipart.accumulator().get(chunk).to_vec();
                self.multipart.end();
                let enum_desc = match field.kind() {
                    Kind::Enum(e) => e,
                    _ => unreachable!("ScanKind::Enum only set for enum-kinded fields"),
                };
                let text = core::str::from_utf8(&name).unwrap_or("");
                let value = enum_desc.get_value_by_name(text).ok_or_else(|| {
                    ParserError::new(
                        ErrorKind::UnknownEnumValue(text.into(), field.full_name().into()),
                        end_pos,
                    )
                })?;
                self.sink
                    .put_i32(&field, value.number())
                    .map_err(sink_err(end_pos))?;
                self.after_value(end_pos)?;
            }
            ScanKind::StringOrBytes(field) => {
                if matches!(field.kind(), Kind::Bytes) {
                    let bytes: Vec<u8> = self.multipart.accumulator().get(chunk).to_vec();
                    self.multipart.end();
                    base64::decode_to_sink(&bytes, &field, end_pos, &mut self.sink)?;
                } else {
                    self.multipart.end();
                }
                self.frames
                    .pop()
                    .expect("string-value frame pushed at start_string_value");
                self.sink.end_string(&field).map_err(sink_err(end_pos))?;
                self.after_value(end_pos)?;
            }
            ScanKind::SkipValue => {
                self.multipart.end();
                self.after_value(end_pos)?;
            }
        }
        Ok(true)
    }

    fn handle_end_membername(&mut self, name: &[u8], pos: usize) -> Result<(), ParserError> {
        let is_map = matches!(
            self.frames.top().map(|f| &f.kind),
            Some(OpenKind::MapSequence(_))
        );
        if is_map {
            let map_field = match &self.frames.top().unwrap().kind {
                OpenKind::MapSequence(f) => f.clone(),
                _ => unreachable!("checked is_map above"),
            };
            return self.handle_mapentry(map_field, name, pos);
        }

        let field_name = core::str::from_utf8(name).unwrap_or("");
        let table = self
            .frames
            .top()
            .expect("member name scanned inside an open frame")
            .name_table
            .clone()
            .expect("object-like frame carries a name table");

        match table.lookup(field_name) {
            Some(field) => {
                let field = field.clone();
                let top = self.frames.top_mut().unwrap();
                top.target = Target::Field(field);
                top.punct = Punct::AfterKey;
            }
            None if self.options.ignore_unknown_fields => {
                let top = self.frames.top_mut().unwrap();
                top.target = Target::Skip;
                top.punct = Punct::AfterKey;
            }
            None => {
                return Err(ParserError::new(
                    ErrorKind::NoSuchField(field_name.into()),
                    pos,
                ))
            }
        }
        Ok(())
    }

    /// Synthesizes one map-entry submessage frame for a member name scanned
    /// inside a `MapSequence` frame (design §4.8): `startsubmsg`+`startmsg`
    /// against the map field, the key emitted directly from the accumulated
    /// name text, and the frame's target left pointing at the value field so
    /// the following `:`/value flows through the normal dispatch.
    fn handle_mapentry(
        &mut self,
        map_field: FieldDescriptor,
        name: &[u8],
        pos: usize,
    ) -> Result<(), ParserError> {
        let entry_desc = map_entry_descriptor(&map_field, pos)?;
        let key_field = entry_desc.map_entry_key_field();
        let value_field = entry_desc.map_entry_value_field();
        let table = self.method.table_for(&entry_desc).clone();

        self.frames.push(
            Frame {
                kind: OpenKind::MapEntry(map_field.clone()),
                message: Some(entry_desc),
                name_table: Some(table),
                target: Target::Field(key_field.clone()),
                punct: Punct::Start,
            },
            pos,
        )?;
        self.sink
            .start_submessage(&map_field)
            .map_err(sink_err(pos))?;
        self.sink.start_message().map_err(sink_err(pos))?;

        match key_field.kind() {
            Kind::Bool => {
                let value = match name {
                    b"true" => true,
                    b"false" => false,
                    _ => {
                        return Err(ParserError::new(
                            ErrorKind::MapBoolKeyInvalid(
                                String::from_utf8_lossy(name).into_owned().into(),
                            ),
                            pos,
                        ))
                    }
                };
                self.sink
                    .put_bool(&key_field, value)
                    .map_err(sink_err(pos))?;
            }
            Kind::String | Kind::Bytes => {
                self.sink.start_string(&key_field).map_err(sink_err(pos))?;
                self.sink
                    .put_string_chunk(&key_field, name)
                    .map_err(sink_err(pos))?;
                self.sink.end_string(&key_field).map_err(sink_err(pos))?;
            }
            _ => {
                let value = number::parse(name, &key_field, pos)?;
                self.emit_number(&key_field, value, pos)?;
            }
        }

        let top = self
            .frames
            .top_mut()
            .expect("just pushed the map-entry frame");
        top.target = Target::Field(value_field);
        top.punct = Punct::AfterKey;
        Ok(())
    }

    // -- objects / arrays --------------------------------------------------

    fn begin_object(&mut self, pos: usize) -> Result<(), ParserError> {
        if self.frames.is_empty() {
            let root = self.method.root().clone();
            let table = self.method.table_for(&root).clone();
            self.frames.push(Frame::root(root, table), pos)?;
            self.sink.start_message().map_err(sink_err(pos))?;
            return Ok(());
        }

        match self.current_target(pos)? {
            ValueTarget::Skip => {
                self.frames.push(
                    Frame {
                        kind: OpenKind::Skip { brace: true },
                        message: None,
                        name_table: None,
                        target: Target::Skip,
                        punct: Punct::Start,
                    },
                    pos,
                )?;
            }
            ValueTarget::Field(field) => {
                if field.is_map() {
                    let entry_desc = map_entry_descriptor(&field, pos)?;
                    let table = self.method.table_for(&entry_desc).clone();
                    self.frames.push(
                        Frame {
                            kind: OpenKind::MapSequence(field.clone()),
                            message: Some(entry_desc),
                            name_table: Some(table),
                            target: Target::AwaitingName,
                            punct: Punct::Start,
                        },
                        pos,
                    )?;
                    self.sink.start_sequence(&field).map_err(sink_err(pos))?;
                } else if let Kind::Message(sub) = field.kind() {
                    let table = self.method.table_for(&sub).clone();
                    self.frames.push(
                        Frame {
                            kind: OpenKind::Submessage(field.clone()),
                            message: Some(sub),
                            name_table: Some(table),
                            target: Target::AwaitingName,
                            punct: Punct::Start,
                        },
                        pos,
                    )?;
                    self.sink
                        .start_submessage(&field)
                        .map_err(sink_err(pos))?;
                    self.sink.start_message().map_err(sink_err(pos))?;
                } else {
                    return Err(ParserError::new(
                        ErrorKind::ObjectForNonMessage(field.name().into()),
                        pos,
                    ));
                }
            }
        }
        Ok(())
    }

    fn end_object(&mut self, pos: usize) -> Result<(), ParserError> {
        let top = self.frames.top().expect("end_object requires an open frame");
        if top.is_skip() {
            self.frames.pop();
            return self.after_value(pos);
        }
        if top.is_object_like() {
            self.sink.end_message().map_err(sink_err(pos))?;
        }
        let popped = self.frames.pop().expect("checked top above");
        match popped.kind {
            OpenKind::Root => {
                self.doc = DocState::AfterRoot;
                Ok(())
            }
            OpenKind::Submessage(field) => {
                self.sink
                    .end_submessage(&field)
                    .map_err(sink_err(pos))?;
                self.after_value(pos)
            }
            OpenKind::MapSequence(field) => {
                self.sink.end_sequence(&field).map_err(sink_err(pos))?;
                self.after_value(pos)
            }
            _ => unreachable!("only Root/Submessage/MapSequence frames close via a literal '}}'"),
        }
    }

    fn begin_array(&mut self, pos: usize) -> Result<(), ParserError> {
        match self.current_target(pos)? {
            ValueTarget::Skip => {
                self.frames.push(
                    Frame {
                        kind: OpenKind::Skip { brace: false },
                        message: None,
                        name_table: None,
                        target: Target::Skip,
                        punct: Punct::Start,
                    },
                    pos,
                )?;
            }
            ValueTarget::Field(field) => {
                if field.is_map() || field.cardinality() != Cardinality::Repeated {
                    return Err(ParserError::new(
                        ErrorKind::ArrayForNonRepeated(field.name().into()),
                        pos,
                    ));
                }
                self.frames.push(
                    Frame {
                        kind: OpenKind::Sequence(field.clone()),
                        message: None,
                        name_table: None,
                        target: Target::Field(field.clone()),
                        punct: Punct::Start,
                    },
                    pos,
                )?;
                self.sink.start_sequence(&field).map_err(sink_err(pos))?;
            }
        }
        Ok(())
    }

    fn end_array(&mut self, pos: usize) -> Result<(), ParserError> {
        let top = self.frames.top().expect("end_array requires an open frame");
        if top.is_skip() {
            self.frames.pop();
            return self.after_value(pos);
        }
        let popped = self.frames.pop().expect("checked top above");
        match popped.kind {
            OpenKind::Sequence(field) => {
                self.sink.end_sequence(&field).map_err(sink_err(pos))?;
                self.after_value(pos)
            }
            _ => unreachable!("only Sequence frames close via ']'"),
        }
    }

    /// Common tail for every value completion: closes out a synthesized
    /// map-entry frame (design §4.8's "end-member"), or simply clears the
    /// enclosing frame's pending field and advances its punctuation, or
    /// (with an empty stack) marks the document closed.
    fn after_value(&mut self, pos: usize) -> Result<(), ParserError> {
        let is_map_entry = matches!(self.frames.top().map(|f| &f.kind), Some(OpenKind::MapEntry(_)));
        if is_map_entry {
            self.sink.end_message().map_err(sink_err(pos))?;
            let popped = self.frames.pop().expect("checked top above");
            let map_field = match popped.kind {
                OpenKind::MapEntry(f) => f,
                _ => unreachable!("checked is_map_entry above"),
            };
            self.sink
                .end_submessage(&map_field)
                .map_err(sink_err(pos))?;
        }

        match self.frames.top_mut() {
            Some(top) => {
                // Object-like (and map-sequence) frames expect a member name
                // next; plain sequence frames keep their fixed element
                // target.
                if top.is_brace_frame() {
                    top.target = Target::AwaitingName;
                }
                top.punct = Punct::AfterValue;
            }
            None => {
                self.doc = DocState::AfterRoot;
            }
        }
        Ok(())
    }
}

/// One-shot convenience wrapper: parses a complete, non-chunked buffer into
/// a [`DynamicMessage`] built by a fresh [`DynamicMessageSink`].
pub fn parse_all_to_message(
    method: Arc<ParserMethod>,
    bytes: &[u8],
    options: ParserOptions,
) -> Result<DynamicMessage, ParserError> {
    let root = method.root().clone();
    let mut parser = Parser::new(method, DynamicMessageSink::new(root), options);
    parser.parse(bytes)?;
    parser.end()?;
    parser
        .sink_mut()
        .finish()
        .map_err(|e| ParserError::new(ErrorKind::SinkError(e.to_string().into()), bytes.len()))?;
    Ok(parser
        .into_sink()
        .into_message()
        .expect("finish() succeeded above"))
}
