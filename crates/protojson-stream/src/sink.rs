//! The output sink protocol (design §6): the parser emits a subset of
//! `startmsg`/`endmsg`/`startsubmsg`/`endsubmsg`/`startseq`/`endseq`/
//! `startstr`/`endstr`/`putstring`/`putint32`/.../`putbool` calls against an
//! opaque downstream handler. [`Sink`] is that handler's interface; it is
//! grounded on the teacher's `JsonFactory` trait (`factory.rs`), which plays
//! the same "abstract over value construction" role for untyped JSON values.
//!
//! Unlike `JsonFactory`, field identity here is a `prost_reflect::
//! FieldDescriptor` rather than a string key, since selectors in this design
//! are field descriptors (see Glossary, "Selector").

use prost_reflect::{DynamicMessage, FieldDescriptor, MessageDescriptor, Value};

/// The downstream consumer of semantic events.
///
/// Calls are always balanced: every `start_*` has a matching `end_*` for the
/// same field, and nesting follows the JSON document's own nesting. A `Sink`
/// implementation is free to build whatever representation it likes from
/// this call sequence; [`DynamicMessageSink`] builds a
/// [`prost_reflect::DynamicMessage`].
pub trait Sink {
    type Error: core::fmt::Display;

    /// Begins filling fields of the message currently on top of the sink's
    /// own stack (root message, a submessage, or a map-entry message).
    fn start_message(&mut self) -> Result<(), Self::Error>;
    fn end_message(&mut self) -> Result<(), Self::Error>;

    fn start_submessage(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error>;
    fn end_submessage(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error>;

    fn start_sequence(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error>;
    fn end_sequence(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error>;

    fn start_string(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error>;
    fn end_string(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error>;
    fn put_string_chunk(&mut self, field: &FieldDescriptor, chunk: &[u8]) -> Result<(), Self::Error>;

    fn put_i32(&mut self, field: &FieldDescriptor, value: i32) -> Result<(), Self::Error>;
    fn put_i64(&mut self, field: &FieldDescriptor, value: i64) -> Result<(), Self::Error>;
    fn put_u32(&mut self, field: &FieldDescriptor, value: u32) -> Result<(), Self::Error>;
    fn put_u64(&mut self, field: &FieldDescriptor, value: u64) -> Result<(), Self::Error>;
    fn put_f32(&mut self, field: &FieldDescriptor, value: f32) -> Result<(), Self::Error>;
    fn put_f64(&mut self, field: &FieldDescriptor, value: f64) -> Result<(), Self::Error>;
    fn put_bool(&mut self, field: &FieldDescriptor, value: bool) -> Result<(), Self::Error>;
}

#[derive(Debug, thiserror::Error)]
pub enum DynamicMessageSinkError {
    #[error("sink event stack underflow")]
    StackUnderflow,
    #[error("string builder has no active buffer")]
    NoActiveString,
}

enum Frame {
    Message(DynamicMessage),
    Sequence(Vec<Value>),
    StringBuf(Vec<u8>),
}

/// A [`Sink`] that builds a [`prost_reflect::DynamicMessage`], the role the
/// teacher's `StdFactory` plays for untyped `Value`.
pub struct DynamicMessageSink {
    stack: Vec<Frame>,
    result: Option<DynamicMessage>,
}

impl DynamicMessageSink {
    pub fn new(root: MessageDescriptor) -> Self {
        Self {
            stack: vec![Frame::Message(DynamicMessage::new(root))],
            result: None,
        }
    }

    /// Takes the fully-built root message. Valid after the parser's matching
    /// `end()` call has returned successfully.
    pub fn into_message(mut self) -> Option<DynamicMessage> {
        self.result.take()
    }

    fn top_message_mut(&mut self) -> Result<&mut DynamicMessage, DynamicMessageSinkError> {
        match self.stack.last_mut() {
            Some(Frame::Message(m)) => Ok(m),
            _ => Err(DynamicMessageSinkError::StackUnderflow),
        }
    }

    fn set_scalar(&mut self, field: &FieldDescriptor, value: Value) -> Result<(), DynamicMessageSinkError> {
        match self.stack.last_mut() {
            Some(Frame::Message(m)) => {
                m.set_field(field, value);
                Ok(())
            }
            Some(Frame::Sequence(items)) => {
                items.push(value);
                Ok(())
            }
            _ => Err(DynamicMessageSinkError::StackUnderflow),
        }
    }
}

impl Sink for DynamicMessageSink {
    type Error = DynamicMessageSinkError;

    fn start_message(&mut self) -> Result<(), Self::Error> {
        // The root message frame is pushed in `new`; nested message frames
        // are pushed by `start_submessage`/map-entry handling in the parser,
        // which always calls `start_submessage` immediately before
        // `start_message`. Nothing to do here but validate shape.
        match self.stack.last() {
            Some(Frame::Message(_)) => Ok(()),
            _ => Err(DynamicMessageSinkError::StackUnderflow),
        }
    }

    fn end_message(&mut self) -> Result<(), Self::Error> {
        match self.stack.last() {
            Some(Frame::Message(_)) => Ok(()),
            _ => Err(DynamicMessageSinkError::StackUnderflow),
        }
    }

    fn start_submessage(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error> {
        let desc = match field.kind() {
            prost_reflect::Kind::Message(desc) => desc,
            _ => return Err(DynamicMessageSinkError::StackUnderflow),
        };
        self.stack.push(Frame::Message(DynamicMessage::new(desc)));
        Ok(())
    }

    fn end_submessage(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error> {
        let built = match self.stack.pop() {
            Some(Frame::Message(m)) => m,
            _ => return Err(DynamicMessageSinkError::StackUnderflow),
        };
        self.set_scalar(field, Value::Message(built))
    }

    fn start_sequence(&mut self, _field: &FieldDescriptor) -> Result<(), Self::Error> {
        self.stack.push(Frame::Sequence(Vec::new()));
        Ok(())
    }

    fn end_sequence(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error> {
        let items = match self.stack.pop() {
            Some(Frame::Sequence(v)) => v,
            _ => return Err(DynamicMessageSinkError::StackUnderflow),
        };
        if self.stack.is_empty() {
            // Only the root message can own a top-level repeated field with
            // nothing enclosing it; fall through to the common path below.
        }
        self.set_scalar(field, Value::List(items))
    }

    fn start_string(&mut self, _field: &FieldDescriptor) -> Result<(), Self::Error> {
        self.stack.push(Frame::StringBuf(Vec::new()));
        Ok(())
    }

    fn end_string(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error> {
        let bytes = match self.stack.pop() {
            Some(Frame::StringBuf(b)) => b,
            _ => return Err(DynamicMessageSinkError::StackUnderflow),
        };
        let value = if matches!(field.kind(), prost_reflect::Kind::Bytes) {
            Value::Bytes(bytes.into())
        } else {
            let s = String::from_utf8_lossy(&bytes).into_owned();
            Value::String(s)
        };
        self.set_scalar(field, value)
    }

    fn put_string_chunk(&mut self, _field: &FieldDescriptor, chunk: &[u8]) -> Result<(), Self::Error> {
        match self.stack.last_mut() {
            Some(Frame::StringBuf(buf)) => {
                buf.extend_from_slice(chunk);
                Ok(())
            }
            _ => Err(DynamicMessageSinkError::NoActiveString),
        }
    }

    fn put_i32(&mut self, field: &FieldDescriptor, value: i32) -> Result<(), Self::Error> {
        self.set_scalar(field, Value::I32(value))
    }

    fn put_i64(&mut self, field: &FieldDescriptor, value: i64) -> Result<(), Self::Error> {
        self.set_scalar(field, Value::I64(value))
    }

    fn put_u32(&mut self, field: &FieldDescriptor, value: u32) -> Result<(), Self::Error> {
        self.set_scalar(field, Value::U32(value))
    }

    fn put_u64(&mut self, field: &FieldDescriptor, value: u64) -> Result<(), Self::Error> {
        self.set_scalar(field, Value::U64(value))
    }

    fn put_f32(&mut self, field: &FieldDescriptor, value: f32) -> Result<(), Self::Error> {
        self.set_scalar(field, Value::F32(value))
    }

    fn put_f64(&mut self, field: &FieldDescriptor, value: f64) -> Result<(), Self::Error> {
        self.set_scalar(field, Value::F64(value))
    }

    fn put_bool(&mut self, field: &FieldDescriptor, value: bool) -> Result<(), Self::Error> {
        self.set_scalar(field, Value::Bool(value))
    }
}

impl DynamicMessageSink {
    /// Called by the parser's top-level `end()` once the root message's
    /// `end_message` has fired, finalizing `into_message`.
    pub(crate) fn finish(&mut self) -> Result<(), DynamicMessageSinkError> {
        match self.stack.pop() {
            Some(Frame::Message(m)) if self.stack.is_empty() => {
                self.result = Some(m);
                Ok(())
            }
            _ => Err(DynamicMessageSinkError::StackUnderflow),
        }
    }
}
