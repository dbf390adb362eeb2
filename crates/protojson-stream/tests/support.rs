//! Shared descriptor builders and a recording `Sink` for the integration
//! tests in this directory. Not a test module itself — each test file pulls
//! in what it needs with `mod support;`.

#![allow(dead_code)]

use std::fmt;

use prost_reflect::{DescriptorPool, FieldDescriptor, MessageDescriptor};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions,
};
use protojson_stream::Sink;

pub fn scalar_field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_owned()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.to_owned()),
        ..Default::default()
    }
}

/// `message Widget { int32 a = 1; string b = 2; }`
pub fn widget_descriptor() -> MessageDescriptor {
    let msg = DescriptorProto {
        name: Some("Widget".to_owned()),
        field: vec![
            scalar_field("a", 1, Type::Int32, Label::Optional),
            scalar_field("b", 2, Type::String, Label::Optional),
        ],
        ..Default::default()
    };
    build_pool(vec![msg], vec![]).get_message_by_name("test.Widget").unwrap()
}

/// `message WithMap { map<string, int32> m = 1; }`
pub fn map_descriptor() -> MessageDescriptor {
    let entry = DescriptorProto {
        name: Some("MEntry".to_owned()),
        field: vec![
            scalar_field("key", 1, Type::String, Label::Optional),
            scalar_field("value", 2, Type::Int32, Label::Optional),
        ],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };
    let root = DescriptorProto {
        name: Some("WithMap".to_owned()),
        field: vec![FieldDescriptorProto {
            type_name: Some(".test.WithMap.MEntry".to_owned()),
            ..scalar_field("m", 1, Type::Message, Label::Repeated)
        }],
        nested_type: vec![entry],
        ..Default::default()
    };
    build_pool(vec![root], vec![])
        .get_message_by_name("test.WithMap")
        .unwrap()
}

/// `message WithBytes { bytes b = 1; }`
pub fn bytes_descriptor() -> MessageDescriptor {
    let msg = DescriptorProto {
        name: Some("WithBytes".to_owned()),
        field: vec![scalar_field("b", 1, Type::Bytes, Label::Optional)],
        ..Default::default()
    };
    build_pool(vec![msg], vec![])
        .get_message_by_name("test.WithBytes")
        .unwrap()
}

/// `message WithString { string s = 1; }`
pub fn string_descriptor() -> MessageDescriptor {
    let msg = DescriptorProto {
        name: Some("WithString".to_owned()),
        field: vec![scalar_field("s", 1, Type::String, Label::Optional)],
        ..Default::default()
    };
    build_pool(vec![msg], vec![])
        .get_message_by_name("test.WithString")
        .unwrap()
}

/// `message WithInt { int32 n = 1; }`
pub fn int_descriptor() -> MessageDescriptor {
    let msg = DescriptorProto {
        name: Some("WithInt".to_owned()),
        field: vec![scalar_field("n", 1, Type::Int32, Label::Optional)],
        ..Default::default()
    };
    build_pool(vec![msg], vec![])
        .get_message_by_name("test.WithInt")
        .unwrap()
}

/// `message WithBool { int32 b = 1; }` — deliberately typed `int32` so tests
/// can feed a JSON boolean at it and expect a type-mismatch error.
pub fn bool_mismatch_descriptor() -> MessageDescriptor {
    let msg = DescriptorProto {
        name: Some("WithBoolMismatch".to_owned()),
        field: vec![scalar_field("b", 1, Type::Int32, Label::Optional)],
        ..Default::default()
    };
    build_pool(vec![msg], vec![])
        .get_message_by_name("test.WithBoolMismatch")
        .unwrap()
}

/// `enum Color { RED = 0; GREEN = 1; }` / `message WithEnum { Color c = 1; }`
pub fn enum_descriptor() -> MessageDescriptor {
    let color = EnumDescriptorProto {
        name: Some("Color".to_owned()),
        value: vec![
            EnumValueDescriptorProto {
                name: Some("RED".to_owned()),
                number: Some(0),
                ..Default::default()
            },
            EnumValueDescriptorProto {
                name: Some("GREEN".to_owned()),
                number: Some(1),
                ..Default::default()
            },
        ],
        ..Default::default()
    };
    let msg = DescriptorProto {
        name: Some("WithEnum".to_owned()),
        field: vec![FieldDescriptorProto {
            type_name: Some(".test.Color".to_owned()),
            ..scalar_field("c", 1, Type::Enum, Label::Optional)
        }],
        ..Default::default()
    };
    build_pool(vec![msg], vec![color])
        .get_message_by_name("test.WithEnum")
        .unwrap()
}

/// `message WithBoolKeyMap { map<bool, int32> m = 1; }`
pub fn map_bool_key_descriptor() -> MessageDescriptor {
    let entry = DescriptorProto {
        name: Some("BEntry".to_owned()),
        field: vec![
            scalar_field("key", 1, Type::Bool, Label::Optional),
            scalar_field("value", 2, Type::Int32, Label::Optional),
        ],
        options: Some(MessageOptions {
            map_entry: Some(true),
            ..Default::default()
        }),
        ..Default::default()
    };
    let root = DescriptorProto {
        name: Some("WithBoolKeyMap".to_owned()),
        field: vec![FieldDescriptorProto {
            type_name: Some(".test.WithBoolKeyMap.BEntry".to_owned()),
            ..scalar_field("m", 1, Type::Message, Label::Repeated)
        }],
        nested_type: vec![entry],
        ..Default::default()
    };
    build_pool(vec![root], vec![])
        .get_message_by_name("test.WithBoolKeyMap")
        .unwrap()
}

/// `message Nested { Nested child = 1; }` — self-referential, for exercising
/// nesting-depth limits without needing a combinatorially deep schema.
pub fn nested_descriptor() -> MessageDescriptor {
    let msg = DescriptorProto {
        name: Some("Nested".to_owned()),
        field: vec![FieldDescriptorProto {
            type_name: Some(".test.Nested".to_owned()),
            ..scalar_field("child", 1, Type::Message, Label::Optional)
        }],
        ..Default::default()
    };
    build_pool(vec![msg], vec![])
        .get_message_by_name("test.Nested")
        .unwrap()
}

fn build_pool(messages: Vec<DescriptorProto>, enums: Vec<EnumDescriptorProto>) -> DescriptorPool {
    let file = FileDescriptorProto {
        name: Some("test.proto".to_owned()),
        package: Some("test".to_owned()),
        message_type: messages,
        enum_type: enums,
        syntax: Some("proto3".to_owned()),
        ..Default::default()
    };
    DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
        .expect("valid descriptor set")
}

/// A `Sink` that records every call as a short printable token, so tests can
/// assert on the emitted event sequence directly (design §8 property 1).
#[derive(Default)]
pub struct RecordingSink {
    pub events: Vec<String>,
}

#[derive(Debug)]
pub struct RecordingSinkError;

impl fmt::Display for RecordingSinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "recording sink error")
    }
}

impl Sink for RecordingSink {
    type Error = RecordingSinkError;

    fn start_message(&mut self) -> Result<(), Self::Error> {
        self.events.push("startmsg".into());
        Ok(())
    }
    fn end_message(&mut self) -> Result<(), Self::Error> {
        self.events.push("endmsg".into());
        Ok(())
    }
    fn start_submessage(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error> {
        self.events.push(format!("startsubmsg({})", field.name()));
        Ok(())
    }
    fn end_submessage(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error> {
        self.events.push(format!("endsubmsg({})", field.name()));
        Ok(())
    }
    fn start_sequence(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error> {
        self.events.push(format!("startseq({})", field.name()));
        Ok(())
    }
    fn end_sequence(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error> {
        self.events.push(format!("endseq({})", field.name()));
        Ok(())
    }
    fn start_string(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error> {
        self.events.push(format!("startstr({})", field.name()));
        Ok(())
    }
    fn end_string(&mut self, field: &FieldDescriptor) -> Result<(), Self::Error> {
        self.events.push(format!("endstr({})", field.name()));
        Ok(())
    }
    fn put_string_chunk(&mut self, field: &FieldDescriptor, chunk: &[u8]) -> Result<(), Self::Error> {
        self.events.push(format!(
            "putstring({},{:?})",
            field.name(),
            String::from_utf8_lossy(chunk)
        ));
        Ok(())
    }
    fn put_i32(&mut self, field: &FieldDescriptor, value: i32) -> Result<(), Self::Error> {
        self.events.push(format!("putint32({},{})", field.name(), value));
        Ok(())
    }
    fn put_i64(&mut self, field: &FieldDescriptor, value: i64) -> Result<(), Self::Error> {
        self.events.push(format!("putint64({},{})", field.name(), value));
        Ok(())
    }
    fn put_u32(&mut self, field: &FieldDescriptor, value: u32) -> Result<(), Self::Error> {
        self.events.push(format!("putuint32({},{})", field.name(), value));
        Ok(())
    }
    fn put_u64(&mut self, field: &FieldDescriptor, value: u64) -> Result<(), Self::Error> {
        self.events.push(format!("putuint64({},{})", field.name(), value));
        Ok(())
    }
    fn put_f32(&mut self, field: &FieldDescriptor, value: f32) -> Result<(), Self::Error> {
        self.events.push(format!("putfloat({},{})", field.name(), value));
        Ok(())
    }
    fn put_f64(&mut self, field: &FieldDescriptor, value: f64) -> Result<(), Self::Error> {
        self.events.push(format!("putdouble({},{})", field.name(), value));
        Ok(())
    }
    fn put_bool(&mut self, field: &FieldDescriptor, value: bool) -> Result<(), Self::Error> {
        self.events.push(format!("putbool({},{})", field.name(), value));
        Ok(())
    }
}
