#![no_main]
use std::cell::RefCell;
use std::sync::OnceLock;

use arbitrary::Arbitrary;
use libfuzzer_sys::{fuzz_mutator, fuzz_target, fuzzer_mutate};
use prost_reflect::{DescriptorPool, MessageDescriptor};
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, EnumValueDescriptorProto, FieldDescriptorProto,
    FileDescriptorProto, FileDescriptorSet, MessageOptions,
};
use protojson_stream::{parse_all_to_message, DynamicMessageSink, Parser, ParserMethod, ParserOptions};
use rand::rngs::SmallRng; // faster than StdRng
use rand::{Rng, RngCore, SeedableRng};
use serde_json::{Map, Value};

const HEADER: usize = 5; // 1 flag + 4-byte seed

thread_local! {
    // One SmallRng per thread, seeded once from the host OS
    static RNG: RefCell<SmallRng> =
        RefCell::new(SmallRng::from_os_rng());
}

static WS_TABLE: &[&[u8]] = &[
    b" ",
    b"\t",
    b"\n",
    b"\r", // JSON core
    "\u{1680}".as_bytes(),
    "\u{2000}".as_bytes(),
    "\u{2001}".as_bytes(),
    "\u{2002}".as_bytes(),
    "\u{2003}".as_bytes(),
    "\u{2004}".as_bytes(),
    "\u{2005}".as_bytes(),
    "\u{2006}".as_bytes(),
    "\u{2007}".as_bytes(),
    "\u{2008}".as_bytes(),
    "\u{2009}".as_bytes(),
    "\u{200A}".as_bytes(),
    "\u{2028}".as_bytes(),
    "\u{2029}".as_bytes(),
    "\u{202F}".as_bytes(),
    "\u{205F}".as_bytes(),
    "\u{3000}".as_bytes(),
];

/// Helper: borrow the thread-local RNG and run a closure with it.
fn with_rng<F, R>(f: F) -> R
where
    F: FnOnce(&mut SmallRng) -> R,
{
    RNG.with(|cell| f(&mut cell.borrow_mut()))
}

fn mutator(data: &mut [u8], size: usize, max_size: usize, seed: u32) -> usize {
    if size < HEADER || seed.is_multiple_of(10) {
        data[0] = with_rng(|rng| rng.next_u32() as u8 & 0x1F); // 5 bits

        // 2) split-seed
        data[1..5].copy_from_slice(&with_rng(|rng| rng.next_u32().to_le_bytes()));

        let mut prefix = HEADER;

        while prefix < size {
            let limit = max_size - prefix;

            prefix += append_whitespace(&mut data[prefix..], limit);
            prefix += append_value(&mut data[prefix..], size, limit);
            prefix += append_whitespace(&mut data[prefix..], limit);
        }

        prefix
    } else {
        fuzzer_mutate(data, size, max_size)
    }
}

/// Append 1‒N whitespace code-points (N chosen randomly) to `buf`,
/// but never exceed `limit`.  Returns the number of bytes written.
fn append_whitespace(buf: &mut [u8], limit: usize) -> usize {
    with_rng(|rng| {
        if limit == 0 {
            return 0;
        }

        let n_codepoints = rng.random_range(1..=limit.min(8));
        let mut written = 0;

        for _ in 0..n_codepoints {
            let w = WS_TABLE[rng.random_range(0..WS_TABLE.len())];

            // Stop if this whitespace would overflow the caller’s slice.
            if written + w.len() > limit {
                break;
            }

            buf[written..written + w.len()].copy_from_slice(w);
            written += w.len();
        }
        written
    })
}

fn append_value(data: &mut [u8], size: usize, limit: usize) -> usize {
    let value = loop {
        let s = with_rng(|rng| rng.random_range(size / 2..size * 2).min(limit));
        let bytes: Vec<u8> = with_rng(|rng| (0..s).map(|_| rng.random::<u8>()).collect());
        match ArbitraryValue::arbitrary(&mut arbitrary::Unstructured::new(&bytes)) {
            Ok(value) => break value,
            Err(_) => continue,
        };
    };

    let serialized = serde_json::to_vec(&value.0).expect("Failed to serialize arbitrary value");

    let len = serialized.len().min(limit);
    data[..len].copy_from_slice(&serialized[..len]);

    len
}

fuzz_mutator!(|data: &mut [u8], size: usize, max_size: usize, seed: u32| {
    mutator(data, size, max_size, seed)
});

/// An arbitrary JSON value. Object keys are drawn from the fuzz target's
/// fixed schema so a useful fraction of generated documents actually bind to
/// real fields rather than bottoming out on "no such field" every time.
#[derive(Debug)]
struct ArbitraryValue(Value);

const FIELD_NAMES: &[&str] = &[
    "id", "name", "flag", "score", "payload", "tags", "child", "status", "attributes",
];

impl<'a> Arbitrary<'a> for ArbitraryValue {
    fn arbitrary(u: &mut arbitrary::Unstructured<'_>) -> arbitrary::Result<Self> {
        let node_type = u.choose_index(21)?;
        let value = match node_type {
            0 => Value::Null,
            1 => Value::Bool(u.arbitrary()?), // Arbitrary boolean
            2 => {
                let n: f64 = u.arbitrary()?;
                Value::Number(
                    serde_json::Number::from_f64(n).ok_or(arbitrary::Error::IncorrectFormat)?,
                )
            }
            3..=10 => Value::String(u.arbitrary()?), // Arbitrary string
            11..=15 => {
                let elems: Vec<ArbitraryValue> = u.arbitrary()?;
                Value::Array(elems.into_iter().map(|v| v.0).collect())
            }
            16..=20 => {
                let m: Vec<(u8, ArbitraryValue)> = u.arbitrary()?;
                Value::Object(Map::from_iter(m.into_iter().map(|(k, v)| {
                    (FIELD_NAMES[k as usize % FIELD_NAMES.len()].to_owned(), v.0)
                })))
            }
            _ => Err(arbitrary::Error::IncorrectFormat)?,
        };
        Ok(ArbitraryValue(value))
    }
}

fn scalar_field(name: &str, number: i32, ty: Type, label: Label) -> FieldDescriptorProto {
    FieldDescriptorProto {
        name: Some(name.to_owned()),
        number: Some(number),
        label: Some(label as i32),
        r#type: Some(ty as i32),
        json_name: Some(name.to_owned()),
        ..Default::default()
    }
}

/// The schema this fuzz target parses arbitrary JSON against: one message
/// exercising every scalar kind, a nested message, a repeated string, a map,
/// and an enum.
fn fuzz_root() -> MessageDescriptor {
    static ROOT: OnceLock<MessageDescriptor> = OnceLock::new();
    ROOT.get_or_init(|| {
        let status_enum = EnumDescriptorProto {
            name: Some("Status".to_owned()),
            value: vec![
                EnumValueDescriptorProto {
                    name: Some("UNKNOWN".to_owned()),
                    number: Some(0),
                    ..Default::default()
                },
                EnumValueDescriptorProto {
                    name: Some("ACTIVE".to_owned()),
                    number: Some(1),
                    ..Default::default()
                },
            ],
            ..Default::default()
        };

        let child = DescriptorProto {
            name: Some("Child".to_owned()),
            field: vec![scalar_field("label", 1, Type::String, Label::Optional)],
            ..Default::default()
        };

        let attributes_entry = DescriptorProto {
            name: Some("AttributesEntry".to_owned()),
            field: vec![
                scalar_field("key", 1, Type::String, Label::Optional),
                scalar_field("value", 2, Type::String, Label::Optional),
            ],
            options: Some(MessageOptions {
                map_entry: Some(true),
                ..Default::default()
            }),
            ..Default::default()
        };

        let root = DescriptorProto {
            name: Some("FuzzRoot".to_owned()),
            field: vec![
                scalar_field("id", 1, Type::Int64, Label::Optional),
                scalar_field("name", 2, Type::String, Label::Optional),
                scalar_field("flag", 3, Type::Bool, Label::Optional),
                scalar_field("score", 4, Type::Double, Label::Optional),
                scalar_field("payload", 5, Type::Bytes, Label::Optional),
                scalar_field("tags", 6, Type::String, Label::Repeated),
                FieldDescriptorProto {
                    type_name: Some(".fuzz.Child".to_owned()),
                    ..scalar_field("child", 7, Type::Message, Label::Optional)
                },
                FieldDescriptorProto {
                    type_name: Some(".fuzz.Status".to_owned()),
                    ..scalar_field("status", 8, Type::Enum, Label::Optional)
                },
                FieldDescriptorProto {
                    type_name: Some(".fuzz.FuzzRoot.AttributesEntry".to_owned()),
                    ..scalar_field("attributes", 9, Type::Message, Label::Repeated)
                },
            ],
            nested_type: vec![attributes_entry],
            ..Default::default()
        };

        let file = FileDescriptorProto {
            name: Some("fuzz_root.proto".to_owned()),
            package: Some("fuzz".to_owned()),
            message_type: vec![root, child],
            enum_type: vec![status_enum],
            syntax: Some("proto3".to_owned()),
            ..Default::default()
        };

        let pool = DescriptorPool::from_file_descriptor_set(FileDescriptorSet { file: vec![file] })
            .expect("fuzz target descriptor set is valid");
        pool.get_message_by_name("fuzz.FuzzRoot")
            .expect("FuzzRoot registered above")
    })
    .clone()
}

fn parser(data: &[u8]) {
    if data.len() < HEADER {
        return;
    }

    let flags = data[0];
    let split_seed = u32::from_le_bytes(data[1..5].try_into().unwrap()) as u64;
    let data = &data[5..];

    if data.is_empty() {
        return;
    }

    let str = String::from_utf8_lossy(data).into_owned();

    // Use the random number we chose to split the input into chunks:
    let chunks = split_into_safe_chunks(&str, split_seed);

    let options = ParserOptions {
        ignore_unknown_fields: flags & 1 != 0,
        max_depth: if flags & 2 != 0 { 8 } else { 64 },
    };
    let method = ParserMethod::cached(fuzz_root());

    // Exercise the one-shot convenience path.
    let _ = parse_all_to_message(method.clone(), str.as_bytes(), options);

    // Exercise the chunked streaming path; must never panic regardless of
    // where the fuzzer happens to split a token.
    let mut streaming = Parser::new(method, DynamicMessageSink::new(fuzz_root()), options);
    for chunk in &chunks {
        if streaming.parse(chunk.as_bytes()).is_err() {
            return;
        }
    }
    let _ = streaming.end();
}

fuzz_target!(|data: &[u8]| parser(data));

/// Split a UTF-8 `&str` into boundary-safe chunks using a deterministic random
/// value to generate splits.
///
/// * `split_seed` may be any `u64`.
/// * Each chunk is at least one byte.
/// * Every slice ends on a valid UTF-8 boundary, so it can’t panic.
fn split_into_safe_chunks(serialized: &str, split_seed: u64) -> Vec<&str> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let len = serialized.len();

    while start < len {
        let remaining = len - start;

        // Derive a candidate size from the fixed seed.
        let mut size = (split_seed as usize % remaining) + 1;

        // Bump `size` forward until it lands on a char boundary
        // (or hits the end of the string, which is always a boundary).
        while start + size < len && !serialized.is_char_boundary(start + size) {
            size += 1;
        }

        chunks.push(&serialized[start..start + size]);
        start += size;
    }

    chunks
}
