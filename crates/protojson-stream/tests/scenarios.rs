//! Worked examples from the design's testable-properties section, checked
//! against the literal emitted event sequence.

mod support;

use protojson_stream::{ErrorKind, Parser, ParserMethod, ParserOptions};
use support::{
    bool_mismatch_descriptor, bytes_descriptor, int_descriptor, map_descriptor, nested_descriptor,
    string_descriptor, widget_descriptor, RecordingSink,
};

fn run(descriptor: prost_reflect::MessageDescriptor, input: &[u8]) -> (Vec<String>, Option<protojson_stream::ParserError>) {
    let method = ParserMethod::new(descriptor.clone());
    let mut parser = Parser::new(method, RecordingSink::default(), ParserOptions::default());
    let result = parser.parse(input).and_then(|_| parser.end());
    match result {
        Ok(()) => (parser.into_sink().events, None),
        Err(e) => (parser.sink_mut().events.clone(), Some(e)),
    }
}

#[test]
fn simple_message_events() {
    let (events, err) = run(widget_descriptor(), br#"{"a":1,"b":"hi"}"#);
    assert!(err.is_none(), "{err:?}");
    assert_eq!(
        events,
        vec![
            "startmsg",
            "putint32(a,1)",
            "startstr(b)",
            "putstring(b,\"hi\")",
            "endstr(b)",
            "endmsg",
        ]
    );
}

#[test]
fn map_field_events() {
    let (events, err) = run(map_descriptor(), br#"{"m":{"k":1,"l":2}}"#);
    assert!(err.is_none(), "{err:?}");
    assert_eq!(
        events,
        vec![
            "startmsg",
            "startseq(m)",
            "startsubmsg(m)",
            "startmsg",
            "startstr(key)",
            "putstring(key,\"k\")",
            "endstr(key)",
            "putint32(value,1)",
            "endmsg",
            "endsubmsg(m)",
            "startsubmsg(m)",
            "startmsg",
            "startstr(key)",
            "putstring(key,\"l\")",
            "endstr(key)",
            "putint32(value,2)",
            "endmsg",
            "endsubmsg(m)",
            "endseq(m)",
            "endmsg",
        ]
    );
}

#[test]
fn bytes_field_decodes_base64() {
    let (events, err) = run(bytes_descriptor(), br#"{"b":"aGVsbG8="}"#);
    assert!(err.is_none(), "{err:?}");
    assert_eq!(
        events,
        vec!["startmsg", "startstr(b)", "putstring(b,\"hello\")", "endstr(b)", "endmsg"]
    );
}

#[test]
fn unicode_escape_decodes_to_utf8() {
    let (events, err) = run(string_descriptor(), b"{\"s\":\"a\\u0041\\u00e9\"}");
    assert!(err.is_none(), "{err:?}");
    // chunking of individual put_string_chunk calls is an implementation
    // detail; what matters is the concatenation.
    let joined: String = events
        .iter()
        .filter(|e| e.starts_with("putstring"))
        .map(|e| {
            e.trim_start_matches("putstring(s,\"")
                .trim_end_matches("\")")
                .to_owned()
        })
        .collect();
    assert_eq!(joined, "aA\u{e9}");
    assert_eq!(events.first().unwrap(), "startmsg");
    assert_eq!(events.last().unwrap(), "endmsg");
}

#[test]
fn two_chunk_split_number_matches_single_chunk() {
    let method = ParserMethod::new(int_descriptor());
    let mut chunked = Parser::new(method.clone(), RecordingSink::default(), ParserOptions::default());
    chunked.parse(br#"{"n":12"#).unwrap();
    chunked.parse(br#"345}"#).unwrap();
    chunked.end().unwrap();

    let mut whole = Parser::new(method, RecordingSink::default(), ParserOptions::default());
    whole.parse(br#"{"n":12345}"#).unwrap();
    whole.end().unwrap();

    assert_eq!(chunked.into_sink().events, whole.into_sink().events);
}

#[test]
fn unknown_field_is_fatal_by_default() {
    let (_events, err) = run(widget_descriptor(), br#"{"x":1}"#);
    let err = err.expect("should fail");
    assert!(matches!(err.kind, ErrorKind::NoSuchField(ref n) if &**n == "x"));
}

#[test]
fn nesting_too_deep_on_65th_open_brace() {
    let mut input = String::new();
    for _ in 0..70 {
        input.push_str(r#"{"child":"#);
    }
    let (_events, err) = run(nested_descriptor(), input.as_bytes());
    let err = err.expect("should fail");
    assert!(matches!(err.kind, ErrorKind::NestingTooDeep), "{:?}", err.kind);
}

#[test]
fn bool_for_non_bool_field_is_fatal() {
    let (_events, err) = run(bool_mismatch_descriptor(), br#"{"b":true}"#);
    let err = err.expect("should fail");
    assert!(matches!(err.kind, ErrorKind::BoolForNonBoolField(ref n) if &**n == "b"));
}
