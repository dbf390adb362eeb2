//! A streaming, schema-directed JSON-to-protobuf parser.
//!
//! Feed chunks of JSON text — however they happen to arrive over the wire —
//! to a [`Parser`], bound to a [`ParserMethod`] derived from a
//! `prost_reflect` message descriptor, and it emits semantic events
//! (`start_message`, `put_i32`, `start_string`, ...) against a [`Sink`] as
//! tokens are recognized. No intermediate JSON value tree is ever built, and
//! no chunk boundary needs to land on a token boundary.
//!
//! [`parse_all_to_message`] is the convenience entry point for the common
//! case of decoding one complete, non-chunked buffer into a
//! [`prost_reflect::DynamicMessage`].
//!
//! ```rust
//! use prost_reflect::DescriptorPool;
//! use protojson_stream::{parse_all_to_message, ParserMethod, ParserOptions};
//!
//! # fn doctest(pool: DescriptorPool) -> Result<(), Box<dyn std::error::Error>> {
//! let root = pool.get_message_by_name("example.Widget").unwrap();
//! let method = ParserMethod::cached(root);
//! let message = parse_all_to_message(method, br#"{"id": 1}"#, ParserOptions::default())?;
//! # let _ = message;
//! # Ok(())
//! # }
//! ```

mod accumulator;
mod base64;
mod capture;
mod error;
mod escape;
mod frame;
mod machine;
mod multipart;
mod number;
mod options;
mod parser;
mod schema;
mod sink;

pub use error::{ErrorKind, ParserError};
pub use options::ParserOptions;
pub use parser::{parse_all_to_message, Parser};
pub use schema::ParserMethod;
pub use sink::{DynamicMessageSink, DynamicMessageSinkError, Sink};
