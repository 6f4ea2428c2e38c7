//! # Getting started
//!
//! ```
//! let schema: blink_codec::Schema = "
//! namespace Demo
//!
//! Hello/1 -> string Greeting
//! "
//! .parse()
//! .expect("Failed to parse schema");
//!
//! let registry = blink_codec::Registry::from_schema(schema);
//!
//! let message = blink_codec::Message::new(blink_codec::QName::parse("Demo:Hello", None))
//! 	.with("Greeting", "Hello World");
//!
//! // Compact Binary round trip
//! let encoded = blink_codec::compact::encode_message(&message, &registry)
//! 	.expect("Failed to encode");
//! let (decoded, next) = blink_codec::compact::decode_message(&encoded, &registry, 0)
//! 	.expect("Failed to decode");
//! assert_eq!(decoded, message);
//! assert_eq!(next, encoded.len());
//! ```
//!
//! # One schema, five codecs
//!
//! A schema text compiles into a [`Schema`] and is indexed into a
//! [`Registry`]; messages conforming to it serialize through any of the
//! codec modules — [`compact`] (length-prefixed VLC fields), [`native`]
//! (fixed-width layout with relative offsets and a data area), [`tag`]
//! (line-oriented text), [`json`] and [`xml`]. The [`exchange`] module
//! layers Dynamic Schema Exchange over the compact decoder: messages in
//! the reserved type-id range 16000–16383 mutate the registry instead of
//! reaching the application.
//!
//! All codecs share the [`Message`]/[`Value`] model and agree on value
//! equality, so any of them round-trips what the others produce.

pub mod compact;
pub mod exchange;
pub mod json;
pub mod native;
pub mod registry;
pub mod schema;
pub mod tag;
pub mod value;
pub mod xml;

mod error;

pub use {
	error::{DecodeError, EncodeError},
	registry::{Registry, RegistryError},
	schema::{compile_schema, compile_schema_file, QName, Schema, SchemaError},
	value::{DecimalValue, Fields, Message, StaticGroupValue, Value},
};
