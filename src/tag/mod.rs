//! Tag: the human-readable text serialization
//!
//! One message per line, in the form
//! `@Ns:Name|field=value|field=value|[ext1;ext2]`. Booleans render as
//! `Y`/`N`, sequences as `[e1;e2;…]`, static groups as `{k=v,k2=v2}`,
//! dynamic groups and objects as `{@Ns:Name|…}`, decimals as
//! `<mantissa>e<exponent>` and binary payloads as a bracketed hex list.
//! The reserved characters `| [ ] { } ; # \` escape as `\c`; bytes outside
//! printable ASCII escape as `\xNN`.
//!
//! ```
//! use blink_codec::{tag, Message, QName, Registry, Value};
//!
//! let registry = Registry::from_schema_text(
//! 	"
//! 	namespace Demo
//! 	Msg/2 -> bool Flag, u32 [] Values
//! 	",
//! )
//! .unwrap();
//!
//! let message = Message::new(QName::parse("Demo:Msg", None))
//! 	.with("Flag", true)
//! 	.with("Values", Value::seq([1u32, 2, 3]));
//!
//! let encoded = tag::encode_tag(&message, &registry).unwrap();
//! assert_eq!(encoded, "@Demo:Msg|Flag=Y|Values=[1;2;3]");
//! assert_eq!(tag::decode_tag(&encoded, &registry).unwrap(), message);
//! ```

use crate::{
	error::{DecodeError, EncodeError},
	registry::Registry,
	schema::{BinaryKind, BinaryType, EnumType, PrimitiveKind, QName, TypeRef},
	value::{DecimalValue, Fields, Message, StaticGroupValue, Value},
};

const RESERVED: &[u8] = b"|[]{};#\\";

/// Encode a message as a single Tag line
pub fn encode_tag(message: &Message, registry: &Registry) -> Result<String, EncodeError> {
	let mut out = String::new();
	format_message(&mut out, message, registry)?;
	Ok(out)
}

/// Encode messages one per line
pub fn encode_tag_stream(messages: &[Message], registry: &Registry) -> Result<String, EncodeError> {
	let lines: Vec<String> = messages
		.iter()
		.map(|message| encode_tag(message, registry))
		.collect::<Result<_, _>>()?;
	Ok(lines.join("\n"))
}

/// Decode a message from one Tag line
pub fn decode_tag(text: &str, registry: &Registry) -> Result<Message, DecodeError> {
	let text = text.trim();
	let Some(body) = text.strip_prefix('@') else {
		return Err(DecodeError::new("Invalid Tag message: missing @ prefix"));
	};
	let parts = split_top(body, '|');
	let Some((type_name, field_parts)) = parts.split_first() else {
		return Err(DecodeError::new("Invalid Tag message: no type specified"));
	};
	let qname = QName::parse(type_name.trim(), None);
	let (key, group) = registry.group_by_name(&qname).map_err(DecodeError::display)?;
	let group_namespace = group.name.namespace().map(str::to_owned);
	let mut message = Message::new(group.name.clone());
	for part in field_parts {
		let part = part.trim();
		if let Some(inner) = part.strip_prefix('[').and_then(|rest| rest.strip_suffix(']')) {
			for extension_text in split_top(inner.trim(), ';') {
				let extension_text = extension_text.trim();
				if !extension_text.is_empty() {
					message.extensions.push(decode_tag(extension_text, registry)?);
				}
			}
			continue;
		}
		let Some((name, value_text)) = part.split_once('=') else {
			return Err(DecodeError::msg(format_args!("Invalid field pair: {part}")));
		};
		let name = name.trim();
		let field = registry
			.effective_fields(key)
			.into_iter()
			.find(|field| field.name == name)
			.cloned();
		if let Some(field) = field {
			let value = parse_value(
				value_text.trim(),
				&field.type_ref,
				registry,
				group_namespace.as_deref(),
			)?;
			message.fields.insert(field.name, value);
		}
	}
	Ok(message)
}

/// Decode a stream of Tag lines, skipping blanks and `#` comments
pub fn decode_tag_stream(text: &str, registry: &Registry) -> Result<Vec<Message>, DecodeError> {
	let mut messages = Vec::new();
	for line in text.lines() {
		let line = line.trim();
		if !line.is_empty() && !line.starts_with('#') {
			messages.push(decode_tag(line, registry)?);
		}
	}
	Ok(messages)
}

fn format_message(out: &mut String, message: &Message, registry: &Registry) -> Result<(), EncodeError> {
	let (key, group) = registry
		.group_by_name(&message.type_name)
		.map_err(EncodeError::display)?;
	out.push('@');
	out.push_str(group.name.qualified());
	for field in registry.effective_fields(key) {
		let Some(value) = message.fields.get(&field.name) else {
			continue;
		};
		out.push('|');
		out.push_str(&field.name);
		out.push('=');
		format_value(out, value, &field.type_ref, registry)?;
	}
	if !message.extensions.is_empty() {
		out.push_str("|[");
		for (index, extension) in message.extensions.iter().enumerate() {
			if index > 0 {
				out.push(';');
			}
			format_message(out, extension, registry)?;
		}
		out.push(']');
	}
	Ok(())
}

fn format_value(
	out: &mut String,
	value: &Value,
	type_ref: &TypeRef,
	registry: &Registry,
) -> Result<(), EncodeError> {
	match type_ref {
		TypeRef::Primitive(kind) => format_primitive(out, *kind, value),
		TypeRef::Binary(binary) => match binary.kind {
			BinaryKind::String => {
				let text = value
					.as_str()
					.ok_or_else(|| EncodeError::new("string fields expect a string value"))?;
				escape_string(out, text);
				Ok(())
			}
			_ => {
				let bytes = value
					.as_bytes()
					.ok_or_else(|| EncodeError::new("binary fields expect a bytes value"))?;
				format_hex_list(out, bytes);
				Ok(())
			}
		},
		TypeRef::Enum(enum_type) => {
			out.push_str(enum_symbol(enum_type, value)?);
			Ok(())
		}
		TypeRef::Sequence(element) => {
			let items = value
				.as_sequence()
				.ok_or_else(|| EncodeError::new("Sequence fields expect a sequence value"))?;
			out.push('[');
			for (index, item) in items.iter().enumerate() {
				if index > 0 {
					out.push(';');
				}
				format_value(out, item, element, registry)?;
			}
			out.push(']');
			Ok(())
		}
		TypeRef::StaticGroup(key) => {
			let group_value = value
				.as_group()
				.ok_or_else(|| EncodeError::new("Static group fields expect a group value"))?;
			out.push('{');
			let mut first = true;
			for field in registry.effective_fields(*key) {
				let Some(value) = group_value.fields.get(&field.name) else {
					continue;
				};
				if !first {
					out.push(',');
				}
				first = false;
				out.push_str(&field.name);
				out.push('=');
				format_value(out, value, &field.type_ref, registry)?;
			}
			out.push('}');
			Ok(())
		}
		TypeRef::DynamicGroup(_) | TypeRef::Object => {
			let message = value.as_message().ok_or_else(|| {
				EncodeError::new("Dynamic group and object fields expect a message value")
			})?;
			out.push('{');
			format_message(out, message, registry)?;
			out.push('}');
			Ok(())
		}
	}
}

fn format_primitive(out: &mut String, kind: PrimitiveKind, value: &Value) -> Result<(), EncodeError> {
	use std::fmt::Write;
	match kind {
		PrimitiveKind::Bool => {
			let value = value
				.as_bool()
				.ok_or_else(|| EncodeError::new("bool fields expect a boolean value"))?;
			out.push(if value { 'Y' } else { 'N' });
		}
		PrimitiveKind::Decimal => {
			let DecimalValue { exponent, mantissa } = value
				.as_decimal()
				.ok_or_else(|| EncodeError::new("decimal fields expect a decimal value"))?;
			let _ = write!(out, "{mantissa}e{exponent}");
		}
		PrimitiveKind::F64 => {
			let value = value
				.as_f64()
				.ok_or_else(|| EncodeError::new("f64 fields expect a float value"))?;
			out.push_str(&float_token(value));
		}
		_ if kind.is_signed() => {
			let value = value.as_i64().ok_or_else(|| {
				EncodeError::msg(format_args!("{} fields expect an integer value", kind.keyword()))
			})?;
			let _ = write!(out, "{value}");
		}
		_ => {
			let value = value.as_u64().ok_or_else(|| {
				EncodeError::msg(format_args!(
					"{} fields expect a non-negative integer value",
					kind.keyword()
				))
			})?;
			let _ = write!(out, "{value}");
		}
	}
	Ok(())
}

pub(crate) fn float_token(value: f64) -> String {
	if value.is_nan() {
		"NaN".to_owned()
	} else if value == f64::INFINITY {
		"Inf".to_owned()
	} else if value == f64::NEG_INFINITY {
		"-Inf".to_owned()
	} else {
		value.to_string()
	}
}

pub(crate) fn enum_symbol<'v>(enum_type: &EnumType, value: &'v Value) -> Result<&'v str, EncodeError> {
	match value {
		Value::Enum(symbol) | Value::String(symbol) => {
			if enum_type.value_of(symbol).is_none() {
				return Err(EncodeError::msg(format_args!(
					"Enum {} has no symbol {symbol}",
					enum_type.name
				)));
			}
			Ok(symbol)
		}
		_ => Err(EncodeError::new("enum fields expect a symbol value")),
	}
}

/// Escape each UTF-8 byte: reserved characters as `\c`, bytes outside
/// printable ASCII as `\xNN`
fn escape_string(out: &mut String, text: &str) {
	use std::fmt::Write;
	for &byte in text.as_bytes() {
		match byte {
			b'\n' => out.push_str("\\n"),
			b'\r' => out.push_str("\\r"),
			b'\t' => out.push_str("\\t"),
			_ if RESERVED.contains(&byte) => {
				out.push('\\');
				out.push(byte as char);
			}
			0x20..=0x7E => out.push(byte as char),
			_ => {
				let _ = write!(out, "\\x{byte:02x}");
			}
		}
	}
}

/// Unescape to bytes first, then validate UTF-8, so decoding exactly
/// inverts [`escape_string`]
fn unescape_string(text: &str) -> Result<String, DecodeError> {
	let raw = text.as_bytes();
	let mut bytes = Vec::with_capacity(raw.len());
	let mut index = 0;
	while index < raw.len() {
		if raw[index] != b'\\' || index + 1 >= raw.len() {
			bytes.push(raw[index]);
			index += 1;
			continue;
		}
		let escape = raw[index + 1];
		index += 2;
		match escape {
			b'n' => bytes.push(b'\n'),
			b'r' => bytes.push(b'\r'),
			b't' => bytes.push(b'\t'),
			b'x' => {
				let byte = hex_escape(text, raw, index, 2)? as u8;
				bytes.push(byte);
				index += 2;
			}
			b'u' => {
				push_code_point(&mut bytes, hex_escape(text, raw, index, 4)?)?;
				index += 4;
			}
			b'U' => {
				push_code_point(&mut bytes, hex_escape(text, raw, index, 8)?)?;
				index += 8;
			}
			other => bytes.push(other),
		}
	}
	String::from_utf8(bytes).map_err(|_| DecodeError::new("Invalid UTF-8 in escaped string"))
}

fn hex_escape(text: &str, raw: &[u8], index: usize, digits: usize) -> Result<u32, DecodeError> {
	if index + digits > raw.len() {
		return Err(DecodeError::new("Incomplete hex escape"));
	}
	u32::from_str_radix(&text[index..index + digits], 16)
		.map_err(|_| DecodeError::new("Invalid hex escape"))
}

fn push_code_point(bytes: &mut Vec<u8>, code_point: u32) -> Result<(), DecodeError> {
	let ch = char::from_u32(code_point)
		.ok_or_else(|| DecodeError::new("Escape does not denote a character"))?;
	let mut utf8 = [0u8; 4];
	bytes.extend_from_slice(ch.encode_utf8(&mut utf8).as_bytes());
	Ok(())
}

fn format_hex_list(out: &mut String, bytes: &[u8]) {
	use std::fmt::Write;
	out.push('[');
	for (index, byte) in bytes.iter().enumerate() {
		if index > 0 {
			out.push(' ');
		}
		let _ = write!(out, "{byte:02x}");
	}
	out.push(']');
}

fn parse_hex_list(text: &str) -> Result<Vec<u8>, DecodeError> {
	let inner = text
		.strip_prefix('[')
		.and_then(|rest| rest.strip_suffix(']'))
		.ok_or_else(|| DecodeError::msg(format_args!("Invalid binary value: {text}")))?;
	let mut bytes = Vec::new();
	for pair in inner.split_whitespace() {
		let byte = u8::from_str_radix(pair, 16)
			.map_err(|_| DecodeError::msg(format_args!("Invalid hex byte: {pair}")))?;
		bytes.push(byte);
	}
	Ok(bytes)
}

fn parse_value(
	text: &str,
	type_ref: &TypeRef,
	registry: &Registry,
	default_namespace: Option<&str>,
) -> Result<Value, DecodeError> {
	match type_ref {
		TypeRef::Primitive(kind) => parse_primitive(text, *kind),
		TypeRef::Binary(binary) => match binary.kind {
			BinaryKind::String => Ok(Value::String(unescape_string(text)?)),
			_ => Ok(Value::Binary(parse_hex_list(text)?)),
		},
		TypeRef::Enum(enum_type) => {
			if enum_type.value_of(text).is_none() {
				return Err(DecodeError::msg(format_args!(
					"Enum {} has no symbol {text}",
					enum_type.name
				)));
			}
			Ok(Value::Enum(text.to_owned()))
		}
		TypeRef::Sequence(element) => {
			let inner = text
				.strip_prefix('[')
				.and_then(|rest| rest.strip_suffix(']'))
				.ok_or_else(|| DecodeError::msg(format_args!("Invalid sequence value: {text}")))?
				.trim();
			let mut items = Vec::new();
			if !inner.is_empty() {
				for item in split_top(inner, ';') {
					items.push(parse_value(item.trim(), element, registry, default_namespace)?);
				}
			}
			Ok(Value::Sequence(items))
		}
		TypeRef::StaticGroup(key) => {
			let inner = text
				.strip_prefix('{')
				.and_then(|rest| rest.strip_suffix('}'))
				.ok_or_else(|| DecodeError::msg(format_args!("Invalid static group value: {text}")))?
				.trim();
			let mut fields = Fields::new();
			if !inner.is_empty() {
				for pair in split_top(inner, ',') {
					let Some((name, value_text)) = pair.split_once('=') else {
						continue;
					};
					let name = name.trim();
					let field = registry
						.effective_fields(*key)
						.into_iter()
						.find(|field| field.name == name)
						.cloned();
					if let Some(field) = field {
						let value = parse_value(
							value_text.trim(),
							&field.type_ref,
							registry,
							default_namespace,
						)?;
						fields.insert(field.name, value);
					}
				}
			}
			Ok(Value::Group(StaticGroupValue { fields }))
		}
		TypeRef::DynamicGroup(_) | TypeRef::Object => {
			let inner = text
				.strip_prefix('{')
				.and_then(|rest| rest.strip_suffix('}'))
				.ok_or_else(|| DecodeError::msg(format_args!("Invalid dynamic group value: {text}")))?
				.trim();
			Ok(Value::Message(Box::new(decode_tag(inner, registry)?)))
		}
	}
}

fn parse_primitive(text: &str, kind: PrimitiveKind) -> Result<Value, DecodeError> {
	match kind {
		PrimitiveKind::Bool => match text {
			"Y" => Ok(Value::Bool(true)),
			"N" => Ok(Value::Bool(false)),
			_ if text.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
			_ if text.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
			_ => Err(DecodeError::msg(format_args!("Invalid boolean value: {text}"))),
		},
		PrimitiveKind::Decimal => parse_decimal(text).map(Value::Decimal),
		PrimitiveKind::F64 => Ok(Value::F64(parse_float(text)?)),
		_ if kind.is_signed() => text
			.parse()
			.map(Value::I64)
			.map_err(|_| DecodeError::msg(format_args!("Invalid integer value: {text}"))),
		_ => text
			.parse()
			.map(Value::U64)
			.map_err(|_| DecodeError::msg(format_args!("Invalid integer value: {text}"))),
	}
}

/// Parse the `<mantissa>e<exponent>` decimal form
pub(crate) fn parse_decimal(text: &str) -> Result<DecimalValue, DecodeError> {
	let invalid = || DecodeError::msg(format_args!("Invalid decimal value: {text}"));
	// Skip the leading sign so a negative mantissa keeps its own 'e'.
	let split_at = text
		.char_indices()
		.skip(1)
		.find(|&(_, ch)| ch == 'e' || ch == 'E')
		.map(|(idx, _)| idx)
		.ok_or_else(invalid)?;
	let mantissa = text[..split_at].parse().map_err(|_| invalid())?;
	let exponent = text[split_at + 1..].parse().map_err(|_| invalid())?;
	Ok(DecimalValue { exponent, mantissa })
}

pub(crate) fn parse_float(text: &str) -> Result<f64, DecodeError> {
	match text {
		"NaN" => Ok(f64::NAN),
		"Inf" => Ok(f64::INFINITY),
		"-Inf" => Ok(f64::NEG_INFINITY),
		_ => text
			.parse()
			.map_err(|_| DecodeError::msg(format_args!("Invalid float value: {text}"))),
	}
}

/// Split on `separator` at nesting depth zero, honoring `\` escapes and
/// bracket/brace nesting
fn split_top(text: &str, separator: char) -> Vec<&str> {
	let mut parts = Vec::new();
	let mut depth = 0usize;
	let mut start = 0;
	let mut escaped = false;
	for (index, ch) in text.char_indices() {
		if escaped {
			escaped = false;
			continue;
		}
		match ch {
			'\\' => escaped = true,
			'[' | '{' => depth += 1,
			']' | '}' => depth = depth.saturating_sub(1),
			_ if ch == separator && depth == 0 => {
				parts.push(&text[start..index]);
				start = index + ch.len_utf8();
			}
			_ => {}
		}
	}
	parts.push(&text[start..]);
	parts
}
