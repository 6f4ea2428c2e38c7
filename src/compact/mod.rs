//! Compact Binary: length-prefixed frames of VLC-coded fields
//!
//! A frame is `vlc(length) ++ vlc(type_id) ++ payload`, where `length`
//! covers the type id and the payload. Fields serialize in effective order
//! (inherited fields first); dynamic groups and objects nest full frames;
//! extensions follow the field list as `vlc(count) ++ frames`.
//!
//! ```
//! use blink_codec::{compact, Message, QName, Registry};
//!
//! let registry = Registry::from_schema_text(
//! 	"
//! 	namespace Demo
//! 	Bill/2 -> u32 Amount, u32 Tip?
//! 	",
//! )
//! .unwrap();
//!
//! let message = Message::new(QName::parse("Demo:Bill", None)).with("Amount", 100u32);
//! let encoded = compact::encode_message(&message, &registry).unwrap();
//! let (decoded, _) = compact::decode_message(&encoded, &registry, 0).unwrap();
//! assert_eq!(decoded, message);
//! ```

pub mod vlc;

use crate::{
	error::{DecodeError, EncodeError},
	registry::Registry,
	schema::{BinaryKind, BinaryType, EnumType, GroupKey, PrimitiveKind, TypeRef},
	value::{DecimalValue, Fields, Message, StaticGroupValue, Value},
};

/// Presence byte marking an optional fixed/static-group value as present
const PRESENT: u8 = 0x01;
/// Presence byte marking an optional fixed/static-group value as absent
const ABSENT: u8 = vlc::NULL_BYTE;

/// A decoded Compact Binary message frame
#[derive(Clone, Debug)]
pub struct Frame {
	pub type_id: u64,
	/// The payload bytes (fields and extension suffix, undecoded)
	pub payload: Vec<u8>,
	/// The frame length as carried on the wire (type id + payload bytes)
	pub length: usize,
	/// The group the type id resolved to, when a registry was supplied and
	/// knew the id
	pub group: Option<GroupKey>,
}

/// Encode the Compact Binary length/type-id preamble around `payload`
pub fn encode_frame(type_id: u64, payload: &[u8]) -> Vec<u8> {
	let mut body = Vec::with_capacity(payload.len() + 2);
	vlc::write_u64(&mut body, type_id);
	body.extend_from_slice(payload);
	let mut out = Vec::with_capacity(body.len() + 2);
	vlc::write_u64(&mut out, body.len() as u64);
	out.extend_from_slice(&body);
	out
}

/// Decode a single frame from `buf` starting at `offset`
///
/// When a registry is supplied the type id is resolved; in strict mode an
/// unknown id fails, otherwise the frame comes back with no group binding
/// so the caller can choose to skip it.
pub fn decode_frame(
	buf: &[u8],
	offset: usize,
	registry: Option<&Registry>,
	strict: bool,
) -> Result<(Frame, usize), DecodeError> {
	let (length, cursor) = vlc::read_u64(buf, offset)?;
	let Some(length) = length else {
		return Err(DecodeError::new("Frame length cannot be NULL"));
	};
	let length = usize::try_from(length)
		.map_err(|_| DecodeError::new("Frame length exceeds addressable memory"))?;
	let end = cursor
		.checked_add(length)
		.filter(|&end| end <= buf.len())
		.ok_or_else(|| DecodeError::new("Truncated Compact Binary frame"))?;
	let (type_id, cursor) = vlc::read_u64(buf, cursor)?;
	let Some(type_id) = type_id else {
		return Err(DecodeError::new("Frame type id cannot be NULL"));
	};
	if cursor > end {
		return Err(DecodeError::new("Frame type id overruns the frame length"));
	}
	let group = match registry {
		None => None,
		Some(registry) => match registry.group_by_id(type_id) {
			Ok((key, _)) => Some(key),
			Err(error) => {
				if strict {
					return Err(DecodeError::display(error));
				}
				None
			}
		},
	};
	Ok((
		Frame {
			type_id,
			payload: buf[cursor..end].to_vec(),
			length,
			group,
		},
		end,
	))
}

/// Iterator over the frames of a buffer, in order
pub fn frames<'a, 'r>(buf: &'a [u8], registry: Option<&'r Registry>, strict: bool) -> Frames<'a, 'r> {
	Frames {
		buf,
		offset: 0,
		registry,
		strict,
		failed: false,
	}
}

/// See [`frames`]
pub struct Frames<'a, 'r> {
	buf: &'a [u8],
	offset: usize,
	registry: Option<&'r Registry>,
	strict: bool,
	failed: bool,
}

impl Iterator for Frames<'_, '_> {
	type Item = Result<Frame, DecodeError>;
	fn next(&mut self) -> Option<Self::Item> {
		if self.failed || self.offset >= self.buf.len() {
			return None;
		}
		match decode_frame(self.buf, self.offset, self.registry, self.strict) {
			Ok((frame, next)) => {
				self.offset = next;
				Some(Ok(frame))
			}
			Err(error) => {
				self.failed = true;
				Some(Err(error))
			}
		}
	}
}

/// Encode `message` (fields + extensions) and wrap it in a frame
pub fn encode_message(message: &Message, registry: &Registry) -> Result<Vec<u8>, EncodeError> {
	let (key, group) = registry
		.group_by_name(&message.type_name)
		.map_err(EncodeError::display)?;
	let Some(type_id) = group.type_id else {
		return Err(EncodeError::msg(format_args!(
			"Group {} is missing a type id and cannot be encoded",
			group.name
		)));
	};
	let mut payload = Vec::new();
	encode_group_fields(&mut payload, key, &message.fields, registry)?;
	encode_extensions(&mut payload, &message.extensions, registry)?;
	Ok(encode_frame(type_id, &payload))
}

/// Decode a message (frame + fields + extensions) from `buf`
///
/// Returns the message plus the offset of the next frame.
pub fn decode_message(
	buf: &[u8],
	registry: &Registry,
	offset: usize,
) -> Result<(Message, usize), DecodeError> {
	let (frame, next) = decode_frame(buf, offset, Some(registry), true)?;
	let key = frame
		.group
		.expect("strict frame decoding always binds a group");
	let message = decode_message_payload(key, &frame.payload, registry)?;
	Ok((message, next))
}

/// Decode every message in `buf`, in order
pub fn decode_stream(buf: &[u8], registry: &Registry) -> Result<Vec<Message>, DecodeError> {
	let mut messages = Vec::new();
	let mut offset = 0;
	while offset < buf.len() {
		let (message, next) = decode_message(buf, registry, offset)?;
		messages.push(message);
		offset = next;
	}
	Ok(messages)
}

/// Decode a frame payload: the group's fields, then the extension suffix
/// when present
pub(crate) fn decode_message_payload(
	key: GroupKey,
	payload: &[u8],
	registry: &Registry,
) -> Result<Message, DecodeError> {
	let (fields, cursor) = decode_group_fields(key, payload, 0, registry)?;
	let mut message = Message::new(registry.group(key).name.clone());
	message.fields = fields;
	if cursor < payload.len() {
		message.extensions = decode_extensions(payload, cursor, registry)?;
	}
	Ok(message)
}

pub(crate) fn encode_group_fields(
	out: &mut Vec<u8>,
	key: GroupKey,
	fields: &Fields,
	registry: &Registry,
) -> Result<(), EncodeError> {
	let group_name = &registry.group(key).name;
	for field in registry.effective_fields(key) {
		let value = fields.get(&field.name);
		if value.is_none() && !field.optional {
			return Err(EncodeError::msg(format_args!(
				"Missing required field {} for {group_name}",
				field.name
			)));
		}
		encode_type(out, &field.type_ref, value, field.optional, registry)?;
	}
	Ok(())
}

fn encode_type(
	out: &mut Vec<u8>,
	type_ref: &TypeRef,
	value: Option<&Value>,
	optional: bool,
	registry: &Registry,
) -> Result<(), EncodeError> {
	match type_ref {
		TypeRef::Primitive(kind) => encode_primitive(out, *kind, value, optional),
		TypeRef::Binary(binary) => encode_binary(out, binary, value, optional),
		TypeRef::Enum(enum_type) => encode_enum(out, enum_type, value, optional),
		TypeRef::Sequence(element) => match value {
			None => {
				if !optional {
					return Err(EncodeError::new("Non-optional sequence cannot be absent"));
				}
				vlc::write_null(out);
				Ok(())
			}
			Some(value) => {
				let items = value
					.as_sequence()
					.ok_or_else(|| EncodeError::new("Sequence fields expect a sequence value"))?;
				vlc::write_u64(out, items.len() as u64);
				for item in items {
					encode_type(out, element, Some(item), false, registry)?;
				}
				Ok(())
			}
		},
		TypeRef::StaticGroup(key) => match value {
			None => {
				if !optional {
					return Err(EncodeError::msg(format_args!(
						"Static group {} requires a value",
						registry.group(*key).name
					)));
				}
				out.push(ABSENT);
				Ok(())
			}
			Some(value) => {
				let group_value = value
					.as_group()
					.ok_or_else(|| EncodeError::new("Static group fields expect a group value"))?;
				if optional {
					out.push(PRESENT);
				}
				encode_group_fields(out, *key, &group_value.fields, registry)
			}
		},
		TypeRef::DynamicGroup(_) | TypeRef::Object => match value {
			None => {
				if !optional {
					return Err(EncodeError::new("Dynamic group requires a value"));
				}
				vlc::write_null(out);
				Ok(())
			}
			Some(value) => {
				let message = value.as_message().ok_or_else(|| {
					EncodeError::new("Dynamic group and object fields expect a message value")
				})?;
				let encoded = encode_message(message, registry)?;
				out.extend_from_slice(&encoded);
				Ok(())
			}
		},
	}
}

fn encode_primitive(
	out: &mut Vec<u8>,
	kind: PrimitiveKind,
	value: Option<&Value>,
	optional: bool,
) -> Result<(), EncodeError> {
	let Some(value) = value else {
		if !optional {
			return Err(EncodeError::new("Non-optional primitive field cannot be absent"));
		}
		// An absent optional decimal is a single NULL: the decoder stops
		// after the exponent.
		vlc::write_null(out);
		return Ok(());
	};
	match kind {
		PrimitiveKind::Bool => {
			let value = value
				.as_bool()
				.ok_or_else(|| EncodeError::new("bool fields expect a boolean value"))?;
			vlc::write_u64(out, u64::from(value));
		}
		PrimitiveKind::Decimal => {
			let DecimalValue { exponent, mantissa } = value
				.as_decimal()
				.ok_or_else(|| EncodeError::new("decimal fields expect a decimal value"))?;
			vlc::write_i64(out, i64::from(exponent));
			vlc::write_i64(out, mantissa);
		}
		PrimitiveKind::F64 => {
			let value = value
				.as_f64()
				.ok_or_else(|| EncodeError::new("f64 fields expect a float value"))?;
			vlc::write_u64(out, value.to_bits());
		}
		_ if kind.is_signed() => {
			let value = value.as_i64().ok_or_else(|| {
				EncodeError::msg(format_args!("{} fields expect an integer value", kind.keyword()))
			})?;
			vlc::write_i64(out, value);
		}
		_ => {
			let value = value.as_u64().ok_or_else(|| {
				EncodeError::msg(format_args!(
					"{} fields expect a non-negative integer value",
					kind.keyword()
				))
			})?;
			vlc::write_u64(out, value);
		}
	}
	Ok(())
}

fn encode_binary(
	out: &mut Vec<u8>,
	binary: &BinaryType,
	value: Option<&Value>,
	optional: bool,
) -> Result<(), EncodeError> {
	let Some(value) = value else {
		if !optional {
			return Err(EncodeError::new("Non-optional binary field cannot be absent"));
		}
		match binary.kind {
			// Nullable fixed fields use a presence byte, not a VLC null.
			BinaryKind::Fixed => out.push(ABSENT),
			_ => vlc::write_null(out),
		}
		return Ok(());
	};
	let data: &[u8] = match binary.kind {
		BinaryKind::String => value
			.as_str()
			.ok_or_else(|| EncodeError::new("string fields expect a string value"))?
			.as_bytes(),
		BinaryKind::Binary | BinaryKind::Fixed => value
			.as_bytes()
			.ok_or_else(|| EncodeError::new("binary fields expect a bytes value"))?,
	};
	if binary.kind == BinaryKind::Fixed {
		let size = binary.size.unwrap_or(0) as usize;
		if data.len() != size {
			return Err(EncodeError::msg(format_args!(
				"Fixed field requires exactly {size} bytes, got {}",
				data.len()
			)));
		}
		if optional {
			out.push(PRESENT);
		}
		out.extend_from_slice(data);
	} else {
		vlc::write_u64(out, data.len() as u64);
		out.extend_from_slice(data);
	}
	Ok(())
}

fn encode_enum(
	out: &mut Vec<u8>,
	enum_type: &EnumType,
	value: Option<&Value>,
	optional: bool,
) -> Result<(), EncodeError> {
	let Some(value) = value else {
		if !optional {
			return Err(EncodeError::new("Non-optional enum field cannot be absent"));
		}
		vlc::write_null(out);
		return Ok(());
	};
	let number = enum_symbol_value(enum_type, value)?;
	vlc::write_i64(out, i64::from(number));
	Ok(())
}

/// Resolve an enum value given either a symbol name or a raw integer
pub(crate) fn enum_symbol_value(enum_type: &EnumType, value: &Value) -> Result<i32, EncodeError> {
	match value {
		Value::Enum(symbol) | Value::String(symbol) => {
			enum_type.value_of(symbol).ok_or_else(|| {
				EncodeError::msg(format_args!(
					"Enum {} has no symbol {symbol}",
					enum_type.name
				))
			})
		}
		other => other
			.as_i64()
			.and_then(|v| i32::try_from(v).ok())
			.ok_or_else(|| EncodeError::new("enum fields expect a symbol or integer value")),
	}
}

fn encode_extensions(
	out: &mut Vec<u8>,
	extensions: &[Message],
	registry: &Registry,
) -> Result<(), EncodeError> {
	if extensions.is_empty() {
		return Ok(());
	}
	vlc::write_u64(out, extensions.len() as u64);
	for extension in extensions {
		let encoded = encode_message(extension, registry)?;
		out.extend_from_slice(&encoded);
	}
	Ok(())
}

pub(crate) fn decode_group_fields(
	key: GroupKey,
	payload: &[u8],
	offset: usize,
	registry: &Registry,
) -> Result<(Fields, usize), DecodeError> {
	let mut fields = Fields::new();
	let mut cursor = offset;
	for field in registry.effective_fields(key) {
		let (value, next) = decode_type(&field.type_ref, payload, cursor, field.optional, registry)?;
		cursor = next;
		if let Some(value) = value {
			fields.insert(field.name.clone(), value);
		}
	}
	Ok((fields, cursor))
}

fn decode_type(
	type_ref: &TypeRef,
	payload: &[u8],
	offset: usize,
	optional: bool,
	registry: &Registry,
) -> Result<(Option<Value>, usize), DecodeError> {
	match type_ref {
		TypeRef::Primitive(kind) => decode_primitive(*kind, payload, offset),
		TypeRef::Binary(binary) => decode_binary(binary, payload, offset, optional),
		TypeRef::Enum(enum_type) => {
			let (value, next) = vlc::read_i64(payload, offset)?;
			Ok(match value {
				None => (None, next),
				Some(value) => {
					let value = i32::try_from(value).ok().and_then(|v| enum_type.symbol_of(v));
					let symbol = value.ok_or_else(|| {
						DecodeError::msg(format_args!(
							"Enum {} has no symbol for the decoded value",
							enum_type.name
						))
					})?;
					(Some(Value::Enum(symbol.to_owned())), next)
				}
			})
		}
		TypeRef::Sequence(element) => {
			let (count, mut cursor) = vlc::read_u64(payload, offset)?;
			let Some(count) = count else {
				return Ok((None, cursor));
			};
			// Every element costs at least one byte, which bounds
			// allocations on malformed counts.
			if count > (payload.len() - cursor) as u64 {
				return Err(DecodeError::new("Truncated sequence"));
			}
			let mut items = Vec::with_capacity(count as usize);
			for _ in 0..count {
				let (item, next) = decode_type(element, payload, cursor, false, registry)?;
				let item = item.ok_or_else(|| DecodeError::new("NULL element in sequence"))?;
				items.push(item);
				cursor = next;
			}
			Ok((Some(Value::Sequence(items)), cursor))
		}
		TypeRef::StaticGroup(key) => {
			let mut cursor = offset;
			if optional {
				let marker = *payload
					.get(cursor)
					.ok_or_else(|| DecodeError::new("Missing static group presence byte"))?;
				cursor += 1;
				match marker {
					ABSENT => return Ok((None, cursor)),
					PRESENT => {}
					_ => return Err(DecodeError::new("Invalid presence byte for static group")),
				}
			}
			let (fields, cursor) = decode_group_fields(*key, payload, cursor, registry)?;
			Ok((Some(Value::Group(StaticGroupValue { fields })), cursor))
		}
		TypeRef::DynamicGroup(_) | TypeRef::Object => {
			let (message, next) = decode_dynamic_group(payload, offset, registry, optional)?;
			Ok((message.map(|m| Value::Message(Box::new(m))), next))
		}
	}
}

fn decode_primitive(
	kind: PrimitiveKind,
	payload: &[u8],
	offset: usize,
) -> Result<(Option<Value>, usize), DecodeError> {
	Ok(match kind {
		PrimitiveKind::Bool => {
			let (value, next) = vlc::read_u64(payload, offset)?;
			(value.map(|v| Value::Bool(v != 0)), next)
		}
		PrimitiveKind::Decimal => {
			let (exponent, cursor) = vlc::read_i64(payload, offset)?;
			match exponent {
				None => (None, cursor),
				Some(exponent) => {
					let (mantissa, next) = vlc::read_i64(payload, cursor)?;
					let mantissa =
						mantissa.ok_or_else(|| DecodeError::new("Decimal mantissa cannot be NULL"))?;
					let exponent = i32::try_from(exponent)
						.map_err(|_| DecodeError::new("Decimal exponent out of range"))?;
					(Some(Value::Decimal(DecimalValue { exponent, mantissa })), next)
				}
			}
		}
		PrimitiveKind::F64 => {
			let (bits, next) = vlc::read_u64(payload, offset)?;
			(bits.map(|bits| Value::F64(f64::from_bits(bits))), next)
		}
		_ if kind.is_signed() => {
			let (value, next) = vlc::read_i64(payload, offset)?;
			(value.map(Value::I64), next)
		}
		_ => {
			let (value, next) = vlc::read_u64(payload, offset)?;
			(value.map(Value::U64), next)
		}
	})
}

fn decode_binary(
	binary: &BinaryType,
	payload: &[u8],
	offset: usize,
	optional: bool,
) -> Result<(Option<Value>, usize), DecodeError> {
	if binary.kind == BinaryKind::Fixed {
		let mut cursor = offset;
		if optional {
			let presence = *payload
				.get(cursor)
				.ok_or_else(|| DecodeError::new("Missing presence byte for nullable fixed field"))?;
			cursor += 1;
			match presence {
				ABSENT => return Ok((None, cursor)),
				PRESENT => {}
				other => {
					return Err(DecodeError::msg(format_args!(
						"Invalid presence byte for nullable fixed field: {other:#x}"
					)));
				}
			}
		}
		let size = binary.size.unwrap_or(0) as usize;
		let end = cursor
			.checked_add(size)
			.filter(|&end| end <= payload.len())
			.ok_or_else(|| DecodeError::new("Truncated fixed binary field"))?;
		return Ok((Some(Value::Binary(payload[cursor..end].to_vec())), end));
	}
	let (length, cursor) = vlc::read_u64(payload, offset)?;
	let Some(length) = length else {
		return Ok((None, cursor));
	};
	let end = usize::try_from(length)
		.ok()
		.and_then(|length| cursor.checked_add(length))
		.filter(|&end| end <= payload.len())
		.ok_or_else(|| DecodeError::new("Truncated binary/string field"))?;
	let data = &payload[cursor..end];
	let value = match binary.kind {
		BinaryKind::String => Value::String(
			std::str::from_utf8(data)
				.map_err(|_| DecodeError::new("Invalid UTF-8 in string field"))?
				.to_owned(),
		),
		_ => Value::Binary(data.to_vec()),
	};
	Ok((Some(value), end))
}

fn decode_dynamic_group(
	payload: &[u8],
	offset: usize,
	registry: &Registry,
	optional: bool,
) -> Result<(Option<Message>, usize), DecodeError> {
	if optional && payload.get(offset) == Some(&vlc::NULL_BYTE) {
		return Ok((None, offset + 1));
	}
	let (frame, end) = decode_frame(payload, offset, Some(registry), true)?;
	let key = frame
		.group
		.expect("strict frame decoding always binds a group");
	let message = decode_message_payload(key, &frame.payload, registry)?;
	Ok((Some(message), end))
}

fn decode_extensions(
	payload: &[u8],
	offset: usize,
	registry: &Registry,
) -> Result<Vec<Message>, DecodeError> {
	let (count, mut cursor) = vlc::read_u64(payload, offset)?;
	let count = count.ok_or_else(|| DecodeError::new("Extension count cannot be NULL"))?;
	if count > (payload.len() - cursor) as u64 {
		return Err(DecodeError::new("Truncated extension list"));
	}
	let mut extensions = Vec::with_capacity(count as usize);
	for _ in 0..count {
		let (message, next) = decode_dynamic_group(payload, cursor, registry, false)?;
		extensions.push(message.expect("non-optional dynamic group decode always yields a message"));
		cursor = next;
	}
	Ok(extensions)
}
