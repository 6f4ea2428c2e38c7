//! Native Binary: fixed-width little-endian layout with a data area
//!
//! Every message starts with `u32 size; u64 type_id; u32 ext_offset`
//! (`size` counts the bytes following the size word). Fields occupy fixed
//! widths in effective order; variable-sized payloads live in a data area
//! after the field area and are addressed by u32 offsets *relative to the
//! field slot that points at them*. Optional fields carry a one-byte
//! presence flag and keep their zero-filled slot when absent.
//!
//! ```
//! use blink_codec::{native, Message, QName, Registry};
//!
//! let registry = Registry::from_schema_text(
//! 	"
//! 	namespace Demo
//! 	Hello/1 -> string Greeting
//! 	",
//! )
//! .unwrap();
//!
//! let message = Message::new(QName::parse("Demo:Hello", None)).with("Greeting", "Hello World");
//! let encoded = native::encode_native(&message, &registry).unwrap();
//!
//! // 4-byte size word, then the 31-byte body.
//! assert_eq!(encoded.len(), 35);
//! assert_eq!(&encoded[..4], &31u32.to_le_bytes());
//!
//! let (decoded, next) = native::decode_native(&encoded, &registry, 0).unwrap();
//! assert_eq!(decoded, message);
//! assert_eq!(next, encoded.len());
//! ```

use crate::{
	error::{DecodeError, EncodeError},
	registry::Registry,
	schema::{BinaryKind, BinaryType, EnumType, GroupKey, PrimitiveKind, TypeRef},
	value::{DecimalValue, Fields, Message, StaticGroupValue, Value},
};

/// Bytes of the type id and extension offset words, which precede the
/// field area inside the sized body
const HEADER_FIXED: usize = 12;

/// Accumulates the data area of one message (or of one nested sequence)
/// while tracking the base offset it will land at, so that field-relative
/// offsets can be computed at the instant a payload is appended.
struct DataBuilder {
	buffer: Vec<u8>,
	base: usize,
}

impl DataBuilder {
	fn new(base: usize) -> Self {
		Self {
			buffer: Vec::new(),
			base,
		}
	}

	/// Append `data` and return its offset relative to the field at
	/// `field_position`
	fn append(&mut self, data: &[u8], field_position: usize) -> u32 {
		let offset = self.base + self.buffer.len() - field_position;
		self.buffer.extend_from_slice(data);
		offset as u32
	}
}

/// Encode a message to Native Binary
pub fn encode_native(message: &Message, registry: &Registry) -> Result<Vec<u8>, EncodeError> {
	let (key, group) = registry
		.group_by_name(&message.type_name)
		.map_err(EncodeError::display)?;
	let Some(type_id) = group.type_id else {
		return Err(EncodeError::msg(format_args!(
			"Group {} is missing a type id",
			group.name
		)));
	};

	let mut fixed_size = HEADER_FIXED;
	for field in registry.effective_fields(key) {
		if field.optional {
			fixed_size += 1;
		}
		fixed_size += fixed_width(&field.type_ref, registry);
	}

	let mut data = DataBuilder::new(fixed_size);
	let mut field_area = Vec::with_capacity(fixed_size - HEADER_FIXED);
	encode_group_fields(&mut field_area, HEADER_FIXED, key, &message.fields, &mut data, registry)?;

	let mut ext_offset = 0u32;
	if !message.extensions.is_empty() {
		// The extension offset is relative to its own storage location,
		// which sits 8 bytes into the body.
		ext_offset = (data.base + data.buffer.len() - 8) as u32;
		let block = encode_extensions(&message.extensions, registry)?;
		data.buffer.extend_from_slice(&block);
	}

	let mut out = Vec::with_capacity(4 + fixed_size + data.buffer.len());
	let body_len = 8 + 4 + field_area.len() + data.buffer.len();
	out.extend_from_slice(&(body_len as u32).to_le_bytes());
	out.extend_from_slice(&type_id.to_le_bytes());
	out.extend_from_slice(&ext_offset.to_le_bytes());
	out.extend_from_slice(&field_area);
	out.extend_from_slice(&data.buffer);
	Ok(out)
}

/// Decode a Native Binary message from `buf` starting at `offset`
///
/// Returns the message plus the offset one past it.
pub fn decode_native(
	buf: &[u8],
	registry: &Registry,
	offset: usize,
) -> Result<(Message, usize), DecodeError> {
	let size = read_u32(buf, offset)? as usize;
	let body = offset + 4;
	if size < HEADER_FIXED {
		return Err(DecodeError::msg(format_args!(
			"Invalid message size {size} (minimum {HEADER_FIXED})"
		)));
	}
	let end = body
		.checked_add(size)
		.filter(|&end| end <= buf.len())
		.ok_or_else(|| DecodeError::new("Truncated message: size exceeds buffer"))?;

	let type_id = read_u64(buf, body)?;
	let ext_offset_pos = body + 8;
	let ext_offset = read_u32(buf, ext_offset_pos)? as usize;

	let (key, group) = registry.group_by_id(type_id).map_err(DecodeError::display)?;
	let (fields, _) = decode_group_fields(key, buf, body + HEADER_FIXED, end, registry)?;

	let mut message = Message::new(group.name.clone());
	message.fields = fields;
	if ext_offset > 0 {
		message.extensions = decode_extensions(buf, ext_offset_pos + ext_offset, end, registry)?;
	}
	Ok((message, end))
}

/// The fixed width a field of `type_ref` occupies in the field area,
/// excluding any presence byte
fn fixed_width(type_ref: &TypeRef, registry: &Registry) -> usize {
	match type_ref {
		TypeRef::Primitive(kind) => match kind {
			PrimitiveKind::Bool | PrimitiveKind::U8 | PrimitiveKind::I8 => 1,
			PrimitiveKind::U16 | PrimitiveKind::I16 => 2,
			PrimitiveKind::U32
			| PrimitiveKind::I32
			| PrimitiveKind::Date
			| PrimitiveKind::TimeOfDayMilli => 4,
			PrimitiveKind::U64
			| PrimitiveKind::I64
			| PrimitiveKind::F64
			| PrimitiveKind::MilliTime
			| PrimitiveKind::NanoTime
			| PrimitiveKind::TimeOfDayNano => 8,
			// i8 exponent + i64 mantissa
			PrimitiveKind::Decimal => 9,
		},
		TypeRef::Binary(binary) => match binary.kind {
			BinaryKind::Fixed => binary.size.unwrap_or(0) as usize,
			BinaryKind::String if is_inline_string(binary) => 1 + binary.size.unwrap_or(0) as usize,
			_ => 4,
		},
		TypeRef::Enum(_) => 4,
		TypeRef::Sequence(_) | TypeRef::DynamicGroup(_) | TypeRef::Object => 4,
		TypeRef::StaticGroup(key) => {
			let mut total = 0;
			for field in registry.effective_fields(*key) {
				if field.optional {
					total += 1;
				}
				total += fixed_width(&field.type_ref, registry);
			}
			total
		}
	}
}

/// `string(N)` with `1 <= N <= 255` stores inline as `u8 size ++ N bytes`
fn is_inline_string(binary: &BinaryType) -> bool {
	binary.kind == BinaryKind::String && matches!(binary.size, Some(size) if (1..=255).contains(&size))
}

fn encode_group_fields(
	out: &mut Vec<u8>,
	area_start: usize,
	key: GroupKey,
	fields: &Fields,
	data: &mut DataBuilder,
	registry: &Registry,
) -> Result<(), EncodeError> {
	for field in registry.effective_fields(key) {
		let value = fields.get(&field.name);
		if value.is_none() && !field.optional {
			return Err(EncodeError::msg(format_args!(
				"Missing required field {}",
				field.name
			)));
		}
		let field_position = area_start + out.len();
		encode_field(out, &field.type_ref, value, field.optional, field_position, data, registry)?;
	}
	Ok(())
}

fn encode_field(
	out: &mut Vec<u8>,
	type_ref: &TypeRef,
	value: Option<&Value>,
	optional: bool,
	field_position: usize,
	data: &mut DataBuilder,
	registry: &Registry,
) -> Result<(), EncodeError> {
	if optional {
		match value {
			None => {
				// The slot is reserved even when the field is null.
				out.push(0x00);
				out.resize(out.len() + fixed_width(type_ref, registry), 0x00);
			}
			Some(value) => {
				out.push(0x01);
				encode_value(out, type_ref, value, field_position + 1, data, registry)?;
			}
		}
		Ok(())
	} else {
		let value = value.expect("required fields are checked before encoding");
		encode_value(out, type_ref, value, field_position, data, registry)
	}
}

fn encode_value(
	out: &mut Vec<u8>,
	type_ref: &TypeRef,
	value: &Value,
	field_position: usize,
	data: &mut DataBuilder,
	registry: &Registry,
) -> Result<(), EncodeError> {
	match type_ref {
		TypeRef::Primitive(kind) => encode_primitive(out, *kind, value),
		TypeRef::Binary(binary) => encode_binary(out, binary, value, field_position, data),
		TypeRef::Enum(enum_type) => {
			let number = crate::compact::enum_symbol_value(enum_type, value)?;
			out.extend_from_slice(&number.to_le_bytes());
			Ok(())
		}
		TypeRef::Sequence(element) => {
			let items = value
				.as_sequence()
				.ok_or_else(|| EncodeError::new("Sequence fields expect a sequence value"))?;
			let elem_width = fixed_width(element, registry);
			let mut seq = Vec::with_capacity(4 + items.len() * elem_width);
			seq.extend_from_slice(&(items.len() as u32).to_le_bytes());
			// Elements store at fixed width; their variable payloads go in
			// a nested data area based just past the element block.
			let mut nested = DataBuilder::new(4 + items.len() * elem_width);
			for (index, item) in items.iter().enumerate() {
				let item_position = 4 + index * elem_width;
				encode_value(&mut seq, element, item, item_position, &mut nested, registry)?;
			}
			seq.extend_from_slice(&nested.buffer);
			let offset = data.append(&seq, field_position);
			out.extend_from_slice(&offset.to_le_bytes());
			Ok(())
		}
		TypeRef::StaticGroup(key) => {
			let group_value = value
				.as_group()
				.ok_or_else(|| EncodeError::new("Static group fields expect a group value"))?;
			encode_group_fields(out, field_position - out.len(), *key, &group_value.fields, data, registry)
		}
		TypeRef::DynamicGroup(_) | TypeRef::Object => {
			let message = value.as_message().ok_or_else(|| {
				EncodeError::new("Dynamic group and object fields expect a message value")
			})?;
			let encoded = encode_native(message, registry)?;
			let offset = data.append(&encoded, field_position);
			out.extend_from_slice(&offset.to_le_bytes());
			Ok(())
		}
	}
}

fn encode_primitive(out: &mut Vec<u8>, kind: PrimitiveKind, value: &Value) -> Result<(), EncodeError> {
	fn int<T>(value: &Value, kind: PrimitiveKind) -> Result<T, EncodeError>
	where
		T: TryFrom<i64> + TryFrom<u64>,
	{
		let converted = match *value {
			Value::I64(v) => T::try_from(v).ok(),
			Value::U64(v) => T::try_from(v).ok(),
			_ => None,
		};
		converted.ok_or_else(|| {
			EncodeError::msg(format_args!(
				"Value out of range for {} field",
				kind.keyword()
			))
		})
	}

	match kind {
		PrimitiveKind::Bool => {
			let value = value
				.as_bool()
				.ok_or_else(|| EncodeError::new("bool fields expect a boolean value"))?;
			out.push(value as u8);
		}
		PrimitiveKind::Decimal => {
			let DecimalValue { exponent, mantissa } = value
				.as_decimal()
				.ok_or_else(|| EncodeError::new("decimal fields expect a decimal value"))?;
			let exponent = i8::try_from(exponent)
				.map_err(|_| EncodeError::new("Decimal exponent out of range for native layout"))?;
			out.extend_from_slice(&exponent.to_le_bytes());
			out.extend_from_slice(&mantissa.to_le_bytes());
		}
		PrimitiveKind::F64 => {
			let value = value
				.as_f64()
				.ok_or_else(|| EncodeError::new("f64 fields expect a float value"))?;
			out.extend_from_slice(&value.to_le_bytes());
		}
		PrimitiveKind::U8 => out.push(int::<u8>(value, kind)?),
		PrimitiveKind::I8 => out.extend_from_slice(&int::<i8>(value, kind)?.to_le_bytes()),
		PrimitiveKind::U16 => out.extend_from_slice(&int::<u16>(value, kind)?.to_le_bytes()),
		PrimitiveKind::I16 => out.extend_from_slice(&int::<i16>(value, kind)?.to_le_bytes()),
		PrimitiveKind::U32 | PrimitiveKind::TimeOfDayMilli => {
			out.extend_from_slice(&int::<u32>(value, kind)?.to_le_bytes())
		}
		PrimitiveKind::I32 | PrimitiveKind::Date => {
			out.extend_from_slice(&int::<i32>(value, kind)?.to_le_bytes())
		}
		PrimitiveKind::U64 | PrimitiveKind::TimeOfDayNano => {
			out.extend_from_slice(&int::<u64>(value, kind)?.to_le_bytes())
		}
		PrimitiveKind::I64 | PrimitiveKind::MilliTime | PrimitiveKind::NanoTime => {
			out.extend_from_slice(&int::<i64>(value, kind)?.to_le_bytes())
		}
	}
	Ok(())
}

fn encode_binary(
	out: &mut Vec<u8>,
	binary: &BinaryType,
	value: &Value,
	field_position: usize,
	data: &mut DataBuilder,
) -> Result<(), EncodeError> {
	let bytes: &[u8] = match binary.kind {
		BinaryKind::String => value
			.as_str()
			.ok_or_else(|| EncodeError::new("string fields expect a string value"))?
			.as_bytes(),
		_ => value
			.as_bytes()
			.ok_or_else(|| EncodeError::new("binary fields expect a bytes value"))?,
	};
	if binary.kind == BinaryKind::Fixed {
		let size = binary.size.unwrap_or(0) as usize;
		if bytes.len() != size {
			return Err(EncodeError::msg(format_args!(
				"Fixed field requires exactly {size} bytes, got {}",
				bytes.len()
			)));
		}
		out.extend_from_slice(bytes);
		return Ok(());
	}
	if is_inline_string(binary) {
		let capacity = binary.size.unwrap_or(0) as usize;
		if bytes.len() > capacity {
			return Err(EncodeError::msg(format_args!(
				"String exceeds max size {capacity}"
			)));
		}
		out.push(bytes.len() as u8);
		out.extend_from_slice(bytes);
		out.resize(out.len() + capacity - bytes.len(), 0x00);
		return Ok(());
	}
	let mut payload = Vec::with_capacity(4 + bytes.len());
	payload.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
	payload.extend_from_slice(bytes);
	let offset = data.append(&payload, field_position);
	out.extend_from_slice(&offset.to_le_bytes());
	Ok(())
}

fn encode_extensions(extensions: &[Message], registry: &Registry) -> Result<Vec<u8>, EncodeError> {
	let mut block = Vec::new();
	block.extend_from_slice(&(extensions.len() as u32).to_le_bytes());
	// Offsets first, then the nested messages they point at.
	let mut nested = DataBuilder::new(4 + extensions.len() * 4);
	for (index, extension) in extensions.iter().enumerate() {
		let slot_position = 4 + index * 4;
		let encoded = encode_native(extension, registry)?;
		let offset = nested.append(&encoded, slot_position);
		block.extend_from_slice(&offset.to_le_bytes());
	}
	block.extend_from_slice(&nested.buffer);
	Ok(block)
}

fn decode_group_fields(
	key: GroupKey,
	buf: &[u8],
	offset: usize,
	end: usize,
	registry: &Registry,
) -> Result<(Fields, usize), DecodeError> {
	let mut fields = Fields::new();
	let mut cursor = offset;
	for field in registry.effective_fields(key) {
		let (value, next) = decode_field(&field.type_ref, buf, cursor, end, field.optional, registry)?;
		cursor = next;
		if let Some(value) = value {
			fields.insert(field.name.clone(), value);
		}
	}
	Ok((fields, cursor))
}

fn decode_field(
	type_ref: &TypeRef,
	buf: &[u8],
	offset: usize,
	end: usize,
	optional: bool,
	registry: &Registry,
) -> Result<(Option<Value>, usize), DecodeError> {
	let mut cursor = offset;
	if optional {
		if cursor >= end {
			return Err(DecodeError::new("Truncated optional field"));
		}
		let presence = buf[cursor];
		cursor += 1;
		if presence == 0x00 {
			let width = fixed_width(type_ref, registry);
			let next = cursor + width;
			if next > end {
				return Err(DecodeError::new("Truncated optional field slot"));
			}
			return Ok((None, next));
		}
		// Any non-zero presence byte reads as present.
	}
	let (value, next) = decode_value(type_ref, buf, cursor, end, registry)?;
	Ok((Some(value), next))
}

fn decode_value(
	type_ref: &TypeRef,
	buf: &[u8],
	offset: usize,
	end: usize,
	registry: &Registry,
) -> Result<(Value, usize), DecodeError> {
	match type_ref {
		TypeRef::Primitive(kind) => decode_primitive(*kind, buf, offset),
		TypeRef::Binary(binary) => decode_binary(binary, buf, offset, end),
		TypeRef::Enum(enum_type) => {
			let value = read_i32(buf, offset)?;
			let symbol = enum_type.symbol_of(value).ok_or_else(|| {
				DecodeError::msg(format_args!(
					"Enum {} has no symbol for value {value}",
					enum_type.name
				))
			})?;
			Ok((Value::Enum(symbol.to_owned()), offset + 4))
		}
		TypeRef::Sequence(element) => {
			let rel = read_u32(buf, offset)? as usize;
			let location = offset
				.checked_add(rel)
				.filter(|&loc| loc < end)
				.ok_or_else(|| DecodeError::new("Sequence offset out of range"))?;
			let count = read_u32(buf, location)? as usize;
			let elem_width = fixed_width(element, registry);
			let in_bounds = count
				.checked_mul(elem_width)
				.and_then(|len| location.checked_add(4)?.checked_add(len))
				.is_some_and(|elements_end| elements_end <= buf.len());
			if !in_bounds {
				return Err(DecodeError::new("Truncated sequence"));
			}
			let mut items = Vec::with_capacity(count);
			let mut cursor = location + 4;
			for _ in 0..count {
				let (item, next) = decode_value(element, buf, cursor, end, registry)?;
				items.push(item);
				cursor = next;
			}
			Ok((Value::Sequence(items), offset + 4))
		}
		TypeRef::StaticGroup(key) => {
			let (fields, next) = decode_group_fields(*key, buf, offset, end, registry)?;
			Ok((Value::Group(StaticGroupValue { fields }), next))
		}
		TypeRef::DynamicGroup(_) | TypeRef::Object => {
			let rel = read_u32(buf, offset)? as usize;
			let location = offset
				.checked_add(rel)
				.filter(|&loc| loc < end)
				.ok_or_else(|| DecodeError::new("Dynamic group offset out of range"))?;
			let (message, _) = decode_native(buf, registry, location)?;
			Ok((Value::Message(Box::new(message)), offset + 4))
		}
	}
}

fn decode_primitive(
	kind: PrimitiveKind,
	buf: &[u8],
	offset: usize,
) -> Result<(Value, usize), DecodeError> {
	Ok(match kind {
		PrimitiveKind::Bool => (Value::Bool(read_at(buf, offset, 1)?[0] != 0), offset + 1),
		PrimitiveKind::Decimal => {
			let bytes = read_at(buf, offset, 9)?;
			let exponent = bytes[0] as i8;
			let mantissa = i64::from_le_bytes(bytes[1..9].try_into().unwrap());
			(
				Value::Decimal(DecimalValue {
					exponent: i32::from(exponent),
					mantissa,
				}),
				offset + 9,
			)
		}
		PrimitiveKind::F64 => {
			let bytes = read_at(buf, offset, 8)?;
			(Value::F64(f64::from_le_bytes(bytes.try_into().unwrap())), offset + 8)
		}
		PrimitiveKind::U8 => (Value::U64(u64::from(read_at(buf, offset, 1)?[0])), offset + 1),
		PrimitiveKind::I8 => (Value::I64(i64::from(read_at(buf, offset, 1)?[0] as i8)), offset + 1),
		PrimitiveKind::U16 => {
			let bytes = read_at(buf, offset, 2)?;
			(
				Value::U64(u64::from(u16::from_le_bytes(bytes.try_into().unwrap()))),
				offset + 2,
			)
		}
		PrimitiveKind::I16 => {
			let bytes = read_at(buf, offset, 2)?;
			(
				Value::I64(i64::from(i16::from_le_bytes(bytes.try_into().unwrap()))),
				offset + 2,
			)
		}
		PrimitiveKind::U32 | PrimitiveKind::TimeOfDayMilli => {
			(Value::U64(u64::from(read_u32(buf, offset)?)), offset + 4)
		}
		PrimitiveKind::I32 | PrimitiveKind::Date => {
			(Value::I64(i64::from(read_i32(buf, offset)?)), offset + 4)
		}
		PrimitiveKind::U64 | PrimitiveKind::TimeOfDayNano => {
			(Value::U64(read_u64(buf, offset)?), offset + 8)
		}
		PrimitiveKind::I64 | PrimitiveKind::MilliTime | PrimitiveKind::NanoTime => {
			let bytes = read_at(buf, offset, 8)?;
			(Value::I64(i64::from_le_bytes(bytes.try_into().unwrap())), offset + 8)
		}
	})
}

fn decode_binary(
	binary: &BinaryType,
	buf: &[u8],
	offset: usize,
	end: usize,
) -> Result<(Value, usize), DecodeError> {
	if binary.kind == BinaryKind::Fixed {
		let size = binary.size.unwrap_or(0) as usize;
		let bytes = read_at(buf, offset, size)?;
		return Ok((Value::Binary(bytes.to_vec()), offset + size));
	}
	if is_inline_string(binary) {
		let capacity = binary.size.unwrap_or(0) as usize;
		let slot = read_at(buf, offset, 1 + capacity)?;
		let actual = slot[0] as usize;
		if actual > capacity {
			return Err(DecodeError::new("Inline string size exceeds its capacity"));
		}
		let text = std::str::from_utf8(&slot[1..1 + actual])
			.map_err(|_| DecodeError::new("Invalid UTF-8 in string field"))?;
		return Ok((Value::String(text.to_owned()), offset + 1 + capacity));
	}
	let rel = read_u32(buf, offset)? as usize;
	let location = offset
		.checked_add(rel)
		.filter(|&loc| loc < end)
		.ok_or_else(|| DecodeError::new("Invalid offset for binary data"))?;
	let length = read_u32(buf, location)? as usize;
	let bytes = read_at(buf, location + 4, length)?;
	let value = match binary.kind {
		BinaryKind::String => Value::String(
			std::str::from_utf8(bytes)
				.map_err(|_| DecodeError::new("Invalid UTF-8 in string field"))?
				.to_owned(),
		),
		_ => Value::Binary(bytes.to_vec()),
	};
	Ok((value, offset + 4))
}

fn decode_extensions(
	buf: &[u8],
	offset: usize,
	end: usize,
	registry: &Registry,
) -> Result<Vec<Message>, DecodeError> {
	if offset + 4 > end {
		return Ok(Vec::new());
	}
	let count = read_u32(buf, offset)? as usize;
	let in_bounds = count
		.checked_mul(4)
		.and_then(|len| offset.checked_add(4)?.checked_add(len))
		.is_some_and(|slots_end| slots_end <= end);
	if !in_bounds {
		return Err(DecodeError::new("Truncated extension block"));
	}
	let mut extensions = Vec::with_capacity(count);
	let mut cursor = offset + 4;
	for _ in 0..count {
		let rel = read_u32(buf, cursor)? as usize;
		let location = cursor
			.checked_add(rel)
			.filter(|&loc| loc < end)
			.ok_or_else(|| DecodeError::new("Extension offset out of range"))?;
		let (message, _) = decode_native(buf, registry, location)?;
		extensions.push(message);
		cursor += 4;
	}
	Ok(extensions)
}

fn read_at(buf: &[u8], offset: usize, len: usize) -> Result<&[u8], DecodeError> {
	offset
		.checked_add(len)
		.filter(|&end| end <= buf.len())
		.map(|end| &buf[offset..end])
		.ok_or_else(|| DecodeError::new("Truncated Native Binary message"))
}

fn read_u32(buf: &[u8], offset: usize) -> Result<u32, DecodeError> {
	Ok(u32::from_le_bytes(read_at(buf, offset, 4)?.try_into().unwrap()))
}

fn read_i32(buf: &[u8], offset: usize) -> Result<i32, DecodeError> {
	Ok(i32::from_le_bytes(read_at(buf, offset, 4)?.try_into().unwrap()))
}

fn read_u64(buf: &[u8], offset: usize) -> Result<u64, DecodeError> {
	Ok(u64::from_le_bytes(read_at(buf, offset, 8)?.try_into().unwrap()))
}
