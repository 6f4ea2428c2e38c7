//! JSON mapping: `$type`-discriminated objects
//!
//! A message maps to `{ "$type": "ns:Name", field: value, …,
//! "$extension": [message, …] }` and a stream to a JSON array of such
//! objects. Integers (and decimal mantissas) whose magnitude reaches 10^15
//! switch from JSON numbers to decimal strings to stay lossless through
//! IEEE-754 consumers; floats use the tokens `"NaN"`, `"Inf"` and
//! `"-Inf"`; time and date primitives carry their integer unit inside a
//! string; binary payloads render as UTF-8 text when valid and as a list
//! of hex pairs otherwise.
//!
//! ```
//! use blink_codec::{json, DecimalValue, Message, QName, Registry};
//!
//! let registry = Registry::from_schema_text(
//! 	"
//! 	namespace Demo
//! 	Event/2 -> decimal Price, millitime Timestamp
//! 	",
//! )
//! .unwrap();
//!
//! let message = Message::new(QName::parse("Demo:Event", None))
//! 	.with("Price", DecimalValue::new(-2, 10000))
//! 	.with("Timestamp", 0i64);
//!
//! let encoded = json::encode_json(&message, &registry).unwrap();
//! let parsed: serde_json::Value = serde_json::from_str(&encoded).unwrap();
//! assert_eq!(parsed["$type"], "Demo:Event");
//! // A small mantissa rides as a JSON number, times as integer strings.
//! assert_eq!(parsed["Price"], 100.0);
//! assert_eq!(parsed["Timestamp"], "0");
//! ```

use crate::{
	error::{DecodeError, EncodeError},
	registry::Registry,
	schema::{BinaryKind, BinaryType, GroupKey, PrimitiveKind, QName, TypeRef},
	value::{DecimalValue, Fields, Message, StaticGroupValue, Value},
};

/// Magnitude at which integers stop being JSON numbers
const NUMERIC_THRESHOLD: u64 = 1_000_000_000_000_000;

const TYPE_KEY: &str = "$type";
const EXTENSION_KEY: &str = "$extension";

/// Encode a message as a pretty-printed JSON object
pub fn encode_json(message: &Message, registry: &Registry) -> Result<String, EncodeError> {
	let value = format_message(message, registry)?;
	serde_json::to_string_pretty(&value).map_err(EncodeError::display)
}

/// Encode messages as a JSON array
pub fn encode_json_stream(messages: &[Message], registry: &Registry) -> Result<String, EncodeError> {
	let values: Vec<serde_json::Value> = messages
		.iter()
		.map(|message| format_message(message, registry))
		.collect::<Result<_, _>>()?;
	serde_json::to_string_pretty(&values).map_err(EncodeError::display)
}

/// Decode a message from a JSON object
pub fn decode_json(text: &str, registry: &Registry) -> Result<Message, DecodeError> {
	let value: serde_json::Value = serde_json::from_str(text).map_err(DecodeError::display)?;
	parse_message(&value, registry, None)
}

/// Decode a stream of messages from a JSON array
pub fn decode_json_stream(text: &str, registry: &Registry) -> Result<Vec<Message>, DecodeError> {
	let value: serde_json::Value = serde_json::from_str(text).map_err(DecodeError::display)?;
	let serde_json::Value::Array(items) = value else {
		return Err(DecodeError::new("JSON stream must be an array"));
	};
	items
		.iter()
		.map(|item| parse_message(item, registry, None))
		.collect()
}

fn format_message(message: &Message, registry: &Registry) -> Result<serde_json::Value, EncodeError> {
	let (key, group) = registry
		.group_by_name(&message.type_name)
		.map_err(EncodeError::display)?;
	let mut object = serde_json::Map::new();
	object.insert(
		TYPE_KEY.to_owned(),
		serde_json::Value::String(group.name.qualified().to_owned()),
	);
	for field in registry.effective_fields(key) {
		let Some(value) = message.fields.get(&field.name) else {
			continue;
		};
		object.insert(field.name.clone(), format_value(value, &field.type_ref, registry)?);
	}
	if !message.extensions.is_empty() {
		let extensions: Vec<serde_json::Value> = message
			.extensions
			.iter()
			.map(|extension| format_message(extension, registry))
			.collect::<Result<_, _>>()?;
		object.insert(EXTENSION_KEY.to_owned(), serde_json::Value::Array(extensions));
	}
	Ok(serde_json::Value::Object(object))
}

fn format_value(
	value: &Value,
	type_ref: &TypeRef,
	registry: &Registry,
) -> Result<serde_json::Value, EncodeError> {
	match type_ref {
		TypeRef::Primitive(kind) => format_primitive(value, *kind),
		TypeRef::Binary(binary) => format_binary(value, binary),
		TypeRef::Enum(enum_type) => Ok(serde_json::Value::String(
			crate::tag::enum_symbol(enum_type, value)?.to_owned(),
		)),
		TypeRef::Sequence(element) => {
			let items = value
				.as_sequence()
				.ok_or_else(|| EncodeError::new("Sequence fields expect a sequence value"))?;
			let values: Vec<serde_json::Value> = items
				.iter()
				.map(|item| format_value(item, element, registry))
				.collect::<Result<_, _>>()?;
			Ok(serde_json::Value::Array(values))
		}
		TypeRef::StaticGroup(key) => {
			let group_value = value
				.as_group()
				.ok_or_else(|| EncodeError::new("Static group fields expect a group value"))?;
			let mut object = serde_json::Map::new();
			for field in registry.effective_fields(*key) {
				let Some(value) = group_value.fields.get(&field.name) else {
					continue;
				};
				object.insert(field.name.clone(), format_value(value, &field.type_ref, registry)?);
			}
			Ok(serde_json::Value::Object(object))
		}
		TypeRef::DynamicGroup(_) | TypeRef::Object => {
			let message = value.as_message().ok_or_else(|| {
				EncodeError::new("Dynamic group and object fields expect a message value")
			})?;
			format_message(message, registry)
		}
	}
}

fn format_primitive(value: &Value, kind: PrimitiveKind) -> Result<serde_json::Value, EncodeError> {
	Ok(match kind {
		PrimitiveKind::Bool => serde_json::Value::Bool(
			value
				.as_bool()
				.ok_or_else(|| EncodeError::new("bool fields expect a boolean value"))?,
		),
		PrimitiveKind::Decimal => {
			let decimal = value
				.as_decimal()
				.ok_or_else(|| EncodeError::new("decimal fields expect a decimal value"))?;
			format_decimal(decimal)
		}
		PrimitiveKind::F64 => {
			let value = value
				.as_f64()
				.ok_or_else(|| EncodeError::new("f64 fields expect a float value"))?;
			match serde_json::Number::from_f64(value) {
				Some(number) => serde_json::Value::Number(number),
				// NaN and infinities use quoted tokens.
				None => serde_json::Value::String(crate::tag::float_token(value)),
			}
		}
		PrimitiveKind::MilliTime
		| PrimitiveKind::NanoTime
		| PrimitiveKind::Date
		| PrimitiveKind::TimeOfDayMilli
		| PrimitiveKind::TimeOfDayNano => {
			// Time and date primitives stay integer-valued but ride in a
			// string.
			serde_json::Value::String(integer_text(value, kind)?)
		}
		_ if kind.is_signed() => {
			let value = value.as_i64().ok_or_else(|| {
				EncodeError::msg(format_args!("{} fields expect an integer value", kind.keyword()))
			})?;
			if value.unsigned_abs() < NUMERIC_THRESHOLD {
				serde_json::Value::Number(value.into())
			} else {
				serde_json::Value::String(value.to_string())
			}
		}
		_ => {
			let value = value.as_u64().ok_or_else(|| {
				EncodeError::msg(format_args!(
					"{} fields expect a non-negative integer value",
					kind.keyword()
				))
			})?;
			if value < NUMERIC_THRESHOLD {
				serde_json::Value::Number(value.into())
			} else {
				serde_json::Value::String(value.to_string())
			}
		}
	})
}

fn integer_text(value: &Value, kind: PrimitiveKind) -> Result<String, EncodeError> {
	if kind.is_signed() {
		value.as_i64().map(|v| v.to_string())
	} else {
		value.as_u64().map(|v| v.to_string())
	}
	.ok_or_else(|| EncodeError::msg(format_args!("{} fields expect an integer value", kind.keyword())))
}

fn format_decimal(decimal: DecimalValue) -> serde_json::Value {
	let DecimalValue { exponent, mantissa } = decimal;
	if mantissa.unsigned_abs() < NUMERIC_THRESHOLD {
		if exponent >= 0 {
			// A small mantissa with a modest positive exponent still fits
			// an exact i64; otherwise fall through to the string form.
			if let Some(scaled) = 10i64
				.checked_pow(exponent.unsigned_abs())
				.and_then(|factor| mantissa.checked_mul(factor))
			{
				return serde_json::Value::Number(scaled.into());
			}
		} else if let Some(number) =
			serde_json::Number::from_f64(mantissa as f64 * 10f64.powi(exponent))
		{
			return serde_json::Value::Number(number);
		}
	}
	serde_json::Value::String(format!("{mantissa}e{exponent}"))
}

fn format_binary(value: &Value, binary: &BinaryType) -> Result<serde_json::Value, EncodeError> {
	if binary.kind == BinaryKind::String {
		let text = value
			.as_str()
			.ok_or_else(|| EncodeError::new("string fields expect a string value"))?;
		return Ok(serde_json::Value::String(text.to_owned()));
	}
	let bytes = value
		.as_bytes()
		.ok_or_else(|| EncodeError::new("binary fields expect a bytes value"))?;
	Ok(match std::str::from_utf8(bytes) {
		Ok(text) => serde_json::Value::String(text.to_owned()),
		Err(_) => serde_json::Value::Array(
			bytes
				.iter()
				.map(|byte| serde_json::Value::String(format!("{byte:02x}")))
				.collect(),
		),
	})
}

fn parse_message(
	value: &serde_json::Value,
	registry: &Registry,
	default_namespace: Option<&str>,
) -> Result<Message, DecodeError> {
	let serde_json::Value::Object(object) = value else {
		return Err(DecodeError::new("JSON messages must be objects"));
	};
	let type_name = object
		.get(TYPE_KEY)
		.and_then(serde_json::Value::as_str)
		.ok_or_else(|| DecodeError::new("JSON message must include $type"))?;
	let qname = QName::parse(type_name, default_namespace);
	let (key, group) = registry.group_by_name(&qname).map_err(DecodeError::display)?;
	let group_namespace = group.name.namespace().map(str::to_owned);
	let mut message = Message::new(group.name.clone());
	message.fields = parse_group_fields(object, key, registry, group_namespace.as_deref())?;
	if let Some(extensions) = object.get(EXTENSION_KEY) {
		let serde_json::Value::Array(extensions) = extensions else {
			return Err(DecodeError::new("$extension must be an array"));
		};
		for extension in extensions {
			message
				.extensions
				.push(parse_message(extension, registry, group_namespace.as_deref())?);
		}
	}
	Ok(message)
}

fn parse_group_fields(
	object: &serde_json::Map<String, serde_json::Value>,
	key: GroupKey,
	registry: &Registry,
	default_namespace: Option<&str>,
) -> Result<Fields, DecodeError> {
	let mut fields = Fields::new();
	for field in registry.effective_fields(key) {
		let Some(raw) = object.get(&field.name) else {
			continue;
		};
		if raw.is_null() {
			continue;
		}
		let value = parse_value(raw, &field.type_ref, registry, default_namespace)?;
		fields.insert(field.name.clone(), value);
	}
	Ok(fields)
}

fn parse_value(
	raw: &serde_json::Value,
	type_ref: &TypeRef,
	registry: &Registry,
	default_namespace: Option<&str>,
) -> Result<Value, DecodeError> {
	match type_ref {
		TypeRef::Primitive(kind) => parse_primitive(raw, *kind),
		TypeRef::Binary(binary) => parse_binary(raw, binary),
		TypeRef::Enum(enum_type) => {
			let symbol = raw
				.as_str()
				.ok_or_else(|| DecodeError::new("enum fields expect a string value"))?;
			if enum_type.value_of(symbol).is_none() {
				return Err(DecodeError::msg(format_args!(
					"Enum {} has no symbol {symbol}",
					enum_type.name
				)));
			}
			Ok(Value::Enum(symbol.to_owned()))
		}
		TypeRef::Sequence(element) => {
			let serde_json::Value::Array(items) = raw else {
				return Err(DecodeError::new("Sequence fields expect an array value"));
			};
			let values: Vec<Value> = items
				.iter()
				.map(|item| parse_value(item, element, registry, default_namespace))
				.collect::<Result<_, _>>()?;
			Ok(Value::Sequence(values))
		}
		TypeRef::StaticGroup(key) => {
			let serde_json::Value::Object(object) = raw else {
				return Err(DecodeError::new("Static group fields expect an object value"));
			};
			let fields = parse_group_fields(object, *key, registry, default_namespace)?;
			Ok(Value::Group(StaticGroupValue { fields }))
		}
		TypeRef::DynamicGroup(_) | TypeRef::Object => Ok(Value::Message(Box::new(parse_message(
			raw,
			registry,
			default_namespace,
		)?))),
	}
}

fn parse_primitive(raw: &serde_json::Value, kind: PrimitiveKind) -> Result<Value, DecodeError> {
	match kind {
		PrimitiveKind::Bool => match raw {
			serde_json::Value::Bool(value) => Ok(Value::Bool(*value)),
			serde_json::Value::String(text) if text.eq_ignore_ascii_case("true") => {
				Ok(Value::Bool(true))
			}
			serde_json::Value::String(text) if text.eq_ignore_ascii_case("false") => {
				Ok(Value::Bool(false))
			}
			_ => Err(DecodeError::msg(format_args!("Invalid boolean value: {raw}"))),
		},
		PrimitiveKind::Decimal => parse_decimal(raw).map(Value::Decimal),
		PrimitiveKind::F64 => match raw {
			serde_json::Value::Number(number) => number
				.as_f64()
				.map(Value::F64)
				.ok_or_else(|| DecodeError::msg(format_args!("Invalid float value: {raw}"))),
			serde_json::Value::String(text) => crate::tag::parse_float(text).map(Value::F64),
			_ => Err(DecodeError::msg(format_args!("Invalid float value: {raw}"))),
		},
		_ if kind.is_signed() => parse_integer(raw).and_then(|value| {
			i64::try_from(value)
				.map(Value::I64)
				.map_err(|_| DecodeError::msg(format_args!("Integer out of range: {raw}")))
		}),
		_ => parse_integer(raw).and_then(|value| {
			u64::try_from(value)
				.map(Value::U64)
				.map_err(|_| DecodeError::msg(format_args!("Integer out of range: {raw}")))
		}),
	}
}

fn parse_integer(raw: &serde_json::Value) -> Result<i128, DecodeError> {
	match raw {
		serde_json::Value::Number(number) => {
			if let Some(value) = number.as_i64() {
				return Ok(i128::from(value));
			}
			if let Some(value) = number.as_u64() {
				return Ok(i128::from(value));
			}
			// Tolerate integral floats (e.g. `3.0`) the way a text round
			// trip produces them.
			match number.as_f64() {
				Some(value) if value.fract() == 0.0 => Ok(value as i128),
				_ => Err(DecodeError::msg(format_args!("Invalid integer value: {raw}"))),
			}
		}
		serde_json::Value::String(text) => text
			.parse()
			.map_err(|_| DecodeError::msg(format_args!("Invalid integer value: {text}"))),
		_ => Err(DecodeError::msg(format_args!("Invalid integer value: {raw}"))),
	}
}

fn parse_decimal(raw: &serde_json::Value) -> Result<DecimalValue, DecodeError> {
	match raw {
		serde_json::Value::Number(number) => decimal_from_number_text(&number.to_string()),
		serde_json::Value::String(text) => crate::tag::parse_decimal(text),
		serde_json::Value::Object(object) => {
			let exponent = object
				.get("exponent")
				.and_then(serde_json::Value::as_i64)
				.and_then(|v| i32::try_from(v).ok());
			let mantissa = object.get("mantissa").and_then(serde_json::Value::as_i64);
			match (exponent, mantissa) {
				(Some(exponent), Some(mantissa)) => Ok(DecimalValue { exponent, mantissa }),
				_ => Err(DecodeError::msg(format_args!("Invalid decimal value: {raw}"))),
			}
		}
		_ => Err(DecodeError::msg(format_args!("Invalid decimal value: {raw}"))),
	}
}

/// Derive (exponent, mantissa) from a JSON number's textual form
fn decimal_from_number_text(text: &str) -> Result<DecimalValue, DecodeError> {
	let invalid = || DecodeError::msg(format_args!("Invalid decimal value: {text}"));
	let (mantissa_text, mut exponent) = match text.split_once(['e', 'E']) {
		Some((mantissa_text, exponent_text)) => {
			(mantissa_text, exponent_text.parse::<i32>().map_err(|_| invalid())?)
		}
		None => (text, 0),
	};
	let mantissa_digits = match mantissa_text.split_once('.') {
		Some((whole, fraction)) => {
			exponent -= fraction.len() as i32;
			format!("{whole}{fraction}")
		}
		None => mantissa_text.to_owned(),
	};
	let mantissa = mantissa_digits.parse().map_err(|_| invalid())?;
	Ok(DecimalValue { exponent, mantissa })
}

fn parse_binary(raw: &serde_json::Value, binary: &BinaryType) -> Result<Value, DecodeError> {
	if binary.kind == BinaryKind::String {
		let text = raw
			.as_str()
			.ok_or_else(|| DecodeError::new("string fields expect a string value"))?;
		return Ok(Value::String(text.to_owned()));
	}
	match raw {
		serde_json::Value::String(text) => Ok(Value::Binary(text.as_bytes().to_vec())),
		serde_json::Value::Array(entries) => {
			// Each entry may carry several space-separated hex pairs.
			let mut bytes = Vec::new();
			for entry in entries {
				let entry = entry
					.as_str()
					.ok_or_else(|| DecodeError::new("binary hex entries must be strings"))?;
				for pair in entry.split_whitespace() {
					let byte = u8::from_str_radix(pair, 16)
						.map_err(|_| DecodeError::msg(format_args!("Invalid hex byte: {pair}")))?;
					bytes.push(byte);
				}
			}
			Ok(Value::Binary(bytes))
		}
		_ => Err(DecodeError::msg(format_args!("Invalid binary value: {raw}"))),
	}
}
