//! The runtime value model shared by every codec
//!
//! Decoders materialize values of these types (copying strings and binary
//! payloads out of the input buffer); encoders consume them. A [`Message`]
//! is the root of a value tree and always names the concrete group it
//! conforms to.

use crate::schema::QName;

/// The (exponent, mantissa) pair of a Blink decimal
///
/// The represented number is `mantissa × 10^exponent`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecimalValue {
	pub exponent: i32,
	pub mantissa: i64,
}

impl DecimalValue {
	pub fn new(exponent: i32, mantissa: i64) -> Self {
		Self { exponent, mantissa }
	}

	/// Convert into a [`rust_decimal::Decimal`] where the exponent is
	/// representable (scale 0..=28 after normalization)
	pub fn to_decimal(self) -> Option<rust_decimal::Decimal> {
		if self.exponent <= 0 {
			let scale = u32::try_from(-i64::from(self.exponent)).ok()?;
			if scale > 28 {
				return None;
			}
			Some(rust_decimal::Decimal::from_i128_with_scale(
				i128::from(self.mantissa),
				scale,
			))
		} else {
			let factor = 10i128.checked_pow(u32::try_from(self.exponent).ok()?)?;
			let scaled = i128::from(self.mantissa).checked_mul(factor)?;
			rust_decimal::Decimal::try_from_i128_with_scale(scaled, 0).ok()
		}
	}
}

/// A single decoded or to-be-encoded value
///
/// Unsigned primitive kinds map to [`Value::U64`], signed kinds (including
/// `millitime`, `nanotime` and `date`) to [`Value::I64`]. Equality compares
/// `F64` bitwise so NaN payloads round-trip as equal.
#[derive(Clone, Debug)]
pub enum Value {
	Bool(bool),
	U64(u64),
	I64(i64),
	F64(f64),
	Decimal(DecimalValue),
	String(String),
	Binary(Vec<u8>),
	/// An enum symbol, by name
	Enum(String),
	Sequence(Vec<Value>),
	/// An inline static group value
	Group(StaticGroupValue),
	/// A dynamic group or `object` value
	Message(Box<Message>),
}

impl PartialEq for Value {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::U64(a), Self::U64(b)) => a == b,
			(Self::I64(a), Self::I64(b)) => a == b,
			(Self::F64(a), Self::F64(b)) => a.to_bits() == b.to_bits(),
			(Self::Decimal(a), Self::Decimal(b)) => a == b,
			(Self::String(a), Self::String(b)) => a == b,
			(Self::Binary(a), Self::Binary(b)) => a == b,
			(Self::Enum(a), Self::Enum(b)) => a == b,
			(Self::Sequence(a), Self::Sequence(b)) => a == b,
			(Self::Group(a), Self::Group(b)) => a == b,
			(Self::Message(a), Self::Message(b)) => a == b,
			_ => false,
		}
	}
}

macro_rules! impl_value_from {
	($($from: ty => $variant: ident ($convert: expr),)*) => {
		$(
			impl From<$from> for Value {
				fn from(value: $from) -> Self {
					Self::$variant($convert(value))
				}
			}
		)*
	};
}
impl_value_from! {
	bool => Bool(std::convert::identity),
	u8 => U64(u64::from),
	u16 => U64(u64::from),
	u32 => U64(u64::from),
	u64 => U64(std::convert::identity),
	i8 => I64(i64::from),
	i16 => I64(i64::from),
	i32 => I64(i64::from),
	i64 => I64(std::convert::identity),
	f64 => F64(std::convert::identity),
	DecimalValue => Decimal(std::convert::identity),
	String => String(std::convert::identity),
	Vec<u8> => Binary(std::convert::identity),
	StaticGroupValue => Group(std::convert::identity),
	Message => Message(Box::new),
}
impl From<&str> for Value {
	fn from(value: &str) -> Self {
		Self::String(value.to_owned())
	}
}
impl From<&[u8]> for Value {
	fn from(value: &[u8]) -> Self {
		Self::Binary(value.to_vec())
	}
}
impl Value {
	/// Build a [`Value::Sequence`] from anything that yields values
	pub fn seq<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
		Self::Sequence(values.into_iter().map(Into::into).collect())
	}

	pub fn as_bool(&self) -> Option<bool> {
		match *self {
			Self::Bool(value) => Some(value),
			_ => None,
		}
	}

	/// The value as an unsigned integer, accepting an in-range [`Value::I64`]
	pub fn as_u64(&self) -> Option<u64> {
		match *self {
			Self::U64(value) => Some(value),
			Self::I64(value) => u64::try_from(value).ok(),
			_ => None,
		}
	}

	/// The value as a signed integer, accepting an in-range [`Value::U64`]
	pub fn as_i64(&self) -> Option<i64> {
		match *self {
			Self::I64(value) => Some(value),
			Self::U64(value) => i64::try_from(value).ok(),
			_ => None,
		}
	}

	pub fn as_f64(&self) -> Option<f64> {
		match *self {
			Self::F64(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_decimal(&self) -> Option<DecimalValue> {
		match *self {
			Self::Decimal(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_str(&self) -> Option<&str> {
		match self {
			Self::String(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_bytes(&self) -> Option<&[u8]> {
		match self {
			Self::Binary(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_sequence(&self) -> Option<&[Value]> {
		match self {
			Self::Sequence(values) => Some(values),
			_ => None,
		}
	}

	pub fn as_group(&self) -> Option<&StaticGroupValue> {
		match self {
			Self::Group(value) => Some(value),
			_ => None,
		}
	}

	pub fn as_message(&self) -> Option<&Message> {
		match self {
			Self::Message(message) => Some(message),
			_ => None,
		}
	}
}

/// An ordered field-name → value map
///
/// Iteration preserves insertion order; serialization order always comes
/// from the schema, so equality is order-insensitive.
#[derive(Clone, Debug, Default)]
pub struct Fields {
	entries: Vec<(String, Value)>,
}

impl Fields {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn get(&self, name: &str) -> Option<&Value> {
		self.entries
			.iter()
			.find(|(entry_name, _)| entry_name == name)
			.map(|(_, value)| value)
	}

	/// Insert `value` under `name`, replacing any previous value
	pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
		let name = name.into();
		let value = value.into();
		match self.entries.iter_mut().find(|(entry_name, _)| *entry_name == name) {
			Some(entry) => entry.1 = value,
			None => self.entries.push((name, value)),
		}
	}

	pub fn contains(&self, name: &str) -> bool {
		self.get(name).is_some()
	}

	pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
		self.entries.iter().map(|(name, value)| (name.as_str(), value))
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}

impl PartialEq for Fields {
	fn eq(&self, other: &Self) -> bool {
		self.entries.len() == other.entries.len()
			&& self
				.entries
				.iter()
				.all(|(name, value)| other.get(name) == Some(value))
	}
}

impl<N: Into<String>, V: Into<Value>> FromIterator<(N, V)> for Fields {
	fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
		let mut fields = Self::new();
		for (name, value) in iter {
			fields.insert(name, value);
		}
		fields
	}
}

/// The concrete values of a static group
///
/// Static groups behave like structs: their fields inline into the host
/// serialization instead of introducing a nested frame.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticGroupValue {
	pub fields: Fields,
}

impl StaticGroupValue {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.fields.insert(name, value);
		self
	}

	pub fn get(&self, name: &str) -> Option<&Value> {
		self.fields.get(name)
	}
}

/// Runtime representation of a Blink message (a dynamic group value)
#[derive(Clone, Debug, PartialEq)]
pub struct Message {
	/// Qualified name of the schema group backing the message
	pub type_name: QName,
	pub fields: Fields,
	/// Extension messages appended to this message
	pub extensions: Vec<Message>,
}

impl Message {
	pub fn new(type_name: QName) -> Self {
		Self {
			type_name,
			fields: Fields::new(),
			extensions: Vec::new(),
		}
	}

	pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
		self.fields.insert(name, value);
		self
	}

	pub fn with_extension(mut self, extension: Message) -> Self {
		self.extensions.push(extension);
		self
	}

	pub fn get(&self, name: &str) -> Option<&Value> {
		self.fields.get(name)
	}
}
