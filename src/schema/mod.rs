//! The Blink schema model: parse schema text, resolve it, navigate the
//! resulting group graph
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
//! let (_, hello) = schema.group_by_qualified("Demo:Hello").unwrap();
//! assert_eq!(hello.type_id, Some(1));
//! ```

mod error;
pub(crate) mod parsing;
mod render;
mod resolve;

pub use {error::SchemaError, render::render_schema};

use std::{collections::HashMap, path::Path};

/// Qualified name of a schema component
///
/// This holds both the "namespace" and the local "name", stored as the
/// qualified `ns:name` form so that registry lookups do not allocate.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct QName {
	qualified: String,
	namespace_delimiter_idx: Option<usize>,
}

impl std::fmt::Debug for QName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.qualified, f)
	}
}

impl std::fmt::Display for QName {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.qualified)
	}
}

impl QName {
	/// Build a [`QName`] from its components
	pub fn new(namespace: Option<&str>, name: &str) -> Self {
		match namespace {
			None | Some("") => Self {
				qualified: name.to_owned(),
				namespace_delimiter_idx: None,
			},
			Some(ns) => Self {
				qualified: format!("{ns}:{name}"),
				namespace_delimiter_idx: Some(ns.len()),
			},
		}
	}

	/// Parse `"ns:name"` or `"name"`, qualifying bare names with
	/// `default_namespace`
	pub fn parse(raw: &str, default_namespace: Option<&str>) -> Self {
		match raw.find(':') {
			Some(idx) if idx > 0 => Self {
				qualified: raw.to_owned(),
				namespace_delimiter_idx: Some(idx),
			},
			Some(idx) => Self::new(None, &raw[idx + 1..]),
			None => Self::new(default_namespace, raw),
		}
	}

	/// The local component of the qualified name
	///
	/// e.g. in `Demo:Hello` it's `Hello`
	pub fn name(&self) -> &str {
		match self.namespace_delimiter_idx {
			None => &self.qualified,
			Some(idx) => &self.qualified[idx + 1..],
		}
	}

	/// The namespace component of the qualified name
	///
	/// e.g. in `Demo:Hello` it's `Demo`
	pub fn namespace(&self) -> Option<&str> {
		self.namespace_delimiter_idx
			.map(|idx| &self.qualified[..idx])
	}

	/// The full `ns:name` form (or just `name` without a namespace)
	pub fn qualified(&self) -> &str {
		&self.qualified
	}
}

/// Closed set of Blink primitive types
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum PrimitiveKind {
	U8,
	U16,
	U32,
	U64,
	I8,
	I16,
	I32,
	I64,
	Bool,
	F64,
	Decimal,
	MilliTime,
	NanoTime,
	Date,
	TimeOfDayMilli,
	TimeOfDayNano,
}

impl PrimitiveKind {
	pub(crate) fn from_keyword(keyword: &str) -> Option<Self> {
		Some(match keyword {
			"u8" => Self::U8,
			"u16" => Self::U16,
			"u32" => Self::U32,
			"u64" => Self::U64,
			"i8" => Self::I8,
			"i16" => Self::I16,
			"i32" => Self::I32,
			"i64" => Self::I64,
			"bool" => Self::Bool,
			"f64" => Self::F64,
			"decimal" => Self::Decimal,
			"millitime" => Self::MilliTime,
			"nanotime" => Self::NanoTime,
			"date" => Self::Date,
			"timeOfDayMilli" => Self::TimeOfDayMilli,
			"timeOfDayNano" => Self::TimeOfDayNano,
			_ => return None,
		})
	}

	/// The keyword that denotes this primitive in schema text
	pub fn keyword(self) -> &'static str {
		match self {
			Self::U8 => "u8",
			Self::U16 => "u16",
			Self::U32 => "u32",
			Self::U64 => "u64",
			Self::I8 => "i8",
			Self::I16 => "i16",
			Self::I32 => "i32",
			Self::I64 => "i64",
			Self::Bool => "bool",
			Self::F64 => "f64",
			Self::Decimal => "decimal",
			Self::MilliTime => "millitime",
			Self::NanoTime => "nanotime",
			Self::Date => "date",
			Self::TimeOfDayMilli => "timeOfDayMilli",
			Self::TimeOfDayNano => "timeOfDayNano",
		}
	}

	/// Whether values of this kind carry a sign
	///
	/// Time instants and dates are signed (they may predate the epoch);
	/// times of day are not.
	pub fn is_signed(self) -> bool {
		matches!(
			self,
			Self::I8
				| Self::I16 | Self::I32
				| Self::I64 | Self::MilliTime
				| Self::NanoTime
				| Self::Date
		)
	}
}

/// Which flavor of byte-string a [`BinaryType`] is
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BinaryKind {
	/// UTF-8 text, optionally with a max size
	String,
	/// Raw bytes, optionally with a max size
	Binary,
	/// Exactly `size` raw bytes
	Fixed,
}

/// `string[(N)]`, `binary[(N)]` or `fixed(N)`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BinaryType {
	pub kind: BinaryKind,
	/// Required (and exact) for [`BinaryKind::Fixed`], otherwise an optional
	/// max size. `string(N)` with `1 <= N <= 255` selects the Native codec's
	/// inline representation.
	pub size: Option<u32>,
}

impl BinaryType {
	pub fn new(kind: BinaryKind, size: Option<u32>) -> Result<Self, SchemaError> {
		match (kind, size) {
			(BinaryKind::Fixed, None) => {
				return Err(SchemaError::new("fixed type requires a size, e.g. fixed(8)"));
			}
			(_, Some(0)) => {
				return Err(SchemaError::new("binary type size must be positive"));
			}
			_ => {}
		}
		Ok(Self { kind, size })
	}
}

/// A named enumeration with explicit symbol values
#[derive(Clone, Debug, PartialEq)]
pub struct EnumType {
	pub name: QName,
	/// Symbols in declaration order; values are unique
	pub symbols: Vec<(String, i32)>,
	pub annotations: Annotations,
}

impl EnumType {
	pub fn new(name: QName, symbols: Vec<(String, i32)>) -> Result<Self, SchemaError> {
		for (i, (symbol, value)) in symbols.iter().enumerate() {
			if symbols[..i].iter().any(|(other, _)| other == symbol) {
				return Err(SchemaError::msg(format_args!(
					"Duplicate enum symbol {symbol} in {name}"
				)));
			}
			if symbols[..i].iter().any(|(_, other)| other == value) {
				return Err(SchemaError::msg(format_args!(
					"Duplicate enum value {value} for symbol {symbol} in {name}"
				)));
			}
		}
		Ok(Self {
			name,
			symbols,
			annotations: Annotations::new(),
		})
	}

	/// The integer value declared for `symbol`
	pub fn value_of(&self, symbol: &str) -> Option<i32> {
		self.symbols
			.iter()
			.find(|(name, _)| name == symbol)
			.map(|&(_, value)| value)
	}

	/// The symbol declared for `value`
	pub fn symbol_of(&self, value: i32) -> Option<&str> {
		self.symbols
			.iter()
			.find(|&&(_, v)| v == value)
			.map(|(name, _)| name.as_str())
	}
}

/// The location of a group in a [`Schema`]'s group arena
///
/// References between groups (inheritance, static/dynamic field types) are
/// represented as `GroupKey`s that index into the [`Schema`], so the group
/// graph may share nodes freely without ownership cycles.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
	idx: usize,
}

impl GroupKey {
	pub(crate) const fn from_idx(idx: usize) -> Self {
		Self { idx }
	}
	pub const fn idx(self) -> usize {
		self.idx
	}
}

impl std::fmt::Debug for GroupKey {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&self.idx, f)
	}
}

/// The type of a field, after resolution
///
/// Codecs dispatch over this sum exhaustively. Type aliases have already
/// been collapsed away by the resolver.
#[derive(Clone, Debug, PartialEq)]
pub enum TypeRef {
	Primitive(PrimitiveKind),
	Binary(BinaryType),
	Enum(EnumType),
	/// Sequence of the element type; the element is never itself a sequence
	Sequence(Box<TypeRef>),
	/// Inline serialization of the referenced group
	StaticGroup(GroupKey),
	/// Self-describing serialization; the concrete group is chosen at
	/// encode time and carried on the wire as a type id
	DynamicGroup(GroupKey),
	/// A dynamic-group slot that admits any group (`object`)
	Object,
}

/// Annotation map of a schema component (`@name="value"` pairs, merged with
/// any incremental annotation chains targeting the component)
pub type Annotations = HashMap<QName, String>;

/// A single field of a group
#[derive(Clone, Debug)]
pub struct FieldDef {
	pub name: String,
	pub type_ref: TypeRef,
	pub optional: bool,
	pub annotations: Annotations,
}

/// A named, optionally-identified record type
#[derive(Clone, Debug)]
pub struct GroupDef {
	pub name: QName,
	/// Enables wire-level polymorphism when present
	pub type_id: Option<u64>,
	/// Own fields only; inherited fields come through `super_group`
	pub fields: Vec<FieldDef>,
	pub super_group: Option<GroupKey>,
	pub annotations: Annotations,
}

/// A fully resolved Blink schema
///
/// Groups live in an arena addressed by [`GroupKey`] and are indexed both by
/// qualified name and by numeric type id. Schemas are immutable once
/// compiled; the dynamic-exchange layer wraps them in a mutable registry.
#[derive(Clone, Debug, Default)]
pub struct Schema {
	namespace: Option<String>,
	groups: Vec<GroupDef>,
	by_name: hashbrown::HashMap<String, GroupKey>,
	by_id: hashbrown::HashMap<u64, GroupKey>,
	annotations: Annotations,
}

impl Schema {
	/// The namespace declared by the schema document, if any
	pub fn namespace(&self) -> Option<&str> {
		self.namespace.as_deref()
	}

	/// Schema-level annotations (`schema <- @…` chains)
	pub fn annotations(&self) -> &Annotations {
		&self.annotations
	}

	/// All groups, in declaration order
	pub fn groups(&self) -> impl Iterator<Item = (GroupKey, &GroupDef)> {
		self.groups
			.iter()
			.enumerate()
			.map(|(idx, group)| (GroupKey::from_idx(idx), group))
	}

	/// The group at `key`
	///
	/// # Panics
	/// If `key` does not come from this schema.
	pub fn group(&self, key: GroupKey) -> &GroupDef {
		&self.groups[key.idx]
	}

	/// Look up a group by its qualified `ns:name` form
	pub fn group_by_qualified(&self, qualified: &str) -> Option<(GroupKey, &GroupDef)> {
		let key = *self.by_name.get(qualified)?;
		Some((key, &self.groups[key.idx]))
	}

	/// Look up a group by name
	pub fn group_by_name(&self, name: &QName) -> Option<(GroupKey, &GroupDef)> {
		self.group_by_qualified(name.qualified())
	}

	/// Look up a group by numeric type id
	pub fn group_by_id(&self, type_id: u64) -> Option<(GroupKey, &GroupDef)> {
		let key = *self.by_id.get(&type_id)?;
		Some((key, &self.groups[key.idx]))
	}

	/// Type ids known to this schema
	pub fn known_type_ids(&self) -> impl Iterator<Item = u64> + '_ {
		self.by_id.keys().copied()
	}

	/// The effective field list of `key`: inherited fields first
	/// (recursively), then the group's own fields
	pub fn effective_fields(&self, key: GroupKey) -> Vec<&FieldDef> {
		let mut chain = Vec::new();
		let mut cursor = Some(key);
		while let Some(key) = cursor {
			chain.push(key);
			cursor = self.groups[key.idx].super_group;
		}
		let mut fields = Vec::new();
		for key in chain.into_iter().rev() {
			fields.extend(self.groups[key.idx].fields.iter());
		}
		fields
	}

	pub(crate) fn new(namespace: Option<String>) -> Self {
		Self {
			namespace,
			..Self::default()
		}
	}

	pub(crate) fn set_annotations(&mut self, annotations: Annotations) {
		self.annotations = annotations;
	}

	/// Install a new group, indexing its name and (if present) its type id
	pub(crate) fn push_group(&mut self, group: GroupDef) -> Result<GroupKey, SchemaError> {
		if self.by_name.contains_key(group.name.qualified()) {
			return Err(SchemaError::msg(format_args!(
				"Duplicate group definition for {}",
				group.name
			)));
		}
		let key = GroupKey::from_idx(self.groups.len());
		if let Some(type_id) = group.type_id {
			if self.by_id.contains_key(&type_id) {
				return Err(SchemaError::msg(format_args!(
					"Duplicate type id {type_id}"
				)));
			}
			self.by_id.insert(type_id, key);
		}
		self.by_name.insert(group.name.qualified().to_owned(), key);
		self.groups.push(group);
		Ok(key)
	}

	/// Bind `type_id` to the group at `key`, replacing any id it previously
	/// held. Fails if the id is already bound to a different group.
	pub(crate) fn bind_type_id(&mut self, key: GroupKey, type_id: u64) -> Result<(), SchemaError> {
		if let Some(&holder) = self.by_id.get(&type_id) {
			if holder != key {
				return Err(SchemaError::msg(format_args!(
					"Type id {type_id} already bound to {}",
					self.groups[holder.idx].name
				)));
			}
			return Ok(());
		}
		if let Some(previous) = self.groups[key.idx].type_id {
			self.by_id.remove(&previous);
		}
		self.groups[key.idx].type_id = Some(type_id);
		self.by_id.insert(type_id, key);
		Ok(())
	}

	pub(crate) fn group_mut(&mut self, key: GroupKey) -> &mut GroupDef {
		&mut self.groups[key.idx]
	}
}

impl std::ops::Index<GroupKey> for Schema {
	type Output = GroupDef;
	fn index(&self, key: GroupKey) -> &Self::Output {
		&self.groups[key.idx]
	}
}

impl std::str::FromStr for Schema {
	type Err = SchemaError;
	fn from_str(s: &str) -> Result<Self, Self::Err> {
		compile_schema(s)
	}
}

/// Parse and resolve Blink schema text in a single call
pub fn compile_schema(text: &str) -> Result<Schema, SchemaError> {
	let ast = parsing::parse(text)?;
	resolve::resolve(&ast)
}

/// Read, parse and resolve a Blink schema from `path`
pub fn compile_schema_file(path: impl AsRef<Path>) -> Result<Schema, SchemaError> {
	let text = std::fs::read_to_string(path).map_err(SchemaError::io)?;
	compile_schema(&text)
}
