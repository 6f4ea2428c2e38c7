//! Type registry resolving group names and numeric type ids during
//! encoding and decoding

use {
	crate::schema::{self, FieldDef, GroupDef, GroupKey, QName, Schema, SchemaError},
	std::{borrow::Cow, path::Path},
};

/// Any error that may happen during a registry lookup or registration
#[derive(thiserror::Error)]
#[error("{}", inner)]
pub struct RegistryError {
	inner: Box<Cow<'static, str>>,
}

impl std::fmt::Debug for RegistryError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&**self.inner, f)
	}
}

impl RegistryError {
	pub(crate) fn new(s: &'static str) -> Self {
		Self {
			inner: Box::new(Cow::Borrowed(s)),
		}
	}

	pub(crate) fn msg(s: std::fmt::Arguments<'_>) -> Self {
		Self::display(s)
	}

	pub(crate) fn display(s: impl std::fmt::Display) -> Self {
		Self {
			inner: Box::new(Cow::Owned(s.to_string())),
		}
	}
}

/// Immutable dual index over a resolved [`Schema`]: groups by qualified
/// name and by numeric type id
///
/// Safe to share across threads once built. The mutable variant used by
/// dynamic schema exchange is
/// [`ExchangeRegistry`](crate::exchange::ExchangeRegistry).
#[derive(Clone, Debug)]
pub struct Registry {
	schema: Schema,
}

impl Registry {
	/// Wrap an already-resolved schema
	///
	/// Name and id uniqueness were established during resolution.
	pub fn from_schema(schema: Schema) -> Self {
		Self { schema }
	}

	/// Compile `text` and index the resulting schema
	pub fn from_schema_text(text: &str) -> Result<Self, SchemaError> {
		Ok(Self::from_schema(schema::compile_schema(text)?))
	}

	/// Compile the schema file at `path` and index it
	pub fn from_schema_file(path: impl AsRef<Path>) -> Result<Self, SchemaError> {
		Ok(Self::from_schema(schema::compile_schema_file(path)?))
	}

	/// The schema backing this registry
	pub fn schema(&self) -> &Schema {
		&self.schema
	}

	/// Look up a group by qualified name
	pub fn group_by_name(&self, name: &QName) -> Result<(GroupKey, &GroupDef), RegistryError> {
		self.schema
			.group_by_name(name)
			.ok_or_else(|| RegistryError::msg(format_args!("unknown group {name}")))
	}

	/// Look up a group by its `ns:name` form
	pub fn group_by_qualified(&self, qualified: &str) -> Result<(GroupKey, &GroupDef), RegistryError> {
		self.schema
			.group_by_qualified(qualified)
			.ok_or_else(|| RegistryError::msg(format_args!("unknown group {qualified}")))
	}

	/// Look up a group by numeric type id
	pub fn group_by_id(&self, type_id: u64) -> Result<(GroupKey, &GroupDef), RegistryError> {
		self.schema
			.group_by_id(type_id)
			.ok_or_else(|| RegistryError::msg(format_args!("unknown type id {type_id}")))
	}

	/// The group at `key`
	pub fn group(&self, key: GroupKey) -> &GroupDef {
		self.schema.group(key)
	}

	/// Effective field list of the group at `key` (inherited fields first)
	pub fn effective_fields(&self, key: GroupKey) -> Vec<&FieldDef> {
		self.schema.effective_fields(key)
	}

	/// Type ids known to this registry
	pub fn known_type_ids(&self) -> impl Iterator<Item = u64> + '_ {
		self.schema.known_type_ids()
	}

	pub(crate) fn schema_mut(&mut self) -> &mut Schema {
		&mut self.schema
	}
}
