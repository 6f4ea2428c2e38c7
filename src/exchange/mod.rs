//! Dynamic Schema Exchange: reserved-range messages as schema mutations
//!
//! Type ids 16000–16383 are reserved for schema transport. The framed
//! transport messages (`GroupDecl`, `GroupDef`, `Define`) mutate the
//! registry when they appear in a stream instead of being returned to the
//! caller; their component groups (`FieldDef`, `TypeDef`, `Symbol`, …)
//! have no type ids and only ever ride inside them. Everything else in
//! the reserved range decodes as an ordinary application message.
//!
//! ```
//! use blink_codec::{compact, exchange, Message, QName};
//!
//! let mut registry = exchange::bootstrap_registry().unwrap();
//!
//! let decl = Message::new(QName::parse("Blink:GroupDecl", None))
//! 	.with("Name", blink_codec::StaticGroupValue::new().with("Ns", "Test").with("Name", "MyType"))
//! 	.with("Id", 100u64);
//! let encoded = compact::encode_message(&decl, registry.registry()).unwrap();
//!
//! let messages = exchange::decode_stream_with_schema_exchange(&encoded, &mut registry, true).unwrap();
//! assert!(messages.is_empty());
//! assert_eq!(registry.registry().group_by_id(100).unwrap().1.name.qualified(), "Test:MyType");
//! ```

use {
	crate::{
		compact,
		error::{DecodeError, EncodeError},
		registry::{Registry, RegistryError},
		schema::{
			BinaryKind, BinaryType, EnumType, FieldDef, GroupDef, GroupKey, PrimitiveKind, QName,
			Schema, SchemaError, TypeRef,
		},
		value::{Message, StaticGroupValue, Value},
	},
	hashbrown::HashMap,
};

/// First type id reserved for schema transport
pub const RESERVED_TYPE_ID_MIN: u64 = 16000;
/// Last type id reserved for schema transport
pub const RESERVED_TYPE_ID_MAX: u64 = 16383;

const TYPE_ID_GROUP_DECL: u64 = 16000;
const TYPE_ID_GROUP_DEF: u64 = 16001;
const TYPE_ID_DEFINE: u64 = 16002;

/// The bootstrap schema describing the `Blink` namespace itself
pub const BOOTSTRAP_SCHEMA: &str = include_str!("blink.blink");

/// Whether `type_id` names a framed schema-transport message (as opposed
/// to a reserved-range schema description type, which decodes normally)
pub fn is_schema_transport(type_id: u64) -> bool {
	matches!(type_id, TYPE_ID_GROUP_DECL | TYPE_ID_GROUP_DEF | TYPE_ID_DEFINE)
}

/// A [`Registry`] that accepts schema-transport updates
///
/// This is the mutable registry variant: `GroupDecl` tags groups with
/// type ids or installs placeholders, `GroupDef` installs complete
/// groups, and `Define` registers named type aliases consulted when later
/// definitions resolve. Treat one `ExchangeRegistry` as owned by a single
/// logical stream.
pub struct ExchangeRegistry {
	registry: Registry,
	aliases: HashMap<String, TypeRef>,
}

impl ExchangeRegistry {
	/// Wrap an existing registry
	pub fn new(registry: Registry) -> Self {
		Self {
			registry,
			aliases: HashMap::new(),
		}
	}

	/// The wrapped registry
	pub fn registry(&self) -> &Registry {
		&self.registry
	}

	/// Tag the group named `name` with `id`, or install a placeholder
	/// group carrying only the name and id
	///
	/// An id already bound to a different group is rejected.
	pub fn apply_group_decl(&mut self, name: QName, id: u64) -> Result<(), RegistryError> {
		let schema = self.registry.schema_mut();
		match schema.group_by_name(&name) {
			Some((key, _)) => schema.bind_type_id(key, id).map_err(RegistryError::display),
			None => {
				schema
					.push_group(GroupDef {
						name,
						type_id: Some(id),
						fields: Vec::new(),
						super_group: None,
						annotations: Default::default(),
					})
					.map_err(RegistryError::display)?;
				Ok(())
			}
		}
	}
}

/// Build an [`ExchangeRegistry`] preloaded with the bootstrap schema
pub fn bootstrap_registry() -> Result<ExchangeRegistry, SchemaError> {
	Ok(ExchangeRegistry::new(Registry::from_schema_text(
		BOOTSTRAP_SCHEMA,
	)?))
}

/// Encode a schema-transport message to Compact Binary
///
/// Refuses groups whose type id is not a transport id.
pub fn encode_schema_transport_message(
	message: &Message,
	registry: &Registry,
) -> Result<Vec<u8>, EncodeError> {
	let (_, group) = registry
		.group_by_name(&message.type_name)
		.map_err(EncodeError::display)?;
	match group.type_id {
		Some(type_id) if is_schema_transport(type_id) => {}
		Some(type_id) => {
			return Err(EncodeError::msg(format_args!(
				"Type id {type_id} is not a schema transport message"
			)));
		}
		None => {
			return Err(EncodeError::msg(format_args!(
				"Group {} is missing a type id and cannot be encoded",
				group.name
			)));
		}
	}
	compact::encode_message(message, registry)
}

/// Decode one frame, applying schema-transport messages to the registry
///
/// Returns `(None, next)` when the frame carried a transport message (its
/// effect is in the registry) — and, in lax mode, when the frame's type id
/// is unknown and was skipped. Application messages come back as
/// `(Some(message), next)`.
pub fn decode_with_schema_exchange(
	buf: &[u8],
	registry: &mut ExchangeRegistry,
	offset: usize,
	strict: bool,
) -> Result<(Option<Message>, usize), DecodeError> {
	let (frame, next) = compact::decode_frame(buf, offset, Some(&registry.registry), strict)?;
	let Some(key) = frame.group else {
		// Lax mode with an unknown type id: skip the frame.
		return Ok((None, next));
	};
	if is_schema_transport(frame.type_id) {
		let (fields, _) = compact::decode_group_fields(key, &frame.payload, 0, &registry.registry)?;
		let mut message = Message::new(registry.registry.group(key).name.clone());
		message.fields = fields;
		apply_schema_update(registry, &message).map_err(|error| {
			DecodeError::msg(format_args!("Schema transport message rejected: {error}"))
		})?;
		return Ok((None, next));
	}
	let message = compact::decode_message_payload(key, &frame.payload, &registry.registry)?;
	Ok((Some(message), next))
}

/// Decode a whole stream, returning exactly the application messages in
/// order; schema-transport messages take effect before any following
/// frame is decoded
pub fn decode_stream_with_schema_exchange(
	buf: &[u8],
	registry: &mut ExchangeRegistry,
	strict: bool,
) -> Result<Vec<Message>, DecodeError> {
	let mut messages = Vec::new();
	let mut offset = 0;
	while offset < buf.len() {
		let (message, next) = decode_with_schema_exchange(buf, registry, offset, strict)?;
		if let Some(message) = message {
			messages.push(message);
		}
		offset = next;
	}
	Ok(messages)
}

/// Build a `GroupDecl` transport message declaring `name` under `id`
pub fn group_decl_message(name: &QName, id: u64) -> Message {
	Message::new(QName::new(Some("Blink"), "GroupDecl"))
		.with("Name", ns_name_value(name))
		.with("Id", id)
}

/// Build a `Define` transport message binding `name` to a type
///
/// This is the only way an enum travels over schema exchange; the
/// receiving side registers the definition as a named alias.
pub fn define_message(
	name: &QName,
	type_ref: &TypeRef,
	schema: &Schema,
) -> Result<Message, EncodeError> {
	let descriptor = match type_ref {
		TypeRef::Enum(enum_type) => {
			let symbols: Vec<Value> = enum_type
				.symbols
				.iter()
				.map(|(symbol, value)| {
					StaticGroupValue::new()
						.with("Name", symbol.as_str())
						.with("Value", *value)
						.into()
				})
				.collect();
			Message::new(QName::new(Some("Blink"), "Enum")).with("Symbols", Value::Sequence(symbols))
		}
		other => descriptor_message(other, schema)?,
	};
	Ok(Message::new(QName::new(Some("Blink"), "Define"))
		.with("Name", ns_name_value(name))
		.with("Type", descriptor))
}

/// Build a `GroupDef` transport message describing the group at `key`
///
/// Enum-typed fields are emitted as `Ref`s to the enum's name; send a
/// [`define_message`] for the enum ahead of the `GroupDef` so the
/// receiving side can resolve them.
pub fn group_def_message(schema: &Schema, key: GroupKey) -> Result<Message, EncodeError> {
	let group = &schema[key];
	let mut message = Message::new(QName::new(Some("Blink"), "GroupDef"))
		.with("Name", ns_name_value(&group.name));
	if let Some(id) = group.type_id {
		message = message.with("Id", id);
	}
	if let Some(super_key) = group.super_group {
		message = message.with("Super", ns_name_value(&schema[super_key].name));
	}
	let mut fields = Vec::with_capacity(group.fields.len());
	for field in &group.fields {
		fields.push(
			StaticGroupValue::new()
				.with("Name", field.name.as_str())
				.with("Type", descriptor_message(&field.type_ref, schema)?)
				.with("Optional", field.optional)
				.into(),
		);
	}
	Ok(message.with("Fields", Value::Sequence(fields)))
}

/// The descriptor message naming a schema type (`@Blink:U32`,
/// `@Blink:Ref|…`, …); the inverse of descriptor resolution
fn descriptor_message(
	type_ref: &TypeRef,
	schema: &Schema,
) -> Result<Message, EncodeError> {
	let marker = |name: &str| Message::new(QName::new(Some("Blink"), name));
	Ok(match type_ref {
		TypeRef::Primitive(kind) => marker(match kind {
			PrimitiveKind::U8 => "U8",
			PrimitiveKind::I8 => "I8",
			PrimitiveKind::U16 => "U16",
			PrimitiveKind::I16 => "I16",
			PrimitiveKind::U32 => "U32",
			PrimitiveKind::I32 => "I32",
			PrimitiveKind::U64 => "U64",
			PrimitiveKind::I64 => "I64",
			PrimitiveKind::F64 => "F64",
			PrimitiveKind::Decimal => "Decimal",
			PrimitiveKind::Date => "Date",
			PrimitiveKind::TimeOfDayMilli => "TimeOfDayMilli",
			PrimitiveKind::TimeOfDayNano => "TimeOfDayNano",
			PrimitiveKind::NanoTime => "NanoTime",
			PrimitiveKind::MilliTime => "MilliTime",
			PrimitiveKind::Bool => "Bool",
		}),
		TypeRef::Object => marker("Object"),
		TypeRef::Binary(binary) => match binary.kind {
			BinaryKind::Fixed => marker("Fixed").with(
				"Size",
				binary.size.ok_or_else(|| EncodeError::new("fixed type without a size"))?,
			),
			BinaryKind::String | BinaryKind::Binary => {
				let mut descriptor = marker(if binary.kind == BinaryKind::String {
					"String"
				} else {
					"Binary"
				});
				if let Some(size) = binary.size {
					descriptor = descriptor.with("MaxSize", size);
				}
				descriptor
			}
		},
		TypeRef::StaticGroup(key) => marker("Ref").with("Type", ns_name_value(&schema[*key].name)),
		TypeRef::DynamicGroup(key) => {
			marker("DynRef").with("Type", ns_name_value(&schema[*key].name))
		}
		TypeRef::Sequence(element) => {
			marker("Sequence").with("Type", descriptor_message(element, schema)?)
		}
		// An anonymous enum cannot be referenced from a FieldDef; it has to
		// go through Define under its own name.
		TypeRef::Enum(enum_type) => {
			marker("Ref").with("Type", ns_name_value(&enum_type.name))
		}
	})
}

fn ns_name_value(name: &QName) -> StaticGroupValue {
	let mut value = StaticGroupValue::new();
	if let Some(namespace) = name.namespace() {
		value = value.with("Ns", namespace);
	}
	value.with("Name", name.name())
}

/// Apply a decoded transport message to the registry
pub fn apply_schema_update(
	registry: &mut ExchangeRegistry,
	message: &Message,
) -> Result<(), RegistryError> {
	let (_, group) = registry
		.registry
		.group_by_name(&message.type_name)
		.map_err(RegistryError::display)?;
	match group.type_id {
		Some(TYPE_ID_GROUP_DECL) => apply_group_decl(registry, message),
		Some(TYPE_ID_GROUP_DEF) => apply_group_def(registry, message),
		Some(TYPE_ID_DEFINE) => apply_define(registry, message),
		Some(type_id) => Err(RegistryError::msg(format_args!(
			"Type id {type_id} is not a schema transport message"
		))),
		None => Err(RegistryError::msg(format_args!(
			"Group {} has no type id",
			message.type_name
		))),
	}
}

fn apply_group_decl(registry: &mut ExchangeRegistry, message: &Message) -> Result<(), RegistryError> {
	let name = ns_name(message.get("Name"), "GroupDecl.Name")?;
	let id = message
		.get("Id")
		.and_then(Value::as_u64)
		.ok_or_else(|| RegistryError::new("GroupDecl missing Id field"))?;
	registry.apply_group_decl(name, id)
}

fn apply_group_def(registry: &mut ExchangeRegistry, message: &Message) -> Result<(), RegistryError> {
	let name = ns_name(message.get("Name"), "GroupDef.Name")?;
	let id = message.get("Id").and_then(Value::as_u64);

	if let Some(id) = id {
		if let Some((_, holder)) = registry.registry.schema().group_by_id(id) {
			if holder.name != name {
				return Err(RegistryError::msg(format_args!(
					"Type id {id} already used by {}",
					holder.name
				)));
			}
		}
	}

	let super_group = match message.get("Super") {
		None => None,
		Some(value) => {
			let super_name = ns_name(Some(value), "GroupDef.Super")?;
			let (key, _) = registry
				.registry
				.group_by_name(&super_name)
				.map_err(|_| RegistryError::msg(format_args!("Super group {super_name} not found")))?;
			Some(key)
		}
	};

	let mut fields = Vec::new();
	if let Some(value) = message.get("Fields") {
		let items = value
			.as_sequence()
			.ok_or_else(|| RegistryError::new("GroupDef.Fields must be a sequence"))?;
		for item in items {
			fields.push(field_def(registry, item)?);
		}
	}

	let schema = registry.registry.schema_mut();
	match schema.group_by_name(&name) {
		Some((key, _)) => {
			let group = schema.group_mut(key);
			group.super_group = super_group;
			group.fields = fields;
			if let Some(id) = id {
				schema.bind_type_id(key, id).map_err(RegistryError::display)?;
			}
			Ok(())
		}
		None => {
			schema
				.push_group(GroupDef {
					name,
					type_id: id,
					fields,
					super_group,
					annotations: Default::default(),
				})
				.map_err(RegistryError::display)?;
			Ok(())
		}
	}
}

fn apply_define(registry: &mut ExchangeRegistry, message: &Message) -> Result<(), RegistryError> {
	let name = ns_name(message.get("Name"), "Define.Name")?;
	let descriptor = message
		.get("Type")
		.and_then(Value::as_message)
		.ok_or_else(|| RegistryError::new("Define missing Type descriptor"))?;
	let type_ref = resolve_descriptor(registry, descriptor, Some(&name))?;
	registry.aliases.insert(name.qualified().to_owned(), type_ref);
	Ok(())
}

fn field_def(registry: &ExchangeRegistry, value: &Value) -> Result<FieldDef, RegistryError> {
	let group_value = value
		.as_group()
		.ok_or_else(|| RegistryError::new("GroupDef.Fields entries must be FieldDef values"))?;
	let name = group_value
		.get("Name")
		.and_then(Value::as_str)
		.ok_or_else(|| RegistryError::new("FieldDef missing Name"))?;
	let descriptor = group_value
		.get("Type")
		.and_then(Value::as_message)
		.ok_or_else(|| RegistryError::new("FieldDef missing Type descriptor"))?;
	let optional = group_value
		.get("Optional")
		.and_then(Value::as_bool)
		.unwrap_or(false);
	Ok(FieldDef {
		name: name.to_owned(),
		type_ref: resolve_descriptor(registry, descriptor, None)?,
		optional,
		annotations: Default::default(),
	})
}

/// Interpret a type-descriptor message (`@Blink:U32`, `@Blink:Ref|…`, …)
/// as a schema type
fn resolve_descriptor(
	registry: &ExchangeRegistry,
	descriptor: &Message,
	define_name: Option<&QName>,
) -> Result<TypeRef, RegistryError> {
	let local = descriptor.type_name.name();
	if descriptor.type_name.namespace() != Some("Blink") {
		return Err(RegistryError::msg(format_args!(
			"Unknown type descriptor {}",
			descriptor.type_name
		)));
	}
	let primitive = |kind| Ok(TypeRef::Primitive(kind));
	match local {
		"U8" => primitive(PrimitiveKind::U8),
		"I8" => primitive(PrimitiveKind::I8),
		"U16" => primitive(PrimitiveKind::U16),
		"I16" => primitive(PrimitiveKind::I16),
		"U32" => primitive(PrimitiveKind::U32),
		"I32" => primitive(PrimitiveKind::I32),
		"U64" => primitive(PrimitiveKind::U64),
		"I64" => primitive(PrimitiveKind::I64),
		"F64" => primitive(PrimitiveKind::F64),
		"Decimal" => primitive(PrimitiveKind::Decimal),
		"Date" => primitive(PrimitiveKind::Date),
		"TimeOfDayMilli" => primitive(PrimitiveKind::TimeOfDayMilli),
		"TimeOfDayNano" => primitive(PrimitiveKind::TimeOfDayNano),
		"NanoTime" => primitive(PrimitiveKind::NanoTime),
		"MilliTime" => primitive(PrimitiveKind::MilliTime),
		"Bool" => primitive(PrimitiveKind::Bool),
		"Object" => Ok(TypeRef::Object),
		"String" | "Binary" => {
			let kind = if local == "String" {
				BinaryKind::String
			} else {
				BinaryKind::Binary
			};
			let size = descriptor
				.get("MaxSize")
				.and_then(Value::as_u64)
				.and_then(|size| u32::try_from(size).ok());
			BinaryType::new(kind, size)
				.map(TypeRef::Binary)
				.map_err(RegistryError::display)
		}
		"Fixed" => {
			let size = descriptor
				.get("Size")
				.and_then(Value::as_u64)
				.and_then(|size| u32::try_from(size).ok())
				.ok_or_else(|| RegistryError::new("Fixed descriptor missing Size"))?;
			BinaryType::new(BinaryKind::Fixed, Some(size))
				.map(TypeRef::Binary)
				.map_err(RegistryError::display)
		}
		"Ref" | "DynRef" => {
			let target = ns_name(descriptor.get("Type"), "type reference target")?;
			if local == "Ref" {
				if let Some(alias) = registry.aliases.get(target.qualified()) {
					return Ok(alias.clone());
				}
			}
			let (key, _) = registry
				.registry
				.group_by_name(&target)
				.map_err(|_| RegistryError::msg(format_args!("Unknown group {target}")))?;
			Ok(if local == "DynRef" {
				TypeRef::DynamicGroup(key)
			} else {
				TypeRef::StaticGroup(key)
			})
		}
		"Sequence" => {
			let element = descriptor
				.get("Type")
				.and_then(Value::as_message)
				.ok_or_else(|| RegistryError::new("Sequence descriptor missing Type"))?;
			let element_type = resolve_descriptor(registry, element, None)?;
			if matches!(element_type, TypeRef::Sequence(_)) {
				return Err(RegistryError::new("Blink does not allow nested sequences"));
			}
			Ok(TypeRef::Sequence(Box::new(element_type)))
		}
		"Enum" => {
			// Anonymous enums cannot be expressed in the resolved model;
			// they arrive through Define, which names them.
			let Some(name) = define_name else {
				return Err(RegistryError::new(
					"Enum descriptors are only supported inside Define",
				));
			};
			let items = descriptor
				.get("Symbols")
				.and_then(Value::as_sequence)
				.ok_or_else(|| RegistryError::new("Enum descriptor missing Symbols"))?;
			let mut symbols = Vec::with_capacity(items.len());
			for item in items {
				let symbol = item
					.as_group()
					.ok_or_else(|| RegistryError::new("Enum Symbols entries must be Symbol values"))?;
				let symbol_name = symbol
					.get("Name")
					.and_then(Value::as_str)
					.ok_or_else(|| RegistryError::new("Symbol missing Name"))?;
				let value = symbol
					.get("Value")
					.and_then(Value::as_i64)
					.and_then(|v| i32::try_from(v).ok())
					.ok_or_else(|| RegistryError::new("Symbol missing Value"))?;
				symbols.push((symbol_name.to_owned(), value));
			}
			EnumType::new(name.clone(), symbols)
				.map(TypeRef::Enum)
				.map_err(RegistryError::display)
		}
		_ => Err(RegistryError::msg(format_args!(
			"Unknown type descriptor Blink:{local}"
		))),
	}
}

/// Extract a `QName` from an `NsName` static group value
fn ns_name(value: Option<&Value>, what: &str) -> Result<QName, RegistryError> {
	let group_value = value
		.and_then(Value::as_group)
		.ok_or_else(|| RegistryError::msg(format_args!("{what} must be an NsName value")))?;
	let namespace = group_value.get("Ns").and_then(Value::as_str);
	let name = group_value
		.get("Name")
		.and_then(Value::as_str)
		.filter(|name| !name.is_empty())
		.ok_or_else(|| RegistryError::msg(format_args!("{what} is missing its Name")))?;
	Ok(QName::new(namespace, name))
}
