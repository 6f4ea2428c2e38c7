use {
	blink_codec::{
		compact, exchange,
		schema::{BinaryKind, PrimitiveKind, TypeRef},
		Message, QName, Registry, StaticGroupValue, Value,
	},
	pretty_assertions::assert_eq,
};

fn ns_name(ns: &str, name: &str) -> StaticGroupValue {
	StaticGroupValue::new().with("Ns", ns).with("Name", name)
}

fn group_decl(ns: &str, name: &str, id: u64) -> Message {
	Message::new(QName::parse("Blink:GroupDecl", None))
		.with("Name", ns_name(ns, name))
		.with("Id", id)
}

#[test]
fn bootstrap_schema_assigns_the_published_ids() {
	let registry = exchange::bootstrap_registry().unwrap();
	let schema = registry.registry().schema();

	for (name, id) in [
		("GroupDecl", 16000),
		("GroupDef", 16001),
		("Define", 16002),
		("Ref", 16003),
		("DynRef", 16004),
		("Sequence", 16005),
		("String", 16006),
		("Binary", 16007),
		("Fixed", 16008),
		("Enum", 16009),
		("SchemaAnnotation", 16027),
	] {
		let (_, group) = schema
			.group_by_qualified(&format!("Blink:{name}"))
			.unwrap_or_else(|| panic!("missing Blink:{name}"));
		assert_eq!(group.type_id, Some(id), "Blink:{name}");
	}

	// Component groups ride inside transport messages and carry no ids.
	for name in ["FieldDef", "TypeDef", "Symbol", "Annotated", "Annotation", "NsName"] {
		let (_, group) = schema
			.group_by_qualified(&format!("Blink:{name}"))
			.unwrap_or_else(|| panic!("missing Blink:{name}"));
		assert_eq!(group.type_id, None, "Blink:{name}");
	}
}

#[test]
fn transport_detection_matches_the_framed_transport_ids() {
	assert!(exchange::is_schema_transport(16000));
	assert!(exchange::is_schema_transport(16001));
	assert!(exchange::is_schema_transport(16002));
	// Schema description types decode as application messages.
	assert!(!exchange::is_schema_transport(16003));
	assert!(!exchange::is_schema_transport(16010));
	assert!(!exchange::is_schema_transport(15999));
	assert!(!exchange::is_schema_transport(16384));
}

#[test]
fn stream_filters_transport_messages_and_applies_them() {
	let mut registry = exchange::bootstrap_registry().unwrap();

	let messages = [
		group_decl("Test", "MyType", 100),
		Message::new(QName::parse("Blink:Ref", None)).with("Type", ns_name("Test", "MyType")),
		Message::new(QName::parse("Blink:DynRef", None))
			.with("Type", ns_name("Another", "OtherType")),
	];
	let mut buffer = Vec::new();
	for message in &messages {
		buffer.extend(compact::encode_message(message, registry.registry()).unwrap());
	}

	let decoded = exchange::decode_stream_with_schema_exchange(&buffer, &mut registry, true).unwrap();
	assert_eq!(decoded.len(), 2);
	assert_eq!(decoded[0].type_name.name(), "Ref");
	assert_eq!(decoded[1].type_name.name(), "DynRef");

	let (_, installed) = registry.registry().group_by_id(100).unwrap();
	assert_eq!(installed.name.qualified(), "Test:MyType");
}

#[test]
fn single_frame_decode_reports_transport_as_none() {
	let mut registry = exchange::bootstrap_registry().unwrap();
	let encoded =
		compact::encode_message(&group_decl("Test", "MyType", 100), registry.registry()).unwrap();
	let (message, offset) =
		exchange::decode_with_schema_exchange(&encoded, &mut registry, 0, true).unwrap();
	assert_eq!(message, None);
	assert_eq!(offset, encoded.len());
}

#[test]
fn group_decl_tags_an_existing_group() {
	let mut registry = exchange::ExchangeRegistry::new(
		Registry::from_schema_text("namespace Test\nMyType -> u32 A\n").unwrap(),
	);
	registry
		.apply_group_decl(QName::parse("Test:MyType", None), 42)
		.unwrap();
	let (_, group) = registry.registry().group_by_id(42).unwrap();
	assert_eq!(group.name.qualified(), "Test:MyType");
	assert_eq!(group.fields.len(), 1);
}

#[test]
fn group_decl_conflicting_id_is_rejected() {
	let mut registry = exchange::bootstrap_registry().unwrap();
	registry
		.apply_group_decl(QName::parse("Test:First", None), 100)
		.unwrap();
	// The same binding again is idempotent.
	registry
		.apply_group_decl(QName::parse("Test:First", None), 100)
		.unwrap();
	// Handing the id to a different group is not.
	assert!(registry
		.apply_group_decl(QName::parse("Test:Second", None), 100)
		.is_err());
}

#[test]
fn group_decl_missing_name_is_rejected_in_stream() {
	let mut registry = exchange::bootstrap_registry().unwrap();
	// An Id-only GroupDecl decodes but cannot be applied.
	let message = Message::new(QName::parse("Blink:GroupDecl", None))
		.with("Name", StaticGroupValue::new().with("Name", ""))
		.with("Id", 100u64);
	let encoded = compact::encode_message(&message, registry.registry()).unwrap();
	assert!(exchange::decode_with_schema_exchange(&encoded, &mut registry, 0, true).is_err());
}

#[test]
fn group_def_installs_a_complete_group() {
	let mut registry = exchange::bootstrap_registry().unwrap();

	let fields = Value::Sequence(vec![
		StaticGroupValue::new()
			.with("Name", "Qty")
			.with("Type", Message::new(QName::parse("Blink:U32", None)))
			.with("Optional", false)
			.into(),
		StaticGroupValue::new()
			.with("Name", "Note")
			.with(
				"Type",
				Message::new(QName::parse("Blink:String", None)).with("MaxSize", 32u32),
			)
			.with("Optional", true)
			.into(),
	]);
	let group_def = Message::new(QName::parse("Blink:GroupDef", None))
		.with("Name", ns_name("Test", "Order"))
		.with("Id", 200u64)
		.with("Fields", fields);

	let encoded = compact::encode_message(&group_def, registry.registry()).unwrap();
	let decoded = exchange::decode_stream_with_schema_exchange(&encoded, &mut registry, true).unwrap();
	assert!(decoded.is_empty());

	let (key, order) = registry.registry().group_by_id(200).unwrap();
	assert_eq!(order.name.qualified(), "Test:Order");
	let fields = registry.registry().effective_fields(key);
	assert_eq!(fields.len(), 2);
	assert!(matches!(fields[0].type_ref, TypeRef::Primitive(PrimitiveKind::U32)));
	assert!(!fields[0].optional);
	assert!(matches!(
		fields[1].type_ref,
		TypeRef::Binary(ref b) if b.kind == BinaryKind::String && b.size == Some(32)
	));
	assert!(fields[1].optional);

	// The installed group is immediately usable by the codecs.
	let order = Message::new(QName::parse("Test:Order", None)).with("Qty", 9u32);
	let encoded = compact::encode_message(&order, registry.registry()).unwrap();
	let (round_tripped, _) = compact::decode_message(&encoded, registry.registry(), 0).unwrap();
	assert_eq!(round_tripped, order);
}

#[test]
fn group_def_validates_super_and_id_uniqueness() {
	let mut registry = exchange::bootstrap_registry().unwrap();

	let missing_super = Message::new(QName::parse("Blink:GroupDef", None))
		.with("Name", ns_name("Test", "Order"))
		.with("Super", ns_name("Test", "Missing"));
	let encoded = compact::encode_message(&missing_super, registry.registry()).unwrap();
	assert!(exchange::decode_with_schema_exchange(&encoded, &mut registry, 0, true).is_err());

	// 16000 belongs to GroupDecl.
	let stolen_id = Message::new(QName::parse("Blink:GroupDef", None))
		.with("Name", ns_name("Test", "Order"))
		.with("Id", 16000u64);
	let encoded = compact::encode_message(&stolen_id, registry.registry()).unwrap();
	assert!(exchange::decode_with_schema_exchange(&encoded, &mut registry, 0, true).is_err());
}

#[test]
fn define_registers_an_alias_for_later_refs() {
	let mut registry = exchange::bootstrap_registry().unwrap();

	let define = Message::new(QName::parse("Blink:Define", None))
		.with("Name", ns_name("Test", "Price"))
		.with("Type", Message::new(QName::parse("Blink:Decimal", None)));
	let group_def = Message::new(QName::parse("Blink:GroupDef", None))
		.with("Name", ns_name("Test", "Quote"))
		.with("Id", 300u64)
		.with(
			"Fields",
			Value::Sequence(vec![StaticGroupValue::new()
				.with("Name", "Px")
				.with(
					"Type",
					Message::new(QName::parse("Blink:Ref", None))
						.with("Type", ns_name("Test", "Price")),
				)
				.with("Optional", false)
				.into()]),
		);

	let mut buffer = compact::encode_message(&define, registry.registry()).unwrap();
	buffer.extend(compact::encode_message(&group_def, registry.registry()).unwrap());
	let decoded = exchange::decode_stream_with_schema_exchange(&buffer, &mut registry, true).unwrap();
	assert!(decoded.is_empty());

	let (key, _) = registry.registry().group_by_id(300).unwrap();
	let fields = registry.registry().effective_fields(key);
	assert!(matches!(fields[0].type_ref, TypeRef::Primitive(PrimitiveKind::Decimal)));
}

#[test]
fn encode_schema_transport_message_rejects_application_ids() {
	let registry = exchange::bootstrap_registry().unwrap();
	let transport = group_decl("Test", "MyType", 100);
	assert!(exchange::encode_schema_transport_message(&transport, registry.registry()).is_ok());

	let application =
		Message::new(QName::parse("Blink:Ref", None)).with("Type", ns_name("Test", "MyType"));
	assert!(exchange::encode_schema_transport_message(&application, registry.registry()).is_err());
}

#[test]
fn lax_mode_skips_unknown_frames() {
	let mut registry = exchange::bootstrap_registry().unwrap();
	let mut buffer = compact::encode_frame(4242, &[0x80]);
	buffer.extend(
		compact::encode_message(
			&Message::new(QName::parse("Blink:Ref", None)).with("Type", ns_name("A", "B")),
			registry.registry(),
		)
		.unwrap(),
	);
	assert!(exchange::decode_stream_with_schema_exchange(&buffer, &mut registry, true).is_err());
	let decoded = exchange::decode_stream_with_schema_exchange(&buffer, &mut registry, false).unwrap();
	assert_eq!(decoded.len(), 1);
	assert_eq!(decoded[0].type_name.name(), "Ref");
}

#[test]
fn transport_builders_invert_the_apply_path() {
	// Describe a schema's groups as transport messages, replay them into a
	// fresh bootstrap registry, and check the structure arrives intact.
	let source = Registry::from_schema_text(
		"
		namespace Test
		Side = Buy | Sell/5
		Inner -> u32 Id, string Note?
		Order/300 -> Inner Detail, Side Side, u64 Qty, string(16) Tagline?
		",
	)
	.unwrap();
	let schema = source.schema();

	let mut buffer = Vec::new();
	let (side_key, _) = schema.group_by_qualified("Test:Order").unwrap();
	let TypeRef::Enum(side) = &schema.effective_fields(side_key)[1].type_ref else {
		panic!("expected an enum field");
	};
	let mut registry = exchange::bootstrap_registry().unwrap();
	let define = exchange::define_message(
		&QName::parse("Test:Side", None),
		&TypeRef::Enum(side.clone()),
		schema,
	)
	.unwrap();
	buffer.extend(compact::encode_message(&define, registry.registry()).unwrap());
	for name in ["Test:Inner", "Test:Order"] {
		let (key, _) = schema.group_by_qualified(name).unwrap();
		let group_def = exchange::group_def_message(schema, key).unwrap();
		buffer.extend(compact::encode_message(&group_def, registry.registry()).unwrap());
	}

	let replayed =
		exchange::decode_stream_with_schema_exchange(&buffer, &mut registry, true).unwrap();
	assert!(replayed.is_empty());

	let (key, order) = registry.registry().group_by_id(300).unwrap();
	assert_eq!(order.name.qualified(), "Test:Order");
	let fields = registry.registry().effective_fields(key);
	assert!(matches!(fields[0].type_ref, TypeRef::StaticGroup(_)));
	assert!(matches!(fields[1].type_ref, TypeRef::Enum(_)));
	assert!(matches!(fields[2].type_ref, TypeRef::Primitive(PrimitiveKind::U64)));
	assert!(matches!(
		fields[3].type_ref,
		TypeRef::Binary(ref b) if b.kind == BinaryKind::String && b.size == Some(16)
	));

	// The replayed registry can round-trip an actual order.
	let message = Message::new(QName::parse("Test:Order", None))
		.with("Detail", StaticGroupValue::new().with("Id", 1u32))
		.with("Side", Value::Enum("Sell".to_owned()))
		.with("Qty", 10u64);
	let encoded = compact::encode_message(&message, registry.registry()).unwrap();
	let (decoded, _) = compact::decode_message(&encoded, registry.registry(), 0).unwrap();
	assert_eq!(decoded, message);
}

#[test]
fn group_decl_builder_matches_the_hand_built_form() {
	let built = exchange::group_decl_message(&QName::parse("Test:MyType", None), 100);
	assert_eq!(built, group_decl("Test", "MyType", 100));
	let registry = exchange::bootstrap_registry().unwrap();
	assert!(exchange::encode_schema_transport_message(&built, registry.registry()).is_ok());
}

#[test]
fn reserved_description_types_decode_normally() {
	let mut registry = exchange::bootstrap_registry().unwrap();
	let message = Message::new(QName::parse("Blink:Fixed", None)).with("Size", 16u32);
	let encoded = compact::encode_message(&message, registry.registry()).unwrap();
	let (decoded, _) = exchange::decode_with_schema_exchange(&encoded, &mut registry, 0, true).unwrap();
	assert_eq!(decoded, Some(message));
}
