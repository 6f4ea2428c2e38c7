use {
	blink_codec::{
		compile_schema,
		schema::{BinaryKind, PrimitiveKind, TypeRef},
		QName, Schema,
	},
	pretty_assertions::assert_eq,
};

#[test]
fn hello_world_schema() {
	let schema: Schema = "
	namespace Demo

	Hello/1 -> string Greeting
	"
	.parse()
	.unwrap();

	assert_eq!(schema.namespace(), Some("Demo"));
	let (key, hello) = schema.group_by_qualified("Demo:Hello").unwrap();
	assert_eq!(hello.type_id, Some(1));
	let fields = schema.effective_fields(key);
	assert_eq!(fields.len(), 1);
	assert_eq!(fields[0].name, "Greeting");
	assert!(matches!(
		fields[0].type_ref,
		TypeRef::Binary(ref binary) if binary.kind == BinaryKind::String && binary.size.is_none()
	));
	let (by_id_key, _) = schema.group_by_id(1).unwrap();
	assert_eq!(by_id_key, key);
}

#[test]
fn inheritance_builds_super_first_field_order() {
	let schema = compile_schema(
		"
		namespace Acme

		Color = RED/1 | GREEN/2

		StaticInfo -> string manufacturer
		Base/1 -> u32 id, Color color
		Order/2 : Base -> string [] notes?, StaticInfo extra
		",
	)
	.unwrap();

	let (key, order) = schema.group_by_qualified("Acme:Order").unwrap();
	let (base_key, _) = schema.group_by_qualified("Acme:Base").unwrap();
	assert_eq!(order.super_group, Some(base_key));

	let names: Vec<&str> = schema
		.effective_fields(key)
		.iter()
		.map(|field| field.name.as_str())
		.collect();
	assert_eq!(names, ["id", "color", "notes", "extra"]);

	let fields = schema.effective_fields(key);
	assert!(matches!(fields[1].type_ref, TypeRef::Enum(_)));
	assert!(fields[2].optional);
	assert!(matches!(fields[2].type_ref, TypeRef::Sequence(_)));
	assert!(matches!(fields[3].type_ref, TypeRef::StaticGroup(_)));

	let (by_id, _) = schema.group_by_id(2).unwrap();
	assert_eq!(by_id, key);
}

#[test]
fn enum_symbols_get_implicit_and_explicit_values() {
	let schema = compile_schema(
		"
		namespace Demo
		Side = Buy | Sell | Short/10 | Cover
		Holder/1 -> Side side
		",
	)
	.unwrap();
	let (key, _) = schema.group_by_qualified("Demo:Holder").unwrap();
	let TypeRef::Enum(side) = &schema.effective_fields(key)[0].type_ref else {
		panic!("expected an enum field");
	};
	assert_eq!(side.value_of("Buy"), Some(0));
	assert_eq!(side.value_of("Sell"), Some(1));
	assert_eq!(side.value_of("Short"), Some(10));
	assert_eq!(side.value_of("Cover"), Some(11));
	assert_eq!(side.symbol_of(10), Some("Short"));
}

#[test]
fn type_aliases_collapse_transparently() {
	let schema = compile_schema(
		"
		namespace Test
		Price = decimal
		Quote/1 -> Price px
		",
	)
	.unwrap();
	let (key, _) = schema.group_by_qualified("Test:Quote").unwrap();
	assert!(matches!(
		schema.effective_fields(key)[0].type_ref,
		TypeRef::Primitive(PrimitiveKind::Decimal)
	));
}

#[test]
fn dynamic_reference_and_object() {
	let schema = compile_schema(
		"
		namespace Demo
		Shape
		Rect/7 : Shape -> u32 Wdt, u32 Hgt
		Canvas/9 -> Shape* [] Shapes, object Extra?
		",
	)
	.unwrap();
	let (key, _) = schema.group_by_qualified("Demo:Canvas").unwrap();
	let fields = schema.effective_fields(key);
	let TypeRef::Sequence(element) = &fields[0].type_ref else {
		panic!("expected a sequence field");
	};
	assert!(matches!(**element, TypeRef::DynamicGroup(_)));
	assert!(matches!(fields[1].type_ref, TypeRef::Object));
}

#[test]
fn sized_binary_types_parse_with_spaces() {
	let schema = compile_schema(
		"
		namespace Demo
		Rec/1 -> string (12) Name, fixed (4) Addr, binary(64) Blob?
		",
	)
	.unwrap();
	let (key, _) = schema.group_by_qualified("Demo:Rec").unwrap();
	let fields = schema.effective_fields(key);
	assert!(matches!(
		fields[0].type_ref,
		TypeRef::Binary(ref b) if b.kind == BinaryKind::String && b.size == Some(12)
	));
	assert!(matches!(
		fields[1].type_ref,
		TypeRef::Binary(ref b) if b.kind == BinaryKind::Fixed && b.size == Some(4)
	));
	assert!(matches!(
		fields[2].type_ref,
		TypeRef::Binary(ref b) if b.kind == BinaryKind::Binary && b.size == Some(64)
	));
}

#[test]
fn annotations_merge_inline_and_incremental() {
	let schema = compile_schema(
		r#"
		namespace Acme

		schema <- @doc="top"

		@doc="orders" Order/1 -> @doc="primary" u32 id, string note

		Order.note <- @doc="free text"
		Order <- @doc="orders v2"
		"#,
	)
	.unwrap();

	assert_eq!(
		schema.annotations().get(&QName::new(Some("Acme"), "doc")),
		Some(&"top".to_owned())
	);

	let (key, order) = schema.group_by_qualified("Acme:Order").unwrap();
	// The later incremental chain overrides the inline annotation.
	assert_eq!(
		order.annotations.get(&QName::new(Some("Acme"), "doc")),
		Some(&"orders v2".to_owned())
	);
	let fields = schema.effective_fields(key);
	assert_eq!(
		fields[0].annotations.get(&QName::new(Some("Acme"), "doc")),
		Some(&"primary".to_owned())
	);
	assert_eq!(
		fields[1].annotations.get(&QName::new(Some("Acme"), "doc")),
		Some(&"free text".to_owned())
	);
}

#[test]
fn field_ids_become_blink_id_annotations() {
	let schema = compile_schema(
		"
		namespace Demo
		Msg/1 -> u32 Amount/3
		",
	)
	.unwrap();
	let (key, _) = schema.group_by_qualified("Demo:Msg").unwrap();
	assert_eq!(
		schema.effective_fields(key)[0]
			.annotations
			.get(&QName::new(Some("blink"), "id")),
		Some(&"3".to_owned())
	);
}

#[test]
fn hex_type_ids_and_escaped_identifiers() {
	let schema = compile_schema(
		"
		namespace Demo
		Msg/0x10 -> u8 \\type
		",
	)
	.unwrap();
	let (key, msg) = schema.group_by_qualified("Demo:Msg").unwrap();
	assert_eq!(msg.type_id, Some(16));
	assert_eq!(schema.effective_fields(key)[0].name, "type");
}

#[test]
fn comments_and_blank_lines_are_ignored() {
	let schema = compile_schema(
		"
		# leading comment
		namespace Demo

		Msg/1 -> u32 A # trailing comment
		",
	)
	.unwrap();
	assert!(schema.group_by_qualified("Demo:Msg").is_some());
}

#[test]
fn duplicate_namespace_is_rejected() {
	assert!(compile_schema("namespace A\nnamespace B\n").is_err());
}

#[test]
fn duplicate_definitions_are_rejected() {
	assert!(compile_schema(
		"
		namespace Demo
		Msg/1 -> u32 A
		Msg/2 -> u32 B
		"
	)
	.is_err());
}

#[test]
fn duplicate_type_ids_are_rejected() {
	assert!(compile_schema(
		"
		namespace Demo
		A/1 -> u32 X
		B/1 -> u32 Y
		"
	)
	.is_err());
}

#[test]
fn unknown_reference_is_rejected() {
	assert!(compile_schema(
		"
		namespace Demo
		Holder/1 -> Missing value
		"
	)
	.is_err());
}

#[test]
fn inheritance_cycles_are_rejected() {
	assert!(compile_schema(
		"
		namespace Demo
		A/1 : B -> u32 X
		B/2 : A -> u32 Y
		"
	)
	.is_err());
}

#[test]
fn alias_cycles_are_rejected() {
	assert!(compile_schema(
		"
		namespace Demo
		A = B
		B = A
		Holder/1 -> A value
		"
	)
	.is_err());
}

#[test]
fn nested_sequences_are_rejected() {
	assert!(compile_schema(
		"
		namespace Demo
		Bad/1 -> u8 [] [] invalid
		"
	)
	.is_err());
	// Nesting through an alias is caught after the alias collapses.
	assert!(compile_schema(
		"
		namespace Demo
		Items = u8 []
		Bad/1 -> Items [] invalid
		"
	)
	.is_err());
}

#[test]
fn self_containing_static_group_is_rejected() {
	assert!(compile_schema(
		"
		namespace Demo
		Node/1 -> u32 value, Node next
		"
	)
	.is_err());
	// A dynamic self-reference is fine: it nests through a frame.
	assert!(compile_schema(
		"
		namespace Demo
		Node/1 -> u32 value, Node* next?
		"
	)
	.is_ok());
}

#[test]
fn fixed_requires_a_size() {
	assert!(compile_schema("namespace Demo\nBad/1 -> fixed Addr\n").is_err());
}

#[test]
fn enum_with_group_mode_is_rejected() {
	assert!(compile_schema(
		"
		namespace Demo
		Side = Buy | Sell
		Bad/1 -> Side* side
		"
	)
	.is_err());
}

#[test]
fn lexical_errors_carry_line_numbers() {
	let error = compile_schema("namespace Demo\nBad/1 -> u32 %\n").unwrap_err();
	assert!(error.to_string().contains("line 2"), "{error}");
}

#[test]
fn unterminated_string_is_rejected() {
	assert!(compile_schema("namespace Demo\nschema <- @doc=\"open\n").is_err());
}

#[test]
fn incremental_annotation_on_unknown_component_is_rejected() {
	assert!(compile_schema(
		"
		namespace Demo
		Msg/1 -> u32 A
		Other <- @doc=\"x\"
		"
	)
	.is_err());
	assert!(compile_schema(
		"
		namespace Demo
		Msg/1 -> u32 A
		Msg.missing <- @doc=\"x\"
		"
	)
	.is_err());
}

#[test]
fn string_escapes_in_annotation_values() {
	let schema = compile_schema(
		r#"
		namespace Demo
		Msg/1 -> u32 A
		Msg <- @doc="line1\nline2\x21" "more"
		"#,
	)
	.unwrap();
	let (_, msg) = schema.group_by_qualified("Demo:Msg").unwrap();
	assert_eq!(
		msg.annotations.get(&QName::new(Some("Demo"), "doc")),
		Some(&"line1\nline2!more".to_owned())
	);
}

#[test]
fn qualified_names_parse_and_format() {
	let qname = QName::parse("Demo:Msg", None);
	assert_eq!(qname.namespace(), Some("Demo"));
	assert_eq!(qname.name(), "Msg");
	assert_eq!(qname.to_string(), "Demo:Msg");

	let bare = QName::parse("Msg", Some("Demo"));
	assert_eq!(bare, qname);

	let plain = QName::parse("Msg", None);
	assert_eq!(plain.namespace(), None);
	assert_eq!(plain.qualified(), "Msg");
}
