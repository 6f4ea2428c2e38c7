use {
	blink_codec::{xml, DecimalValue, Message, QName, Registry, StaticGroupValue, Value},
	pretty_assertions::assert_eq,
};

fn registry(text: &str) -> Registry {
	Registry::from_schema_text(text).unwrap()
}

fn demo_registry() -> Registry {
	registry(
		"
		namespace Demo

		Payload/1 -> binary Data
		Ext/2 -> string Info
		Envelope/3 -> string Body
		",
	)
}

#[test]
fn extension_element_uses_the_reserved_namespace() {
	let registry = demo_registry();
	let message = Message::new(QName::parse("Demo:Envelope", None))
		.with("Body", "Hello")
		.with_extension(Message::new(QName::parse("Demo:Ext", None)).with("Info", "x"));
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(encoded.contains("http://blinkprotocol.org/ns/blink"), "{encoded}");
	let decoded = xml::decode_xml(&encoded, &registry).unwrap();
	assert_eq!(decoded, message);
	assert_eq!(decoded.extensions[0].get("Info"), Some(&Value::String("x".to_owned())));
}

#[test]
fn streams_wrap_in_a_root_element() {
	let registry = demo_registry();
	let messages = vec![
		Message::new(QName::parse("Demo:Envelope", None)).with("Body", "a"),
		Message::new(QName::parse("Demo:Envelope", None)).with("Body", "b"),
	];
	let encoded = xml::encode_xml_stream(&messages, &registry).unwrap();
	assert!(encoded.trim_start().starts_with("<root"), "{encoded}");
	assert_eq!(xml::decode_xml_stream(&encoded, &registry).unwrap(), messages);
}

#[test]
fn message_element_lives_in_the_schema_namespace() {
	let registry = demo_registry();
	let message = Message::new(QName::parse("Demo:Envelope", None)).with("Body", "Hello");
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(encoded.contains("xmlns:ns0=\"Demo\""), "{encoded}");
	assert!(encoded.contains("<ns0:Envelope"), "{encoded}");
	// Field elements carry no namespace prefix.
	assert!(encoded.contains("<Body>Hello</Body>"), "{encoded}");
	assert_eq!(xml::decode_xml(&encoded, &registry).unwrap(), message);
}

#[test]
fn binary_valid_utf8_is_element_text() {
	let registry = demo_registry();
	let message =
		Message::new(QName::parse("Demo:Payload", None)).with("Data", "\u{e4}".as_bytes());
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(encoded.contains("<Data>\u{e4}</Data>"), "{encoded}");
	assert_eq!(xml::decode_xml(&encoded, &registry).unwrap(), message);
}

#[test]
fn binary_that_is_not_utf8_gets_the_binary_attribute() {
	let registry = demo_registry();
	let message =
		Message::new(QName::parse("Demo:Payload", None)).with("Data", &b"\xff\x00\x10"[..]);
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(encoded.contains("binary=\"yes\""), "{encoded}");
	assert!(encoded.contains("ff0010"), "{encoded}");
	assert_eq!(xml::decode_xml(&encoded, &registry).unwrap(), message);
}

#[test]
fn control_bytes_fall_back_to_hex_without_the_attribute() {
	let registry = demo_registry();
	let message =
		Message::new(QName::parse("Demo:Payload", None)).with("Data", &b"\x01\x02\x03"[..]);
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(!encoded.contains("binary="), "{encoded}");
	assert!(encoded.contains("<Data>010203</Data>"), "{encoded}");
	assert_eq!(xml::decode_xml(&encoded, &registry).unwrap(), message);
}

#[test]
fn sequences_use_item_children() {
	let registry = registry("namespace Demo\nList/1 -> u32 [] items\n");
	let message = Message::new(QName::parse("Demo:List", None))
		.with("items", Value::seq([1u32, 2, 3]));
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(encoded.contains("<items><item>1</item><item>2</item><item>3</item></items>"), "{encoded}");
	assert_eq!(xml::decode_xml(&encoded, &registry).unwrap(), message);
}

#[test]
fn static_groups_inline_their_sub_elements() {
	let registry = registry(
		"
		namespace Demo
		Point -> u32 X, u32 Y
		Rect/1 -> Point Pos, u32 Width
		",
	);
	let message = Message::new(QName::parse("Demo:Rect", None))
		.with("Pos", StaticGroupValue::new().with("X", 3u32).with("Y", 4u32))
		.with("Width", 10u32);
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(encoded.contains("<Pos><X>3</X><Y>4</Y></Pos>"), "{encoded}");
	assert_eq!(xml::decode_xml(&encoded, &registry).unwrap(), message);
}

#[test]
fn static_group_sequence_items_inline_their_fields() {
	let registry = registry(
		"
		namespace Demo
		Point -> u32 X, u32 Y
		Path/1 -> Point [] Points
		",
	);
	let message = Message::new(QName::parse("Demo:Path", None)).with(
		"Points",
		Value::Sequence(vec![
			StaticGroupValue::new().with("X", 1u32).with("Y", 2u32).into(),
			StaticGroupValue::new().with("X", 3u32).with("Y", 4u32).into(),
		]),
	);
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(encoded.contains("<item><X>1</X><Y>2</Y></item>"), "{encoded}");
	assert_eq!(xml::decode_xml(&encoded, &registry).unwrap(), message);
}

#[test]
fn dynamic_groups_nest_an_element_bearing_the_type() {
	let registry = registry(
		"
		namespace Demo
		Base/1 -> string name
		Derived/2 : Base -> u32 value
		Container/3 -> Base* payload
		",
	);
	let message = Message::new(QName::parse("Demo:Container", None)).with(
		"payload",
		Message::new(QName::parse("Demo:Derived", None))
			.with("name", "t")
			.with("value", 42u32),
	);
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(encoded.contains("<payload><ns0:Derived"), "{encoded}");
	let decoded = xml::decode_xml(&encoded, &registry).unwrap();
	assert_eq!(decoded, message);
	let payload = decoded.get("payload").and_then(Value::as_message).unwrap();
	assert_eq!(payload.type_name.name(), "Derived");
}

#[test]
fn scalars_round_trip() {
	let registry = registry(
		"
		namespace Demo
		Side = Buy | Sell
		All/1 -> bool flag, decimal px, f64 rate, i64 qty, Side side
		",
	);
	let message = Message::new(QName::parse("Demo:All", None))
		.with("flag", true)
		.with("px", DecimalValue::new(-2, 15005))
		.with("rate", 0.5)
		.with("qty", -17i64)
		.with("side", Value::Enum("Buy".to_owned()));
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(encoded.contains("<flag>true</flag>"), "{encoded}");
	assert!(encoded.contains("<px>15005e-2</px>"), "{encoded}");
	assert_eq!(xml::decode_xml(&encoded, &registry).unwrap(), message);
}

#[test]
fn markup_characters_in_text_escape() {
	let registry = demo_registry();
	let message = Message::new(QName::parse("Demo:Envelope", None))
		.with("Body", "a < b & c > d");
	let encoded = xml::encode_xml(&message, &registry).unwrap();
	assert!(encoded.contains("&lt;"), "{encoded}");
	assert_eq!(xml::decode_xml(&encoded, &registry).unwrap(), message);
}

#[test]
fn malformed_documents_fail() {
	let registry = demo_registry();
	assert!(xml::decode_xml("<open>", &registry).is_err());
	assert!(xml::decode_xml("", &registry).is_err());
}

#[test]
fn unknown_element_fails() {
	let registry = demo_registry();
	assert!(xml::decode_xml("<ns0:Nope xmlns:ns0=\"Demo\"/>", &registry).is_err());
}
