use {
	blink_codec::{compact, DecimalValue, Message, QName, Registry, StaticGroupValue, Value},
	pretty_assertions::assert_eq,
};

fn registry(text: &str) -> Registry {
	Registry::from_schema_text(text).unwrap()
}

fn round_trip(message: &Message, registry: &Registry) -> Message {
	let encoded = compact::encode_message(message, registry).unwrap();
	let (decoded, offset) = compact::decode_message(&encoded, registry, 0).unwrap();
	assert_eq!(offset, encoded.len());
	decoded
}

#[test]
fn frame_round_trip_accounts_for_every_byte() {
	let payload = [0x01, 0x02, 0x03];
	let encoded = compact::encode_frame(42, &payload);
	let (frame, offset) = compact::decode_frame(&encoded, 0, None, true).unwrap();
	assert_eq!(frame.type_id, 42);
	assert_eq!(frame.payload, payload);
	assert_eq!(offset, encoded.len());
	// The wire length covers the type id and the payload.
	assert_eq!(frame.length + 1, encoded.len());
}

#[test]
fn truncated_frame_fails() {
	let encoded = compact::encode_frame(1, &[0x00]);
	assert!(compact::decode_frame(&encoded[..encoded.len() - 1], 0, None, true).is_err());
}

#[test]
fn unknown_type_id_strict_vs_lax() {
	let registry = registry("namespace Demo\nMsg/1 -> u32 A\n");
	let encoded = compact::encode_frame(999, &[0x80]);
	assert!(compact::decode_frame(&encoded, 0, Some(&registry), true).is_err());
	let (frame, _) = compact::decode_frame(&encoded, 0, Some(&registry), false).unwrap();
	assert_eq!(frame.type_id, 999);
	assert!(frame.group.is_none());
}

#[test]
fn frames_iterate_in_order() {
	let buffer = [compact::encode_frame(1, &[0x01]), compact::encode_frame(2, &[0x02, 0x03])].concat();
	let frames: Vec<_> = compact::frames(&buffer, None, true)
		.collect::<Result<_, _>>()
		.unwrap();
	assert_eq!(frames.len(), 2);
	assert_eq!(frames[0].type_id, 1);
	assert_eq!(frames[1].payload, [0x02, 0x03]);
}

#[test]
fn optional_integer_absent_encodes_as_null() {
	let registry = registry("namespace Demo\nBill/2 -> u32 Amount, u32 Tip?\n");
	let message = Message::new(QName::parse("Demo:Bill", None)).with("Amount", 100u32);
	let encoded = compact::encode_message(&message, &registry).unwrap();
	// Payload is vlc(100) ++ vlc(NULL).
	let (frame, _) = compact::decode_frame(&encoded, 0, None, true).unwrap();
	assert_eq!(frame.payload, [0x64, 0x80, 0xC0]);
	let decoded = round_trip(&message, &registry);
	assert_eq!(decoded.get("Amount"), Some(&Value::U64(100)));
	assert_eq!(decoded.get("Tip"), None);
}

#[test]
fn missing_required_field_fails() {
	let registry = registry("namespace Demo\nBill/2 -> u32 Amount, u32 Tip?\n");
	let message = Message::new(QName::parse("Demo:Bill", None)).with("Tip", 1u32);
	assert!(compact::encode_message(&message, &registry).is_err());
}

#[test]
fn polymorphic_dynamic_group_keeps_its_concrete_type() {
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
	let decoded = round_trip(&message, &registry);
	assert_eq!(decoded, message);
	let payload = decoded.get("payload").and_then(Value::as_message).unwrap();
	assert_eq!(payload.type_name.name(), "Derived");
	assert_eq!(payload.get("name"), Some(&Value::String("t".to_owned())));
	assert_eq!(payload.get("value"), Some(&Value::U64(42)));
}

#[test]
fn optional_fixed_uses_a_presence_byte() {
	let registry = registry("namespace Demo\nToken/1 -> fixed(4) Value?\n");
	let message =
		Message::new(QName::parse("Demo:Token", None)).with("Value", &b"\x01\x02\x03\x04"[..]);
	let encoded = compact::encode_message(&message, &registry).unwrap();
	let (frame, _) = compact::decode_frame(&encoded, 0, None, true).unwrap();
	assert_eq!(frame.payload, [0x01, 0x01, 0x02, 0x03, 0x04]);
	assert_eq!(round_trip(&message, &registry), message);

	let absent = Message::new(QName::parse("Demo:Token", None));
	let encoded = compact::encode_message(&absent, &registry).unwrap();
	let (frame, _) = compact::decode_frame(&encoded, 0, None, true).unwrap();
	assert_eq!(frame.payload, [0xC0]);
	assert_eq!(round_trip(&absent, &registry), absent);
}

#[test]
fn optional_decimal_absent_is_a_single_null() {
	let registry = registry("namespace Demo\nQuote/1 -> decimal Px?, u32 Qty\n");
	let message = Message::new(QName::parse("Demo:Quote", None)).with("Qty", 7u32);
	let encoded = compact::encode_message(&message, &registry).unwrap();
	let (frame, _) = compact::decode_frame(&encoded, 0, None, true).unwrap();
	// One NULL for the whole decimal, then Qty stays aligned.
	assert_eq!(frame.payload, [0xC0, 0x87]);
	assert_eq!(round_trip(&message, &registry), message);
}

#[test]
fn f64_round_trips_via_bit_pattern() {
	let registry = registry("namespace Demo\nQuote/1 -> f64 Price\n");
	for value in [1.5, -0.0, f64::NAN, f64::INFINITY] {
		let message = Message::new(QName::parse("Demo:Quote", None)).with("Price", value);
		let decoded = round_trip(&message, &registry);
		let Some(&Value::F64(out)) = decoded.get("Price") else {
			panic!("expected an f64 value");
		};
		assert_eq!(out.to_bits(), value.to_bits());
	}
}

#[test]
fn bool_and_enum_fields() {
	let registry = registry(
		"
		namespace Demo
		Side = Buy | Sell/5
		Msg/1 -> bool Flag, Side Side
		",
	);
	let message = Message::new(QName::parse("Demo:Msg", None))
		.with("Flag", true)
		.with("Side", Value::Enum("Sell".to_owned()));
	let decoded = round_trip(&message, &registry);
	assert_eq!(decoded.get("Flag"), Some(&Value::Bool(true)));
	assert_eq!(decoded.get("Side"), Some(&Value::Enum("Sell".to_owned())));
}

#[test]
fn static_groups_inline_their_fields() {
	let registry = registry(
		"
		namespace Demo
		Point -> u32 X, u32 Y
		Rect/5 -> Point Pos, Point Corner?, u32 Width
		",
	);
	let message = Message::new(QName::parse("Demo:Rect", None))
		.with("Pos", StaticGroupValue::new().with("X", 3u32).with("Y", 4u32))
		.with("Width", 10u32);
	let decoded = round_trip(&message, &registry);
	assert_eq!(decoded, message);
	let pos = decoded.get("Pos").and_then(Value::as_group).unwrap();
	assert_eq!(pos.get("X"), Some(&Value::U64(3)));
	// The absent optional static group decodes as absent.
	assert_eq!(decoded.get("Corner"), None);
}

#[test]
fn sequences_and_null_sequences() {
	let registry = registry("namespace Demo\nList/1 -> u32 [] items, i64 [] deltas?\n");
	let message =
		Message::new(QName::parse("Demo:List", None)).with("items", Value::seq([1u32, 2, 3]));
	let decoded = round_trip(&message, &registry);
	assert_eq!(
		decoded.get("items"),
		Some(&Value::Sequence(vec![Value::U64(1), Value::U64(2), Value::U64(3)]))
	);
	assert_eq!(decoded.get("deltas"), None);

	let empty = Message::new(QName::parse("Demo:List", None)).with("items", Value::seq::<u32>([]));
	assert_eq!(
		round_trip(&empty, &registry).get("items"),
		Some(&Value::Sequence(Vec::new()))
	);
}

#[test]
fn extensions_round_trip_in_order() {
	let registry = registry(
		"
		namespace Demo
		Mail/1 -> string Subject
		Trace/2 -> string Hop
		",
	);
	let message = Message::new(QName::parse("Demo:Mail", None))
		.with("Subject", "Hello")
		.with_extension(Message::new(QName::parse("Demo:Trace", None)).with("Hop", "local.eg.org"))
		.with_extension(Message::new(QName::parse("Demo:Trace", None)).with("Hop", "mail.eg.org"));
	let decoded = round_trip(&message, &registry);
	assert_eq!(decoded.extensions.len(), 2);
	assert_eq!(
		decoded.extensions[0].get("Hop"),
		Some(&Value::String("local.eg.org".to_owned()))
	);
	assert_eq!(
		decoded.extensions[1].get("Hop"),
		Some(&Value::String("mail.eg.org".to_owned()))
	);
}

#[test]
fn object_fields_carry_any_identified_group() {
	let registry = registry(
		"
		namespace Demo
		Inner/1 -> u32 Id
		Holder/2 -> object Payload
		",
	);
	let message = Message::new(QName::parse("Demo:Holder", None))
		.with("Payload", Message::new(QName::parse("Demo:Inner", None)).with("Id", 9u32));
	assert_eq!(round_trip(&message, &registry), message);

	// An object cannot carry a non-message value.
	let bad = Message::new(QName::parse("Demo:Holder", None)).with("Payload", 1u32);
	assert!(compact::encode_message(&bad, &registry).is_err());
}

#[test]
fn group_without_type_id_cannot_frame() {
	let registry = registry("namespace Demo\nAnon -> u32 A\n");
	let message = Message::new(QName::parse("Demo:Anon", None)).with("A", 1u32);
	assert!(compact::encode_message(&message, &registry).is_err());
}

#[test]
fn decode_stream_returns_messages_in_order() {
	let registry = registry("namespace Demo\nItem/1 -> u32 id\n");
	let mut buffer = Vec::new();
	for id in [1u32, 2, 3] {
		let message = Message::new(QName::parse("Demo:Item", None)).with("id", id);
		buffer.extend(compact::encode_message(&message, &registry).unwrap());
	}
	let messages = compact::decode_stream(&buffer, &registry).unwrap();
	let ids: Vec<_> = messages
		.iter()
		.map(|message| message.get("id").cloned().unwrap())
		.collect();
	assert_eq!(ids, [Value::U64(1), Value::U64(2), Value::U64(3)]);
}

#[test]
fn dynamic_sequences_dispatch_per_element() {
	let registry = registry(
		"
		namespace Demo
		Shape
		Rect/7 : Shape -> u32 Wdt, u32 Hgt
		Circle/8 : Shape -> u32 Rad
		Canvas/9 -> Shape* [] Shapes
		",
	);
	let message = Message::new(QName::parse("Demo:Canvas", None)).with(
		"Shapes",
		Value::Sequence(vec![
			Message::new(QName::parse("Demo:Rect", None))
				.with("Wdt", 2u32)
				.with("Hgt", 3u32)
				.into(),
			Message::new(QName::parse("Demo:Circle", None)).with("Rad", 3u32).into(),
		]),
	);
	let decoded = round_trip(&message, &registry);
	assert_eq!(decoded, message);
	let shapes = decoded.get("Shapes").and_then(Value::as_sequence).unwrap();
	assert_eq!(shapes[0].as_message().unwrap().type_name.name(), "Rect");
	assert_eq!(shapes[1].as_message().unwrap().type_name.name(), "Circle");
}

#[test]
fn signed_and_unsigned_extremes_round_trip() {
	let registry = registry("namespace Demo\nN/1 -> u64 big, i64 small, date d, millitime t\n");
	let message = Message::new(QName::parse("Demo:N", None))
		.with("big", u64::MAX)
		.with("small", i64::MIN)
		.with("d", -3i32)
		.with("t", 1234567890123i64);
	let decoded = round_trip(&message, &registry);
	assert_eq!(decoded.get("big"), Some(&Value::U64(u64::MAX)));
	assert_eq!(decoded.get("small"), Some(&Value::I64(i64::MIN)));
	assert_eq!(decoded.get("d"), Some(&Value::I64(-3)));
	assert_eq!(decoded.get("t"), Some(&Value::I64(1234567890123)));
}

#[test]
fn decimal_round_trips_exactly() {
	let registry = registry("namespace Demo\nPx/1 -> decimal amount\n");
	let message = Message::new(QName::parse("Demo:Px", None))
		.with("amount", DecimalValue::new(-2, 15005));
	let decoded = round_trip(&message, &registry);
	assert_eq!(decoded.get("amount"), Some(&Value::Decimal(DecimalValue::new(-2, 15005))));
}
