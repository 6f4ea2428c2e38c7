//! XML mapping: element-per-field documents
//!
//! A message maps to an element named after the group's local name, placed
//! in the XML namespace equal to the Blink schema namespace. Fields are
//! child elements; static groups inline their sub-elements, dynamic groups
//! and objects nest one more element bearing the actual type, sequences
//! wrap their elements in `<item>` children. Extensions live under a
//! single `<blink:extension>` child in the reserved namespace. A stream
//! wraps its messages in one `<root>` element.
//!
//! ```
//! use blink_codec::{xml, Message, QName, Registry};
//!
//! let registry = Registry::from_schema_text(
//! 	"
//! 	namespace Demo
//! 	Envelope/3 -> string Body
//! 	",
//! )
//! .unwrap();
//!
//! let message = Message::new(QName::parse("Demo:Envelope", None)).with("Body", "Hello");
//! let encoded = xml::encode_xml(&message, &registry).unwrap();
//! assert_eq!(
//! 	encoded,
//! 	"<ns0:Envelope xmlns:ns0=\"Demo\"><Body>Hello</Body></ns0:Envelope>"
//! );
//! assert_eq!(xml::decode_xml(&encoded, &registry).unwrap(), message);
//! ```

use {
	crate::{
		error::{DecodeError, EncodeError},
		registry::Registry,
		schema::{BinaryKind, BinaryType, GroupKey, PrimitiveKind, QName, TypeRef},
		value::{DecimalValue, Fields, Message, StaticGroupValue, Value},
	},
	quick_xml::events::{BytesEnd, BytesStart, BytesText, Event},
	std::collections::HashMap,
};

/// The reserved namespace of the extension container element
pub const BLINK_NAMESPACE: &str = "http://blinkprotocol.org/ns/blink";

/// Encode a message as an XML document (one root element)
pub fn encode_xml(message: &Message, registry: &Registry) -> Result<String, EncodeError> {
	let mut writer = quick_xml::Writer::new(Vec::new());
	write_message(&mut writer, message, registry)?;
	String::from_utf8(writer.into_inner())
		.map_err(|_| EncodeError::new("XML writer produced invalid UTF-8"))
}

/// Encode messages inside a single `<root>` wrapper element
pub fn encode_xml_stream(messages: &[Message], registry: &Registry) -> Result<String, EncodeError> {
	let mut writer = quick_xml::Writer::new(Vec::new());
	writer
		.write_event(Event::Start(BytesStart::new("root")))
		.map_err(EncodeError::display)?;
	for message in messages {
		write_message(&mut writer, message, registry)?;
	}
	writer
		.write_event(Event::End(BytesEnd::new("root")))
		.map_err(EncodeError::display)?;
	String::from_utf8(writer.into_inner())
		.map_err(|_| EncodeError::new("XML writer produced invalid UTF-8"))
}

/// Decode a message from an XML document
pub fn decode_xml(text: &str, registry: &Registry) -> Result<Message, DecodeError> {
	let root = parse_tree(text)?;
	parse_message(&root, &HashMap::new(), None, registry)
}

/// Decode a stream: either a `<root>`-wrapped document or a single message
pub fn decode_xml_stream(text: &str, registry: &Registry) -> Result<Vec<Message>, DecodeError> {
	let root = parse_tree(text)?;
	if root.local_name() == "root" && root.prefix().is_none() {
		let bindings = root.namespace_bindings(&HashMap::new());
		root.children
			.iter()
			.map(|child| parse_message(child, &bindings, None, registry))
			.collect()
	} else {
		Ok(vec![parse_message(&root, &HashMap::new(), None, registry)?])
	}
}

type Writer = quick_xml::Writer<Vec<u8>>;

fn write_message(writer: &mut Writer, message: &Message, registry: &Registry) -> Result<(), EncodeError> {
	let (key, group) = registry
		.group_by_name(&message.type_name)
		.map_err(EncodeError::display)?;
	let (tag, namespace) = match group.name.namespace() {
		Some(namespace) => (format!("ns0:{}", group.name.name()), Some(namespace.to_owned())),
		None => (group.name.name().to_owned(), None),
	};
	let mut start = BytesStart::new(tag.clone());
	if let Some(namespace) = &namespace {
		start.push_attribute(("xmlns:ns0", namespace.as_str()));
	}
	writer.write_event(Event::Start(start)).map_err(EncodeError::display)?;

	for field in registry.effective_fields(key) {
		let Some(value) = message.fields.get(&field.name) else {
			continue;
		};
		write_field(writer, &field.name, value, &field.type_ref, registry)?;
	}

	if !message.extensions.is_empty() {
		let mut ext = BytesStart::new("blink:extension");
		ext.push_attribute(("xmlns:blink", BLINK_NAMESPACE));
		writer.write_event(Event::Start(ext)).map_err(EncodeError::display)?;
		for extension in &message.extensions {
			write_message(writer, extension, registry)?;
		}
		writer
			.write_event(Event::End(BytesEnd::new("blink:extension")))
			.map_err(EncodeError::display)?;
	}

	writer
		.write_event(Event::End(BytesEnd::new(tag)))
		.map_err(EncodeError::display)?;
	Ok(())
}

fn write_field(
	writer: &mut Writer,
	name: &str,
	value: &Value,
	type_ref: &TypeRef,
	registry: &Registry,
) -> Result<(), EncodeError> {
	match type_ref {
		TypeRef::Sequence(element) => {
			let items = value
				.as_sequence()
				.ok_or_else(|| EncodeError::new("Sequence fields expect a sequence value"))?;
			writer
				.write_event(Event::Start(BytesStart::new(name)))
				.map_err(EncodeError::display)?;
			for item in items {
				writer
					.write_event(Event::Start(BytesStart::new("item")))
					.map_err(EncodeError::display)?;
				write_value(writer, item, element, registry)?;
				writer
					.write_event(Event::End(BytesEnd::new("item")))
					.map_err(EncodeError::display)?;
			}
			writer
				.write_event(Event::End(BytesEnd::new(name)))
				.map_err(EncodeError::display)?;
			Ok(())
		}
		TypeRef::StaticGroup(_) | TypeRef::DynamicGroup(_) | TypeRef::Object => {
			writer
				.write_event(Event::Start(BytesStart::new(name)))
				.map_err(EncodeError::display)?;
			write_value(writer, value, type_ref, registry)?;
			writer
				.write_event(Event::End(BytesEnd::new(name)))
				.map_err(EncodeError::display)?;
			Ok(())
		}
		_ => {
			let mut start = BytesStart::new(name);
			let text = simple_text(value, type_ref)?;
			if let TypeRef::Binary(binary) = type_ref {
				if binary.kind != BinaryKind::String {
					let bytes = value
						.as_bytes()
						.ok_or_else(|| EncodeError::new("binary fields expect a bytes value"))?;
					if std::str::from_utf8(bytes).is_err() {
						start.push_attribute(("binary", "yes"));
					}
				}
			}
			writer.write_event(Event::Start(start)).map_err(EncodeError::display)?;
			writer
				.write_event(Event::Text(BytesText::new(&text)))
				.map_err(EncodeError::display)?;
			writer
				.write_event(Event::End(BytesEnd::new(name)))
				.map_err(EncodeError::display)?;
			Ok(())
		}
	}
}

/// Write the *content* of a value positioned inside an already-open
/// element (an `<item>` or a field element)
fn write_value(
	writer: &mut Writer,
	value: &Value,
	type_ref: &TypeRef,
	registry: &Registry,
) -> Result<(), EncodeError> {
	match type_ref {
		TypeRef::StaticGroup(key) => {
			let group_value = value
				.as_group()
				.ok_or_else(|| EncodeError::new("Static group fields expect a group value"))?;
			for field in registry.effective_fields(*key) {
				let Some(value) = group_value.fields.get(&field.name) else {
					continue;
				};
				write_field(writer, &field.name, value, &field.type_ref, registry)?;
			}
			Ok(())
		}
		TypeRef::DynamicGroup(_) | TypeRef::Object => {
			let message = value.as_message().ok_or_else(|| {
				EncodeError::new("Dynamic group and object fields expect a message value")
			})?;
			write_message(writer, message, registry)
		}
		TypeRef::Sequence(_) => Err(EncodeError::new("Sequences cannot nest in the XML mapping")),
		_ => {
			let text = simple_text(value, type_ref)?;
			writer
				.write_event(Event::Text(BytesText::new(&text)))
				.map_err(EncodeError::display)
		}
	}
}

fn simple_text(value: &Value, type_ref: &TypeRef) -> Result<String, EncodeError> {
	match type_ref {
		TypeRef::Primitive(kind) => match kind {
			PrimitiveKind::Bool => {
				let value = value
					.as_bool()
					.ok_or_else(|| EncodeError::new("bool fields expect a boolean value"))?;
				Ok(if value { "true" } else { "false" }.to_owned())
			}
			PrimitiveKind::Decimal => {
				let DecimalValue { exponent, mantissa } = value
					.as_decimal()
					.ok_or_else(|| EncodeError::new("decimal fields expect a decimal value"))?;
				Ok(format!("{mantissa}e{exponent}"))
			}
			PrimitiveKind::F64 => {
				let value = value
					.as_f64()
					.ok_or_else(|| EncodeError::new("f64 fields expect a float value"))?;
				Ok(crate::tag::float_token(value))
			}
			_ if kind.is_signed() => value.as_i64().map(|v| v.to_string()).ok_or_else(|| {
				EncodeError::msg(format_args!("{} fields expect an integer value", kind.keyword()))
			}),
			_ => value.as_u64().map(|v| v.to_string()).ok_or_else(|| {
				EncodeError::msg(format_args!(
					"{} fields expect a non-negative integer value",
					kind.keyword()
				))
			}),
		},
		TypeRef::Binary(binary) => binary_text(value, binary),
		TypeRef::Enum(enum_type) => Ok(crate::tag::enum_symbol(enum_type, value)?.to_owned()),
		_ => Err(EncodeError::new("Composite values have no simple text form")),
	}
}

fn binary_text(value: &Value, binary: &BinaryType) -> Result<String, EncodeError> {
	if binary.kind == BinaryKind::String {
		return value
			.as_str()
			.map(str::to_owned)
			.ok_or_else(|| EncodeError::new("string fields expect a string value"));
	}
	let bytes = value
		.as_bytes()
		.ok_or_else(|| EncodeError::new("binary fields expect a bytes value"))?;
	match std::str::from_utf8(bytes) {
		// Control characters (beyond tab/newline/return) cannot appear in
		// XML text even escaped, so such payloads fall back to hex.
		Ok(text)
			if text
				.chars()
				.all(|ch| !ch.is_control() || matches!(ch, '\t' | '\n' | '\r')) =>
		{
			Ok(text.to_owned())
		}
		_ => Ok(hex_text(bytes)),
	}
}

fn hex_text(bytes: &[u8]) -> String {
	use std::fmt::Write;
	let mut out = String::with_capacity(bytes.len() * 2);
	for byte in bytes {
		let _ = write!(out, "{byte:02x}");
	}
	out
}

/// A lightweight in-memory element, enough to walk namespaces and fields
struct XmlElem {
	tag: String,
	attrs: Vec<(String, String)>,
	children: Vec<XmlElem>,
	text: String,
}

impl XmlElem {
	fn prefix(&self) -> Option<&str> {
		self.tag.split_once(':').map(|(prefix, _)| prefix)
	}

	fn local_name(&self) -> &str {
		match self.tag.split_once(':') {
			Some((_, local)) => local,
			None => &self.tag,
		}
	}

	fn attr(&self, name: &str) -> Option<&str> {
		self.attrs
			.iter()
			.find(|(attr_name, _)| attr_name == name)
			.map(|(_, value)| value.as_str())
	}

	/// The namespace bindings in scope at this element: the inherited ones
	/// plus any `xmlns`/`xmlns:p` declarations it carries
	fn namespace_bindings(&self, inherited: &HashMap<String, String>) -> HashMap<String, String> {
		let mut bindings = inherited.clone();
		for (name, value) in &self.attrs {
			if name == "xmlns" {
				bindings.insert(String::new(), value.clone());
			} else if let Some(prefix) = name.strip_prefix("xmlns:") {
				bindings.insert(prefix.to_owned(), value.clone());
			}
		}
		bindings
	}

	/// The namespace this element's tag resolves to under `bindings`
	fn resolved_namespace(&self, bindings: &HashMap<String, String>) -> Option<String> {
		match self.prefix() {
			Some(prefix) => bindings.get(prefix).cloned(),
			None => bindings.get("").cloned(),
		}
	}
}

fn parse_tree(text: &str) -> Result<XmlElem, DecodeError> {
	let mut reader = quick_xml::Reader::from_str(text);
	reader.trim_text(true);
	let mut stack: Vec<XmlElem> = Vec::new();
	let mut root: Option<XmlElem> = None;
	loop {
		match reader.read_event().map_err(DecodeError::display)? {
			Event::Start(start) => {
				stack.push(element_from_start(&start)?);
			}
			Event::Empty(start) => {
				let elem = element_from_start(&start)?;
				attach(&mut stack, &mut root, elem)?;
			}
			Event::End(_) => {
				let elem = stack
					.pop()
					.ok_or_else(|| DecodeError::new("Unbalanced XML end tag"))?;
				attach(&mut stack, &mut root, elem)?;
			}
			Event::Text(text) => {
				if let Some(top) = stack.last_mut() {
					top.text
						.push_str(&text.unescape().map_err(DecodeError::display)?);
				}
			}
			Event::CData(data) => {
				if let Some(top) = stack.last_mut() {
					top.text.push_str(&String::from_utf8_lossy(&data));
				}
			}
			Event::Eof => break,
			_ => {}
		}
	}
	if !stack.is_empty() {
		return Err(DecodeError::new("Unclosed XML element"));
	}
	root.ok_or_else(|| DecodeError::new("Empty XML document"))
}

fn element_from_start(start: &BytesStart<'_>) -> Result<XmlElem, DecodeError> {
	let tag = String::from_utf8(start.name().as_ref().to_vec())
		.map_err(|_| DecodeError::new("Invalid UTF-8 in XML tag name"))?;
	let mut attrs = Vec::new();
	for attribute in start.attributes() {
		let attribute = attribute.map_err(DecodeError::display)?;
		let name = String::from_utf8(attribute.key.as_ref().to_vec())
			.map_err(|_| DecodeError::new("Invalid UTF-8 in XML attribute name"))?;
		let value = attribute
			.unescape_value()
			.map_err(DecodeError::display)?
			.into_owned();
		attrs.push((name, value));
	}
	Ok(XmlElem {
		tag,
		attrs,
		children: Vec::new(),
		text: String::new(),
	})
}

fn attach(
	stack: &mut [XmlElem],
	root: &mut Option<XmlElem>,
	elem: XmlElem,
) -> Result<(), DecodeError> {
	match stack.last_mut() {
		Some(parent) => {
			parent.children.push(elem);
			Ok(())
		}
		None => {
			if root.is_some() {
				return Err(DecodeError::new("Multiple XML root elements"));
			}
			*root = Some(elem);
			Ok(())
		}
	}
}

fn parse_message(
	elem: &XmlElem,
	inherited: &HashMap<String, String>,
	default_namespace: Option<&str>,
	registry: &Registry,
) -> Result<Message, DecodeError> {
	let bindings = elem.namespace_bindings(inherited);
	let namespace = elem.resolved_namespace(&bindings);
	let qname = match namespace {
		Some(namespace) => QName::new(Some(&namespace), elem.local_name()),
		None => QName::new(default_namespace, elem.local_name()),
	};
	let (key, group) = registry.group_by_name(&qname).map_err(DecodeError::display)?;
	let group_namespace = group.name.namespace().map(str::to_owned);
	let mut message = Message::new(group.name.clone());

	for child in &elem.children {
		if is_extension_element(child, &bindings) {
			let child_bindings = child.namespace_bindings(&bindings);
			for nested in &child.children {
				message.extensions.push(parse_message(
					nested,
					&child_bindings,
					group_namespace.as_deref(),
					registry,
				)?);
			}
			continue;
		}
		let field = registry
			.effective_fields(key)
			.into_iter()
			.find(|field| field.name == child.local_name())
			.cloned();
		if let Some(field) = field {
			let value = parse_value(
				child,
				&field.type_ref,
				&bindings,
				group_namespace.as_deref(),
				registry,
			)?;
			message.fields.insert(field.name, value);
		}
	}
	Ok(message)
}

fn is_extension_element(elem: &XmlElem, bindings: &HashMap<String, String>) -> bool {
	elem.local_name() == "extension"
		&& elem
			.namespace_bindings(bindings)
			.get(elem.prefix().unwrap_or(""))
			.is_some_and(|namespace| namespace == BLINK_NAMESPACE)
}

fn parse_value(
	elem: &XmlElem,
	type_ref: &TypeRef,
	bindings: &HashMap<String, String>,
	default_namespace: Option<&str>,
	registry: &Registry,
) -> Result<Value, DecodeError> {
	match type_ref {
		TypeRef::Primitive(kind) => parse_primitive(&elem.text, *kind),
		TypeRef::Binary(binary) => parse_binary(elem, binary),
		TypeRef::Enum(enum_type) => {
			let symbol = elem.text.trim();
			if enum_type.value_of(symbol).is_none() {
				return Err(DecodeError::msg(format_args!(
					"Enum {} has no symbol {symbol}",
					enum_type.name
				)));
			}
			Ok(Value::Enum(symbol.to_owned()))
		}
		TypeRef::Sequence(element) => {
			let mut items = Vec::new();
			for child in &elem.children {
				if child.local_name() == "item" {
					items.push(parse_value(child, element, bindings, default_namespace, registry)?);
				}
			}
			Ok(Value::Sequence(items))
		}
		TypeRef::StaticGroup(key) => {
			let fields = parse_group_fields(elem, *key, bindings, default_namespace, registry)?;
			Ok(Value::Group(StaticGroupValue { fields }))
		}
		TypeRef::DynamicGroup(_) | TypeRef::Object => {
			let nested = elem
				.children
				.first()
				.ok_or_else(|| DecodeError::new("Dynamic group element must contain a message element"))?;
			let message = parse_message(nested, bindings, default_namespace, registry)?;
			Ok(Value::Message(Box::new(message)))
		}
	}
}

fn parse_group_fields(
	elem: &XmlElem,
	key: GroupKey,
	bindings: &HashMap<String, String>,
	default_namespace: Option<&str>,
	registry: &Registry,
) -> Result<Fields, DecodeError> {
	let mut fields = Fields::new();
	for child in &elem.children {
		let field = registry
			.effective_fields(key)
			.into_iter()
			.find(|field| field.name == child.local_name())
			.cloned();
		if let Some(field) = field {
			let value = parse_value(child, &field.type_ref, bindings, default_namespace, registry)?;
			fields.insert(field.name, value);
		}
	}
	Ok(fields)
}

fn parse_primitive(text: &str, kind: PrimitiveKind) -> Result<Value, DecodeError> {
	let text = text.trim();
	match kind {
		PrimitiveKind::Bool => match text {
			"true" => Ok(Value::Bool(true)),
			"false" => Ok(Value::Bool(false)),
			_ => Err(DecodeError::msg(format_args!("Invalid boolean value: {text}"))),
		},
		PrimitiveKind::Decimal => crate::tag::parse_decimal(text).map(Value::Decimal),
		PrimitiveKind::F64 => crate::tag::parse_float(text).map(Value::F64),
		_ if kind.is_signed() => text
			.parse()
			.map(Value::I64)
			.map_err(|_| DecodeError::msg(format_args!("Invalid integer value: {text}"))),
		_ => text
			.parse()
			.map(Value::U64)
			.map_err(|_| DecodeError::msg(format_args!("Invalid integer value: {text}"))),
	}
}

fn parse_binary(elem: &XmlElem, binary: &BinaryType) -> Result<Value, DecodeError> {
	let text = elem.text.as_str();
	if binary.kind == BinaryKind::String {
		return Ok(Value::String(text.to_owned()));
	}
	if elem.attr("binary") == Some("yes") {
		return Ok(Value::Binary(bytes_from_hex(text.trim())?));
	}
	// Hex-looking text is a hex fallback for payloads XML text cannot
	// carry; anything else is the UTF-8 payload itself.
	let trimmed = text.trim();
	if !trimmed.is_empty()
		&& trimmed.len() % 2 == 0
		&& trimmed.bytes().all(|byte| byte.is_ascii_hexdigit())
	{
		return Ok(Value::Binary(bytes_from_hex(trimmed)?));
	}
	Ok(Value::Binary(text.as_bytes().to_vec()))
}

fn bytes_from_hex(text: &str) -> Result<Vec<u8>, DecodeError> {
	if text.len() % 2 != 0 {
		return Err(DecodeError::new("Hex text must have an even length"));
	}
	(0..text.len())
		.step_by(2)
		.map(|index| {
			u8::from_str_radix(&text[index..index + 2], 16)
				.map_err(|_| DecodeError::new("Invalid hex text"))
		})
		.collect()
}
