//! Render a resolved [`Schema`] back to Blink schema text
//!
//! The output is normalized: type aliases were collapsed during
//! resolution, so rendered fields name their resolved types directly, and
//! enums referenced by fields are re-emitted as definitions. Compiling the
//! rendered text reproduces an equivalent schema (same groups, ids,
//! fields and enums).

use {
	super::{BinaryKind, EnumType, GroupDef, QName, Schema, TypeRef},
	std::fmt::Write,
};

/// Serialize `schema` as Blink schema text
pub fn render_schema(schema: &Schema) -> String {
	let mut out = String::new();
	if let Some(namespace) = schema.namespace() {
		let _ = writeln!(out, "namespace {namespace}");
		out.push('\n');
	}
	if !schema.annotations().is_empty() {
		let _ = writeln!(out, "schema <- {}", annotation_chain(schema, schema.annotations()));
		out.push('\n');
	}

	for enum_type in collect_enums(schema) {
		let symbols: Vec<String> = enum_type
			.symbols
			.iter()
			.map(|(name, value)| format!("{name}/{value}"))
			.collect();
		let _ = writeln!(
			out,
			"{} = {}",
			reference_name(schema, &enum_type.name),
			symbols.join(" | ")
		);
	}

	for (_, group) in schema.groups() {
		out.push('\n');
		render_group(&mut out, schema, group);
	}
	out
}

fn render_group(out: &mut String, schema: &Schema, group: &GroupDef) {
	if !group.annotations.is_empty() {
		let _ = write!(out, "{} ", annotation_chain(schema, &group.annotations));
	}
	let _ = write!(out, "{}", reference_name(schema, &group.name));
	if let Some(type_id) = group.type_id {
		let _ = write!(out, "/{type_id}");
	}
	if let Some(super_key) = group.super_group {
		let _ = write!(out, " : {}", reference_name(schema, &schema[super_key].name));
	}
	// Only the group's own fields: inherited ones render with the super.
	for (index, field) in group.fields.iter().enumerate() {
		out.push_str(if index == 0 { " ->\n\t" } else { ",\n\t" });
		if !field.annotations.is_empty() {
			let _ = write!(out, "{} ", annotation_chain(schema, &field.annotations));
		}
		let _ = write!(out, "{} {}", type_text(schema, &field.type_ref), field.name);
		if field.optional {
			out.push('?');
		}
	}
	out.push('\n');
}

fn type_text(schema: &Schema, type_ref: &TypeRef) -> String {
	match type_ref {
		TypeRef::Primitive(kind) => kind.keyword().to_owned(),
		TypeRef::Binary(binary) => {
			let keyword = match binary.kind {
				BinaryKind::String => "string",
				BinaryKind::Binary => "binary",
				BinaryKind::Fixed => "fixed",
			};
			match binary.size {
				Some(size) => format!("{keyword}({size})"),
				None => keyword.to_owned(),
			}
		}
		TypeRef::Enum(enum_type) => reference_name(schema, &enum_type.name),
		TypeRef::Sequence(element) => format!("{} []", type_text(schema, element)),
		TypeRef::StaticGroup(key) => reference_name(schema, &schema[*key].name),
		TypeRef::DynamicGroup(key) => format!("{}*", reference_name(schema, &schema[*key].name)),
		TypeRef::Object => "object".to_owned(),
	}
}

/// A name as written in schema text: bare inside the document namespace,
/// qualified otherwise
fn reference_name(schema: &Schema, name: &QName) -> String {
	if name.namespace() == schema.namespace() {
		name.name().to_owned()
	} else {
		name.qualified().to_owned()
	}
}

fn annotation_chain(schema: &Schema, annotations: &super::Annotations) -> String {
	// Sort for deterministic output; the map itself is unordered.
	let mut entries: Vec<(&QName, &String)> = annotations.iter().collect();
	entries.sort_by_key(|(name, _)| name.qualified());
	entries
		.iter()
		.map(|(name, value)| {
			format!(
				"@{}=\"{}\"",
				reference_name(schema, name),
				escape_annotation_value(value)
			)
		})
		.collect::<Vec<_>>()
		.join(" ")
}

fn escape_annotation_value(value: &str) -> String {
	let mut out = String::with_capacity(value.len());
	for ch in value.chars() {
		match ch {
			'"' => out.push_str("\\\""),
			'\\' => out.push_str("\\\\"),
			'\n' => out.push_str("\\n"),
			'\r' => out.push_str("\\r"),
			'\t' => out.push_str("\\t"),
			_ => out.push(ch),
		}
	}
	out
}

/// Every enum referenced by any field, deduplicated by qualified name
fn collect_enums(schema: &Schema) -> Vec<EnumType> {
	let mut seen = hashbrown::HashSet::new();
	let mut enums = Vec::new();
	for (key, _) in schema.groups() {
		for field in &schema[key].fields {
			collect_enums_in(&field.type_ref, &mut seen, &mut enums);
		}
	}
	enums.sort_by(|a, b| a.name.qualified().cmp(b.name.qualified()));
	enums
}

fn collect_enums_in(type_ref: &TypeRef, seen: &mut hashbrown::HashSet<String>, enums: &mut Vec<EnumType>) {
	match type_ref {
		TypeRef::Enum(enum_type) => {
			if seen.insert(enum_type.name.qualified().to_owned()) {
				enums.push(enum_type.clone());
			}
		}
		TypeRef::Sequence(element) => collect_enums_in(element, seen, enums),
		_ => {}
	}
}
