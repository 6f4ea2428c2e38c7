//! Raw parse tree mirroring the schema grammar, before name resolution

use crate::schema::QName;

#[derive(Clone, Debug)]
pub(crate) struct Annotation {
	pub name: QName,
	pub value: String,
}

#[derive(Clone, Debug)]
pub(crate) enum RawTypeRef {
	Primitive(String),
	Binary {
		kind: String,
		size: Option<u32>,
	},
	Sequence(Box<RawTypeRef>),
	Object,
	/// A reference to a named enum, group or type alias; `dynamic` is set by
	/// the `*` suffix
	Named {
		name: QName,
		dynamic: bool,
	},
}

#[derive(Clone, Debug)]
pub(crate) struct RawField {
	pub name: String,
	pub type_ref: RawTypeRef,
	pub optional: bool,
	pub annotations: Vec<Annotation>,
}

#[derive(Clone, Debug)]
pub(crate) struct RawGroup {
	pub name: QName,
	pub type_id: Option<u64>,
	pub fields: Vec<RawField>,
	pub super_name: Option<QName>,
	pub annotations: Vec<Annotation>,
}

#[derive(Clone, Debug)]
pub(crate) struct RawEnumSymbol {
	pub name: String,
	pub value: i32,
	pub annotations: Vec<Annotation>,
}

#[derive(Clone, Debug)]
pub(crate) struct RawEnum {
	pub name: QName,
	pub symbols: Vec<RawEnumSymbol>,
	pub annotations: Vec<Annotation>,
}

#[derive(Clone, Debug)]
pub(crate) struct RawTypeDef {
	pub name: QName,
	pub type_ref: RawTypeRef,
	pub annotations: Vec<Annotation>,
}

/// Target of an incremental annotation chain: `QName` or `QName.member`
#[derive(Clone, Debug)]
pub(crate) struct ComponentRef {
	pub name: QName,
	pub member: Option<String>,
}

#[derive(Clone, Debug)]
pub(crate) struct IncrementalAnnotation {
	pub target: ComponentRef,
	pub annotations: Vec<Annotation>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct SchemaAst {
	pub namespace: Option<String>,
	pub enums: Vec<RawEnum>,
	pub type_defs: Vec<RawTypeDef>,
	pub groups: Vec<RawGroup>,
	pub schema_annotations: Vec<Annotation>,
	pub incremental_annotations: Vec<IncrementalAnnotation>,
}
