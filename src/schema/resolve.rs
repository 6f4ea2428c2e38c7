//! Resolution of the raw parse tree into the [`Schema`] group graph
//!
//! Declaration names are qualified against the document namespace, type
//! aliases are transparently collapsed, named references become enum or
//! group references, and inheritance/alias cycles as well as nested
//! sequences are rejected here.

use {
	super::{
		parsing::raw::{
			Annotation, ComponentRef, RawEnum, RawGroup, RawTypeDef, RawTypeRef, SchemaAst,
		},
		Annotations, BinaryKind, BinaryType, EnumType, FieldDef, GroupDef, GroupKey, PrimitiveKind,
		QName, Schema, SchemaError, TypeRef,
	},
	hashbrown::{HashMap, HashSet},
};

pub(crate) fn resolve(ast: &SchemaAst) -> Result<Schema, SchemaError> {
	let mut resolver = Resolver {
		schema: Schema::new(ast.namespace.clone()),
		namespace: ast.namespace.as_deref(),
		enum_asts: HashMap::new(),
		enum_cache: HashMap::new(),
		group_asts: HashMap::new(),
		group_names: HashMap::new(),
		group_keys: HashMap::new(),
		type_defs: HashMap::new(),
		type_cache: HashMap::new(),
		incremental: HashMap::new(),
		building: HashSet::new(),
		resolving_types: HashSet::new(),
		definitions: HashSet::new(),
	};
	resolver.register_enums(&ast.enums)?;
	resolver.register_type_defs(&ast.type_defs)?;
	resolver.register_groups(&ast.groups)?;
	resolver.index_incremental_annotations(&ast.incremental_annotations)?;
	let schema_annotations = resolver.collect_annotations(&ast.schema_annotations, Some("schema"));
	resolver.schema.set_annotations(schema_annotations);
	// Materialize groups in declaration order so arena keys are stable.
	for group_ast in &ast.groups {
		let qname = resolver.qualify_decl_name(&group_ast.name);
		resolver.ensure_group(qname.qualified(), true)?;
	}
	resolver.check_static_cycles()?;
	Ok(resolver.schema)
}

struct Resolver<'a> {
	schema: Schema,
	namespace: Option<&'a str>,
	enum_asts: HashMap<String, &'a RawEnum>,
	enum_cache: HashMap<String, EnumType>,
	group_asts: HashMap<String, &'a RawGroup>,
	group_names: HashMap<String, QName>,
	group_keys: HashMap<String, GroupKey>,
	type_defs: HashMap<String, &'a RawTypeDef>,
	type_cache: HashMap<String, TypeRef>,
	incremental: HashMap<String, Vec<&'a Annotation>>,
	/// Groups whose super/fields are currently being materialized; a
	/// super-group reference into this set is an inheritance cycle
	building: HashSet<String>,
	resolving_types: HashSet<String>,
	definitions: HashSet<String>,
}

impl<'a> Resolver<'a> {
	fn register_enums(&mut self, enums: &'a [RawEnum]) -> Result<(), SchemaError> {
		for enum_ast in enums {
			let qname = self.qualify_decl_name(&enum_ast.name);
			let key = qname.qualified().to_owned();
			self.ensure_unique_name(&key)?;
			self.enum_asts.insert(key.clone(), enum_ast);
			self.group_names.insert(key, qname);
		}
		Ok(())
	}

	fn register_type_defs(&mut self, type_defs: &'a [RawTypeDef]) -> Result<(), SchemaError> {
		for type_def in type_defs {
			let qname = self.qualify_decl_name(&type_def.name);
			let key = qname.qualified().to_owned();
			self.ensure_unique_name(&key)?;
			self.type_defs.insert(key, type_def);
		}
		Ok(())
	}

	fn register_groups(&mut self, groups: &'a [RawGroup]) -> Result<(), SchemaError> {
		for group_ast in groups {
			let qname = self.qualify_decl_name(&group_ast.name);
			let key = qname.qualified().to_owned();
			self.ensure_unique_name(&key)?;
			self.group_asts.insert(key.clone(), group_ast);
			self.group_names.insert(key, qname);
		}
		Ok(())
	}

	fn ensure_unique_name(&mut self, key: &str) -> Result<(), SchemaError> {
		if !self.definitions.insert(key.to_owned()) {
			return Err(SchemaError::msg(format_args!(
				"Duplicate definition for {key}"
			)));
		}
		Ok(())
	}

	fn qualify_decl_name(&self, raw: &QName) -> QName {
		if raw.namespace().is_some() {
			raw.clone()
		} else {
			QName::new(self.namespace, raw.name())
		}
	}

	/// Lookup candidates for a reference, in resolution order: explicit
	/// `ns:name`, the document-namespace-qualified form, then the bare name
	fn candidate_keys(&self, raw: &QName) -> Vec<String> {
		if raw.namespace().is_some() {
			return vec![raw.qualified().to_owned()];
		}
		let mut candidates = Vec::new();
		if let Some(namespace) = self.namespace {
			candidates.push(format!("{namespace}:{}", raw.name()));
		}
		candidates.push(raw.name().to_owned());
		candidates
	}

	fn collect_annotations(&self, inline: &[Annotation], extra_key: Option<&str>) -> Annotations {
		let mut result = Annotations::new();
		for annotation in inline {
			result.insert(self.qualify_decl_name(&annotation.name), annotation.value.clone());
		}
		if let Some(extra_key) = extra_key {
			if let Some(chain) = self.incremental.get(extra_key) {
				for annotation in chain {
					result.insert(
						self.qualify_decl_name(&annotation.name),
						annotation.value.clone(),
					);
				}
			}
		}
		result
	}

	fn ensure_group(&mut self, key: &str, allow_partial: bool) -> Result<GroupKey, SchemaError> {
		if let Some(&group_key) = self.group_keys.get(key) {
			if !allow_partial && self.building.contains(key) {
				return Err(SchemaError::msg(format_args!(
					"Cyclic inheritance involving {}",
					self.group_names[key]
				)));
			}
			return Ok(group_key);
		}
		let ast = *self
			.group_asts
			.get(key)
			.ok_or_else(|| SchemaError::msg(format_args!("Unknown group {key}")))?;
		let annotations = self.collect_annotations(&ast.annotations, Some(key));
		// The group enters the arena before its super and fields resolve so
		// that references back to it (static or dynamic) can already be
		// expressed as its key.
		let group_key = self.schema.push_group(GroupDef {
			name: self.group_names[key].clone(),
			type_id: ast.type_id,
			fields: Vec::new(),
			super_group: None,
			annotations,
		})?;
		self.group_keys.insert(key.to_owned(), group_key);
		self.building.insert(key.to_owned());
		let super_group = match &ast.super_name {
			None => None,
			Some(super_name) => Some(self.resolve_super(super_name)?),
		};
		let fields = self.resolve_fields(key, ast)?;
		self.building.remove(key);
		let group = self.schema.group_mut(group_key);
		group.super_group = super_group;
		group.fields = fields;
		Ok(group_key)
	}

	fn resolve_super(&mut self, super_name: &QName) -> Result<GroupKey, SchemaError> {
		for candidate in self.candidate_keys(super_name) {
			if self.group_asts.contains_key(candidate.as_str()) {
				return self.ensure_group(&candidate, false);
			}
		}
		Err(SchemaError::msg(format_args!("Unknown group {super_name}")))
	}

	fn resolve_fields(&mut self, group_key: &str, ast: &RawGroup) -> Result<Vec<FieldDef>, SchemaError> {
		let mut fields = Vec::with_capacity(ast.fields.len());
		for field_ast in &ast.fields {
			let type_ref = self.resolve_type(&field_ast.type_ref, false)?;
			let annotations = self.collect_annotations(
				&field_ast.annotations,
				Some(&format!("{group_key}.{}", field_ast.name)),
			);
			fields.push(FieldDef {
				name: field_ast.name.clone(),
				type_ref,
				optional: field_ast.optional,
				annotations,
			});
		}
		Ok(fields)
	}

	fn resolve_type(&mut self, type_ref: &RawTypeRef, in_sequence: bool) -> Result<TypeRef, SchemaError> {
		match type_ref {
			RawTypeRef::Primitive(name) => {
				let kind = PrimitiveKind::from_keyword(name).ok_or_else(|| {
					SchemaError::msg(format_args!("Unknown primitive type: {name}"))
				})?;
				Ok(TypeRef::Primitive(kind))
			}
			RawTypeRef::Binary { kind, size } => {
				let kind = match kind.as_str() {
					"string" => BinaryKind::String,
					"binary" => BinaryKind::Binary,
					"fixed" => BinaryKind::Fixed,
					other => {
						return Err(SchemaError::msg(format_args!(
							"Unknown binary type {other}"
						)));
					}
				};
				Ok(TypeRef::Binary(BinaryType::new(kind, *size)?))
			}
			RawTypeRef::Sequence(element) => {
				if in_sequence {
					return Err(SchemaError::new("Blink does not allow nested sequences"));
				}
				let element_type = self.resolve_type(element, true)?;
				if matches!(element_type, TypeRef::Sequence(_)) {
					return Err(SchemaError::new("Blink does not allow nested sequences"));
				}
				Ok(TypeRef::Sequence(Box::new(element_type)))
			}
			RawTypeRef::Object => Ok(TypeRef::Object),
			RawTypeRef::Named { name, dynamic } => self.resolve_named_type(name, *dynamic),
		}
	}

	fn resolve_named_type(&mut self, name: &QName, dynamic: bool) -> Result<TypeRef, SchemaError> {
		for candidate in self.candidate_keys(name) {
			if self.enum_asts.contains_key(candidate.as_str()) {
				if dynamic {
					return Err(SchemaError::msg(format_args!(
						"Enum {} cannot use a group mode",
						self.group_names[candidate.as_str()]
					)));
				}
				return Ok(TypeRef::Enum(self.ensure_enum(&candidate)?));
			}
			if self.group_asts.contains_key(candidate.as_str()) {
				let group_key = self.ensure_group(&candidate, true)?;
				// References default to static; `*` selects dynamic usage.
				// An id-less target is tolerated here (schema transport
				// documents reference such groups); codecs enforce ids.
				return Ok(if dynamic {
					TypeRef::DynamicGroup(group_key)
				} else {
					TypeRef::StaticGroup(group_key)
				});
			}
			if self.type_defs.contains_key(candidate.as_str()) {
				return self.ensure_type_def(&candidate);
			}
		}
		Err(SchemaError::msg(format_args!("Unknown type {name}")))
	}

	fn ensure_type_def(&mut self, key: &str) -> Result<TypeRef, SchemaError> {
		if let Some(cached) = self.type_cache.get(key) {
			return Ok(cached.clone());
		}
		let ast = *self
			.type_defs
			.get(key)
			.ok_or_else(|| SchemaError::msg(format_args!("Unknown type definition {key}")))?;
		if !self.resolving_types.insert(key.to_owned()) {
			return Err(SchemaError::msg(format_args!(
				"Cyclic type definition involving {}",
				ast.name
			)));
		}
		let resolved = self.resolve_type(&ast.type_ref, false);
		self.resolving_types.remove(key);
		let resolved = resolved?;
		self.type_cache.insert(key.to_owned(), resolved.clone());
		Ok(resolved)
	}

	fn ensure_enum(&mut self, key: &str) -> Result<EnumType, SchemaError> {
		if let Some(cached) = self.enum_cache.get(key) {
			return Ok(cached.clone());
		}
		let ast = *self
			.enum_asts
			.get(key)
			.ok_or_else(|| SchemaError::msg(format_args!("Unknown enum {key}")))?;
		let symbols = ast
			.symbols
			.iter()
			.map(|symbol| (symbol.name.clone(), symbol.value))
			.collect();
		let mut enum_type = EnumType::new(self.group_names[key].clone(), symbols)?;
		enum_type.annotations = self.collect_annotations(&ast.annotations, Some(key));
		self.enum_cache.insert(key.to_owned(), enum_type.clone());
		Ok(enum_type)
	}

	fn index_incremental_annotations(
		&mut self,
		incremental: &'a [crate::schema::parsing::raw::IncrementalAnnotation],
	) -> Result<(), SchemaError> {
		for entry in incremental {
			let ComponentRef { name, member } = &entry.target;
			let qname = self.qualify_decl_name(name);
			let base_key = qname.qualified().to_owned();
			let key = match member {
				Some(member) => {
					if let Some(group_ast) = self.group_asts.get(base_key.as_str()) {
						if !group_ast.fields.iter().any(|field| &field.name == member) {
							return Err(SchemaError::msg(format_args!(
								"Unknown field {member} on {base_key}"
							)));
						}
					} else if let Some(enum_ast) = self.enum_asts.get(base_key.as_str()) {
						if !enum_ast.symbols.iter().any(|symbol| &symbol.name == member) {
							return Err(SchemaError::msg(format_args!(
								"Unknown enum symbol {member} on {base_key}"
							)));
						}
					} else {
						return Err(SchemaError::msg(format_args!(
							"Unknown component {base_key} for incremental annotation"
						)));
					}
					format!("{base_key}.{member}")
				}
				None => {
					if !self.group_asts.contains_key(base_key.as_str())
						&& !self.enum_asts.contains_key(base_key.as_str())
						&& !self.type_defs.contains_key(base_key.as_str())
					{
						return Err(SchemaError::msg(format_args!(
							"Unknown component {base_key} for incremental annotation"
						)));
					}
					base_key
				}
			};
			self.incremental
				.entry(key)
				.or_default()
				.extend(entry.annotations.iter());
		}
		Ok(())
	}

	/// Reject groups that unconditionally contain themselves through static
	/// group fields (their inline serialization would never terminate).
	/// Dynamic references and sequences break the cycle: both indirect
	/// through a frame or data area.
	fn check_static_cycles(&self) -> Result<(), SchemaError> {
		let mut visited = vec![false; self.schema.groups().count()];
		let mut checked = vec![false; visited.len()];
		for (key, _) in self.schema.groups() {
			if !checked[key.idx()] {
				self.check_static_cycles_inner(key, &mut visited, &mut checked)?;
			}
		}
		Ok(())
	}

	fn check_static_cycles_inner(
		&self,
		key: GroupKey,
		visited: &mut Vec<bool>,
		checked: &mut Vec<bool>,
	) -> Result<(), SchemaError> {
		visited[key.idx()] = true;
		for field in self.schema.effective_fields(key) {
			if let TypeRef::StaticGroup(inner) = &field.type_ref {
				let inner = *inner;
				if visited[inner.idx()] {
					return Err(SchemaError::msg(format_args!(
						"Group {} ends up always containing itself",
						self.schema[inner].name
					)));
				}
				self.check_static_cycles_inner(inner, visited, checked)?;
			}
		}
		visited[key.idx()] = false;
		checked[key.idx()] = true;
		Ok(())
	}
}
