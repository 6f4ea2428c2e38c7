//! Tokenizer and recursive-descent parser for Blink schema text

mod lexer;
pub(crate) mod raw;

use {
	crate::schema::{QName, SchemaError},
	lexer::{Token, TokenKind},
	raw::*,
};

/// The annotation a bare `/N` id or a bare number in an incremental chain
/// desugars to
const NUMERIC_ANNOTATION: (&str, &str) = ("blink", "id");

/// Parse Blink schema text into a [`SchemaAst`]
pub(crate) fn parse(text: &str) -> Result<SchemaAst, SchemaError> {
	let tokens = lexer::tokenize(text)?;
	Parser {
		tokens,
		index: 0,
		ast: SchemaAst::default(),
	}
	.run()
}

struct Parser {
	tokens: Vec<Token>,
	index: usize,
	ast: SchemaAst,
}

impl Parser {
	fn run(mut self) -> Result<SchemaAst, SchemaError> {
		while !self.eat(TokenKind::Eof) {
			let definition_annots = self.parse_annotations()?;
			let token = self.peek();
			if token.kind == TokenKind::Keyword && token.text == "schema" {
				if !definition_annots.is_empty() {
					return Err(SchemaError::new(
						"Annotations cannot precede schema annotations",
					));
				}
				self.advance();
				if !self.eat(TokenKind::LArrow) {
					return Err(SchemaError::new("schema annotations require '<-'"));
				}
				let chain = self.parse_incremental_chain()?;
				self.ast.schema_annotations.extend(chain);
				continue;
			}
			if token.kind == TokenKind::Keyword && token.text == "namespace" {
				if !definition_annots.is_empty() {
					return Err(SchemaError::new(
						"Annotations are not allowed on namespace declarations",
					));
				}
				self.advance();
				self.parse_namespace_decl()?;
				continue;
			}
			let (name, type_id) = self.parse_name_with_id()?;
			let member = if self.eat(TokenKind::Dot) {
				Some(self.expect_identifier()?.text)
			} else {
				None
			};
			if self.eat(TokenKind::LArrow) {
				if type_id.is_some() {
					return Err(SchemaError::new(
						"Component references cannot include identifiers",
					));
				}
				let annotations = self.parse_incremental_chain()?;
				self.ast.incremental_annotations.push(IncrementalAnnotation {
					target: ComponentRef { name, member },
					annotations,
				});
				continue;
			}
			if member.is_some() {
				return Err(SchemaError::new(
					"Component references must be followed by '<-'",
				));
			}
			if self.eat(TokenKind::Equal) {
				// An `=` introduces either an enum or a type alias; the
				// right-hand side needs lookahead to tell them apart.
				let saved_index = self.index;
				self.parse_annotations()?;
				let is_enum = self.detect_enum();
				self.index = saved_index;
				if is_enum {
					let symbols = self.parse_enum_symbols()?;
					self.ast.enums.push(RawEnum {
						name,
						symbols,
						annotations: definition_annots,
					});
				} else {
					let mut annotations = definition_annots;
					annotations.extend(self.parse_annotations()?);
					let type_ref = self.parse_type()?;
					self.ast.type_defs.push(RawTypeDef {
						name,
						type_ref,
						annotations,
					});
				}
			} else {
				let super_name = if self.eat(TokenKind::Colon) {
					Some(self.parse_qname()?)
				} else {
					None
				};
				let fields = if self.eat(TokenKind::Arrow) {
					self.parse_fields()?
				} else {
					Vec::new()
				};
				self.ast.groups.push(RawGroup {
					name,
					type_id,
					fields,
					super_name,
					annotations: definition_annots,
				});
			}
		}
		Ok(self.ast)
	}

	fn parse_namespace_decl(&mut self) -> Result<(), SchemaError> {
		if self.ast.namespace.is_some() {
			return Err(SchemaError::new("Duplicate namespace declaration"));
		}
		let name = self.expect_identifier()?;
		self.ast.namespace = Some(name.text);
		Ok(())
	}

	fn parse_fields(&mut self) -> Result<Vec<RawField>, SchemaError> {
		let mut fields = Vec::new();
		loop {
			let mut annotations = self.parse_annotations()?;
			let type_ref = self.parse_type()?;
			annotations.extend(self.parse_annotations()?);
			let (field_name, field_id) = self.parse_name_with_id()?;
			let optional = self.eat(TokenKind::Question);
			if let Some(field_id) = field_id {
				annotations.push(numeric_annotation(field_id));
			}
			fields.push(RawField {
				name: field_name.name().to_owned(),
				type_ref,
				optional,
				annotations,
			});
			if !self.eat(TokenKind::Comma) {
				break;
			}
		}
		Ok(fields)
	}

	fn parse_type(&mut self) -> Result<RawTypeRef, SchemaError> {
		let mut base = self.parse_single_type()?;
		while self.eat(TokenKind::LBracket) {
			self.expect(TokenKind::RBracket)?;
			base = RawTypeRef::Sequence(Box::new(base));
		}
		Ok(base)
	}

	fn parse_single_type(&mut self) -> Result<RawTypeRef, SchemaError> {
		let token = self.peek().clone();
		if token.kind == TokenKind::Keyword {
			match token.text.as_str() {
				"string" | "binary" => {
					self.advance();
					let size = self.parse_optional_size()?;
					return Ok(RawTypeRef::Binary {
						kind: token.text,
						size,
					});
				}
				"fixed" => {
					self.advance();
					let size = self.parse_optional_size()?.ok_or_else(|| {
						SchemaError::msg(format_args!(
							"Fixed types must specify a size, e.g. fixed(8), at line {}",
							token.line
						))
					})?;
					return Ok(RawTypeRef::Binary {
						kind: token.text,
						size: Some(size),
					});
				}
				"object" => {
					self.advance();
					return Ok(RawTypeRef::Object);
				}
				"namespace" | "type" | "schema" => {}
				_ => {
					// The remaining keywords are exactly the primitive names.
					self.advance();
					return Ok(RawTypeRef::Primitive(token.text));
				}
			}
		}
		let name = self.parse_qname()?;
		let dynamic = self.eat(TokenKind::Star);
		Ok(RawTypeRef::Named { name, dynamic })
	}

	fn parse_optional_size(&mut self) -> Result<Option<u32>, SchemaError> {
		if !self.eat(TokenKind::LParen) {
			return Ok(None);
		}
		let number = self.expect(TokenKind::Number)?;
		let size = number.text.parse().map_err(|_| {
			SchemaError::msg(format_args!("Invalid size at line {}", number.line))
		})?;
		self.expect(TokenKind::RParen)?;
		Ok(Some(size))
	}

	fn parse_enum_symbols(&mut self) -> Result<Vec<RawEnumSymbol>, SchemaError> {
		let mut symbols = Vec::new();
		let mut next_value = 0;
		self.eat(TokenKind::Pipe);
		loop {
			let symbol = self.parse_enum_symbol(next_value)?;
			next_value = symbol.value.wrapping_add(1);
			symbols.push(symbol);
			if !self.eat(TokenKind::Pipe) {
				break;
			}
		}
		Ok(symbols)
	}

	fn parse_enum_symbol(&mut self, default_value: i32) -> Result<RawEnumSymbol, SchemaError> {
		let annotations = self.parse_annotations()?;
		let name = self.expect_identifier()?;
		let value = if self.eat(TokenKind::Slash) {
			let number = self.expect(TokenKind::Number)?;
			number.text.parse().map_err(|_| {
				SchemaError::msg(format_args!(
					"Invalid enum value at line {}",
					number.line
				))
			})?
		} else {
			default_value
		};
		Ok(RawEnumSymbol {
			name: name.text,
			value,
			annotations,
		})
	}

	fn parse_incremental_chain(&mut self) -> Result<Vec<Annotation>, SchemaError> {
		let mut annotations = Vec::new();
		loop {
			if self.peek().kind == TokenKind::Number {
				let number = self.advance();
				let id = number.text.parse().map_err(|_| {
					SchemaError::msg(format_args!(
						"Invalid id annotation at line {}",
						number.line
					))
				})?;
				annotations.push(numeric_annotation(id));
			} else {
				let chunk = self.parse_annotations()?;
				if chunk.is_empty() {
					return Err(SchemaError::new("Expected annotation after '<-'"));
				}
				annotations.extend(chunk);
			}
			if !self.eat(TokenKind::LArrow) {
				break;
			}
		}
		Ok(annotations)
	}

	fn parse_annotations(&mut self) -> Result<Vec<Annotation>, SchemaError> {
		let mut items = Vec::new();
		while self.eat(TokenKind::At) {
			let name = self.parse_qname()?;
			self.expect(TokenKind::Equal)?;
			let mut value = String::new();
			let mut any = false;
			while self.peek().kind == TokenKind::Str {
				value.push_str(&self.advance().text);
				any = true;
			}
			if !any {
				return Err(SchemaError::new(
					"Annotation must have a string literal value",
				));
			}
			items.push(Annotation { name, value });
		}
		Ok(items)
	}

	fn parse_qname(&mut self) -> Result<QName, SchemaError> {
		let first = self.expect_identifier()?;
		if self.eat(TokenKind::NsColon) {
			let name = self.expect_identifier()?;
			Ok(QName::new(Some(&first.text), &name.text))
		} else {
			Ok(QName::new(None, &first.text))
		}
	}

	fn parse_name_with_id(&mut self) -> Result<(QName, Option<u64>), SchemaError> {
		let qname = self.parse_qname()?;
		let type_id = if self.eat(TokenKind::Slash) {
			let number = self.expect(TokenKind::Number)?;
			Some(number.text.parse().map_err(|_| {
				SchemaError::msg(format_args!("Invalid type id at line {}", number.line))
			})?)
		} else {
			None
		};
		Ok((qname, type_id))
	}

	fn detect_enum(&self) -> bool {
		let token = self.peek();
		match token.kind {
			TokenKind::Pipe => true,
			TokenKind::Ident => matches!(
				self.tokens
					.get(self.index + 1)
					.map(|next| next.kind)
					.unwrap_or(TokenKind::Eof),
				TokenKind::Pipe | TokenKind::Slash
			),
			_ => false,
		}
	}

	fn eat(&mut self, kind: TokenKind) -> bool {
		if self.peek().kind == kind {
			self.advance();
			true
		} else {
			false
		}
	}

	fn expect(&mut self, kind: TokenKind) -> Result<Token, SchemaError> {
		let token = self.peek();
		if token.kind != kind {
			return Err(SchemaError::msg(format_args!(
				"Expected {kind:?}, got {:?} at line {}",
				token.kind, token.line
			)));
		}
		Ok(self.advance())
	}

	fn expect_identifier(&mut self) -> Result<Token, SchemaError> {
		let token = self.peek();
		if token.kind != TokenKind::Ident {
			return Err(SchemaError::msg(format_args!(
				"Expected identifier at line {}, found {:?}",
				token.line, token.kind
			)));
		}
		Ok(self.advance())
	}

	fn advance(&mut self) -> Token {
		let token = self.tokens[self.index].clone();
		self.index += 1;
		token
	}

	fn peek(&self) -> &Token {
		&self.tokens[self.index]
	}
}

fn numeric_annotation(id: u64) -> Annotation {
	Annotation {
		name: QName::new(Some(NUMERIC_ANNOTATION.0), NUMERIC_ANNOTATION.1),
		value: id.to_string(),
	}
}
