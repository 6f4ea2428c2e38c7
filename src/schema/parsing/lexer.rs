use crate::schema::SchemaError;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum TokenKind {
	Ident,
	Keyword,
	Number,
	Str,
	/// `->`
	Arrow,
	/// `<-`
	LArrow,
	/// `:` immediately following a name (namespace qualification)
	NsColon,
	/// `:` after whitespace (inheritance)
	Colon,
	Dot,
	Comma,
	Slash,
	Star,
	LBracket,
	RBracket,
	LParen,
	RParen,
	Question,
	Pipe,
	At,
	Equal,
	Eof,
}

#[derive(Clone, Debug)]
pub(crate) struct Token {
	pub kind: TokenKind,
	pub text: String,
	pub line: u32,
}

/// Everything the primitive keywords plus the structural keywords of the
/// grammar. Identifiers that collide can be written with a leading `\`.
const KEYWORDS: &[&str] = &[
	"i8",
	"u8",
	"i16",
	"u16",
	"i32",
	"u32",
	"i64",
	"u64",
	"f64",
	"decimal",
	"date",
	"timeOfDayMilli",
	"timeOfDayNano",
	"nanotime",
	"millitime",
	"bool",
	"string",
	"binary",
	"fixed",
	"object",
	"namespace",
	"type",
	"schema",
];

/// Convert schema text into a token stream ending with an [`TokenKind::Eof`]
/// token
pub(crate) fn tokenize(text: &str) -> Result<Vec<Token>, SchemaError> {
	Lexer {
		text: text.as_bytes(),
		chars: text,
		index: 0,
		line: 1,
		tokens: Vec::new(),
	}
	.run()
}

struct Lexer<'a> {
	text: &'a [u8],
	chars: &'a str,
	index: usize,
	line: u32,
	tokens: Vec<Token>,
}

impl Lexer<'_> {
	fn run(mut self) -> Result<Vec<Token>, SchemaError> {
		while let Some(&byte) = self.text.get(self.index) {
			match byte {
				b' ' | b'\t' | b'\r' => self.index += 1,
				b'\n' => {
					self.index += 1;
					self.line += 1;
				}
				b'#' => self.skip_comment(),
				b'-' if self.peek(1) == Some(b'>') => self.punct(TokenKind::Arrow, "->", 2),
				b'<' if self.peek(1) == Some(b'-') => self.punct(TokenKind::LArrow, "<-", 2),
				b':' => {
					// A colon glued to the preceding identifier qualifies a
					// name; a free-standing colon introduces a super group.
					let kind = match self.index.checked_sub(1).and_then(|i| self.text.get(i)) {
						Some(prev) if !prev.is_ascii_whitespace() => TokenKind::NsColon,
						_ => TokenKind::Colon,
					};
					self.punct(kind, ":", 1);
				}
				b'.' => self.punct(TokenKind::Dot, ".", 1),
				b',' => self.punct(TokenKind::Comma, ",", 1),
				b'/' => self.punct(TokenKind::Slash, "/", 1),
				b'*' => self.punct(TokenKind::Star, "*", 1),
				b'[' => self.punct(TokenKind::LBracket, "[", 1),
				b']' => self.punct(TokenKind::RBracket, "]", 1),
				b'(' => self.punct(TokenKind::LParen, "(", 1),
				b')' => self.punct(TokenKind::RParen, ")", 1),
				b'?' => self.punct(TokenKind::Question, "?", 1),
				b'|' => self.punct(TokenKind::Pipe, "|", 1),
				b'@' => self.punct(TokenKind::At, "@", 1),
				b'=' => self.punct(TokenKind::Equal, "=", 1),
				b'"' | b'\'' => self.read_string()?,
				b'+' | b'-' => self.read_number()?,
				b'0'..=b'9' => self.read_number()?,
				b'\\' => self.read_identifier(true)?,
				_ if byte.is_ascii_alphabetic() || byte == b'_' => self.read_identifier(false)?,
				_ => {
					let ch = self.chars[self.index..].chars().next().unwrap_or('?');
					return Err(SchemaError::msg(format_args!(
						"Unexpected character {ch:?} at line {}",
						self.line
					)));
				}
			}
		}
		self.tokens.push(Token {
			kind: TokenKind::Eof,
			text: String::new(),
			line: self.line,
		});
		Ok(self.tokens)
	}

	fn peek(&self, offset: usize) -> Option<u8> {
		self.text.get(self.index + offset).copied()
	}

	fn punct(&mut self, kind: TokenKind, text: &str, width: usize) {
		self.tokens.push(Token {
			kind,
			text: text.to_owned(),
			line: self.line,
		});
		self.index += width;
	}

	fn skip_comment(&mut self) {
		while let Some(&byte) = self.text.get(self.index) {
			self.index += 1;
			if byte == b'\n' {
				self.line += 1;
				break;
			}
		}
	}

	fn read_string(&mut self) -> Result<(), SchemaError> {
		let quote = self.text[self.index];
		let line = self.line;
		self.index += 1;
		let mut value = String::new();
		while let Some(&byte) = self.text.get(self.index) {
			match byte {
				_ if byte == quote => {
					self.index += 1;
					self.tokens.push(Token {
						kind: TokenKind::Str,
						text: value,
						line,
					});
					return Ok(());
				}
				b'\\' => value.push(self.decode_escape()?),
				b'\n' => {
					return Err(SchemaError::msg(format_args!(
						"Unterminated string literal at line {line}"
					)));
				}
				_ => {
					let ch = self.chars[self.index..].chars().next().expect("index is on a char boundary");
					value.push(ch);
					self.index += ch.len_utf8();
				}
			}
		}
		Err(SchemaError::msg(format_args!(
			"Unterminated string literal at line {line}"
		)))
	}

	fn decode_escape(&mut self) -> Result<char, SchemaError> {
		let esc = self
			.peek(1)
			.ok_or_else(|| SchemaError::msg(format_args!("Unterminated escape at line {}", self.line)))?;
		self.index += 2;
		Ok(match esc {
			b'n' => '\n',
			b't' => '\t',
			b'r' => '\r',
			b'"' | b'\'' | b'\\' | b'|' => esc as char,
			b'x' => self.hex_escape(2)?,
			b'u' => self.hex_escape(4)?,
			b'U' => self.hex_escape(8)?,
			_ => {
				return Err(SchemaError::msg(format_args!(
					"Unsupported escape sequence '\\{}' at line {}",
					esc as char, self.line
				)));
			}
		})
	}

	fn hex_escape(&mut self, digits: usize) -> Result<char, SchemaError> {
		let end = self.index + digits;
		let raw = self
			.chars
			.get(self.index..end)
			.ok_or_else(|| SchemaError::msg(format_args!("Incomplete hex escape at line {}", self.line)))?;
		let value = u32::from_str_radix(raw, 16)
			.map_err(|_| SchemaError::msg(format_args!("Invalid hex escape at line {}", self.line)))?;
		self.index = end;
		char::from_u32(value).ok_or_else(|| {
			SchemaError::msg(format_args!(
				"Escape does not denote a character at line {}",
				self.line
			))
		})
	}

	fn read_number(&mut self) -> Result<(), SchemaError> {
		let line = self.line;
		let start = self.index;
		let negative = match self.text[self.index] {
			b'-' => {
				self.index += 1;
				true
			}
			b'+' => {
				self.index += 1;
				false
			}
			_ => false,
		};
		let magnitude: u64 = if self.chars[self.index..].starts_with("0x")
			|| self.chars[self.index..].starts_with("0X")
		{
			self.index += 2;
			let digits_start = self.index;
			while matches!(self.text.get(self.index), Some(b) if b.is_ascii_hexdigit()) {
				self.index += 1;
			}
			if self.index == digits_start {
				return Err(SchemaError::msg(format_args!(
					"Hex literal must include digits at line {line}"
				)));
			}
			u64::from_str_radix(&self.chars[digits_start..self.index], 16)
		} else {
			let digits_start = self.index;
			while matches!(self.text.get(self.index), Some(b) if b.is_ascii_digit()) {
				self.index += 1;
			}
			if self.index == digits_start {
				return Err(SchemaError::msg(format_args!(
					"Invalid integer literal at line {line}"
				)));
			}
			self.chars[digits_start..self.index].parse()
		}
		.map_err(|_| {
			SchemaError::msg(format_args!(
				"Invalid integer literal {:?} at line {line}",
				&self.chars[start..self.index]
			))
		})?;
		// Numbers are normalized to their decimal form here so the parser
		// never needs to care about the source radix.
		let text = if negative {
			format!("-{magnitude}")
		} else {
			magnitude.to_string()
		};
		self.tokens.push(Token {
			kind: TokenKind::Number,
			text,
			line,
		});
		Ok(())
	}

	fn read_identifier(&mut self, quoted: bool) -> Result<(), SchemaError> {
		let line = self.line;
		if quoted {
			self.index += 1;
			if self.index >= self.text.len() {
				return Err(SchemaError::msg(format_args!(
					"Dangling escape at end of input at line {line}"
				)));
			}
		}
		let start = self.index;
		match self.text.get(self.index) {
			Some(&b) if b.is_ascii_alphabetic() || b == b'_' => self.index += 1,
			_ => {
				return Err(SchemaError::msg(format_args!(
					"Invalid identifier start at line {line}"
				)));
			}
		}
		while matches!(self.text.get(self.index), Some(&b) if b.is_ascii_alphanumeric() || b == b'_')
		{
			self.index += 1;
		}
		let literal = &self.chars[start..self.index];
		let kind = if quoted || !KEYWORDS.contains(&literal) {
			TokenKind::Ident
		} else {
			TokenKind::Keyword
		};
		self.tokens.push(Token {
			kind,
			text: literal.to_owned(),
			line,
		});
		Ok(())
	}
}
