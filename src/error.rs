use std::borrow::Cow;

/// Any error that may happen while encoding a message
///
/// Covers missing required fields, type mismatches between a value and its
/// schema type, and constructs a codec cannot express.
#[derive(thiserror::Error)]
#[error("{}", inner)]
pub struct EncodeError {
	inner: Box<Cow<'static, str>>,
}

impl std::fmt::Debug for EncodeError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&**self.inner, f)
	}
}

impl EncodeError {
	/// If you need a dynamic string use `EncodeError::msg(format_args!(...))`
	pub(crate) fn new(s: &'static str) -> Self {
		Self {
			inner: Box::new(Cow::Borrowed(s)),
		}
	}

	pub(crate) fn msg(s: std::fmt::Arguments<'_>) -> Self {
		Self::display(s)
	}

	pub(crate) fn display(s: impl std::fmt::Display) -> Self {
		Self {
			inner: Box::new(Cow::Owned(s.to_string())),
		}
	}
}

/// Any error that may happen while decoding bytes or text into values
///
/// Covers truncation, invalid tokens and unknown type ids in strict mode.
#[derive(thiserror::Error)]
#[error("{}", inner)]
pub struct DecodeError {
	inner: Box<Cow<'static, str>>,
}

impl std::fmt::Debug for DecodeError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		std::fmt::Debug::fmt(&**self.inner, f)
	}
}

impl DecodeError {
	/// If you need a dynamic string use `DecodeError::msg(format_args!(...))`
	pub(crate) fn new(s: &'static str) -> Self {
		Self {
			inner: Box::new(Cow::Borrowed(s)),
		}
	}

	pub(crate) fn msg(s: std::fmt::Arguments<'_>) -> Self {
		Self::display(s)
	}

	pub(crate) fn display(s: impl std::fmt::Display) -> Self {
		Self {
			inner: Box::new(Cow::Owned(s.to_string())),
		}
	}
}
