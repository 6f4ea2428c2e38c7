//! Stop-bit variable-length integer coding used by Compact Binary
//!
//! Values are emitted little-endian in 7-bit chunks. The high bit of a
//! byte is the stop bit and marks the final byte; the 0x40 bit of that
//! final byte carries the sign. The single byte `0xC0` is a dedicated NULL
//! sentinel, so the one natural encoding that would collide with it (the
//! value -64) is emitted with an extra continuation byte instead.

use crate::error::DecodeError;

/// The NULL sentinel byte
pub const NULL_BYTE: u8 = 0xC0;

const STOP_BIT: u8 = 0x80;
const SIGN_BIT: u8 = 0x40;
const DATA_MASK: u8 = 0x7F;

/// An encoding never legitimately needs more than this many bytes for a
/// 64-bit value (ceil(64 / 7) = 10)
const MAX_LEN: usize = 10;

/// Append the NULL sentinel to `out`
pub fn write_null(out: &mut Vec<u8>) {
	out.push(NULL_BYTE);
}

/// Append the VLC encoding of a signed integer to `out`
pub fn write_i64(out: &mut Vec<u8>, value: i64) {
	if value == -64 {
		// The natural single-byte encoding would be 0xC0.
		out.extend_from_slice(&[SIGN_BIT, DATA_MASK | STOP_BIT]);
		return;
	}
	let mut remaining = value;
	loop {
		let byte = (remaining as u8) & DATA_MASK;
		remaining >>= 7;
		let sign_set = byte & SIGN_BIT != 0;
		let done = (remaining == 0 && !sign_set) || (remaining == -1 && sign_set);
		out.push(if done { byte | STOP_BIT } else { byte });
		if done {
			return;
		}
	}
}

/// Append the VLC encoding of an unsigned integer to `out`
///
/// For values that fit in `i64` this produces exactly the same bytes as
/// [`write_i64`]; larger values terminate on a byte whose sign bit is
/// clear, so they read back unsigned.
pub fn write_u64(out: &mut Vec<u8>, value: u64) {
	let mut remaining = value;
	loop {
		let byte = (remaining as u8) & DATA_MASK;
		remaining >>= 7;
		let done = remaining == 0 && byte & SIGN_BIT == 0;
		out.push(if done { byte | STOP_BIT } else { byte });
		if done {
			return;
		}
	}
}

/// Decode a signed VLC integer from `buf` starting at `offset`
///
/// Returns `None` for the NULL sentinel, plus the offset one past the
/// consumed bytes.
pub fn read_i64(buf: &[u8], offset: usize) -> Result<(Option<i64>, usize), DecodeError> {
	let (raw, next) = read_raw(buf, offset)?;
	Ok(match raw {
		Raw::Null => (None, next),
		Raw::Value { accum, shift, negative } => {
			let value = if negative && shift < 128 {
				accum | (!0u128 << shift)
			} else {
				accum
			};
			(Some(value as u64 as i64), next)
		}
	})
}

/// Decode an unsigned VLC integer from `buf` starting at `offset`
///
/// A terminal byte with the sign bit set denotes a negative value, which
/// cannot inhabit an unsigned field.
pub fn read_u64(buf: &[u8], offset: usize) -> Result<(Option<u64>, usize), DecodeError> {
	let (raw, next) = read_raw(buf, offset)?;
	Ok(match raw {
		Raw::Null => (None, next),
		Raw::Value { negative: true, .. } => {
			return Err(DecodeError::new("Negative VLC value in an unsigned position"));
		}
		Raw::Value { accum, .. } => (Some(accum as u64), next),
	})
}

enum Raw {
	Null,
	Value { accum: u128, shift: u32, negative: bool },
}

fn read_raw(buf: &[u8], offset: usize) -> Result<(Raw, usize), DecodeError> {
	let Some(&first) = buf.get(offset) else {
		return Err(DecodeError::new("Offset beyond end of buffer"));
	};
	if first == NULL_BYTE {
		return Ok((Raw::Null, offset + 1));
	}
	let mut accum: u128 = 0;
	let mut shift: u32 = 0;
	let mut index = offset;
	loop {
		let Some(&byte) = buf.get(index) else {
			return Err(DecodeError::new("Truncated VLC value"));
		};
		if index - offset >= MAX_LEN {
			return Err(DecodeError::new("VLC value exceeds 10 bytes"));
		}
		index += 1;
		accum |= u128::from(byte & DATA_MASK) << shift;
		shift += 7;
		if byte & STOP_BIT != 0 {
			return Ok((
				Raw::Value {
					accum,
					shift,
					negative: byte & SIGN_BIT != 0,
				},
				index,
			));
		}
	}
}
