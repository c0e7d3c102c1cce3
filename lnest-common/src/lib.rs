#![forbid(unsafe_code)]

//! Small helpers shared by the lnest crates

extern crate alloc;

use alloc::string::String;
use core::fmt;

/// Lowercase hex encoding for anything byte-like
pub trait HexEncode {
	fn to_hex(&self) -> String;
}

impl<T: hex::ToHex> HexEncode for T {
	fn to_hex(&self) -> String {
		self.encode_hex()
	}
}

/// Error decoding a fixed-size hex value
#[derive(Debug, Clone, PartialEq)]
pub enum HexArrayError {
	/// Not valid hex
	Invalid(hex::FromHexError),
	/// Valid hex, but the decoded length is wrong
	Length { expected: usize, actual: usize },
}

impl fmt::Display for HexArrayError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			HexArrayError::Invalid(e) => write!(f, "invalid hex: {}", e),
			HexArrayError::Length { expected, actual } =>
				write!(f, "expected {} bytes, got {}", expected, actual),
		}
	}
}

impl std::error::Error for HexArrayError {}

/// Decode a hex string into a fixed-size byte array, such as a seed or a hash
pub fn hex_to_array<const N: usize>(s: &str) -> Result<[u8; N], HexArrayError> {
	let v = hex::decode(s).map_err(HexArrayError::Invalid)?;
	let len = v.len();
	v.try_into().map_err(|_| HexArrayError::Length { expected: N, actual: len })
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn hex_to_array_test() {
		let a: [u8; 4] = hex_to_array("deadbeef").unwrap();
		assert_eq!(a, [0xde, 0xad, 0xbe, 0xef]);
		assert_eq!(a.to_hex(), "deadbeef");
		assert_eq!(
			hex_to_array::<3>("deadbeef"),
			Err(HexArrayError::Length { expected: 3, actual: 4 })
		);
		assert!(matches!(hex_to_array::<1>("zz"), Err(HexArrayError::Invalid(_))));
	}
}
