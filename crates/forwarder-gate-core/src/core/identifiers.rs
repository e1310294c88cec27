// crates/forwarder-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Forwarder Gate Identifiers
// Description: Ledger account addresses and transaction hashes.
// Purpose: Provide strongly typed, validated identifiers with stable wire forms.
// Dependencies: hex, serde, thiserror
// ============================================================================

//! ## Overview
//! Identifiers used by the gateway are fixed-width byte strings rendered as
//! `0x`-prefixed lowercase hex. Parsing is strict: the `0x` prefix is required
//! and the digit count must match exactly. Anything else is rejected at the
//! boundary so malformed input never reaches the ledger.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Number of bytes in a ledger account address.
pub const ADDRESS_BYTES: usize = 20;

/// Number of bytes in a transaction hash.
pub const TX_HASH_BYTES: usize = 32;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing hex identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdentifierError {
    /// Input did not start with `0x`.
    #[error("missing 0x prefix")]
    MissingPrefix,
    /// Input had the wrong number of hex digits.
    #[error("expected {expected} hex digits, found {found}")]
    InvalidLength {
        /// Expected digit count.
        expected: usize,
        /// Observed digit count.
        found: usize,
    },
    /// Input contained a non-hex character.
    #[error("invalid hex digit")]
    InvalidHex,
}

// ============================================================================
// SECTION: Address
// ============================================================================

/// Ledger account address (20 bytes).
///
/// # Invariants
/// - Textual form is always `0x` followed by 40 lowercase hex digits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address([u8; ADDRESS_BYTES]);

impl Address {
    /// The all-zero address.
    pub const ZERO: Self = Self([0u8; ADDRESS_BYTES]);

    /// Creates an address from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; ADDRESS_BYTES]) -> Self {
        Self(bytes)
    }

    /// Returns the raw address bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; ADDRESS_BYTES] {
        &self.0
    }

    /// Returns true for the all-zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; ADDRESS_BYTES]
    }

    /// Parses a `0x`-prefixed, 40 hex digit address.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the prefix, length, or digits are invalid.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        decode_fixed::<ADDRESS_BYTES>(input).map(Self)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = IdentifierError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Transaction Hash
// ============================================================================

/// Confirmation identifier of a submitted ledger transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TxHash([u8; TX_HASH_BYTES]);

impl TxHash {
    /// Creates a transaction hash from raw bytes.
    #[must_use]
    pub const fn from_bytes(bytes: [u8; TX_HASH_BYTES]) -> Self {
        Self(bytes)
    }

    /// Returns the raw hash bytes.
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; TX_HASH_BYTES] {
        &self.0
    }

    /// Parses a `0x`-prefixed, 64 hex digit transaction hash.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when the prefix, length, or digits are invalid.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        decode_fixed::<TX_HASH_BYTES>(input).map(Self)
    }
}

impl fmt::Display for TxHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl Serialize for TxHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TxHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Decodes a `0x`-prefixed hex string into exactly `N` bytes.
fn decode_fixed<const N: usize>(input: &str) -> Result<[u8; N], IdentifierError> {
    let digits = input.strip_prefix("0x").ok_or(IdentifierError::MissingPrefix)?;
    if digits.len() != N * 2 {
        return Err(IdentifierError::InvalidLength {
            expected: N * 2,
            found: digits.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(digits, &mut out).map_err(|_| IdentifierError::InvalidHex)?;
    Ok(out)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::use_debug,
        reason = "Test-only assertions favor direct unwraps and debug output."
    )]

    use super::*;

    #[test]
    fn address_round_trips_lowercase() {
        let address = Address::parse("0xAbCdEf0123456789abcdef0123456789ABCDEF01").unwrap();
        assert_eq!(address.to_string(), "0xabcdef0123456789abcdef0123456789abcdef01");
    }

    #[test]
    fn address_requires_prefix_and_length() {
        assert_eq!(
            Address::parse("abcdef0123456789abcdef0123456789abcdef01"),
            Err(IdentifierError::MissingPrefix)
        );
        assert_eq!(
            Address::parse("0x1234"),
            Err(IdentifierError::InvalidLength {
                expected: 40,
                found: 4,
            })
        );
        assert_eq!(
            Address::parse("0xzz00000000000000000000000000000000000000"),
            Err(IdentifierError::InvalidHex)
        );
    }

    #[test]
    fn address_deserialize_rejects_malformed_input() {
        let result: Result<Address, _> = serde_json::from_str("\"0x12\"");
        assert!(result.is_err());
    }
}
