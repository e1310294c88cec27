// crates/forwarder-gate-core/src/core/amounts.rs
// ============================================================================
// Module: Forwarder Gate Amounts
// Description: Unsigned 256-bit gas quantities with decimal wire forms.
// Purpose: Keep quota arithmetic exact and overflow-safe across the gateway.
// Dependencies: alloy-primitives, serde
// ============================================================================

//! ## Overview
//! Gas quantities mirror the ledger's unsigned 256-bit integers. They
//! serialize as decimal strings so no precision is lost in JSON, and accept
//! either decimal strings or non-negative JSON integers on input. All quota
//! arithmetic saturates instead of wrapping.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use alloy_primitives::U256;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde::de;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while parsing decimal quantities.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmountError {
    /// Input was empty or contained non-digit characters.
    #[error("invalid decimal quantity: {0}")]
    Invalid(String),
    /// Input exceeded the representable range.
    #[error("quantity out of range: {0}")]
    OutOfRange(String),
}

// ============================================================================
// SECTION: Gas
// ============================================================================

/// Unsigned gas quantity.
///
/// # Invariants
/// - Never negative; arithmetic helpers saturate at `0` and `U256::MAX`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Gas(U256);

impl Gas {
    /// Zero gas.
    pub const ZERO: Self = Self(U256::ZERO);

    /// Creates a gas quantity from a `u64`.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(U256::from_limbs([value, 0, 0, 0]))
    }

    /// Wraps a raw 256-bit value.
    #[must_use]
    pub const fn from_u256(value: U256) -> Self {
        Self(value)
    }

    /// Returns the raw 256-bit value.
    #[must_use]
    pub const fn get(self) -> U256 {
        self.0
    }

    /// Returns true when the quantity is zero.
    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0.is_zero()
    }

    /// Adds two quantities, saturating at the maximum.
    #[must_use]
    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Subtracts two quantities, saturating at zero.
    #[must_use]
    pub fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Parses a base-10 quantity.
    ///
    /// # Errors
    ///
    /// Returns [`AmountError`] when the input is empty, non-decimal, or too large.
    pub fn parse_decimal(input: &str) -> Result<Self, AmountError> {
        let trimmed = input.trim();
        if trimmed.is_empty() || !trimmed.bytes().all(|byte| byte.is_ascii_digit()) {
            return Err(AmountError::Invalid(input.to_string()));
        }
        U256::from_str_radix(trimmed, 10)
            .map(Self)
            .map_err(|_| AmountError::OutOfRange(input.to_string()))
    }

    /// Returns the quantity as `u64` when it fits.
    #[must_use]
    pub fn to_u64(self) -> Option<u64> {
        u256_to_u64(self.0)
    }
}

impl fmt::Display for Gas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for Gas {
    fn from(value: u64) -> Self {
        Self::new(value)
    }
}

impl Serialize for Gas {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Gas {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(GasVisitor)
    }
}

/// Visitor accepting decimal strings or non-negative integers.
struct GasVisitor;

impl de::Visitor<'_> for GasVisitor {
    type Value = Gas;

    fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("a non-negative integer or decimal string")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<Self::Value, E> {
        Ok(Gas::new(value))
    }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<Self::Value, E> {
        u64::try_from(value)
            .map(Gas::new)
            .map_err(|_| E::custom(format!("quantity must be non-negative: {value}")))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<Self::Value, E> {
        Gas::parse_decimal(value).map_err(E::custom)
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Narrows a 256-bit value to `u64` when the upper limbs are zero.
#[must_use]
pub fn u256_to_u64(value: U256) -> Option<u64> {
    let limbs = value.as_limbs();
    if limbs[1] == 0 && limbs[2] == 0 && limbs[3] == 0 { Some(limbs[0]) } else { None }
}

/// Serde adapter rendering `u64` ledger quantities as decimal strings.
///
/// Block numbers, timestamps, and durations use this so every integer the
/// ledger stores as a word keeps one wire form.
pub mod decimal_u64 {
    use serde::Deserialize;
    use serde::Deserializer;
    use serde::Serializer;

    use super::Gas;

    /// Serializes a `u64` as a decimal string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    /// Deserializes a `u64` from a decimal string or integer.
    ///
    /// # Errors
    ///
    /// Returns an error when the value is malformed or exceeds `u64`.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let gas = Gas::deserialize(deserializer)?;
        gas.to_u64().ok_or_else(|| serde::de::Error::custom("quantity exceeds u64"))
    }
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
    fn gas_serializes_as_decimal_string() {
        let json = serde_json::to_string(&Gas::new(5_000_000)).unwrap();
        assert_eq!(json, "\"5000000\"");
    }

    #[test]
    fn gas_accepts_strings_and_integers() {
        let from_str: Gas = serde_json::from_str("\"123\"").unwrap();
        let from_int: Gas = serde_json::from_str("123").unwrap();
        assert_eq!(from_str, from_int);
        assert!(serde_json::from_str::<Gas>("-1").is_err());
        assert!(serde_json::from_str::<Gas>("\"12a\"").is_err());
        assert!(serde_json::from_str::<Gas>("\"\"").is_err());
    }

    #[test]
    fn gas_arithmetic_saturates() {
        let max = Gas::from_u256(U256::MAX);
        assert_eq!(max.saturating_add(Gas::new(1)), max);
        assert_eq!(Gas::new(3).saturating_sub(Gas::new(5)), Gas::ZERO);
    }

    #[test]
    fn u256_narrowing_rejects_large_values() {
        assert_eq!(u256_to_u64(U256::from(7u64)), Some(7));
        assert_eq!(u256_to_u64(U256::MAX), None);
    }
}
