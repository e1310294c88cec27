// crates/forwarder-gate-rpc/src/abi.rs
// ============================================================================
// Module: Forwarder ABI Codec
// Description: Call data encoding and return data decoding for the forwarder contract.
// Purpose: Translate commands and queries to contract calls and back.
// Dependencies: alloy-primitives, forwarder-gate-core
// ============================================================================

//! ## Overview
//! Minimal Solidity ABI codec covering exactly the forwarder contract surface:
//! static words (`address`, `bool`, `uint64`, `uint256`), static tuples, and
//! one-dimensional `address[]` / `bool[]` arrays. Return data is untrusted;
//! every word is range-checked before it becomes a typed value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use alloy_primitives::U256;
use alloy_primitives::keccak256;
use forwarder_gate_core::Address;
use forwarder_gate_core::BlockGasCounter;
use forwarder_gate_core::Command;
use forwarder_gate_core::DeployWindowState;
use forwarder_gate_core::DeployerRecord;
use forwarder_gate_core::Gas;
use forwarder_gate_core::LedgerQuery;
use forwarder_gate_core::LedgerValue;
use forwarder_gate_core::u256_to_u64;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// ABI word size in bytes.
const WORD: usize = 32;
/// Selector of the standard `Error(string)` revert payload.
const ERROR_STRING_SELECTOR: [u8; 4] = [0x08, 0xc3, 0x79, 0xa0];
/// Upper bound on decoded array lengths.
pub const MAX_ARRAY_LEN: usize = 100_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Return data decoding failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AbiError {
    /// Return data ended before the expected word.
    #[error("return data truncated at word {index}")]
    Truncated {
        /// Word index that was missing.
        index: usize,
    },
    /// A word did not hold a valid value of the expected type.
    #[error("invalid {kind} word at index {index}")]
    InvalidWord {
        /// Expected ABI type.
        kind: &'static str,
        /// Word index.
        index: usize,
    },
    /// A dynamic offset or length was out of range.
    #[error("invalid dynamic offset at word {index}")]
    InvalidOffset {
        /// Word index holding the offset.
        index: usize,
    },
    /// The view has no contract call form.
    #[error("view {0} is not a contract call")]
    NotACall(&'static str),
}

// ============================================================================
// SECTION: Tokens
// ============================================================================

/// Encodable argument.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    /// `address`.
    Address(Address),
    /// `bool`.
    Bool(bool),
    /// `uint64` or `uint256`.
    Uint(U256),
    /// `address[]`.
    Addresses(Vec<Address>),
    /// `bool[]`.
    Bools(Vec<bool>),
}

impl Token {
    /// Returns true for tail-encoded types.
    const fn is_dynamic(&self) -> bool {
        matches!(self, Self::Addresses(_) | Self::Bools(_))
    }
}

/// Computes the 4-byte function selector for a canonical signature.
#[must_use]
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// Left-pads an address to a word.
fn address_word(address: &Address) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[12 ..].copy_from_slice(address.as_bytes());
    word
}

/// Encodes a bool as a word.
fn bool_word(value: bool) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[WORD - 1] = u8::from(value);
    word
}

/// Encodes an unsigned integer as a word.
fn uint_word(value: U256) -> [u8; WORD] {
    value.to_be_bytes::<WORD>()
}

/// Encodes a `usize` length or offset as a word.
fn usize_word(value: usize) -> [u8; WORD] {
    uint_word(U256::from(value))
}

/// Encodes `signature(args...)` call data.
fn encode_call(signature: &str, args: &[Token]) -> Vec<u8> {
    let head_len = args.len() * WORD;
    let mut head = Vec::with_capacity(head_len);
    let mut tail: Vec<u8> = Vec::new();
    for arg in args {
        if arg.is_dynamic() {
            head.extend_from_slice(&usize_word(head_len + tail.len()));
            match arg {
                Token::Addresses(items) => {
                    tail.extend_from_slice(&usize_word(items.len()));
                    for item in items {
                        tail.extend_from_slice(&address_word(item));
                    }
                }
                Token::Bools(items) => {
                    tail.extend_from_slice(&usize_word(items.len()));
                    for item in items {
                        tail.extend_from_slice(&bool_word(*item));
                    }
                }
                Token::Address(_) | Token::Bool(_) | Token::Uint(_) => {}
            }
        } else {
            let word = match arg {
                Token::Address(address) => address_word(address),
                Token::Bool(value) => bool_word(*value),
                Token::Uint(value) => uint_word(*value),
                Token::Addresses(_) | Token::Bools(_) => [0u8; WORD],
            };
            head.extend_from_slice(&word);
        }
    }
    let mut data = Vec::with_capacity(4 + head.len() + tail.len());
    data.extend_from_slice(&selector(signature));
    data.extend_from_slice(&head);
    data.extend_from_slice(&tail);
    data
}

// ============================================================================
// SECTION: Call Encoding
// ============================================================================

/// Encodes the contract call data for an administrative command.
#[must_use]
pub fn encode_command(command: &Command) -> Vec<u8> {
    match command {
        Command::SetCallerAllowed {
            caller,
            allowed,
        } => encode_call("setCallerAllowed(address,bool)", &[
            Token::Address(*caller),
            Token::Bool(*allowed),
        ]),
        Command::SetCallerGasLimit {
            caller,
            limit,
        } => encode_call("setGasLimitPerBlock(address,uint256)", &[
            Token::Address(*caller),
            Token::Uint(limit.get()),
        ]),
        Command::SetDeployerAllowed {
            deployer,
            allowed,
        } => encode_call("setAllowedDeployer(address,bool)", &[
            Token::Address(*deployer),
            Token::Bool(*allowed),
        ]),
        Command::SetDeployerBucket {
            deployer,
            limit,
            duration_seconds,
            use_custom,
        } => encode_call("setDeployerBucketConfig(address,uint256,uint64,bool)", &[
            Token::Address(*deployer),
            Token::Uint(limit.get()),
            Token::Uint(U256::from(*duration_seconds)),
            Token::Bool(*use_custom),
        ]),
        Command::SetErc2771 {
            enabled,
        } => encode_call("setErc2771AppendSender(bool)", &[Token::Bool(*enabled)]),
        Command::SetGasOverhead {
            overhead,
        } => encode_call("setGasAccountingOverhead(uint256)", &[Token::Uint(overhead.get())]),
        Command::SetDefaultBucket {
            limit,
            duration_seconds,
        } => encode_call("setDefaultDeployGasBucketConfig(uint256,uint64)", &[
            Token::Uint(limit.get()),
            Token::Uint(U256::from(*duration_seconds)),
        ]),
        Command::BatchSetDeployers {
            deployers,
            allowed,
        } => encode_call("setAllowedDeployers(address[],bool[])", &[
            Token::Addresses(deployers.clone()),
            Token::Bools(allowed.clone()),
        ]),
    }
}

/// Encodes the contract call data for a view.
///
/// # Errors
///
/// Returns [`AbiError::NotACall`] for [`LedgerQuery::BlockNumber`], which is
/// served by the node rather than the contract.
pub fn encode_query(query: &LedgerQuery) -> Result<Vec<u8>, AbiError> {
    let data = match query {
        LedgerQuery::BlockNumber => return Err(AbiError::NotACall(query.view_name())),
        LedgerQuery::Owner => encode_call("owner()", &[]),
        LedgerQuery::Erc2771AppendSender => encode_call("erc2771AppendSender()", &[]),
        LedgerQuery::GasAccountingOverhead => encode_call("gasAccountingOverhead()", &[]),
        LedgerQuery::DefaultDeployGasBucketLimit => {
            encode_call("defaultDeployGasBucketLimit()", &[])
        }
        LedgerQuery::DefaultDeployGasBucketDuration => {
            encode_call("defaultDeployGasBucketDuration()", &[])
        }
        LedgerQuery::IsCallerAllowed(caller) => {
            encode_call("isCallerAllowed(address)", &[Token::Address(*caller)])
        }
        LedgerQuery::GasLimitPerBlock(caller) => {
            encode_call("gasLimitPerBlock(address)", &[Token::Address(*caller)])
        }
        LedgerQuery::GasUsedThisBlock(caller) => {
            encode_call("gasUsedThisBlock(address)", &[Token::Address(*caller)])
        }
        LedgerQuery::AllowedCallers => encode_call("getAllowedCallers()", &[]),
        LedgerQuery::IsDeployerAllowed(deployer) => {
            encode_call("allowedDeployers(address)", &[Token::Address(*deployer)])
        }
        LedgerQuery::DeployerInfo(deployer) => {
            encode_call("getDeployerInfo(address)", &[Token::Address(*deployer)])
        }
        LedgerQuery::DeployGasWindowState(deployer) => {
            encode_call("deployGasWindowState(address)", &[Token::Address(*deployer)])
        }
        LedgerQuery::AllowedDeployers => encode_call("getAllowedDeployers()", &[]),
    };
    Ok(data)
}

// ============================================================================
// SECTION: Return Decoding
// ============================================================================

/// Word-indexed view over ABI return data.
struct Words<'a> {
    /// Raw return bytes.
    data: &'a [u8],
}

impl<'a> Words<'a> {
    /// Wraps raw return data.
    const fn new(data: &'a [u8]) -> Self {
        Self {
            data,
        }
    }

    /// Returns the word at `index`.
    fn word(&self, index: usize) -> Result<&'a [u8], AbiError> {
        let start = index.checked_mul(WORD).ok_or(AbiError::Truncated {
            index,
        })?;
        let end = start.checked_add(WORD).ok_or(AbiError::Truncated {
            index,
        })?;
        self.data.get(start .. end).ok_or(AbiError::Truncated {
            index,
        })
    }

    /// Decodes a `uint256`.
    fn uint(&self, index: usize) -> Result<U256, AbiError> {
        Ok(U256::from_be_slice(self.word(index)?))
    }

    /// Decodes a `uint64` or a `uint256` that must fit 64 bits.
    fn uint64(&self, index: usize) -> Result<u64, AbiError> {
        u256_to_u64(self.uint(index)?).ok_or(AbiError::InvalidWord {
            kind: "uint64",
            index,
        })
    }

    /// Decodes a gas quantity.
    fn gas(&self, index: usize) -> Result<Gas, AbiError> {
        Ok(Gas::from_u256(self.uint(index)?))
    }

    /// Decodes a `bool`, rejecting values other than 0 and 1.
    fn bool(&self, index: usize) -> Result<bool, AbiError> {
        let word = self.word(index)?;
        let (padding, last) = word.split_at(WORD - 1);
        if padding.iter().any(|byte| *byte != 0) || last[0] > 1 {
            return Err(AbiError::InvalidWord {
                kind: "bool",
                index,
            });
        }
        Ok(last[0] == 1)
    }

    /// Decodes an `address`, rejecting dirty upper bytes.
    fn address(&self, index: usize) -> Result<Address, AbiError> {
        let word = self.word(index)?;
        let (padding, body) = word.split_at(12);
        if padding.iter().any(|byte| *byte != 0) {
            return Err(AbiError::InvalidWord {
                kind: "address",
                index,
            });
        }
        let mut bytes = [0u8; 20];
        bytes.copy_from_slice(body);
        Ok(Address::from_bytes(bytes))
    }

    /// Decodes an `address[]` whose offset lives at word `index`.
    fn addresses(&self, index: usize) -> Result<Vec<Address>, AbiError> {
        let offset = self.usize_at(index)?;
        if offset % WORD != 0 {
            return Err(AbiError::InvalidOffset {
                index,
            });
        }
        let base = offset / WORD;
        let len = self.usize_at(base)?;
        if len > MAX_ARRAY_LEN {
            return Err(AbiError::InvalidOffset {
                index: base,
            });
        }
        let mut items = Vec::with_capacity(len);
        for position in 0 .. len {
            items.push(self.address(base + 1 + position)?);
        }
        Ok(items)
    }

    /// Decodes a word as a bounded `usize` offset or length.
    fn usize_at(&self, index: usize) -> Result<usize, AbiError> {
        let value = self.uint64(index).map_err(|_| AbiError::InvalidOffset {
            index,
        })?;
        usize::try_from(value).map_err(|_| AbiError::InvalidOffset {
            index,
        })
    }
}

/// Decodes view return data into the value shape for `query`.
///
/// # Errors
///
/// Returns [`AbiError`] when the data is truncated or holds out-of-range words.
pub fn decode_query(query: &LedgerQuery, data: &[u8]) -> Result<LedgerValue, AbiError> {
    let words = Words::new(data);
    let value = match query {
        LedgerQuery::BlockNumber => return Err(AbiError::NotACall(query.view_name())),
        LedgerQuery::Owner => LedgerValue::Address(words.address(0)?),
        LedgerQuery::Erc2771AppendSender
        | LedgerQuery::IsCallerAllowed(_)
        | LedgerQuery::IsDeployerAllowed(_) => LedgerValue::Bool(words.bool(0)?),
        LedgerQuery::GasAccountingOverhead
        | LedgerQuery::DefaultDeployGasBucketLimit
        | LedgerQuery::GasLimitPerBlock(_) => LedgerValue::Gas(words.gas(0)?),
        LedgerQuery::DefaultDeployGasBucketDuration => LedgerValue::Quantity(words.uint64(0)?),
        LedgerQuery::GasUsedThisBlock(_) => LedgerValue::BlockCounter(BlockGasCounter {
            used: words.gas(0)?,
            limit: words.gas(1)?,
            block_number: words.uint64(2)?,
        }),
        LedgerQuery::AllowedCallers | LedgerQuery::AllowedDeployers => {
            LedgerValue::Addresses(words.addresses(0)?)
        }
        LedgerQuery::DeployerInfo(_) => LedgerValue::Deployer(DeployerRecord {
            deployer: words.address(0)?,
            allowed: words.bool(1)?,
            gas_used_in_window: words.gas(2)?,
            window_started_at: words.uint64(3)?,
            last_deploy_block: words.uint64(4)?,
            gas_bucket_limit: words.gas(5)?,
            gas_bucket_duration: words.uint64(6)?,
            use_custom_config: words.bool(7)?,
        }),
        LedgerQuery::DeployGasWindowState(_) => LedgerValue::WindowState(DeployWindowState {
            used: words.gas(0)?,
            limit: words.gas(1)?,
            started_at: words.uint64(2)?,
            duration: words.uint64(3)?,
            now: words.uint64(4)?,
        }),
    };
    Ok(value)
}

/// Extracts the message from an `Error(string)` revert payload.
#[must_use]
pub fn decode_revert_reason(data: &[u8]) -> Option<String> {
    let body = data.strip_prefix(&ERROR_STRING_SELECTOR)?;
    let words = Words::new(body);
    let offset = words.usize_at(0).ok()?;
    let len = words.usize_at(offset / WORD).ok()?;
    let start = offset.checked_add(WORD)?;
    let end = start.checked_add(len)?;
    let bytes = body.get(start .. end)?;
    String::from_utf8(bytes.to_vec()).ok()
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
        reason = "Test-only assertions are permitted."
    )]

    use super::*;

    fn address(byte: u8) -> Address {
        Address::from_bytes([byte; 20])
    }

    #[test]
    fn selectors_match_known_values() {
        assert_eq!(hex::encode(selector("owner()")), "8da5cb5b");
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn static_call_is_selector_plus_words() {
        let data = encode_command(&Command::SetCallerAllowed {
            caller: address(0xab),
            allowed: true,
        });
        assert_eq!(data.len(), 4 + 2 * WORD);
        assert_eq!(&data[.. 4], &selector("setCallerAllowed(address,bool)"));
        assert_eq!(&data[4 + 12 .. 4 + WORD], &[0xab; 20]);
        assert_eq!(data[4 + 2 * WORD - 1], 1);
    }

    #[test]
    fn batch_call_uses_offsets_for_both_arrays() {
        let data = encode_command(&Command::BatchSetDeployers {
            deployers: vec![address(1), address(2)],
            allowed: vec![true, false],
        });
        let words = Words::new(&data[4 ..]);
        assert_eq!(words.usize_at(0).unwrap(), 2 * WORD);
        assert_eq!(words.usize_at(1).unwrap(), 5 * WORD);
        assert_eq!(words.usize_at(2).unwrap(), 2);
        assert_eq!(words.address(3).unwrap(), address(1));
        assert_eq!(words.address(4).unwrap(), address(2));
        assert_eq!(words.usize_at(5).unwrap(), 2);
        assert!(words.bool(6).unwrap());
        assert!(!words.bool(7).unwrap());
        assert_eq!(data.len(), 4 + 8 * WORD);
    }

    #[test]
    fn address_array_return_decodes() {
        let mut data = Vec::new();
        data.extend_from_slice(&usize_word(WORD));
        data.extend_from_slice(&usize_word(2));
        data.extend_from_slice(&address_word(&address(7)));
        data.extend_from_slice(&address_word(&address(8)));
        let value = decode_query(&LedgerQuery::AllowedCallers, &data).unwrap();
        assert_eq!(value, LedgerValue::Addresses(vec![address(7), address(8)]));
    }

    #[test]
    fn dirty_bool_is_rejected() {
        let mut word = [0u8; WORD];
        word[WORD - 1] = 2;
        let error = decode_query(&LedgerQuery::Erc2771AppendSender, &word).unwrap_err();
        assert_eq!(error, AbiError::InvalidWord {
            kind: "bool",
            index: 0,
        });
    }

    #[test]
    fn truncated_tuple_is_rejected() {
        let data = [0u8; 2 * WORD];
        let error = decode_query(&LedgerQuery::GasUsedThisBlock(address(1)), &data).unwrap_err();
        assert_eq!(error, AbiError::Truncated {
            index: 2,
        });
    }

    #[test]
    fn oversized_array_length_is_rejected() {
        let mut data = Vec::new();
        data.extend_from_slice(&usize_word(WORD));
        data.extend_from_slice(&usize_word(MAX_ARRAY_LEN + 1));
        assert!(decode_query(&LedgerQuery::AllowedDeployers, &data).is_err());
    }

    #[test]
    fn revert_reason_is_extracted() {
        let reason = b"zero address";
        let mut data = ERROR_STRING_SELECTOR.to_vec();
        data.extend_from_slice(&usize_word(WORD));
        data.extend_from_slice(&usize_word(reason.len()));
        let mut padded = [0u8; WORD];
        padded[.. reason.len()].copy_from_slice(reason);
        data.extend_from_slice(&padded);
        assert_eq!(decode_revert_reason(&data).as_deref(), Some("zero address"));
        assert_eq!(decode_revert_reason(&[0u8; 4]), None);
    }
}
