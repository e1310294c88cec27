// crates/forwarder-gate-rpc/src/signer.rs
// ============================================================================
// Module: Operator Signer
// Description: Local signing of operator transactions.
// Purpose: Build raw forwarder writes so any node can relay them.
// Dependencies: alloy-consensus, alloy-eips, alloy-signer-local
// ============================================================================

//! ## Overview
//! [`OperatorSigner`] holds the operator's secp256k1 key and turns a
//! [`Submission`] into a signed raw transaction for `eth_sendRawTransaction`.
//! Signing is deterministic, so the same submission always yields the same
//! bytes and the same hash. The hash is therefore known before the node
//! answers.
//!
//! Supported envelopes: legacy with EIP-155 replay protection (`tx_type` 0)
//! and EIP-2930 with an empty access list (`tx_type` 1).
//!
//! Security posture: the key never appears in `Debug` output or errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::str::FromStr;

use alloy_consensus::SignableTransaction;
use alloy_consensus::TxEip2930;
use alloy_consensus::TxEnvelope;
use alloy_consensus::TxLegacy;
use alloy_eips::eip2718::Encodable2718;
use alloy_primitives::B256;
use alloy_primitives::Bytes;
use alloy_primitives::Signature;
use alloy_primitives::TxKind;
use alloy_primitives::U256;
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use forwarder_gate_core::Address;
use forwarder_gate_core::Submission;
use forwarder_gate_core::TxHash;
use thiserror::Error;

use crate::abi::encode_command;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Signing failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SignerError {
    /// Key material could not be parsed.
    #[error("operator key is not a valid secp256k1 private key")]
    InvalidKey,
    /// Envelope type outside the supported set.
    #[error("unsupported transaction type {0}")]
    UnsupportedTxType(u8),
    /// Signature computation failed.
    #[error("signing failed: {0}")]
    Signing(String),
}

// ============================================================================
// SECTION: Signed Transactions
// ============================================================================

/// Raw transaction ready for broadcast.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedSubmission {
    /// EIP-2718 encoded bytes.
    pub raw: Vec<u8>,
    /// Transaction hash.
    pub tx_hash: TxHash,
}

impl SignedSubmission {
    /// Returns the `0x`-prefixed hex form used on the wire.
    #[must_use]
    pub fn raw_hex(&self) -> String {
        format!("0x{}", hex::encode(&self.raw))
    }
}

// ============================================================================
// SECTION: Signer
// ============================================================================

/// Operator key bound to one forwarder contract.
pub struct OperatorSigner {
    /// Local secp256k1 signer.
    signer: PrivateKeySigner,
    /// Address derived from the key.
    address: Address,
}

impl OperatorSigner {
    /// Parses a hex private key, with or without a `0x` prefix.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::InvalidKey`] when the key is malformed.
    pub fn from_hex(key: &str) -> Result<Self, SignerError> {
        let signer = PrivateKeySigner::from_str(key.trim()).map_err(|_| SignerError::InvalidKey)?;
        let address = Address::from_bytes(signer.address().into_array());
        Ok(Self {
            signer,
            address,
        })
    }

    /// Returns the operator address derived from the key.
    #[must_use]
    pub const fn address(&self) -> Address {
        self.address
    }

    /// Signs `submission` as a call to `contract`.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError`] for unsupported envelopes or signing failures.
    pub fn sign(
        &self,
        contract: Address,
        submission: &Submission,
    ) -> Result<SignedSubmission, SignerError> {
        let params = submission.params;
        let to = TxKind::Call(alloy_primitives::Address::from(*contract.as_bytes()));
        let input = Bytes::from(encode_command(&submission.command));
        let envelope = match params.tx_type {
            0 => {
                let tx = TxLegacy {
                    chain_id: Some(params.chain_id),
                    nonce: submission.position,
                    gas_price: params.gas_price,
                    gas_limit: params.gas_limit,
                    to,
                    value: U256::ZERO,
                    input,
                };
                let signature = self.sign_hash(&tx.signature_hash())?;
                TxEnvelope::from(tx.into_signed(signature))
            }
            1 => {
                let tx = TxEip2930 {
                    chain_id: params.chain_id,
                    nonce: submission.position,
                    gas_price: params.gas_price,
                    gas_limit: params.gas_limit,
                    to,
                    value: U256::ZERO,
                    input,
                    ..TxEip2930::default()
                };
                let signature = self.sign_hash(&tx.signature_hash())?;
                TxEnvelope::from(tx.into_signed(signature))
            }
            other => return Err(SignerError::UnsupportedTxType(other)),
        };
        Ok(SignedSubmission {
            raw: envelope.encoded_2718(),
            tx_hash: TxHash::from_bytes(envelope.tx_hash().0),
        })
    }

    /// Signs a 32-byte digest.
    fn sign_hash(&self, digest: &B256) -> Result<Signature, SignerError> {
        self.signer.sign_hash_sync(digest).map_err(|err| SignerError::Signing(err.to_string()))
    }
}

impl fmt::Debug for OperatorSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OperatorSigner").field("address", &self.address).finish_non_exhaustive()
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
