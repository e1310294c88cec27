//! Query gateway tests for Forwarder Gate core.
// crates/forwarder-gate-core/tests/gateway.rs
// ============================================================================
// Module: Query Gateway Tests
// Description: Composite status reads against the in-memory ledger.
// Purpose: Ensure reads reflect ledger state, apply resets, and stay idempotent.
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use std::sync::Arc;

use forwarder_gate_core::Address;
use forwarder_gate_core::BucketSource;
use forwarder_gate_core::Command;
use forwarder_gate_core::CommandSerializer;
use forwarder_gate_core::FixedTxParams;
use forwarder_gate_core::Gas;
use forwarder_gate_core::GatewayIdentity;
use forwarder_gate_core::InMemoryLedger;
use forwarder_gate_core::LedgerError;
use forwarder_gate_core::NoopCommandObserver;
use forwarder_gate_core::QueryError;
use forwarder_gate_core::QueryGateway;
use forwarder_gate_core::SerializerConfig;
use forwarder_gate_core::TransientKind;
use forwarder_gate_core::runtime::FaultPoint;
use forwarder_gate_core::runtime::QuotaDenial;

// ============================================================================
// SECTION: Helpers
// ============================================================================

struct Harness {
    ledger: InMemoryLedger,
    serializer: CommandSerializer,
    gateway: QueryGateway,
}

fn harness() -> Harness {
    let ledger = InMemoryLedger::default();
    let serializer = CommandSerializer::spawn(
        Arc::new(ledger.clone()),
        FixedTxParams {
            chain_id: 648_541,
            gas_price: 0,
            tx_type: 0,
            gas_limit: 5_000_000,
        },
        SerializerConfig::default(),
        Arc::new(NoopCommandObserver),
    );
    let gateway = QueryGateway::new(Arc::new(ledger.clone()), GatewayIdentity {
        network: "testnet".to_string(),
        contract: Address::from_bytes([0xcc; 20]),
    });
    Harness {
        ledger,
        serializer,
        gateway,
    }
}

fn address(byte: u8) -> Address {
    Address::from_bytes([byte; 20])
}

impl Harness {
    async fn apply(&self, command: Command) {
        self.serializer.enqueue(command).await.unwrap();
    }
}

// ============================================================================
// SECTION: Callers
// ============================================================================

#[tokio::test]
async fn caller_status_reports_block_quota() {
    let harness = harness();
    let caller = address(0xaa);
    harness
        .apply(Command::SetCallerAllowed {
            caller,
            allowed: true,
        })
        .await;
    harness
        .apply(Command::SetCallerGasLimit {
            caller,
            limit: Gas::new(1_000),
        })
        .await;
    harness.ledger.record_caller_usage(caller, Gas::new(400)).unwrap();

    let fits = harness.gateway.caller_status(caller, Some(Gas::new(500))).await.unwrap();
    assert!(fits.is_allowed);
    assert!(fits.advisory);
    assert_eq!(fits.quota.effective_used, Gas::new(400));
    assert!(fits.requested.unwrap().available);

    let over = harness.gateway.caller_status(caller, Some(Gas::new(700))).await.unwrap();
    assert_eq!(over.requested.unwrap().reason, Some(QuotaDenial::BudgetExceeded));

    harness.ledger.advance_blocks(1);
    let next_block = harness.gateway.caller_status(caller, Some(Gas::new(700))).await.unwrap();
    assert!(next_block.quota.rolled_over);
    assert_eq!(next_block.quota.remaining, Gas::new(1_000));
    assert!(next_block.requested.unwrap().available);
}

#[tokio::test]
async fn unknown_caller_is_not_allowed() {
    let harness = harness();
    let status = harness.gateway.caller_status(address(0x01), Some(Gas::new(1))).await.unwrap();
    assert!(!status.is_allowed);
    assert_eq!(status.requested.unwrap().reason, Some(QuotaDenial::NotAllowed));
}

#[tokio::test]
async fn allowed_callers_enumerates_allowlist() {
    let harness = harness();
    for (byte, allowed) in [(1u8, true), (2, false), (3, true)] {
        harness
            .apply(Command::SetCallerAllowed {
                caller: address(byte),
                allowed,
            })
            .await;
    }
    let list = harness.gateway.allowed_callers().await.unwrap();
    assert_eq!(list.callers, vec![address(1), address(3)]);
    assert_eq!(list.count, 2);
}

// ============================================================================
// SECTION: Deployers
// ============================================================================

#[tokio::test]
async fn deployer_status_applies_custom_window() {
    let harness = harness();
    let deployer = address(0xdd);
    harness
        .apply(Command::SetDeployerAllowed {
            deployer,
            allowed: true,
        })
        .await;
    harness
        .apply(Command::SetDeployerBucket {
            deployer,
            limit: Gas::new(5_000),
            duration_seconds: 3_600,
            use_custom: true,
        })
        .await;
    harness.ledger.record_deploy_usage(deployer, Gas::new(4_900)).unwrap();

    let within = harness.gateway.deployer_status(deployer, Some(Gas::new(200))).await.unwrap();
    assert_eq!(within.effective_bucket.source, BucketSource::Custom);
    assert!(!within.quota.window_reset);
    assert!(!within.requested.unwrap().available);

    harness.ledger.advance_time(3_700);
    let expired = harness.gateway.deployer_status(deployer, Some(Gas::new(200))).await.unwrap();
    assert!(expired.quota.window_reset);
    assert_eq!(expired.quota.effective_used, Gas::ZERO);
    assert!(expired.requested.unwrap().available);
}

#[tokio::test]
async fn deployer_without_custom_bucket_uses_defaults() {
    let harness = harness();
    let deployer = address(0xde);
    harness
        .apply(Command::SetDefaultBucket {
            limit: Gas::new(9_000),
            duration_seconds: 600,
        })
        .await;
    let status = harness.gateway.deployer_status(deployer, None).await.unwrap();
    assert_eq!(status.effective_bucket.source, BucketSource::Default);
    assert_eq!(status.effective_bucket.limit, Gas::new(9_000));
    assert_eq!(status.effective_bucket.duration, 600);
    assert!(status.requested.is_none());
}

#[tokio::test]
async fn batch_update_is_visible_in_deployer_list() {
    let harness = harness();
    harness
        .apply(Command::BatchSetDeployers {
            deployers: vec![address(4), address(5), address(6)],
            allowed: vec![true, false, true],
        })
        .await;
    let list = harness.gateway.allowed_deployers().await.unwrap();
    assert_eq!(list.deployers, vec![address(4), address(6)]);
    assert!(harness.gateway.deployer_allowed(address(4)).await.unwrap().is_allowed);
    assert!(!harness.gateway.deployer_allowed(address(5)).await.unwrap().is_allowed);
}

// ============================================================================
// SECTION: Configuration and Health
// ============================================================================

#[tokio::test]
async fn global_config_reflects_latest_write() {
    let harness = harness();
    harness
        .apply(Command::SetGasOverhead {
            overhead: Gas::new(21_000),
        })
        .await;
    harness
        .apply(Command::SetErc2771 {
            enabled: true,
        })
        .await;
    let view = harness.gateway.global_config().await.unwrap();
    assert_eq!(view.config.gas_accounting_overhead, Gas::new(21_000));
    assert!(view.config.erc2771_append_sender);
}

#[tokio::test]
async fn repeated_reads_are_byte_identical() {
    let harness = harness();
    let caller = address(0x42);
    harness
        .apply(Command::SetCallerAllowed {
            caller,
            allowed: true,
        })
        .await;
    let first = harness.gateway.caller_status(caller, Some(Gas::new(10))).await.unwrap();
    let second = harness.gateway.caller_status(caller, Some(Gas::new(10))).await.unwrap();
    assert_eq!(serde_json::to_vec(&first).unwrap(), serde_json::to_vec(&second).unwrap());
    let config_a = serde_json::to_vec(&harness.gateway.global_config().await.unwrap()).unwrap();
    let config_b = serde_json::to_vec(&harness.gateway.global_config().await.unwrap()).unwrap();
    assert_eq!(config_a, config_b);
}

#[tokio::test]
async fn health_reports_network_and_block() {
    let harness = harness();
    let health = harness.gateway.health().await.unwrap();
    assert_eq!(health.status, "ok");
    assert_eq!(health.network, "testnet");
    assert_eq!(health.block_number, harness.ledger.block_number());
}

#[tokio::test]
async fn ledger_failure_surfaces_as_query_error() {
    let harness = harness();
    let fault = LedgerError::Transient {
        kind: TransientKind::Network,
        detail: "unreachable".to_string(),
    };
    harness.ledger.inject_fault(FaultPoint::Query, fault.clone());
    let error = harness.gateway.health().await.unwrap_err();
    assert_eq!(error, QueryError::Ledger(fault));
}
