// crates/forwarder-gate-cli/src/main_tests.rs
// ============================================================================
// Module: CLI Main Tests
// Description: Unit tests for argument parsing and config commands.
// Purpose: Ensure subcommands parse and config validation fails closed.
// Dependencies: forwarder-gate-cli main helpers
// ============================================================================

//! ## Overview
//! Exercises clap parsing for every subcommand and the config validation path
//! against files on disk.

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::path::PathBuf;

use clap::Parser;

use super::Cli;
use super::Commands;
use super::ConfigCommand;
use super::ConfigValidateCommand;
use super::command_config_validate;
use super::load_config;

// ============================================================================
// SECTION: Parsing
// ============================================================================

#[test]
fn serve_accepts_config_path() {
    let cli = Cli::try_parse_from(["forwarder-gate", "serve", "--config", "gate.toml"]).unwrap();
    match cli.command {
        Some(Commands::Serve(command)) => {
            assert_eq!(command.config, Some(PathBuf::from("gate.toml")));
        }
        other => panic!("unexpected command {other:?}"),
    }
}

#[test]
fn config_example_parses() {
    let cli = Cli::try_parse_from(["forwarder-gate", "config", "example"]).unwrap();
    assert!(matches!(cli.command, Some(Commands::Config {
        command: ConfigCommand::Example
    })));
}

#[test]
fn version_flag_parses_without_subcommand() {
    let cli = Cli::try_parse_from(["forwarder-gate", "--version"]).unwrap();
    assert!(cli.show_version);
    assert!(cli.command.is_none());
}

#[test]
fn unknown_subcommand_is_rejected() {
    assert!(Cli::try_parse_from(["forwarder-gate", "deploy"]).is_err());
}

// ============================================================================
// SECTION: Config Validation
// ============================================================================

#[test]
fn validate_accepts_memory_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forwarder-gate.toml");
    fs::write(&path, "[server.auth]\napi_keys = [\"cli-key\"]\n\n[ledger]\nbackend = \"memory\"\n")
        .unwrap();
    let command = ConfigValidateCommand {
        config: Some(path),
    };
    assert!(command_config_validate(&command).is_ok());
}

#[test]
fn validate_rejects_missing_api_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forwarder-gate.toml");
    fs::write(&path, "[ledger]\nbackend = \"memory\"\n").unwrap();
    let error = load_config(Some(path.as_path())).unwrap_err();
    assert!(error.to_string().contains("server.auth requires api_keys or api_key_env"));
}

#[test]
fn validate_rejects_public_bind_without_api_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("forwarder-gate.toml");
    fs::write(&path, "[server]\nbind = \"0.0.0.0:3000\"\n\n[ledger]\nbackend = \"memory\"\n")
        .unwrap();
    let error = load_config(Some(path.as_path())).unwrap_err();
    assert!(error.to_string().contains("server.auth requires api_keys or api_key_env"));
}

#[test]
fn validate_reports_missing_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent.toml");
    let error = load_config(Some(path.as_path())).unwrap_err();
    assert!(error.to_string().starts_with("config load failed"));
}
