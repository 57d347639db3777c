// system-tests/src/lib.rs
// ============================================================================
// Module: Land Grants System Tests Library
// Description: Configuration, API client, and case handlers for the suites.
// Purpose: Provide the land-grants handlers driven by the case harness.
// Dependencies: case-harness, reqwest, serde_json, url
// ============================================================================

//! ## Overview
//! This crate hosts the configuration, HTTP client, response checks, and case
//! handlers used by the land-grants API system-test binaries in
//! `system-tests/tests`. Each suite loads a CSV case file and runs one of the
//! handlers through the case harness.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod checks;
pub mod client;
pub mod config;
pub mod endpoints;
pub mod handlers;
pub mod response;
