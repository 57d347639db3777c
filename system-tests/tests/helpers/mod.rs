// system-tests/tests/helpers/mod.rs
// ============================================================================
// Module: System Test Helpers
// Description: Shared helpers for the land-grants system-tests.
// Purpose: Provide the API stub, suite wiring, and artifact utilities.
// Dependencies: system-tests, case-harness, axum
// ============================================================================

//! ## Overview
//! Shared helpers for the land-grants system-tests.
//! Invariants:
//! - Suites run against the in-process API stub and never a live deployment.
//! - Every suite writes its artifacts under the run root.

#![allow(dead_code, reason = "Shared helpers are reused across multiple test suites.")]

pub mod api_stub;
