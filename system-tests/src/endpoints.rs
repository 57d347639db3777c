// system-tests/src/endpoints.rs
// ============================================================================
// Module: API Endpoints
// Description: Request paths of the land-grants API.
// Purpose: Keep endpoint paths in one place for handlers and stubs.
// Dependencies: none
// ============================================================================

//! ## Overview
//! Paths are relative to the configured base URL and always start with `/`.

/// Service health check.
pub const HEALTH: &str = "/health";
/// Parcel lookup by sheet and parcel identifiers.
pub const PARCELS: &str = "/parcels";
/// Payment calculation for land actions.
pub const PAYMENTS_CALCULATE: &str = "/payments/calculate";
/// Versioned payment calculation for a parcel list.
pub const PAYMENTS_CALCULATE_V2: &str = "/api/v2/payments/calculate";
/// Application validation.
pub const APPLICATION_VALIDATE: &str = "/application/validate";
