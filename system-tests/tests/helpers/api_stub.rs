// system-tests/tests/helpers/api_stub.rs
// ============================================================================
// Module: Land Grants API Stub
// Description: Deterministic in-process stand-in for the land-grants API.
// Purpose: Exercise the suite handlers over real HTTP without a deployment.
// Dependencies: axum, serde_json, tokio, url
// ============================================================================

//! ## Overview
//! Serves `/health`, `/parcels`, both payment calculation endpoints, and
//! `/application/validate` from a fixed parcel catalogue. Payments use fixed
//! per-hectare rates and a quarterly schedule; agreement end dates keep the
//! start day and add the three-year duration.

use std::net::TcpListener as StdTcpListener;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::http::Method;
use axum::http::StatusCode;
use axum::http::Uri;
use axum::routing::get;
use axum::routing::post;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;
use system_tests::endpoints;
use tokio::runtime::Builder;
use tokio::sync::oneshot;
use url::Url;

// ============================================================================
// SECTION: Catalogue
// ============================================================================

/// Agreement duration in years.
const DURATION_YEARS: i64 = 3;

/// Catalogue parcel.
struct StubParcel {
    sheet_id: &'static str,
    parcel_id: &'static str,
    area_ha: f64,
    actions: &'static [StubAction],
}

/// Action available on a catalogue parcel.
struct StubAction {
    code: &'static str,
    available_ha: f64,
}

const PARCELS: &[StubParcel] = &[
    StubParcel {
        sheet_id: "SX0679",
        parcel_id: "9238",
        area_ha: 0.4366,
        actions: &[
            StubAction {
                code: "CMOR1",
                available_ha: 0.4366,
            },
            StubAction {
                code: "UPL1",
                available_ha: 0.4366,
            },
        ],
    },
    StubParcel {
        sheet_id: "SD7846",
        parcel_id: "7013",
        area_ha: 1.25,
        actions: &[
            StubAction {
                code: "CMOR1",
                available_ha: 1.25,
            },
            StubAction {
                code: "UPL2",
                available_ha: 0.75,
            },
        ],
    },
];

/// Returns the description of an action code.
fn action_description(code: &str) -> Option<&'static str> {
    match code {
        "CMOR1" => Some("Assess moorland and produce a written record"),
        "UPL1" => Some("Moderate livestock grazing on moorland"),
        "UPL2" => Some("Low livestock grazing on moorland"),
        _ => None,
    }
}

/// Annual rate in pence per hectare.
fn rate_per_ha(code: &str) -> Option<f64> {
    match code {
        "CMOR1" => Some(1060.0),
        "UPL1" => Some(2000.0),
        "UPL2" => Some(5300.0),
        _ => None,
    }
}

/// Annual agreement-level payment in pence.
fn agreement_level_pence(code: &str) -> Option<i64> {
    match code {
        "CMOR1" => Some(27_200),
        _ => None,
    }
}

fn find_parcel(sheet_id: &str, parcel_id: &str) -> Option<&'static StubParcel> {
    PARCELS.iter().find(|parcel| parcel.sheet_id == sheet_id && parcel.parcel_id == parcel_id)
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

// ============================================================================
// SECTION: Handle
// ============================================================================

/// Recorded request metadata for stub calls.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub api_key: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct StubState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

/// Handle for the stub API server.
pub struct ApiStubHandle {
    base_url: Url,
    shutdown: Option<oneshot::Sender<()>>,
    join: Option<thread::JoinHandle<()>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl ApiStubHandle {
    /// Returns the stub base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Returns captured requests.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().map_or_else(|_| Vec::new(), |entries| entries.clone())
    }
}

impl Drop for ApiStubHandle {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

/// Spawns the stub API on an ephemeral port.
pub fn spawn_api_stub() -> Result<ApiStubHandle, String> {
    let listener =
        StdTcpListener::bind("127.0.0.1:0").map_err(|err| format!("api stub bind failed: {err}"))?;
    listener
        .set_nonblocking(true)
        .map_err(|err| format!("api stub listener nonblocking failed: {err}"))?;
    let addr = listener.local_addr().map_err(|err| format!("api stub local addr failed: {err}"))?;
    let base_url = Url::parse(&format!("http://{addr}"))
        .map_err(|err| format!("api stub url invalid: {err}"))?;

    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = StubState {
        requests: Arc::clone(&requests),
    };
    let app = Router::new()
        .route(endpoints::HEALTH, get(handle_health))
        .route(endpoints::PARCELS, post(handle_parcels))
        .route(endpoints::PAYMENTS_CALCULATE, post(handle_payments_v1))
        .route(endpoints::PAYMENTS_CALCULATE_V2, post(handle_payments_v2))
        .route(endpoints::APPLICATION_VALIDATE, post(handle_validate))
        .fallback(handle_not_found)
        .with_state(state);
    let (shutdown_tx, shutdown_rx) = oneshot::channel();
    let join = thread::spawn(move || {
        let Ok(runtime) = Builder::new_current_thread().enable_all().build() else {
            return;
        };
        runtime.block_on(async move {
            let Ok(listener) = tokio::net::TcpListener::from_std(listener) else {
                return;
            };
            let server = axum::serve(listener, app).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            let _ = server.await;
        });
    });
    Ok(ApiStubHandle {
        base_url,
        shutdown: Some(shutdown_tx),
        join: Some(join),
        requests,
    })
}

// ============================================================================
// SECTION: Routing Helpers
// ============================================================================

type Reply = (StatusCode, Json<Value>);

fn reply(status: StatusCode, body: Value) -> Reply {
    (status, Json(body))
}

fn error_reply(status: StatusCode, message: &str) -> Reply {
    reply(
        status,
        json!({
            "statusCode": status.as_u16(),
            "error": status.canonical_reason().unwrap_or_default(),
            "message": message,
        }),
    )
}

fn bad_request() -> Reply {
    error_reply(StatusCode::BAD_REQUEST, "Invalid request payload input")
}

fn record(state: &StubState, method: &Method, path: &str, headers: &HeaderMap, body: Value) {
    let header = |name: &str| {
        headers.get(name).and_then(|value| value.to_str().ok()).map(ToString::to_string)
    };
    let Ok(mut guard) = state.requests.lock() else {
        return;
    };
    guard.push(RecordedRequest {
        method: method.to_string(),
        path: path.to_string(),
        authorization: header("authorization"),
        api_key: header("x-api-key"),
        body,
    });
}

/// Records the request and decodes its JSON body.
fn accept(state: &StubState, path: &str, headers: &HeaderMap, bytes: &Bytes) -> Result<Value, Reply> {
    let body: Option<Value> = serde_json::from_slice(bytes).ok();
    record(state, &Method::POST, path, headers, body.clone().unwrap_or(Value::Null));
    body.filter(Value::is_object).ok_or_else(bad_request)
}

fn text_field<'a>(value: &'a Value, name: &str) -> Option<&'a str> {
    value.get(name).and_then(Value::as_str).filter(|text| !text.is_empty())
}

// ============================================================================
// SECTION: Health
// ============================================================================

async fn handle_health(State(state): State<StubState>, headers: HeaderMap) -> Reply {
    record(&state, &Method::GET, endpoints::HEALTH, &headers, Value::Null);
    reply(StatusCode::OK, json!({"message": "success"}))
}

async fn handle_not_found(
    State(state): State<StubState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Reply {
    record(&state, &method, uri.path(), &headers, Value::Null);
    error_reply(StatusCode::NOT_FOUND, "Not Found")
}

// ============================================================================
// SECTION: Parcels
// ============================================================================

async fn handle_parcels(State(state): State<StubState>, headers: HeaderMap, bytes: Bytes) -> Reply {
    match accept(&state, endpoints::PARCELS, &headers, &bytes) {
        Ok(body) => parcels_reply(&body),
        Err(reply) => reply,
    }
}

fn parcels_reply(body: &Value) -> Reply {
    let Some(ids) = body.get("parcelIds").and_then(Value::as_array).filter(|ids| !ids.is_empty())
    else {
        return bad_request();
    };
    let fields: Vec<&str> = body
        .get("fields")
        .and_then(Value::as_array)
        .map(|fields| fields.iter().filter_map(Value::as_str).collect())
        .unwrap_or_default();
    let planned = body.get("plannedActions").and_then(Value::as_array).cloned().unwrap_or_default();
    let mut parcels = Vec::new();
    for id in ids {
        let Some((sheet_id, parcel_id)) = id.as_str().and_then(|id| id.split_once('-')) else {
            return bad_request();
        };
        let Some(parcel) = find_parcel(sheet_id, parcel_id) else {
            return error_reply(StatusCode::NOT_FOUND, "Parcel not found");
        };
        parcels.push(parcel_json(parcel, &fields, &planned));
    }
    reply(StatusCode::OK, json!({"message": "success", "parcels": parcels}))
}

fn parcel_json(parcel: &StubParcel, fields: &[&str], planned: &[Value]) -> Value {
    let mut out = Map::new();
    out.insert("parcelId".to_string(), json!(parcel.parcel_id));
    out.insert("sheetId".to_string(), json!(parcel.sheet_id));
    if fields.contains(&"size") {
        out.insert("size".to_string(), json!({"unit": "ha", "value": parcel.area_ha}));
    }
    if fields.iter().any(|field| field.starts_with("actions")) {
        let actions: Vec<Value> = parcel
            .actions
            .iter()
            .map(|action| {
                let planned_ha: f64 = planned
                    .iter()
                    .filter(|entry| text_field(entry, "actionCode") == Some(action.code))
                    .filter_map(|entry| entry.get("quantity").and_then(Value::as_f64))
                    .sum();
                json!({
                    "code": action.code,
                    "description": action_description(action.code).unwrap_or_default(),
                    "availableArea": {
                        "unit": "ha",
                        "value": round4((action.available_ha - planned_ha).max(0.0)),
                    },
                })
            })
            .collect();
        out.insert("actions".to_string(), Value::Array(actions));
    }
    Value::Object(out)
}

// ============================================================================
// SECTION: Payments
// ============================================================================

async fn handle_payments_v1(
    State(state): State<StubState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Reply {
    match accept(&state, endpoints::PAYMENTS_CALCULATE, &headers, &bytes) {
        Ok(body) => payments_reply(&body, "landActions"),
        Err(reply) => reply,
    }
}

async fn handle_payments_v2(
    State(state): State<StubState>,
    headers: HeaderMap,
    bytes: Bytes,
) -> Reply {
    match accept(&state, endpoints::PAYMENTS_CALCULATE_V2, &headers, &bytes) {
        Ok(body) => payments_reply(&body, "parcel"),
        Err(reply) => reply,
    }
}

/// Parses `YYYY-MM-DD` into its parts.
fn parse_date(raw: &str) -> Option<(i64, i64, i64)> {
    let mut parts = raw.splitn(3, '-').map(str::parse::<i64>);
    let year = parts.next()?.ok()?;
    let month = parts.next()?.ok()?;
    let day = parts.next()?.ok()?;
    ((1 ..= 12).contains(&month) && (1 ..= 31).contains(&day)).then_some((year, month, day))
}

fn add_months((year, month, day): (i64, i64, i64), months: i64) -> String {
    let index = year * 12 + (month - 1) + months;
    format!("{:04}-{:02}-{:02}", index / 12, index % 12 + 1, day)
}

fn payments_reply(body: &Value, land_field: &str) -> Reply {
    let Some(land) = body.get(land_field).and_then(Value::as_array).filter(|land| !land.is_empty())
    else {
        return bad_request();
    };
    let start_raw = text_field(body, "startDate").unwrap_or("2025-09-01");
    let Some(start) = parse_date(start_raw) else {
        return bad_request();
    };

    let mut parcel_items = Map::new();
    let mut agreement_items = Map::new();
    let mut annual_total = 0_i64;
    for entry in land {
        let (Some(sheet_id), Some(parcel_id)) = (text_field(entry, "sheetId"), text_field(entry, "parcelId"))
        else {
            return bad_request();
        };
        if find_parcel(sheet_id, parcel_id).is_none() {
            return error_reply(StatusCode::NOT_FOUND, "Parcel not found");
        }
        let actions = entry.get("actions").and_then(Value::as_array).cloned().unwrap_or_default();
        for action in &actions {
            let code = text_field(action, "code").unwrap_or_default();
            let quantity = action.get("quantity").and_then(Value::as_f64).unwrap_or_default();
            let Some(rate) = rate_per_ha(code) else {
                return error_reply(StatusCode::BAD_REQUEST, &format!("Unknown action code: {code}"));
            };
            #[allow(clippy::cast_possible_truncation, reason = "Stub amounts are small pence values.")]
            let annual = (quantity * rate).round() as i64;
            annual_total += annual;
            let key = (parcel_items.len() + 1).to_string();
            parcel_items.insert(
                key,
                json!({
                    "code": code,
                    "description": action_description(code).unwrap_or_default(),
                    "version": "1",
                    "durationYears": DURATION_YEARS,
                    "quantity": quantity,
                    "rateInPence": rate,
                    "annualPaymentPence": annual,
                    "sheetId": sheet_id,
                    "parcelId": parcel_id,
                }),
            );
            if let Some(level) = agreement_level_pence(code) {
                let known = agreement_items.values().any(|item: &Value| text_field(item, "code") == Some(code));
                if !known {
                    annual_total += level;
                    let key = (agreement_items.len() + 1).to_string();
                    agreement_items.insert(
                        key,
                        json!({
                            "code": code,
                            "description": action_description(code).unwrap_or_default(),
                            "version": "1",
                            "durationYears": DURATION_YEARS,
                            "annualPaymentPence": level,
                        }),
                    );
                }
            }
        }
    }

    let quarter = annual_total / 4;
    let payments: Vec<Value> = (1 ..= 4)
        .map(|index| {
            let total = if index == 1 { annual_total - quarter * 3 } else { quarter };
            json!({
                "totalPaymentPence": total,
                "paymentDate": add_months(start, index * 3),
            })
        })
        .collect();
    reply(
        StatusCode::OK,
        json!({
            "message": "success",
            "payment": {
                "agreementStartDate": start_raw,
                "agreementEndDate": add_months(start, DURATION_YEARS * 12),
                "frequency": "Quarterly",
                "agreementTotalPence": annual_total * DURATION_YEARS,
                "annualTotalPence": annual_total,
                "parcelItems": parcel_items,
                "agreementLevelItems": agreement_items,
                "payments": payments,
            },
        }),
    )
}

// ============================================================================
// SECTION: Application Validation
// ============================================================================

async fn handle_validate(State(state): State<StubState>, headers: HeaderMap, bytes: Bytes) -> Reply {
    match accept(&state, endpoints::APPLICATION_VALIDATE, &headers, &bytes) {
        Ok(body) => validate_reply(&body),
        Err(reply) => reply,
    }
}

fn rule(name: &str, passed: bool) -> Value {
    json!({"name": name, "passed": passed})
}

fn validate_reply(body: &Value) -> Reply {
    let required = ["applicationId", "requester", "sbi", "applicantCrn"];
    if required.iter().any(|field| text_field(body, field).is_none()) {
        return bad_request();
    }
    let Some(land) = body.get("landActions").and_then(Value::as_array) else {
        return bad_request();
    };

    let mut errors = Vec::new();
    let mut actions = Vec::new();
    for entry in land {
        let sheet_id = text_field(entry, "sheetId").unwrap_or_default();
        let parcel_id = text_field(entry, "parcelId").unwrap_or_default();
        let parcel = find_parcel(sheet_id, parcel_id);
        let requested = entry.get("actions").and_then(Value::as_array).cloned().unwrap_or_default();
        for action in &requested {
            let code = text_field(action, "code").unwrap_or_default();
            let quantity = action.get("quantity").and_then(Value::as_f64).unwrap_or_default();
            let available = parcel.and_then(|parcel| parcel.actions.iter().find(|candidate| candidate.code == code));
            let within_area = available.is_some_and(|available| quantity <= available.available_ha);
            let failure = if parcel.is_none() {
                Some(("PARCEL_NOT_FOUND", "Parcel not found"))
            } else if available.is_none() {
                Some((code, "Action is not available on this parcel"))
            } else if !within_area {
                Some((code, "Applied area exceeds the available area"))
            } else {
                None
            };
            if let Some((error_code, description)) = failure {
                errors.push(json!({
                    "code": error_code,
                    "description": description,
                    "sheetId": sheet_id,
                    "parcelId": parcel_id,
                    "passed": false,
                }));
            }
            actions.push(json!({
                "code": code,
                "sheetId": sheet_id,
                "parcelId": parcel_id,
                "rules": [
                    rule("parcel-exists", parcel.is_some()),
                    rule("action-available", available.is_some()),
                    rule("within-available-area", within_area),
                ],
            }));
        }
    }
    reply(
        StatusCode::OK,
        json!({
            "message": "Application validated successfully",
            "applicationId": text_field(body, "applicationId"),
            "valid": errors.is_empty(),
            "errorMessages": errors,
            "actions": actions,
        }),
    )
}
