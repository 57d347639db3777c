// system-tests/src/handlers.rs
// ============================================================================
// Module: Case Handlers
// Description: Land-grants API handlers driven by case rows.
// Purpose: Build requests from cases and validate responses against expectations.
// Dependencies: async-trait, case-harness, serde_json
// ============================================================================

//! ## Overview
//! Each handler turns one case row into an API request, asserts the status
//! and message columns, and compares the response body structurally with the
//! expectations decoded from the flat columns of the row. Handlers return the
//! captured [`ApiResponse`] as the case payload.
//!
//! Arrays are compared entry by entry here because the structural validator
//! only samples the first element of an array.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use case_harness::Case;
use case_harness::CaseContext;
use case_harness::CaseError;
use case_harness::CaseHandler;
use case_harness::CellType;
use case_harness::ExpectationDecoder;
use case_harness::StructuralValidator;
use case_harness::ValidationOutcome;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

use crate::checks;
use crate::client::ApiClient;
use crate::client::ApiResponse;
use crate::endpoints;
use crate::response::ResponseValidator;

// ============================================================================
// SECTION: Shared Helpers
// ============================================================================

/// Sends a request inside a reporting step and attaches the response.
async fn send_request(
    client: &ApiClient,
    context: &CaseContext,
    path: &str,
    body: Option<&Value>,
) -> Result<ApiResponse, CaseError> {
    let reporter = context.reporter();
    if let Some(body) = body {
        reporter.attach_json("Request", body);
    }
    let response = reporter
        .step(&format!("Call {path}"), async {
            match body {
                Some(body) => client.post_json(path, body).await,
                None => client.get(path).await,
            }
        })
        .await?;
    reporter.attach_json("API Response", &response.body);
    Ok(response)
}

/// Compares expected array entries with actual entries at the same index.
fn compare_entries(
    validator: &StructuralValidator,
    actual: &[Value],
    expected: &[Value],
    label: &str,
) -> ValidationOutcome {
    let mut outcome = ValidationOutcome::default();
    for (index, entry) in expected.iter().enumerate() {
        outcome.extend(validator.compare_at(actual.get(index), entry, &format!("{label}[{index}]")));
    }
    outcome
}

/// Returns the entries of an array, or the values of an id-keyed object.
fn entries(value: Option<&Value>) -> Vec<&Value> {
    match value {
        Some(Value::Array(items)) => items.iter().collect(),
        Some(Value::Object(map)) => map.values().collect(),
        _ => Vec::new(),
    }
}

/// Converts a decoded group into its entries.
fn group_entries(decoded: Value) -> Vec<Value> {
    match decoded {
        Value::Array(items) => items,
        _ => Vec::new(),
    }
}

/// Inserts a numeric cell into `target` when the column is non-blank.
fn insert_number(
    target: &mut Map<String, Value>,
    key: &str,
    case: &Case,
    column: &str,
) -> Result<(), CaseError> {
    if case.non_empty(column).is_some() {
        target.insert(key.to_string(), Value::from(case.number(column)?));
    }
    Ok(())
}

/// Inserts a text cell into `target` when the column is non-blank.
fn insert_text(target: &mut Map<String, Value>, key: &str, case: &Case, column: &str) {
    if let Some(value) = case.non_empty(column) {
        target.insert(key.to_string(), Value::String(value.to_string()));
    }
}

// ============================================================================
// SECTION: Response Check Handler
// ============================================================================

/// Column naming the HTTP method of a generic case.
pub const METHOD_COLUMN: &str = "method";
/// Column naming the endpoint path of a generic case.
pub const ENDPOINT_COLUMN: &str = "endpoint";
/// Column holding an optional JSON request body.
pub const REQUEST_BODY_COLUMN: &str = "requestBody";

/// Generic handler: calls the endpoint named by the case and runs the staged
/// response validator.
#[derive(Clone)]
pub struct ResponseCheckHandler {
    /// API client.
    client: ApiClient,
    /// Endpoint used when the case has no `endpoint` cell.
    default_path: String,
    /// Staged validator.
    validator: ResponseValidator,
}

impl ResponseCheckHandler {
    /// Creates a handler targeting `default_path`.
    #[must_use]
    pub fn new(client: ApiClient, default_path: impl Into<String>) -> Self {
        Self {
            client,
            default_path: default_path.into(),
            validator: ResponseValidator::new(),
        }
    }

    /// Replaces the staged validator.
    #[must_use]
    pub fn with_validator(mut self, validator: ResponseValidator) -> Self {
        self.validator = validator;
        self
    }
}

#[async_trait]
impl CaseHandler for ResponseCheckHandler {
    type Output = ApiResponse;

    async fn handle(&self, case: &Case, context: &CaseContext) -> Result<ApiResponse, CaseError> {
        let path = case.non_empty(ENDPOINT_COLUMN).unwrap_or(self.default_path.as_str());
        let method = case.non_empty(METHOD_COLUMN).unwrap_or("GET");
        let body = if method.eq_ignore_ascii_case("POST") {
            match case.non_empty(REQUEST_BODY_COLUMN) {
                Some(_) => Some(case.json(REQUEST_BODY_COLUMN)?),
                None => Some(Value::Object(Map::new())),
            }
        } else if method.eq_ignore_ascii_case("GET") {
            None
        } else {
            return Err(CaseError::Decode {
                column: METHOD_COLUMN.to_string(),
                message: format!("unsupported method '{method}'"),
            });
        };
        let response = send_request(&self.client, context, path, body.as_ref()).await?;
        self.validator.validate(&response, case, context.reporter())?;
        Ok(response)
    }
}

// ============================================================================
// SECTION: Parcels Handler
// ============================================================================

/// Handler for `POST /parcels`.
#[derive(Clone)]
pub struct ParcelsHandler {
    /// API client.
    client: ApiClient,
    /// Decoder for `actions<i>_<field>` expectations.
    decoder: ExpectationDecoder,
}

impl ParcelsHandler {
    /// Creates a parcels handler.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        let decoder = ExpectationDecoder::new()
            .with_type("code", CellType::Text)
            .with_type("description", CellType::Text)
            .with_type("unit", CellType::Text);
        Self {
            client,
            decoder,
        }
    }

    /// Builds the request body from the case.
    fn request(case: &Case) -> Result<Value, CaseError> {
        let mut body = Map::new();
        body.insert("parcelIds".to_string(), json!(case.list("parcelIds")));
        body.insert("fields".to_string(), json!(case.list("fields")));
        if case.non_empty("plannedActions").is_some() {
            body.insert("plannedActions".to_string(), case.json("plannedActions")?);
        }
        Ok(Value::Object(body))
    }

    /// Collects expected actions from indexed columns and the single-action columns.
    fn expected_actions(&self, case: &Case) -> Result<Vec<Value>, CaseError> {
        let mut actions = group_entries(self.decoder.decode_group(case, "actions")?);
        if let Some(code) = case.non_empty("expectedActionCode") {
            let mut action = Map::new();
            action.insert("code".to_string(), Value::String(code.to_string()));
            insert_text(&mut action, "description", case, "expectedActionDescription");
            let mut area = Map::new();
            insert_text(&mut area, "unit", case, "expectedAvailableAreaUnit");
            insert_number(&mut area, "value", case, "expectedAvailableAreaValue")?;
            if !area.is_empty() {
                action.insert("availableArea".to_string(), Value::Object(area));
            }
            actions.push(Value::Object(action));
        }
        Ok(actions)
    }

    /// Validates the matched parcel against size and action expectations.
    fn check_parcel(&self, response: &ApiResponse, case: &Case, context: &CaseContext) -> Result<(), CaseError> {
        let sheet_id = case.require("expectedSheetId")?;
        let parcel_id = case.require("expectedParcelId")?;
        let parcel = checks::find_parcel(&response.body, sheet_id, parcel_id)?;
        let validator = StructuralValidator::new().with_reporter(context.reporter());
        let fields = case.list("fields");
        let mut outcome = ValidationOutcome::default();

        let mut size = Map::new();
        insert_text(&mut size, "unit", case, "expectedSizeUnit");
        insert_number(&mut size, "value", case, "expectedSizeValue")?;
        if !size.is_empty() || fields.iter().any(|field| field == "size") {
            outcome.extend(validator.compare_at(parcel.get("size"), &Value::Object(size), "parcel.size"));
        }

        let actual_actions = checks::array_field(parcel, "actions");
        let codes: Vec<String> = actual_actions
            .iter()
            .filter_map(|action| action.get("code").map(checks::scalar_text))
            .collect();
        for (index, expected) in self.expected_actions(case)?.iter().enumerate() {
            let label = format!("parcel.actions[{index}]");
            let Some(code) = expected.get("code").map(checks::scalar_text) else {
                outcome.extend(validator.compare_at(actual_actions.get(index), expected, &label));
                continue;
            };
            let position = codes.iter().position(|candidate| *candidate == code).ok_or_else(|| {
                CaseError::assertion(format!(
                    "Action code validation failed: expected '{code}' but found: [{}]",
                    codes.join(", ")
                ))
            })?;
            outcome.extend(validator.compare_at(actual_actions.get(position), expected, &label));
        }
        outcome.into_result()
    }
}

#[async_trait]
impl CaseHandler for ParcelsHandler {
    type Output = ApiResponse;

    async fn handle(&self, case: &Case, context: &CaseContext) -> Result<ApiResponse, CaseError> {
        let request = Self::request(case)?;
        let response = send_request(&self.client, context, endpoints::PARCELS, Some(&request)).await?;
        checks::expect_status(&response, case, checks::EXPECTED_STATUS)?;
        if response.status == checks::DEFAULT_STATUS {
            checks::expect_message(&response, case, checks::EXPECTED_MESSAGE)?;
            self.check_parcel(&response, case, context)?;
        } else {
            checks::expect_error_message(&response, case, checks::EXPECTED_MESSAGE)?;
        }
        Ok(response)
    }
}

// ============================================================================
// SECTION: Payments Handler
// ============================================================================

/// Payment summary columns compared with the `payment` object.
const PAYMENT_COLUMNS: [&str; 5] =
    ["agreementStartDate", "agreementEndDate", "frequency", "agreementTotalPence", "annualTotalPence"];

/// Payment calculation API version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentsApi {
    /// `POST /payments/calculate` with `landActions`.
    Calculate,
    /// `POST /api/v2/payments/calculate` with `parcel`.
    CalculateV2,
}

impl PaymentsApi {
    /// Returns the endpoint path.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Calculate => endpoints::PAYMENTS_CALCULATE,
            Self::CalculateV2 => endpoints::PAYMENTS_CALCULATE_V2,
        }
    }

    /// Returns the JSON column carrying the land being paid for.
    #[must_use]
    pub const fn land_column(self) -> &'static str {
        match self {
            Self::Calculate => "landActions",
            Self::CalculateV2 => "parcel",
        }
    }
}

/// Handler for the payment calculation endpoints.
#[derive(Clone)]
pub struct PaymentsHandler {
    /// API client.
    client: ApiClient,
    /// Target API version.
    api: PaymentsApi,
    /// Decoder for payment expectations.
    decoder: ExpectationDecoder,
}

impl PaymentsHandler {
    /// Creates a payments handler for `api`.
    #[must_use]
    pub fn new(client: ApiClient, api: PaymentsApi) -> Self {
        let decoder = ExpectationDecoder::new()
            .with_type("agreementStartDate", CellType::Text)
            .with_type("agreementEndDate", CellType::Text)
            .with_type("frequency", CellType::Text)
            .with_type("paymentDate", CellType::Text)
            .with_type("code", CellType::Text)
            .with_type("version", CellType::Text);
        Self {
            client,
            api,
            decoder,
        }
    }

    /// Builds the request body from the case.
    fn request(&self, case: &Case) -> Result<Value, CaseError> {
        let mut body = Map::new();
        insert_text(&mut body, "startDate", case, "startDate");
        let column = self.api.land_column();
        body.insert(column.to_string(), case.json(column)?);
        Ok(Value::Object(body))
    }

    /// Validates the `payment` object of a successful response.
    fn check_payment(&self, response: &ApiResponse, case: &Case, context: &CaseContext) -> Result<(), CaseError> {
        let payment = response
            .field("payment")
            .ok_or_else(|| CaseError::assertion("Response missing payment data"))?;
        let validator = StructuralValidator::new().with_reporter(context.reporter());

        let summary = self.decoder.decode_columns(case, &PAYMENT_COLUMNS)?;
        let mut outcome = validator.compare_at(Some(payment), &summary, "payment");

        let parcel_items = payment.get("parcelItems");
        checks::expect_count(case, "expectedParcelItemsCount", entries(parcel_items).len(), "parcel items")?;
        let expected_items = self.decoder.decode_keyed_group(case, "parcelItem")?;
        if expected_items.as_object().is_some_and(|items| !items.is_empty()) {
            outcome.extend(validator.compare_at(parcel_items, &expected_items, "payment.parcelItems"));
        }

        let agreement_items = entries(payment.get("agreementLevelItems"));
        checks::expect_count(
            case,
            "expectedAgreementLevelItemsCount",
            agreement_items.len(),
            "agreement level items",
        )?;
        let mut agreement = Map::new();
        insert_number(&mut agreement, "annualPaymentPence", case, "agreementLevelItems_annualPaymentPence")?;
        if !agreement.is_empty() {
            outcome.extend(validator.compare_at(
                agreement_items.first().copied(),
                &Value::Object(agreement),
                "payment.agreementLevelItems[0]",
            ));
        }

        let schedule = checks::array_field(payment, "payments");
        checks::expect_count(case, "expectedPaymentsCount", schedule.len(), "payments")?;
        let expected_schedule = group_entries(self.decoder.decode_group(case, "Payment")?);
        outcome.extend(compare_entries(&validator, schedule, &expected_schedule, "payment.payments"));
        outcome.into_result()
    }
}

#[async_trait]
impl CaseHandler for PaymentsHandler {
    type Output = ApiResponse;

    async fn handle(&self, case: &Case, context: &CaseContext) -> Result<ApiResponse, CaseError> {
        let request = self.request(case)?;
        let response = send_request(&self.client, context, self.api.path(), Some(&request)).await?;
        checks::expect_status(&response, case, checks::EXPECTED_STATUS)?;
        if response.status == checks::DEFAULT_STATUS {
            checks::expect_message(&response, case, checks::EXPECTED_MESSAGE)?;
            self.check_payment(&response, case, context)?;
        } else {
            checks::expect_error_message(&response, case, checks::EXPECTED_MESSAGE)?;
        }
        Ok(response)
    }
}

// ============================================================================
// SECTION: Validations Handler
// ============================================================================

/// Column holding the expected status of a validation request.
pub const VALIDATION_STATUS: &str = "expectedValidationStatusCode";
/// Column holding the expected message of a validation request.
pub const VALIDATION_MESSAGE: &str = "expectedValidationMessage";

/// Handler for `POST /application/validate`.
#[derive(Clone)]
pub struct ValidationsHandler {
    /// API client.
    client: ApiClient,
    /// Decoder for error-message and rule expectations.
    decoder: ExpectationDecoder,
}

impl ValidationsHandler {
    /// Creates a validations handler.
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        let decoder = ExpectationDecoder::new()
            .with_type("code", CellType::Text)
            .with_type("description", CellType::Text)
            .with_type("sheetId", CellType::Text)
            .with_type("parcelId", CellType::Text)
            .with_type("name", CellType::Text)
            .with_type("passed", CellType::Bool);
        Self {
            client,
            decoder,
        }
    }

    /// Builds the request body from the case.
    fn request(case: &Case) -> Result<Value, CaseError> {
        Ok(json!({
            "applicationId": case.require("applicationId")?,
            "requester": case.require("requester")?,
            "sbi": case.require("sbi")?,
            "applicantCrn": case.require("applicantCrn")?,
            "landActions": case.json("landActions")?,
        }))
    }

    /// Builds expected error messages from the `code<i>` and
    /// `errorMessages_<field><i>` columns; every entry must have failed.
    fn expected_errors(&self, case: &Case) -> Result<Vec<Value>, CaseError> {
        let mut errors = group_entries(self.decoder.decode_group(case, "errorMessages")?);
        let codes = group_entries(self.decoder.decode_group(case, "code")?);
        if errors.len() < codes.len() {
            errors.resize(codes.len(), Value::Object(Map::new()));
        }
        for (index, error) in errors.iter_mut().enumerate() {
            if let Value::Object(fields) = error {
                if let Some(code) = codes.get(index) {
                    fields.insert("code".to_string(), code.clone());
                }
                fields.insert("passed".to_string(), Value::Bool(false));
            }
        }
        Ok(errors)
    }

    /// Validates the verdict, error messages, and rule outcomes.
    fn check_verdict(&self, response: &ApiResponse, case: &Case, context: &CaseContext) -> Result<(), CaseError> {
        let validator = StructuralValidator::new().with_reporter(context.reporter());
        let mut outcome = ValidationOutcome::default();
        if let Some(valid) = case.flag("valid")? {
            let actual = response.field("valid");
            if actual != Some(&Value::Bool(valid)) {
                let shown = actual.map_or_else(|| "undefined".to_string(), checks::scalar_text);
                return Err(CaseError::assertion(format!(
                    "Validation failed: expected valid to be {valid} but got {shown}"
                )));
            }
            if !valid {
                let actual_errors = checks::array_field(&response.body, "errorMessages");
                let expected_errors = self.expected_errors(case)?;
                if actual_errors.len() != expected_errors.len() {
                    return Err(CaseError::assertion(format!(
                        "Expected {} error messages but got {}",
                        expected_errors.len(),
                        actual_errors.len()
                    )));
                }
                outcome.extend(compare_entries(&validator, actual_errors, &expected_errors, "errorMessages"));
            }
        }
        let expected_actions = group_entries(self.decoder.decode_group(case, "actions")?);
        let actual_actions = checks::array_field(&response.body, "actions");
        outcome.extend(compare_entries(&validator, actual_actions, &expected_actions, "actions"));
        outcome.into_result()
    }
}

#[async_trait]
impl CaseHandler for ValidationsHandler {
    type Output = ApiResponse;

    async fn handle(&self, case: &Case, context: &CaseContext) -> Result<ApiResponse, CaseError> {
        let request = Self::request(case)?;
        let response =
            send_request(&self.client, context, endpoints::APPLICATION_VALIDATE, Some(&request)).await?;
        checks::expect_status(&response, case, VALIDATION_STATUS)?;
        if response.status == checks::DEFAULT_STATUS {
            checks::expect_message(&response, case, VALIDATION_MESSAGE)?;
            self.check_verdict(&response, case, context)?;
        } else {
            checks::expect_error_message(&response, case, VALIDATION_MESSAGE)?;
        }
        Ok(response)
    }
}
