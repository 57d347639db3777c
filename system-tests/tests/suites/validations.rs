// system-tests/tests/suites/validations.rs
// ============================================================================
// Module: Validations Suite Tests
// Description: Application validation cases covering verdicts and rule results.
// Purpose: Validate error-message and rule expectations decoded from columns.
// Dependencies: system-tests helpers, case-harness
// ============================================================================

//! Application validation system tests.

use case_harness::Case;
use case_harness::CsvCaseSource;
use case_harness::InMemoryCaseSource;
use case_harness::RecordError;
use case_harness::run_and_record;
use system_tests::handlers::ValidationsHandler;

use crate::helpers::artifacts::TestReporter;
use crate::helpers::harness::DynError;
use crate::helpers::harness::SuiteFixture;
use crate::helpers::harness::data_file;
use crate::helpers::harness::ensure;

/// Land actions for a request the stub accepts as valid.
const VALID_LAND_ACTIONS: &str =
    r#"[{"sheetId":"SX0679","parcelId":"9238","actions":[{"code":"CMOR1","quantity":0.4}]}]"#;

fn validation_case(description: &str, extra: &[(&str, &str)]) -> Case {
    let mut pairs = vec![
        ("TestDescription", description),
        ("applicationId", "APP-2001"),
        ("requester", "grants-ui"),
        ("sbi", "106284736"),
        ("applicantCrn", "1100014934"),
        ("landActions", VALID_LAND_ACTIONS),
        ("expectedValidationStatusCode", "200"),
    ];
    pairs.extend_from_slice(extra);
    Case::from_pairs(0, pairs)
}

#[tokio::test(flavor = "multi_thread")]
async fn validation_cases_pass_against_stub() -> Result<(), DynError> {
    let mut reporter = TestReporter::new("validation_cases_pass_against_stub")?;
    let fixture = SuiteFixture::start(&reporter)?;
    let orchestrator = fixture.orchestrator(&reporter)?;
    let source = CsvCaseSource::new(data_file("validations.csv"));

    let summary = run_and_record(&orchestrator, &source, ValidationsHandler::new(fixture.client.clone())).await?;

    ensure(summary.total == 3, "expected three validation cases")?;
    ensure(summary.passed == 3, "validation cases failed")?;
    let requests = fixture.stub.requests();
    ensure(requests[0].body["applicationId"] == "APP-1001", "application id not sent")?;
    ensure(
        requests[1].body["landActions"].as_array().map(Vec::len) == Some(2),
        "land actions not sent",
    )?;

    reporter.artifacts().write_json("run_summary.json", &summary)?;
    reporter.finish(
        "pass",
        vec!["verdicts, error messages, and rule outcomes matched".to_string()],
        vec!["summary.json".to_string(), "run_summary.json".to_string()],
    )?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn verdict_and_error_count_mismatches_fail() -> Result<(), DynError> {
    let mut reporter = TestReporter::new("verdict_and_error_count_mismatches_fail")?;
    let fixture = SuiteFixture::start(&reporter)?;
    let orchestrator = fixture.orchestrator(&reporter)?;
    let cases = vec![
        validation_case("Expects an invalid verdict", &[("valid", "false")]),
        validation_case("Expects a failing rule", &[("actions1_rules1_passed", "false")]),
    ];
    let source = InMemoryCaseSource::new("inline validations", cases);

    let result = run_and_record(&orchestrator, &source, ValidationsHandler::new(fixture.client.clone())).await;

    let Err(RecordError::Failed(failure)) = result else {
        return Err("expected both validation cases to fail".into());
    };
    ensure(failure.failures().len() == 2, "expected two failing cases")?;
    ensure(
        failure.failures()[0].error == "Validation failed: expected valid to be false but got true",
        "verdict failure mismatch",
    )?;
    ensure(
        failure.failures()[1].error.contains("actions[0].rules[0].passed"),
        "rule violation path missing",
    )?;

    reporter.finish("pass", vec!["verdict and rule mismatches reported".to_string()], Vec::new())?;
    Ok(())
}
