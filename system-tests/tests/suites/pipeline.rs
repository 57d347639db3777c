// system-tests/tests/suites/pipeline.rs
// ============================================================================
// Module: Pipeline Suite Tests
// Description: End-to-end orchestration behavior against the API stub.
// Purpose: Validate aggregation, stop-on-error, transport failures, and the
//          reporting toggle with a closure handler.
// Dependencies: system-tests helpers, case-harness
// ============================================================================

//! Orchestration pipeline system tests.

use std::net::TcpListener;
use std::sync::Arc;

use case_harness::Case;
use case_harness::CaseContext;
use case_harness::CaseHandler;
use case_harness::CsvCaseSource;
use case_harness::InMemoryCaseSource;
use case_harness::Orchestrator;
use case_harness::RecordError;
use case_harness::RunError;
use case_harness::SinkDiscovery;
use case_harness::handler_fn;
use case_harness::run_and_record;
use system_tests::checks;
use system_tests::client::ApiClient;
use system_tests::client::ApiResponse;
use system_tests::config::SystemTestConfig;
use system_tests::endpoints;
use system_tests::handlers::ResponseCheckHandler;
use url::Url;

use crate::helpers::artifacts::TestReporter;
use crate::helpers::harness::DynError;
use crate::helpers::harness::SuiteFixture;
use crate::helpers::harness::data_file;
use crate::helpers::harness::ensure;

/// Handler that calls the health endpoint and checks the expected status.
fn health_status_handler(client: ApiClient) -> impl CaseHandler<Output = ApiResponse> {
    handler_fn(move |case: Case, _context: CaseContext| {
        let client = client.clone();
        async move {
            let response = client.get(endpoints::HEALTH).await?;
            checks::expect_status(&response, &case, checks::EXPECTED_STATUS)?;
            Ok(response)
        }
    })
}

/// Builds an orchestrator for `config` that reports to the fixture sink.
fn orchestrator_for(
    fixture: &SuiteFixture,
    reporter: &TestReporter,
    config: &SystemTestConfig,
) -> Result<Orchestrator, DynError> {
    Ok(Orchestrator::new(config.run_options())
        .with_discovery(SinkDiscovery::instance(fixture.sink.clone()))
        .with_log(reporter.artifacts().run_log()?))
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_case_is_aggregated_after_every_case_runs() -> Result<(), DynError> {
    let mut reporter = TestReporter::new("failing_case_is_aggregated_after_every_case_runs")?;
    let fixture = SuiteFixture::start(&reporter)?;
    let orchestrator = fixture.orchestrator(&reporter)?;
    let source = CsvCaseSource::new(data_file("pipeline.csv"));

    let result = run_and_record(&orchestrator, &source, health_status_handler(fixture.client.clone())).await;

    let Err(RecordError::Failed(failure)) = result else {
        return Err("expected the pipeline run to fail".into());
    };
    ensure(failure.mentions("P2"), "P2 not reported as failing")?;
    ensure(!failure.mentions("P1"), "P1 reported as failing")?;
    // P2 expects 404; the stub's health endpoint always answers 200.
    let message = failure.to_string();
    ensure(message.contains("Expected status 404 but got 200"), "status mismatch not reported")?;
    ensure(
        failure.failures().iter().any(|failed| failed.error == "Expected status 404 but got 200"),
        "P2 error text mismatch",
    )?;
    ensure(fixture.stub.requests().len() == 2, "expected both cases to run")?;
    let failed = fixture.sink.attachment("Failed test cases").ok_or("failed cases not attached")?;
    ensure(failed.contains("P2"), "failed cases attachment missing P2")?;
    ensure(fixture.sink.flushes() == 1, "sink not flushed exactly once")?;
    ensure(fixture.sink.transcript_path().exists(), "report transcript missing")?;
    let run_log = std::fs::read_to_string(reporter.artifacts().root().join("run_log.jsonl"))?;
    ensure(run_log.contains("aggregate_failure"), "aggregate failure not logged")?;

    reporter.finish(
        "pass",
        vec!["P2 recorded as the only failing case".to_string()],
        vec!["summary.json".to_string(), "run_log.jsonl".to_string(), "report/report.json".to_string()],
    )?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_on_error_aborts_at_first_failure() -> Result<(), DynError> {
    let mut reporter = TestReporter::new("stop_on_error_aborts_at_first_failure")?;
    let fixture = SuiteFixture::start(&reporter)?;
    let mut config = fixture.config.clone();
    config.stop_on_error = true;
    let orchestrator = orchestrator_for(&fixture, &reporter, &config)?;
    let case = |position: usize, id: &str, status: &str| {
        Case::from_pairs(position, [("TestDescription", id), ("expectedStatusCode", status)])
    };
    let source = InMemoryCaseSource::new(
        "inline pipeline",
        vec![case(0, "first", "500"), case(1, "second", "200")],
    );

    let result = run_and_record(&orchestrator, &source, health_status_handler(fixture.client.clone())).await;

    let Err(RecordError::Execution(RunError::Aborted { case_id, summary })) = result else {
        return Err("expected the run to abort".into());
    };
    ensure(case_id.as_str() == "first", "aborted on the wrong case")?;
    ensure(summary.total == 1, "summary should count executed cases")?;
    ensure(summary.failed == 1, "summary should count the failure")?;
    ensure(fixture.stub.requests().len() == 1, "second case should not run")?;
    ensure(fixture.sink.flushes() == 1, "sink not released after abort")?;

    reporter.finish("pass", vec!["second case never executed".to_string()], Vec::new())?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_api_fails_every_case_without_aborting() -> Result<(), DynError> {
    let mut reporter = TestReporter::new("unreachable_api_fails_every_case_without_aborting")?;
    let fixture = SuiteFixture::start(&reporter)?;
    let port = TcpListener::bind("127.0.0.1:0")?.local_addr()?.port();
    let config = SystemTestConfig::for_base_url(Url::parse(&format!("http://127.0.0.1:{port}"))?);
    let client = ApiClient::new(&config)?;
    let orchestrator = orchestrator_for(&fixture, &reporter, &config)?;
    let source = CsvCaseSource::new(data_file("pipeline.csv"));

    let result = run_and_record(&orchestrator, &source, health_status_handler(client)).await;

    let Err(RecordError::Failed(failure)) = result else {
        return Err("expected transport failures".into());
    };
    ensure(failure.failures().len() == 2, "expected every case to fail")?;
    ensure(
        failure.failures().iter().all(|failed| failed.error.starts_with("request failed")),
        "expected transport failures",
    )?;
    ensure(fixture.stub.requests().is_empty(), "stub should not receive requests")?;

    reporter.finish("pass", vec!["connection failures recorded per case".to_string()], Vec::new())?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn disabled_reporting_leaves_the_sink_untouched() -> Result<(), DynError> {
    let mut reporter = TestReporter::new("disabled_reporting_leaves_the_sink_untouched")?;
    let fixture = SuiteFixture::start(&reporter)?;
    let mut config = fixture.config.clone();
    config.report = false;
    let orchestrator = orchestrator_for(&fixture, &reporter, &config)?;
    let source = CsvCaseSource::new(data_file("health.csv"));
    let handler = Arc::new(ResponseCheckHandler::new(fixture.client.clone(), endpoints::HEALTH));

    let summary = run_and_record(&orchestrator, &source, handler).await?;

    ensure(summary.passed == 2, "health cases failed")?;
    ensure(fixture.sink.entries().is_empty(), "sink received calls while disabled")?;
    ensure(fixture.sink.flushes() == 0, "sink flushed while disabled")?;

    reporter.finish("pass", vec!["no sink calls with reporting disabled".to_string()], Vec::new())?;
    Ok(())
}
