// system-tests/src/config/env.rs
// ============================================================================
// Module: System Test Environment
// Description: Environment-backed configuration for the land-grants suites.
// Purpose: Centralize env parsing with strict UTF-8 validation.
// Dependencies: case-harness, url
// ============================================================================

//! ## Overview
//! Environment values are parsed with strict UTF-8 enforcement to avoid silent
//! misconfiguration. Invalid UTF-8 fails closed. The API base URL is either
//! given explicitly or resolved from the target environment name.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::PathBuf;
use std::time::Duration;

use case_harness::RunOptions;
use url::Url;

// ============================================================================
// SECTION: Environment Constants
// ============================================================================

/// Environment name used when none is configured.
pub const DEFAULT_ENVIRONMENT: &str = "local";

/// Base URL of a locally running API.
pub const LOCAL_BASE_URL: &str = "http://localhost:3009";

/// Environment keys for system test configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemTestEnv {
    /// Target environment name (`local`, `dev`, `test`, `perf-test`, ...).
    Environment,
    /// Where the suite itself runs; `local` targets the protected ingress.
    RunEnv,
    /// Explicit base URL override; wins over environment resolution.
    BaseUrl,
    /// Optional bearer token sent as `Authorization: Bearer <token>`.
    BearerToken,
    /// Optional API key sent as `x-api-key`.
    ApiKey,
    /// Optional request timeout override in seconds (positive integer).
    TimeoutSeconds,
    /// Log per-case start and pass events (`true`/`false` or `1`/`0`).
    Verbose,
    /// Abort the run at the first failing case (`true`/`false` or `1`/`0`).
    StopOnError,
    /// Enable the reporting side channel (`true`/`false` or `1`/`0`).
    Report,
    /// Optional run root override for artifacts.
    RunRoot,
}

impl SystemTestEnv {
    /// Returns the canonical environment variable name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Environment => "LAND_GRANTS_TEST_ENVIRONMENT",
            Self::RunEnv => "LAND_GRANTS_TEST_RUN_ENV",
            Self::BaseUrl => "LAND_GRANTS_TEST_BASE_URL",
            Self::BearerToken => "LAND_GRANTS_TEST_BEARER_TOKEN",
            Self::ApiKey => "LAND_GRANTS_TEST_API_KEY",
            Self::TimeoutSeconds => "LAND_GRANTS_TEST_TIMEOUT_SEC",
            Self::Verbose => "LAND_GRANTS_TEST_VERBOSE",
            Self::StopOnError => "LAND_GRANTS_TEST_STOP_ON_ERROR",
            Self::Report => "LAND_GRANTS_TEST_REPORT",
            Self::RunRoot => "LAND_GRANTS_TEST_RUN_ROOT",
        }
    }

    /// Returns every configuration key.
    #[must_use]
    pub const fn all() -> [Self; 10] {
        [
            Self::Environment,
            Self::RunEnv,
            Self::BaseUrl,
            Self::BearerToken,
            Self::ApiKey,
            Self::TimeoutSeconds,
            Self::Verbose,
            Self::StopOnError,
            Self::Report,
            Self::RunRoot,
        ]
    }
}

// ============================================================================
// SECTION: Config Types
// ============================================================================

/// Typed system test configuration derived from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemTestConfig {
    /// Target environment name.
    pub environment: String,
    /// Where the suite runs, when set.
    pub run_env: Option<String>,
    /// Resolved API base URL.
    pub base_url: Url,
    /// Optional bearer token.
    pub bearer_token: Option<String>,
    /// Optional API key.
    pub api_key: Option<String>,
    /// Optional request timeout override.
    pub timeout: Option<Duration>,
    /// Log per-case start and pass events.
    pub verbose: bool,
    /// Abort the run at the first failing case.
    pub stop_on_error: bool,
    /// Enable the reporting side channel.
    pub report: bool,
    /// Optional run root override.
    pub run_root: Option<PathBuf>,
}

impl SystemTestConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error when an environment value is not valid UTF-8, is empty,
    /// or fails validation (for example, an invalid URL, timeout, or boolean).
    pub fn load() -> Result<Self, String> {
        let environment = read_env_nonempty(SystemTestEnv::Environment.as_str())?
            .unwrap_or_else(|| DEFAULT_ENVIRONMENT.to_string());
        let run_env = read_env_nonempty(SystemTestEnv::RunEnv.as_str())?;
        let base_url = match read_env_nonempty(SystemTestEnv::BaseUrl.as_str())? {
            Some(raw) => parse_base_url(SystemTestEnv::BaseUrl.as_str(), &raw)?,
            None => resolve_base_url(&environment, run_env.as_deref())?,
        };
        let bearer_token = read_env_nonempty(SystemTestEnv::BearerToken.as_str())?;
        let api_key = read_env_nonempty(SystemTestEnv::ApiKey.as_str())?;
        let timeout = read_env_nonempty(SystemTestEnv::TimeoutSeconds.as_str())?
            .map(|value| parse_timeout_seconds(SystemTestEnv::TimeoutSeconds.as_str(), &value))
            .transpose()?;
        let verbose = parse_bool_env(
            SystemTestEnv::Verbose.as_str(),
            read_env_nonempty(SystemTestEnv::Verbose.as_str())?,
            false,
        )?;
        let stop_on_error = parse_bool_env(
            SystemTestEnv::StopOnError.as_str(),
            read_env_nonempty(SystemTestEnv::StopOnError.as_str())?,
            false,
        )?;
        let report = parse_bool_env(
            SystemTestEnv::Report.as_str(),
            read_env_nonempty(SystemTestEnv::Report.as_str())?,
            true,
        )?;
        let run_root = read_env_nonempty(SystemTestEnv::RunRoot.as_str())?.map(PathBuf::from);
        Ok(Self {
            environment,
            run_env,
            base_url,
            bearer_token,
            api_key,
            timeout,
            verbose,
            stop_on_error,
            report,
            run_root,
        })
    }

    /// Builds a configuration that targets `base_url` with default settings.
    #[must_use]
    pub fn for_base_url(base_url: Url) -> Self {
        Self {
            environment: DEFAULT_ENVIRONMENT.to_string(),
            run_env: None,
            base_url,
            bearer_token: None,
            api_key: None,
            timeout: None,
            verbose: false,
            stop_on_error: false,
            report: true,
            run_root: None,
        }
    }

    /// Maps the run toggles into engine options.
    #[must_use]
    pub fn run_options(&self) -> RunOptions {
        RunOptions::default()
            .verbose(self.verbose)
            .stop_on_error(self.stop_on_error)
            .report(self.report)
    }
}

// ============================================================================
// SECTION: Base URL Resolution
// ============================================================================

/// Resolves the API base URL for an environment.
///
/// `local` targets a locally running API. Other environments target the
/// platform ingress, or the protected ingress when the suite itself runs
/// locally (`run_env == "local"`).
///
/// # Errors
///
/// Returns an error when the resolved URL is invalid.
pub fn resolve_base_url(environment: &str, run_env: Option<&str>) -> Result<Url, String> {
    let raw = if environment == DEFAULT_ENVIRONMENT {
        LOCAL_BASE_URL.to_string()
    } else if run_env == Some("local") {
        format!("https://ephemeral-protected.api.{environment}.cdp-int.defra.cloud/land-grants-api")
    } else {
        format!("https://land-grants-api.{environment}.cdp-int.defra.cloud")
    };
    parse_base_url(SystemTestEnv::Environment.as_str(), &raw)
}

/// Parses and validates an HTTP(S) base URL.
///
/// # Errors
///
/// Returns an error when the value is not an absolute http or https URL.
fn parse_base_url(name: &str, raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw.trim()).map_err(|err| format!("{name} yields invalid base URL '{raw}': {err}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("{name} must use http or https, got '{other}'")),
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads an environment variable and enforces UTF-8 validity.
///
/// # Errors
///
/// Returns an error when the environment variable contains invalid UTF-8.
pub fn read_env_strict(name: &str) -> Result<Option<String>, String> {
    std::env::var_os(name).map_or(Ok(None), |raw| {
        raw.into_string().map(Some).map_err(|_| format!("{name} must be valid UTF-8"))
    })
}

/// Reads an environment variable and rejects empty values.
///
/// # Errors
///
/// Returns an error when the variable is set but empty or whitespace.
fn read_env_nonempty(name: &str) -> Result<Option<String>, String> {
    match read_env_strict(name)? {
        Some(value) if value.trim().is_empty() => Err(format!("{name} must not be empty")),
        Some(value) => Ok(Some(value)),
        None => Ok(None),
    }
}

/// Parses a positive timeout value from an environment variable string.
///
/// # Errors
///
/// Returns an error when the value is non-numeric or zero.
fn parse_timeout_seconds(name: &str, raw: &str) -> Result<Duration, String> {
    let secs: u64 = raw
        .trim()
        .parse()
        .map_err(|_| format!("{name} must be a positive integer number of seconds"))?;
    if secs == 0 {
        return Err(format!("{name} must be greater than zero"));
    }
    Ok(Duration::from_secs(secs))
}

/// Parses a boolean environment variable, using `default` when unset.
///
/// # Errors
///
/// Returns an error when the value is not a recognized boolean literal.
fn parse_bool_env(name: &str, raw: Option<String>, default: bool) -> Result<bool, String> {
    let Some(value) = raw else {
        return Ok(default);
    };
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("true") || trimmed == "1" {
        return Ok(true);
    }
    if trimmed.eq_ignore_ascii_case("false") || trimmed == "0" {
        return Ok(false);
    }
    Err(format!("{name} must be 1, 0, true, or false"))
}
