// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client configuration and collector protocol selection.
//!
//! Two collector generations exist in the wild:
//!
//! | Generation | Path | Auth header | Response body |
//! |------------|------|-------------|---------------|
//! | A | `/v1/errors` | `Authorization: Bearer <key>` | none guaranteed |
//! | B | `/api/v1/report` | `X-API-Key: <key>` | `{"success": bool, "error": {"message": ...}}` |
//!
//! [`ProtocolGeneration`] is a preset; the auth scheme and response mode in
//! [`Protocol`] can also be chosen independently.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use std::{env, fmt, fs};

use errorbot_core::{ApiKey, RuntimeInfo};
use reqwest::Url;

use crate::error::{ConfigError, Result};

/// Endpoint used when none is configured.
pub const DEFAULT_ENDPOINT: &str = "https://errorbot.fyi/api/v1/report";
/// Default bound on a single delivery attempt.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
/// Default time the panic hook waits for its report before unwinding resumes.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Environment variable names read by [`ClientConfig::from_env`].
pub mod vars {
	pub const API_KEY: &str = "ERRORBOT_API_KEY";
	pub const PROJECT: &str = "ERRORBOT_PROJECT";
	pub const ENDPOINT: &str = "ERRORBOT_ENDPOINT";
	pub const PROTOCOL: &str = "ERRORBOT_PROTOCOL";
	pub const TIMEOUT_MS: &str = "ERRORBOT_TIMEOUT_MS";
}

/// Which header carries the API key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScheme {
	/// `Authorization: Bearer <key>`
	Bearer,
	/// `X-API-Key: <key>`
	ApiKeyHeader,
}

impl AuthScheme {
	pub fn header_name(&self) -> &'static str {
		match self {
			Self::Bearer => "Authorization",
			Self::ApiKeyHeader => "X-API-Key",
		}
	}

	pub fn header_value(&self, key: &ApiKey) -> String {
		match self {
			Self::Bearer => format!("Bearer {}", key.expose()),
			Self::ApiKeyHeader => key.expose().to_string(),
		}
	}
}

/// How a 2xx response body is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseMode {
	/// The status code decides; the body is optional.
	StatusOnly,
	/// The body must be a `{"success": bool}` envelope.
	SuccessEnvelope,
}

/// Wire protocol settings for the collector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Protocol {
	pub auth: AuthScheme,
	pub response: ResponseMode,
}

/// Known collector generations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolGeneration {
	A,
	B,
}

impl ProtocolGeneration {
	pub fn path(&self) -> &'static str {
		match self {
			Self::A => "/v1/errors",
			Self::B => "/api/v1/report",
		}
	}

	pub fn protocol(&self) -> Protocol {
		match self {
			Self::A => Protocol {
				auth: AuthScheme::Bearer,
				response: ResponseMode::StatusOnly,
			},
			Self::B => Protocol {
				auth: AuthScheme::ApiKeyHeader,
				response: ResponseMode::SuccessEnvelope,
			},
		}
	}

	/// Joins this generation's path onto a base URL such as
	/// `https://errorbot.fyi`.
	pub fn endpoint(&self, base_url: &str) -> String {
		format!("{}{}", base_url.trim_end_matches('/'), self.path())
	}

	/// Picks the generation from an endpoint path: `/v1/errors` is A,
	/// everything else is B.
	pub fn infer(endpoint: &Url) -> Self {
		let path = endpoint.path().trim_end_matches('/');
		if path.ends_with(Self::A.path()) {
			Self::A
		} else {
			Self::B
		}
	}
}

impl From<ProtocolGeneration> for Protocol {
	fn from(generation: ProtocolGeneration) -> Self {
		generation.protocol()
	}
}

impl fmt::Display for ProtocolGeneration {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::A => write!(f, "a"),
			Self::B => write!(f, "b"),
		}
	}
}

impl FromStr for ProtocolGeneration {
	type Err = ConfigError;

	fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
		match s.trim().to_ascii_lowercase().as_str() {
			"a" => Ok(Self::A),
			"b" => Ok(Self::B),
			_ => Err(ConfigError::InvalidProtocol(s.to_string())),
		}
	}
}

/// Immutable configuration owned by a client.
///
/// Built with [`ClientConfig::new`] and refined with the `with_*` methods
/// before it is handed to a client; there are no setters afterwards.
#[derive(Debug, Clone)]
pub struct ClientConfig {
	api_key: ApiKey,
	project_name: String,
	endpoint_url: Url,
	protocol: Protocol,
	request_timeout: Duration,
	shutdown_grace: Duration,
	runtime_info: RuntimeInfo,
}

impl ClientConfig {
	/// Validates the three required values.
	///
	/// The protocol is inferred from the endpoint path until
	/// [`with_protocol`](Self::with_protocol) overrides it.
	pub fn new(
		api_key: impl Into<ApiKey>,
		project_name: impl Into<String>,
		endpoint_url: impl AsRef<str>,
	) -> Result<Self> {
		let api_key = api_key.into();
		if api_key.is_blank() {
			return Err(ConfigError::MissingApiKey);
		}

		let project_name = project_name.into().trim().to_string();
		if project_name.is_empty() {
			return Err(ConfigError::MissingProjectName);
		}

		let endpoint_url = parse_endpoint(endpoint_url.as_ref())?;
		let protocol = ProtocolGeneration::infer(&endpoint_url).protocol();

		Ok(Self {
			api_key,
			project_name,
			endpoint_url,
			protocol,
			request_timeout: DEFAULT_REQUEST_TIMEOUT,
			shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
			runtime_info: RuntimeInfo::new(),
		})
	}

	/// Loads configuration from `ERRORBOT_*` environment variables.
	///
	/// `ERRORBOT_API_KEY_FILE` takes precedence over `ERRORBOT_API_KEY`.
	pub fn from_env() -> Result<Self> {
		Self::from_lookup(|name| env::var(name).ok())
	}

	/// Like [`from_env`](Self::from_env) with a custom variable source.
	pub fn from_lookup<F>(lookup: F) -> Result<Self>
	where
		F: Fn(&str) -> Option<String>,
	{
		let api_key = load_secret(&lookup, vars::API_KEY)?.ok_or(ConfigError::MissingApiKey)?;
		let project = lookup(vars::PROJECT).ok_or(ConfigError::MissingProjectName)?;
		let endpoint = lookup(vars::ENDPOINT).unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

		let mut config = Self::new(api_key, project, endpoint)?;

		if let Some(generation) = lookup(vars::PROTOCOL) {
			config = config.with_protocol(generation.parse::<ProtocolGeneration>()?);
		}

		if let Some(raw) = lookup(vars::TIMEOUT_MS) {
			let millis: u64 = raw
				.trim()
				.parse()
				.map_err(|_| ConfigError::InvalidTimeout(raw.clone()))?;
			config = config.with_request_timeout(validate_timeout(Duration::from_millis(millis))?);
		}

		Ok(config)
	}

	pub fn with_protocol(mut self, protocol: impl Into<Protocol>) -> Self {
		self.protocol = protocol.into();
		self
	}

	pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
		self.request_timeout = timeout;
		self
	}

	pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
		self.shutdown_grace = grace;
		self
	}

	/// Static context merged into every event (server name, release, ...).
	pub fn with_runtime_info(mut self, info: RuntimeInfo) -> Self {
		self.runtime_info.merge(&info);
		self
	}

	pub fn api_key(&self) -> &ApiKey {
		&self.api_key
	}

	pub fn project_name(&self) -> &str {
		&self.project_name
	}

	pub fn endpoint_url(&self) -> &Url {
		&self.endpoint_url
	}

	pub fn protocol(&self) -> Protocol {
		self.protocol
	}

	pub fn request_timeout(&self) -> Duration {
		self.request_timeout
	}

	pub fn shutdown_grace(&self) -> Duration {
		self.shutdown_grace
	}

	pub fn runtime_info(&self) -> &RuntimeInfo {
		&self.runtime_info
	}
}

pub(crate) fn validate_timeout(timeout: Duration) -> Result<Duration> {
	if timeout.is_zero() {
		return Err(ConfigError::InvalidTimeout("timeout must be greater than zero".to_string()));
	}
	Ok(timeout)
}

fn parse_endpoint(raw: &str) -> Result<Url> {
	let raw = raw.trim();
	if raw.is_empty() {
		return Err(ConfigError::MissingEndpointUrl);
	}

	let url = Url::parse(raw).map_err(|e| ConfigError::InvalidEndpointUrl {
		url: raw.to_string(),
		reason: e.to_string(),
	})?;

	match url.scheme() {
		"http" | "https" => Ok(url),
		other => Err(ConfigError::InvalidEndpointUrl {
			url: raw.to_string(),
			reason: format!("unsupported scheme {other:?}"),
		}),
	}
}

/// Reads `VAR_FILE` if set, else `VAR`. One trailing newline is stripped
/// from file contents.
fn load_secret<F>(lookup: &F, var: &str) -> Result<Option<ApiKey>>
where
	F: Fn(&str) -> Option<String>,
{
	if let Some(path) = lookup(&format!("{var}_FILE")) {
		let path = PathBuf::from(path);
		let content = fs::read_to_string(&path).map_err(|source| ConfigError::SecretFile {
			path: path.clone(),
			source,
		})?;
		let secret = content.strip_suffix('\n').unwrap_or(&content);
		return Ok(Some(ApiKey::new(secret)));
	}

	Ok(lookup(var).map(ApiKey::new))
}
