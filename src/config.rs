//! Client configuration: API location, proactive refresh cadence, and conflict retry policy.

// self
use crate::{_prelude::*, error::ConfigError};

/// Resolved client configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ClientConfig {
	/// Origin (and optional mount path) of the payroll API.
	pub base_url: Url,
	/// Path prefix every API route lives under.
	pub api_prefix: String,
	/// Cadence of the proactive refresh task.
	pub refresh_interval: Duration,
	/// Backoff applied while the server reports an idempotency conflict.
	pub retry_policy: RetryPolicy,
}
impl ClientConfig {
	/// Base URL used when nothing else is configured.
	pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";
	/// Prefix shared by every backend route.
	pub const DEFAULT_API_PREFIX: &str = "/api";
	/// Fires comfortably before the server's 15-minute access-token lifetime runs out.
	pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::minutes(14);
	/// Environment variable overriding the base URL in [`ClientConfig::from_env`].
	pub const BASE_URL_ENV: &str = "SLIPSALARY_API_BASE";

	/// Returns a builder seeded with the defaults.
	pub fn builder() -> ClientConfigBuilder {
		ClientConfigBuilder::default()
	}

	/// Builds the default configuration, taking the base URL from [`Self::BASE_URL_ENV`] when
	/// it is set to a non-empty value.
	pub fn from_env() -> Result<Self, ConfigError> {
		let mut builder = Self::builder();

		if let Some(raw) = std::env::var(Self::BASE_URL_ENV).ok().filter(|v| !v.trim().is_empty())
		{
			let url = Url::parse(raw.trim())
				.map_err(|source| ConfigError::InvalidBaseUrl { source })?;

			builder = builder.base_url(url);
		}

		builder.build()
	}

	/// Normalizes `path` into a full request URL.
	///
	/// Absolute `http(s)://` URLs pass through untouched, paths already under the API prefix
	/// are kept, and everything else is placed under the prefix.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let invalid = |source| ConfigError::InvalidPath { path: path.to_owned(), source };

		if path.starts_with("http://") || path.starts_with("https://") {
			return Url::parse(path).map_err(invalid);
		}

		let prefixed = if self.has_prefix(path) {
			path.to_owned()
		} else if path.starts_with('/') {
			format!("{}{path}", self.api_prefix)
		} else {
			format!("{}/{path}", self.api_prefix)
		};
		let base = self.base_url.as_str().trim_end_matches('/');

		Url::parse(&format!("{base}{prefixed}")).map_err(invalid)
	}

	fn has_prefix(&self, path: &str) -> bool {
		path.strip_prefix(self.api_prefix.as_str())
			.is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?']))
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Clone, Debug)]
pub struct ClientConfigBuilder {
	/// Base URL override.
	pub base_url: Option<Url>,
	/// API prefix.
	pub api_prefix: String,
	/// Proactive refresh cadence.
	pub refresh_interval: Duration,
	/// Conflict retry policy.
	pub retry_policy: RetryPolicy,
}
impl Default for ClientConfigBuilder {
	fn default() -> Self {
		Self {
			base_url: None,
			api_prefix: ClientConfig::DEFAULT_API_PREFIX.into(),
			refresh_interval: ClientConfig::DEFAULT_REFRESH_INTERVAL,
			retry_policy: RetryPolicy::default(),
		}
	}
}
impl ClientConfigBuilder {
	/// Sets the API base URL.
	pub fn base_url(mut self, url: Url) -> Self {
		self.base_url = Some(url);

		self
	}

	/// Overrides the API prefix (defaults to `/api`).
	pub fn api_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.api_prefix = prefix.into();

		self
	}

	/// Overrides the proactive refresh cadence.
	pub fn refresh_interval(mut self, interval: Duration) -> Self {
		self.refresh_interval = interval;

		self
	}

	/// Overrides the conflict retry policy.
	pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Validates and produces a [`ClientConfig`].
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let base_url = match self.base_url {
			Some(url) => url,
			None => Url::parse(ClientConfig::DEFAULT_BASE_URL)
				.map_err(|source| ConfigError::InvalidBaseUrl { source })?,
		};

		if !matches!(base_url.scheme(), "http" | "https") {
			return Err(ConfigError::UnsupportedScheme { url: base_url.to_string() });
		}

		let api_prefix = self.api_prefix.trim_end_matches('/').to_owned();

		if !api_prefix.is_empty() && !api_prefix.starts_with('/') {
			return Err(ConfigError::InvalidPrefix { prefix: self.api_prefix });
		}
		if !self.refresh_interval.is_positive() {
			return Err(ConfigError::NonPositiveRefreshInterval);
		}

		self.retry_policy.validate()?;

		Ok(ClientConfig {
			base_url,
			api_prefix,
			refresh_interval: self.refresh_interval,
			retry_policy: self.retry_policy,
		})
	}
}

/// Bounded exponential backoff used while the server reports duplicate work in flight.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	/// Delay before the first retry.
	pub initial_delay: Duration,
	/// Growth factor applied per retry.
	pub multiplier: u32,
	/// Upper bound for any single delay, including server hints.
	pub max_delay: Duration,
	/// Maximum number of retries; `None` retries until the conflict clears.
	pub max_retries: Option<u32>,
}
impl RetryPolicy {
	/// Two seconds, doubling, capped at thirty seconds, at most eight retries.
	pub const DEFAULT: Self = Self {
		initial_delay: Duration::seconds(2),
		multiplier: 2,
		max_delay: Duration::seconds(30),
		max_retries: Some(8),
	};

	/// Fixed delay with no retry ceiling.
	pub const fn fixed_unbounded(delay: Duration) -> Self {
		Self { initial_delay: delay, multiplier: 1, max_delay: delay, max_retries: None }
	}

	/// Whether retry number `retry` (zero-based) is still allowed.
	pub fn allows(&self, retry: u32) -> bool {
		self.max_retries.is_none_or(|max| retry < max)
	}

	/// Delay before retry number `retry` (zero-based); a larger server hint wins, but never
	/// beyond [`Self::max_delay`].
	pub fn delay_for(&self, retry: u32, hint: Option<Duration>) -> Duration {
		let computed = self
			.multiplier
			.checked_pow(retry)
			.and_then(|factor| i32::try_from(factor).ok())
			.and_then(|factor| self.initial_delay.checked_mul(factor))
			.map_or(self.max_delay, |delay| delay.min(self.max_delay));
		let hinted = hint.filter(|h| h.is_positive()).map_or(computed, |h| h.max(computed));

		hinted.min(self.max_delay)
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if self.initial_delay.is_negative() {
			return Err(ConfigError::InvalidRetryPolicy { reason: "initial delay is negative" });
		}
		if self.multiplier == 0 {
			return Err(ConfigError::InvalidRetryPolicy { reason: "multiplier must be at least 1" });
		}
		if self.max_delay < self.initial_delay {
			return Err(ConfigError::InvalidRetryPolicy {
				reason: "max delay is shorter than the initial delay",
			});
		}

		Ok(())
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::DEFAULT
	}
}
