// crates.io
use url::Host;
// self
use crate::{
	_prelude::*,
	config::{ClientConfig, StreamConfig},
};

/// Errors raised while constructing or validating client configurations.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum ClientConfigError {
	/// Renewal endpoint is mandatory.
	#[error("Missing renewal endpoint.")]
	MissingRenewalEndpoint,
	/// Renewal endpoint cannot be resolved against the base URL.
	#[error("Renewal endpoint `{endpoint}` is not a valid URL or path.")]
	InvalidRenewalEndpoint {
		/// Endpoint string that failed to resolve.
		endpoint: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// At least one status must mark authentication failure.
	#[error("At least one authentication-failure status must be configured.")]
	NoAuthFailureStatuses,
	/// Authentication-failure statuses must be client errors.
	#[error("Status {status} cannot signal an authentication failure.")]
	InvalidAuthFailureStatus {
		/// Offending status.
		status: u16,
	},
	/// Event lines need a marker to be recognized.
	#[error("Event prefix must not be empty.")]
	EmptyEventPrefix,
	/// A zero line limit would reject every event.
	#[error("Maximum event line length must be positive.")]
	ZeroLineLimit,
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	/// Base URL for relative request targets.
	pub base_url: Url,
	/// Renewal endpoint, absolute or relative to the base URL.
	pub renewal_endpoint: Option<String>,
	/// Statuses that trigger credential renewal.
	pub auth_failure_statuses: Vec<u16>,
	/// Event stream decoding settings.
	pub stream: StreamConfig,
}
impl ClientConfigBuilder {
	/// Creates a new builder rooted at the provided base URL.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			renewal_endpoint: None,
			auth_failure_statuses: vec![401, 403],
			stream: StreamConfig::default(),
		}
	}

	/// Sets the renewal endpoint (absolute URL or path relative to the base URL).
	pub fn renewal_endpoint(mut self, endpoint: impl Into<String>) -> Self {
		self.renewal_endpoint = Some(endpoint.into());

		self
	}

	/// Replaces the statuses that trigger credential renewal.
	pub fn auth_failure_statuses<I>(mut self, statuses: I) -> Self
	where
		I: IntoIterator<Item = u16>,
	{
		self.auth_failure_statuses = statuses.into_iter().collect();

		self
	}

	/// Overrides the event line marker.
	pub fn event_prefix(mut self, prefix: impl Into<String>) -> Self {
		self.stream.event_prefix = prefix.into();

		self
	}

	/// Overrides the per-line byte limit for event streams.
	pub fn max_line_bytes(mut self, limit: usize) -> Self {
		self.stream.max_line_bytes = limit;

		self
	}

	/// Overrides the whole stream configuration.
	pub fn stream(mut self, stream: StreamConfig) -> Self {
		self.stream = stream;

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ClientConfigError> {
		let endpoint =
			self.renewal_endpoint.ok_or(ClientConfigError::MissingRenewalEndpoint)?;
		let renewal_endpoint = self.base_url.join(&endpoint).map_err(|source| {
			ClientConfigError::InvalidRenewalEndpoint { endpoint: endpoint.clone(), source }
		})?;
		let mut auth_failure_statuses = self.auth_failure_statuses;

		auth_failure_statuses.sort_unstable();
		auth_failure_statuses.dedup();

		let config = ClientConfig {
			base_url: self.base_url,
			renewal_endpoint,
			auth_failure_statuses,
			stream: self.stream,
		};

		config.validate()?;

		Ok(config)
	}
}

impl ClientConfig {
	/// Validates invariants for the configuration.
	fn validate(&self) -> Result<(), ClientConfigError> {
		validate_endpoint("base", &self.base_url)?;
		validate_endpoint("renewal", &self.renewal_endpoint)?;

		if self.auth_failure_statuses.is_empty() {
			return Err(ClientConfigError::NoAuthFailureStatuses);
		}
		if let Some(status) =
			self.auth_failure_statuses.iter().find(|status| !(400..500).contains(*status))
		{
			return Err(ClientConfigError::InvalidAuthFailureStatus { status: *status });
		}
		if self.stream.event_prefix.is_empty() {
			return Err(ClientConfigError::EmptyEventPrefix);
		}
		if self.stream.max_line_bytes == 0 {
			return Err(ClientConfigError::ZeroLineLimit);
		}

		Ok(())
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ClientConfigError> {
	if url.scheme() == "https" || (url.scheme() == "http" && is_loopback(url)) {
		Ok(())
	} else {
		Err(ClientConfigError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(Host::Ipv4(ip)) => ip.is_loopback(),
		Some(Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}
