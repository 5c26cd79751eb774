//! Client-level error types shared across the token provider, middleware, and runtime.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;
type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// A mandatory request field was omitted; detected before any network I/O.
	#[error("Required parameter `{parameter}` is missing.")]
	RequiredParameter {
		/// Name of the omitted parameter, as declared by the calling manager.
		parameter: &'static str,
	},
	/// The management API returned a non-success status.
	#[error(transparent)]
	Response(#[from] ResponseError),
	/// Transport failure (DNS, TCP, TLS, timeout).
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Token endpoint rejected or mangled the credentials exchange.
	#[error(transparent)]
	Token(#[from] TokenEndpointError),
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// A success response carried a body that could not be decoded as JSON.
	#[error("Response body could not be decoded as JSON.")]
	Decode {
		/// Structured parsing failure naming the offending path.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
		/// HTTP status code of the response being decoded.
		status: u16,
	},
}

/// Non-success response from the management API, preserved for caller inspection.
///
/// The default classification path parses the body as JSON (falling back to the
/// raw text) and derives a display message from the conventional `message`,
/// `error_description`, or `error` fields so callers can branch on HTTP
/// semantics without re-parsing anything.
#[derive(Clone, Debug, ThisError)]
#[error("{message}")]
pub struct ResponseError {
	/// HTTP status code returned by the API.
	pub status: u16,
	/// Parsed response body; a JSON string of the raw text when the body is not JSON.
	pub body: serde_json::Value,
	/// Human-readable summary used for display.
	pub message: String,
}
impl ResponseError {
	/// Builds a response error from a status code and parsed body, deriving the
	/// display message from well-known body fields.
	pub fn new(status: u16, body: serde_json::Value) -> Self {
		let message = ["message", "error_description", "error"]
			.iter()
			.find_map(|key| body.get(key).and_then(serde_json::Value::as_str))
			.map(str::to_owned)
			.unwrap_or_else(|| format!("Management API returned status {status}."));

		Self { status, body, message }
	}

	/// Overrides the display message while keeping status and body intact.
	pub fn with_message(mut self, message: impl Into<String>) -> Self {
		self.message = message.into();

		self
	}
}

/// Failures raised by the OAuth token endpoint during the client-credentials exchange.
///
/// Sources are reference-counted; one exchange failure is handed verbatim to
/// every caller attached to that exchange.
#[derive(Clone, Debug, ThisError)]
pub enum TokenEndpointError {
	/// Token endpoint answered with a non-success status.
	#[error("Token endpoint rejected the credentials exchange with status {status}.")]
	Rejected {
		/// HTTP status code returned by the token endpoint.
		status: u16,
		/// Raw response body; never cached or reused.
		body: String,
	},
	/// Token endpoint responded with malformed JSON that could not be parsed.
	#[error("Token endpoint returned malformed JSON.")]
	Parse {
		/// Structured parsing failure naming the offending path.
		#[source]
		source: Arc<serde_path_to_error::Error<serde_json::Error>>,
		/// HTTP status code returned by the token endpoint.
		status: u16,
	},
}

/// Configuration and validation failures raised while assembling a client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// Domain could not be parsed into a base URL.
	#[error("Domain `{domain}` is not a valid host.")]
	InvalidDomain {
		/// Domain string supplied by the caller.
		domain: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request path could not be joined onto the base URL.
	#[error("Request path `{path}` cannot be resolved against the base URL.")]
	InvalidPath {
		/// Path supplied by the request description.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Neither a static token nor a full credential set was supplied.
	#[error("Configuration requires either a static token or client_id + client_secret + audience.")]
	MissingCredentials,
	/// No transport was supplied and the default reqwest transport is compiled out.
	#[error("No HTTP transport configured and the `reqwest` feature is disabled.")]
	MissingTransport,
	/// HTTP transport could not be constructed.
	#[error("HTTP transport could not be constructed.")]
	TransportBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn transport_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::TransportBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::transport_build(e)
	}
}

/// Transport-level failures (network, IO).
///
/// Sources are reference-counted; see [`TokenEndpointError`].
#[derive(Clone, Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP transport reported a network failure.
	#[error("Network error occurred while executing the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: SharedError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while executing the request.")]
	Io(#[source] Arc<std::io::Error>),
}
impl From<std::io::Error> for TransportError {
	fn from(e: std::io::Error) -> Self {
		Self::Io(Arc::new(e))
	}
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Arc::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;

	#[test]
	fn response_error_derives_message_from_known_fields() {
		let err = ResponseError::new(500, json!({ "message": "boom" }));

		assert_eq!(err.to_string(), "boom");

		let err = ResponseError::new(403, json!({ "error_description": "denied" }));

		assert_eq!(err.to_string(), "denied");

		let err = ResponseError::new(404, json!({ "code": 404 }));

		assert_eq!(err.to_string(), "Management API returned status 404.");
	}

	#[test]
	fn response_error_message_override_keeps_payload() {
		let err = ResponseError::new(500, json!({ "message": "boom" })).with_message("custom");

		assert_eq!(err.to_string(), "custom");
		assert_eq!(err.status, 500);
		assert_eq!(err.body, json!({ "message": "boom" }));
	}

	#[test]
	fn required_parameter_names_the_field() {
		let err = Error::RequiredParameter { parameter: "id" };

		assert_eq!(err.to_string(), "Required parameter `id` is missing.");
	}
}
