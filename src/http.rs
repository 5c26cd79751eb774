//! Transport primitives for outbound HTTP calls.
//!
//! The module exposes [`HttpTransport`] alongside the [`WireRequest`] and
//! [`WireResponse`] value types so downstream crates can integrate custom HTTP
//! stacks without pulling their dependencies into the core. Both the token
//! provider and the request runtime speak only this trait; the default
//! reqwest-backed implementation lives behind the `reqwest` feature.

// std
use std::ops::Deref;
// self
use crate::{_prelude::*, error::TransportError};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<WireResponse, TransportError>> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing a single request.
///
/// The trait is the core's only dependency on an HTTP stack. Callers provide an
/// implementation (typically behind `Arc<T>` where `T: HttpTransport`) shared
/// by the token provider and the runtime. Implementations must be
/// `Send + Sync + 'static` so a transport can back several client instances,
/// and the returned future must be `Send` so runtime futures can hop executors.
///
/// Cancellation is the transport's concern: an aborted or timed-out call must
/// resolve the future with a [`TransportError`] rather than hang.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Executes one request and resolves with the raw response.
	fn send(&self, request: WireRequest) -> TransportFuture<'_>;
}

/// HTTP methods understood by the runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
	/// HTTP GET.
	Get,
	/// HTTP POST.
	Post,
	/// HTTP PUT.
	Put,
	/// HTTP PATCH.
	Patch,
	/// HTTP DELETE.
	Delete,
}
impl Method {
	/// Returns the canonical uppercase method name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Patch => "PATCH",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Fully resolved outbound request handed to the transport.
///
/// Header names are normalized to lowercase so middleware can inspect and
/// replace them without caring about the casing an earlier hook used.
#[derive(Clone, Debug)]
pub struct WireRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute URL including the query string.
	pub url: Url,
	/// Header map keyed by lowercase header name.
	pub headers: BTreeMap<String, String>,
	/// Serialized request body, if any.
	pub body: Option<Vec<u8>>,
}
impl WireRequest {
	/// Creates a request with no headers and no body.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, headers: BTreeMap::new(), body: None }
	}

	/// Inserts a header, replacing any previous value for the same name.
	pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
		self.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());
	}

	/// Returns the header value for a name, if present.
	pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
		self.headers.get(&name.as_ref().to_ascii_lowercase()).map(String::as_str)
	}
}

/// Raw response produced by a transport before classification.
#[derive(Clone, Debug)]
pub struct WireResponse {
	/// HTTP status code.
	pub status: u16,
	/// Header map keyed by lowercase header name.
	pub headers: BTreeMap<String, String>,
	/// Raw response body bytes.
	pub body: Vec<u8>,
}
impl WireResponse {
	/// Creates a response with no headers and an empty body.
	pub fn new(status: u16) -> Self {
		Self { status, headers: BTreeMap::new(), body: Vec::new() }
	}

	/// Replaces the body with the provided bytes.
	pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = body.into();

		self
	}

	/// Returns `true` when the status falls in the 2xx range.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Returns the body interpreted as UTF-8 text, replacing invalid sequences.
	pub fn text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Decodes the body as JSON, reporting the offending path on failure.
	pub fn json<T>(&self) -> Result<T, serde_path_to_error::Error<serde_json::Error>>
	where
		T: serde::de::DeserializeOwned,
	{
		let mut deserializer = serde_json::Deserializer::from_slice(&self.body);

		serde_path_to_error::deserialize(&mut deserializer)
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one
/// place. Redirect following should stay disabled on custom clients: both the
/// token endpoint and management API return results directly, and a silent
/// redirect would strip the `authorization` header.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Wraps an existing [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send(&self, request: WireRequest) -> TransportFuture<'_> {
		let client = self.0.clone();

		Box::pin(async move {
			let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
				.map_err(TransportError::network)?;
			let mut builder = client.request(method, request.url.clone());

			for (name, value) in &request.headers {
				builder = builder.header(name, value);
			}
			if let Some(body) = request.body {
				builder = builder.body(body);
			}

			let response = builder.send().await.map_err(TransportError::from)?;
			let status = response.status().as_u16();
			let headers = response
				.headers()
				.iter()
				.map(|(name, value)| {
					(name.as_str().to_owned(), String::from_utf8_lossy(value.as_bytes()).into_owned())
				})
				.collect();
			let body = response.bytes().await.map_err(TransportError::from)?.to_vec();

			Ok(WireResponse { status, headers, body })
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn header_names_are_case_insensitive() {
		let url = Url::parse("https://tenant.example.com/api/v2/users")
			.expect("Fixture URL should parse successfully.");
		let mut request = WireRequest::new(Method::Get, url);

		request.set_header("Authorization", "Bearer abc");

		assert_eq!(request.header("authorization"), Some("Bearer abc"));
		assert_eq!(request.header("AUTHORIZATION"), Some("Bearer abc"));

		request.set_header("authorization", "Bearer xyz");

		assert_eq!(request.headers.len(), 1);
		assert_eq!(request.header("Authorization"), Some("Bearer xyz"));
	}

	#[test]
	fn response_json_reports_offending_path() {
		#[derive(Debug, serde::Deserialize)]
		struct Payload {
			#[allow(dead_code)]
			name: String,
		}

		let response = WireResponse::new(200).with_body(r#"{"name":42}"#);
		let err = response.json::<Payload>().expect_err("Mismatched type should fail to decode.");

		assert_eq!(err.path().to_string(), "name");
	}

	#[test]
	fn success_covers_the_2xx_range() {
		assert!(WireResponse::new(200).is_success());
		assert!(WireResponse::new(204).is_success());
		assert!(!WireResponse::new(199).is_success());
		assert!(!WireResponse::new(301).is_success());
		assert!(!WireResponse::new(500).is_success());
	}
}
