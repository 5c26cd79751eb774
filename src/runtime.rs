//! Request execution engine turning declarative descriptions into HTTP calls.
//!
//! [`Runtime::send`] builds a wire request from a [`RequestDescription`], runs
//! the middleware chain (`pre` in registration order, `on_error` in reverse on
//! transport failure, `post` in registration order on success), invokes the
//! transport exactly once, and classifies the result into a typed response or
//! a typed error. The call is atomic from the caller's perspective; no
//! intermediate state is observable.

// self
use crate::{
	_prelude::*,
	error::{ConfigError, ResponseError},
	http::{HttpTransport, Method, WireRequest, WireResponse},
	middleware::{ErrorFlow, Middleware},
	obs::{self, CallKind, CallOutcome, CallSpan},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Runtime specialized for the crate's default reqwest transport.
pub type ReqwestRuntime = Runtime<ReqwestTransport>;

/// Runtime over a type-erased transport, as assembled from [`ClientOptions`](crate::client::ClientOptions).
pub type DynRuntime = Runtime<dyn HttpTransport>;

/// Boxed future returned by [`ErrorParser::parse`].
pub type ErrorParserFuture<'a> = Pin<Box<dyn Future<Output = Error> + 'a + Send>>;

/// Hook that turns a non-success response into the error surfaced to callers.
///
/// Configured once at client construction; when absent, classification falls
/// back to [`ResponseError::new`] over the parsed body.
pub trait ErrorParser
where
	Self: Send + Sync,
{
	/// Produces the error for a response whose status fell outside the
	/// description's success set.
	fn parse<'a>(&'a self, response: &'a WireResponse) -> ErrorParserFuture<'a>;
}

/// Status codes a description counts as success.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum StatusPolicy {
	/// Any 2xx status.
	#[default]
	Successful,
	/// Exactly the listed statuses.
	AnyOf(Vec<u16>),
}
impl StatusPolicy {
	/// Returns `true` when the status belongs to the success set.
	pub fn accepts(&self, status: u16) -> bool {
		match self {
			StatusPolicy::Successful => (200..300).contains(&status),
			StatusPolicy::AnyOf(accepted) => accepted.contains(&status),
		}
	}
}

/// Declarative description of one API call, constructed per call by a manager
/// and consumed once by the runtime.
#[derive(Clone, Debug)]
pub struct RequestDescription {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the runtime's base URL.
	pub path: String,
	/// Query parameters; keys are unique.
	pub query: BTreeMap<String, String>,
	/// Extra headers merged over the runtime's defaults.
	pub headers: BTreeMap<String, String>,
	/// Serialized body, if any.
	pub body: Option<Vec<u8>>,
	/// Content type accompanying the body.
	pub content_type: Option<&'static str>,
	/// Success set used during classification.
	pub status_policy: StatusPolicy,
	missing: Vec<&'static str>,
}
impl RequestDescription {
	/// Starts a builder for the given method and relative path.
	pub fn builder(method: Method, path: impl Into<String>) -> RequestDescriptionBuilder {
		RequestDescriptionBuilder {
			description: Self {
				method,
				path: path.into(),
				query: BTreeMap::new(),
				headers: BTreeMap::new(),
				body: None,
				content_type: None,
				status_policy: StatusPolicy::default(),
				missing: Vec::new(),
			},
		}
	}

	/// Shorthand for a GET description with no further configuration.
	pub fn get(path: impl Into<String>) -> Self {
		Self::builder(Method::Get, path).build()
	}

	fn first_missing(&self) -> Option<&'static str> {
		self.missing.first().copied()
	}
}

/// Builder collecting the parts of a [`RequestDescription`].
///
/// `require*` methods record omitted mandatory fields; the runtime rejects the
/// description with [`Error::RequiredParameter`] before any network I/O.
#[derive(Clone, Debug)]
pub struct RequestDescriptionBuilder {
	description: RequestDescription,
}
impl RequestDescriptionBuilder {
	/// Adds a query parameter, replacing any previous value for the key.
	pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
		self.description.query.insert(key.into(), value.into());

		self
	}

	/// Adds a query parameter when the value is present.
	pub fn query_opt(self, key: impl Into<String>, value: Option<impl Into<String>>) -> Self {
		match value {
			Some(value) => self.query(key, value),
			None => self,
		}
	}

	/// Adds a mandatory query parameter, recording its absence otherwise.
	pub fn required_query(
		mut self,
		key: &'static str,
		value: Option<impl Into<String>>,
	) -> Self {
		match value {
			Some(value) => {
				self.description.query.insert(key.into(), value.into());
			},
			None => self.description.missing.push(key),
		}

		self
	}

	/// Declares a mandatory value the manager resolved elsewhere (e.g. a path
	/// segment), recording its absence.
	pub fn require<T>(mut self, name: &'static str, value: Option<&T>) -> Self {
		if value.is_none() {
			self.description.missing.push(name);
		}

		self
	}

	/// Adds a header, replacing any previous value for the name.
	pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.description.headers.insert(name.as_ref().to_ascii_lowercase(), value.into());

		self
	}

	/// Attaches a JSON body.
	pub fn json_body(mut self, body: &serde_json::Value) -> Self {
		self.description.body = Some(body.to_string().into_bytes());
		self.description.content_type = Some("application/json");

		self
	}

	/// Attaches a raw body with an explicit content type.
	pub fn raw_body(mut self, body: impl Into<Vec<u8>>, content_type: &'static str) -> Self {
		self.description.body = Some(body.into());
		self.description.content_type = Some(content_type);

		self
	}

	/// Overrides the success set used during classification.
	pub fn status_policy(mut self, policy: StatusPolicy) -> Self {
		self.description.status_policy = policy;

		self
	}

	/// Finalizes the description.
	pub fn build(self) -> RequestDescription {
		self.description
	}
}

/// Parsed result of a successful call, carrying response metadata alongside
/// the decoded payload.
#[derive(Clone, Debug)]
pub struct ApiResponse<T> {
	/// Decoded response payload.
	pub data: T,
	/// HTTP status code.
	pub status: u16,
	/// Response headers keyed by lowercase name.
	pub headers: BTreeMap<String, String>,
}

/// Executes declarative requests through the middleware chain and transport.
///
/// The middleware sequence, error parser, and default headers are fixed at
/// construction; per-call variation lives entirely in the
/// [`RequestDescription`].
pub struct Runtime<C>
where
	C: ?Sized + HttpTransport,
{
	base_url: Url,
	transport: Arc<C>,
	middleware: Vec<Arc<dyn Middleware>>,
	error_parser: Option<Arc<dyn ErrorParser>>,
	default_headers: BTreeMap<String, String>,
}
impl<C> Runtime<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a runtime over the given base URL and transport, with no
	/// middleware and no error parser.
	pub fn new(base_url: Url, transport: impl Into<Arc<C>>) -> Self {
		Self {
			base_url,
			transport: transport.into(),
			middleware: Vec::new(),
			error_parser: None,
			default_headers: BTreeMap::new(),
		}
	}

	/// Installs the ordered middleware sequence for this runtime's lifetime.
	pub fn with_middleware(mut self, middleware: Vec<Arc<dyn Middleware>>) -> Self {
		self.middleware = middleware;

		self
	}

	/// Installs the error parser consulted for non-success responses.
	pub fn with_error_parser(mut self, parser: Arc<dyn ErrorParser>) -> Self {
		self.error_parser = Some(parser);

		self
	}

	/// Adds a header applied to every request unless the description overrides it.
	pub fn with_default_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
		self.default_headers.insert(name.as_ref().to_ascii_lowercase(), value.into());

		self
	}

	/// Returns the base URL requests are resolved against.
	pub fn base_url(&self) -> &Url {
		&self.base_url
	}

	/// Returns the transport shared by this runtime.
	pub fn transport(&self) -> &Arc<C> {
		&self.transport
	}

	/// Executes one description and returns the raw classified response.
	pub async fn send(&self, description: RequestDescription) -> Result<ApiResponse<Vec<u8>>> {
		const KIND: CallKind = CallKind::Request;

		let span = CallSpan::new(KIND, "send");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.execute(description)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	/// Executes one description and decodes the response body as JSON.
	///
	/// An empty body decodes as JSON `null`, so unit-like targets work for
	/// 204-style endpoints.
	pub async fn request<T>(&self, description: RequestDescription) -> Result<ApiResponse<T>>
	where
		T: serde::de::DeserializeOwned,
	{
		let raw = self.send(description).await?;
		let bytes: &[u8] = if raw.data.is_empty() { b"null" } else { &raw.data };
		let mut deserializer = serde_json::Deserializer::from_slice(bytes);
		let data = serde_path_to_error::deserialize(&mut deserializer)
			.map_err(|source| Error::Decode { source, status: raw.status })?;

		Ok(ApiResponse { data, status: raw.status, headers: raw.headers })
	}

	async fn execute(&self, description: RequestDescription) -> Result<ApiResponse<Vec<u8>>> {
		if let Some(parameter) = description.first_missing() {
			return Err(Error::RequiredParameter { parameter });
		}

		let url = resolve_url(&self.base_url, &description)?;
		let mut request = WireRequest::new(description.method, url);

		for (name, value) in &self.default_headers {
			request.set_header(name, value.clone());
		}
		for (name, value) in &description.headers {
			request.set_header(name, value.clone());
		}
		if let Some(body) = description.body {
			if let Some(content_type) = description.content_type
				&& request.header("content-type").is_none()
			{
				request.set_header("content-type", content_type);
			}

			request.body = Some(body);
		}

		for middleware in &self.middleware {
			request = middleware.pre(request).await?;
		}

		let response = match self.transport.send(request.clone()).await {
			Ok(response) => {
				let mut response = response;

				for middleware in &self.middleware {
					response = middleware.post(&request, response).await?;
				}

				response
			},
			Err(transport_error) => self.unwind(&request, transport_error.into()).await?,
		};
		let response = self.classify(&description.status_policy, response).await?;

		Ok(ApiResponse { data: response.body, status: response.status, headers: response.headers })
	}

	/// Walks `on_error` hooks innermost-first; the first recovered response
	/// stops the unwind.
	async fn unwind(&self, request: &WireRequest, error: Error) -> Result<WireResponse> {
		let mut error = error;

		for middleware in self.middleware.iter().rev() {
			match middleware.on_error(request, error).await {
				ErrorFlow::Recovered(response) => return Ok(response),
				ErrorFlow::Propagate(next) => error = next,
			}
		}

		Err(error)
	}

	async fn classify(
		&self,
		policy: &StatusPolicy,
		response: WireResponse,
	) -> Result<WireResponse> {
		if policy.accepts(response.status) {
			return Ok(response);
		}
		if let Some(parser) = &self.error_parser {
			return Err(parser.parse(&response).await);
		}

		let body = parse_error_body(&response);

		Err(ResponseError::new(response.status, body).into())
	}
}
impl<C> Debug for Runtime<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Runtime")
			.field("base_url", &self.base_url.as_str())
			.field("middleware_count", &self.middleware.len())
			.field("error_parser_set", &self.error_parser.is_some())
			.finish()
	}
}

fn resolve_url(base: &Url, description: &RequestDescription) -> Result<Url, ConfigError> {
	let path = description.path.trim_start_matches('/');
	let mut url = base
		.join(path)
		.map_err(|source| ConfigError::InvalidPath { path: description.path.clone(), source })?;

	if !description.query.is_empty() {
		let mut pairs = url.query_pairs_mut();

		for (key, value) in &description.query {
			pairs.append_pair(key, value);
		}
	}

	Ok(url)
}

fn parse_error_body(response: &WireResponse) -> serde_json::Value {
	if response.body.is_empty() {
		return serde_json::Value::Null;
	}

	response.json().unwrap_or_else(|_| serde_json::Value::String(response.text()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_policy_defaults_to_2xx() {
		let policy = StatusPolicy::default();

		assert!(policy.accepts(200));
		assert!(policy.accepts(204));
		assert!(!policy.accepts(404));

		let policy = StatusPolicy::AnyOf(vec![200, 404]);

		assert!(policy.accepts(404));
		assert!(!policy.accepts(204));
	}

	#[test]
	fn builder_records_missing_required_parameters() {
		let description = RequestDescription::builder(Method::Get, "api/v2/users")
			.required_query("id", None::<String>)
			.query("page", "2")
			.build();

		assert_eq!(description.first_missing(), Some("id"));

		let description = RequestDescription::builder(Method::Get, "api/v2/users")
			.required_query("id", Some("u-1"))
			.require("body", Some(&()))
			.build();

		assert_eq!(description.first_missing(), None);
		assert_eq!(description.query.get("id").map(String::as_str), Some("u-1"));
	}

	#[test]
	fn url_resolution_joins_path_and_query() {
		let base = Url::parse("https://tenant.example.com/")
			.expect("Fixture base URL should parse successfully.");
		let description = RequestDescription::builder(Method::Get, "/api/v2/logs")
			.query("q", "type:f")
			.query("page", "0")
			.build();
		let url = resolve_url(&base, &description)
			.expect("Fixture description should resolve successfully.");

		assert_eq!(url.as_str(), "https://tenant.example.com/api/v2/logs?page=0&q=type%3Af");
	}

	#[test]
	fn error_body_falls_back_to_raw_text() {
		let response = WireResponse::new(502).with_body("bad gateway");

		assert_eq!(parse_error_body(&response), serde_json::Value::String("bad gateway".into()));

		let response = WireResponse::new(500).with_body(r#"{"message":"boom"}"#);

		assert_eq!(parse_error_body(&response)["message"], "boom");
	}
}
