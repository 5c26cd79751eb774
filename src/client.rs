//! Management client facade wiring the token provider, middleware chain, and
//! runtime together from one configuration surface.
//!
//! Every client instance is explicitly constructed and owns its own token
//! provider; there is no process-wide ambient state. Callers that want to
//! share a token cache across clients share the provider handle explicitly.

// self
use crate::{
	_prelude::*,
	clock::Clock,
	error::ConfigError,
	http::HttpTransport,
	middleware::{Middleware, TokenMiddleware},
	obs::{CallKind, CallSpan},
	runtime::{ApiResponse, DynRuntime, ErrorParser, RequestDescription, Runtime},
	token::{Credentials, TokenProvider, provider},
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestTransport;

/// Configuration surface consumed by [`ManagementClient::new`].
///
/// `domain` is always required. Token acquisition uses either a static bearer
/// `token` (which overrides the exchange flow entirely) or the
/// `client_id`/`client_secret`/`audience` triple; `audience` defaults to
/// `{domain}/api/v2/` when omitted.
pub struct ClientOptions {
	domain: String,
	client_id: Option<String>,
	client_secret: Option<String>,
	audience: Option<String>,
	token: Option<String>,
	transport: Option<Arc<dyn HttpTransport>>,
	parse_error: Option<Arc<dyn ErrorParser>>,
	middleware: Vec<Arc<dyn Middleware>>,
	clock: Option<Arc<dyn Clock>>,
}
impl ClientOptions {
	/// Starts a configuration for the given tenant domain.
	pub fn new(domain: impl Into<String>) -> Self {
		Self {
			domain: domain.into(),
			client_id: None,
			client_secret: None,
			audience: None,
			token: None,
			transport: None,
			parse_error: None,
			middleware: Vec::new(),
			clock: None,
		}
	}

	/// Sets the confidential client credential pair.
	pub fn with_client_credentials(
		mut self,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
	) -> Self {
		self.client_id = Some(client_id.into());
		self.client_secret = Some(client_secret.into());

		self
	}

	/// Sets the audience the exchanged token is scoped to.
	pub fn with_audience(mut self, audience: impl Into<String>) -> Self {
		self.audience = Some(audience.into());

		self
	}

	/// Supplies a static bearer token, bypassing the exchange flow entirely.
	pub fn with_token(mut self, token: impl Into<String>) -> Self {
		self.token = Some(token.into());

		self
	}

	/// Routes all HTTP calls (token endpoint included) through a custom transport.
	pub fn with_transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
		self.transport = Some(transport);

		self
	}

	/// Installs the hook that turns non-success responses into errors.
	pub fn with_parse_error(mut self, parser: Arc<dyn ErrorParser>) -> Self {
		self.parse_error = Some(parser);

		self
	}

	/// Appends a middleware to run after the token middleware, in supplied order.
	pub fn with_middleware(mut self, middleware: Arc<dyn Middleware>) -> Self {
		self.middleware.push(middleware);

		self
	}

	/// Replaces the time source used for token expiry comparisons.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = Some(clock);

		self
	}
}
impl Debug for ClientOptions {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ClientOptions")
			.field("domain", &self.domain)
			.field("client_id", &self.client_id)
			.field("client_secret_set", &self.client_secret.is_some())
			.field("audience", &self.audience)
			.field("token_set", &self.token.is_some())
			.field("middleware_count", &self.middleware.len())
			.finish()
	}
}

/// Entry point generated resource managers call into.
///
/// The client owns a [`DynRuntime`] whose middleware chain starts with the
/// token middleware followed by caller-supplied extras. Managers build
/// [`RequestDescription`]s and delegate here.
#[derive(Debug)]
pub struct ManagementClient {
	runtime: DynRuntime,
	token_provider: Option<Arc<TokenProvider<dyn HttpTransport>>>,
}
impl ManagementClient {
	/// Assembles a client from the recognized configuration surface.
	pub fn new(options: ClientOptions) -> Result<Self> {
		// Assembly is fully synchronous; the entered guard covers it end to end.
		let _span = CallSpan::new(CallKind::ClientBuild, "new").entered();
		let transport: Arc<dyn HttpTransport> = match options.transport {
			Some(transport) => transport,
			#[cfg(feature = "reqwest")]
			None => Arc::new(ReqwestTransport::default()),
			#[cfg(not(feature = "reqwest"))]
			None => return Err(ConfigError::MissingTransport.into()),
		};
		let base_url = provider::parse_domain(&options.domain)?;
		let (token_middleware, token_provider): (Arc<dyn Middleware>, _) = match options.token {
			Some(token) => {
				(Arc::new(TokenMiddleware::<dyn HttpTransport>::with_static(token)), None)
			},
			None => {
				let (Some(client_id), Some(client_secret)) =
					(options.client_id, options.client_secret)
				else {
					return Err(ConfigError::MissingCredentials.into());
				};
				let audience = match options.audience {
					Some(audience) => audience,
					None => base_url
						.join("api/v2/")
						.map_err(|source| ConfigError::InvalidPath {
							path: "api/v2/".into(),
							source,
						})?
						.to_string(),
				};
				let credentials =
					Credentials::new(&options.domain, client_id, client_secret, audience)?;
				let mut provider = TokenProvider::new(credentials, transport.clone());

				if let Some(clock) = options.clock {
					provider = provider.with_clock(clock);
				}

				let provider = Arc::new(provider);

				(Arc::new(TokenMiddleware::with_provider(provider.clone())), Some(provider))
			},
		};
		let mut middleware: Vec<Arc<dyn Middleware>> =
			Vec::with_capacity(1 + options.middleware.len());

		middleware.push(token_middleware);
		middleware.extend(options.middleware);

		let mut runtime = Runtime::new(base_url, transport).with_middleware(middleware);

		if let Some(parser) = options.parse_error {
			runtime = runtime.with_error_parser(parser);
		}

		Ok(Self { runtime, token_provider })
	}

	/// Returns the runtime managers execute their descriptions through.
	pub fn runtime(&self) -> &DynRuntime {
		&self.runtime
	}

	/// Returns the token provider, when the client authenticates via the
	/// client-credentials exchange. Share this handle to share the token cache
	/// across clients.
	pub fn token_provider(&self) -> Option<&Arc<TokenProvider<dyn HttpTransport>>> {
		self.token_provider.as_ref()
	}

	/// Executes a description and decodes the response body as JSON.
	pub async fn request<T>(&self, description: RequestDescription) -> Result<ApiResponse<T>>
	where
		T: serde::de::DeserializeOwned,
	{
		self.runtime.request(description).await
	}

	/// Executes a description and returns the raw classified response.
	pub async fn send(&self, description: RequestDescription) -> Result<ApiResponse<Vec<u8>>> {
		self.runtime.send(description).await
	}
}
