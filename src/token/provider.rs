//! Client-credentials token provider with caching + singleflight guards.
//!
//! [`TokenProvider::access_token`] serves a cached bearer token while it
//! remains valid and otherwise performs exactly one `client_credentials`
//! exchange regardless of how many callers race on a cold or expired cache.
//! Concurrent callers queue on a per-provider singleflight guard; once they
//! hold it they either find the fresh token in the cache or, when the fetch
//! they waited on failed, observe that same failure. A stampede against the
//! token endpoint is structurally impossible. Failed exchanges never populate
//! the cache; the next caller to arrive retries cleanly.

// std
use std::{
	borrow::Cow,
	sync::atomic::{AtomicU64, Ordering},
};
// crates.io
use url::form_urlencoded::Serializer as FormSerializer;
// self
use crate::{
	_prelude::*,
	clock::{Clock, SystemClock},
	error::{ConfigError, TokenEndpointError, TransportError},
	http::{HttpTransport, Method, WireRequest},
	obs::{self, CallKind, CallOutcome, CallSpan},
	token::secret::TokenSecret,
};

/// Immutable credential set for the client-credentials grant.
///
/// Construction normalizes the tenant domain into a base URL (bare hosts gain
/// an `https://` scheme) and derives the token endpoint from it. A
/// caller-supplied static bearer token bypasses this type entirely; see
/// [`TokenSource::Static`](crate::middleware::TokenSource).
#[derive(Clone, Debug)]
pub struct Credentials {
	/// Base URL derived from the tenant domain.
	pub base_url: Url,
	/// Token endpoint resolved as `{domain}/oauth/token`.
	pub token_endpoint: Url,
	/// OAuth 2.0 client identifier.
	pub client_id: String,
	/// Confidential client secret.
	pub client_secret: TokenSecret,
	/// Audience the issued token is scoped to.
	pub audience: String,
}
impl Credentials {
	/// Builds a credential set from a tenant domain and client credential pair.
	pub fn new(
		domain: impl AsRef<str>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		audience: impl Into<String>,
	) -> Result<Self, ConfigError> {
		let base_url = parse_domain(domain.as_ref())?;
		let token_endpoint = base_url.join("oauth/token").map_err(|source| {
			ConfigError::InvalidPath { path: "oauth/token".into(), source }
		})?;

		Ok(Self {
			base_url,
			token_endpoint,
			client_id: client_id.into(),
			client_secret: TokenSecret::new(client_secret),
			audience: audience.into(),
		})
	}

	/// Encodes the token request body.
	///
	/// Field order is part of the wire contract and must stay exactly
	/// `client_id`, `client_secret`, `audience`, `grant_type`.
	pub fn token_request_body(&self) -> String {
		FormSerializer::new(String::new())
			.append_pair("client_id", &self.client_id)
			.append_pair("client_secret", self.client_secret.expose())
			.append_pair("audience", &self.audience)
			.append_pair("grant_type", "client_credentials")
			.finish()
	}
}

/// Wire shape of a successful token endpoint response.
#[derive(Clone, Deserialize)]
pub struct TokenResponse {
	/// Issued bearer token.
	pub access_token: String,
	/// Token lifetime in seconds, as reported by the server.
	pub expires_in: i64,
	/// Token type reported by the server, conventionally `Bearer`.
	pub token_type: String,
}
impl Debug for TokenResponse {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenResponse")
			.field("access_token", &"<redacted>")
			.field("expires_in", &self.expires_in)
			.field("token_type", &self.token_type)
			.finish()
	}
}

/// Cached token slot owned exclusively by the provider.
#[derive(Clone, Debug)]
struct CachedToken {
	value: TokenSecret,
	expires_at: OffsetDateTime,
}
impl CachedToken {
	fn is_valid_at(&self, instant: OffsetDateTime) -> bool {
		instant < self.expires_at
	}
}

/// Outcome slot written by each fetch and read by the callers queued behind it.
#[derive(Debug, Default)]
struct FetchSlot {
	failure: Option<ExchangeFailure>,
}

/// Cloneable failure of a single credentials exchange.
#[derive(Clone, Debug)]
enum ExchangeFailure {
	Endpoint(TokenEndpointError),
	Transport(TransportError),
}
impl From<ExchangeFailure> for Error {
	fn from(failure: ExchangeFailure) -> Self {
		match failure {
			ExchangeFailure::Endpoint(e) => e.into(),
			ExchangeFailure::Transport(e) => e.into(),
		}
	}
}

/// Produces bearer tokens for machine-to-machine calls, minimizing redundant
/// token-endpoint traffic.
///
/// Each provider instance owns its cache and singleflight guard; separate
/// client instances never share token state unless the caller explicitly
/// shares a provider behind an `Arc`.
pub struct TokenProvider<C>
where
	C: ?Sized + HttpTransport,
{
	credentials: Credentials,
	transport: Arc<C>,
	clock: Arc<dyn Clock>,
	cache: RwLock<Option<CachedToken>>,
	fetch_guard: AsyncMutex<FetchSlot>,
	fetch_generation: AtomicU64,
}
impl<C> TokenProvider<C>
where
	C: ?Sized + HttpTransport,
{
	/// Safety margin subtracted from the server-reported lifetime so refreshes
	/// happen slightly before server-side expiry.
	pub const EXPIRY_LEEWAY: Duration = Duration::seconds(5);

	/// Creates a provider backed by the given transport and the system clock.
	pub fn new(credentials: Credentials, transport: impl Into<Arc<C>>) -> Self {
		Self {
			credentials,
			transport: transport.into(),
			clock: Arc::new(SystemClock),
			cache: RwLock::new(None),
			fetch_guard: AsyncMutex::new(FetchSlot::default()),
			fetch_generation: AtomicU64::new(0),
		}
	}

	/// Replaces the time source; expiry comparisons use this clock exclusively.
	pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
		self.clock = clock;

		self
	}

	/// Returns the credential set the provider was constructed with.
	pub fn credentials(&self) -> &Credentials {
		&self.credentials
	}

	/// Returns a valid bearer token, exchanging credentials only when the cache
	/// is cold or expired.
	pub async fn access_token(&self) -> Result<TokenSecret> {
		const KIND: CallKind = CallKind::TokenExchange;

		let span = CallSpan::new(KIND, "access_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				if let Some(token) = self.cached_token() {
					return Ok(token);
				}

				let observed = self.fetch_generation.load(Ordering::Acquire);
				let mut slot = self.fetch_guard.lock().await;

				// A waiter that queued behind a successful fetch finds the
				// fresh token here instead of starting a second exchange.
				if let Some(token) = self.cached_token() {
					return Ok(token);
				}
				// A waiter that queued behind a failed fetch observes that
				// fetch's failure; only callers that arrive afterwards retry.
				if self.fetch_generation.load(Ordering::Acquire) != observed
					&& let Some(failure) = slot.failure.clone()
				{
					return Err(failure.into());
				}

				match self.exchange().await {
					Ok(token) => {
						slot.failure = None;

						self.fetch_generation.fetch_add(1, Ordering::Release);

						Ok(token)
					},
					Err(failure) => {
						slot.failure = Some(failure.clone());

						self.fetch_generation.fetch_add(1, Ordering::Release);

						Err(failure.into())
					},
				}
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	fn cached_token(&self) -> Option<TokenSecret> {
		let now = self.clock.now();

		self.cache.read().as_ref().filter(|cached| cached.is_valid_at(now)).map(|cached| {
			cached.value.clone()
		})
	}

	async fn exchange(&self) -> Result<TokenSecret, ExchangeFailure> {
		let mut request =
			WireRequest::new(Method::Post, self.credentials.token_endpoint.clone());

		request.set_header("content-type", "application/x-www-form-urlencoded");
		request.body = Some(self.credentials.token_request_body().into_bytes());

		let response = self.transport.send(request).await.map_err(ExchangeFailure::Transport)?;

		if !response.is_success() {
			return Err(ExchangeFailure::Endpoint(TokenEndpointError::Rejected {
				status: response.status,
				body: response.text(),
			}));
		}

		let parsed: TokenResponse = response.json().map_err(|source| {
			ExchangeFailure::Endpoint(TokenEndpointError::Parse {
				source: Arc::new(source),
				status: response.status,
			})
		})?;
		let token = TokenSecret::new(parsed.access_token);
		// A non-positive remaining lifetime still yields the token; the next
		// call simply re-fetches instead of failing this one.
		let expires_at =
			self.clock.now() + Duration::seconds(parsed.expires_in) - Self::EXPIRY_LEEWAY;

		*self.cache.write() = Some(CachedToken { value: token.clone(), expires_at });

		Ok(token)
	}
}
impl<C> Debug for TokenProvider<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenProvider")
			.field("token_endpoint", &self.credentials.token_endpoint.as_str())
			.field("client_id", &self.credentials.client_id)
			.field("cache_populated", &self.cache.read().is_some())
			.finish()
	}
}

pub(crate) fn parse_domain(domain: &str) -> Result<Url, ConfigError> {
	let candidate = if domain.contains("://") {
		Cow::Borrowed(domain)
	} else {
		Cow::Owned(format!("https://{domain}"))
	};
	let mut url = Url::parse(&candidate)
		.map_err(|source| ConfigError::InvalidDomain { domain: domain.into(), source })?;

	// Url::join treats a base without a trailing slash as a file; anchor the
	// path so `oauth/token` and manager paths append instead of replacing.
	if !url.path().ends_with('/') {
		let path = format!("{}/", url.path());

		url.set_path(&path);
	}

	Ok(url)
}
