//! Middleware that injects a bearer token into every outgoing request.

// self
use crate::{
	_prelude::*,
	http::{HttpTransport, WireRequest},
	middleware::{Middleware, MiddlewareFuture},
	token::{TokenProvider, TokenSecret},
};

/// Where the bearer token for a request comes from.
pub enum TokenSource<C>
where
	C: ?Sized + HttpTransport,
{
	/// Tokens are acquired (and cached) by a [`TokenProvider`].
	Provider(Arc<TokenProvider<C>>),
	/// A caller-supplied token used verbatim; the token endpoint is never
	/// contacted and no expiry logic applies.
	Static(TokenSecret),
}
impl<C> Debug for TokenSource<C>
where
	C: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Provider(provider) =>
				f.debug_tuple("TokenSource::Provider").field(provider).finish(),
			Self::Static(_) => f.debug_tuple("TokenSource::Static").field(&"<redacted>").finish(),
		}
	}
}

/// Bridges token acquisition into the middleware contract.
///
/// On `pre` the middleware resolves exactly one token per outgoing request,
/// sets the `authorization` header, and passes the request through otherwise
/// unchanged. It never caches tokens itself; caching is entirely the
/// provider's responsibility. A failed resolution aborts the call before any
/// network I/O to the target API.
#[derive(Debug)]
pub struct TokenMiddleware<C>
where
	C: ?Sized + HttpTransport,
{
	source: TokenSource<C>,
}
impl<C> TokenMiddleware<C>
where
	C: ?Sized + HttpTransport,
{
	/// Creates a middleware around the provided token source.
	pub fn new(source: TokenSource<C>) -> Self {
		Self { source }
	}

	/// Convenience constructor for provider-backed acquisition.
	pub fn with_provider(provider: Arc<TokenProvider<C>>) -> Self {
		Self::new(TokenSource::Provider(provider))
	}

	/// Convenience constructor for a caller-supplied static token.
	pub fn with_static(token: impl Into<String>) -> Self {
		Self::new(TokenSource::Static(TokenSecret::new(token)))
	}
}
impl<C> Middleware for TokenMiddleware<C>
where
	C: ?Sized + HttpTransport,
{
	fn pre<'a>(&'a self, mut request: WireRequest) -> MiddlewareFuture<'a, WireRequest> {
		Box::pin(async move {
			let token = match &self.source {
				TokenSource::Provider(provider) => provider.access_token().await?,
				TokenSource::Static(token) => token.clone(),
			};

			request.set_header("authorization", token.bearer());

			Ok(request)
		})
	}
}
