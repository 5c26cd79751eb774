//! Composable hook contract invoked around every outbound request.
//!
//! Middlewares are held in a fixed, caller-supplied order for the lifetime of
//! a client instance. The runtime walks `pre` hooks in registration order
//! (later hooks observe headers injected by earlier ones), `post` hooks in the
//! same order, and `on_error` hooks in reverse order, mirroring a nested-scope
//! unwind. A hook set may implement any subset; the provided defaults pass
//! requests, responses, and errors through untouched.

pub mod token;

pub use token::*;

// self
use crate::{
	_prelude::*,
	http::{WireRequest, WireResponse},
};

/// Boxed future returned by fallible middleware hooks.
pub type MiddlewareFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + 'a + Send>>;

/// Boxed future returned by [`Middleware::on_error`].
pub type ErrorFlowFuture<'a> = Pin<Box<dyn Future<Output = ErrorFlow> + 'a + Send>>;

/// Hook set invoked around every outbound request.
pub trait Middleware
where
	Self: Send + Sync,
{
	/// Observes or mutates the request before it reaches the transport.
	///
	/// Returning an error aborts the call before any network I/O.
	fn pre<'a>(&'a self, request: WireRequest) -> MiddlewareFuture<'a, WireRequest> {
		Box::pin(async move { Ok(request) })
	}

	/// Observes or transforms the transport's response before classification.
	fn post<'a>(
		&'a self,
		request: &'a WireRequest,
		response: WireResponse,
	) -> MiddlewareFuture<'a, WireResponse> {
		let _ = request;

		Box::pin(async move { Ok(response) })
	}

	/// Intercepts a transport failure, either substituting a recovered response
	/// or letting the error continue up the unwind.
	fn on_error<'a>(&'a self, request: &'a WireRequest, error: Error) -> ErrorFlowFuture<'a> {
		let _ = request;

		Box::pin(async move { ErrorFlow::Propagate(error) })
	}
}

/// Outcome of an [`Middleware::on_error`] hook.
#[derive(Debug)]
pub enum ErrorFlow {
	/// The hook produced a substitute response; the unwind stops and the
	/// response proceeds to classification.
	Recovered(WireResponse),
	/// The error continues to the next hook (or the caller).
	Propagate(Error),
}
