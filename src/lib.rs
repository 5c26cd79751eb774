//! Core runtime for multi-tenant management API clients: cached
//! client-credentials tokens, a composable middleware pipeline, and a typed
//! error taxonomy shared by every generated resource manager.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod client;
pub mod clock;
pub mod error;
pub mod http;
pub mod middleware;
pub mod obs;
pub mod runtime;
pub mod token;
#[cfg(all(any(test, feature = "test"), feature = "reqwest"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for integration tests; enabled via `cfg(test)` or the
	//! `test` crate feature.

	pub use crate::_prelude::*;

	// self
	use crate::{
		client::{ClientOptions, ManagementClient},
		http::ReqwestTransport,
	};

	/// Builds a reqwest transport that accepts the self-signed certificates produced by
	/// `httpmock` during tests.
	pub fn test_reqwest_transport() -> ReqwestTransport {
		let client = ReqwestClient::builder()
			.danger_accept_invalid_certs(true)
			.danger_accept_invalid_hostnames(true)
			.build()
			.expect("Failed to build insecure Reqwest client for tests.");

		ReqwestTransport::with_client(client)
	}

	/// Constructs a [`ManagementClient`] pointed at a mock tenant, backed by the
	/// insecure reqwest transport used across integration tests.
	pub fn build_test_client(domain: &str, client_id: &str, client_secret: &str) -> ManagementClient {
		let options = ClientOptions::new(domain)
			.with_client_credentials(client_id, client_secret)
			.with_transport(Arc::new(test_reqwest_transport()));

		ManagementClient::new(options).expect("Failed to build test management client.")
	}
}

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::RwLock;
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

#[cfg(feature = "reqwest")] pub use reqwest;
pub use time;
pub use url;
#[cfg(test)] use httpmock as _;
#[cfg(test)] use mgmt_client_core as _;
