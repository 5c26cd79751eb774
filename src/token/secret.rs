//! Redacted wrappers for bearer-token material.

// self
use crate::_prelude::*;

/// Bearer-token material (client secrets and issued access tokens) that never
/// renders its contents through `Debug` or `Display`.
///
/// The raw value leaves the wrapper in exactly two places: the form-encoded
/// exchange body built by [`Credentials`](crate::token::Credentials) and the
/// `authorization` header rendered by [`bearer`](Self::bearer).
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps raw token material.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw material; never log the returned string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Renders the `authorization` header value for this token.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn formatters_redact_token_material() {
		let secret = TokenSecret::new("m2m-token");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn bearer_rendering_carries_the_raw_token() {
		let secret = TokenSecret::new("m2m-token");

		assert_eq!(secret.bearer(), "Bearer m2m-token");
		assert_eq!(secret.expose(), "m2m-token");
	}
}
