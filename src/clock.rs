//! Injectable time sources used for token expiry comparisons.
//!
//! The token provider never reads the wall clock directly; it consults a
//! [`Clock`] so expiry math stays deterministic under test. Production code
//! uses [`SystemClock`]; tests pin or advance a [`ManualClock`].

// self
use crate::_prelude::*;

/// Time source consulted for every expiry comparison.
pub trait Clock
where
	Self: Send + Sync,
{
	/// Returns the current UTC instant.
	fn now(&self) -> OffsetDateTime;
}

/// Wall-clock backed [`Clock`] used outside of tests.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;
impl Clock for SystemClock {
	fn now(&self) -> OffsetDateTime {
		OffsetDateTime::now_utc()
	}
}

/// Manually driven [`Clock`] whose instant only moves when told to.
///
/// Cloning shares the underlying instant, so a clone handed to a provider can
/// be advanced from the test body.
#[derive(Clone, Debug)]
pub struct ManualClock(Arc<RwLock<OffsetDateTime>>);
impl ManualClock {
	/// Creates a clock pinned to the provided instant.
	pub fn pinned(instant: OffsetDateTime) -> Self {
		Self(Arc::new(RwLock::new(instant)))
	}

	/// Creates a clock pinned to the current UTC instant.
	pub fn pinned_now() -> Self {
		Self::pinned(OffsetDateTime::now_utc())
	}

	/// Replaces the current instant.
	pub fn set(&self, instant: OffsetDateTime) {
		*self.0.write() = instant;
	}

	/// Moves the clock forward by the provided duration.
	pub fn advance(&self, delta: Duration) {
		let mut guard = self.0.write();

		*guard += delta;
	}
}
impl Clock for ManualClock {
	fn now(&self) -> OffsetDateTime {
		*self.0.read()
	}
}
