//! Machine-to-machine token acquisition: credentials, secrets, and the cached provider.

pub mod provider;
pub mod secret;

pub use provider::*;
pub use secret::*;
