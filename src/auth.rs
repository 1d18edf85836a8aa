//! Tokens, token providers, and the single-flight caching wrapper.

pub mod cached;
pub mod credentials;
pub mod provider;
pub mod secret;
pub mod token;

pub use cached::*;
pub use credentials::*;
pub use provider::*;
pub use secret::*;
pub use token::*;
