//! Retry policies, jittered exponential backoff, and `Retry-After` parsing.

pub mod backoff;
pub mod policy;
pub mod retry_after;

pub use backoff::*;
pub use policy::*;
pub use retry_after::*;
