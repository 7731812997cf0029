//! DNS MX resolution.
//!
//! [`DnsMxResolver`] performs one bounded query per call (no retries) and
//! yields the exchange with the lowest preference. The [`MxResolver`] trait is
//! the seam the verifier depends on.

mod error;
mod resolver;
mod types;

pub use error::MxError;
pub use resolver::{DEFAULT_DNS_TIMEOUT, DnsMxResolver, MxResolver, system_resolver};
pub use types::MxRecord;
