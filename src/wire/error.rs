//! Re-exports the wire error types from [`crate::error`] under the `wire`
//! namespace, since they describe wire shapes even though the mapping
//! logic that produces them lives in the crate-wide error module.

pub use crate::error::{ErrorEnvelope, ErrorProto, ErrorResponse};
