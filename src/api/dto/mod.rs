//! Data Transfer Objects for REST request/response serialization.
//!
//! Domain types serialize directly; these cover query strings and request
//! envelopes that have no domain counterpart.

pub mod common_dto;
pub mod provider_dto;
pub mod status_dto;

pub use common_dto::*;
pub use provider_dto::*;
pub use status_dto::*;
