//! Collection of raw records from the external game-data API.
//!
//! [`api::SourceApi`] wraps the HTTP endpoints; [`query`] translates
//! declared filters into the source's bracket-operator query syntax;
//! [`retry`] bounds transient-failure retries; [`collect::Collector`]
//! drives single-record and paginated multi-record retrieval.

pub mod api;
pub mod collect;
pub mod query;
pub mod retry;

pub use api::{FetchError, SourceApi};
pub use collect::{CollectError, CollectOptions, CollectResult, Collector};
pub use query::{Filter, FilterSet};
