//! Reactive synchronization layer for an eventually consistent, append-only backend.
//!
//! Values are exposed as [`Readable`]s: subscribable [`AsyncValue`] streams that start fetching
//! with their first subscriber and stop with their last one.

mod alerts;
mod async_value;
mod cache;
mod clock;
mod combinators;
mod config;
mod error;
mod hash;
mod lifecycle;
mod links;
mod polling;
mod readable;
mod remote;
mod status;
mod store;
mod subscription;
mod types;

pub use alerts::*;
pub use async_value::*;
pub use cache::*;
pub use clock::*;
pub use combinators::*;
pub use config::*;
pub use error::*;
pub use hash::*;
pub use lifecycle::*;
pub use links::*;
pub use polling::*;
pub use readable::*;
pub use remote::*;
pub use status::*;
pub use store::*;
pub use subscription::*;
pub use types::*;
