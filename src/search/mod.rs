//! Search Core
//!
//! Data model, result channel, backend contract and registry shared by
//! every backend in the crate.

mod backend;
mod config;
mod error;
mod files;
mod index;
mod record;
mod result;
mod stat;

pub mod registry;

pub use backend::{Backend, Options, OptionsExt};
pub use config::SearchConfig;
pub use error::{SearchError, SearchResult};
pub use files::{DirInfo, NodeInfo};
pub use index::Index;
pub use record::Record;
pub use result::{
    channel, Event, ResultHandle, ResultReceiver, ResultSender, ERRORS_CAPACITY, RECORDS_CAPACITY,
};
pub use stat::Stat;
