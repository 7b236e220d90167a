#![warn(clippy::unwrap_used)]

//! Per-browser key-value persistence for the ad layer: the store seam,
//! typed key builders, and the small records kept on top of it.

pub mod consent;
pub mod counter;
pub mod file;
pub mod keys;
pub mod local;
pub mod log;
pub mod sink;

pub use consent::ConsentStore;
pub use counter::{DailyCounter, DailyCounterStore};
pub use file::FileStore;
pub use local::LocalStore;
pub use log::CappedLog;
pub use sink::StorageSink;

use adplace_core::AdResult;

/// String-valued key-value storage, the shape of browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> AdResult<()>;
    fn remove(&self, key: &str) -> AdResult<()>;
    fn keys(&self) -> Vec<String>;
}
