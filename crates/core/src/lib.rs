#![forbid(unsafe_code)]

pub mod grading;
pub mod key;
pub mod model;
pub mod time;

pub use key::{StorageKey, derive_key};
pub use time::Clock;
