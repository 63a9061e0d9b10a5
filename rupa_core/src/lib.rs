pub mod admission;
pub mod callback_data;
pub mod config;
pub mod error;
pub mod files;
pub mod gateway;
pub mod hub;
pub mod inactivity;
pub mod lang;
pub mod merge;
pub mod reaper;
pub mod selection;
pub mod session;
pub mod timer;
pub mod transform;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{RupaError, RupaResult};
