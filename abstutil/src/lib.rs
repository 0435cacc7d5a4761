//! Small utilities shared by every crate in the workspace: logging setup, a hierarchical stage
//! timer, and a couple of small helpers.

#[macro_use]
extern crate log;

mod collections;
pub mod logger;
mod time;
mod utils;

pub use crate::collections::Counter;
pub use crate::time::Timer;
pub use crate::utils::prettyprint_usize;
