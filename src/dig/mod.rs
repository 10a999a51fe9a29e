//! Discovery of property values to scan.
//!
//! - [`TreeDigger`] walks a subtree on the caller's thread.
//! - [`ChangeDigger`] reacts to commit notifications on a worker pool.
//!
//! Both submit one [`ScanJob`](crate::core::ScanJob) per qualifying value.

mod change;
mod config;
mod emit;
mod request;
mod tree;

pub use change::ChangeDigger;
pub use config::{ChangeDiggerConfig, TreeDiggerConfig, DEFAULT_PROPERTY_PATH_PATTERN};
pub use emit::DigSummary;
pub use request::{DigRequest, RequestParams};
pub use tree::TreeDigger;
