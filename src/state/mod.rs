//! State module for tracking indexing progress
//!
//! # Components
//!
//! - `SiteStatus`: lifecycle of an indexed site (indexing, indexed, failed)
//! - `RunState`: the global idle/running state machine guarding crawl starts
//! - `CancellationFlag`: the shared stop signal checked by every crawl task

mod run_state;
mod site_status;

pub use run_state::{CancellationFlag, RunState};
pub use site_status::{SiteStatus, STOPPED_BY_OPERATOR};
