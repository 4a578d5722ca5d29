//! Per-client fixed-window throttling.

mod decision;
mod janitor;
mod key;
mod limiter;
mod record;

pub use decision::{Decision, HEADER_LIMIT, HEADER_REMAINING, HEADER_RESET};
pub use janitor::Janitor;
pub use key::{ClientKey, FALLBACK_KEY};
pub use limiter::Throttle;
pub use record::ThrottleRecord;
