//! Stateful senders that combinators wrap around their parent's sender.
//!
//! Each wrapper is created fresh inside one `run` call and dropped when it
//! returns. All of them tolerate concurrent `send` calls.

mod dedup;
mod limit;
mod merger;
mod observe;
mod select;

pub use dedup::{DedupSender, Deduper};
pub use limit::LimitSender;
pub use merger::Merger;
pub use observe::{CountingSender, StatsObservingSender};
pub use select::SelectSender;
