//! Timestamp-paced replay of syslog lines

mod engine;
mod timestamp;

pub use engine::{ReplayOptions, Replayer};
pub use timestamp::{StampedLine, TimestampFormat, TimestampMatcher, format_list};
