//! Package version parsing and bumping.

pub mod bump;

pub use bump::{
    DEFAULT_ROLLOVER_THRESHOLD, baseline_version, next_version, parse_package_version,
    resolve_next_version,
};
