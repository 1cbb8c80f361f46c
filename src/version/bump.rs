//! Package version parsing and odometer-style bumping.

use semver::Version;

use crate::error::VersionError;

/// Default exclusive ceiling for the minor and patch components.
pub const DEFAULT_ROLLOVER_THRESHOLD: u64 = 10;

/// Version written when the project has no `PackageVersion` yet.
pub fn baseline_version() -> Version {
    Version::new(1, 0, 0)
}

/// Parse a strict `MAJOR.MINOR.PATCH` package version.
///
/// Unlike `Version::parse`, pre-release and build suffixes are rejected and
/// every component must be plain ASCII digits.
pub fn parse_package_version(raw: &str) -> Result<Version, VersionError> {
    let trimmed = raw.trim();
    let parts: Vec<&str> = trimmed.split('.').collect();

    let &[major, minor, patch] = parts.as_slice() else {
        return Err(VersionError::Parse(raw.to_string()));
    };

    let component = |part: &str| -> Result<u64, VersionError> {
        if part.is_empty() || !part.chars().all(|c| c.is_ascii_digit()) {
            return Err(VersionError::Parse(raw.to_string()));
        }
        part.parse::<u64>()
            .map_err(|_| VersionError::Parse(raw.to_string()))
    };

    Ok(Version::new(
        component(major)?,
        component(minor)?,
        component(patch)?,
    ))
}

/// Compute the version after `current`.
///
/// Patch and minor behave like odometer wheels with `rollover_threshold`
/// positions; major is unbounded:
/// - `patch + 1 < threshold` bumps patch
/// - else `minor + 1 < threshold` bumps minor and resets patch
/// - else bumps major and resets both
pub fn next_version(current: &Version, rollover_threshold: u64) -> Version {
    if current.patch.saturating_add(1) < rollover_threshold {
        Version::new(current.major, current.minor, current.patch + 1)
    } else if current.minor.saturating_add(1) < rollover_threshold {
        Version::new(current.major, current.minor + 1, 0)
    } else {
        Version::new(current.major.saturating_add(1), 0, 0)
    }
}

/// Resolve the version to write given the project's current value.
///
/// A missing version yields the baseline rather than a bump.
pub fn resolve_next_version(
    current: Option<&str>,
    rollover_threshold: u64,
) -> Result<Version, VersionError> {
    match current {
        None => Ok(baseline_version()),
        Some(raw) => {
            let parsed = parse_package_version(raw)?;
            Ok(next_version(&parsed, rollover_threshold))
        }
    }
}
