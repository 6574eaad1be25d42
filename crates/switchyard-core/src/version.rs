// SPDX-FileCopyrightText: 2026 Switchyard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SDK version constants and compatibility checks.

use semver::Version;

/// Version of this core, which is also the SDK version modules build against.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Parses a loosely formatted version string.
///
/// Accepts `git describe` output (`1.6.1-5-gabc123` becomes `1.6.1`) and
/// short forms (`1.6` becomes `1.6.0`).
pub fn parse_lenient(v: &str) -> Option<Version> {
    let core = v.trim().trim_start_matches('v');
    let core = core.split(['-', '+']).next()?;
    let mut parts = core.split('.');
    let major = parts.next()?.parse::<u64>().ok()?;
    let minor = parts.next().map_or(Ok(0), |p| p.parse::<u64>()).ok()?;
    let patch = parts.next().map_or(Ok(0), |p| p.parse::<u64>()).ok()?;
    if parts.next().is_some() {
        return None;
    }
    Some(Version::new(major, minor, patch))
}

/// Returns true if `v` is at least `sdk`. Unparseable input is never compatible.
pub fn version_at_least(v: &str, sdk: &str) -> bool {
    match (parse_lenient(v), parse_lenient(sdk)) {
        (Some(v), Some(sdk)) => v >= sdk,
        _ => false,
    }
}

/// Returns true if a module requiring `min_sdk` can run against `sdk`.
pub fn sdk_satisfies(sdk: &str, min_sdk: &str) -> bool {
    version_at_least(sdk, min_sdk)
}
