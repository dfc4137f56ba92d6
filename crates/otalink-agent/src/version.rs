// SPDX-FileCopyrightText: © 2026 otalink contributors
// SPDX-License-Identifier: CC-BY-NC-ND-4.0

//! Version parsing helpers

use crate::error::{AgentError, Result};

/// Parse semver-like version strings (e.g., "1.4.2", "v1.4.2")
pub fn parse_version(s: &str) -> Result<(u32, u32, u32)> {
    let s = s.trim_start_matches('v').trim_start_matches('V');
    let parts: Vec<&str> = s.split('.').collect();

    if parts.len() != 3 {
        return Err(AgentError::VersionParse(format!(
            "Invalid version format: {s}, expected X.Y.Z"
        )));
    }

    let component = |name: &str, part: &str| {
        part.parse::<u32>()
            .map_err(|_| AgentError::VersionParse(format!("Invalid {name} version: {part}")))
    };

    Ok((
        component("major", parts[0])?,
        component("minor", parts[1])?,
        component("patch", parts[2])?,
    ))
}

/// Find an `X.Y.Z` version in the file name of a firmware URL.
///
/// `http://h/fw/earbuds_v1.4.2.bin?sig=abc` yields `"1.4.2"`. The first
/// dotted run of digits that parses as a three-part version wins.
#[must_use]
pub fn version_in_url(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);

    file_name
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .map(|run| run.trim_matches('.'))
        .filter(|run| !run.is_empty())
        .find_map(|run| parse_version(run).ok())
        .map(|(major, minor, patch)| format!("{major}.{minor}.{patch}"))
}
