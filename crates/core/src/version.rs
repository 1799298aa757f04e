//! Client version matching for version-qualified lists.
//!
//! A list may ship several source variants pinned to different client release
//! branches. Resolution follows a specificity cascade: legacy floor, exact
//! tag, truncated-prefix tag, major-only tag, then the unqualified base name.

use std::collections::BTreeSet;

/// Leading major release number of a version string, if it has one.
fn major_of(version: &str) -> Option<u32> {
    let digits: String = version.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// The served name for a version variant, e.g. `71.0-pub-digest256`.
pub fn versioned_name(tag: &str, base_name: &str) -> String {
    format!("{tag}-{base_name}")
}

/// Resolve a client's app version against a list's supported version tags.
///
/// Returns `(served list name, matched tag)`. When nothing matches, the base
/// name is returned with no tag.
pub fn match_versioned_list(
    client_version: Option<&str>,
    tags: &BTreeSet<String>,
    base_name: &str,
    oldest_supported: Option<&str>,
) -> (String, Option<String>) {
    let client_version = match client_version {
        Some(v) if !v.is_empty() => v,
        _ => return (base_name.to_string(), None),
    };
    if tags.is_empty() {
        return (base_name.to_string(), None);
    }
    let client_major = match major_of(client_version) {
        Some(m) => m,
        None => return (base_name.to_string(), None),
    };

    // Legacy clients collapse onto the pinned floor branch.
    if let Some(floor) = oldest_supported {
        if let Some(floor_major) = major_of(floor) {
            if client_major <= floor_major {
                return (versioned_name(floor, base_name), Some(floor.to_string()));
            }
        }
    }

    if tags.contains(client_version) {
        return (
            versioned_name(client_version, base_name),
            Some(client_version.to_string()),
        );
    }

    // Prefix match tolerates pre-release and build suffixes, e.g. a client on
    // "71.0a1" takes the "71.0" branch. The byte after the tag must not be a
    // digit so "7.1" never claims a "7.10" client. Longest tag wins.
    let mut prefix_match: Option<&String> = None;
    for tag in tags {
        let suffix = match client_version.strip_prefix(tag.as_str()) {
            Some(s) => s,
            None => continue,
        };
        if suffix.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            continue;
        }
        if prefix_match.map_or(true, |best| tag.len() > best.len()) {
            prefix_match = Some(tag);
        }
    }
    if let Some(tag) = prefix_match {
        return (versioned_name(tag, base_name), Some(tag.clone()));
    }

    // Same major release: take the newest tag on that branch.
    if let Some(tag) = tags
        .iter()
        .filter(|t| major_of(t) == Some(client_major))
        .next_back()
    {
        return (versioned_name(tag, base_name), Some(tag.clone()));
    }

    (base_name.to_string(), None)
}
