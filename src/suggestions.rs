//! # Error Suggestions
//!
//! Helpers that turn failures into errors with hints. Following CLI
//! recommendations, errors should tell users what went wrong AND how to fix
//! it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use devsdk::suggestions;
//!
//! // Instead of:
//! anyhow::bail!("{} is not available", module);
//!
//! // Use:
//! return Err(suggestions::unknown_module(module, &config.modules));
//! ```

use std::path::Path;

use crate::error::Error;

/// Generate an error for a module that is not in the configured list.
///
/// Suggests a close match from `available`, if there is one.
pub fn unknown_module(module: &str, available: &[String]) -> anyhow::Error {
    let candidates: Vec<&str> = available.iter().map(String::as_str).collect();
    let did_you_mean = find_similar(module, &candidates)
        .map(|s| format!("\nhint: Did you mean '{s}'?"))
        .unwrap_or_default();

    let not_allowed = Error::NotAllowed {
        module: module.to_string(),
    };

    anyhow::anyhow!(
        "{not_allowed}{did_you_mean}\n\n\
         Available modules are: {modules}\n\
         hint: Add it to the 'modules' key in the [Common] section of your config file",
        modules = available.join(", ")
    )
}

/// Generate an error for a missing upstream SDK manifest.
pub fn source_manifest_missing(path: &Path) -> anyhow::Error {
    anyhow::anyhow!(
        "SDK manifest not found: {path}\n\n\
         hint: Run 'devsdk setup' to clone the upstream SDK repository\n\
         hint: Check the 'sdk_upstream' and 'sdk_manifest_json' config keys",
        path = path.display()
    )
}

/// Generate an error for a configuration file that could not be loaded.
pub fn config_invalid(path: &Path, error: &dyn std::fmt::Display) -> anyhow::Error {
    anyhow::anyhow!(
        "Failed to load config from {path}\n\
         error: {error}\n\n\
         hint: Use --config or DEVSDK_CONFIG to point at a different file",
        path = path.display()
    )
}

/// Generate the error for an `update` run where some checkouts failed.
pub fn update_failed(failed: &[String]) -> anyhow::Error {
    anyhow::anyhow!(
        "Some repositories failed to update.\n\
         failed: {failed}\n\n\
         hint: Check your network connection and run 'devsdk update' again",
        failed = failed.join(", ")
    )
}

/// Find a similar string from a list of candidates using edit distance.
///
/// Returns Some(candidate) if a close match is found (edit distance <= 2).
fn find_similar<'a>(input: &str, candidates: &[&'a str]) -> Option<&'a str> {
    candidates
        .iter()
        .filter_map(|&candidate| {
            let distance = edit_distance(input, candidate);
            if distance <= 2 && distance < input.len() {
                Some((candidate, distance))
            } else {
                None
            }
        })
        .min_by_key(|(_, distance)| *distance)
        .map(|(candidate, _)| candidate)
}

/// Calculate the Levenshtein edit distance between two strings.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let a_len = a_chars.len();
    let b_len = b_chars.len();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    // Two rolling rows instead of the full matrix
    let mut previous: Vec<usize> = (0..=b_len).collect();
    let mut current = vec![0usize; b_len + 1];

    for i in 1..=a_len {
        current[0] = i;
        for j in 1..=b_len {
            let cost = usize::from(a_chars[i - 1] != b_chars[j - 1]);
            current[j] = (previous[j] + 1)
                .min(current[j - 1] + 1)
                .min(previous[j - 1] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_len]
}
