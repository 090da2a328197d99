use std::path::PathBuf;

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref ENV_VAR_PATTERN: Regex =
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)").unwrap();
}

/// Expand Unix-style environment variables (`$VAR` and `${VAR}`).
///
/// `${VAR}` expands to an empty string when unset; a bare `$VAR` that is unset
/// is left untouched, so literal dollar signs in passwords survive. Values are
/// substituted once and never re-expanded.
pub fn expand_env_vars(input: &str) -> String {
    if !input.contains('$') {
        return input.to_string();
    }

    ENV_VAR_PATTERN
        .replace_all(input, |caps: &Captures| {
            if let Some(name) = caps.get(1) {
                std::env::var(name.as_str()).unwrap_or_default()
            } else {
                let name = &caps[2];
                std::env::var(name).unwrap_or_else(|_| caps[0].to_string())
            }
        })
        .into_owned()
}

/// Expand variables in an optional string in place
pub fn expand_optional(value: &mut Option<String>) {
    if let Some(inner) = value.as_mut() {
        *inner = expand_env_vars(inner);
    }
}

/// Expand variables in an optional path in place
pub fn expand_optional_path(value: &mut Option<PathBuf>) {
    if let Some(path) = value.as_mut() {
        let expanded = expand_env_vars(&path.to_string_lossy());
        *path = PathBuf::from(expanded);
    }
}
