//! Filesystem path helpers

use std::path::PathBuf;

/// Expand `~` and make relative paths absolute against the working directory
///
/// Absolute paths pass through unchanged.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    let home_relative = match path {
        "~" => dirs::home_dir(),
        _ => path
            .strip_prefix("~/")
            .and_then(|rest| dirs::home_dir().map(|home| home.join(rest))),
    };
    let expanded = home_relative.unwrap_or_else(|| PathBuf::from(path));

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}
