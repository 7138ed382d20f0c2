//! Path helpers for config-supplied locations

use std::path::PathBuf;

/// Resolve a user-supplied path to an absolute one.
///
/// `~` and `~/...` expand to the home directory; relative paths are joined
/// onto the current working directory; absolute paths pass through.
pub fn expand_path(path: &str) -> PathBuf {
    let path = path.trim();
    if path.is_empty() {
        return std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    }

    let expanded = match path.strip_prefix('~') {
        Some("") => dirs::home_dir().unwrap_or_else(|| PathBuf::from(path)),
        Some(rest) if rest.starts_with('/') || rest.starts_with('\\') => dirs::home_dir()
            .map(|home| home.join(&rest[1..]))
            .unwrap_or_else(|| PathBuf::from(path)),
        _ => PathBuf::from(path),
    };

    if expanded.is_relative() {
        std::env::current_dir()
            .map(|cwd| cwd.join(&expanded))
            .unwrap_or(expanded)
    } else {
        expanded
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_path_unchanged() {
        assert_eq!(expand_path("/var/lib/trellis"), PathBuf::from("/var/lib/trellis"));
    }

    #[test]
    fn test_relative_path_joined_to_cwd() {
        let result = expand_path("data/files");
        let cwd = std::env::current_dir().unwrap();
        assert_eq!(result, cwd.join("data/files"));
    }

    #[test]
    fn test_empty_path_is_cwd() {
        assert_eq!(expand_path("  "), std::env::current_dir().unwrap());
    }

    #[test]
    fn test_tilde_expands_to_home() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_path("~"), home);
            assert_eq!(expand_path("~/.trellis/trellis.db"), home.join(".trellis/trellis.db"));
        }
    }

    #[test]
    fn test_tilde_user_form_is_not_expanded() {
        let result = expand_path("~other/file");
        assert!(result.ends_with("~other/file"));
    }
}
