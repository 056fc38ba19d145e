//! Config file discovery and loading.
//!
//! Discovery walks from a starting directory up to the filesystem root and
//! takes the first existing candidate, preferring earlier names within a
//! directory.

use std::path::{Path, PathBuf};

use crate::{Config, ConfigError, merge_values};

/// Candidate file names, in preference order within one directory.
pub const CONFIG_FILE_NAMES: &[&str] = &[
    "clawsec.yaml",
    "clawsec.yml",
    ".clawsec.yaml",
    ".clawsec.yml",
];

/// Walk from `start` toward the filesystem root, returning the first
/// existing config file.
#[must_use]
pub fn discover_config_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in CONFIG_FILE_NAMES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        dir = current.parent();
    }
    None
}

/// Parse YAML text into a validated [`Config`].
///
/// The file is a layer over the built-in defaults: mappings merge
/// deeply, arrays replace (see [`merge_values`]). Empty (or
/// whitespace-only) text yields the defaults. Unknown shapes and enum
/// mismatches are parse errors, not silently ignored.
pub fn parse_config(text: &str) -> Result<Config, ConfigError> {
    if text.trim().is_empty() {
        return Ok(Config::default());
    }
    let base = serde_yaml::to_value(Config::default())?;
    let overlay: serde_yaml::Value = serde_yaml::from_str(text)?;
    let config: Config = serde_yaml::from_value(merge_values(base, overlay))?;
    config.validate()?;
    Ok(config)
}

/// Discover and load configuration starting at `start`.
///
/// A missing file yields defaults; an unreadable or malformed file is an
/// error so a broken config never silently degrades to defaults.
pub fn load_config(start: &Path) -> Result<Config, ConfigError> {
    let Some(path) = discover_config_file(start) else {
        tracing::debug!(start = %start.display(), "no config file found, using defaults");
        return Ok(Config::default());
    };

    let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Unreadable {
        path: path.display().to_string(),
        source,
    })?;

    tracing::info!(path = %path.display(), "loaded config");
    parse_config(&text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn empty_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("clawsec.yaml"), "\n  \n").unwrap();
        let config = load_config(dir.path()).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn walks_up_to_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("clawsec.yaml"),
            "global:\n  logLevel: debug\n",
        )
        .unwrap();
        let nested = dir.path().join("a/b/c");
        fs::create_dir_all(&nested).unwrap();

        let found = discover_config_file(&nested).unwrap();
        assert_eq!(found, dir.path().join("clawsec.yaml"));
    }

    #[test]
    fn prefers_earlier_names_in_same_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".clawsec.yml"), "").unwrap();
        fs::write(dir.path().join("clawsec.yml"), "").unwrap();

        let found = discover_config_file(dir.path()).unwrap();
        assert_eq!(found, dir.path().join("clawsec.yml"));
    }

    #[test]
    fn nearest_directory_wins_over_ancestors() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("clawsec.yaml"), "").unwrap();
        let nested = dir.path().join("project");
        fs::create_dir_all(&nested).unwrap();
        fs::write(nested.join(".clawsec.yaml"), "").unwrap();

        let found = discover_config_file(&nested).unwrap();
        assert_eq!(found, nested.join(".clawsec.yaml"));
    }

    #[test]
    fn parses_partial_config_over_defaults() {
        let config = parse_config(
            "rules:\n  purchase:\n    spendLimits:\n      perTransaction: 50\n      daily: 200\n",
        )
        .unwrap();
        let limits = config.rules.purchase.spend_limits.unwrap();
        assert!((limits.per_transaction - 50.0).abs() < f64::EPSILON);
        assert!((limits.daily - 200.0).abs() < f64::EPSILON);
        // Untouched sections keep their defaults.
        assert_eq!(config.approval.native.timeout, 300);
    }

    #[test]
    fn file_layer_merges_deeply_without_losing_siblings() {
        let config = parse_config(
            "rules:\n  website:\n    mode: allowlist\n    allowlist: [example.com]\n",
        )
        .unwrap();
        assert_eq!(config.rules.website.mode, crate::DomainListMode::Allowlist);
        assert_eq!(config.rules.website.allowlist, vec!["example.com"]);
        // Sibling fields of the overlaid mapping keep their defaults.
        assert_eq!(config.rules.website.severity, clawsec_types::Severity::High);
        assert!(config.rules.destructive.enabled);
    }

    #[test]
    fn rejects_malformed_yaml() {
        assert!(parse_config("rules: [not: a map").is_err());
    }

    #[test]
    fn rejects_enum_mismatches() {
        assert!(parse_config("global:\n  logLevel: verbose\n").is_err());
        assert!(parse_config("rules:\n  website:\n    mode: denylist\n").is_err());
    }

    #[test]
    fn rejects_invalid_values_from_file() {
        let err = parse_config(
            "rules:\n  purchase:\n    spendLimits:\n      perTransaction: -5\n      daily: 100\n",
        );
        assert!(err.is_err());
    }
}
