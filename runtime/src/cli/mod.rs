//! CLI subcommand implementations for the Dashtap binary.

pub mod doctor;
pub mod extract_cmd;
pub mod output;
pub mod serve_cmd;

use anyhow::{Context, Result};
use dashtap::ExtractionConfig;
use std::path::{Path, PathBuf};

/// Resolve the run configuration.
///
/// The file comes from `--config`, then `DASHTAP_CONFIG`, else the built-in
/// default. The dashboard URL can be overridden by `DASHTAP_URL` and, above
/// that, by `--url`.
pub fn load_config(config: Option<&Path>, url: Option<&str>) -> Result<ExtractionConfig> {
    let env_path = std::env::var("DASHTAP_CONFIG").ok().map(PathBuf::from);
    let env_url = std::env::var("DASHTAP_URL").ok();
    resolve_config(
        config.map(Path::to_path_buf).or(env_path),
        url.map(str::to_string).or(env_url),
    )
}

fn resolve_config(path: Option<PathBuf>, url: Option<String>) -> Result<ExtractionConfig> {
    let mut config = match &path {
        Some(path) => ExtractionConfig::from_path(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ExtractionConfig::default(),
    };
    if let Some(url) = url.filter(|u| !u.trim().is_empty()) {
        config.dashboard_url = url;
    }
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults_without_file_or_override() {
        let config = resolve_config(None, None).unwrap();
        assert_eq!(config, ExtractionConfig::default());
    }

    #[test]
    fn test_url_override_beats_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"dashboard_url": "https://file.test/"}}"#).unwrap();

        let from_file = resolve_config(Some(file.path().to_path_buf()), None).unwrap();
        assert_eq!(from_file.dashboard_url, "https://file.test/");

        let overridden = resolve_config(
            Some(file.path().to_path_buf()),
            Some("https://flag.test/".into()),
        )
        .unwrap();
        assert_eq!(overridden.dashboard_url, "https://flag.test/");
    }

    #[test]
    fn test_blank_url_is_ignored() {
        let config = resolve_config(None, Some("  ".into())).unwrap();
        assert_eq!(config.dashboard_url, dashtap::config::DEFAULT_DASHBOARD_URL);
    }

    #[test]
    fn test_bad_file_reports_path() {
        let err = resolve_config(Some(PathBuf::from("/nonexistent/dashtap.json")), None)
            .unwrap_err();
        assert!(format!("{err:#}").contains("/nonexistent/dashtap.json"));
    }
}
