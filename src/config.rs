use crate::TraceError;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Default)]
pub struct ReviewConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub taxonomy: TaxonomyConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".into()
}

/// Failure-mode labels offered as suggestions in the annotation form.
/// Reviewers may still type labels outside this list.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct TaxonomyConfig {
    #[serde(default)]
    pub labels: Vec<String>,
}

/// Load config from TRACEREVIEW_CONFIG env var, ~/.tracereview/config.toml, or defaults.
pub fn load_config() -> Result<ReviewConfig, TraceError> {
    let path = config_path();
    match path {
        Some(p) if p.exists() => {
            let content = std::fs::read_to_string(&p)?;
            let config: ReviewConfig = toml::from_str(&content)
                .map_err(|e| TraceError::Config(format!("{}: {e}", p.display())))?;
            validate_config(&config)?;
            Ok(config)
        }
        _ => Ok(ReviewConfig::default()),
    }
}

fn config_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("TRACEREVIEW_CONFIG") {
        return Some(PathBuf::from(p));
    }
    let home = std::env::var("HOME").ok()?;
    Some(Path::new(&home).join(".tracereview").join("config.toml"))
}

fn validate_config(config: &ReviewConfig) -> Result<(), TraceError> {
    parse_bind(&config.server.bind)?;
    for (i, label) in config.taxonomy.labels.iter().enumerate() {
        if label.trim().is_empty() {
            return Err(TraceError::Config(format!("taxonomy.labels[{i}] is empty")));
        }
        if label.contains(',') {
            return Err(TraceError::Config(format!(
                "taxonomy.labels[{i}] contains a comma: {label}"
            )));
        }
        if label.trim() != label {
            return Err(TraceError::Config(format!(
                "taxonomy.labels[{i}] has surrounding whitespace: {label:?}"
            )));
        }
    }
    Ok(())
}

pub fn parse_bind(bind: &str) -> Result<SocketAddr, TraceError> {
    bind.parse()
        .map_err(|e| TraceError::Config(format!("invalid bind address {bind:?}: {e}")))
}

/// CLI flag wins over config.
pub fn resolve_bind(config: &ReviewConfig, cli_bind: Option<&str>) -> Result<SocketAddr, TraceError> {
    parse_bind(cli_bind.unwrap_or(&config.server.bind))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_when_no_file() {
        let config = ReviewConfig::default();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
        assert!(config.taxonomy.labels.is_empty());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn parse_full_config() {
        let toml_str = r#"
[server]
bind = "0.0.0.0:9000"

[taxonomy]
labels = ["missing_prep_detail", "serving_size", "ignores_allergy"]
"#;
        let config: ReviewConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.bind, "0.0.0.0:9000");
        assert_eq!(config.taxonomy.labels.len(), 3);
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: ReviewConfig = toml::from_str(
            r#"
[taxonomy]
labels = ["serving_size"]
"#,
        )
        .unwrap();
        assert_eq!(config.server.bind, "127.0.0.1:8000");
    }

    #[test]
    fn label_with_comma_rejected() {
        let config = ReviewConfig {
            taxonomy: TaxonomyConfig {
                labels: vec!["a,b".into()],
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn blank_or_padded_label_rejected() {
        for bad in ["", "  ", " serving_size"] {
            let config = ReviewConfig {
                taxonomy: TaxonomyConfig {
                    labels: vec![bad.into()],
                },
                ..Default::default()
            };
            assert!(validate_config(&config).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn invalid_bind_rejected() {
        let config = ReviewConfig {
            server: ServerConfig {
                bind: "localhost".into(),
            },
            ..Default::default()
        };
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn cli_bind_overrides_config() {
        let config = ReviewConfig::default();
        let addr = resolve_bind(&config, Some("127.0.0.1:9999")).unwrap();
        assert_eq!(addr.port(), 9999);
        let addr = resolve_bind(&config, None).unwrap();
        assert_eq!(addr.port(), 8000);
    }
}
