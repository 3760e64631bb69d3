//! # Configuration
//!
//! Optional TOML file layered under the command line.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [storage]
//! database = "/var/lib/certis/certis.redb"
//!
//! [grading.certification]
//! type = "weighted"
//! components = [
//!     { name = "theory", weight = 40 },
//!     { name = "practice", weight = "60.00" },
//! ]
//!
//! [grading.internship]
//! type = "average"
//! min_components = 3
//! max_components = 7
//! ```
//!
//! Weights are percentages, given as integers or decimal strings.

use crate::AppError;
use certis_core::grading::WeightedComponent;
use certis_core::{AssessmentScheme, GradingConfig, Weight};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_DATABASE: &str = "certis.redb";

// =============================================================================
// FILE LAYOUT
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub server: ServerSection,
    pub storage: StorageSection,
    pub grading: GradingSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerSection {
    pub host: Option<String>,
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageSection {
    pub database: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GradingSection {
    pub certification: Option<SchemeSection>,
    pub internship: Option<SchemeSection>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", deny_unknown_fields)]
pub enum SchemeSection {
    Weighted {
        components: Vec<ComponentSection>,
    },
    Average {
        min_components: usize,
        max_components: usize,
    },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ComponentSection {
    pub name: String,
    pub weight: Decimal,
}

/// A number written either bare or quoted.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Decimal {
    Integer(u64),
    Text(String),
}

impl Decimal {
    fn as_text(&self) -> String {
        match self {
            Decimal::Integer(n) => n.to_string(),
            Decimal::Text(s) => s.clone(),
        }
    }
}

impl SchemeSection {
    fn to_scheme(&self) -> Result<AssessmentScheme, AppError> {
        let scheme = match self {
            SchemeSection::Weighted { components } => AssessmentScheme::Weighted {
                components: components
                    .iter()
                    .map(|c| {
                        Ok(WeightedComponent {
                            name: c.name.trim().to_string(),
                            weight: Weight::parse_percent(&c.name, &c.weight.as_text())?,
                        })
                    })
                    .collect::<Result<_, AppError>>()?,
            },
            SchemeSection::Average {
                min_components,
                max_components,
            } => AssessmentScheme::Average {
                min_components: *min_components,
                max_components: *max_components,
            },
        };
        scheme.validate()?;
        Ok(scheme)
    }
}

impl FileConfig {
    /// Read and parse `path`.
    pub fn load(path: &Path) -> Result<Self, AppError> {
        let content = fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&content)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn parse(content: &str) -> Result<Self, AppError> {
        toml::from_str(content).map_err(|e| AppError::Config(e.to_string()))
    }

    /// Grading schemes, falling back to the built-in ones per kind.
    pub fn grading(&self) -> Result<GradingConfig, AppError> {
        let mut grading = GradingConfig::default();
        if let Some(section) = &self.grading.certification {
            grading.certification = section.to_scheme()?;
        }
        if let Some(section) = &self.grading.internship {
            grading.internship = section.to_scheme()?;
        }
        Ok(grading)
    }
}

// =============================================================================
// RESOLVED SETTINGS
// =============================================================================

/// Command line values that can override the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub config: Option<PathBuf>,
    pub database: Option<PathBuf>,
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Final settings: command line over file over defaults.
#[derive(Debug, Clone)]
pub struct Settings {
    pub database: PathBuf,
    pub host: String,
    pub port: u16,
    pub grading: GradingConfig,
}

impl Settings {
    pub fn resolve(overrides: Overrides) -> Result<Self, AppError> {
        let file = match &overrides.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        Self::merge(file, overrides)
    }

    pub fn merge(file: FileConfig, overrides: Overrides) -> Result<Self, AppError> {
        let grading = file.grading()?;
        Ok(Self {
            database: overrides
                .database
                .or(file.storage.database)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATABASE)),
            host: overrides
                .host
                .or(file.server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: overrides.port.or(file.server.port).unwrap_or(DEFAULT_PORT),
            grading,
        })
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
[server]
host = "0.0.0.0"
port = 9000

[storage]
database = "/tmp/portal.redb"

[grading.certification]
type = "weighted"
components = [
    { name = "written", weight = "25.5" },
    { name = "oral", weight = 30 },
    { name = "lab", weight = "44.50" },
]

[grading.internship]
type = "average"
min_components = 2
max_components = 5
"#;

    #[test]
    fn empty_file_gives_defaults() {
        let settings = Settings::merge(FileConfig::parse("").unwrap(), Overrides::default()).unwrap();
        assert_eq!(settings.database, PathBuf::from(DEFAULT_DATABASE));
        assert_eq!(settings.bind_address(), "127.0.0.1:8080");
        assert_eq!(settings.grading, GradingConfig::default());
    }

    #[test]
    fn parses_all_sections() {
        let settings = Settings::merge(FileConfig::parse(SAMPLE).unwrap(), Overrides::default()).unwrap();
        assert_eq!(settings.bind_address(), "0.0.0.0:9000");
        assert_eq!(settings.database, PathBuf::from("/tmp/portal.redb"));

        let AssessmentScheme::Weighted { components } = &settings.grading.certification else {
            panic!("expected weighted scheme");
        };
        let bp: Vec<u32> = components.iter().map(|c| c.weight.basis_points()).collect();
        assert_eq!(bp, vec![2_550, 3_000, 4_450]);
        assert_eq!(
            settings.grading.internship,
            AssessmentScheme::Average {
                min_components: 2,
                max_components: 5
            }
        );
    }

    #[test]
    fn command_line_wins() {
        let overrides = Overrides {
            database: Some(PathBuf::from("cli.redb")),
            port: Some(7000),
            ..Overrides::default()
        };
        let settings = Settings::merge(FileConfig::parse(SAMPLE).unwrap(), overrides).unwrap();
        assert_eq!(settings.database, PathBuf::from("cli.redb"));
        assert_eq!(settings.bind_address(), "0.0.0.0:7000");
    }

    #[test]
    fn weights_must_sum_to_one_hundred() {
        let file = FileConfig::parse(
            r#"
[grading.certification]
type = "weighted"
components = [{ name = "theory", weight = 40 }, { name = "practice", weight = 50 }]
"#,
        )
        .unwrap();
        assert!(matches!(
            file.grading(),
            Err(AppError::Core(certis_core::CertisError::ValidationFailed { .. }))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            FileConfig::parse("[server]\nhots = \"x\"\n"),
            Err(AppError::Config(_))
        ));
    }

    #[test]
    fn missing_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = FileConfig::load(&dir.path().join("absent.toml")).unwrap_err();
        assert!(err.to_string().contains("absent.toml"));
    }
}
