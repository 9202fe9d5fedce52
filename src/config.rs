//! Layered configuration: a YAML file plus `DOORSTEP_`-prefixed environment
//! overrides. The column mapping is required in full so a misnamed form
//! question fails at load time rather than mid-pipeline.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::models::RosterMember;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub sheet: SheetConfig,
    pub data: DataConfig,
    #[serde(default)]
    pub charts: ChartConfig,
    #[serde(default)]
    pub email: EmailConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SheetConfig {
    /// Published-CSV export URL of the response sheet.
    #[serde(default)]
    pub csv_url: Option<String>,
    /// Local CSV export, used when no URL is configured.
    #[serde(default)]
    pub csv_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DataConfig {
    pub columns: ColumnMap,
    #[serde(default = "default_days_to_include")]
    pub days_to_include: i64,
}

fn default_days_to_include() -> i64 {
    30
}

/// Maps the six logical fields to the actual sheet header names. Form
/// questions double as headers, so none of these are predictable.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnMap {
    pub timestamp: String,
    pub name: String,
    pub doors_knocked: String,
    pub homeowners_talked: String,
    pub qualified_leads: String,
    pub appointments_set: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub output_dir: PathBuf,
    pub width: u32,
    pub height: u32,
    pub colors: ColorScheme,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output/charts"),
            width: 1200,
            height: 800,
            colors: ColorScheme::default(),
        }
    }
}

/// Hex colors for chart series. Unparseable values fall back to these
/// defaults at render time.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ColorScheme {
    pub primary: String,
    pub secondary: String,
    pub success: String,
    pub warning: String,
}

impl Default for ColorScheme {
    fn default() -> Self {
        Self {
            primary: "#2E86AB".to_string(),
            secondary: "#A23B72".to_string(),
            success: "#06A77D".to_string(),
            warning: "#F18F01".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EmailConfig {
    pub enabled: bool,
    pub smtp_server: String,
    pub smtp_port: u16,
    pub use_tls: bool,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: Option<String>,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            smtp_server: "smtp.gmail.com".to_string(),
            smtp_port: 587,
            use_tls: true,
            username: None,
            password: None,
            from_address: None,
        }
    }
}

impl EmailConfig {
    /// The from-address falls back to the SMTP username.
    pub fn sender(&self) -> Option<&str> {
        self.from_address.as_deref().or(self.username.as_deref())
    }
}

#[derive(Debug, Clone, Deserialize)]
struct Roster {
    team_members: Vec<RosterMember>,
}

pub fn load(path: &Path) -> anyhow::Result<AppConfig> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()))
        .add_source(config::Environment::with_prefix("DOORSTEP").separator("__"))
        .build()
        .with_context(|| format!("failed to read config file {}", path.display()))?;

    settings
        .try_deserialize()
        .context("failed to parse config file")
}

pub fn load_roster(path: &Path) -> anyhow::Result<Vec<RosterMember>> {
    let settings = config::Config::builder()
        .add_source(config::File::from(path.to_path_buf()))
        .build()
        .with_context(|| format!("failed to read team roster {}", path.display()))?;

    let roster: Roster = settings
        .try_deserialize()
        .context("failed to parse team roster")?;
    Ok(roster.team_members)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
sheet:
  csv_path: responses.csv
data:
  columns:
    timestamp: "Timestamp"
    name: "Your Name"
    doors_knocked: "Doors Knocked Today"
    homeowners_talked: "Homeowners Talked To"
    qualified_leads: "Qualified Leads"
    appointments_set: "Appointments Set"
email:
  enabled: true
  username: reports@example.com
"#;

    fn parse(yaml: &str) -> AppConfig {
        config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn sample_config_parses_with_defaults() {
        let cfg = parse(SAMPLE);
        assert_eq!(cfg.sheet.csv_path, Some(PathBuf::from("responses.csv")));
        assert_eq!(cfg.data.days_to_include, 30);
        assert_eq!(cfg.charts.width, 1200);
        assert_eq!(cfg.charts.output_dir, PathBuf::from("output/charts"));
        assert!(cfg.email.enabled);
        assert_eq!(cfg.email.smtp_port, 587);
    }

    #[test]
    fn missing_column_mapping_is_a_config_error() {
        let yaml = r#"
sheet:
  csv_path: responses.csv
data:
  columns:
    timestamp: "Timestamp"
    name: "Your Name"
"#;
        let result: Result<AppConfig, _> = config::Config::builder()
            .add_source(config::File::from_str(yaml, config::FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize();
        assert!(result.is_err());
    }

    #[test]
    fn sender_falls_back_to_username() {
        let cfg = parse(SAMPLE);
        assert_eq!(cfg.email.sender(), Some("reports@example.com"));

        let mut with_from = cfg.email.clone();
        with_from.from_address = Some("team-lead@example.com".to_string());
        assert_eq!(with_from.sender(), Some("team-lead@example.com"));

        assert_eq!(EmailConfig::default().sender(), None);
    }

    #[test]
    fn email_defaults_to_disabled() {
        let cfg = EmailConfig::default();
        assert!(!cfg.enabled);
        assert!(cfg.use_tls);
        assert_eq!(cfg.smtp_server, "smtp.gmail.com");
    }
}
