//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tps_core::SplitConfig;

/// Application configuration: where the feed lives, where output goes, and
/// the full split configuration under `[split]`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// The timetable feed URL.
    pub ics_url: String,
    /// Directory the per-course .ics files are written into.
    pub output_dir: PathBuf,
    /// Skip writing files; report only.
    pub dry_run: bool,
    /// Print the compact summary block at the end of the report.
    pub pretty_summary: bool,
    /// The split pipeline configuration.
    pub split: SplitConfig,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("ics_url", &self.ics_url)
            .field("output_dir", &self.output_dir)
            .field("dry_run", &self.dry_run)
            .field("courses", &self.split.courses.len())
            .finish_non_exhaustive()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            ics_url: String::new(),
            output_dir: PathBuf::from("."),
            dry_run: false,
            pretty_summary: true,
            split: SplitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration, optionally from a specific file.
    ///
    /// Merge order: defaults, then the platform config file, then the given
    /// file, then `TPSPLIT_*` environment variables.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        figment = figment.merge(Env::prefixed("TPSPLIT_"));

        figment.extract()
    }
}

/// Returns the platform-specific config directory for tpsplit.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tpsplit"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_are_sensible() {
        let config = AppConfig::default();
        assert!(config.ics_url.is_empty());
        assert!(!config.dry_run);
        assert!(config.pretty_summary);
        assert_eq!(config.split.local_timezone, "Europe/Oslo");
        assert!(config.split.courses.is_empty());
    }

    #[test]
    fn loads_full_config_from_toml_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .expect("should create temp file");
        write!(
            file,
            r#"
ics_url = "https://tp.example.org/ical.php?sem=26v"
output_dir = "out"
dry_run = true

[split]
local_timezone = "Europe/Oslo"
default_type = "f"

[[split.courses]]
code = "TDT4100"
short = "00"
file = "00.ics"

[[split.type_rules.TDT4100]]
pattern = "Forelesning"
tag = "f"

[[split.event_filters]]
id = "drop-mon-f1"
course_code = "TDT4100"
weekday = 0
start_time = "12:15"
reason = "duplicate lecture stream"
require_at_least_one_match = true
"#
        )
        .expect("should write");

        let config = AppConfig::load_from(Some(file.path())).expect("should load");
        assert_eq!(config.ics_url, "https://tp.example.org/ical.php?sem=26v");
        assert_eq!(config.output_dir, PathBuf::from("out"));
        assert!(config.dry_run);
        assert_eq!(config.split.courses.len(), 1);
        assert_eq!(config.split.courses[0].short, "00");
        assert_eq!(config.split.event_filters[0].id, "drop-mon-f1");
        assert!(config.split.event_filters[0].require_at_least_one_match);

        // The loaded config must also compile.
        config.split.compile().expect("should compile");
    }

    #[test]
    fn environment_variables_override_file_values() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "config.toml",
                r#"
ics_url = "https://tp.example.org/ical.php?sem=26v"
dry_run = false
"#,
            )?;
            jail.set_env("TPSPLIT_ICS_URL", "https://tp.example.org/ical.php?sem=26h");
            jail.set_env("TPSPLIT_DRY_RUN", "true");

            let config = AppConfig::load_from(Some(Path::new("config.toml")))?;
            assert_eq!(config.ics_url, "https://tp.example.org/ical.php?sem=26h");
            assert!(config.dry_run);
            Ok(())
        });
    }
}
