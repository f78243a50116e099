use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

use crate::processor::ProcessorError;
use crate::processor::query_builder::DEFAULT_CACHE_CAPACITY;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "pivot-dashboard.toml";
pub const ENV_PREFIX: &str = "PIVOT_DASHBOARD_";
pub const DEFAULT_PLOTLY_SRC: &str = "https://cdn.plot.ly/plotly-2.35.2.min.js";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub data_path: PathBuf,
    pub output_path: PathBuf,
    /// Rows of raw data shown under the chart.
    pub preview_rows: usize,
    /// Pivot tables kept between interactions.
    pub cache_capacity: usize,
    pub title: String,
    pub plotly_src: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            data_path: PathBuf::from("sales_test_data_100.csv"),
            output_path: PathBuf::from("dashboard.html"),
            preview_rows: 5,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            title: "Data analysis dashboard".to_string(),
            plotly_src: DEFAULT_PLOTLY_SRC.to_string(),
        }
    }
}

impl DashboardConfig {
    /// Layers defaults, the TOML file and `PIVOT_DASHBOARD_*` variables.
    ///
    /// An explicit `file` must exist; the default file is optional.
    pub fn load(file: Option<&Path>) -> Result<Self, ProcessorError> {
        let mut figment = Figment::from(Serialized::defaults(DashboardConfig::default()));
        match file {
            Some(path) => {
                if !path.is_file() {
                    return Err(ProcessorError::Config(format!(
                        "config file not found: {}",
                        path.display()
                    )));
                }
                figment = figment.merge(Toml::file(path));
            }
            None => figment = figment.merge(Toml::file(DEFAULT_CONFIG_FILE)),
        }
        Self::from_figment(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ProcessorError> {
        let config: DashboardConfig = figment
            .extract()
            .map_err(|e| ProcessorError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ProcessorError> {
        if self.preview_rows == 0 {
            return Err(ProcessorError::Config("preview_rows must be at least 1".into()));
        }
        if self.cache_capacity == 0 {
            return Err(ProcessorError::Config("cache_capacity must be at least 1".into()));
        }
        Ok(())
    }
}
