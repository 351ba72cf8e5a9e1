use crate::analytics::pareto::DEFAULT_THRESHOLD_A;
use crate::errors::{AnalyticsError, AnalyticsResult};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server_port: u16,
    pub data_dir: PathBuf,
    pub metrics_seed_csv: Option<PathBuf>,
    pub static_dir: PathBuf,
    /// Used when a request carries no `threshold`. Still clamped to [50, 95].
    pub default_threshold: f64,
    pub default_bins: usize,
}

impl AppConfig {
    pub fn from_env() -> AnalyticsResult<Self> {
        dotenvy::dotenv().ok();

        let server_port = env_var_or("SERVER_PORT", "3001")
            .parse::<u16>()
            .map_err(|e| AnalyticsError::Config(format!("SERVER_PORT: {e}")))?;

        let default_threshold = env_var_or("DEFAULT_THRESHOLD", &DEFAULT_THRESHOLD_A.to_string())
            .parse::<f64>()
            .map_err(|e| AnalyticsError::Config(format!("DEFAULT_THRESHOLD: {e}")))?;

        let default_bins = env_var_or("DEFAULT_BINS", "10")
            .parse::<usize>()
            .map_err(|e| AnalyticsError::Config(format!("DEFAULT_BINS: {e}")))?;

        if default_bins == 0 {
            return Err(AnalyticsError::Config("DEFAULT_BINS must be at least 1".into()));
        }

        Ok(Self {
            server_port,
            data_dir: PathBuf::from(env_var_or("DATA_DIR", "data")),
            metrics_seed_csv: std::env::var("METRICS_SEED_CSV")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(PathBuf::from),
            static_dir: PathBuf::from(env_var_or("STATIC_DIR", "static")),
            default_threshold,
            default_bins,
        })
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_port: 3001,
            data_dir: PathBuf::from("data"),
            metrics_seed_csv: None,
            static_dir: PathBuf::from("static"),
            default_threshold: DEFAULT_THRESHOLD_A,
            default_bins: 10,
        }
    }
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_threshold_is_class_a_cutoff() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.default_threshold, DEFAULT_THRESHOLD_A);
        assert_eq!(DEFAULT_THRESHOLD_A.to_string().parse::<f64>().unwrap(), 80.0);
        assert_eq!(cfg.default_bins, 10);
    }
}
