use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// CSV replay settings.
#[derive(Debug, Clone, Deserialize)]
pub struct CsvConfig {
    pub file_path: PathBuf,

    #[serde(default = "default_delimiter")]
    pub delimiter: char,

    #[serde(default = "default_has_header")]
    pub has_header: bool,

    /// When set, rows carry no symbol column and all belong to this symbol.
    #[serde(default)]
    pub symbol: Option<String>,

    #[serde(default = "default_replay_interval_ms")]
    pub replay_interval_ms: u64,
}

impl CsvConfig {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
            delimiter: default_delimiter(),
            has_header: default_has_header(),
            symbol: None,
            replay_interval_ms: default_replay_interval_ms(),
        }
    }

    pub fn replay_interval(&self) -> Duration {
        Duration::from_millis(self.replay_interval_ms.max(1))
    }
}

fn default_delimiter() -> char {
    ','
}

fn default_has_header() -> bool {
    true
}

fn default_replay_interval_ms() -> u64 {
    1_000
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg: CsvConfig = serde_json::from_str(r#"{"file_path":"data/bars.csv"}"#).unwrap();
        assert_eq!(cfg.delimiter, ',');
        assert!(cfg.has_header);
        assert!(cfg.symbol.is_none());
        assert_eq!(cfg.replay_interval(), Duration::from_secs(1));

        let cfg: CsvConfig = serde_json::from_str(r#"{"file_path":"x.tsv","delimiter":"\t","symbol":"AAPL"}"#).unwrap();
        assert_eq!(cfg.delimiter, '\t');
        assert_eq!(cfg.symbol.as_deref(), Some("AAPL"));
    }
}
