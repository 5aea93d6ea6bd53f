//! INI file configuration adapter.

use crate::ports::config_port::ConfigPort;
use configparser::ini::Ini;
use std::path::Path;

pub struct FileConfigAdapter {
    config: Ini,
}

impl FileConfigAdapter {
    pub fn from_file<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let mut config = Ini::new();
        config.load(path).map_err(std::io::Error::other)?;
        Ok(Self { config })
    }

    pub fn from_string(content: &str) -> Result<Self, String> {
        let mut config = Ini::new();
        config.read(content.to_string())?;
        Ok(Self { config })
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.to_lowercase().as_str() {
            "true" | "yes" | "1" => Some(true),
            "false" | "no" | "0" => Some(false),
            _ => None,
        }
    }
}

impl ConfigPort for FileConfigAdapter {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        self.config.get(section, key)
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.config
            .getint(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.config
            .getfloat(section, key)
            .ok()
            .flatten()
            .unwrap_or(default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.config
            .get(section, key)
            .as_ref()
            .and_then(|v| Self::parse_bool(v))
            .unwrap_or(default)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = r#"
[market]
symbol = SOL-USDT-SWAP
timeframes = 15m, 1h ,4h
base_timeframe = 15m

[source]
endpoints = https://www.okx.com,https://aws.okx.com
retries_per_endpoint = 3

[indicator]
k = 2.5

[weights.1h]
lower = 5

[notify]
enabled = yes
"#;

    #[test]
    fn reads_market_section() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(
            adapter.get_string("market", "symbol"),
            Some("SOL-USDT-SWAP".to_string())
        );
        assert_eq!(adapter.get_int("source", "retries_per_endpoint", 0), 3);
        assert_eq!(adapter.get_double("indicator", "k", 0.0), 2.5);
    }

    #[test]
    fn list_values_are_trimmed() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(
            adapter.get_list("market", "timeframes"),
            Some(vec!["15m".to_string(), "1h".to_string(), "4h".to_string()])
        );
        assert_eq!(adapter.get_list("source", "endpoints").unwrap().len(), 2);
        assert_eq!(adapter.get_list("market", "missing"), None);
    }

    #[test]
    fn dotted_section_names() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_int("weights.1h", "lower", 0), 5);
        assert_eq!(adapter.get_int("weights.4h", "lower", -1), -1);
    }

    #[test]
    fn missing_values_fall_back() {
        let adapter = FileConfigAdapter::from_string(SAMPLE).unwrap();
        assert_eq!(adapter.get_string("market", "missing"), None);
        assert_eq!(adapter.get_string("missing_section", "key"), None);
        assert_eq!(adapter.get_int("backtest", "leverage", 100), 100);
        assert_eq!(adapter.get_double("backtest", "initial_capital", 99.9), 99.9);
    }

    #[test]
    fn non_numeric_falls_back() {
        let adapter =
            FileConfigAdapter::from_string("[backtest]\nleverage = abc\nstop_loss_pct = x\n")
                .unwrap();
        assert_eq!(adapter.get_int("backtest", "leverage", 42), 42);
        assert_eq!(adapter.get_double("backtest", "stop_loss_pct", -10.0), -10.0);
    }

    #[test]
    fn bool_values() {
        let adapter =
            FileConfigAdapter::from_string("[x]\na = true\nb = no\nc = 1\nd = maybe\n").unwrap();
        assert!(adapter.get_bool("x", "a", false));
        assert!(!adapter.get_bool("x", "b", true));
        assert!(adapter.get_bool("x", "c", false));
        assert!(adapter.get_bool("x", "d", true));
        assert!(adapter.get_bool("notify", "missing", true));
    }

    #[test]
    fn from_file_reads_config() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "[cache]\ndir = /var/cache/bandtrader\n").unwrap();
        let adapter = FileConfigAdapter::from_file(file.path()).unwrap();
        assert_eq!(
            adapter.get_string("cache", "dir"),
            Some("/var/cache/bandtrader".to_string())
        );
    }

    #[test]
    fn from_file_returns_error_for_missing_file() {
        assert!(FileConfigAdapter::from_file("/nonexistent/path/config.ini").is_err());
    }
}
