//! 配置解析模块
//!
//! 支持 TOML (主要) 和 JSON (可选) 格式。

use contracts::{ContractError, ModuleConfig};

/// 配置文件格式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// TOML 格式 (推荐)
    Toml,
    /// JSON 格式
    Json,
}

impl ConfigFormat {
    /// 从文件扩展名推断格式
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// 解析 TOML 格式配置
pub fn parse_toml(content: &str) -> Result<ModuleConfig, ContractError> {
    toml::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("TOML parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 解析 JSON 格式配置
pub fn parse_json(content: &str) -> Result<ModuleConfig, ContractError> {
    serde_json::from_str(content).map_err(|e| ContractError::ConfigParse {
        message: format!("JSON parse error: {e}"),
        source: Some(Box::new(e)),
    })
}

/// 根据格式解析配置
pub fn parse(content: &str, format: ConfigFormat) -> Result<ModuleConfig, ContractError> {
    match format {
        ConfigFormat::Toml => parse_toml(content),
        ConfigFormat::Json => parse_json(content),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{EmulationMode, FrameFormat, LogVerbosity, SourceConfig};

    #[test]
    fn test_parse_toml_synthetic() {
        let content = r#"
frame_format = "legacy"
log_verbosity = "notice"

[source]
kind = "synthetic"
trigger_rate = 10.0
timestamp_offset = -125
signal_emulation_mode = "poisson_gate"
mean_signal_multiplicity = 0.5
enabled_signals = 0xff
random_seed = 42
"#;
        let config = parse_toml(content).unwrap();
        assert_eq!(config.frame_format, FrameFormat::Legacy);
        assert_eq!(config.log_verbosity, LogVerbosity::Notice);
        assert_eq!(config.send_timeout_ms, 1);
        let SourceConfig::Synthetic(s) = config.source else {
            panic!("expected synthetic source");
        };
        assert_eq!(s.trigger_rate, 10.0);
        assert_eq!(s.timestamp_offset, -125);
        assert_eq!(s.signal_emulation_mode, EmulationMode::PoissonGate);
        assert_eq!(s.enabled_signals, 0xff);
        assert_eq!(s.random_seed, Some(42));
        assert_eq!(s.clock_frequency_hz, 62_500_000);
    }

    #[test]
    fn test_parse_rejects_unknown_log_level() {
        let content = r#"
log_verbosity = "chatty"

[source]
kind = "hardware"
hardware_device_name = "HSI_0"
connections_resource = "file://c.xml"
"#;
        let err = parse_toml(content).unwrap_err();
        assert!(matches!(err, ContractError::ConfigParse { .. }));
    }

    #[test]
    fn test_parse_rejects_unknown_source_kind() {
        let content = r#"{"source": {"kind": "network", "trigger_rate": 1.0}}"#;
        assert!(parse_json(content).is_err());
    }
}
