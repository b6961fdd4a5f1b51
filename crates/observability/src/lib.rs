//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标 + 缓冲区占用监控。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式)
//! - Prometheus 指标导出 (可选)
//! - 硬件缓冲区占用滑动窗口
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{init_with_config, ObservabilityConfig};
//!
//! init_with_config(ObservabilityConfig::from_verbosity(config.log_verbosity))?;
//! ```

pub mod metrics;
pub mod occupancy;

use anyhow::{Context, Result};
use contracts::LogVerbosity;
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// Re-exports
pub use crate::metrics::{RunningStats, StatsSummary};
pub use crate::occupancy::{OccupancyMonitor, OCCUPANCY_WINDOW};

/// 硬件传输层日志 target
pub const HARDWARE_LOG_TARGET: &str = "signal_source::hardware";

/// 初始化可观测性（仅 Tracing，Prometheus 默认禁用）
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
    /// 默认日志级别
    pub default_log_level: String,
    /// 硬件传输层日志级别
    pub hardware_log_level: LogVerbosity,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self::from_verbosity(LogVerbosity::default())
    }
}

impl ObservabilityConfig {
    /// 由模块配置中的 `log_verbosity` 构建
    pub fn from_verbosity(verbosity: LogVerbosity) -> Self {
        Self {
            log_format: LogFormat::Json,
            metrics_port: None,
            default_log_level: verbosity.as_tracing_level().to_string(),
            hardware_log_level: verbosity,
        }
    }

    /// EnvFilter 指令（RUST_LOG 未设置时使用）
    pub fn filter_directives(&self) -> String {
        format!(
            "{},{}",
            self.default_log_level,
            hardware_filter_directive(self.hardware_log_level)
        )
    }
}

/// 硬件传输层的 EnvFilter 指令
pub fn hardware_filter_directive(verbosity: LogVerbosity) -> String {
    format!("{}={}", HARDWARE_LOG_TARGET, verbosity.as_tracing_level())
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default)]
pub enum LogFormat {
    /// JSON 结构化日志
    #[default]
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    Compact,
}

/// 使用自定义配置初始化
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    // 1. Initialize Tracing
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.filter_directives()));

    match config.log_format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_target(true)
                .with_thread_ids(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().pretty().with_thread_names(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
        LogFormat::Compact => {
            let fmt_layer = fmt::layer().compact().with_thread_names(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()
                .context("Failed to initialize tracing subscriber")?;
        }
    }

    // 2. Initialize Prometheus Exporter (if enabled)
    if let Some(port) = config.metrics_port {
        init_metrics_only(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        hardware_log_level = %config.hardware_log_level,
        "Observability initialized"
    );

    Ok(())
}

/// 仅初始化 Prometheus 指标（不初始化 Tracing）
///
/// 用于 Tracing 已由宿主进程初始化的场景。
pub fn init_metrics_only(port: u16) -> Result<()> {
    PrometheusBuilder::new()
        .with_http_listener(([0, 0, 0, 0], port))
        .install()
        .context("Failed to install Prometheus recorder")?;

    tracing::info!(port = port, "Prometheus metrics endpoint initialized");
    Ok(())
}
