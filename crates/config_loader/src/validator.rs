//! 配置校验模块
//!
//! 校验规则：
//! - trigger_rate > 0 (合成源)
//! - clock_frequency_hz > 0, mean_signal_multiplicity >= 0
//! - hardware_device_name / connections_resource 非空 (硬件源)
//! - readout_period_us > 0
//! - send_timeout_ms > 0

use contracts::{ContractError, HardwareConfig, ModuleConfig, SourceConfig, SyntheticConfig};

/// 校验 ModuleConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &ModuleConfig) -> Result<(), ContractError> {
    validate_send_timeout(config)?;
    match &config.source {
        SourceConfig::Synthetic(synthetic) => validate_synthetic(synthetic),
        SourceConfig::Hardware(hardware) => validate_hardware(hardware),
    }
}

/// 校验发送超时
fn validate_send_timeout(config: &ModuleConfig) -> Result<(), ContractError> {
    if config.send_timeout_ms == 0 {
        return Err(ContractError::config_validation(
            "send_timeout_ms",
            "send_timeout_ms must be > 0",
        ));
    }
    Ok(())
}

/// 校验合成源参数
fn validate_synthetic(config: &SyntheticConfig) -> Result<(), ContractError> {
    if !(config.trigger_rate.is_finite() && config.trigger_rate > 0.0) {
        return Err(ContractError::InvalidTriggerRate {
            rate: config.trigger_rate,
        });
    }

    if config.clock_frequency_hz == 0 {
        return Err(ContractError::config_validation(
            "source.clock_frequency_hz",
            "clock_frequency_hz must be > 0",
        ));
    }

    let mean = config.mean_signal_multiplicity;
    if !(mean.is_finite() && mean >= 0.0) {
        return Err(ContractError::config_validation(
            "source.mean_signal_multiplicity",
            format!("mean_signal_multiplicity must be a finite value >= 0, got {mean}"),
        ));
    }

    Ok(())
}

/// 校验硬件源参数
fn validate_hardware(config: &HardwareConfig) -> Result<(), ContractError> {
    if config.hardware_device_name.is_empty() {
        return Err(ContractError::config_validation(
            "source.hardware_device_name",
            "HSI device name is empty",
        ));
    }

    if config.connections_resource.is_empty() {
        return Err(ContractError::config_validation(
            "source.connections_resource",
            "connections_resource cannot be empty",
        ));
    }

    if config.readout_period_us == 0 {
        return Err(ContractError::config_validation(
            "source.readout_period_us",
            "readout_period_us must be > 0",
        ));
    }

    Ok(())
}
