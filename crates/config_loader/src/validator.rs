//! 配置校验模块
//!
//! 校验规则：
//! - 数值字段有限 (NaN 可以通过范围校验)
//! - 字段范围 (derive 的 `Validate` 规则)
//! - min_buffer_ms <= max_buffer_ms
//! - initial_buffer_ms 落在 [min_buffer_ms, max_buffer_ms]
//! - dial.url 非空白
//! - dial.protocols 非空且唯一

use std::collections::HashSet;

use ::validator::{Validate, ValidationErrors, ValidationErrorsKind};
use contracts::{ContractError, SyncClientConfig};

/// 校验 SyncClientConfig 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(config: &SyncClientConfig) -> Result<(), ContractError> {
    validate_finite(config)?;
    validate_ranges(config)?;
    validate_dial(config)?;
    validate_buffer_bounds(config)?;
    Ok(())
}

/// 校验数值字段有限
fn validate_finite(config: &SyncClientConfig) -> Result<(), ContractError> {
    let clock = &config.clock_sync;
    let interpolation = &config.interpolation;
    let correction = &config.correction;

    let fields = [
        ("reconciliation_delay_ms", config.reconciliation_delay_ms),
        ("clock_sync.smoothing", clock.smoothing),
        ("clock_sync.max_step_ms", clock.max_step_ms),
        ("interpolation.min_buffer_ms", interpolation.min_buffer_ms),
        ("interpolation.max_buffer_ms", interpolation.max_buffer_ms),
        ("interpolation.initial_buffer_ms", interpolation.initial_buffer_ms),
        ("interpolation.max_step_ms", interpolation.max_step_ms),
        ("interpolation.jitter_multiplier", interpolation.jitter_multiplier),
        ("interpolation.smoothing", interpolation.smoothing),
        ("interpolation.reorder_slack_ms", interpolation.reorder_slack_ms),
        ("correction.position_threshold_m", correction.position_threshold_m),
        ("correction.orientation_threshold_deg", correction.orientation_threshold_deg),
    ];

    for (field, value) in fields {
        if !value.is_finite() {
            return Err(ContractError::config_validation(
                field,
                format!("{field} must be finite, got {value}"),
            ));
        }
    }
    Ok(())
}

/// 校验字段范围
fn validate_ranges(config: &SyncClientConfig) -> Result<(), ContractError> {
    config.validate().map_err(|errors| {
        ContractError::config_validation(first_invalid_field(&errors, ""), errors.to_string())
    })
}

/// 定位第一个（按字段名排序）非法字段的路径
fn first_invalid_field(errors: &ValidationErrors, prefix: &str) -> String {
    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by(|a, b| a.0.cmp(b.0));

    let Some((name, kind)) = fields.first() else {
        return prefix.to_string();
    };
    let path = if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    };

    match kind {
        ValidationErrorsKind::Struct(inner) => first_invalid_field(inner, &path),
        _ => path,
    }
}

/// 校验拨号参数
fn validate_dial(config: &SyncClientConfig) -> Result<(), ContractError> {
    let dial = &config.dial;

    if dial.url.trim().is_empty() {
        return Err(ContractError::config_validation(
            "dial.url",
            "url cannot be blank",
        ));
    }

    let mut seen = HashSet::new();
    for (idx, protocol) in dial.protocols.iter().enumerate() {
        if protocol.trim().is_empty() {
            return Err(ContractError::config_validation(
                format!("dial.protocols[{idx}]"),
                "protocol cannot be empty",
            ));
        }
        if !seen.insert(protocol.as_str()) {
            return Err(ContractError::config_validation(
                format!("dial.protocols[{idx}]"),
                format!("duplicate protocol '{protocol}'"),
            ));
        }
    }
    Ok(())
}

/// 校验播放缓冲区范围
fn validate_buffer_bounds(config: &SyncClientConfig) -> Result<(), ContractError> {
    let interpolation = &config.interpolation;

    if interpolation.min_buffer_ms > interpolation.max_buffer_ms {
        return Err(ContractError::config_validation(
            "interpolation.min_buffer_ms / interpolation.max_buffer_ms",
            format!(
                "min_buffer_ms ({}) must be <= max_buffer_ms ({})",
                interpolation.min_buffer_ms, interpolation.max_buffer_ms
            ),
        ));
    }

    if interpolation.initial_buffer_ms < interpolation.min_buffer_ms
        || interpolation.initial_buffer_ms > interpolation.max_buffer_ms
    {
        return Err(ContractError::config_validation(
            "interpolation.initial_buffer_ms",
            format!(
                "initial_buffer_ms ({}) must be within [{}, {}]",
                interpolation.initial_buffer_ms,
                interpolation.min_buffer_ms,
                interpolation.max_buffer_ms
            ),
        ));
    }

    Ok(())
}
