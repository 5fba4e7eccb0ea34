//! 重试配置
//!
//! 配置文件示例：
//!
//! ```toml
//! [default]
//! max_attempts = 3
//! retryable_codes = ["UNAVAILABLE", "RESOURCE_EXHAUSTED"]
//!
//! [default.backoff]
//! type = "exponential_jitter"
//! scalar_ms = 100
//! jitter = 0.2
//!
//! [methods."/chat.Chat/Send"]
//! max_attempts = 5
//! per_attempt_timeout_ms = 500
//! ```

use crate::error::{Result, RetryError, code_from_name, code_name};
use crate::interceptor::RetryInterceptor;
use crate::retry::{
    BackoffPolicy, DEFAULT_RETRIABLE_CODES, Exponential, ExponentialJitter, Linear, LinearJitter,
    RetryOption,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// 单个重试配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct RetryConfig {
    #[serde(default)]
    pub max_attempts: u32,
    #[serde(default)]
    pub per_attempt_timeout_ms: u64,
    #[serde(default = "default_retryable_codes")]
    pub retryable_codes: Vec<String>,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

fn default_retryable_codes() -> Vec<String> {
    DEFAULT_RETRIABLE_CODES
        .iter()
        .map(|code| code_name(*code).to_string())
        .collect()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            per_attempt_timeout_ms: 0,
            retryable_codes: default_retryable_codes(),
            backoff: BackoffConfig::default(),
        }
    }
}

/// 退避配置
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BackoffConfig {
    Linear { interval_ms: u64 },
    LinearJitter { interval_ms: u64, jitter: f64 },
    Exponential { scalar_ms: u64 },
    ExponentialJitter { scalar_ms: u64, jitter: f64 },
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig::LinearJitter {
            interval_ms: 50,
            jitter: 0.10,
        }
    }
}

impl BackoffConfig {
    /// 构建退避策略
    pub fn build(&self) -> Result<Arc<dyn BackoffPolicy>> {
        let policy: Arc<dyn BackoffPolicy> = match *self {
            BackoffConfig::Linear { interval_ms } => {
                Arc::new(Linear::new(Duration::from_millis(interval_ms)))
            }
            BackoffConfig::LinearJitter {
                interval_ms,
                jitter,
            } => Arc::new(LinearJitter::new(
                Duration::from_millis(interval_ms),
                validate_jitter(jitter)?,
            )),
            BackoffConfig::Exponential { scalar_ms } => {
                Arc::new(Exponential::new(Duration::from_millis(scalar_ms)))
            }
            BackoffConfig::ExponentialJitter { scalar_ms, jitter } => {
                Arc::new(ExponentialJitter::new(
                    Duration::from_millis(scalar_ms),
                    validate_jitter(jitter)?,
                ))
            }
        };
        Ok(policy)
    }
}

fn validate_jitter(jitter: f64) -> Result<f64> {
    if (0.0..=1.0).contains(&jitter) {
        Ok(jitter)
    } else {
        Err(RetryError::invalid_config(format!(
            "jitter must be within [0, 1], got {}",
            jitter
        )))
    }
}

impl RetryConfig {
    /// 转换为重试选项
    pub fn to_option(&self) -> Result<RetryOption> {
        let codes = self
            .retryable_codes
            .iter()
            .map(|name| code_from_name(name))
            .collect::<Result<Vec<_>>>()?;

        let mut option = RetryOption::default();
        option.set_max_attempts(self.max_attempts);
        option.set_per_attempt_timeout(Duration::from_millis(self.per_attempt_timeout_ms));
        option.set_codes(codes);
        option.set_backoff(self.backoff.build()?);
        Ok(option)
    }
}

/// 重试配置文件
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct RetryConfigFile {
    #[serde(default)]
    pub default: Option<RetryConfig>,
    #[serde(default)]
    pub methods: HashMap<String, RetryConfig>,
}

impl RetryConfigFile {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}

/// 按名称查找重试选项
///
/// 由调用方创建并持有，不存在进程级的全局配置表。
#[derive(Debug, Clone, Default)]
pub struct RetryOptionRegistry {
    default: RetryOption,
    options: HashMap<String, RetryOption>,
}

impl RetryOptionRegistry {
    pub fn new(default: RetryOption) -> Self {
        Self {
            default,
            options: HashMap::new(),
        }
    }

    /// 从配置文件内容构建
    pub fn from_config(config: &RetryConfigFile) -> Result<Self> {
        let default = match &config.default {
            Some(default) => default.to_option()?,
            None => RetryOption::default(),
        };

        let mut registry = Self::new(default);
        for (name, method) in &config.methods {
            let option = method
                .to_option()
                .map_err(|e| RetryError::invalid_config(format!("{}: {}", name, e)))?;
            registry.insert(name.clone(), option);
        }
        Ok(registry)
    }

    pub fn insert(&mut self, name: impl Into<String>, option: RetryOption) -> Option<RetryOption> {
        self.options.insert(name.into(), option)
    }

    /// 获取名称对应的选项，不存在时返回默认选项
    pub fn get(&self, name: &str) -> &RetryOption {
        self.options.get(name).unwrap_or(&self.default)
    }

    pub fn default_option(&self) -> &RetryOption {
        &self.default
    }

    pub fn contains(&self, name: &str) -> bool {
        self.options.contains_key(name)
    }

    /// 为指定名称创建拦截器
    pub fn interceptor(&self, name: &str) -> RetryInterceptor {
        RetryInterceptor::new(self.get(name).clone())
    }
}
