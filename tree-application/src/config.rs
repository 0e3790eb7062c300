use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;

const DEFAULT_EVENT_BUS_CAPACITY: usize = 256;

/// 应用配置（环境变量）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    /// 核验事件开关：关闭时仍执行更新，但不产生也不投递事件
    pub enable_verification_publishing: bool,
    pub event_bus_capacity: usize,
    pub database_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            enable_verification_publishing: false,
            event_bus_capacity: DEFAULT_EVENT_BUS_CAPACITY,
            database_url: None,
        }
    }
}

impl AppConfig {
    /// 从环境变量加载（开发环境下先读取 `.env`）
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// 以任意键值来源加载，便于在不修改进程环境的情况下测试
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enable_verification_publishing = match lookup("ENABLE_VERIFICATION_PUBLISHING") {
            Some(raw) => parse_flag(&raw)
                .with_context(|| format!("ENABLE_VERIFICATION_PUBLISHING is not a boolean: {raw}"))?,
            None => false,
        };

        let event_bus_capacity = match lookup("EVENT_BUS_CAPACITY") {
            Some(raw) => raw
                .trim()
                .parse()
                .context("EVENT_BUS_CAPACITY must be a valid number")?,
            None => DEFAULT_EVENT_BUS_CAPACITY,
        };

        Ok(Self {
            enable_verification_publishing,
            event_bus_capacity,
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
        })
    }
}

fn parse_flag(raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => anyhow::bail!("unrecognised flag value {other:?}"),
    }
}
