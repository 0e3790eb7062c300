use crate::error::DomainError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// 事件投递状态：事务内写入为 `Raised`，下游确认后置为 `Sent`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventStatus {
    #[default]
    Raised,
    Sent,
}

impl EventStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventStatus::Raised => "raised",
            EventStatus::Sent => "sent",
        }
    }
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raised" => Ok(EventStatus::Raised),
            "sent" => Ok(EventStatus::Sent),
            other => Err(DomainError::Parse {
                reason: format!("unknown event status: {other}"),
            }),
        }
    }
}
