//! Task submission types: priority levels and per-call options

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Priority level for submitted tasks
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

impl std::str::FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Per-call overrides for one `execute` submission
///
/// Unset fields fall back to the scheduler configuration.
#[derive(Debug, Clone, Default)]
pub struct TaskOptions {
    /// Timeout for each attempt
    pub timeout: Option<Duration>,
    /// Retries after the initial attempt
    pub retry_count: Option<u32>,
    /// Base retry delay, scaled linearly by attempt number
    pub retry_delay: Option<Duration>,
    /// Queue priority
    pub priority: Option<Priority>,
}

impl TaskOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = Some(retry_count);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = Some(retry_delay);
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = Some(priority);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Low < Priority::Normal);
        assert!(Priority::Normal < Priority::High);
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(Priority::Low.to_string(), "low");
        assert_eq!(Priority::Normal.to_string(), "normal");
        assert_eq!(Priority::High.to_string(), "high");
    }

    #[test]
    fn test_priority_parse() {
        assert_eq!("low".parse::<Priority>().unwrap(), Priority::Low);
        assert_eq!("HIGH".parse::<Priority>().unwrap(), Priority::High);
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_priority_serde() {
        let json = serde_json::to_string(&Priority::High).unwrap();
        assert_eq!(json, "\"high\"");

        let priority: Priority = serde_json::from_str("\"low\"").unwrap();
        assert_eq!(priority, Priority::Low);
    }

    #[test]
    fn test_options_default_to_unset() {
        let options = TaskOptions::new();
        assert!(options.timeout.is_none());
        assert!(options.retry_count.is_none());
        assert!(options.retry_delay.is_none());
        assert!(options.priority.is_none());
    }

    #[test]
    fn test_options_builders() {
        let options = TaskOptions::new()
            .with_timeout(Duration::from_secs(5))
            .with_retry_count(2)
            .with_retry_delay(Duration::from_millis(100))
            .with_priority(Priority::High);

        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
        assert_eq!(options.retry_count, Some(2));
        assert_eq!(options.retry_delay, Some(Duration::from_millis(100)));
        assert_eq!(options.priority, Some(Priority::High));
    }
}
