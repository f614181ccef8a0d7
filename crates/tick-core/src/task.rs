use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Low,
    #[default]
    Medium,
    High,
}

impl Priority {
    pub const ALL: [Priority; 3] = [Priority::Low, Priority::Medium, Priority::High];

    /// Display rank: lower sorts first, so `High` leads.
    pub fn rank(self) -> u8 {
        match self {
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Priority::Low => "low",
            Priority::Medium => "medium",
            Priority::High => "high",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "l" | "low" => Ok(Priority::Low),
            "m" | "med" | "medium" => Ok(Priority::Medium),
            "h" | "high" => Ok(Priority::High),
            other => Err(anyhow!(
                "invalid priority: {other} (expected low|medium|high)"
            )),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,

    pub text: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub priority: Priority,
}

impl Task {
    pub fn new(id: TaskId, text: String, priority: Priority) -> Self {
        Self {
            id,
            text,
            completed: false,
            priority,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.completed
    }
}

#[cfg(test)]
mod tests {
    use super::{Priority, Task, TaskId};

    #[test]
    fn priority_serializes_lowercase() {
        let task = Task::new(TaskId::from("a"), "Buy milk".to_string(), Priority::High);
        let json = serde_json::to_string(&task).expect("serialize");
        assert_eq!(
            json,
            r#"{"id":"a","text":"Buy milk","completed":false,"priority":"high"}"#
        );
    }

    #[test]
    fn legacy_record_with_timestamp_id_loads() {
        let raw = r#"{"id":"1718000000000-0.5123","text":"Walk dog","completed":true,"priority":"low"}"#;
        let task: Task = serde_json::from_str(raw).expect("deserialize");
        assert_eq!(task.id.as_str(), "1718000000000-0.5123");
        assert!(task.completed);
        assert_eq!(task.priority, Priority::Low);
    }

    #[test]
    fn unknown_priority_is_rejected() {
        let raw = r#"{"id":"a","text":"x","completed":false,"priority":"urgent"}"#;
        assert!(serde_json::from_str::<Task>(raw).is_err());
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn priority_parses_short_forms() {
        assert_eq!("H".parse::<Priority>().expect("h"), Priority::High);
        assert_eq!(" med ".parse::<Priority>().expect("med"), Priority::Medium);
        assert_eq!("low".parse::<Priority>().expect("low"), Priority::Low);
    }

    #[test]
    fn rank_orders_high_first() {
        let mut all = Priority::ALL.to_vec();
        all.sort_by_key(|p| p.rank());
        assert_eq!(all, vec![Priority::High, Priority::Medium, Priority::Low]);
    }

    #[test]
    fn active_until_completed() {
        let mut task = Task::new(TaskId::from("a"), "Read".to_string(), Priority::Low);
        assert!(task.is_active());
        task.completed = true;
        assert!(!task.is_active());
    }
}
