//! Execution record types shared by the store, the query layer and the API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("unknown {kind} value: {value}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Outcome of one interface run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExecutionStatus {
    Success,
    Failed,
    Warning,
    Pending,
}

impl ExecutionStatus {
    pub const ALL: [ExecutionStatus; 4] = [
        ExecutionStatus::Success,
        ExecutionStatus::Failed,
        ExecutionStatus::Warning,
        ExecutionStatus::Pending,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Warning => "WARNING",
            ExecutionStatus::Pending => "PENDING",
        }
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExecutionStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUCCESS" => Ok(ExecutionStatus::Success),
            "FAILED" => Ok(ExecutionStatus::Failed),
            "WARNING" => Ok(ExecutionStatus::Warning),
            "PENDING" => Ok(ExecutionStatus::Pending),
            other => Err(UnknownVariant {
                kind: "status",
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    #[default]
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "LOW",
            Severity::Medium => "MEDIUM",
            Severity::High => "HIGH",
            Severity::Critical => "CRITICAL",
        }
    }
}

impl FromStr for Severity {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "LOW" => Ok(Severity::Low),
            "MEDIUM" => Ok(Severity::Medium),
            "HIGH" => Ok(Severity::High),
            "CRITICAL" => Ok(Severity::Critical),
            other => Err(UnknownVariant {
                kind: "severity",
                value: other.to_string(),
            }),
        }
    }
}

/// One logged run of an interface, as persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    pub id: i64,
    pub interface_name: String,
    pub integration_key: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    /// Milliseconds.
    pub duration: Option<i64>,
    pub message: String,
    /// Only meaningful when `status` is FAILED.
    pub error_details: Option<serde_json::Value>,
    pub severity: Severity,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert-side shape of an execution; the store assigns id and stamps.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewExecution {
    pub interface_name: String,
    pub integration_key: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub duration: Option<i64>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub error_details: Option<serde_json::Value>,
    #[serde(default)]
    pub severity: Severity,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewExecution {
    /// Minimal record, mostly useful for tests and fixtures.
    pub fn new(
        interface_name: impl Into<String>,
        status: ExecutionStatus,
        start_time: DateTime<Utc>,
    ) -> Self {
        let interface_name = interface_name.into();
        Self {
            integration_key: interface_name.to_lowercase(),
            interface_name,
            status,
            start_time,
            end_time: None,
            duration: None,
            message: String::new(),
            error_details: None,
            severity: Severity::Low,
            tags: Vec::new(),
        }
    }

    pub fn with_duration(mut self, ms: i64) -> Self {
        self.duration = Some(ms);
        self.end_time = Some(self.start_time + chrono::Duration::milliseconds(ms));
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }
}

/// The listing projection of a record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionItem {
    pub id: i64,
    pub interface_name: String,
    pub integration_key: String,
    pub status: ExecutionStatus,
    pub start_time: DateTime<Utc>,
    pub duration: Option<i64>,
    pub message: String,
    pub severity: Severity,
}

impl From<ExecutionRecord> for ExecutionItem {
    fn from(r: ExecutionRecord) -> Self {
        Self {
            id: r.id,
            interface_name: r.interface_name,
            integration_key: r.integration_key,
            status: r.status,
            start_time: r.start_time,
            duration: r.duration,
            message: r.message,
            severity: r.severity,
        }
    }
}
