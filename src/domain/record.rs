//! Harvest result records
//!
//! One `ExtractedRecord` is produced per task outcome. Only records with
//! `HarvestStatus::Success` are ever persisted.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::task::Task;

/// Outcome status of a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HarvestStatus {
    Success,
    Fail,
    Error,
}

impl HarvestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Fail => "fail",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for HarvestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Menu entry as displayed on the detail view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub item: String,
    pub price: String,
}

/// Attributes parsed from a place detail view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaceDetail {
    pub name: String,
    pub rating: f64,
    pub visitor_reviews: i64,
    pub blog_reviews: i64,
    pub menu_items: Vec<MenuItem>,
    pub avg_price: f64,
}

/// Parsed attributes of one place plus the task outcome
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedRecord {
    pub original_name: String,
    pub name: String,
    pub rating: f64,
    pub visitor_reviews: i64,
    pub blog_reviews: i64,
    #[serde(rename = "menus")]
    pub menu_items: Vec<MenuItem>,
    pub avg_price: f64,
    pub status: HarvestStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ExtractedRecord {
    pub fn success(task: &Task, detail: PlaceDetail) -> Self {
        Self {
            original_name: task.original_name.clone(),
            name: detail.name,
            rating: detail.rating,
            visitor_reviews: detail.visitor_reviews,
            blog_reviews: detail.blog_reviews,
            menu_items: detail.menu_items,
            avg_price: detail.avg_price,
            status: HarvestStatus::Success,
            reason: None,
        }
    }

    /// Record for a task that did not reach a parsed state
    pub fn unsuccessful(task: &Task, status: HarvestStatus, reason: impl Into<String>) -> Self {
        Self {
            original_name: task.original_name.clone(),
            name: task.normalized_name().to_string(),
            rating: 0.0,
            visitor_reviews: 0,
            blog_reviews: 0,
            menu_items: Vec::new(),
            avg_price: 0.0,
            status,
            reason: Some(reason.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == HarvestStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&HarvestStatus::Fail).unwrap();
        assert_eq!(json, "\"fail\"");
    }

    #[test]
    fn test_unsuccessful_record_carries_reason() {
        let task = Task::new("\"토속촌\"", Some("서울 종로구 체부동 85-1".to_string()));
        let record = ExtractedRecord::unsuccessful(&task, HarvestStatus::Fail, "parse failed");

        assert_eq!(record.original_name, "\"토속촌\"");
        assert_eq!(record.name, "토속촌");
        assert_eq!(record.reason.as_deref(), Some("parse failed"));
        assert!(!record.is_success());
    }

    #[test]
    fn test_success_document_omits_reason() {
        let task = Task::new("토속촌", None);
        let detail = PlaceDetail {
            name: "토속촌 삼계탕".to_string(),
            rating: 4.5,
            visitor_reviews: 12_345,
            blog_reviews: 3_210,
            menu_items: vec![MenuItem { item: "삼계탕".to_string(), price: "20,000".to_string() }],
            avg_price: 20_000.0,
        };
        let record = ExtractedRecord::success(&task, detail);

        let value = serde_json::to_value(&record).unwrap();
        assert!(value.get("reason").is_none());
        assert!(value.get("menus").is_some());
        assert_eq!(value["status"], "success");
    }
}
