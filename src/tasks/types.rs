//! Wire types for the task API

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Opaque task identifier.
///
/// The backend may send either a string or an integer; both are kept as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
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

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Signed(i64),
            Unsigned(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => TaskId(s),
            RawId::Signed(n) => TaskId(n.to_string()),
            RawId::Unsigned(n) => TaskId(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub content: String,
    #[serde(default)]
    pub done: bool,
}

/// Tasks sharing a calendar date, in render order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskGroup {
    pub date: NaiveDate,
    pub tasks: Vec<Task>,
}

/// Body of `PUT /api/tasks/{id}`; unset fields are left alone
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TaskPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
}

impl TaskPatch {
    pub fn done(done: bool) -> Self {
        Self {
            done: Some(done),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }
}

/// Task as returned by backends that do not group by date
#[derive(Debug, Clone, Deserialize)]
pub struct TimestampedTask {
    pub id: TaskId,
    pub content: String,
    #[serde(default)]
    pub done: bool,
    pub timestamp: String,
}

/// Body of `GET /api/tasks`
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TaskListing {
    Grouped(Vec<TaskGroup>),
    Flat(Vec<TimestampedTask>),
}

impl TaskListing {
    /// Normalize to date groups. Flat listings are bucketed by the date part
    /// of each timestamp, groups in order of first appearance.
    pub fn into_groups(self) -> Result<Vec<TaskGroup>, String> {
        let flat = match self {
            TaskListing::Grouped(groups) => return Ok(groups),
            TaskListing::Flat(flat) => flat,
        };

        let mut groups: Vec<TaskGroup> = Vec::new();
        for item in flat {
            let date = item
                .timestamp
                .get(..10)
                .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
                .ok_or_else(|| format!("bad timestamp '{}' on task {}", item.timestamp, item.id))?;

            let task = Task {
                id: item.id,
                content: item.content,
                done: item.done,
            };

            match groups.iter_mut().find(|g| g.date == date) {
                Some(group) => group.tasks.push(task),
                None => groups.push(TaskGroup {
                    date,
                    tasks: vec![task],
                }),
            }
        }
        Ok(groups)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_grouped_listing() {
        let json = r#"[{"date":"2024-01-01",
            "tasks":[{"id":"1","content":"Buy milk","done":false}]}]"#;
        let groups = serde_json::from_str::<TaskListing>(json)
            .unwrap()
            .into_groups()
            .unwrap();

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].date, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap());
        assert_eq!(groups[0].tasks[0].id, TaskId::new("1"));
        assert_eq!(groups[0].tasks[0].content, "Buy milk");
        assert!(!groups[0].tasks[0].done);
    }

    #[test]
    fn test_numeric_ids() {
        let json = r#"[{"date":"2024-03-09",
            "tasks":[{"id":42,"content":"Call Bob","done":true}]}]"#;
        let groups = serde_json::from_str::<TaskListing>(json)
            .unwrap()
            .into_groups()
            .unwrap();
        assert_eq!(groups[0].tasks[0].id.as_str(), "42");
    }

    #[test]
    fn test_empty_listing() {
        let groups = serde_json::from_str::<TaskListing>("[]")
            .unwrap()
            .into_groups()
            .unwrap();
        assert!(groups.is_empty());
    }

    #[test]
    fn test_flat_listing_groups_by_day() {
        let json = r#"[
            {"id":1,"content":"a","timestamp":"2024-05-02T09:00:00","done":false},
            {"id":2,"content":"b","timestamp":"2024-05-01T10:00:00","done":false},
            {"id":3,"content":"c","timestamp":"2024-05-02T11:30:00.123","done":true}
        ]"#;
        let groups = serde_json::from_str::<TaskListing>(json)
            .unwrap()
            .into_groups()
            .unwrap();

        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].date.to_string(), "2024-05-02");
        let ids: Vec<_> = groups[0].tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, ["1", "3"]);
        assert_eq!(groups[1].tasks[0].content, "b");
    }

    #[test]
    fn test_flat_listing_bad_timestamp() {
        let json = r#"[{"id":1,"content":"a","timestamp":"yesterday","done":false}]"#;
        let listing = serde_json::from_str::<TaskListing>(json).unwrap();
        assert!(listing.into_groups().is_err());
    }

    #[test]
    fn test_patch_skips_unset_fields() {
        assert_eq!(
            serde_json::to_string(&TaskPatch::done(true)).unwrap(),
            r#"{"done":true}"#
        );
        assert_eq!(
            serde_json::to_string(&TaskPatch::content("Buy oat milk")).unwrap(),
            r#"{"content":"Buy oat milk"}"#
        );
    }
}
