use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::task_status::TaskStatus;

/// A video generation job as the client sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoTask {
    pub id: String,
    pub status: TaskStatus,
    pub progress: u8,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskOutcome<'a> {
    Pending,
    Succeeded {
        video_url: &'a str,
        thumbnail_url: Option<&'a str>,
    },
    Failed(&'a str),
}

impl VideoTask {
    /// Optimistic entry inserted right after a successful submission.
    pub fn pending(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: TaskStatus::Pending,
            progress: 0,
            video_url: None,
            thumbnail_url: None,
            error: None,
            created_at: Utc::now(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Progress is only reported while the backend is processing.
    pub fn progress(&self) -> Option<u8> {
        (self.status == TaskStatus::Processing).then_some(self.progress)
    }

    pub fn outcome(&self) -> TaskOutcome<'_> {
        match self.status {
            TaskStatus::Completed => match self.video_url.as_deref() {
                Some(video_url) => TaskOutcome::Succeeded {
                    video_url,
                    thumbnail_url: self.thumbnail_url.as_deref(),
                },
                None => TaskOutcome::Failed(
                    self.error
                        .as_deref()
                        .unwrap_or("completed without a video url"),
                ),
            },
            TaskStatus::Failed => {
                TaskOutcome::Failed(self.error.as_deref().unwrap_or("unknown error"))
            }
            _ => TaskOutcome::Pending,
        }
    }
}

/// Task entry as returned by `GET /api/tasks` and `GET /api/status`.
#[derive(Debug, Clone, Deserialize)]
pub struct TaskRecord {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub progress: i64,
    pub video_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub error: Option<String>,
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<TaskRecord>,
}

impl TaskRecord {
    /// Missing or unparsable creation times fall back to `now`.
    pub fn into_task(self, now: DateTime<Utc>) -> VideoTask {
        let created_at = self
            .created_at
            .as_deref()
            .and_then(parse_timestamp)
            .unwrap_or(now);

        VideoTask {
            id: self.task_id,
            status: self.status,
            progress: self.progress.clamp(0, 100) as u8,
            video_url: self.video_url,
            thumbnail_url: self.thumbnail_url,
            error: self.error,
            created_at,
        }
    }
}

// The backend emits naive ISO-8601 timestamps in UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn record(value: serde_json::Value) -> TaskRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn maps_completed_record() {
        let now = Utc::now();
        let task = record(json!({
            "task_id": "a",
            "status": "completed",
            "progress": 100,
            "video_url": "https://cdn/x.mp4",
            "thumbnail_url": "https://cdn/x.jpg",
            "error": null,
            "created_at": "2026-01-02T03:04:05.123456"
        }))
        .into_task(now);

        assert_eq!(task.id, "a");
        assert_eq!(task.created_at.date_naive().to_string(), "2026-01-02");
        assert_eq!(
            task.outcome(),
            TaskOutcome::Succeeded {
                video_url: "https://cdn/x.mp4",
                thumbnail_url: Some("https://cdn/x.jpg"),
            }
        );
        assert_eq!(task.progress(), None);
    }

    #[test]
    fn missing_created_at_uses_now() {
        let now = Utc.with_ymd_and_hms(2026, 5, 1, 12, 0, 0).unwrap();
        let task = record(json!({
            "task_id": "b",
            "status": "processing",
            "progress": 140,
            "video_url": null,
            "thumbnail_url": null,
            "error": null,
            "created_at": null
        }))
        .into_task(now);

        assert_eq!(task.created_at, now);
        assert_eq!(task.progress(), Some(100));
        assert_eq!(task.outcome(), TaskOutcome::Pending);
    }

    #[test]
    fn failed_task_reports_error() {
        let task = record(json!({
            "task_id": "c",
            "status": "failed",
            "error": "content policy"
        }))
        .into_task(Utc::now());

        assert_eq!(task.progress, 0);
        assert_eq!(task.outcome(), TaskOutcome::Failed("content policy"));
    }
}
