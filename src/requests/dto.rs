use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::AppError;
use crate::requests::repo::EventRequestRow;

pub const CATEGORIES: &[&str] = &["social", "orientation", "study_group"];

/// Request lifecycle: pending -> accepted | rejected. Accepted requests
/// have a materialized Event; re-accepting is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    Pending,
    Accepted,
    Rejected,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Accepted => "accepted",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<RequestStatus> {
        match s {
            "pending" => Some(RequestStatus::Pending),
            "accepted" => Some(RequestStatus::Accepted),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

/// Student-submitted proposal fields.
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub date_time: String,
    #[serde(default)]
    pub location: String,
    #[serde(default)]
    pub description: String,
    pub quota: Option<i64>,
}

impl SubmitRequest {
    /// Trim and validate before anything touches the store.
    pub fn validated(mut self) -> Result<SubmitRequest, AppError> {
        self.title = self.title.trim().to_string();
        self.category = self.category.trim().to_string();
        self.date_time = self.date_time.trim().to_string();
        self.location = self.location.trim().to_string();
        self.description = self.description.trim().to_string();

        if self.title.is_empty()
            || !CATEGORIES.contains(&self.category.as_str())
            || self.date_time.is_empty()
            || self.location.is_empty()
            || self.description.is_empty()
        {
            return Err(AppError::Validation("Invalid request fields".into()));
        }
        if let Some(quota) = self.quota {
            if quota < 0 {
                return Err(AppError::Validation("Quota must be non-negative".into()));
            }
        }
        Ok(self)
    }
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default)]
    pub comment: String,
}

#[derive(Debug, Deserialize)]
pub struct StatusQuery {
    pub status: Option<String>,
}

/// Student-facing view of their own request.
#[derive(Debug, Serialize)]
pub struct EventRequestDto {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub date_time: String,
    pub location: String,
    pub description: String,
    pub quota: Option<i64>,
    pub status: String,
    pub admin_comment: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<EventRequestRow> for EventRequestDto {
    fn from(r: EventRequestRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            category: r.category,
            date_time: r.date_time,
            location: r.location,
            description: r.description,
            quota: r.quota,
            status: r.status,
            admin_comment: r.admin_comment,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

/// Admin-facing view; also names the requester.
#[derive(Debug, Serialize)]
pub struct AdminEventRequestDto {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub date_time: String,
    pub location: String,
    pub description: String,
    pub quota: Option<i64>,
    pub requested_by_email: String,
    pub status: String,
    pub admin_comment: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl From<EventRequestRow> for AdminEventRequestDto {
    fn from(r: EventRequestRow) -> Self {
        Self {
            id: r.id,
            title: r.title,
            category: r.category,
            date_time: r.date_time,
            location: r.location,
            description: r.description,
            quota: r.quota,
            requested_by_email: r.requested_by_email,
            status: r.status,
            admin_comment: r.admin_comment,
            created_at: r.created_at,
            updated_at: r.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn submit() -> SubmitRequest {
        SubmitRequest {
            title: "Movie Night".into(),
            category: "social".into(),
            date_time: "2026-03-01T20:00".into(),
            location: "Common Room".into(),
            description: "Popcorn provided.".into(),
            quota: Some(30),
        }
    }

    #[test]
    fn valid_submission_passes() {
        assert!(submit().validated().is_ok());
    }

    #[test]
    fn blank_fields_are_rejected() {
        let mut s = submit();
        s.title = "   ".into();
        assert!(s.validated().is_err());

        let mut s = submit();
        s.location = String::new();
        assert!(s.validated().is_err());
    }

    #[test]
    fn unknown_category_is_rejected() {
        let mut s = submit();
        s.category = "party".into();
        assert!(s.validated().is_err());
    }

    #[test]
    fn negative_quota_is_rejected_null_allowed() {
        let mut s = submit();
        s.quota = Some(-1);
        assert!(s.validated().is_err());

        let mut s = submit();
        s.quota = None;
        assert!(s.validated().is_ok());
    }

    #[test]
    fn status_round_trips() {
        for s in ["pending", "accepted", "rejected"] {
            assert_eq!(RequestStatus::parse(s).unwrap().as_str(), s);
        }
        assert_eq!(RequestStatus::parse("cancelled"), None);
    }
}
