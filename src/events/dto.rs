use serde::{Deserialize, Serialize};

use crate::events::repo::EventWithCount;

/// Event read model. A null quota means unbounded: `remaining` stays null
/// and the event is never full.
#[derive(Debug, Serialize)]
pub struct EventDto {
    pub id: i64,
    pub title: String,
    pub category: String,
    pub date_time: String,
    pub location: String,
    pub description: String,
    pub quota: Option<i64>,
    pub registered_count: i64,
    pub remaining: Option<i64>,
    pub is_full: bool,
}

impl From<EventWithCount> for EventDto {
    fn from(e: EventWithCount) -> Self {
        let (remaining, is_full) = match e.quota {
            None => (None, false),
            Some(quota) => {
                let left = (quota - e.registered_count).max(0);
                (Some(left), left == 0)
            }
        };
        Self {
            id: e.id,
            title: e.title,
            category: e.category,
            date_time: e.date_time,
            location: e.location,
            description: e.description,
            quota: e.quota,
            registered_count: e.registered_count,
            remaining,
            is_full,
        }
    }
}

/// Page query for the event listing.
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_page_size")]
    pub page_size: i64,
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    4
}

impl PageQuery {
    /// Clamp out-of-range values and derive the SQL offset. The offset
    /// saturates, so an absurd page number yields an empty page instead of
    /// overflowing.
    pub fn clamped(self) -> (i64, i64, i64) {
        let page = self.page.max(1);
        let page_size = if self.page_size < 1 || self.page_size > 50 {
            default_page_size()
        } else {
            self.page_size
        };
        let offset = page.saturating_sub(1).saturating_mul(page_size);
        (page, page_size, offset)
    }
}

#[derive(Debug, Serialize)]
pub struct EventPage {
    pub items: Vec<EventDto>,
    pub page: i64,
    pub page_size: i64,
    pub has_prev: bool,
    pub has_next: bool,
    pub total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(quota: Option<i64>, registered: i64) -> EventWithCount {
        EventWithCount {
            id: 1,
            title: "Board Games Night".into(),
            category: "social".into(),
            date_time: "2026-02-05T19:00".into(),
            location: "Common Room".into(),
            description: "Bring your own games.".into(),
            quota,
            registered_count: registered,
        }
    }

    #[test]
    fn bounded_event_derives_remaining() {
        let dto = EventDto::from(event(Some(20), 5));
        assert_eq!(dto.remaining, Some(15));
        assert!(!dto.is_full);
    }

    #[test]
    fn bounded_event_at_quota_is_full() {
        let dto = EventDto::from(event(Some(20), 20));
        assert_eq!(dto.remaining, Some(0));
        assert!(dto.is_full);
    }

    #[test]
    fn unbounded_event_is_never_full() {
        let dto = EventDto::from(event(None, 100_000));
        assert_eq!(dto.remaining, None);
        assert!(!dto.is_full);
    }

    #[test]
    fn page_query_clamps_out_of_range_values() {
        let q = PageQuery {
            page: 0,
            page_size: 200,
        };
        assert_eq!(q.clamped(), (1, 4, 0));

        let q = PageQuery {
            page: 3,
            page_size: 10,
        };
        assert_eq!(q.clamped(), (3, 10, 20));
    }

    #[test]
    fn huge_page_number_saturates_instead_of_overflowing() {
        let q = PageQuery {
            page: i64::MAX,
            page_size: 50,
        };
        let (page, page_size, offset) = q.clamped();
        assert_eq!(page, i64::MAX);
        assert_eq!(page_size, 50);
        assert_eq!(offset, i64::MAX);
    }
}
