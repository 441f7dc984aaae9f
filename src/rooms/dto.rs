use serde::Serialize;

use crate::rooms::repo::RoomWithCount;

/// Room read model. `remaining` and `is_full` are always derived from the
/// live booking count, never stored.
#[derive(Debug, Serialize)]
pub struct RoomDto {
    pub id: i64,
    #[serde(rename = "type")]
    pub room_type: String,
    pub title: String,
    pub description: String,
    pub price_eur: i64,
    pub capacity: i64,
    pub available: bool,
    pub booked_count: i64,
    pub remaining: i64,
    pub is_full: bool,
}

impl From<RoomWithCount> for RoomDto {
    fn from(r: RoomWithCount) -> Self {
        let remaining = (r.capacity - r.booked_count).max(0);
        Self {
            id: r.id,
            room_type: r.room_type,
            title: r.title,
            description: r.description,
            price_eur: r.price_eur,
            capacity: r.capacity,
            available: r.available,
            booked_count: r.booked_count,
            remaining,
            is_full: remaining == 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn room(capacity: i64, booked: i64) -> RoomWithCount {
        RoomWithCount {
            id: 1,
            room_type: "single".into(),
            title: "Single Room A".into(),
            description: "Private room, quiet.".into(),
            price_eur: 320,
            capacity,
            available: true,
            booked_count: booked,
        }
    }

    #[test]
    fn remaining_is_capacity_minus_booked() {
        let dto = RoomDto::from(room(3, 1));
        assert_eq!(dto.remaining, 2);
        assert!(!dto.is_full);
    }

    #[test]
    fn full_room_has_zero_remaining() {
        let dto = RoomDto::from(room(2, 2));
        assert_eq!(dto.remaining, 0);
        assert!(dto.is_full);
    }

    #[test]
    fn overbooked_room_clamps_to_zero() {
        let dto = RoomDto::from(room(1, 3));
        assert_eq!(dto.remaining, 0);
        assert!(dto.is_full);
    }

    #[test]
    fn type_field_serializes_as_type() {
        let json = serde_json::to_value(RoomDto::from(room(1, 0))).unwrap();
        assert_eq!(json["type"], "single");
        assert_eq!(json["remaining"], 1);
    }
}
