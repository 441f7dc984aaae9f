//! Idempotent startup seeding: room catalog, starter events, info pages and
//! the admin user. Safe to run on every boot.

use sqlx::PgPool;
use tracing::info;

use crate::auth::Role;
use crate::auth::service::hash_password;
use crate::config::AppConfig;

pub async fn seed_if_empty(db: &PgPool, config: &AppConfig) -> anyhow::Result<()> {
    seed_rooms(db).await?;
    seed_info_pages(db).await?;
    seed_events(db, &config.seed_admin_email).await?;
    seed_admin(db, config).await?;
    Ok(())
}

async fn seed_rooms(db: &PgPool) -> anyhow::Result<()> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rooms")
        .fetch_one(db)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let rooms: &[(&str, &str, &str, i64, i64)] = &[
        ("single", "Single Room A", "Private room, quiet.", 320, 1),
        ("shared", "Shared Room B", "Shared room for 2 students.", 220, 2),
        ("studio", "Studio C", "Studio with kitchenette.", 450, 1),
        ("shared", "Shared Room D", "Shared room for 3 students.", 180, 3),
    ];
    for (room_type, title, description, price_eur, capacity) in rooms {
        sqlx::query(
            r#"
            INSERT INTO rooms (type, title, description, price_eur, capacity, available)
            VALUES ($1, $2, $3, $4, $5, TRUE)
            "#,
        )
        .bind(room_type)
        .bind(title)
        .bind(description)
        .bind(price_eur)
        .bind(capacity)
        .execute(db)
        .await?;
    }
    info!(count = rooms.len(), "seeded room catalog");
    Ok(())
}

// Upsert by slug so new pages land even on a populated table.
async fn seed_info_pages(db: &PgPool) -> anyhow::Result<()> {
    let pages: &[(&str, &str, &str)] = &[
        (
            "arrival",
            "Arrival & Living Information",
            "WELCOME TO UNIVERSITY HOUSING\n\n\
             This page provides essential information for students arriving at the university \
             and living in university housing.\n\n\
             RULES\n\
             • No smoking inside rooms or buildings\n\
             • Quiet hours: 22:00 – 07:00\n\
             • Keep shared kitchens and bathrooms clean\n\
             • Guests only during the day (no overnight stays)\n\
             • Follow fire safety rules at all times\n\
             • Damage to rooms/facilities may result in extra costs\n\n\
             FACILITIES\n\
             • Furnished rooms (bed, desk, chair, wardrobe)\n\
             • Shared kitchens (depending on room type)\n\
             • Laundry room (washing machines & dryers)\n\
             • Study rooms and common areas\n\
             • Bicycle storage\n\
             • Waste separation & recycling points\n\
             • 24/7 building access for residents\n\n\
             SERVICES\n\
             • Housing administration support\n\
             • Maintenance and repair service\n\
             • Internet access in all rooms\n\
             • Orientation and social events\n\
             • Emergency support coordination\n\n\
             CONTACTS\n\
             • Housing Office: housing@uni-bayreuth.de\n\
             • Emergency: 112\n\n\
             IMPORTANT NOTES\n\
             • Room changes depend on admin settings\n\
             • Keep your university email active for official communication\n\
             • Check official announcements for updates\n",
        ),
        (
            "rules",
            "Dorm Rules",
            "• No smoking.\n• Quiet hours after 22:00.\n• Keep shared spaces clean.\n\
             • Respect other residents.\n• Follow fire safety instructions.\n",
        ),
        (
            "facilities",
            "Facilities",
            "• Laundry room.\n• Study room.\n• Bike storage.\n• 24/7 security.\n\
             • Common area / lounge.\n",
        ),
        (
            "services",
            "Services",
            "• Housing office support.\n• Maintenance & repairs.\n• Internet/Wi-Fi access.\n\
             • Orientation and dorm events.\n• Lost & found / front desk help (if available).\n",
        ),
        (
            "contacts",
            "Contacts",
            "Housing office: housing@uni-bayreuth.de\nEmergency: 112\n\
             Non-emergency (campus/security if applicable): ask housing office.\n",
        ),
    ];

    for (slug, title, content) in pages {
        sqlx::query(
            r#"
            INSERT INTO info_pages (slug, title, content)
            VALUES ($1, $2, $3)
            ON CONFLICT (slug) DO UPDATE SET
              title = excluded.title,
              content = excluded.content
            "#,
        )
        .bind(slug)
        .bind(title)
        .bind(content)
        .execute(db)
        .await?;
    }
    Ok(())
}

async fn seed_events(db: &PgPool, admin_email: &str) -> anyhow::Result<()> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM events")
        .fetch_one(db)
        .await?;
    if count > 0 {
        return Ok(());
    }

    let events: &[(&str, &str, &str, &str, &str, Option<i64>)] = &[
        (
            "Welcome Meetup",
            "orientation",
            "2026-02-01T18:00",
            "Main Hall",
            "Meet other students.",
            Some(50),
        ),
        (
            "Study Group: CS",
            "study_group",
            "2026-02-03T16:00",
            "Library",
            "Weekly CS study group.",
            None,
        ),
        (
            "Board Games Night",
            "social",
            "2026-02-05T19:00",
            "Common Room",
            "Bring your own games.",
            Some(20),
        ),
    ];
    for (title, category, date_time, location, description, quota) in events {
        sqlx::query(
            r#"
            INSERT INTO events (title, category, date_time, location, description, quota, created_by_email)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(title)
        .bind(category)
        .bind(date_time)
        .bind(location)
        .bind(description)
        .bind(quota)
        .bind(admin_email)
        .execute(db)
        .await?;
    }
    info!(count = events.len(), "seeded starter events");
    Ok(())
}

async fn seed_admin(db: &PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let existing: Option<(String,)> = sqlx::query_as("SELECT email FROM users WHERE email = $1")
        .bind(&config.seed_admin_email)
        .fetch_optional(db)
        .await?;
    if existing.is_some() {
        return Ok(());
    }

    let password_hash = hash_password(&config.seed_admin_password)?;
    sqlx::query("INSERT INTO users (email, password_hash, role) VALUES ($1, $2, $3)")
        .bind(&config.seed_admin_email)
        .bind(&password_hash)
        .bind(Role::Admin.as_str())
        .execute(db)
        .await?;
    info!(email = %config.seed_admin_email, "seeded admin user");
    Ok(())
}
