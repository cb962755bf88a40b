use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Author, Review, ReviewWithAuthor};

const REVIEW_COLUMNS: &str = "r.id, r.text, r.rating, r.publish_date, r.author_id, r.offer_id, \
     u.id, u.username, u.avatar, u.user_type";

fn map_review(row: &Row<'_>) -> rusqlite::Result<ReviewWithAuthor> {
    Ok(ReviewWithAuthor {
        review: Review {
            id: row.get(0)?,
            text: row.get(1)?,
            rating: row.get(2)?,
            publish_date: row.get(3)?,
            author_id: row.get(4)?,
            offer_id: row.get(5)?,
        },
        author: Author {
            id: row.get(6)?,
            username: row.get(7)?,
            avatar: row.get(8)?,
            user_type: row.get(9)?,
        },
    })
}

pub fn insert(
    conn: &Connection,
    author_id: i64,
    offer_id: i64,
    text: &str,
    rating: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO reviews (text, rating, publish_date, author_id, offer_id)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![text, rating, Utc::now(), author_id, offer_id],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_with_author(conn: &Connection, id: i64) -> rusqlite::Result<Option<ReviewWithAuthor>> {
    conn.query_row(
        &format!(
            "SELECT {REVIEW_COLUMNS}
             FROM reviews r
             JOIN users u ON u.id = r.author_id
             WHERE r.id = ?1"
        ),
        params![id],
        map_review,
    )
    .optional()
}

/// Reviews of one offer, newest first.
pub fn list_for_offer(conn: &Connection, offer_id: i64) -> rusqlite::Result<Vec<ReviewWithAuthor>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {REVIEW_COLUMNS}
         FROM reviews r
         JOIN users u ON u.id = r.author_id
         WHERE r.offer_id = ?1
         ORDER BY r.publish_date DESC, r.id DESC"
    ))?;
    let reviews = stmt
        .query_map(params![offer_id], map_review)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(reviews)
}
