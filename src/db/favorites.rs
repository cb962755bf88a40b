use std::collections::HashSet;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};

use super::is_constraint_violation;
use super::models::Favorite;

#[derive(Debug, thiserror::Error)]
pub enum FavoriteError {
    #[error("offer already in favorites")]
    AlreadyExists,

    #[error("offer not in favorites")]
    NotFound,

    #[error(transparent)]
    Sql(#[from] rusqlite::Error),
}

/// Add (user, offer). The UNIQUE index decides concurrent duplicates.
pub fn add(conn: &Connection, user_id: i64, offer_id: i64) -> Result<Favorite, FavoriteError> {
    let created_at = Utc::now();
    match conn.execute(
        "INSERT INTO favorites (user_id, offer_id, created_at) VALUES (?1, ?2, ?3)",
        params![user_id, offer_id, created_at],
    ) {
        Ok(_) => Ok(Favorite {
            user_id,
            offer_id,
            created_at,
        }),
        // A foreign key failure is also a constraint violation; only an
        // existing row means duplicate.
        Err(e) if is_constraint_violation(&e) => {
            if contains(conn, user_id, offer_id)? {
                Err(FavoriteError::AlreadyExists)
            } else {
                Err(e.into())
            }
        }
        Err(e) => Err(e.into()),
    }
}

/// Remove (user, offer). Removing a pair that was never added is an error.
pub fn remove(conn: &Connection, user_id: i64, offer_id: i64) -> Result<(), FavoriteError> {
    let rows = conn.execute(
        "DELETE FROM favorites WHERE user_id = ?1 AND offer_id = ?2",
        params![user_id, offer_id],
    )?;
    if rows == 0 {
        return Err(FavoriteError::NotFound);
    }
    Ok(())
}

pub fn contains(conn: &Connection, user_id: i64, offer_id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT 1 FROM favorites WHERE user_id = ?1 AND offer_id = ?2",
        params![user_id, offer_id],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

pub fn offer_ids(conn: &Connection, user_id: i64) -> rusqlite::Result<HashSet<i64>> {
    let mut stmt = conn.prepare("SELECT offer_id FROM favorites WHERE user_id = ?1")?;
    let ids = stmt
        .query_map(params![user_id], |row| row.get(0))?
        .collect::<rusqlite::Result<HashSet<i64>>>()?;
    Ok(ids)
}
