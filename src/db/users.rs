use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{NewUser, User};

const USER_COLUMNS: &str =
    "id, username, email, password_hash, user_type, avatar, created_at, updated_at";

fn map_user(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        user_type: row.get(4)?,
        avatar: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// Insert a user and return its id. Unique violations on email or username
/// surface as constraint errors for the caller to classify.
pub fn insert(conn: &Connection, user: &NewUser) -> rusqlite::Result<i64> {
    let now = Utc::now();
    conn.execute(
        "INSERT INTO users (username, email, password_hash, user_type, avatar, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
        params![
            user.username,
            user.email,
            user.password_hash,
            user.user_type,
            user.avatar,
            now
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn find_by_id(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
        params![id],
        map_user,
    )
    .optional()
}

pub fn find_by_email(conn: &Connection, email: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
        params![email],
        map_user,
    )
    .optional()
}

pub fn email_taken(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE email = ?1",
        params![email],
        |row| row.get(0),
    )
}

pub fn username_taken(conn: &Connection, username: &str) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM users WHERE username = ?1",
        params![username],
        |row| row.get(0),
    )
}

/// Which unique user column a failed insert collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Duplicate {
    Email,
    Username,
}

/// Classify a unique violation from [`insert`]. `None` for anything else.
pub fn duplicate_of(err: &rusqlite::Error) -> Option<Duplicate> {
    match err {
        rusqlite::Error::SqliteFailure(e, Some(msg))
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE =>
        {
            if msg.contains("users.username") {
                Some(Duplicate::Username)
            } else if msg.contains("users.email") {
                Some(Duplicate::Email)
            } else {
                None
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::is_constraint_violation;
    use crate::db::models::UserType;
    use crate::db::testing::test_pool;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            password_hash: "$2b$04$hash".to_string(),
            user_type: UserType::Pro,
            avatar: "/static/me.png".to_string(),
        }
    }

    #[test]
    fn insert_and_find_user() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        let id = insert(&conn, &new_user("Angelina", "angelina@example.com")).unwrap();

        let by_id = find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(by_id.username, "Angelina");
        assert_eq!(by_id.user_type, UserType::Pro);
        assert_eq!(by_id.avatar.as_deref(), Some("/static/me.png"));

        let by_email = find_by_email(&conn, "angelina@example.com").unwrap().unwrap();
        assert_eq!(by_email.id, id);
        assert!(email_taken(&conn, "angelina@example.com").unwrap());
        assert!(!email_taken(&conn, "other@example.com").unwrap());
    }

    #[test]
    fn missing_user_is_none() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        assert!(find_by_id(&conn, 42).unwrap().is_none());
        assert!(find_by_email(&conn, "nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn duplicate_email_is_constraint_violation() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        insert(&conn, &new_user("First", "dup@example.com")).unwrap();
        let err = insert(&conn, &new_user("Second", "dup@example.com")).unwrap_err();
        assert!(is_constraint_violation(&err));
        assert_eq!(duplicate_of(&err), Some(Duplicate::Email));
    }

    #[test]
    fn duplicate_username_is_told_apart_from_email() {
        let (_tmp, pool) = test_pool();
        let conn = pool.get().unwrap();
        insert(&conn, &new_user("Same Name", "first@example.com")).unwrap();
        assert!(username_taken(&conn, "Same Name").unwrap());
        assert!(!username_taken(&conn, "Other Name").unwrap());

        let err = insert(&conn, &new_user("Same Name", "second@example.com")).unwrap_err();
        assert_eq!(duplicate_of(&err), Some(Duplicate::Username));
    }
}
