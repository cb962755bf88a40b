use std::collections::HashMap;

use chrono::Utc;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::models::{Author, Feature, NewOffer, Offer, OfferWithAuthor};

const OFFER_COLUMNS: &str = "o.id, o.title, o.description, o.publish_date, o.city, \
     o.preview_image, o.is_premium, o.rating, o.offer_type, o.rooms, o.guests, o.price, \
     o.features, o.latitude, o.longitude, o.author_id, \
     (SELECT COUNT(*) FROM reviews r WHERE r.offer_id = o.id) AS comments_count";

/// Number of columns produced by `OFFER_COLUMNS`; joined columns start here.
const OFFER_COLUMN_COUNT: usize = 17;

fn map_offer(row: &Row<'_>) -> rusqlite::Result<Offer> {
    let features_json: String = row.get(12)?;
    let features: Vec<Feature> = serde_json::from_str(&features_json)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(12, Type::Text, Box::new(e)))?;

    Ok(Offer {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        publish_date: row.get(3)?,
        city: row.get(4)?,
        preview_image: row.get(5)?,
        photos: Vec::new(),
        is_premium: row.get(6)?,
        rating: row.get(7)?,
        offer_type: row.get(8)?,
        rooms: row.get(9)?,
        guests: row.get(10)?,
        price: row.get(11)?,
        features,
        latitude: row.get(13)?,
        longitude: row.get(14)?,
        author_id: row.get(15)?,
        comments_count: row.get(16)?,
    })
}

fn map_offer_with_author(row: &Row<'_>) -> rusqlite::Result<OfferWithAuthor> {
    let offer = map_offer(row)?;
    let base = OFFER_COLUMN_COUNT;
    Ok(OfferWithAuthor {
        offer,
        author: Author {
            id: row.get(base)?,
            username: row.get(base + 1)?,
            avatar: row.get(base + 2)?,
            user_type: row.get(base + 3)?,
        },
    })
}

/// Insert an offer and its ordered photos atomically. Returns the new id.
pub fn insert(conn: &mut Connection, author_id: i64, offer: &NewOffer) -> rusqlite::Result<i64> {
    let features = serde_json::to_string(&offer.features)
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?;

    let tx = conn.transaction()?;
    tx.execute(
        "INSERT INTO offers (title, description, publish_date, city, preview_image, is_premium,
                             rating, offer_type, rooms, guests, price, features, latitude,
                             longitude, author_id)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
        params![
            offer.title,
            offer.description,
            Utc::now(),
            offer.city,
            offer.preview_image,
            offer.is_premium,
            offer.rating,
            offer.offer_type,
            offer.rooms,
            offer.guests,
            offer.price,
            features,
            offer.latitude,
            offer.longitude,
            author_id,
        ],
    )?;
    let offer_id = tx.last_insert_rowid();

    {
        let mut stmt = tx.prepare(
            "INSERT INTO offer_photos (offer_id, file_path, position) VALUES (?1, ?2, ?3)",
        )?;
        for (position, path) in offer.photos.iter().enumerate() {
            stmt.execute(params![offer_id, path, position as i64])?;
        }
    }

    tx.commit()?;
    Ok(offer_id)
}

pub fn exists(conn: &Connection, id: i64) -> rusqlite::Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM offers WHERE id = ?1",
        params![id],
        |row| row.get(0),
    )
}

pub fn find(conn: &Connection, id: i64) -> rusqlite::Result<Option<Offer>> {
    let offer = conn
        .query_row(
            &format!("SELECT {OFFER_COLUMNS} FROM offers o WHERE o.id = ?1"),
            params![id],
            map_offer,
        )
        .optional()?;

    match offer {
        Some(mut offer) => {
            offer.photos = photos_for(conn, offer.id)?;
            Ok(Some(offer))
        }
        None => Ok(None),
    }
}

pub fn find_with_author(conn: &Connection, id: i64) -> rusqlite::Result<Option<OfferWithAuthor>> {
    let found = conn
        .query_row(
            &format!(
                "SELECT {OFFER_COLUMNS}, u.id, u.username, u.avatar, u.user_type
                 FROM offers o
                 JOIN users u ON u.id = o.author_id
                 WHERE o.id = ?1"
            ),
            params![id],
            map_offer_with_author,
        )
        .optional()?;

    match found {
        Some(mut found) => {
            found.offer.photos = photos_for(conn, found.offer.id)?;
            Ok(Some(found))
        }
        None => Ok(None),
    }
}

/// All offers, newest first.
pub fn list_all(conn: &Connection) -> rusqlite::Result<Vec<Offer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OFFER_COLUMNS} FROM offers o ORDER BY o.publish_date DESC, o.id DESC"
    ))?;
    let offers = stmt
        .query_map([], map_offer)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    attach_photos(conn, offers)
}

/// Offers the user has favorited, most recently favorited first.
pub fn list_favorites(conn: &Connection, user_id: i64) -> rusqlite::Result<Vec<Offer>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {OFFER_COLUMNS}
         FROM favorites f
         JOIN offers o ON o.id = f.offer_id
         WHERE f.user_id = ?1
         ORDER BY f.created_at DESC, f.id DESC"
    ))?;
    let offers = stmt
        .query_map(params![user_id], map_offer)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    attach_photos(conn, offers)
}

fn photos_for(conn: &Connection, offer_id: i64) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT file_path FROM offer_photos WHERE offer_id = ?1 ORDER BY position ASC",
    )?;
    let photos = stmt
        .query_map(params![offer_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(photos)
}

fn attach_photos(conn: &Connection, mut offers: Vec<Offer>) -> rusqlite::Result<Vec<Offer>> {
    if offers.is_empty() {
        return Ok(offers);
    }

    let mut by_offer: HashMap<i64, Vec<String>> = HashMap::new();
    let mut stmt =
        conn.prepare("SELECT offer_id, file_path FROM offer_photos ORDER BY offer_id, position")?;
    let rows = stmt.query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;
    for row in rows {
        let (offer_id, path) = row?;
        by_offer.entry(offer_id).or_default().push(path);
    }

    for offer in &mut offers {
        offer.photos = by_offer.remove(&offer.id).unwrap_or_default();
    }
    Ok(offers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::{City, OfferType};
    use crate::db::testing::{insert_offer, insert_user, sample_offer, test_pool};

    #[test]
    fn insert_persists_photos_in_order() {
        let (_tmp, pool) = test_pool();
        let author = insert_user(&pool, "Host", "host@example.com");
        let mut conn = pool.get().unwrap();

        let mut offer = sample_offer("Sunny loft near the park");
        offer.photos = vec!["/static/3.jpg".into(), "/static/1.jpg".into(), "/static/2.jpg".into()];
        let id = insert(&mut conn, author, &offer).unwrap();

        let stored = find(&conn, id).unwrap().unwrap();
        assert_eq!(stored.photos, offer.photos);
        assert_eq!(stored.city, City::Amsterdam);
        assert_eq!(stored.offer_type, OfferType::Apartment);
        assert_eq!(stored.features, offer.features);
        assert_eq!(stored.author_id, author);
        assert_eq!(stored.comments_count, 0);
    }

    #[test]
    fn failed_insert_leaves_no_rows() {
        let (_tmp, pool) = test_pool();
        let mut conn = pool.get().unwrap();

        // Unknown author trips the foreign key inside the transaction.
        let result = insert(&mut conn, 404, &sample_offer("Orphan listing attempt"));
        assert!(result.is_err());

        let offers: i64 = conn
            .query_row("SELECT COUNT(*) FROM offers", [], |r| r.get(0))
            .unwrap();
        let photos: i64 = conn
            .query_row("SELECT COUNT(*) FROM offer_photos", [], |r| r.get(0))
            .unwrap();
        assert_eq!(offers, 0);
        assert_eq!(photos, 0);
    }

    #[test]
    fn find_with_author_joins_host() {
        let (_tmp, pool) = test_pool();
        let author = insert_user(&pool, "Oliver", "oliver@example.com");
        let id = insert_offer(&pool, author, "Cosy room in the old town");
        let conn = pool.get().unwrap();

        let found = find_with_author(&conn, id).unwrap().unwrap();
        assert_eq!(found.offer.id, id);
        assert_eq!(found.author.id, author);
        assert_eq!(found.author.username, "Oliver");
        assert_eq!(found.offer.photos.len(), 2);

        assert!(find_with_author(&conn, id + 100).unwrap().is_none());
    }

    #[test]
    fn list_all_returns_newest_first() {
        let (_tmp, pool) = test_pool();
        let author = insert_user(&pool, "Host", "host@example.com");
        let first = insert_offer(&pool, author, "First listing in town");
        let second = insert_offer(&pool, author, "Second listing in town");
        let conn = pool.get().unwrap();

        let ids: Vec<i64> = list_all(&conn).unwrap().iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![second, first]);
        assert!(exists(&conn, first).unwrap());
        assert!(!exists(&conn, 999).unwrap());
    }
}
