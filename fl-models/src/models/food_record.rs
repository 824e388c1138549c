//! Food record entity model.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use tracing::debug;

use fl_core::error::{FlError, FlResult};
use fl_core::time;

/// Where a meal was logged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
    /// Radius of the fix in meters. Documents without it read as 0.
    #[serde(default)]
    pub accuracy: f64,
}

/// Binary photo payload together with its MIME type.
#[derive(Clone, PartialEq, Eq)]
pub struct Photo {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl Photo {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    /// Payload size in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

// Photos are large; keep Debug output readable.
impl fmt::Debug for Photo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Photo")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// A persisted food diary entry.
///
/// `created_at` is fixed when the record is first stored; `updated_at`
/// moves forward by at least a millisecond on every mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct FoodRecord {
    pub id: i64,
    pub photo: Photo,
    pub comment: String,
    pub tags: Vec<String>,
    pub location: Option<Location>,
    /// When the meal happened.
    pub timestamp: DateTime<Utc>,
    pub favorite: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A record that has not been stored yet and so has no id or audit times.
#[derive(Debug, Clone, PartialEq)]
pub struct NewFoodRecord {
    pub photo: Photo,
    pub comment: String,
    pub tags: Vec<String>,
    pub location: Option<Location>,
    pub timestamp: DateTime<Utc>,
    pub favorite: bool,
}

impl NewFoodRecord {
    /// Start a record for `photo` taken at `timestamp` with no comment, tags or location.
    pub fn new(photo: Photo, timestamp: DateTime<Utc>) -> Self {
        Self {
            photo,
            comment: String::new(),
            tags: Vec::new(),
            location: None,
            timestamp,
            favorite: false,
        }
    }
}

/// Partial update merged into an existing record. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FoodRecordUpdate {
    pub photo: Option<Photo>,
    pub comment: Option<String>,
    pub tags: Option<Vec<String>>,
    /// `Some(None)` clears the location.
    pub location: Option<Option<Location>>,
    pub timestamp: Option<DateTime<Utc>>,
    pub favorite: Option<bool>,
}

impl FoodRecordUpdate {
    pub fn is_empty(&self) -> bool {
        self.photo.is_none()
            && self.comment.is_none()
            && self.tags.is_none()
            && self.location.is_none()
            && self.timestamp.is_none()
            && self.favorite.is_none()
    }
}

/// Read a millisecond epoch column, reporting the column's own index when
/// the value is out of range.
fn instant_column(row: &Row<'_>, column: &str) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(column)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        let idx = row.as_ref().column_index(column).unwrap_or_default();
        rusqlite::Error::IntegralValueOutOfRange(idx, millis)
    })
}

impl FoodRecord {
    /// Construct a FoodRecord from a database row.
    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let tags_json: String = row.get("tags")?;
        let tags: Vec<String> = serde_json::from_str(&tags_json).map_err(|e| {
            let idx = row.as_ref().column_index("tags").unwrap_or_default();
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })?;

        let lat: Option<f64> = row.get("location_lat")?;
        let lng: Option<f64> = row.get("location_lng")?;
        let location = match (lat, lng) {
            (Some(lat), Some(lng)) => Some(Location {
                lat,
                lng,
                accuracy: row.get::<_, Option<f64>>("location_accuracy")?.unwrap_or(0.0),
            }),
            _ => None,
        };

        Ok(Self {
            id: row.get("id")?,
            photo: Photo {
                bytes: row.get("photo")?,
                mime_type: row.get("photo_type")?,
            },
            comment: row.get("comment")?,
            tags,
            location,
            timestamp: instant_column(row, "timestamp_ms")?,
            favorite: row.get("favorite")?,
            created_at: instant_column(row, "created_at_ms")?,
            updated_at: instant_column(row, "updated_at_ms")?,
        })
    }

    // ─── Static finders ──────────────────────────────────────────────────

    /// Find a record by its id.
    pub fn find_by_id(conn: &Connection, id: i64) -> FlResult<Option<Self>> {
        match conn.query_row("SELECT * FROM food_records WHERE id = ?1", [id], Self::from_row) {
            Ok(r) => Ok(Some(r)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(FlError::from(e)),
        }
    }

    /// Whether a record with this id exists.
    pub fn exists(conn: &Connection, id: i64) -> FlResult<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM food_records WHERE id = ?1",
            [id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    // ─── Persistence ─────────────────────────────────────────────────────

    /// Insert a new record stamped with `now`. Returns the assigned id.
    pub fn insert(conn: &Connection, record: &NewFoodRecord, now: DateTime<Utc>) -> FlResult<i64> {
        if record.photo.is_empty() {
            return Err(FlError::Storage("record photo must not be empty".into()));
        }

        let now = time::truncate_millis(now);
        let tags_json = serde_json::to_string(&record.tags)?;

        conn.execute(
            "INSERT INTO food_records (
                photo, photo_type, comment, tags,
                location_lat, location_lng, location_accuracy,
                timestamp_ms, favorite, created_at_ms, updated_at_ms
            ) VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?10)",
            params![
                record.photo.bytes,
                record.photo.mime_type,
                record.comment,
                tags_json,
                record.location.map(|l| l.lat),
                record.location.map(|l| l.lng),
                record.location.map(|l| l.accuracy),
                record.timestamp.timestamp_millis(),
                record.favorite,
                now.timestamp_millis(),
            ],
        )?;

        let id = conn.last_insert_rowid();
        write_tags(conn, id, &record.tags)?;
        debug!(id, tags = record.tags.len(), "inserted food record");
        Ok(id)
    }

    /// Merge `update` into the stored record and refresh `updated_at`.
    ///
    /// Fails with `NotFound` when no record has this id.
    pub fn update(
        conn: &Connection,
        id: i64,
        update: &FoodRecordUpdate,
        now: DateTime<Utc>,
    ) -> FlResult<Self> {
        let mut record = Self::find_by_id(conn, id)?
            .ok_or_else(|| FlError::NotFound(format!("food record {id}")))?;

        if let Some(ref photo) = update.photo {
            if photo.is_empty() {
                return Err(FlError::Storage("record photo must not be empty".into()));
            }
            record.photo = photo.clone();
        }
        if let Some(ref comment) = update.comment {
            record.comment = comment.clone();
        }
        if let Some(ref tags) = update.tags {
            record.tags = tags.clone();
        }
        if let Some(location) = update.location {
            record.location = location;
        }
        if let Some(timestamp) = update.timestamp {
            record.timestamp = time::truncate_millis(timestamp);
        }
        if let Some(favorite) = update.favorite {
            record.favorite = favorite;
        }
        record.updated_at = time::truncate_millis(now).max(record.updated_at + Duration::milliseconds(1));

        conn.execute(
            "UPDATE food_records SET
                photo = ?1, photo_type = ?2, comment = ?3, tags = ?4,
                location_lat = ?5, location_lng = ?6, location_accuracy = ?7,
                timestamp_ms = ?8, favorite = ?9, updated_at_ms = ?10
            WHERE id = ?11",
            params![
                record.photo.bytes,
                record.photo.mime_type,
                record.comment,
                serde_json::to_string(&record.tags)?,
                record.location.map(|l| l.lat),
                record.location.map(|l| l.lng),
                record.location.map(|l| l.accuracy),
                record.timestamp.timestamp_millis(),
                record.favorite,
                record.updated_at.timestamp_millis(),
                id,
            ],
        )?;

        if update.tags.is_some() {
            write_tags(conn, id, &record.tags)?;
        }

        Ok(record)
    }

    /// Flip the favorite flag. Returns the new value.
    pub fn toggle_favorite(conn: &Connection, id: i64, now: DateTime<Utc>) -> FlResult<bool> {
        let current: bool = match conn.query_row(
            "SELECT favorite FROM food_records WHERE id = ?1",
            [id],
            |row| row.get(0),
        ) {
            Ok(v) => v,
            Err(rusqlite::Error::QueryReturnedNoRows) => {
                return Err(FlError::NotFound(format!("food record {id}")));
            }
            Err(e) => return Err(FlError::from(e)),
        };

        let update = FoodRecordUpdate {
            favorite: Some(!current),
            ..Default::default()
        };
        Self::update(conn, id, &update, now)?;
        Ok(!current)
    }

    /// Permanently delete a record. Returns `false` if it did not exist.
    pub fn delete(conn: &Connection, id: i64) -> FlResult<bool> {
        conn.execute("DELETE FROM record_tags WHERE record_id = ?1", [id])?;
        let changed = conn.execute("DELETE FROM food_records WHERE id = ?1", [id])?;
        Ok(changed > 0)
    }

    // ─── Computed properties ─────────────────────────────────────────────

    /// Whether the record carries `tag` (exact match).
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Case-insensitive substring match over the comment.
    pub fn comment_contains(&self, needle: &str) -> bool {
        self.comment.to_lowercase().contains(&needle.to_lowercase())
    }

    /// Drop the store-managed fields, e.g. to re-insert a copy.
    pub fn to_new(&self) -> NewFoodRecord {
        NewFoodRecord {
            photo: self.photo.clone(),
            comment: self.comment.clone(),
            tags: self.tags.clone(),
            location: self.location,
            timestamp: self.timestamp,
            favorite: self.favorite,
        }
    }
}

/// Replace the tag index rows of one record.
fn write_tags(conn: &Connection, id: i64, tags: &[String]) -> FlResult<()> {
    conn.execute("DELETE FROM record_tags WHERE record_id = ?1", [id])?;
    let mut stmt = conn.prepare_cached(
        "INSERT INTO record_tags (record_id, position, tag) VALUES (?1, ?2, ?3)",
    )?;
    for (position, tag) in tags.iter().enumerate() {
        stmt.execute(params![id, position as i64, tag])?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use crate::schema;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys=ON;").unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    fn sample() -> NewFoodRecord {
        NewFoodRecord {
            photo: Photo::new(vec![0xFF, 0xD8, 0xFF], "image/jpeg"),
            comment: "Tonkotsu Ramen".into(),
            tags: vec!["lunch".into(), "ramen".into(), "lunch".into()],
            location: Some(Location { lat: 35.68, lng: 139.76, accuracy: 12.0 }),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 15, 12, 30, 0).unwrap(),
            favorite: false,
        }
    }

    #[test]
    fn test_insert_and_find() {
        let conn = setup_db();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap();
        let id = FoodRecord::insert(&conn, &sample(), now).unwrap();

        let found = FoodRecord::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.to_new(), sample());
        assert_eq!(found.created_at, now);
        assert_eq!(found.updated_at, now);
    }

    #[test]
    fn test_out_of_range_instant_names_its_column() {
        let conn = setup_db();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap();
        let id = FoodRecord::insert(&conn, &sample(), now).unwrap();
        conn.execute("UPDATE food_records SET updated_at_ms = ?1 WHERE id = ?2", params![i64::MAX, id])
            .unwrap();

        let err = conn
            .query_row("SELECT * FROM food_records WHERE id = ?1", [id], FoodRecord::from_row)
            .unwrap_err();
        match err {
            rusqlite::Error::IntegralValueOutOfRange(idx, value) => {
                assert_eq!(idx, 11);
                assert_eq!(value, i64::MAX);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_accuracy_reads_as_zero() {
        let conn = setup_db();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap();
        let id = FoodRecord::insert(&conn, &sample(), now).unwrap();
        conn.execute("UPDATE food_records SET location_accuracy = NULL WHERE id = ?1", [id]).unwrap();

        let found = FoodRecord::find_by_id(&conn, id).unwrap().unwrap();
        assert_eq!(found.location, Some(Location { lat: 35.68, lng: 139.76, accuracy: 0.0 }));
    }

    #[test]
    fn test_find_missing_returns_none() {
        let conn = setup_db();
        assert!(FoodRecord::find_by_id(&conn, 99).unwrap().is_none());
    }

    #[test]
    fn test_insert_rejects_empty_photo() {
        let conn = setup_db();
        let mut record = sample();
        record.photo.bytes.clear();
        assert!(matches!(
            FoodRecord::insert(&conn, &record, Utc::now()),
            Err(FlError::Storage(_))
        ));
    }

    #[test]
    fn test_update_merges_and_refreshes() {
        let conn = setup_db();
        let created = Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap();
        let id = FoodRecord::insert(&conn, &sample(), created).unwrap();

        let update = FoodRecordUpdate {
            comment: Some("Shoyu Ramen".into()),
            location: Some(None),
            ..Default::default()
        };
        let later = created + Duration::minutes(5);
        let updated = FoodRecord::update(&conn, id, &update, later).unwrap();

        assert_eq!(updated.comment, "Shoyu Ramen");
        assert!(updated.location.is_none());
        assert_eq!(updated.tags, sample().tags);
        assert_eq!(updated.created_at, created);
        assert_eq!(updated.updated_at, later);
    }

    #[test]
    fn test_update_always_advances_updated_at() {
        let conn = setup_db();
        let created = Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap();
        let id = FoodRecord::insert(&conn, &sample(), created).unwrap();

        let update = FoodRecordUpdate { favorite: Some(true), ..Default::default() };
        let earlier = created - Duration::hours(1);
        let updated = FoodRecord::update(&conn, id, &update, earlier).unwrap();
        assert_eq!(updated.updated_at, created + Duration::milliseconds(1));

        // Same clock reading as the previous mutation.
        let again = FoodRecord::update(&conn, id, &update, created).unwrap();
        assert_eq!(again.updated_at, created + Duration::milliseconds(2));
        assert!(again.updated_at >= again.created_at);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let conn = setup_db();
        let result = FoodRecord::update(&conn, 7, &FoodRecordUpdate::default(), Utc::now());
        assert!(matches!(result, Err(FlError::NotFound(_))));
    }

    #[test]
    fn test_toggle_favorite_twice() {
        let conn = setup_db();
        let now = Utc.with_ymd_and_hms(2024, 1, 15, 13, 0, 0).unwrap();
        let id = FoodRecord::insert(&conn, &sample(), now).unwrap();

        assert!(FoodRecord::toggle_favorite(&conn, id, now).unwrap());
        let first = FoodRecord::find_by_id(&conn, id).unwrap().unwrap();
        assert!(first.updated_at > first.created_at);

        assert!(!FoodRecord::toggle_favorite(&conn, id, now).unwrap());
        let second = FoodRecord::find_by_id(&conn, id).unwrap().unwrap();
        assert!(!second.favorite);
        assert!(second.updated_at > first.updated_at);
    }

    #[test]
    fn test_delete_removes_tags() {
        let conn = setup_db();
        let id = FoodRecord::insert(&conn, &sample(), Utc::now()).unwrap();
        assert!(FoodRecord::delete(&conn, id).unwrap());
        assert!(!FoodRecord::delete(&conn, id).unwrap());

        let tag_rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM record_tags", [], |row| row.get(0))
            .unwrap();
        assert_eq!(tag_rows, 0);
    }

    #[test]
    fn test_comment_contains_is_case_insensitive() {
        let conn = setup_db();
        let id = FoodRecord::insert(&conn, &sample(), Utc::now()).unwrap();
        let record = FoodRecord::find_by_id(&conn, id).unwrap().unwrap();
        assert!(record.comment_contains("RAMEN"));
        assert!(!record.comment_contains("sushi"));
        assert!(record.has_tag("ramen"));
    }

    #[test]
    fn test_photo_debug_hides_bytes() {
        let photo = Photo::new(vec![1, 2, 3], "image/png");
        let dbg = format!("{photo:?}");
        assert!(dbg.contains("len: 3"));
        assert!(!dbg.contains("[1, 2, 3]"));
    }
}
