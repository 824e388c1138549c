//! Query builders for common record access patterns.
//!
//! All queries use parameterized SQL and return domain model types. Results
//! are ordered newest first by meal timestamp; ties fall back to id so the
//! order is stable.

use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params_from_iter, Connection};
use serde::{Deserialize, Serialize};
use tracing::debug;

use fl_core::error::{FlError, FlResult};

use crate::models::food_record::FoodRecord;

/// Criteria for [`search_records`]. Every field is optional and all supplied
/// criteria must hold.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchFilters {
    /// Inclusive lower bound on the meal timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_from: Option<DateTime<Utc>>,
    /// Inclusive upper bound on the meal timestamp.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_to: Option<DateTime<Utc>>,
    /// A record matches only if it carries every one of these tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Case-insensitive substring over the comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_text: Option<String>,
    #[serde(default)]
    pub favorites_only: bool,
}

impl SearchFilters {
    /// Whether no criterion is set, i.e. the filter matches every record.
    pub fn is_empty(&self) -> bool {
        self.date_from.is_none()
            && self.date_to.is_none()
            && self.tags.is_empty()
            && self.search_text.as_deref().map_or(true, str::is_empty)
            && !self.favorites_only
    }
}

const ORDER_NEWEST_FIRST: &str = "ORDER BY timestamp_ms DESC, id DESC";

/// All records, newest first.
pub fn list_records(conn: &Connection) -> FlResult<Vec<FoodRecord>> {
    let sql = format!("SELECT * FROM food_records {ORDER_NEWEST_FIRST}");
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], FoodRecord::from_row)?;
    rows.collect::<Result<Vec<_>, _>>().map_err(FlError::from)
}

/// Records matching every supplied criterion, newest first.
///
/// Favorites, tags and the date range are evaluated in SQL; the comment text
/// match is applied last, over the already narrowed set.
pub fn search_records(conn: &Connection, filters: &SearchFilters) -> FlResult<Vec<FoodRecord>> {
    let mut clauses: Vec<String> = Vec::new();
    let mut values: Vec<Value> = Vec::new();

    if filters.favorites_only {
        clauses.push("favorite = 1".into());
    }

    if let Some(from) = filters.date_from {
        values.push(Value::Integer(from.timestamp_millis()));
        clauses.push(format!("timestamp_ms >= ?{}", values.len()));
    }
    if let Some(to) = filters.date_to {
        values.push(Value::Integer(to.timestamp_millis()));
        clauses.push(format!("timestamp_ms <= ?{}", values.len()));
    }

    let mut wanted: Vec<&str> = filters.tags.iter().map(String::as_str).collect();
    wanted.sort_unstable();
    wanted.dedup();
    if !wanted.is_empty() {
        let mut placeholders = Vec::with_capacity(wanted.len());
        for tag in &wanted {
            values.push(Value::Text((*tag).to_string()));
            placeholders.push(format!("?{}", values.len()));
        }
        values.push(Value::Integer(wanted.len() as i64));
        clauses.push(format!(
            "id IN (SELECT record_id FROM record_tags WHERE tag IN ({}) \
             GROUP BY record_id HAVING COUNT(DISTINCT tag) = ?{})",
            placeholders.join(", "),
            values.len()
        ));
    }

    let where_clause = if clauses.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", clauses.join(" AND "))
    };
    let sql = format!("SELECT * FROM food_records {where_clause} {ORDER_NEWEST_FIRST}");
    debug!(%sql, "search records");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(values), FoodRecord::from_row)?;
    let mut records = rows.collect::<Result<Vec<_>, _>>()?;

    if let Some(text) = filters.search_text.as_deref().filter(|t| !t.is_empty()) {
        let needle = text.to_lowercase();
        records.retain(|r| r.comment.to_lowercase().contains(&needle));
    }

    Ok(records)
}

/// Tag frequencies, most used first then alphabetical.
///
/// A tag repeated on one record counts once for that record.
pub fn tag_counts(conn: &Connection) -> FlResult<Vec<(String, i64)>> {
    let mut stmt = conn.prepare(
        "SELECT tag, COUNT(DISTINCT record_id) AS n FROM record_tags
         GROUP BY tag ORDER BY n DESC, tag ASC",
    )?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect::<Result<Vec<_>, _>>().map_err(FlError::from)
}

/// Split free-form tag input on commas and whitespace.
pub fn parse_tags(input: &str) -> Vec<String> {
    input
        .split(|c: char| c == ',' || c.is_whitespace())
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    use crate::models::food_record::{NewFoodRecord, Photo};
    use crate::schema;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::create_tables(&conn).unwrap();
        conn
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 12, 0, 0).unwrap()
    }

    fn insert(conn: &Connection, comment: &str, tags: &[&str], at: DateTime<Utc>, favorite: bool) -> i64 {
        let record = NewFoodRecord {
            photo: Photo::new(vec![9, 9, 9], "image/jpeg"),
            comment: comment.into(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            location: None,
            timestamp: at,
            favorite,
        };
        FoodRecord::insert(conn, &record, Utc::now()).unwrap()
    }

    fn ids(records: &[FoodRecord]) -> Vec<i64> {
        records.iter().map(|r| r.id).collect()
    }

    #[test]
    fn test_list_orders_newest_first() {
        let conn = setup_db();
        let a = insert(&conn, "a", &[], day(1), false);
        let b = insert(&conn, "b", &[], day(3), false);
        let c = insert(&conn, "c", &[], day(2), false);
        assert_eq!(ids(&list_records(&conn).unwrap()), vec![b, c, a]);
    }

    #[test]
    fn test_empty_filter_returns_everything() {
        let conn = setup_db();
        insert(&conn, "a", &[], day(1), false);
        insert(&conn, "b", &[], day(2), true);
        let filters = SearchFilters::default();
        assert!(filters.is_empty());
        assert_eq!(search_records(&conn, &filters).unwrap().len(), 2);
    }

    #[test]
    fn test_tags_match_all() {
        let conn = setup_db();
        let both = insert(&conn, "", &["lunch", "ramen"], day(1), false);
        insert(&conn, "", &["lunch"], day(2), false);
        insert(&conn, "", &["ramen", "dinner"], day(3), false);

        let filters = SearchFilters {
            tags: vec!["ramen".into(), "lunch".into()],
            ..Default::default()
        };
        assert_eq!(ids(&search_records(&conn, &filters).unwrap()), vec![both]);
    }

    #[test]
    fn test_duplicate_filter_tags_still_match() {
        let conn = setup_db();
        let id = insert(&conn, "", &["lunch", "lunch"], day(1), false);
        let filters = SearchFilters {
            tags: vec!["lunch".into(), "lunch".into()],
            ..Default::default()
        };
        assert_eq!(ids(&search_records(&conn, &filters).unwrap()), vec![id]);
    }

    #[test]
    fn test_date_range_inclusive() {
        let conn = setup_db();
        insert(&conn, "", &[], day(1), false);
        let lo = insert(&conn, "", &[], day(2), false);
        let hi = insert(&conn, "", &[], day(4), false);
        insert(&conn, "", &[], day(4) + Duration::milliseconds(1), false);

        let filters = SearchFilters {
            date_from: Some(day(2)),
            date_to: Some(day(4)),
            ..Default::default()
        };
        assert_eq!(ids(&search_records(&conn, &filters).unwrap()), vec![hi, lo]);
    }

    #[test]
    fn test_one_sided_date_bound() {
        let conn = setup_db();
        insert(&conn, "", &[], day(1), false);
        let late = insert(&conn, "", &[], day(5), false);
        let filters = SearchFilters {
            date_from: Some(day(3)),
            ..Default::default()
        };
        assert_eq!(ids(&search_records(&conn, &filters).unwrap()), vec![late]);
    }

    #[test]
    fn test_text_and_favorites_conjunctive() {
        let conn = setup_db();
        let hit = insert(&conn, "Spicy Ramen", &["ramen"], day(1), true);
        insert(&conn, "spicy curry", &["ramen"], day(2), false);
        insert(&conn, "Plain rice", &["ramen"], day(3), true);

        let filters = SearchFilters {
            search_text: Some("SPICY".into()),
            favorites_only: true,
            tags: vec!["ramen".into()],
            ..Default::default()
        };
        assert_eq!(ids(&search_records(&conn, &filters).unwrap()), vec![hit]);
    }

    #[test]
    fn test_empty_search_text_ignored() {
        let conn = setup_db();
        insert(&conn, "anything", &[], day(1), false);
        let filters = SearchFilters {
            search_text: Some(String::new()),
            ..Default::default()
        };
        assert!(filters.is_empty());
        assert_eq!(search_records(&conn, &filters).unwrap().len(), 1);
    }

    #[test]
    fn test_tag_counts() {
        let conn = setup_db();
        insert(&conn, "", &["lunch", "ramen", "lunch"], day(1), false);
        insert(&conn, "", &["lunch"], day(2), false);
        assert_eq!(
            tag_counts(&conn).unwrap(),
            vec![("lunch".to_string(), 2), ("ramen".to_string(), 1)]
        );
    }

    #[test]
    fn test_parse_tags() {
        assert_eq!(parse_tags(" lunch, ramen  noodle,,"), vec!["lunch", "ramen", "noodle"]);
        assert!(parse_tags("  , ").is_empty());
    }

    #[test]
    fn test_filters_deserialize_camel_case() {
        let filters: SearchFilters =
            serde_json::from_str(r#"{"favoritesOnly":true,"searchText":"ramen"}"#).unwrap();
        assert!(filters.favorites_only);
        assert_eq!(filters.search_text.as_deref(), Some("ramen"));
    }
}
