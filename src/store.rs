//! Persistent SQLite log of (request, response) pairs.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::{Connection, params};
use tracing::info;

/// Stored bot responses are clipped to this many characters.
const RESPONSE_LIMIT: usize = 500;

/// Placeholders for NULL fields in dumped records.
const NO_USERNAME: &str = "Нет username";
const EMPTY_MESSAGE: &str = "Пустой запрос";

/// One completed (request, response) pair. Never mutated after insertion.
#[derive(Debug, Clone)]
pub struct InteractionRecord {
    pub id: i64,
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub user_message: String,
    pub bot_response: String,
    pub timestamp: String,
}

/// A record to append; id and timestamp are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewInteraction {
    pub user_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: Option<String>,
    pub user_message: String,
    pub bot_response: String,
}

/// Aggregate view over the log, recomputed on demand.
#[derive(Debug)]
pub struct StatsSnapshot {
    pub total_requests: i64,
    pub unique_users: i64,
    /// The 5 most recent records, newest first.
    pub recent: Vec<InteractionRecord>,
}

pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) the store at the given path. Schema creation is
    /// idempotent and runs on every startup.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("Record store opened at {:?}", path);
        Ok(store)
    }

    #[cfg(test)]
    pub fn in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn init_schema(&self) -> rusqlite::Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS requests (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER,
                username TEXT,
                first_name TEXT,
                last_name TEXT,
                user_message TEXT,
                bot_response TEXT,
                timestamp DATETIME DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        )
    }

    /// Append one record. The response is clipped to 500 characters before
    /// storage; id and timestamp are assigned here.
    pub fn save(&self, rec: NewInteraction) -> rusqlite::Result<()> {
        let response: String = rec.bot_response.chars().take(RESPONSE_LIMIT).collect();
        let timestamp = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string();

        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO requests (user_id, username, first_name, last_name, user_message, bot_response, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                rec.user_id,
                rec.username,
                rec.first_name,
                rec.last_name,
                rec.user_message,
                response,
                timestamp
            ],
        )?;
        Ok(())
    }

    /// Recompute totals and the 5 most recent records.
    pub fn stats(&self) -> rusqlite::Result<StatsSnapshot> {
        let conn = self.conn.lock().unwrap();
        let total_requests =
            conn.query_row("SELECT COUNT(*) FROM requests", [], |row| row.get(0))?;
        let unique_users = conn.query_row(
            "SELECT COUNT(DISTINCT user_id) FROM requests",
            [],
            |row| row.get(0),
        )?;
        let recent = fetch_recent(&conn, 5)?;

        Ok(StatsSnapshot {
            total_requests,
            unique_users,
            recent,
        })
    }

    /// Most-recent-first records for operator inspection. NULL usernames and
    /// empty messages are replaced with placeholder strings.
    pub fn dump(&self, limit: usize) -> rusqlite::Result<Vec<InteractionRecord>> {
        let conn = self.conn.lock().unwrap();
        let mut records = fetch_recent(&conn, limit)?;
        for rec in &mut records {
            if rec.username.is_none() {
                rec.username = Some(NO_USERNAME.to_string());
            }
            if rec.user_message.is_empty() {
                rec.user_message = EMPTY_MESSAGE.to_string();
            }
        }
        Ok(records)
    }
}

fn fetch_recent(conn: &Connection, limit: usize) -> rusqlite::Result<Vec<InteractionRecord>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, username, first_name, last_name, user_message, bot_response, timestamp
         FROM requests ORDER BY timestamp DESC, id DESC LIMIT ?1",
    )?;

    let rows = stmt.query_map([limit as i64], |row| {
        Ok(InteractionRecord {
            id: row.get(0)?,
            user_id: row.get(1)?,
            username: row.get(2)?,
            first_name: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
            last_name: row.get(4)?,
            user_message: row.get::<_, Option<String>>(5)?.unwrap_or_default(),
            bot_response: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
            timestamp: row.get(7)?,
        })
    })?;

    rows.collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_interaction(user_id: i64, message: &str, response: &str) -> NewInteraction {
        NewInteraction {
            user_id,
            username: Some("alice".to_string()),
            first_name: "Alice".to_string(),
            last_name: None,
            user_message: message.to_string(),
            bot_response: response.to_string(),
        }
    }

    #[test]
    fn test_save_then_stats() {
        let store = Store::in_memory().unwrap();
        store.save(make_interaction(100, "вопрос", "ответ")).unwrap();
        store.save(make_interaction(101, "вопрос 2", "ответ 2")).unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.unique_users, 2);
    }

    #[test]
    fn test_repeat_user_keeps_unique_count() {
        let store = Store::in_memory().unwrap();
        for i in 0..4 {
            store
                .save(make_interaction(100, &format!("вопрос {i}"), "ответ"))
                .unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.total_requests, 4);
        assert_eq!(stats.unique_users, 1);
    }

    #[test]
    fn test_response_truncated_to_500_chars() {
        let store = Store::in_memory().unwrap();
        let long_response = "ы".repeat(800);
        store.save(make_interaction(100, "вопрос", &long_response)).unwrap();

        let records = store.dump(1).unwrap();
        assert_eq!(records[0].bot_response.chars().count(), 500);
        assert_eq!(records[0].bot_response, "ы".repeat(500));
    }

    #[test]
    fn test_short_response_kept_verbatim() {
        let store = Store::in_memory().unwrap();
        store.save(make_interaction(100, "вопрос", "короткий ответ")).unwrap();

        let records = store.dump(1).unwrap();
        assert_eq!(records[0].bot_response, "короткий ответ");
    }

    #[test]
    fn test_stats_recent_limited_to_five_newest_first() {
        let store = Store::in_memory().unwrap();
        for i in 0..7 {
            store
                .save(make_interaction(100 + i, &format!("вопрос {i}"), "ответ"))
                .unwrap();
        }

        let stats = store.stats().unwrap();
        assert_eq!(stats.recent.len(), 5);
        assert_eq!(stats.recent[0].user_message, "вопрос 6");
        assert_eq!(stats.recent[4].user_message, "вопрос 2");
    }

    #[test]
    fn test_ids_strictly_increasing() {
        let store = Store::in_memory().unwrap();
        for i in 0..3 {
            store
                .save(make_interaction(100, &format!("вопрос {i}"), "ответ"))
                .unwrap();
        }

        let records = store.dump(10).unwrap();
        let ids: Vec<i64> = records.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 2, 1]);
    }

    #[test]
    fn test_dump_placeholders_for_missing_fields() {
        let store = Store::in_memory().unwrap();
        store
            .save(NewInteraction {
                user_id: 100,
                username: None,
                first_name: "Аноним".to_string(),
                last_name: None,
                user_message: String::new(),
                bot_response: "ответ".to_string(),
            })
            .unwrap();

        let records = store.dump(1).unwrap();
        assert_eq!(records[0].username.as_deref(), Some("Нет username"));
        assert_eq!(records[0].user_message, "Пустой запрос");
        assert_eq!(records[0].last_name, None);
    }

    #[test]
    fn test_reopen_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("requests.db");

        {
            let store = Store::open(&path).unwrap();
            store.save(make_interaction(100, "вопрос", "ответ")).unwrap();
        }

        let store = Store::open(&path).unwrap();
        let stats = store.stats().unwrap();
        assert_eq!(stats.total_requests, 1);
    }
}
