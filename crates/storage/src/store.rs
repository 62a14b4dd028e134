use chrono::{NaiveDate, Utc};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use creneau_core::{
    french_weekday, french_weekday_number, Activity, DesiredReservation, Error, Result,
};

/// Outcome of recording an executed booking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BookingRecord {
    Inserted,
    /// The same booking was already on file for that user and date.
    AlreadyExists,
}

/// SQLite-backed store for check status, users, desired reservations,
/// executed bookings and the scraped planning read-model.
#[derive(Clone)]
pub struct PlanningStore {
    inner: Arc<Mutex<Connection>>,
    #[allow(dead_code)]
    db_path: PathBuf,
}

impl PlanningStore {
    /// Open (or create) the database at the given path.
    pub fn open(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Storage(format!("failed to create db directory: {}", e)))?;
        }

        let conn = Connection::open(db_path)
            .map_err(|e| Error::Storage(format!("failed to open db: {}", e)))?;

        // WAL mode for better concurrent read performance
        conn.execute_batch("PRAGMA journal_mode=WAL;").ok();

        let store = Self {
            inner: Arc::new(Mutex::new(conn)),
            db_path: db_path.to_path_buf(),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.inner
            .lock()
            .map_err(|e| Error::Storage(format!("lock error: {}", e)))
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.lock()?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS checking_days (
                date TEXT PRIMARY KEY,
                is_planning INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE,
                password TEXT NOT NULL,
                display_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS reservations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                weekday TEXT NOT NULL,
                activity TEXT NOT NULL,
                UNIQUE(user_id, weekday, activity)
            );

            CREATE TABLE IF NOT EXISTS bookings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL REFERENCES users(id),
                date TEXT NOT NULL,
                activity TEXT NOT NULL,
                created_at TEXT NOT NULL,
                UNIQUE(user_id, date, activity)
            );

            CREATE TABLE IF NOT EXISTS planning (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                weekday TEXT NOT NULL,
                start_time TEXT NOT NULL,
                activity TEXT NOT NULL,
                room TEXT NOT NULL DEFAULT '',
                capacity TEXT NOT NULL DEFAULT '',
                is_full INTEGER NOT NULL DEFAULT 0,
                is_booked INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_reservations_weekday ON reservations(weekday);
            CREATE INDEX IF NOT EXISTS idx_planning_weekday ON planning(weekday);
            ",
        )
        .map_err(|e| Error::Storage(format!("failed to init schema: {}", e)))?;

        debug!("Planning store schema initialized");
        Ok(())
    }

    /// Whether the planning has already been confirmed open today.
    /// Lazily creates the day row on first call for a given date.
    pub fn today_check_status(&self, date: NaiveDate) -> Result<bool> {
        let conn = self.lock()?;
        let date_str = date.format("%Y-%m-%d").to_string();

        conn.execute(
            "INSERT OR IGNORE INTO checking_days (date, is_planning) VALUES (?1, 0)",
            params![date_str],
        )
        .map_err(|e| Error::Storage(format!("insert error: {}", e)))?;

        let is_planning: i64 = conn
            .query_row(
                "SELECT is_planning FROM checking_days WHERE date = ?1",
                params![date_str],
                |row| row.get(0),
            )
            .map_err(|e| Error::Storage(format!("query error: {}", e)))?;

        Ok(is_planning != 0)
    }

    /// Mark today's planning as seen. Never auto-reset.
    pub fn set_planning_checked(&self, date: NaiveDate) -> Result<()> {
        let conn = self.lock()?;
        let date_str = date.format("%Y-%m-%d").to_string();

        conn.execute(
            "INSERT INTO checking_days (date, is_planning) VALUES (?1, 1)
             ON CONFLICT(date) DO UPDATE SET is_planning = 1",
            params![date_str],
        )
        .map_err(|e| Error::Storage(format!("update error: {}", e)))?;
        Ok(())
    }

    /// Insert or update a user, returning its id.
    pub fn add_user(&self, email: &str, password: &str, display_name: &str) -> Result<i64> {
        let conn = self.lock()?;

        conn.execute(
            "INSERT INTO users (email, password, display_name) VALUES (?1, ?2, ?3)
             ON CONFLICT(email) DO UPDATE SET password = ?2, display_name = ?3",
            params![email, password, display_name],
        )
        .map_err(|e| Error::Storage(format!("insert error: {}", e)))?;

        let id: i64 = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |row| row.get(0),
            )
            .map_err(|e| Error::Storage(format!("query error: {}", e)))?;
        Ok(id)
    }

    /// Register a standing weekly reservation wish for a user.
    pub fn add_desired(&self, user_id: i64, weekday: u32, activity: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR IGNORE INTO reservations (user_id, weekday, activity)
             VALUES (?1, ?2, ?3)",
            params![user_id, french_weekday(weekday), activity],
        )
        .map_err(|e| Error::Storage(format!("insert error: {}", e)))?;
        Ok(())
    }

    /// All desired reservations for a weekday, with owner credentials.
    pub fn list_desired(&self, weekday: u32) -> Result<Vec<DesiredReservation>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT r.user_id, u.email, u.password, u.display_name, r.weekday, r.activity
                 FROM reservations r JOIN users u ON u.id = r.user_id
                 WHERE r.weekday = ?1
                 ORDER BY r.id",
            )
            .map_err(|e| Error::Storage(format!("prepare error: {}", e)))?;

        let rows = stmt
            .query_map(params![french_weekday(weekday)], |row| {
                let weekday_name: String = row.get(4)?;
                Ok(DesiredReservation {
                    user_id: row.get(0)?,
                    email: row.get(1)?,
                    password: row.get(2)?,
                    display_name: row.get(3)?,
                    weekday: french_weekday_number(&weekday_name).unwrap_or(0),
                    activity: row.get(5)?,
                })
            })
            .map_err(|e| Error::Storage(format!("query error: {}", e)))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| Error::Storage(format!("row error: {}", e)))?);
        }
        Ok(result)
    }

    /// Record an executed booking. A duplicate (user, date, activity) hits
    /// the UNIQUE constraint and is reported as AlreadyExists, not an error.
    pub fn record_booking(
        &self,
        user_id: i64,
        date: NaiveDate,
        activity: &str,
    ) -> Result<BookingRecord> {
        let conn = self.lock()?;
        let date_str = date.format("%Y-%m-%d").to_string();
        let now = Utc::now().to_rfc3339();

        match conn.execute(
            "INSERT INTO bookings (user_id, date, activity, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![user_id, date_str, activity, now],
        ) {
            Ok(_) => Ok(BookingRecord::Inserted),
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Ok(BookingRecord::AlreadyExists)
            }
            Err(e) => Err(Error::Storage(format!("insert error: {}", e))),
        }
    }

    /// Replace the planning read-model rows for one weekday.
    pub fn save_activities(&self, weekday: u32, activities: &[Activity]) -> Result<()> {
        let mut conn = self.lock()?;
        let weekday_name = french_weekday(weekday);
        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .map_err(|e| Error::Storage(format!("transaction error: {}", e)))?;

        tx.execute(
            "DELETE FROM planning WHERE weekday = ?1",
            params![weekday_name],
        )
        .map_err(|e| Error::Storage(format!("delete error: {}", e)))?;

        for activity in activities {
            tx.execute(
                "INSERT INTO planning
                 (weekday, start_time, activity, room, capacity, is_full, is_booked, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    weekday_name,
                    activity.start_time,
                    activity.name,
                    activity.room,
                    activity.capacity,
                    activity.is_full as i64,
                    activity.is_booked as i64,
                    now,
                ],
            )
            .map_err(|e| Error::Storage(format!("insert error: {}", e)))?;
        }

        tx.commit()
            .map_err(|e| Error::Storage(format!("commit error: {}", e)))?;
        Ok(())
    }

    /// Read-model rows for one weekday, in schedule order.
    pub fn planning_for(&self, weekday: u32) -> Result<Vec<Activity>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(
                "SELECT weekday, start_time, activity, room, capacity, is_full, is_booked
                 FROM planning WHERE weekday = ?1 ORDER BY start_time",
            )
            .map_err(|e| Error::Storage(format!("prepare error: {}", e)))?;

        let rows = stmt
            .query_map(params![french_weekday(weekday)], |row| {
                let weekday_name: String = row.get(0)?;
                let is_full: i64 = row.get(5)?;
                let is_booked: i64 = row.get(6)?;
                Ok(Activity {
                    weekday: french_weekday_number(&weekday_name).unwrap_or(0),
                    start_time: row.get(1)?,
                    name: row.get(2)?,
                    room: row.get(3)?,
                    capacity: row.get(4)?,
                    is_full: is_full != 0,
                    is_booked: is_booked != 0,
                })
            })
            .map_err(|e| Error::Storage(format!("query error: {}", e)))?;

        let mut result = Vec::new();
        for row in rows {
            result.push(row.map_err(|e| Error::Storage(format!("row error: {}", e)))?);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (TempDir, PlanningStore) {
        let dir = TempDir::new().unwrap();
        let store = PlanningStore::open(&dir.path().join("test.sqlite")).unwrap();
        (dir, store)
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_check_status_lifecycle() {
        let (_dir, store) = open_store();
        let today = date("2025-03-12");

        assert!(!store.today_check_status(today).unwrap());
        store.set_planning_checked(today).unwrap();
        assert!(store.today_check_status(today).unwrap());

        // A new date starts unchecked
        assert!(!store.today_check_status(date("2025-03-13")).unwrap());
        // And yesterday stays checked
        assert!(store.today_check_status(today).unwrap());
    }

    #[test]
    fn test_users_and_desired_reservations() {
        let (_dir, store) = open_store();

        let alice = store.add_user("alice@example.fr", "pw1", "Alice").unwrap();
        let bob = store.add_user("bob@example.fr", "pw2", "Bob").unwrap();
        assert_ne!(alice, bob);

        // Upsert keeps the same id
        let alice_again = store.add_user("alice@example.fr", "pw1b", "Alice").unwrap();
        assert_eq!(alice, alice_again);

        store.add_desired(alice, 3, "Cross Training").unwrap();
        store.add_desired(bob, 3, "Pilates").unwrap();
        store.add_desired(alice, 5, "Yoga").unwrap();
        // Duplicate is ignored
        store.add_desired(alice, 3, "Cross Training").unwrap();

        let wednesday = store.list_desired(3).unwrap();
        assert_eq!(wednesday.len(), 2);
        assert_eq!(wednesday[0].activity, "Cross Training");
        assert_eq!(wednesday[0].email, "alice@example.fr");
        assert_eq!(wednesday[0].password, "pw1b");
        assert_eq!(wednesday[0].weekday, 3);
        assert_eq!(wednesday[1].activity, "Pilates");

        assert_eq!(store.list_desired(1).unwrap().len(), 0);
    }

    #[test]
    fn test_record_booking_dedupe() {
        let (_dir, store) = open_store();
        let alice = store.add_user("alice@example.fr", "pw", "Alice").unwrap();
        let day = date("2025-03-18");

        assert_eq!(
            store.record_booking(alice, day, "Cross Training").unwrap(),
            BookingRecord::Inserted
        );
        assert_eq!(
            store.record_booking(alice, day, "Cross Training").unwrap(),
            BookingRecord::AlreadyExists
        );
        // Other activity or date inserts fine
        assert_eq!(
            store.record_booking(alice, day, "Pilates").unwrap(),
            BookingRecord::Inserted
        );
        assert_eq!(
            store
                .record_booking(alice, date("2025-03-19"), "Cross Training")
                .unwrap(),
            BookingRecord::Inserted
        );
    }

    #[test]
    fn test_planning_read_model_replace() {
        let (_dir, store) = open_store();

        let slot = |start: &str, name: &str| Activity {
            start_time: start.to_string(),
            name: name.to_string(),
            room: "Salle 1".to_string(),
            capacity: "5/20".to_string(),
            is_full: false,
            is_booked: false,
            weekday: 2,
        };

        store
            .save_activities(2, &[slot("10:00", "Pilates"), slot("09:00", "Yoga")])
            .unwrap();
        let rows = store.planning_for(2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "Yoga");
        assert_eq!(rows[0].weekday, 2);

        // A second save replaces the day's rows instead of appending
        store.save_activities(2, &[slot("18:30", "Boxe")]).unwrap();
        let rows = store.planning_for(2).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].name, "Boxe");

        assert_eq!(store.planning_for(4).unwrap().len(), 0);
    }
}
