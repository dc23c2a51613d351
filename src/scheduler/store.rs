use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::Path;
use std::time::Duration;

use super::advancer::ProgressCommit;
use super::error::{Result, SchedulerError};
use super::types::{HistoryEntry, Position, VerseAddress, VerseRange};

/// Durable home of the Position singleton and the append-only history.
pub trait ProgressStore {
    /// Current position; the default 1:1 record is created on first access.
    fn position(&mut self) -> Result<Position>;

    /// Apply a commit atomically: position update and history append land together or not at all.
    fn commit(&mut self, commit: &ProgressCommit) -> Result<Position>;

    /// Overwrite the cursor without touching counters or history.
    fn set_current(&mut self, addr: VerseAddress, now: DateTime<Utc>) -> Result<Position>;

    /// Newest first.
    fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEntry>>;

    fn history_len(&self) -> Result<u64>;

    /// Reels per reciter key, most used first.
    fn reciter_distribution(&self) -> Result<Vec<(String, u64)>>;

    /// Whether this exact range was produced before.
    fn contains_range(&self, range: &VerseRange) -> Result<bool>;
}

pub struct SqliteStore {
    conn: Connection,
}

const CURRENT_SCHEMA_VERSION: i32 = 1;

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        // Wait briefly for another writer instead of failing on SQLITE_BUSY
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::init_schema(&conn)?;
        Ok(SqliteStore { conn })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER NOT NULL,
                updated TEXT NOT NULL,
                PRIMARY KEY (version)
            )",
            (),
        )?;

        let version: i32 = conn
            .query_row(
                "SELECT version FROM schema_version ORDER BY version DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()?
            .unwrap_or(0);

        if version < CURRENT_SCHEMA_VERSION {
            Self::migrate_schema(conn, version)?;
        }
        Ok(())
    }

    fn migrate_schema(conn: &Connection, from_version: i32) -> Result<()> {
        match from_version {
            0 => {
                conn.execute_batch(
                    "BEGIN;
                    CREATE TABLE IF NOT EXISTS verse_progress (
                        id INTEGER PRIMARY KEY CHECK (id = 1),
                        current_chapter INTEGER NOT NULL,
                        current_verse INTEGER NOT NULL,
                        total_reels_generated INTEGER NOT NULL DEFAULT 0,
                        total_verses_narrated INTEGER NOT NULL DEFAULT 0,
                        last_updated TEXT NOT NULL
                    );
                    CREATE TABLE IF NOT EXISTS reel_history (
                        id INTEGER PRIMARY KEY AUTOINCREMENT,
                        start_chapter INTEGER NOT NULL,
                        start_verse INTEGER NOT NULL,
                        end_chapter INTEGER NOT NULL,
                        end_verse INTEGER NOT NULL,
                        verse_count INTEGER NOT NULL,
                        reciter_key TEXT NOT NULL,
                        output_reference TEXT NOT NULL,
                        produced_at TEXT NOT NULL
                    );
                    CREATE INDEX IF NOT EXISTS reel_history_range
                        ON reel_history (start_chapter, start_verse, end_chapter, end_verse);
                    INSERT INTO schema_version (version, updated) VALUES (1, datetime('now'));
                    COMMIT;",
                )?;
            }
            // Future migrations can be added here
            _ => {}
        }
        Ok(())
    }

    #[cfg(test)]
    fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| SchedulerError::CorruptState(format!("bad timestamp '{}': {}", raw, e)))
}

fn to_u16(value: i64, column: &str) -> Result<u16> {
    u16::try_from(value)
        .map_err(|_| SchedulerError::CorruptState(format!("{} out of range: {}", column, value)))
}

fn to_u64(value: i64, column: &str) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| SchedulerError::CorruptState(format!("{} is negative: {}", column, value)))
}

fn read_position(conn: &Connection) -> Result<Option<Position>> {
    let row = conn
        .query_row(
            "SELECT current_chapter, current_verse, total_reels_generated,
                    total_verses_narrated, last_updated
             FROM verse_progress WHERE id = 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, i64>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, String>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((chapter, verse, reels, verses, updated)) = row else {
        return Ok(None);
    };
    Ok(Some(Position {
        current: VerseAddress::new(
            to_u16(chapter, "current_chapter")?,
            to_u16(verse, "current_verse")?,
        ),
        total_reels_generated: to_u64(reels, "total_reels_generated")?,
        total_verses_narrated: to_u64(verses, "total_verses_narrated")?,
        last_updated: parse_timestamp(&updated)?,
    }))
}

fn ensure_position(conn: &Connection, now: DateTime<Utc>) -> Result<Position> {
    if let Some(position) = read_position(conn)? {
        return Ok(position);
    }
    let initial = Position::initial(now);
    write_position(conn, &initial)?;
    Ok(initial)
}

fn write_position(conn: &Connection, position: &Position) -> Result<()> {
    conn.execute(
        "INSERT INTO verse_progress
            (id, current_chapter, current_verse, total_reels_generated, total_verses_narrated, last_updated)
         VALUES (1, ?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            current_chapter = excluded.current_chapter,
            current_verse = excluded.current_verse,
            total_reels_generated = excluded.total_reels_generated,
            total_verses_narrated = excluded.total_verses_narrated,
            last_updated = excluded.last_updated",
        params![
            position.current.chapter,
            position.current.verse,
            position.total_reels_generated as i64,
            position.total_verses_narrated as i64,
            position.last_updated.to_rfc3339(),
        ],
    )?;
    Ok(())
}

type HistoryRow = (i64, i64, i64, i64, i64, String, String, String);

fn history_entry(row: HistoryRow) -> Result<HistoryEntry> {
    let (id, start_chapter, start_verse, end_chapter, end_verse, reciter_key, output, produced) =
        row;
    Ok(HistoryEntry {
        id,
        range: VerseRange::new(
            VerseAddress::new(
                to_u16(start_chapter, "start_chapter")?,
                to_u16(start_verse, "start_verse")?,
            ),
            VerseAddress::new(
                to_u16(end_chapter, "end_chapter")?,
                to_u16(end_verse, "end_verse")?,
            ),
        ),
        reciter_key,
        produced_at: parse_timestamp(&produced)?,
        output_reference: output,
    })
}

impl ProgressStore for SqliteStore {
    fn position(&mut self) -> Result<Position> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let position = ensure_position(&tx, Utc::now())?;
        tx.commit()?;
        Ok(position)
    }

    fn commit(&mut self, commit: &ProgressCommit) -> Result<Position> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        // Re-check inside the transaction; the caller's view may be stale.
        let current = ensure_position(&tx, commit.committed_at)?;
        commit.check_sequence(&current)?;

        let next = commit.apply_to(&current);
        write_position(&tx, &next)?;
        tx.execute(
            "INSERT INTO reel_history
                (start_chapter, start_verse, end_chapter, end_verse, verse_count,
                 reciter_key, output_reference, produced_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                commit.range.start.chapter,
                commit.range.start.verse,
                commit.range.end.chapter,
                commit.range.end.verse,
                commit.verse_count,
                commit.reciter_key,
                commit.output_reference,
                commit.committed_at.to_rfc3339(),
            ],
        )?;
        tx.commit()?;
        Ok(next)
    }

    fn set_current(&mut self, addr: VerseAddress, now: DateTime<Utc>) -> Result<Position> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let mut position = ensure_position(&tx, now)?;
        position.current = addr;
        position.last_updated = now;
        write_position(&tx, &position)?;
        tx.commit()?;
        Ok(position)
    }

    fn recent_history(&self, limit: usize) -> Result<Vec<HistoryEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, start_chapter, start_verse, end_chapter, end_verse,
                    reciter_key, output_reference, produced_at
             FROM reel_history ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([limit as i64], |row| -> rusqlite::Result<HistoryRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            entries.push(history_entry(row?)?);
        }
        Ok(entries)
    }

    fn history_len(&self) -> Result<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM reel_history", [], |row| row.get(0))?;
        to_u64(count, "history count")
    }

    fn reciter_distribution(&self) -> Result<Vec<(String, u64)>> {
        let mut stmt = self.conn.prepare(
            "SELECT reciter_key, COUNT(*) FROM reel_history
             GROUP BY reciter_key ORDER BY COUNT(*) DESC, reciter_key",
        )?;
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?)))?;
        let mut result = Vec::new();
        for row in rows {
            let (key, count) = row?;
            result.push((key, to_u64(count, "reciter count")?));
        }
        Ok(result)
    }

    fn contains_range(&self, range: &VerseRange) -> Result<bool> {
        let found = self
            .conn
            .query_row(
                "SELECT 1 FROM reel_history
                 WHERE start_chapter = ?1 AND start_verse = ?2
                   AND end_chapter = ?3 AND end_verse = ?4
                 LIMIT 1",
                params![
                    range.start.chapter,
                    range.start.verse,
                    range.end.chapter,
                    range.end.verse
                ],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}
