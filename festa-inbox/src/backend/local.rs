//! SQLite-backed implementation of the backend contract.
//!
//! Used by integration tests and local development; the hosted deployment
//! talks to `HttpBackend` instead.

use std::sync::Mutex;

use async_trait::async_trait;
use rusqlite::{Connection, OptionalExtension};

use super::{Backend, Storage};
use crate::error::{InboxError, Result};
use crate::models::{Inquiry, LastMessage, Message, Participant, Thread};

pub struct LocalBackend {
    conn: Mutex<Connection>,
}

impl LocalBackend {
    /// Open (or create) the schema at the given path.
    pub fn open(path: &str) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Fully in-memory store, handy for tests.
    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "
            -- Customers and vendor users
            CREATE TABLE IF NOT EXISTS participants (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT NOT NULL,
                avatar_url TEXT
            );

            -- One conversation per vendor/customer pair
            CREATE TABLE IF NOT EXISTS threads (
                id TEXT PRIMARY KEY,
                vendor_id TEXT NOT NULL,
                customer_id TEXT NOT NULL REFERENCES participants(id),
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                thread_id TEXT REFERENCES threads(id),
                sender_id TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                read_at INTEGER
            );

            CREATE TABLE IF NOT EXISTS inquiries (
                id TEXT PRIMARY KEY,
                vendor_id TEXT NOT NULL,
                customer_id TEXT NOT NULL REFERENCES participants(id),
                event_name TEXT NOT NULL,
                event_date TEXT,
                guest_count INTEGER,
                note TEXT,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_messages_thread_id ON messages(thread_id);
            CREATE INDEX IF NOT EXISTS idx_messages_created_at ON messages(created_at);
            CREATE INDEX IF NOT EXISTS idx_threads_vendor_id ON threads(vendor_id);
            ",
        )?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| InboxError::Backend(format!("connection lock poisoned: {}", e)))
    }

    /// Seed helpers used by tests and local fixtures.
    pub fn insert_participant(&self, participant: &Participant) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT OR REPLACE INTO participants (id, name, email, avatar_url)
             VALUES (?1, ?2, ?3, ?4)",
            (
                &participant.id,
                &participant.name,
                &participant.email,
                &participant.avatar_url,
            ),
        )?;
        Ok(())
    }

    pub fn insert_thread(&self, id: &str, vendor_id: &str, customer_id: &str) -> Result<()> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO threads (id, vendor_id, customer_id, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (id, vendor_id, customer_id, now, now),
        )?;
        Ok(())
    }

    pub fn insert_inquiry(&self, inquiry: &Inquiry) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO inquiries (id, vendor_id, customer_id, event_name, event_date,
                                    guest_count, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            (
                &inquiry.id,
                &inquiry.vendor_id,
                &inquiry.customer_id,
                &inquiry.event_name,
                &inquiry.event_date,
                &inquiry.guest_count,
                &inquiry.note,
                &inquiry.created_at,
            ),
        )?;
        Ok(())
    }
}

#[async_trait]
impl Backend for LocalBackend {
    async fn fetch_threads(&self, vendor_id: &str) -> Result<Vec<Thread>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT t.id, t.vendor_id, t.customer_id, t.created_at, t.updated_at,
                    p.id, p.name, p.email, p.avatar_url
             FROM threads t
             JOIN participants p ON p.id = t.customer_id
             WHERE t.vendor_id = ?1
             ORDER BY t.updated_at DESC",
        )?;

        let threads = stmt
            .query_map([vendor_id], |row| {
                Ok(Thread {
                    id: row.get(0)?,
                    vendor_id: row.get(1)?,
                    participant: Participant {
                        id: row.get(5)?,
                        name: row.get(6)?,
                        email: row.get(7)?,
                        avatar_url: row.get(8)?,
                    },
                    last_message: None,
                    unread_count: 0,
                    created_at: row.get(3)?,
                    updated_at: row.get(4)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<Thread>>>()?;

        // Enrich with last-message snapshot and unread count
        let mut enriched = Vec::new();
        for mut thread in threads {
            let last: Option<LastMessage> = conn
                .query_row(
                    "SELECT content, created_at FROM messages
                     WHERE thread_id = ?1
                     ORDER BY created_at DESC, rowid DESC LIMIT 1",
                    [&thread.id],
                    |row| {
                        Ok(LastMessage {
                            content: row.get(0)?,
                            created_at: row.get(1)?,
                        })
                    },
                )
                .optional()?;
            thread.last_message = last;

            // The badge counts unread counterparty messages, so it stays in
            // step with mark_read even when the reading user's id differs
            // from the vendor id.
            thread.unread_count = conn.query_row(
                "SELECT COUNT(*) FROM messages
                 WHERE thread_id = ?1 AND sender_id = ?2 AND read_at IS NULL",
                [&thread.id, &thread.participant.id],
                |row| row.get(0),
            )?;

            enriched.push(thread);
        }

        Ok(enriched)
    }

    async fn fetch_messages(&self, thread_id: &str) -> Result<Vec<Message>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, sender_id, content, created_at, read_at
             FROM messages
             WHERE thread_id = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let messages = stmt
            .query_map([thread_id], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    thread_id: row.get(1)?,
                    sender_id: row.get(2)?,
                    content: row.get(3)?,
                    created_at: row.get(4)?,
                    read_at: row.get(5)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<Message>>>()?;

        Ok(messages)
    }

    async fn send_message(
        &self,
        thread_id: &str,
        sender_id: &str,
        content: &str,
    ) -> Result<Message> {
        let now = chrono::Utc::now().timestamp_millis();
        let msg_id = uuid::Uuid::new_v4().to_string();

        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO messages (id, thread_id, sender_id, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (&msg_id, thread_id, sender_id, content, now),
        )?;
        conn.execute(
            "UPDATE threads SET updated_at = ?1 WHERE id = ?2",
            (now, thread_id),
        )?;

        Ok(Message {
            id: msg_id,
            thread_id: thread_id.to_string(),
            sender_id: sender_id.to_string(),
            content: content.to_string(),
            created_at: now,
            read_at: None,
        })
    }

    async fn mark_read(&self, thread_id: &str, reader_id: &str) -> Result<Vec<String>> {
        let now = chrono::Utc::now().timestamp_millis();
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT id FROM messages
             WHERE thread_id = ?1 AND sender_id != ?2 AND read_at IS NULL",
        )?;
        let ids = stmt
            .query_map([thread_id, reader_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<String>>>()?;

        if !ids.is_empty() {
            conn.execute(
                "UPDATE messages SET read_at = ?1
                 WHERE thread_id = ?2 AND sender_id != ?3 AND read_at IS NULL",
                (now, thread_id, reader_id),
            )?;
        }

        Ok(ids)
    }

    async fn fetch_inquiries(&self, vendor_id: &str, customer_id: &str) -> Result<Vec<Inquiry>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT id, vendor_id, customer_id, event_name, event_date, guest_count, note,
                    created_at
             FROM inquiries
             WHERE vendor_id = ?1 AND customer_id = ?2
             ORDER BY created_at DESC",
        )?;

        let inquiries = stmt
            .query_map([vendor_id, customer_id], |row| {
                Ok(Inquiry {
                    id: row.get(0)?,
                    vendor_id: row.get(1)?,
                    customer_id: row.get(2)?,
                    event_name: row.get(3)?,
                    event_date: row.get(4)?,
                    guest_count: row.get(5)?,
                    note: row.get(6)?,
                    created_at: row.get(7)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<Inquiry>>>()?;

        Ok(inquiries)
    }
}

/// In-memory storage stand-in for local development: "uploads" resolve to
/// deterministic fake public URLs.
#[derive(Default)]
pub struct LocalStorage;

#[async_trait]
impl Storage for LocalStorage {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        _bytes: Vec<u8>,
        _mime: &str,
    ) -> Result<String> {
        Ok(format!("local://{}/{}", bucket, path))
    }
}
