#![allow(dead_code)]

use bson::{Document, doc};
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::sync::Arc;

use nexusquery::executor::Executor;
use nexusquery::memory::MemoryStore;
use nexusquery::{Command, Connection, ExecutionError, Reply};

/// Memory store that remembers every command it ran.
#[derive(Default)]
pub struct RecordingExecutor {
    pub store: MemoryStore,
    pub commands: Mutex<Vec<Command>>,
}

impl RecordingExecutor {
    pub fn taken(&self) -> Vec<Command> {
        std::mem::take(&mut *self.commands.lock())
    }
}

impl Executor for RecordingExecutor {
    fn execute(&self, command: Command) -> Result<Reply, ExecutionError> {
        self.commands.lock().push(command.clone());
        self.store.execute(command)
    }
}

/// Executor whose every call fails with a wrapped I/O error.
pub struct FailingExecutor;

impl Executor for FailingExecutor {
    fn execute(&self, command: Command) -> Result<Reply, ExecutionError> {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "socket closed");
        Err(ExecutionError::with_source(format!("{} failed: connection reset", command.name()), io))
    }
}

/// Executor that answers everything with the same reply.
pub struct FixedReply(pub Reply);

impl Executor for FixedReply {
    fn execute(&self, _command: Command) -> Result<Reply, ExecutionError> {
        Ok(self.0.clone())
    }
}

pub fn recording() -> (Arc<RecordingExecutor>, Connection) {
    let exec = Arc::new(RecordingExecutor::default());
    let conn = Connection::new(exec.clone());
    (exec, conn)
}

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> bson::DateTime {
    let millis = NaiveDate::from_ymd_opt(y, m, d)
        .and_then(|date| date.and_hms_opt(h, 0, 0))
        .map(|dt| dt.and_utc().timestamp_millis())
        .unwrap();
    bson::DateTime::from_millis(millis)
}

/// John (30), Jane (no age) and Robert (age stored as a string).
pub fn seed_users(conn: &Connection) {
    conn.collection("users")
        .insert_many(vec![
            doc! {
                "name": "John Doe", "age": 30,
                "addresses": [{"city": "Ghent"}, {"city": "Paris"}],
                "tags": ["one", "two"],
            },
            doc! {
                "name": "Jane Doe",
                "addresses": [{"city": "Brussels"}, {"city": "Paris"}],
                "tags": ["one", "two", "three", "four"],
            },
            doc! { "name": "Robert Roe", "age": "thirty-one", "tags": ["three", "four"] },
        ])
        .unwrap();
}

/// Four people with ages and a `birthday` in UTC.
pub fn seed_people(conn: &Connection) {
    let rows: Vec<Document> = vec![
        doc! { "name": "Jane Doe", "age": 20, "birthday": utc(1990, 1, 1, 10) },
        doc! { "name": "John Doe", "age": 30, "birthday": utc(1980, 3, 1, 11) },
        doc! { "name": "Mark Moe", "age": 25, "birthday": utc(1970, 3, 1, 12) },
        doc! { "name": "Larry Loe", "age": 35, "birthday": utc(1960, 4, 1, 13) },
    ];
    conn.collection("people").insert_many(rows).unwrap();
}
