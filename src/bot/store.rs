//! Flat-file persistence: JSON documents plus two append-only text logs.
//!
//! Every mutation re-reads the whole document, changes it in memory and
//! rewrites it. One mutex per file is held across the read-modify-write so
//! two handlers touching the same file cannot lose each other's writes.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, error, info, warn};

use crate::bot::user::UserRecord;

pub type UserMap = BTreeMap<String, UserRecord>;
pub type FeedbackMap = BTreeMap<String, FeedbackEntry>;

#[derive(Debug)]
pub enum StoreError {
    Io { path: PathBuf, source: std::io::Error },
    Json { path: PathBuf, source: serde_json::Error },
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "I/O error on '{}': {}", path.display(), source),
            Self::Json { path, source } => write!(f, "JSON error in '{}': {}", path.display(), source),
        }
    }
}

impl std::error::Error for StoreError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
        }
    }
}

/// JSON documents managed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    Users,
    Feedback,
    Reminders,
    Broadcasts,
}

impl StoreKind {
    const ALL: [StoreKind; 4] = [
        StoreKind::Users,
        StoreKind::Feedback,
        StoreKind::Reminders,
        StoreKind::Broadcasts,
    ];

    pub fn file_name(&self) -> &'static str {
        match self {
            StoreKind::Users => "users.json",
            StoreKind::Feedback => "feedback.json",
            StoreKind::Reminders => "reminders.json",
            StoreKind::Broadcasts => "broadcasts.json",
        }
    }

    /// Reminders and broadcasts are lists; the others are mappings.
    fn empty_document(&self) -> &'static str {
        match self {
            StoreKind::Reminders | StoreKind::Broadcasts => "[]",
            StoreKind::Users | StoreKind::Feedback => "{}",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

/// Append-only plain text logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogKind {
    Commands,
    ChatHistory,
}

impl LogKind {
    pub fn file_name(&self) -> &'static str {
        match self {
            LogKind::Commands => "command_logs.txt",
            LogKind::ChatHistory => "chat_history.txt",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackEntry {
    pub user_id: i64,
    pub username: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// A scheduled reminder. Append-only; delivery never marks it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReminderRecord {
    pub user_id: i64,
    pub time: DateTime<Utc>,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BroadcastRecord {
    pub admin_id: i64,
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub total_recipients: usize,
    pub successful: usize,
    pub failed: usize,
}

pub struct Store {
    data_dir: PathBuf,
    documents: [Mutex<()>; 4],
    logs: [Mutex<()>; 2],
}

impl Store {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            documents: Default::default(),
            logs: Default::default(),
        }
    }

    /// Create the data directory and any missing file with its empty document.
    pub fn ensure_files(&self) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.data_dir).map_err(|e| io_err(&self.data_dir, e))?;
        for kind in StoreKind::ALL {
            let path = self.path(kind);
            if !path.exists() {
                std::fs::write(&path, kind.empty_document()).map_err(|e| io_err(&path, e))?;
                info!("Created {:?}", path);
            }
        }
        for kind in [LogKind::Commands, LogKind::ChatHistory] {
            let path = self.log_path(kind);
            if !path.exists() {
                std::fs::write(&path, "").map_err(|e| io_err(&path, e))?;
            }
        }
        Ok(())
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path(&self, kind: StoreKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    pub fn log_path(&self, kind: LogKind) -> PathBuf {
        self.data_dir.join(kind.file_name())
    }

    /// Read a whole document, falling back to the empty structure on any error.
    pub fn load<T: DeserializeOwned + Default>(&self, kind: StoreKind) -> T {
        let _guard = self.lock(kind);
        self.read(kind).unwrap_or_else(|e| {
            warn!("Failed to load {}: {e}", kind.file_name());
            T::default()
        })
    }

    /// Overwrite a whole document.
    pub fn save_all<T: Serialize>(&self, kind: StoreKind, value: &T) -> Result<(), StoreError> {
        let _guard = self.lock(kind);
        self.write(kind, value)
    }

    /// Read-modify-write a document under its lock.
    ///
    /// An unreadable document is moved aside to `<file>.corrupt-<millis>` and
    /// the update starts from the empty structure. If it cannot be moved, the
    /// read error is returned and nothing is written.
    pub fn update<T, R, F>(&self, kind: StoreKind, f: F) -> Result<R, StoreError>
    where
        T: Serialize + DeserializeOwned + Default,
        F: FnOnce(&mut T) -> R,
    {
        let _guard = self.lock(kind);
        let mut value: T = match self.read(kind) {
            Ok(value) => value,
            Err(e) => {
                let backup = self.quarantine(kind).map_err(|moved| {
                    error!("Cannot move unreadable {} aside: {moved}", kind.file_name());
                    e
                })?;
                warn!("Unreadable {} moved to {}, starting empty", kind.file_name(), backup.display());
                T::default()
            }
        };
        let result = f(&mut value);
        self.write(kind, &value)?;
        Ok(result)
    }

    // ==================== USERS ====================

    /// Get a user, creating and persisting `create()` on first access.
    ///
    /// `create` receives the number of users already stored. If the users
    /// file cannot be read, `fallback` is returned and nothing is written.
    pub fn get_user<C, F>(&self, user_id: i64, create: C, fallback: F) -> UserRecord
    where
        C: FnOnce(usize) -> UserRecord,
        F: FnOnce() -> UserRecord,
    {
        let _guard = self.lock(StoreKind::Users);
        let mut users: UserMap = match self.read(StoreKind::Users) {
            Ok(users) => users,
            Err(e) => {
                warn!("Error reading user data for {user_id}: {e}");
                return fallback();
            }
        };
        let key = user_id.to_string();
        if let Some(record) = users.get(&key) {
            return record.clone();
        }
        let record = create(users.len());
        users.insert(key, record.clone());
        match self.write(StoreKind::Users, &users) {
            Ok(()) => debug!("Created user record {user_id}"),
            Err(e) => warn!("Failed to persist new user {user_id}: {e}"),
        }
        record
    }

    pub fn put_user(&self, user_id: i64, record: &UserRecord) -> Result<(), StoreError> {
        self.update(StoreKind::Users, |users: &mut UserMap| {
            users.insert(user_id.to_string(), record.clone());
        })
    }

    /// Apply `f` to a user's record (created with `create` if unseen) and persist.
    pub fn update_user<C, F, R>(&self, user_id: i64, create: C, f: F) -> Result<R, StoreError>
    where
        C: FnOnce(usize) -> UserRecord,
        F: FnOnce(&mut UserRecord) -> R,
    {
        self.update(StoreKind::Users, |users: &mut UserMap| {
            let count = users.len();
            let record = users.entry(user_id.to_string()).or_insert_with(|| create(count));
            f(record)
        })
    }

    pub fn all_users(&self) -> UserMap {
        self.load(StoreKind::Users)
    }

    // ==================== APPEND-ONLY DOCUMENTS ====================

    /// Store feedback under a fresh key; never overwrites an earlier entry.
    pub fn add_feedback(&self, entry: FeedbackEntry) -> Result<String, StoreError> {
        self.update(StoreKind::Feedback, |feedback: &mut FeedbackMap| {
            let micros = entry.timestamp.timestamp_micros();
            let mut key = format_feedback_key(micros);
            let mut bump = 1;
            while feedback.contains_key(&key) {
                key = format_feedback_key(micros + bump);
                bump += 1;
            }
            feedback.insert(key.clone(), entry);
            key
        })
    }

    pub fn add_reminder(&self, reminder: ReminderRecord) -> Result<(), StoreError> {
        self.update(StoreKind::Reminders, |reminders: &mut Vec<ReminderRecord>| {
            reminders.push(reminder);
        })
    }

    pub fn add_broadcast(&self, broadcast: BroadcastRecord) -> Result<(), StoreError> {
        self.update(StoreKind::Broadcasts, |broadcasts: &mut Vec<BroadcastRecord>| {
            broadcasts.push(broadcast);
        })
    }

    // ==================== TEXT LOGS ====================

    /// `<timestamp> - User <id> used command: <command>`
    pub fn log_command(&self, timestamp: &str, user_id: i64, command: &str) {
        self.append_line(LogKind::Commands, &format!("{timestamp} - User {user_id} used command: {command}"));
    }

    /// `[<timestamp>] <sender>: <text>`
    pub fn log_chat(&self, timestamp: &str, sender: &str, text: &str) {
        self.append_line(LogKind::ChatHistory, &format!("[{timestamp}] {sender}: {text}"));
    }

    /// Number of lines in the command log.
    pub fn command_count(&self) -> usize {
        let _guard = self.lock_log(LogKind::Commands);
        match std::fs::read_to_string(self.log_path(LogKind::Commands)) {
            Ok(content) => content.lines().count(),
            Err(e) => {
                warn!("Failed to read command log: {e}");
                0
            }
        }
    }

    fn append_line(&self, kind: LogKind, line: &str) {
        let _guard = self.lock_log(kind);
        let path = self.log_path(kind);
        let result = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .and_then(|mut f| writeln!(f, "{line}"));
        if let Err(e) = result {
            warn!("Failed to append to {:?}: {e}", path);
        }
    }

    // ==================== INTERNALS ====================

    fn read<T: DeserializeOwned + Default>(&self, kind: StoreKind) -> Result<T, StoreError> {
        let path = self.path(kind);
        let json = match std::fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(io_err(&path, e)),
        };
        if json.trim().is_empty() {
            return Ok(T::default());
        }
        serde_json::from_str(&json).map_err(|e| StoreError::Json { path, source: e })
    }

    fn write<T: Serialize>(&self, kind: StoreKind, value: &T) -> Result<(), StoreError> {
        let path = self.path(kind);
        let json = serde_json::to_string_pretty(value).map_err(|e| StoreError::Json {
            path: path.clone(),
            source: e,
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(|e| io_err(&tmp, e))?;
        std::fs::rename(&tmp, &path).map_err(|e| io_err(&path, e))
    }

    fn quarantine(&self, kind: StoreKind) -> Result<PathBuf, StoreError> {
        let path = self.path(kind);
        let backup = self
            .data_dir
            .join(format!("{}.corrupt-{}", kind.file_name(), Utc::now().timestamp_millis()));
        std::fs::rename(&path, &backup).map_err(|e| io_err(&path, e))?;
        Ok(backup)
    }

    fn lock(&self, kind: StoreKind) -> MutexGuard<'_, ()> {
        self.documents[kind.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn lock_log(&self, kind: LogKind) -> MutexGuard<'_, ()> {
        self.logs[kind.index()]
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn format_feedback_key(micros: i64) -> String {
    format!("{}.{:06}", micros.div_euclid(1_000_000), micros.rem_euclid(1_000_000))
}

fn io_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}
