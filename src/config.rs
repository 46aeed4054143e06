use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Default number of bookmarks requested per page when building the remote index.
pub const DEFAULT_PAGE_SIZE: u32 = 100;
/// Default pause between two remote calls.
pub const DEFAULT_REQUEST_DELAY_MS: u64 = 100;
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Where the OpenWebUI chats are read from.
#[derive(Clone, PartialEq, Eq)]
pub enum ChatDatabase {
    /// SQLite file (`webui.db`), opened read-only.
    Sqlite(PathBuf),
    /// PostgreSQL connection string, URL or `key=value` form.
    Postgres(String),
}

impl std::fmt::Debug for ChatDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChatDatabase::Sqlite(path) => f.debug_tuple("Sqlite").field(path).finish(),
            // connection strings usually carry a password
            ChatDatabase::Postgres(_) => f.debug_tuple("Postgres").field(&"<redacted>").finish(),
        }
    }
}

/// Configuration required to run a sync.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Clone)]
pub struct SyncConfig {
    pub database: ChatDatabase,
    /// Karakeep API root, including the `/api/v1` segment.
    pub api_url: Url,
    pub api_key: String,
    /// Name of the Karakeep list that receives the chats.
    pub list_name: String,
    pub state_file: PathBuf,
    pub page_size: u32,
    pub request_delay: Duration,
    pub timeout: Duration,
    pub quiet: bool,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field("database", &self.database)
            .field("api_url", &self.api_url.as_str())
            .field("api_key", &"<redacted>")
            .field("list_name", &self.list_name)
            .field("state_file", &self.state_file)
            .field("page_size", &self.page_size)
            .field("request_delay", &self.request_delay)
            .field("timeout", &self.timeout)
            .field("quiet", &self.quiet)
            .finish()
    }
}
