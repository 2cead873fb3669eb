// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display)
pub const APP_NAME: &str = "Memberbase";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "memberbase.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "MEMBERBASE_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "MEMBERBASE_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "MEMBERBASE_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "MEMBERBASE_LOG";

/// Default log filter when neither MEMBERBASE_LOG nor RUST_LOG is set
pub const DEFAULT_LOG_FILTER: &str = "info,memberbase_server=info";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5390;

// =============================================================================
// Environment Variables - Database
// =============================================================================

/// Environment variable for the SQLite database path
pub const ENV_DATABASE_PATH: &str = "MEMBERBASE_DATABASE_PATH";

/// Environment variable for the connection pool size
pub const ENV_DATABASE_MAX_CONNECTIONS: &str = "MEMBERBASE_DATABASE_MAX_CONNECTIONS";

// =============================================================================
// SQLite Database
// =============================================================================

/// Default SQLite database path
pub const DEFAULT_DATABASE_PATH: &str = "memberbase.db";

/// Path value selecting an in-memory database
pub const SQLITE_MEMORY_PATH: &str = ":memory:";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Search
// =============================================================================

/// Environment variable for the largest accepted page size
pub const ENV_SEARCH_MAX_PAGE_LIMIT: &str = "MEMBERBASE_SEARCH_MAX_PAGE_LIMIT";

/// Largest accepted page size
pub const DEFAULT_MAX_PAGE_LIMIT: u32 = 500;

/// Page size when the request names none
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Largest accepted `rules` JSON document (64KB)
pub const DEFAULT_MAX_RULES_JSON_BYTES: usize = 64 * 1024;

/// Largest accepted request body (256KB)
pub const MAX_REQUEST_BODY_BYTES: usize = 256 * 1024;

// =============================================================================
// Caller Identity Headers
// =============================================================================

/// Header carrying the authenticated contact id, set by the auth gateway
pub const HEADER_CONTACT_ID: &str = "x-contact-id";

/// Header carrying the authenticated contact's role
pub const HEADER_CONTACT_ROLE: &str = "x-contact-role";

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for in-flight requests during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 10;
