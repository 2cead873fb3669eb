//! SQLite schema definitions
//!
//! Column names are camelCase and must be quoted in SQL. Timestamps are
//! stored as `YYYY-MM-DD HH:MM:SS` text in UTC so `datetime()` can compare
//! them; JSON values (tags, answers, rule groups) are stored as text.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Contacts
-- =============================================================================
CREATE TABLE IF NOT EXISTS contacts (
    "id" TEXT PRIMARY KEY,
    "email" TEXT NOT NULL UNIQUE,
    "firstname" TEXT NOT NULL DEFAULT '',
    "lastname" TEXT NOT NULL DEFAULT '',
    "joined" TEXT NOT NULL,
    "lastSeen" TEXT,
    "contributionType" TEXT NOT NULL DEFAULT 'None'
        CHECK("contributionType" IN ('Automatic', 'Manual', 'Gift', 'None')),
    "contributionMonthlyAmount" REAL,
    "contributionPeriod" TEXT CHECK("contributionPeriod" IN ('monthly', 'annually')),
    "deliveryOptIn" INTEGER NOT NULL DEFAULT 0,
    "newsletterStatus" TEXT NOT NULL DEFAULT 'none'
        CHECK("newsletterStatus" IN ('subscribed', 'unsubscribed', 'cleaned', 'pending', 'none')),
    "tags" TEXT NOT NULL DEFAULT '[]',
    "notes" TEXT NOT NULL DEFAULT ''
);

CREATE INDEX IF NOT EXISTS idx_contacts_joined ON contacts("joined");

-- =============================================================================
-- 2. Contact roles (membership periods and admin grants)
-- =============================================================================
CREATE TABLE IF NOT EXISTS contact_roles (
    "contactId" TEXT NOT NULL REFERENCES contacts("id") ON DELETE CASCADE,
    "type" TEXT NOT NULL CHECK("type" IN ('member', 'admin', 'superadmin')),
    "dateAdded" TEXT NOT NULL,
    "dateExpires" TEXT,
    PRIMARY KEY ("contactId", "type")
);

-- =============================================================================
-- 3. Callouts (surveys) and their responses
-- =============================================================================
CREATE TABLE IF NOT EXISTS callouts (
    "id" TEXT PRIMARY KEY,
    "title" TEXT NOT NULL,
    "starts" TEXT,
    "expires" TEXT,
    "hidden" INTEGER NOT NULL DEFAULT 0,
    "formSchema" TEXT NOT NULL DEFAULT '{"slides":[]}'
);

CREATE TABLE IF NOT EXISTS callout_responses (
    "id" TEXT PRIMARY KEY,
    "calloutId" TEXT NOT NULL REFERENCES callouts("id") ON DELETE CASCADE,
    "contactId" TEXT REFERENCES contacts("id") ON DELETE SET NULL,
    "answers" TEXT NOT NULL DEFAULT '{}',
    "bucket" TEXT NOT NULL DEFAULT '',
    "isBookmarked" INTEGER NOT NULL DEFAULT 0,
    "createdAt" TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_callout_responses_callout ON callout_responses("calloutId", "contactId");

-- =============================================================================
-- 4. Payments
-- =============================================================================
CREATE TABLE IF NOT EXISTS payments (
    "id" TEXT PRIMARY KEY,
    "contactId" TEXT REFERENCES contacts("id") ON DELETE SET NULL,
    "chargeDate" TEXT NOT NULL,
    "amount" REAL NOT NULL,
    "amountRefunded" REAL,
    "status" TEXT NOT NULL
        CHECK("status" IN ('pending', 'successful', 'failed', 'cancelled'))
);

CREATE INDEX IF NOT EXISTS idx_payments_contact ON payments("contactId");

-- =============================================================================
-- 5. Segments (saved contact searches)
-- =============================================================================
CREATE TABLE IF NOT EXISTS segments (
    "id" TEXT PRIMARY KEY,
    "name" TEXT NOT NULL CHECK(length("name") >= 1 AND length("name") <= 100),
    "description" TEXT NOT NULL DEFAULT '',
    "order" INTEGER NOT NULL DEFAULT 0,
    "ruleGroup" TEXT NOT NULL,
    "createdAt" TEXT NOT NULL,
    "updatedAt" TEXT NOT NULL
);
"#;
