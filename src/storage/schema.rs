//! Database schema definitions using sea-query.
//!
//! These define the table and column identifiers for type-safe query building,
//! plus the per-backend DDL executed by `LedgerStore::init_schema`.
//!
//! Amounts are stored as integer hundredths of a point. Balance columns carry
//! `CHECK (>= 0)` so a buggy debit can never commit a negative balance.

use sea_query::Iden;

/// Users table schema.
#[derive(Iden)]
pub enum Users {
    Table,
    #[iden = "login"]
    Login,
    #[iden = "password_hash"]
    PasswordHash,
    #[iden = "current_balance"]
    CurrentBalance,
    #[iden = "withdrawn"]
    Withdrawn,
    #[iden = "created_at"]
    CreatedAt,
}

/// Orders table schema.
#[derive(Iden)]
pub enum Orders {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "number"]
    Number,
    #[iden = "login"]
    Login,
    #[iden = "status"]
    Status,
    #[iden = "accrual"]
    Accrual,
    #[iden = "uploaded_at"]
    UploadedAt,
}

/// Withdrawals table schema.
#[derive(Iden)]
pub enum Withdrawals {
    Table,
    #[iden = "id"]
    Id,
    #[iden = "login"]
    Login,
    #[iden = "order_number"]
    OrderNumber,
    #[iden = "sum"]
    Sum,
    #[iden = "processed_at"]
    ProcessedAt,
}

/// SQLite DDL, one statement per entry.
pub const SQLITE_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS users (
    login TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    current_balance INTEGER NOT NULL DEFAULT 0 CHECK (current_balance >= 0),
    withdrawn INTEGER NOT NULL DEFAULT 0 CHECK (withdrawn >= 0),
    created_at TEXT NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS orders (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    number TEXT NOT NULL UNIQUE,
    login TEXT NOT NULL REFERENCES users(login),
    status TEXT NOT NULL DEFAULT 'NEW',
    accrual INTEGER,
    uploaded_at TEXT NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_orders_login ON orders(login, uploaded_at)",
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
    r#"
CREATE TABLE IF NOT EXISTS withdrawals (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    login TEXT NOT NULL REFERENCES users(login),
    order_number TEXT NOT NULL,
    sum INTEGER NOT NULL CHECK (sum > 0),
    processed_at TEXT NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_withdrawals_login ON withdrawals(login, processed_at)",
];

/// PostgreSQL DDL, one statement per entry.
pub const POSTGRES_SCHEMA: &[&str] = &[
    r#"
CREATE TABLE IF NOT EXISTS users (
    login TEXT PRIMARY KEY,
    password_hash TEXT NOT NULL,
    current_balance BIGINT NOT NULL DEFAULT 0 CHECK (current_balance >= 0),
    withdrawn BIGINT NOT NULL DEFAULT 0 CHECK (withdrawn >= 0),
    created_at TIMESTAMPTZ NOT NULL
)"#,
    r#"
CREATE TABLE IF NOT EXISTS orders (
    id BIGSERIAL PRIMARY KEY,
    number TEXT NOT NULL UNIQUE,
    login TEXT NOT NULL REFERENCES users(login),
    status TEXT NOT NULL DEFAULT 'NEW',
    accrual BIGINT,
    uploaded_at TIMESTAMPTZ NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_orders_login ON orders(login, uploaded_at)",
    "CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)",
    r#"
CREATE TABLE IF NOT EXISTS withdrawals (
    id BIGSERIAL PRIMARY KEY,
    login TEXT NOT NULL REFERENCES users(login),
    order_number TEXT NOT NULL,
    sum BIGINT NOT NULL CHECK (sum > 0),
    processed_at TIMESTAMPTZ NOT NULL
)"#,
    "CREATE INDEX IF NOT EXISTS idx_withdrawals_login ON withdrawals(login, processed_at)",
];
