use std::time::Duration;

use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, Statement};
use tracing::{debug, info};

use crate::config::AppConfig;

/// Type alias for a database connection pool
pub type DbPool = DatabaseConnection;

/// Configuration for database connection
#[derive(Debug, Clone)]
pub struct DbConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout: Duration,
    pub idle_timeout: Duration,
    pub acquire_timeout: Duration,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            max_connections: 10,
            min_connections: 1,
            connect_timeout: Duration::from_secs(30),
            idle_timeout: Duration::from_secs(600),
            acquire_timeout: Duration::from_secs(8),
        }
    }
}

impl From<&AppConfig> for DbConfig {
    fn from(cfg: &AppConfig) -> Self {
        Self {
            url: cfg.database_url.clone(),
            max_connections: cfg.db_max_connections,
            min_connections: cfg.db_min_connections,
            connect_timeout: Duration::from_secs(cfg.db_connect_timeout_secs),
            idle_timeout: Duration::from_secs(cfg.db_idle_timeout_secs),
            acquire_timeout: Duration::from_secs(cfg.db_acquire_timeout_secs),
        }
    }
}

/// Establishes a connection pool to the database
pub async fn establish_connection(database_url: &str) -> Result<DbPool, DbErr> {
    let config = DbConfig {
        url: database_url.to_string(),
        ..Default::default()
    };
    establish_connection_with_config(&config).await
}

/// Establishes a connection pool with explicit tuning
pub async fn establish_connection_with_config(config: &DbConfig) -> Result<DbPool, DbErr> {
    debug!("Configuring database connection with: {:?}", config);

    let mut opt = ConnectOptions::new(config.url.clone());
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(config.connect_timeout)
        .acquire_timeout(config.acquire_timeout)
        .idle_timeout(config.idle_timeout)
        .sqlx_logging(false);

    info!(
        "Connecting to database with max_connections={}",
        config.max_connections
    );

    let pool = Database::connect(opt).await?;
    info!("Database connection pool established successfully");
    Ok(pool)
}

/// Establish DB pool using AppConfig tuning
pub async fn establish_connection_from_app_config(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    let db_cfg: DbConfig = cfg.into();
    establish_connection_with_config(&db_cfg).await
}

// Embedded DDL, ordered parent-first. Idempotent: every statement guards with
// IF NOT EXISTS so repeated startups are safe.
const SCHEMA_STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS users (
        id TEXT PRIMARY KEY NOT NULL,
        email TEXT NOT NULL UNIQUE,
        full_name TEXT NOT NULL,
        role TEXT NOT NULL DEFAULT 'customer',
        is_admin INTEGER NOT NULL DEFAULT 0,
        is_verify INTEGER NOT NULL DEFAULT 0,
        verification_status TEXT,
        seller_type TEXT,
        phone TEXT,
        inn TEXT,
        company_name TEXT,
        address TEXT,
        passport_number TEXT,
        passport_issued_by TEXT,
        passport_issue_date TEXT,
        verification_rejection_reason TEXT,
        verification_requested_at TEXT,
        verification_approved_at TEXT,
        verification_rejected_at TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE UNIQUE INDEX IF NOT EXISTS idx_users_inn
        ON users (inn) WHERE inn IS NOT NULL;"#,
    r#"CREATE TABLE IF NOT EXISTS products (
        id TEXT PRIMARY KEY NOT NULL,
        seller_id TEXT NOT NULL,
        name TEXT NOT NULL,
        price REAL NOT NULL,
        is_published INTEGER NOT NULL DEFAULT 1,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS carts (
        id TEXT PRIMARY KEY NOT NULL,
        user_id TEXT NOT NULL UNIQUE,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS cart_items (
        id TEXT PRIMARY KEY NOT NULL,
        cart_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE TABLE IF NOT EXISTS orders (
        id TEXT PRIMARY KEY NOT NULL,
        order_number TEXT NOT NULL UNIQUE,
        user_id TEXT NOT NULL,
        status TEXT NOT NULL DEFAULT 'pending',
        full_name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone TEXT NOT NULL,
        address TEXT NOT NULL,
        total_amount REAL NOT NULL,
        payment_reference TEXT,
        paid INTEGER NOT NULL DEFAULT 0,
        tracking_number TEXT,
        notes TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
    r#"CREATE INDEX IF NOT EXISTS idx_orders_user_id ON orders (user_id);"#,
    r#"CREATE TABLE IF NOT EXISTS order_items (
        id TEXT PRIMARY KEY NOT NULL,
        order_id TEXT NOT NULL,
        product_id TEXT NOT NULL,
        product_name TEXT NOT NULL,
        quantity INTEGER NOT NULL,
        price REAL NOT NULL,
        is_send INTEGER NOT NULL DEFAULT 0
    );"#,
    r#"CREATE INDEX IF NOT EXISTS idx_order_items_order_id ON order_items (order_id);"#,
    r#"CREATE TABLE IF NOT EXISTS settings (
        key TEXT PRIMARY KEY NOT NULL,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );"#,
];

/// Bootstrap the schema. Safe to call on every startup.
pub async fn ensure_schema(pool: &DbPool) -> Result<(), DbErr> {
    info!("Ensuring database schema");
    let backend = pool.get_database_backend();
    for sql in SCHEMA_STATEMENTS {
        pool.execute(Statement::from_string(backend, (*sql).to_string()))
            .await?;
    }
    info!("Database schema ready");
    Ok(())
}

/// Checks if the database connection is active
pub async fn check_connection(pool: &DbPool) -> Result<(), DbErr> {
    pool.ping().await
}

/// Closes the database connection pool
pub async fn close_pool(pool: DbPool) -> Result<(), DbErr> {
    info!("Closing database connection pool");
    pool.close().await
}
