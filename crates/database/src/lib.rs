//! SQLite persistence layer for the calendar assistant.
//!
//! This crate provides async database operations for users, conversations,
//! notification preferences and the notification ledger using SQLx with SQLite.
//!
//! # Example
//!
//! ```no_run
//! use database::{Database, models::User, user};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:calendar_assistant.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let user = User {
//!         id: "user-1".to_string(),
//!         name: "Alice".to_string(),
//!         email: Some("alice@example.com".to_string()),
//!     };
//!     user::create_user(db.pool(), &user).await?;
//!
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod conversation;
pub mod credential;
pub mod error;
pub mod lease;
pub mod message;
pub mod models;
pub mod notification_preference;
pub mod sent_notification;
pub mod user;
pub mod validation;

pub use error::{DatabaseError, Result};
pub use models::{
    CalendarCredential, Channel, Conversation, Lease, Message, NewMessage, NotificationPreference,
    NotificationStatus, SentNotification, Sender, User,
};
pub use validation::ValidationError;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(pool_size, "Connected to database");

        Ok(Self { pool })
    }

    /// In-memory database with migrations applied, on a single connection.
    pub async fn in_memory() -> Result<Self> {
        let db = Self::connect_with_pool_size("sqlite::memory:", 1).await?;
        db.migrate().await?;
        Ok(db)
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}
