//! # chat-db
//!
//! Durable storage for messages and user presence, implementing the
//! `chat-core` repository traits with PostgreSQL via SQLx.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chat_core::SnowflakeGenerator;
//! use chat_db::{create_pool, run_migrations, DatabaseConfig, PgMessageRepository};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = create_pool(&DatabaseConfig::default()).await?;
//!     run_migrations(&pool).await?;
//!     let messages = PgMessageRepository::new(pool, Arc::new(SnowflakeGenerator::new(1)));
//!     Ok(())
//! }
//! ```

pub mod mappers;
pub mod models;
pub mod pool;
pub mod repositories;

// Re-export commonly used types
pub use pool::{create_pool, run_migrations, DatabaseConfig, PgPool};
pub use repositories::{PgMessageRepository, PgUserRepository};
