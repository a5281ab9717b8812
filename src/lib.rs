pub mod api;
pub mod catalog;
pub mod config;
pub mod enrollment;
pub mod error;
pub mod user;
pub mod utils;

/// Embedded schema migrations, shared by the server and the tests.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!();
