//! inject-persistence
//!
//! Capa de persistencia Postgres (Diesel): el Connection Manager y el
//! Progress Repository. No sabe nada del Splitter ni del codec: eso vive en
//! `inject-core` y se compone en `inject-orchestrator`.

pub mod config;
pub mod connection;
pub mod error;
pub mod migrations;
pub mod repository;
pub mod retry;
pub mod schema;

pub use config::{init_dotenv, DbConfig};
pub use connection::{commit_after, transactional, with_session, ConnectOptions, ConnectionManager, SessionOptions};
pub use error::PersistenceError;
pub use repository::{OnDeleteMissing, OnInsertConflict, OnSelectMissing, OnUpdateMissing, ProgressRepository, Status};
pub use retry::RetryManager;
