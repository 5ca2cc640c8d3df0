//! Wrapper para correr las migraciones embebidas de la tabla de progreso.

use diesel::pg::PgConnection;
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use crate::error::PersistenceError;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!();

/// Corre las migraciones pendientes sobre `conn`. Sólo crea la tabla por
/// defecto (`injections`); si el operador configuró un nombre de tabla
/// distinto, usar `ProgressRepository::init` en su lugar (ver
/// `Mode::REPO_NOT_INIT` en `inject-orchestrator`).
pub fn run_pending_migrations(conn: &mut PgConnection) -> Result<(), PersistenceError> {
    conn.run_pending_migrations(MIGRATIONS).map(|_| ()).map_err(|e| PersistenceError::Unknown(format!("error de migración: {e}")))
}
