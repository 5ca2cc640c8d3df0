//! Taxonomía de errores del orquestador: agrega los errores de sus tres
//! colaboradores (Splitter/Source Reader, Progress Repository/Connection
//! Manager) y añade sus propias condiciones de configuración/invariante.

use inject_core::SourceError;
use inject_persistence::PersistenceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("error de configuración: {0}")]
    Configuration(String),

    #[error("error en la fuente/splitter: {0}")]
    Source(#[from] SourceError),

    #[error("error de persistencia: {0}")]
    Persistence(#[from] PersistenceError),

    /// Siempre un bug, nunca una condición esperable en producción: el
    /// estado interno del orquestador dejó de ser consistente con lo que
    /// persistió (p. ej. un lote incrementado que la tabla de progreso no
    /// reconoce).
    #[error("invariante interno violado: {0}")]
    Internal(String),

    /// La corrida fue cancelada cooperativamente entre lotes.
    #[error("corrida cancelada tras el lote {last_committed}")]
    Cancelled { last_committed: u32 },
}
