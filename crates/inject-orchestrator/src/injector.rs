//! Contrato del `injector`: el callback opaco, suministrado por cada
//! consumidor por esquema, que traduce un lote tipado a DML concreto contra
//! la misma conexión que el orquestador ya tiene abierta dentro de la
//! transacción del lote.
//!
//! El núcleo no sabe nada de lo que hay dentro de `inject`: sólo garantiza
//! que corre dentro de la misma transacción que el incremento de progreso.

use diesel::pg::PgConnection;
use inject_core::Batch;
use inject_persistence::PersistenceError;

pub trait Injector: Send + Sync {
    /// Aplica el DML de `batch` sobre `conn`. Cualquier error se propaga y
    /// provoca el rollback de la transacción completa (DML + incremento de
    /// progreso), de modo que el lote se reintenta entero en la próxima
    /// corrida.
    fn inject(&self, conn: &mut PgConnection, batch: &Batch) -> Result<(), PersistenceError>;
}

/// Adaptador para usar un closure corriente como `Injector`.
impl<F> Injector for F
where
    F: Fn(&mut PgConnection, &Batch) -> Result<(), PersistenceError> + Send + Sync,
{
    fn inject(&self, conn: &mut PgConnection, batch: &Batch) -> Result<(), PersistenceError> { self(conn, batch) }
}
