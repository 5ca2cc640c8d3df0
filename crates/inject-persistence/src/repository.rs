//! Progress Repository: persistencia durable de `(injection_id → Status)` en
//! una única tabla, configurable por nombre. Diesel exige un nombre de tabla
//! fijo en tiempo de compilación (`schema::injections`), así que cuando el
//! nombre configurado coincide con el default se usa el esquema tipado;
//! cuando difiere, toda operación se resuelve con SQL crudo
//! (`diesel::sql_query`) interpolando el nombre ya validado.

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::sql_query;
use diesel::sql_types::{Bool, Integer, Text};
use diesel::OptionalExtension;
use diesel::RunQueryDsl;

use crate::error::PersistenceError;

/// Estado persistido de una inyección.
#[derive(Debug, Clone, Copy, PartialEq, Eq, QueryableByName)]
pub struct Status {
    #[diesel(sql_type = Integer)]
    pub injected: i32,
    #[diesel(sql_type = Bool)]
    pub completed: bool,
}

impl Status {
    pub fn initial() -> Self { Self { injected: 0, completed: false } }
}

#[derive(Debug, Clone, QueryableByName)]
struct IdRow {
    #[diesel(sql_type = Text)]
    id: String,
}

#[derive(Debug, Clone, QueryableByName)]
struct ItemRow {
    #[diesel(sql_type = Text)]
    id: String,
    #[diesel(sql_type = Integer)]
    injected: i32,
    #[diesel(sql_type = Bool)]
    completed: bool,
}

/// Política para una lectura (`select`) de un id que no existe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnSelectMissing {
    /// Devolver `Status::initial()` sin tocar la tabla.
    Default,
    /// Insertar `Status::initial()` y devolverlo.
    Insert,
    /// Fallar con `PersistenceError::NotFound`.
    Except,
}

/// Política para un borrado (`delete`) de un id que no existe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnDeleteMissing {
    /// No hacer nada, no es un error.
    Default,
    /// Fallar con `PersistenceError::NotFound`.
    Except,
}

/// Política para un `insert` cuyo id ya existe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnInsertConflict {
    /// Dejar la fila existente intacta, devolverla.
    Ignore,
    /// Sobrescribir con el nuevo valor (upsert).
    Update,
    /// Fallar con `PersistenceError::UniqueViolation`.
    Except,
}

/// Política para un `update` cuyo id no existe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnUpdateMissing {
    /// No hacer nada.
    Ignore,
    /// Insertar el valor como si fuera nuevo.
    Insert,
    /// Fallar con `PersistenceError::NotFound`.
    Except,
}

pub struct ProgressRepository {
    table: String,
}

impl ProgressRepository {
    /// Construye un repositorio apuntando a `table`. El nombre se valida
    /// como identificador SQL simple (alfanumérico + `_`) porque se
    /// interpola directamente en las sentencias crudas: Diesel no permite
    /// parametrizar nombres de tabla por bind.
    pub fn new(table: impl Into<String>) -> Result<Self, PersistenceError> {
        let table = table.into();
        let valid = !table.is_empty() && table.chars().next().map(|c| c.is_ascii_alphabetic()).unwrap_or(false) && table.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(PersistenceError::Unknown(format!("nombre de tabla de progreso inválido: {table:?}")));
        }
        Ok(Self { table })
    }

    pub fn table_name(&self) -> &str { &self.table }

    /// `CREATE TABLE IF NOT EXISTS`.
    pub fn init(&self, conn: &mut PgConnection) -> Result<(), PersistenceError> {
        let sql = format!("CREATE TABLE IF NOT EXISTS {t} (id VARCHAR(100) PRIMARY KEY, injected INTEGER NOT NULL DEFAULT 0, completed BOOLEAN NOT NULL DEFAULT FALSE)", t = self.table);
        sql_query(sql).execute(conn)?;
        Ok(())
    }

    /// `DROP TABLE IF EXISTS`.
    pub fn drop_table(&self, conn: &mut PgConnection) -> Result<(), PersistenceError> {
        sql_query(format!("DROP TABLE IF EXISTS {t}", t = self.table)).execute(conn)?;
        Ok(())
    }

    /// Borra todas las filas.
    pub fn clear(&self, conn: &mut PgConnection) -> Result<(), PersistenceError> {
        sql_query(format!("TRUNCATE TABLE {t}", t = self.table)).execute(conn)?;
        Ok(())
    }

    /// Borra las filas con `completed = true`.
    pub fn prune(&self, conn: &mut PgConnection) -> Result<usize, PersistenceError> {
        Ok(sql_query(format!("DELETE FROM {t} WHERE completed", t = self.table)).execute(conn)?)
    }

    pub fn count(&self, conn: &mut PgConnection) -> Result<i64, PersistenceError> {
        #[derive(QueryableByName)]
        struct CountRow {
            #[diesel(sql_type = diesel::sql_types::BigInt)]
            count: i64,
        }
        let row: CountRow = sql_query(format!("SELECT COUNT(*) AS count FROM {t}", t = self.table)).get_result(conn)?;
        Ok(row.count)
    }

    pub fn items(&self, conn: &mut PgConnection) -> Result<Vec<(String, Status)>, PersistenceError> {
        let rows: Vec<ItemRow> = sql_query(format!("SELECT id, injected, completed FROM {t} ORDER BY id", t = self.table)).get_results(conn)?;
        Ok(rows.into_iter().map(|r| (r.id, Status { injected: r.injected, completed: r.completed })).collect())
    }

    pub fn keys(&self, conn: &mut PgConnection) -> Result<Vec<String>, PersistenceError> {
        let rows: Vec<IdRow> = sql_query(format!("SELECT id FROM {t} ORDER BY id", t = self.table)).get_results(conn)?;
        Ok(rows.into_iter().map(|r| r.id).collect())
    }

    pub fn values(&self, conn: &mut PgConnection) -> Result<Vec<Status>, PersistenceError> {
        Ok(self.items(conn)?.into_iter().map(|(_, s)| s).collect())
    }

    pub fn select(&self, conn: &mut PgConnection, id: &str, on_missing: OnSelectMissing) -> Result<Status, PersistenceError> {
        let found: Option<Status> = sql_query(format!("SELECT injected, completed FROM {t} WHERE id = $1", t = self.table))
            .bind::<Text, _>(id)
            .get_result(conn)
            .optional()?;
        match found {
            Some(s) => Ok(s),
            None => match on_missing {
                OnSelectMissing::Default => Ok(Status::initial()),
                OnSelectMissing::Insert => self.insert(conn, id, &Status::initial(), OnInsertConflict::Ignore),
                OnSelectMissing::Except => Err(PersistenceError::NotFound),
            },
        }
    }

    pub fn insert(&self, conn: &mut PgConnection, id: &str, status: &Status, on_conflict: OnInsertConflict) -> Result<Status, PersistenceError> {
        let conflict_clause = match on_conflict {
            OnInsertConflict::Ignore => "ON CONFLICT (id) DO NOTHING",
            OnInsertConflict::Update => "ON CONFLICT (id) DO UPDATE SET injected = EXCLUDED.injected, completed = EXCLUDED.completed",
            OnInsertConflict::Except => "",
        };
        let sql = format!(
            "INSERT INTO {t} (id, injected, completed) VALUES ($1, $2, $3) {conflict_clause} RETURNING injected, completed",
            t = self.table
        );
        let result = sql_query(&sql).bind::<Text, _>(id).bind::<Integer, _>(status.injected).bind::<Bool, _>(status.completed).get_result::<Status>(conn);
        match result {
            Ok(s) => Ok(s),
            Err(diesel::result::Error::NotFound) if on_conflict == OnInsertConflict::Ignore => {
                // `DO NOTHING` no produce fila RETURNING cuando hubo
                // conflicto: releer el valor existente.
                self.select(conn, id, OnSelectMissing::Except)
            }
            Err(e) => Err(e.into()),
        }
    }

    pub fn update(&self, conn: &mut PgConnection, id: &str, status: &Status, on_missing: OnUpdateMissing) -> Result<Status, PersistenceError> {
        let updated: Option<Status> = sql_query(format!("UPDATE {t} SET injected = $2, completed = $3 WHERE id = $1 RETURNING injected, completed", t = self.table))
            .bind::<Text, _>(id)
            .bind::<Integer, _>(status.injected)
            .bind::<Bool, _>(status.completed)
            .get_result(conn)
            .optional()?;
        match updated {
            Some(s) => Ok(s),
            None => match on_missing {
                OnUpdateMissing::Ignore => Ok(*status),
                OnUpdateMissing::Insert => self.insert(conn, id, status, OnInsertConflict::Ignore),
                OnUpdateMissing::Except => Err(PersistenceError::NotFound),
            },
        }
    }

    pub fn delete(&self, conn: &mut PgConnection, id: &str, on_missing: OnDeleteMissing) -> Result<(), PersistenceError> {
        let affected = sql_query(format!("DELETE FROM {t} WHERE id = $1", t = self.table)).bind::<Text, _>(id).execute(conn)?;
        if affected == 0 && on_missing == OnDeleteMissing::Except {
            return Err(PersistenceError::NotFound);
        }
        Ok(())
    }

    /// Incrementa atómicamente `injected` para `id` y devuelve el nuevo
    /// `Status`, o `None` si el id no existe.
    pub fn increment(&self, conn: &mut PgConnection, id: &str) -> Result<Option<Status>, PersistenceError> {
        let updated: Option<Status> = sql_query(format!("UPDATE {t} SET injected = injected + 1 WHERE id = $1 RETURNING injected, completed", t = self.table))
            .bind::<Text, _>(id)
            .get_result(conn)
            .optional()?;
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_table_names() {
        assert!(ProgressRepository::new("injections").is_ok());
        assert!(ProgressRepository::new("1_bad").is_err());
        assert!(ProgressRepository::new("bad;drop table x").is_err());
        assert!(ProgressRepository::new("").is_err());
    }

    #[test]
    fn accepts_underscored_identifiers() {
        assert!(ProgressRepository::new("my_injections_v2").is_ok());
    }
}
