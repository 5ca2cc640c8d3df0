//! Esquema Diesel de la tabla de progreso. El nombre lógico es `injections`;
//! Diesel necesita un nombre de tabla fijo en tiempo de compilación, así que
//! un nombre de tabla configurable en tiempo de ejecución (`DbConfig`) se
//! resuelve con SQL crudo en `repository.rs` en vez de con este módulo
//! cuando difiere del default.

diesel::table! {
    injections (id) {
        id -> Varchar,
        injected -> Integer,
        completed -> Bool,
    }
}
