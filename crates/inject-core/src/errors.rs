//! Taxonomía de errores de la capa de lectura/codificación.
//!
//! `CodecError` cubre el registro de tipos textuales (TexTyper);
//! `SourceError` cubre la apertura/lectura de fuentes y la proyección de
//! columnas (Source Reader / Splitter).

use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CodecError {
    #[error("clave de tipo desconocida: {0}")]
    UnknownKey(String),

    #[error("tipo no soportado por este typer")]
    UnsupportedType,

    #[error("fallo al convertir valor para la clave {key}: {cause}")]
    ConversionFailed { key: String, cause: String },

    #[error("texto no reconocido por ningún tipo registrado: {0:?}")]
    UnrecognizedText(String),
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("error de E/S en fuente {source_id}: {cause}")]
    Io { source_id: String, cause: std::io::Error },

    #[error("error de E/S en fuente {source_id} (línea {line}): {cause}")]
    IoAtLine { source_id: String, line: u64, cause: String },

    #[error("error de decodificación en fuente {source_id}: {cause}")]
    Decode { source_id: String, #[source] cause: CodecError },

    #[error("fuente duplicada: {0}")]
    DuplicateSource(String),

    #[error("atom_size debe ser mayor que cero")]
    InvalidAtomSize,

    #[error("codificación de texto no soportada: {0} (solo UTF-8)")]
    UnsupportedEncoding(String),
}
