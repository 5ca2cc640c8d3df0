//! Modelo de datos de una inyección: configuración declarativa, registros
//! tipados y lotes.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codec::TypedValue;

/// Registro ya tipado emitido por un `SourceReader`. Preserva el orden de
/// columnas declarado/derivado (propiedades primero, luego columnas).
pub type TypedRecord = IndexMap<String, TypedValue>;

/// Política de columnas no mapeadas explícitamente ("extras").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColsExtra {
    Keep,
    Drop,
}

/// Opciones de apertura de un archivo fuente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileSpec {
    pub path: String,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
    #[serde(default)]
    pub skip_head: bool,
    /// Codificación declarada del archivo. `None` y `"utf-8"`/`"utf8"`
    /// (sin distinguir mayúsculas) son los únicos valores aceptados: el
    /// lector decodifica con `std::io::BufReader`, que sólo entiende UTF-8
    /// (y sus subconjuntos, p. ej. ASCII). Cualquier otro nombre es un
    /// error de configuración detectado antes de abrir el archivo, no un
    /// fallo de E/S silencioso.
    #[serde(default)]
    pub encoding: Option<String>,
}

impl FileSpec {
    pub fn validate(&self) -> Result<(), crate::errors::SourceError> {
        match &self.encoding {
            None => Ok(()),
            Some(enc) if enc.eq_ignore_ascii_case("utf-8") || enc.eq_ignore_ascii_case("utf8") => Ok(()),
            Some(other) => Err(crate::errors::SourceError::UnsupportedEncoding(other.clone())),
        }
    }
}

fn default_delimiter() -> char { ',' }

/// Reglas de tipado por columna para una fuente.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TypingSpec {
    /// columna → typekey explícita (puede llevar banderas `[null]`, etc).
    #[serde(default)]
    pub types_map: IndexMap<String, String>,
    /// typekey aplicada a columnas no listadas en `types_map`. `None`
    /// significa "no convertir, dejar como texto crudo".
    #[serde(default)]
    pub extra_type: Option<String>,
}

/// Reglas de proyección/renombrado de columnas para una fuente.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TreatmentSpec {
    /// Nombres de columna explícitos; si se declara, la primera línea de
    /// datos NO se consume como cabecera.
    #[serde(default)]
    pub cols_names: Option<Vec<String>>,
    #[serde(default)]
    pub cols_drop: Vec<String>,
    #[serde(default = "default_cols_extra")]
    pub cols_extra: ColsExtra,
    /// columna original → nombre proyectado.
    #[serde(default)]
    pub cols_rename: IndexMap<String, String>,
    /// columna proyectada → nombre de un formateador de valor.
    /// El núcleo únicamente reconoce `"trim"`, `"upper"`, `"lower"` de forma
    /// incorporada; cualquier otro nombre se aplica como identidad (la
    /// resolución de formateadores custom es responsabilidad del llamador,
    /// vía `SourceSpec::value_formatters`).
    #[serde(default)]
    pub cols_format_map: IndexMap<String, String>,
}

fn default_cols_extra() -> ColsExtra { ColsExtra::Keep }

impl Default for TreatmentSpec {
    fn default() -> Self {
        Self { cols_names: None, cols_drop: Vec::new(), cols_extra: ColsExtra::Keep, cols_rename: IndexMap::new(), cols_format_map: IndexMap::new() }
    }
}

/// Especificación completa de una fuente dentro de una `InjectionConfig`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceSpec {
    pub file: FileSpec,
    #[serde(default)]
    pub typing: TypingSpec,
    #[serde(default)]
    pub treatment: TreatmentSpec,
    /// Atributo→valor prependido a todo registro emitido por esta fuente.
    #[serde(default)]
    pub properties: IndexMap<String, TypedValue>,
}

/// Opciones globales de una inyección.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionOptions {
    #[serde(default = "default_atom_size")]
    pub atom_size: usize,
}

fn default_atom_size() -> usize { 1000 }

impl Default for InjectionOptions {
    fn default() -> Self { Self { atom_size: default_atom_size() } }
}

/// Configuración declarativa completa de una inyección.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InjectionConfig {
    pub id: String,
    /// Orden de iteración = orden de declaración (preservado por
    /// `IndexMap`).
    pub sources: IndexMap<String, SourceSpec>,
    #[serde(default)]
    pub options: InjectionOptions,
}

impl InjectionConfig {
    pub fn validate(&self) -> Result<(), crate::errors::SourceError> {
        if self.id.is_empty() || self.id.len() > 100 {
            return Err(crate::errors::SourceError::DuplicateSource("id inválido (1..=100 chars)".into()));
        }
        if self.options.atom_size == 0 {
            return Err(crate::errors::SourceError::InvalidAtomSize);
        }
        for spec in self.sources.values() {
            spec.file.validate()?;
        }
        Ok(())
    }
}

/// Un lote de registros tipados provenientes de una única fuente.
#[derive(Debug, Clone)]
pub struct Batch {
    pub source_id: String,
    pub records: Vec<TypedRecord>,
}

impl Batch {
    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::SourceError;

    fn file_spec(encoding: Option<&str>) -> FileSpec {
        FileSpec { path: "ignored.csv".into(), delimiter: ',', skip_head: false, encoding: encoding.map(str::to_string) }
    }

    #[test]
    fn missing_encoding_is_accepted() {
        assert!(file_spec(None).validate().is_ok());
    }

    #[test]
    fn utf8_spellings_are_accepted_case_insensitively() {
        assert!(file_spec(Some("utf-8")).validate().is_ok());
        assert!(file_spec(Some("UTF8")).validate().is_ok());
    }

    #[test]
    fn other_encodings_are_a_configuration_error() {
        assert!(matches!(file_spec(Some("latin-1")).validate(), Err(SourceError::UnsupportedEncoding(_))));
    }

    #[test]
    fn atom_size_zero_is_rejected() {
        let cfg = InjectionConfig { id: "x".into(), sources: IndexMap::new(), options: InjectionOptions { atom_size: 0 } };
        assert!(matches!(cfg.validate(), Err(SourceError::InvalidAtomSize)));
    }
}
