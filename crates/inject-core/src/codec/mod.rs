//! TexTyper: códec bidireccional texto ⇄ valor tipado.
//!
//! Un `TexTyper` mantiene una lista ordenada de `TexType` registrados. El
//! orden de registro decide qué tipo gana en modo `auto` (primer `matches`
//! exitoso). Las claves (`typekey`) pueden llevar prefijos de bandera entre
//! corchetes (`[null]`, `[squote]`, `[dquote]`, `[quote]`) que se extraen
//! antes de resolver la clave desnuda.

pub mod types;

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::errors::CodecError;

/// Valor ya tipado, producido por `TexTyper::load` o consumido por
/// `TexTyper::dump`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypedValue {
    Int(i64),
    Float(f64),
    Decimal(bigdecimal::BigDecimal),
    Bool(bool),
    Text(String),
    Null,
}

impl fmt::Display for TypedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedValue::Int(v) => write!(f, "{v}"),
            TypedValue::Float(v) => write!(f, "{v}"),
            TypedValue::Decimal(v) => write!(f, "{v}"),
            TypedValue::Bool(v) => write!(f, "{v}"),
            TypedValue::Text(v) => write!(f, "{v}"),
            TypedValue::Null => write!(f, "null"),
        }
    }
}

/// Banderas codificables como prefijos `[name]` sobre una typekey.
pub mod flags {
    pub const NULL: u8 = 0b0001;
    pub const SQUOTE: u8 = 0b0010;
    pub const DQUOTE: u8 = 0b0100;
    pub const QUOTE: u8 = SQUOTE | DQUOTE;

    /// Extrae banderas con prefijo `[name]` repetidas al inicio de `key`,
    /// devolviendo `(flags acumuladas, clave desnuda)`.
    pub fn strip(key: &str) -> (u8, &str) {
        let mut rest = key;
        let mut acc = 0u8;
        loop {
            if let Some(stripped) = rest.strip_prefix('[') {
                if let Some(end) = stripped.find(']') {
                    let name = &stripped[..end];
                    let bit = match name {
                        "null" => NULL,
                        "squote" => SQUOTE,
                        "dquote" => DQUOTE,
                        "quote" => QUOTE,
                        _ => break,
                    };
                    acc |= bit;
                    rest = &stripped[end + 1..];
                    continue;
                }
            }
            break;
        }
        (acc, rest)
    }
}

/// Un tipo textual registrable: sabe reconocer, cargar y volcar su propia
/// representación.
pub trait TexType: Send + Sync {
    /// Clave desnuda (sin banderas) bajo la que se registra este tipo.
    fn key(&self) -> &'static str;

    /// ¿Este texto (ya sin comillas) es interpretable por este tipo?
    fn matches(&self, text: &str) -> bool;

    /// Convierte texto a valor tipado.
    fn load(&self, text: &str) -> Result<TypedValue, CodecError>;

    /// Convierte valor tipado a texto.
    fn dump(&self, value: &TypedValue) -> Result<String, CodecError>;

    /// ¿Esta variante de `TypedValue` corresponde a este tipo?
    fn accepts(&self, value: &TypedValue) -> bool;
}

/// Códec de valores tipados con registro ordenado de `TexType`.
pub struct TexTyper {
    entries: Vec<Box<dyn TexType>>,
    key_index: HashMap<String, usize>,
    null_alias: Vec<String>,
    strict_type_match: bool,
}

impl TexTyper {
    /// Construye un typer nuevo a partir de una lista ordenada de tipos.
    ///
    /// `null_alias` por defecto es `["null"]`; el primero de la lista es el
    /// literal usado al volcar el sentinel nulo. `strict_type_match`
    /// controla si la resolución valor→clave en modo `auto` exige una única
    /// clave candidata o acepta la primera en orden de registro.
    pub fn new(entries: Vec<Box<dyn TexType>>, null_alias: Vec<String>, strict_type_match: bool) -> Self {
        let mut key_index = HashMap::new();
        for (i, t) in entries.iter().enumerate() {
            key_index.insert(t.key().to_string(), i);
        }
        let null_alias = if null_alias.is_empty() { vec!["null".to_string()] } else { null_alias };
        Self { entries, key_index, null_alias, strict_type_match }
    }

    /// Deriva un typer hijo sin mutar `self`: permite reemplazar/añadir
    /// tipos, reordenar el match order implícito, extender los alias nulos
    /// o alternar `strict_type_match`.
    pub fn derive(&self) -> TexTyperBuilder<'_> { TexTyperBuilder { base: self, extra: Vec::new(), null_alias: None, strict_type_match: None } }

    fn type_at(&self, idx: usize) -> &dyn TexType { self.entries[idx].as_ref() }

    fn find_key(&self, key: &str) -> Result<usize, CodecError> {
        self.key_index.get(key).copied().ok_or_else(|| CodecError::UnknownKey(key.to_string()))
    }

    fn is_null_literal(&self, text: &str) -> bool { self.null_alias.iter().any(|a| a == text) }

    fn unquote(&self, text: &str, eff_flags: u8) -> &str {
        let bytes = text.as_bytes();
        if bytes.len() >= 2 {
            let first = bytes[0];
            let last = bytes[bytes.len() - 1];
            if first == last && ((first == b'\'' && eff_flags & flags::SQUOTE != 0) || (first == b'"' && eff_flags & flags::DQUOTE != 0)) {
                return &text[1..text.len() - 1];
            }
        }
        text
    }

    fn quote(&self, text: String, eff_flags: u8) -> String {
        if eff_flags & flags::DQUOTE != 0 {
            format!("\"{text}\"")
        } else if eff_flags & flags::SQUOTE != 0 {
            format!("'{text}'")
        } else {
            text
        }
    }

    /// Carga `text` interpretado según `type_or_key`.
    ///
    /// `type_or_key = "auto"` recorre los tipos registrados en orden y
    /// devuelve el primer `matches` exitoso. Cualquier otro valor se trata
    /// como una typekey posiblemente prefijada con banderas.
    pub fn load(&self, text: &str, type_or_key: &str, flags_in: u8) -> Result<TypedValue, CodecError> {
        if type_or_key == "auto" {
            return self.load_auto(text, flags_in);
        }
        let (key_flags, bare) = flags::strip(type_or_key);
        let eff_flags = flags_in | key_flags;
        if eff_flags & flags::NULL != 0 && self.is_null_literal(text) {
            return Ok(TypedValue::Null);
        }
        let idx = self.find_key(bare)?;
        let unquoted = self.unquote(text, eff_flags);
        self.type_at(idx).load(unquoted)
    }

    fn load_auto(&self, text: &str, flags_in: u8) -> Result<TypedValue, CodecError> {
        if flags_in & flags::NULL != 0 && self.is_null_literal(text) {
            return Ok(TypedValue::Null);
        }
        let unquoted = self.unquote(text, flags_in);
        for t in &self.entries {
            if t.matches(unquoted) {
                return t.load(unquoted);
            }
        }
        Err(CodecError::UnrecognizedText(text.to_string()))
    }

    /// Vuelca `value` según `type_or_key`. `"auto"` resuelve la clave a
    /// partir de la variante de `value`.
    pub fn dump(&self, value: &TypedValue, type_or_key: &str, flags_in: u8) -> Result<String, CodecError> {
        if type_or_key == "auto" {
            return self.dump_auto(value, flags_in);
        }
        let (key_flags, bare) = flags::strip(type_or_key);
        let eff_flags = flags_in | key_flags;
        if matches!(value, TypedValue::Null) {
            if eff_flags & flags::NULL == 0 {
                return Err(CodecError::ConversionFailed { key: bare.into(), cause: "valor nulo sin bandera [null]".into() });
            }
            return Ok(self.null_alias[0].clone());
        }
        let idx = self.find_key(bare)?;
        let dumped = self.type_at(idx).dump(value)?;
        Ok(self.quote(dumped, eff_flags))
    }

    fn dump_auto(&self, value: &TypedValue, flags_in: u8) -> Result<String, CodecError> {
        if matches!(value, TypedValue::Null) {
            if flags_in & flags::NULL == 0 {
                return Err(CodecError::ConversionFailed { key: "auto".into(), cause: "valor nulo sin bandera [null]".into() });
            }
            return Ok(self.null_alias[0].clone());
        }
        let mut candidate: Option<usize> = None;
        for (i, t) in self.entries.iter().enumerate() {
            if t.accepts(value) {
                if self.strict_type_match && candidate.is_some() {
                    return Err(CodecError::UnsupportedType);
                }
                candidate = Some(i);
                if !self.strict_type_match {
                    break;
                }
            }
        }
        let idx = candidate.ok_or(CodecError::UnsupportedType)?;
        let dumped = self.type_at(idx).dump(value)?;
        Ok(self.quote(dumped, flags_in))
    }

    /// Determina la typekey que reconocería `text` en modo `auto`, sin
    /// cargar el valor. Útil para diagnóstico/detección.
    pub fn key_of_text(&self, text: &str, flags_in: u8) -> Result<&'static str, CodecError> {
        let unquoted = self.unquote(text, flags_in);
        for t in &self.entries {
            if t.matches(unquoted) {
                return Ok(t.key());
            }
        }
        Err(CodecError::UnrecognizedText(text.to_string()))
    }

    /// ¿Hay un `TexType` registrado bajo esta clave desnuda? Primitiva de
    /// lookup clave→tipo; el tipo en sí no se expone (no hay reflexión de
    /// tipos en Rust), sólo la confirmación de que la clave resuelve.
    pub fn type_of_key(&self, key: &str) -> Result<(), CodecError> {
        self.find_key(key).map(|_| ())
    }

    /// Determina la typekey que describe la variante concreta de `value`,
    /// recorriendo `accepts` en orden de registro. Equivalente de
    /// `key_of_type(T)` del contrato original, adaptado a la variante en
    /// tiempo de ejecución en vez de a un tipo host estático.
    pub fn key_of_value(&self, value: &TypedValue) -> Result<&'static str, CodecError> {
        if matches!(value, TypedValue::Null) {
            return Err(CodecError::UnsupportedType);
        }
        for t in &self.entries {
            if t.accepts(value) {
                return Ok(t.key());
            }
        }
        Err(CodecError::UnsupportedType)
    }
}

/// Builder devuelto por `TexTyper::derive` para construir un typer hijo sin
/// mutar el padre.
pub struct TexTyperBuilder<'a> {
    base: &'a TexTyper,
    extra: Vec<Box<dyn TexType>>,
    null_alias: Option<Vec<String>>,
    strict_type_match: Option<bool>,
}

impl<'a> TexTyperBuilder<'a> {
    /// Añade (o reemplaza, si la clave ya existe en el padre) un tipo.
    pub fn with_type(mut self, t: Box<dyn TexType>) -> Self {
        self.extra.push(t);
        self
    }

    pub fn null_alias(mut self, aliases: Vec<String>) -> Self {
        self.null_alias = Some(aliases);
        self
    }

    pub fn strict_type_match(mut self, strict: bool) -> Self {
        self.strict_type_match = Some(strict);
        self
    }

    pub fn build(self) -> TexTyper {
        let mut replaced_keys: HashMap<&str, ()> = HashMap::new();
        for t in &self.extra {
            replaced_keys.insert(t.key(), ());
        }
        let mut entries: Vec<Box<dyn TexType>> = Vec::new();
        for (key, idx) in sorted_by_index(&self.base.key_index) {
            if replaced_keys.contains_key(key.as_str()) {
                continue;
            }
            entries.push(clone_dyn(self.base.type_at(idx)));
        }
        entries.extend(self.extra);
        let null_alias = self.null_alias.unwrap_or_else(|| self.base.null_alias.clone());
        let strict = self.strict_type_match.unwrap_or(self.base.strict_type_match);
        TexTyper::new(entries, null_alias, strict)
    }
}

fn sorted_by_index(map: &HashMap<String, usize>) -> Vec<(String, usize)> {
    let mut v: Vec<(String, usize)> = map.iter().map(|(k, i)| (k.clone(), *i)).collect();
    v.sort_by_key(|(_, i)| *i);
    v
}

// `Box<dyn TexType>` no es `Clone`; los tipos incorporados son stateless, así
// que reconstruimos por clave conocida. Un `TexType` externo no incorporado
// no sobrevive a `derive()` salvo que se vuelva a pasar explícitamente vía
// `with_type`.
fn clone_dyn(t: &dyn TexType) -> Box<dyn TexType> {
    match t.key() {
        "int" => Box::new(types::IntType),
        "float" => Box::new(types::FloatType),
        "decimal" => Box::new(types::DecimalType),
        "bool" => Box::new(types::BoolType),
        "str" => Box::new(types::StrType),
        other => panic!("tipo externo sin soporte de clonado en derive(): {other}"),
    }
}

/// Typer por defecto usado cuando una fuente no declara el suyo: recorre
/// `int, float, decimal, bool, str` en ese orden, con alias nulos
/// `null`/`NULL` y resolución no estricta.
pub fn default_csv_typer() -> TexTyper {
    TexTyper::new(
        vec![
            Box::new(types::IntType),
            Box::new(types::FloatType),
            Box::new(types::DecimalType),
            Box::new(types::BoolType),
            Box::new(types::StrType),
        ],
        vec!["null".to_string(), "NULL".to_string()],
        false,
    )
}
