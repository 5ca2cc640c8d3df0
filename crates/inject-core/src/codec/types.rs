//! Tipos textuales incorporados: `int`, `float`, `decimal`, `bool`, `str`.
//!
//! Cada uno implementa `TexType`. El orden de registro por defecto
//! (`DEFAULT_CSV_TYPER`, ver `super::default_csv_typer`) coloca `str` al
//! final porque su `matches` acepta cualquier texto.

use bigdecimal::BigDecimal;
use std::str::FromStr;

use super::{TexType, TypedValue};
use crate::errors::CodecError;

pub struct IntType;
impl TexType for IntType {
    fn key(&self) -> &'static str { "int" }

    fn matches(&self, text: &str) -> bool { text.parse::<i64>().is_ok() }

    fn load(&self, text: &str) -> Result<TypedValue, CodecError> {
        text.parse::<i64>()
            .map(TypedValue::Int)
            .map_err(|e| CodecError::ConversionFailed { key: self.key().into(), cause: e.to_string() })
    }

    fn dump(&self, value: &TypedValue) -> Result<String, CodecError> {
        match value {
            TypedValue::Int(v) => Ok(v.to_string()),
            other => Err(type_mismatch(self.key(), other)),
        }
    }

    fn accepts(&self, value: &TypedValue) -> bool { matches!(value, TypedValue::Int(_)) }
}

pub struct FloatType;
impl TexType for FloatType {
    fn key(&self) -> &'static str { "float" }

    fn matches(&self, text: &str) -> bool { text.parse::<f64>().is_ok() }

    fn load(&self, text: &str) -> Result<TypedValue, CodecError> {
        text.parse::<f64>()
            .map(TypedValue::Float)
            .map_err(|e| CodecError::ConversionFailed { key: self.key().into(), cause: e.to_string() })
    }

    fn dump(&self, value: &TypedValue) -> Result<String, CodecError> {
        match value {
            TypedValue::Float(v) => Ok(v.to_string()),
            other => Err(type_mismatch(self.key(), other)),
        }
    }

    fn accepts(&self, value: &TypedValue) -> bool { matches!(value, TypedValue::Float(_)) }
}

pub struct DecimalType;
impl TexType for DecimalType {
    fn key(&self) -> &'static str { "decimal" }

    fn matches(&self, text: &str) -> bool { BigDecimal::from_str(text).is_ok() }

    fn load(&self, text: &str) -> Result<TypedValue, CodecError> {
        BigDecimal::from_str(text)
            .map(TypedValue::Decimal)
            .map_err(|e| CodecError::ConversionFailed { key: self.key().into(), cause: e.to_string() })
    }

    fn dump(&self, value: &TypedValue) -> Result<String, CodecError> {
        match value {
            TypedValue::Decimal(v) => Ok(v.to_string()),
            other => Err(type_mismatch(self.key(), other)),
        }
    }

    fn accepts(&self, value: &TypedValue) -> bool { matches!(value, TypedValue::Decimal(_)) }
}

pub struct BoolType;
impl TexType for BoolType {
    fn key(&self) -> &'static str { "bool" }

    fn matches(&self, text: &str) -> bool { text.eq_ignore_ascii_case("true") || text.eq_ignore_ascii_case("false") }

    fn load(&self, text: &str) -> Result<TypedValue, CodecError> {
        if text.eq_ignore_ascii_case("true") {
            Ok(TypedValue::Bool(true))
        } else if text.eq_ignore_ascii_case("false") {
            Ok(TypedValue::Bool(false))
        } else {
            Err(CodecError::ConversionFailed { key: self.key().into(), cause: format!("{text:?} no es true/false") })
        }
    }

    fn dump(&self, value: &TypedValue) -> Result<String, CodecError> {
        match value {
            TypedValue::Bool(v) => Ok(if *v { "true".to_string() } else { "false".to_string() }),
            other => Err(type_mismatch(self.key(), other)),
        }
    }

    fn accepts(&self, value: &TypedValue) -> bool { matches!(value, TypedValue::Bool(_)) }
}

/// Tipo identidad: acepta cualquier texto. Debe registrarse al final de la
/// lista de match order cuando se use como catch-all de `'auto'`.
pub struct StrType;
impl TexType for StrType {
    fn key(&self) -> &'static str { "str" }

    fn matches(&self, _text: &str) -> bool { true }

    fn load(&self, text: &str) -> Result<TypedValue, CodecError> { Ok(TypedValue::Text(text.to_string())) }

    fn dump(&self, value: &TypedValue) -> Result<String, CodecError> {
        match value {
            TypedValue::Text(v) => Ok(v.clone()),
            other => Err(type_mismatch(self.key(), other)),
        }
    }

    fn accepts(&self, value: &TypedValue) -> bool { matches!(value, TypedValue::Text(_)) }
}

fn type_mismatch(key: &str, value: &TypedValue) -> CodecError {
    CodecError::ConversionFailed { key: key.into(), cause: format!("valor {value:?} no corresponde a esta clave") }
}
