//! Source Reader: envuelve un único archivo fuente abierto y lo convierte en
//! una secuencia perezosa de `TypedRecord`, aplicando proyección de columnas
//! (drop/rename/extras), formateo de valores y tipado.

use std::fs::File;
use std::io::BufReader;

use indexmap::IndexMap;

use crate::codec::{TexTyper, TypedValue};
use crate::errors::SourceError;
use crate::model::{ColsExtra, SourceSpec, TypedRecord};

#[derive(Debug, Clone, Copy)]
enum ValueFormatter {
    Identity,
    Trim,
    Upper,
    Lower,
}

impl ValueFormatter {
    fn from_name(name: &str) -> Self {
        match name {
            "trim" => ValueFormatter::Trim,
            "upper" => ValueFormatter::Upper,
            "lower" => ValueFormatter::Lower,
            _ => ValueFormatter::Identity,
        }
    }

    fn apply<'a>(&self, text: &'a str) -> std::borrow::Cow<'a, str> {
        match self {
            ValueFormatter::Identity => std::borrow::Cow::Borrowed(text),
            ValueFormatter::Trim => std::borrow::Cow::Borrowed(text.trim()),
            ValueFormatter::Upper => std::borrow::Cow::Owned(text.to_uppercase()),
            ValueFormatter::Lower => std::borrow::Cow::Owned(text.to_lowercase()),
        }
    }
}

/// Proyección resuelta de una columna de cabecera: nombre de destino (o
/// `None` si se descarta), formateador de valor y typekey (o `None` para
/// dejar el valor como texto crudo sin pasar por el codec).
struct ColumnProjection {
    name: Option<String>,
    formatter: ValueFormatter,
    typekey: Option<String>,
}

/// Capacidad de avance rápido sin materializar valores. El `Iterator`
/// estándar cubre el avance registro-a-registro; esta es la vía que permite
/// reanudar una inyección sin pagar el costo de tipar/proyectar filas ya
/// aplicadas.
pub trait SkipAdvance {
    /// Avanza hasta `n` filas de datos sin tipar ni proyectar. Devuelve el
    /// número de filas realmente avanzadas (`< n` si la fuente se agotó
    /// antes).
    fn skip_lines(&mut self, n: usize) -> Result<usize, SourceError>;
}

pub struct SourceReader {
    source_id: String,
    inner: csv::Reader<BufReader<File>>,
    columns: Vec<ColumnProjection>,
    properties: TypedRecord,
}

impl SourceReader {
    pub fn open(source_id: &str, spec: &SourceSpec) -> Result<Self, SourceError> {
        spec.file.validate()?;
        let file = File::open(&spec.file.path).map_err(|e| SourceError::Io { source_id: source_id.into(), cause: e })?;
        let mut inner = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(spec.file.delimiter as u8)
            .from_reader(BufReader::new(file));

        if spec.file.skip_head {
            let _ = inner.records().next();
        }

        let header: Vec<String> = match &spec.treatment.cols_names {
            Some(names) => names.clone(),
            None => {
                let row = inner
                    .records()
                    .next()
                    .ok_or_else(|| SourceError::Io { source_id: source_id.into(), cause: std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "fuente vacía, sin cabecera") })?
                    .map_err(|e| SourceError::IoAtLine { source_id: source_id.into(), line: 1, cause: e.to_string() })?;
                row.iter().map(|s| s.to_string()).collect()
            }
        };

        let columns = Self::build_projection(&header, spec);
        let properties = spec.properties.clone();

        Ok(Self { source_id: source_id.to_string(), inner, columns, properties })
    }

    fn build_projection(header: &[String], spec: &SourceSpec) -> Vec<ColumnProjection> {
        header
            .iter()
            .map(|col| {
                let dropped = spec.treatment.cols_drop.iter().any(|d| d == col);
                let name = if dropped {
                    None
                } else if let Some(renamed) = spec.treatment.cols_rename.get(col) {
                    Some(renamed.clone())
                } else {
                    match spec.treatment.cols_extra {
                        ColsExtra::Keep => Some(col.clone()),
                        ColsExtra::Drop => {
                            if spec.treatment.cols_rename.contains_key(col) {
                                Some(col.clone())
                            } else {
                                None
                            }
                        }
                    }
                };
                let formatter = spec
                    .treatment
                    .cols_format_map
                    .get(col)
                    .map(|f| ValueFormatter::from_name(f))
                    .unwrap_or(ValueFormatter::Identity);
                let typekey = spec.typing.types_map.get(col).cloned().or_else(|| spec.typing.extra_type.clone());
                ColumnProjection { name, formatter, typekey }
            })
            .collect()
    }

    fn to_record(&self, row: &csv::StringRecord, typer: &TexTyper) -> Result<TypedRecord, SourceError> {
        let mut record: TypedRecord = self.properties.clone();
        for (col, raw) in self.columns.iter().zip(row.iter()) {
            let Some(name) = &col.name else { continue };
            let formatted = col.formatter.apply(raw);
            let value = match &col.typekey {
                Some(key) => typer
                    .load(&formatted, key, 0)
                    .map_err(|e| SourceError::Decode { source_id: self.source_id.clone(), cause: e })?,
                None => TypedValue::Text(formatted.into_owned()),
            };
            record.insert(name.clone(), value);
        }
        Ok(record)
    }

    pub fn next_record(&mut self, typer: &TexTyper) -> Option<Result<TypedRecord, SourceError>> {
        let row = self.inner.records().next()?;
        let row = match row {
            Ok(r) => r,
            Err(e) => return Some(Err(SourceError::IoAtLine { source_id: self.source_id.clone(), line: self.inner.position().line(), cause: e.to_string() })),
        };
        Some(self.to_record(&row, typer))
    }
}

impl SkipAdvance for SourceReader {
    fn skip_lines(&mut self, n: usize) -> Result<usize, SourceError> {
        let mut advanced = 0usize;
        let mut iter = self.inner.byte_records();
        while advanced < n {
            match iter.next() {
                Some(Ok(_)) => advanced += 1,
                Some(Err(e)) => return Err(SourceError::IoAtLine { source_id: self.source_id.clone(), line: advanced as u64, cause: e.to_string() }),
                None => break,
            }
        }
        Ok(advanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::default_csv_typer;
    use crate::model::{FileSpec, TreatmentSpec, TypingSpec};

    fn write_csv(contents: &str) -> tempfile_path::TempCsv {
        tempfile_path::TempCsv::new(contents)
    }

    // Pequeño helper local sin dependencia externa de tempfile: escribe a un
    // archivo temporal en el directorio del sistema y lo borra al dropearse.
    mod tempfile_path {
        use std::fs;
        use std::io::Write;
        use std::path::PathBuf;
        use std::sync::atomic::{AtomicU64, Ordering};

        static COUNTER: AtomicU64 = AtomicU64::new(0);

        pub struct TempCsv {
            pub path: PathBuf,
        }

        impl TempCsv {
            pub fn new(contents: &str) -> Self {
                let n = COUNTER.fetch_add(1, Ordering::Relaxed);
                let mut path = std::env::temp_dir();
                path.push(format!("inject_core_test_{}_{}.csv", std::process::id(), n));
                let mut f = fs::File::create(&path).unwrap();
                f.write_all(contents.as_bytes()).unwrap();
                Self { path }
            }
        }

        impl Drop for TempCsv {
            fn drop(&mut self) { let _ = fs::remove_file(&self.path); }
        }
    }

    fn spec_for(path: &str) -> SourceSpec {
        SourceSpec {
            file: FileSpec { path: path.to_string(), delimiter: ',', skip_head: false, encoding: None },
            typing: TypingSpec { types_map: IndexMap::new(), extra_type: Some("auto".to_string()) },
            treatment: TreatmentSpec::default(),
            properties: IndexMap::new(),
        }
    }

    #[test]
    fn projects_and_types_columns() {
        let tmp = write_csv("a,b,c\n1,2.5,hi\n");
        let spec = spec_for(tmp.path.to_str().unwrap());
        let typer = default_csv_typer();
        let mut reader = SourceReader::open("s1", &spec).unwrap();
        let rec = reader.next_record(&typer).unwrap().unwrap();
        assert_eq!(rec.get("a"), Some(&TypedValue::Int(1)));
        assert_eq!(rec.get("b"), Some(&TypedValue::Float(2.5)));
        assert_eq!(rec.get("c"), Some(&TypedValue::Text("hi".into())));
        assert!(reader.next_record(&typer).is_none());
    }

    #[test]
    fn drop_and_rename_columns() {
        let tmp = write_csv("a,b,c,d\n1,2,3,4\n");
        let mut spec = spec_for(tmp.path.to_str().unwrap());
        spec.treatment.cols_drop = vec!["b".to_string()];
        spec.treatment.cols_rename.insert("a".to_string(), "x".to_string());
        spec.treatment.cols_extra = ColsExtra::Drop;
        let typer = default_csv_typer();
        let mut reader = SourceReader::open("s1", &spec).unwrap();
        let rec = reader.next_record(&typer).unwrap().unwrap();
        assert_eq!(rec.len(), 1);
        assert!(rec.contains_key("x"));
    }

    #[test]
    fn skip_lines_does_not_materialize_values() {
        let tmp = write_csv("a\n1\n2\n3\n4\n");
        let spec = spec_for(tmp.path.to_str().unwrap());
        let typer = default_csv_typer();
        let mut reader = SourceReader::open("s1", &spec).unwrap();
        let advanced = reader.skip_lines(2).unwrap();
        assert_eq!(advanced, 2);
        let rec = reader.next_record(&typer).unwrap().unwrap();
        assert_eq!(rec.get("a"), Some(&TypedValue::Int(3)));
    }

    #[test]
    fn skip_lines_saturates_at_exhaustion() {
        let tmp = write_csv("a\n1\n2\n");
        let spec = spec_for(tmp.path.to_str().unwrap());
        let typer = default_csv_typer();
        let mut reader = SourceReader::open("s1", &spec).unwrap();
        assert_eq!(reader.skip_lines(10).unwrap(), 2);
        assert!(reader.next_record(&typer).is_none());
    }
}
