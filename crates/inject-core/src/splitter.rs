//! Splitter: recorre las fuentes declaradas de una inyección en orden y las
//! agrupa en lotes de tamaño `atom_size`, con soporte de salto rápido para
//! reanudación.

use crate::codec::TexTyper;
use crate::errors::SourceError;
use crate::model::{Batch, InjectionConfig};
use crate::reader::{SkipAdvance, SourceReader};

enum State {
    Idle { next_index: usize },
    Active { index: usize, source_id: String, reader: SourceReader },
    Exhausted,
}

/// Recorre en orden las fuentes de una `InjectionConfig`, abriendo y
/// cerrando cada archivo a medida que se agota, y emite lotes acotados por
/// `atom_size`.
///
/// Garantiza que como máximo un archivo está abierto a la vez; el archivo
/// activo se libera en cualquier camino de salida (agotamiento, `release`
/// explícito, error, o drop) porque el estado `Active` sólo retiene el
/// `SourceReader` mientras dura el préstamo.
pub struct Splitter<'a> {
    config: &'a InjectionConfig,
    typer: &'a TexTyper,
    source_ids: Vec<String>,
    atom_size: usize,
    state: State,
}

impl<'a> Splitter<'a> {
    pub fn new(config: &'a InjectionConfig, typer: &'a TexTyper) -> Self {
        let source_ids: Vec<String> = config.sources.keys().cloned().collect();
        Self { config, typer, source_ids, atom_size: config.options.atom_size.max(1), state: State::Idle { next_index: 0 } }
    }

    fn open_next(&mut self, from_index: usize) -> Result<bool, SourceError> {
        let Some(source_id) = self.source_ids.get(from_index) else {
            self.state = State::Exhausted;
            return Ok(false);
        };
        let spec = &self.config.sources[source_id];
        let reader = SourceReader::open(source_id, spec)?;
        self.state = State::Active { index: from_index, source_id: source_id.clone(), reader };
        Ok(true)
    }

    fn ensure_active(&mut self) -> Result<bool, SourceError> {
        match &self.state {
            State::Idle { next_index } => self.open_next(*next_index),
            State::Active { .. } => Ok(true),
            State::Exhausted => Ok(false),
        }
    }

    /// Libera el archivo actualmente abierto, si lo hay, volviendo a `Idle`
    /// en la siguiente fuente.
    pub fn release(&mut self) {
        if let State::Active { index, .. } = &self.state {
            self.state = State::Idle { next_index: index + 1 };
        }
    }

    /// Extrae el siguiente lote. `Ok(None)` señala agotamiento de todas las
    /// fuentes.
    pub fn next_batch(&mut self) -> Result<Option<Batch>, SourceError> {
        loop {
            if !self.ensure_active()? {
                return Ok(None);
            }
            let (source_id, records) = {
                let State::Active { source_id, reader, .. } = &mut self.state else { unreachable!() };
                let mut records = Vec::with_capacity(self.atom_size);
                for _ in 0..self.atom_size {
                    match reader.next_record(self.typer) {
                        Some(Ok(rec)) => records.push(rec),
                        Some(Err(e)) => return Err(e),
                        None => break,
                    }
                }
                (source_id.clone(), records)
            };
            if records.is_empty() {
                self.release();
                continue;
            }
            return Ok(Some(Batch { source_id, records }));
        }
    }

    /// Avanza `n` lotes sin materializar sus registros. Devuelve el número
    /// de lotes realmente avanzados (`< n` si las fuentes se agotaron
    /// antes).
    pub fn skip_batches(&mut self, n: usize) -> Result<usize, SourceError> {
        let mut remaining = n;
        let mut total_advanced = 0usize;
        while remaining > 0 {
            if !self.ensure_active()? {
                break;
            }
            let lines_to_skip = remaining * self.atom_size;
            let skipped = {
                let State::Active { reader, .. } = &mut self.state else { unreachable!() };
                reader.skip_lines(lines_to_skip)?
            };
            let whole = skipped / self.atom_size;
            let remainder = skipped % self.atom_size;
            let advanced_here = if remainder > 0 { whole + 1 } else { whole };
            total_advanced += advanced_here.min(remaining);
            remaining = remaining.saturating_sub(advanced_here);
            if skipped < lines_to_skip {
                // la fuente actual se agotó antes de cubrir lo pedido.
                self.release();
                if remaining == 0 {
                    break;
                }
                continue;
            }
            if remainder > 0 {
                // quedó un lote parcial a mitad de fuente: no cerramos el
                // archivo, el siguiente next_batch lo completará.
                break;
            }
        }
        Ok(total_advanced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::default_csv_typer;
    use crate::model::{FileSpec, InjectionOptions, SourceSpec, TreatmentSpec, TypingSpec};
    use indexmap::IndexMap;
    use std::fs;
    use std::io::Write;
    use std::sync::atomic::{AtomicU64, Ordering};

    static COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_csv(contents: &str) -> std::path::PathBuf {
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        let mut path = std::env::temp_dir();
        path.push(format!("inject_core_splitter_{}_{}.csv", std::process::id(), n));
        let mut f = fs::File::create(&path).unwrap();
        f.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn source(path: std::path::PathBuf) -> SourceSpec {
        SourceSpec {
            file: FileSpec { path: path.to_str().unwrap().to_string(), delimiter: ',', skip_head: false, encoding: None },
            typing: TypingSpec { types_map: IndexMap::new(), extra_type: Some("auto".into()) },
            treatment: TreatmentSpec::default(),
            properties: IndexMap::new(),
        }
    }

    fn config_two_sources(atom_size: usize) -> InjectionConfig {
        let p1 = temp_csv("a\n1\n2\n3\n4\n5\n");
        let p2 = temp_csv("a\n10\n20\n30\n");
        let mut sources = IndexMap::new();
        sources.insert("s1".to_string(), source(p1));
        sources.insert("s2".to_string(), source(p2));
        InjectionConfig { id: "test".into(), sources, options: InjectionOptions { atom_size } }
    }

    #[test]
    fn batches_follow_declared_source_order() {
        let cfg = config_two_sources(2);
        let typer = default_csv_typer();
        let mut splitter = Splitter::new(&cfg, &typer);
        let mut seen = Vec::new();
        while let Some(b) = splitter.next_batch().unwrap() {
            seen.push((b.source_id, b.len()));
        }
        assert_eq!(seen, vec![("s1".to_string(), 2), ("s1".to_string(), 2), ("s1".to_string(), 1), ("s2".to_string(), 2), ("s2".to_string(), 1)]);
    }

    #[test]
    fn skip_resumes_mid_source_without_reinjecting() {
        let cfg = config_two_sources(2);
        let typer = default_csv_typer();
        let mut splitter = Splitter::new(&cfg, &typer);
        let advanced = splitter.skip_batches(3).unwrap();
        assert_eq!(advanced, 3);
        let next = splitter.next_batch().unwrap().unwrap();
        assert_eq!(next.source_id, "s2");
        assert_eq!(next.len(), 2);
    }

    #[test]
    fn skip_beyond_total_exhausts_cleanly() {
        let cfg = config_two_sources(2);
        let typer = default_csv_typer();
        let mut splitter = Splitter::new(&cfg, &typer);
        let advanced = splitter.skip_batches(100).unwrap();
        assert_eq!(advanced, 5);
        assert!(splitter.next_batch().unwrap().is_none());
    }
}
