//! inject-core
//!
//! Núcleo sin E/S de red ni de base de datos: el códec de valores tipados
//! (`codec`), el modelo declarativo de una inyección (`model`), el lector de
//! una fuente individual (`reader`) y el divisor en lotes (`splitter`).
//!
//! Este crate no sabe nada de Postgres ni de la tabla de progreso: eso vive
//! en `inject-persistence` y se compone en `inject-orchestrator`.

pub mod codec;
pub mod errors;
pub mod model;
pub mod reader;
pub mod splitter;

pub use codec::{default_csv_typer, flags, TexType, TexTyper, TypedValue};
pub use errors::{CodecError, SourceError};
pub use model::{Batch, ColsExtra, FileSpec, InjectionConfig, InjectionOptions, SourceSpec, TreatmentSpec, TypedRecord, TypingSpec};
pub use reader::{SkipAdvance, SourceReader};
pub use splitter::Splitter;
