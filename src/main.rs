//! inject-demo: binario mínimo que compone los cuatro subsistemas del
//! núcleo (codec, splitter, progress repository, connection manager) a
//! través de `Orchestrator::run`, contra un único source CSV de ejemplo.
//!
//! El `injector` de este demo sólo registra cada lote por log; un consumidor
//! real sustituiría esto por DML concreto contra su propio esquema.

use diesel::pg::PgConnection;
use indexmap::IndexMap;
use inject_core::{default_csv_typer, Batch, FileSpec, InjectionConfig, InjectionOptions, SourceSpec, TreatmentSpec, TypingSpec};
use inject_orchestrator::{Mode, Orchestrator};
use inject_persistence::{ConnectOptions, ConnectionManager, DbConfig, PersistenceError};

fn demo_injector(_conn: &mut PgConnection, batch: &Batch) -> Result<(), PersistenceError> {
    for rec in &batch.records {
        log::info!("[{}] {:?}", batch.source_id, rec);
    }
    Ok(())
}

fn demo_config() -> InjectionConfig {
    let mut types_map = IndexMap::new();
    types_map.insert("age".to_string(), "int".to_string());
    types_map.insert("active".to_string(), "bool".to_string());

    let mut sources = IndexMap::new();
    sources.insert(
        "people".to_string(),
        SourceSpec {
            file: FileSpec { path: concat!(env!("CARGO_MANIFEST_DIR"), "/demos/people.csv").to_string(), delimiter: ',', skip_head: false, encoding: None },
            typing: TypingSpec { types_map, extra_type: None },
            treatment: TreatmentSpec::default(),
            properties: IndexMap::new(),
        },
    );

    InjectionConfig { id: "people_demo".to_string(), sources, options: InjectionOptions { atom_size: 2 } }
}

fn main() {
    env_logger::init();

    let cfg = DbConfig::from_env();
    let conn_mgr = ConnectionManager::new(ConnectOptions::new(cfg.url.clone()));

    let mut orchestrator = match Orchestrator::new(demo_config(), default_csv_typer(), conn_mgr, cfg.progress_table.clone(), Box::new(demo_injector), Mode::default()) {
        Ok(o) => o,
        Err(e) => {
            log::error!("no se pudo construir el orquestador: {e}");
            std::process::exit(1);
        }
    };

    match orchestrator.run(None) {
        Ok(status) => println!("inyección 'people_demo' -> injected={} completed={}", status.injected, status.completed),
        Err(e) => {
            log::error!("falló la inyección: {e}");
            std::process::exit(1);
        }
    }
}
