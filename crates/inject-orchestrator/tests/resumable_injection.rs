//! Pruebas de extremo a extremo del orquestador contra Postgres real
//! (requiere `DATABASE_URL` en el entorno; se omiten con un mensaje si no
//! está definida, igual que las pruebas de conexión del linaje del que
//! desciende este crate).

use std::fs;
use std::io::Write;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::RunQueryDsl;
use indexmap::IndexMap;
use inject_core::{default_csv_typer, Batch, FileSpec, InjectionConfig, InjectionOptions, SourceSpec, TreatmentSpec, TypingSpec};
use inject_orchestrator::{Mode, Orchestrator};
use inject_persistence::{ConnectOptions, ConnectionManager, PersistenceError};

static COUNTER: AtomicU64 = AtomicU64::new(0);

fn temp_csv(contents: &str) -> std::path::PathBuf {
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    let mut path = std::env::temp_dir();
    path.push(format!("inject_orchestrator_test_{}_{}.csv", std::process::id(), n));
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

fn two_source_config(id: &str, atom_size: usize) -> InjectionConfig {
    let p1 = temp_csv("a\n1\n2\n3\n4\n5\n");
    let p2 = temp_csv("a\n10\n20\n30\n");
    let mut sources = IndexMap::new();
    sources.insert("s1".to_string(), source(p1));
    sources.insert("s2".to_string(), source(p2));
    InjectionConfig { id: id.to_string(), sources, options: InjectionOptions { atom_size } }
}

fn skip_without_database_url() -> bool {
    if std::env::var("DATABASE_URL").is_err() {
        eprintln!("DATABASE_URL no definido: omitiendo test de integración");
        true
    } else {
        false
    }
}

/// Injector de prueba: vuelca cada registro del lote como una fila
/// `(source_id, value)` en una tabla de destino fija (`test_target_rows`).
fn recording_injector(conn: &mut PgConnection, batch: &Batch) -> Result<(), PersistenceError> {
    for rec in &batch.records {
        let value = rec.get("a").map(|v| v.to_string()).unwrap_or_default();
        sql_query("INSERT INTO test_target_rows (source_id, value) VALUES ($1, $2)")
            .bind::<Text, _>(batch.source_id.clone())
            .bind::<Text, _>(value)
            .execute(conn)
            .map_err(PersistenceError::from)?;
    }
    Ok(())
}

fn setup_target_table(conn: &mut PgConnection) {
    conn.batch_execute("DROP TABLE IF EXISTS test_target_rows; CREATE TABLE test_target_rows (id SERIAL PRIMARY KEY, source_id TEXT NOT NULL, value TEXT NOT NULL);").unwrap();
}

fn count_target_rows(conn: &mut PgConnection) -> i64 {
    #[derive(diesel::QueryableByName)]
    struct CountRow {
        #[diesel(sql_type = diesel::sql_types::BigInt)]
        count: i64,
    }
    let row: CountRow = sql_query("SELECT COUNT(*) AS count FROM test_target_rows").get_result(conn).unwrap();
    row.count
}

// Todas las pruebas de este módulo tocan las mismas tablas globales
// (`test_target_rows`, `injections`); se serializan para que no se pisen.
static DB_TEST_LOCK: Mutex<()> = Mutex::new(());

#[test]
fn clean_run_applies_all_batches_and_marks_completed() {
    if skip_without_database_url() {
        return;
    }
    let _guard = DB_TEST_LOCK.lock().unwrap();
    let database_url = std::env::var("DATABASE_URL").unwrap();

    let mut setup_mgr = ConnectionManager::new(ConnectOptions::new(&database_url));
    setup_mgr.connect().unwrap();
    setup_mgr.execute(|conn| {
        setup_target_table(conn);
        Ok(())
    }).unwrap();
    setup_mgr
        .execute(|conn| {
            sql_query("DELETE FROM injections WHERE id = $1").bind::<Text, _>("clean_run_test").execute(conn).map(|_| ()).map_err(PersistenceError::from)
        })
        .or_else(|_: PersistenceError| Ok::<(), PersistenceError>(()))
        .ok();

    let config = two_source_config("clean_run_test", 2);
    let conn_mgr = ConnectionManager::new(ConnectOptions::new(&database_url));
    let mut orchestrator = Orchestrator::new(config, default_csv_typer(), conn_mgr, "injections", Box::new(recording_injector), Mode::default()).unwrap();

    let status = orchestrator.run(None).unwrap();
    assert_eq!(status.injected, 5);
    assert!(status.completed);

    let rows = setup_mgr.execute(|conn| Ok(count_target_rows(conn))).unwrap();
    assert_eq!(rows, 8);

    // Re-run is a no-op: completed injections never re-touch the splitter.
    let config2 = two_source_config("clean_run_test", 2);
    let conn_mgr2 = ConnectionManager::new(ConnectOptions::new(&database_url));
    let mut orchestrator2 = Orchestrator::new(config2, default_csv_typer(), conn_mgr2, "injections", Box::new(recording_injector), Mode::default()).unwrap();
    let status2 = orchestrator2.run(None).unwrap();
    assert_eq!(status2.injected, 5);
    assert!(status2.completed);

    let rows_after_rerun = setup_mgr.execute(|conn| Ok(count_target_rows(conn))).unwrap();
    assert_eq!(rows_after_rerun, 8, "re-running a completed injection must not re-apply batches");
}

#[test]
fn resumes_after_simulated_crash_without_reinjecting() {
    if skip_without_database_url() {
        return;
    }
    let _guard = DB_TEST_LOCK.lock().unwrap();
    let database_url = std::env::var("DATABASE_URL").unwrap();

    let mut setup_mgr = ConnectionManager::new(ConnectOptions::new(&database_url));
    setup_mgr.connect().unwrap();
    setup_mgr.execute(|conn| {
        setup_target_table(conn);
        Ok(())
    }).unwrap();
    setup_mgr
        .execute(|conn| sql_query("DELETE FROM injections WHERE id = $1").bind::<Text, _>("resume_test").execute(conn).map(|_| ()).map_err(PersistenceError::from))
        .or_else(|_: PersistenceError| Ok::<(), PersistenceError>(()))
        .ok();

    // First run: cancel cooperatively right after the third batch commits,
    // mimicking a killed process. atom_size=2 over S1(5)+S2(3) commits
    // batches (2,S1),(2,S1),(1,S1) before the cancellation is observed.
    let config = two_source_config("resume_test", 2);
    let conn_mgr = ConnectionManager::new(ConnectOptions::new(&database_url));
    let mut orchestrator = Orchestrator::new(config, default_csv_typer(), conn_mgr, "injections", Box::new(recording_injector), Mode::default()).unwrap();

    // The cancel predicate is checked *before* each batch is pulled; this
    // counts invocations and trips after the 4th check, i.e. once 3 batches
    // have already committed.
    let seen = std::cell::Cell::new(0u32);
    let cancel_after_three = || {
        let n = seen.get() + 1;
        seen.set(n);
        n > 3
    };
    let result = orchestrator.run(Some(&cancel_after_three));
    match result {
        Err(inject_orchestrator::OrchestratorError::Cancelled { last_committed }) => {
            assert_eq!(last_committed, 3);
        }
        other => panic!("se esperaba Cancelled tras 3 lotes, se obtuvo {other:?}"),
    }

    // Resume: a fresh orchestrator over the same id must skip the 3
    // already-committed batches (5 raw S1 lines) and finish from (2,S2).
    let config2 = two_source_config("resume_test", 2);
    let conn_mgr2 = ConnectionManager::new(ConnectOptions::new(&database_url));
    let mut orchestrator2 = Orchestrator::new(config2, default_csv_typer(), conn_mgr2, "injections", Box::new(recording_injector), Mode::default()).unwrap();
    let status = orchestrator2.run(None).unwrap();
    assert_eq!(status.injected, 5);
    assert!(status.completed);

    let rows = setup_mgr.execute(|conn| Ok(count_target_rows(conn))).unwrap();
    assert_eq!(rows, 8, "resumed run must not re-insert the 3 already-committed batches' rows");
}
