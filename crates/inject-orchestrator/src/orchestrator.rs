//! Injection Orchestrator: dueño del protocolo de reanudación de punta a
//! punta. Compone el Splitter/Codec de `inject-core` con el Connection
//! Manager/Progress Repository de `inject-persistence` y el callback
//! `injector` opaco del consumidor.

use diesel::connection::Connection as _;
use diesel::pg::PgConnection;
use inject_core::{Batch, InjectionConfig, Splitter, TexTyper};
use inject_persistence::{ConnectionManager, OnSelectMissing, OnUpdateMissing, PersistenceError, ProgressRepository, Status};
use log::{info, warn};

use crate::errors::OrchestratorError;
use crate::injector::Injector;
use crate::mode::Mode;
use crate::timer::RunTimer;

/// Predicado de cancelación cooperativa: se consulta entre lotes. `None`
/// significa "nunca cancelar".
pub type CancelCheck<'a> = Option<&'a dyn Fn() -> bool>;

pub struct Orchestrator<'a> {
    config: InjectionConfig,
    typer: TexTyper,
    conn_mgr: ConnectionManager,
    repo: ProgressRepository,
    injector: Box<dyn Injector>,
    mode: Mode,
    timer: Option<&'a dyn RunTimer>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        config: InjectionConfig,
        typer: TexTyper,
        conn_mgr: ConnectionManager,
        progress_table: impl Into<String>,
        injector: Box<dyn Injector>,
        mode: Mode,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        mode.validate()?;
        let repo = ProgressRepository::new(progress_table.into())?;
        Ok(Self { config, typer, conn_mgr, repo, injector, mode, timer: None })
    }

    /// Adjunta un colaborador de observabilidad opcional (ver `timer`).
    pub fn with_timer(mut self, timer: &'a dyn RunTimer) -> Self {
        self.timer = Some(timer);
        self
    }

    fn start_phase(&self, phase: &str) {
        if let Some(t) = self.timer {
            t.start(phase);
        }
    }

    fn stop_phase(&self, phase: &str) {
        if let Some(t) = self.timer {
            t.stop(phase);
        }
    }

    /// Corre la inyección completa: adquiere/crea el `Status`, salta los
    /// lotes ya aplicados, y aplica el resto uno por uno hasta agotar todas
    /// las fuentes, marcando `completed = true` al final. Una inyección ya
    /// `completed` es un no-op inmediato (idempotencia de re-ejecución).
    pub fn run(&mut self, cancel: CancelCheck<'_>) -> Result<Status, OrchestratorError> {
        self.conn_mgr.connect()?;

        if !self.mode.contains(Mode::REPO_NOT_INIT) {
            let repo = &self.repo;
            self.conn_mgr.execute(|conn| repo.init(conn))?;
        }

        let id = self.config.id.clone();
        let mut status = {
            let repo = &self.repo;
            self.conn_mgr.execute(|conn| repo.select(conn, &id, OnSelectMissing::Insert))?
        };

        if status.completed {
            info!("inyección '{id}' ya completada ({} lotes); no-op", status.injected);
            return Ok(status);
        }

        self.start_phase("preparation");
        let mut splitter = Splitter::new(&self.config, &self.typer);
        let to_skip = status.injected as usize;
        let skipped = splitter.skip_batches(to_skip)?;
        if skipped != to_skip {
            return Err(OrchestratorError::Internal(format!(
                "skip_batches saltó {skipped} lotes pero Status.injected pedía {to_skip}; la fuente cambió bajo el mismo id de inyección"
            )));
        }
        self.stop_phase("preparation");

        self.start_phase("inject");
        loop {
            if let Some(check) = cancel {
                if check() {
                    warn!("inyección '{id}' cancelada tras {} lotes", status.injected);
                    return Err(OrchestratorError::Cancelled { last_committed: status.injected as u32 });
                }
            }

            let Some(batch) = splitter.next_batch()? else { break };

            let repo = &self.repo;
            let injector = self.injector.as_ref();
            let batch_id = id.clone();
            let new_status: Status = self.conn_mgr.execute(move |conn| {
                conn.transaction(|c: &mut PgConnection| {
                    injector.inject(c, &batch)?;
                    repo.increment(c, &batch_id)?.ok_or(PersistenceError::NotFound)
                })
            })?;
            status = new_status;
        }
        self.stop_phase("inject");

        let id = self.config.id.clone();
        let final_status = Status { injected: status.injected, completed: true };
        let repo = &self.repo;
        let committed = self.conn_mgr.execute(move |conn| repo.update(conn, &id, &final_status, OnUpdateMissing::Insert))?;
        info!("inyección '{}' completada: {} lotes", self.config.id, committed.injected);
        Ok(committed)
    }
}
