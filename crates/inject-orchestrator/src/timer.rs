//! Colaborador de observabilidad opcional: enmarca las fases "preparación"
//! (construir el Splitter + saltar lotes ya aplicados) e "inject" (el bucle
//! de lotes) como un colaborador inyectado en vez de un registro global de
//! proceso, para que un consumidor pueda medir cada fase sin acoplar el
//! orquestador a un backend de métricas concreto.
//!
//! El núcleo funciona igual de bien sin uno: `Orchestrator::run` acepta
//! `Option<&dyn RunTimer>` y el binario de demostración pasa `None`.

pub trait RunTimer: Send + Sync {
    fn start(&self, phase: &str);
    fn stop(&self, phase: &str);
}

/// Implementación trivial que sólo registra vía `log::debug!`; útil como
/// colaborador por defecto en pruebas o demos que quieran ver las fases sin
/// integrarse con un backend de métricas real.
pub struct LoggingTimer;

impl RunTimer for LoggingTimer {
    fn start(&self, phase: &str) { log::debug!("fase '{phase}' iniciada"); }
    fn stop(&self, phase: &str) { log::debug!("fase '{phase}' terminada"); }
}
