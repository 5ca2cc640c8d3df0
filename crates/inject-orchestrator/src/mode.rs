//! Bitset de configuración de una corrida de inyección.

use bitflags::bitflags;

bitflags! {
    /// Banderas composables que moldean el comportamiento de `Orchestrator::run`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Mode: u8 {
        /// Ignora cualquier caché local de lotes; siempre consume directo de
        /// las fuentes. Por ahora es el único camino soportado.
        const CACHE_DISABLE = 0b0000_0001;
        /// Política de caché reservada para una futura materialización en
        /// disco; hoy, seleccionarla es un error de configuración (ver
        /// `validate`).
        const CACHE_REWRITE = 0b0000_0010;
        /// Política de caché reservada para bloquear la reescritura de una
        /// caché materializada; hoy, seleccionarla es un error de
        /// configuración (ver `validate`).
        const CACHE_BLOCKED = 0b0000_0100;
        /// Omite la inicialización del repositorio de progreso: el operador
        /// afirma que la tabla ya existe.
        const REPO_NOT_INIT = 0b0000_1000;
    }
}

impl Default for Mode {
    fn default() -> Self { Mode::CACHE_DISABLE }
}

impl Mode {
    /// Cualquier bandera de caché distinta de `CACHE_DISABLE` es, hoy, un
    /// error de configuración: el scaffolding de caché no está implementado.
    pub fn validate(self) -> Result<(), crate::errors::OrchestratorError> {
        if self.contains(Mode::CACHE_REWRITE) || self.contains(Mode::CACHE_BLOCKED) {
            return Err(crate::errors::OrchestratorError::Configuration("CACHE_REWRITE/CACHE_BLOCKED no están implementados; usar sólo CACHE_DISABLE".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_cache_disable_only() {
        assert_eq!(Mode::default(), Mode::CACHE_DISABLE);
        assert!(Mode::default().validate().is_ok());
    }

    #[test]
    fn reserved_cache_modes_are_rejected() {
        assert!((Mode::CACHE_DISABLE | Mode::CACHE_REWRITE).validate().is_err());
        assert!((Mode::CACHE_DISABLE | Mode::CACHE_BLOCKED).validate().is_err());
    }

    #[test]
    fn repo_not_init_composes_with_cache_disable() {
        let m = Mode::CACHE_DISABLE | Mode::REPO_NOT_INIT;
        assert!(m.validate().is_ok());
        assert!(m.contains(Mode::REPO_NOT_INIT));
    }
}
