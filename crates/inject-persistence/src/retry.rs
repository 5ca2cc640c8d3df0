//! Gestor de reintentos: un pequeño objeto de estado con `(interval, cap,
//! counter)`. `has_next` es una comprobación pura; `attempt` incrementa el
//! contador y opcionalmente duerme. Los sleeps son desactivables para que
//! los tests de los bucles de reintento corran rápido.

use std::thread::sleep;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct RetryManager {
    interval: Option<Duration>,
    cap: Option<u32>,
    counter: u32,
    skip_sleep: bool,
}

impl RetryManager {
    pub fn new(interval: Option<Duration>, cap: Option<u32>, skip_sleep: bool) -> Self {
        Self { interval, cap, counter: 0, skip_sleep }
    }

    /// ¿Queda al menos un intento disponible? `cap = None` significa sin
    /// límite.
    pub fn has_next(&self) -> bool {
        match self.cap {
            Some(cap) => self.counter < cap,
            None => true,
        }
    }

    pub fn attempts_made(&self) -> u32 { self.counter }

    /// Registra un intento consumido y duerme `interval` (salvo en modo
    /// test).
    pub fn attempt(&mut self) {
        self.counter += 1;
        if !self.skip_sleep {
            if let Some(interval) = self.interval {
                sleep(interval);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_cap_always_has_next() {
        let mut r = RetryManager::new(None, None, true);
        for _ in 0..1000 {
            assert!(r.has_next());
            r.attempt();
        }
    }

    #[test]
    fn bounded_cap_exhausts() {
        let mut r = RetryManager::new(None, Some(3), true);
        assert!(r.has_next());
        r.attempt();
        assert!(r.has_next());
        r.attempt();
        assert!(r.has_next());
        r.attempt();
        assert!(!r.has_next());
        assert_eq!(r.attempts_made(), 3);
    }

    #[test]
    fn skip_sleep_avoids_real_delay() {
        let mut r = RetryManager::new(Some(Duration::from_secs(60)), Some(1), true);
        let start = std::time::Instant::now();
        r.attempt();
        assert!(start.elapsed() < Duration::from_millis(100));
    }
}
