use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Global readiness flag indicating whether the gateway has loaded its configuration
/// and built its routes.
///
/// Read by the readiness endpoint to decide if traffic can be accepted.
static CONFIG_LOADED: AtomicBool = AtomicBool::new(false);

static ROUTES: AtomicUsize = AtomicUsize::new(0);

/// Mark the gateway as ready.
///
/// Called once from startup after the YAML configuration is loaded and every
/// router with its plugins has been built successfully.
pub fn mark_ready(routes: usize) {
    ROUTES.store(routes, Ordering::SeqCst);
    CONFIG_LOADED.store(true, Ordering::SeqCst);
    log::info!("Configuration loaded with {routes} route(s), gateway is ready");
}

/// Check if the gateway is ready to handle traffic.
pub fn is_ready() -> bool {
    CONFIG_LOADED.load(Ordering::SeqCst)
}

/// Number of routes registered when the gateway became ready.
pub fn route_count() -> usize {
    ROUTES.load(Ordering::SeqCst)
}

/// Reset readiness status between tests.
#[cfg(test)]
pub fn reset() {
    CONFIG_LOADED.store(false, Ordering::SeqCst);
    ROUTES.store(0, Ordering::SeqCst);
    log::debug!("Readiness status reset");
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;

    // These tests touch process-wide state, so they share one lock with every
    // other test that flips the readiness flag.
    pub(crate) static TEST_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_initial_state_not_ready() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset();
        assert!(!is_ready());
    }

    #[test]
    fn test_mark_ready() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset();
        assert!(!is_ready());
        mark_ready(1);
        assert!(is_ready());
    }

    #[test]
    fn test_multiple_marks_stay_ready() {
        let _guard = TEST_LOCK.lock().unwrap();
        reset();
        mark_ready(1);
        mark_ready(3);
        assert!(is_ready());
        assert_eq!(route_count(), 3);
    }
}
