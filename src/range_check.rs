//! The single process-wide mutable flag described in the data model:
//! it gates bounds checking on container accessors and nothing else.
//!
//! Intended to be set once at program start; toggling it while a
//! workspace is mid-iteration is not supported (spec, design notes).

use std::sync::atomic::{AtomicBool, Ordering};

static RANGE_CHECK_ENABLED: AtomicBool = AtomicBool::new(true);

/// Returns whether range checking is currently enabled.
pub fn range_check_enabled() -> bool {
    RANGE_CHECK_ENABLED.load(Ordering::Relaxed)
}

/// Enables or disables range checking on bounds-checked accessors.
///
/// Meant to be called once, before any workspace is allocated.
pub fn set_range_check_enabled(enabled: bool) {
    RANGE_CHECK_ENABLED.store(enabled, Ordering::Relaxed);
}
