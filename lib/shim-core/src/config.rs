//! Ambient configuration for the translation engine.
//!
//! Debug/validation toggles only — there are no rendering-quality knobs here,
//! since those are out of this layer's scope. A small `Options`-style struct
//! threaded through device construction, the same shape as a backend's own
//! construction options or a debug-mode config struct consumed deeper in the
//! pipeline.

/// Threaded through [`crate::device::Device::new`].
#[derive(Debug, Clone)]
pub struct ShimOptions {
    /// Enables extra programming-mistake assertions beyond what the legacy
    /// contract requires (e.g. logging out-of-range render-state writes that
    /// the legacy ABI otherwise silently ignores). Off by
    /// default so a release build pays no extra cost for the common path.
    pub validate_state_transitions: bool,
    /// `log` target string used by this crate's log statements, so an
    /// embedding application can filter or route them independently of its
    /// own logging.
    pub log_category: &'static str,
}

impl Default for ShimOptions {
    fn default() -> Self {
        Self { validate_state_transitions: false, log_category: "shim_core" }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults_disable_validation() {
        let options = ShimOptions::default();
        assert!(!options.validate_state_transitions);
        assert_eq!(options.log_category, "shim_core");
    }
}
