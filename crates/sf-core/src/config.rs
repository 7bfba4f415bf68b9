use std::sync::OnceLock;

fn env_true(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| {
        let trimmed = val.trim();
        !trimmed.is_empty() && !matches!(trimmed, "0" | "false" | "FALSE" | "False")
    })
}

/// Closure environments are heap allocated unless `STRUCTFLOW_CAPTURE_IN_HEAP` is set to a false value.
pub fn capture_in_heap() -> bool {
    static HEAP: OnceLock<bool> = OnceLock::new();
    *HEAP.get_or_init(|| env_true("STRUCTFLOW_CAPTURE_IN_HEAP").unwrap_or(true))
}

/// Raw value of `STRUCTFLOW_UNWIND_STRATEGY` (`chain` or `rethrow`), lowercased.
pub fn unwind_strategy_override() -> Option<&'static str> {
    static STRATEGY: OnceLock<Option<String>> = OnceLock::new();
    STRATEGY
        .get_or_init(|| {
            std::env::var("STRUCTFLOW_UNWIND_STRATEGY")
                .ok()
                .map(|val| val.trim().to_ascii_lowercase())
                .filter(|val| !val.is_empty())
        })
        .as_deref()
}

/// Run the lowered-form verifier after each function. On by default.
pub fn verify_enabled() -> bool {
    static VERIFY: OnceLock<bool> = OnceLock::new();
    *VERIFY.get_or_init(|| env_true("STRUCTFLOW_VERIFY").unwrap_or(true))
}
