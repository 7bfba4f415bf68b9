use sf_core::cfg::TargetEnv;
use sf_core::config;

/// Where closure environments are allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStorage {
    Stack,
    Heap,
}

/// How a finally clone leaves once it is done, when an enclosing try is waiting for the
/// exception.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnwindStrategy {
    /// Cleanup pad whose `EndCleanup` names the parent landing pad (funclet style).
    ChainToParent,
    /// Catch-all pad that rethrows to the parent landing pad once the finally body ran.
    CatchAndRethrow,
}

impl UnwindStrategy {
    pub fn for_target(env: &TargetEnv) -> Self {
        if env.is_windows() {
            UnwindStrategy::ChainToParent
        } else {
            UnwindStrategy::CatchAndRethrow
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "chain" | "chain-to-parent" => Some(UnwindStrategy::ChainToParent),
            "rethrow" | "catch-and-rethrow" => Some(UnwindStrategy::CatchAndRethrow),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoweringOptions {
    pub capture_storage: CaptureStorage,
    pub unwind_strategy: UnwindStrategy,
    pub verify: bool,
    pub run_cleanup: bool,
    pub relocate_constants: bool,
}

impl LoweringOptions {
    /// Defaults for `env`, with `STRUCTFLOW_*` environment overrides applied.
    pub fn for_target(env: &TargetEnv) -> Self {
        let unwind_strategy = config::unwind_strategy_override()
            .and_then(UnwindStrategy::parse)
            .unwrap_or_else(|| UnwindStrategy::for_target(env));
        let capture_storage = if config::capture_in_heap() {
            CaptureStorage::Heap
        } else {
            CaptureStorage::Stack
        };
        Self {
            capture_storage,
            unwind_strategy,
            verify: config::verify_enabled(),
            run_cleanup: true,
            relocate_constants: true,
        }
    }

    pub fn with_unwind_strategy(mut self, strategy: UnwindStrategy) -> Self {
        self.unwind_strategy = strategy;
        self
    }

    pub fn with_capture_storage(mut self, storage: CaptureStorage) -> Self {
        self.capture_storage = storage;
        self
    }

    pub fn with_cleanup(mut self, run_cleanup: bool) -> Self {
        self.run_cleanup = run_cleanup;
        self
    }
}

impl Default for LoweringOptions {
    fn default() -> Self {
        Self::for_target(&TargetEnv::host())
    }
}
