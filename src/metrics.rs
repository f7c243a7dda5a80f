use tracing::trace;

// Trace-based counters; kept free of a metrics backend so batch runs stay
// dependency-light.

pub fn stage_elapsed(stage: &'static str, elapsed_ms: u128) {
    trace!(
        target = "catmon.metrics",
        stage = stage,
        elapsed_ms = elapsed_ms as u64,
        "stage_elapsed"
    );
}

pub fn lookup_completed(outcome: &'static str) {
    trace!(
        target = "catmon.metrics",
        outcome = outcome,
        "lookup_completed"
    );
}
