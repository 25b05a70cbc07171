//! On-demand stack growth for the recursive evaluator.
//!
//! Evaluation recurses once per nested form, so a runaway recursive closure can
//! outgrow a thread's native stack long before [`crate::MAX_EVAL_DEPTH`] is reached,
//! especially on small test-harness threads. Wrapping each recursion step in
//! [`ensure_sufficient_stack`] keeps the depth limit, not a native overflow, as the
//! thing that stops it.

/// If less than this much stack remains, grow before recursing.
const RED_ZONE: usize = 64 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: u64) -> u64 {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn test_deep_recursion_grows_stack() {
        assert_eq!(depth(200_000), 200_000);
    }
}
