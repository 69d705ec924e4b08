//! Sequential error resolution.

use std::future::Future;

/// Result of walking a list of errors.
#[derive(Debug)]
pub struct SequenceOutcome<E, R> {
    /// Errors the handler was not asked about, in input order.
    pub unhandled: Vec<E>,
    /// Handler results, in input order.
    pub resolved: Vec<R>,
}

impl<E, R> Default for SequenceOutcome<E, R> {
    fn default() -> Self {
        Self {
            unhandled: Vec::new(),
            resolved: Vec::new(),
        }
    }
}

/// Hand each error accepted by `should_handle` to `handle`, one at a time.
///
/// A handler future runs to completion before the next error is looked at,
/// so at most one prompt is ever outstanding. Every input error ends up
/// either in `unhandled` or as exactly one entry in `resolved`.
pub async fn resolve_sequentially<E, R, S, H, Fut>(
    errors: Vec<E>,
    should_handle: S,
    mut handle: H,
) -> SequenceOutcome<E, R>
where
    S: Fn(&E) -> bool,
    H: FnMut(E) -> Fut,
    Fut: Future<Output = R>,
{
    let mut outcome = SequenceOutcome::default();
    for error in errors {
        if should_handle(&error) {
            outcome.resolved.push(handle(error).await);
        } else {
            outcome.unhandled.push(error);
        }
    }
    outcome
}
