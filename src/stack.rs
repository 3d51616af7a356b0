//! Growing the native stack ahead of deep recursion.

/// Remaining stack below which a new segment is allocated
const RED_ZONE: usize = 100 * 1024;
/// Size of each newly allocated segment
const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Runs `f`, first moving to a fresh stack segment if little stack is left.
/// Wrap every step of a walk whose depth follows the input: reading,
/// evaluation, printing, comparing and hashing.
#[inline]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}
