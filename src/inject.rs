//! Injection primitives used inside code under test
//!
//! With no active mutant every primitive falls through to the original
//! behavior.

use tracing::warn;

use crate::context;
use crate::mutant::MutableFn;

/// Evaluate `bad` if mutant `name` is active, otherwise `good`.
///
/// ```
/// use mutation_harness::select;
///
/// let (a, b) = (1, 2);
/// assert!(select("FLIP_LT", || a < b, || a > b));
/// ```
pub fn select<T>(name: &str, good: impl FnOnce() -> T, bad: impl FnOnce() -> T) -> T {
    if context::is_active(name) {
        bad()
    } else {
        good()
    }
}

impl<A: 'static, R: 'static> MutableFn<A, R> {
    /// Call the active mutant's override of this function if it has one,
    /// otherwise `original`.
    pub fn dispatch(&self, args: A, original: impl FnOnce(A) -> R) -> R {
        let Some(mutant) = context::current() else {
            return original(args);
        };
        let Some(entry) = mutant.lookup(self.name()) else {
            return original(args);
        };

        match entry.downcast::<A, R>() {
            Some(alternate) => alternate(args),
            None => {
                // Unreachable for registries built through RegistryBuilder.
                warn!(
                    function = self.name(),
                    mutant = mutant.name(),
                    "override has a different signature, running original"
                );
                original(args)
            }
        }
    }
}
