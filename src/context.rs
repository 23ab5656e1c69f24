//! Mutation context: which mutant, if any, is live
//!
//! Each thread has its own single slot, so distinct mutants can run on
//! distinct threads without seeing each other. Activation returns an
//! [`ActivationGuard`] that clears the slot when dropped, including during
//! unwinding.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::mutant::Mutant;

thread_local! {
    static ACTIVE: RefCell<Option<Arc<Mutant>>> = const { RefCell::new(None) };
}

/// Clears the active mutant on drop
#[must_use = "the mutant is deactivated as soon as the guard is dropped"]
#[derive(Debug)]
pub struct ActivationGuard {
    // Tied to the thread whose slot it clears.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ActivationGuard {
    fn drop(&mut self) {
        clear();
    }
}

/// Make `mutant` the active mutant of the current thread.
///
/// An already active mutant is overwritten.
pub fn activate(mutant: Arc<Mutant>) -> ActivationGuard {
    let name = mutant.name().to_string();
    let previous = ACTIVE.with(|slot| slot.borrow_mut().replace(mutant));
    if let Some(previous) = previous {
        warn!(
            previous = previous.name(),
            mutant = %name,
            "overwriting active mutant"
        );
    }
    debug!(mutant = %name, "mutant activated");
    ActivationGuard {
        _not_send: PhantomData,
    }
}

/// Reset the current thread's slot to "no mutant"
pub fn clear() {
    if let Some(previous) = ACTIVE.with(|slot| slot.borrow_mut().take()) {
        debug!(mutant = previous.name(), "mutant cleared");
    }
}

/// True iff a mutant named `name` is active on this thread
pub fn is_active(name: &str) -> bool {
    ACTIVE.with(|slot| {
        slot.borrow()
            .as_ref()
            .is_some_and(|mutant| mutant.name() == name)
    })
}

pub fn is_not_active(name: &str) -> bool {
    !is_active(name)
}

/// Name of the active mutant, if any
pub fn active_mutant_name() -> Option<String> {
    current().map(|mutant| mutant.name().to_string())
}

// Cloned out of the slot so callers may re-enter the context while using it.
pub(crate) fn current() -> Option<Arc<Mutant>> {
    ACTIVE.with(|slot| slot.borrow().clone())
}
