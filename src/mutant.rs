//! Mutants and their function overrides

use std::any::{type_name, Any, TypeId};
use std::collections::BTreeMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

/// Typed key identifying a function whose body a mutant may replace.
///
/// The key carries the signature: arguments `A` (use a tuple for several
/// arguments) and return type `R`. Declare one per mutable function:
///
/// ```
/// use mutation_harness::MutableFn;
///
/// static INCREMENT: MutableFn<i64, i64> = MutableFn::new("increment");
///
/// fn increment(x: i64) -> i64 {
///     INCREMENT.dispatch(x, |x| x + 1)
/// }
///
/// assert_eq!(increment(1), 2);
/// ```
pub struct MutableFn<A, R> {
    name: &'static str,
    _signature: PhantomData<fn(A) -> R>,
}

impl<A, R> MutableFn<A, R> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _signature: PhantomData,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<A, R> fmt::Debug for MutableFn<A, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MutableFn")
            .field("name", &self.name)
            .field("signature", &type_name::<fn(A) -> R>())
            .finish()
    }
}

pub(crate) type Alternate<A, R> = Box<dyn Fn(A) -> R + Send + Sync>;

/// A type-erased alternate implementation
#[derive(Clone)]
pub(crate) struct Override {
    signature: TypeId,
    signature_name: &'static str,
    implementation: Arc<dyn Any + Send + Sync>,
}

impl Override {
    pub(crate) fn new<A, R, F>(alternate: F) -> Self
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let boxed: Alternate<A, R> = Box::new(alternate);
        Self {
            signature: TypeId::of::<Alternate<A, R>>(),
            signature_name: type_name::<fn(A) -> R>(),
            implementation: Arc::new(boxed),
        }
    }

    pub(crate) fn signature(&self) -> TypeId {
        self.signature
    }

    pub(crate) fn signature_name(&self) -> &'static str {
        self.signature_name
    }

    pub(crate) fn downcast<A: 'static, R: 'static>(&self) -> Option<&Alternate<A, R>> {
        self.implementation.downcast_ref::<Alternate<A, R>>()
    }
}

/// A named, described bundle of alternate behavior
///
/// A mutant with no function mappings is valid: it is expressed entirely
/// through inline [`select`](crate::select) and
/// [`is_active`](crate::is_active) call sites.
#[derive(Clone)]
pub struct Mutant {
    name: String,
    description: String,
    function_mappings: BTreeMap<&'static str, Override>,
}

impl Mutant {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            function_mappings: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    /// Names of the functions this mutant overrides
    pub fn overridden_functions(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.function_mappings.keys().copied()
    }

    pub fn overrides(&self, function: &str) -> bool {
        self.function_mappings.contains_key(function)
    }

    /// Register `alternate` as this mutant's implementation of `key`
    pub fn add_mapping<A, R, F>(&mut self, key: &MutableFn<A, R>, alternate: F)
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        self.insert_override(key.name(), Override::new(alternate));
    }

    pub(crate) fn insert_override(&mut self, function: &'static str, entry: Override) {
        self.function_mappings.insert(function, entry);
    }

    pub(crate) fn fill_description(&mut self, description: &str) {
        if self.description.is_empty() && !description.is_empty() {
            self.description = description.to_string();
        }
    }

    pub(crate) fn lookup(&self, function: &str) -> Option<&Override> {
        self.function_mappings.get(function)
    }
}

impl fmt::Debug for Mutant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mutant")
            .field("name", &self.name)
            .field("description", &self.description)
            .field(
                "function_mappings",
                &self.function_mappings.keys().collect::<Vec<_>>(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    static DOUBLE: MutableFn<u32, u32> = MutableFn::new("double");

    #[test]
    fn test_empty_mutant_is_valid() {
        let mutant = Mutant::new("NO_MUTATION", "");
        assert_eq!(mutant.name(), "NO_MUTATION");
        assert_eq!(mutant.overridden_functions().count(), 0);
    }

    #[test]
    fn test_add_mapping_replaces_previous_alternate() {
        let mut mutant = Mutant::new("TRIPLE", "Triple instead of double.");
        mutant.add_mapping(&DOUBLE, |x| x * 4);
        mutant.add_mapping(&DOUBLE, |x| x * 3);

        assert!(mutant.overrides("double"));
        let alternate = mutant.lookup("double").unwrap().downcast::<u32, u32>().unwrap();
        assert_eq!(alternate(5), 15);
    }

    #[test]
    fn test_downcast_with_wrong_signature_fails() {
        let mut mutant = Mutant::new("TRIPLE", "");
        mutant.add_mapping(&DOUBLE, |x| x * 3);
        assert!(mutant
            .lookup("double")
            .unwrap()
            .downcast::<u64, u64>()
            .is_none());
    }

    #[test]
    fn test_fill_description_keeps_first_non_empty() {
        let mut mutant = Mutant::new("M", "");
        mutant.fill_description("first");
        mutant.fill_description("second");
        assert_eq!(mutant.description(), "first");
    }
}
