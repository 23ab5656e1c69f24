//! Mutant registry
//!
//! Mutants are declared through a [`RegistryBuilder`] during initialization
//! and frozen into a read-only [`Registry`] before any suite runs.
//!
//! ```
//! use mutation_harness::{MutableFn, Registry, ScopeSet};
//!
//! static INC: MutableFn<i64, i64> = MutableFn::new("inc");
//!
//! let mut builder = Registry::builder();
//! builder.declare("FLIP_LT", "sort.rs", "Change < to >.").unwrap();
//! builder
//!     .declare_override(&INC, "INC_OBO", Some(ScopeSet::from("sort.rs")), "Off by one.", |x| x + 2)
//!     .unwrap();
//! let registry = builder.build();
//!
//! let names: Vec<_> = registry.resolve("sort.rs").iter().map(|m| m.name().to_string()).collect();
//! assert_eq!(names, ["FLIP_LT", "INC_OBO"]);
//! assert!(registry.resolve("other.rs").is_empty());
//! ```

use std::any::TypeId;
use std::collections::{BTreeMap, HashMap};
use std::panic::Location;
use std::sync::Arc;

use tracing::debug;

use crate::error::{MutationError, Result};
use crate::mutant::{MutableFn, Mutant, Override};
use crate::scope::{Scope, ScopeSet};

/// Read-only mapping from scope to mutant name to mutant
#[derive(Debug, Default, Clone)]
pub struct Registry {
    scopes: BTreeMap<Scope, BTreeMap<String, Arc<Mutant>>>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    /// Effective mutant set for `scope`, ordered by name.
    ///
    /// Universal mutants are included for every scope. When a name is
    /// declared both universally and under `scope`, the scope's own entry
    /// wins.
    pub fn resolve(&self, scope: impl Into<Scope>) -> Vec<Arc<Mutant>> {
        let scope = scope.into();
        let mut effective: BTreeMap<&str, &Arc<Mutant>> = BTreeMap::new();

        for target in [&Scope::All, &scope] {
            if let Some(mutants) = self.scopes.get(target) {
                for (name, mutant) in mutants {
                    effective.insert(name.as_str(), mutant);
                }
            }
        }

        effective.into_values().cloned().collect()
    }

    /// The mutant declared under exactly `scope`, ignoring universal ones
    pub fn get(&self, scope: &Scope, name: &str) -> Option<&Arc<Mutant>> {
        self.scopes.get(scope)?.get(name)
    }

    /// Every scope that has at least one declared mutant
    pub fn scopes(&self) -> impl Iterator<Item = &Scope> {
        self.scopes.keys()
    }

    /// Names of the effective mutants for `scope`
    pub fn mutant_names(&self, scope: impl Into<Scope>) -> Vec<String> {
        self.resolve(scope)
            .iter()
            .map(|mutant| mutant.name().to_string())
            .collect()
    }

    /// Total number of (scope, mutant) declarations
    pub fn len(&self) -> usize {
        self.scopes.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Collects mutant declarations
#[derive(Default)]
pub struct RegistryBuilder {
    scopes: BTreeMap<Scope, BTreeMap<String, Mutant>>,
    signatures: HashMap<&'static str, (TypeId, &'static str)>,
}

impl RegistryBuilder {
    /// Register `mutant_name` under every scope in `scopes`.
    ///
    /// Declaring a name that already exists in a scope reuses the existing
    /// mutant. The returned handle adds function overrides to the mutant in
    /// all of those scopes.
    pub fn declare(
        &mut self,
        mutant_name: &str,
        scopes: impl Into<ScopeSet>,
        description: &str,
    ) -> Result<Declared<'_>> {
        if mutant_name.trim().is_empty() {
            return Err(MutationError::config("mutant names must not be blank"));
        }
        let scopes = scopes.into().expand()?;

        for scope in &scopes {
            let mutants = self.scopes.entry(scope.clone()).or_default();
            match mutants.get_mut(mutant_name) {
                Some(existing) => existing.fill_description(description),
                None => {
                    debug!(mutant = mutant_name, scope = %scope, "declared mutant");
                    mutants.insert(
                        mutant_name.to_string(),
                        Mutant::new(mutant_name, description),
                    );
                }
            }
        }

        Ok(Declared {
            builder: self,
            mutant_name: mutant_name.to_string(),
            scopes,
        })
    }

    /// Register a whole-function override for `key` under `mutant_name`.
    ///
    /// With `scopes` omitted, the mutant is declared under the basename of
    /// the source file this is called from.
    #[track_caller]
    pub fn declare_override<A, R, F>(
        &mut self,
        key: &MutableFn<A, R>,
        mutant_name: &str,
        scopes: Option<ScopeSet>,
        description: &str,
        alternate: F,
    ) -> Result<&mut Self>
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let caller = Location::caller();
        let scopes = scopes.unwrap_or_else(|| Scope::of_location(caller).into());
        self.declare(mutant_name, scopes, description)?
            .add_mapping(key, alternate)?;
        Ok(self)
    }

    pub fn build(self) -> Registry {
        let scopes = self
            .scopes
            .into_iter()
            .map(|(scope, mutants)| {
                let mutants = mutants
                    .into_iter()
                    .map(|(name, mutant)| (name, Arc::new(mutant)))
                    .collect();
                (scope, mutants)
            })
            .collect();
        Registry { scopes }
    }

    fn check_signature(&mut self, function: &'static str, entry: &Override) -> Result<()> {
        let (existing, existing_name) = *self
            .signatures
            .entry(function)
            .or_insert((entry.signature(), entry.signature_name()));

        if existing != entry.signature() {
            return Err(MutationError::SignatureConflict {
                function: function.to_string(),
                existing: existing_name.to_string(),
                conflicting: entry.signature_name().to_string(),
            });
        }
        Ok(())
    }
}

/// Handle to a freshly declared (or re-used) mutant
pub struct Declared<'a> {
    builder: &'a mut RegistryBuilder,
    mutant_name: String,
    scopes: Vec<Scope>,
}

impl Declared<'_> {
    /// Use `alternate` in place of `key`'s original body while this mutant
    /// is active
    pub fn add_mapping<A, R, F>(self, key: &MutableFn<A, R>, alternate: F) -> Result<Self>
    where
        A: 'static,
        R: 'static,
        F: Fn(A) -> R + Send + Sync + 'static,
    {
        let entry = Override::new(alternate);
        self.builder.check_signature(key.name(), &entry)?;

        for scope in &self.scopes {
            if let Some(mutant) = self
                .builder
                .scopes
                .get_mut(scope)
                .and_then(|mutants| mutants.get_mut(&self.mutant_name))
            {
                mutant.insert_override(key.name(), entry.clone());
            }
        }
        Ok(self)
    }

    pub fn name(&self) -> &str {
        &self.mutant_name
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }
}
