//! Runtime mutation testing with hand-authored mutants
//!
//! Mutants are declared next to production code as alternate behaviors
//! selected by name at runtime. The harness runs the test suite once per
//! mutant and reports every mutant the suite failed to detect.
//!
//! Production code exposes mutation points through three primitives:
//! - [`select`] swaps a single expression,
//! - [`is_active`] / [`is_not_active`] guard a statement or block,
//! - [`MutableFn::dispatch`] replaces a whole function body.
//!
//! # Example
//!
//! ```
//! use mutation_harness::{select, Driver, MutableFn, Registry};
//!
//! static INCREMENT: MutableFn<i64, i64> = MutableFn::new("increment");
//!
//! fn increment(x: i64) -> i64 {
//!     INCREMENT.dispatch(x, |x| x + 1)
//! }
//!
//! fn is_smaller(a: i64, b: i64) -> bool {
//!     select("FLIP_LT", || a < b, || a > b)
//! }
//!
//! fn suite() {
//!     assert_eq!(increment(1) - 1, 1);
//!     assert!(is_smaller(1, 2));
//! }
//!
//! let mut builder = Registry::builder();
//! builder.declare("FLIP_LT", "math.rs", "Change < to >.").unwrap();
//! builder
//!     .declare_override(&INCREMENT, "INC_OBO", Some("math.rs".into()), "Off by one.", |x| x + 2)
//!     .unwrap();
//! let registry = builder.build();
//!
//! let report = Driver::new(&registry)
//!     .report(suite, "math.rs", ["FLIP_LT", "INC_OBO"])
//!     .unwrap();
//! assert_eq!(report.killed(), 2);
//! report.into_result().unwrap();
//! ```

pub mod config;
pub mod context;
#[cfg(feature = "demo")]
pub mod demo;
pub mod error;
pub mod inject;
pub mod mutant;
pub mod registry;
pub mod report;
pub mod runner;
pub mod scope;

// Re-export main types at crate root
pub use config::{Config, RunConfig, Settings};
pub use context::{activate, active_mutant_name, clear, is_active, is_not_active, ActivationGuard};
pub use error::{MutationError, Result};
pub use inject::select;
pub use mutant::{MutableFn, Mutant};
pub use registry::{Declared, Registry, RegistryBuilder};
pub use report::MutationReport;
pub use runner::{
    assert_mutants_killed, run_under_mutant, Driver, MutantStatus, MutantVerdict, RunSettings,
    SuiteOutcome,
};
pub use scope::{Scope, ScopeSet, APPLY_TO_ALL};
