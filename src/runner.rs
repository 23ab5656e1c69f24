//! Test runner for mutation testing
//!
//! This module coordinates the mutation testing process:
//! - Resolves the mutants of a scope
//! - Runs the suite once per mutant with that mutant active
//! - Collects verdicts

use std::any::Any;
use std::cell::Cell;
use std::fmt;
use std::panic::{self, catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::context;
use crate::error::{MutationError, Result};
use crate::mutant::Mutant;
use crate::registry::Registry;
use crate::report::MutationReport;
use crate::scope::{Scope, ScopeSet};

/// What a suite returns: `()` or any `Result<(), E>`
pub trait SuiteOutcome {
    fn into_result(self) -> anyhow::Result<()>;
}

impl SuiteOutcome for () {
    fn into_result(self) -> anyhow::Result<()> {
        Ok(())
    }
}

impl<E: Into<anyhow::Error>> SuiteOutcome for std::result::Result<(), E> {
    fn into_result(self) -> anyhow::Result<()> {
        self.map_err(Into::into)
    }
}

/// Status of a mutant after running the suite
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MutantStatus {
    /// Suite failed - mutant was detected (good!)
    Killed { reason: String },
    /// Suite passed - mutant was NOT detected (bad!)
    Survived,
    /// Suite did not finish within the configured timeout
    TimedOut,
}

/// Result of running the suite against a single mutant
#[derive(Debug, Clone, Serialize)]
pub struct MutantVerdict {
    pub name: String,
    pub description: String,
    #[serde(flatten)]
    pub status: MutantStatus,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl MutantVerdict {
    pub fn survived(&self) -> bool {
        self.status == MutantStatus::Survived
    }

    pub fn killed(&self) -> bool {
        matches!(self.status, MutantStatus::Killed { .. })
    }

    /// The reportable failure for a mutant that was not killed
    pub fn failure(&self, timeout: Option<Duration>) -> Option<MutationError> {
        match self.status {
            MutantStatus::Killed { .. } => None,
            MutantStatus::Survived => Some(MutationError::Survived {
                name: self.name.clone(),
                description: self.description.clone(),
            }),
            MutantStatus::TimedOut => Some(MutationError::TimedOut {
                name: self.name.clone(),
                description: self.description.clone(),
                limit: timeout.unwrap_or(self.duration),
            }),
        }
    }
}

pub(crate) fn as_millis<S>(duration: &Duration, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_u64(duration.as_millis() as u64)
}

thread_local! {
    static QUIET: Cell<bool> = const { Cell::new(false) };
    static SILENCED: Cell<usize> = const { Cell::new(0) };
}

static QUIET_HOOK: Once = Once::new();

/// Wrap the process panic hook once. Panics raised on a thread that is
/// running a suite under a mutant go to `debug!`; all others reach the
/// previous hook unchanged.
fn install_quiet_hook() {
    QUIET_HOOK.call_once(|| {
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            if QUIET.with(Cell::get) {
                SILENCED.with(|count| count.set(count.get() + 1));
                debug!(panic = %info, "suite panicked under mutant");
            } else {
                previous(info);
            }
        }));
    });
}

/// Keeps panics on the current thread away from the previous hook until dropped
struct QuietPanics {
    was_quiet: bool,
    start: usize,
}

impl QuietPanics {
    fn enter() -> Self {
        install_quiet_hook();
        Self {
            was_quiet: QUIET.with(|quiet| quiet.replace(true)),
            start: SILENCED.with(Cell::get),
        }
    }

    fn silenced(&self) -> usize {
        SILENCED.with(Cell::get) - self.start
    }
}

impl Drop for QuietPanics {
    fn drop(&mut self) {
        QUIET.with(|quiet| quiet.set(self.was_quiet));
    }
}

enum SuiteRun {
    Passed,
    Failed(String),
}

/// Run `suite` once with `mutant` active.
///
/// Returns `true` if the suite completed cleanly (the mutant survived) and
/// `false` if it returned an error or panicked. The mutant is deactivated
/// before this returns, on every path. Panics raised by the suite are
/// logged at debug level instead of going through the panic hook.
pub fn run_under_mutant<S, O>(mutant: &Arc<Mutant>, suite: S) -> bool
where
    S: FnOnce() -> O,
    O: SuiteOutcome,
{
    matches!(execute(mutant, suite), SuiteRun::Passed)
}

fn execute<S, O>(mutant: &Arc<Mutant>, suite: S) -> SuiteRun
where
    S: FnOnce() -> O,
    O: SuiteOutcome,
{
    let quiet = QuietPanics::enter();
    let guard = context::activate(Arc::clone(mutant));
    let outcome = catch_unwind(AssertUnwindSafe(|| suite().into_result()));
    drop(guard);

    let silenced = quiet.silenced();
    drop(quiet);
    if silenced > 0 {
        debug!(mutant = mutant.name(), silenced, "suite panics silenced");
    }

    match outcome {
        Ok(Ok(())) => SuiteRun::Passed,
        Ok(Err(error)) => SuiteRun::Failed(format!("{error:#}")),
        Err(payload) => SuiteRun::Failed(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

/// Settings for a batch of mutant runs
#[derive(Debug, Clone, PartialEq)]
pub struct RunSettings {
    /// Per-mutant limit; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Number of worker threads
    pub jobs: usize,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            timeout: None,
            jobs: 1,
        }
    }
}

/// Runs suites against the mutants of a [`Registry`]
#[derive(Debug, Clone)]
pub struct Driver<'r> {
    registry: &'r Registry,
    settings: RunSettings,
}

impl<'r> Driver<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            settings: RunSettings::default(),
        }
    }

    pub fn with_settings(mut self, settings: RunSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn settings(&self) -> &RunSettings {
        &self.settings
    }

    /// Run `suite` once for each of `requested` among the mutants of `scope`.
    ///
    /// Every requested name must be part of the effective set for `scope`;
    /// otherwise nothing runs and [`MutationError::UnknownMutant`] is
    /// returned. Verdicts follow the registry's resolve order.
    pub fn run_all<S, O, I, N>(
        &self,
        suite: S,
        scope: impl Into<Scope>,
        requested: I,
    ) -> Result<Vec<MutantVerdict>>
    where
        S: Fn() -> O + Send + Sync + 'static,
        O: SuiteOutcome + 'static,
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let scope = scope.into();
        let mutants = self.select(&scope, requested)?;
        self.run_mutants(suite, &scope, mutants)
    }

    /// Run `suite` once for every mutant effective in `scope`
    pub fn run_scope<S, O>(&self, suite: S, scope: impl Into<Scope>) -> Result<Vec<MutantVerdict>>
    where
        S: Fn() -> O + Send + Sync + 'static,
        O: SuiteOutcome + 'static,
    {
        let scope = scope.into();
        let mutants = self.registry.resolve(scope.clone());
        self.run_mutants(suite, &scope, mutants)
    }

    /// Run `suite` for the mutants of every scope in `scopes`.
    ///
    /// An empty `requested` list selects every effective mutant. A mutant
    /// visible from several of the scopes, such as a universal one, runs
    /// once.
    pub fn run_scopes<S, O>(
        &self,
        suite: S,
        scopes: &ScopeSet,
        requested: &[String],
    ) -> Result<Vec<MutantVerdict>>
    where
        S: Fn() -> O + Send + Sync + 'static,
        O: SuiteOutcome + 'static,
    {
        let mut mutants: Vec<Arc<Mutant>> = Vec::new();
        for scope in scopes.expand()? {
            let selected = if requested.is_empty() {
                self.registry.resolve(scope)
            } else {
                self.select(&scope, requested)?
            };
            for mutant in selected {
                if !mutants.iter().any(|seen| Arc::ptr_eq(seen, &mutant)) {
                    mutants.push(mutant);
                }
            }
        }
        self.run_mutants(suite, scopes, mutants)
    }

    /// Like [`Driver::run_all`], wrapped into a [`MutationReport`]
    pub fn report<S, O, I, N>(
        &self,
        suite: S,
        scope: impl Into<Scope>,
        requested: I,
    ) -> Result<MutationReport>
    where
        S: Fn() -> O + Send + Sync + 'static,
        O: SuiteOutcome + 'static,
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let verdicts = self.run_all(suite, scope, requested)?;
        Ok(MutationReport::new(verdicts).with_timeout(self.settings.timeout))
    }

    fn select<I, N>(&self, scope: &Scope, requested: I) -> Result<Vec<Arc<Mutant>>>
    where
        I: IntoIterator<Item = N>,
        N: AsRef<str>,
    {
        let effective = self.registry.resolve(scope.clone());
        let requested: Vec<String> = requested
            .into_iter()
            .map(|name| name.as_ref().to_string())
            .collect();

        if let Some(unknown) = requested
            .iter()
            .find(|name| !effective.iter().any(|mutant| mutant.name() == name.as_str()))
        {
            return Err(MutationError::UnknownMutant {
                name: unknown.clone(),
                scope: scope.to_string(),
                available: effective
                    .iter()
                    .map(|mutant| mutant.name().to_string())
                    .collect(),
            });
        }

        Ok(effective
            .into_iter()
            .filter(|mutant| requested.iter().any(|name| name == mutant.name()))
            .collect())
    }

    fn run_mutants<S, O>(
        &self,
        suite: S,
        scope: &dyn fmt::Display,
        mutants: Vec<Arc<Mutant>>,
    ) -> Result<Vec<MutantVerdict>>
    where
        S: Fn() -> O + Send + Sync + 'static,
        O: SuiteOutcome + 'static,
    {
        if mutants.is_empty() {
            warn!(scope = %scope, "no mutants selected");
            return Ok(Vec::new());
        }
        debug!(scope = %scope, count = mutants.len(), jobs = self.settings.jobs, "running mutants");

        let suite = Arc::new(suite);
        let jobs = self.settings.jobs.clamp(1, mutants.len());
        if jobs == 1 {
            return mutants
                .iter()
                .map(|mutant| self.run_one(mutant, &suite))
                .collect();
        }

        let next = AtomicUsize::new(0);
        let slots: Vec<Mutex<Option<Result<MutantVerdict>>>> =
            mutants.iter().map(|_| Mutex::new(None)).collect();

        thread::scope(|workers| {
            for _ in 0..jobs {
                workers.spawn(|| loop {
                    let index = next.fetch_add(1, Ordering::Relaxed);
                    let Some(mutant) = mutants.get(index) else {
                        break;
                    };
                    let verdict = self.run_one(mutant, &suite);
                    if let Ok(mut slot) = slots[index].lock() {
                        *slot = Some(verdict);
                    }
                });
            }
        });

        slots
            .into_iter()
            .zip(&mutants)
            .map(|(slot, mutant)| {
                slot.into_inner()
                    .ok()
                    .flatten()
                    .unwrap_or_else(|| {
                        Err(MutationError::WorkerLost {
                            name: mutant.name().to_string(),
                        })
                    })
            })
            .collect()
    }

    fn run_one<S, O>(&self, mutant: &Arc<Mutant>, suite: &Arc<S>) -> Result<MutantVerdict>
    where
        S: Fn() -> O + Send + Sync + 'static,
        O: SuiteOutcome + 'static,
    {
        let start = Instant::now();
        let status = match self.settings.timeout {
            None => status_of(execute(mutant, || (suite.as_ref())())),
            Some(limit) => run_with_timeout(mutant, Arc::clone(suite), limit)?,
        };
        let duration = start.elapsed();

        match &status {
            MutantStatus::Killed { reason } => {
                info!(mutant = mutant.name(), %reason, "mutant killed")
            }
            MutantStatus::Survived => warn!(mutant = mutant.name(), "mutant survived"),
            MutantStatus::TimedOut => warn!(mutant = mutant.name(), "mutant timed out"),
        }

        Ok(MutantVerdict {
            name: mutant.name().to_string(),
            description: mutant.description().to_string(),
            status,
            duration,
        })
    }
}

fn status_of(run: SuiteRun) -> MutantStatus {
    match run {
        SuiteRun::Passed => MutantStatus::Survived,
        SuiteRun::Failed(reason) => MutantStatus::Killed { reason },
    }
}

/// Run the suite on its own thread and stop waiting after `limit`.
///
/// A suite that overruns cannot be cancelled; its thread is left running
/// with the mutant active in that thread only.
fn run_with_timeout<S, O>(mutant: &Arc<Mutant>, suite: Arc<S>, limit: Duration) -> Result<MutantStatus>
where
    S: Fn() -> O + Send + Sync + 'static,
    O: SuiteOutcome + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let worker_mutant = Arc::clone(mutant);

    thread::Builder::new()
        .name(format!("mutant-{}", mutant.name()))
        .spawn(move || {
            let run = execute(&worker_mutant, || (suite.as_ref())());
            let _ = sender.send(status_of(run));
        })
        .map_err(|e| MutationError::WorkerSpawn {
            name: mutant.name().to_string(),
            error: e.to_string(),
        })?;

    match receiver.recv_timeout(limit) {
        Ok(status) => Ok(status),
        Err(mpsc::RecvTimeoutError::Timeout) => Ok(MutantStatus::TimedOut),
        Err(mpsc::RecvTimeoutError::Disconnected) => Ok(MutantStatus::Killed {
            reason: "suite thread exited without reporting".to_string(),
        }),
    }
}

/// Run the requested mutants and panic with every survivor.
///
/// Meant to be called from a `#[test]` function so that survivors surface
/// as test failures:
///
/// ```should_panic
/// use mutation_harness::{assert_mutants_killed, Registry};
///
/// let mut builder = Registry::builder();
/// builder.declare("NO_MUTATION", "lib.rs", "Sanity check.").unwrap();
/// let registry = builder.build();
///
/// // A suite that never fails lets every mutant survive.
/// assert_mutants_killed(&registry, "lib.rs", ["NO_MUTATION"], || ());
/// ```
#[track_caller]
pub fn assert_mutants_killed<S, O, I, N>(registry: &Registry, scope: impl Into<Scope>, requested: I, suite: S)
where
    S: Fn() -> O + Send + Sync + 'static,
    O: SuiteOutcome + 'static,
    I: IntoIterator<Item = N>,
    N: AsRef<str>,
{
    let result = Driver::new(registry)
        .report(suite, scope, requested)
        .and_then(MutationReport::into_result);
    if let Err(error) = result {
        panic!("{error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mutant::MutableFn;
    use crate::scope::ScopeSet;
    use pretty_assertions::assert_eq;

    static CLAMP: MutableFn<i32, i32> = MutableFn::new("clamp");

    fn clamp(x: i32) -> i32 {
        CLAMP.dispatch(x, |x| x.clamp(0, 10))
    }

    fn registry() -> Registry {
        let mut builder = Registry::builder();
        builder.declare("NO_MUTATION", "runner.rs", "").unwrap();
        builder.declare("SHARED", ScopeSet::All, "applies everywhere").unwrap();
        builder
            .declare_override(&CLAMP, "NO_CLAMP", None, "Clamp is the identity.", |x| x)
            .unwrap();
        builder.build()
    }

    fn names(verdicts: &[MutantVerdict]) -> Vec<&str> {
        verdicts.iter().map(|v| v.name.as_str()).collect()
    }

    #[test]
    fn test_weak_suite_lets_every_mutant_survive() {
        for mutant in registry().resolve("runner.rs") {
            assert!(run_under_mutant(&mutant, || ()));
            assert_eq!(context::active_mutant_name(), None);
        }
    }

    #[test]
    fn test_failing_suite_kills_every_mutant() {
        for mutant in registry().resolve("runner.rs") {
            assert!(!run_under_mutant(&mutant, || -> anyhow::Result<()> {
                anyhow::bail!("always fails")
            }));
            assert!(!run_under_mutant(&mutant, || -> anyhow::Result<()> {
                panic!("always panics")
            }));
            assert!(!context::is_active(mutant.name()));
        }
    }

    #[test]
    fn test_suite_panics_bypass_the_panic_hook() {
        let mutant = registry().resolve("runner.rs").remove(0);
        let before = SILENCED.with(Cell::get);

        let survived = run_under_mutant(&mutant, || -> anyhow::Result<()> {
            for step in 0..3 {
                let _ = catch_unwind(move || panic!("shrinking step {step}"));
            }
            panic!("final failure")
        });

        assert!(!survived);
        assert_eq!(SILENCED.with(Cell::get) - before, 4);
        assert!(!QUIET.with(Cell::get));

        // Outside a suite run the previous hook sees the panic.
        let _ = catch_unwind(|| panic!("not under a mutant"));
        assert_eq!(SILENCED.with(Cell::get) - before, 4);
    }

    #[test]
    fn test_suite_sees_the_mutant_as_active() {
        let mutant = registry().resolve("runner.rs").remove(0);
        let name = mutant.name().to_string();
        assert!(run_under_mutant(&mutant, || assert!(context::is_active(&name))));
        assert!(context::is_not_active(&name));
    }

    #[test]
    fn test_run_all_reports_verdicts_in_resolve_order() {
        let registry = registry();
        let verdicts = Driver::new(&registry)
            .run_all(
                || assert_eq!(clamp(42), 10),
                "runner.rs",
                ["SHARED", "NO_CLAMP", "NO_MUTATION"],
            )
            .unwrap();

        assert_eq!(names(&verdicts), vec!["NO_CLAMP", "NO_MUTATION", "SHARED"]);
        assert!(verdicts[0].killed());
        assert!(verdicts[1].survived());
        assert!(verdicts[2].survived());
        assert_eq!(verdicts[2].description, "applies everywhere");
    }

    #[test]
    fn test_run_all_filters_to_requested() {
        let registry = registry();
        let verdicts = Driver::new(&registry)
            .run_all(|| (), "runner.rs", ["NO_MUTATION"])
            .unwrap();
        assert_eq!(names(&verdicts), vec!["NO_MUTATION"]);
    }

    #[test]
    fn test_unknown_mutant_is_a_config_error() {
        let registry = registry();
        let err = Driver::new(&registry)
            .run_all(|| (), "other.rs", ["NO_MUTATION"])
            .unwrap_err();
        match err {
            MutationError::UnknownMutant { name, available, .. } => {
                assert_eq!(name, "NO_MUTATION");
                assert_eq!(available, vec!["SHARED".to_string()]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_run_scopes_runs_shared_mutants_once() {
        let mut builder = Registry::builder();
        builder.declare("SHARED", ScopeSet::All, "").unwrap();
        builder.declare("LOCAL", "a.rs", "").unwrap();
        builder.declare("OTHER", "b.rs", "").unwrap();
        let registry = builder.build();
        let scopes = ScopeSet::from(vec!["a.rs".to_string(), "b.rs".to_string()]);

        let driver = Driver::new(&registry);
        let verdicts = driver.run_scopes(|| (), &scopes, &[]).unwrap();
        assert_eq!(names(&verdicts), vec!["LOCAL", "SHARED", "OTHER"]);

        let verdicts = driver
            .run_scopes(|| (), &scopes, &["SHARED".to_string()])
            .unwrap();
        assert_eq!(names(&verdicts), vec!["SHARED"]);
    }

    #[test]
    fn test_parallel_runs_keep_order_and_isolation() {
        let mut builder = Registry::builder();
        for name in ["A", "B", "C", "D", "E"] {
            builder.declare(name, "par.rs", "").unwrap();
        }
        let registry = builder.build();

        let verdicts = Driver::new(&registry)
            .with_settings(RunSettings {
                timeout: None,
                jobs: 3,
            })
            .run_scope(
                || {
                    // Exactly one mutant is visible on each worker.
                    let visible = ["A", "B", "C", "D", "E"]
                        .iter()
                        .filter(|name| context::is_active(name))
                        .count();
                    assert_eq!(visible, 1);
                    assert!(context::is_active("C"));
                },
                "par.rs",
            )
            .unwrap();

        assert_eq!(names(&verdicts), vec!["A", "B", "C", "D", "E"]);
        let survivors: Vec<_> = verdicts.iter().filter(|v| v.survived()).collect();
        assert_eq!(survivors.len(), 1);
        assert_eq!(survivors[0].name, "C");
    }

    #[test]
    fn test_timeout_is_reported_separately() {
        let mut builder = Registry::builder();
        builder.declare("HANG", "slow.rs", "").unwrap();
        builder.declare("FAST", "slow.rs", "").unwrap();
        let registry = builder.build();

        let verdicts = Driver::new(&registry)
            .with_settings(RunSettings {
                timeout: Some(Duration::from_millis(100)),
                jobs: 1,
            })
            .run_scope(
                || -> anyhow::Result<()> {
                    if context::is_active("HANG") {
                        thread::sleep(Duration::from_secs(5));
                    }
                    panic!("detected");
                },
                "slow.rs",
            )
            .unwrap();

        assert_eq!(verdicts[0].name, "FAST");
        assert!(verdicts[0].killed());
        assert_eq!(verdicts[1].status, MutantStatus::TimedOut);
        assert!(matches!(
            verdicts[1].failure(Some(Duration::from_millis(100))),
            Some(MutationError::TimedOut { .. })
        ));
    }

    #[test]
    #[should_panic(expected = "Test suite passed!\nNO_MUTATION: ")]
    fn test_assert_mutants_killed_panics_on_survivor() {
        assert_mutants_killed(&registry(), "runner.rs", ["NO_MUTATION"], || ());
    }

    #[test]
    fn test_assert_mutants_killed_accepts_killed() {
        assert_mutants_killed(&registry(), "runner.rs", ["NO_CLAMP"], || {
            assert_eq!(clamp(-3), 0)
        });
    }
}
