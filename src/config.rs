//! Run plan parsing for mutation testing

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::error::MutationError;
use crate::registry::Registry;
use crate::runner::RunSettings;
use crate::scope::ScopeSet;

const SUPPORTED_VERSION: &str = "1.0";

/// Top-level run plan
#[derive(Debug, Deserialize)]
pub struct Config {
    pub version: String,
    #[serde(default)]
    pub settings: Settings,
    pub runs: Vec<RunConfig>,
}

/// Global settings for mutant runs
#[derive(Debug, Deserialize)]
pub struct Settings {
    /// Timeout in seconds for each suite run; no limit when omitted
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Number of worker threads
    #[serde(default = "default_jobs")]
    pub jobs: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            timeout: None,
            jobs: default_jobs(),
        }
    }
}

fn default_jobs() -> usize {
    1
}

impl Settings {
    pub fn run_settings(&self) -> RunSettings {
        RunSettings {
            timeout: self.timeout.map(Duration::from_secs),
            jobs: self.jobs,
        }
    }
}

/// One batch of mutants to run against a scope
#[derive(Debug, Deserialize, Clone)]
pub struct RunConfig {
    /// Scope name, `"**all**"`, or a list of scope names
    pub scope: ScopeSet,
    /// Mutants to run; every mutant of the scope when empty
    #[serde(default)]
    pub mutants: Vec<String>,
}

impl RunConfig {
    /// Create a description for this run
    pub fn description(&self) -> String {
        if self.mutants.is_empty() {
            format!("all mutants in {}", self.scope)
        } else {
            format!("{} in {}", self.mutants.join(", "), self.scope)
        }
    }
}

impl Config {
    /// Load a run plan from a YAML file
    pub fn load(path: &Path) -> Result<Self, MutationError> {
        let content = std::fs::read_to_string(path).map_err(|e| MutationError::ConfigError {
            message: format!("Failed to read config file '{}': {}", path.display(), e),
        })?;

        Self::parse(&content).map_err(|e| MutationError::ConfigError {
            message: format!("Failed to parse config file '{}': {}", path.display(), e),
        })
    }

    pub fn parse(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Validate the plan against the mutants declared in `registry`
    pub fn validate(&self, registry: &Registry) -> Result<(), Vec<MutationError>> {
        let mut errors = Vec::new();

        if self.version != SUPPORTED_VERSION {
            errors.push(MutationError::config(format!(
                "Unsupported config version '{}' (expected '{}')",
                self.version, SUPPORTED_VERSION
            )));
        }
        if self.settings.jobs == 0 {
            errors.push(MutationError::config("jobs must be at least 1"));
        }
        if self.settings.timeout == Some(0) {
            errors.push(MutationError::config("timeout must be at least 1 second"));
        }

        for run in &self.runs {
            let scopes = match run.scope.expand() {
                Ok(scopes) => scopes,
                Err(e) => {
                    errors.push(e);
                    continue;
                }
            };

            for scope in scopes {
                let available = registry.mutant_names(scope.clone());
                for name in &run.mutants {
                    if !available.contains(name) {
                        errors.push(MutationError::UnknownMutant {
                            name: name.clone(),
                            scope: scope.to_string(),
                            available: available.clone(),
                        });
                    }
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
