//! Scopes under which mutants are declared
//!
//! A scope is a source-file basename (`"sort.rs"`) or the universal scope,
//! whose mutants are candidates everywhere.

use std::fmt;
use std::panic::Location;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MutationError, Result};

/// Name of the universal scope
pub const APPLY_TO_ALL: &str = "**all**";

/// A single scope identifier
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Scope {
    /// Applies to every scope
    All,
    /// A source file, identified by its basename
    File(String),
}

impl Scope {
    /// Parse a scope name; `"**all**"` is the universal scope
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        if name == APPLY_TO_ALL {
            Scope::All
        } else {
            Scope::File(name)
        }
    }

    /// The basename of the source file of the caller
    #[track_caller]
    pub fn caller() -> Self {
        Scope::of_location(Location::caller())
    }

    pub(crate) fn of_location(location: &Location<'_>) -> Self {
        let file = location.file();
        let basename = Path::new(file)
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.to_string());
        Scope::File(basename)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Scope::All => APPLY_TO_ALL,
            Scope::File(name) => name,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<String> for Scope {
    fn from(name: String) -> Self {
        Scope::named(name)
    }
}

impl From<&str> for Scope {
    fn from(name: &str) -> Self {
        Scope::named(name)
    }
}

impl From<Scope> for String {
    fn from(scope: Scope) -> Self {
        scope.as_str().to_string()
    }
}

/// The scope argument of a declaration or run request
///
/// Either the universal scope, one scope name, or a list of scope names.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(try_from = "serde_yaml::Value")]
pub enum ScopeSet {
    All,
    One(String),
    Many(Vec<String>),
}

impl ScopeSet {
    /// Expand into concrete scopes, validating the shape
    pub fn expand(&self) -> Result<Vec<Scope>> {
        let names: Vec<&str> = match self {
            ScopeSet::All => return Ok(vec![Scope::All]),
            ScopeSet::One(name) => vec![name.as_str()],
            ScopeSet::Many(names) if names.is_empty() => {
                return Err(MutationError::config("scope list must not be empty"));
            }
            ScopeSet::Many(names) => names.iter().map(String::as_str).collect(),
        };

        let mut scopes = Vec::with_capacity(names.len());
        for name in names {
            if name.trim().is_empty() {
                return Err(MutationError::config("scope names must not be blank"));
            }
            let scope = Scope::named(name);
            if !scopes.contains(&scope) {
                scopes.push(scope);
            }
        }
        Ok(scopes)
    }
}

impl fmt::Display for ScopeSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeSet::All => f.write_str(APPLY_TO_ALL),
            ScopeSet::One(name) => f.write_str(name),
            ScopeSet::Many(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

impl From<Scope> for ScopeSet {
    fn from(scope: Scope) -> Self {
        match scope {
            Scope::All => ScopeSet::All,
            Scope::File(name) => ScopeSet::One(name),
        }
    }
}

impl From<&str> for ScopeSet {
    fn from(name: &str) -> Self {
        ScopeSet::One(name.to_string())
    }
}

impl From<String> for ScopeSet {
    fn from(name: String) -> Self {
        ScopeSet::One(name)
    }
}

impl From<Vec<String>> for ScopeSet {
    fn from(names: Vec<String>) -> Self {
        ScopeSet::Many(names)
    }
}

impl From<&[&str]> for ScopeSet {
    fn from(names: &[&str]) -> Self {
        ScopeSet::Many(names.iter().map(|name| name.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for ScopeSet {
    fn from(names: [&str; N]) -> Self {
        ScopeSet::Many(names.iter().map(|name| name.to_string()).collect())
    }
}

impl TryFrom<serde_yaml::Value> for ScopeSet {
    type Error = MutationError;

    fn try_from(value: serde_yaml::Value) -> Result<Self> {
        use serde_yaml::Value;

        match value {
            Value::String(name) => Ok(ScopeSet::One(name)),
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(name) => Ok(name),
                    _ => Err(unsupported_shape()),
                })
                .collect::<Result<Vec<_>>>()
                .map(ScopeSet::Many),
            _ => Err(unsupported_shape()),
        }
    }
}

fn unsupported_shape() -> MutationError {
    MutationError::config("scope must be a string or a list of strings")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_caller_scope_is_file_basename() {
        assert_eq!(Scope::caller(), Scope::File("scope.rs".to_string()));
    }

    #[test]
    fn test_all_marker_parses_to_universal_scope() {
        assert_eq!(Scope::named(APPLY_TO_ALL), Scope::All);
        assert_eq!(
            ScopeSet::from(APPLY_TO_ALL).expand().unwrap(),
            vec![Scope::All]
        );
    }

    #[test]
    fn test_expand_many_dedups() {
        let set = ScopeSet::from(["a.rs", "b.rs", "a.rs"]);
        assert_eq!(
            set.expand().unwrap(),
            vec![
                Scope::File("a.rs".to_string()),
                Scope::File("b.rs".to_string())
            ]
        );
    }

    #[test]
    fn test_empty_and_blank_scopes_rejected() {
        assert!(matches!(
            ScopeSet::Many(Vec::new()).expand(),
            Err(MutationError::ConfigError { .. })
        ));
        assert!(matches!(
            ScopeSet::from("  ").expand(),
            Err(MutationError::ConfigError { .. })
        ));
    }

    #[test]
    fn test_yaml_shapes() {
        let one: ScopeSet = serde_yaml::from_str("sort.rs").unwrap();
        assert_eq!(one, ScopeSet::One("sort.rs".to_string()));

        let many: ScopeSet = serde_yaml::from_str("[a.rs, b.rs]").unwrap();
        assert_eq!(
            many,
            ScopeSet::Many(vec!["a.rs".to_string(), "b.rs".to_string()])
        );

        let err = serde_yaml::from_str::<ScopeSet>("{file: a.rs}").unwrap_err();
        assert!(err
            .to_string()
            .contains("scope must be a string or a list of strings"));
    }
}
