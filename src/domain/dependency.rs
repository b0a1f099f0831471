//! Dependency check outcomes.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// An external the service needs before it can start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dependency {
    Datastore,
    Filesystem,
    Port,
    Configuration,
}

impl Dependency {
    pub const ALL: [Dependency; 4] = [
        Dependency::Datastore,
        Dependency::Filesystem,
        Dependency::Port,
        Dependency::Configuration,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Datastore => "datastore",
            Self::Filesystem => "filesystem",
            Self::Port => "port",
            Self::Configuration => "configuration",
        }
    }
}

impl fmt::Display for Dependency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of probing one dependency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyCheck {
    pub ok: bool,
    /// Diagnostic for failures, or a note on a degraded pass.
    pub detail: Option<String>,
}

/// Result of one full dependency check.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyStatus {
    checks: BTreeMap<Dependency, DependencyCheck>,
    /// Port actually secured by the port check, if any.
    secured_port: Option<u16>,
}

impl DependencyStatus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pass(&mut self, dependency: Dependency) {
        self.checks.insert(
            dependency,
            DependencyCheck {
                ok: true,
                detail: None,
            },
        );
    }

    pub fn pass_with_note(&mut self, dependency: Dependency, note: impl Into<String>) {
        self.checks.insert(
            dependency,
            DependencyCheck {
                ok: true,
                detail: Some(note.into()),
            },
        );
    }

    pub fn fail(&mut self, dependency: Dependency, diagnostic: impl Into<String>) {
        self.checks.insert(
            dependency,
            DependencyCheck {
                ok: false,
                detail: Some(diagnostic.into()),
            },
        );
    }

    pub fn set_secured_port(&mut self, port: u16) {
        self.secured_port = Some(port);
    }

    #[must_use]
    pub fn secured_port(&self) -> Option<u16> {
        self.secured_port
    }

    #[must_use]
    pub fn get(&self, dependency: Dependency) -> Option<&DependencyCheck> {
        self.checks.get(&dependency)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Dependency, &DependencyCheck)> {
        self.checks.iter().map(|(dep, check)| (*dep, check))
    }

    /// Composite success: every dependency was checked and passed.
    #[must_use]
    pub fn all_ok(&self) -> bool {
        Dependency::ALL
            .iter()
            .all(|dep| self.checks.get(dep).is_some_and(|check| check.ok))
    }

    /// `name: diagnostic` for each failed or unchecked dependency.
    #[must_use]
    pub fn failures(&self) -> Vec<String> {
        Dependency::ALL
            .iter()
            .filter_map(|dep| match self.checks.get(dep) {
                Some(check) if check.ok => None,
                Some(check) => Some(format!(
                    "{dep}: {}",
                    check.detail.as_deref().unwrap_or("failed")
                )),
                None => Some(format!("{dep}: not checked")),
            })
            .collect()
    }
}
