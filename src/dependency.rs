// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Resolving a project's locked dependency set.

Version resolution belongs to the host build tool. Its lock export is the
single source of truth here; this module only validates, classifies, and
orders what the export yields.
*/

use {
    crate::error::{NarError, Result},
    std::{ffi::OsStr, path::PathBuf},
};

/// How a dependency participates in a NAR bundle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DependencyKind {
    /// A package artifact embedded directly inside the archive.
    Bundled,

    /// Another NAR bundle, referenced by identity in the manifest.
    Nar,
}

/// A pinned dependency as reported by the host's lock export.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LockedDependency {
    /// Package name.
    pub name: String,

    /// Resolved version.
    pub version: String,

    /// Path to the resolved artifact.
    pub artifact: PathBuf,

    /// Whether the dependency's own project declares itself NAR-producing.
    pub is_nar_project: bool,
}

/// A classified dependency participating in one build invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DependencyRecord {
    pub name: String,
    pub version: String,
    pub kind: DependencyKind,
    pub artifact: PathBuf,
}

/// Host capability yielding the fully pinned, transitively resolved
/// dependency list for the project being built.
pub trait LockExport {
    fn export(&self) -> Result<Vec<LockedDependency>>;
}

/// Predicate deciding whether a locked dependency is itself a NAR.
pub type NarPredicate = fn(&LockedDependency) -> bool;

/// Default NAR detection rule.
///
/// A dependency is NAR-kind when its lock entry marks it as a NAR-producing
/// project or its resolved artifact carries a `.nar` extension.
pub fn is_nar_dependency(dependency: &LockedDependency) -> bool {
    dependency.is_nar_project || dependency.artifact.extension() == Some(OsStr::new("nar"))
}

/// Obtain the classified dependency records for one build invocation.
///
/// Records are sorted by name for deterministic manifest and archive
/// output. Lock entries missing a name or version abort the build, as do
/// entries sharing a name.
pub fn resolve_dependencies(
    export: &dyn LockExport,
    is_nar: NarPredicate,
) -> Result<Vec<DependencyRecord>> {
    let mut locked = export.export()?;

    locked.sort_by(|a, b| a.name.cmp(&b.name));

    let mut records: Vec<DependencyRecord> = Vec::with_capacity(locked.len());

    for dependency in locked {
        if dependency.name.is_empty() || dependency.version.is_empty() {
            let what = if dependency.name.is_empty() {
                dependency.artifact.display().to_string()
            } else {
                dependency.name
            };

            return Err(NarError::DependencyUnresolved(what));
        }

        if records.iter().any(|record| record.name == dependency.name) {
            return Err(NarError::DependencyDuplicate(dependency.name));
        }

        let kind = if is_nar(&dependency) {
            DependencyKind::Nar
        } else {
            DependencyKind::Bundled
        };

        records.push(DependencyRecord {
            name: dependency.name,
            version: dependency.version,
            kind,
            artifact: dependency.artifact,
        });
    }

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;

    pub struct StaticLockExport(pub Vec<LockedDependency>);

    impl LockExport for StaticLockExport {
        fn export(&self) -> Result<Vec<LockedDependency>> {
            Ok(self.0.clone())
        }
    }

    fn locked(name: &str, version: &str, artifact: &str) -> LockedDependency {
        LockedDependency {
            name: name.to_string(),
            version: version.to_string(),
            artifact: PathBuf::from(artifact),
            is_nar_project: false,
        }
    }

    #[test]
    fn sorted_by_name() -> Result<()> {
        let export = StaticLockExport(vec![
            locked("requests", "2.31.0", "requests-2.31.0-py3-none-any.whl"),
            locked("attrs", "23.1.0", "attrs-23.1.0-py3-none-any.whl"),
        ]);

        let records = resolve_dependencies(&export, is_nar_dependency)?;

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].name, "attrs");
        assert_eq!(records[1].name, "requests");

        Ok(())
    }

    #[test]
    fn classification() -> Result<()> {
        let mut base = locked("nifi-base", "1.0.0", "nifi-base-1.0.0.nar");
        base.is_nar_project = false;

        let mut marked = locked("nifi-common", "1.0.0", "nifi-common-1.0.0-py3-none-any.whl");
        marked.is_nar_project = true;

        let export = StaticLockExport(vec![
            base,
            marked,
            locked("requests", "2.31.0", "requests-2.31.0-py3-none-any.whl"),
        ]);

        let records = resolve_dependencies(&export, is_nar_dependency)?;

        assert_eq!(records[0].kind, DependencyKind::Nar);
        assert_eq!(records[1].kind, DependencyKind::Nar);
        assert_eq!(records[2].kind, DependencyKind::Bundled);

        Ok(())
    }

    #[test]
    fn custom_predicate() -> Result<()> {
        let export = StaticLockExport(vec![locked(
            "requests",
            "2.31.0",
            "requests-2.31.0-py3-none-any.whl",
        )]);

        let records = resolve_dependencies(&export, |_| true)?;
        assert_eq!(records[0].kind, DependencyKind::Nar);

        Ok(())
    }

    #[test]
    fn unresolved_version() {
        let export = StaticLockExport(vec![locked("requests", "", "requests.whl")]);

        assert!(matches!(
            resolve_dependencies(&export, is_nar_dependency),
            Err(NarError::DependencyUnresolved(name)) if name == "requests"
        ));
    }

    #[test]
    fn duplicate_name() {
        let export = StaticLockExport(vec![
            locked("requests", "2.31.0", "requests-2.31.0-py3-none-any.whl"),
            locked("requests", "2.30.0", "requests-2.30.0-py3-none-any.whl"),
        ]);

        assert!(matches!(
            resolve_dependencies(&export, is_nar_dependency),
            Err(NarError::DependencyDuplicate(name)) if name == "requests"
        ));
    }
}
