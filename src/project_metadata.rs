// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Working with host project metadata.

The host build tool owns the project model. This module defines the
slice of that model a NAR build consumes and the validated identity
snapshot derived from it.
*/

use {
    crate::{
        error::{NarError, Result},
        substitution::SubstitutionTarget,
    },
    once_cell::sync::Lazy,
    std::path::{Path, PathBuf},
};

/// Project version validation regular expression.
///
/// Accepts dotted numeric versions with an optional PEP 440 style
/// (`1.2a1`, `1.2.post3`) or semver style (`1.2.3-alpha.1+build`) suffix.
static RE_VERSION: Lazy<regex::Regex> = Lazy::new(|| {
    regex::Regex::new(r"^[0-9]+(\.[0-9]+)*((a|b|rc|\.post|\.dev)[0-9]+)?(-[0-9A-Za-z.]+)?(\+[0-9A-Za-z.]+)?$")
        .unwrap()
});

/// Bundle group validation regular expression. Dotted namespace form.
static RE_GROUP: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^[A-Za-z0-9_-]+(\.[A-Za-z0-9_-]+)*$").unwrap());

/// A source package declared by the project.
#[derive(Clone, Debug, Default)]
pub struct PackageSpec {
    /// Directory name of the package, relative to its source root.
    pub include: String,

    /// Directory the package lives under, relative to the project root.
    ///
    /// `Some("src")` describes the common `src/` layout. The source root is
    /// stripped from paths inside the archive.
    pub source: Option<PathBuf>,

    /// Build formats the package is declared for.
    pub formats: Vec<String>,
}

/// An explicitly included file pattern declared by the project.
#[derive(Clone, Debug, Default)]
pub struct IncludeSpec {
    /// Glob pattern relative to the project root.
    pub pattern: String,

    /// Build formats the include is declared for.
    pub formats: Vec<String>,
}

/// Description of a host project, as supplied by the build tool driving a build.
///
/// Instances are a snapshot of the host's own project model. Nothing here is
/// read back from disk besides the file trees the fields point into.
#[derive(Clone, Debug, Default)]
pub struct Project {
    /// Project root directory.
    pub root: PathBuf,

    /// Project name. Becomes the bundle id.
    pub name: String,

    /// Dotted bundle group. Defaults to the project name when absent.
    pub group: Option<String>,

    /// Project version string.
    pub version: String,

    /// Project description.
    pub description: String,

    /// Project authors, in declaration order.
    pub authors: Vec<String>,

    /// Source packages to embed.
    pub packages: Vec<PackageSpec>,

    /// Extra file patterns to embed.
    pub includes: Vec<IncludeSpec>,

    /// Readme files, relative to the project root.
    pub readme: Vec<PathBuf>,

    /// File whose `__version__` placeholder is rewritten, relative to the
    /// project root.
    pub version_target: Option<PathBuf>,

    /// File whose `__description__` placeholder is rewritten, relative to
    /// the project root.
    pub description_target: Option<PathBuf>,
}

impl Project {
    /// Resolve the placeholder substitution target, if one is configured.
    ///
    /// A single file services both substitutions. Configuring different
    /// files for version and description is an error.
    pub fn substitution_target(&self) -> Result<Option<SubstitutionTarget>> {
        let path = match (&self.version_target, &self.description_target) {
            (Some(version), Some(description)) if version != description => {
                return Err(NarError::ConfigSubstitutionTargetMismatch(
                    version.display().to_string(),
                    description.display().to_string(),
                ));
            }
            (Some(version), _) => version.clone(),
            (None, Some(description)) => description.clone(),
            (None, None) => return Ok(None),
        };

        Ok(Some(SubstitutionTarget {
            path,
            version: self.version.clone(),
            description: self.description.clone(),
        }))
    }

    /// Map a project-root-relative file path to its path inside the archive.
    ///
    /// Files under a package's source root lose that prefix; everything else
    /// is archived at its project-relative path.
    pub fn archive_path(&self, path: &Path) -> PathBuf {
        for package in &self.packages {
            if let Some(source) = &package.source {
                if let Ok(stripped) = path.strip_prefix(source) {
                    if stripped.starts_with(&package.include) {
                        return stripped.to_path_buf();
                    }
                }
            }
        }

        path.to_path_buf()
    }
}

/// Validated identity metadata for a NAR bundle.
///
/// Immutable snapshot taken once per build invocation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleMetadata {
    /// Dotted bundle group.
    pub group: String,

    /// Bundle id.
    pub id: String,

    /// Bundle version.
    pub version: String,

    /// Bundle description.
    pub description: String,

    /// Bundle authors.
    pub authors: Vec<String>,
}

impl BundleMetadata {
    /// Derive validated bundle metadata from a host project.
    pub fn from_project(project: &Project) -> Result<Self> {
        if project.name.is_empty() {
            return Err(NarError::MetadataMissingId);
        }

        if project.version.is_empty() {
            return Err(NarError::MetadataMissingVersion);
        }

        if !RE_VERSION.is_match(&project.version) {
            return Err(NarError::MetadataInvalidVersion(project.version.clone()));
        }

        let group = project
            .group
            .clone()
            .unwrap_or_else(|| project.name.clone());

        if !RE_GROUP.is_match(&group) {
            return Err(NarError::MetadataInvalidGroup(group));
        }

        Ok(Self {
            group,
            id: project.name.clone(),
            version: project.version.clone(),
            description: project.description.clone(),
            authors: project.authors.clone(),
        })
    }

    /// Obtain the normalized distribution name used in output file names.
    pub fn normalized_name(&self) -> String {
        self.id.to_lowercase().replace('-', "_")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project() -> Project {
        Project {
            name: "demo".to_string(),
            version: "0.1.0".to_string(),
            description: "Demo processors".to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn metadata_from_project() -> Result<()> {
        let metadata = BundleMetadata::from_project(&project())?;

        assert_eq!(metadata.id, "demo");
        assert_eq!(metadata.group, "demo");
        assert_eq!(metadata.version, "0.1.0");

        Ok(())
    }

    #[test]
    fn metadata_explicit_group() -> Result<()> {
        let mut p = project();
        p.group = Some("org.apache.nifi".to_string());

        let metadata = BundleMetadata::from_project(&p)?;
        assert_eq!(metadata.group, "org.apache.nifi");

        Ok(())
    }

    #[test]
    fn metadata_missing_name() {
        let mut p = project();
        p.name.clear();

        assert!(matches!(
            BundleMetadata::from_project(&p),
            Err(NarError::MetadataMissingId)
        ));
    }

    #[test]
    fn metadata_missing_version() {
        let mut p = project();
        p.version.clear();

        assert!(matches!(
            BundleMetadata::from_project(&p),
            Err(NarError::MetadataMissingVersion)
        ));
    }

    #[test]
    fn metadata_invalid_version() {
        let mut p = project();
        p.version = "not a version".to_string();

        assert!(matches!(
            BundleMetadata::from_project(&p),
            Err(NarError::MetadataInvalidVersion(_))
        ));
    }

    #[test]
    fn metadata_version_forms() -> Result<()> {
        for version in ["1", "1.2", "1.2.3", "19.10b0", "1.2.post3", "1.0.0-alpha.1", "2.0.0+build.5"] {
            let mut p = project();
            p.version = version.to_string();
            BundleMetadata::from_project(&p)?;
        }

        Ok(())
    }

    #[test]
    fn metadata_invalid_group() {
        let mut p = project();
        p.group = Some("not a group".to_string());

        assert!(matches!(
            BundleMetadata::from_project(&p),
            Err(NarError::MetadataInvalidGroup(_))
        ));
    }

    #[test]
    fn normalized_name() -> Result<()> {
        let mut p = project();
        p.name = "My-Processors".to_string();

        let metadata = BundleMetadata::from_project(&p)?;
        assert_eq!(metadata.normalized_name(), "my_processors");

        Ok(())
    }

    #[test]
    fn substitution_target_absent() -> Result<()> {
        assert!(project().substitution_target()?.is_none());

        Ok(())
    }

    #[test]
    fn substitution_target_single_file() -> Result<()> {
        let mut p = project();
        p.version_target = Some(PathBuf::from("demo/processor.py"));

        let target = p.substitution_target()?.unwrap();
        assert_eq!(target.path, PathBuf::from("demo/processor.py"));
        assert_eq!(target.version, "0.1.0");
        assert_eq!(target.description, "Demo processors");

        Ok(())
    }

    #[test]
    fn substitution_target_same_file_twice() -> Result<()> {
        let mut p = project();
        p.version_target = Some(PathBuf::from("demo/processor.py"));
        p.description_target = Some(PathBuf::from("demo/processor.py"));

        assert!(p.substitution_target()?.is_some());

        Ok(())
    }

    #[test]
    fn substitution_target_mismatch() {
        let mut p = project();
        p.version_target = Some(PathBuf::from("demo/a.py"));
        p.description_target = Some(PathBuf::from("demo/b.py"));

        assert!(matches!(
            p.substitution_target(),
            Err(NarError::ConfigSubstitutionTargetMismatch(_, _))
        ));
    }

    #[test]
    fn archive_path_src_layout() {
        let mut p = project();
        p.packages = vec![PackageSpec {
            include: "demo".to_string(),
            source: Some(PathBuf::from("src")),
            ..Default::default()
        }];

        assert_eq!(
            p.archive_path(Path::new("src/demo/processor.py")),
            PathBuf::from("demo/processor.py")
        );
        assert_eq!(
            p.archive_path(Path::new("data/schema.json")),
            PathBuf::from("data/schema.json")
        );
    }
}
