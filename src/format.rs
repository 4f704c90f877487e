// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Integrating NAR building with a host build tool.

The host build command owns format selection and project loading. The
types here are the only ones aware of that boundary: a registry the host
queries per requested format, and the builder wiring the full NAR
pipeline together.
*/

use {
    crate::{
        dependency::{
            is_nar_dependency, resolve_dependencies, DependencyKind, LockExport, NarPredicate,
        },
        error::{NarError, Result},
        filesystem_scanning::{find_metadata_files, find_project_files},
        manifest::nar_dependency,
        nar_builder::NarBuilder,
        project_metadata::{BundleMetadata, Project},
        substitution::SubstitutionTarget,
    },
    simple_file_manifest::FileEntry,
    std::path::{Path, PathBuf},
};

/// The output format name this crate registers with the host build command.
pub const NAR_FORMAT: &str = "nar";

/// Capability interface the host build command queries per requested format.
pub trait FormatBuilder {
    /// Whether this builder produces the named output format.
    fn supports_format(&self, format: &str) -> bool;

    /// Build the named format for a project, returning the output file path.
    ///
    /// Callers are expected to consult [Self::supports_format] first.
    fn build_format(&self, project: &Project, format: &str, target_dir: &Path)
        -> Result<PathBuf>;
}

/// Builds the `nar` output format.
pub struct NarFormatBuilder {
    /// Host capability yielding the locked dependency set.
    lock_export: Box<dyn LockExport>,

    /// NAR detection rule applied to locked dependencies.
    nar_predicate: NarPredicate,

    /// Fixed build time for reproducible output. Defaults to build start.
    build_time: Option<time::OffsetDateTime>,
}

impl NarFormatBuilder {
    /// Create an instance around the host's lock export capability.
    pub fn new(lock_export: Box<dyn LockExport>) -> Self {
        Self {
            lock_export,
            nar_predicate: is_nar_dependency,
            build_time: None,
        }
    }

    /// Set the NAR detection rule applied to locked dependencies.
    pub fn set_nar_predicate(&mut self, v: NarPredicate) {
        self.nar_predicate = v;
    }

    /// Set a fixed build time, making repeated builds byte-identical.
    pub fn set_build_time(&mut self, v: time::OffsetDateTime) {
        self.build_time = Some(v);
    }

    fn apply_substitution(
        &self,
        builder: &mut NarBuilder,
        project: &Project,
        target: &SubstitutionTarget,
    ) -> Result<()> {
        let archive_path = project.archive_path(&target.path);

        let executable = builder
            .file_entry(&archive_path)
            .map(|entry| entry.is_executable());

        match executable {
            Some(executable) => {
                let data = target.rewrite(&project.root)?;
                builder.add_file(&archive_path, FileEntry::new_from_data(data, executable))?;
            }
            None if project.root.join(&target.path).is_file() => {
                log::warn!(
                    "substitution target {} is not part of the bundle",
                    target.path.display()
                );
            }
            None => {
                return Err(NarError::SubstitutionTargetMissing(
                    project.root.join(&target.path).display().to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl FormatBuilder for NarFormatBuilder {
    fn supports_format(&self, format: &str) -> bool {
        format == NAR_FORMAT
    }

    fn build_format(
        &self,
        project: &Project,
        _format: &str,
        target_dir: &Path,
    ) -> Result<PathBuf> {
        let metadata = BundleMetadata::from_project(project)?;
        let dependencies = resolve_dependencies(self.lock_export.as_ref(), self.nar_predicate)?;

        let mut builder = NarBuilder::new(metadata);

        if let Some(build_time) = self.build_time {
            builder.set_build_time(build_time);
        }

        builder.set_nar_dependency(nar_dependency(&dependencies)?);

        log::info!("building {}", builder.nar_file_name());

        builder.add_files(find_project_files(project)?.into_iter())?;
        builder.add_files(find_metadata_files(project)?.into_iter())?;

        for record in dependencies
            .iter()
            .filter(|record| record.kind == DependencyKind::Bundled)
        {
            builder.add_bundled_dependency(record)?;
        }

        if let Some(target) = project.substitution_target()? {
            self.apply_substitution(&mut builder, project, &target)?;
        }

        let path = builder.write_nar_into_directory(target_dir)?;

        log::info!("built {}", path.display());

        Ok(path)
    }
}

/// Registry of format builders the host consults when dispatching a build.
#[derive(Default)]
pub struct FormatRegistry {
    builders: Vec<Box<dyn FormatBuilder>>,
}

impl FormatRegistry {
    /// Register a format builder.
    pub fn register(&mut self, builder: Box<dyn FormatBuilder>) {
        self.builders.push(builder);
    }

    /// Whether any registered builder produces the named format.
    pub fn supports_format(&self, format: &str) -> bool {
        self.builders
            .iter()
            .any(|builder| builder.supports_format(format))
    }

    /// Build the named format for a project.
    ///
    /// Returns `Ok(None)` when no registered builder produces the format,
    /// so the host can fall back to its native builders.
    pub fn build_format(
        &self,
        project: &Project,
        format: &str,
        target_dir: &Path,
    ) -> Result<Option<PathBuf>> {
        for builder in &self.builders {
            if builder.supports_format(format) {
                return Ok(Some(builder.build_format(project, format, target_dir)?));
            }
        }

        Ok(None)
    }
}
