// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Functionality for creating NAR bundles. */

use {
    crate::{
        dependency::DependencyRecord,
        error::{NarError, Result},
        manifest::{NarDependency, NarManifest, MANIFEST_PATH},
        project_metadata::BundleMetadata,
    },
    once_cell::sync::Lazy,
    simple_file_manifest::{FileEntry, FileManifest},
    std::{
        cmp::Ordering,
        io::{Seek, Write},
        path::{Path, PathBuf},
    },
};

/// NAR filename component escape regular expression.
static RE_FILENAME_ESCAPE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"[^\w\d.]+").unwrap());

/// Directory inside the archive holding bundled dependency artifacts.
pub const BUNDLED_DEPENDENCIES_PATH: &str = "NAR-INF/bundled-dependencies";

/// Default `Created-By` value for generated manifests.
pub const DEFAULT_GENERATOR: &str = "nifi-packaging";

fn escape_component(v: &str) -> String {
    RE_FILENAME_ESCAPE.replace_all(v, "_").to_string()
}

/// Sort rank of an archive entry. Manifest first, bundled dependencies
/// next, everything else last.
fn entry_rank(path: &Path) -> u8 {
    if path == Path::new(MANIFEST_PATH) {
        0
    } else if path.starts_with(BUNDLED_DEPENDENCIES_PATH) {
        1
    } else {
        2
    }
}

/// Define and build a NAR bundle from raw components.
///
/// NAR bundles are glorified zip files with a prescribed layout the NiFi
/// runtime understands:
///
/// ```text
/// META-INF/MANIFEST.MF
/// NAR-INF/bundled-dependencies/<name>-<version>.whl
/// <project source tree and data files>
/// ```
///
/// # META-INF/MANIFEST.MF
///
/// Archives must carry a manifest describing the bundle identity and its
/// parent NAR, if any. By default a minimal manifest is derived from the
/// metadata passed to [Self::new] and the configured build time. If you
/// want to provide your own manifest, define its content by adding a file
/// at `META-INF/MANIFEST.MF` through [Self::add_file].
///
/// # Adding Files
///
/// Bundled dependency artifacts are registered through
/// [Self::add_bundled_dependency] and land under
/// `NAR-INF/bundled-dependencies/`. Everything else is added through
/// [Self::add_file] and archived at its given path.
///
/// # Building Bundles
///
/// Call [Self::write_nar_into_directory] to materialize a `.nar` file with
/// the proper file name, or [Self::write_nar_data] to just materialize the
/// zip content. [Self::nar_file_name] reports the file name for current
/// settings.
///
/// Archive content is deterministic for identical input settings/files:
/// entries are written in a fixed sort order and stamped with the build
/// time, which also feeds the manifest's `Build-Timestamp`. The build time
/// defaults to the time the instance was created, which is obviously not
/// deterministic; call [Self::set_build_time] for reproducible output.
///
/// # Validation
///
/// This type performs little validation of input data beyond manifest key
/// completeness. It is up to the caller to supply content constituting a
/// well-formed bundle.
pub struct NarBuilder {
    /// Identity of the bundle being built.
    metadata: BundleMetadata,

    /// Name of the tool that generated this bundle.
    generator: String,

    /// The single parent NAR referenced in the manifest.
    nar_dependency: Option<NarDependency>,

    /// Files constituting the bundle.
    manifest: FileManifest,

    /// The build time written to the manifest and all archive entries.
    build_time: time::OffsetDateTime,
}

impl NarBuilder {
    /// Create a new instance for a bundle identity.
    pub fn new(metadata: BundleMetadata) -> Self {
        Self {
            metadata,
            generator: DEFAULT_GENERATOR.to_string(),
            nar_dependency: None,
            manifest: FileManifest::default(),
            build_time: time::OffsetDateTime::now_utc(),
        }
    }

    /// Obtain the `Created-By` value for the manifest.
    pub fn generator(&self) -> &str {
        &self.generator
    }

    /// Set the `Created-By` value for the manifest.
    pub fn set_generator(&mut self, v: impl ToString) {
        self.generator = v.to_string();
    }

    /// Obtain the build time stamped on the manifest and archive entries.
    pub fn build_time(&self) -> time::OffsetDateTime {
        self.build_time
    }

    /// Set the build time stamped on the manifest and archive entries.
    pub fn set_build_time(&mut self, v: time::OffsetDateTime) {
        self.build_time = v;
    }

    /// Obtain the parent NAR referenced in the manifest.
    pub fn nar_dependency(&self) -> Option<&NarDependency> {
        self.nar_dependency.as_ref()
    }

    /// Set the parent NAR referenced in the manifest.
    pub fn set_nar_dependency(&mut self, v: Option<NarDependency>) {
        self.nar_dependency = v;
    }

    /// Obtain the file name for this bundle, as currently configured.
    ///
    /// The file name is of the form `{distribution}-{version}.nar`, with
    /// each component escaped.
    pub fn nar_file_name(&self) -> String {
        format!(
            "{}-{}.nar",
            escape_component(&self.metadata.normalized_name()),
            escape_component(&self.metadata.version)
        )
    }

    /// Add a file to the bundle at the given path.
    ///
    /// No validation of the path is performed beyond it being relative.
    pub fn add_file(&mut self, path: impl AsRef<Path>, file: impl Into<FileEntry>) -> Result<()> {
        self.manifest.add_file_entry(path, file)?;

        Ok(())
    }

    /// Add an iterable of files to the bundle.
    pub fn add_files(
        &mut self,
        files: impl Iterator<Item = simple_file_manifest::File>,
    ) -> Result<()> {
        self.manifest.add_files(files)?;

        Ok(())
    }

    /// Whether a file has been staged at the given path.
    pub fn has_file(&self, path: impl AsRef<Path>) -> bool {
        self.manifest.has_path(path)
    }

    /// Obtain the staged entry at the given path.
    pub fn file_entry(&self, path: impl AsRef<Path>) -> Option<&FileEntry> {
        self.manifest.get(path)
    }

    /// Stage a bundled dependency artifact.
    ///
    /// The artifact is archived at
    /// `NAR-INF/bundled-dependencies/<name>-<version>.whl`. The artifact
    /// file must exist and outlive this instance; its content is read when
    /// the archive is written.
    pub fn add_bundled_dependency(&mut self, record: &DependencyRecord) -> Result<()> {
        std::fs::metadata(&record.artifact)
            .map_err(|e| NarError::IoPath(record.artifact.display().to_string(), e))?;

        let entry = FileEntry::new_from_path(&record.artifact, false);

        self.manifest.add_file_entry(
            PathBuf::from(BUNDLED_DEPENDENCIES_PATH).join(format!(
                "{}-{}.whl",
                escape_component(&record.name),
                escape_component(&record.version)
            )),
            entry,
        )?;

        Ok(())
    }

    /// Derive the manifest document for current settings.
    pub fn derive_manifest(&self) -> Result<NarManifest> {
        let mut manifest =
            NarManifest::new(&self.metadata, &[], &self.generator, self.build_time)?;
        manifest.dependency = self.nar_dependency.clone();

        Ok(manifest)
    }

    /// Obtain a [FileManifest] holding the contents of the built bundle.
    ///
    /// Joins the files already registered with a derived
    /// `META-INF/MANIFEST.MF`, unless one was explicitly provided.
    pub fn build_file_manifest(&self) -> Result<FileManifest> {
        let mut m = self.manifest.clone();

        if !m.has_path(MANIFEST_PATH) {
            m.add_file_entry(MANIFEST_PATH, self.derive_manifest()?.serialize()?.as_bytes())?;
        }

        Ok(m)
    }

    /// Writes the contents of the bundle to a writable destination.
    ///
    /// NAR bundles are zip files. So this function effectively materializes
    /// a zip file to the specified writer.
    pub fn write_nar_data(&self, writer: &mut (impl Write + Seek)) -> Result<()> {
        let m = self.build_file_manifest()?;

        // The manifest goes first so runtimes can read it without scanning
        // the whole archive, then bundled dependencies, then sources.
        let mut files = m.iter_files().collect::<Vec<_>>();
        files.sort_by(|a, b| match entry_rank(a.path()).cmp(&entry_rank(b.path())) {
            Ordering::Equal => a.path().cmp(b.path()),
            other => other,
        });

        let mut zf = zip::ZipWriter::new(writer);

        for file in files.into_iter() {
            let options = zip::write::FileOptions::default()
                .unix_permissions(if file.entry().is_executable() {
                    0o0755
                } else {
                    0o0644
                })
                .last_modified_time(
                    zip::DateTime::from_date_and_time(
                        self.build_time.year() as u16,
                        self.build_time.month() as u8,
                        self.build_time.day(),
                        self.build_time.hour(),
                        self.build_time.minute(),
                        self.build_time.second(),
                    )
                    .map_err(|_| NarError::ZipDateTime)?,
                );

            zf.start_file(format!("{}", file.path().display()), options)?;
            zf.write_all(
                &file
                    .entry()
                    .resolve_content()
                    .map_err(|e| NarError::IoPath(file.path_string(), e))?,
            )?;
        }

        zf.finish()?;

        Ok(())
    }

    /// Write the bundle into a given directory, creating it if needed.
    ///
    /// Returns the path of the written `.nar` file on success.
    ///
    /// Archive content is rendered fully in memory, staged to a temporary
    /// file next to the destination, and renamed into place. A failed build
    /// leaves no partial output and an artifact from an earlier successful
    /// build untouched.
    pub fn write_nar_into_directory(&self, directory: impl AsRef<Path>) -> Result<PathBuf> {
        let directory = directory.as_ref();

        std::fs::create_dir_all(directory)
            .map_err(|e| NarError::IoPath(directory.display().to_string(), e))?;

        let mut cursor = std::io::Cursor::new(Vec::<u8>::new());
        self.write_nar_data(&mut cursor)?;

        let path = directory.join(self.nar_file_name());

        let mut tmp = tempfile::Builder::new()
            .prefix(".nar-")
            .suffix(".tmp")
            .tempfile_in(directory)?;
        tmp.write_all(cursor.get_ref())?;

        if path.exists() {
            std::fs::remove_file(&path)
                .map_err(|e| NarError::IoPath(path.display().to_string(), e))?;
        }

        tmp.persist(&path).map_err(|e| NarError::Io(e.error))?;

        Ok(path)
    }
}
