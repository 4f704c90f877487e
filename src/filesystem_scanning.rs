// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*!
Scanning the filesystem for project files to embed in a bundle.
*/

use {
    crate::{
        error::{NarError, Result},
        format::NAR_FORMAT,
        project_metadata::Project,
    },
    once_cell::sync::Lazy,
    simple_file_manifest::{File, FileEntry, FileManifestError},
    std::path::{Path, PathBuf},
};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

#[cfg(unix)]
fn is_executable(metadata: &std::fs::Metadata) -> bool {
    let permissions = metadata.permissions();
    permissions.mode() & 0o111 != 0
}

#[cfg(windows)]
fn is_executable(_metadata: &std::fs::Metadata) -> bool {
    false
}

/// Legal file matching regular expression.
static RE_LEGAL_FILE: Lazy<regex::Regex> =
    Lazy::new(|| regex::Regex::new(r"^(LICEN[CS]E|COPYING|NOTICE|AUTHORS)").unwrap());

fn file_entry(path: &Path) -> Result<FileEntry> {
    let metadata = std::fs::metadata(path)
        .map_err(|e| NarError::IoPath(path.display().to_string(), e))?;

    Ok(FileEntry::new_from_path(path, is_executable(&metadata)))
}

/// Whether a relative path is build cache content never shipped in bundles.
fn is_excluded(path: &Path) -> bool {
    path.components()
        .any(|component| component.as_os_str() == "__pycache__")
        || path.extension() == Some(std::ffi::OsStr::new("pyc"))
}

fn embeds_despite_formats(formats: &[String], what: &str, name: &str) {
    // The nar format cannot selectively exclude project content; declared
    // format restrictions only apply to the host's native formats.
    if !formats.is_empty() && !formats.iter().any(|format| format == NAR_FORMAT) {
        log::debug!("{} {} is declared for other formats; embedding anyway", what, name);
    }
}

fn scan_tree(dir: &Path, strip_prefix: &Path) -> Result<Vec<File>> {
    let mut files = Vec::new();

    for entry in walkdir::WalkDir::new(dir).sort_by(|a, b| a.file_name().cmp(b.file_name())) {
        let entry = entry.map_err(|e| NarError::IoPath(dir.display().to_string(), e.into()))?;

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let rel = path.strip_prefix(strip_prefix).map_err(FileManifestError::from)?;

        if is_excluded(rel) {
            continue;
        }

        log::debug!("adding {}", rel.display());
        files.push(File::new(rel, file_entry(path)?));
    }

    Ok(files)
}

/// Evaluate a file matching glob relative to the project root.
fn evaluate_glob(root: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    let search = format!("{}/{}", root.display(), pattern);

    let mut res = Vec::new();

    for path in glob::glob(&search)? {
        res.push(path.map_err(|e| {
            let path = e.path().display().to_string();
            NarError::IoPath(path, e.into_error())
        })?);
    }

    Ok(res)
}

/// Collect the files of a project's source packages and declared includes.
///
/// Paths in the returned entries are archive-relative: a package's source
/// root is stripped, include matches keep their project-relative path.
/// `__pycache__` directories and `.pyc` files are skipped.
pub fn find_project_files(project: &Project) -> Result<Vec<File>> {
    let mut files = Vec::new();

    for package in &project.packages {
        embeds_despite_formats(&package.formats, "package", &package.include);

        let source_root = match &package.source {
            Some(source) => project.root.join(source),
            None => project.root.clone(),
        };

        files.extend(scan_tree(&source_root.join(&package.include), &source_root)?);
    }

    for include in &project.includes {
        embeds_despite_formats(&include.formats, "include", &include.pattern);

        for path in evaluate_glob(&project.root, &include.pattern)? {
            if path.is_dir() {
                files.extend(scan_tree(&path, &project.root)?);
                continue;
            }

            let rel = path
                .strip_prefix(&project.root)
                .map_err(FileManifestError::from)?;

            if is_excluded(rel) {
                continue;
            }

            log::debug!("adding {}", rel.display());
            files.push(File::new(rel, file_entry(&path)?));
        }
    }

    Ok(files)
}

/// Collect root-level legal files and declared readme files.
///
/// Both are archived under `META-INF/`, next to the manifest.
pub fn find_metadata_files(project: &Project) -> Result<Vec<File>> {
    let mut files = Vec::new();

    let mut entries = std::fs::read_dir(&project.root)
        .map_err(|e| NarError::IoPath(project.root.display().to_string(), e))?
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| NarError::IoPath(project.root.display().to_string(), e))?;

    entries.sort_by_key(|entry| entry.file_name());

    for entry in entries {
        let name = entry.file_name();

        if !RE_LEGAL_FILE.is_match(&name.to_string_lossy()) {
            continue;
        }

        let path = entry.path();

        if !path.is_file() {
            continue;
        }

        files.push(File::new(Path::new("META-INF").join(&name), file_entry(&path)?));
    }

    for readme in &project.readme {
        let path = project.root.join(readme);
        let entry = file_entry(&path)?;

        let name = path.file_name().ok_or_else(|| {
            NarError::IoPath(
                path.display().to_string(),
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "readme has no file name"),
            )
        })?;

        files.push(File::new(Path::new("META-INF").join(name), entry));
    }

    Ok(files)
}
