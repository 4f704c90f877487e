// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use {simple_file_manifest::FileManifestError, thiserror::Error};

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum NarError {
    #[error("file manifest error: {0}")]
    FileManifest(#[from] FileManifestError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("I/O error on path {0}: {1:?}")]
    IoPath(String, std::io::Error),

    #[error("zip error: {0:?}")]
    Zip(#[from] zip::result::ZipError),

    #[error("glob pattern error: {0:?}")]
    GlobPattern(#[from] glob::PatternError),

    #[error("manifest parse error: {0}")]
    ManifestParse(#[from] mailparse::MailParseError),

    #[error("project has no name")]
    MetadataMissingId,

    #[error("project has no version")]
    MetadataMissingVersion,

    #[error("invalid project version: {0}")]
    MetadataInvalidVersion(String),

    #[error("invalid bundle group: {0}")]
    MetadataInvalidGroup(String),

    #[error("version and description substitution targets are different files: {0}, {1}")]
    ConfigSubstitutionTargetMismatch(String, String),

    #[error("dependency is not fully resolved: {0}")]
    DependencyUnresolved(String),

    #[error("duplicate dependency: {0}")]
    DependencyDuplicate(String),

    #[error("bundle can depend on at most one NAR; found {0} and {1}")]
    DependencyMultipleNars(String, String),

    #[error("substitution target does not exist: {0}")]
    SubstitutionTargetMissing(String),

    #[error("substitution target is not UTF-8 text: {0}")]
    SubstitutionTargetNotText(String),

    #[error("required manifest field is empty: {0}")]
    ManifestMissingField(&'static str),

    #[error("could not format build timestamp")]
    TimestampFormat,

    #[error("could not convert build time to zip time")]
    ZipDateTime,
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, NarError>;
