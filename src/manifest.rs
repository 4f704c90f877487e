// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! NAR bundle manifests.

A NAR archive describes itself through `META-INF/MANIFEST.MF`, a
line-oriented `Key: Value` document the NiFi runtime parses when loading
the bundle. Serialization here is bit-exact: `\n` line terminators and a
trailing blank line, exactly as the runtime expects.
*/

use {
    crate::{
        dependency::{DependencyKind, DependencyRecord},
        error::{NarError, Result},
        project_metadata::BundleMetadata,
    },
    mailparse::parse_mail,
    time::{macros::format_description, OffsetDateTime, UtcOffset},
};

/// Path of the manifest inside a NAR archive.
pub const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Format a build timestamp the way NAR manifests record it.
pub fn format_build_timestamp(t: OffsetDateTime) -> Result<String> {
    let format = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

    t.to_offset(UtcOffset::UTC)
        .format(&format)
        .map_err(|_| NarError::TimestampFormat)
}

/// Identity of the single NAR bundle another bundle depends on at load time.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NarDependency {
    pub group: String,
    pub id: String,
    pub version: String,
}

/// Derive the parent NAR dependency from resolved dependency records.
///
/// The target runtime loads a bundle with at most one parent NAR. Two or
/// more NAR-kind records cannot be reconciled automatically, so they abort
/// the build.
pub fn nar_dependency(dependencies: &[DependencyRecord]) -> Result<Option<NarDependency>> {
    let mut nars = dependencies
        .iter()
        .filter(|record| record.kind == DependencyKind::Nar);

    let first = match nars.next() {
        Some(record) => record,
        None => return Ok(None),
    };

    if let Some(second) = nars.next() {
        return Err(NarError::DependencyMultipleNars(
            first.name.clone(),
            second.name.clone(),
        ));
    }

    Ok(Some(NarDependency {
        group: first.name.clone(),
        id: first.name.clone(),
        version: first.version.clone(),
    }))
}

/// Represents a `META-INF/MANIFEST.MF` document.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NarManifest {
    /// Manifest format version. `1.0`.
    pub manifest_version: String,

    /// Identity of the tool that produced the bundle.
    pub created_by: String,

    /// Build timestamp, `%Y-%m-%dT%H:%M:%SZ` in UTC.
    pub build_timestamp: String,

    /// Bundle authors, when declared.
    pub built_by: Option<String>,

    /// Bundle group.
    pub group: String,

    /// Bundle id.
    pub id: String,

    /// Bundle version.
    pub version: String,

    /// The parent NAR, when one exists.
    pub dependency: Option<NarDependency>,
}

impl NarManifest {
    /// Construct a manifest from bundle metadata and resolved dependencies.
    pub fn new(
        metadata: &BundleMetadata,
        dependencies: &[DependencyRecord],
        created_by: impl ToString,
        build_time: OffsetDateTime,
    ) -> Result<Self> {
        Ok(Self {
            manifest_version: "1.0".to_string(),
            created_by: created_by.to_string(),
            build_timestamp: format_build_timestamp(build_time)?,
            built_by: if metadata.authors.is_empty() {
                None
            } else {
                Some(metadata.authors.join(", "))
            },
            group: metadata.group.clone(),
            id: metadata.id.clone(),
            version: metadata.version.clone(),
            dependency: nar_dependency(dependencies)?,
        })
    }

    /// Parse a manifest document.
    pub fn from_data(data: &[u8]) -> Result<Self> {
        let message = parse_mail(data)?;

        let headers = message
            .headers
            .iter()
            .map(|header| (header.get_key(), header.get_value()))
            .collect::<Vec<_>>();

        let find = |key: &str| {
            headers
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.clone())
        };

        let require = |key: &'static str| {
            find(key)
                .filter(|value| !value.is_empty())
                .ok_or(NarError::ManifestMissingField(key))
        };

        let dependency = match (
            find("Nar-Dependency-Group"),
            find("Nar-Dependency-Id"),
            find("Nar-Dependency-Version"),
        ) {
            (None, None, None) => None,
            (group, id, version) => Some(NarDependency {
                group: group.ok_or(NarError::ManifestMissingField("Nar-Dependency-Group"))?,
                id: id.ok_or(NarError::ManifestMissingField("Nar-Dependency-Id"))?,
                version: version
                    .ok_or(NarError::ManifestMissingField("Nar-Dependency-Version"))?,
            }),
        };

        Ok(Self {
            manifest_version: find("Manifest-Version").unwrap_or_else(|| "1.0".to_string()),
            created_by: find("Created-By").unwrap_or_default(),
            build_timestamp: find("Build-Timestamp").unwrap_or_default(),
            built_by: find("Built-By"),
            id: require("Nar-Id")?,
            group: require("Nar-Group")?,
            version: require("Nar-Version")?,
            dependency,
        })
    }

    /// Serialize the manifest document.
    ///
    /// Every required key must be non-empty; an empty key is an error, not
    /// a silent default.
    pub fn serialize(&self) -> Result<String> {
        let required = [
            ("Manifest-Version", self.manifest_version.as_str()),
            ("Created-By", self.created_by.as_str()),
            ("Build-Timestamp", self.build_timestamp.as_str()),
            ("Nar-Id", self.id.as_str()),
            ("Nar-Group", self.group.as_str()),
            ("Nar-Version", self.version.as_str()),
        ];

        for (key, value) in required {
            if value.is_empty() {
                return Err(NarError::ManifestMissingField(key));
            }
        }

        let mut lines = vec![
            format!("Manifest-Version: {}", self.manifest_version),
            format!("Created-By: {}", self.created_by),
            format!("Build-Timestamp: {}", self.build_timestamp),
        ];

        if let Some(built_by) = &self.built_by {
            lines.push(format!("Built-By: {}", built_by));
        }

        lines.push(format!("Nar-Id: {}", self.id));
        lines.push(format!("Nar-Group: {}", self.group));
        lines.push(format!("Nar-Version: {}", self.version));

        if let Some(dependency) = &self.dependency {
            let triple = [
                ("Nar-Dependency-Group", dependency.group.as_str()),
                ("Nar-Dependency-Id", dependency.id.as_str()),
                ("Nar-Dependency-Version", dependency.version.as_str()),
            ];

            for (key, value) in triple {
                if value.is_empty() {
                    return Err(NarError::ManifestMissingField(key));
                }

                lines.push(format!("{}: {}", key, value));
            }
        }

        Ok(format!("{}\n\n", lines.join("\n")))
    }
}
