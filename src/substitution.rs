// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Rewriting placeholder tokens with live project metadata.

Source files can carry `"__version__"` and `"__description__"` string
literals standing in for values only known at build time. Rewriting
produces new bytes for the archived copy; the file on disk keeps its
placeholder values.
*/

use {
    crate::error::{NarError, Result},
    std::path::{Path, PathBuf},
};

/// Version placeholder token.
pub const VERSION_TOKEN: &str = "__version__";

/// Description placeholder token.
pub const DESCRIPTION_TOKEN: &str = "__description__";

fn replace_quoted(text: String, token: &str, value: &str) -> String {
    text.replace(
        &format!("\"{}\"", token),
        &format!("\"{}\"", value),
    )
    .replace(&format!("'{}'", token), &format!("'{}'", value))
}

/// Replace placeholder tokens in source text.
///
/// Tokens must appear as quoted string literals. The replacement is
/// re-quoted with the quote character found around the token. A text
/// without a given token is returned unchanged for that token.
pub fn rewrite_tokens(text: &str, version: &str, description: &str) -> String {
    let text = replace_quoted(text.to_string(), VERSION_TOKEN, version);

    replace_quoted(text, DESCRIPTION_TOKEN, description)
}

/// The designated substitution file plus the values to apply to it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubstitutionTarget {
    /// Target file, relative to the project root.
    pub path: PathBuf,

    /// Value replacing the version token.
    pub version: String,

    /// Value replacing the description token.
    pub description: String,
}

impl SubstitutionTarget {
    /// Produce the rewritten content of the target file.
    ///
    /// Reads the file under `root`, never writes it back.
    pub fn rewrite(&self, root: &Path) -> Result<Vec<u8>> {
        let path = root.join(&self.path);

        if !path.is_file() {
            return Err(NarError::SubstitutionTargetMissing(
                path.display().to_string(),
            ));
        }

        let data = std::fs::read(&path)
            .map_err(|e| NarError::IoPath(path.display().to_string(), e))?;

        let text = String::from_utf8(data)
            .map_err(|_| NarError::SubstitutionTargetNotText(path.display().to_string()))?;

        Ok(rewrite_tokens(&text, &self.version, &self.description).into_bytes())
    }
}
