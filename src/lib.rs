// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Apache NiFi NAR Packaging Implemented in Rust

This crate exposes functionality for assembling NAR (NiFi ARchive)
bundles from a host build tool's project description: validated bundle
metadata, a classified locked dependency set, placeholder substitution,
manifest generation, and deterministic archive assembly.
*/

pub mod dependency;
pub mod error;
pub mod filesystem_scanning;
pub mod format;
pub mod manifest;
pub mod nar_builder;
pub mod project_metadata;
pub mod substitution;
