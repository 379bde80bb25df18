// Copyright 2026 The dotshroud authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![deny(missing_docs)]
#![allow(dead_code)]

//! # dotshroud
//!
//! A cross-module rename obfuscation engine for .NET metadata.
//!
//! `dotshroud` renames the symbols of a set of managed modules — types, methods,
//! fields, properties, events — to short meaningless identifiers while keeping the
//! modules executable: every cross-module reference, every virtual-dispatch
//! relationship, and every runtime-visible contract (interface implementations,
//! attribute-driven reflection, resource lookup) keeps working after the rewrite. An
//! additional pass hides string literals behind a synthesized, table-backed lookup
//! type per module.
//!
//! ## Architecture
//!
//! - [`metadata`] — symbol keys, attribute flags, and the mutable module model the
//!   external loader produces
//! - [`assembly`] — CIL instructions and the label-resolving body builder
//! - [`project`] — module units, the cross-module reference index, skip rules,
//!   descriptor reading, and the loader/writer/signer boundaries
//! - [`rename`] — the inheritance graph, virtual-method grouping, name allocation,
//!   the obfuscation ledger, and the [`Obfuscator`] driver
//! - [`hide`] — the string-hiding transform
//! - [`mapping`] — text and XML mapping-file writers
//!
//! ## Pipeline
//!
//! Renaming is a fixed-order, single-threaded batch: fields, parameters, properties,
//! events, methods, then types, followed by string hiding. Methods that override or
//! implement one another (across modules included) are grouped and renamed in
//! lockstep; groups rooted outside the project keep their names, because an
//! unresolvable base cannot be patched.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use dotshroud::prelude::*;
//!
//! # let loader: &dyn ModuleLoader = unimplemented!();
//! # let writer: &dyn ModuleWriter = unimplemented!();
//! # let signer: &dyn StrongNameSigner = unimplemented!();
//! let config = ProjectConfig::from_path("project.xml".as_ref())?;
//! let mut obfuscator = Obfuscator::from_config(config, loader)?;
//! obfuscator.run()?;
//! obfuscator.save_modules(writer, signer)?;
//! obfuscator.save_mapping()?;
//! # Ok::<(), dotshroud::Error>(())
//! ```
//!
//! Binary module parsing and writing, strong-name cryptography, and the CLI shell are
//! external collaborators behind the [`project::ModuleLoader`],
//! [`project::ModuleWriter`] and [`project::StrongNameSigner`] traits.
//!
//! ## Determinism
//!
//! Given identical input modules and identical skip decisions, every run assigns the
//! identical names: processing follows declaration order everywhere, and the name
//! allocator probes one canonical sequence. The exported mapping file is reproducible
//! byte for byte.

#[macro_use]
pub(crate) mod macros;

pub(crate) mod error;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

pub mod assembly;
pub mod hide;
pub mod mapping;
pub mod metadata;
pub mod prelude;
pub mod project;
pub mod rename;

/// `dotshroud` Result type
///
/// A type alias for [`std::result::Result`] with the error type fixed to [`Error`],
/// used consistently throughout the crate for all fallible operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `dotshroud` Error type
///
/// Covers the configuration, resource, and signing fault classes of the pipeline; see
/// the variant documentation for the taxonomy.
pub use error::Error;

/// The top-level rename driver.
///
/// See [`rename::Obfuscator`] for the pipeline stages and their fixed order.
pub use rename::Obfuscator;

/// The multi-module project container.
pub use project::Project;
