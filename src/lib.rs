// Copyright 2025 Johann Kempter
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

#![doc(html_no_source)]
#![warn(missing_docs)]

//! # xamlpatch
//!
//! A post-build rewriter for .NET assemblies containing XAML pages. After the XAML compiler
//! has turned every page's `InitializeComponent` into precompiled object construction,
//! `xamlpatch` gives each page a second way to start up: the original, runtime-interpreted
//! initializer is kept as `__InitComponentRuntime` and a new `.ctor(bool useCompiledXaml)`
//! picks one of the two at construction time.
//!
//! ## What gets rewritten
//!
//! For every embedded `*.xaml` resource whose root element names a class (`x:Class`), and
//! for which the assembly defines that class:
//!
//! - on the first run, `InitializeComponent()` is renamed to `__InitComponentRuntime()` and
//!   an empty `InitializeComponent()` is added in its place, for the XAML compiler to fill;
//! - a `.ctor(bool)` is added (or its body replaced) that calls the base constructor, then
//!   `InitializeComponent()` when the flag is true and `__InitComponentRuntime()` when it
//!   is false.
//!
//! Running the rewriter twice over the same assembly leaves the method set unchanged.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use xamlpatch::prelude::*;
//!
//! let store = MemoryStore::new();
//! let config = RewriteConfig::from_environment("bin/Debug/App.dll")?
//!     .dependency_paths("packages/Xamarin.Forms/lib")
//!     .debug_symbols(true);
//!
//! let report = DebugXamlRewriter::new(&store, config).run()?;
//! println!(
//!     "{} resource(s), {} type(s) rewritten, symbols: {:?}",
//!     report.resources_seen,
//!     report.rewritten.len(),
//!     report.symbols
//! );
//! # Ok::<(), xamlpatch::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`assembly`] - CIL opcodes, the two-phase [`assembly::SequenceBuilder`] and the body encoder
//! - [`metadata`] - Tokens, types, methods, signatures, resources and symbol tables
//! - [`codec`] - The [`codec::ModuleCodec`] storage boundary and the in-memory [`codec::MemoryStore`]
//! - [`config`] - [`RewriteConfig`] and [`SymbolFormat`]
//! - [`rewrite`] - Classification, lookup, constructor synthesis and the [`DebugXamlRewriter`] driver
//!
//! ## Logging
//!
//! Progress is reported through the [`log`] facade: the run at `info`, every section,
//! resource and type at `debug`, search paths at `trace`. Unreadable XAML headers and symbols
//! that could not be written are reported at `warn`. No logger is installed by this crate.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Resources that do not lead to a
//! rewrite are not errors; they are listed in [`RewriteReport::skipped`].

#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// ```rust,no_run
/// use xamlpatch::prelude::*;
///
/// let store = MemoryStore::new();
/// let report = DebugXamlRewriter::new(&store, RewriteConfig::new("App.dll")).run()?;
/// # Ok::<(), xamlpatch::Error>(())
/// ```
pub mod prelude;

/// CIL instructions: opcodes, instruction sequences and the method body encoder.
///
/// Bodies are built with a [`assembly::SequenceBuilder`], whose branches name labels that
/// are bound to instructions once those exist. [`assembly::encode`] turns a finished
/// [`assembly::InstructionSequence`] into bytes, choosing the shortest branch forms and
/// computing the maximum stack depth.
///
/// # Examples
///
/// ```rust
/// use xamlpatch::assembly::{encode, OpCode, SequenceBuilder};
///
/// let mut il = SequenceBuilder::new();
/// let end = il.label();
/// il.emit_ldarg(1)?;
/// il.branch(OpCode::Brfalse, end)?;
/// il.emit(OpCode::Nop)?;
/// let ret = il.emit(OpCode::Ret)?;
/// il.bind(end, ret)?;
///
/// let body = encode(&il.finish()?, false)?;
/// assert_eq!(body.code, vec![0x03, 0x2C, 0x01, 0x00, 0x2A]);
/// # Ok::<(), xamlpatch::Error>(())
/// ```
pub mod assembly;

/// The metadata model of a module: sections, types, methods, references, resources and
/// symbols.
pub mod metadata;

/// Storage of assemblies, see [`codec::ModuleCodec`].
pub mod codec;

/// Run configuration.
pub mod config;

/// The XAML debug rewrite pass.
pub mod rewrite;

/// `xamlpatch` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `xamlpatch` Error type
pub use error::Error;

/// Run configuration and symbol formats.
pub use config::{RewriteConfig, SymbolFormat};

/// The rewrite driver and its report.
pub use rewrite::{DebugXamlRewriter, RewriteReport};
