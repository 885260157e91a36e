//! Boundary to the storage format of assemblies.
//!
//! The rewriter never touches bytes on disk itself. It talks to a [`ModuleCodec`], which
//! opens an assembly into the [`crate::metadata`] model, resolves types of referenced
//! assemblies and persists the rewritten module and its symbols.
//!
//! [`ModuleLease`] wraps an opened module: it holds the codec's exclusive lock for as long
//! as it lives and releases it when dropped, whichever way the run ends.
//!
//! # Key Types
//! - [`ModuleCodec`] - The codec interface
//! - [`ReadOptions`] - How a module is opened
//! - [`ModuleLease`] - Scoped exclusive access to an opened module
//! - [`ExternalResolver`] - Type resolution against referenced assemblies
//! - [`MemoryStore`] - In-memory codec

mod memory;

pub use memory::MemoryStore;

use std::{
    ops::{Deref, DerefMut},
    path::{Path, PathBuf},
};

use crate::{
    config::SymbolFormat,
    metadata::{Module, TypeDef},
    Result,
};

/// How a module is opened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOptions {
    /// Directories searched for referenced assemblies
    pub search_directories: Vec<PathBuf>,
    /// Load symbols together with the module
    pub read_symbols: bool,
    /// Format of the symbols to load
    pub symbol_format: SymbolFormat,
}

/// Reads and writes assemblies.
///
/// Implementations must make [`ModuleCodec::write_module`] atomic: either the complete
/// rewritten module is persisted or storage is left as it was.
pub trait ModuleCodec {
    /// Opens the module at `path` for exclusive read-write access.
    ///
    /// # Errors
    /// - [`crate::Error::ModuleNotFound`] if nothing is stored at `path`
    /// - [`crate::Error::ModuleLocked`] if the module is already open
    /// - [`crate::Error::SymbolsNotFound`] if symbols were requested but are missing
    fn open(&self, path: &Path, options: &ReadOptions) -> Result<Module>;

    /// Releases the exclusive access taken by [`ModuleCodec::open`].
    ///
    /// # Errors
    /// Returns an error if the codec's own state cannot be accessed.
    fn release(&self, path: &Path) -> Result<()>;

    /// Resolves the type `full_name` defined in the assembly `scope`.
    ///
    /// The assembly is looked up next to `origin` and in `search_dirs`. Returns `Ok(None)`
    /// if the assembly exists but does not define the type.
    ///
    /// # Errors
    /// Returns [`crate::Error::AssemblyNotFound`] if the assembly cannot be located.
    fn resolve_type(
        &self,
        origin: &Path,
        scope: &str,
        full_name: &str,
        search_dirs: &[PathBuf],
    ) -> Result<Option<TypeDef>>;

    /// Encodes and persists `module` at `path`.
    ///
    /// # Errors
    /// Returns an error if a method body cannot be encoded or storage fails.
    fn write_module(&self, path: &Path, module: &Module) -> Result<()>;

    /// Persists the symbols of `module` in `format`.
    ///
    /// # Errors
    /// Returns [`crate::Error::SymbolFormatUnsupported`] if the codec cannot write `format`.
    fn write_symbols(&self, path: &Path, module: &Module, format: SymbolFormat) -> Result<()>;
}

/// Resolves types of referenced assemblies for one opened module.
#[derive(Clone, Copy)]
pub struct ExternalResolver<'a> {
    codec: &'a dyn ModuleCodec,
    origin: &'a Path,
    search_dirs: &'a [PathBuf],
}

impl<'a> ExternalResolver<'a> {
    /// Creates a resolver for assemblies referenced by the module at `origin`.
    #[must_use]
    pub fn new(codec: &'a dyn ModuleCodec, origin: &'a Path, search_dirs: &'a [PathBuf]) -> Self {
        ExternalResolver {
            codec,
            origin,
            search_dirs,
        }
    }

    /// Resolves `full_name` in the assembly `scope`.
    ///
    /// # Errors
    /// See [`ModuleCodec::resolve_type`].
    pub fn resolve_type(&self, scope: &str, full_name: &str) -> Result<Option<TypeDef>> {
        self.codec
            .resolve_type(self.origin, scope, full_name, self.search_dirs)
    }
}

/// Exclusive access to an opened module, released on drop.
pub struct ModuleLease<'c> {
    codec: &'c dyn ModuleCodec,
    path: PathBuf,
    search_dirs: Vec<PathBuf>,
    module: Module,
}

impl<'c> ModuleLease<'c> {
    /// Opens `path` through `codec`.
    ///
    /// # Errors
    /// See [`ModuleCodec::open`].
    pub fn acquire(codec: &'c dyn ModuleCodec, path: &Path, options: &ReadOptions) -> Result<Self> {
        let module = codec.open(path, options)?;
        log::debug!(
            "Opened {} ({} section(s))",
            path.display(),
            module.sections.len()
        );

        Ok(ModuleLease {
            codec,
            path: path.to_path_buf(),
            search_dirs: options.search_directories.clone(),
            module,
        })
    }

    /// Path the module was opened from.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Type resolution for referenced assemblies together with mutable access to the module.
    pub fn parts_mut(&mut self) -> (ExternalResolver<'_>, &mut Module) {
        (
            ExternalResolver {
                codec: self.codec,
                origin: &self.path,
                search_dirs: &self.search_dirs,
            },
            &mut self.module,
        )
    }

    /// Persists the module.
    ///
    /// # Errors
    /// See [`ModuleCodec::write_module`].
    pub fn write_module(&self) -> Result<()> {
        self.codec.write_module(&self.path, &self.module)
    }

    /// Persists the module's symbols in `format`.
    ///
    /// # Errors
    /// See [`ModuleCodec::write_symbols`].
    pub fn write_symbols(&self, format: SymbolFormat) -> Result<()> {
        self.codec.write_symbols(&self.path, &self.module, format)
    }
}

impl Deref for ModuleLease<'_> {
    type Target = Module;

    fn deref(&self) -> &Module {
        &self.module
    }
}

impl DerefMut for ModuleLease<'_> {
    fn deref_mut(&mut self) -> &mut Module {
        &mut self.module
    }
}

impl Drop for ModuleLease<'_> {
    fn drop(&mut self) {
        match self.codec.release(&self.path) {
            Ok(()) => log::debug!("Released {}", self.path.display()),
            Err(error) => log::error!("Failed to release {}: {}", self.path.display(), error),
        }
    }
}
