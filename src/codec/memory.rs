//! In-memory [`ModuleCodec`].
//!
//! [`MemoryStore`] keeps assemblies keyed by path and behaves like a file-backed codec would:
//! modules are locked while open, referenced assemblies are found as `<dir>/<scope>.dll` or
//! `<dir>/<scope>.exe`, symbol files are stored apart from the module, and a write encodes
//! every method body before the stored image is replaced, so a failed write leaves the
//! previous image untouched.
//!
//! # Examples
//!
//! ```rust
//! use xamlpatch::codec::MemoryStore;
//! use xamlpatch::metadata::{Module, Section};
//!
//! let store = MemoryStore::new();
//! store.insert("bin/App.dll", Module::new("App", Section::new("App.dll")))?;
//! assert!(store.module("bin/App.dll").is_some());
//! assert_eq!(store.write_count("bin/App.dll"), 0);
//! # Ok::<(), xamlpatch::Error>(())
//! ```

use std::{
    collections::{HashMap, HashSet},
    path::{Path, PathBuf},
    sync::Mutex,
};

use crate::{
    assembly::encode,
    codec::{ModuleCodec, ReadOptions},
    config::SymbolFormat,
    metadata::{symbols::SymbolTable, token::Token, Module, TypeDef},
    Error, Result,
};

/// Extensions tried, in order, when locating a referenced assembly.
const ASSEMBLY_EXTENSIONS: [&str; 2] = ["dll", "exe"];

#[derive(Debug)]
struct StoredImage {
    /// Module without symbols
    module: Module,
    /// Symbol file contents, per section
    symbols: Vec<Option<SymbolTable>>,
    /// Encoded method bodies of the last write, keyed by section index and method token
    bodies: HashMap<(usize, Token), Vec<u8>>,
    writes: usize,
    symbol_writes: usize,
}

#[derive(Debug, Default)]
struct StoreState {
    images: HashMap<PathBuf, StoredImage>,
    locked: HashSet<PathBuf>,
}

/// In-memory assembly storage.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    symbol_formats: Vec<SymbolFormat>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store that can write symbols in every format.
    #[must_use]
    pub fn new() -> Self {
        Self::with_symbol_formats(&[SymbolFormat::Mdb, SymbolFormat::Pdb])
    }

    /// Creates an empty store that can only write symbols in `formats`.
    #[must_use]
    pub fn with_symbol_formats(formats: &[SymbolFormat]) -> Self {
        MemoryStore {
            state: Mutex::new(StoreState::default()),
            symbol_formats: formats.to_vec(),
        }
    }

    /// Stores `module` at `path`, replacing whatever was stored there.
    ///
    /// Section symbols are kept apart, as a symbol file would be.
    ///
    /// # Errors
    /// Returns [`Error::LockError`] if the store's state is poisoned.
    pub fn insert(&self, path: impl Into<PathBuf>, mut module: Module) -> Result<()> {
        let symbols = module
            .sections
            .iter_mut()
            .map(|section| section.symbols.take())
            .collect();

        let mut state = lock!(self.state);
        state.images.insert(
            path.into(),
            StoredImage {
                module,
                symbols,
                bodies: HashMap::new(),
                writes: 0,
                symbol_writes: 0,
            },
        );
        Ok(())
    }

    /// The module stored at `path`, without symbols.
    #[must_use]
    pub fn module(&self, path: impl AsRef<Path>) -> Option<Module> {
        let state = self.state.lock().ok()?;
        state.images.get(path.as_ref()).map(|i| i.module.clone())
    }

    /// The stored symbols of section `section` of the module at `path`.
    #[must_use]
    pub fn symbols(&self, path: impl AsRef<Path>, section: usize) -> Option<SymbolTable> {
        let state = self.state.lock().ok()?;
        state
            .images
            .get(path.as_ref())?
            .symbols
            .get(section)?
            .clone()
    }

    /// Encoded body, header included, of a method as written by the last write.
    #[must_use]
    pub fn method_bytes(&self, path: impl AsRef<Path>, section: usize, method: Token) -> Option<Vec<u8>> {
        let state = self.state.lock().ok()?;
        state
            .images
            .get(path.as_ref())?
            .bodies
            .get(&(section, method))
            .cloned()
    }

    /// Returns true while the module at `path` is open.
    #[must_use]
    pub fn is_locked(&self, path: impl AsRef<Path>) -> bool {
        self.state
            .lock()
            .map(|state| state.locked.contains(path.as_ref()))
            .unwrap_or(false)
    }

    /// Number of times the module at `path` has been written.
    #[must_use]
    pub fn write_count(&self, path: impl AsRef<Path>) -> usize {
        self.image_stat(path.as_ref(), |image| image.writes)
    }

    /// Number of times symbols of the module at `path` have been written.
    #[must_use]
    pub fn symbol_write_count(&self, path: impl AsRef<Path>) -> usize {
        self.image_stat(path.as_ref(), |image| image.symbol_writes)
    }

    fn image_stat(&self, path: &Path, stat: impl Fn(&StoredImage) -> usize) -> usize {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.images.get(path).map(stat))
            .unwrap_or(0)
    }
}

impl ModuleCodec for MemoryStore {
    fn open(&self, path: &Path, options: &ReadOptions) -> Result<Module> {
        let mut state = lock!(self.state);
        let image = state
            .images
            .get(path)
            .ok_or_else(|| Error::ModuleNotFound(path.to_path_buf()))?;
        if state.locked.contains(path) {
            return Err(Error::ModuleLocked(path.to_path_buf()));
        }

        let mut module = image.module.clone();
        if options.read_symbols {
            let format = options.symbol_format;
            let not_found = || Error::SymbolsNotFound {
                path: path.to_path_buf(),
                format,
            };

            // The manifest section must have symbols; other sections may have none, but
            // never a table in another format.
            if image.symbols.first().and_then(Option::as_ref).is_none() {
                return Err(not_found());
            }
            for (section, table) in module.sections.iter_mut().zip(&image.symbols) {
                if let Some(table) = table {
                    if table.format != format {
                        log::warn!(
                            "Symbols of {} are {}, not {}",
                            section.name,
                            table.format,
                            format
                        );
                        return Err(not_found());
                    }
                    section.symbols = Some(table.clone());
                }
            }
        }

        state.locked.insert(path.to_path_buf());
        Ok(module)
    }

    fn release(&self, path: &Path) -> Result<()> {
        let mut state = lock!(self.state);
        state.locked.remove(path);
        Ok(())
    }

    fn resolve_type(
        &self,
        origin: &Path,
        scope: &str,
        full_name: &str,
        search_dirs: &[PathBuf],
    ) -> Result<Option<TypeDef>> {
        let state = lock!(self.state);
        let origin_dir = origin.parent().map(Path::to_path_buf).unwrap_or_default();

        for dir in std::iter::once(&origin_dir).chain(search_dirs) {
            for extension in ASSEMBLY_EXTENSIONS {
                let candidate = dir.join(format!("{scope}.{extension}"));
                let Some(image) = state.images.get(&candidate) else {
                    continue;
                };

                log::trace!("Resolved assembly '{}' to {}", scope, candidate.display());
                return Ok(image
                    .module
                    .sections
                    .iter()
                    .find_map(|section| section.find_type(full_name))
                    .cloned());
            }
        }

        Err(Error::AssemblyNotFound(scope.to_string()))
    }

    fn write_module(&self, path: &Path, module: &Module) -> Result<()> {
        let mut bodies = HashMap::new();
        for (index, section) in module.sections.iter().enumerate() {
            for method in section.types.iter().flat_map(|t| t.methods.iter()) {
                let Some(body) = &method.body else {
                    continue;
                };
                let encoded = encode(&body.instructions, method.signature.returns_value())?;
                bodies.insert(
                    (index, method.token),
                    encoded.to_method_bytes(body.init_locals)?,
                );
            }
        }

        let mut stored = module.clone();
        for section in &mut stored.sections {
            section.symbols = None;
        }

        let mut state = lock!(self.state);
        let image = state
            .images
            .get_mut(path)
            .ok_or_else(|| Error::ModuleNotFound(path.to_path_buf()))?;
        image.module = stored;
        image.bodies = bodies;
        image.writes += 1;
        Ok(())
    }

    fn write_symbols(&self, path: &Path, module: &Module, format: SymbolFormat) -> Result<()> {
        if !self.symbol_formats.contains(&format) {
            return Err(Error::SymbolFormatUnsupported(format));
        }

        let mut state = lock!(self.state);
        let image = state
            .images
            .get_mut(path)
            .ok_or_else(|| Error::ModuleNotFound(path.to_path_buf()))?;
        image.symbols = module
            .sections
            .iter()
            .map(|section| {
                section.symbols.clone().map(|mut table| {
                    table.format = format;
                    table
                })
            })
            .collect();
        image.symbol_writes += 1;
        Ok(())
    }
}
