//! Rewrite configuration.
//!
//! [`RewriteConfig`] gathers everything a run needs before it starts: the assembly to patch,
//! the directories used to resolve referenced assemblies, and whether and how debug symbols
//! are read and written. The symbol formats are resolved once, here, and passed down; nothing
//! later in the pipeline probes the environment.
//!
//! # Examples
//!
//! ```rust
//! use xamlpatch::{RewriteConfig, SymbolFormat};
//!
//! let config = RewriteConfig::new("obj/Debug/App.dll")
//!     .dependency_paths("lib/netstandard;lib/forms")
//!     .reference_path("packages//Forms/Xamarin.Forms.Core.dll;packages/Forms/Xamarin.Forms.Xaml.dll")
//!     .debug_symbols(true)
//!     .symbol_format(SymbolFormat::Mdb);
//!
//! let dirs = config.search_directories();
//! assert_eq!(dirs.len(), 3);
//! assert_eq!(config.writer_format(), Some(SymbolFormat::Mdb));
//! ```

use std::{
    env,
    path::{Path, PathBuf},
};

use strum::{Display, EnumString};

use crate::{codec::ReadOptions, Error, Result};

/// Environment variable that overrides the host default symbol format.
pub const SYMBOL_FORMAT_ENV: &str = "XAMLPATCH_SYMBOL_FORMAT";

/// Separator of path lists.
const PATH_LIST_SEPARATOR: char = ';';

/// Debug symbol file formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum SymbolFormat {
    /// Mono symbol files (`.mdb`)
    Mdb,
    /// Program database files (`.pdb`)
    Pdb,
}

impl SymbolFormat {
    /// The format native to the host platform.
    #[must_use]
    pub fn host_default() -> Self {
        if cfg!(windows) {
            SymbolFormat::Pdb
        } else {
            SymbolFormat::Mdb
        }
    }

    /// Resolves an explicit format name, falling back to [`SymbolFormat::host_default`].
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] for unknown format names.
    pub fn resolve(value: Option<&str>) -> Result<Self> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::host_default()),
            Some(name) => name
                .parse()
                .map_err(|_| Error::Configuration(format!("unknown symbol format '{name}'"))),
        }
    }

    /// Resolves the format from [`SYMBOL_FORMAT_ENV`].
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the variable names an unknown format.
    pub fn from_environment() -> Result<Self> {
        Self::resolve(env::var(SYMBOL_FORMAT_ENV).ok().as_deref())
    }

    /// File extension of symbol files in this format, without the dot.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            SymbolFormat::Mdb => "mdb",
            SymbolFormat::Pdb => "pdb",
        }
    }
}

/// Configuration of a rewrite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteConfig {
    assembly: PathBuf,
    dependency_dirs: Vec<PathBuf>,
    reference_paths: Vec<PathBuf>,
    debug_symbols: bool,
    symbol_reader: SymbolFormat,
    symbol_writer: Option<SymbolFormat>,
}

impl RewriteConfig {
    /// Creates a configuration for `assembly` with no search paths and symbols disabled.
    #[must_use]
    pub fn new(assembly: impl Into<PathBuf>) -> Self {
        RewriteConfig {
            assembly: assembly.into(),
            dependency_dirs: Vec::new(),
            reference_paths: Vec::new(),
            debug_symbols: false,
            symbol_reader: SymbolFormat::host_default(),
            symbol_writer: None,
        }
    }

    /// Like [`RewriteConfig::new`], with the symbol format taken from [`SYMBOL_FORMAT_ENV`].
    ///
    /// # Errors
    /// Returns [`Error::Configuration`] if the variable names an unknown format.
    pub fn from_environment(assembly: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(assembly).symbol_format(SymbolFormat::from_environment()?))
    }

    /// Adds `;`-separated directories to search for referenced assemblies.
    #[must_use]
    pub fn dependency_paths(mut self, paths: &str) -> Self {
        self.dependency_dirs.extend(
            paths
                .split(PATH_LIST_SEPARATOR)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
        self
    }

    /// Adds `;`-separated paths of referenced assemblies; their directories are searched.
    ///
    /// Doubled slashes, as produced by some build systems, are collapsed first.
    #[must_use]
    pub fn reference_path(mut self, paths: &str) -> Self {
        let collapsed = paths.replace("//", "/");
        self.reference_paths.extend(
            collapsed
                .split(PATH_LIST_SEPARATOR)
                .filter(|p| !p.is_empty())
                .map(PathBuf::from),
        );
        self
    }

    /// Adds a single search directory.
    #[must_use]
    pub fn search_directory(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dependency_dirs.push(dir.into());
        self
    }

    /// Enables reading and writing of debug symbols.
    #[must_use]
    pub fn debug_symbols(mut self, enabled: bool) -> Self {
        self.debug_symbols = enabled;
        self
    }

    /// Sets the format symbols are read in. Unless set separately, symbols are written in
    /// the same format.
    #[must_use]
    pub fn symbol_format(mut self, format: SymbolFormat) -> Self {
        self.symbol_reader = format;
        self
    }

    /// Sets the format symbols are written in.
    #[must_use]
    pub fn symbol_writer(mut self, format: SymbolFormat) -> Self {
        self.symbol_writer = Some(format);
        self
    }

    /// The assembly to rewrite.
    #[must_use]
    pub fn assembly(&self) -> &Path {
        &self.assembly
    }

    /// Whether symbols are read and written.
    #[must_use]
    pub fn reads_symbols(&self) -> bool {
        self.debug_symbols
    }

    /// Format symbols are read in.
    #[must_use]
    pub fn reader_format(&self) -> SymbolFormat {
        self.symbol_reader
    }

    /// Format symbols are written in, or `None` when symbols are disabled.
    #[must_use]
    pub fn writer_format(&self) -> Option<SymbolFormat> {
        self.debug_symbols
            .then(|| self.symbol_writer.unwrap_or(self.symbol_reader))
    }

    /// Directories searched for referenced assemblies, in order and without duplicates:
    /// dependency directories first, then the directories of the reference paths.
    #[must_use]
    pub fn search_directories(&self) -> Vec<PathBuf> {
        let reference_dirs = self
            .reference_paths
            .iter()
            .filter_map(|p| p.parent())
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf);

        let mut dirs: Vec<PathBuf> = Vec::new();
        for dir in self.dependency_dirs.iter().cloned().chain(reference_dirs) {
            if !dirs.contains(&dir) {
                log::trace!("Adding search path {}", dir.display());
                dirs.push(dir);
            }
        }
        dirs
    }

    /// Options for opening the assembly.
    #[must_use]
    pub fn read_options(&self) -> ReadOptions {
        ReadOptions {
            search_directories: self.search_directories(),
            read_symbols: self.debug_symbols,
            symbol_format: self.symbol_reader,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_format_parse() {
        assert_eq!(SymbolFormat::resolve(Some("mdb")).unwrap(), SymbolFormat::Mdb);
        assert_eq!(SymbolFormat::resolve(Some("PDB")).unwrap(), SymbolFormat::Pdb);
        assert_eq!(
            SymbolFormat::resolve(None).unwrap(),
            SymbolFormat::host_default()
        );
        assert_eq!(
            SymbolFormat::resolve(Some("  ")).unwrap(),
            SymbolFormat::host_default()
        );
        assert!(matches!(
            SymbolFormat::resolve(Some("dwarf")),
            Err(Error::Configuration(_))
        ));
        assert_eq!(SymbolFormat::Pdb.to_string(), "pdb");
        assert_eq!(SymbolFormat::Mdb.extension(), "mdb");
    }

    #[test]
    fn test_search_directories() {
        let config = RewriteConfig::new("bin/App.dll")
            .dependency_paths("deps/a;;deps/b")
            .reference_path("refs//core/Core.dll;refs/core/Xaml.dll;Loose.dll")
            .search_directory("deps/a");

        assert_eq!(
            config.search_directories(),
            vec![
                PathBuf::from("deps/a"),
                PathBuf::from("deps/b"),
                PathBuf::from("refs/core"),
            ]
        );
    }

    #[test]
    fn test_writer_format() {
        let config = RewriteConfig::new("App.dll").symbol_format(SymbolFormat::Pdb);
        assert_eq!(config.writer_format(), None);

        let config = config.debug_symbols(true);
        assert_eq!(config.writer_format(), Some(SymbolFormat::Pdb));

        let config = config.symbol_writer(SymbolFormat::Mdb);
        assert_eq!(config.writer_format(), Some(SymbolFormat::Mdb));
        assert_eq!(config.reader_format(), SymbolFormat::Pdb);
    }

    #[test]
    fn test_read_options() {
        let options = RewriteConfig::new("App.dll")
            .search_directory("lib")
            .debug_symbols(true)
            .symbol_format(SymbolFormat::Mdb)
            .read_options();

        assert_eq!(options.search_directories, vec![PathBuf::from("lib")]);
        assert!(options.read_symbols);
        assert_eq!(options.symbol_format, SymbolFormat::Mdb);
    }
}
