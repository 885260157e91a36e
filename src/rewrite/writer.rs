//! Commits a rewritten module and its symbols.

use crate::{
    codec::ModuleLease,
    config::SymbolFormat,
    rewrite::SymbolOutcome,
    Result,
};

/// Writes the module held by a [`ModuleLease`] back through its codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModuleWriter {
    symbols: Option<SymbolFormat>,
}

impl ModuleWriter {
    /// Creates a writer; `symbols` is the format to emit symbols in, `None` to skip them.
    #[must_use]
    pub fn new(symbols: Option<SymbolFormat>) -> Self {
        ModuleWriter { symbols }
    }

    /// Writes the module, then its symbols if enabled.
    ///
    /// Symbol tables are first brought in line with the rewritten methods. A failure to write
    /// symbols does not fail the commit; it is returned as [`SymbolOutcome::Degraded`].
    ///
    /// # Errors
    /// Returns an error if the module itself cannot be written.
    pub fn commit(&self, lease: &mut ModuleLease<'_>) -> Result<SymbolOutcome> {
        let Some(format) = self.symbols else {
            log::info!("Writing {}", lease.path().display());
            lease.write_module()?;
            return Ok(SymbolOutcome::NotRequested);
        };

        for section in &mut lease.sections {
            if let Some(refresh) = section.refresh_symbols() {
                log::debug!(
                    "Symbols of {}: {} renamed, {} dropped",
                    section.name,
                    refresh.renamed,
                    refresh.dropped
                );
            }
        }

        log::info!("Writing {} with {} symbols", lease.path().display(), format);
        lease.write_module()?;

        match lease.write_symbols(format) {
            Ok(()) => Ok(SymbolOutcome::Written(format)),
            Err(error) => {
                log::warn!(
                    "Module written without {} symbols: {}",
                    format,
                    error
                );
                Ok(SymbolOutcome::Degraded {
                    format,
                    reason: error.to_string(),
                })
            }
        }
    }
}
