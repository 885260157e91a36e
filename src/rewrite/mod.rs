//! The XAML debug rewrite pass.
//!
//! For every section of the assembly, every resource is classified; each XAML resource names
//! a class whose type is looked up, its initializers located (splitting `InitializeComponent`
//! into an empty placeholder and `__InitComponentRuntime` on first run) and its
//! `.ctor(bool)` synthesized. The module is written once, at the end.
//!
//! Skips (no XAML, no type, no initializer) are recorded and logged; the run goes on. Any
//! error aborts the run before anything is written, and the module lock is released either
//! way.
//!
//! # Examples
//!
//! ```rust,no_run
//! use xamlpatch::{codec::MemoryStore, DebugXamlRewriter, RewriteConfig};
//!
//! let store = MemoryStore::new();
//! let config = RewriteConfig::new("bin/App.dll").dependency_paths("lib");
//! let report = DebugXamlRewriter::new(&store, config).run()?;
//!
//! for rewritten in &report.rewritten {
//!     println!("{} -> {}", rewritten.type_name, rewritten.flag_constructor);
//! }
//! # Ok::<(), xamlpatch::Error>(())
//! ```

pub mod classifier;
pub mod constructor;
pub mod locator;
pub mod resolver;
pub mod writer;

use strum::Display;

use crate::{
    codec::{ExternalResolver, ModuleCodec, ModuleLease},
    config::{RewriteConfig, SymbolFormat},
    metadata::{token::Token, Section},
    Result,
};

use self::writer::ModuleWriter;

/// Name of the initializer generated by the XAML compiler.
pub const PRECOMPILED_INITIALIZER: &str = "InitializeComponent";

/// Name the original initializer is moved to.
pub const RUNTIME_INITIALIZER: &str = "__InitComponentRuntime";

/// Parameter name of a generated flag constructor.
pub const FLAG_PARAMETER: &str = "useCompiledXaml";

/// Why a resource did not lead to a rewrite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum SkipReason {
    /// The resource is not an embedded XAML descriptor
    #[strum(to_string = "not a XAML resource")]
    NotXaml,
    /// The section defines no type with the descriptor's class name
    #[strum(to_string = "no type found")]
    TypeNotFound,
    /// The type has no `InitializeComponent()`
    #[strum(to_string = "no InitializeComponent found")]
    NoInitializer,
}

/// A skipped resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Skip {
    /// Section the resource belongs to
    pub section: String,
    /// Resource name
    pub resource: String,
    /// Class named by the resource, if it is XAML
    pub class_name: Option<String>,
    /// Why it was skipped
    pub reason: SkipReason,
}

/// A type that received a flag constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewrittenType {
    /// Section defining the type
    pub section: String,
    /// Full type name
    pub type_name: String,
    /// `InitializeComponent()` token
    pub precompiled: Token,
    /// `__InitComponentRuntime()` token
    pub runtime: Token,
    /// `.ctor(bool)` token
    pub flag_constructor: Token,
    /// True if `InitializeComponent()` was recreated empty in this run
    pub placeholder_created: bool,
    /// True if the flag constructor was added in this run
    pub constructor_created: bool,
}

/// What happened to debug symbols.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SymbolOutcome {
    /// Symbols were not enabled
    NotRequested,
    /// Symbols were written in this format
    Written(SymbolFormat),
    /// The module was written but symbols could not be
    Degraded {
        /// Format that was attempted
        format: SymbolFormat,
        /// Why writing failed
        reason: String,
    },
}

/// Summary of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteReport {
    /// Resources inspected, across all sections
    pub resources_seen: usize,
    /// Type lookups performed for XAML resources
    pub type_lookups: usize,
    /// Resources that did not lead to a rewrite, in processing order
    pub skipped: Vec<Skip>,
    /// Rewritten types, in processing order
    pub rewritten: Vec<RewrittenType>,
    /// Symbol handling
    pub symbols: SymbolOutcome,
}

impl Default for RewriteReport {
    fn default() -> Self {
        RewriteReport {
            resources_seen: 0,
            type_lookups: 0,
            skipped: Vec::new(),
            rewritten: Vec::new(),
            symbols: SymbolOutcome::NotRequested,
        }
    }
}

/// Runs the rewrite pass over one assembly.
pub struct DebugXamlRewriter<'c> {
    codec: &'c dyn ModuleCodec,
    config: RewriteConfig,
}

impl<'c> DebugXamlRewriter<'c> {
    /// Creates a rewriter for the assembly named by `config`.
    #[must_use]
    pub fn new(codec: &'c dyn ModuleCodec, config: RewriteConfig) -> Self {
        DebugXamlRewriter { codec, config }
    }

    /// The configuration of this rewriter.
    #[must_use]
    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Rewrites the assembly and writes it back.
    ///
    /// # Errors
    /// Returns the first fatal error: the assembly cannot be opened, a referenced assembly
    /// cannot be found, a base type has no parameterless constructor, a body cannot be
    /// encoded, or the module cannot be written. Nothing is written in that case.
    pub fn run(&self) -> Result<RewriteReport> {
        log::info!("Preparing debug code for xamlc");
        log::info!("Assembly: {}", self.config.assembly().display());

        let options = self.config.read_options();
        let mut lease = ModuleLease::acquire(self.codec, self.config.assembly(), &options)?;
        let mut report = RewriteReport::default();

        let (external, module) = lease.parts_mut();
        for section in &mut module.sections {
            log::debug!("Module: {}", section.name);
            for index in 0..section.resources.len() {
                process_resource(&external, section, index, &mut report)?;
            }
        }

        let writer = ModuleWriter::new(self.config.writer_format());
        report.symbols = writer.commit(&mut lease)?;
        log::info!("Done: {} type(s) rewritten", report.rewritten.len());
        Ok(report)
    }
}

/// Classifies resource `index` of `section` and rewrites the type it names.
fn process_resource(
    external: &ExternalResolver<'_>,
    section: &mut Section,
    index: usize,
    report: &mut RewriteReport,
) -> Result<()> {
    report.resources_seen += 1;
    let resource = &section.resources[index];
    let resource_name = resource.name.clone();
    let class_name = classifier::classify(resource);

    let skip = |class_name: Option<String>, reason: SkipReason| {
        log::debug!("Resource {}: {}, skipped", resource_name, reason);
        Skip {
            section: section.name.clone(),
            resource: resource_name.clone(),
            class_name,
            reason,
        }
    };

    let Some(class_name) = class_name else {
        let skipped = skip(None, SkipReason::NotXaml);
        report.skipped.push(skipped);
        return Ok(());
    };

    log::debug!("Resource {}: class {}", resource_name, class_name);
    report.type_lookups += 1;
    let Some(type_token) = resolver::find_target_type(section, &class_name) else {
        let skipped = skip(Some(class_name), SkipReason::TypeNotFound);
        report.skipped.push(skipped);
        return Ok(());
    };

    let Some(initializers) = locator::locate(section, type_token)? else {
        report.skipped.push(Skip {
            section: section.name.clone(),
            resource: resource_name,
            class_name: Some(class_name),
            reason: SkipReason::NoInitializer,
        });
        log::debug!("Type {}: {}, skipped", type_token, SkipReason::NoInitializer);
        return Ok(());
    };

    let ctor = constructor::rewrite_flag_constructor(external, section, type_token, &initializers)?;
    let type_name = section.type_name(type_token).unwrap_or(class_name);
    log::info!("Rewrote {} in {}", type_name, section.name);

    report.rewritten.push(RewrittenType {
        section: section.name.clone(),
        type_name,
        precompiled: initializers.precompiled,
        runtime: initializers.runtime,
        flag_constructor: ctor.token,
        placeholder_created: initializers.placeholder_created,
        constructor_created: ctor.created,
    });
    Ok(())
}
