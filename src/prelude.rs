//! # xamlpatch Prelude
//!
//! The types needed to configure and run a rewrite, and to inspect its outcome.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all xamlpatch operations
pub use crate::Error;

/// The result type used throughout xamlpatch
pub use crate::Result;

// ================================================================================================
// Running a rewrite
// ================================================================================================

/// Rewrite driver
pub use crate::rewrite::DebugXamlRewriter;

/// Outcome of a run
pub use crate::rewrite::{RewriteReport, RewrittenType, Skip, SkipReason, SymbolOutcome};

/// Configuration
pub use crate::config::{RewriteConfig, SymbolFormat};

/// Storage boundary
pub use crate::codec::{MemoryStore, ModuleCodec, ReadOptions};

// ================================================================================================
// Metadata
// ================================================================================================

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

/// Module model
pub use crate::metadata::{
    MethodDef, MethodSig, Module, Resource, Section, SymbolTable, TypeDef, TypeSig,
};
