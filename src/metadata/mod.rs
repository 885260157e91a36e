//! In-memory metadata model of the assembly being rewritten.
//!
//! The model covers what the rewriter reads and mutates: sections (modules) with their
//! resources, type definitions, method definitions with bodies, type and member references,
//! and per-method debug symbols. Rows are addressed through [`token::Token`]s the same way
//! the metadata tables address them.
//!
//! # Key Types
//! - [`Module`] - The assembly, a list of [`Section`]s
//! - [`Section`] - One module, owner of types, references, resources and symbols
//! - [`TypeDef`] / [`MethodDef`] - Type and method definitions
//! - [`Resource`] - Manifest resources, embedded or linked
//! - [`SymbolTable`] - Debug symbols keyed by method token

pub mod method;
mod module;
pub mod references;
pub mod resource;
pub mod section;
pub mod signature;
pub mod symbols;
pub mod token;
pub mod typedef;

pub use method::{MethodAttributes, MethodBody, MethodDef, MethodImplAttributes};
pub use module::Module;
pub use references::{MemberRef, TypeRef};
pub use resource::{Resource, ResourceData};
pub use section::Section;
pub use signature::{MethodSig, TypeSig};
pub use symbols::{MethodSymbols, SequencePoint, SymbolTable};
pub use typedef::TypeDef;
