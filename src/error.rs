use std::path::PathBuf;

use thiserror::Error;

use crate::{assembly::Label, config::SymbolFormat, metadata::token::Token};

macro_rules! malformed_error {
    // Single string version
    ($msg:expr) => {
        crate::Error::Malformed {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::Malformed {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, which provides coverage for all errors this library can potentially
/// return.
///
/// # Error Categories
///
/// ## Fatal module errors
/// - [`Error::ModuleNotFound`] - The module to rewrite does not exist in the codec's storage
/// - [`Error::ModuleLocked`] - The module is already held read-write by another lease
/// - [`Error::AssemblyNotFound`] - A referenced assembly is not present in any search directory
/// - [`Error::SymbolsNotFound`] - Symbols were requested but none exist in the requested format
/// - [`Error::BaseConstructorNotFound`] - A XAML type's base cannot be constructed without arguments
///
/// ## Instruction building and encoding
/// - [`Error::InvalidBranch`], [`Error::UnboundLabel`], [`Error::DuplicateLabel`]
/// - [`Error::UnexpectedOperand`], [`Error::WrongOperandType`]
/// - [`Error::Malformed`] - Structural problem, e.g. a stack discipline violation
///
/// ## Degraded
/// - [`Error::SymbolFormatUnsupported`] - Returned by codecs when symbol output is impossible;
///   the rewriter downgrades it to a warning.
///
/// # Examples
///
/// ```rust,no_run
/// use xamlpatch::{codec::MemoryStore, DebugXamlRewriter, Error, RewriteConfig};
///
/// let store = MemoryStore::new();
/// let rewriter = DebugXamlRewriter::new(&store, RewriteConfig::new("bin/App.dll"));
///
/// match rewriter.run() {
///     Ok(report) => println!("{} types rewritten", report.rewritten.len()),
///     Err(Error::BaseConstructorNotFound { type_name, .. }) => {
///         eprintln!("{type_name} cannot be constructed");
///     }
///     Err(e) => eprintln!("rewrite failed: {e}"),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The module data is structurally invalid.
    ///
    /// Includes the source location where the malformation was detected.
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// No module is stored under the requested path.
    #[error("Module not found - {}", .0.display())]
    ModuleNotFound(PathBuf),

    /// The module is already opened for exclusive read-write access.
    #[error("Module is locked by another writer - {}", .0.display())]
    ModuleLocked(PathBuf),

    /// A referenced assembly could not be located in any search directory.
    #[error("Failed to resolve assembly '{0}'")]
    AssemblyNotFound(String),

    /// Symbols were requested but the module has none in the requested format.
    #[error("No {format} symbols available for {}", .path.display())]
    SymbolsNotFound {
        /// The module whose symbols were requested
        path: PathBuf,
        /// The symbol format that was requested
        format: SymbolFormat,
    },

    /// The codec cannot produce symbols in this format.
    #[error("Symbol format {0} is not supported")]
    SymbolFormatUnsupported(SymbolFormat),

    /// The base type of a XAML class exposes no parameterless constructor.
    ///
    /// Fatal for the whole run; nothing is written.
    #[error("Base type '{base}' of '{type_name}' has no parameterless constructor")]
    BaseConstructorNotFound {
        /// Full name of the XAML class
        type_name: String,
        /// Full name of its base type, or `<none>`
        base: String,
    },

    /// No type definition exists for this token.
    #[error("Failed to find type - {0}")]
    TypeNotFound(Token),

    /// No method definition exists for this token.
    #[error("Failed to find method - {0}")]
    MethodNotFound(Token),

    /// A method was added to a type that already owns it.
    #[error("Method {0} is already defined on this type")]
    DuplicateMethod(Token),

    /// A branch is malformed or its target is out of range.
    #[error("Invalid branch - {0}")]
    InvalidBranch(String),

    /// A branch refers to a label that was never bound to an instruction.
    #[error("Label {0} was never bound")]
    UnboundLabel(Label),

    /// A label was bound twice.
    #[error("Label {0} is already bound")]
    DuplicateLabel(Label),

    /// An operand was provided to an instruction that takes none.
    #[error("Unexpected operand")]
    UnexpectedOperand,

    /// The operand does not match the instruction's operand type.
    #[error("Wrong operand type - expected {expected}, got {actual}")]
    WrongOperandType {
        /// The operand type the instruction requires
        expected: String,
        /// The operand that was provided
        actual: String,
    },

    /// Invalid configuration value.
    #[error("Invalid configuration - {0}")]
    Configuration(String),

    /// Failed to lock target.
    #[error("Failed to lock target")]
    LockError,
}
