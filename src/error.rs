use thiserror::Error;

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

macro_rules! type_error {
    ($msg:expr) => {
        crate::Error::TypeMismatch {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::TypeMismatch {
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
/// ## Construction Errors
/// - [`Error::TypeMismatch`] - An operand does not have the type an instruction requires
/// - [`Error::BlockTerminated`] - An instruction was appended after a block's terminator
///
/// ## Precondition Errors
/// - [`Error::Declaration`] - A body-requiring operation was given a declaration
/// - [`Error::UnreachableBlocks`] - SSA construction was asked to run on a function with dead blocks
///
/// ## Validation and Pipeline Errors
/// - [`Error::Malformed`] - The structural verifier rejected a function
/// - [`Error::PassFailed`] - A pass run by the pass manager failed
///
/// # Examples
///
/// ```rust
/// use midend::{Error, ir::Module, ir::verify_module};
///
/// let module = Module::new();
/// match verify_module(&module) {
///     Ok(()) => println!("module is well formed"),
///     Err(Error::Malformed { message, file, line }) => {
///         eprintln!("Malformed IR: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("Other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// An operand or result type did not satisfy an instruction's typing rules.
    ///
    /// Raised by the [`Builder`](crate::ir::Builder) and the module factories before
    /// anything is inserted into the graph, so a failed construction leaves the
    /// module untouched.
    ///
    /// # Fields
    ///
    /// * `message` - Description of the violated typing rule
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Type mismatch - {file}:{line}: {message}")]
    TypeMismatch {
        /// The message to be printed for the TypeMismatch error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// The IR is structurally inconsistent.
    ///
    /// Reported by [`verify_function`](crate::ir::verify_function) and friends
    /// when a block misses its terminator, control edges disagree with branch
    /// targets, or def-use records are out of sync.
    ///
    /// # Fields
    ///
    /// * `message` - Detailed description of what was malformed
    /// * `file` - Source file where the error was detected
    /// * `line` - Source line where the error was detected
    #[error("Malformed - {file}:{line}: {message}")]
    Malformed {
        /// The message to be printed for the Malformed error
        message: String,
        /// The source file in which this error occured
        file: &'static str,
        /// The source line in which this error occured
        line: u32,
    },

    /// An instruction was appended to a block that already ends in a terminator.
    ///
    /// The associated string names the block.
    #[error("Block {0} is already terminated")]
    BlockTerminated(String),

    /// An operation that needs a function body was applied to a declaration.
    ///
    /// The associated string names the function.
    #[error("Function {0} is a declaration")]
    Declaration(String),

    /// SSA construction was requested on a function containing blocks that are
    /// not reachable from its entry block.
    ///
    /// Run dead code elimination with unreachable block removal first.
    #[error("Function {0} contains blocks unreachable from its entry")]
    UnreachableBlocks(String),

    /// A pass run by the [`PassManager`](crate::compiler::PassManager) failed.
    #[error("Pass {pass} failed: {message}")]
    PassFailed {
        /// Name of the failing pass
        pass: &'static str,
        /// Rendered error the pass returned
        message: String,
    },

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
