// errors.rs - Error values for the Forth virtual machine and cross-compiler

use std::fmt;

/// Errors produced by the interpreter, the compiler and the emitter.
///
/// Most failures are annotated with the dictionary entry that raised them
/// through the `Entry` variant, which chains an optional cause the way the
/// outer interpreter reports nested execution failures.
#[derive(Debug, Clone, PartialEq)]
pub enum ForthError {
    /// A stack was popped while empty. Carries the stack name.
    Underflow(&'static str),
    /// Source text could not be parsed (bad number, unterminated string).
    Parse(String),
    /// A name was not found in the dictionary.
    Lookup(String),
    /// A cell was not the variant an operation required.
    Type(String),
    /// An offset fell outside a word body or data block.
    Bounds(String),
    /// The return stack or instruction pointer ended up wrong after a
    /// composite word returned.
    Invariant(String),
    /// A compile-only operation ran while interpreting, or vice versa.
    Compile(String),
    /// A cell variant was invalid in the current emission context.
    Emission(String),
    /// Bubble-up from the host I/O path.
    Io(String),
    /// The line editor was interrupted.
    Interrupt,
    /// An error annotated with the dictionary entry that raised it,
    /// optionally chaining the underlying cause.
    Entry {
        name: String,
        message: String,
        cause: Option<Box<ForthError>>,
    },
    /// A plain contextual wrapper for failures outside any entry.
    Context(String, Box<ForthError>),
}

impl fmt::Display for ForthError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ForthError::Underflow(stack) => {
                write!(f, "attempted to pop empty {} stack", stack)
            }
            ForthError::Parse(msg) => write!(f, "parse error: {}", msg),
            ForthError::Lookup(name) => write!(f, "{} not found in dictionary", name),
            ForthError::Type(msg) => write!(f, "{}", msg),
            ForthError::Bounds(msg) => write!(f, "{}", msg),
            ForthError::Invariant(msg) => write!(f, "{}", msg),
            ForthError::Compile(msg) => write!(f, "{}", msg),
            ForthError::Emission(msg) => write!(f, "{}", msg),
            ForthError::Io(msg) => write!(f, "i/o error: {}", msg),
            ForthError::Interrupt => write!(f, "Interrupt"),
            ForthError::Entry {
                name,
                message,
                cause,
            } => {
                write!(f, "{} {}", name, message)?;
                if let Some(cause) = cause {
                    write!(f, "\n{}", cause)?;
                }
                Ok(())
            }
            ForthError::Context(msg, cause) => write!(f, "{}\n{}", msg, cause),
        }
    }
}

impl std::error::Error for ForthError {}

impl ForthError {
    /// Wrap this error with the entry it was raised in.
    pub fn in_entry(self, name: &str, message: impl Into<String>) -> ForthError {
        ForthError::Entry {
            name: name.to_string(),
            message: message.into(),
            cause: Some(Box::new(self)),
        }
    }

    /// Wrap this error with a plain contextual message.
    pub fn context(self, message: impl Into<String>) -> ForthError {
        ForthError::Context(message.into(), Box::new(self))
    }
}

/// A fresh error raised by the named dictionary entry.
pub fn entry_error(name: &str, message: impl Into<String>) -> ForthError {
    ForthError::Entry {
        name: name.to_string(),
        message: message.into(),
        cause: None,
    }
}

/// Standard wrapper for a failed pop inside a primitive.
pub fn pop_error(err: ForthError, name: &str) -> ForthError {
    err.in_entry(name, "could not pop from stack")
}
