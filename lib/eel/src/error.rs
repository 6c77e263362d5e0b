use snafu::Snafu;

/// Boxed error type used by host objects and functions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Expression text that does not conform to the grammar.
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(display("syntax error at offset {}: unexpected {}", position, found))]
pub struct SyntaxError {
    /// Byte offset of the offending input.
    pub position: usize,

    /// The offending input text, or `end of input`.
    pub found: String,

    /// Descriptions of the input that would have been accepted.
    pub expected: Vec<String>,
}

/// Fragment text that cannot be compiled.
#[derive(Clone, Debug, PartialEq, Eq, Snafu)]
#[snafu(display("invalid fragment at offset {}: {}", position, message))]
pub struct FragmentError {
    /// Byte offset in the fragment text.
    pub position: usize,

    /// What went wrong.
    pub message: String,
}

/// Runtime evaluation error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)), visibility(pub(crate)))]
pub enum EvalError {
    /// An operator has no evaluation branch.
    ///
    /// Expressions produced by the parser never trigger this; it indicates a fragment written by something other
    /// than the compiler in this crate.
    #[snafu(display("unsupported operator '{}'", operator))]
    UnsupportedOperator {
        /// The operator text.
        operator: String,
    },

    /// A method call was blocked by the allow list of a protected context.
    #[snafu(display("method '{}' is not callable in untrusted context", method))]
    CapabilityDenied {
        /// Name of the denied method.
        method: String,
    },

    /// A host method or function returned an error.
    #[snafu(display("method '{}' failed: {}", method, source))]
    MethodFailed {
        /// Name of the failed method.
        method: String,

        /// Error source.
        source: BoxError,
    },

    /// An operand could not be coerced for an operator.
    #[snafu(display("unsupported operand type {} for '{}'", type_name, operator))]
    InvalidOperand {
        /// Operator symbol.
        operator: &'static str,

        /// Type of the offending operand.
        type_name: String,
    },

    /// Division or modulo by zero.
    #[snafu(display("division by zero in '{}'", operator))]
    DivisionByZero {
        /// Operator symbol.
        operator: &'static str,
    },

    /// A non-scalar value was used as a collection key.
    #[snafu(display("values of type {} cannot be used as collection keys", type_name))]
    InvalidKey {
        /// Type of the offending key.
        type_name: String,
    },

    /// A value was pushed onto something that is not a list or map.
    #[snafu(display("cannot push onto a value of type {}", type_name))]
    NotACollection {
        /// Type of the push target.
        type_name: String,
    },
}

/// Top-level error for parsing, compiling and evaluating expressions.
#[derive(Debug, Snafu)]
pub enum Error {
    /// The expression is not valid Eel.
    #[snafu(transparent)]
    Syntax {
        /// Error source.
        source: SyntaxError,
    },

    /// A fragment could not be compiled.
    #[snafu(transparent)]
    Fragment {
        /// Error source.
        source: FragmentError,
    },

    /// Evaluation failed.
    #[snafu(transparent)]
    Eval {
        /// Error source.
        source: EvalError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages_name_the_offending_input() {
        let err = Error::from(SyntaxError {
            position: 4,
            found: "'+'".to_string(),
            expected: vec!["identifier".to_string()],
        });
        assert_eq!(err.to_string(), "syntax error at offset 4: unexpected '+'");

        let err = Error::from(EvalError::UnsupportedOperator {
            operator: "**".to_string(),
        });
        assert_eq!(err.to_string(), "unsupported operator '**'");

        let err = Error::from(EvalError::CapabilityDenied {
            method: "delete".to_string(),
        });
        assert_eq!(err.to_string(), "method 'delete' is not callable in untrusted context");
    }
}
