//! Compile errors

/// Errors while compiling a style sheet
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// Malformed source
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    /// A variable is referenced but never defined
    #[error("variable @{name} is undefined (line {line})")]
    UndefinedVariable { name: String, line: usize },

    /// A variable refers back to itself
    #[error("recursive variable definition for @{name} (line {line})")]
    RecursiveVariable { name: String, line: usize },

    /// Valid Less that the bundled compiler does not implement
    #[error("unsupported construct on line {line}: {construct}")]
    Unsupported { line: usize, construct: String },
}

impl CompileError {
    /// Create syntax error at line
    pub fn syntax(line: usize, message: impl Into<String>) -> Self {
        Self::Syntax {
            line,
            message: message.into(),
        }
    }

    /// Create unsupported-construct error at line
    pub fn unsupported(line: usize, construct: impl Into<String>) -> Self {
        Self::Unsupported {
            line,
            construct: construct.into(),
        }
    }

    /// Line the error was reported on
    #[must_use]
    pub fn line(&self) -> usize {
        match self {
            Self::Syntax { line, .. }
            | Self::UndefinedVariable { line, .. }
            | Self::RecursiveVariable { line, .. }
            | Self::Unsupported { line, .. } => *line,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_mentions_line() {
        let err = CompileError::syntax(3, "missing closing `}`");
        assert_eq!(err.to_string(), "syntax error on line 3: missing closing `}`");
        assert_eq!(err.line(), 3);
    }

    #[test]
    fn undefined_variable_display() {
        let err = CompileError::UndefinedVariable {
            name: "accent".to_string(),
            line: 1,
        };
        assert!(err.to_string().contains("@accent"));
    }
}
