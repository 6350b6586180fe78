//! Exit codes for the llmcompare CLI.
//!
//! | Code | Constant | Description |
//! |------|----------|-------------|
//! | 0 | `SUCCESS` | Operation completed successfully |
//! | 1 | `INTERNAL` | Storage or unexpected failure |
//! | 2 | `CLI_ARGS` | Invalid arguments or configuration |
//! | 3 | `STATE` | Operation not allowed in the current workflow phase |
//! | 4 | `NOT_FOUND` | Dataset, baseline or file missing |
//! | 9 | `LOCK_HELD` | Another writer held the feature lock |
//! | 70 | `API_FAILURE` | LLM call, evaluation or generation failed |

/// Process exit code.
///
/// The numeric values are part of the CLI contract.
///
/// ```rust
/// use llmcompare_utils::exit_codes::ExitCode;
///
/// assert_eq!(ExitCode::SUCCESS.as_i32(), 0);
/// assert_eq!(ExitCode::from_i32(3), ExitCode::STATE);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCode(i32);

impl ExitCode {
    pub const SUCCESS: ExitCode = ExitCode(0);

    pub const INTERNAL: ExitCode = ExitCode(1);

    /// Invalid CLI arguments or configuration
    pub const CLI_ARGS: ExitCode = ExitCode(2);

    /// Illegal workflow transition or unresolved baseline selection
    pub const STATE: ExitCode = ExitCode(3);

    pub const NOT_FOUND: ExitCode = ExitCode(4);

    /// Timed out waiting for another writer on the same feature
    pub const LOCK_HELD: ExitCode = ExitCode(9);

    /// LLM gateway failure, or unusable evaluator/generator output
    pub const API_FAILURE: ExitCode = ExitCode(70);

    #[must_use]
    pub const fn as_i32(self) -> i32 {
        self.0
    }

    #[must_use]
    pub const fn from_i32(code: i32) -> Self {
        ExitCode(code)
    }
}

impl From<ExitCode> for i32 {
    fn from(code: ExitCode) -> Self {
        code.0
    }
}
