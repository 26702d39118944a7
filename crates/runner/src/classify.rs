//! Outcome classification and the structural guard.

use labcheck_core::{Output, Result};

use crate::normalize::result_count;
use crate::outcome::StepOutcome;
use crate::step::Expectation;

/// Error message fragments that mark a command as malformed rather than
/// failing at run time.
pub const SYNTAX_PATTERNS: &[&str] = &[
    "SyntaxError",
    "Unexpected token",
    "missing ) after",
    "unterminated string",
    "Unexpected end of input",
    "invalid syntax",
    "unknown operator",
    "unknown top level operator",
    "Unrecognized pipeline stage",
    "Unrecognized expression",
];

/// Tokens that, in a multi-line command, indicate a script rather than a
/// single statement.
pub const STRUCTURAL_TOKENS: &[&str] = &[
    "{", "}", "forEach", "for (", "while", "try", "catch", "function",
];

/// Whether an error message reads as a syntax error.
pub fn is_syntax_error(message: &str) -> bool {
    SYNTAX_PATTERNS.iter().any(|p| message.contains(p))
}

/// Reject multi-line command text that contains control flow or blocks.
///
/// Returns the reason when the command cannot be validated as one statement.
pub fn structural_violation(command: &str) -> Option<String> {
    if !command.trim().contains('\n') {
        return None;
    }
    STRUCTURAL_TOKENS
        .iter()
        .find(|token| command.contains(*token))
        .map(|token| {
            format!(
                "multi-line command contains '{}'; run it as a script, it cannot be validated as a single statement",
                token
            )
        })
}

/// Classify an operation's result against its expectation.
pub fn classify(result: Result<Output>, expectation: Expectation) -> StepOutcome {
    match result {
        Ok(output) => {
            let count = result_count(output);
            if count >= expectation.minimum_results {
                StepOutcome::Pass { count }
            } else {
                StepOutcome::FunctionalFail {
                    count,
                    minimum: expectation.minimum_results,
                }
            }
        }
        Err(e) => classify_message(e.to_string()),
    }
}

/// Classify an error message as a syntax or runtime failure.
pub fn classify_message(message: String) -> StepOutcome {
    if is_syntax_error(&message) {
        StepOutcome::SyntaxFail { message }
    } else {
        StepOutcome::RuntimeFail { message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use labcheck_core::{Cursor, Document, Error};
    use proptest::prelude::*;

    #[test]
    fn test_unexpected_token_is_syntax() {
        let outcome = classify_message("SyntaxError: Unexpected token '}'".to_string());
        assert!(matches!(outcome, StepOutcome::SyntaxFail { .. }));
    }

    #[test]
    fn test_store_errors_classify_by_message() {
        let syntax = classify(Err(Error::unknown_operator("$gtt")), Expectation::at_least(1));
        assert!(matches!(syntax, StepOutcome::SyntaxFail { .. }));

        let pipeline = classify(
            Err(Error::InvalidPipeline("Unrecognized pipeline stage name: '$mtch'".into())),
            Expectation::at_least(1),
        );
        assert!(matches!(pipeline, StepOutcome::SyntaxFail { .. }));

        let runtime = classify(
            Err(Error::IndexNotFound("unable to find index for $geoNear query".into())),
            Expectation::at_least(1),
        );
        assert!(matches!(runtime, StepOutcome::RuntimeFail { .. }));
    }

    #[test]
    fn test_functional_fail_below_minimum() {
        let outcome = classify(Ok(Output::Count(2)), Expectation::at_least(3));
        assert_eq!(outcome, StepOutcome::FunctionalFail { count: 2, minimum: 3 });
    }

    #[test]
    fn test_must_not_fail_passes_on_empty() {
        let outcome = classify(Ok(Output::Unit), Expectation::must_not_fail());
        assert_eq!(outcome, StepOutcome::Pass { count: 0 });
    }

    #[test]
    fn test_structural_guard() {
        let script = "db.orders.find().forEach(doc =>\n  printjson(doc)\n)";
        assert!(structural_violation(script).unwrap().contains("forEach"));
        // Single-line commands with braces are ordinary statements
        assert!(structural_violation("db.orders.find({ status: \"shipped\" })").is_none());
        // Multi-line without control flow is fine
        assert!(structural_violation("db.orders\n  .find()\n  .limit(2)").is_none());
        // Trailing newline alone does not make a command multi-line
        assert!(structural_violation("db.orders.find({})\n").is_none());
    }

    proptest! {
        #[test]
        fn test_sequence_passes_iff_length_meets_minimum(n in 0usize..40, minimum in 0u64..40) {
            let outcome = classify(
                Ok(Output::Cursor(Cursor::new(vec![Document::new(); n]))),
                Expectation::at_least(minimum),
            );
            prop_assert_eq!(outcome.is_pass(), n as u64 >= minimum);
        }
    }
}
