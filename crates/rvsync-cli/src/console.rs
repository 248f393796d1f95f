//! Operator prompt for ambiguous PI names.

use std::io::{self, BufRead, Write};

use async_trait::async_trait;
use tracing::debug;

use rvsync_core::conflict::MERGE_PREFIX;
use rvsync_core::logging::subsystem;
use rvsync_core::{ConflictCase, ConflictDecision, ConflictResolver, Error, Result};

/// Asks the operator on stdin/stdout, one case at a time.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePrompt;

#[async_trait]
impl ConflictResolver for ConsolePrompt {
    async fn resolve(&self, case: &ConflictCase) -> Result<ConflictDecision> {
        let case = case.clone();
        let decision = tokio::task::spawn_blocking(move || {
            let stdin = io::stdin();
            let stdout = io::stdout();
            prompt(&case, &mut stdin.lock(), &mut stdout.lock())
        })
        .await
        .map_err(|e| Error::Resolution(format!("prompt task failed: {}", e)))??;

        debug!(
            subsystem = subsystem::CLI,
            component = "console",
            decision = %decision,
            "Operator decision read"
        );
        Ok(decision)
    }
}

/// Print a conflict case and read decisions until one is usable.
///
/// End of input is an error: the run cannot continue without an answer.
pub fn prompt<R: BufRead, W: Write>(
    case: &ConflictCase,
    input: &mut R,
    output: &mut W,
) -> Result<ConflictDecision> {
    writeln!(output)?;
    writeln!(
        output,
        "PI '{}' already exists (institution: {})",
        case.pi_name, case.existing_institution
    )?;
    writeln!(output, "New PI institution: {}", case.new_institution)?;
    writeln!(output, "Options:")?;
    writeln!(output, "  Enter      = bundle with existing (no new entry)")?;
    writeln!(
        output,
        "  SUFFIX     = create new entry as '{}'",
        ConflictDecision::Rename("SUFFIX".to_string()).target_name(&case.pi_name)
    )?;
    writeln!(
        output,
        "  {}INST     = merge & update existing institution to INST",
        MERGE_PREFIX
    )?;

    loop {
        write!(output, "Choice: ")?;
        output.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Err(Error::Resolution(format!(
                "input closed before a decision for '{}'",
                case.pi_name
            )));
        }

        match ConflictDecision::parse(&line) {
            ConflictDecision::Merge(institution) if institution.is_empty() => {
                writeln!(output, "  Merge needs an institution after '{}'", MERGE_PREFIX)?;
            }
            decision => {
                match &decision {
                    ConflictDecision::Bundle => writeln!(output, "  → Bundled with existing entry")?,
                    ConflictDecision::Rename(_) => writeln!(
                        output,
                        "  → New entry '{}'",
                        decision.target_name(&case.pi_name)
                    )?,
                    ConflictDecision::Merge(institution) => writeln!(
                        output,
                        "  → Updated '{}' institution to '{}'",
                        case.pi_name, institution
                    )?,
                }
                return Ok(decision);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn case() -> ConflictCase {
        ConflictCase {
            pi_name: "Ride, Sally".to_string(),
            existing_institution: "NASA".to_string(),
            new_institution: "Scripps Institution of Oceanography".to_string(),
        }
    }

    fn answer(text: &str) -> (Result<ConflictDecision>, String) {
        let mut input = Cursor::new(text.as_bytes().to_vec());
        let mut output = Vec::new();
        let result = prompt(&case(), &mut input, &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn test_enter_bundles() {
        let (decision, output) = answer("\n");
        assert_eq!(decision.unwrap(), ConflictDecision::Bundle);
        assert!(output.contains("PI 'Ride, Sally' already exists (institution: NASA)"));
        assert!(output.contains("'Ride, Sally (SUFFIX)'"));
    }

    #[test]
    fn test_suffix_renames() {
        let (decision, output) = answer("SIO\n");
        assert_eq!(decision.unwrap(), ConflictDecision::Rename("SIO".to_string()));
        assert!(output.contains("New entry 'Ride, Sally (SIO)'"));
    }

    #[test]
    fn test_empty_merge_asks_again() {
        let (decision, output) = answer("m.\nm.UCSD\n");
        assert_eq!(decision.unwrap(), ConflictDecision::Merge("UCSD".to_string()));
        assert_eq!(output.matches("Choice: ").count(), 2);
    }

    #[test]
    fn test_closed_input_is_error() {
        let (decision, _) = answer("");
        assert!(matches!(decision, Err(Error::Resolution(_))));
    }
}
