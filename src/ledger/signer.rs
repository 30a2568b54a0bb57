//! Submitter that shells out to an external signing script.
//!
//! The script receives the JSON action list on stdin, pushes the transaction
//! and prints the transaction id on stdout. A non-zero exit status means the
//! transaction was not executed; stderr carries the chain's error message.

use super::{Action, ActionSubmitter, SubmitError};
use crate::domain::TxId;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, info};

/// Error fragments the market contract emits for sales that vanished.
const STALE_SALE_MARKERS: &[&str] = &[
    "No sale with this sale_id exists",
    "sale is not active",
];

#[derive(Debug, Clone)]
pub struct CommandSubmitter {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl CommandSubmitter {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            timeout: Duration::from_secs(60),
        }
    }

    /// Build from a whitespace separated command line such as
    /// `node --no-warnings transfer.js`.
    pub fn from_command_line(command: &str) -> Result<Self, SubmitError> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| SubmitError::Signer("empty signer command".to_string()))?;
        Ok(Self::new(program, parts.collect()))
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn run(&self, payload: Vec<u8>) -> Result<std::process::Output, SubmitError> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| SubmitError::Signer(format!("failed to run {}: {}", self.program, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(&payload)
                .await
                .map_err(|e| SubmitError::Signer(format!("failed to write actions: {}", e)))?;
        }

        tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| SubmitError::Signer(format!("signer timed out after {:?}", self.timeout)))?
            .map_err(|e| SubmitError::Signer(e.to_string()))
    }
}

/// Map signer stderr to the error taxonomy.
pub fn classify_failure(stderr: &str) -> SubmitError {
    let message = stderr.trim().to_string();
    if STALE_SALE_MARKERS.iter().any(|m| message.contains(m)) {
        SubmitError::StaleReference(message)
    } else {
        SubmitError::Rejected(message)
    }
}

#[async_trait]
impl ActionSubmitter for CommandSubmitter {
    async fn submit(&self, actions: &[Action]) -> Result<TxId, SubmitError> {
        let payload = serde_json::to_vec(actions)
            .map_err(|e| SubmitError::Signer(format!("failed to encode actions: {}", e)))?;
        debug!(actions = actions.len(), "Submitting transaction");

        let output = self.run(payload).await?;
        if !output.status.success() {
            return Err(classify_failure(&String::from_utf8_lossy(&output.stderr)));
        }

        let tx_id = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if tx_id.is_empty() {
            return Err(SubmitError::Signer("signer printed no transaction id".to_string()));
        }

        info!(tx_id = %tx_id, "Transaction pushed");
        Ok(TxId::new(tx_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_actions() -> Vec<Action> {
        vec![Action::new(
            "atomicassets",
            "transfer",
            "op",
            json!({ "asset_ids": ["1"] }),
        )]
    }

    #[test]
    fn classify_stale_sale() {
        let err = classify_failure(r#"{"message":"assertion failure with message: No sale with this sale_id exists"}"#);
        assert!(matches!(err, SubmitError::StaleReference(_)));
    }

    #[test]
    fn classify_other_rejection() {
        let err = classify_failure("overdrawn balance");
        assert_eq!(err, SubmitError::Rejected("overdrawn balance".to_string()));
    }

    #[test]
    fn empty_command_line_is_rejected() {
        assert!(CommandSubmitter::from_command_line("   ").is_err());
        let submitter = CommandSubmitter::from_command_line("node --no-warnings transfer.js").unwrap();
        assert_eq!(submitter.program, "node");
        assert_eq!(submitter.args, vec!["--no-warnings", "transfer.js"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn stdout_becomes_transaction_id() {
        let submitter = CommandSubmitter::new(
            "sh",
            vec!["-c".to_string(), "cat > /dev/null; echo abc123".to_string()],
        );
        let tx = submitter.submit(&sample_actions()).await.unwrap();
        assert_eq!(tx, TxId::new("abc123"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_classified() {
        let submitter = CommandSubmitter::new(
            "sh",
            vec![
                "-c".to_string(),
                "cat > /dev/null; echo 'No sale with this sale_id exists' >&2; exit 1".to_string(),
            ],
        );
        let err = submitter.submit(&sample_actions()).await.unwrap_err();
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn missing_program_is_signer_error() {
        let submitter = CommandSubmitter::new("definitely-not-a-signer-binary", vec![]);
        let err = submitter.submit(&sample_actions()).await.unwrap_err();
        assert!(matches!(err, SubmitError::Signer(_)));
    }
}
