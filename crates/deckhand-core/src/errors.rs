use std::path::PathBuf;

use thiserror::Error;

use crate::config::ENCRYPTED_KEY_ENV;

/// Errors surfaced by deployment runs. Every variant terminates the run;
/// the only downgraded case is a simulated broadcast, which is reported as
/// a warning by the scanner rather than surfacing here.
#[derive(Debug, Error)]
pub enum DeckhandError {
    /// The build step has not been run: no compiled artifact exists at any
    /// of the probed locations.
    #[error("artifact not found for contract '{contract}'. Tried:\n{}", format_tried(.tried))]
    ArtifactNotFound { contract: String, tried: Vec<PathBuf> },

    /// The driver process or a transaction submission failed.
    #[error("deployment failed: {reason}")]
    DeploymentFailed { reason: String },

    /// The stored keystore could not be decrypted with the provided password.
    #[error("failed to decrypt deployer key: wrong password?")]
    DecryptionFailed,

    /// No credential source is configured at all.
    #[error("no deployer key found. Set {ENCRYPTED_KEY_ENV} by running `deckhand account generate`, or export RUNTIME_DEPLOYER_PRIVATE_KEY")]
    NoSigningKey,

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("rpc error: {0}")]
    Rpc(String),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}

fn format_tried(tried: &[PathBuf]) -> String {
    tried.iter().map(|p| format!("  {}", p.display())).collect::<Vec<_>>().join("\n")
}

impl DeckhandError {
    pub fn deployment_failed(reason: impl Into<String>) -> Self {
        DeckhandError::DeploymentFailed { reason: reason.into() }
    }

    /// A user-actionable hint, chosen by substring matching against the
    /// underlying message. Printed by the CLI next to the error itself.
    pub fn remediation(&self) -> Option<String> {
        match self {
            DeckhandError::ArtifactNotFound { .. } => {
                Some("Run `forge build` in the foundry directory first.".into())
            }
            DeckhandError::DeploymentFailed { reason } => {
                let lowered = reason.to_lowercase();
                if lowered.contains("artifact not found") {
                    Some("Run `forge build` in the foundry directory first.".into())
                } else if lowered.contains("insufficient funds") {
                    Some("Fund the deployer account, then re-run the deployment.".into())
                } else if lowered.contains("error sending request")
                    || lowered.contains("connection refused")
                {
                    Some("Check that the RPC endpoint is reachable.".into())
                } else {
                    None
                }
            }
            DeckhandError::DecryptionFailed => Some("Re-run and enter the correct password.".into()),
            DeckhandError::NoSigningKey => {
                Some("Run `deckhand account generate` or `deckhand account import`.".into())
            }
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, DeckhandError>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn artifact_not_found_lists_every_probed_path() {
        let err = DeckhandError::ArtifactNotFound {
            contract: "ERC20Token".into(),
            tried: vec![
                PathBuf::from("out/contracts/ERC20.sol/ERC20Token.json"),
                PathBuf::from("out/ERC20.sol/ERC20Token.json"),
            ],
        };
        let rendered = err.to_string();
        assert!(rendered.contains("out/contracts/ERC20.sol/ERC20Token.json"));
        assert!(rendered.contains("out/ERC20.sol/ERC20Token.json"));
    }

    #[test_case("transaction failed: insufficient funds for gas * price + value", "Fund the deployer")]
    #[test_case("Artifact not found for YourContract", "forge build")]
    #[test_case("error sending request for url (http://127.0.0.1:8545/)", "RPC endpoint")]
    fn deployment_failure_remediation_is_substring_matched(reason: &str, expected: &str) {
        let err = DeckhandError::deployment_failed(reason);
        let hint = err.remediation().expect("expected a remediation hint");
        assert!(hint.contains(expected), "hint was: {hint}");
    }

    #[test]
    fn unrecognized_failure_has_no_hint() {
        let err = DeckhandError::deployment_failed("something exotic happened");
        assert!(err.remediation().is_none());
    }
}
