use std::path::{Path, PathBuf};
use std::time::SystemTime;

use indexmap::IndexMap;

use crate::config::PRIORITY_CHAIN_IDS;
use crate::errors::{DeckhandError, Result};

pub const RUN_LATEST_FILE: &str = "run-latest.json";

/// Contract name → deployed (or simulated) address, in log order.
pub type DeployedContracts = IndexMap<String, String>;

/// The `broadcast/<script>/<chainId>/run-latest.json` payload written by
/// `forge script`. Presence checks only, no schema validation.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastLog {
    #[serde(default)]
    pub transactions: Vec<BroadcastTransaction>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastTransaction {
    pub transaction_type: TransactionType,
    #[serde(default)]
    pub contract_name: Option<String>,
    #[serde(default)]
    pub contract_address: Option<String>,
    /// Present only when the transaction was actually submitted. This is the
    /// sole signal distinguishing a broadcast from a simulation.
    #[serde(default)]
    pub hash: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Create,
    Create2,
    Call,
    #[serde(other)]
    Other,
}

impl BroadcastTransaction {
    fn is_deployment(&self) -> bool {
        matches!(self.transaction_type, TransactionType::Create | TransactionType::Create2)
            && self.contract_name.is_some()
            && self.contract_address.is_some()
    }
}

/// How the scanned run is classified.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunStatus {
    /// Every requested CREATE carries a transaction hash.
    Confirmed,
    /// The log exists but at least one requested CREATE was only simulated.
    /// Downgraded to a warning: the simulated addresses are still reported.
    Simulated,
}

#[derive(Clone, Debug)]
pub struct BroadcastReport {
    pub chain_id: String,
    pub log_path: PathBuf,
    pub status: RunStatus,
    pub contracts: DeployedContracts,
}

/// Outcome of reconciling a deployment run: the broadcast log combined with
/// the driver's exit status.
#[derive(Clone, Debug)]
pub enum RunOutcome {
    Confirmed(BroadcastReport),
    Simulated(BroadcastReport),
    /// The driver exited cleanly but left no log for any recognized chain id.
    /// Degraded mode: nothing to report, not a failure.
    NoContracts,
}

/// Locates the most recent run log under `broadcast/<script>/`.
///
/// An explicit chain id wins. Otherwise the hardcoded priority list is
/// checked first, then any other chain directory present, most recently
/// modified first.
pub fn find_run_log(script_log_dir: &Path, chain_id: Option<&str>) -> Option<(String, PathBuf)> {
    if let Some(chain_id) = chain_id {
        let candidate = script_log_dir.join(chain_id).join(RUN_LATEST_FILE);
        return candidate.exists().then(|| (chain_id.to_string(), candidate));
    }

    for chain_id in PRIORITY_CHAIN_IDS {
        let candidate = script_log_dir.join(chain_id).join(RUN_LATEST_FILE);
        if candidate.exists() {
            return Some((chain_id.to_string(), candidate));
        }
    }

    let mut remaining: Vec<(String, SystemTime)> = std::fs::read_dir(script_log_dir)
        .ok()?
        .flatten()
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| {
            let name = entry.file_name().to_string_lossy().into_owned();
            if PRIORITY_CHAIN_IDS.contains(&name.as_str()) {
                return None;
            }
            let modified = entry.metadata().ok()?.modified().ok()?;
            Some((name, modified))
        })
        .collect();
    remaining.sort_by(|a, b| b.1.cmp(&a.1));

    for (chain_id, _) in remaining {
        let candidate = script_log_dir.join(&chain_id).join(RUN_LATEST_FILE);
        if candidate.exists() {
            return Some((chain_id, candidate));
        }
    }
    None
}

pub fn parse_log(path: &Path) -> Result<BroadcastLog> {
    let bytes = std::fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(|e| {
        DeckhandError::Config(format!("invalid broadcast log at {}: {}", path.display(), e))
    })
}

/// Scans the run log and classifies it. `requested` narrows which contract
/// names participate in the confirmed/simulated classification; an empty
/// slice means every deployment entry counts.
///
/// Later CREATE entries for the same name overwrite earlier ones: last
/// write wins, in log order.
pub fn scan(
    script_log_dir: &Path,
    chain_id: Option<&str>,
    requested: &[String],
) -> Result<Option<BroadcastReport>> {
    let Some((chain_id, log_path)) = find_run_log(script_log_dir, chain_id) else {
        return Ok(None);
    };
    let log = parse_log(&log_path)?;

    let mut contracts = DeployedContracts::new();
    let mut status = RunStatus::Confirmed;
    for tx in &log.transactions {
        if !tx.is_deployment() {
            continue;
        }
        let name = tx.contract_name.as_ref().unwrap();
        let address = tx.contract_address.as_ref().unwrap();
        let is_requested = requested.is_empty() || requested.iter().any(|r| r == name);
        if !is_requested {
            continue;
        }
        contracts.insert(name.clone(), address.clone());
        if tx.hash.is_none() {
            status = RunStatus::Simulated;
        }
    }

    Ok(Some(BroadcastReport { chain_id, log_path, status, contracts }))
}

/// Combines the scan with the driver's exit status, per the reconciliation
/// policy:
/// - a usable log always wins, even when the driver exited non-zero
///   (remote-execution quirks can fail the broadcast after a successful
///   simulation);
/// - no log + non-zero exit is an outright failure;
/// - no log + clean exit degrades to an empty report.
pub fn reconcile(
    script_log_dir: &Path,
    chain_id: Option<&str>,
    requested: &[String],
    exit_code: Option<i32>,
) -> Result<RunOutcome> {
    match scan(script_log_dir, chain_id, requested)? {
        Some(report) => Ok(match report.status {
            RunStatus::Confirmed => RunOutcome::Confirmed(report),
            RunStatus::Simulated => RunOutcome::Simulated(report),
        }),
        None => match exit_code {
            Some(0) => Ok(RunOutcome::NoContracts),
            code => Err(DeckhandError::deployment_failed(format!(
                "forge script exited with code {} and left no broadcast log",
                code.map(|c| c.to_string()).unwrap_or_else(|| "unknown".to_string())
            ))),
        },
    }
}
