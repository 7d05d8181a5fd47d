use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;

use crate::broadcast::{self, RunOutcome};
use crate::config::DeployConfig;
use crate::errors::{DeckhandError, Result};

const FORGE_BIN: &str = "forge";

#[derive(Debug)]
pub struct ForgeOutcome {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Drives `forge script` for the configured deployment script, then
/// reconciles the broadcast log it leaves behind.
///
/// Once spawned, the process is awaited unconditionally: no cancellation,
/// no separate timeout. Output is relayed line-by-line as it arrives;
/// nothing is parsed until the process terminates.
pub struct ForgeRunner {
    forge_bin: PathBuf,
}

impl ForgeRunner {
    pub fn new() -> Self {
        ForgeRunner { forge_bin: PathBuf::from(FORGE_BIN) }
    }

    /// Points at a specific forge binary instead of resolving from PATH.
    pub fn forge_bin(mut self, path: PathBuf) -> Self {
        self.forge_bin = path;
        self
    }

    pub async fn run_script(
        &self,
        config: &DeployConfig,
        secret_key: &str,
    ) -> Result<ForgeOutcome> {
        let mut child = Command::new(&self.forge_bin)
            .arg("script")
            .arg(&config.script_target)
            .arg("--rpc-url")
            .arg(&config.rpc_url)
            .arg("--broadcast")
            .arg("--private-key")
            .arg(secret_key)
            .arg("--json")
            .current_dir(&config.foundry_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                DeckhandError::deployment_failed(format!(
                    "unable to spawn {}: {}. Is foundry installed?",
                    self.forge_bin.display(),
                    e
                ))
            })?;

        let stdout = child.stdout.take().expect("stdout was piped");
        let stderr = child.stderr.take().expect("stderr was piped");
        let (stdout, stderr) =
            tokio::join!(relay_lines(stdout, false), relay_lines(stderr, true));

        let status = child.wait().await.map_err(|e| {
            DeckhandError::deployment_failed(format!("failed waiting for forge: {}", e))
        })?;

        Ok(ForgeOutcome { exit_code: status.code(), stdout, stderr })
    }

    /// The full external-driver path: run the script, then determine which
    /// contracts actually landed and at what addresses.
    pub async fn deploy(&self, config: &DeployConfig, secret_key: &str) -> Result<RunOutcome> {
        let outcome = self.run_script(config, secret_key).await?;
        let requested: Vec<String> =
            config.contracts.iter().map(|c| c.name.clone()).collect();
        broadcast::reconcile(
            &config.script_log_dir(),
            config.chain_id.as_deref(),
            &requested,
            outcome.exit_code,
        )
    }
}

impl Default for ForgeRunner {
    fn default() -> Self {
        ForgeRunner::new()
    }
}

async fn relay_lines<R: AsyncRead + Unpin>(reader: R, to_stderr: bool) -> String {
    let mut lines = BufReader::new(reader).lines();
    let mut collected = String::new();
    while let Ok(Some(line)) = lines.next_line().await {
        if to_stderr {
            eprintln!("{line}");
        } else {
            println!("{line}");
        }
        collected.push_str(&line);
        collected.push('\n');
    }
    collected
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::RUN_LATEST_FILE;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    // Stands in for forge: prints a line on each stream, writes a broadcast
    // log with one simulated CREATE, and exits with the given code.
    fn fake_forge(dir: &std::path::Path, exit_code: i32, write_log: bool) -> PathBuf {
        let log_block = if write_log {
            r#"
mkdir -p broadcast/DeployAll.s.sol/420420422
cat > broadcast/DeployAll.s.sol/420420422/run-latest.json <<'EOF'
{"transactions":[{"transactionType":"CREATE","contractName":"ERC20Token","contractAddress":"0xED940451B58fDa5c5D1074A687c9a4486D1E8cd7","hash":null}]}
EOF
"#
        } else {
            ""
        };
        let script = format!("#!/bin/sh\necho simulating\necho 'warning: vm quirk' >&2\n{log_block}exit {exit_code}\n");
        let path = dir.join("fake-forge.sh");
        std::fs::write(&path, script).unwrap();
        let mut perms = std::fs::metadata(&path).unwrap().permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&path, perms).unwrap();
        path
    }

    fn test_config(root: &std::path::Path) -> DeployConfig {
        let foundry_dir = root.join("foundry");
        std::fs::create_dir_all(&foundry_dir).unwrap();
        DeployConfig {
            foundry_dir,
            script_target: "script/DeployAll.s.sol:DeployAll".to_string(),
            rpc_url: "http://127.0.0.1:8545".to_string(),
            chain_id: None,
            contracts: vec![crate::config::ContractSpec::new("ERC20Token", Some("ERC20"), &[])],
            env_file: root.join(".env"),
        }
    }

    #[tokio::test]
    async fn captures_streams_and_exit_code() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let runner = ForgeRunner::new().forge_bin(fake_forge(tmp.path(), 0, false));

        let outcome = runner.run_script(&config, "0xkey").await.unwrap();
        assert_eq!(outcome.exit_code, Some(0));
        assert!(outcome.stdout.contains("simulating"));
        assert!(outcome.stderr.contains("vm quirk"));
    }

    #[tokio::test]
    async fn failed_broadcast_with_log_yields_simulated_addresses() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let runner = ForgeRunner::new().forge_bin(fake_forge(tmp.path(), 1, true));

        match runner.deploy(&config, "0xkey").await.unwrap() {
            RunOutcome::Simulated(report) => {
                assert_eq!(report.chain_id, "420420422");
                assert_eq!(
                    report.contracts["ERC20Token"],
                    "0xED940451B58fDa5c5D1074A687c9a4486D1E8cd7"
                );
            }
            other => panic!("expected simulated outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn failed_run_without_log_errors_out() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let runner = ForgeRunner::new().forge_bin(fake_forge(tmp.path(), 1, false));

        let err = runner.deploy(&config, "0xkey").await.unwrap_err();
        assert!(err.to_string().contains("exited with code 1"));
    }

    #[tokio::test]
    async fn clean_run_without_log_reports_no_contracts() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let runner = ForgeRunner::new().forge_bin(fake_forge(tmp.path(), 0, false));

        let outcome = runner.deploy(&config, "0xkey").await.unwrap();
        assert!(matches!(outcome, RunOutcome::NoContracts));
    }

    #[tokio::test]
    async fn missing_binary_is_a_deployment_failure() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(tmp.path());
        let runner = ForgeRunner::new().forge_bin(tmp.path().join("does-not-exist"));

        let err = runner.run_script(&config, "0xkey").await.unwrap_err();
        assert!(err.to_string().contains("unable to spawn"));
    }
}
