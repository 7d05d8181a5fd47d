use std::path::{Path, PathBuf};

use deckhand_core::broadcast::{DeployedContracts, RunOutcome};
use deckhand_core::config::{DeployConfig, ProjectManifest, DEFAULT_RPC_URL, DEV_SECRET_KEY};
use deckhand_core::deploy::ContractDeployer;
use deckhand_core::env_file::EnvFile;
use deckhand_core::errors::DeckhandError;
use deckhand_core::forge::ForgeRunner;
use deckhand_core::manifest::{self, JsonManifestSink, ManifestSink};
use deckhand_core::wallet;
use deckhand_core::{format_ether, PrivateKeySigner};
use dialoguer::Password;

use super::{Context, DeployCommand, ReconcileCommand};

pub async fn handle_deploy_command(cmd: &DeployCommand, ctx: &Context) -> Result<(), String> {
    let (config, project_root) = load_config(
        &cmd.manifest_path,
        cmd.network.as_deref(),
        cmd.rpc_url.as_deref(),
        cmd.chain_id.as_deref(),
    )?;

    info!(
        ctx.expect_logger(),
        "deploying {} contract(s) via {}",
        config.contracts.len(),
        config.rpc_url
    );

    let reconciled = if cmd.direct {
        deploy_direct(&config).await?
    } else {
        deploy_with_forge(&config).await?
    };

    let Some((chain_id, contracts)) = reconciled else {
        println!("{}", format_warn!("nothing deployed, manifest left untouched"));
        return Ok(());
    };

    publish_manifest(&config, &project_root, &chain_id, &contracts)
}

pub async fn handle_reconcile_command(
    cmd: &ReconcileCommand,
    ctx: &Context,
) -> Result<(), String> {
    let (config, project_root) =
        load_config(&cmd.manifest_path, None, None, cmd.chain_id.as_deref())?;

    info!(ctx.expect_logger(), "reconciling deployment state");

    let (chain_id, contracts) = if !cmd.addresses.is_empty() {
        let chain_id = config
            .chain_id
            .clone()
            .ok_or_else(|| "--chain-id is required when passing --address".to_string())?;
        (chain_id, parse_address_pairs(&cmd.addresses)?)
    } else {
        let requested: Vec<String> = config.contracts.iter().map(|c| c.name.clone()).collect();
        let outcome = deckhand_core::broadcast::reconcile(
            &config.script_log_dir(),
            config.chain_id.as_deref(),
            &requested,
            Some(0),
        )
        .map_err(|e| render_error(&e))?;
        match outcome {
            RunOutcome::Confirmed(report) => (report.chain_id, report.contracts),
            RunOutcome::Simulated(report) => {
                println!(
                    "{}",
                    format_warn!("broadcast log holds simulated addresses only; they may not match the chain")
                );
                (report.chain_id, report.contracts)
            }
            RunOutcome::NoContracts => {
                println!(
                    "{}",
                    format_warn!(format!(
                        "no broadcast log found under {}; nothing to reconcile",
                        config.script_log_dir().display()
                    ))
                );
                return Ok(());
            }
        }
    };

    publish_manifest(&config, &project_root, &chain_id, &contracts)
}

async fn deploy_with_forge(
    config: &DeployConfig,
) -> Result<Option<(String, DeployedContracts)>, String> {
    let secret_key = resolve_forge_key(config)?;
    let outcome =
        ForgeRunner::new().deploy(config, &secret_key).await.map_err(|e| render_error(&e))?;

    match outcome {
        RunOutcome::Confirmed(report) => {
            for (name, address) in &report.contracts {
                println!("{} {} deployed to {}", green!("✓"), name, address);
            }
            Ok(Some((report.chain_id, report.contracts)))
        }
        RunOutcome::Simulated(report) => {
            println!(
                "{}",
                format_warn!("broadcast failed, but simulation succeeded. Extracting simulated addresses")
            );
            for (name, address) in &report.contracts {
                println!("{} {} simulated at {}", yellow!("!"), name, address);
            }
            println!(
                "{}",
                format_note!("the addresses above are from simulation and may not be on-chain")
            );
            Ok(Some((report.chain_id, report.contracts)))
        }
        RunOutcome::NoContracts => {
            println!(
                "{}",
                format_warn!("forge exited cleanly but left no broadcast log for any recognized chain id")
            );
            Ok(None)
        }
    }
}

async fn deploy_direct(
    config: &DeployConfig,
) -> Result<Option<(String, DeployedContracts)>, String> {
    let signer = resolve_signer(config)?;
    let deployer = ContractDeployer::new(config, signer).map_err(|e| render_error(&e))?;

    println!("Deploying with account {}", deployer.deployer_address());
    let balance = deployer.balance().await.map_err(|e| render_error(&e))?;
    println!("Account balance: {}\n", format_ether(balance));
    if balance.is_zero() {
        println!("{}", format_warn!("deployer account has zero balance; fund it before deploying"));
    }

    let mut contracts = DeployedContracts::new();
    for spec in &config.contracts {
        println!("Deploying {}...", spec.name);
        let deployed = deployer.deploy(spec).await.map_err(|e| render_error(&e))?;
        println!("{} {} deployed to {}", green!("✓"), deployed.name, deployed.address);
        contracts.insert(deployed.name, deployed.address.to_string());
    }

    let chain_id = match &config.chain_id {
        Some(chain_id) => chain_id.clone(),
        None => deployer.chain_id().await.map_err(|e| render_error(&e))?.to_string(),
    };
    Ok(Some((chain_id, contracts)))
}

fn publish_manifest(
    config: &DeployConfig,
    project_root: &Path,
    chain_id: &str,
    contracts: &DeployedContracts,
) -> Result<(), String> {
    let locator = config.artifact_locator();
    let entries = manifest::build_entries(&locator, contracts).map_err(|e| render_error(&e))?;
    let sink = JsonManifestSink::new(project_root);
    let path = sink.publish(chain_id, &entries).map_err(|e| render_error(&e))?;
    println!(
        "{} {} (chain id {}, {} contract(s))",
        green!("Manifest written:"),
        path.display(),
        chain_id,
        entries.len()
    );
    Ok(())
}

fn load_config(
    manifest_path: &str,
    network: Option<&str>,
    rpc_url: Option<&str>,
    chain_id: Option<&str>,
) -> Result<(DeployConfig, PathBuf), String> {
    let manifest_path = Path::new(manifest_path);
    let project_root =
        manifest_path.parent().filter(|p| !p.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let manifest =
        ProjectManifest::load_or_default(manifest_path).map_err(|e| render_error(&e))?;
    let config = DeployConfig::from_manifest(&manifest, project_root, network, rpc_url, chain_id)
        .map_err(|e| render_error(&e))?;
    Ok((config, project_root.to_path_buf()))
}

fn resolve_signer(config: &DeployConfig) -> Result<PrivateKeySigner, String> {
    let env_file = EnvFile::load(&config.env_file).map_err(|e| render_error(&e))?;
    match wallet::resolve_deployer(&env_file, prompt_password) {
        Ok(signer) => Ok(signer),
        Err(DeckhandError::NoSigningKey) if config.rpc_url == DEFAULT_RPC_URL => {
            println!(
                "{}",
                format_warn!("no deployer key configured; falling back to the well-known local dev key")
            );
            wallet::signer_from_secret_key(DEV_SECRET_KEY).map_err(|e| render_error(&e))
        }
        Err(e) => Err(render_error(&e)),
    }
}

fn resolve_forge_key(config: &DeployConfig) -> Result<String, String> {
    let signer = resolve_signer(config)?;
    Ok(wallet::secret_key_hex(&signer))
}

fn prompt_password() -> deckhand_core::Result<String> {
    Password::new()
        .with_prompt("Enter password to decrypt the deployer key")
        .interact()
        .map_err(|e| DeckhandError::Config(format!("password prompt failed: {}", e)))
}

fn parse_address_pairs(raw: &[String]) -> Result<DeployedContracts, String> {
    let mut contracts = DeployedContracts::new();
    for pair in raw {
        let (name, address) = pair
            .split_once('=')
            .ok_or_else(|| format!("invalid --address '{}', expected Name=0x…", pair))?;
        contracts.insert(name.trim().to_string(), address.trim().to_string());
    }
    Ok(contracts)
}

fn render_error(e: &DeckhandError) -> String {
    match e.remediation() {
        Some(hint) => format!("{e}\n{}", format_note!(hint)),
        None => e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn address_pairs_parse_into_an_ordered_map() {
        let raw = vec![
            "ERC20Token=0xED940451B58fDa5c5D1074A687c9a4486D1E8cd7".to_string(),
            "YourContract = 0x08Fc69fF90c71037B3Cfc57a893B4da079B8EbBE".to_string(),
        ];
        let contracts = parse_address_pairs(&raw).unwrap();
        assert_eq!(contracts.len(), 2);
        assert_eq!(
            contracts.get_index(0).unwrap().0,
            "ERC20Token"
        );
        assert_eq!(
            contracts["YourContract"],
            "0x08Fc69fF90c71037B3Cfc57a893B4da079B8EbBE"
        );
    }

    #[test]
    fn malformed_address_pair_is_rejected() {
        let raw = vec!["ERC20Token".to_string()];
        let err = parse_address_pairs(&raw).unwrap_err();
        assert!(err.contains("expected Name=0x"));
    }

    #[test]
    fn remediated_errors_carry_the_hint() {
        let err = DeckhandError::deployment_failed("insufficient funds for gas");
        let rendered = render_error(&err);
        assert!(rendered.contains("insufficient funds"));
        assert!(rendered.contains("Fund the deployer account"));
    }
}
