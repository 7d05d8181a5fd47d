use clap::{ArgAction, Parser, Subcommand};
use hiro_system_kit::{self, Logger};
use std::process;

mod accounts;
mod deployments;

#[derive(Clone)]
pub struct Context {
    pub logger: Option<Logger>,
    pub tracer: bool,
}

#[allow(dead_code)]
impl Context {
    pub fn empty() -> Context {
        Context { logger: None, tracer: false }
    }

    pub fn try_log<F>(&self, closure: F)
    where
        F: FnOnce(&Logger),
    {
        if let Some(ref logger) = self.logger {
            closure(logger)
        }
    }

    pub fn expect_logger(&self) -> &Logger {
        self.logger.as_ref().unwrap()
    }
}

#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Opts {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
enum Command {
    /// Deploy the project's contracts and regenerate the consumer manifest
    #[clap(name = "deploy", bin_name = "deploy")]
    Deploy(DeployCommand),
    /// Rebuild the consumer manifest from broadcast logs or known addresses
    #[clap(name = "reconcile", bin_name = "reconcile")]
    Reconcile(ReconcileCommand),
    /// Deployer account management
    #[clap(subcommand, name = "account", bin_name = "account")]
    Account(AccountCommand),
}

#[derive(Subcommand, PartialEq, Clone, Debug)]
pub enum AccountCommand {
    /// Generate a new deployer key, encrypt it and store it in the env file
    #[clap(name = "generate", bin_name = "generate")]
    Generate(AccountArgs),
    /// Import an existing private key, encrypt it and store it in the env file
    #[clap(name = "import", bin_name = "import")]
    Import(AccountArgs),
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct DeployCommand {
    /// Path to the project manifest
    #[arg(long = "manifest-file-path", short = 'm', default_value = "./deckhand.yml")]
    pub manifest_path: String,
    /// Network to target, from those configured in the manifest
    #[arg(long = "network")]
    pub network: Option<String>,
    /// RPC endpoint override
    #[arg(long = "rpc-url")]
    pub rpc_url: Option<String>,
    /// Chain id override, for networks whose id cannot be discovered
    #[arg(long = "chain-id")]
    pub chain_id: Option<String>,
    /// Deploy straight from compiled artifacts over RPC instead of running
    /// the forge deployment script
    #[arg(long = "direct", action = ArgAction::SetTrue)]
    pub direct: bool,
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct ReconcileCommand {
    /// Path to the project manifest
    #[arg(long = "manifest-file-path", short = 'm', default_value = "./deckhand.yml")]
    pub manifest_path: String,
    /// Chain id to reconcile; discovered from broadcast logs when omitted
    #[arg(long = "chain-id")]
    pub chain_id: Option<String>,
    /// Known deployed address, as Name=0x… (repeatable). Skips log scanning
    #[arg(long = "address")]
    pub addresses: Vec<String>,
}

#[derive(Parser, PartialEq, Clone, Debug)]
pub struct AccountArgs {
    /// Path to the env file holding the encrypted deployer key
    #[arg(long = "env-file", default_value = "./.env")]
    pub env_file: String,
}

pub fn main() {
    let logger = hiro_system_kit::log::setup_logger();
    let _guard = hiro_system_kit::log::setup_global_logger(logger.clone());
    let ctx = Context { logger: Some(logger), tracer: false };

    let opts: Opts = match Opts::try_parse() {
        Ok(opts) => opts,
        Err(e) => {
            println!("{}", e);
            process::exit(1);
        }
    };

    match hiro_system_kit::nestable_block_on(handle_command(opts, &ctx)) {
        Err(e) => {
            error!(ctx.expect_logger(), "{e}");
            std::thread::sleep(std::time::Duration::from_millis(500));
            process::exit(1);
        }
        Ok(_) => {}
    }
}

async fn handle_command(opts: Opts, ctx: &Context) -> Result<(), String> {
    match opts.command {
        Command::Deploy(cmd) => {
            deployments::handle_deploy_command(&cmd, ctx).await?;
        }
        Command::Reconcile(cmd) => {
            deployments::handle_reconcile_command(&cmd, ctx).await?;
        }
        Command::Account(AccountCommand::Generate(cmd)) => {
            accounts::handle_generate_command(&cmd, ctx)?;
        }
        Command::Account(AccountCommand::Import(cmd)) => {
            accounts::handle_import_command(&cmd, ctx)?;
        }
    }
    Ok(())
}
