use std::path::Path;

use deckhand_core::config::{ENCRYPTED_KEY_ENV, RUNTIME_KEY_ENV};
use deckhand_core::env_file::EnvFile;
use deckhand_core::wallet;
use deckhand_core::PrivateKeySigner;
use dialoguer::{Input, Password};

use super::{AccountArgs, Context};

const IMPORT_ATTEMPTS: usize = 3;

pub fn handle_generate_command(cmd: &AccountArgs, ctx: &Context) -> Result<(), String> {
    let signer = wallet::generate_signer();
    encrypt_and_store(&cmd.env_file, signer, ctx)
}

pub fn handle_import_command(cmd: &AccountArgs, ctx: &Context) -> Result<(), String> {
    let signer = prompt_private_key()?;
    encrypt_and_store(&cmd.env_file, signer, ctx)
}

fn encrypt_and_store(env_file: &str, signer: PrivateKeySigner, ctx: &Context) -> Result<(), String> {
    let mut env_file = EnvFile::load(Path::new(env_file)).map_err(|e| e.to_string())?;
    if env_file.get(ENCRYPTED_KEY_ENV).is_some() {
        println!(
            "{}",
            format_warn!(format!(
                "{} is already set in {}. Delete that entry first to replace the key",
                ENCRYPTED_KEY_ENV,
                env_file.path().display()
            ))
        );
        return Ok(());
    }

    let password = Password::new()
        .with_prompt("Choose a password to encrypt the deployer key")
        .with_confirmation("Confirm password", "Passwords do not match")
        .interact()
        .map_err(|e| format!("password prompt failed: {}", e))?;

    let address = signer.address();
    let keystore_json =
        wallet::encrypt_signer(&signer, &password).map_err(|e| e.to_string())?;
    wallet::store_encrypted_key(&mut env_file, &keystore_json).map_err(|e| e.to_string())?;

    info!(ctx.expect_logger(), "encrypted keystore stored in {}", env_file.path().display());
    println!("{} {}", green!("Deployer account:"), address);
    println!(
        "{}",
        format_note!(
            "fund this address, then run `deckhand deploy`. The password will be asked for again at deploy time"
        )
    );
    println!(
        "{}",
        format_note!(format!(
            "for non-interactive runs, export {} with the plaintext key instead",
            RUNTIME_KEY_ENV
        ))
    );
    Ok(())
}

fn prompt_private_key() -> Result<PrivateKeySigner, String> {
    for _ in 0..IMPORT_ATTEMPTS {
        let raw: String = Input::new()
            .with_prompt("Paste the private key to import (0x-prefixed)")
            .interact_text()
            .map_err(|e| format!("key prompt failed: {}", e))?;
        match wallet::signer_from_secret_key(&raw) {
            Ok(signer) => return Ok(signer),
            Err(e) => println!("{}", format_err!(e.to_string())),
        }
    }
    Err("too many invalid attempts, aborting".to_string())
}
