use alloy_signer_local::PrivateKeySigner;

use crate::config::{ENCRYPTED_KEY_ENV, RUNTIME_KEY_ENV};
use crate::env_file::EnvFile;
use crate::errors::{DeckhandError, Result};

pub fn generate_signer() -> PrivateKeySigner {
    PrivateKeySigner::random()
}

pub fn signer_from_secret_key(raw: &str) -> Result<PrivateKeySigner> {
    raw.trim()
        .parse::<PrivateKeySigner>()
        .map_err(|_| DeckhandError::Config("invalid private key format".to_string()))
}

/// The 0x-prefixed hex secret key, in the form `forge script --private-key`
/// accepts.
pub fn secret_key_hex(signer: &PrivateKeySigner) -> String {
    format!("0x{}", alloy::hex::encode(signer.to_bytes()))
}

/// Password-encrypts the signer into a Web3 keystore JSON document.
///
/// The keystore machinery only writes to disk, so the document round-trips
/// through a scratch directory before landing in the env file.
pub fn encrypt_signer(signer: &PrivateKeySigner, password: &str) -> Result<String> {
    let scratch = tempfile::tempdir()?;
    let (_, file_name) = PrivateKeySigner::encrypt_keystore(
        scratch.path(),
        &mut rand::thread_rng(),
        signer.to_bytes(),
        password,
        None,
    )
    .map_err(|e| DeckhandError::Config(format!("failed to encrypt keystore: {}", e)))?;
    let json = std::fs::read_to_string(scratch.path().join(file_name))?;
    Ok(json)
}

pub fn decrypt_keystore_json(keystore_json: &str, password: &str) -> Result<PrivateKeySigner> {
    let scratch = tempfile::tempdir()?;
    let path = scratch.path().join("keystore.json");
    std::fs::write(&path, keystore_json)?;
    PrivateKeySigner::decrypt_keystore(&path, password).map_err(|_| DeckhandError::DecryptionFailed)
}

/// Persists the encrypted key, refusing to overwrite an existing one.
pub fn store_encrypted_key(env_file: &mut EnvFile, keystore_json: &str) -> Result<()> {
    if env_file.get(ENCRYPTED_KEY_ENV).is_some() {
        return Err(DeckhandError::Config(format!(
            "a deployer key is already stored in {}. Delete the {} entry first to replace it",
            env_file.path().display(),
            ENCRYPTED_KEY_ENV
        )));
    }
    env_file.set(ENCRYPTED_KEY_ENV, keystore_json);
    env_file.save()
}

/// Resolves the deployer signer: plaintext process-environment override
/// first, then the encrypted keystore stored in the env file (password
/// supplied by the caller, typically an interactive prompt). No credential
/// source at all is a setup error.
pub fn resolve_deployer<F>(env_file: &EnvFile, prompt_password: F) -> Result<PrivateKeySigner>
where
    F: FnOnce() -> Result<String>,
{
    if let Ok(raw) = std::env::var(RUNTIME_KEY_ENV) {
        return signer_from_secret_key(&raw);
    }
    if let Some(keystore_json) = env_file.get(ENCRYPTED_KEY_ENV) {
        let password = prompt_password()?;
        return decrypt_keystore_json(keystore_json, &password);
    }
    Err(DeckhandError::NoSigningKey)
}
