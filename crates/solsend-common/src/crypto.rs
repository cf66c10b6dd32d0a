//! Keypair loading and the base58 → JSON key conversion.

use {
    crate::errors::{Error, Result},
    serde::{Deserialize, Serialize},
    solana_sdk::{
        pubkey::Pubkey,
        signature::{Keypair, Signer},
    },
    std::{
        fs,
        io::Write,
        path::{Path, PathBuf},
    },
    tracing::{debug, info},
};

pub const KEYPAIR_LENGTH: usize = 64;

/// On-disk keypair format: `{"privateKey": [64 integers]}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeypairFile {
    #[serde(rename = "privateKey")]
    pub private_key: Vec<u8>,
}

impl KeypairFile {
    pub fn new(keypair: &Keypair) -> Self {
        Self {
            private_key: keypair.to_bytes().to_vec(),
        }
    }

    pub fn to_keypair(&self) -> Result<Keypair> {
        keypair_from_bytes(&self.private_key)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::KeyFormat(format!("failed to encode keypair JSON: {}", e)))
    }
}

/// Outcome of a base58 key conversion
#[derive(Debug, Clone)]
pub struct ConvertedKey {
    pub keypair_base58: String,
    pub pubkey: Pubkey,
    pub written: Vec<PathBuf>,
}

/// Build a keypair from 32 secret seed bytes followed by 32 public key bytes.
pub fn keypair_from_bytes(bytes: &[u8]) -> Result<Keypair> {
    if bytes.len() != KEYPAIR_LENGTH {
        return Err(Error::KeyFormat(format!(
            "expected {} bytes, got {}",
            KEYPAIR_LENGTH,
            bytes.len()
        )));
    }
    Keypair::from_bytes(bytes).map_err(|e| Error::KeyFormat(format!("invalid keypair bytes: {}", e)))
}

pub fn keypair_from_base58(encoded: &str) -> Result<Keypair> {
    let bytes = bs58::decode(encoded.trim())
        .into_vec()
        .map_err(|e| Error::KeyFormat(format!("failed to decode base58: {}", e)))?;
    keypair_from_bytes(&bytes)
}

pub fn load_keypair_file<P: AsRef<Path>>(path: P) -> Result<Keypair> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;
    let file: KeypairFile = serde_json::from_str(&contents)
        .map_err(|e| Error::KeyFormat(format!("{}: {}", path.display(), e)))?;
    let keypair = file.to_keypair()?;
    debug!("Loaded keypair {} from {}", keypair.pubkey(), path.display());
    Ok(keypair)
}

pub fn write_keypair_file<P: AsRef<Path>>(path: P, keypair: &Keypair) -> Result<()> {
    let json = KeypairFile::new(keypair).to_json()?;
    write_private(path.as_ref(), json.as_bytes())
}

fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path)?;
    file.write_all(contents)?;
    Ok(())
}

/// Decode a base58 secret key and store it as a JSON keypair file.
///
/// The key is written to `output`. When `output` is not `default_file`, an
/// identical copy is written to `default_file` as well.
pub fn convert_base58_key(
    encoded: &str,
    output: impl AsRef<Path>,
    default_file: impl AsRef<Path>,
) -> Result<ConvertedKey> {
    let output = output.as_ref();
    let default_file = default_file.as_ref();

    let keypair = keypair_from_base58(encoded)?;
    let json = KeypairFile::new(&keypair).to_json()?;

    let mut written = Vec::with_capacity(2);
    write_private(output, json.as_bytes())?;
    written.push(output.to_path_buf());
    info!("Keypair written to {}", output.display());

    if output != default_file {
        write_private(default_file, json.as_bytes())?;
        written.push(default_file.to_path_buf());
        info!("Keypair copy written to {}", default_file.display());
    }

    Ok(ConvertedKey {
        keypair_base58: keypair.to_base58_string(),
        pubkey: keypair.pubkey(),
        written,
    })
}
