// Credential Decryptor Backends
use crate::crypto::{CryptoError, MasterKey};
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Mirror of the backend's own decrypt helper, run with `node -e`.
/// The ciphertext arrives as argv[1], the passphrase via the environment.
pub const NODE_DECRYPT_SCRIPT: &str = r#"
const crypto = require('crypto');
const ALGORITHM = 'aes-256-gcm';
const IV_LENGTH = 16;
const AUTH_TAG_LENGTH = 16;

function getMasterKey() {
  const hash = crypto.createHash('sha256');
  hash.update(process.env.MASTER_ENCRYPTION_KEY);
  return hash.digest();
}

function decrypt(encryptedData) {
  const combined = Buffer.from(encryptedData, 'base64');
  const iv = combined.slice(0, IV_LENGTH);
  const authTag = combined.slice(-AUTH_TAG_LENGTH);
  const encrypted = combined.slice(IV_LENGTH, -AUTH_TAG_LENGTH);
  const decipher = crypto.createDecipheriv(ALGORITHM, getMasterKey(), iv);
  decipher.setAuthTag(authTag);
  let decrypted = decipher.update(encrypted, null, 'utf8');
  decrypted += decipher.final('utf8');
  return decrypted;
}

console.log(decrypt(process.argv[1]));
"#;

/// PATH handed to the child; nothing else from our environment leaks through.
pub const NODE_PATH_ENV: &str = "/usr/local/bin:/usr/bin:/bin";

#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("MASTER_ENCRYPTION_KEY is not set")]
    MissingMasterKey,
    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exited with status {code:?}: {stderr}")]
    ProcessFailed {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },
}

#[async_trait]
pub trait SecretDecryptor: Send + Sync {
    fn name(&self) -> &'static str;

    async fn decrypt(&self, encrypted: &str) -> Result<String, DecryptError>;
}

// ==================== IN-PROCESS ====================
pub struct InProcessDecryptor {
    key: Option<MasterKey>,
}

impl InProcessDecryptor {
    pub fn new(passphrase: Option<&str>) -> Self {
        Self {
            key: passphrase.map(MasterKey::derive),
        }
    }
}

#[async_trait]
impl SecretDecryptor for InProcessDecryptor {
    fn name(&self) -> &'static str {
        "in-process"
    }

    async fn decrypt(&self, encrypted: &str) -> Result<String, DecryptError> {
        let key = self.key.as_ref().ok_or(DecryptError::MissingMasterKey)?;
        Ok(key.decrypt_string(encrypted)?)
    }
}

// ==================== NODE SUBPROCESS ====================
pub struct NodeDecryptor {
    pub program: String,
    pub master_key: Option<String>,
    pub workdir: PathBuf,
    pub timeout: Duration,
}

#[async_trait]
impl SecretDecryptor for NodeDecryptor {
    fn name(&self) -> &'static str {
        "node"
    }

    async fn decrypt(&self, encrypted: &str) -> Result<String, DecryptError> {
        let master_key = self
            .master_key
            .as_deref()
            .ok_or(DecryptError::MissingMasterKey)?;

        tracing::debug!(
            "Spawning {} in {} (timeout {:?})",
            self.program,
            self.workdir.display(),
            self.timeout
        );

        let child = tokio::process::Command::new(&self.program)
            .arg("-e")
            .arg(NODE_DECRYPT_SCRIPT)
            .arg(encrypted)
            .current_dir(&self.workdir)
            .env_clear()
            .env("MASTER_ENCRYPTION_KEY", master_key)
            .env("PATH", NODE_PATH_ENV)
            .kill_on_drop(true)
            .output();

        let output = tokio::time::timeout(self.timeout, child)
            .await
            .map_err(|_| DecryptError::Timeout {
                program: self.program.clone(),
                timeout: self.timeout,
            })?
            .map_err(|source| DecryptError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(DecryptError::ProcessFailed {
                program: self.program.clone(),
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}
