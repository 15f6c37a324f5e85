//! At-rest encryption for locally held escrow keypairs.
//!
//! Blob layout is `nonce ‖ ciphertext` with a fresh random 96-bit nonce per
//! encryption. The vault also resolves a stored [`SignerRef`] into the
//! signer the chain client needs; whether a signer is local or custodial is
//! decided by the stored tag, never inferred from the payload.

use crate::{ChainError, ChainResult};
use aes_gcm::{
    aead::{Aead, AeadCore, KeyInit, OsRng},
    Aes256Gcm, Key, Nonce,
};
use covenant_protocol_core::SignerRef;
use sha2::{Digest, Sha256};
use solana_sdk::{pubkey::Pubkey, signature::Keypair, signer::Signer};

const NONCE_LEN: usize = 12;

/// A signer the chain client can transfer with. `Local` holds the decrypted
/// escrow keypair; `Custodial` defers signing to the external custodian.
pub enum EscrowSigner {
    Local(Keypair),
    Custodial {
        wallet_id: String,
        escrow_pubkey: Pubkey,
    },
}

impl EscrowSigner {
    pub fn pubkey(&self) -> Pubkey {
        match self {
            EscrowSigner::Local(keypair) => keypair.pubkey(),
            EscrowSigner::Custodial { escrow_pubkey, .. } => *escrow_pubkey,
        }
    }
}

/// AES-256-GCM wrapper around escrow keypair material.
pub struct SecretVault {
    cipher: Aes256Gcm,
}

impl SecretVault {
    /// Build a vault from a hex-encoded 32-byte key.
    pub fn from_hex_key(hex_key: &str) -> ChainResult<Self> {
        let bytes = hex::decode(hex_key)
            .map_err(|e| ChainError::Vault(format!("vault key is not hex: {e}")))?;
        if bytes.len() != 32 {
            return Err(ChainError::Vault(format!(
                "vault key must be 32 bytes, got {}",
                bytes.len()
            )));
        }
        Ok(Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&bytes)),
        })
    }

    /// Build a vault from a passphrase, key = SHA-256(passphrase).
    pub fn from_passphrase(passphrase: &str) -> Self {
        let digest = Sha256::digest(passphrase.as_bytes());
        Self {
            cipher: Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&digest)),
        }
    }

    /// Encrypt a keypair into a `nonce ‖ ciphertext` blob.
    pub fn encrypt(&self, keypair: &Keypair) -> ChainResult<Vec<u8>> {
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, keypair.to_bytes().as_ref())
            .map_err(|_| ChainError::Vault("encryption failed".to_string()))?;
        let mut blob = nonce.to_vec();
        blob.extend_from_slice(&ciphertext);
        Ok(blob)
    }

    /// Decrypt a blob produced by [`SecretVault::encrypt`].
    pub fn decrypt(&self, blob: &[u8]) -> ChainResult<Keypair> {
        if blob.len() <= NONCE_LEN {
            return Err(ChainError::Vault("ciphertext blob too short".to_string()));
        }
        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| ChainError::Vault("decryption failed".to_string()))?;
        Keypair::from_bytes(&plaintext)
            .map_err(|e| ChainError::Vault(format!("decrypted blob is not a keypair: {e}")))
    }

    /// Resolve a stored signer reference into a usable signer. A decrypted
    /// local keypair must match the escrow pubkey it claims to control.
    pub fn resolve_signer(
        &self,
        signer_ref: &SignerRef,
        escrow_pubkey: &Pubkey,
    ) -> ChainResult<EscrowSigner> {
        match signer_ref {
            SignerRef::Local { ciphertext } => {
                let keypair = self.decrypt(ciphertext)?;
                if keypair.pubkey() != *escrow_pubkey {
                    return Err(ChainError::Vault(format!(
                        "decrypted keypair {} does not control escrow {}",
                        keypair.pubkey(),
                        escrow_pubkey
                    )));
                }
                Ok(EscrowSigner::Local(keypair))
            }
            SignerRef::Custodial { wallet_id } => Ok(EscrowSigner::Custodial {
                wallet_id: wallet_id.clone(),
                escrow_pubkey: *escrow_pubkey,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt_round_trip() {
        let vault = SecretVault::from_passphrase("correct horse battery staple");
        let keypair = Keypair::new();

        let blob = vault.encrypt(&keypair).unwrap();
        let restored = vault.decrypt(&blob).unwrap();
        assert_eq!(restored.to_bytes(), keypair.to_bytes());
    }

    #[test]
    fn test_nonce_is_fresh_per_encryption() {
        let vault = SecretVault::from_passphrase("p");
        let keypair = Keypair::new();
        let a = vault.encrypt(&keypair).unwrap();
        let b = vault.encrypt(&keypair).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails_closed() {
        let keypair = Keypair::new();
        let blob = SecretVault::from_passphrase("a").encrypt(&keypair).unwrap();
        assert!(SecretVault::from_passphrase("b").decrypt(&blob).is_err());
    }

    #[test]
    fn test_hex_key_length_enforced() {
        assert!(SecretVault::from_hex_key("deadbeef").is_err());
        assert!(SecretVault::from_hex_key("zz").is_err());
        let key = "00".repeat(32);
        assert!(SecretVault::from_hex_key(&key).is_ok());
    }

    #[test]
    fn test_resolve_signer_checks_escrow_ownership() {
        let vault = SecretVault::from_passphrase("p");
        let keypair = Keypair::new();
        let escrow = keypair.pubkey();
        let signer_ref = SignerRef::Local {
            ciphertext: vault.encrypt(&keypair).unwrap(),
        };

        assert!(matches!(
            vault.resolve_signer(&signer_ref, &escrow).unwrap(),
            EscrowSigner::Local(_)
        ));
        assert!(vault
            .resolve_signer(&signer_ref, &Pubkey::new_unique())
            .is_err());
    }

    #[test]
    fn test_custodial_resolution_carries_escrow() {
        let vault = SecretVault::from_passphrase("p");
        let escrow = Pubkey::new_unique();
        let signer_ref = SignerRef::Custodial {
            wallet_id: "custody-7".to_string(),
        };

        let signer = vault.resolve_signer(&signer_ref, &escrow).unwrap();
        assert_eq!(signer.pubkey(), escrow);
    }
}
