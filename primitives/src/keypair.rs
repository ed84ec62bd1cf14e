use {
    crate::{Pubkey, Signature},
    ed25519_dalek::{Signer as _, SigningKey},
    std::{fs, path::Path},
    thiserror::Error,
};

#[derive(Debug, Error)]
pub enum KeypairError {
    #[error("failed to read keypair file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse keypair file as JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("keypair file must contain exactly 64 bytes, found {0}")]
    WrongLength(usize),
}

/// An Ed25519 identity. Bytes 32..64 of the on-disk format are used
/// directly as the public key rather than re-derived, to match the wider
/// ecosystem's keypair-file convention (§6.1).
#[derive(Clone, Debug)]
pub struct Keypair {
    signing_key: SigningKey,
    pubkey: Pubkey,
}

impl Keypair {
    pub fn new() -> Self {
        let mut csprng = rand::rngs::OsRng;
        let signing_key = SigningKey::generate(&mut csprng);
        let pubkey = Pubkey::new_from_array(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            pubkey,
        }
    }

    /// Loads a keypair from the standard 64-integer JSON array format.
    /// Bytes 0..32 are the Ed25519 seed; bytes 32..64 are used verbatim as
    /// the public key.
    pub fn read_from_file(path: impl AsRef<Path>) -> Result<Self, KeypairError> {
        let contents = fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, KeypairError> {
        let bytes: Vec<u8> = serde_json::from_str(contents)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeypairError> {
        if bytes.len() != 64 {
            return Err(KeypairError::WrongLength(bytes.len()));
        }
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes[0..32]);
        let mut pubkey_bytes = [0u8; 32];
        pubkey_bytes.copy_from_slice(&bytes[32..64]);

        let signing_key = SigningKey::from_bytes(&seed);
        Ok(Self {
            signing_key,
            pubkey: Pubkey::new_from_array(pubkey_bytes),
        })
    }

    pub fn pubkey(&self) -> Pubkey {
        self.pubkey
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing_key.sign(message);
        Signature::new_from_array(sig.to_bytes())
    }
}

impl Default for Keypair {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_64_byte_json_array() {
        let keypair = Keypair::new();
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(&keypair.signing_key.to_bytes());
        bytes.extend_from_slice(keypair.pubkey().as_bytes());
        let json = serde_json::to_string(&bytes).unwrap();

        let loaded = Keypair::from_json_str(&json).unwrap();
        assert_eq!(loaded.pubkey(), keypair.pubkey());

        let msg = b"hello";
        assert!(loaded.sign(msg).verify(&keypair.pubkey(), msg));
    }

    #[test]
    fn rejects_wrong_length() {
        let err = Keypair::from_bytes(&[0u8; 10]).unwrap_err();
        assert!(matches!(err, KeypairError::WrongLength(10)));
    }

    #[test]
    fn public_key_bytes_are_used_verbatim_not_rederived() {
        // Construct a keypair whose embedded pubkey bytes intentionally do
        // NOT match the Ed25519-derived public key for the given seed, and
        // confirm Keypair::pubkey() returns the embedded bytes, not a
        // re-derivation.
        let real = Keypair::new();
        let mut bytes = Vec::with_capacity(64);
        bytes.extend_from_slice(&real.signing_key.to_bytes());
        bytes.extend_from_slice(&[9u8; 32]); // deliberately wrong pubkey bytes
        let loaded = Keypair::from_bytes(&bytes).unwrap();
        assert_eq!(loaded.pubkey(), Pubkey::new_from_array([9u8; 32]));
    }
}
