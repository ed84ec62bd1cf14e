use {
    crate::Pubkey,
    ed25519_dalek::Verifier,
    serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer},
    std::fmt,
};

/// An opaque 64-byte Ed25519 signature. Equality is bytewise.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Serialize for Signature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.as_slice().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bytes = <Vec<u8>>::deserialize(deserializer)?;
        let array: [u8; 64] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| D::Error::invalid_length(v.len(), &"64"))?;
        Ok(Self(array))
    }
}

impl Default for Signature {
    fn default() -> Self {
        Self([0u8; 64])
    }
}

impl Signature {
    pub const fn new_from_array(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }

    /// Verifies this signature over `message` against `signer`.
    pub fn verify(&self, signer: &Pubkey, message: &[u8]) -> bool {
        let Ok(verifying_key) = ed25519_dalek::VerifyingKey::from_bytes(signer.as_bytes()) else {
            return false;
        };
        let Ok(sig) = ed25519_dalek::Signature::from_slice(&self.0) else {
            return false;
        };
        verifying_key.verify(message, &sig).is_ok()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::Keypair};

    #[test]
    fn verify_accepts_genuine_signature_and_rejects_tamper() {
        let keypair = Keypair::new();
        let message = b"replay-and-consensus";
        let sig = keypair.sign(message);
        assert!(sig.verify(&keypair.pubkey(), message));
        assert!(!sig.verify(&keypair.pubkey(), b"replay-and-consensu5"));

        let other = Keypair::new();
        assert!(!sig.verify(&other.pubkey(), message));
    }
}
