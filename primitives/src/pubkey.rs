use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// An opaque 32-byte public key. Equality is bytewise.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Pubkey([u8; 32]);

impl Pubkey {
    pub const fn new_from_array(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; 32] {
        self.0
    }
}

impl From<[u8; 32]> for Pubkey {
    fn from(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }
}

impl AsRef<[u8]> for Pubkey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Display for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", bs58::encode(self.0).into_string())
    }
}

impl fmt::Debug for Pubkey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_base58() {
        let pk = Pubkey::new_from_array([7u8; 32]);
        let encoded = pk.to_string();
        let decoded = bs58::decode(&encoded).into_vec().unwrap();
        assert_eq!(decoded, pk.as_bytes());
    }

    #[test]
    fn equality_is_bytewise() {
        let a = Pubkey::new_from_array([1; 32]);
        let b = Pubkey::new_from_array([1; 32]);
        let c = Pubkey::new_from_array([2; 32]);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
