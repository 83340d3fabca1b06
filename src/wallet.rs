//! Wallet credentials
//!
//! Validates `suiprivkey` bech32 secrets and tracks which disposable
//! addresses have already been used by this process.

use bech32::Hrp;
use dashmap::DashSet;
use std::fmt;

use crate::error::{Error, Result};
use crate::types::Address;

/// Human-readable part of an encoded Sui private key
pub const SECRET_KEY_HRP: &str = "suiprivkey";

/// Scheme flag for ED25519 keys
const ED25519_FLAG: u8 = 0x00;

/// Bech32-encoded private key. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretKey(String);

impl SecretKey {
    /// Validate an encoded key: bech32 with the `suiprivkey` prefix and an
    /// ED25519 flag followed by 32 key bytes
    pub fn parse(encoded: &str) -> Result<Self> {
        let encoded = encoded.trim();
        if !encoded.starts_with("suiprivkey1") {
            return Err(Error::InvalidKey("expected bech32 'suiprivkey1...' format".into()));
        }

        let (hrp, data) =
            bech32::decode(encoded).map_err(|e| Error::InvalidKey(e.to_string()))?;

        if hrp.as_str() != SECRET_KEY_HRP {
            return Err(Error::InvalidKey(format!("unexpected prefix '{}'", hrp)));
        }
        if data.len() != 33 {
            return Err(Error::InvalidKey(format!(
                "expected 33 bytes of key data, got {}",
                data.len()
            )));
        }
        if data[0] != ED25519_FLAG {
            return Err(Error::InvalidKey(format!(
                "unsupported key scheme flag 0x{:02x}",
                data[0]
            )));
        }

        Ok(Self(encoded.to_string()))
    }

    /// Encoded form, only for handing to the signing service
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Encode raw ED25519 secret bytes
    pub fn from_ed25519_bytes(secret: &[u8; 32]) -> Result<Self> {
        let hrp = Hrp::parse(SECRET_KEY_HRP).map_err(|e| Error::Internal(e.to_string()))?;
        let mut data = Vec::with_capacity(33);
        data.push(ED25519_FLAG);
        data.extend_from_slice(secret);
        let encoded = bech32::encode::<bech32::Bech32>(hrp, &data)
            .map_err(|e| Error::Internal(e.to_string()))?;
        Ok(Self(encoded))
    }
}

impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SecretKey(***)")
    }
}

/// Keypair reference plus its derived address
#[derive(Clone)]
pub struct Wallet {
    pub address: Address,
    secret: SecretKey,
}

impl Wallet {
    pub fn new(address: Address, secret: SecretKey) -> Self {
        Self { address, secret }
    }

    pub fn secret(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for Wallet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Wallet")
            .field("address", &self.address)
            .field("secret", &self.secret)
            .finish()
    }
}

/// Process-wide record of disposable addresses already handed out
#[derive(Debug, Default)]
pub struct UsedAddresses {
    inner: DashSet<Address>,
}

impl UsedAddresses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an address; returns false if it was already used
    pub fn claim(&self, address: &Address) -> bool {
        self.inner.insert(address.clone())
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.inner.contains(address)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_secret_key_roundtrip_validation() {
        let key = SecretKey::from_ed25519_bytes(&[7u8; 32]).unwrap();
        assert!(key.expose().starts_with("suiprivkey1"));
        assert_eq!(SecretKey::parse(key.expose()).unwrap(), key);
    }

    #[test]
    fn test_secret_key_rejects_wrong_prefix() {
        assert!(matches!(
            SecretKey::parse("0xdeadbeef"),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_secret_key_rejects_other_schemes() {
        let hrp = Hrp::parse(SECRET_KEY_HRP).unwrap();
        let mut data = vec![0x01u8];
        data.extend_from_slice(&[1u8; 32]);
        let secp = bech32::encode::<bech32::Bech32>(hrp, &data).unwrap();
        let err = SecretKey::parse(&secp).unwrap_err();
        assert!(err.to_string().contains("scheme"));
    }

    #[test]
    fn test_secret_key_is_masked() {
        let key = SecretKey::from_ed25519_bytes(&[9u8; 32]).unwrap();
        assert_eq!(format!("{:?}", key), "SecretKey(***)");
    }

    #[test]
    fn test_used_addresses() {
        let used = UsedAddresses::new();
        let a: Address = "0x1".parse().unwrap();
        assert!(used.claim(&a));
        assert!(!used.claim(&a));
        assert_eq!(used.len(), 1);
    }
}
