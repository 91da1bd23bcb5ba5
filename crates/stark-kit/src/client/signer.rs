//! Signer trait and implementations.
//!
//! A `Signer` holds a STARK private key and produces `(r, s)` signatures over
//! transaction hashes. Signing is a pure computation: there is no retry and
//! a malformed key fails at construction.
//!
//! # Implementations
//!
//! - [`InMemorySigner`] - Single key stored in memory
//! - [`EnvSigner`] - Key loaded from an environment variable named after the account alias
//!
//! # Example
//!
//! ```rust
//! use stark_kit::{Felt, InMemorySigner, Signer};
//!
//! let signer = InMemorySigner::from_hex("0x1234").unwrap();
//! let hash = Felt::from_hex_unchecked("0xabc");
//!
//! let signature = signer.sign(&hash).unwrap();
//! assert!(signature.verify(signer.public_key(), &hash));
//! ```

use std::sync::Arc;

use starknet_core::types::Felt;
use starknet_crypto::{SignError, get_public_key, rfc6979_generate_k, sign, verify};

use crate::error::SignerError;

/// Order of the STARK curve's generator. Private keys live in `[1, EC_ORDER)`.
pub const EC_ORDER: Felt =
    Felt::from_hex_unchecked("0x0800000000000010ffffffffffffffffb781126dcae7b2321e66a241adc64d2f");

// ============================================================================
// Signature
// ============================================================================

/// A STARK ECDSA signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Signature {
    pub r: Felt,
    pub s: Felt,
}

impl Signature {
    /// Check this signature against `public_key` and `hash`.
    pub fn verify(&self, public_key: Felt, hash: &Felt) -> bool {
        verify(&public_key, hash, &self.r, &self.s).unwrap_or(false)
    }

    /// The `[r, s]` pair as accounts expect it.
    pub fn to_vec(&self) -> Vec<Felt> {
        vec![self.r, self.s]
    }
}

// ============================================================================
// Signer Trait
// ============================================================================

/// Trait for signing transaction hashes.
///
/// # Example Implementation
///
/// ```rust,ignore
/// use stark_kit::{Felt, Signature, Signer, SignerError};
///
/// struct HsmSigner {
///     public_key: Felt,
/// }
///
/// impl Signer for HsmSigner {
///     fn public_key(&self) -> Felt {
///         self.public_key
///     }
///
///     fn sign(&self, hash: &Felt) -> Result<Signature, SignerError> {
///         hsm::sign(hash).map_err(|e| SignerError::SigningFailed(e.to_string()))
///     }
/// }
/// ```
pub trait Signer: Send + Sync {
    /// The public key, derived once from the private key.
    fn public_key(&self) -> Felt;

    /// Sign a message hash.
    fn sign(&self, hash: &Felt) -> Result<Signature, SignerError>;

    /// Alias the account is registered under, if the signer knows it.
    fn alias(&self) -> Option<&str> {
        None
    }
}

impl Signer for Arc<dyn Signer> {
    fn public_key(&self) -> Felt {
        (**self).public_key()
    }

    fn sign(&self, hash: &Felt) -> Result<Signature, SignerError> {
        (**self).sign(hash)
    }

    fn alias(&self) -> Option<&str> {
        (**self).alias()
    }
}

// ============================================================================
// InMemorySigner
// ============================================================================

/// A signer with a single key stored in memory.
///
/// Signatures use RFC 6979 deterministic nonces, so signing the same hash
/// twice gives the same signature.
#[derive(Clone)]
pub struct InMemorySigner {
    private_key: Felt,
    public_key: Felt,
}

impl InMemorySigner {
    /// Create a signer from a private key.
    ///
    /// # Errors
    ///
    /// Returns [`SignerError::InvalidPrivateKey`] if the key is zero or not
    /// below the curve order.
    pub fn from_private_key(private_key: Felt) -> Result<Self, SignerError> {
        if private_key == Felt::ZERO {
            return Err(SignerError::InvalidPrivateKey(
                "private key must be non-zero".to_string(),
            ));
        }
        if private_key >= EC_ORDER {
            return Err(SignerError::InvalidPrivateKey(
                "private key must be below the curve order".to_string(),
            ));
        }

        Ok(Self {
            private_key,
            public_key: get_public_key(&private_key),
        })
    }

    /// Create a signer from a `0x` hex or decimal private key string.
    pub fn from_hex(private_key: impl AsRef<str>) -> Result<Self, SignerError> {
        let key = private_key
            .as_ref()
            .trim()
            .parse::<Felt>()
            .map_err(|_| SignerError::InvalidPrivateKey("not a field element".to_string()))?;
        Self::from_private_key(key)
    }

    /// Generate a fresh random key.
    pub fn generate() -> Self {
        loop {
            let mut bytes: [u8; 32] = rand::random();
            // below 2^251, hence below the curve order
            bytes[0] &= 0x07;
            if let Ok(signer) = Self::from_private_key(Felt::from_bytes_be(&bytes)) {
                return signer;
            }
        }
    }

    /// Verify a signature against this signer's public key.
    pub fn verify(&self, hash: &Felt, signature: &Signature) -> bool {
        signature.verify(self.public_key, hash)
    }
}

impl std::fmt::Debug for InMemorySigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemorySigner")
            .field("public_key", &format_args!("{:#x}", self.public_key))
            .finish()
    }
}

impl Signer for InMemorySigner {
    fn public_key(&self) -> Felt {
        self.public_key
    }

    fn sign(&self, hash: &Felt) -> Result<Signature, SignerError> {
        let mut seed: Option<Felt> = None;
        loop {
            let k = rfc6979_generate_k(hash, &self.private_key, seed.as_ref());
            match sign(&self.private_key, hash, &k) {
                Ok(signature) => {
                    return Ok(Signature {
                        r: signature.r,
                        s: signature.s,
                    });
                }
                Err(SignError::InvalidK) => {
                    seed = Some(seed.map_or(Felt::ONE, |s| s + Felt::ONE));
                }
                Err(e) => return Err(SignerError::SigningFailed(format!("{:?}", e))),
            }
        }
    }
}

// ============================================================================
// EnvSigner
// ============================================================================

/// A signer that loads its private key from an environment variable.
///
/// Accounts are aliased by the name of the variable holding their key, so
/// `EnvSigner::new("PKEY1")` signs for the account registered as `PKEY1`.
///
/// # Example
///
/// ```rust,no_run
/// use stark_kit::EnvSigner;
///
/// // With PKEY1=0x... set:
/// let signer = EnvSigner::new("PKEY1").unwrap();
/// assert_eq!(signer.alias(), "PKEY1");
/// ```
#[derive(Clone)]
pub struct EnvSigner {
    alias: String,
    inner: InMemorySigner,
}

impl EnvSigner {
    /// Load the key from the variable named `alias`.
    pub fn new(alias: impl Into<String>) -> Result<Self, SignerError> {
        let alias = alias.into();
        let value =
            std::env::var(&alias).map_err(|_| SignerError::MissingEnv(alias.clone()))?;
        let inner = InMemorySigner::from_hex(value)?;
        Ok(Self { alias, inner })
    }

    /// The alias, which is also the variable name.
    pub fn alias(&self) -> &str {
        &self.alias
    }
}

impl std::fmt::Debug for EnvSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvSigner")
            .field("alias", &self.alias)
            .field("public_key", &format_args!("{:#x}", self.inner.public_key))
            .finish()
    }
}

impl Signer for EnvSigner {
    fn public_key(&self) -> Felt {
        self.inner.public_key
    }

    fn sign(&self, hash: &Felt) -> Result<Signature, SignerError> {
        self.inner.sign(hash)
    }

    fn alias(&self) -> Option<&str> {
        Some(&self.alias)
    }
}
