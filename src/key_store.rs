//! Persistence of the handshake key pair.
//!
//! The public key is stored as a DER `SubjectPublicKeyInfo` in `public.key`,
//! the private key as a DER PKCS#8 `PrivateKeyInfo` in `private.key`, both
//! following the RFC 8410 layout for X25519 and Ed25519. Files are written in
//! plaintext; this is a debugging aid, not a keystore.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ed25519_dalek::SigningKey;
use log::{debug, info};
use pkcs8::der::asn1::{BitStringRef, OctetStringRef};
use pkcs8::der::{Decode, Encode};
use pkcs8::spki::{AlgorithmIdentifierRef, ObjectIdentifier, SubjectPublicKeyInfoRef};
use pkcs8::PrivateKeyInfo;
use rand::rngs::OsRng;
use serde::Deserialize;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};

use crate::error_handling::types::KeyError;

pub const PUBLIC_KEY_FILE: &str = "public.key";
pub const PRIVATE_KEY_FILE: &str = "private.key";

const X25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.110");
const ED25519_OID: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.101.112");

/// Raw key length shared by both supported curves.
const KEY_LENGTH: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "String")]
pub enum KeyAlgorithm {
    /// Diffie-Hellman over Curve25519, used for handshake key agreement.
    X25519,
    Ed25519,
}

impl KeyAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            KeyAlgorithm::X25519 => "X25519",
            KeyAlgorithm::Ed25519 => "Ed25519",
        }
    }

    fn oid(&self) -> ObjectIdentifier {
        match self {
            KeyAlgorithm::X25519 => X25519_OID,
            KeyAlgorithm::Ed25519 => ED25519_OID,
        }
    }

    fn algorithm_identifier(&self) -> AlgorithmIdentifierRef<'static> {
        AlgorithmIdentifierRef {
            oid: self.oid(),
            parameters: None,
        }
    }

    fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        if *oid == X25519_OID {
            Some(KeyAlgorithm::X25519)
        } else if *oid == ED25519_OID {
            Some(KeyAlgorithm::Ed25519)
        } else {
            None
        }
    }

    /// Public key matching the 32-byte private scalar / seed.
    fn derive_public(&self, private: &[u8; KEY_LENGTH]) -> [u8; KEY_LENGTH] {
        match self {
            KeyAlgorithm::X25519 => X25519Public::from(&StaticSecret::from(*private)).to_bytes(),
            KeyAlgorithm::Ed25519 => SigningKey::from_bytes(private).verifying_key().to_bytes(),
        }
    }

    /// Fails with [`KeyError::AlgorithmMismatch`] unless `oid` names `self`.
    fn expect_oid(&self, oid: &ObjectIdentifier) -> Result<(), KeyError> {
        if *oid == self.oid() {
            return Ok(());
        }
        let found = KeyAlgorithm::from_oid(oid)
            .map(|a| a.name().to_owned())
            .unwrap_or_else(|| oid.to_string());
        Err(KeyError::AlgorithmMismatch {
            expected: self.name().to_owned(),
            found,
        })
    }
}

impl fmt::Display for KeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for KeyAlgorithm {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "x25519" => Ok(KeyAlgorithm::X25519),
            "ed25519" => Ok(KeyAlgorithm::Ed25519),
            _ => Err(KeyError::UnknownAlgorithm(s.to_owned())),
        }
    }
}

impl TryFrom<String> for KeyAlgorithm {
    type Error = KeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicKey {
    algorithm: KeyAlgorithm,
    bytes: [u8; KEY_LENGTH],
}

impl PublicKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.bytes
    }

    /// DER `SubjectPublicKeyInfo`.
    pub fn to_der(&self) -> Result<Vec<u8>, KeyError> {
        let spki = SubjectPublicKeyInfoRef {
            algorithm: self.algorithm.algorithm_identifier(),
            subject_public_key: BitStringRef::from_bytes(&self.bytes)
                .map_err(|e| KeyError::Encoding(e.to_string()))?,
        };
        spki.to_der().map_err(|e| KeyError::Encoding(e.to_string()))
    }

    pub fn from_der(algorithm: KeyAlgorithm, der: &[u8]) -> Result<Self, KeyError> {
        let spki =
            SubjectPublicKeyInfoRef::from_der(der).map_err(|e| KeyError::Decoding(e.to_string()))?;
        algorithm.expect_oid(&spki.algorithm.oid)?;
        let raw = spki
            .subject_public_key
            .as_bytes()
            .ok_or_else(|| KeyError::Decoding("public key is not octet aligned".into()))?;
        Ok(Self {
            algorithm,
            bytes: fixed_length(raw, "public key")?,
        })
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct PrivateKey {
    algorithm: KeyAlgorithm,
    bytes: [u8; KEY_LENGTH],
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl PrivateKey {
    pub fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.bytes
    }

    /// DER PKCS#8 `PrivateKeyInfo`; the key itself is wrapped in an
    /// OCTET STRING (`CurvePrivateKey`).
    pub fn to_der(&self) -> Result<Vec<u8>, KeyError> {
        let curve_key = OctetStringRef::new(&self.bytes)
            .and_then(|os| os.to_der())
            .map_err(|e| KeyError::Encoding(e.to_string()))?;
        PrivateKeyInfo::new(self.algorithm.algorithm_identifier(), &curve_key)
            .to_der()
            .map_err(|e| KeyError::Encoding(e.to_string()))
    }

    pub fn from_der(algorithm: KeyAlgorithm, der: &[u8]) -> Result<Self, KeyError> {
        let info = PrivateKeyInfo::from_der(der).map_err(|e| KeyError::Decoding(e.to_string()))?;
        algorithm.expect_oid(&info.algorithm.oid)?;
        let curve_key = OctetStringRef::from_der(info.private_key)
            .map_err(|e| KeyError::Decoding(e.to_string()))?;
        Ok(Self {
            algorithm,
            bytes: fixed_length(curve_key.as_bytes(), "private key")?,
        })
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            algorithm: self.algorithm,
            bytes: self.algorithm.derive_public(&self.bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPair {
    public: PublicKey,
    private: PrivateKey,
}

impl KeyPair {
    pub fn generate(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::X25519 => Self::from_x25519(&StaticSecret::random_from_rng(OsRng)),
            KeyAlgorithm::Ed25519 => Self::from_ed25519(&SigningKey::generate(&mut OsRng)),
        }
    }

    pub fn from_x25519(secret: &StaticSecret) -> Self {
        Self::from_private(PrivateKey {
            algorithm: KeyAlgorithm::X25519,
            bytes: secret.to_bytes(),
        })
    }

    pub fn from_ed25519(signing_key: &SigningKey) -> Self {
        Self::from_private(PrivateKey {
            algorithm: KeyAlgorithm::Ed25519,
            bytes: signing_key.to_bytes(),
        })
    }

    fn from_private(private: PrivateKey) -> Self {
        Self {
            public: private.public_key(),
            private,
        }
    }

    pub fn algorithm(&self) -> KeyAlgorithm {
        self.public.algorithm
    }

    pub fn public(&self) -> &PublicKey {
        &self.public
    }

    pub fn private(&self) -> &PrivateKey {
        &self.private
    }

    pub fn x25519_secret(&self) -> Option<StaticSecret> {
        (self.algorithm() == KeyAlgorithm::X25519).then(|| StaticSecret::from(self.private.bytes))
    }

    pub fn ed25519_signing_key(&self) -> Option<SigningKey> {
        (self.algorithm() == KeyAlgorithm::Ed25519)
            .then(|| SigningKey::from_bytes(&self.private.bytes))
    }
}

fn fixed_length(raw: &[u8], what: &str) -> Result<[u8; KEY_LENGTH], KeyError> {
    raw.try_into().map_err(|_| {
        KeyError::Decoding(format!(
            "{} must be {} bytes, got {}",
            what,
            KEY_LENGTH,
            raw.len()
        ))
    })
}

fn write_key_file(path: PathBuf, der: &[u8]) -> Result<(), KeyError> {
    fs::write(&path, der).map_err(|e| KeyError::from_io(path.clone(), e))?;
    debug!("Wrote {} byte(s) of key material to {}", der.len(), path.display());
    Ok(())
}

fn read_key_file(path: PathBuf) -> Result<Vec<u8>, KeyError> {
    fs::read(&path).map_err(|e| KeyError::from_io(path, e))
}

pub fn save_public_key<P: AsRef<Path>>(dir: P, key: &PublicKey) -> Result<(), KeyError> {
    write_key_file(dir.as_ref().join(PUBLIC_KEY_FILE), &key.to_der()?)
}

pub fn save_private_key<P: AsRef<Path>>(dir: P, key: &PrivateKey) -> Result<(), KeyError> {
    write_key_file(dir.as_ref().join(PRIVATE_KEY_FILE), &key.to_der()?)
}

pub fn save_key_pair<P: AsRef<Path>>(dir: P, pair: &KeyPair) -> Result<(), KeyError> {
    let dir = dir.as_ref();
    save_public_key(dir, pair.public())?;
    save_private_key(dir, pair.private())?;
    info!("Saved {} key pair to {}", pair.algorithm(), dir.display());
    Ok(())
}

/// Loads the pair written by [`save_key_pair`].
///
/// Errors
/// - [`KeyError::NotFound`] if either file is missing.
/// - [`KeyError::AlgorithmMismatch`] if a file encodes another algorithm.
/// - [`KeyError::Decoding`] for malformed DER or a wrong key length.
/// - [`KeyError::Mismatch`] if the public key does not belong to the private key.
pub fn load_key_pair<P: AsRef<Path>>(dir: P, algorithm: KeyAlgorithm) -> Result<KeyPair, KeyError> {
    let dir = dir.as_ref();
    let public_der = read_key_file(dir.join(PUBLIC_KEY_FILE))?;
    let private_der = read_key_file(dir.join(PRIVATE_KEY_FILE))?;

    let public = PublicKey::from_der(algorithm, &public_der)?;
    let private = PrivateKey::from_der(algorithm, &private_der)?;
    if private.public_key() != public {
        return Err(KeyError::Mismatch);
    }
    info!("Loaded {} key pair from {}", algorithm, dir.display());
    Ok(KeyPair { public, private })
}
