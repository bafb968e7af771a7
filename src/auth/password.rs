//! Salted PBKDF2-HMAC-SHA256 password hashing.
//!
//! Stored hashes are self-describing strings of the form
//! `pbkdf2-sha256$<iterations>$<salt hex>$<derived key hex>`, so the iteration
//! count can be raised later without invalidating existing accounts.

use std::fmt;
use std::str::FromStr;

use hmac::Hmac;
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::Sha256;
use thiserror::Error;

use crate::error::AuthError;

pub const ALGORITHM_TAG: &str = "pbkdf2-sha256";

/// Hashes below this iteration count are refused, both when hashing and when verifying.
pub const MIN_ITERATIONS: u32 = 100_000;

pub const DEFAULT_ITERATIONS: u32 = 210_000;

/// Stored hashes above this iteration count are treated as corrupt.
pub const MAX_ITERATIONS: u32 = 10 * DEFAULT_ITERATIONS;

pub const SALT_LEN: usize = 32;
pub const KEY_LEN: usize = 32;

const DELIMITER: char = '$';
const FIELD_COUNT: usize = 4;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum HashError {
    #[error("malformed stored hash: {0}")]
    Malformed(String),

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("iteration count {0} is below the safety floor")]
    TooFewIterations(u32),

    #[error("iteration count {0} is above the supported ceiling")]
    TooManyIterations(u32),

    #[error("key derivation failed: {0}")]
    Derivation(String),
}

impl From<HashError> for AuthError {
    fn from(err: HashError) -> Self {
        AuthError::HashingFailure(err.to_string())
    }
}

/// Hashing seam used by the credential service.
#[cfg_attr(test, mockall::automock)]
pub trait CredentialHasher: Send + Sync {
    /// Produce a freshly salted, encoded hash of `password`.
    fn hash(&self, password: &str) -> Result<String, HashError>;

    /// Check `password` against an encoded hash.
    ///
    /// `Ok(false)` means the password is wrong. Any problem with `stored` itself is an error.
    fn verify(&self, password: &str, stored: &str) -> Result<bool, HashError>;
}

/// Parsed form of an encoded password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredHash {
    pub iterations: u32,
    pub salt: [u8; SALT_LEN],
    pub key: [u8; KEY_LEN],
}

impl fmt::Display for StoredHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{ALGORITHM_TAG}{DELIMITER}{}{DELIMITER}{}{DELIMITER}{}",
            self.iterations,
            hex::encode(self.salt),
            hex::encode(self.key)
        )
    }
}

impl FromStr for StoredHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.split(DELIMITER).collect();
        if fields.len() != FIELD_COUNT {
            return Err(HashError::Malformed(format!(
                "expected {FIELD_COUNT} fields, found {}",
                fields.len()
            )));
        }

        if fields[0] != ALGORITHM_TAG {
            return Err(HashError::UnsupportedAlgorithm(fields[0].to_string()));
        }

        let iterations = parse_iterations(fields[1])?;
        if iterations < MIN_ITERATIONS {
            return Err(HashError::TooFewIterations(iterations));
        }
        if iterations > MAX_ITERATIONS {
            return Err(HashError::Malformed(format!(
                "iteration count {iterations} exceeds {MAX_ITERATIONS}"
            )));
        }

        Ok(Self {
            iterations,
            salt: decode_fixed::<SALT_LEN>(fields[2], "salt")?,
            key: decode_fixed::<KEY_LEN>(fields[3], "derived key")?,
        })
    }
}

// Only the canonical decimal form written by `Display` is accepted.
fn parse_iterations(field: &str) -> Result<u32, HashError> {
    let canonical = !field.is_empty()
        && field.bytes().all(|b| b.is_ascii_digit())
        && !(field.len() > 1 && field.starts_with('0'));
    if !canonical {
        return Err(HashError::Malformed(
            "iteration count is not a canonical number".into(),
        ));
    }
    field
        .parse()
        .map_err(|_| HashError::Malformed("iteration count is out of range".into()))
}

fn decode_fixed<const N: usize>(field: &str, what: &str) -> Result<[u8; N], HashError> {
    let mut out = [0u8; N];
    hex::decode_to_slice(field, &mut out)
        .map_err(|e| HashError::Malformed(format!("{what} is not {N} bytes of hex: {e}")))?;
    Ok(out)
}

/// Compare two byte slices without short-circuiting on the first difference.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

fn derive_key(password: &str, salt: &[u8], iterations: u32) -> Result<[u8; KEY_LEN], HashError> {
    let mut key = [0u8; KEY_LEN];
    pbkdf2::pbkdf2::<Hmac<Sha256>>(password.as_bytes(), salt, iterations, &mut key)
        .map_err(|e| HashError::Derivation(e.to_string()))?;
    Ok(key)
}

#[derive(Debug, Clone)]
pub struct Pbkdf2Hasher {
    iterations: u32,
}

impl Pbkdf2Hasher {
    pub fn new(iterations: u32) -> Result<Self, HashError> {
        if iterations < MIN_ITERATIONS {
            return Err(HashError::TooFewIterations(iterations));
        }
        if iterations > MAX_ITERATIONS {
            return Err(HashError::TooManyIterations(iterations));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for Pbkdf2Hasher {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

impl CredentialHasher for Pbkdf2Hasher {
    fn hash(&self, password: &str) -> Result<String, HashError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng
            .try_fill_bytes(&mut salt)
            .map_err(|e| HashError::Derivation(format!("salt generation failed: {e}")))?;

        let key = derive_key(password, &salt, self.iterations)?;
        let stored = StoredHash {
            iterations: self.iterations,
            salt,
            key,
        };
        Ok(stored.to_string())
    }

    fn verify(&self, password: &str, stored: &str) -> Result<bool, HashError> {
        let stored: StoredHash = stored.parse()?;
        let candidate = derive_key(password, &stored.salt, stored.iterations)?;
        Ok(constant_time_eq(&candidate, &stored.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hasher() -> Pbkdf2Hasher {
        Pbkdf2Hasher::new(MIN_ITERATIONS).unwrap()
    }

    #[test]
    fn test_hash_is_salted() {
        let hasher = hasher();
        let first = hasher.hash("correct horse battery staple").unwrap();
        let second = hasher.hash("correct horse battery staple").unwrap();
        assert_ne!(first, second);

        let first: StoredHash = first.parse().unwrap();
        let second: StoredHash = second.parse().unwrap();
        assert_ne!(first.salt, second.salt);
    }

    #[test]
    fn test_verify_round_trip() {
        let hasher = hasher();
        let stored = hasher.hash("hunter22").unwrap();
        assert!(hasher.verify("hunter22", &stored).unwrap());
        assert!(!hasher.verify("hunter23", &stored).unwrap());
        assert!(!hasher.verify("", &stored).unwrap());
    }

    #[test]
    fn test_encoded_layout() {
        let stored = hasher().hash("password").unwrap();
        let fields: Vec<&str> = stored.split('$').collect();
        assert_eq!(fields.len(), 4);
        assert_eq!(fields[0], ALGORITHM_TAG);
        assert_eq!(fields[1], MIN_ITERATIONS.to_string());
        assert_eq!(fields[2].len(), SALT_LEN * 2);
        assert_eq!(fields[3].len(), KEY_LEN * 2);
    }

    #[test]
    fn test_verify_honours_stored_iterations() {
        let stored = Pbkdf2Hasher::new(MIN_ITERATIONS + 1).unwrap().hash("pw").unwrap();
        assert!(hasher().verify("pw", &stored).unwrap());
    }

    #[test]
    fn test_too_few_fields_is_malformed() {
        let result = hasher().verify("pw", "pbkdf2-sha256$100000$abcd");
        assert!(matches!(result, Err(HashError::Malformed(_))));

        let result = hasher().verify("pw", "");
        assert!(matches!(result, Err(HashError::Malformed(_))));
    }

    #[test]
    fn test_too_many_fields_is_malformed() {
        let valid = hasher().hash("pw").unwrap();
        let result = hasher().verify("pw", &format!("{valid}$extra"));
        assert!(matches!(result, Err(HashError::Malformed(_))));
    }

    #[test]
    fn test_unknown_algorithm_fails_closed() {
        let valid = hasher().hash("pw").unwrap();
        let swapped = valid.replacen(ALGORITHM_TAG, "md5", 1);
        assert_eq!(
            hasher().verify("pw", &swapped),
            Err(HashError::UnsupportedAlgorithm("md5".into()))
        );
    }

    #[test]
    fn test_iterations_below_floor_rejected() {
        let stored = StoredHash {
            iterations: 1_000,
            salt: [7; SALT_LEN],
            key: [9; KEY_LEN],
        };
        assert_eq!(
            hasher().verify("pw", &stored.to_string()),
            Err(HashError::TooFewIterations(1_000))
        );
    }

    fn encoded(iterations: &str, salt: &str, key: &str) -> String {
        format!("{ALGORITHM_TAG}${iterations}${salt}${key}")
    }

    fn zero_salt() -> String {
        "00".repeat(SALT_LEN)
    }

    fn zero_key() -> String {
        "00".repeat(KEY_LEN)
    }

    #[test]
    fn test_non_numeric_iterations_rejected() {
        let stored = encoded("lots", &zero_salt(), &zero_key());
        assert!(matches!(hasher().verify("pw", &stored), Err(HashError::Malformed(_))));
    }

    #[test]
    fn test_non_canonical_iterations_rejected() {
        for iterations in ["+210000", "0210000", " 210000", "210000 ", "", "99999999999"] {
            let stored = encoded(iterations, &zero_salt(), &zero_key());
            assert!(
                matches!(hasher().verify("pw", &stored), Err(HashError::Malformed(_))),
                "accepted iteration field {iterations:?}"
            );
        }
    }

    #[test]
    fn test_excessive_iterations_rejected() {
        let stored = encoded(&u32::MAX.to_string(), &zero_salt(), &zero_key());
        assert!(matches!(hasher().verify("pw", &stored), Err(HashError::Malformed(_))));

        let stored = encoded(&(MAX_ITERATIONS + 1).to_string(), &zero_salt(), &zero_key());
        assert!(matches!(hasher().verify("pw", &stored), Err(HashError::Malformed(_))));

        assert_eq!(
            Pbkdf2Hasher::new(MAX_ITERATIONS + 1).unwrap_err(),
            HashError::TooManyIterations(MAX_ITERATIONS + 1)
        );
    }

    #[test]
    fn test_bad_salt_hex_rejected() {
        let short_salt = encoded("100000", &"ab".repeat(8), &zero_key());
        assert!(matches!(hasher().verify("pw", &short_salt), Err(HashError::Malformed(_))));

        let not_hex = encoded("100000", &"zz".repeat(SALT_LEN), &zero_key());
        assert!(matches!(hasher().verify("pw", &not_hex), Err(HashError::Malformed(_))));
    }

    #[test]
    fn test_bad_key_hex_rejected() {
        let short_key = encoded("100000", &zero_salt(), &"00".repeat(KEY_LEN - 1));
        assert!(matches!(hasher().verify("pw", &short_key), Err(HashError::Malformed(_))));

        let long_key = encoded("100000", &zero_salt(), &"00".repeat(KEY_LEN + 1));
        assert!(matches!(hasher().verify("pw", &long_key), Err(HashError::Malformed(_))));

        let not_hex = encoded("100000", &zero_salt(), &"zz".repeat(KEY_LEN));
        assert!(matches!(hasher().verify("pw", &not_hex), Err(HashError::Malformed(_))));
    }

    #[test]
    fn test_new_rejects_weak_configuration() {
        assert_eq!(Pbkdf2Hasher::new(10).unwrap_err(), HashError::TooFewIterations(10));
        assert_eq!(Pbkdf2Hasher::default().iterations(), DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq(b"abc", b"abc"));
        assert!(!constant_time_eq(b"abc", b"abd"));
        assert!(!constant_time_eq(b"abc", b"abcd"));
        assert!(constant_time_eq(b"", b""));
    }

    #[test]
    fn test_hash_error_maps_to_hashing_failure() {
        let err: AuthError = HashError::Derivation("boom".into()).into();
        assert!(matches!(err, AuthError::HashingFailure(msg) if msg.contains("boom")));
    }
}
