//! Salted PBKDF2-HMAC-SHA256 password hashes.
//!
//! Stored as `pbkdf2:sha256:<iterations>$<salt>$<hex digest>`. The iteration count
//! travels with the hash, so changing the configured cost never locks out old users.

use rand::{distributions::Alphanumeric, Rng};
use sha2::Sha256;
use subtle::ConstantTimeEq;

const METHOD_PREFIX: &str = "pbkdf2:sha256:";
const SALT_LEN: usize = 16;

#[derive(Debug, Clone, Copy)]
pub struct PasswordHasher {
    iterations: u32,
}

impl PasswordHasher {
    pub fn new(iterations: u32) -> Self { Self { iterations: iterations.max(1) } }

    pub fn hash(&self, password: &str) -> String {
        let salt: String = rand::thread_rng().sample_iter(&Alphanumeric).take(SALT_LEN).map(char::from).collect();
        let digest = pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), self.iterations);
        format!("{METHOD_PREFIX}{}${salt}${}", self.iterations, hex::encode(digest))
    }

    /// `false` for a wrong password and for anything that is not a hash we produced.
    pub fn verify(stored: &str, password: &str) -> bool {
        let mut parts = stored.splitn(3, '$');
        let (Some(method), Some(salt), Some(expected_hex)) = (parts.next(), parts.next(), parts.next()) else { return false };
        let Some(iterations) = method.strip_prefix(METHOD_PREFIX).and_then(|n| n.parse::<u32>().ok()) else { return false };
        let Ok(expected) = hex::decode(expected_hex) else { return false };
        if iterations == 0 { return false; }
        let got = pbkdf2_sha256(password.as_bytes(), salt.as_bytes(), iterations);
        got.as_slice().ct_eq(expected.as_slice()).into()
    }
}

fn pbkdf2_sha256(password: &[u8], salt: &[u8], iterations: u32) -> [u8; 32] {
    pbkdf2::pbkdf2_hmac_array::<Sha256, 32>(password, salt, iterations)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pbkdf2_matches_published_vectors() {
        assert_eq!(
            hex::encode(pbkdf2_sha256(b"password", b"salt", 1)),
            "120fb6cffcf8b32c43e7225256c4f837a86548c92ccc35480805987cb70be17b"
        );
        assert_eq!(
            hex::encode(pbkdf2_sha256(b"password", b"salt", 2)),
            "ae4d0c95af6b46d32d0adff928f06dd02a303f8ef3c251dfd6e2d85a95474c43"
        );
    }

    #[test]
    fn hashes_are_salted_and_verify() {
        let h = PasswordHasher::new(50);
        let a = h.hash("hunter2");
        let b = h.hash("hunter2");
        assert_ne!(a, b);
        assert!(a.starts_with("pbkdf2:sha256:50$"));
        assert!(PasswordHasher::verify(&a, "hunter2"));
        assert!(PasswordHasher::verify(&b, "hunter2"));
        assert!(!PasswordHasher::verify(&a, "hunter3"));
    }

    #[test]
    fn iteration_count_is_read_from_the_hash() {
        let old = PasswordHasher::new(10).hash("pw");
        assert!(PasswordHasher::verify(&old, "pw"));
        assert!(PasswordHasher::new(0).hash("pw").starts_with("pbkdf2:sha256:1$"));
    }

    #[test]
    fn tampered_or_malformed_hashes_do_not_verify() {
        let good = PasswordHasher::new(5).hash("pw");
        let flipped = if good.ends_with('0') { '1' } else { '0' };
        let tampered = format!("{}{flipped}", &good[..good.len() - 1]);
        assert!(!PasswordHasher::verify(&tampered, "pw"));
        assert!(!PasswordHasher::verify("", "pw"));
        assert!(!PasswordHasher::verify("plaintext", "plaintext"));
        assert!(!PasswordHasher::verify("pbkdf2:sha256:x$salt$00", "pw"));
        assert!(!PasswordHasher::verify("scrypt:32768:8:1$salt$00", "pw"));
        assert!(!PasswordHasher::verify("pbkdf2:sha256:0$salt$00", "pw"));
        assert!(!PasswordHasher::verify("pbkdf2:sha256:5$salt$00", "pw"));
    }
}
