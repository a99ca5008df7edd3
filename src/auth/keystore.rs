//! Encrypted on-disk storage for the session signing key.
//!
//! Blob layout: `nonce (12 bytes) || ciphertext || tag`, sealed with
//! AES-256-GCM under the process passphrase.

use std::{fs, io::Write, path::Path};

use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Nonce,
};
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng, RngCore};

use super::session::SessionError;

pub const PASSPHRASE_LENGTH: usize = 32;
pub const SIGNING_KEY_LENGTH: usize = 64;
const NONCE_LENGTH: usize = 12;

pub fn generate_passphrase() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(PASSPHRASE_LENGTH)
        .map(char::from)
        .collect()
}

pub fn generate_signing_key() -> Vec<u8> {
    let mut key = vec![0u8; SIGNING_KEY_LENGTH];
    OsRng.fill_bytes(&mut key);
    key
}

fn cipher(passphrase: &str) -> Result<Aes256Gcm, SessionError> {
    Aes256Gcm::new_from_slice(passphrase.as_bytes())
        .map_err(|_| SessionError::KeyMaterial("passphrase must be 32 bytes".into()))
}

pub fn seal(passphrase: &str, signing_key: &[u8]) -> Result<Vec<u8>, SessionError> {
    let mut nonce_bytes = [0u8; NONCE_LENGTH];
    OsRng.fill_bytes(&mut nonce_bytes);

    let ciphertext = cipher(passphrase)?
        .encrypt(Nonce::from_slice(&nonce_bytes), signing_key)
        .map_err(|e| SessionError::KeyMaterial(format!("encrypt signing key: {e}")))?;

    let mut blob = Vec::with_capacity(NONCE_LENGTH + ciphertext.len());
    blob.extend_from_slice(&nonce_bytes);
    blob.extend_from_slice(&ciphertext);
    Ok(blob)
}

pub fn open(passphrase: &str, blob: &[u8]) -> Result<Vec<u8>, SessionError> {
    if blob.len() <= NONCE_LENGTH {
        return Err(SessionError::KeyMaterial("key blob is truncated".into()));
    }
    let (nonce, ciphertext) = blob.split_at(NONCE_LENGTH);
    cipher(passphrase)?
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| SessionError::KeyMaterial("key blob does not decrypt".into()))
}

/// Replaces the blob file, readable by the owner only.
pub fn write_blob(path: &Path, blob: &[u8]) -> Result<(), SessionError> {
    let io_err = |e: std::io::Error| SessionError::KeyMaterial(format!("{}: {e}", path.display()));

    let mut options = fs::OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(io_err)?;
    file.write_all(blob).map_err(io_err)?;
    file.sync_all().map_err(io_err)?;

    // `mode` only applies on creation.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(io_err)?;
    }
    Ok(())
}

pub fn read_blob(path: &Path) -> Result<Vec<u8>, SessionError> {
    fs::read(path).map_err(|e| SessionError::KeyMaterial(format!("{}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passphrase_is_alphanumeric() {
        let p = generate_passphrase();
        assert_eq!(p.len(), PASSPHRASE_LENGTH);
        assert!(p.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(p, generate_passphrase());
    }

    #[test]
    fn sealed_key_opens_with_same_passphrase_only() {
        let pass = generate_passphrase();
        let key = generate_signing_key();
        let blob = seal(&pass, &key).unwrap();
        assert_ne!(&blob[NONCE_LENGTH..], key.as_slice());
        assert_eq!(open(&pass, &blob).unwrap(), key);

        let other = generate_passphrase();
        assert!(matches!(open(&other, &blob), Err(SessionError::KeyMaterial(_))));
    }

    #[test]
    fn tampered_or_short_blob_is_rejected() {
        let pass = generate_passphrase();
        let mut blob = seal(&pass, &generate_signing_key()).unwrap();
        let last = blob.len() - 1;
        blob[last] ^= 0xff;
        assert!(open(&pass, &blob).is_err());
        assert!(open(&pass, &blob[..NONCE_LENGTH]).is_err());
    }

    #[cfg(unix)]
    #[test]
    fn blob_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.dat");
        write_blob(&path, b"first").unwrap();
        write_blob(&path, b"second").unwrap();
        assert_eq!(read_blob(&path).unwrap(), b"second");
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn missing_blob_is_key_material_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_blob(&dir.path().join("absent.dat")),
            Err(SessionError::KeyMaterial(_))
        ));
    }
}
