/// Deterministic SHA-256 content digests over strings, files, and folders.
///
/// [`hash_folder`] is the identity of a filesystem tree: every file under the
/// root is digested and folded into a running hash in lexicographic order of
/// its POSIX-style relative path, so the result is stable across platforms
/// and directory-iteration orders. The audit chain and the facade's
/// before/after hashes are built on these functions.
use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Read buffer size for file hashing.
const CHUNK_SIZE: usize = 64 * 1024;

/// Errors produced while hashing files or folders.
#[derive(Debug)]
pub enum HashError {
    /// An underlying filesystem operation failed.
    Io {
        /// The path being read when the error occurred.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl fmt::Display for HashError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "hashing failed at {}: {source}", path.display())
            }
        }
    }
}

impl std::error::Error for HashError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
        }
    }
}

/// Encodes a byte slice as a lowercase hexadecimal string.
fn hex_encode(bytes: &[u8]) -> String {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_CHARS[(b >> 4) as usize] as char);
        out.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    out
}

/// Returns the SHA-256 hex digest of `text`'s UTF-8 bytes.
pub fn hash_string(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex_encode(&hasher.finalize())
}

/// Returns the SHA-256 hex digest of the file at `path`.
///
/// The file is read in 64 KiB chunks so arbitrarily large artifacts hash in
/// constant memory.
///
/// # Errors
///
/// Returns [`HashError::Io`] if the file cannot be opened or read.
pub fn hash_file(path: &Path) -> Result<String, HashError> {
    let mut file = File::open(path).map_err(|source| HashError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut buf).map_err(|source| HashError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Returns a SHA-256 digest covering every file under `path`.
///
/// Files are visited in lexicographic order of their POSIX-style relative
/// path; for each file the string `"<rel_path>:<hex_digest>\n"` is folded
/// into the running digest. Two trees with identical contents therefore
/// produce identical digests regardless of platform path separators or
/// directory-listing order.
///
/// # Errors
///
/// Returns [`HashError::Io`] on any unreadable directory or file.
pub fn hash_folder(path: &Path) -> Result<String, HashError> {
    let mut files = Vec::new();
    collect_files(path, path, &mut files)?;
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut hasher = Sha256::new();
    for (rel, abs) in files {
        let digest = hash_file(&abs)?;
        hasher.update(format!("{rel}:{digest}\n").as_bytes());
    }
    Ok(hex_encode(&hasher.finalize()))
}

/// Recursively collects `(posix_relative_path, absolute_path)` pairs for
/// every file under `dir`.
fn collect_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<(String, PathBuf)>,
) -> Result<(), HashError> {
    let entries = std::fs::read_dir(dir).map_err(|source| HashError::Io {
        path: dir.to_path_buf(),
        source,
    })?;
    for entry in entries {
        let entry = entry.map_err(|source| HashError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        let entry_path = entry.path();
        if entry_path.is_dir() {
            collect_files(root, &entry_path, out)?;
        } else if entry_path.is_file() {
            let rel = entry_path
                .strip_prefix(root)
                .unwrap_or(&entry_path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            out.push((rel, entry_path));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::expect_used)]

    use super::*;
    use std::fs;

    /// SHA-256 of the empty string, a well-known vector.
    const EMPTY_SHA256: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    #[test]
    fn hash_string_known_vectors() {
        assert_eq!(hash_string(""), EMPTY_SHA256);
        assert_eq!(
            hash_string("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn hash_string_is_64_hex_chars() {
        let digest = hash_string("anything");
        assert_eq!(digest.len(), 64);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(digest, digest.to_lowercase());
    }

    #[test]
    fn hash_file_matches_hash_string() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("f.txt");
        fs::write(&path, "abc").expect("write");
        let digest = hash_file(&path).expect("hash");
        assert_eq!(digest, hash_string("abc"));
    }

    #[test]
    fn hash_file_missing_is_io_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let result = hash_file(&dir.path().join("absent.txt"));
        assert!(result.is_err());
    }

    #[test]
    fn hash_folder_is_deterministic() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(dir.path().join("sub")).expect("mkdir");
        fs::write(dir.path().join("b.json"), "{}").expect("write");
        fs::write(dir.path().join("a.json"), "[]").expect("write");
        fs::write(dir.path().join("sub/c.md"), "# c").expect("write");

        let first = hash_folder(dir.path()).expect("hash");
        let second = hash_folder(dir.path()).expect("hash");
        assert_eq!(first, second);
    }

    #[test]
    fn hash_folder_detects_content_change() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.json"), "1").expect("write");
        let before = hash_folder(dir.path()).expect("hash");
        fs::write(dir.path().join("a.json"), "2").expect("write");
        let after = hash_folder(dir.path()).expect("hash");
        assert_ne!(before, after);
    }

    #[test]
    fn hash_folder_detects_rename() {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("a.json"), "1").expect("write");
        let before = hash_folder(dir.path()).expect("hash");
        fs::rename(dir.path().join("a.json"), dir.path().join("b.json")).expect("rename");
        let after = hash_folder(dir.path()).expect("hash");
        assert_ne!(before, after);
    }

    #[test]
    fn hash_folder_of_empty_tree() {
        let dir = tempfile::tempdir().expect("tempdir");
        // No files folded in: the digest of nothing is the empty-string digest.
        assert_eq!(hash_folder(dir.path()).expect("hash"), EMPTY_SHA256);
    }
}
