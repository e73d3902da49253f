/// Canonical JSON rendering and atomic single-file writes.
///
/// Every JSON artifact in an element folder is produced by
/// [`to_canonical_json`]: 2-space indentation, object keys in sorted order
/// (all crate models use `BTreeMap`-backed maps), and a trailing newline.
/// Rendering the same in-memory value twice yields byte-identical output,
/// which is what makes artifact regeneration idempotent and folder hashes
/// meaningful.
///
/// [`write_json_atomic`] and [`write_text_atomic`] implement the
/// temp-file-then-rename pattern: a torn write can leave a stale temp file
/// behind but never a partially-written target.
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;
use serde::de::DeserializeOwned;

/// Monotonic counter distinguishing concurrent temp files from one process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Errors produced by canonical rendering and file I/O.
#[derive(Debug)]
pub enum CanonicalError {
    /// A value could not be serialised to JSON.
    Serialize {
        /// Underlying serde error message.
        detail: String,
    },
    /// A file could not be parsed as the expected JSON shape.
    Parse {
        /// The file that failed to parse.
        path: PathBuf,
        /// Underlying serde error message.
        detail: String,
    },
    /// An underlying filesystem operation failed.
    Io {
        /// The path being written or read.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

impl fmt::Display for CanonicalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serialize { detail } => write!(f, "JSON serialisation failed: {detail}"),
            Self::Parse { path, detail } => {
                write!(f, "could not parse {}: {detail}", path.display())
            }
            Self::Io { path, source } => write!(f, "I/O error at {}: {source}", path.display()),
        }
    }
}

impl std::error::Error for CanonicalError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialize { .. } | Self::Parse { .. } => None,
        }
    }
}

/// Renders `value` as canonical JSON: pretty-printed with 2-space indent and
/// newline-terminated.
///
/// # Errors
///
/// Returns [`CanonicalError::Serialize`] if the value cannot be serialised
/// (e.g. a non-finite float).
pub fn to_canonical_json<T: Serialize>(value: &T) -> Result<String, CanonicalError> {
    let mut out = serde_json::to_string_pretty(value).map_err(|e| CanonicalError::Serialize {
        detail: e.to_string(),
    })?;
    out.push('\n');
    Ok(out)
}

/// Atomically writes `value` as canonical JSON to `path`.
///
/// Parent directories are created as needed. The bytes are first written to
/// a hidden sibling temp file, then renamed over `path`, so readers never
/// observe a half-written file.
///
/// # Errors
///
/// Returns [`CanonicalError`] on serialisation or filesystem failure.
pub fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), CanonicalError> {
    let text = to_canonical_json(value)?;
    write_text_atomic(path, &text)
}

/// Atomically writes `text` to `path` via a sibling temp file and rename.
///
/// # Errors
///
/// Returns [`CanonicalError::Io`] on filesystem failure; the temp file is
/// removed on a failed rename.
pub fn write_text_atomic(path: &Path, text: &str) -> Result<(), CanonicalError> {
    let parent = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(parent).map_err(|source| CanonicalError::Io {
        path: parent.to_path_buf(),
        source,
    })?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_owned());
    let tmp = parent.join(format!(
        ".{file_name}.{}.{}.tmp",
        std::process::id(),
        TEMP_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    std::fs::write(&tmp, text).map_err(|source| CanonicalError::Io {
        path: tmp.clone(),
        source,
    })?;
    if let Err(source) = std::fs::rename(&tmp, path) {
        let _removed = std::fs::remove_file(&tmp);
        return Err(CanonicalError::Io {
            path: path.to_path_buf(),
            source,
        });
    }
    Ok(())
}

/// Reads and parses a JSON file.
///
/// # Errors
///
/// Returns [`CanonicalError::Io`] if the file cannot be read and
/// [`CanonicalError::Parse`] if its content is not the expected shape.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, CanonicalError> {
    let text = std::fs::read_to_string(path).map_err(|source| CanonicalError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|e| CanonicalError::Parse {
        path: path.to_path_buf(),
        detail: e.to_string(),
    })
}
