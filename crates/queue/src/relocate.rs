//! Relocation of proxy files into the current proxy tree.
//!
//! Proxies are moved, never duplicated. A move that cannot complete leaves the
//! source untouched; only the destination directory may remain.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur while moving a single proxy.
#[derive(Debug, Error)]
pub enum RelocateError {
    /// Proxy to move no longer exists and nothing is at the destination either.
    #[error("Proxy not found at '{}'", .0.display())]
    SourceMissing(PathBuf),

    /// A different file already occupies the destination.
    #[error("Destination '{}' already exists", .0.display())]
    Collision(PathBuf),

    /// Failed to create the destination directory.
    #[error("Failed to create directory '{}': {source}", path.display())]
    CreateDir { path: PathBuf, source: io::Error },

    /// Rename and copy fallback both failed.
    #[error("Failed to move '{}' to '{}': {source}", from.display(), to.display())]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: io::Error,
    },
}

/// Result of a successful relocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveOutcome {
    /// The file was moved to its new path.
    Moved,
    /// The file was already at its new path; nothing to do.
    AlreadyInPlace,
}

/// Moves `from` to `to`, creating the destination directory first.
///
/// Re-running a completed move is a no-op: when the source is gone and the
/// destination exists, the move is reported as already in place.
pub fn move_proxy(from: &Path, to: &Path) -> Result<MoveOutcome, RelocateError> {
    if from == to {
        return Ok(MoveOutcome::AlreadyInPlace);
    }

    let source_exists = from.exists();
    let dest_exists = to.exists();

    match (source_exists, dest_exists) {
        (false, true) => return Ok(MoveOutcome::AlreadyInPlace),
        (false, false) => return Err(RelocateError::SourceMissing(from.to_path_buf())),
        (true, true) => return Err(RelocateError::Collision(to.to_path_buf())),
        (true, false) => {}
    }

    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent).map_err(|source| RelocateError::CreateDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    // Try rename first (same filesystem).
    // Fall back to copy + remove across filesystems.
    if fs::rename(from, to).is_ok() {
        return Ok(MoveOutcome::Moved);
    }

    let move_err = |source| RelocateError::Move {
        from: from.to_path_buf(),
        to: to.to_path_buf(),
        source,
    };

    if let Err(e) = fs::copy(from, to) {
        let _ = fs::remove_file(to);
        return Err(move_err(e));
    }
    if let Err(e) = fs::remove_file(from) {
        // Keep exactly one copy: the source
        let _ = fs::remove_file(to);
        return Err(move_err(e));
    }

    Ok(MoveOutcome::Moved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::TempDir;

    fn write_file(path: &Path, content: &[u8]) {
        let mut file = File::create(path).unwrap();
        file.write_all(content).unwrap();
    }

    #[test]
    fn test_move_creates_destination_dirs() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("old").join("clip.mov");
        fs::create_dir_all(from.parent().unwrap()).unwrap();
        write_file(&from, b"proxy content");

        let to = temp_dir.path().join("new").join("shoot1").join("clip.mov");
        let outcome = move_proxy(&from, &to).unwrap();

        assert_eq!(outcome, MoveOutcome::Moved);
        assert!(!from.exists());
        assert_eq!(fs::read(&to).unwrap(), b"proxy content");
    }

    #[test]
    fn test_move_is_idempotent() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("clip.mov");
        write_file(&from, b"proxy");
        let to = temp_dir.path().join("moved").join("clip.mov");

        assert_eq!(move_proxy(&from, &to).unwrap(), MoveOutcome::Moved);
        assert_eq!(move_proxy(&from, &to).unwrap(), MoveOutcome::AlreadyInPlace);
        assert!(to.exists());
    }

    #[test]
    fn test_move_same_path_is_noop() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("clip.mov");
        write_file(&path, b"proxy");

        assert_eq!(move_proxy(&path, &path).unwrap(), MoveOutcome::AlreadyInPlace);
        assert!(path.exists());
    }

    #[test]
    fn test_move_collision_leaves_both_files() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("a.mov");
        let to = temp_dir.path().join("b.mov");
        write_file(&from, b"old");
        write_file(&to, b"other");

        let result = move_proxy(&from, &to);
        assert!(matches!(result, Err(RelocateError::Collision(_))));
        assert_eq!(fs::read(&from).unwrap(), b"old");
        assert_eq!(fs::read(&to).unwrap(), b"other");
    }

    #[test]
    fn test_move_missing_source() {
        let temp_dir = TempDir::new().unwrap();
        let from = temp_dir.path().join("gone.mov");
        let to = temp_dir.path().join("dest").join("gone.mov");

        let result = move_proxy(&from, &to);
        assert!(matches!(result, Err(RelocateError::SourceMissing(_))));
    }
}
