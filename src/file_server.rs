//! Serves files by relative path from the primary storage root, falling back
//! to the public mirror.
//!
//! The traversal guard is a plain blacklist: any `..` substring or a leading
//! separator is refused. Symlinks inside a root and percent-encoded separators
//! are not inspected.

use std::io::ErrorKind;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::StorageConfig;
use crate::content_type;

#[derive(Debug, Error)]
pub enum ServeError {
    #[error("Access denied: {0}")]
    Forbidden(&'static str),
    #[error("File not found")]
    NotFound,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageRoot {
    Primary,
    Mirror,
}

impl StorageRoot {
    pub fn as_str(&self) -> &'static str {
        match self {
            StorageRoot::Primary => "primary",
            StorageRoot::Mirror => "mirror",
        }
    }
}

/// An opened file ready to be streamed.
#[derive(Debug)]
pub struct ServedFile {
    pub path: PathBuf,
    pub root: StorageRoot,
    pub file_name: String,
    pub content_type: &'static str,
    pub len: u64,
    pub file: tokio::fs::File,
}

/// Refuse paths that could escape a storage root.
pub fn check_request_path(raw: &str) -> Result<(), ServeError> {
    if raw.contains("..") {
        return Err(ServeError::Forbidden("path traversal"));
    }
    if raw.starts_with('/') || raw.starts_with('\\') {
        return Err(ServeError::Forbidden("absolute path"));
    }
    Ok(())
}

pub struct FileServer {
    roots: [(StorageRoot, PathBuf); 2],
}

impl FileServer {
    pub fn new(primary: impl Into<PathBuf>, mirror: impl Into<PathBuf>) -> Self {
        Self {
            roots: [
                (StorageRoot::Primary, primary.into()),
                (StorageRoot::Mirror, mirror.into()),
            ],
        }
    }

    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(&config.root, &config.mirror_root)
    }

    /// Resolve `raw` against the roots in priority order and open it.
    pub async fn open(&self, raw: &str) -> Result<ServedFile, ServeError> {
        if let Err(e) = check_request_path(raw) {
            tracing::warn!(path = %raw, reason = %e, "Rejected file request");
            return Err(e);
        }

        let mut resolved = None;
        for (root, base) in &self.roots {
            let candidate = base.join(raw);
            match tokio::fs::try_exists(&candidate).await {
                Ok(true) => {
                    resolved = Some((*root, candidate));
                    break;
                }
                Ok(false) => {
                    tracing::debug!(path = %raw, root = root.as_str(), candidate = %candidate.display(), "No match in storage root");
                }
                Err(e) => {
                    tracing::debug!(path = %raw, root = root.as_str(), error = %e, "Could not check storage root");
                }
            }
        }

        let Some((root, path)) = resolved else {
            tracing::warn!(path = %raw, "File not found in any storage root");
            return Err(ServeError::NotFound);
        };
        tracing::info!(path = %raw, root = root.as_str(), "Resolved file");

        let metadata = match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::warn!(path = %raw, error = %e, "Cannot stat resolved file");
                return Err(ServeError::Forbidden("unreadable file"));
            }
        };
        if !metadata.is_file() {
            tracing::warn!(path = %raw, root = root.as_str(), "Resolved path is not a regular file");
            return Err(ServeError::Forbidden("not a regular file"));
        }

        let file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| open_error(raw, root, e))?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();

        Ok(ServedFile {
            content_type: content_type::for_path(&path),
            file_name,
            len: metadata.len(),
            root,
            path,
            file,
        })
    }
}

/// A file that exists but cannot be opened for reading is forbidden, not missing.
fn open_error(raw: &str, root: StorageRoot, e: std::io::Error) -> ServeError {
    if e.kind() == ErrorKind::PermissionDenied {
        tracing::warn!(path = %raw, root = root.as_str(), "Resolved file is not readable");
        ServeError::Forbidden("unreadable file")
    } else {
        tracing::error!(path = %raw, root = root.as_str(), error = %e, "Failed to open resolved file");
        ServeError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn roots() -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let primary = dir.path().join("storage");
        let mirror = dir.path().join("public");
        std::fs::create_dir_all(&primary).unwrap();
        std::fs::create_dir_all(&mirror).unwrap();
        (dir, primary, mirror)
    }

    fn write(path: &Path, data: &[u8]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, data).unwrap();
    }

    #[test]
    fn test_check_request_path() {
        assert!(check_request_path("uploads/a.pdf").is_ok());
        assert!(check_request_path("a.pdf").is_ok());
        assert!(matches!(
            check_request_path("../../etc/passwd"),
            Err(ServeError::Forbidden(_))
        ));
        assert!(matches!(
            check_request_path("/etc/passwd"),
            Err(ServeError::Forbidden(_))
        ));
        assert!(matches!(
            check_request_path("\\windows\\win.ini"),
            Err(ServeError::Forbidden(_))
        ));
        // Blacklist match, even though this name would be harmless.
        assert!(check_request_path("notes..txt").is_err());
    }

    #[tokio::test]
    async fn test_traversal_rejected_before_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        // Roots do not exist, so any filesystem lookup would yield NotFound.
        let server = FileServer::new(dir.path().join("missing"), dir.path().join("gone"));

        let err = server.open("../../etc/passwd").await.unwrap_err();
        assert!(matches!(err, ServeError::Forbidden("path traversal")));

        let err = server.open("/etc/passwd").await.unwrap_err();
        assert!(matches!(err, ServeError::Forbidden("absolute path")));
    }

    #[tokio::test]
    async fn test_traversal_rejected_even_when_target_exists() {
        let (dir, primary, mirror) = roots();
        write(&dir.path().join("secret.txt"), b"top secret");
        let server = FileServer::new(&primary, &mirror);

        let err = server.open("../secret.txt").await.unwrap_err();
        assert!(matches!(err, ServeError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_primary_root_wins() {
        let (_dir, primary, mirror) = roots();
        write(&primary.join("uploads/a.pdf"), b"primary");
        write(&mirror.join("uploads/a.pdf"), b"mirror");
        let server = FileServer::new(&primary, &mirror);

        let served = server.open("uploads/a.pdf").await.unwrap();
        assert_eq!(served.root, StorageRoot::Primary);
        assert_eq!(served.path, primary.join("uploads/a.pdf"));
        assert_eq!(served.file_name, "a.pdf");
        assert_eq!(served.content_type, "application/pdf");
        assert_eq!(served.len, 7);
    }

    #[tokio::test]
    async fn test_falls_back_to_mirror() {
        let (_dir, primary, mirror) = roots();
        write(&mirror.join("images/logo.png"), b"png");
        let server = FileServer::new(&primary, &mirror);

        let served = server.open("images/logo.png").await.unwrap();
        assert_eq!(served.root, StorageRoot::Mirror);
        assert_eq!(served.content_type, "image/png");
    }

    #[tokio::test]
    async fn test_missing_everywhere() {
        let (_dir, primary, mirror) = roots();
        let server = FileServer::new(&primary, &mirror);

        let err = server.open("uploads/none.pdf").await.unwrap_err();
        assert!(matches!(err, ServeError::NotFound));
    }

    #[tokio::test]
    async fn test_directory_is_forbidden() {
        let (_dir, primary, mirror) = roots();
        std::fs::create_dir_all(primary.join("uploads")).unwrap();
        let server = FileServer::new(&primary, &mirror);

        let err = server.open("uploads").await.unwrap_err();
        assert!(matches!(err, ServeError::Forbidden(_)));
    }

    #[test]
    fn test_permission_denied_on_open_is_forbidden() {
        let denied = std::io::Error::from(ErrorKind::PermissionDenied);
        assert!(matches!(
            open_error("uploads/locked.txt", StorageRoot::Primary, denied),
            ServeError::Forbidden("unreadable file")
        ));

        let other = std::io::Error::from(ErrorKind::Other);
        assert!(matches!(
            open_error("uploads/locked.txt", StorageRoot::Mirror, other),
            ServeError::Io(_)
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unreadable_file_is_forbidden() {
        use std::os::unix::fs::PermissionsExt;

        let (_dir, primary, mirror) = roots();
        let path = primary.join("uploads/locked.txt");
        write(&path, b"locked");
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o000)).unwrap();

        // Privileged users read through mode bits; the mapping itself is
        // covered by test_permission_denied_on_open_is_forbidden.
        if std::fs::File::open(&path).is_ok() {
            return;
        }

        let server = FileServer::new(&primary, &mirror);
        let err = server.open("uploads/locked.txt").await.unwrap_err();
        assert!(matches!(err, ServeError::Forbidden(_)));
    }
}
