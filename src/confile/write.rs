//! Atomic file replacement.

use std::io::Write as _;
use std::path::Path;

use tracing::debug;

use crate::error::ConfigError;

/// Replaces `path` with `content` without ever exposing a partial file.
///
/// The content goes to a temporary file in the same directory, which
/// takes over the permission bits of the existing file and is then renamed
/// over it. On failure the original file is left untouched. A missing
/// parent directory is created.
///
/// # Errors
///
/// Returns [`ConfigError::Write`] if any step fails.
pub fn write_atomic(path: &Path, content: &str) -> Result<(), ConfigError> {
    let err = |source: std::io::Error| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir).map_err(err)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".toolconf-")
        .suffix(".tmp")
        .tempfile_in(dir)
        .map_err(err)?;
    tmp.write_all(content.as_bytes()).map_err(err)?;
    tmp.as_file().sync_all().map_err(err)?;

    match std::fs::metadata(path) {
        Ok(meta) => std::fs::set_permissions(tmp.path(), meta.permissions()).map_err(err)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(err(e)),
    }

    tmp.persist(path).map_err(|e| err(e.error))?;
    debug!(path = %path.display(), bytes = content.len(), "configuration file written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_new_file_and_parent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sub").join("gpg.conf");
        write_atomic(&path, "verbose\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "verbose\n");
    }

    #[test]
    fn replaces_existing_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpg.conf");
        std::fs::write(&path, "old\n").unwrap();
        write_atomic(&path, "new\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new\n");
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().starts_with(".toolconf-"))
            .collect();
        assert!(leftovers.is_empty(), "temporary file left behind");
    }

    #[cfg(unix)]
    #[test]
    fn preserves_permission_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("gpg-agent.conf");
        std::fs::write(&path, "old\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o640)).unwrap();

        write_atomic(&path, "new\n").unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o640);
    }
}
