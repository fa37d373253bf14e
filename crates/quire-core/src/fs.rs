use std::fs;
use std::io::{self, Write};
use std::path::Path;

use tempfile::Builder;

/// Atomically write `contents` to `path`, creating parent directories first.
///
/// The bytes land in a temporary file next to the destination and are renamed
/// into place, so readers never observe a partially written page. On failure
/// the temporary file is removed when it drops.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut tmp = Builder::new().prefix(".quire").tempfile_in(parent)?;
    tmp.as_file_mut().write_all(contents)?;
    tmp.as_file_mut().sync_all()?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(path)
            .map(|metadata| metadata.permissions().mode())
            .unwrap_or(0o644);
        fs::set_permissions(tmp.path(), fs::Permissions::from_mode(mode))?;
    }

    tmp.persist(path).map(|_| ()).map_err(|err| err.error)
}
