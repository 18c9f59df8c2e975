use std::io::Write;
use std::path::{Path, PathBuf};

/// Atomically replaces `dst` with `content` using write-to-temp-then-rename.
///
/// The destination is never left in a partial state: either the old file is
/// still there, or the new content is complete.
pub fn atomic_write(dst: &Path, content: &[u8]) -> std::io::Result<()> {
    let temp_path = temp_path_for(dst);

    // SEC-009: create_new fails if the temp path already exists (symlink race)
    let mut temp_file = std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&temp_path)?;

    let written = temp_file
        .write_all(content)
        .and_then(|()| temp_file.sync_all());
    drop(temp_file);

    if let Err(e) = written {
        let _ = std::fs::remove_file(&temp_path);
        return Err(e);
    }

    // On Windows, rename fails if destination exists
    #[cfg(windows)]
    if dst.exists() {
        if let Err(e) = std::fs::remove_file(dst) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
    }

    std::fs::rename(&temp_path, dst).inspect_err(|_| {
        let _ = std::fs::remove_file(&temp_path);
    })
}

/// Sibling temp path, so the final rename stays on one filesystem.
///
/// The suffix combines the process id with the clock; it is unique per
/// writer, not unpredictable. `create_new` in [`atomic_write`] is what
/// refuses a pre-existing path.
fn temp_path_for(dst: &Path) -> PathBuf {
    use std::time::{SystemTime, UNIX_EPOCH};

    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or(0);
    let file_name = dst
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    dst.with_file_name(format!(
        ".{file_name}.tmp.{}.{nanos:016x}",
        std::process::id()
    ))
}
