use std::path::{Component, Path, PathBuf};
use tokio::fs::{File, OpenOptions};

use super::constants::{FALLBACK_FILE_NAME, MAX_FILENAME_LENGTH};
use super::error::SessionError;
use crate::config::FilenamePolicy;

/// Turn a peer-supplied filename into a single safe path component
pub fn sanitize_file_name(file_name: &str) -> String {
    // Keep only the last component, whichever separator the peer used
    let leaf = file_name.rsplit(['/', '\\']).next().unwrap_or_default();

    let clean: String = leaf.chars().filter(|c| !c.is_control()).collect();
    let clean = clean.trim();

    // Windows device names are unusable as files there
    const RESERVED: [&str; 22] = [
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7",
        "COM8", "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];

    if clean.is_empty()
        || clean == "."
        || clean == ".."
        || RESERVED.iter().any(|r| clean.eq_ignore_ascii_case(r))
    {
        return FALLBACK_FILE_NAME.to_string();
    }

    truncate_file_name(clean)
}

/// Cap a name at MAX_FILENAME_LENGTH bytes, keeping a short extension
fn truncate_file_name(name: &str) -> String {
    if name.len() <= MAX_FILENAME_LENGTH {
        return name.to_string();
    }

    let (base, ext) = match name.rfind('.') {
        Some(idx) if idx > 0 && name.len() - idx < 20 => name.split_at(idx),
        _ => (name, ""),
    };

    let mut cutoff = MAX_FILENAME_LENGTH - ext.len();
    while !base.is_char_boundary(cutoff) {
        cutoff -= 1;
    }

    let mut out = base[..cutoff].to_string();
    out.push_str(ext);
    out
}

/// Work out where a received file goes inside `receive_dir`
pub fn resolve_destination(
    receive_dir: &Path,
    file_name: &str,
    policy: FilenamePolicy,
) -> Result<PathBuf, SessionError> {
    match policy {
        FilenamePolicy::Sanitize => Ok(receive_dir.join(sanitize_file_name(file_name))),
        FilenamePolicy::Verbatim => {
            let relative = Path::new(file_name);
            let escapes = file_name.is_empty()
                || relative
                    .components()
                    .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
            if escapes {
                return Err(SessionError::RejectedFilename {
                    name: file_name.to_string(),
                });
            }
            Ok(receive_dir.join(relative))
        }
    }
}

/// Create (or truncate) the destination file with owner-only permissions on Unix
pub async fn open_destination(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    options.mode(0o600);

    options.open(path).await
}

/// Format transfer speed from bytes and elapsed time
pub fn format_transfer_speed(bytes_transferred: u64, elapsed_secs: f64) -> String {
    if elapsed_secs <= 0.0 {
        return "n/a".to_string();
    }

    let speed_bps = bytes_transferred as f64 / elapsed_secs;
    if speed_bps > 1_000_000.0 {
        format!("{:.2} MB/s", speed_bps / 1_000_000.0)
    } else if speed_bps > 1_000.0 {
        format!("{:.1} KB/s", speed_bps / 1_000.0)
    } else {
        format!("{:.0} B/s", speed_bps)
    }
}
