//! Launching a file with the desktop's default application.
//!
//! One [`FileOpener`] per platform family; [`platform_opener`] picks the one
//! matching the build target.

use std::io;
use std::path::Path;
use std::process::{Command, Stdio};

pub trait FileOpener: Send + Sync {
    /// Short label for logs
    fn name(&self) -> &'static str;

    /// The command that opens `path`
    fn command(&self, path: &Path) -> Command;

    /// Launch the command without waiting for it
    fn open(&self, path: &Path) -> io::Result<()> {
        self.command(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(drop)
    }
}

/// Windows shell association via `start`
pub struct WindowsShellOpen;

impl FileOpener for WindowsShellOpen {
    fn name(&self) -> &'static str {
        "start"
    }

    fn command(&self, path: &Path) -> Command {
        let mut cmd = Command::new("cmd");
        // empty title so a quoted path is not taken as the window title
        cmd.args(["/C", "start", ""]).arg(path);
        cmd
    }
}

/// macOS LaunchServices
pub struct MacOpen;

impl FileOpener for MacOpen {
    fn name(&self) -> &'static str {
        "open"
    }

    fn command(&self, path: &Path) -> Command {
        let mut cmd = Command::new("open");
        cmd.arg(path);
        cmd
    }
}

/// freedesktop.org systems
pub struct XdgOpen;

impl FileOpener for XdgOpen {
    fn name(&self) -> &'static str {
        "xdg-open"
    }

    fn command(&self, path: &Path) -> Command {
        let mut cmd = Command::new("xdg-open");
        cmd.arg(path);
        cmd
    }
}

pub fn platform_opener() -> Box<dyn FileOpener> {
    if cfg!(target_os = "windows") {
        Box::new(WindowsShellOpen)
    } else if cfg!(target_os = "macos") {
        Box::new(MacOpen)
    } else {
        Box::new(XdgOpen)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ffi::OsStr;

    fn argv(cmd: &Command) -> (String, Vec<String>) {
        let program = cmd.get_program().to_string_lossy().into_owned();
        let args = cmd
            .get_args()
            .map(|a: &OsStr| a.to_string_lossy().into_owned())
            .collect();
        (program, args)
    }

    #[test]
    fn test_windows_command() {
        let cmd = WindowsShellOpen.command(Path::new("C:\\inbox\\shot.png"));
        let (program, args) = argv(&cmd);
        assert_eq!(program, "cmd");
        assert_eq!(args, vec!["/C", "start", "", "C:\\inbox\\shot.png"]);
    }

    #[test]
    fn test_mac_command() {
        let (program, args) = argv(&MacOpen.command(Path::new("/tmp/shot.png")));
        assert_eq!(program, "open");
        assert_eq!(args, vec!["/tmp/shot.png"]);
    }

    #[test]
    fn test_xdg_command() {
        let (program, args) = argv(&XdgOpen.command(Path::new("/tmp/shot.png")));
        assert_eq!(program, "xdg-open");
        assert_eq!(args, vec!["/tmp/shot.png"]);
    }

    #[test]
    fn test_platform_selection() {
        let expected = if cfg!(target_os = "windows") {
            "start"
        } else if cfg!(target_os = "macos") {
            "open"
        } else {
            "xdg-open"
        };
        assert_eq!(platform_opener().name(), expected);
    }
}
