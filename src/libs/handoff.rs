//! Post-exit handoff for files locked by the running application.
//!
//! The handoff is a generated script launched as a detached process. It
//! waits until no process with the executable's name is left, removes the
//! deferred deletions, copies the deferred files out of staging, relaunches
//! the executable, then deletes the staging directory and itself. Nothing
//! reports back: once launched, the host only has to exit.
//!
//! Windows gets a batch file run through `cmd /c`; other platforms get a
//! POSIX shell script, detached into its own session.

use crate::libs::error::{Result, UpdateError};
use crate::libs::paths::RelPath;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

pub const BATCH_SCRIPT_NAME: &str = "mvz_update_files.bat";
pub const SHELL_SCRIPT_NAME: &str = "mvz_update_files.sh";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptFlavor {
    Batch,
    Shell,
}

impl ScriptFlavor {
    pub fn native() -> Self {
        if cfg!(windows) {
            ScriptFlavor::Batch
        } else {
            ScriptFlavor::Shell
        }
    }

    pub fn file_name(self) -> &'static str {
        match self {
            ScriptFlavor::Batch => BATCH_SCRIPT_NAME,
            ScriptFlavor::Shell => SHELL_SCRIPT_NAME,
        }
    }
}

/// Everything the handoff script needs, fixed at planning time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandoffPlan {
    install_root: PathBuf,
    stage_dir: PathBuf,
    script_dir: PathBuf,
    exe_name: String,
    copies: Vec<RelPath>,
    deletions: Vec<RelPath>,
    flavor: ScriptFlavor,
}

impl HandoffPlan {
    /// Refuses to plan a handoff unless the running program is the packaged
    /// executable that the script can wait for and relaunch.
    pub fn new(
        packaged: bool,
        install_root: &Path,
        stage_dir: &Path,
        script_dir: &Path,
        exe_name: &str,
        copies: Vec<RelPath>,
        deletions: Vec<RelPath>,
    ) -> Result<Self> {
        if !packaged {
            return Err(UpdateError::Configuration(format!(
                "deferred update of {} requires the packaged executable to be running",
                exe_name
            )));
        }
        if exe_name.is_empty() || exe_name.contains(['/', '\\', '"', '\'']) {
            return Err(UpdateError::Configuration(format!("invalid executable name {:?}", exe_name)));
        }

        Ok(Self {
            install_root: install_root.to_path_buf(),
            stage_dir: stage_dir.to_path_buf(),
            script_dir: script_dir.to_path_buf(),
            exe_name: exe_name.to_string(),
            copies,
            deletions,
            flavor: ScriptFlavor::native(),
        })
    }

    pub fn with_flavor(mut self, flavor: ScriptFlavor) -> Self {
        self.flavor = flavor;
        self
    }

    pub fn flavor(&self) -> ScriptFlavor {
        self.flavor
    }

    pub fn copies(&self) -> &[RelPath] {
        &self.copies
    }

    pub fn deletions(&self) -> &[RelPath] {
        &self.deletions
    }

    pub fn script_path(&self) -> PathBuf {
        self.script_dir.join(self.flavor.file_name())
    }

    pub fn render(&self) -> String {
        match self.flavor {
            ScriptFlavor::Batch => self.render_batch(),
            ScriptFlavor::Shell => self.render_shell(),
        }
    }

    pub fn write_script(&self) -> Result<PathBuf> {
        let path = self.script_path();
        fs::create_dir_all(&self.script_dir).map_err(|e| UpdateError::io(&self.script_dir, e))?;
        fs::write(&path, self.render()).map_err(|e| UpdateError::io(&path, e))?;

        #[cfg(unix)]
        if self.flavor == ScriptFlavor::Shell {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).map_err(|e| UpdateError::io(&path, e))?;
        }

        Ok(path)
    }

    fn render_batch(&self) -> String {
        let exe = batch_escape(&self.exe_name);
        let mut lines = vec![
            "@echo off".to_string(),
            "chcp 65001 >nul".to_string(),
            "setlocal".to_string(),
            format!("set \"APPDIR={}\"", batch_escape(&self.install_root.to_string_lossy())),
            format!("set \"STAGE={}\"", batch_escape(&self.stage_dir.to_string_lossy())),
            String::new(),
            ":wait_loop".to_string(),
            format!("tasklist /FI \"IMAGENAME eq {exe}\" 2>NUL | find /I \"{exe}\" >NUL"),
            "if not errorlevel 1 (".to_string(),
            "  timeout /t 1 /nobreak >nul".to_string(),
            "  goto wait_loop".to_string(),
            ")".to_string(),
            String::new(),
        ];

        for rel in &self.deletions {
            let target = format!("%APPDIR%\\{}", batch_escape(&rel.to_windows()));
            lines.push(format!("if exist \"{target}\\*\" ("));
            lines.push(format!("  rmdir /s /q \"{target}\" >nul 2>nul"));
            lines.push(") else (".to_string());
            lines.push(format!("  del /f /q \"{target}\" >nul 2>nul"));
            lines.push(")".to_string());
        }

        for rel in &self.copies {
            let win = batch_escape(&rel.to_windows());
            if let Some(parent) = rel.parent() {
                let parent = batch_escape(&parent.replace('/', "\\"));
                lines.push(format!("if not exist \"%APPDIR%\\{parent}\" mkdir \"%APPDIR%\\{parent}\" >nul 2>nul"));
            }
            lines.push(format!("copy /y \"%STAGE%\\{win}\" \"%APPDIR%\\{win}\" >nul"));
        }

        lines.push(String::new());
        lines.push(format!("start \"\" /D \"%APPDIR%\" \"%APPDIR%\\{exe}\""));
        lines.push("rmdir /s /q \"%STAGE%\" >nul 2>nul".to_string());
        lines.push("endlocal".to_string());
        lines.push("(goto) 2>nul & del \"%~f0\"".to_string());

        let mut script = lines.join("\r\n");
        script.push_str("\r\n");
        script
    }

    fn render_shell(&self) -> String {
        let mut lines = vec![
            "#!/bin/sh".to_string(),
            format!("APPDIR={}", sh_quote(&self.install_root.to_string_lossy())),
            format!("STAGE={}", sh_quote(&self.stage_dir.to_string_lossy())),
            String::new(),
            format!("while pgrep -x {} >/dev/null 2>&1; do", sh_quote(&self.exe_name)),
            "  sleep 1".to_string(),
            "done".to_string(),
            String::new(),
        ];

        for rel in &self.deletions {
            lines.push(format!("rm -rf \"$APPDIR\"/{}", sh_quote(rel.as_str())));
        }

        for rel in &self.copies {
            if let Some(parent) = rel.parent() {
                lines.push(format!("mkdir -p \"$APPDIR\"/{}", sh_quote(parent)));
            }
            let quoted = sh_quote(rel.as_str());
            lines.push(format!("cp -pf \"$STAGE\"/{quoted} \"$APPDIR\"/{quoted}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "(cd \"$APPDIR\" && nohup \"$APPDIR\"/{} >/dev/null 2>&1 &)",
            sh_quote(&self.exe_name)
        ));
        lines.push("rm -rf \"$STAGE\"".to_string());
        lines.push("rm -f \"$0\"".to_string());

        let mut script = lines.join("\n");
        script.push('\n');
        script
    }
}

fn batch_escape(text: &str) -> String {
    text.replace('%', "%%")
}

fn sh_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', "'\\''"))
}

/// Starts a handoff script without waiting for it.
pub trait Launcher: Send + Sync {
    fn launch(&self, script: &Path, flavor: ScriptFlavor) -> io::Result<()>;
}

/// Launches the script as a detached, windowless process.
pub struct DetachedLauncher;

impl Launcher for DetachedLauncher {
    fn launch(&self, script: &Path, flavor: ScriptFlavor) -> io::Result<()> {
        let mut command = match flavor {
            ScriptFlavor::Batch => {
                let mut command = Command::new("cmd");
                command.arg("/c").arg(script);
                command
            }
            ScriptFlavor::Shell => {
                let mut command = Command::new("sh");
                command.arg(script);
                command
            }
        };
        command.stdin(Stdio::null()).stdout(Stdio::null()).stderr(Stdio::null());

        #[cfg(windows)]
        {
            use std::os::windows::process::CommandExt;
            const CREATE_NO_WINDOW: u32 = 0x08000000;
            const CREATE_NEW_PROCESS_GROUP: u32 = 0x00000200;
            command.creation_flags(CREATE_NO_WINDOW | CREATE_NEW_PROCESS_GROUP);
        }

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // SAFETY: setsid is async-signal-safe and touches no shared state.
            unsafe {
                command.pre_exec(|| {
                    nix::unistd::setsid()?;
                    Ok(())
                });
            }
        }

        let child = command.spawn()?;
        tracing::debug!(pid = child.id(), script = %script.display(), "handoff process started");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan(flavor: ScriptFlavor) -> HandoffPlan {
        HandoffPlan::new(
            true,
            Path::new("/opt/mvz 100%"),
            Path::new("/tmp/mvz-updater/stage"),
            Path::new("/tmp/mvz-updater"),
            "MVZ.exe",
            vec![RelPath::parse("MVZ.exe").unwrap(), RelPath::parse("_internal/lib/x.dll").unwrap()],
            vec![RelPath::parse("_internal/old.dll").unwrap()],
        )
        .unwrap()
        .with_flavor(flavor)
    }

    #[test]
    fn refuses_unpackaged_context() {
        let err = HandoffPlan::new(false, Path::new("a"), Path::new("b"), Path::new("c"), "MVZ.exe", vec![], vec![]).unwrap_err();
        assert_eq!(err.kind(), crate::libs::error::ErrorKind::Configuration);
    }

    #[test]
    fn batch_script_waits_mutates_relaunches_and_cleans() {
        let script = plan(ScriptFlavor::Batch).render();
        let wait = script.find(":wait_loop").unwrap();
        let delete = script.find("rmdir /s /q \"%APPDIR%\\_internal\\old.dll\"").unwrap();
        let copy = script.find("copy /y \"%STAGE%\\_internal\\lib\\x.dll\" \"%APPDIR%\\_internal\\lib\\x.dll\"").unwrap();
        let relaunch = script.find("start \"\" /D \"%APPDIR%\" \"%APPDIR%\\MVZ.exe\"").unwrap();
        let cleanup = script.find("rmdir /s /q \"%STAGE%\"").unwrap();

        assert!(wait < delete && delete < copy && copy < relaunch && relaunch < cleanup);
        assert!(script.contains("IMAGENAME eq MVZ.exe"));
        assert!(script.contains("mkdir \"%APPDIR%\\_internal\\lib\""));
        assert!(script.contains("set \"APPDIR=/opt/mvz 100%%\""));
        assert!(script.contains("del \"%~f0\""));
        assert!(script.contains("\r\n"));
    }

    #[test]
    fn shell_script_quotes_paths() {
        let script = plan(ScriptFlavor::Shell).render();
        assert!(script.starts_with("#!/bin/sh\n"));
        assert!(script.contains("APPDIR='/opt/mvz 100%'"));
        assert!(script.contains("while pgrep -x 'MVZ.exe'"));
        assert!(script.contains("rm -rf \"$APPDIR\"/'_internal/old.dll'"));
        assert!(script.contains("mkdir -p \"$APPDIR\"/'_internal/lib'"));
        assert!(script.contains("cp -pf \"$STAGE\"/'MVZ.exe' \"$APPDIR\"/'MVZ.exe'"));
        assert!(script.trim_end().ends_with("rm -f \"$0\""));
        assert_eq!(sh_quote("it's"), "'it'\\''s'");
    }
}
