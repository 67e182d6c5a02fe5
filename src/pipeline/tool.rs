//! External process runner shared by the layout and raster adapters.
//!
//! Processes are spawned through `tokio::process` with `kill_on_drop`, so a
//! render future that is dropped (caller gave up, stage timeout fired) takes
//! its child process down with it instead of leaving it writing into a
//! workspace that is about to be removed.
//!
//! Tools spawn helpers of their own (pandoc runs the PDF engine as a
//! subprocess), and killing the direct child does not reach those. On unix
//! every tool therefore leads its own process group, and the whole group is
//! killed once the invocation ends, however it ends. `TMPDIR` points at the
//! working directory so the tools' scratch files land inside the workspace.
//!
//! stdout and stderr are both captured; on failure they are returned as the
//! tool's diagnostics verbatim.

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

/// Failure of a single external tool invocation.
#[derive(Debug, Error)]
pub enum ToolError {
    /// The executable could not be started.
    #[error("failed to launch '{program}': {source}")]
    Spawn {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process started but could not be waited on.
    #[error("failed while waiting for '{program}': {source}")]
    Wait {
        program: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The process ran and exited unsuccessfully.
    #[error("'{program}' exited with {}", exit_label(.exit_code))]
    Exited {
        program: PathBuf,
        exit_code: Option<i32>,
        diagnostics: String,
    },

    /// The process succeeded but did not write the expected artifact.
    #[error("'{program}' produced no output at '{expected}'")]
    MissingOutput {
        program: PathBuf,
        expected: PathBuf,
        diagnostics: String,
    },
}

impl ToolError {
    /// Captured stderr/stdout of the failing process (empty if it never ran).
    pub fn diagnostics(&self) -> &str {
        match self {
            ToolError::Spawn { .. } | ToolError::Wait { .. } => "",
            ToolError::Exited { diagnostics, .. } | ToolError::MissingOutput { diagnostics, .. } => {
                diagnostics
            }
        }
    }

    /// Split into the `(reason, diagnostics)` pair carried by stage errors.
    pub fn into_parts(self) -> (String, String) {
        let reason = self.to_string();
        let diagnostics = match self {
            ToolError::Spawn { .. } | ToolError::Wait { .. } => String::new(),
            ToolError::Exited { diagnostics, .. } | ToolError::MissingOutput { diagnostics, .. } => {
                diagnostics
            }
        };
        (reason, diagnostics)
    }
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(c) => format!("status {c}"),
        None => "no status (killed by signal)".to_string(),
    }
}

/// Result of a successful invocation.
#[derive(Debug, Clone)]
pub struct ToolRun {
    /// Combined stderr + stdout; tools often print warnings even on success.
    pub diagnostics: String,
    pub elapsed_ms: u64,
}

/// Run `program` with `args` in `cwd`, waiting for it to exit.
///
/// stdin is closed; stdout and stderr are captured. A non-zero exit becomes
/// [`ToolError::Exited`] carrying the captured output.
pub async fn run_tool<I, S>(program: &Path, args: I, cwd: &Path) -> Result<ToolRun, ToolError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let started = Instant::now();
    let args: Vec<_> = args.into_iter().map(|a| a.as_ref().to_os_string()).collect();
    debug!("Running {} {:?}", program.display(), args);

    let mut command = Command::new(program);
    command
        .args(&args)
        .current_dir(cwd)
        .env("TMPDIR", cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    #[cfg(unix)]
    command.process_group(0);

    let child = command.spawn().map_err(|source| {
        if source.kind() == ErrorKind::NotFound {
            warn!("Executable not found: {}", program.display());
        }
        ToolError::Spawn {
            program: program.to_path_buf(),
            source,
        }
    })?;

    #[cfg(unix)]
    let _group = ProcessGroup::led_by(child.id());

    let output = child
        .wait_with_output()
        .await
        .map_err(|source| ToolError::Wait {
            program: program.to_path_buf(),
            source,
        })?;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    let diagnostics = combine_output(&output.stderr, &output.stdout);

    if !output.status.success() {
        let exit_code = output.status.code();
        warn!(
            "{} failed after {}ms (exit {:?}): {}",
            program.display(),
            elapsed_ms,
            exit_code,
            diagnostics.trim_end()
        );
        return Err(ToolError::Exited {
            program: program.to_path_buf(),
            exit_code,
            diagnostics,
        });
    }

    if !diagnostics.trim().is_empty() {
        debug!("{} output: {}", program.display(), diagnostics.trim_end());
    }

    Ok(ToolRun {
        diagnostics,
        elapsed_ms,
    })
}

/// Kills every process in a tool's process group when dropped.
///
/// Dropped on every exit from [`run_tool`]: after a normal exit it clears
/// any stragglers, after cancellation it takes down the tool's helpers.
#[cfg(unix)]
struct ProcessGroup {
    pgid: Option<libc::pid_t>,
}

#[cfg(unix)]
impl ProcessGroup {
    fn led_by(pid: Option<u32>) -> Self {
        Self {
            pgid: pid.and_then(|p| libc::pid_t::try_from(p).ok()),
        }
    }
}

#[cfg(unix)]
impl Drop for ProcessGroup {
    fn drop(&mut self) {
        if let Some(pgid) = self.pgid {
            // SAFETY: killpg takes plain integers and touches no memory.
            // ESRCH (group already gone) is the common case and is ignored.
            let rc = unsafe { libc::killpg(pgid, libc::SIGKILL) };
            if rc == 0 {
                debug!("Killed process group {}", pgid);
            }
        }
    }
}

fn combine_output(stderr: &[u8], stdout: &[u8]) -> String {
    let stderr = String::from_utf8_lossy(stderr);
    let stdout = String::from_utf8_lossy(stdout);
    match (stderr.trim().is_empty(), stdout.trim().is_empty()) {
        (_, true) => stderr.into_owned(),
        (true, false) => stdout.into_owned(),
        (false, false) => format!("{}\n{}", stderr.trim_end(), stdout),
    }
}

#[cfg(all(test, unix))]
pub(crate) mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    /// Write an executable `/bin/sh` script into `dir`.
    pub(crate) fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, body).expect("write script");
        let mut perms = fs::metadata(&path).expect("metadata").permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&path, perms).expect("set perms");
        path
    }

    #[tokio::test]
    async fn success_captures_warnings() {
        let dir = TempDir::new().unwrap();
        let script = write_script(
            dir.path(),
            "warn",
            "#!/bin/sh\necho \"warning: no title\" >&2\nexit 0\n",
        );

        let run = run_tool(&script, ["a"], dir.path()).await.expect("tool ran");
        assert!(run.diagnostics.contains("warning: no title"));
    }

    #[tokio::test]
    async fn nonzero_exit_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "boom", "#!/bin/sh\necho \"boom\" >&2\nexit 42\n");

        let err = run_tool(&script, Vec::<&str>::new(), dir.path())
            .await
            .expect_err("expected failure");
        match &err {
            ToolError::Exited {
                exit_code,
                diagnostics,
                ..
            } => {
                assert_eq!(*exit_code, Some(42));
                assert!(diagnostics.contains("boom"), "got: {diagnostics}");
            }
            other => panic!("unexpected error variant: {other:?}"),
        }
        assert!(err.to_string().contains("status 42"));
    }

    #[tokio::test]
    async fn missing_executable_is_spawn_error() {
        let dir = TempDir::new().unwrap();
        let err = run_tool(Path::new("/definitely/not/a/tool"), ["x"], dir.path())
            .await
            .expect_err("cannot spawn");
        assert!(matches!(err, ToolError::Spawn { .. }));
        assert_eq!(err.diagnostics(), "");
    }

    #[tokio::test]
    async fn runs_in_requested_directory() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "touch-here", "#!/bin/sh\ntouch marker\n");
        let work = dir.path().join("work");
        fs::create_dir(&work).unwrap();

        run_tool(&script, Vec::<&str>::new(), &work).await.unwrap();
        assert!(work.join("marker").exists());
    }

    #[tokio::test]
    async fn tmpdir_points_at_working_directory() {
        let dir = TempDir::new().unwrap();
        let script = write_script(dir.path(), "show-tmp", "#!/bin/sh\nprintf '%s' \"$TMPDIR\"\n");

        let run = run_tool(&script, Vec::<&str>::new(), dir.path()).await.unwrap();
        assert_eq!(run.diagnostics, dir.path().display().to_string());
    }

    #[tokio::test]
    async fn abandoned_run_kills_helper_processes() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("late-marker");
        // The helper outlives the tool's own kill unless the group goes too.
        let script = write_script(
            dir.path(),
            "spawns-helper",
            "#!/bin/sh\n(sleep 2; touch \"$1\") &\nwait\n",
        );

        let abandoned = tokio::time::timeout(
            std::time::Duration::from_millis(300),
            run_tool(&script, [marker.as_os_str()], dir.path()),
        )
        .await;
        assert!(abandoned.is_err(), "tool should still be running");

        tokio::time::sleep(std::time::Duration::from_secs(3)).await;
        assert!(!marker.exists(), "helper process survived cancellation");
    }

    #[test]
    fn into_parts_splits_reason_and_output() {
        let err = ToolError::Exited {
            program: PathBuf::from("pdftoppm"),
            exit_code: Some(1),
            diagnostics: "Syntax Error: Couldn't read xref table".into(),
        };
        let (reason, diagnostics) = err.into_parts();
        assert_eq!(reason, "'pdftoppm' exited with status 1");
        assert_eq!(diagnostics, "Syntax Error: Couldn't read xref table");
    }

    #[test]
    fn combine_prefers_stderr_then_stdout() {
        assert_eq!(combine_output(b"err\n", b""), "err\n");
        assert_eq!(combine_output(b"", b"out\n"), "out\n");
        assert_eq!(combine_output(b"err\n", b"out\n"), "err\nout\n");
    }
}
