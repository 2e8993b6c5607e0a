//! Running external tools as bounded subprocesses.

use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use itertools::Itertools;

use crate::err::Error;

/// Default bound on the runtime of a command.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(48 * 60 * 60);

/// Result of a finished command; a non-zero exit is a value, not an error.
#[derive(Debug)]
pub struct ProcessOutcome {
    pub status: ExitStatus,
    /// Captured standard output, empty when redirected to a file.
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

impl ProcessOutcome {
    pub fn success(&self) -> bool {
        self.status.success()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).trim().to_string()
    }
}

/// Builder for an external command.
#[derive(Debug, Clone)]
pub struct ToolCommand {
    program: PathBuf,
    args: Vec<OsString>,
    stdout_path: Option<PathBuf>,
    timeout: Duration,
}

impl ToolCommand {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            stdout_path: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|arg| arg.as_ref().to_owned()));
        self
    }

    /// Redirect standard output into the file at `path` (truncating it).
    pub fn stdout_to(mut self, path: impl AsRef<Path>) -> Self {
        self.stdout_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Shell-like rendering for logs and error messages.
    pub fn display(&self) -> String {
        let mut result = std::iter::once(self.program.as_os_str())
            .chain(self.args.iter().map(|arg| arg.as_os_str()))
            .map(|s| s.to_string_lossy())
            .join(" ");
        if let Some(path) = &self.stdout_path {
            result.push_str(&format!(" > {}", path.display()));
        }
        result
    }

    /// Run to completion; only spawn failures and timeouts are errors.
    pub async fn run(&self) -> Result<ProcessOutcome, Error> {
        tracing::debug!("running `{}`", self.display());
        let mut command = tokio::process::Command::new(&self.program);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        match &self.stdout_path {
            Some(path) => {
                let file = std::fs::File::create(path)?;
                command.stdout(Stdio::from(file));
            }
            None => {
                command.stdout(Stdio::piped());
            }
        }

        let child = command.spawn().map_err(|e| {
            Error::Configuration(format!("could not start `{}`: {}", self.display(), e))
        })?;
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                return Err(Error::Timeout {
                    command: self.display(),
                    timeout: self.timeout,
                })
            }
        };

        Ok(ProcessOutcome {
            status: output.status,
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }

    /// Run to completion; a non-zero exit becomes `Error::ExternalProcess`.
    pub async fn run_checked(&self) -> Result<ProcessOutcome, Error> {
        let outcome = self.run().await?;
        if outcome.success() {
            Ok(outcome)
        } else {
            Err(Error::ExternalProcess {
                command: self.display(),
                status: outcome.status.to_string(),
                stderr: outcome.stderr_lossy(),
            })
        }
    }
}

#[cfg(all(test, unix))]
pub mod test {
    use std::os::unix::fs::PermissionsExt;
    use std::path::{Path, PathBuf};
    use std::time::Duration;

    use super::ToolCommand;
    use crate::err::Error;

    /// Write an executable POSIX shell script at `path`.
    pub fn write_script(path: &Path, body: &str) -> Result<PathBuf, anyhow::Error> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, format!("#!/bin/sh\n{}\n", body))?;
        let mut perms = std::fs::metadata(path)?.permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(path, perms)?;
        Ok(path.to_path_buf())
    }

    #[tokio::test]
    async fn run_captures_streams() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let script = write_script(&tmpdir.join("tool"), "echo \"out $1\"; echo err >&2")?;

        let outcome = ToolCommand::new(script).arg("x").run().await?;

        assert!(outcome.success());
        assert_eq!(String::from_utf8_lossy(&outcome.stdout), "out x\n");
        assert_eq!(outcome.stderr_lossy(), "err");
        Ok(())
    }

    #[tokio::test]
    async fn run_redirects_stdout() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let script = write_script(&tmpdir.join("tool"), "echo '##fileformat=VCFv4.1'")?;
        let out = tmpdir.join("out.vcf");

        let outcome = ToolCommand::new(script).stdout_to(&out).run().await?;

        assert!(outcome.stdout.is_empty());
        assert_eq!(std::fs::read_to_string(&out)?, "##fileformat=VCFv4.1\n");
        Ok(())
    }

    #[tokio::test]
    async fn non_zero_exit_is_a_value() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let script = write_script(&tmpdir.join("tool"), "echo nothing found >&2; exit 3")?;
        let command = ToolCommand::new(script);

        let outcome = command.run().await?;
        assert_eq!(outcome.status.code(), Some(3));

        match command.run_checked().await {
            Err(Error::ExternalProcess { stderr, .. }) => assert_eq!(stderr, "nothing found"),
            other => panic!("unexpected result: {:?}", other),
        }
        Ok(())
    }

    #[tokio::test]
    async fn timeout_kills_command() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let script = write_script(&tmpdir.join("tool"), "sleep 30")?;

        let res = ToolCommand::new(script)
            .timeout(Duration::from_millis(200))
            .run()
            .await;

        assert!(matches!(res, Err(Error::Timeout { .. })));
        Ok(())
    }

    #[test]
    fn display() {
        let command = ToolCommand::new("/tools/freebayes/freebayes")
            .args(["--bam", "a.bam"])
            .stdout_to("out.vcf");

        assert_eq!(
            command.display(),
            "/tools/freebayes/freebayes --bam a.bam > out.vcf"
        );
    }
}
