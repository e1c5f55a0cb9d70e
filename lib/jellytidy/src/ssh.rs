//! Playlist files on the media server's disk, reached over `ssh`.
//!
//! The system client runs in batch mode, so authentication must come from
//! an identity file or a running agent.

use std::path::{Path, PathBuf};
use std::time::Duration;

use shared::system::FileDeletion;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::error::{CatalogError, Result};

const SSH_PROGRAM: &str = "ssh";
const DEFAULT_PORT: u16 = 22;
const COMMAND_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 15;
/// `ssh` itself exits with 255 when the connection fails.
const SSH_CONNECTION_FAILED: i32 = 255;

#[derive(Debug)]
struct RemoteOutput {
    stdout: String,
    stderr: String,
    success: bool,
}

#[derive(Debug, Clone)]
pub struct PlaylistFileCleaner {
    program: PathBuf,
    host: String,
    user: String,
    port: u16,
    identity_file: Option<PathBuf>,
    timeout: Duration,
}

impl PlaylistFileCleaner {
    pub fn new(host: &str, user: &str) -> Self {
        Self {
            program: PathBuf::from(SSH_PROGRAM),
            host: host.trim().to_string(),
            user: user.trim().to_string(),
            port: DEFAULT_PORT,
            identity_file: None,
            timeout: Duration::from_secs(COMMAND_TIMEOUT_SECS),
        }
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn identity_file(mut self, path: Option<&str>) -> Self {
        self.identity_file = path
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(expand_home);
        self
    }

    #[cfg(test)]
    fn program(mut self, program: impl Into<PathBuf>) -> Self {
        self.program = program.into();
        self
    }

    fn ssh_args(&self) -> Vec<String> {
        let mut args = vec![
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            format!("ConnectTimeout={CONNECT_TIMEOUT_SECS}"),
            "-o".to_string(),
            "StrictHostKeyChecking=accept-new".to_string(),
            "-p".to_string(),
            self.port.to_string(),
        ];
        if let Some(identity) = &self.identity_file {
            args.push("-i".to_string());
            args.push(identity.display().to_string());
        }
        args.push(format!("{}@{}", self.user, self.host));
        args
    }

    async fn run(&self, command: &str) -> Result<RemoteOutput> {
        debug!("ssh {}@{}: {}", self.user, self.host, command);
        let mut cmd = Command::new(&self.program);
        cmd.args(self.ssh_args()).arg(command).kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(result) => result?,
            Err(_) => {
                warn!("Remote command timed out after {:?}: {}", self.timeout, command);
                return Err(CatalogError::Timeout(format!("ssh {command}")));
            }
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if output.status.code() == Some(SSH_CONNECTION_FAILED) {
            return Err(CatalogError::RemoteShell(if stderr.is_empty() {
                format!("could not connect to {}", self.host)
            } else {
                stderr
            }));
        }
        Ok(RemoteOutput {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr,
            success: output.status.success(),
        })
    }

    /// Absolute `.m3u`/`.m3u8` paths under `music_path`, sorted.
    pub async fn find_playlist_files(&self, music_path: &str) -> Result<Vec<String>> {
        let output = self.run(&find_command(music_path)).await?;
        if !output.success && output.stdout.trim().is_empty() {
            return Err(CatalogError::RemoteShell(output.stderr));
        }
        let files = parse_listing(&output.stdout);
        info!("Found {} playlist files under {}", files.len(), music_path);
        Ok(files)
    }

    /// Deletes each path independently; one failure does not stop the rest.
    pub async fn delete_files(&self, paths: &[String]) -> Vec<FileDeletion> {
        let mut results = Vec::with_capacity(paths.len());
        for path in paths {
            let error = match self.run(&format!("rm -f {} && echo OK", quote(path))).await {
                Ok(output) => deletion_error(output),
                Err(e) => Some(e.to_string()),
            };
            match &error {
                None => info!("Deleted {}", path),
                Some(e) => warn!("Could not delete {}: {}", path, e),
            }
            results.push(FileDeletion {
                path: path.clone(),
                error,
            });
        }
        results
    }

    pub async fn whoami(&self) -> Result<String> {
        Ok(self.run("whoami").await?.stdout.trim().to_string())
    }

    /// Whether the remote user may write to the directory holding `path`.
    pub async fn can_write(&self, path: &str) -> Result<bool> {
        let directory = Path::new(path)
            .parent()
            .map(|p| p.to_string_lossy().to_string())
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        let output = self
            .run(&format!("test -w {} && echo yes || echo no", quote(&directory)))
            .await?;
        Ok(output.stdout.trim() == "yes")
    }

    pub async fn health_check(&self) -> bool {
        self.whoami().await.is_ok_and(|user| !user.is_empty())
    }
}

/// Warnings and banners on stderr do not matter once the remote side echoed `OK`.
fn deletion_error(output: RemoteOutput) -> Option<String> {
    if output.success && output.stdout.trim() == "OK" {
        None
    } else if !output.stderr.is_empty() {
        Some(output.stderr)
    } else {
        Some("rm exited with an error".to_string())
    }
}

/// Single-quotes `value` for a POSIX shell.
pub fn quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

fn find_command(music_path: &str) -> String {
    let root = music_path.trim_end_matches('/');
    let root = if root.is_empty() { "/" } else { root };
    format!(
        r"find {} -type f \( -iname '*.m3u' -o -iname '*.m3u8' \) | sort",
        quote(root)
    )
}

fn parse_listing(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect()
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_spaces_and_single_quotes() {
        assert_eq!(quote("/music/Guns N' Roses"), r"'/music/Guns N'\'' Roses'");
        assert_eq!(quote("/music/a b.m3u"), "'/music/a b.m3u'");
    }

    #[test]
    fn find_command_strips_trailing_slash() {
        assert_eq!(
            find_command("/music/"),
            r"find '/music' -type f \( -iname '*.m3u' -o -iname '*.m3u8' \) | sort"
        );
        assert!(find_command("/").starts_with("find '/' "));
    }

    #[test]
    fn listing_skips_blank_lines() {
        assert_eq!(
            parse_listing("/music/a.m3u\n\n  /music/b c.m3u8  \n"),
            vec!["/music/a.m3u", "/music/b c.m3u8"]
        );
    }

    #[test]
    fn ssh_runs_in_batch_mode_with_port_and_identity() {
        let args = PlaylistFileCleaner::new("nas.local", "media")
            .port(2222)
            .identity_file(Some("/keys/id_ed25519"))
            .ssh_args();

        assert!(args.contains(&"BatchMode=yes".to_string()));
        let port = args.iter().position(|a| a == "-p").unwrap();
        assert_eq!(args[port + 1], "2222");
        let identity = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[identity + 1], "/keys/id_ed25519");
        assert_eq!(args.last().unwrap(), "media@nas.local");
    }

    /// Writes an executable stand-in for `ssh` that ignores its arguments.
    #[cfg(unix)]
    fn fake_ssh(name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let dir = std::env::temp_dir().join(format!("jellytidy-ssh-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("ssh");
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn known_hosts_warning_does_not_fail_deletion() {
        let ssh = fake_ssh(
            "warning",
            "echo \"Warning: Permanently added 'nas' (ED25519) to the list of known hosts.\" >&2\necho OK",
        );
        let cleaner = PlaylistFileCleaner::new("nas", "media").program(ssh);

        let results = cleaner.delete_files(&["/music/a.m3u".to_string()]).await;
        assert_eq!(results.len(), 1);
        assert!(results[0].is_success(), "{:?}", results[0]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn missing_ok_reports_stderr() {
        let ssh = fake_ssh("denied", "echo 'rm: cannot remove: Permission denied' >&2\nexit 1");
        let cleaner = PlaylistFileCleaner::new("nas", "media").program(ssh);

        let results = cleaner.delete_files(&["/music/a.m3u".to_string()]).await;
        assert_eq!(
            results[0].error.as_deref(),
            Some("rm: cannot remove: Permission denied")
        );
    }

    #[test]
    fn deletion_needs_ok_on_stdout() {
        let output = |stdout: &str, stderr: &str, success| RemoteOutput {
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            success,
        };
        assert_eq!(deletion_error(output("OK\n", "banner", true)), None);
        assert_eq!(
            deletion_error(output("", "", true)).as_deref(),
            Some("rm exited with an error")
        );
    }

    #[test]
    fn blank_identity_is_ignored() {
        let args = PlaylistFileCleaner::new("nas", "me")
            .identity_file(Some("  "))
            .ssh_args();
        assert!(!args.contains(&"-i".to_string()));
    }
}
