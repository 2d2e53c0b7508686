// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Raw PTY process spawning (spec §4.B `startAgentInWindow`): fork a child
//! attached to a new pseudoterminal and exec it via the platform shell.

use std::ffi::CString;
use std::os::fd::AsRawFd;
use std::sync::Arc;

use anyhow::{bail, Context};
use nix::libc;
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::signal::{kill, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{execvp, ForkResult, Pid};
use tokio::io::unix::AsyncFd;

use super::nbio::{set_nonblocking, PtyFd};

/// Exit status of a PTY child, as reported by `waitpid`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    pub code: Option<i32>,
    pub signal: Option<i32>,
}

/// A spawned PTY-attached child process.
pub struct NativePty {
    pub master: Arc<AsyncFd<PtyFd>>,
    pub pid: Pid,
}

impl NativePty {
    /// Spawn `command` (run via the platform shell: `sh -c <command>`, or a
    /// caller-supplied argv for a `docker exec` wrapper) attached to a new
    /// PTY of the given size, with `env` applied in the child before exec.
    // forkpty is unsafe because the child is partially initialized until exec.
    #[allow(unsafe_code)]
    pub fn spawn(argv: &[String], cols: u16, rows: u16, env: &[(String, String)]) -> anyhow::Result<Self> {
        if argv.is_empty() {
            bail!("argv must have at least one element");
        }
        let winsize = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };

        // SAFETY: forkpty forks; the child below only calls async-signal-safe
        // functions (env mutation via libc, execvp) before replacing itself.
        let ForkptyResult { master, fork_result } = unsafe { forkpty(&winsize, None) }.context("forkpty failed")?;

        match fork_result {
            ForkResult::Child => {
                std::env::set_var("TERM", "xterm-256color");
                for (key, value) in env {
                    std::env::set_var(key, value);
                }
                let c_args: Vec<CString> =
                    argv.iter().map(|s| CString::new(s.as_bytes())).collect::<Result<_, _>>().unwrap_or_default();
                if c_args.is_empty() {
                    std::process::exit(127);
                }
                let _ = execvp(&c_args[0], &c_args);
                std::process::exit(127);
            }
            ForkResult::Parent { child } => {
                set_nonblocking(&master)?;
                let afd = AsyncFd::new(PtyFd(master)).context("AsyncFd::new failed")?;
                Ok(Self { master: Arc::new(afd), pid: child })
            }
        }
    }

    /// `sh -c <command_line>` argv for a direct (non-container) spawn.
    pub fn direct_argv(command_line: &str) -> Vec<String> {
        vec!["sh".to_owned(), "-c".to_owned(), command_line.to_owned()]
    }

    /// `docker exec -it <container_id> sh -c <command_line>` argv.
    pub fn docker_argv(container_id: &str, command_line: &str) -> Vec<String> {
        vec![
            "docker".to_owned(),
            "exec".to_owned(),
            "-it".to_owned(),
            container_id.to_owned(),
            "sh".to_owned(),
            "-c".to_owned(),
            command_line.to_owned(),
        ]
    }

    // TIOCSWINSZ is a well-defined ioctl on a valid master fd.
    #[allow(unsafe_code)]
    pub fn resize(&self, cols: u16, rows: u16) -> anyhow::Result<()> {
        let ws = Winsize { ws_col: cols, ws_row: rows, ws_xpixel: 0, ws_ypixel: 0 };
        let ret = unsafe { libc::ioctl(self.master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if ret < 0 {
            bail!("TIOCSWINSZ ioctl failed: {}", std::io::Error::last_os_error());
        }
        Ok(())
    }

    pub fn send_signal(&self, signal: Signal) {
        let _ = kill(self.pid, signal);
    }

    /// Reap the child on a blocking thread; safe to call once after the
    /// reader loop observes EOF.
    pub async fn wait(&self) -> anyhow::Result<ExitStatus> {
        let pid = self.pid;
        tokio::task::spawn_blocking(move || wait_for_exit(pid)).await.context("join wait thread")?
    }
}

fn wait_for_exit(pid: Pid) -> anyhow::Result<ExitStatus> {
    loop {
        match waitpid(pid, None) {
            Ok(WaitStatus::Exited(_, code)) => return Ok(ExitStatus { code: Some(code), signal: None }),
            Ok(WaitStatus::Signaled(_, sig, _)) => return Ok(ExitStatus { code: None, signal: Some(sig as i32) }),
            Ok(_) => continue,
            Err(nix::errno::Errno::EINTR) => continue,
            Err(e) => bail!("waitpid failed: {e}"),
        }
    }
}

impl Drop for NativePty {
    fn drop(&mut self) {
        let _ = kill(self.pid, Signal::SIGHUP);
        let _ = waitpid(self.pid, Some(WaitPidFlag::WNOHANG));
    }
}
