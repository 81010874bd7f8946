//! Child processes attached to a pseudo-terminal.
//!
//! The wallet CLI reads its passphrase and confirmations from its terminal,
//! so it gets the slave side of a fresh pty as stdin, stdout, stderr and
//! controlling tty. It also runs in its own session: keyboard signals sent to
//! our foreground process group never reach an in-flight submission.

use std::io;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::process::{Child, Command};

pub type OutputStream = Box<dyn AsyncRead + Unpin + Send>;
pub type InputStream = Box<dyn AsyncWrite + Unpin + Send>;

/// A spawned child and the ends of its terminal we hold
pub struct Attached {
    pub child: Child,
    /// Everything the child writes, stdout and stderr merged
    pub outputs: Vec<OutputStream>,
    pub input: Option<InputStream>,
}

#[cfg(unix)]
pub fn spawn_attached(program: &str, args: &[String]) -> io::Result<Attached> {
    use nix::fcntl::{fcntl, FcntlArg, FdFlag};
    use nix::pty::openpty;
    use nix::sys::termios::{tcgetattr, tcsetattr, LocalFlags, SetArg};
    use std::os::fd::AsRawFd;
    use std::process::Stdio;

    let pty = openpty(None, None)?;
    for fd in [&pty.master, &pty.slave] {
        fcntl(fd.as_raw_fd(), FcntlArg::F_SETFD(FdFlag::FD_CLOEXEC))?;
    }

    // Responses are never echoed back into the transcript
    let mut termios = tcgetattr(&pty.slave)?;
    termios.local_flags.remove(LocalFlags::ECHO);
    tcsetattr(&pty.slave, SetArg::TCSANOW, &termios)?;

    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(Stdio::from(pty.slave.try_clone()?))
        .stdout(Stdio::from(pty.slave.try_clone()?))
        .stderr(Stdio::from(pty.slave))
        .kill_on_drop(true);

    // SAFETY: only async-signal-safe calls between fork and exec
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid()?;
            if nix::libc::ioctl(0, nix::libc::TIOCSCTTY as _, 0) == -1 {
                return Err(io::Error::last_os_error());
            }
            Ok(())
        });
    }

    let child = command.spawn()?;
    // Our copies of the slave must close so the master sees EOF on exit
    drop(command);

    let master = std::fs::File::from(pty.master);
    let writer = master.try_clone()?;

    Ok(Attached {
        child,
        outputs: vec![Box::new(tokio::fs::File::from_std(master))],
        input: Some(Box::new(tokio::fs::File::from_std(writer))),
    })
}

/// Without ptys the child gets plain pipes
#[cfg(not(unix))]
pub fn spawn_attached(program: &str, args: &[String]) -> io::Result<Attached> {
    use std::process::Stdio;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()?;

    let mut outputs: Vec<OutputStream> = Vec::new();
    if let Some(stdout) = child.stdout.take() {
        outputs.push(Box::new(stdout));
    }
    if let Some(stderr) = child.stderr.take() {
        outputs.push(Box::new(stderr));
    }
    let input = child
        .stdin
        .take()
        .map(|stdin| Box::new(stdin) as InputStream);

    Ok(Attached {
        child,
        outputs,
        input,
    })
}
