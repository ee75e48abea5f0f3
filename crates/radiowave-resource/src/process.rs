use std::ffi::{OsStr, OsString};
use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread;

use tracing::{debug, info, warn};

use crate::config::ResourceConfig;
use crate::error::{ResourceError, Result};
use crate::file::File;
use crate::gate::{CloseReason, LifecycleState};
use crate::message::{Message, MessageFactory};
use crate::pump::CloseTrigger;
use crate::resource::Resource;

/// A resource over a child process's stdin and stdout.
///
/// Requests are written to the child's stdin and responses read from its
/// stdout. The child's stderr goes to the null device. When the child
/// exits the resource closes itself; when the resource closes first the
/// child is killed.
pub struct Process<Req, F: MessageFactory> {
    file: File<Req, F>,
    child: Arc<ChildHandle>,
}

struct ChildHandle {
    child: Mutex<Child>,
    status: OnceLock<ExitStatus>,
    pid: u32,
}

impl ChildHandle {
    fn lock(&self) -> MutexGuard<'_, Child> {
        self.child.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Kill the child unless it has already exited.
    fn kill_if_running(&self) -> io::Result<()> {
        if self.status.get().is_some() {
            return Ok(());
        }
        let mut child = self.lock();
        if child.try_wait()?.is_some() {
            return Ok(());
        }
        debug!(pid = self.pid, "killing child process");
        child.kill()
    }
}

impl<Req, F> Process<Req, F>
where
    Req: Message,
    F: MessageFactory,
{
    /// Spawn `argv[0]` with `argv[1..]` and start a resource over its stdio.
    ///
    /// No shell is involved; the environment and working directory are
    /// inherited.
    pub fn exec<I, S>(factory: impl Into<Arc<F>>, argv: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        Self::exec_with_config(factory, argv, &ResourceConfig::default())
    }

    /// Like [`Process::exec`], with an explicit configuration.
    pub fn exec_with_config<I, S>(
        factory: impl Into<Arc<F>>,
        argv: I,
        config: &ResourceConfig,
    ) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let argv: Vec<OsString> = argv
            .into_iter()
            .map(|arg| arg.as_ref().to_os_string())
            .collect();
        let Some((program, args)) = argv.split_first() else {
            return Err(ResourceError::InvalidArgument(
                "argv must name an executable".to_string(),
            ));
        };
        let program_name = program.to_string_lossy().into_owned();

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| ResourceError::Spawn {
                program: program_name.clone(),
                source,
            })?;

        let (stdin, stdout) = match (child.stdin.take(), child.stdout.take()) {
            (Some(stdin), Some(stdout)) => (stdin, stdout),
            _ => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(ResourceError::Spawn {
                    program: program_name,
                    source: io::Error::other("child stdio pipes unavailable"),
                });
            }
        };

        let pid = child.id();
        let handle = Arc::new(ChildHandle {
            child: Mutex::new(child),
            status: OnceLock::new(),
            pid,
        });
        info!(program = %program_name, pid, "spawned child process");

        let closer = {
            let handle = Arc::clone(&handle);
            move || handle.kill_if_running()
        };
        let config = match &config.label {
            Some(_) => config.clone(),
            None => config.clone().with_label(format!("process-{pid}")),
        };
        let file = File::start(factory.into(), stdout, stdin, Box::new(closer), &config)?;

        let waiter = {
            let handle = Arc::clone(&handle);
            let trigger = file.trigger();
            thread::Builder::new()
                .name(format!("process-{pid}-waiter"))
                .spawn(move || wait_for_exit(&handle, &trigger))
        };
        if let Err(source) = waiter {
            file.close();
            return Err(ResourceError::Task {
                task: "process waiter",
                source,
            });
        }

        Ok(Self {
            file,
            child: handle,
        })
    }

    /// OS process id of the child.
    pub fn id(&self) -> u32 {
        self.child.pid
    }

    /// Exit status of the child, once it has exited and been reaped.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.child.status.get().copied()
    }
}

impl<Req, F> Resource for Process<Req, F>
where
    Req: Message,
    F: MessageFactory,
{
    type Request = Req;
    type Response = F::Response;

    fn write(&self, request: Req) -> Result<()> {
        self.file.write(request)
    }

    fn read(&self) -> Result<F::Response> {
        self.file.read()
    }

    fn close(&self) {
        self.file.close();
    }

    fn lifecycle(&self) -> LifecycleState {
        self.file.lifecycle()
    }

    fn close_reason(&self) -> Option<CloseReason> {
        self.file.close_reason()
    }
}

impl<Req, F: MessageFactory> std::fmt::Debug for Process<Req, F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Process")
            .field("pid", &self.child.pid)
            .field("exit_status", &self.child.status.get())
            .field("file", &self.file)
            .finish()
    }
}

/// Block until the child exits, reap it, then close the resource.
fn wait_for_exit(handle: &ChildHandle, trigger: &CloseTrigger) {
    if let Err(err) = block_until_exited(handle) {
        warn!(pid = handle.pid, error = %err, "waiting for child process failed");
    }

    let reaped = handle.lock().wait();
    match reaped {
        Ok(status) => {
            debug!(pid = handle.pid, %status, "child process exited");
            let _ = handle.status.set(status);
        }
        Err(err) => warn!(pid = handle.pid, error = %err, "reaping child process failed"),
    }

    trigger.fire(CloseReason::ProcessExited);
}

/// Wait for the child to exit without reaping it, so the `Child` lock is
/// free for the closer in the meantime.
#[cfg(unix)]
fn block_until_exited(handle: &ChildHandle) -> io::Result<()> {
    loop {
        // SAFETY: siginfo_t is plain data and waitid only writes into it.
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                handle.pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        match err.raw_os_error() {
            Some(libc::EINTR) => continue,
            // Already reaped through the closer's `try_wait`.
            Some(libc::ECHILD) => return Ok(()),
            _ => return Err(err),
        }
    }
}

#[cfg(not(unix))]
fn block_until_exited(handle: &ChildHandle) -> io::Result<()> {
    loop {
        if handle.lock().try_wait()?.is_some() {
            return Ok(());
        }
        thread::sleep(std::time::Duration::from_millis(50));
    }
}
