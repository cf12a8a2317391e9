use compact_str::CompactString;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use std::os::unix::process::CommandExt;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::peripherals::Peripherals;
use crate::error::ProcessLaunchError;

/// A launched external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessHandle {
    pub command_line: CompactString,
    pub pid: u32,
    /// Substring-matched by [`ProcessSupervisor::kill_all`]
    pub tag: CompactString,
}

struct Tracked {
    handle: ProcessHandle,
    child: Child,
}

#[derive(Default)]
struct ProcessTable {
    running: Vec<Tracked>,
    /// Signalled children not yet reaped
    exiting: Vec<Child>,
    /// Bumped by every kill so pending deferred launches are dropped
    generation: u64,
}

impl ProcessTable {
    /// Collect exit statuses without blocking
    fn reap(&mut self) {
        self.running.retain_mut(|tracked| match tracked.child.try_wait() {
            Ok(Some(status)) => {
                debug!(
                    "Process {} ({}) exited: {}",
                    tracked.handle.pid, tracked.handle.tag, status
                );
                false
            }
            Ok(None) => true,
            Err(e) => {
                warn!("Failed to poll process {}: {}", tracked.handle.pid, e);
                false
            }
        });
        self.exiting
            .retain_mut(|child| matches!(child.try_wait(), Ok(None)));
    }
}

/// Launches, tracks and bulk-terminates example processes.
///
/// Owns the peripherals examples acquire, so killing examples always
/// releases them as well.
pub struct ProcessSupervisor {
    table: Arc<Mutex<ProcessTable>>,
    peripherals: Peripherals,
}

impl ProcessSupervisor {
    pub fn new(peripherals: Peripherals) -> Self {
        Self {
            table: Arc::new(Mutex::new(ProcessTable::default())),
            peripherals,
        }
    }

    /// Spawn `command_line` through the shell without waiting for it
    pub fn launch(&self, command_line: &str, tag: &str) -> Result<ProcessHandle, ProcessLaunchError> {
        let tracked = spawn(command_line, tag)?;
        let handle = tracked.handle.clone();
        info!("Launched '{}' as PID {}", command_line, handle.pid);

        let mut table = self.table.lock();
        table.reap();
        table.running.push(tracked);
        Ok(handle)
    }

    /// Launch after `delay` from a helper thread, unless examples are killed first
    pub fn launch_after(&self, delay: Duration, command_line: &str, tag: &str) {
        let table = Arc::clone(&self.table);
        let generation = table.lock().generation;
        let command_line = command_line.to_string();
        let tag = tag.to_string();

        std::thread::spawn(move || {
            std::thread::sleep(delay);

            let mut table = table.lock();
            if table.generation != generation {
                debug!("Dropping deferred launch of '{}'", command_line);
                return;
            }
            match spawn(&command_line, &tag) {
                Ok(tracked) => {
                    info!("Launched '{}' as PID {}", command_line, tracked.handle.pid);
                    table.running.push(tracked);
                }
                Err(e) => error!("{}", e),
            }
        });
    }

    /// Run a command and wait for it to exit
    pub fn run_to_completion(&self, command_line: &str) -> Result<ExitStatus, ProcessLaunchError> {
        debug!("Running '{}' to completion", command_line);
        Command::new("sh")
            .args(["-c", command_line])
            .stdin(Stdio::null())
            .status()
            .map_err(|source| ProcessLaunchError {
                command: command_line.into(),
                source,
            })
    }

    /// Whether any live tracked process has a tag containing `pattern`
    pub fn is_running(&self, pattern: &str) -> bool {
        let mut table = self.table.lock();
        table.reap();
        table
            .running
            .iter()
            .any(|tracked| tracked.handle.tag.contains(pattern))
    }

    pub fn running(&self) -> Vec<ProcessHandle> {
        let mut table = self.table.lock();
        table.reap();
        table.running.iter().map(|t| t.handle.clone()).collect()
    }

    /// Interrupt every process whose tag contains one of `patterns`, then
    /// release cameras and the live feed. Returns how many were signalled.
    pub fn kill_all<S: AsRef<str>>(&mut self, patterns: &[S]) -> usize {
        let killed = {
            let mut table = self.table.lock();
            table.generation += 1;
            table.reap();

            let (matched, kept): (Vec<Tracked>, Vec<Tracked>) =
                std::mem::take(&mut table.running).into_iter().partition(|tracked| {
                    patterns
                        .iter()
                        .any(|p| tracked.handle.tag.contains(p.as_ref()))
                });
            table.running = kept;

            let count = matched.len();
            for tracked in matched {
                interrupt(&tracked.handle);
                table.exiting.push(tracked.child);
            }
            count
        };

        self.peripherals.release();
        info!("Killed {} example process(es)", killed);
        killed
    }

    /// Interrupt everything tracked (daemon shutdown)
    pub fn terminate_all(&mut self) -> usize {
        // The empty pattern is a substring of every tag
        self.kill_all(&[""])
    }

    pub fn peripherals(&self) -> &Peripherals {
        &self.peripherals
    }

    pub fn peripherals_mut(&mut self) -> &mut Peripherals {
        &mut self.peripherals
    }
}

fn spawn(command_line: &str, tag: &str) -> Result<Tracked, ProcessLaunchError> {
    let child = Command::new("sh")
        .args(["-c", command_line])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .map_err(|source| ProcessLaunchError {
            command: command_line.into(),
            source,
        })?;

    Ok(Tracked {
        handle: ProcessHandle {
            command_line: command_line.into(),
            pid: child.id(),
            tag: tag.into(),
        },
        child,
    })
}

/// SIGINT the whole process group; the shell's children go with it
fn interrupt(handle: &ProcessHandle) {
    let pgid = Pid::from_raw(handle.pid as i32);
    debug!("Sending SIGINT to {} (PGID {})", handle.tag, pgid);
    if let Err(e) = signal::killpg(pgid, Signal::SIGINT) {
        debug!("Process group {} already gone: {}", pgid, e);
    }
}
