use crate::platforms::ProcessControl;
use crate::AutomationError;
use std::collections::HashMap;
use std::path::Path;
use std::process::{Child, Command};
use std::sync::Mutex;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tracing::{debug, info};

/// Processes spawned through std, with sysinfo as the fallback for pids we
/// did not spawn (the target may hand off to an already-running instance).
#[derive(Debug, Default)]
pub struct NativeProcesses {
    children: Mutex<HashMap<u32, Child>>,
}

impl NativeProcesses {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<u32, Child>>, AutomationError> {
        self.children
            .lock()
            .map_err(|_| AutomationError::PlatformError("process table lock poisoned".to_string()))
    }

    fn system_process_running(pid: u32) -> bool {
        let mut system = System::new();
        let pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
        system.process(pid).is_some()
    }
}

impl ProcessControl for NativeProcesses {
    fn spawn(&self, program: &Path, args: &[String]) -> Result<u32, AutomationError> {
        info!("Launching {} {:?}", program.display(), args);
        let child = Command::new(program).args(args).spawn()?;
        let pid = child.id();
        self.lock()?.insert(pid, child);
        Ok(pid)
    }

    fn is_running(&self, pid: u32) -> bool {
        if let Ok(mut children) = self.lock() {
            if let Some(child) = children.get_mut(&pid) {
                return matches!(child.try_wait(), Ok(None));
            }
        }
        Self::system_process_running(pid)
    }

    fn kill(&self, pid: u32) -> Result<(), AutomationError> {
        if let Some(mut child) = self.lock()?.remove(&pid) {
            child.kill()?;
            let _ = child.wait();
            debug!("Killed spawned process {}", pid);
            return Ok(());
        }
        let mut system = System::new();
        let sys_pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[sys_pid]), true);
        match system.process(sys_pid) {
            Some(process) if process.kill() => {
                debug!("Killed process {} via sysinfo", pid);
                Ok(())
            }
            Some(_) => Err(AutomationError::PlatformError(format!(
                "Failed to kill process {pid}"
            ))),
            None => Ok(()),
        }
    }
}
