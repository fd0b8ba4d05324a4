use std::time::Duration;

use thiserror::Error;

use crate::platform::{NativePlatform, Platform};

#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The caller lacks the elevated rights the whole orchestrator requires;
    /// always fatal to installation.
    #[error("insufficient privileges to modify scheduled tasks: {0}")]
    PermissionDenied(String),
    #[error("host scheduler command could not be run: {0}")]
    Unavailable(String),
    #[error("host scheduler rejected the request: {0}")]
    CommandFailed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskTrigger {
    OnBoot,
    Recurring(Duration),
}

/// One named scheduler entry. Names are deterministic per (store, role) so a
/// repeat install replaces the previous registration instead of accumulating
/// a second one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRegistration {
    pub name: String,
    pub trigger: TaskTrigger,
    pub command: String,
}

impl TaskRegistration {
    pub fn agent_launch(store_id: &str, command: String) -> Self {
        Self {
            name: format!("outpost-agent-{store_id}"),
            trigger: TaskTrigger::OnBoot,
            command,
        }
    }

    pub fn update_cycle(store_id: &str, every: Duration, command: String) -> Self {
        Self {
            name: format!("outpost-update-{store_id}"),
            trigger: TaskTrigger::Recurring(every),
            command,
        }
    }
}

pub trait TaskScheduler {
    /// Replace-register: any prior entry under the same name is superseded.
    fn register(&self, task: &TaskRegistration) -> Result<(), RegistrationError>;

    /// Remove the entry under `name`; removing an absent entry succeeds.
    fn unregister(&self, name: &str) -> Result<(), RegistrationError>;

    fn is_registered(&self, name: &str) -> Result<bool, RegistrationError>;
}

/// The host OS scheduler (`schtasks` on Windows, crontab on Unix), reached
/// through the platform layer.
pub struct NativeScheduler;

fn classify(output: std::process::Output, what: &str) -> Result<(), RegistrationError> {
    if output.status.success() {
        return Ok(());
    }
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    let lowered = stderr.to_lowercase();
    if lowered.contains("denied") || lowered.contains("not allowed") || lowered.contains("permission")
    {
        Err(RegistrationError::PermissionDenied(stderr))
    } else {
        Err(RegistrationError::CommandFailed(format!("{what}: {stderr}")))
    }
}

impl TaskScheduler for NativeScheduler {
    fn register(&self, task: &TaskRegistration) -> Result<(), RegistrationError> {
        let result = match task.trigger {
            TaskTrigger::OnBoot => NativePlatform::create_boot_task(&task.name, &task.command),
            TaskTrigger::Recurring(every) => {
                let minutes = (every.as_secs() / 60).max(1) as u32;
                NativePlatform::create_recurring_task(&task.name, &task.command, minutes)
            }
        };
        let output = result.map_err(|e| RegistrationError::Unavailable(e.to_string()))?;
        classify(output, &task.name)
    }

    fn unregister(&self, name: &str) -> Result<(), RegistrationError> {
        let output = NativePlatform::delete_task(name)
            .map_err(|e| RegistrationError::Unavailable(e.to_string()))?;
        match classify(output, name) {
            // Deleting a registration that is not there converges on the
            // same end state.
            Err(RegistrationError::CommandFailed(msg))
                if msg.to_lowercase().contains("cannot find")
                    || msg.to_lowercase().contains("does not exist") =>
            {
                Ok(())
            }
            other => other,
        }
    }

    fn is_registered(&self, name: &str) -> Result<bool, RegistrationError> {
        NativePlatform::task_exists(name).map_err(|e| RegistrationError::Unavailable(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::test_support::FakeScheduler;

    #[test]
    fn task_names_are_deterministic_per_store_and_role() {
        let a = TaskRegistration::agent_launch("S042", "outpost agent-start".into());
        let u = TaskRegistration::update_cycle(
            "S042",
            Duration::from_secs(3600),
            "outpost update".into(),
        );
        assert_eq!(a.name, "outpost-agent-S042");
        assert_eq!(u.name, "outpost-update-S042");
        assert_ne!(a.name, u.name);
    }

    #[test]
    fn registering_twice_keeps_a_single_entry() {
        let scheduler = FakeScheduler::default();
        let first = TaskRegistration::update_cycle(
            "S1",
            Duration::from_secs(3600),
            "outpost update".into(),
        );
        let second = TaskRegistration::update_cycle(
            "S1",
            Duration::from_secs(1800),
            "outpost update".into(),
        );
        scheduler.register(&first).unwrap();
        scheduler.register(&second).unwrap();

        assert_eq!(scheduler.entry_count(), 1);
        assert_eq!(
            scheduler.entry("outpost-update-S1").unwrap().trigger,
            TaskTrigger::Recurring(Duration::from_secs(1800))
        );
    }

    #[test]
    fn unregistering_an_absent_entry_succeeds() {
        let scheduler = FakeScheduler::default();
        scheduler.unregister("outpost-agent-S1").unwrap();
        assert!(!scheduler.is_registered("outpost-agent-S1").unwrap());
    }

    #[test]
    fn permission_failures_are_surfaced_distinctly() {
        let output = std::process::Output {
            status: exit_status(1),
            stdout: Vec::new(),
            stderr: b"crontab: permission denied".to_vec(),
        };
        assert!(matches!(
            classify(output, "outpost-agent-S1"),
            Err(RegistrationError::PermissionDenied(_))
        ));
    }

    #[cfg(unix)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::unix::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code << 8)
    }

    #[cfg(windows)]
    fn exit_status(code: i32) -> std::process::ExitStatus {
        use std::os::windows::process::ExitStatusExt;
        std::process::ExitStatus::from_raw(code as u32)
    }
}
