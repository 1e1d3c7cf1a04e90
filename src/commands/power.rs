use futures::TryStreamExt;
use std::io::Write;
use tracing::{error, warn};

use crate::app_err::{AppResult, ApplicationError};
use crate::aws_ec2::Ec2Api;
use crate::filter::{require_scope, resolve};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Start,
    Stop,
    Reboot,
}

impl Transition {
    fn verb(self) -> &'static str {
        match self {
            Transition::Start => "start",
            Transition::Stop => "stop",
            Transition::Reboot => "reboot",
        }
    }

    fn progressive(self) -> &'static str {
        match self {
            Transition::Start => "Starting",
            Transition::Stop => "Stopping",
            Transition::Reboot => "Rebooting",
        }
    }

    async fn request(self, api: &dyn Ec2Api, instance_id: &str) -> AppResult<()> {
        match self {
            Transition::Start => api.start_instance(instance_id).await,
            Transition::Stop => api.stop_instance(instance_id).await,
            Transition::Reboot => api.reboot_instance(instance_id).await,
        }
    }
}

#[derive(Debug)]
pub struct FailedInstance {
    pub instance_id: String,
    pub error: ApplicationError,
}

/// Outcome of a command applied to many instances.
#[derive(Debug, Default)]
pub struct BatchReport {
    pub succeeded: Vec<String>,
    pub failed: Vec<FailedInstance>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Requests `transition` for every matched instance without waiting for it
/// to complete. A failed request is reported with the instance id and the
/// remote error, and the remaining instances are still processed.
pub async fn apply_transition(
    api: &dyn Ec2Api,
    project: Option<&str>,
    force: bool,
    transition: Transition,
    out: &mut dyn Write,
) -> AppResult<BatchReport> {
    require_scope(project, force)?;

    let mut report = BatchReport::default();
    let mut instances = resolve(api, project);
    while let Some(instance) = instances.try_next().await? {
        writeln!(out, "{} {}...", transition.progressive(), instance.id)?;

        match transition.request(api, &instance.id).await {
            Ok(()) => report.succeeded.push(instance.id),
            Err(err) => {
                error!(instance_id = %instance.id, error = %err, "could not {}", transition.verb());
                writeln!(out, "Could not {} {} {}", transition.verb(), instance.id, err)?;
                report.failed.push(FailedInstance {
                    instance_id: instance.id,
                    error: err,
                });
            }
        }
    }

    if !report.is_clean() {
        let failed: Vec<String> = report
            .failed
            .iter()
            .map(|f| format!("{} ({})", f.instance_id, f.error))
            .collect();
        warn!(
            succeeded = report.succeeded.len(),
            failed = %failed.join(", "),
            "some instances could not {}",
            transition.verb()
        );
    }

    Ok(report)
}
