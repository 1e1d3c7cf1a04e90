use futures::TryStreamExt;
use std::io::Write;
use std::time::Duration;
use tracing::{info, warn};

use crate::app_err::{AppResult, ApplicationError};
use crate::aws_ec2::Ec2Api;
use crate::aws_ec2::model::{Snapshot, SnapshotState, Volume};
use crate::filter::{require_scope, resolve};

pub const DEFAULT_DESCRIPTION: &str = "Created by snapshot program";
pub const DEFAULT_WAIT_TIMEOUT: Duration = Duration::from_secs(900);

#[derive(Debug, Clone)]
pub struct SnapshotOptions {
    pub description: String,
    /// Upper bound on each stop and start wait.
    pub wait_timeout: Duration,
}

impl Default for SnapshotOptions {
    fn default() -> Self {
        SnapshotOptions {
            description: DEFAULT_DESCRIPTION.to_string(),
            wait_timeout: DEFAULT_WAIT_TIMEOUT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedSnapshot {
    pub volume_id: String,
    pub snapshot_id: String,
}

#[derive(Debug, Default)]
pub struct SnapshotReport {
    /// Instances that were stopped and started again.
    pub cycled: Vec<String>,
    pub created: Vec<CreatedSnapshot>,
    pub skipped: Vec<String>,
}

/// Only the newest snapshot is inspected; an older snapshot that is still
/// pending does not count.
async fn pending_snapshot(api: &dyn Ec2Api, volume: &Volume) -> AppResult<Option<Snapshot>> {
    let snapshots = api.volume_snapshots(&volume.id).await?;
    Ok(snapshots
        .into_iter()
        .next()
        .filter(|newest| newest.state == SnapshotState::Pending))
}

async fn snapshot_volumes(
    api: &dyn Ec2Api,
    instance_id: &str,
    options: &SnapshotOptions,
    report: &mut SnapshotReport,
    out: &mut dyn Write,
) -> AppResult<()> {
    for volume in api.instance_volumes(instance_id).await? {
        if let Some(pending) = pending_snapshot(api, &volume).await? {
            info!(
                volume_id = %volume.id,
                snapshot_id = %pending.id,
                description = %pending.description,
                progress = %pending.progress,
                "snapshot already in progress"
            );
            writeln!(out, "   Skipping {}, snapshot already in progress", volume.id)?;
            report.skipped.push(volume.id);
            continue;
        }

        writeln!(out, "Creating snapshot for {}", volume.id)?;
        let snapshot_id = api.create_snapshot(&volume.id, &options.description).await?;
        report.created.push(CreatedSnapshot {
            volume_id: volume.id,
            snapshot_id,
        });
    }
    Ok(())
}

async fn cycle_instance(
    api: &dyn Ec2Api,
    instance_id: &str,
    options: &SnapshotOptions,
    report: &mut SnapshotReport,
    out: &mut dyn Write,
) -> AppResult<()> {
    writeln!(out, "Stopping {}...", instance_id)?;
    api.stop_instance(instance_id).await?;
    api.wait_until_stopped(instance_id, options.wait_timeout).await?;

    if let Err(err) = snapshot_volumes(api, instance_id, options, report, out).await {
        // The instance is stopped because of us; ask for it back before bailing.
        if let Err(start_err) = api.start_instance(instance_id).await {
            warn!(instance_id, error = %start_err, "could not restart instance after failure");
        }
        return Err(err);
    }

    writeln!(out, "Starting {}...", instance_id)?;
    api.start_instance(instance_id).await?;
    api.wait_until_running(instance_id, options.wait_timeout).await?;

    report.cycled.push(instance_id.to_string());
    Ok(())
}

/// Stops each matched instance, snapshots its volumes and starts it again,
/// one instance at a time. The first failure aborts the run; later instances
/// are left untouched.
pub async fn snapshot_all(
    api: &dyn Ec2Api,
    project: Option<&str>,
    force: bool,
    options: &SnapshotOptions,
    out: &mut dyn Write,
) -> AppResult<SnapshotReport> {
    require_scope(project, force)?;

    let mut report = SnapshotReport::default();
    let mut instances = resolve(api, project);
    while let Some(instance) = instances.try_next().await? {
        cycle_instance(api, &instance.id, options, &mut report, out)
            .await
            .map_err(|err| ApplicationError::SnapshotAborted {
                instance_id: instance.id.clone(),
                source: Box::new(err),
            })?;
    }

    writeln!(out, "Snapshot initialization is complete")?;
    Ok(report)
}
