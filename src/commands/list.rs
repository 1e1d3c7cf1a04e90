use futures::TryStreamExt;
use std::io::Write;

use super::write_row;
use crate::app_err::AppResult;
use crate::aws_ec2::Ec2Api;
use crate::aws_ec2::model::{Instance, Snapshot, SnapshotState, Volume};
use crate::filter::resolve;

fn encryption_label(volume: &Volume) -> &'static str {
    if volume.encrypted {
        "Encrypted"
    } else {
        "Not Encrypted"
    }
}

fn write_instance(out: &mut dyn Write, instance: &Instance) -> AppResult<()> {
    write_row(
        out,
        &[
            instance.id.as_str(),
            instance.instance_type.as_str(),
            instance.availability_zone.as_str(),
            instance.state.as_str(),
            instance.public_dns_name.as_str(),
            instance.tags.project_label(),
        ],
    )
}

fn write_volume(out: &mut dyn Write, instance: &Instance, volume: &Volume) -> AppResult<()> {
    write_row(
        out,
        &[
            volume.id.as_str(),
            instance.id.as_str(),
            volume.state.as_str(),
            format!("{}GiB", volume.size).as_str(),
            encryption_label(volume),
        ],
    )
}

fn write_snapshot(
    out: &mut dyn Write,
    instance: &Instance,
    volume: &Volume,
    snapshot: &Snapshot,
) -> AppResult<()> {
    write_row(
        out,
        &[
            snapshot.id.as_str(),
            volume.id.as_str(),
            instance.id.as_str(),
            snapshot.state.as_str(),
            snapshot.progress.as_str(),
            snapshot.start_time.format("%c").to_string().as_str(),
        ],
    )
}

pub async fn list_instances(
    api: &dyn Ec2Api,
    project: Option<&str>,
    out: &mut dyn Write,
) -> AppResult<()> {
    let mut instances = resolve(api, project);
    while let Some(instance) = instances.try_next().await? {
        write_instance(out, &instance)?;
    }
    Ok(())
}

pub async fn list_volumes(
    api: &dyn Ec2Api,
    project: Option<&str>,
    out: &mut dyn Write,
) -> AppResult<()> {
    let mut instances = resolve(api, project);
    while let Some(instance) = instances.try_next().await? {
        for volume in api.instance_volumes(&instance.id).await? {
            write_volume(out, &instance, &volume)?;
        }
    }
    Ok(())
}

/// Prints snapshots newest first. Unless `list_all` is set, each volume stops
/// after its most recent completed snapshot.
pub async fn list_snapshots(
    api: &dyn Ec2Api,
    project: Option<&str>,
    list_all: bool,
    out: &mut dyn Write,
) -> AppResult<()> {
    let mut instances = resolve(api, project);
    while let Some(instance) = instances.try_next().await? {
        for volume in api.instance_volumes(&instance.id).await? {
            for snapshot in api.volume_snapshots(&volume.id).await? {
                write_snapshot(out, &instance, &volume, &snapshot)?;

                if snapshot.state == SnapshotState::Completed && !list_all {
                    break;
                }
            }
        }
    }
    Ok(())
}
