pub mod model;

#[cfg(test)]
pub mod fake;

use async_trait::async_trait;
use aws_sdk_ec2::client::Waiters;
use aws_sdk_ec2::error::DisplayErrorContext;
use aws_sdk_ec2::waiters::instance_running::WaitUntilInstanceRunningError;
use aws_sdk_ec2::waiters::instance_stopped::WaitUntilInstanceStoppedError;
use aws_sdk_ec2::{Client, types::Filter};
use aws_types::SdkConfig;
use std::time::Duration;
use tracing::debug;

use crate::app_err::{AppResult, ApplicationError};
use model::{Instance, InstanceState, Page, Snapshot, Volume};

/// Which instances a listing should return.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceFilter {
    All,
    Project(String),
}

impl InstanceFilter {
    pub fn from_project(project: Option<&str>) -> Self {
        match project {
            Some(name) => InstanceFilter::Project(name.to_string()),
            None => InstanceFilter::All,
        }
    }

    fn to_filters(&self) -> Option<Vec<Filter>> {
        match self {
            InstanceFilter::All => None,
            InstanceFilter::Project(name) => Some(vec![
                Filter::builder()
                    .name(format!("tag:{}", model::PROJECT_TAG))
                    .values(name)
                    .build(),
            ]),
        }
    }
}

/// Remote operations the command handlers depend on.
#[async_trait]
pub trait Ec2Api: Send + Sync {
    async fn describe_instances(
        &self,
        filter: &InstanceFilter,
        next_token: Option<String>,
    ) -> AppResult<Page<Instance>>;

    async fn instance_volumes(&self, instance_id: &str) -> AppResult<Vec<Volume>>;

    /// Snapshots of a volume, newest first.
    async fn volume_snapshots(&self, volume_id: &str) -> AppResult<Vec<Snapshot>>;

    async fn start_instance(&self, instance_id: &str) -> AppResult<()>;

    async fn stop_instance(&self, instance_id: &str) -> AppResult<()>;

    async fn reboot_instance(&self, instance_id: &str) -> AppResult<()>;

    /// Blocks until the instance is stopped, for at most `timeout`.
    async fn wait_until_stopped(&self, instance_id: &str, timeout: Duration) -> AppResult<()>;

    /// Blocks until the instance is running, for at most `timeout`.
    async fn wait_until_running(&self, instance_id: &str, timeout: Duration) -> AppResult<()>;

    /// Requests a snapshot and returns its id without waiting for completion.
    async fn create_snapshot(&self, volume_id: &str, description: &str) -> AppResult<String>;
}

fn wait_timeout(instance_id: &str, target: InstanceState, waited: Duration) -> ApplicationError {
    ApplicationError::WaitTimeout {
        instance_id: instance_id.to_string(),
        target: target.to_string(),
        waited,
    }
}

pub struct Ec2Service {
    client: Client,
}

impl Ec2Service {
    pub fn new(aws_sdk_config: &SdkConfig, custom_endpoint_url: Option<String>) -> Self {
        let mut ec2_config_builder = aws_sdk_ec2::config::Builder::from(aws_sdk_config);

        if let Some(endpoint) = custom_endpoint_url {
            debug!(%endpoint, "using custom EC2 endpoint");
            ec2_config_builder = ec2_config_builder.endpoint_url(endpoint);
        }

        Ec2Service {
            client: Client::from_conf(ec2_config_builder.build()),
        }
    }

    async fn current_state(&self, instance_id: &str) -> AppResult<InstanceState> {
        let output = self
            .client
            .describe_instances()
            .instance_ids(instance_id)
            .send()
            .await?;

        output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .map(Instance::from)
            .find(|instance| instance.id == instance_id)
            .map(|instance| instance.state)
            .ok_or_else(|| ApplicationError::aws(format!("instance {} not found", instance_id)))
    }

    /// Names the state a waiter gave up on.
    async fn unexpected_state(&self, instance_id: &str, target: InstanceState) -> ApplicationError {
        let state = match self.current_state(instance_id).await {
            Ok(state) => state.to_string(),
            Err(_) => "unknown".to_string(),
        };
        ApplicationError::UnexpectedState {
            instance_id: instance_id.to_string(),
            state,
            target: target.to_string(),
        }
    }
}

#[async_trait]
impl Ec2Api for Ec2Service {
    async fn describe_instances(
        &self,
        filter: &InstanceFilter,
        next_token: Option<String>,
    ) -> AppResult<Page<Instance>> {
        debug!(?filter, ?next_token, "describe_instances");
        let output = self
            .client
            .describe_instances()
            .set_filters(filter.to_filters())
            .set_next_token(next_token)
            .send()
            .await?;

        let items = output
            .reservations()
            .iter()
            .flat_map(|reservation| reservation.instances())
            .map(Instance::from)
            .collect();

        Ok(Page {
            items,
            next_token: output
                .next_token()
                .filter(|token| !token.is_empty())
                .map(String::from),
        })
    }

    async fn instance_volumes(&self, instance_id: &str) -> AppResult<Vec<Volume>> {
        debug!(instance_id, "describe_volumes");
        let volumes = self
            .client
            .describe_volumes()
            .filters(
                Filter::builder()
                    .name("attachment.instance-id")
                    .values(instance_id)
                    .build(),
            )
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await?;

        Ok(volumes.iter().map(Volume::from).collect())
    }

    async fn volume_snapshots(&self, volume_id: &str) -> AppResult<Vec<Snapshot>> {
        debug!(volume_id, "describe_snapshots");
        let snapshots = self
            .client
            .describe_snapshots()
            .filters(Filter::builder().name("volume-id").values(volume_id).build())
            .into_paginator()
            .items()
            .send()
            .collect::<Result<Vec<_>, _>>()
            .await?;

        let mut snapshots: Vec<Snapshot> = snapshots.iter().map(Snapshot::from).collect();
        snapshots.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        Ok(snapshots)
    }

    async fn start_instance(&self, instance_id: &str) -> AppResult<()> {
        self.client
            .start_instances()
            .instance_ids(instance_id)
            .send()
            .await?;
        Ok(())
    }

    async fn stop_instance(&self, instance_id: &str) -> AppResult<()> {
        self.client
            .stop_instances()
            .instance_ids(instance_id)
            .send()
            .await?;
        Ok(())
    }

    async fn reboot_instance(&self, instance_id: &str) -> AppResult<()> {
        self.client
            .reboot_instances()
            .instance_ids(instance_id)
            .send()
            .await?;
        Ok(())
    }

    async fn wait_until_stopped(&self, instance_id: &str, timeout: Duration) -> AppResult<()> {
        debug!(instance_id, ?timeout, "waiting for instance to stop");
        let result = self
            .client
            .wait_until_instance_stopped()
            .instance_ids(instance_id)
            .wait(timeout)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(WaitUntilInstanceStoppedError::ExceededMaxWait(_)) => {
                Err(wait_timeout(instance_id, InstanceState::Stopped, timeout))
            }
            Err(WaitUntilInstanceStoppedError::FailureState(_)) => {
                Err(self.unexpected_state(instance_id, InstanceState::Stopped).await)
            }
            Err(err) => Err(ApplicationError::aws(DisplayErrorContext(&err).to_string())),
        }
    }

    async fn wait_until_running(&self, instance_id: &str, timeout: Duration) -> AppResult<()> {
        debug!(instance_id, ?timeout, "waiting for instance to run");
        let result = self
            .client
            .wait_until_instance_running()
            .instance_ids(instance_id)
            .wait(timeout)
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(WaitUntilInstanceRunningError::ExceededMaxWait(_)) => {
                Err(wait_timeout(instance_id, InstanceState::Running, timeout))
            }
            Err(WaitUntilInstanceRunningError::FailureState(_)) => {
                Err(self.unexpected_state(instance_id, InstanceState::Running).await)
            }
            Err(err) => Err(ApplicationError::aws(DisplayErrorContext(&err).to_string())),
        }
    }

    async fn create_snapshot(&self, volume_id: &str, description: &str) -> AppResult<String> {
        let output = self
            .client
            .create_snapshot()
            .volume_id(volume_id)
            .description(description)
            .send()
            .await?;

        Ok(output.snapshot_id().unwrap_or_default().to_string())
    }
}
