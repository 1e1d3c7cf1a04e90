//! In-memory `Ec2Api` used by the test suite.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use super::model::{Instance, InstanceState, Page, Snapshot, SnapshotState, Tags, Volume};
use super::{Ec2Api, InstanceFilter};
use crate::app_err::{AppResult, ApplicationError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    DescribeInstances,
    WaitStopped(String, Duration),
    WaitRunning(String, Duration),
    Volumes(String),
    Snapshots(String),
    Start(String),
    Stop(String),
    Reboot(String),
    CreateSnapshot(String),
}

impl Call {
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Call::Start(_) | Call::Stop(_) | Call::Reboot(_) | Call::CreateSnapshot(_)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Start,
    Stop,
    Reboot,
    CreateSnapshot,
}

pub struct FakeVolume {
    volume: Volume,
    snapshots: Vec<Snapshot>,
}

impl FakeVolume {
    pub fn new(id: &str) -> Self {
        FakeVolume {
            volume: Volume {
                id: id.to_string(),
                state: "in-use".to_string(),
                size: 8,
                encrypted: false,
            },
            snapshots: Vec::new(),
        }
    }

    pub fn size(mut self, size: i32) -> Self {
        self.volume.size = size;
        self
    }

    pub fn encrypted(mut self) -> Self {
        self.volume.encrypted = true;
        self
    }

    /// Appends an older snapshot; call in newest-first order.
    pub fn snapshot(mut self, id: &str, state: SnapshotState) -> Self {
        let age = self.snapshots.len() as i64;
        let progress = match state {
            SnapshotState::Completed => "100%",
            _ => "42%",
        };
        self.snapshots.push(Snapshot {
            id: id.to_string(),
            volume_id: self.volume.id.clone(),
            state,
            progress: progress.to_string(),
            start_time: base_time() - TimeDelta::days(age),
            description: String::new(),
        });
        self
    }
}

pub struct FakeInstance {
    instance: Instance,
    volumes: Vec<FakeVolume>,
}

impl FakeInstance {
    pub fn new(id: &str) -> Self {
        FakeInstance {
            instance: Instance {
                id: id.to_string(),
                instance_type: "t2.micro".to_string(),
                availability_zone: "us-east-1a".to_string(),
                state: InstanceState::Running,
                public_dns_name: format!("{}.compute.amazonaws.com", id),
                tags: Tags::default(),
            },
            volumes: Vec::new(),
        }
    }

    pub fn project(mut self, project: &str) -> Self {
        self.instance.tags = [("Project", project)].into_iter().collect();
        self
    }

    pub fn state(mut self, state: InstanceState) -> Self {
        if state == InstanceState::Stopped {
            self.instance.public_dns_name.clear();
        }
        self.instance.state = state;
        self
    }

    pub fn volume(mut self, volume: FakeVolume) -> Self {
        self.volumes.push(volume);
        self
    }
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap()
}

#[derive(Default)]
struct FakeState {
    instances: Vec<FakeInstance>,
    calls: Vec<Call>,
    scripted: HashMap<String, Vec<InstanceState>>,
    frozen: HashSet<String>,
    failures: HashMap<(Op, String), String>,
    page_size: Option<usize>,
    created: usize,
}

impl FakeState {
    fn instance_mut(&mut self, instance_id: &str) -> AppResult<&mut FakeInstance> {
        self.instances
            .iter_mut()
            .find(|i| i.instance.id == instance_id)
            .ok_or_else(|| ApplicationError::aws(format!("InvalidInstanceID.NotFound: {}", instance_id)))
    }

    fn check_failure(&self, op: Op, id: &str) -> AppResult<()> {
        match self.failures.get(&(op, id.to_string())) {
            Some(message) => Err(ApplicationError::aws(message.clone())),
            None => Ok(()),
        }
    }

    fn transition(&mut self, op: Op, instance_id: &str, settled: InstanceState, moving: InstanceState) -> AppResult<()> {
        self.check_failure(op, instance_id)?;
        let frozen = self.frozen.contains(instance_id);
        let instance = self.instance_mut(instance_id)?;
        instance.instance.state = if frozen { moving } else { settled };
        Ok(())
    }

    /// Resolves a wait the way the SDK waiters do: scripted states are
    /// observed in order, then the instance's current state decides.
    fn settle(&mut self, instance_id: &str, target: InstanceState, timeout: Duration) -> AppResult<()> {
        let mut observed: Vec<InstanceState> = self
            .scripted
            .remove(instance_id)
            .unwrap_or_default();
        observed.push(self.instance_mut(instance_id)?.instance.state.clone());

        for state in observed {
            if state == target {
                return Ok(());
            }
            if is_failure_state(&target, &state) {
                return Err(ApplicationError::UnexpectedState {
                    instance_id: instance_id.to_string(),
                    state: state.to_string(),
                    target: target.to_string(),
                });
            }
        }

        Err(ApplicationError::WaitTimeout {
            instance_id: instance_id.to_string(),
            target: target.to_string(),
            waited: timeout,
        })
    }
}

/// Same failure acceptors as `instance_stopped` and `instance_running`.
fn is_failure_state(target: &InstanceState, state: &InstanceState) -> bool {
    match target {
        InstanceState::Stopped => matches!(state, InstanceState::Pending | InstanceState::Terminated),
        InstanceState::Running => matches!(
            state,
            InstanceState::ShuttingDown | InstanceState::Terminated | InstanceState::Stopping
        ),
        _ => false,
    }
}

/// Supports a trailing `*` wildcard, like EC2 tag filters.
fn filter_matches(pattern: &str, value: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => value.starts_with(prefix),
        None => pattern == value,
    }
}

pub struct FakeEc2 {
    state: Mutex<FakeState>,
}

impl FakeEc2 {
    pub fn new(instances: Vec<FakeInstance>) -> Self {
        FakeEc2 {
            state: Mutex::new(FakeState {
                instances,
                ..FakeState::default()
            }),
        }
    }

    pub fn with_page_size(self, page_size: usize) -> Self {
        self.state.lock().unwrap().page_size = Some(page_size);
        self
    }

    pub fn fail(&self, op: Op, id: &str, message: &str) {
        self.state
            .lock()
            .unwrap()
            .failures
            .insert((op, id.to_string()), message.to_string());
    }

    /// States the next wait on this instance observes before its current one.
    pub fn script_states(&self, instance_id: &str, states: Vec<InstanceState>) {
        self.state
            .lock()
            .unwrap()
            .scripted
            .insert(instance_id.to_string(), states);
    }

    /// Transitions requested for this instance never settle.
    pub fn freeze_state(&self, instance_id: &str) {
        self.state.lock().unwrap().frozen.insert(instance_id.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls().into_iter().filter(Call::is_mutation).collect()
    }

    pub fn waits(&self, instance_id: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| match c {
                Call::WaitStopped(id, _) | Call::WaitRunning(id, _) => id == instance_id,
                _ => false,
            })
            .count()
    }

    pub fn current_state(&self, instance_id: &str) -> Option<InstanceState> {
        self.state
            .lock()
            .unwrap()
            .instances
            .iter()
            .find(|i| i.instance.id == instance_id)
            .map(|i| i.instance.state.clone())
    }

    pub fn add_instance(&self, instance: FakeInstance) {
        self.state.lock().unwrap().instances.push(instance);
    }
}

#[async_trait]
impl Ec2Api for FakeEc2 {
    async fn describe_instances(
        &self,
        filter: &InstanceFilter,
        next_token: Option<String>,
    ) -> AppResult<Page<Instance>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::DescribeInstances);

        let matching: Vec<Instance> = state
            .instances
            .iter()
            .map(|i| i.instance.clone())
            .filter(|i| match filter {
                InstanceFilter::All => true,
                InstanceFilter::Project(name) => i
                    .tags
                    .project()
                    .is_some_and(|value| filter_matches(name, value)),
            })
            .collect();

        let offset: usize = next_token.as_deref().map_or(0, |t| t.parse().unwrap());
        let page_size = state.page_size.unwrap_or(usize::MAX);
        let end = offset.saturating_add(page_size).min(matching.len());

        Ok(Page {
            items: matching[offset..end].to_vec(),
            next_token: (end < matching.len()).then(|| end.to_string()),
        })
    }

    async fn instance_volumes(&self, instance_id: &str) -> AppResult<Vec<Volume>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Volumes(instance_id.to_string()));
        let instance = state.instance_mut(instance_id)?;
        Ok(instance.volumes.iter().map(|v| v.volume.clone()).collect())
    }

    async fn volume_snapshots(&self, volume_id: &str) -> AppResult<Vec<Snapshot>> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Snapshots(volume_id.to_string()));
        Ok(state
            .instances
            .iter()
            .flat_map(|i| i.volumes.iter())
            .filter(|v| v.volume.id == volume_id)
            .flat_map(|v| v.snapshots.iter().cloned())
            .collect())
    }

    async fn start_instance(&self, instance_id: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Start(instance_id.to_string()));
        state.transition(Op::Start, instance_id, InstanceState::Running, InstanceState::Pending)
    }

    async fn stop_instance(&self, instance_id: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Stop(instance_id.to_string()));
        state.transition(Op::Stop, instance_id, InstanceState::Stopped, InstanceState::Stopping)
    }

    async fn reboot_instance(&self, instance_id: &str) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::Reboot(instance_id.to_string()));
        state.check_failure(Op::Reboot, instance_id)
    }

    async fn wait_until_stopped(&self, instance_id: &str, timeout: Duration) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::WaitStopped(instance_id.to_string(), timeout));
        state.settle(instance_id, InstanceState::Stopped, timeout)
    }

    async fn wait_until_running(&self, instance_id: &str, timeout: Duration) -> AppResult<()> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::WaitRunning(instance_id.to_string(), timeout));
        state.settle(instance_id, InstanceState::Running, timeout)
    }

    async fn create_snapshot(&self, volume_id: &str, description: &str) -> AppResult<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(Call::CreateSnapshot(volume_id.to_string()));
        state.check_failure(Op::CreateSnapshot, volume_id)?;

        state.created += 1;
        let snapshot_id = format!("snap-new-{}", state.created);
        let volume = state
            .instances
            .iter_mut()
            .flat_map(|i| i.volumes.iter_mut())
            .find(|v| v.volume.id == volume_id)
            .ok_or_else(|| ApplicationError::aws(format!("InvalidVolume.NotFound: {}", volume_id)))?;

        volume.snapshots.insert(
            0,
            Snapshot {
                id: snapshot_id.clone(),
                volume_id: volume_id.to_string(),
                state: SnapshotState::Pending,
                progress: "0%".to_string(),
                start_time: base_time() + TimeDelta::hours(1),
                description: description.to_string(),
            },
        );
        Ok(snapshot_id)
    }
}
