use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;

pub const PROJECT_TAG: &str = "Project";
pub const NO_PROJECT: &str = "<no project>";

/// Instance tags keyed by tag name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tags(BTreeMap<String, String>);

impl Tags {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn project(&self) -> Option<&str> {
        self.get(PROJECT_TAG)
    }

    pub fn project_label(&self) -> &str {
        self.project().unwrap_or(NO_PROJECT)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Tags {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Tags(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
    Other(String),
}

impl InstanceState {
    pub fn as_str(&self) -> &str {
        match self {
            InstanceState::Pending => "pending",
            InstanceState::Running => "running",
            InstanceState::ShuttingDown => "shutting-down",
            InstanceState::Terminated => "terminated",
            InstanceState::Stopping => "stopping",
            InstanceState::Stopped => "stopped",
            InstanceState::Other(name) => name,
        }
    }
}

impl From<&str> for InstanceState {
    fn from(name: &str) -> Self {
        match name {
            "pending" => InstanceState::Pending,
            "running" => InstanceState::Running,
            "shutting-down" => InstanceState::ShuttingDown,
            "terminated" => InstanceState::Terminated,
            "stopping" => InstanceState::Stopping,
            "stopped" => InstanceState::Stopped,
            other => InstanceState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for InstanceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotState {
    Pending,
    Completed,
    Error,
    Other(String),
}

impl SnapshotState {
    pub fn as_str(&self) -> &str {
        match self {
            SnapshotState::Pending => "pending",
            SnapshotState::Completed => "completed",
            SnapshotState::Error => "error",
            SnapshotState::Other(name) => name,
        }
    }
}

impl From<&str> for SnapshotState {
    fn from(name: &str) -> Self {
        match name {
            "pending" => SnapshotState::Pending,
            "completed" => SnapshotState::Completed,
            "error" => SnapshotState::Error,
            other => SnapshotState::Other(other.to_string()),
        }
    }
}

impl fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub instance_type: String,
    pub availability_zone: String,
    pub state: InstanceState,
    /// Empty while the instance has no public address, e.g. when stopped.
    pub public_dns_name: String,
    pub tags: Tags,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Volume {
    pub id: String,
    pub state: String,
    /// Size in GiB.
    pub size: i32,
    pub encrypted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub id: String,
    pub volume_id: String,
    pub state: SnapshotState,
    pub progress: String,
    pub start_time: DateTime<Utc>,
    pub description: String,
}

/// One page of a paginated listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_token: Option<String>,
}

impl From<&aws_sdk_ec2::types::Instance> for Instance {
    fn from(instance: &aws_sdk_ec2::types::Instance) -> Self {
        Instance {
            id: instance.instance_id().unwrap_or_default().to_string(),
            instance_type: instance
                .instance_type()
                .map(|t| t.as_str().to_string())
                .unwrap_or_default(),
            availability_zone: instance
                .placement()
                .and_then(|p| p.availability_zone())
                .unwrap_or_default()
                .to_string(),
            state: instance
                .state()
                .and_then(|s| s.name())
                .map(|n| InstanceState::from(n.as_str()))
                .unwrap_or_else(|| InstanceState::Other(String::new())),
            public_dns_name: instance.public_dns_name().unwrap_or_default().to_string(),
            tags: instance
                .tags()
                .iter()
                .filter_map(|t| Some((t.key()?, t.value().unwrap_or_default())))
                .collect(),
        }
    }
}

impl From<&aws_sdk_ec2::types::Volume> for Volume {
    fn from(volume: &aws_sdk_ec2::types::Volume) -> Self {
        Volume {
            id: volume.volume_id().unwrap_or_default().to_string(),
            state: volume
                .state()
                .map(|s| s.as_str().to_string())
                .unwrap_or_default(),
            size: volume.size().unwrap_or_default(),
            encrypted: volume.encrypted().unwrap_or_default(),
        }
    }
}

impl From<&aws_sdk_ec2::types::Snapshot> for Snapshot {
    fn from(snapshot: &aws_sdk_ec2::types::Snapshot) -> Self {
        let start_time = snapshot
            .start_time()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
            .unwrap_or_default();

        Snapshot {
            id: snapshot.snapshot_id().unwrap_or_default().to_string(),
            volume_id: snapshot.volume_id().unwrap_or_default().to_string(),
            state: snapshot
                .state()
                .map(|s| SnapshotState::from(s.as_str()))
                .unwrap_or_else(|| SnapshotState::Other(String::new())),
            progress: snapshot.progress().unwrap_or_default().to_string(),
            start_time,
            description: snapshot.description().unwrap_or_default().to_string(),
        }
    }
}
