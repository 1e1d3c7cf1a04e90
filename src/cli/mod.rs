use clap::{Args as ClapArgs, Parser, Subcommand};
use std::path::PathBuf;

/// Manages EC2 instances, volumes and snapshots.
#[derive(Parser, Debug)]
#[command(name = "shotty", version, about, long_about = None)]
pub struct Args {
    /// AWS profile to use
    #[arg(long, global = true)]
    pub profile: Option<String>,

    /// Region to operate in
    #[arg(long, short('r'), global = true)]
    pub region: Option<String>,

    /// Override the EC2 endpoint, e.g. for a local emulator
    #[arg(long, global = true)]
    pub endpoint_url: Option<String>,

    /// Settings file to read instead of ./settings.toml
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Commands for instances
    #[command(subcommand)]
    Instances(InstancesCommand),

    /// Commands for volumes
    #[command(subcommand)]
    Volumes(VolumesCommand),

    /// Commands for snapshots
    #[command(subcommand)]
    Snapshots(SnapshotsCommand),
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ProjectArg {
    /// Only resources for project (tag Project:<name>)
    #[arg(long)]
    pub project: Option<String>,
}

#[derive(ClapArgs, Debug, Clone)]
pub struct ScopeArgs {
    /// Only instances for project (tag Project:<name>)
    #[arg(long)]
    pub project: Option<String>,

    /// Forces command to be executed without --project set
    #[arg(long, default_value_t = false)]
    pub force: bool,
}

#[derive(Subcommand, Debug)]
pub enum InstancesCommand {
    /// List EC2 instances
    List(ProjectArg),
    /// Start EC2 instances
    Start(ScopeArgs),
    /// Stop EC2 instances
    Stop(ScopeArgs),
    /// Reboot EC2 instances
    Reboot(ScopeArgs),
    /// Create snapshots of all volumes
    Snapshot(ScopeArgs),
}

impl Command {
    /// Scope flags of the commands that mutate instances.
    pub fn mutation_scope(&self) -> Option<&ScopeArgs> {
        match self {
            Command::Instances(
                InstancesCommand::Start(scope)
                | InstancesCommand::Stop(scope)
                | InstancesCommand::Reboot(scope)
                | InstancesCommand::Snapshot(scope),
            ) => Some(scope),
            _ => None,
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum VolumesCommand {
    /// List EC2 volumes
    List(ProjectArg),
}

#[derive(Subcommand, Debug)]
pub enum SnapshotsCommand {
    /// List EC2 snapshots
    List {
        #[command(flatten)]
        project: ProjectArg,

        /// List all snapshots for each volume, not just the most recent
        #[arg(long = "all", default_value_t = false)]
        list_all: bool,
    },
}
