mod app_err;
mod aws_authentication;
mod aws_ec2;
mod cli;
mod commands;
mod filter;
mod settings;


use app_err::AppResult;
use aws_authentication::get_config;
use aws_ec2::{Ec2Api, Ec2Service};
use clap::Parser;
use cli::{Args, Command, InstancesCommand, SnapshotsCommand, VolumesCommand};
use commands::power::{Transition, apply_transition};
use commands::{list, snapshot};
use settings::AppSettings;
use std::io::Write;
use std::process::ExitCode;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

async fn dispatch(
    ec2: &dyn Ec2Api,
    app_settings: &AppSettings,
    command: Command,
    out: &mut dyn Write,
) -> AppResult<()> {
    match command {
        Command::Instances(InstancesCommand::List(arg)) => {
            list::list_instances(ec2, arg.project.as_deref(), out).await
        }
        Command::Instances(InstancesCommand::Start(scope)) => {
            apply_transition(ec2, scope.project.as_deref(), scope.force, Transition::Start, out)
                .await
                .map(|_| ())
        }
        Command::Instances(InstancesCommand::Stop(scope)) => {
            apply_transition(ec2, scope.project.as_deref(), scope.force, Transition::Stop, out)
                .await
                .map(|_| ())
        }
        Command::Instances(InstancesCommand::Reboot(scope)) => {
            apply_transition(ec2, scope.project.as_deref(), scope.force, Transition::Reboot, out)
                .await
                .map(|_| ())
        }
        Command::Instances(InstancesCommand::Snapshot(scope)) => {
            let report = snapshot::snapshot_all(
                ec2,
                scope.project.as_deref(),
                scope.force,
                &app_settings.snapshot_options(),
                out,
            )
            .await?;
            for created in &report.created {
                debug!(volume_id = %created.volume_id, snapshot_id = %created.snapshot_id, "snapshot requested");
            }
            debug!(
                instances = report.cycled.len(),
                created = report.created.len(),
                skipped = report.skipped.len(),
                "snapshot run finished"
            );
            Ok(())
        }
        Command::Volumes(VolumesCommand::List(arg)) => {
            list::list_volumes(ec2, arg.project.as_deref(), out).await
        }
        Command::Snapshots(SnapshotsCommand::List { project, list_all }) => {
            list::list_snapshots(ec2, project.project.as_deref(), list_all, out).await
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    init_tracing(args.verbose);

    let mut app_settings = match AppSettings::load(args.config.as_deref()) {
        Ok(app_settings) => app_settings,
        Err(err) => {
            eprintln!("Error: {}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Some(profile) = args.profile {
        app_settings.profile = profile;
    }
    if args.region.is_some() {
        app_settings.region = args.region;
    }
    if args.endpoint_url.is_some() {
        app_settings.ec2_endpoint = args.endpoint_url;
    }

    // Refuse unscoped mutations before touching credentials or the network.
    if let Some(scope) = args.command.mutation_scope() {
        if let Err(err) = filter::require_scope(scope.project.as_deref(), scope.force) {
            eprintln!("Error: {}", err);
            return ExitCode::from(2);
        }
    }

    let aws_config = get_config(&app_settings.profile, app_settings.region.clone()).await;
    let ec2 = Ec2Service::new(&aws_config, app_settings.ec2_endpoint.clone());

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let result = tokio::select! {
        result = dispatch(&ec2, &app_settings, args.command, &mut out) => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted; instances may be left mid-transition");
            return ExitCode::from(130);
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            if err.is_usage() {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}
