//! Command-line surface and subcommand wiring.

use clap::{Args, Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info_span};
use uuid::Uuid;

use crate::ssh::auth::{CredentialProvider, EnvCredentials};
use crate::ssh::{
    BrokerConfig, BrokerLauncher, ConnectSettings, EnvResolver, LocalStreams, PtyRequest,
    SessionError, SessionResolver, SshConnector, run_session,
};

#[derive(Parser, Debug)]
#[command(name = "codespaces")]
#[command(about = "Work with GitHub codespaces from the terminal")]
#[command(version)]
pub struct Cli {
    /// Increase verbosity (-v info, -vv debug)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open an interactive shell in a codespace
    Ssh(SshArgs),
}

#[derive(Args, Debug)]
pub struct SshArgs {
    /// Name of the codespace to connect to
    pub codespace: String,

    /// Remote user (overrides CODESPACE_SSH_USER)
    #[arg(short, long)]
    pub user: Option<String>,

    /// Loopback port for the connection broker (overrides CODESPACE_BROKER_PORT)
    #[arg(short, long, value_name = "PORT")]
    pub port: Option<u16>,

    /// Broker executable (overrides CODESPACE_BROKER_PROGRAM)
    #[arg(long, value_name = "PROGRAM")]
    pub broker: Option<String>,
}

/// Run the selected subcommand and return the process exit code.
pub async fn dispatch(cli: Cli) -> i32 {
    let result = match cli.command {
        Commands::Ssh(args) => ssh(args).await,
    };

    match result {
        Ok(code) => code,
        Err(err) => {
            debug!(kind = ?err.kind(), "Session failed");
            eprintln!("error: {}", err);
            err.exit_code()
        }
    }
}

/// `codespaces ssh <codespace>`
async fn ssh(args: SshArgs) -> Result<i32, SessionError> {
    let descriptor = EnvResolver.resolve(&args.codespace).await?;

    let broker_config = BrokerConfig::resolve(args.broker, args.port);
    let endpoint = broker_config.endpoint();
    let launcher = BrokerLauncher::new(broker_config);

    let provider = EnvCredentials::resolve(args.user);
    let connector = SshConnector::new(
        endpoint,
        ConnectSettings::from_env(),
        provider.user(&descriptor),
        provider.credentials(&descriptor),
    );

    let cancel = CancellationToken::new();
    let interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Interrupt received");
            interrupt.cancel();
        }
    });

    let span = info_span!(
        "session",
        codespace = %descriptor.codespace(),
        id = %Uuid::new_v4()
    );

    let outcome = run_session(
        &descriptor,
        &launcher,
        &connector,
        &PtyRequest::from_env(),
        LocalStreams::stdio(),
        &cancel,
    )
    .instrument(span)
    .await?;

    Ok(outcome.exit_code())
}
