use std::env;
use std::io;
use std::process::ExitCode;

use chrono::Utc;
use points_ledger::Engine;
use points_ledger::csv::{read_commands, write_balances};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(io::stderr)
        .init();

    let Some(path) = env::args().nth(1) else {
        error!("usage: points-ledger <commands.csv>");
        return ExitCode::FAILURE;
    };

    if !path.ends_with(".csv") {
        warn!(path, "input file seems to not be a csv file");
    }

    let commands = match read_commands(path, Utc::now()) {
        Ok(commands) => commands,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut engine = Engine::new();
    let (command_sender, command_receiver) = tokio::sync::mpsc::channel(16);

    tokio::spawn(async move {
        for result in commands {
            match result {
                Ok(command) => {
                    if command_sender.send(command).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    warn!("{e}");
                }
            }
        }
    });

    engine.run(ReceiverStream::new(command_receiver)).await;

    if let Err(e) = write_balances(io::stdout().lock(), engine.summary()) {
        error!("{e}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
