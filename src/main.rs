use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skycast_board::{
    document, today, AdminPanel, Driver, DriverOptions, PageSet, PlaintextGate, ServerState,
    SubmissionForm, SubmissionHandler, SubmitOutcome, View,
};
use skycast_core::{AppError, Config};
use skycast_store::{open_local_storage, open_store, GITHUB_TOKEN_KEY};
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(name = "skycast", version, about = "Weather prediction board")]
struct Cli {
    /// Config file to use instead of the one in the user config directory
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the refresh driver and the HTTP server until Ctrl-C
    Serve,

    /// Load the list once and print a page
    Render {
        /// index, other or admin
        #[arg(long, default_value = "index")]
        view: View,
    },

    /// Publish a forecast
    Add {
        #[arg(long)]
        date: String,
        #[arg(long)]
        condition: String,
        /// Degrees Celsius
        #[arg(long, allow_hyphen_values = true)]
        temperature: String,
        #[arg(long)]
        to_date: Option<String>,
        #[arg(long, default_value = "")]
        notes: String,
    },

    /// Delete a forecast by reference, e.g. `index-0` or `id-1771070400000`
    Delete { target: String },

    /// Store the GitHub write token in local storage
    Token { value: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    skycast_core::init()?;

    let result = run(cli).await;
    if let Err(e) = &result {
        tracing::error!("{:#}", e);
        if let Some(app) = e.downcast_ref::<AppError>() {
            eprintln!("{}", app.user_message());
        }
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let (config, _) = Config::load_validated(cli.config.as_deref())?;

    match cli.command {
        Command::Serve => serve(&config).await,
        Command::Render { view } => render(&config, view).await,
        Command::Add {
            date,
            condition,
            temperature,
            to_date,
            notes,
        } => {
            let mut form = SubmissionForm {
                date,
                to_date: to_date.unwrap_or_default(),
                condition,
                temperature,
                notes,
            };
            let handler = SubmissionHandler::new(open_store(&config)?, &config.board);
            let outcome = handler.submit(&mut form).await.map_err(AppError::from)?;
            report(outcome);
            Ok(())
        }
        Command::Delete { target } => {
            let handler = SubmissionHandler::new(open_store(&config)?, &config.board);
            let outcome = handler
                .delete_by_text(&target)
                .await
                .map_err(AppError::from)?;
            report(outcome);
            Ok(())
        }
        Command::Token { value } => {
            let storage = open_local_storage(&config)?;
            storage
                .set_item(GITHUB_TOKEN_KEY, value.trim())
                .context("Failed to store GitHub token")?;
            println!("GitHub token saved to {}", storage.path().display());
            Ok(())
        }
    }
}

fn report(outcome: SubmitOutcome) {
    match outcome.alert() {
        Some(alert) => println!("{}", alert),
        None => eprintln!("Date, condition and temperature are required; nothing was published."),
    }
}

async fn render(config: &Config, view: View) -> Result<()> {
    let store = open_store(config)?;
    let records = store.load().await;

    let mut pages = PageSet::default();
    pages.apply_records(&records);
    let panel = AdminPanel {
        unlocked: view == View::Admin,
        ..AdminPanel::default()
    };

    println!("{}", document(pages.get(view), today(), &panel));
    Ok(())
}

async fn serve(config: &Config) -> Result<()> {
    let addr: SocketAddr = config
        .server
        .bind
        .parse()
        .with_context(|| format!("Invalid bind address: {}", config.server.bind))?;

    let store = open_store(config)?;
    let pages = PageSet::shared();
    let driver = Driver::new(
        store.clone(),
        pages.clone(),
        DriverOptions::from_config(&config.board),
    );
    let handle = driver.handle();
    let handler = SubmissionHandler::new(store, &config.board).with_driver(handle.clone());
    let gate = PlaintextGate::new(config.admin.passcode.clone());
    let state = ServerState::new(pages, Arc::new(handler), Arc::new(gate), handle);

    let cancel = CancellationToken::new();
    let driver_task = tokio::spawn(driver.run(cancel.clone()));
    let server = skycast_board::serve(state, addr, cancel.clone());
    tokio::pin!(server);

    tracing::info!("Skycast started");
    tokio::select! {
        result = &mut server => {
            cancel.cancel();
            result.context("Server failed")?;
        }
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            tracing::info!("Shutting down");
            cancel.cancel();
            server.await.context("Server failed")?;
        }
    }

    driver_task.await.context("Driver task failed")?;
    Ok(())
}
