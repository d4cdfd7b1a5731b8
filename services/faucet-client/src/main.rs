mod config;

use anyhow::{Context, Result};
use clap::Parser;
use config::{Cli, Command, DriverConfig};
use fd_chain_client::{SimulatedProvider, WalletProvider};
use fd_chain_http::HttpProvider;
use fd_core::{AppView, FaucetApp, StaticDetector};
use fd_types::WalletAddress;
use fd_types::units::to_wei;
use std::cell::Cell;
use std::rc::Rc;
use tracing::{info, warn};

/// Chain the client talks to.
enum Backend {
    Http(Rc<HttpProvider>),
    Simulated(Rc<SimulatedProvider>),
}

impl Backend {
    fn from_config(config: &DriverConfig) -> Result<Self> {
        if !config.simulate {
            return Ok(Self::Http(Rc::new(HttpProvider::new(config.rpc_url.as_str()))));
        }
        let account = WalletAddress::from("0x90F8bf6A479f320ead074411a4B0e7944Ea8c9C1");
        let provider = SimulatedProvider::new()
            .with_network_id(config.faucet.expected_network_id.0)
            .with_account(account, to_wei("100")?)
            .with_faucet_balance(to_wei("10")?);
        Ok(Self::Simulated(Rc::new(provider)))
    }

    fn provider(&self) -> Rc<dyn WalletProvider> {
        match self {
            Self::Http(provider) => provider.clone(),
            Self::Simulated(provider) => provider.clone(),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::Http(provider) => format!("json-rpc at {}", provider.endpoint()),
            Self::Simulated(_) => "in-process simulated chain".to_string(),
        }
    }

    /// The simulated chain pushes its events; a node has to be asked.
    async fn poll(&self) {
        if let Self::Http(provider) = self {
            if let Err(err) = provider.poll_changes().await {
                warn!("polling {} failed: {}", provider.endpoint(), err);
            }
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let command = cli.subcommand();
    let config = cli.driver_config();
    let backend = Backend::from_config(&config)?;
    info!("faucet-client {:?} using {}", command, backend.describe());

    let app = FaucetApp::new(
        config.faucet.clone(),
        Rc::new(StaticDetector::new(backend.provider())),
    );
    app.mount().await;

    match command {
        Command::Status => {}
        Command::Connect => {
            app.connect().await.ok();
        }
        Command::Donate => {
            ensure_connected(&app).await;
            app.donate().await.ok();
        }
        Command::Withdraw => {
            ensure_connected(&app).await;
            app.withdraw().await.ok();
        }
        Command::Watch => {
            watch(&app, &backend, &config).await?;
        }
    }

    print_view(&app.view())?;
    app.unmount();
    Ok(())
}

/// Nodes expose their accounts without a prompt, so connecting first is harmless.
async fn ensure_connected(app: &FaucetApp) {
    if !app.view().connected {
        app.connect().await.ok();
    }
}

async fn watch(app: &FaucetApp, backend: &Backend, config: &DriverConfig) -> Result<()> {
    let dirty = Rc::new(Cell::new(false));
    let flag = dirty.clone();
    app.on_change(move || flag.set(true));

    print_view(&app.view())?;
    let mut ticker = tokio::time::interval(config.poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                backend.poll().await;
                if dirty.replace(false) {
                    app.settle().await;
                    print_view(&app.view())?;
                }
            }
            signal = tokio::signal::ctrl_c() => {
                signal.context("listening for ctrl-c")?;
                info!("stopping watch");
                return Ok(());
            }
        }
    }
}

fn print_view(view: &AppView) -> Result<()> {
    let rendered = serde_json::to_string_pretty(view).context("rendering view")?;
    println!("{rendered}");
    Ok(())
}
