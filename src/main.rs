//! gatewire -- command-line client for the TWS / IB Gateway socket API.
//!
//! Connects, runs one request and prints every record as a JSON line on
//! stdout. Streams run until Ctrl+C, which cancels the request on the
//! server before exiting.

mod cli;

use clap::Parser;
use serde::Serialize;

use gatewire_ibapi::{
    CancellationToken, Client, ClientConfig, ClientError, Subscription, TradeFeed,
};

use cli::{Cli, Command};

#[tokio::main]
async fn main() {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let args = Cli::parse();

    let token = CancellationToken::new();
    let handler_token = token.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nReceived Ctrl+C, cancelling...");
        handler_token.cancel();
    }) {
        eprintln!("Failed to set Ctrl+C handler: {e}");
        std::process::exit(1);
    }

    let config = args.client_config();
    tracing::info!(host = %config.host, port = config.port, client_id = config.client_id, "connecting");
    let client = match connect_or_cancel(&config, &token).await {
        Ok(Some(client)) => client,
        Ok(None) => {
            eprintln!("Cancelled before the connection was ready");
            return;
        }
        Err(e) => {
            eprintln!("Failed to connect to TWS/Gateway at {}:{}", config.host, config.port);
            eprintln!("  Error: {e}");
            eprintln!("Please ensure:");
            eprintln!("  1. TWS or IB Gateway is running");
            eprintln!("  2. API connections are enabled in TWS/Gateway settings");
            eprintln!("  3. The host, port and client ID are correct");
            std::process::exit(1);
        }
    };

    let result = run(&client, args.command, &token).await;
    client.close().await;

    match result {
        Ok(()) | Err(ClientError::Cancelled { .. }) => {}
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    }
}

/// Connect unless the token fires first; `None` means cancelled.
async fn connect_or_cancel(
    config: &ClientConfig,
    token: &CancellationToken,
) -> Result<Option<Client>, ClientError> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Ok(None),
        connected = Client::connect(config) => connected.map(Some),
    }
}

async fn run(client: &Client, command: Command, token: &CancellationToken) -> Result<(), ClientError> {
    match command {
        Command::Details { contract } => {
            let details = client.contract_details(&contract.to_contract(), token).await?;
            for d in &details {
                print_json(d);
            }
            tracing::info!(count = details.len(), "contract details received");
            Ok(())
        }
        Command::Bars {
            contract,
            what_to_show,
            rth,
        } => {
            let bars = client
                .real_time_bars(&contract.to_contract(), what_to_show, rth, token)
                .await?;
            drain(bars).await
        }
        Command::Trades {
            contract,
            all,
            backfill,
        } => {
            let feed = if all { TradeFeed::AllLast } else { TradeFeed::Last };
            let trades = client
                .tick_by_tick_trades(&contract.to_contract(), feed, backfill.into(), token)
                .await?;
            drain(trades).await
        }
        Command::Quotes { contract, backfill } => {
            let quotes = client
                .tick_by_tick_bid_ask(&contract.to_contract(), backfill.into(), token)
                .await?;
            drain(quotes).await
        }
        Command::Midpoints { contract, backfill } => {
            let mids = client
                .tick_by_tick_midpoint(&contract.to_contract(), backfill.into(), token)
                .await?;
            drain(mids).await
        }
    }
}

/// Print records until the stream ends; the first error item is returned.
async fn drain<T: Serialize>(mut stream: Subscription<T>) -> Result<(), ClientError> {
    while let Some(record) = stream.next().await {
        match record {
            Ok(record) => print_json(&record),
            Err(e) => {
                stream.cancel().await;
                return Err(e);
            }
        }
    }
    tracing::info!(request_id = stream.request_id(), "stream ended");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) {
    match serde_json::to_string(value) {
        Ok(line) => println!("{line}"),
        Err(e) => tracing::warn!(error = %e, "record not serializable"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_wins_over_pending_connect() {
        // The listener never answers, so the handshake waits out its timeout.
        let silent = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = silent.local_addr().unwrap().port();
        let config = ClientConfig {
            handshake_timeout_ms: 30_000,
            ..ClientConfig::new("127.0.0.1", port, 0)
        };
        let token = CancellationToken::new();
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });

        let outcome = tokio::time::timeout(Duration::from_secs(5), connect_or_cancel(&config, &token))
            .await
            .expect("connect ignored cancellation");
        assert!(matches!(outcome, Ok(None)));
    }

    #[tokio::test]
    async fn refused_connect_is_an_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let config = ClientConfig::new("127.0.0.1", port, 0);
        let outcome = connect_or_cancel(&config, &CancellationToken::new()).await;
        assert!(matches!(outcome, Err(ClientError::Connection(_))));
    }
}
