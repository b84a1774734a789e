//! AlphaTrader REST CLI - query companies and orders
//!
//! Fetches one entity or list through the caching client and prints it as
//! JSON. With `--watch` the background refresher keeps the cache fresh and the
//! result is printed again after every refresh cycle until Ctrl-C.

use std::process::ExitCode;

use clap::Parser;

use alphatrader_rest::cache::{CacheConfig, ResponseCache};
use alphatrader_rest::cli::{run_query, Cli, CliError};
use alphatrader_rest::fetch::Fetcher;
use alphatrader_rest::refresh::{RefreshHandle, RefreshMessage};
use alphatrader_rest::transport::HttpTransport;

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = cli.api_config()?;
    let transport = HttpTransport::new(&config)?;
    let cache = ResponseCache::new(transport, CacheConfig::from_api_config(&config));
    let fetcher = Fetcher::new(cache.clone());

    println!("{}", run_query(&fetcher, &cli.command).await?);

    if !cli.watch {
        return Ok(());
    }

    let mut handle = RefreshHandle::spawn(cache);
    loop {
        tokio::select! {
            message = handle.receiver.recv() => match message {
                Some(RefreshMessage::RefreshCompleted { .. }) => {
                    println!("{}", run_query(&fetcher, &cli.command).await?);
                }
                Some(_) => {}
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    handle.shutdown().await;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {}", err);
            ExitCode::FAILURE
        }
    }
}
