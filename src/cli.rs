//! Command-line interface for the `atrest` binary
//!
//! Connection settings can be given as flags or through the same environment
//! variables the library reads. Each subcommand fetches one entity or list
//! through the caching fetcher and renders it as pretty-printed JSON.

use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

use crate::config::{
    refresh_interval, ApiConfig, ConfigError, DEFAULT_API_URL, DEFAULT_REFRESH_MINUTES,
    ENV_API_URL, ENV_PARTNER_ID, ENV_REFRESH_MINUTES, ENV_TIMEOUT_SECS, ENV_TOKEN,
    MAX_REFRESH_MINUTES,
};
use crate::data::{CompanyProfile, Order};
use crate::fetch::Fetcher;
use crate::transport::{Transport, TransportError};

/// Error types for the command-line front end
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The requested object does not exist or could not be fetched
    #[error("Nothing found for {0}")]
    NotFound(String),

    #[error("Failed to render output: {0}")]
    Output(#[from] serde_json::Error),
}

/// AlphaTrader REST client - query companies and orders
#[derive(Parser, Debug)]
#[command(name = "atrest")]
#[command(about = "Query the AlphaTrader REST API through a caching client")]
#[command(version)]
pub struct Cli {
    /// Base URL of the API
    #[arg(long, env = ENV_API_URL, default_value = DEFAULT_API_URL)]
    pub api_url: String,

    /// Bearer token used for authorization
    #[arg(long, env = ENV_TOKEN, hide_env_values = true)]
    pub token: Option<String>,

    /// Partner id sent as X-Authorization
    #[arg(long, env = ENV_PARTNER_ID)]
    pub partner_id: Option<String>,

    /// Minutes between background refreshes in --watch mode
    #[arg(
        long,
        env = ENV_REFRESH_MINUTES,
        default_value_t = DEFAULT_REFRESH_MINUTES,
        value_parser = clap::value_parser!(u64).range(..=MAX_REFRESH_MINUTES)
    )]
    pub refresh_minutes: u64,

    /// Per-request timeout in seconds
    #[arg(long, env = ENV_TIMEOUT_SECS, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Keep running and print the result again after every background refresh
    #[arg(long)]
    pub watch: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show a company's profile
    Profile { company_id: String },
    /// Show a company's financial capabilities
    Capabilities { company_id: String },
    /// Show a single order
    Order { order_id: String },
    /// List orders by account, counterparty or security
    Orders(OrdersArgs),
}

/// Exactly one selector for the `orders` subcommand
#[derive(Args, Debug, Clone, PartialEq, Eq)]
#[group(required = true, multiple = false)]
pub struct OrdersArgs {
    /// Orders placed from this securities account
    #[arg(long, value_name = "ACCOUNT_ID")]
    pub account: Option<String>,
    /// Over-the-counter orders naming this securities account as counterparty
    #[arg(long, value_name = "ACCOUNT_ID")]
    pub otc: Option<String>,
    /// Orders on this security
    #[arg(long, value_name = "SECURITY_IDENTIFIER")]
    pub security: Option<String>,
}

impl Cli {
    /// Builds the API configuration from the parsed flags
    pub fn api_config(&self) -> Result<ApiConfig, CliError> {
        let token = non_empty(self.token.as_deref()).ok_or(ConfigError::Missing(ENV_TOKEN))?;
        let partner_id =
            non_empty(self.partner_id.as_deref()).ok_or(ConfigError::Missing(ENV_PARTNER_ID))?;

        let mut config = ApiConfig::new(token, partner_id);
        config.api_url = self.api_url.trim_end_matches('/').to_string();
        config.refresh_interval = refresh_interval(ENV_REFRESH_MINUTES, self.refresh_minutes)?;
        config.timeout = self.timeout.map(Duration::from_secs);
        Ok(config)
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Runs one subcommand and renders its result as pretty JSON
///
/// Lists may be empty; a missing single object is [`CliError::NotFound`].
pub async fn run_query<T: Transport>(
    fetcher: &Fetcher<T>,
    command: &Command,
) -> Result<String, CliError> {
    let rendered = match command {
        Command::Profile { company_id } => {
            let profile = CompanyProfile::get_by_company(fetcher, company_id)
                .await
                .ok_or_else(|| CliError::NotFound(format!("company {}", company_id)))?;
            serde_json::to_string_pretty(&profile)?
        }
        Command::Capabilities { company_id } => {
            let capabilities = CompanyProfile::get_by_company(fetcher, company_id)
                .await
                .and_then(|profile| profile.company_capabilities)
                .ok_or_else(|| CliError::NotFound(format!("capabilities of {}", company_id)))?;
            serde_json::to_string_pretty(&capabilities)?
        }
        Command::Order { order_id } => {
            let order = Order::get_by_id(fetcher, order_id)
                .await
                .ok_or_else(|| CliError::NotFound(format!("order {}", order_id)))?;
            serde_json::to_string_pretty(&order)?
        }
        Command::Orders(selector) => {
            let orders = if let Some(account) = &selector.account {
                Order::get_orders(fetcher, account).await
            } else if let Some(account) = &selector.otc {
                Order::get_otc_orders(fetcher, account).await
            } else if let Some(security) = &selector.security {
                Order::get_orders_for_security(fetcher, security).await
            } else {
                Vec::new()
            };
            serde_json::to_string_pretty(&orders)?
        }
    };
    Ok(rendered)
}
