//! Company profiles and capabilities

use serde::{Deserialize, Serialize};

use super::{api_path, LastPrice, Listing, Order};
use crate::fetch::Fetcher;
use crate::transport::Transport;

/// What a company is allowed and able to do financially
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyCapabilities {
    pub bank_ready: Option<bool>,
    pub bank: Option<bool>,
    pub taken_central_bank_loans: Option<f64>,
    pub designated_sponsor: Option<bool>,
    pub reserves: Option<f64>,
    pub max_central_bank_loans: Option<f64>,
    pub net_cash: Option<f64>,
}

/// Aggregated public view of a company
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompanyProfile {
    pub id: Option<String>,
    pub name: Option<String>,
    pub securities_account_id: Option<String>,
    pub outstanding_shares: Option<i64>,
    pub market_cap: Option<f64>,
    pub logo_url: Option<String>,
    pub company_capabilities: Option<CompanyCapabilities>,
    pub listing: Option<Listing>,
    pub last_price: Option<LastPrice>,
    #[serde(rename = "prices14d")]
    pub prices_14d: Vec<LastPrice>,
}

impl CompanyProfile {
    /// Endpoint path of a company's profile
    pub fn path(company_id: &str) -> String {
        api_path(&["companyprofiles", company_id])
    }

    /// Fetches the profile of the company with the given id
    pub async fn get_by_company<T: Transport>(
        fetcher: &Fetcher<T>,
        company_id: &str,
    ) -> Option<Self> {
        fetcher.fetch_one(&Self::path(company_id)).await
    }

    /// Orders placed from this company's securities account
    pub async fn orders<T: Transport>(&self, fetcher: &Fetcher<T>) -> Vec<Order> {
        match &self.securities_account_id {
            Some(account) => Order::get_orders(fetcher, account).await,
            None => Vec::new(),
        }
    }

    /// Over-the-counter orders naming this company as counterparty
    pub async fn otc_orders<T: Transport>(&self, fetcher: &Fetcher<T>) -> Vec<Order> {
        match &self.securities_account_id {
            Some(account) => Order::get_otc_orders(fetcher, account).await,
            None => Vec::new(),
        }
    }

    /// Open orders on this company's listed security
    pub async fn listed_orders<T: Transport>(&self, fetcher: &Fetcher<T>) -> Vec<Order> {
        let identifier = self
            .listing
            .as_ref()
            .and_then(|listing| listing.security_identifier.as_deref());
        match identifier {
            Some(identifier) => Order::get_orders_for_security(fetcher, identifier).await,
            None => Vec::new(),
        }
    }
}
