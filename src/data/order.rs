//! Security orders

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{api_path, lenient_enum, Listing};
use crate::fetch::Fetcher;
use crate::transport::Transport;

/// How an order is priced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderType {
    Limit,
    Market,
}

/// Whether an order buys or sells
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    Buy,
    Sell,
}

/// An order to buy or sell shares of a listed security
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Order {
    pub id: Option<String>,
    /// Securities account that placed the order
    pub owner: Option<String>,
    pub owner_name: Option<String>,
    /// Counterparty account, for over-the-counter orders
    pub counter_party: Option<String>,
    pub counter_party_name: Option<String>,
    pub security_identifier: Option<String>,
    pub number_of_shares: Option<i64>,
    pub price: Option<f64>,
    pub committed_cash: Option<f64>,
    #[serde(with = "chrono::serde::ts_milliseconds_option")]
    pub creation_date: Option<DateTime<Utc>>,
    /// `None` when absent or a kind this client does not know
    #[serde(rename = "type", deserialize_with = "lenient_enum")]
    pub order_type: Option<OrderType>,
    #[serde(deserialize_with = "lenient_enum")]
    pub action: Option<OrderAction>,
    pub listing: Option<Listing>,
}

impl Order {
    /// Display name of the traded security
    pub fn name(&self) -> Option<&str> {
        self.listing.as_ref()?.name.as_deref()
    }

    /// Fetches one order by id
    pub async fn get_by_id<T: Transport>(fetcher: &Fetcher<T>, id: &str) -> Option<Self> {
        fetcher
            .fetch_one(&api_path(&["securityorders", id]))
            .await
    }

    /// Over-the-counter orders naming the account as counterparty
    pub async fn get_otc_orders<T: Transport>(
        fetcher: &Fetcher<T>,
        securities_account_id: &str,
    ) -> Vec<Self> {
        fetcher
            .fetch_many(&api_path(&["securityorders", "counterparty", securities_account_id]))
            .await
    }

    /// All orders on the given security
    pub async fn get_orders_for_security<T: Transport>(
        fetcher: &Fetcher<T>,
        security_identifier: &str,
    ) -> Vec<Self> {
        fetcher
            .fetch_many(&api_path(&["orderlist", security_identifier]))
            .await
    }

    /// Orders placed from the given securities account
    pub async fn get_orders<T: Transport>(
        fetcher: &Fetcher<T>,
        securities_account_id: &str,
    ) -> Vec<Self> {
        fetcher
            .fetch_many(&api_path(&[
                "securityorders",
                "securitiesaccount",
                securities_account_id,
            ]))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheConfig, ResponseCache};
    use crate::transport::scripted::ScriptedTransport;
    use crate::transport::RawResponse;
    use chrono::TimeZone;

    const ORDER_JSON: &str = r#"{
        "id": "o-1",
        "owner": "acc-1",
        "ownerName": "Acme",
        "securityIdentifier": "ACME",
        "numberOfShares": 150,
        "price": 12.5,
        "committedCash": 1875.0,
        "creationDate": 1500000000000,
        "type": "LIMIT",
        "action": "SELL",
        "listing": {"name": "Acme Corp", "securityIdentifier": "ACME"}
    }"#;

    fn fetcher(transport: &ScriptedTransport) -> Fetcher<ScriptedTransport> {
        Fetcher::new(ResponseCache::new(transport.clone(), CacheConfig::default()))
    }

    #[test]
    fn test_order_decodes_enums_and_timestamp() {
        let order: Order = serde_json::from_str(ORDER_JSON).unwrap();

        assert_eq!(order.order_type, Some(OrderType::Limit));
        assert_eq!(order.action, Some(OrderAction::Sell));
        assert_eq!(order.number_of_shares, Some(150));
        assert_eq!(
            order.creation_date,
            Some(Utc.timestamp_millis_opt(1_500_000_000_000).unwrap())
        );
        assert_eq!(order.name(), Some("Acme Corp"));
        assert!(order.counter_party.is_none());
    }

    #[test]
    fn test_unknown_enum_values_decode_to_none() {
        let order: Order =
            serde_json::from_str(r#"{"id":"o-2","type":"STOP_LOSS","action":"HOLD"}"#).unwrap();

        assert_eq!(order.id.as_deref(), Some("o-2"));
        assert!(order.order_type.is_none());
        assert!(order.action.is_none());
    }

    #[test]
    fn test_null_enum_values_decode_to_none() {
        let order: Order = serde_json::from_str(r#"{"type":null,"action":"BUY"}"#).unwrap();

        assert!(order.order_type.is_none());
        assert_eq!(order.action, Some(OrderAction::Buy));
    }

    #[tokio::test]
    async fn test_list_with_unknown_order_type_keeps_every_order() {
        let transport = ScriptedTransport::new();
        transport.respond(
            "/api/orderlist/ACME",
            200,
            r#"[{"id":"o1","type":"LIMIT"},{"id":"o2","type":"STOP_LOSS"}]"#,
        );

        let orders = Order::get_orders_for_security(&fetcher(&transport), "ACME").await;

        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].order_type, Some(OrderType::Limit));
        assert_eq!(orders[1].id.as_deref(), Some("o2"));
        assert!(orders[1].order_type.is_none());
    }

    #[tokio::test]
    async fn test_get_by_id() {
        let transport = ScriptedTransport::new();
        transport.respond("/api/securityorders/o-1", 200, ORDER_JSON);

        let order = Order::get_by_id(&fetcher(&transport), "o-1").await.unwrap();

        assert_eq!(order.id.as_deref(), Some("o-1"));
        assert_eq!(order.action, Some(OrderAction::Sell));
    }

    #[tokio::test]
    async fn test_missing_order_is_none_and_404_stays_cached() {
        let transport = ScriptedTransport::new();
        transport.respond("/api/securityorders/xyz", 404, "Not Found");
        let fetcher = fetcher(&transport);

        assert!(Order::get_by_id(&fetcher, "xyz").await.is_none());
        assert_eq!(
            fetcher.cache().peek("/api/securityorders/xyz").unwrap().response,
            RawResponse::new(404, "Not Found")
        );
    }

    #[tokio::test]
    async fn test_list_endpoints_use_expected_paths() {
        let transport = ScriptedTransport::new();
        transport.respond("/api/securityorders/counterparty/acc-1", 200, "[]");
        transport.respond("/api/orderlist/ACME", 200, &format!("[{}]", ORDER_JSON));
        transport.respond(
            "/api/securityorders/securitiesaccount/acc-1",
            200,
            &format!("[{0},{0}]", ORDER_JSON),
        );
        let fetcher = fetcher(&transport);

        assert!(Order::get_otc_orders(&fetcher, "acc-1").await.is_empty());
        assert_eq!(Order::get_orders_for_security(&fetcher, "ACME").await.len(), 1);
        assert_eq!(Order::get_orders(&fetcher, "acc-1").await.len(), 2);
        assert_eq!(transport.total_calls(), 3);
    }
}
