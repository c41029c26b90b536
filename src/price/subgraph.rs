use super::PriceSource;
use crate::errors::{AppError, Result};
use crate::models::PriceQuote;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// GraphQL client for the Uniswap V2 subgraph.
#[derive(Clone)]
pub struct SubgraphClient {
    client: Client,
    url: Url,
    pair_id: String,
}

#[derive(Debug, Serialize)]
struct GraphQlRequest<'a> {
    query: &'a str,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    data: Option<PairData>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PairData {
    pair: Option<PairPrices>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PairPrices {
    token0_price: String,
    token1_price: String,
}

impl SubgraphClient {
    pub fn new(url: Url, pair_id: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: crate::utils::http_client(timeout)?,
            url,
            pair_id: pair_id.into(),
        })
    }

    pub fn pair_id(&self) -> &str {
        &self.pair_id
    }
}

pub(crate) fn build_price_query(pair_id: &str) -> String {
    format!(r#"{{ pair(id: "{pair_id}") {{ token0Price token1Price }} }}"#)
}

fn parse_response(resp: GraphQlResponse, pair_id: &str) -> Result<PriceQuote> {
    if !resp.errors.is_empty() {
        let msgs: Vec<String> = resp.errors.into_iter().map(|e| e.message).collect();
        return Err(AppError::Subgraph(msgs.join("; ")));
    }
    let pair = resp
        .data
        .and_then(|d| d.pair)
        .ok_or_else(|| AppError::Subgraph(format!("pair {pair_id} not found")))?;

    Ok(PriceQuote {
        price0: pair.token0_price.trim().parse()?,
        price1: pair.token1_price.trim().parse()?,
    })
}

#[async_trait]
impl PriceSource for SubgraphClient {
    async fn fetch_quote(&self) -> Result<PriceQuote> {
        let query = build_price_query(&self.pair_id);
        let res = self
            .client
            .post(self.url.clone())
            .json(&GraphQlRequest { query: &query })
            .send()
            .await?;
        if res.status() != StatusCode::OK {
            return Err(AppError::Status {
                endpoint: "subgraph",
                status: res.status().as_u16(),
            });
        }
        let body: GraphQlResponse = res.json().await?;
        let quote = parse_response(body, &self.pair_id)?;
        debug!(price0 = quote.price0, price1 = quote.price1, "[PRICE] quote received");
        Ok(quote)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(raw: &str) -> Result<PriceQuote> {
        let resp: GraphQlResponse = serde_json::from_str(raw)?;
        parse_response(resp, "0xpair")
    }

    #[test]
    fn query_embeds_pair_id() {
        let q = build_price_query("0xb4e16d0168e52d35cacd2c6185b44281ec28c9dc");
        assert!(q.contains(r#"pair(id: "0xb4e16d0168e52d35cacd2c6185b44281ec28c9dc")"#));
        assert!(q.contains("token0Price"));
        assert!(q.contains("token1Price"));
    }

    #[test]
    fn request_body_shape() {
        let body = serde_json::to_value(GraphQlRequest { query: "{ x }" }).unwrap();
        assert_eq!(body, serde_json::json!({ "query": "{ x }" }));
    }

    #[test]
    fn parses_decimal_strings() {
        let quote = parse(
            r#"{"data":{"pair":{"token0Price":"2512.338210947731","token1Price":"0.000398035"}}}"#,
        )
        .expect("quote");
        assert!((quote.price0 - 2512.338210947731).abs() < 1e-9);
        assert!((quote.price1 - 0.000398035).abs() < 1e-12);
    }

    #[test]
    fn unparsable_price_is_an_error() {
        let res = parse(r#"{"data":{"pair":{"token0Price":"n/a","token1Price":"1"}}}"#);
        assert!(matches!(res, Err(AppError::ParseFloat(_))));
    }

    #[test]
    fn missing_pair_is_an_error() {
        let res = parse(r#"{"data":{"pair":null}}"#);
        assert!(matches!(res, Err(AppError::Subgraph(ref m)) if m.contains("0xpair")));
    }

    #[tokio::test]
    async fn non_ok_status_is_an_error() {
        let base = crate::utils::stub::respond_once("502 Bad Gateway").await;
        let url = Url::parse(&format!("{base}/subgraphs/name/uniswap/uniswap-v2")).unwrap();
        let client = SubgraphClient::new(url, "0xpair", Duration::from_secs(5)).unwrap();
        assert!(matches!(
            client.fetch_quote().await,
            Err(AppError::Status { endpoint: "subgraph", status: 502 })
        ));
    }

    #[test]
    fn graphql_errors_are_surfaced() {
        let res = parse(r#"{"data":null,"errors":[{"message":"indexing error"},{"message":"timeout"}]}"#);
        match res {
            Err(AppError::Subgraph(msg)) => assert_eq!(msg, "indexing error; timeout"),
            other => panic!("expected subgraph error, got {other:?}"),
        }
    }
}
