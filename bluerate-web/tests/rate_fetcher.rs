use bluerate_common::BlueRateError;
use bluerate_web::{RateFetcher, RateSelectors, RateSource};
use std::time::Duration;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RATE_PAGE: &str = r#"<!doctype html>
<html><body>
  <section class="informal">
    <div class="buy buy-sell-blue"><p>Buy</p><p>1,185.00</p></div>
    <div class="sell buy-sell-blue"><p>Sell</p><p>1,210.00</p></div>
  </section>
</body></html>"#;

async fn serve(status: u16, body: &str) -> (MockServer, Url) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/informal-rate/"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;
    let url = Url::parse(&format!("{}/informal-rate/", server.uri())).unwrap();
    (server, url)
}

fn fetcher() -> RateFetcher {
    RateFetcher::with_timeout(RateSelectors::default(), Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn fetches_and_extracts_quote() {
    let (_server, url) = serve(200, RATE_PAGE).await;
    let quote = fetcher().fetch_rates(&url).await.unwrap();
    assert_eq!(quote.buy_rate, 1185.0);
    assert_eq!(quote.sell_rate, 1210.0);
}

#[tokio::test]
async fn server_error_is_network_error() {
    let (_server, url) = serve(500, "boom").await;
    let err = fetcher().fetch_rates(&url).await.unwrap_err();
    assert!(matches!(err, BlueRateError::Network(_)));
}

#[tokio::test]
async fn page_without_rates_is_extraction_error() {
    let (_server, url) = serve(200, "<html><body>maintenance</body></html>").await;
    let err = fetcher().fetch_rates(&url).await.unwrap_err();
    assert_eq!(err, BlueRateError::Extraction("buy".into()));
}

#[tokio::test]
async fn unreachable_host_is_network_error() {
    let server = MockServer::start().await;
    let url = Url::parse(&format!("{}/informal-rate/", server.uri())).unwrap();
    drop(server);
    let err = fetcher().fetch_rates(&url).await.unwrap_err();
    assert!(matches!(err, BlueRateError::Network(_)));
}
