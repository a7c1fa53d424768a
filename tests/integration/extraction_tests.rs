use super::*;
use sale_monitor::PriceSource;

#[tokio::test]
async fn test_manual_selector_against_live_page() {
    let server = MockServer::start().await;
    serve_page(&server, "/item", product_page(r#"<span class="cost">$1,299.00</span>"#)).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let result = extractor(3, sleeper.clone())
        .extract_price(&format!("{}/item", server.uri()), ".cost")
        .await;

    assert_eq!(result.price(), Some(1299.0));
    assert_eq!(result.source(), Some(PriceSource::Manual));
    assert!(sleeper.recorded().is_empty());
}

#[tokio::test]
async fn test_auto_detects_shopify_price() {
    let server = MockServer::start().await;
    serve_page(
        &server,
        "/products/mug",
        product_page(r#"<div class="product__price"><span class="money">$24.50</span></div>"#),
    )
    .await;

    let result = extractor(1, Arc::new(RecordingSleeper::default()))
        .extract_price(&format!("{}/products/mug", server.uri()), "")
        .await;

    assert_eq!(result.price(), Some(24.5));
    assert_eq!(result.source(), Some(PriceSource::Auto));
}

#[tokio::test]
async fn test_stale_manual_selector_falls_back_to_detection() {
    let server = MockServer::start().await;
    serve_page(&server, "/item", product_page(r#"<span itemprop="price">18.75</span>"#)).await;

    let result = extractor(1, Arc::new(RecordingSleeper::default()))
        .extract_price(&format!("{}/item", server.uri()), "#old-price")
        .await;

    assert_eq!(result.price(), Some(18.75));
    assert_eq!(result.source(), Some(PriceSource::Auto));
}

#[tokio::test]
async fn test_server_errors_are_retried_with_backoff() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_string(product_page(r#"<span class="price">$9.99</span>"#)))
        .mount(&server)
        .await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let result = extractor(3, sleeper.clone())
        .extract_price(&format!("{}/flaky", server.uri()), "")
        .await;

    assert_eq!(result.price(), Some(9.99));
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1), Duration::from_secs(2)]);
}

#[tokio::test]
async fn test_page_without_price_is_refetched_until_budget_spent() {
    let server = MockServer::start().await;
    serve_page(&server, "/empty", product_page("<p>Out of stock</p>")).await;

    let sleeper = Arc::new(RecordingSleeper::default());
    let result = extractor(3, sleeper.clone())
        .extract_price(&format!("{}/empty", server.uri()), ".price")
        .await;

    assert!(!result.is_found());
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
    // No sleep after the last attempt.
    assert_eq!(sleeper.recorded().len(), 2);
}

#[tokio::test]
async fn test_transport_failure_yields_not_found() {
    let sleeper = Arc::new(RecordingSleeper::default());
    let result = extractor(2, sleeper.clone())
        .extract_price("http://127.0.0.1:1/unreachable", "")
        .await;

    assert!(!result.is_found());
    assert_eq!(result.source(), None);
    assert_eq!(sleeper.recorded(), vec![Duration::from_secs(1)]);
}
