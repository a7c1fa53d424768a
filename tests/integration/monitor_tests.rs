use super::*;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use sale_monitor::models::CheckStatus;
use sale_monitor::notifications::AlertTrigger;
use sale_monitor::storage::load_state;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 11, 29, 8, 0, 0).unwrap()
}

fn priced(amount: &str) -> String {
    product_page(&format!(r#"<span class="price-now">${}</span>"#, amount))
}

struct Storefront {
    server: MockServer,
    data: DataDir,
    url: String,
}

impl Storefront {
    async fn new(configure: impl FnOnce(Product) -> Product) -> Self {
        let server = MockServer::start().await;
        let url = format!("{}/deal", server.uri());
        let product = configure(Product::new("Headphones", &url, ".price-now"));
        let data = DataDir::with_products(&[product]);
        Self { server, data, url }
    }

    async fn price(&self, amount: &str) {
        serve_page(&self.server, "/deal", priced(amount)).await;
    }
}

#[tokio::test]
async fn test_target_price_cooldown_lifecycle() {
    let shop = Storefront::new(|p| p.with_target_price(80.0)).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = shop
        .data
        .monitor(extractor(1, Arc::new(RecordingSleeper::default())))
        .with_notifiers(vec![notifier.clone()]);

    shop.price("100.00").await;
    let summary = monitor.run_cycle_at(t0()).await.unwrap();
    assert_eq!(summary.notifications_sent, 0);

    shop.price("75.00").await;
    let summary = monitor.run_cycle_at(t0() + ChronoDuration::hours(1)).await.unwrap();
    assert_eq!(summary.notifications_sent, 1);

    // Same price inside the cooldown window: suppressed.
    let summary = monitor.run_cycle_at(t0() + ChronoDuration::hours(2)).await.unwrap();
    assert_eq!(summary.notifications_sent, 0);

    // Lower price inside the window breaks through.
    shop.price("70.00").await;
    let summary = monitor.run_cycle_at(t0() + ChronoDuration::hours(3)).await.unwrap();
    assert_eq!(summary.notifications_sent, 1);

    // Higher than last notified but the window has passed.
    shop.price("72.00").await;
    let summary = monitor.run_cycle_at(t0() + ChronoDuration::hours(27)).await.unwrap();
    assert_eq!(summary.notifications_sent, 1);

    let alerts = notifier.sent();
    let prices: Vec<f64> = alerts.iter().map(|a| a.current_price).collect();
    assert_eq!(prices, vec![75.0, 70.0, 72.0]);
    assert!(alerts.iter().all(|a| a.trigger == AlertTrigger::TargetPrice));

    let state = load_state(&shop.data.state_file);
    let entry = &state[&shop.url];
    assert_eq!(entry.current_price, Some(72.0));
    assert_eq!(entry.last_price, Some(70.0));
    assert_eq!(entry.last_notification_price, Some(72.0));
    assert_eq!(entry.last_notification_sent, Some(t0() + ChronoDuration::hours(27)));
}

#[tokio::test]
async fn test_discount_alert_carries_previous_price() {
    let shop = Storefront::new(|p| p.with_discount_threshold(20.0)).await;
    let notifier = Arc::new(RecordingNotifier::default());
    let monitor = shop
        .data
        .monitor(extractor(1, Arc::new(RecordingSleeper::default())))
        .with_notifiers(vec![notifier.clone()]);

    shop.price("100.00").await;
    monitor.run_cycle_at(t0()).await.unwrap();

    // 15% off is below the threshold.
    shop.price("85.00").await;
    monitor.run_cycle_at(t0() + ChronoDuration::hours(1)).await.unwrap();
    assert!(notifier.sent().is_empty());

    // 25% off the previous 85.00.
    shop.price("63.75").await;
    monitor.run_cycle_at(t0() + ChronoDuration::hours(2)).await.unwrap();

    let alerts = notifier.sent();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].trigger, AlertTrigger::Discount);
    assert_eq!(alerts[0].previous_price, Some(85.0));
    let discount = alerts[0].discount_percent().unwrap();
    assert!((discount - 25.0).abs() < 1e-9);
}

#[tokio::test]
async fn test_failed_delivery_does_not_start_cooldown() {
    let shop = Storefront::new(|p| p.with_target_price(50.0)).await;
    let monitor = shop
        .data
        .monitor(extractor(1, Arc::new(RecordingSleeper::default())))
        .with_notifiers(vec![Arc::new(FailingNotifier)]);

    shop.price("45.00").await;
    let summary = monitor.run_cycle_at(t0()).await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(summary.notifications_sent, 0);

    let state = load_state(&shop.data.state_file);
    assert!(state[&shop.url].last_notification_sent.is_none());
}

#[tokio::test]
async fn test_one_working_notifier_is_enough() {
    let shop = Storefront::new(|p| p.with_target_price(50.0)).await;
    let recording = Arc::new(RecordingNotifier::default());
    let monitor = shop
        .data
        .monitor(extractor(1, Arc::new(RecordingSleeper::default())))
        .with_notifiers(vec![Arc::new(FailingNotifier), recording.clone()]);

    shop.price("45.00").await;
    let summary = monitor.run_cycle_at(t0()).await.unwrap();

    assert_eq!(summary.notifications_sent, 1);
    assert_eq!(recording.sent().len(), 1);
    let state = load_state(&shop.data.state_file);
    assert_eq!(state[&shop.url].last_notification_price, Some(45.0));
}

#[tokio::test]
async fn test_cycle_records_history_for_hits_and_misses() {
    let shop = Storefront::new(|p| p).await;
    let history = memory_history().await;
    let monitor = shop
        .data
        .monitor(extractor(2, Arc::new(RecordingSleeper::default())))
        .with_history(history.clone());

    shop.price("19.99").await;
    monitor.run_cycle_at(t0()).await.unwrap();

    serve_page(&shop.server, "/deal", product_page("<p>Sold out</p>")).await;
    let summary = monitor.run_cycle_at(t0() + ChronoDuration::hours(1)).await.unwrap();
    assert_eq!(summary.failed, 1);

    let records = history.get_history(&shop.url, None, None).await.unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].check_status, CheckStatus::NotFound);
    assert_eq!(records[0].price, None);
    assert_eq!(records[1].check_status, CheckStatus::Success);
    assert_eq!(records[1].price, Some(19.99));

    // A miss leaves the stored price alone.
    let state = load_state(&shop.data.state_file);
    assert_eq!(state[&shop.url].current_price, Some(19.99));
}

#[tokio::test]
async fn test_check_url_runs_disabled_product() {
    let shop = Storefront::new(|mut p| {
        p.enabled = false;
        p
    })
    .await;
    let monitor = shop.data.monitor(extractor(1, Arc::new(RecordingSleeper::default())));

    shop.price("31.00").await;
    let summary = monitor.run_cycle_at(t0()).await.unwrap();
    assert_eq!(summary.checked, 0);

    let outcome = monitor.check_url(&shop.url).await.unwrap();
    assert_eq!(outcome.price, Some(31.0));

    let err = monitor.check_url("https://example.com/unknown").await.unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
}
