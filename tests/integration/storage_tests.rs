use super::*;
use chrono::{Duration as ChronoDuration, Utc};
use sale_monitor::models::CheckStatus;
use sale_monitor::storage::{add_product, read_products, remove_product, update_product};
use std::collections::HashMap;

#[tokio::test]
async fn test_concurrent_adds_all_land_in_catalog() {
    let data = DataDir::with_products(&[]);
    let path = data.products_csv.clone();

    let tasks: Vec<_> = (0..6)
        .map(|i| {
            let path = path.clone();
            tokio::spawn(async move {
                let product = Product::new(format!("Item {}", i), format!("https://shop.example/{}", i), "");
                add_product(&path, product, Duration::from_secs(5)).await
            })
        })
        .collect();

    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let products = read_products(&path).unwrap();
    assert_eq!(products.len(), 6);
    assert!(!sale_monitor::utils::FileLock::lock_path_for(&path).exists());
}

#[tokio::test]
async fn test_catalog_edit_lifecycle() {
    let data = DataDir::with_products(&[Product::new("Lamp", "https://shop.example/lamp", ".price")]);
    let timeout = Duration::from_secs(2);

    let updated = update_product(&data.products_csv, "https://shop.example/lamp", timeout, |p| {
        p.target_price = Some(39.0);
        p.notification_cooldown_hours = 6;
    })
    .await
    .unwrap();
    assert_eq!(updated.target_price, Some(39.0));

    let reread = read_products(&data.products_csv).unwrap();
    assert_eq!(reread[0].notification_cooldown_hours, 6);

    let rejected = update_product(&data.products_csv, "https://shop.example/lamp", timeout, |p| {
        p.discount_threshold = Some(140.0);
    })
    .await;
    assert!(matches!(rejected, Err(AppError::Validation(_))));
    assert_eq!(read_products(&data.products_csv).unwrap()[0].discount_threshold, None);

    let removed = remove_product(&data.products_csv, "https://shop.example/lamp", timeout)
        .await
        .unwrap();
    assert_eq!(removed.name, "Lamp");
    assert!(read_products(&data.products_csv).unwrap().is_empty());

    let missing = remove_product(&data.products_csv, "https://shop.example/lamp", timeout).await;
    assert!(matches!(missing, Err(AppError::NotFound { .. })));
}

#[tokio::test]
async fn test_history_database_on_disk() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("nested").join("history.db");
    let url = "https://shop.example/kettle";

    {
        let store = PriceHistoryStore::open(&db_path).await.unwrap();
        let now = Utc::now();
        store
            .record_price(url, "Kettle", Some(59.0), CheckStatus::Success, Some(now - ChronoDuration::days(40)))
            .await
            .unwrap();
        store
            .record_price(url, "Kettle", Some(49.0), CheckStatus::Success, Some(now - ChronoDuration::days(2)))
            .await
            .unwrap();
        store
            .record_price(url, "kettle (old name)", None, CheckStatus::NotFound, Some(now))
            .await
            .unwrap();
    }

    let store = PriceHistoryStore::open(&db_path).await.unwrap();

    let recent = store.get_stats(url, Some(30)).await.unwrap().unwrap();
    assert_eq!(recent.count, 1);
    assert_eq!(recent.current_price, 49.0);

    let changes = store.get_price_changes(url, None).await.unwrap();
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].old_price, 59.0);
    assert_eq!(changes[0].new_price, 49.0);

    let names: HashMap<String, String> = [(url.to_string(), "Kettle".to_string())].into_iter().collect();
    assert_eq!(store.count_name_mismatches(&names).await.unwrap(), 1);
    assert_eq!(store.normalize_names(&names).await.unwrap(), 1);
    assert_eq!(store.count_name_mismatches(&names).await.unwrap(), 0);

    assert_eq!(store.cleanup_old_records(30).await.unwrap(), 1);
    assert_eq!(store.get_history(url, None, None).await.unwrap().len(), 2);
}
