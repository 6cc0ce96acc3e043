use fraudpay_core::adapters::MemoryTransactionStore;
use fraudpay_core::domain::{FraudScore, Transaction, TransactionStatus};
use fraudpay_core::middleware::auth::HmacTokenAuthenticator;
use fraudpay_core::ports::TransactionStore;
use fraudpay_core::presenter::{RefreshMode, TransactionListView};
use fraudpay_core::scoring::{FeatureEnricher, FixedScorer};
use fraudpay_core::services::{AnyAuthenticatedReviewer, ReviewService, ScoringService, SubmissionRequest};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const SECRET: &str = "presenter-test-secret";

fn request(recipient: &str) -> SubmissionRequest {
    SubmissionRequest {
        sender_id: Some("U1".to_string()),
        recipient_id: Some(recipient.to_string()),
        amount: Some("25".parse().unwrap()),
        ..Default::default()
    }
}

async fn next_snapshot(rx: &mut watch::Receiver<Vec<Transaction>>) -> Vec<Transaction> {
    tokio::time::timeout(Duration::from_secs(2), rx.changed())
        .await
        .expect("no snapshot in time")
        .unwrap();
    let rows = rx.borrow_and_update().clone();
    rows
}

async fn follow_pipeline(mode: RefreshMode) {
    let store: Arc<dyn TransactionStore> = Arc::new(MemoryTransactionStore::new());
    let auth = Arc::new(HmacTokenAuthenticator::new(SECRET));
    let bearer = auth.issue("U1").unwrap();
    let scoring = ScoringService::new(
        store.clone(),
        auth.clone(),
        Arc::new(FeatureEnricher::random()),
        Arc::new(FixedScorer(FraudScore::new(90).unwrap())),
    );
    let review = ReviewService::new(store.clone(), auth, Arc::new(AnyAuthenticatedReviewer));

    let view = TransactionListView::open(store.clone(), mode).await.unwrap();
    let (tx, mut rx) = watch::channel(Vec::new());
    let driver = tokio::spawn(view.run_until_closed(tx));

    assert!(next_snapshot(&mut rx).await.is_empty());

    let first = scoring.submit(request("Alice Johnson"), Some(&bearer)).await.unwrap();
    let rows = next_snapshot(&mut rx).await;
    assert_eq!(rows, vec![first.transaction.clone()]);

    let second = scoring.submit(request("Bob Smith"), Some(&bearer)).await.unwrap();
    let rows = next_snapshot(&mut rx).await;
    assert_eq!(rows.len(), 2);
    assert_eq!(rows, store.list_recent().await.unwrap());
    assert!(rows.iter().any(|t| t.id == second.transaction.id));

    review.approve(&first.transaction.id, Some(&bearer)).await.unwrap();
    let rows = next_snapshot(&mut rx).await;
    let approved = rows.iter().find(|t| t.id == first.transaction.id).unwrap();
    assert_eq!(approved.status, TransactionStatus::Completed);
    assert_eq!(rows, store.list_recent().await.unwrap());

    drop(rx);
    driver.abort();
}

#[tokio::test]
async fn test_incremental_view_tracks_store() {
    follow_pipeline(RefreshMode::Incremental).await;
}

#[tokio::test]
async fn test_full_refresh_view_tracks_store() {
    follow_pipeline(RefreshMode::FullRefresh).await;
}
