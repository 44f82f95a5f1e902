use std::time::Duration;

use ingest::Shutdown;

#[tokio::test]
async fn trigger_reaches_every_clone() {
    let shutdown = Shutdown::new();
    let observer = shutdown.clone();
    assert!(!observer.is_triggered());

    let waiter = tokio::spawn(async move {
        observer.triggered().await;
        observer.is_triggered()
    });

    tokio::task::yield_now().await;
    shutdown.trigger();

    let seen = tokio::time::timeout(Duration::from_secs(5), waiter)
        .await
        .unwrap()
        .unwrap();
    assert!(seen);
    assert!(shutdown.is_triggered());
}

#[tokio::test]
async fn untriggered_stays_pending() {
    let shutdown = Shutdown::new();

    let result = tokio::time::timeout(Duration::from_millis(20), shutdown.triggered()).await;
    assert!(result.is_err());
}
