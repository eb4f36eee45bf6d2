use ghist_store::{ChangeHub, DirectoryWatcher, NewEvent, NewTask, Store, Update};
use std::fs;
use std::time::Duration;
use tokio::time::timeout;

const INTERVAL: Duration = Duration::from_millis(50);

#[tokio::test]
async fn rapid_broadcasts_leave_one_pending_notification() {
    let hub = ChangeHub::new();
    let mut subscription = hub.subscribe();

    hub.broadcast();
    hub.broadcast();
    hub.broadcast();

    assert!(subscription.try_changed());
    assert!(!subscription.try_changed());
}

#[tokio::test]
async fn modified_file_triggers_broadcast_within_an_interval() {
    let dir = tempfile::tempdir().expect("watched dir");
    fs::write(dir.path().join("1.json"), "{}").expect("seed doc");

    let hub = ChangeHub::new();
    let mut subscription = hub.subscribe();
    let _watcher = DirectoryWatcher::spawn(hub.clone(), vec![dir.path().to_path_buf()], INTERVAL);

    fs::write(dir.path().join("1.json"), "{\"id\": 1, \"title\": \"grown\"}").expect("modify doc");

    let notified = timeout(INTERVAL * 10, subscription.changed())
        .await
        .expect("notified in time");
    assert!(notified);
}

#[tokio::test]
async fn quiet_directory_causes_no_broadcast() {
    let dir = tempfile::tempdir().expect("watched dir");
    fs::write(dir.path().join("1.json"), "{}").expect("seed doc");

    let hub = ChangeHub::new();
    let mut subscription = hub.subscribe();
    let _watcher = DirectoryWatcher::spawn(hub.clone(), vec![dir.path().to_path_buf()], INTERVAL);

    tokio::time::sleep(INTERVAL * 6).await;
    assert!(!subscription.try_changed());
}

#[tokio::test]
async fn stopped_watcher_no_longer_broadcasts() {
    let dir = tempfile::tempdir().expect("watched dir");
    let hub = ChangeHub::new();
    let mut subscription = hub.subscribe();
    let watcher = DirectoryWatcher::spawn(hub.clone(), vec![dir.path().to_path_buf()], INTERVAL);
    assert!(watcher.is_running());
    watcher.stop();
    tokio::time::sleep(INTERVAL).await;

    fs::write(dir.path().join("2.json"), "{}").expect("new doc");
    tokio::time::sleep(INTERVAL * 4).await;
    assert!(!subscription.try_changed());
}

#[tokio::test]
async fn store_writes_reach_live_subscribers() {
    let root = tempfile::tempdir().expect("temp store root");
    let store = Store::open(root.path()).expect("store opens");
    let hub = ChangeHub::new();
    let _watcher = store.watch(hub.clone());

    let mut connection = hub.subscribe();
    let (disconnect, disconnected) = tokio::sync::oneshot::channel::<()>();

    store.create_task(NewTask::titled("visible on the board")).expect("task");
    let update = timeout(
        Duration::from_secs(5),
        connection.next_or_closed(async move {
            let _ = disconnected.await;
        }),
    )
    .await
    .expect("task noticed");
    assert_eq!(update, Update::Changed);

    store.create_event(NewEvent::log("and in the feed")).expect("event");
    let update = timeout(Duration::from_secs(5), connection.changed())
        .await
        .expect("event noticed");
    assert!(update);

    drop(disconnect);
    drop(connection);
    assert_eq!(hub.subscriber_count(), 0);
}
