//! Integration tests for following sentinel failover notifications.

use std::time::Duration;

use sentinel_client::{Client, ClientError, Frame};

use crate::helpers::{config, dead_port, eventually, Describe, StubMaster, StubSentinel};

/// Gets and returns connections for `name` until a get fails.
async fn first_failed_get(client: &Client, name: &str) -> ClientError {
    for _ in 0..200 {
        match client.get_master(name).await {
            Ok(conn) => client.put_master(name, conn).await,
            Err(e) => return e,
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("get_master({name}) kept succeeding");
}

#[tokio::test]
async fn switch_moves_pool_to_new_master() {
    let sentinel = StubSentinel::start().await;
    let old = StubMaster::start("old").await;
    let new = StubMaster::start("new").await;
    let b = StubMaster::start("b").await;
    sentinel.describe("a", Describe::At(old.port));
    sentinel.describe("b", Describe::At(b.port));

    let client = Client::connect(config(&sentinel, &["a", "b"], 2)).await.unwrap();
    eventually("initial pools", || old.accepted() == 2 && b.accepted() == 2).await;

    // noise first: a short body and another channel are both skipped
    sentinel.publish("+switch-master", "a 127.0.0.1 1");
    sentinel.publish("__sentinel__:hello", "a 127.0.0.1 1 127.0.0.1 2");
    sentinel.switch("a", old.port, new.port);

    eventually("new pool dialed", || new.accepted() == 2).await;
    eventually("old pool closed", || old.closed() == 2).await;

    let mut conn = client.get_master("a").await.unwrap();
    assert_eq!(conn.addr(), new.addr);
    assert_eq!(conn.execute(&["PING"]).await.unwrap(), Frame::bulk("new"));
    client.put_master("a", conn).await;

    // the other master is untouched
    let conn = client.get_master("b").await.unwrap();
    assert_eq!(conn.addr(), b.addr);
    client.put_master("b", conn).await;
    assert_eq!(b.accepted(), 2);
    assert_eq!(b.closed(), 0);
    assert_eq!(new.accepted(), 2);

    client.close().await;
}

#[tokio::test]
async fn connection_from_before_switch_is_closed_on_return() {
    let sentinel = StubSentinel::start().await;
    let old = StubMaster::start("old").await;
    let new = StubMaster::start("new").await;
    sentinel.describe("a", Describe::At(old.port));
    let client = Client::connect(config(&sentinel, &["a"], 1)).await.unwrap();

    let stale = client.get_master("a").await.unwrap();
    assert_eq!(stale.addr(), old.addr);
    sentinel.switch("a", old.port, new.port);
    eventually("new pool dialed", || new.accepted() == 1).await;

    // take the only idle connection so the pool has room
    let fresh = client.get_master("a").await.unwrap();
    assert_eq!(fresh.addr(), new.addr);

    client.put_master("a", stale).await;
    eventually("stale connection closed", || old.closed() == 1).await;

    let next = client.get_master("a").await.unwrap();
    assert_eq!(next.addr(), new.addr);
    client.put_master("a", next).await;
    client.put_master("a", fresh).await;
    client.close().await;
}

#[tokio::test]
async fn switch_to_unreachable_master_fails_gets_without_poisoning() {
    let sentinel = StubSentinel::start().await;
    let old = StubMaster::start("old").await;
    let b = StubMaster::start("b").await;
    sentinel.describe("a", Describe::At(old.port));
    sentinel.describe("b", Describe::At(b.port));
    let client = Client::connect(config(&sentinel, &["a", "b"], 1)).await.unwrap();

    sentinel.switch("a", old.port, dead_port().await);
    let err = first_failed_get(&client, "a").await;
    assert!(matches!(err, ClientError::Connection(_)), "got {err:?}");
    assert!(!err.is_sentinel_err());

    // an operational failure for one name leaves the rest working
    let conn = client.get_master("b").await.unwrap();
    client.put_master("b", conn).await;
    client.close().await;
}

#[tokio::test]
async fn lost_sentinel_poisons_every_get() {
    let sentinel = StubSentinel::start().await;
    let a = StubMaster::start("a").await;
    sentinel.describe("a", Describe::At(a.port));
    let client = Client::connect(config(&sentinel, &["a"], 2)).await.unwrap();
    let held = client.get_master("a").await.unwrap();

    sentinel.hangup();
    let ClientError::Sentinel(first) = first_failed_get(&client, "a").await else {
        panic!("expected a sentinel error");
    };

    // the same cached error comes back for every name, known or not
    for name in ["a", "a", "not-tracked"] {
        match client.get_master(name).await {
            Err(ClientError::Sentinel(cause)) => assert_eq!(cause, first),
            other => panic!("expected sentinel error, got {other:?}"),
        }
    }

    // returning a connection still works after the sentinel is gone
    client.put_master("a", held).await;
    client.close().await;
    eventually("pool drained", || a.closed() == 2).await;
}

#[tokio::test]
async fn garbage_on_subscription_is_sentinel_error() {
    let sentinel = StubSentinel::start().await;
    let a = StubMaster::start("a").await;
    sentinel.describe("a", Describe::At(a.port));
    let client = Client::connect(config(&sentinel, &["a"], 1)).await.unwrap();

    sentinel.push_raw(Frame::Simple("OK".into()));
    match first_failed_get(&client, "a").await {
        ClientError::Sentinel(cause) => assert_eq!(cause, "malformed subscription reply"),
        other => panic!("expected sentinel error, got {other:?}"),
    }
    client.close().await;
}
