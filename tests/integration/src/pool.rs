//! Integration tests for borrowing and returning master connections.

use sentinel_client::{Client, ClientError};

use crate::helpers::{config, eventually, Describe, StubMaster, StubSentinel};

async fn single_master(pool_size: usize) -> (StubSentinel, StubMaster, Client) {
    let sentinel = StubSentinel::start().await;
    let master = StubMaster::start("m").await;
    sentinel.describe("m", Describe::At(master.port));
    let client = Client::connect(config(&sentinel, &["m"], pool_size)).await.unwrap();
    eventually("pool filled", || master.accepted() == pool_size).await;
    (sentinel, master, client)
}

#[tokio::test]
async fn returned_connections_are_reused() {
    let (_sentinel, master, client) = single_master(1).await;
    for _ in 0..5 {
        let mut conn = client.get_master("m").await.unwrap();
        conn.execute(&["PING"]).await.unwrap();
        client.put_master("m", conn).await;
    }
    assert_eq!(master.accepted(), 1);
    client.close().await;
}

#[tokio::test]
async fn empty_pool_dials_and_overflow_is_closed() {
    let (_sentinel, master, client) = single_master(2).await;
    let mut held = Vec::new();
    for _ in 0..4 {
        held.push(client.get_master("m").await.unwrap());
    }
    eventually("misses dialed", || master.accepted() == 4).await;

    for conn in held {
        client.put_master("m", conn).await;
    }
    // capacity is 2, so two of the four are closed on return
    eventually("overflow closed", || master.closed() == 2).await;
    assert_eq!(master.open(), 2);
    client.close().await;
}

#[tokio::test]
async fn unknown_name_is_operational() {
    let (_sentinel, _master, client) = single_master(1).await;
    let err = client.get_master("nope").await.unwrap_err();
    assert!(matches!(err, ClientError::UnknownMaster(ref name) if name == "nope"));
    assert!(!err.is_sentinel_err());

    // the client keeps working
    let conn = client.get_master("m").await.unwrap();
    client.put_master("m", conn).await;
    client.close().await;
}

#[tokio::test]
async fn closed_client_rejects_gets_and_closes_puts() {
    let (_sentinel, master, client) = single_master(1).await;
    let other = client.clone();
    let held = client.get_master("m").await.unwrap();

    client.close().await;
    assert!(matches!(other.get_master("m").await, Err(ClientError::Closed)));

    other.put_master("m", held).await;
    eventually("returned connection closed", || master.closed() == 1).await;
}
