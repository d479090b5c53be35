#![forbid(unsafe_code)]

use std::net::SocketAddr;
use std::time::Duration;

use muninn_client::{Client, ClientConfig, FieldType, Value};
use tests_e2e::common::spawn_store_server;
use tokio::time::timeout;

type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

fn pool_config(addr: SocketAddr, poolsize: usize) -> ClientConfig {
    let mut cfg = ClientConfig::tcp(addr.ip().to_string(), addr.port());
    cfg.poolsize = poolsize;
    cfg.reconnect = false;
    cfg
}

#[tokio::test]
async fn pooled_clients_share_the_store() -> TestResult<()> {
    let addr = spawn_store_server().await?;
    let client = Client::connect(pool_config(addr, 4)).await?;

    let mut writers = Vec::new();
    for i in 0..16u32 {
        let client = client.clone();
        writers.push(tokio::spawn(async move {
            client.insert(0, &[Value::U32(i), Value::U32(i * 10)]).await
        }));
    }
    for writer in writers {
        let resp = writer.await??;
        assert_eq!(resp.rowcount, 1);
    }

    let mut readers = Vec::new();
    for i in 0..16u32 {
        let client = client.clone();
        readers.push(tokio::spawn(async move {
            client.select(0, 0, &[FieldType::U32], &[Value::U32(i)]).await
        }));
    }
    for (i, reader) in readers.into_iter().enumerate() {
        let resp = reader.await??;
        assert_eq!(resp.rows, vec![vec![Value::U32(i as u32), Value::U32(i as u32 * 10)]]);
    }

    client.disconnect().await;
    Ok(())
}

#[tokio::test]
async fn lazy_pool_serves_its_first_calls() -> TestResult<()> {
    let addr = spawn_store_server().await?;
    let mut cfg = pool_config(addr, 2);
    cfg.lazy = true;
    let client = Client::connect(cfg).await?;

    // first calls wait for readiness instead of failing
    let resp = timeout(Duration::from_secs(5), client.ping()).await??;
    assert_eq!(resp.to_string(), "ping ok");
    let resp = client.insert(0, &[Value::U32(1), Value::from("lazy")]).await?;
    assert_eq!(resp.rowcount, 1);

    client.disconnect().await;
    Ok(())
}

#[tokio::test]
async fn disconnect_resolves_after_drain() -> TestResult<()> {
    let addr = spawn_store_server().await?;
    let client = Client::connect(pool_config(addr, 3)).await?;
    client.ping().await?;

    timeout(Duration::from_secs(5), client.disconnect()).await?;

    // the pool is gone for good afterwards
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, muninn_client::Error::Connection(_)));
    Ok(())
}
