mod common;

use common::{genesis_for, transfer, user_keys, validator_keys};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use vnc_consensus::{
    ConsensusConfig, ConsensusEngine, EngineDriver, EngineHandle, LocalHub, TxStatus,
};
use vnc_crypto::Signer;
use vnc_types::{Address, Amount};

fn fast_config() -> ConsensusConfig {
    ConsensusConfig {
        block_interval_ms: 50,
        round_timeout_ms: Some(500),
        ..common::config()
    }
}

struct Devnet {
    handles: Vec<EngineHandle>,
    tasks: Vec<tokio::task::JoinHandle<ConsensusEngine>>,
    shutdown: watch::Sender<bool>,
}

fn spawn_devnet(validators: usize) -> (Devnet, Vec<Arc<vnc_crypto::KeyPair>>) {
    let keys = validator_keys(validators);
    let users = user_keys(1);
    let genesis = genesis_for(&keys, &users);
    let hub = LocalHub::new();
    let (shutdown, shutdown_rx) = watch::channel(false);

    let mut handles = Vec::new();
    let mut tasks = Vec::new();
    for key in keys {
        let (transport, inbox) = hub.connect();
        let engine = ConsensusEngine::builder(fast_config(), key)
            .transport(Arc::new(transport))
            .genesis(genesis.clone())
            .build()
            .unwrap();
        let (driver, handle) = EngineDriver::new(engine, inbox);
        handles.push(handle);
        tasks.push(tokio::spawn(driver.run(shutdown_rx.clone())));
    }
    (
        Devnet {
            handles,
            tasks,
            shutdown,
        },
        users,
    )
}

async fn wait_for(handles: &[EngineHandle], check: impl Fn(&EngineHandle) -> bool) {
    timeout(Duration::from_secs(20), async {
        while !handles.iter().all(&check) {
            sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("condition reached in time");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn devnet_commits_submitted_transactions() {
    let (devnet, users) = spawn_devnet(3);
    let tx = transfer(&users[0], Address::from("sink"), 99, 0);
    let hash = devnet.handles[0].submit_transaction(tx).unwrap();

    wait_for(&devnet.handles, |handle| {
        matches!(
            handle.query().transaction_status(&hash),
            Ok(TxStatus::Included { finalized: true, .. })
        )
    })
    .await;
    wait_for(&devnet.handles, |handle| handle.query().current_height() >= 3).await;

    for handle in &devnet.handles {
        assert_eq!(handle.query().balance(&Address::from("sink")), Amount::from(99));
        assert_eq!(handle.query().block(2).unwrap(), devnet.handles[0].query().block(2).unwrap());
    }

    devnet.shutdown.send(true).unwrap();
    for task in devnet.tasks {
        let engine = task.await.unwrap();
        assert!(engine.height() >= 3);
    }
}

#[tokio::test]
async fn operator_commands_reach_the_engine() {
    let (devnet, _users) = spawn_devnet(1);
    let handle = devnet.handles[0].clone();

    let validator = handle
        .register_validator(Address::from("newcomer"), Amount::from(10_000), 100)
        .await
        .unwrap();
    assert!(validator.active);
    assert_eq!(validator.commission.bps(), 100);

    let err = handle
        .register_validator(Address::from("pauper"), Amount::from(1), 0)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("below minimum"));

    handle
        .delegate(Address::from("newcomer"), Amount::from(5))
        .await
        .unwrap();
    handle
        .deactivate_validator(Address::from("newcomer"))
        .await
        .unwrap();
    assert!(!handle.query().validator(&Address::from("newcomer")).unwrap().active);
    assert_eq!(
        handle.query().validator(&Address::from("newcomer")).unwrap().delegated,
        Amount::from(5)
    );

    devnet.shutdown.send(true).unwrap();
    for task in devnet.tasks {
        task.await.unwrap();
    }
    assert!(handle.deactivate_validator(Address::from("newcomer")).await.is_err());
}

#[tokio::test]
async fn unsigned_submission_is_refused_before_gossip() {
    let (devnet, _users) = spawn_devnet(1);
    let stranger = vnc_crypto::KeyPair::from_seed([42u8; 32]);
    let unsigned = vnc_types::Transaction::new(
        stranger.address(),
        Address::from("sink"),
        Amount::from(1),
        0,
    );
    assert!(devnet.handles[0].submit_transaction(unsigned).is_err());
    assert_eq!(devnet.handles[0].query().mempool_stats().size, 0);
    devnet.shutdown.send(true).unwrap();
}
