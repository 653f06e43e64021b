use criterion::{criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use vnc_crypto::{sign_transaction, KeyPair, Signer};
use vnc_mempool::Mempool;
use vnc_types::{Address, Amount, Transaction};

const BATCH_SIZE: usize = 2_048;
const SENDERS: u8 = 64;
const BLOCK_LIMIT: usize = 1_000;

fn generate_transactions(count: usize) -> Vec<Transaction> {
    let keys: Vec<KeyPair> = (0..SENDERS).map(|seed| KeyPair::from_seed([seed; 32])).collect();
    (0..count)
        .map(|i| {
            let key = &keys[i % keys.len()];
            let nonce = (i / keys.len()) as u64;
            let tx = Transaction::new(key.address(), Address::from("sink"), Amount::from(1), nonce)
                .with_gas(1 + (i as u64 * 7919) % 97, 21_000);
            sign_transaction(tx, key)
        })
        .collect()
}

fn benchmark_tx_selection(c: &mut Criterion) {
    let txs = generate_transactions(BATCH_SIZE);

    let mut group = c.benchmark_group("mempool_tx_selection");
    group.throughput(Throughput::Elements(BATCH_SIZE as u64));
    group.bench_function("admit_batch_2048", |b| {
        b.iter(|| {
            let pool = Mempool::new(BATCH_SIZE * 2);
            for tx in txs.iter() {
                pool.admit(tx.clone()).expect("tx admitted");
            }
        });
    });
    group.bench_function("select_1000_of_2048", |b| {
        b.iter_batched(
            || {
                let pool = Mempool::new(BATCH_SIZE * 2);
                for tx in txs.iter() {
                    pool.admit(tx.clone()).expect("tx admitted");
                }
                pool
            },
            |pool| pool.select(BLOCK_LIMIT),
            BatchSize::LargeInput,
        );
    });
    group.finish();
}

criterion_group!(benches, benchmark_tx_selection);
criterion_main!(benches);
