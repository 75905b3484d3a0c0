//! Benchmark utilities for keyctx.

#![deny(unsafe_code)]
#![warn(missing_docs)]

use keyctx_core::{Context, ContextOptions, Value};
use keyctx_engine::MemoryProvider;
use rand::distributions::Alphanumeric;
use rand::Rng;

/// Generate random key bytes of the specified size.
pub fn random_bytes(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` random alphanumeric text keys of length `len`.
pub fn random_text_keys(count: usize, len: usize) -> Vec<Value> {
    let mut rng = rand::thread_rng();
    (0..count)
        .map(|_| {
            let key: String = (&mut rng)
                .sample_iter(&Alphanumeric)
                .take(len)
                .map(char::from)
                .collect();
            Value::Text(key)
        })
        .collect()
}

/// Generate `count` random signed integers.
pub fn random_ints(count: usize) -> Vec<Value> {
    let mut rng = rand::thread_rng();
    (0..count).map(|_| Value::Int(rng.gen::<i32>().into())).collect()
}

/// A context on the in-memory engine with a database attached.
pub fn bench_context() -> Context {
    let context = Context::create_with(&MemoryProvider, ContextOptions::new())
        .expect("Failed to create context");
    context
        .create_database()
        .expect("Failed to create database");
    context
}
