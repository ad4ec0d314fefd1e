// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::sync::OnceLock;
use std::sync::atomic::{AtomicUsize, Ordering};

pub const WORKERS_ENV: &str = "UPSF_TOKIO_WORKERS";
pub const MAX_BLOCKING_ENV: &str = "UPSF_MAX_BLOCKING_THREADS";

const DEFAULT_MAX_BLOCKING: usize = 512;

/// Runtime driving every gRPC call made through the C interface
static GLOBAL_RUNTIME: OnceLock<tokio::runtime::Runtime> = OnceLock::new();

fn env_usize(name: &str) -> Option<usize> {
    std::env::var(name).ok().and_then(|s| s.parse().ok())
}

/// Worker threads: `UPSF_TOKIO_WORKERS`, else twice the CPU count and at
/// least 4, since every C caller parks a thread in `block_on`.
fn worker_threads(configured: Option<usize>) -> usize {
    configured
        .filter(|n| *n > 0)
        .unwrap_or_else(|| (num_cpus::get() * 2).max(4))
}

fn max_blocking_threads(configured: Option<usize>) -> usize {
    configured
        .filter(|n| *n > 0)
        .unwrap_or(DEFAULT_MAX_BLOCKING)
}

/// Get or initialize the global Tokio runtime.
///
/// The runtime lives for the whole process. Building it only fails when the
/// OS refuses to spawn threads, and nothing in the bridge can run without it.
pub fn get_runtime() -> &'static tokio::runtime::Runtime {
    GLOBAL_RUNTIME.get_or_init(|| {
        let workers = worker_threads(env_usize(WORKERS_ENV));
        let max_blocking = max_blocking_threads(env_usize(MAX_BLOCKING_ENV));

        tracing::debug!(workers, max_blocking, "starting bridge runtime");

        tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .max_blocking_threads(max_blocking)
            .thread_name_fn(|| {
                static ATOMIC_ID: AtomicUsize = AtomicUsize::new(0);
                let id = ATOMIC_ID.fetch_add(1, Ordering::SeqCst);
                format!("upsf-rt-{}", id)
            })
            .enable_all()
            .build()
            .expect("failed to create the bridge Tokio runtime")
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_runtime_is_shared() {
        let runtime = get_runtime();
        let runtime2 = get_runtime();
        assert!(std::ptr::eq(runtime, runtime2));

        let answer = runtime.block_on(async { 40 + 2 });
        assert_eq!(answer, 42);
    }

    #[test]
    fn test_thread_counts() {
        assert_eq!(worker_threads(Some(8)), 8);
        assert!(worker_threads(None) >= 4);
        assert!(worker_threads(Some(0)) >= 4);

        assert_eq!(max_blocking_threads(Some(256)), 256);
        assert_eq!(max_blocking_threads(None), 512);
    }
}
