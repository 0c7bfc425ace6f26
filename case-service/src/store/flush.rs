//! Debounced background flusher.
//!
//! Mutations only mark the store dirty; this worker wakes on the first
//! mark, waits out the debounce window so a burst collapses into one
//! write, and then flushes. A failed flush is logged and retried on the
//! next cycle - it never propagates into request handling.

use std::time::Duration;

use super::Store;

pub fn spawn_flush_worker(store: Store, debounce: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            store.flush_requested().await;

            loop {
                tokio::time::sleep(debounce).await;

                let flusher = store.clone();
                match tokio::task::spawn_blocking(move || flusher.flush_if_dirty()).await {
                    Ok(Ok(wrote)) => {
                        if wrote {
                            tracing::debug!(path = %store.path().display(), "store flushed");
                        }
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::error!(
                            error = %e,
                            path = %store.path().display(),
                            "store flush failed; retrying next debounce cycle"
                        );
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "flush task panicked");
                        break;
                    }
                }
            }
        }
    })
}
