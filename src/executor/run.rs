// src/executor/run.rs
//
// Bounded-concurrency runner shared by every LLM stage.

use std::fmt::Display;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::future::join_all;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Run `f` over `items` with at most `max_concurrent` calls in flight.
///
/// All futures are driven on the calling task; the semaphore is the only
/// admission gate. Results line up 1:1 with `items` whatever order the calls
/// finish in. A call that errors is logged and yields `None` without
/// affecting the others.
pub async fn run_bounded<I, O, E, F, Fut, L>(
    items: Vec<I>,
    max_concurrent: usize,
    label: L,
    f: F,
) -> Vec<Option<O>>
where
    F: Fn(I) -> Fut,
    Fut: Future<Output = Result<O, E>>,
    E: Display,
    L: Fn(&I) -> String,
{
    let gate = Semaphore::new(max_concurrent.max(1));
    let done = AtomicUsize::new(0);
    let total = items.len();

    let tasks = items.into_iter().map(|item| {
        let name = label(&item);
        let (gate, done, f) = (&gate, &done, &f);

        async move {
            let _permit = gate.acquire().await.ok()?;
            let result = f(item).await;

            let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(item = %name, "processed {finished}/{total}");

            match result {
                Ok(out) => Some(out),
                Err(e) => {
                    warn!(item = %name, error = %e, "processing failed");
                    None
                }
            }
        }
    });

    join_all(tasks).await
}
