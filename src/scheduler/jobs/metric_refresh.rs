//! Periodic re-run of the metric aggregator over pools touched since the
//! job's last checkpoint. Events refresh their own pool inline; this job
//! folds in oracle samples that arrived after the last event. Work is
//! bounded by the store's journal rather than a full table scan.

use log::debug;

use crate::{error::EngineError, scheduler::JobContext};

pub async fn run(ctx: &mut JobContext<'_>, since: u64) -> Result<(), EngineError> {
    let store = ctx.store;
    let touched = { store.read().await.pools_touched_since(since) };
    if touched.is_empty() {
        return Ok(());
    }

    let count = touched.len();
    let mut guard = store.write().await;
    for address in touched {
        let Some(mut pool) = guard.checkout_pool(&address) else {
            continue;
        };
        ctx.aggregator.refresh(&mut pool, ctx.block, ctx.timestamp);
        guard.commit_pool(pool);
    }
    drop(guard);

    debug!(
        "chain {}: refreshed {} pools touched since block {}",
        ctx.chain.chain_id, count, since
    );
    Ok(())
}
