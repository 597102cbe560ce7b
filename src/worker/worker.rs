use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::U256;
use log::{error, info, warn};
use rustc_hash::FxHashMap;
use tokio::sync::{broadcast, RwLock};
use tokio_util::sync::CancellationToken;

use crate::{
    config::{ChainConfig, EngineSettings},
    error::EngineError,
    metrics::{GraduationEvent, MetricAggregator},
    rpc::{retry_with_backoff, BlockHeader, LogEntry, RpcClient},
    scheduler::{BlockScheduler, JobContext},
    store::{
        models::{AssetData, BondingCurve, OracleBook, Pool, ProtocolVersion, WatchedAddress},
        ChainStore,
    },
    utils::{ZERO_ADDRESS, WAD},
    worker::{
        asset_fetcher::AssetFetcher,
        parser::{self, PoolEvent},
        resolver::{AddressResolver, Discovery},
        token_fetcher::TokenFetcher,
    },
};

/// Processing mode of a chain's ingestion task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    CatchingUp,
    Live,
    ReorgRecovery,
    Halted,
}

/// Single-chain ingestion worker.
///
/// Owns the chain's sequential cursor and drives the whole per-block
/// pipeline: discovery, log application, metric jobs, and checkpointing.
/// Reorgs are detected by parent-hash continuity and reconciled by rolling
/// every store back to the common ancestor and re-deriving forward.
pub struct ChainWorker {
    chain: ChainConfig,
    settings: EngineSettings,
    rpc: Arc<dyn RpcClient>,
    store: Arc<RwLock<ChainStore>>,
    oracle: Arc<OracleBook>,
    aggregator: MetricAggregator,
    scheduler: BlockScheduler,
    resolver: AddressResolver,
    asset_fetcher: AssetFetcher,
    token_fetcher: TokenFetcher,
    /// Bonding curves announced by the airlock before their pool's own
    /// creation log was seen, keyed by pool address.
    pending_bonding: FxHashMap<String, (u64, BondingCurve)>,
    mode: Mode,
    consecutive_failures: u32,
}

impl ChainWorker {
    pub fn new(
        chain: ChainConfig,
        settings: EngineSettings,
        rpc: Arc<dyn RpcClient>,
        oracle: Arc<OracleBook>,
        graduations: broadcast::Sender<GraduationEvent>,
    ) -> Result<Self, EngineError> {
        let resolver = AddressResolver::for_chain(&chain)?;
        let asset_fetcher = AssetFetcher::new(
            chain.chain_id,
            chain.addresses.shared.airlock.to_lowercase(),
            rpc.clone(),
            &settings,
        );
        let token_fetcher = TokenFetcher::new(chain.chain_id, rpc.clone(), &settings);
        let aggregator = MetricAggregator::new(
            chain.chain_id,
            chain.oracle.feed.clone(),
            oracle.clone(),
            graduations,
        );
        let scheduler = BlockScheduler::for_chain(&chain, &settings);
        let store = Arc::new(RwLock::new(ChainStore::new(chain.chain_id)));

        Ok(Self {
            chain,
            settings,
            rpc,
            store,
            oracle,
            aggregator,
            scheduler,
            resolver,
            asset_fetcher,
            token_fetcher,
            pending_bonding: FxHashMap::default(),
            mode: Mode::CatchingUp,
            consecutive_failures: 0,
        })
    }

    /// Shared read handle to this chain's pool store.
    pub fn store(&self) -> Arc<RwLock<ChainStore>> {
        self.store.clone()
    }

    pub fn scheduler(&self) -> &BlockScheduler {
        &self.scheduler
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub async fn run(mut self, cancellation_token: CancellationToken) -> anyhow::Result<()> {
        let poll = Duration::from_millis(self.settings.poll_interval_ms);

        loop {
            if cancellation_token.is_cancelled() {
                info!(
                    "chain {}: received cancellation signal",
                    self.chain.chain_id
                );
                break;
            }

            match self.step().await {
                Ok(true) => {
                    self.consecutive_failures = 0;
                },
                Ok(false) => {
                    self.consecutive_failures = 0;
                    tokio::select! {
                        _ = cancellation_token.cancelled() => break,
                        _ = tokio::time::sleep(poll) => {},
                    }
                },
                Err(e @ EngineError::ReorgDepthExceeded { .. }) => {
                    self.mode = Mode::Halted;
                    error!("chain {}: halted: {e}", self.chain.chain_id);
                    return Err(e.into());
                },
                Err(e) => {
                    self.consecutive_failures += 1;
                    warn!(
                        "chain {}: batch failed ({} consecutive): {e}",
                        self.chain.chain_id, self.consecutive_failures
                    );
                    if self.consecutive_failures >= self.settings.halt_after_failures {
                        self.mode = Mode::Halted;
                        error!(
                            "chain {}: halted after {} consecutive failures",
                            self.chain.chain_id, self.consecutive_failures
                        );
                        return Err(e.into());
                    }
                    tokio::time::sleep(poll).await;
                },
            }
        }

        Ok(())
    }

    /// Process one unit of work. Returns false when the cursor is already at
    /// the chain head.
    pub async fn step(&mut self) -> Result<bool, EngineError> {
        let next = match self.scheduler.cursor().await {
            Some(block) => block + 1,
            None => self.chain.start_block(),
        };
        let head = self.fetch_latest_block().await?;
        if next > head {
            return Ok(false);
        }

        if head - next <= self.settings.trailing_distance {
            self.set_mode(Mode::Live);
        } else {
            self.set_mode(Mode::CatchingUp);
        }

        let to = match self.mode {
            Mode::Live => head,
            _ => (next + self.settings.batch_size - 1).min(head),
        };
        self.apply_range(next, to).await?;
        Ok(true)
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.mode != mode {
            info!(
                "chain {}: {:?} -> {:?}",
                self.chain.chain_id, self.mode, mode
            );
            self.mode = mode;
        }
    }

    /// Apply `[from, to]` block by block, in log order within each block.
    async fn apply_range(&mut self, from: u64, to: u64) -> Result<(), EngineError> {
        let store = self.store.clone();

        let mut addresses = { store.read().await.filter_addresses() };
        addresses.extend(self.resolver.factory_addresses());
        let logs = self.fetch_logs(from, to, &addresses).await?;

        let mut buckets: BTreeMap<u64, Vec<LogEntry>> = BTreeMap::new();
        for log in logs {
            buckets.entry(log.block_number).or_default().push(log);
        }

        for block in from..=to {
            let header = self.fetch_header(block).await?;

            // Parent-hash continuity against our recorded chain. A mismatch
            // means the blocks we applied are no longer canonical.
            if block > 0 {
                let recorded = { store.read().await.block_hash(block - 1) };
                if let Some(prev_hash) = recorded {
                    if header.parent_hash != prev_hash {
                        self.set_mode(Mode::ReorgRecovery);
                        self.recover(block - 1).await?;
                        return Ok(());
                    }
                }
            }

            let mut block_logs = buckets.remove(&block).unwrap_or_default();

            // Discovery pass: resolve creation logs first so pools created in
            // this block see their own follow-up events.
            let mut discoveries = Vec::new();
            for log in &block_logs {
                match self.resolver.on_log(log) {
                    Ok(Some(discovery)) => discoveries.push(discovery),
                    Ok(None) => {},
                    Err(e @ EngineError::DecodeAnomaly { .. }) => {
                        warn!("chain {}: {e}, skipping log", self.chain.chain_id);
                    },
                    Err(e) => return Err(e),
                }
            }

            // Prefetch token metadata and airlock asset data outside the
            // store lock.
            let mut token_decimals: FxHashMap<String, u8> = FxHashMap::default();
            for discovery in &discoveries {
                for token in discovery.token_addresses().into_iter().flatten() {
                    if token == ZERO_ADDRESS || token_decimals.contains_key(token) {
                        continue;
                    }
                    let decimals = self.token_fetcher.decimals(token, block).await;
                    token_decimals.insert(token.to_string(), decimals);
                }
            }

            let mut assets: FxHashMap<String, Arc<AssetData>> = FxHashMap::default();
            for discovery in &discoveries {
                if let Discovery::AirlockCreate { asset, .. } = discovery {
                    match self.asset_fetcher.get(asset, block).await {
                        Ok(data) => {
                            assets.insert(asset.clone(), data);
                        },
                        Err(e) if e.is_transient() => return Err(e),
                        Err(e) => {
                            warn!(
                                "chain {}: asset data for {} unavailable: {e}",
                                self.chain.chain_id, asset
                            );
                        },
                    }
                }
            }

            let new_addresses = {
                let mut guard = store.write().await;
                guard.begin_block(block);
                let mut new_addresses = Vec::new();
                for discovery in discoveries {
                    if let Some(address) =
                        self.apply_discovery(&mut guard, discovery, &assets, &token_decimals, &header)
                    {
                        new_addresses.push(address);
                    }
                }
                new_addresses
            };

            // The range filter predates this block's discoveries; refetch the
            // remainder of the range for the new addresses and merge.
            if !new_addresses.is_empty() {
                let extra = self.fetch_logs(block, to, &new_addresses).await?;
                for log in extra {
                    if log.block_number == block {
                        block_logs.push(log);
                    } else {
                        buckets.entry(log.block_number).or_default().push(log);
                    }
                }
                block_logs.sort_by_key(|l| l.log_index);
                for bucket in buckets.values_mut() {
                    bucket.sort_by_key(|l| l.log_index);
                }
            }

            {
                let mut guard = store.write().await;
                for log in &block_logs {
                    match parser::decode(log) {
                        Ok(Some(event)) => self.apply_event(&mut guard, event, log, &header),
                        Ok(None) => {},
                        Err(e @ EngineError::DecodeAnomaly { .. }) => {
                            warn!("chain {}: {e}, skipping log", self.chain.chain_id);
                        },
                        Err(e) => return Err(e),
                    }
                }
                guard.record_block_hash(block, header.hash);

                // Retention must cover both the reorg walk and the
                // touched-pool refresh window.
                let keep = self
                    .settings
                    .max_reorg_depth
                    .max(self.settings.metric_refresh_interval);
                guard.prune_below(block.saturating_sub(keep));
            }

            let mut ctx = JobContext {
                chain: &self.chain,
                rpc: self.rpc.as_ref(),
                store: self.store.as_ref(),
                oracle: self.oracle.as_ref(),
                aggregator: &mut self.aggregator,
                settings: &self.settings,
                block,
                timestamp: header.timestamp,
            };
            self.scheduler.on_block(&mut ctx).await;

            self.scheduler.advance_cursor(block).await;
        }

        Ok(())
    }

    /// Apply one discovery. Returns the pool's contract address when it must
    /// be added to the log filter for the rest of the range.
    fn apply_discovery(
        &mut self,
        store: &mut ChainStore,
        discovery: Discovery,
        assets: &FxHashMap<String, Arc<AssetData>>,
        token_decimals: &FxHashMap<String, u8>,
        header: &BlockHeader,
    ) -> Option<String> {
        let chain_id = self.chain.chain_id;
        let wrapped_native = self.chain.addresses.shared.wrapped_native.to_lowercase();

        match discovery {
            Discovery::V2Pair {
                pair,
                token0,
                token1,
            } => {
                let mut pool = Pool::from_v2_pair_created(
                    chain_id,
                    pair.clone(),
                    token0,
                    token1,
                    &wrapped_native,
                    header.number,
                    header.timestamp,
                );
                self.attach_pending_bonding(&mut pool);
                apply_token_decimals(&mut pool, token_decimals);
                let watched =
                    WatchedAddress::new(chain_id, ProtocolVersion::V2, pair.clone(), header.number);
                store.insert_pool_and_watch(pool, watched).then_some(pair)
            },
            Discovery::V3Pool {
                pool,
                token0,
                token1,
                fee,
                tick_spacing,
            } => {
                let mut row = Pool::from_v3_pool_created(
                    chain_id,
                    pool.clone(),
                    token0,
                    token1,
                    fee,
                    tick_spacing,
                    &wrapped_native,
                    header.number,
                    header.timestamp,
                );
                self.attach_pending_bonding(&mut row);
                apply_token_decimals(&mut row, token_decimals);
                let watched =
                    WatchedAddress::new(chain_id, ProtocolVersion::V3, pool.clone(), header.number);
                store.insert_pool_and_watch(row, watched).then_some(pool)
            },
            Discovery::V4Pool {
                pool_id,
                currency0,
                currency1,
                fee,
                tick_spacing,
                hooks,
                sqrt_price_x96,
                tick,
            } => {
                let mut pool = Pool::from_v4_initialize(
                    chain_id,
                    pool_id.clone(),
                    currency0,
                    currency1,
                    fee,
                    tick_spacing,
                    hooks.clone(),
                    sqrt_price_x96,
                    tick,
                    &wrapped_native,
                    header.number,
                    header.timestamp,
                );
                // A bonding announcement may reference the hook rather than
                // the pool id.
                if let Some((_, curve)) = self.pending_bonding.remove(&hooks) {
                    pool.bonding = Some(curve);
                } else {
                    self.attach_pending_bonding(&mut pool);
                }
                apply_token_decimals(&mut pool, token_decimals);
                let watched =
                    WatchedAddress::new(chain_id, ProtocolVersion::V4, pool_id, header.number);
                // V4 logs arrive via the pool manager already in the filter.
                store.insert_pool_and_watch(pool, watched);
                None
            },
            Discovery::AirlockCreate {
                asset,
                numeraire: _,
                pool_or_hook,
            } => {
                let Some(data) = assets.get(&asset) else {
                    return None;
                };
                let target = if data.pool != ZERO_ADDRESS {
                    data.pool.clone()
                } else {
                    pool_or_hook
                };
                let curve = BondingCurve {
                    tokens_to_sell: data.num_tokens_to_sell,
                    total_supply: data.total_supply,
                    graduation_threshold_usd: U256::from(self.chain.graduation_threshold_usd)
                        * *WAD,
                    graduation_balance_usd: U256::ZERO,
                    graduated: false,
                };

                if let Some(mut pool) = store.checkout_pool(&target) {
                    if pool.bonding.is_none() {
                        pool.bonding = Some(curve);
                        store.commit_pool(pool);
                    }
                } else {
                    // Pool creation log has not been seen yet; attach the
                    // curve when it is.
                    self.pending_bonding
                        .insert(target, (header.number, curve));
                }
                None
            },
            Discovery::AirlockMigrate { asset, pool } => {
                let bonding_address = store
                    .bonding_pool_for_asset(&asset)
                    .map(|p| p.address.clone());
                let Some(address) = bonding_address else {
                    warn!(
                        "chain {}: Migrate for unknown asset {} at block {}",
                        chain_id, asset, header.number
                    );
                    return None;
                };
                if let Some(mut row) = store.checkout_pool(&address) {
                    row.migration_pool = Some(pool);
                    if let Some(bonding) = row.bonding.as_mut() {
                        bonding.graduated = true;
                    }
                    store.commit_pool(row);
                }
                store.deactivate_watch(&address);
                info!(
                    "chain {}: asset {} migrated, bonding pool {} retired",
                    chain_id, asset, address
                );
                None
            },
        }
    }

    fn attach_pending_bonding(&mut self, pool: &mut Pool) {
        if let Some((_, curve)) = self.pending_bonding.remove(&pool.address) {
            pool.bonding = Some(curve);
        }
    }

    fn apply_event(
        &mut self,
        store: &mut ChainStore,
        event: PoolEvent,
        log: &LogEntry,
        header: &BlockHeader,
    ) {
        // V2 reserve changes arrive via the paired Sync.
        if matches!(event, PoolEvent::V2Mint(_) | PoolEvent::V2Burn(_)) {
            return;
        }

        let key = event.pool_key(log);
        let active = store
            .watched_address(&key)
            .is_some_and(|w| w.active);
        if !active {
            return;
        }
        let Some(mut pool) = store.checkout_pool(&key) else {
            return;
        };

        match event {
            PoolEvent::V2Sync(e) => {
                pool.apply_v2_sync(
                    U256::from(e.reserve0),
                    U256::from(e.reserve1),
                    header.number,
                    header.timestamp,
                );
            },
            PoolEvent::V2Swap(e) => {
                pool.accrue_fees(e.amount0In, e.amount1In);
                pool.last_swap_at = Some(header.timestamp);
                let quote_raw = if pool.base_is_token0 {
                    e.amount1In.saturating_add(e.amount1Out)
                } else {
                    e.amount0In.saturating_add(e.amount0Out)
                };
                self.aggregator
                    .on_swap(&mut pool, quote_raw, header.number, header.timestamp);
            },
            PoolEvent::V3Initialize(e) => {
                pool.apply_initialize(
                    U256::from(e.sqrtPriceX96),
                    e.tick.as_i32(),
                    header.number,
                    header.timestamp,
                );
            },
            PoolEvent::V3Swap(e) => {
                // Positive amounts flow into the pool.
                let in0 = if e.amount0.is_positive() { e.amount0.into_raw() } else { U256::ZERO };
                let in1 = if e.amount1.is_positive() { e.amount1.into_raw() } else { U256::ZERO };
                pool.accrue_fees(in0, in1);
                pool.apply_concentrated_swap(
                    U256::from(e.sqrtPriceX96),
                    e.liquidity,
                    e.tick.as_i32(),
                    header.number,
                    header.timestamp,
                );
                let quote_signed = if pool.base_is_token0 { e.amount1 } else { e.amount0 };
                self.aggregator.on_swap(
                    &mut pool,
                    quote_signed.unsigned_abs(),
                    header.number,
                    header.timestamp,
                );
            },
            PoolEvent::V3Mint(e) => {
                let amount = i128::try_from(e.amount).unwrap_or(i128::MAX);
                pool.apply_liquidity_delta(amount, header.number, header.timestamp);
            },
            PoolEvent::V3Burn(e) => {
                let amount = i128::try_from(e.amount).unwrap_or(i128::MAX);
                pool.apply_liquidity_delta(-amount, header.number, header.timestamp);
            },
            PoolEvent::V4Swap(e) => {
                // V4 deltas are from the user's perspective: negative means
                // paid into the pool.
                let in0 = if e.amount0 < 0 { U256::from(e.amount0.unsigned_abs()) } else { U256::ZERO };
                let in1 = if e.amount1 < 0 { U256::from(e.amount1.unsigned_abs()) } else { U256::ZERO };
                pool.accrue_fees(in0, in1);
                pool.apply_concentrated_swap(
                    U256::from(e.sqrtPriceX96),
                    e.liquidity,
                    e.tick.as_i32(),
                    header.number,
                    header.timestamp,
                );
                let quote_raw = if pool.base_is_token0 {
                    U256::from(e.amount1.unsigned_abs())
                } else {
                    U256::from(e.amount0.unsigned_abs())
                };
                self.aggregator
                    .on_swap(&mut pool, quote_raw, header.number, header.timestamp);
            },
            PoolEvent::V4ModifyLiquidity(e) => {
                let delta = i128::try_from(e.liquidityDelta).unwrap_or_else(|_| {
                    if e.liquidityDelta.is_negative() { i128::MIN } else { i128::MAX }
                });
                pool.apply_liquidity_delta(delta, header.number, header.timestamp);
            },
            PoolEvent::V2Mint(_) | PoolEvent::V2Burn(_) => unreachable!(),
        }

        // Derived fields move in the same causal step as the event that
        // changed the pool; the scheduled refresh only covers pools no event
        // has touched.
        self.aggregator
            .refresh(&mut pool, header.number, header.timestamp);
        store.commit_pool(pool);
    }

    /// Walk backwards from `from` until the recorded hash matches the remote
    /// chain, then roll every store back to that ancestor.
    async fn recover(&mut self, from: u64) -> Result<(), EngineError> {
        let chain_id = self.chain.chain_id;
        let max_depth = self.settings.max_reorg_depth;
        let floor = from.saturating_sub(max_depth);
        let store = self.store.clone();

        let mut probe = from;
        let ancestor = loop {
            let recorded = { store.read().await.block_hash(probe) };
            let Some(local) = recorded else {
                return Err(EngineError::ReorgDepthExceeded {
                    chain_id,
                    max_depth,
                    floor: probe,
                });
            };
            let remote = self.fetch_header(probe).await?;
            if local == remote.hash {
                break probe;
            }
            if probe <= floor || probe == 0 {
                return Err(EngineError::ReorgDepthExceeded {
                    chain_id,
                    max_depth,
                    floor,
                });
            }
            probe -= 1;
        };

        warn!(
            "chain {}: reorg detected, rolling back from block {} to ancestor {}",
            chain_id, from, ancestor
        );
        {
            let mut guard = store.write().await;
            guard.rollback_to(ancestor);
        }
        self.oracle.rollback_to(chain_id, ancestor);
        self.aggregator.rollback_to(ancestor);
        self.scheduler.rollback_to(ancestor).await;
        self.pending_bonding.retain(|_, entry| entry.0 <= ancestor);
        Ok(())
    }

    async fn fetch_latest_block(&self) -> Result<u64, EngineError> {
        let rpc = self.rpc.as_ref();
        let chain_id = self.chain.chain_id;
        retry_with_backoff(
            "latest block",
            self.settings.rpc_retry_limit,
            self.retry_base(),
            || async move { rpc.latest_block(chain_id).await },
        )
        .await
    }

    async fn fetch_header(&self, number: u64) -> Result<BlockHeader, EngineError> {
        let rpc = self.rpc.as_ref();
        let chain_id = self.chain.chain_id;
        retry_with_backoff(
            "block header",
            self.settings.rpc_retry_limit,
            self.retry_base(),
            || async move { rpc.get_block_header(chain_id, number).await },
        )
        .await
    }

    async fn fetch_logs(
        &self,
        from: u64,
        to: u64,
        addresses: &[String],
    ) -> Result<Vec<LogEntry>, EngineError> {
        let rpc = self.rpc.as_ref();
        let chain_id = self.chain.chain_id;
        retry_with_backoff(
            "get logs",
            self.settings.rpc_retry_limit,
            self.retry_base(),
            || async move { rpc.get_logs(chain_id, from, to, addresses).await },
        )
        .await
    }

    fn retry_base(&self) -> Duration {
        Duration::from_millis(self.settings.rpc_retry_base_ms)
    }
}

fn apply_token_decimals(pool: &mut Pool, token_decimals: &FxHashMap<String, u8>) {
    if let Some(decimals) = token_decimals.get(&pool.base_token) {
        pool.base_decimals = *decimals;
    }
    if let Some(decimals) = token_decimals.get(&pool.quote_token) {
        pool.quote_decimals = *decimals;
    }
}
