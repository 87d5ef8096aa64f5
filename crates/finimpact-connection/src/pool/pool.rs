//! Connection pool implementation

use std::collections::VecDeque;
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;

use async_trait::async_trait;
use finimpact_core::{Connection, FinImpactError, Result};
use parking_lot::Mutex;
use tokio::sync::{Notify, Semaphore};

use super::config::{ExhaustionPolicy, PoolConfig};
use super::stats::PoolStats;

/// Factory trait for creating new connections
#[async_trait]
pub trait ConnectionFactory: Send + Sync + 'static {
    /// Create a new connection
    async fn create(&self) -> Result<Arc<dyn Connection>>;

    /// Validate that a connection is still usable
    ///
    /// Default implementation only checks that it has not been closed.
    async fn validate(&self, conn: &dyn Connection) -> bool {
        !conn.is_closed()
    }
}

#[async_trait]
impl<T: ConnectionFactory> ConnectionFactory for Arc<T> {
    async fn create(&self) -> Result<Arc<dyn Connection>> {
        (**self).create().await
    }

    async fn validate(&self, conn: &dyn Connection) -> bool {
        (**self).validate(conn).await
    }
}

/// Where a checked-out connection came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionOrigin {
    /// One of the pool's own connections; goes back to the queue on release
    Pooled,
    /// Opened because the pool was exhausted; closed on release
    Overflow,
}

/// State shared between the pool and every handle it gave out
struct PoolState {
    config: PoolConfig,
    factory: Arc<dyn ConnectionFactory>,
    /// FIFO of idle connections
    idle: Mutex<VecDeque<Arc<dyn Connection>>>,
    /// One permit per idle connection. Permits are only added or removed
    /// while `idle` is locked so the two never drift apart.
    available: Semaphore,
    /// Signalled when a pooled connection is dropped and its slot can be refilled
    capacity_freed: Notify,
    /// Serializes `initialize` and `shutdown`
    lifecycle: tokio::sync::Mutex<()>,
    initialized: AtomicBool,
    /// Bumped by `shutdown`; handles from an older generation are closed on release.
    /// Only changed while `idle` is locked.
    generation: AtomicU64,
    /// Pooled connections in circulation (idle + checked out). Reset and
    /// reserved while `idle` is locked, so a count always belongs to the
    /// current generation.
    pooled: AtomicUsize,
    checked_out: AtomicUsize,
    overflow_active: AtomicUsize,
    overflow_total: AtomicU64,
    opened: AtomicU64,
    waiting: AtomicUsize,
}

impl PoolState {
    async fn open(&self) -> Result<Arc<dyn Connection>> {
        let conn = self.factory.create().await?;
        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(conn)
    }

    fn checkout(
        self: &Arc<Self>,
        connection: Arc<dyn Connection>,
        origin: ConnectionOrigin,
        generation: u64,
    ) -> PooledConnection {
        self.checked_out.fetch_add(1, Ordering::SeqCst);
        if origin == ConnectionOrigin::Overflow {
            self.overflow_active.fetch_add(1, Ordering::SeqCst);
            self.overflow_total.fetch_add(1, Ordering::SeqCst);
        }
        PooledConnection {
            connection,
            origin,
            generation,
            returned: AtomicBool::new(false),
            pool: Arc::clone(self),
        }
    }

    /// Give up one pooled slot. Callers hold the `idle` lock.
    fn forget_pooled(&self) {
        let _ = self
            .pooled
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        self.capacity_freed.notify_one();
    }

    /// Take a handle's connection back. Never blocks.
    fn give_back(&self, connection: Arc<dyn Connection>, origin: ConnectionOrigin, generation: u64) {
        self.checked_out.fetch_sub(1, Ordering::SeqCst);

        if origin == ConnectionOrigin::Overflow {
            self.overflow_active.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("closing overflow connection on release");
            close_detached(connection);
            return;
        }

        let mut idle = self.idle.lock();
        if generation != self.generation.load(Ordering::SeqCst) {
            drop(idle);
            tracing::debug!("closing connection checked out before pool shutdown");
            close_detached(connection);
            return;
        }

        if connection.is_closed() {
            self.forget_pooled();
            drop(idle);
            tracing::debug!("dropping closed connection instead of re-queueing it");
            return;
        }

        idle.push_back(connection);
        self.available.add_permits(1);
    }
}

/// Close a connection from a synchronous context.
///
/// The close runs on the current tokio runtime. Outside a runtime the
/// connection is simply dropped.
fn close_detached(connection: Arc<dyn Connection>) {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) => {
            handle.spawn(async move {
                if let Err(e) = connection.close().await {
                    tracing::warn!(error = %e, "failed to close released connection");
                }
            });
        }
        Err(_) => {
            tracing::debug!("no async runtime available, dropping connection without close");
        }
    }
}

/// Counts a caller as waiting for as long as it is alive
struct WaitingGuard<'a>(&'a AtomicUsize);

impl<'a> WaitingGuard<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for WaitingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

fn shut_down_error() -> FinImpactError {
    FinImpactError::Connection("connection pool was shut down".into())
}

/// A reserved place for one more pooled connection, given back unless committed
struct PooledSlot<'a> {
    state: &'a PoolState,
    generation: u64,
    committed: bool,
}

impl<'a> PooledSlot<'a> {
    /// Reserve a slot in the current generation, if the pool is below capacity
    fn reserve(state: &'a PoolState) -> Result<Option<Self>> {
        let _idle = state.idle.lock();
        if !state.initialized.load(Ordering::SeqCst) {
            return Err(shut_down_error());
        }
        let capacity = state.config.size();
        let reserved = state
            .pooled
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < capacity).then_some(n + 1)
            })
            .is_ok();
        Ok(reserved.then(|| Self {
            state,
            generation: state.generation.load(Ordering::SeqCst),
            committed: false,
        }))
    }

    /// Whether no `shutdown` has happened since the slot was reserved
    fn is_current(&self) -> bool {
        let _idle = self.state.idle.lock();
        self.state.initialized.load(Ordering::SeqCst)
            && self.state.generation.load(Ordering::SeqCst) == self.generation
    }

    fn commit(mut self) -> u64 {
        self.committed = true;
        self.generation
    }
}

impl Drop for PooledSlot<'_> {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        // `shutdown` already reset the count of an older generation
        let _idle = self.state.idle.lock();
        if self.state.generation.load(Ordering::SeqCst) == self.generation {
            self.state.forget_pooled();
        }
    }
}

/// A fixed-capacity pool of database connections
///
/// Connections are opened eagerly by [`ConnectionPool::initialize`] and handed
/// out by [`ConnectionPool::acquire`]. A handle goes back to the pool when it
/// is released or dropped. Cloning the pool is cheap and every clone shares
/// the same connections.
#[derive(Clone)]
pub struct ConnectionPool {
    state: Arc<PoolState>,
}

impl ConnectionPool {
    /// Create a new, uninitialized pool with the given configuration and factory
    pub fn new<F: ConnectionFactory>(config: PoolConfig, factory: F) -> Self {
        Self::with_factory(config, Arc::new(factory))
    }

    /// Create a new, uninitialized pool around a shared factory
    pub fn with_factory(config: PoolConfig, factory: Arc<dyn ConnectionFactory>) -> Self {
        Self {
            state: Arc::new(PoolState {
                config,
                factory,
                idle: Mutex::new(VecDeque::new()),
                available: Semaphore::new(0),
                capacity_freed: Notify::new(),
                lifecycle: tokio::sync::Mutex::new(()),
                initialized: AtomicBool::new(false),
                generation: AtomicU64::new(0),
                pooled: AtomicUsize::new(0),
                checked_out: AtomicUsize::new(0),
                overflow_active: AtomicUsize::new(0),
                overflow_total: AtomicU64::new(0),
                opened: AtomicU64::new(0),
                waiting: AtomicUsize::new(0),
            }),
        }
    }

    /// Open every pooled connection.
    ///
    /// Runs once: calls made while the pool is already initialized return
    /// immediately. If any connection cannot be opened, those already opened
    /// are closed again and a `Configuration` error is returned, since the
    /// application has no data access without the pool.
    #[tracing::instrument(skip(self), fields(size = self.state.config.size()))]
    pub async fn initialize(&self) -> Result<()> {
        let _lifecycle = self.state.lifecycle.lock().await;
        if self.state.initialized.load(Ordering::SeqCst) {
            tracing::debug!("connection pool already initialized");
            return Ok(());
        }

        let size = self.state.config.size();
        let mut opened = Vec::with_capacity(size);
        for index in 0..size {
            match self.state.open().await {
                Ok(conn) => opened.push(conn),
                Err(e) => {
                    tracing::error!(error = %e, index, "failed to open pooled connection");
                    for conn in opened {
                        if let Err(close_err) = conn.close().await {
                            tracing::warn!(error = %close_err, "failed to close connection after aborted initialization");
                        }
                    }
                    return Err(FinImpactError::Configuration(format!(
                        "could not open pooled connection {} of {}: {}",
                        index + 1,
                        size,
                        e
                    )));
                }
            }
        }

        {
            let mut idle = self.state.idle.lock();
            idle.extend(opened);
            self.state.available.add_permits(size);
            self.state.pooled.store(size, Ordering::SeqCst);
            self.state.initialized.store(true, Ordering::SeqCst);
        }

        tracing::info!(size, "connection pool initialized");
        Ok(())
    }

    /// Get a connection from the pool
    ///
    /// Waits up to the configured acquire timeout for an idle connection.
    /// A connection that fails validation is replaced by a freshly opened one,
    /// and so is one dropped on release while this call waits.
    /// When the timeout runs out, the exhaustion policy decides between an
    /// overflow connection and `FinImpactError::PoolExhausted`. A pool that
    /// was shut down during the wait returns a `Connection` error.
    ///
    /// Dropping the returned future abandons the wait.
    #[tracing::instrument(skip(self), level = "debug")]
    pub async fn acquire(&self) -> Result<PooledConnection> {
        let state = &self.state;
        if !state.initialized.load(Ordering::SeqCst) {
            return Err(FinImpactError::Connection(
                "connection pool is not initialized".into(),
            ));
        }
        let started = Instant::now();

        let permit = match state.available.try_acquire() {
            Ok(permit) => Some(permit),
            Err(_) => {
                // The pool may have shrunk after dropping closed connections
                if let Some(handle) = self.open_pooled().await? {
                    return Ok(handle);
                }

                let _waiting = WaitingGuard::enter(&state.waiting);
                let deadline = tokio::time::Instant::now() + state.config.acquire_timeout();
                loop {
                    tokio::select! {
                        acquired = state.available.acquire() => match acquired {
                            Ok(permit) => break Some(permit),
                            Err(_) => {
                                return Err(FinImpactError::Connection(
                                    "connection pool semaphore closed".into(),
                                ));
                            }
                        },
                        _ = state.capacity_freed.notified() => {
                            if let Some(handle) = self.open_pooled().await? {
                                return Ok(handle);
                            }
                        }
                        _ = tokio::time::sleep_until(deadline) => break None,
                    }
                }
            }
        };

        if let Some(permit) = permit {
            permit.forget();
            // The generation is read with the pop so a connection queued by a
            // later `initialize` is labelled with its own generation
            let (next, generation) = {
                let mut idle = state.idle.lock();
                (idle.pop_front(), state.generation.load(Ordering::SeqCst))
            };
            if let Some(conn) = next {
                let handle = state.checkout(conn, ConnectionOrigin::Pooled, generation);
                if state.factory.validate(&*handle).await {
                    return Ok(handle);
                }
                tracing::warn!("pooled connection is no longer usable, replacing it");
                handle.invalidate();
            }
        }

        if !state.initialized.load(Ordering::SeqCst) {
            return Err(shut_down_error());
        }
        if let Some(handle) = self.open_pooled().await? {
            return Ok(handle);
        }

        let waited_ms = started.elapsed().as_millis() as u64;
        match state.config.exhaustion_policy() {
            ExhaustionPolicy::Overflow => {
                tracing::warn!(waited_ms, "connection pool exhausted, opening overflow connection");
                let conn = state.open().await?;
                let generation = state.generation.load(Ordering::SeqCst);
                Ok(state.checkout(conn, ConnectionOrigin::Overflow, generation))
            }
            ExhaustionPolicy::Fail => {
                tracing::warn!(waited_ms, "connection pool exhausted");
                Err(FinImpactError::PoolExhausted { waited_ms })
            }
        }
    }

    /// Open a new pooled connection if the pool is below capacity
    async fn open_pooled(&self) -> Result<Option<PooledConnection>> {
        let Some(slot) = PooledSlot::reserve(&self.state)? else {
            return Ok(None);
        };
        let conn = self.state.open().await?;
        if !slot.is_current() {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "failed to close connection opened during shutdown");
            }
            return Err(shut_down_error());
        }
        let generation = slot.commit();
        tracing::debug!("opened pooled connection to restore capacity");
        Ok(Some(
            self.state
                .checkout(conn, ConnectionOrigin::Pooled, generation),
        ))
    }

    /// Close every idle connection and mark the pool uninitialized.
    ///
    /// Connections checked out at this point are closed when their holders
    /// release them. A later `initialize` opens a fresh set.
    #[tracing::instrument(skip(self))]
    pub async fn shutdown(&self) {
        let _lifecycle = self.state.lifecycle.lock().await;

        let drained: Vec<_> = {
            let mut idle = self.state.idle.lock();
            self.state.initialized.store(false, Ordering::SeqCst);
            self.state.generation.fetch_add(1, Ordering::SeqCst);
            let drained: Vec<_> = idle.drain(..).collect();
            for _ in 0..drained.len() {
                match self.state.available.try_acquire() {
                    Ok(permit) => permit.forget(),
                    Err(_) => break,
                }
            }
            self.state.pooled.store(0, Ordering::SeqCst);
            drained
        };

        let closed = drained.len();
        for conn in drained {
            if let Err(e) = conn.close().await {
                tracing::warn!(error = %e, "failed to close pooled connection during shutdown");
            }
        }

        tracing::info!(closed, "connection pool shut down");
    }

    /// Whether `initialize` has completed and `shutdown` has not been called since
    pub fn is_initialized(&self) -> bool {
        self.state.initialized.load(Ordering::SeqCst)
    }

    /// Get current pool statistics
    pub fn stats(&self) -> PoolStats {
        let state = &self.state;
        PoolStats {
            capacity: state.config.size(),
            pooled: state.pooled.load(Ordering::SeqCst),
            idle: state.idle.lock().len(),
            checked_out: state.checked_out.load(Ordering::SeqCst),
            overflow_active: state.overflow_active.load(Ordering::SeqCst),
            overflow_total: state.overflow_total.load(Ordering::SeqCst),
            connections_opened: state.opened.load(Ordering::SeqCst),
            waiting: state.waiting.load(Ordering::SeqCst),
        }
    }

    /// Get the pool configuration
    pub fn config(&self) -> &PoolConfig {
        &self.state.config
    }
}

impl std::fmt::Debug for ConnectionPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionPool")
            .field("config", &self.state.config)
            .field("initialized", &self.is_initialized())
            .field("stats", &self.stats())
            .finish()
    }
}

/// A connection checked out of the pool
///
/// Holds the real connection plus a "returned" flag. Database calls go
/// straight to the connection through `Deref`. [`PooledConnection::release`]
/// hands it back exactly once; dropping the handle releases it too.
pub struct PooledConnection {
    connection: Arc<dyn Connection>,
    origin: ConnectionOrigin,
    generation: u64,
    returned: AtomicBool,
    pool: Arc<PoolState>,
}

impl PooledConnection {
    /// Return the connection to the pool.
    ///
    /// Idempotent and non-blocking. A pooled connection that is still open
    /// goes to the back of the queue; a closed one is dropped; an overflow
    /// connection is closed.
    pub fn release(&self) {
        if self.returned.swap(true, Ordering::SeqCst) {
            tracing::trace!("connection handle already released");
            return;
        }
        self.pool
            .give_back(Arc::clone(&self.connection), self.origin, self.generation);
    }

    /// Whether `release` has already run for this handle
    pub fn is_released(&self) -> bool {
        self.returned.load(Ordering::SeqCst)
    }

    /// Where this connection came from
    pub fn origin(&self) -> ConnectionOrigin {
        self.origin
    }

    /// Whether this is an overflow connection opened on exhaustion
    pub fn is_overflow(&self) -> bool {
        self.origin == ConnectionOrigin::Overflow
    }

    /// Get the underlying connection as an Arc
    pub fn inner(&self) -> &Arc<dyn Connection> {
        &self.connection
    }

    /// Retire a pooled connection that failed validation
    fn invalidate(self) {
        if self.returned.swap(true, Ordering::SeqCst) {
            return;
        }
        self.pool.checked_out.fetch_sub(1, Ordering::SeqCst);
        {
            let _idle = self.pool.idle.lock();
            if self.generation == self.pool.generation.load(Ordering::SeqCst) {
                self.pool.forget_pooled();
            }
        }
        close_detached(Arc::clone(&self.connection));
    }
}

impl Deref for PooledConnection {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.connection.as_ref()
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        self.release();
    }
}

impl std::fmt::Debug for PooledConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledConnection")
            .field("driver", &self.connection.driver_name())
            .field("origin", &self.origin)
            .field("released", &self.is_released())
            .finish()
    }
}
