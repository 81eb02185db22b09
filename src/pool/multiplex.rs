//! Multiplexed connection pool
//!
//! Each entry carries up to its capacity of concurrent leases. `acquire()`
//! never blocks: it returns a lease on an entry with spare capacity, a
//! [`Provisioning`] handle while a connection is being established, or
//! [`Acquire::Exhausted`] once the max entry count is reached and every
//! entry is full.
//!
//! Concurrency model:
//! - lease accounting is per entry, on the entry's atomic state word
//! - the slot vector sits behind an `RwLock`: acquisition scans under the
//!   read lock, only insertion and removal take the write lock
//! - provisioning is guarded by one atomic bounded counter, so concurrent
//!   callers can never reserve more than `max_connections` entries

use std::fmt;
use std::ops::Deref;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use super::capacity::resolve_capacity;
use super::connection_trait::{Connection, ConnectionFactory};
use super::entry::{EntryState, Phase, PoolEntry};
use super::status::{EntrySnapshot, PoolStatus};
use super::strategy::{Selector, Strategy};
use crate::config::PoolConfig;
use crate::error::{InvariantViolation, PoolError};
use crate::statistic::CounterStatistic;
use crate::types::{
    CreatedConnections, Destination, EntryId, InUseLeases, MaxConnections, MaxMultiplex, PoolId,
    TotalCapacity,
};

type Slots<C> = Vec<Option<Arc<PoolEntry<C>>>>;

/// Outcome of [`MultiplexConnectionPool::acquire`]
#[must_use]
pub enum Acquire<C: Connection> {
    /// A unit of capacity on an active entry
    Ready(Lease<C>),
    /// A connection is being established; wait on the handle or retry
    Provisioning(Provisioning<C>),
    /// Max entry count reached and no entry has spare capacity
    Exhausted,
    /// The pool has been closed
    Closed,
}

impl<C: Connection> Acquire<C> {
    #[must_use]
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready(_))
    }

    #[must_use]
    pub fn is_provisioning(&self) -> bool {
        matches!(self, Self::Provisioning(_))
    }

    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }

    /// The lease, if one was granted immediately
    pub fn ready(self) -> Option<Lease<C>> {
        match self {
            Self::Ready(lease) => Some(lease),
            _ => None,
        }
    }
}

impl<C: Connection> fmt::Debug for Acquire<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ready(lease) => f.debug_tuple("Ready").field(lease).finish(),
            Self::Provisioning(p) => f.debug_tuple("Provisioning").field(&p.entry_id()).finish(),
            Self::Exhausted => f.write_str("Exhausted"),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

struct PoolInner<C: Connection> {
    id: PoolId,
    destination: Destination,
    factory: Arc<dyn ConnectionFactory<C>>,
    slots: RwLock<Slots<C>>,
    /// Pending plus active entries; the provisioning guard
    reserved: AtomicUsize,
    max_connections: MaxConnections,
    initial_max_multiplex: AtomicUsize,
    selector: Selector,
    cache: bool,
    retain_idle: bool,
    closed: AtomicBool,
    entries: CounterStatistic,
    leases: CounterStatistic,
    provision_failures: AtomicU64,
    exhausted: AtomicU64,
}

impl<C: Connection> PoolInner<C> {
    fn read_slots(&self) -> RwLockReadGuard<'_, Slots<C>> {
        self.slots.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slots(&self) -> RwLockWriteGuard<'_, Slots<C>> {
        self.slots.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn initial_max_multiplex(&self) -> MaxMultiplex {
        MaxMultiplex::new(self.initial_max_multiplex.load(Ordering::Acquire))
            .unwrap_or(MaxMultiplex::SINGLE)
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn acquire(self: &Arc<Self>) -> Acquire<C> {
        if self.is_closed() {
            return Acquire::Closed;
        }

        if let Some(lease) = self.try_existing() {
            return Acquire::Ready(lease);
        }

        if let Some(entry) = self.try_attach_pending() {
            debug!(
                pool = %self.destination,
                entry = %entry.id(),
                "Waiting on pending connection"
            );
            return Acquire::Provisioning(Provisioning::new(self, entry));
        }

        if self.try_reserve() {
            return Acquire::Provisioning(self.provision());
        }

        self.exhausted.fetch_add(1, Ordering::Relaxed);
        debug!(
            pool = %self.destination,
            max_connections = %self.max_connections,
            "Pool exhausted"
        );
        Acquire::Exhausted
    }

    /// Circular scan from the strategy's start slot
    fn try_existing(self: &Arc<Self>) -> Option<Lease<C>> {
        let found = {
            let slots = self.read_slots();
            let len = slots.len();
            let start = self.selector.start(len);
            (0..len).find_map(|offset| {
                let entry = slots[(start + offset) % len].as_ref()?;
                let connection = Arc::clone(entry.connection()?);
                entry.try_acquire().ok()?;
                Some((Arc::clone(entry), connection))
            })
        };
        found.map(|(entry, connection)| Lease::new(Arc::clone(self), entry, connection))
    }

    fn try_attach_pending(&self) -> Option<Arc<PoolEntry<C>>> {
        self.read_slots()
            .iter()
            .flatten()
            .find(|entry| entry.try_promise())
            .cloned()
    }

    fn try_reserve(&self) -> bool {
        let max = self.max_connections.get();
        self.reserved
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| {
                (n < max).then_some(n + 1)
            })
            .is_ok()
    }

    fn insert(&self, entry: Arc<PoolEntry<C>>) {
        let mut slots = self.write_slots();
        let free = if self.cache {
            slots.iter().position(Option::is_none)
        } else {
            None
        };
        match free {
            Some(index) => slots[index] = Some(entry),
            None => slots.push(Some(entry)),
        }
    }

    fn provision(self: &Arc<Self>) -> Provisioning<C> {
        let entry = Arc::new(PoolEntry::pending(
            EntryId::next(),
            self.initial_max_multiplex(),
        ));
        // Not yet shared, so the creator's promise always fits
        entry.try_promise();
        self.insert(Arc::clone(&entry));
        self.entries.increment();
        debug!(pool = %self.destination, entry = %entry.id(), "Provisioning connection");

        let provisioning = Provisioning::new(self, Arc::clone(&entry));
        let pool = Arc::clone(self);
        tokio::spawn(async move { pool.establish(entry).await });
        provisioning
    }

    async fn establish(self: Arc<Self>, entry: Arc<PoolEntry<C>>) {
        match self.factory.connect(&self.destination).await {
            Ok(connection) => self.activate(&entry, Arc::new(connection)),
            Err(e) => {
                let reason = format!("{e:#}");
                self.provision_failures.fetch_add(1, Ordering::Relaxed);
                warn!(
                    pool = %self.destination,
                    entry = %entry.id(),
                    error = %reason,
                    "Failed to establish connection"
                );
                self.remove_entry(&entry);
                entry.publish(Phase::Failed(reason));
            }
        }
    }

    fn activate(self: &Arc<Self>, entry: &Arc<PoolEntry<C>>, connection: Arc<C>) {
        let resolved = resolve_capacity(connection.as_ref(), self.initial_max_multiplex());
        if self.is_closed() || !entry.activate(Arc::clone(&connection), resolved.capacity) {
            debug!(
                pool = %self.destination,
                entry = %entry.id(),
                "Entry removed before activation, discarding connection"
            );
            self.remove_entry(entry);
            entry.publish(Phase::Failed("entry removed before activation".to_string()));
            return;
        }

        info!(
            pool = %self.destination,
            entry = %entry.id(),
            connection = %connection.id(),
            capacity = %resolved.capacity,
            source = %resolved.source,
            "Connection activated"
        );
        self.watch_close(entry, &connection);
        entry.publish(Phase::Active);
    }

    /// Remove the entry when its connection closes
    ///
    /// The listener holds weak references only, so the connection never
    /// keeps its pool or entry alive.
    fn watch_close(self: &Arc<Self>, entry: &Arc<PoolEntry<C>>, connection: &Arc<C>) {
        let pool = Arc::downgrade(self);
        let watched = Arc::downgrade(entry);
        connection.on_close(Box::new(move |id| {
            if let Some(pool) = pool.upgrade()
                && let Some(entry) = watched.upgrade()
                && pool.remove_entry(&entry)
            {
                debug!(
                    pool = %pool.destination,
                    entry = %entry.id(),
                    connection = %id,
                    "Removed entry for closed connection"
                );
            }
        }));
    }

    /// Remove an entry and free its slot; only the first call has effect
    fn remove_entry(&self, entry: &Arc<PoolEntry<C>>) -> bool {
        if !entry.remove() {
            return false;
        }

        {
            let mut slots = self.write_slots();
            let position = slots
                .iter()
                .position(|slot| slot.as_ref().is_some_and(|e| Arc::ptr_eq(e, entry)));
            if let Some(index) = position {
                if self.cache {
                    slots[index] = None;
                } else {
                    slots.remove(index);
                }
            }
        }

        self.reserved.fetch_sub(1, Ordering::AcqRel);
        self.entries.decrement();
        debug!(
            pool = %self.destination,
            entry = %entry.id(),
            in_use = entry.in_use(),
            "Entry removed"
        );
        true
    }

    fn release_entry(&self, entry: &Arc<PoolEntry<C>>, lease: EntryId) -> Result<(), PoolError> {
        let remaining = entry.release(lease).map_err(|violation| {
            error!(pool = %self.destination, error = %violation, "Invariant violation on release");
            PoolError::from(violation)
        })?;
        self.leases.decrement();
        self.discard_if_idle(entry, remaining);
        Ok(())
    }

    fn discard_if_idle(&self, entry: &Arc<PoolEntry<C>>, remaining: usize) {
        if remaining == 0 && !self.retain_idle && entry.is_idle() {
            self.remove_entry(entry);
        }
    }

    fn exhausted_error(&self) -> PoolError {
        PoolError::Exhausted {
            destination: self.destination.to_string(),
            max_connections: self.max_connections.get(),
        }
    }

    fn closed_error(&self) -> PoolError {
        PoolError::Closed {
            destination: self.destination.to_string(),
        }
    }

    fn wrong_pool(&self, lease: &Lease<C>) -> Option<PoolError> {
        if std::ptr::eq(Arc::as_ptr(&lease.pool), self) {
            return None;
        }
        let violation = InvariantViolation::WrongPool {
            pool: self.id,
            lease_pool: lease.pool.id,
        };
        error!(pool = %self.destination, error = %violation, "Invariant violation on release");
        Some(violation.into())
    }
}

/// Pool of multiplexed connections to one destination
///
/// Cheap to clone; clones share the same entries.
///
/// `acquire()` spawns establishment onto the current tokio runtime when it
/// provisions, so it must be called from within a runtime.
pub struct MultiplexConnectionPool<C: Connection> {
    inner: Arc<PoolInner<C>>,
}

impl<C: Connection> Clone for MultiplexConnectionPool<C> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<C: Connection> MultiplexConnectionPool<C> {
    /// Pool with the `First` strategy, compacting slots and retaining idle
    /// entries
    pub fn new(
        destination: Destination,
        factory: impl ConnectionFactory<C> + 'static,
        max_connections: MaxConnections,
        initial_max_multiplex: MaxMultiplex,
    ) -> Self {
        Self::builder(destination, factory)
            .max_connections(max_connections)
            .initial_max_multiplex(initial_max_multiplex)
            .build()
    }

    pub fn builder(
        destination: Destination,
        factory: impl ConnectionFactory<C> + 'static,
    ) -> PoolBuilder<C> {
        PoolBuilder {
            destination,
            factory: Arc::new(factory),
            max_connections: MaxConnections::DEFAULT,
            initial_max_multiplex: MaxMultiplex::DEFAULT,
            strategy: Strategy::default(),
            cache: false,
            retain_idle: true,
        }
    }

    /// Pool configured from the `[pool]` section of a [`Config`](crate::config::Config)
    pub fn from_config(
        destination: Destination,
        factory: impl ConnectionFactory<C> + 'static,
        config: &PoolConfig,
    ) -> Self {
        Self::builder(destination, factory)
            .max_connections(config.max_connections)
            .initial_max_multiplex(config.max_multiplex)
            .strategy(config.strategy)
            .cache(config.cache)
            .retain_idle(config.retain_idle)
            .build()
    }

    #[must_use]
    pub fn id(&self) -> PoolId {
        self.inner.id
    }

    #[must_use]
    pub fn destination(&self) -> &Destination {
        &self.inner.destination
    }

    #[must_use]
    pub fn max_connections(&self) -> MaxConnections {
        self.inner.max_connections
    }

    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.inner.selector.strategy()
    }

    /// Default capacity for entries whose connection reports none
    #[must_use]
    pub fn initial_max_multiplex(&self) -> MaxMultiplex {
        self.inner.initial_max_multiplex()
    }

    /// Change the default capacity for entries activated from now on
    ///
    /// Active entries keep the capacity they were activated with.
    pub fn set_initial_max_multiplex(&self, multiplex: MaxMultiplex) {
        let previous = self
            .inner
            .initial_max_multiplex
            .swap(multiplex.get(), Ordering::AcqRel);
        debug!(
            pool = %self.inner.destination,
            previous,
            current = %multiplex,
            "Initial max multiplex changed"
        );
    }

    /// Try to obtain a unit of capacity without blocking
    pub fn acquire(&self) -> Acquire<C> {
        self.inner.acquire()
    }

    /// Acquire, waiting for provisioning when needed
    ///
    /// Exhaustion is returned as [`PoolError::Exhausted`]; there is no
    /// internal retry.
    pub async fn lease(&self) -> Result<Lease<C>, PoolError> {
        match self.acquire() {
            Acquire::Ready(lease) => Ok(lease),
            Acquire::Provisioning(provisioning) => provisioning.wait().await,
            Acquire::Exhausted => Err(self.inner.exhausted_error()),
            Acquire::Closed => Err(self.inner.closed_error()),
        }
    }

    /// Return a lease's unit of capacity
    ///
    /// A lease from another pool is an invariant violation; that lease is
    /// then dropped, which returns it to the pool that issued it.
    pub fn release(&self, mut lease: Lease<C>) -> Result<(), PoolError> {
        if let Some(err) = self.inner.wrong_pool(&lease) {
            return Err(err);
        }
        lease.released = true;
        self.inner.release_entry(&lease.entry, lease.entry_id)
    }

    /// Release a lease and discard its entry
    ///
    /// For connections that failed in use. Returns whether this call
    /// removed the entry.
    pub fn remove(&self, mut lease: Lease<C>) -> Result<bool, PoolError> {
        if let Some(err) = self.inner.wrong_pool(&lease) {
            return Err(err);
        }
        lease.released = true;
        let removed = self.inner.remove_entry(&lease.entry);
        self.inner.release_entry(&lease.entry, lease.entry_id)?;
        Ok(removed)
    }

    /// Stop handing out capacity and remove every entry
    ///
    /// Outstanding leases stay usable and release normally.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        let entries: Vec<_> = self.inner.read_slots().iter().flatten().cloned().collect();
        let removed = entries
            .iter()
            .filter(|entry| self.inner.remove_entry(entry))
            .count();
        info!(pool = %self.inner.destination, removed, "Pool closed");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }

    /// Live entry counter: current, total created and peak
    #[must_use]
    pub fn entry_counter(&self) -> &CounterStatistic {
        &self.inner.entries
    }

    /// Lease counter: current, total issued and peak
    #[must_use]
    pub fn lease_counter(&self) -> &CounterStatistic {
        &self.inner.leases
    }

    /// Slot layout, including placeholders left by a caching pool
    #[must_use]
    pub fn slots(&self) -> Vec<Option<EntrySnapshot>> {
        self.inner
            .read_slots()
            .iter()
            .map(|slot| {
                slot.as_ref().map(|entry| EntrySnapshot {
                    id: entry.id(),
                    state: entry.state(),
                    in_use: entry.in_use(),
                    capacity: entry.capacity().map(|c| c.get()),
                })
            })
            .collect()
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let inner = &self.inner;
        let (mut pending, mut active, mut idle, mut in_use, mut capacity) = (0, 0, 0, 0, 0);
        for entry in inner.read_slots().iter().flatten() {
            match entry.state() {
                EntryState::Pending => pending += 1,
                EntryState::Active => {
                    active += 1;
                    let used = entry.in_use();
                    if used == 0 {
                        idle += 1;
                    }
                    in_use += used;
                    capacity += entry.capacity().map_or(0, |c| c.get());
                }
                EntryState::Removed => {}
            }
        }

        let created = inner.entries.total();
        let live = inner.entries.current().max(0) as u64;
        PoolStatus {
            destination: inner.destination.to_string(),
            max_connections: inner.max_connections,
            live: pending + active,
            pending,
            active,
            idle,
            in_use: InUseLeases::new(in_use),
            capacity: TotalCapacity::new(capacity),
            created: CreatedConnections::new(created as usize),
            removed: created.saturating_sub(live),
            peak_live: inner.entries.max().max(0) as usize,
            peak_in_use: inner.leases.max().max(0) as usize,
            leases_total: inner.leases.total(),
            provision_failures: inner.provision_failures.load(Ordering::Relaxed),
            exhausted: inner.exhausted.load(Ordering::Relaxed),
        }
    }
}

impl<C: Connection> fmt::Debug for MultiplexConnectionPool<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MultiplexConnectionPool")
            .field("id", &self.inner.id)
            .field("destination", &self.inner.destination)
            .field("max_connections", &self.inner.max_connections)
            .field("strategy", &self.inner.selector.strategy())
            .field("entries", &self.inner.entries.current())
            .finish_non_exhaustive()
    }
}

/// Builder for [`MultiplexConnectionPool`]
pub struct PoolBuilder<C: Connection> {
    destination: Destination,
    factory: Arc<dyn ConnectionFactory<C>>,
    max_connections: MaxConnections,
    initial_max_multiplex: MaxMultiplex,
    strategy: Strategy,
    cache: bool,
    retain_idle: bool,
}

impl<C: Connection> PoolBuilder<C> {
    #[must_use]
    pub fn max_connections(mut self, max_connections: MaxConnections) -> Self {
        self.max_connections = max_connections;
        self
    }

    #[must_use]
    pub fn initial_max_multiplex(mut self, multiplex: MaxMultiplex) -> Self {
        self.initial_max_multiplex = multiplex;
        self
    }

    #[must_use]
    pub fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Keep removed slots as placeholders instead of compacting
    #[must_use]
    pub fn cache(mut self, cache: bool) -> Self {
        self.cache = cache;
        self
    }

    /// Keep entries whose in-use count drops to zero
    #[must_use]
    pub fn retain_idle(mut self, retain_idle: bool) -> Self {
        self.retain_idle = retain_idle;
        self
    }

    pub fn build(self) -> MultiplexConnectionPool<C> {
        let inner = PoolInner {
            id: PoolId::next(),
            destination: self.destination,
            factory: self.factory,
            slots: RwLock::new(Vec::with_capacity(self.max_connections.get().min(64))),
            reserved: AtomicUsize::new(0),
            max_connections: self.max_connections,
            initial_max_multiplex: AtomicUsize::new(self.initial_max_multiplex.get()),
            selector: Selector::new(self.strategy),
            cache: self.cache,
            retain_idle: self.retain_idle,
            closed: AtomicBool::new(false),
            entries: CounterStatistic::new(),
            leases: CounterStatistic::new(),
            provision_failures: AtomicU64::new(0),
            exhausted: AtomicU64::new(0),
        };
        info!(
            pool = %inner.destination,
            id = %inner.id,
            max_connections = %inner.max_connections,
            initial_max_multiplex = %self.initial_max_multiplex,
            strategy = %self.strategy,
            cache = inner.cache,
            retain_idle = inner.retain_idle,
            "Created multiplex connection pool"
        );
        MultiplexConnectionPool {
            inner: Arc::new(inner),
        }
    }
}

/// Proof of holding one unit of an entry's capacity
///
/// Return it with [`MultiplexConnectionPool::release`]. A lease dropped
/// without release returns its capacity on drop.
pub struct Lease<C: Connection> {
    pool: Arc<PoolInner<C>>,
    entry: Arc<PoolEntry<C>>,
    entry_id: EntryId,
    connection: Arc<C>,
    released: bool,
}

impl<C: Connection> Lease<C> {
    fn new(pool: Arc<PoolInner<C>>, entry: Arc<PoolEntry<C>>, connection: Arc<C>) -> Self {
        pool.leases.increment();
        let entry_id = entry.id();
        Self {
            pool,
            entry,
            entry_id,
            connection,
            released: false,
        }
    }

    #[must_use]
    pub fn connection(&self) -> &Arc<C> {
        &self.connection
    }

    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        self.entry_id
    }

    #[must_use]
    pub fn pool_id(&self) -> PoolId {
        self.pool.id
    }
}

impl<C: Connection> Deref for Lease<C> {
    type Target = C;

    fn deref(&self) -> &C {
        &self.connection
    }
}

impl<C: Connection> Drop for Lease<C> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        debug!(
            pool = %self.pool.destination,
            entry = %self.entry_id,
            "Lease dropped without release, returning capacity"
        );
        if let Err(e) = self.pool.release_entry(&self.entry, self.entry_id) {
            debug!(
                pool = %self.pool.destination,
                entry = %self.entry_id,
                error = %e,
                "Dropped lease could not be returned"
            );
        }
    }
}

impl<C: Connection> fmt::Debug for Lease<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Lease")
            .field("pool", &self.pool.id)
            .field("entry", &self.entry_id)
            .field("connection", &self.connection.id())
            .finish()
    }
}

/// Handle on a connection being established
///
/// Holds a promise of one unit of the pending entry's capacity. Once the
/// connection is up that unit stays reserved until [`wait`](Self::wait)
/// claims it. Dropping the handle gives the promise back; establishment
/// continues and the entry joins the pool either way.
pub struct Provisioning<C: Connection> {
    pool: Arc<PoolInner<C>>,
    entry: Arc<PoolEntry<C>>,
    phase: watch::Receiver<Phase>,
    settled: bool,
}

impl<C: Connection> Provisioning<C> {
    /// `entry` must already carry a promise for this handle
    fn new(pool: &Arc<PoolInner<C>>, entry: Arc<PoolEntry<C>>) -> Self {
        let phase = entry.subscribe();
        Self {
            pool: Arc::clone(pool),
            entry,
            phase,
            settled: false,
        }
    }

    #[must_use]
    pub fn entry_id(&self) -> EntryId {
        self.entry.id()
    }

    /// Wait for establishment and take a unit of the new entry's capacity
    ///
    /// Fails with [`PoolError::ProvisioningFailed`] if the factory failed,
    /// [`PoolError::Closed`] if the pool closed meanwhile, or
    /// [`PoolError::Exhausted`] if the connection came up with less
    /// capacity than callers attached to it.
    pub async fn wait(mut self) -> Result<Lease<C>, PoolError> {
        let phase = match self.phase.wait_for(|phase| *phase != Phase::Pending).await {
            Ok(phase) => phase.clone(),
            Err(_) => Phase::Failed("provisioning abandoned".to_string()),
        };

        if self.pool.is_closed() {
            return Err(self.pool.closed_error());
        }

        match phase {
            Phase::Active => {
                self.settled = true;
                if let Some(connection) = self.entry.claim() {
                    return Ok(Lease::new(
                        Arc::clone(&self.pool),
                        Arc::clone(&self.entry),
                        connection,
                    ));
                }
                self.pool.exhausted.fetch_add(1, Ordering::Relaxed);
                Err(self.pool.exhausted_error())
            }
            Phase::Failed(reason) => Err(PoolError::ProvisioningFailed {
                destination: self.pool.destination.to_string(),
                reason,
            }),
            Phase::Pending => Err(PoolError::ProvisioningFailed {
                destination: self.pool.destination.to_string(),
                reason: "provisioning abandoned".to_string(),
            }),
        }
    }
}

impl<C: Connection> Drop for Provisioning<C> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Some(remaining) = self.entry.forfeit() {
            debug!(
                pool = %self.pool.destination,
                entry = %self.entry.id(),
                "Returned capacity held for an abandoned waiter"
            );
            self.pool.discard_if_idle(&self.entry, remaining);
        }
    }
}

impl<C: Connection> fmt::Debug for Provisioning<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provisioning")
            .field("pool", &self.pool.id)
            .field("entry", &self.entry.id())
            .finish()
    }
}
