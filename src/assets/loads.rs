//! Load registry (singleflight)
//!
//! At most one fetch per asset name is in flight. Every request for an asset
//! that is already loading joins the existing ticket instead of starting a
//! new fetch. A ticket is removed as soon as its fetch settles, on success or
//! failure, so the next request after a failure starts from scratch.
//!
//! # Design Principles
//!
//! - **One Fetch**: the fetch future is created only by the request that inserts the ticket
//! - **Clean Slate**: the ticket is gone before any joiner's continuation runs
//! - **No Stuck Tickets**: aborted fetches take the same failure path as failed ones

use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Instant;

use futures::executor::LocalSpawner;
use futures::future::{AbortHandle, Abortable, LocalBoxFuture};
use futures::task::LocalSpawnExt;
use rustc_hash::FxHashMap;

use crate::assets::signal::Signal;
use crate::assets::source::FetchResult;
use crate::assets::{AssetName, Container};
use crate::core::LoadStats;
use crate::error::FetchError;

/// What every joiner of a ticket receives once the fetch settles
pub type LoadResult = Result<Rc<Container>, FetchError>;

/// How a request got its ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Joined {
    /// This request started the fetch
    Started,
    /// A fetch was already in flight
    InFlight,
}

/// One in-flight fetch
struct LoadTicket {
    signal: Signal<LoadResult>,
    abort: AbortHandle,
    started: Instant,
}

type Tickets = RefCell<FxHashMap<AssetName, LoadTicket>>;

/// Asset name to in-flight fetch, shared by every request of the stage
#[derive(Clone)]
pub struct LoadRegistry {
    tickets: Rc<Tickets>,
    spawner: LocalSpawner,
    stats: Rc<RefCell<LoadStats>>,
}

impl LoadRegistry {
    /// Create a registry whose fetches run on `spawner`
    pub fn new(spawner: LocalSpawner, stats: Rc<RefCell<LoadStats>>) -> Self {
        Self {
            tickets: Rc::new(RefCell::new(FxHashMap::default())),
            spawner,
            stats,
        }
    }

    /// Join the fetch in flight for `asset`, or start one with `start`.
    ///
    /// `start` is only called when no ticket exists. The returned signal
    /// settles once, after the ticket has been removed.
    pub fn join_or_start(
        &self,
        asset: &AssetName,
        start: impl FnOnce() -> LocalBoxFuture<'static, FetchResult>,
    ) -> (Signal<LoadResult>, Joined) {
        if let Some(ticket) = self.tickets.borrow().get(asset) {
            self.stats.borrow_mut().record_join();
            return (ticket.signal.clone(), Joined::InFlight);
        }

        let signal = Signal::new();
        let (abort, registration) = AbortHandle::new_pair();
        let fetch = Abortable::new(start(), registration);

        self.tickets.borrow_mut().insert(
            asset.clone(),
            LoadTicket {
                signal: signal.clone(),
                abort,
                started: Instant::now(),
            },
        );
        self.stats.borrow_mut().record_fetch_started();
        log::debug!("Fetching {asset}");

        let tickets = Rc::downgrade(&self.tickets);
        let stats = Rc::clone(&self.stats);
        let driver_signal = signal.clone();
        let name = asset.clone();
        let driver = async move {
            let result = fetch
                .await
                .unwrap_or_else(|_| Err(FetchError::Aborted(name.clone())));
            settle(&tickets, &stats, &name, &driver_signal, result);
        };

        if let Err(e) = self.spawner.spawn_local(driver) {
            log::error!("Could not schedule fetch of {asset}: {e}");
            settle(
                &Rc::downgrade(&self.tickets),
                &self.stats,
                asset,
                &signal,
                Err(FetchError::Aborted(asset.clone())),
            );
        }

        (signal, Joined::Started)
    }

    /// Check if a fetch for `asset` is in flight
    #[must_use]
    pub fn contains(&self, asset: &AssetName) -> bool {
        self.tickets.borrow().contains_key(asset)
    }

    /// Check if an in-flight asset name is literally `name`
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.contains(&AssetName::from(name))
    }

    /// Number of fetches in flight
    #[must_use]
    pub fn len(&self) -> usize {
        self.tickets.borrow().len()
    }

    /// Check if nothing is in flight
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tickets.borrow().is_empty()
    }

    /// Names of the assets being fetched
    #[must_use]
    pub fn in_flight(&self) -> Vec<AssetName> {
        let mut names: Vec<AssetName> = self.tickets.borrow().keys().cloned().collect();
        names.sort();
        names
    }

    /// Abort the fetch for `asset`. The ticket is cleared the next time the
    /// executor runs. Returns false if nothing was in flight.
    pub fn abort(&self, asset: &AssetName) -> bool {
        match self.tickets.borrow().get(asset) {
            Some(ticket) => {
                ticket.abort.abort();
                true
            }
            None => false,
        }
    }

    /// Abort every fetch in flight
    pub fn abort_all(&self) {
        for ticket in self.tickets.borrow().values() {
            ticket.abort.abort();
        }
    }
}

/// Remove the ticket, record the outcome, then wake every joiner.
fn settle(
    tickets: &Weak<Tickets>,
    stats: &RefCell<LoadStats>,
    asset: &AssetName,
    signal: &Signal<LoadResult>,
    result: FetchResult,
) {
    let ticket = tickets.upgrade().and_then(|tickets| {
        let mut tickets = tickets.borrow_mut();
        let owned = tickets
            .get(asset)
            .is_some_and(|ticket| ticket.signal.ptr_eq(signal));
        if owned { tickets.remove(asset) } else { None }
    });
    let elapsed = ticket.map(|t| t.started.elapsed()).unwrap_or_default();
    stats
        .borrow_mut()
        .record_fetch_settled(elapsed, result.is_ok());

    match &result {
        Ok(container) => log::info!(
            "Loaded {asset} ({} nodes) in {:.2}ms",
            container.nodes().len(),
            elapsed.as_secs_f32() * 1000.0
        ),
        Err(e) => log::warn!("{e}; next request for {asset} will fetch again"),
    }

    if signal.settle(result.map(Rc::new)).is_err() {
        log::error!("Load ticket for {asset} settled twice");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::source::{AssetSource, ManualSource};
    use futures::executor::LocalPool;

    fn registry(pool: &LocalPool) -> LoadRegistry {
        LoadRegistry::new(pool.spawner(), Rc::new(RefCell::new(LoadStats::default())))
    }

    #[test]
    fn test_single_fetch_for_concurrent_joins() {
        let mut pool = LocalPool::new();
        let registry = registry(&pool);
        let source = ManualSource::default();
        let tree = AssetName::from("tree.glb");

        let (first, joined_first) = registry.join_or_start(&tree, || source.fetch(&tree));
        let (second, joined_second) = registry.join_or_start(&tree, || source.fetch(&tree));

        assert_eq!(joined_first, Joined::Started);
        assert_eq!(joined_second, Joined::InFlight);
        assert!(first.ptr_eq(&second));
        assert_eq!(source.fetch_count("tree.glb"), 1);

        pool.run_until_stalled();
        assert!(!first.is_settled());

        source.complete("tree.glb", Ok(Container::single("tree.glb", "trunk")));
        pool.run_until_stalled();

        assert!(matches!(first.value(), Some(Ok(_))));
        assert!(!registry.contains(&tree));
        assert_eq!(registry.stats.borrow().fetches_started(), 1);
        assert_eq!(registry.stats.borrow().joins(), 1);
    }

    #[test]
    fn test_ticket_cleared_before_joiners_run() {
        let mut pool = LocalPool::new();
        let registry = registry(&pool);
        let source = ManualSource::default();
        let tree = AssetName::from("tree.glb");

        let (signal, _) = registry.join_or_start(&tree, || source.fetch(&tree));
        let seen_ticket = Rc::new(RefCell::new(None));
        {
            let registry = registry.clone();
            let seen_ticket = Rc::clone(&seen_ticket);
            let tree = tree.clone();
            signal.on_settle(move |_| *seen_ticket.borrow_mut() = Some(registry.contains(&tree)));
        }

        source.complete("tree.glb", Ok(Container::single("tree.glb", "trunk")));
        pool.run_until_stalled();
        assert_eq!(*seen_ticket.borrow(), Some(false));
    }

    #[test]
    fn test_failure_allows_retry() {
        let mut pool = LocalPool::new();
        let registry = registry(&pool);
        let source = ManualSource::default();
        let rock = AssetName::from("rock.glb");

        let (signal, _) = registry.join_or_start(&rock, || source.fetch(&rock));
        source.complete("rock.glb", Err(FetchError::NotFound(rock.clone())));
        pool.run_until_stalled();

        assert_eq!(signal.value(), Some(Err(FetchError::NotFound(rock.clone()))));
        assert!(registry.is_empty());

        let (retry, joined) = registry.join_or_start(&rock, || source.fetch(&rock));
        assert_eq!(joined, Joined::Started);
        assert!(!retry.ptr_eq(&signal));
        assert_eq!(source.fetch_count("rock.glb"), 2);
        assert_eq!(registry.stats.borrow().failures(), 1);
    }

    #[test]
    fn test_abort_reaches_failure_path() {
        let mut pool = LocalPool::new();
        let registry = registry(&pool);
        let source = ManualSource::default();
        let tree = AssetName::from("tree.glb");

        let (signal, _) = registry.join_or_start(&tree, || source.fetch(&tree));
        pool.run_until_stalled();

        assert!(registry.abort(&tree));
        pool.run_until_stalled();

        assert_eq!(signal.value(), Some(Err(FetchError::Aborted(tree.clone()))));
        assert!(!registry.contains(&tree));
        assert!(!registry.abort(&tree));
    }

    #[test]
    fn test_literal_name_lookup() {
        let pool = LocalPool::new();
        let registry = registry(&pool);
        let source = ManualSource::default();
        let tree = AssetName::from("tree.glb");

        let _ = registry.join_or_start(&tree, || source.fetch(&tree));
        assert!(registry.contains_name("tree.glb"));
        assert_eq!(registry.in_flight(), vec![tree]);
    }
}
