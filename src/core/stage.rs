//! Asset stage: the coordinator for creating instances of external assets
//!
//! Call sites ask for an instance by asset name and id and get a `Handle`
//! back immediately. Behind it:
//!
//! - a template hit clones the cached prototype in the same call
//! - otherwise the request joins the fetch in flight for the asset, or starts one
//! - in every case the handle gets a readiness entry that fires one frame after
//!   the instance is placed
//!
//! Everything runs on one thread. Fetches are futures polled from `tick()`,
//! the host's per-frame hook. Name resolution and name insertion happen in
//! the same synchronous call, so two requests can never claim the same name.
//!
//! # Example
//!
//! ```ignore
//! let stage = AssetStage::new(StageConfig::default(), GltfSource::new("assets"));
//!
//! let handle = stage.create_instance(InstanceRequest::new("tree.glb", "t1"))?;
//! stage.when_ready(handle, |ready| log::info!("tree ready: {ready:?}"));
//!
//! // every frame
//! stage.tick();
//! ```

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use futures::executor::LocalPool;
use glam::{Quat, Vec3, Vec4};
use hecs::Entity;
use rustc_hash::FxHashMap;

use crate::assets::{
    AssetName, AssetSource, Handle, IdentityResolver, Joined, Listen, LoadRegistry, LoadResult,
    Placement, Pose, Ready, ReadinessRegistry, Signal, Style, TemplateCache, materialize,
};
use crate::core::{FrameQueue, LoadStats, ReadySignal, StageConfig};
use crate::ecs::{Prototype, Scene};
use crate::error::{FetchError, RequestError};

/// One call site's request for an instance
#[derive(Debug, Clone, PartialEq)]
pub struct InstanceRequest {
    /// Asset to instantiate
    pub asset: AssetName,
    /// Requested id, optionally `name#group`
    pub id: String,
    /// Pose of the instance root
    pub pose: Pose,
    /// Look applied to the instance's mesh parts
    pub style: Style,
}

impl InstanceRequest {
    /// Create a request for `asset` under `id`
    pub fn new(asset: impl Into<AssetName>, id: impl Into<String>) -> Self {
        Self {
            asset: asset.into(),
            id: id.into(),
            pose: Pose::default(),
            style: Style::default(),
        }
    }

    /// Set the position
    pub fn with_position(mut self, position: Vec3) -> Self {
        self.pose.position = Some(position);
        self
    }

    /// Set the rotation
    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.pose.rotation = Some(rotation);
        self
    }

    /// Set the scale
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.pose.scale = Some(scale);
        self
    }

    /// Set the color applied to mesh parts
    pub fn with_color(mut self, color: Vec4) -> Self {
        self.style.color = Some(color);
        self
    }

    fn validate(&self, resolver: &IdentityResolver) -> Result<(), RequestError> {
        if self.asset.is_blank() {
            return Err(RequestError::MissingAsset {
                id: self.id.clone(),
            });
        }
        let (name, _) = resolver.split(&self.id);
        if name.trim().is_empty() {
            return Err(RequestError::MissingId {
                asset: self.asset.clone(),
            });
        }
        if !self.pose.is_finite() {
            return Err(RequestError::InvalidTransform {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Where a requested name stands before it becomes a live instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    /// Waiting for the asset's fetch
    Loading(AssetName),
    /// Disposed while loading; nothing will be placed
    Cancelled(AssetName),
    /// The fetch failed; waiters on the handle stay pending
    Failed(FetchError),
}

struct StageInner {
    resolver: IdentityResolver,
    source: Rc<dyn AssetSource>,
    scene: RefCell<Scene>,
    templates: RefCell<TemplateCache>,
    loads: LoadRegistry,
    readiness: RefCell<ReadinessRegistry>,
    frames: RefCell<FrameQueue<ReadySignal>>,
    requests: RefCell<FxHashMap<String, RequestState>>,
    pool: RefCell<LocalPool>,
    stats: Rc<RefCell<LoadStats>>,
    frame: Cell<u64>,
}

/// Coordinator owning the scene, the template cache, and the load and
/// readiness registries.
///
/// Cloning is cheap and every clone refers to the same stage; hand clones to
/// the subsystems that need to create or wait on instances.
#[derive(Clone)]
pub struct AssetStage {
    inner: Rc<StageInner>,
}

impl AssetStage {
    /// Create a stage with an empty scene fetching from `source`
    pub fn new(config: StageConfig, source: impl AssetSource + 'static) -> Self {
        Self::with_source(config, Rc::new(source))
    }

    /// Create a stage with a source shared with the caller
    pub fn with_source(config: StageConfig, source: Rc<dyn AssetSource>) -> Self {
        let pool = LocalPool::new();
        let stats = Rc::new(RefCell::new(LoadStats::new(config.max_fetch_samples)));
        let loads = LoadRegistry::new(pool.spawner(), Rc::clone(&stats));

        Self {
            inner: Rc::new(StageInner {
                resolver: config.resolver(),
                source,
                scene: RefCell::new(Scene::new()),
                templates: RefCell::new(TemplateCache::new()),
                loads,
                readiness: RefCell::new(ReadinessRegistry::new()),
                frames: RefCell::new(FrameQueue::new()),
                requests: RefCell::new(FxHashMap::default()),
                pool: RefCell::new(pool),
                stats,
                frame: Cell::new(0),
            }),
        }
    }

    // ------------------------------------------------------------------------
    // Creating instances
    // ------------------------------------------------------------------------

    /// Request an instance and return its handle right away.
    ///
    /// With a cached template the instance is in the scene when this returns.
    /// Otherwise it is placed when the asset's fetch settles. Either way the
    /// handle becomes ready one frame after placement.
    ///
    /// # Errors
    ///
    /// Returns a `RequestError` for malformed requests and for naming logic
    /// errors. Fetch failures are never reported here; see `request_state`.
    pub fn create_instance(&self, request: InstanceRequest) -> Result<Handle, RequestError> {
        let resolved = request
            .validate(&self.inner.resolver)
            .and_then(|()| {
                self.inner
                    .resolver
                    .resolve(&request.id, |name| self.name_taken(name))
            })
            .inspect_err(|e| {
                if e.is_validation() {
                    log::warn!("Rejected instance request: {e}");
                } else {
                    log::error!("{e}");
                }
            })?;

        let placement = Placement {
            name: resolved.display_name,
            group: resolved.group,
            asset: request.asset,
            pose: request.pose,
            style: request.style,
        };
        let handle = Handle::named(placement.name.as_str());

        if self.instantiate_from_template(&placement) {
            self.inner.stats.borrow_mut().record_cache_hit();
            return Ok(handle);
        }

        // Claim the name before anything can yield
        self.inner.requests.borrow_mut().insert(
            placement.name.clone(),
            RequestState::Loading(placement.asset.clone()),
        );

        let source = Rc::clone(&self.inner.source);
        let asset = placement.asset.clone();
        let (ticket, joined) = self
            .inner
            .loads
            .join_or_start(&asset, || source.fetch(&asset));
        if joined == Joined::InFlight {
            log::debug!("{} joined the fetch of {asset}", placement.name);
        }

        let stage = Rc::downgrade(&self.inner);
        ticket.on_settle(move |result| {
            if let Some(inner) = Weak::upgrade(&stage) {
                AssetStage { inner }.finish_load(placement, result);
            }
        });

        Ok(handle)
    }

    /// Request several instances. A bad request does not stop the rest.
    pub fn create_batch(
        &self,
        requests: impl IntoIterator<Item = InstanceRequest>,
    ) -> Vec<Result<Handle, RequestError>> {
        requests
            .into_iter()
            .map(|request| self.create_instance(request))
            .collect()
    }

    /// Symbolic handle names are never given to instances
    fn name_taken(&self, name: &str) -> bool {
        Handle::from(name).is_symbolic()
            || self.inner.scene.borrow().contains_name(name)
            || self.inner.requests.borrow().get(name).is_some_and(|state| {
                matches!(state, RequestState::Loading(_) | RequestState::Cancelled(_))
            })
            || self.inner.loads.contains_name(name)
    }

    fn instantiate_from_template(&self, placement: &Placement) -> bool {
        let Some(template) = self.inner.templates.borrow().get(&placement.asset) else {
            return false;
        };

        let mut scene = self.inner.scene.borrow_mut();
        let root = match scene.clone_subtree(template) {
            Ok(root) => root,
            Err(e) => {
                log::error!("Template for {} is gone: {e}", placement.asset);
                return false;
            }
        };
        materialize(
            &mut scene,
            &mut self.inner.frames.borrow_mut(),
            root,
            placement,
        );
        self.inner.requests.borrow_mut().remove(&placement.name);
        self.inner.stats.borrow_mut().record_materialized();
        true
    }

    fn finish_load(&self, placement: Placement, result: LoadResult) {
        let state = self.inner.requests.borrow_mut().remove(&placement.name);
        let cancelled = matches!(state, Some(RequestState::Cancelled(_)));

        let container = match result {
            Ok(container) => container,
            Err(e) => {
                log::warn!(
                    "{} will not be placed ({e}); its waiters stay pending",
                    placement.name
                );
                if !cancelled {
                    self.inner
                        .requests
                        .borrow_mut()
                        .insert(placement.name, RequestState::Failed(e));
                }
                return;
            }
        };

        let cached = self.inner.templates.borrow().contains(&placement.asset);
        if cancelled && cached {
            log::debug!("{} was disposed while loading", placement.name);
            return;
        }
        if cached && self.instantiate_from_template(&placement) {
            return;
        }

        // First joiner: the loaded node becomes the instance, a clone of it the template
        let mut scene = self.inner.scene.borrow_mut();
        let loaded = scene.spawn_container(&container);
        match scene.clone_subtree(loaded) {
            Ok(template) => {
                scene.set_enabled(template, false);
                scene.set_pickable(template, false);
                let _ = scene.insert(template, (Prototype(placement.asset.clone()),));
                if let Err(e) = self
                    .inner
                    .templates
                    .borrow_mut()
                    .insert(placement.asset.clone(), template)
                {
                    log::error!("{e}");
                    scene.despawn_subtree(template);
                }
            }
            Err(e) => log::error!("Could not create template for {}: {e}", placement.asset),
        }

        if cancelled {
            log::debug!("{} was disposed while loading", placement.name);
            scene.despawn_subtree(loaded);
            return;
        }

        materialize(
            &mut scene,
            &mut self.inner.frames.borrow_mut(),
            loaded,
            &placement,
        );
        self.inner.stats.borrow_mut().record_materialized();
    }

    // ------------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------------

    /// Advance one frame.
    ///
    /// Fires the ready signals scheduled during the previous frame, then
    /// polls in-flight fetches until none can make progress. Instances
    /// placed by those fetches become ready on the next tick. Returns the
    /// number of handles signalled ready.
    ///
    /// Must not be called from inside a readiness callback.
    pub fn tick(&self) -> usize {
        self.inner.frame.set(self.inner.frame.get() + 1);

        let due: Vec<ReadySignal> = {
            let mut frames = self.inner.frames.borrow_mut();
            frames.swap();
            frames.drain().collect()
        };

        let fired = due
            .into_iter()
            .filter(|signal| self.signal_ready(signal))
            .count();

        self.inner.pool.borrow_mut().run_until_stalled();
        fired
    }

    /// Number of ticks so far
    pub fn frame(&self) -> u64 {
        self.inner.frame.get()
    }

    fn signal_ready(&self, signal: &ReadySignal) -> bool {
        {
            let mut scene = self.inner.scene.borrow_mut();
            let current = signal.handle.name().and_then(|name| scene.lookup(name));
            if current != Some(signal.entity) {
                log::debug!("{} was disposed before it became ready", signal.handle);
                return false;
            }
            scene.mark_live(signal.entity);
        }

        let entry = self.inner.readiness.borrow_mut().entry(&signal.handle);
        if entry.settle(Ready::Node(signal.entity)).is_err() {
            log::warn!("{} was already resolved", signal.handle);
        }
        true
    }

    // ------------------------------------------------------------------------
    // Readiness
    // ------------------------------------------------------------------------

    /// Run `continuation` once `handle` is ready, or now if it already is.
    ///
    /// Continuations on the same handle run in registration order.
    pub fn when_ready(&self, handle: impl Into<Handle>, continuation: impl FnOnce(Ready) + 'static) {
        self.readiness_signal(&handle.into()).on_settle(continuation);
    }

    /// Future form of [`when_ready`](Self::when_ready).
    ///
    /// Resolves to `Err(Dropped)` only if the stage shuts down first.
    pub fn wait_ready(&self, handle: impl Into<Handle>) -> Listen<Ready> {
        self.readiness_signal(&handle.into()).listen()
    }

    /// Check if `handle` resolves right now
    pub fn is_ready(&self, handle: impl Into<Handle>) -> bool {
        self.resolve_now(&handle.into()).is_some()
    }

    fn readiness_signal(&self, handle: &Handle) -> Signal<Ready> {
        match self.resolve_now(handle) {
            Some(ready) => Signal::settled(ready),
            None => self.inner.readiness.borrow_mut().entry(handle),
        }
    }

    /// Direct check against the scene, before any registry lookup
    fn resolve_now(&self, handle: &Handle) -> Option<Ready> {
        let scene = self.inner.scene.borrow();
        match handle {
            Handle::Everywhere => Some(Ready::Everywhere),
            Handle::ActiveCamera => scene.active_camera().map(Ready::Node),
            Handle::MainLight => scene.main_light().map(Ready::Node),
            Handle::Named(name) => scene
                .lookup(name)
                .filter(|entity| scene.is_live(*entity))
                .map(Ready::Node),
        }
    }

    /// Make `camera` the active camera and wake everything waiting on it
    pub fn set_active_camera(&self, camera: Entity) {
        self.inner
            .scene
            .borrow_mut()
            .set_active_camera(Some(camera));
        self.rebind(&Handle::ActiveCamera, camera);
    }

    /// Make `light` the main light and wake everything waiting on it
    pub fn set_main_light(&self, light: Entity) {
        self.inner.scene.borrow_mut().set_main_light(Some(light));
        self.rebind(&Handle::MainLight, light);
    }

    fn rebind(&self, handle: &Handle, entity: Entity) {
        let entry = self.inner.readiness.borrow_mut().rebind(handle);
        let _ = entry.settle(Ready::Node(entity));
    }

    // ------------------------------------------------------------------------
    // Disposal and groups
    // ------------------------------------------------------------------------

    /// Remove an instance from the scene, or cancel it if it is still loading.
    ///
    /// The asset's template and any fetch in flight are left alone.
    /// Returns false if nothing was known under the handle.
    pub fn dispose(&self, handle: impl Into<Handle>) -> bool {
        let handle = handle.into();
        let Some(name) = handle.name() else {
            return false;
        };

        let live = self.inner.scene.borrow().lookup(name);
        if let Some(root) = live {
            self.inner.scene.borrow_mut().despawn_subtree(root);
            self.inner.readiness.borrow_mut().forget_settled(&handle);
            log::debug!("Disposed {name}");
            return true;
        }

        let mut requests = self.inner.requests.borrow_mut();
        match requests.get(name).cloned() {
            Some(RequestState::Loading(asset)) => {
                requests.insert(name.to_string(), RequestState::Cancelled(asset));
                true
            }
            Some(RequestState::Failed(_)) => {
                requests.remove(name);
                true
            }
            Some(RequestState::Cancelled(_)) | None => false,
        }
    }

    /// Handles of the live instances tagged with `group`, sorted by name
    pub fn select_group(&self, group: &str) -> Vec<Handle> {
        self.inner
            .scene
            .borrow()
            .group(group)
            .into_iter()
            .map(|(name, _)| Handle::Named(name))
            .collect()
    }

    /// Dispose every live instance tagged with `group`. Returns how many.
    pub fn dispose_group(&self, group: &str) -> usize {
        self.select_group(group)
            .into_iter()
            .filter(|handle| self.dispose(handle))
            .count()
    }

    // ------------------------------------------------------------------------
    // Fetch control
    // ------------------------------------------------------------------------

    /// Abort the fetch in flight for `asset`.
    ///
    /// Its ticket is cleared on the next tick and its requests are marked
    /// failed.
    pub fn abort(&self, asset: &AssetName) -> bool {
        self.inner.loads.abort(asset)
    }

    /// Abort all fetches, let them settle, and drop every pending readiness
    /// entry so that waiting futures complete with `Err(Dropped)`.
    pub fn shutdown(&self) {
        let in_flight = self.inner.loads.len();
        self.inner.loads.abort_all();
        self.inner.pool.borrow_mut().run_until_stalled();
        self.inner.frames.borrow_mut().clear();

        let pending = self.inner.readiness.borrow().pending();
        if !pending.is_empty() {
            log::info!(
                "Shutting down with {} unresolved handles: {}",
                pending.len(),
                pending
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ")
            );
        }
        self.inner.readiness.borrow_mut().clear();
        log::info!("Stage shut down ({in_flight} fetches aborted)");
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    /// State of a name that has been requested but is not live
    pub fn request_state(&self, name: &str) -> Option<RequestState> {
        self.inner.requests.borrow().get(name).cloned()
    }

    /// Check if a fetch for `asset` is in flight
    pub fn is_loading(&self, asset: &AssetName) -> bool {
        self.inner.loads.contains(asset)
    }

    /// Check if `asset` has a cached template
    pub fn has_template(&self, asset: &AssetName) -> bool {
        self.inner.templates.borrow().contains(asset)
    }

    /// Snapshot of the load statistics
    pub fn stats(&self) -> LoadStats {
        self.inner.stats.borrow().clone()
    }

    /// Run `f` with read access to the scene
    pub fn with_scene<R>(&self, f: impl FnOnce(&Scene) -> R) -> R {
        f(&self.inner.scene.borrow())
    }

    /// Run `f` with write access to the scene, e.g. to spawn a camera.
    ///
    /// Do not create or dispose instances from inside `f`.
    pub fn with_scene_mut<R>(&self, f: impl FnOnce(&mut Scene) -> R) -> R {
        f(&mut self.inner.scene.borrow_mut())
    }

    /// Look up a live instance root
    pub fn entity(&self, handle: impl Into<Handle>) -> Option<Entity> {
        let handle = handle.into();
        let scene = self.inner.scene.borrow();
        handle.name().and_then(|name| scene.lookup(name))
    }
}
