//! Engine-side element entity.
//!
//! [`ElementNode`] pairs a user [`Element`] behavior with everything the
//! scheduler needs: identity, frozen configuration, the forward/reverse edge
//! sets, the readiness counter, and the aspect manager. The phase processor
//! here is the single entry point that wraps user methods with aspect hooks
//! and panic trapping; above it, only [`Status`] values flow.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use flowgraph_core::{
    fg_elem, next_session, ElementId, GraphError, GraphResult, Level, ParamTable, Status,
};

use crate::aspect::{Aspect, AspectKind, AspectManager};
use crate::element::{Element, ElementContext, Phase};
use crate::pool::task::panic_message;
use crate::pool::WorkerPool;

struct NodeConfig {
    name: String,
    loop_count: usize,
    level: Level,
}

/// A schedulable node: one user behavior plus its engine state.
pub struct ElementNode {
    id: ElementId,
    session: String,

    config: RwLock<NodeConfig>,
    aspects: RwLock<AspectManager>,
    behavior: Mutex<Box<dyn Element>>,

    // Wiring, frozen once the graph starts initialization.
    dependence: RwLock<Vec<ElementId>>,
    run_before: RwLock<Vec<ElementId>>,

    // Per-epoch readiness state.
    left_depend: AtomicI64,
    done: AtomicBool,

    frozen: AtomicBool,
    linkable: bool,

    params: RwLock<Arc<ParamTable>>,
    pool: RwLock<Option<Arc<WorkerPool>>>,
}

impl ElementNode {
    pub(crate) fn new(id: ElementId, behavior: Box<dyn Element>, linkable: bool) -> Self {
        let session = next_session();
        Self {
            id,
            config: RwLock::new(NodeConfig {
                name: session.clone(),
                loop_count: 1,
                level: 0,
            }),
            session,
            aspects: RwLock::new(AspectManager::new()),
            behavior: Mutex::new(behavior),
            dependence: RwLock::new(Vec::new()),
            run_before: RwLock::new(Vec::new()),
            left_depend: AtomicI64::new(0),
            done: AtomicBool::new(false),
            frozen: AtomicBool::new(false),
            linkable,
            params: RwLock::new(Arc::new(ParamTable::new())),
            pool: RwLock::new(None),
        }
    }

    // ---- identity ----

    pub fn id(&self) -> ElementId {
        self.id
    }

    pub fn session(&self) -> &str {
        &self.session
    }

    pub fn name(&self) -> String {
        self.config.read().name.clone()
    }

    pub fn level(&self) -> Level {
        self.config.read().level
    }

    pub fn loop_count(&self) -> usize {
        self.config.read().loop_count
    }

    /// Whether this node may appear inside a linked sub-chain.
    pub fn is_linkable(&self) -> bool {
        self.linkable
    }

    /// Number of registered aspect hooks.
    pub fn aspect_count(&self) -> usize {
        self.aspects.read().size()
    }

    /// Worker pool captured at configuration time, if any.
    pub fn pool(&self) -> Option<Arc<WorkerPool>> {
        self.pool.read().clone()
    }

    // ---- configuration (legal only before the graph initializes) ----

    fn ensure_mutable(&self) -> GraphResult<()> {
        if self.frozen.load(Ordering::Acquire) {
            return Err(GraphError::FrozenConfiguration);
        }
        Ok(())
    }

    /// Set the display name. An empty name falls back to the session.
    pub(crate) fn set_name(&self, name: &str) -> GraphResult<()> {
        self.ensure_mutable()?;
        let mut config = self.config.write();
        config.name = if name.is_empty() {
            self.session.clone()
        } else {
            name.to_string()
        };
        self.aspects.write().set_name(config.name.clone());
        Ok(())
    }

    /// Set executions per scheduling. Zero is rejected.
    pub(crate) fn set_loop(&self, loop_count: usize) -> GraphResult<()> {
        self.ensure_mutable()?;
        if loop_count == 0 {
            return Err(GraphError::InvalidLoopCount(loop_count));
        }
        self.config.write().loop_count = loop_count;
        Ok(())
    }

    /// Set the dispatch level. Larger runs earlier among ready peers.
    pub(crate) fn set_level(&self, level: Level) -> GraphResult<()> {
        self.ensure_mutable()?;
        self.config.write().level = level;
        Ok(())
    }

    pub(crate) fn add_aspect(&self, aspect: Box<dyn Aspect>) -> GraphResult<()> {
        self.ensure_mutable()?;
        self.aspects.write().add(aspect);
        Ok(())
    }

    /// Apply name/loop/level and capture the shared handles in one step.
    /// Rejects a pool that is missing from service.
    pub(crate) fn apply_config(
        &self,
        name: &str,
        loop_count: usize,
        level: Level,
        params: Arc<ParamTable>,
        pool: &Arc<WorkerPool>,
    ) -> GraphResult<()> {
        if !pool.is_accepting() {
            return Err(GraphError::PoolUnavailable("pool is shut down".to_string()));
        }
        self.set_name(name)?;
        self.set_loop(loop_count)?;
        self.set_level(level)?;
        *self.params.write() = params;
        *self.pool.write() = Some(Arc::clone(pool));
        Ok(())
    }

    /// Swap the shared parameter table. Graph-level rebinding only.
    pub(crate) fn set_params(&self, params: Arc<ParamTable>) -> GraphResult<()> {
        self.ensure_mutable()?;
        *self.params.write() = params;
        Ok(())
    }

    /// Swap the pool handle. Graph-level rebinding only.
    pub(crate) fn set_pool(&self, pool: &Arc<WorkerPool>) -> GraphResult<()> {
        self.ensure_mutable()?;
        if !pool.is_accepting() {
            return Err(GraphError::PoolUnavailable("pool is shut down".to_string()));
        }
        *self.pool.write() = Some(Arc::clone(pool));
        Ok(())
    }

    pub(crate) fn freeze(&self) {
        self.frozen.store(true, Ordering::Release);
    }

    // ---- wiring (symmetry and acyclicity are enforced by the graph) ----

    /// Record `dep` as a predecessor. Returns false if already present.
    pub(crate) fn link_dependence(&self, dep: ElementId) -> bool {
        let mut deps = self.dependence.write();
        if deps.contains(&dep) {
            return false;
        }
        deps.push(dep);
        true
    }

    /// Record `succ` as a successor to notify after completion.
    pub(crate) fn link_run_before(&self, succ: ElementId) {
        let mut succs = self.run_before.write();
        if !succs.contains(&succ) {
            succs.push(succ);
        }
    }

    /// Re-derive `left_depend` from the dependence set.
    pub(crate) fn sync_left_depend(&self) {
        let deps = self.dependence.read().len() as i64;
        self.left_depend.store(deps, Ordering::Release);
    }

    pub(crate) fn dependence(&self) -> Vec<ElementId> {
        self.dependence.read().clone()
    }

    pub(crate) fn run_before(&self) -> Vec<ElementId> {
        self.run_before.read().clone()
    }

    // ---- readiness protocol ----

    /// Start a fresh epoch: not done, all predecessors outstanding.
    pub(crate) fn before_run(&self) {
        self.done.store(false, Ordering::Release);
        self.sync_left_depend();
    }

    /// One predecessor finished. True exactly when the counter hit zero,
    /// which is the dispatch trigger: acting on the decrement result (never
    /// a re-read) dispatches each successor exactly once.
    pub(crate) fn notify_dependency_done(&self) -> bool {
        self.left_depend.fetch_sub(1, Ordering::AcqRel) == 1
    }

    pub(crate) fn mark_done(&self) {
        self.done.store(true, Ordering::Release);
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    pub fn is_runnable(&self) -> bool {
        self.left_depend.load(Ordering::Acquire) <= 0 && !self.is_done()
    }

    #[cfg(test)]
    pub(crate) fn left_depend(&self) -> i64 {
        self.left_depend.load(Ordering::Acquire)
    }

    // ---- phase processing ----

    /// Drive one lifecycle phase through the aspect protocol.
    ///
    /// For `Run`, the body executes `loop_count` times, each iteration
    /// wrapped in one `BeginRun`/`FinishRun` pair; a hold predicate repeats
    /// the body inside the iteration without further hook traffic. `Finish*`
    /// hooks run even when the body failed; their results do not override
    /// the phase status.
    pub(crate) fn phase_processor(&self, phase: Phase) -> Status {
        let params = Arc::clone(&self.params.read());
        let config = self.config.read();
        let aspects = self.aspects.read();
        let mut behavior = self.behavior.lock();
        let behavior: &mut dyn Element = &mut **behavior;
        let ctx = ElementContext::new(&config.name, &self.session, &params);

        match phase {
            Phase::Run => {
                let mut status = Status::ok();
                for iteration in 0..config.loop_count {
                    status = aspects.reflect(AspectKind::BeginRun, &Status::ok());
                    if status.is_err() {
                        fg_elem!(
                            debug,
                            element = %config.name,
                            iteration,
                            code = status.code(),
                            "run body vetoed"
                        );
                        break;
                    }
                    status = run_until_released(behavior, &ctx);
                    aspects.reflect(AspectKind::FinishRun, &status);
                    if status.is_err() {
                        break;
                    }
                }
                status
            }
            Phase::Init => {
                let status = aspects.reflect(AspectKind::BeginInit, &Status::ok());
                if status.is_err() {
                    return status;
                }
                let status = guarded(behavior, &ctx, |b, c| b.init(c));
                aspects.reflect(AspectKind::FinishInit, &status);
                status
            }
            Phase::Destroy => {
                let status = aspects.reflect(AspectKind::BeginDestroy, &Status::ok());
                if status.is_err() {
                    return status;
                }
                let status = guarded(behavior, &ctx, |b, c| b.destroy(c));
                aspects.reflect(AspectKind::FinishDestroy, &status);
                status
            }
        }
    }
}

/// Repeat `run` while it succeeds and the element holds itself.
fn run_until_released(behavior: &mut dyn Element, ctx: &ElementContext<'_>) -> Status {
    loop {
        let status = guarded(behavior, ctx, |b, c| b.run(c));
        if status.is_err() {
            return status;
        }
        let hold = {
            let reborrow = &mut *behavior;
            catch_unwind(AssertUnwindSafe(move || reborrow.is_hold(ctx)))
        };
        match hold {
            Ok(true) => continue,
            Ok(false) => return status,
            Err(payload) => return route_crash(behavior, ctx, payload),
        }
    }
}

/// Call a user method with panic trapping; a panic is routed to `crashed`.
fn guarded(
    behavior: &mut dyn Element,
    ctx: &ElementContext<'_>,
    call: impl FnOnce(&mut dyn Element, &ElementContext<'_>) -> Status,
) -> Status {
    let outcome = {
        let reborrow = &mut *behavior;
        catch_unwind(AssertUnwindSafe(move || call(reborrow, ctx)))
    };
    match outcome {
        Ok(status) => status,
        Err(payload) => route_crash(behavior, ctx, payload),
    }
}

/// Hand the rendered payload to `crashed`; a second panic becomes a fatal
/// crashed status so nothing unwinds past the element boundary.
fn route_crash(
    behavior: &mut dyn Element,
    ctx: &ElementContext<'_>,
    payload: Box<dyn Any + Send>,
) -> Status {
    let message = panic_message(payload.as_ref());
    fg_elem!(warn, element = %ctx.name(), %message, "user method panicked");
    let outcome = {
        let reborrow = &mut *behavior;
        catch_unwind(AssertUnwindSafe(move || reborrow.crashed(&message, ctx)))
    };
    match outcome {
        Ok(status) => status,
        Err(second) => Status::crashed(panic_message(second.as_ref())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flowgraph_core::status::code;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        runs: Arc<AtomicUsize>,
        holds_left: usize,
        fail_with: Option<i32>,
    }

    impl Counting {
        fn new(runs: Arc<AtomicUsize>) -> Self {
            Self {
                runs,
                holds_left: 0,
                fail_with: None,
            }
        }
    }

    impl Element for Counting {
        fn run(&mut self, _ctx: &ElementContext<'_>) -> Status {
            self.runs.fetch_add(1, Ordering::Relaxed);
            match self.fail_with {
                Some(code) => Status::new(code, "configured failure"),
                None => Status::ok(),
            }
        }

        fn is_hold(&mut self, _ctx: &ElementContext<'_>) -> bool {
            if self.holds_left > 0 {
                self.holds_left -= 1;
                true
            } else {
                false
            }
        }
    }

    fn node_with(behavior: Box<dyn Element>) -> ElementNode {
        ElementNode::new(0, behavior, true)
    }

    #[test]
    fn name_defaults_to_session() {
        let node = node_with(Box::new(Counting::new(Arc::new(AtomicUsize::new(0)))));
        assert_eq!(node.name(), node.session());

        node.set_name("loader").expect("set_name failed");
        assert_eq!(node.name(), "loader");
        node.set_name("").expect("set_name failed");
        assert_eq!(node.name(), node.session());
    }

    #[test]
    fn zero_loop_rejected() {
        let node = node_with(Box::new(Counting::new(Arc::new(AtomicUsize::new(0)))));
        assert!(matches!(
            node.set_loop(0),
            Err(GraphError::InvalidLoopCount(0))
        ));
        assert_eq!(node.loop_count(), 1);
    }

    #[test]
    fn frozen_node_rejects_mutation() {
        let node = node_with(Box::new(Counting::new(Arc::new(AtomicUsize::new(0)))));
        node.freeze();
        assert!(matches!(
            node.set_name("late"),
            Err(GraphError::FrozenConfiguration)
        ));
        assert!(matches!(
            node.set_loop(3),
            Err(GraphError::FrozenConfiguration)
        ));
        assert!(matches!(
            node.set_level(1),
            Err(GraphError::FrozenConfiguration)
        ));
    }

    #[test]
    fn loop_count_drives_run_repetitions() {
        let runs = Arc::new(AtomicUsize::new(0));
        let node = node_with(Box::new(Counting::new(Arc::clone(&runs))));
        node.set_loop(5).expect("set_loop failed");

        let status = node.phase_processor(Phase::Run);
        assert!(status.is_ok());
        assert_eq!(runs.load(Ordering::Relaxed), 5);
    }

    #[test]
    fn hold_repeats_within_one_iteration() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut behavior = Counting::new(Arc::clone(&runs));
        behavior.holds_left = 2;
        let node = node_with(Box::new(behavior));
        node.set_loop(2).expect("set_loop failed");

        // First loop iteration runs 1 + 2 held repetitions; second runs once.
        let status = node.phase_processor(Phase::Run);
        assert!(status.is_ok());
        assert_eq!(runs.load(Ordering::Relaxed), 4);
    }

    #[test]
    fn hold_hooks_fire_once_per_loop_iteration() {
        let begin_count = Arc::new(AtomicUsize::new(0));
        let runs = Arc::new(AtomicUsize::new(0));
        let mut behavior = Counting::new(Arc::clone(&runs));
        behavior.holds_left = 3;
        let node = node_with(Box::new(behavior));
        {
            let begin_count = Arc::clone(&begin_count);
            node.add_aspect(Box::new(move |kind: AspectKind, _: &Status| {
                if kind == AspectKind::BeginRun {
                    begin_count.fetch_add(1, Ordering::Relaxed);
                }
                Status::ok()
            }))
            .expect("add_aspect failed");
        }

        assert!(node.phase_processor(Phase::Run).is_ok());
        assert_eq!(runs.load(Ordering::Relaxed), 4);
        assert_eq!(begin_count.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn failing_run_stops_remaining_iterations() {
        let runs = Arc::new(AtomicUsize::new(0));
        let mut behavior = Counting::new(Arc::clone(&runs));
        behavior.fail_with = Some(7);
        let node = node_with(Box::new(behavior));
        node.set_loop(4).expect("set_loop failed");

        let status = node.phase_processor(Phase::Run);
        assert_eq!(status.code(), 7);
        assert_eq!(runs.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn begin_veto_skips_the_body() {
        let runs = Arc::new(AtomicUsize::new(0));
        let node = node_with(Box::new(Counting::new(Arc::clone(&runs))));
        node.set_loop(3).expect("set_loop failed");
        node.add_aspect(Box::new(|kind: AspectKind, _: &Status| {
            if kind == AspectKind::BeginRun {
                Status::new(9, "not today")
            } else {
                Status::ok()
            }
        }))
        .expect("add_aspect failed");

        let status = node.phase_processor(Phase::Run);
        assert_eq!(status.code(), 9);
        assert_eq!(runs.load(Ordering::Relaxed), 0);
    }

    #[test]
    fn finish_hooks_run_after_failure_but_do_not_override() {
        let finish_saw = Arc::new(AtomicUsize::new(0));
        let mut behavior = Counting::new(Arc::new(AtomicUsize::new(0)));
        behavior.fail_with = Some(7);
        let node = node_with(Box::new(behavior));
        {
            let finish_saw = Arc::clone(&finish_saw);
            node.add_aspect(Box::new(move |kind: AspectKind, current: &Status| {
                if kind == AspectKind::FinishRun {
                    finish_saw.store(current.code() as usize, Ordering::Relaxed);
                    return Status::new(99, "finish failure is not the phase status");
                }
                Status::ok()
            }))
            .expect("add_aspect failed");
        }

        let status = node.phase_processor(Phase::Run);
        assert_eq!(status.code(), 7);
        assert_eq!(finish_saw.load(Ordering::Relaxed), 7);
    }

    struct Panicky {
        recover_with: Option<i32>,
    }

    impl Element for Panicky {
        fn run(&mut self, _ctx: &ElementContext<'_>) -> Status {
            panic!("wheels off");
        }

        fn crashed(&mut self, panic: &str, _ctx: &ElementContext<'_>) -> Status {
            match self.recover_with {
                Some(code) => Status::new(code, format!("recovered from: {panic}")),
                None => Status::crashed(panic),
            }
        }
    }

    #[test]
    fn panic_routes_through_crashed_default() {
        let node = node_with(Box::new(Panicky { recover_with: None }));
        let status = node.phase_processor(Phase::Run);
        assert_eq!(status.code(), code::CRASHED);
        assert!(status.message().contains("wheels off"));
    }

    #[test]
    fn overridden_crashed_recovers_with_custom_code() {
        let node = node_with(Box::new(Panicky {
            recover_with: Some(11),
        }));
        let status = node.phase_processor(Phase::Run);
        assert_eq!(status.code(), 11);
        assert!(status.message().contains("wheels off"));
    }

    #[test]
    fn init_and_destroy_wrap_once() {
        let begins = Arc::new(AtomicUsize::new(0));
        let node = node_with(Box::new(Counting::new(Arc::new(AtomicUsize::new(0)))));
        {
            let begins = Arc::clone(&begins);
            node.add_aspect(Box::new(move |kind: AspectKind, _: &Status| {
                if kind.is_begin() {
                    begins.fetch_add(1, Ordering::Relaxed);
                }
                Status::ok()
            }))
            .expect("add_aspect failed");
        }

        assert!(node.phase_processor(Phase::Init).is_ok());
        assert!(node.phase_processor(Phase::Destroy).is_ok());
        assert_eq!(begins.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn apply_config_captures_shared_handles() {
        use crate::pool::{PoolConfig, WorkerPool};

        let node = node_with(Box::new(Counting::new(Arc::new(AtomicUsize::new(0)))));
        assert!(node.is_linkable());
        assert!(node.pool().is_none());
        assert_eq!(node.aspect_count(), 0);

        let pool = Arc::new(
            WorkerPool::new(PoolConfig::default().with_thread_count(1))
                .expect("pool construction failed"),
        );
        node.apply_config("worker", 2, 3, Arc::new(ParamTable::new()), &pool)
            .expect("apply_config failed");

        assert!(node.pool().is_some());
        assert_eq!(node.name(), "worker");
        assert_eq!(node.loop_count(), 2);
        assert_eq!(node.level(), 3);

        pool.shutdown();
        assert!(matches!(
            node.set_pool(&pool),
            Err(GraphError::PoolUnavailable(_))
        ));
    }

    #[test]
    fn readiness_counter_protocol() {
        let node = node_with(Box::new(Counting::new(Arc::new(AtomicUsize::new(0)))));
        node.link_dependence(7);
        node.link_dependence(8);
        assert!(!node.link_dependence(7), "duplicate edge must be ignored");
        node.sync_left_depend();

        node.before_run();
        assert_eq!(node.left_depend(), 2);
        assert!(!node.is_runnable());

        assert!(!node.notify_dependency_done());
        assert!(node.notify_dependency_done(), "second decrement reaches zero");
        assert!(node.is_runnable());

        node.mark_done();
        assert!(node.is_done());
        assert!(!node.is_runnable());
    }
}
