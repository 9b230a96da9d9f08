//! Graph façade.
//!
//! [`Graph`] is the sole owner of the element arena and the ingress surface
//! the outer layers consume: create elements, wire dependencies, bind the
//! shared parameter table and worker pool, then drive `init` / `run` /
//! `destroy`. Wiring refuses cycles at the moment the offending edge is
//! added; the scheduler re-checks feasibility anyway before every epoch.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use flowgraph_core::{
    fg_sched, ElementId, GraphError, GraphResult, Level, ParamTable, Status,
};

use crate::aspect::Aspect;
use crate::element::{Element, ElementContext, ElementNode, FunctionElement, Phase};
use crate::pool::{PoolConfig, WorkerPool};
use crate::scheduler::{topology, Scheduler};

/// Top-level engine configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Worker-pool settings used when no pool is bound explicitly.
    #[serde(default)]
    pub pool: PoolConfig,

    /// Install a global `tracing` subscriber when the graph is created.
    #[serde(default)]
    pub enable_tracing: bool,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            pool: PoolConfig::default(),
            enable_tracing: false,
        }
    }
}

impl GraphConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_pool(mut self, pool: PoolConfig) -> Self {
        self.pool = pool;
        self
    }

    pub fn with_tracing(mut self, enable_tracing: bool) -> Self {
        self.enable_tracing = enable_tracing;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum GraphState {
    /// Elements may be created, wired, and configured.
    Configuring,
    /// Initialized; epochs may run.
    Ready,
    /// Destroyed; a fresh `init` reactivates the graph.
    Finished,
}

/// Owner of a computation DAG and entry point for executing it.
pub struct Graph {
    config: GraphConfig,
    elements: Vec<Arc<ElementNode>>,
    params: Arc<ParamTable>,
    pool: Option<Arc<WorkerPool>>,
    state: GraphState,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self::with_config(GraphConfig::default())
    }

    pub fn with_config(config: GraphConfig) -> Self {
        if config.enable_tracing {
            tracing_subscriber::fmt()
                .with_target(false)
                .with_level(true)
                .try_init()
                .ok(); // Ignore if already installed.
        }
        Self {
            config,
            elements: Vec::new(),
            params: Arc::new(ParamTable::new()),
            pool: None,
            state: GraphState::Configuring,
        }
    }

    // ---- assembly ----

    /// Add an element with explicit behavior, wiring, and options.
    ///
    /// `deps` are handles of elements that must complete first; a handle
    /// equal to the new element would be a self-loop and is skipped. An
    /// empty `name` falls back to the generated session.
    pub fn create_element(
        &mut self,
        behavior: Box<dyn Element>,
        deps: &[ElementId],
        name: &str,
        loop_count: usize,
        level: Level,
    ) -> GraphResult<ElementId> {
        self.insert_element(behavior, false, deps, name, loop_count, level)
    }

    /// Convenience creator for the closure-backed element kind. Function
    /// elements are linkable.
    pub fn create_function<F>(
        &mut self,
        body: F,
        deps: &[ElementId],
        name: &str,
        loop_count: usize,
        level: Level,
    ) -> GraphResult<ElementId>
    where
        F: FnMut(&ElementContext<'_>) -> Status + Send + 'static,
    {
        self.insert_element(
            Box::new(FunctionElement::new(body)),
            true,
            deps,
            name,
            loop_count,
            level,
        )
    }

    fn insert_element(
        &mut self,
        behavior: Box<dyn Element>,
        linkable: bool,
        deps: &[ElementId],
        name: &str,
        loop_count: usize,
        level: Level,
    ) -> GraphResult<ElementId> {
        self.ensure_configuring()?;
        for &dep in deps {
            if dep >= self.elements.len() {
                return Err(GraphError::UnknownElement(dep));
            }
        }
        let pool = self.ensure_pool()?;

        let id = self.elements.len();
        let node = Arc::new(ElementNode::new(id, behavior, linkable));
        node.apply_config(name, loop_count, level, Arc::clone(&self.params), &pool)?;
        self.elements.push(node);
        self.add_dependency(id, deps)?;
        Ok(id)
    }

    /// Declare that `of` depends on each element in `deps`.
    ///
    /// Self-loops are silently skipped. An edge that would close a cycle is
    /// refused and nothing of the failing call is applied beyond the edges
    /// already accepted.
    pub fn add_dependency(&mut self, of: ElementId, deps: &[ElementId]) -> GraphResult<()> {
        self.ensure_configuring()?;
        let node = self.element(of)?.clone();
        for &dep in deps {
            if dep == of {
                continue;
            }
            if dep >= self.elements.len() {
                return Err(GraphError::UnknownElement(dep));
            }
            if topology::depends_transitively(&self.elements, dep, of) {
                return Err(GraphError::CycleWouldForm {
                    from: self.elements[dep].name(),
                    to: node.name(),
                });
            }
            if node.link_dependence(dep) {
                self.elements[dep].link_run_before(of);
            }
        }
        node.sync_left_depend();
        Ok(())
    }

    /// Register a cross-cutting hook on one element.
    pub fn add_aspect(&mut self, id: ElementId, aspect: Box<dyn Aspect>) -> GraphResult<()> {
        self.ensure_configuring()?;
        self.element(id)?.add_aspect(aspect)
    }

    pub fn set_name(&mut self, id: ElementId, name: &str) -> GraphResult<()> {
        self.ensure_configuring()?;
        self.element(id)?.set_name(name)
    }

    pub fn set_loop(&mut self, id: ElementId, loop_count: usize) -> GraphResult<()> {
        self.ensure_configuring()?;
        self.element(id)?.set_loop(loop_count)
    }

    pub fn set_level(&mut self, id: ElementId, level: Level) -> GraphResult<()> {
        self.ensure_configuring()?;
        self.element(id)?.set_level(level)
    }

    /// Replace the shared parameter table for the whole graph.
    pub fn bind_parameters(&mut self, params: Arc<ParamTable>) -> GraphResult<()> {
        self.ensure_configuring()?;
        for node in &self.elements {
            node.set_params(Arc::clone(&params))?;
        }
        self.params = params;
        Ok(())
    }

    /// Bind an externally owned worker pool. The pool may serve many graphs
    /// and outlives any one run.
    pub fn bind_pool(&mut self, pool: Arc<WorkerPool>) -> GraphResult<()> {
        self.ensure_configuring()?;
        if !pool.is_accepting() {
            return Err(GraphError::PoolUnavailable("pool is shut down".to_string()));
        }
        for node in &self.elements {
            node.set_pool(&pool)?;
        }
        self.pool = Some(pool);
        Ok(())
    }

    // ---- lifecycle ----

    /// Initialize every element (aspect-wrapped), freezing configuration.
    ///
    /// Feasibility is checked first so an ill-formed graph is refused before
    /// any user code runs. Legal from any state; re-initializing after
    /// `destroy` reactivates the graph.
    pub fn init(&mut self) -> Status {
        let pool = match self.ensure_pool() {
            Ok(pool) => pool,
            Err(err) => return err.into_status(),
        };
        if !pool.is_accepting() {
            return GraphError::PoolUnavailable("pool is shut down".to_string()).into_status();
        }
        if let Err(err) = topology::ensure_acyclic(&self.elements) {
            return err.into_status();
        }

        for node in &self.elements {
            node.freeze();
        }

        let mut overall = Status::ok();
        for node in &self.elements {
            overall.absorb(node.phase_processor(Phase::Init));
            if overall.is_err() {
                break;
            }
        }
        if overall.is_ok() {
            self.state = GraphState::Ready;
            fg_sched!(debug, elements = self.elements.len(), "graph initialized");
        }
        overall
    }

    /// Run one epoch: every element to completion, honoring dependencies.
    ///
    /// Initializes implicitly on first use. May be called repeatedly; each
    /// epoch starts from a clean per-run state.
    pub fn run(&mut self) -> Status {
        if self.state != GraphState::Ready {
            let status = self.init();
            if status.is_err() {
                return status;
            }
        }
        let pool = match self.ensure_pool() {
            Ok(pool) => pool,
            Err(err) => return err.into_status(),
        };
        Scheduler::new(&self.elements, &pool).execute()
    }

    /// Destroy every element (aspect-wrapped). Requires an initialized
    /// graph; running is not required in between.
    pub fn destroy(&mut self) -> Status {
        if self.state != GraphState::Ready {
            return GraphError::FrozenConfiguration.into_status();
        }
        let mut overall = Status::ok();
        for node in &self.elements {
            overall.absorb(node.phase_processor(Phase::Destroy));
        }
        self.state = GraphState::Finished;
        self.params.clear();
        fg_sched!(debug, ok = overall.is_ok(), "graph destroyed");
        overall
    }

    // ---- introspection ----

    pub fn element(&self, id: ElementId) -> GraphResult<&Arc<ElementNode>> {
        self.elements.get(id).ok_or(GraphError::UnknownElement(id))
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Shared parameter table bound to this graph.
    pub fn params(&self) -> &Arc<ParamTable> {
        &self.params
    }

    // ---- internals ----

    fn ensure_configuring(&self) -> GraphResult<()> {
        if self.state == GraphState::Configuring {
            Ok(())
        } else {
            Err(GraphError::FrozenConfiguration)
        }
    }

    fn ensure_pool(&mut self) -> GraphResult<Arc<WorkerPool>> {
        if self.pool.is_none() {
            let pool = WorkerPool::new(self.config.pool.clone())
                .map_err(|err| GraphError::PoolUnavailable(err.to_string()))?;
            self.pool = Some(Arc::new(pool));
        }
        match &self.pool {
            Some(pool) => Ok(Arc::clone(pool)),
            None => Err(GraphError::PoolUnavailable("no pool bound".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_body() -> impl FnMut(&ElementContext<'_>) -> Status + Send + 'static {
        |_: &ElementContext<'_>| Status::ok()
    }

    fn small_graph() -> Graph {
        Graph::with_config(GraphConfig::default().with_pool(PoolConfig::default().with_thread_count(2)))
    }

    #[test]
    fn unknown_dependency_is_rejected() {
        let mut graph = small_graph();
        let result = graph.create_function(ok_body(), &[42], "orphan", 1, 0);
        assert!(matches!(result, Err(GraphError::UnknownElement(42))));
    }

    #[test]
    fn self_loop_is_silently_skipped() {
        let mut graph = small_graph();
        let a = graph
            .create_function(ok_body(), &[], "a", 1, 0)
            .expect("create failed");
        graph.add_dependency(a, &[a]).expect("self-loop must be skipped");
        assert!(graph.element(a).expect("missing element").dependence().is_empty());
        assert!(graph.run().is_ok());
    }

    #[test]
    fn cycle_is_refused_at_wiring_time() {
        let mut graph = small_graph();
        let a = graph
            .create_function(ok_body(), &[], "a", 1, 0)
            .expect("create failed");
        let b = graph
            .create_function(ok_body(), &[a], "b", 1, 0)
            .expect("create failed");
        assert!(matches!(
            graph.add_dependency(a, &[b]),
            Err(GraphError::CycleWouldForm { .. })
        ));
    }

    #[test]
    fn edge_symmetry_invariant() {
        let mut graph = small_graph();
        let a = graph
            .create_function(ok_body(), &[], "a", 1, 0)
            .expect("create failed");
        let b = graph
            .create_function(ok_body(), &[a], "b", 1, 0)
            .expect("create failed");

        let a_node = graph.element(a).expect("missing a");
        let b_node = graph.element(b).expect("missing b");
        assert_eq!(b_node.dependence(), vec![a]);
        assert_eq!(a_node.run_before(), vec![b]);
    }

    #[test]
    fn configuration_freezes_after_init() {
        let mut graph = small_graph();
        let a = graph
            .create_function(ok_body(), &[], "a", 1, 0)
            .expect("create failed");
        assert!(graph.init().is_ok());

        assert!(matches!(
            graph.set_loop(a, 2),
            Err(GraphError::FrozenConfiguration)
        ));
        assert!(matches!(
            graph.create_function(ok_body(), &[], "late", 1, 0),
            Err(GraphError::FrozenConfiguration)
        ));
        assert!(matches!(
            graph.bind_parameters(Arc::new(ParamTable::new())),
            Err(GraphError::FrozenConfiguration)
        ));
    }

    #[test]
    fn destroy_without_init_is_refused() {
        let mut graph = small_graph();
        assert!(graph.destroy().is_err());
    }

    #[test]
    fn init_then_destroy_without_run_is_legal() {
        let mut graph = small_graph();
        graph
            .create_function(ok_body(), &[], "a", 1, 0)
            .expect("create failed");
        assert!(graph.init().is_ok());
        assert!(graph.destroy().is_ok());
        assert!(graph.params().is_empty());
    }

    #[test]
    fn empty_graph_runs_ok() {
        let mut graph = small_graph();
        assert!(graph.run().is_ok());
    }

    #[test]
    fn bound_pool_is_used_and_respected() {
        let pool = Arc::new(
            WorkerPool::new(PoolConfig::default().with_thread_count(1)).expect("pool failed"),
        );
        let mut graph = small_graph();
        graph.bind_pool(Arc::clone(&pool)).expect("bind failed");
        graph
            .create_function(ok_body(), &[], "a", 1, 0)
            .expect("create failed");
        assert!(graph.run().is_ok());
        assert!(pool.metrics().executed() >= 1);
    }

    #[test]
    fn shut_down_pool_is_rejected() {
        let pool = Arc::new(
            WorkerPool::new(PoolConfig::default().with_thread_count(1)).expect("pool failed"),
        );
        pool.shutdown();
        let mut graph = small_graph();
        assert!(matches!(
            graph.bind_pool(pool),
            Err(GraphError::PoolUnavailable(_))
        ));
    }
}
