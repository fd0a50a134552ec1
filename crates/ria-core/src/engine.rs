//! Orchestration engine
//!
//! Runs one [`GraphState`] through the task graph:
//!
//! 1. the entry node normalizes `input_text` on the calling task;
//! 2. every leaf declared by the [`TaskGraph`] is spawned onto a [`JoinSet`]
//!    with a shared snapshot of the normalized text;
//! 3. fragments are merged into their slots as tasks finish;
//! 4. the complete state goes to the [`StateAggregator`].
//!
//! A run counts as completed only once the report has been aggregated.
//!
//! The run is all-or-nothing. The first leaf failure aborts the leaves still
//! running and fails the run; no partial report is produced. Dropping the run
//! future aborts all leaves as well.

use crate::aggregate::{AnalysisReport, StateAggregator};
use crate::capability::{AnalysisCapability, TextNormalizer};
use crate::error::{PipelineError, Result};
use crate::graph::TaskGraph;
use crate::state::{validate_transition, GraphState, RunState};
use crate::task::{AnalysisTask, TaskRegistry};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tracing::Instrument;
use ulid::Ulid;

/// Identifier of one orchestration run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Ulid);

impl RunId {
    /// Fresh, time-ordered id
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Run lifecycle bookkeeping
#[derive(Debug)]
struct RunTracker {
    id: RunId,
    state: RunState,
}

impl RunTracker {
    fn new(id: RunId) -> Self {
        Self {
            id,
            state: RunState::Pending,
        }
    }

    fn advance(&mut self, to: RunState) -> Result<()> {
        validate_transition(self.state, to)?;
        tracing::debug!(run_id = %self.id, from = ?self.state, to = ?to, "run transition");
        self.state = to;
        Ok(())
    }
}

/// Executes the entry node and the fan-out leaves
pub struct OrchestrationEngine {
    normalizer: Arc<dyn TextNormalizer>,
    capability: Arc<dyn AnalysisCapability>,
    registry: Arc<TaskRegistry>,
    graph: TaskGraph,
    plan: Vec<AnalysisTask>,
    aggregator: StateAggregator,
    run_timeout: Option<Duration>,
}

impl fmt::Debug for OrchestrationEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrchestrationEngine")
            .field("normalizer", &self.normalizer.name())
            .field("graph", &self.graph)
            .field("run_timeout", &self.run_timeout)
            .finish_non_exhaustive()
    }
}

impl OrchestrationEngine {
    /// Create engine over the standard task catalog
    ///
    /// # Errors
    /// `PipelineError::Graph` / `Schema` if the graph declaration or the
    /// report schema is invalid
    pub fn new(
        normalizer: Arc<dyn TextNormalizer>,
        capability: Arc<dyn AnalysisCapability>,
    ) -> Result<Self> {
        let registry = TaskRegistry::standard();
        let graph = TaskGraph::standard(&registry)?;
        let plan = graph.resolve(&registry)?;
        Ok(Self {
            normalizer,
            capability,
            registry: Arc::new(registry),
            graph,
            plan,
            aggregator: StateAggregator::new()?,
            run_timeout: None,
        })
    }

    /// Replace the task graph; its leaves decide which tasks run
    ///
    /// # Errors
    /// `PipelineError::Graph` if a leaf names no registered task
    pub fn with_graph(mut self, graph: TaskGraph) -> Result<Self> {
        self.plan = graph.resolve(&self.registry)?;
        self.graph = graph;
        Ok(self)
    }

    /// With a deadline for the fan-out stage
    #[inline]
    #[must_use]
    pub fn with_run_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.run_timeout = timeout;
        self
    }

    /// Task catalog
    #[inline]
    #[must_use]
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Validated graph
    #[inline]
    #[must_use]
    pub fn graph(&self) -> &TaskGraph {
        &self.graph
    }

    /// Run the graph over `input_text` and aggregate the result
    ///
    /// # Errors
    /// Any entry, leaf or aggregation failure; see [`execute`](Self::execute)
    pub async fn run(&self, input_text: impl Into<String>) -> Result<AnalysisReport> {
        self.run_tracked(GraphState::new(input_text)).await.1
    }

    /// Run the entry node and all leaves, returning the filled state
    ///
    /// # Errors
    /// - `PipelineError::Normalization` if the entry node fails
    /// - `PipelineError::TaskPrecondition` / `AnalysisCapability` for the
    ///   first failing leaf
    /// - `PipelineError::TaskAborted` if a leaf panicked
    /// - `PipelineError::Timeout` if the run deadline passes
    pub async fn execute(&self, mut state: GraphState) -> Result<GraphState> {
        let (_, outcome) = Self::tracked(async move {
            self.execute_stages(&mut state).await?;
            Ok(state)
        })
        .await;
        outcome
    }

    async fn run_tracked(&self, mut state: GraphState) -> (RunState, Result<AnalysisReport>) {
        Self::tracked(async move {
            self.execute_stages(&mut state).await?;
            Ok(self.aggregator.aggregate(&state)?)
        })
        .await
    }

    async fn tracked<T, F>(work: F) -> (RunState, Result<T>)
    where
        F: Future<Output = Result<T>>,
    {
        let run_id = RunId::new();
        let span = tracing::info_span!("run", run_id = %run_id);

        async move {
            let started = Instant::now();
            let mut tracker = RunTracker::new(run_id);
            if let Err(err) = tracker.advance(RunState::Running) {
                return (tracker.state, Err(err));
            }

            let outcome = work.await;
            let target = if outcome.is_ok() {
                RunState::Completed
            } else {
                RunState::Failed
            };
            if let Err(err) = tracker.advance(target) {
                return (tracker.state, Err(err));
            }

            match &outcome {
                Ok(_) => {
                    tracing::info!(elapsed_ms = started.elapsed().as_millis(), "run completed");
                }
                Err(err) => tracing::error!(error = %err, kind = ?err.kind(), "run failed"),
            }
            (tracker.state, outcome)
        }
        .instrument(span)
        .await
    }

    async fn execute_stages(&self, state: &mut GraphState) -> Result<()> {
        tracing::info!(
            node = self.graph.entry(),
            normalizer = self.normalizer.name(),
            "entry node started"
        );
        let converted = self
            .normalizer
            .normalize(state.input_text())
            .await
            .map_err(|source| PipelineError::Normalization { source })?;
        state.set_converted_text(converted)?;

        let snapshot = state.converted_text().cloned();
        let mut leaves = JoinSet::new();
        for task in &self.plan {
            let task = task.clone();
            let capability = Arc::clone(&self.capability);
            let text = snapshot.clone();
            let span = tracing::info_span!("task", task = task.name());
            leaves.spawn(
                async move { task.run(text.as_deref(), capability.as_ref()).await }
                    .instrument(span),
            );
        }
        tracing::info!(leaves = leaves.len(), "fan-out dispatched");

        let joined = match self.run_timeout {
            Some(limit) => tokio::time::timeout(limit, join_leaves(&mut leaves, state))
                .await
                .unwrap_or(Err(PipelineError::Timeout { waited: limit })),
            None => join_leaves(&mut leaves, state).await,
        };

        if joined.is_err() && !leaves.is_empty() {
            tracing::warn!(remaining = leaves.len(), "aborting remaining leaves");
            leaves.abort_all();
        }
        joined
    }
}

async fn join_leaves(
    leaves: &mut JoinSet<Result<crate::state::Fragment>>,
    state: &mut GraphState,
) -> Result<()> {
    while let Some(joined) = leaves.join_next().await {
        let fragment = joined.map_err(|e| PipelineError::TaskAborted(e.to_string()))??;
        tracing::debug!(task = fragment.kind().task_name(), "leaf finished");
        state.record(fragment)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CapabilityError, GraphError};
    use crate::normalize::RateTableNormalizer;
    use crate::graph::{GraphNode, ENTRY_NODE};
    use crate::state::AnalysisKind;
    use async_trait::async_trait;
    use serde_json::{json, Value};

    struct NameEcho;

    #[async_trait]
    impl AnalysisCapability for NameEcho {
        async fn invoke(
            &self,
            task: &AnalysisTask,
            text: &str,
        ) -> std::result::Result<Value, CapabilityError> {
            Ok(json!({ "task": task.name(), "text": text }))
        }
    }

    /// Answers with a bare string for property valuation
    struct ScalarValuation;

    #[async_trait]
    impl AnalysisCapability for ScalarValuation {
        async fn invoke(
            &self,
            task: &AnalysisTask,
            _text: &str,
        ) -> std::result::Result<Value, CapabilityError> {
            if task.kind() == AnalysisKind::PropertyValuation {
                Ok(json!("summary"))
            } else {
                Ok(json!({ "task": task.name() }))
            }
        }
    }

    struct Blank;

    #[async_trait]
    impl TextNormalizer for Blank {
        async fn normalize(&self, _text: &str) -> std::result::Result<String, CapabilityError> {
            Ok(String::new())
        }

        fn name(&self) -> &'static str {
            "blank"
        }
    }

    fn engine(normalizer: Arc<dyn TextNormalizer>) -> OrchestrationEngine {
        OrchestrationEngine::new(normalizer, Arc::new(NameEcho)).unwrap()
    }

    #[test]
    fn run_ids_are_unique() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn tracker_rejects_restart() {
        let mut tracker = RunTracker::new(RunId::new());
        tracker.advance(RunState::Running).unwrap();
        tracker.advance(RunState::Completed).unwrap();
        assert!(tracker.advance(RunState::Running).is_err());
    }

    #[tokio::test]
    async fn leaves_see_normalized_text() {
        let engine = engine(Arc::new(RateTableNormalizer::default()));
        let state = engine
            .execute(GraphState::new("Stadium revenue €8.5m per fixture."))
            .await
            .unwrap();

        assert_eq!(state.completed(), 6);
        for kind in AnalysisKind::ALL {
            assert_eq!(
                state.fragment(kind).unwrap()["text"],
                "Stadium revenue 8,500,000.00 EUR per fixture."
            );
        }
    }

    #[tokio::test]
    async fn empty_conversion_fails_preconditions() {
        let engine = engine(Arc::new(Blank));
        let err = engine.run("anything").await.unwrap_err();
        assert!(matches!(err, PipelineError::TaskPrecondition { .. }));
    }

    #[tokio::test]
    async fn successful_run_ends_completed() {
        let engine = engine(Arc::new(RateTableNormalizer::default()));
        let (state, outcome) = engine.run_tracked(GraphState::new("£1m")).await;

        assert!(outcome.is_ok());
        assert_eq!(state, RunState::Completed);
    }

    #[tokio::test]
    async fn aggregation_failure_ends_failed() {
        let engine = OrchestrationEngine::new(
            Arc::new(RateTableNormalizer::default()),
            Arc::new(ScalarValuation),
        )
        .unwrap();

        let (state, outcome) = engine.run_tracked(GraphState::new("£1m")).await;

        assert_eq!(state, RunState::Failed);
        assert!(matches!(outcome, Err(PipelineError::Schema(_))));
    }

    #[tokio::test]
    async fn declared_leaves_decide_what_runs() {
        let graph = TaskGraph::from_nodes(&[
            GraphNode {
                name: ENTRY_NODE,
                depends_on: None,
            },
            GraphNode {
                name: "risk_percentage",
                depends_on: Some(ENTRY_NODE),
            },
            GraphNode {
                name: "current_insurance",
                depends_on: Some(ENTRY_NODE),
            },
        ])
        .unwrap();
        let engine = engine(Arc::new(RateTableNormalizer::default()))
            .with_graph(graph)
            .unwrap();

        let state = engine.execute(GraphState::new("$10")).await.unwrap();

        assert_eq!(state.completed(), 2);
        assert!(state.fragment(AnalysisKind::RiskPercentage).is_some());
        assert!(state.fragment(AnalysisKind::CurrentInsurance).is_some());
        assert!(state.fragment(AnalysisKind::PropertyValuation).is_none());
    }

    #[test]
    fn unknown_leaf_rejected() {
        let graph = TaskGraph::from_nodes(&[
            GraphNode {
                name: ENTRY_NODE,
                depends_on: None,
            },
            GraphNode {
                name: "weather_forecast",
                depends_on: Some(ENTRY_NODE),
            },
        ])
        .unwrap();

        let err = engine(Arc::new(RateTableNormalizer::default()))
            .with_graph(graph)
            .unwrap_err();

        assert!(matches!(
            err,
            PipelineError::Graph(GraphError::UnknownTask("weather_forecast"))
        ));
    }
}
