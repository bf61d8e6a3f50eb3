// Graph Executor
// Drives the execution plan over the data bus and produces a trace

use crate::definition::{NodeDefinition, NodeId, NodeKind, SocketRef};
use crate::error::{EngineError, ExecutionFailure, FailureKind};
use crate::execution::events::{EventSender, ExecutionEvent, ProgressSender};
use crate::execution::frame::ExecutionFrame;
use crate::executors::{
    BoundInputs, ExecutorError, ExecutorRegistry, InputBindings, OutputExecutor,
};
use crate::graph::Graph;
use crate::plan::{BranchUnit, ExecutionPlan, ExecutionUnit, LoopUnit, PlannedPredicate};
use crate::sandbox::{RunnerEnvironment, SandboxRunner};
use crate::value::Value;
use crate::verdict::{
    AggregationPolicy, FailureRecord, OutputRecord, ResultEvaluator, Verdict,
};

use tracing::{debug, error, warn};

use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Configuration for graph execution
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Default sandbox environment; RUN_FUNCTION nodes may override limits.
    pub environment: RunnerEnvironment,
    /// Headroom on top of a node's time limit before the engine cancels the
    /// pending sandbox call.
    pub sandbox_grace: Duration,
    /// Caller-supplied deadline over the whole execution.
    pub overall_deadline: Option<Duration>,
    /// How assertion outputs aggregate into pass/fail.
    pub policy: AggregationPolicy,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            environment: RunnerEnvironment::python(10, 256),
            sandbox_grace: Duration::from_secs(2),
            overall_deadline: None,
            policy: AggregationPolicy::AllPass,
        }
    }
}

/// Outcome of one node during a pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeStatus {
    Completed,
    Skipped,
    Failed,
}

#[derive(Debug, Clone)]
pub struct NodeOutcome {
    pub node_id: NodeId,
    pub status: NodeStatus,
}

/// Everything one execution pass produced, in execution order.
#[derive(Debug, Clone)]
pub struct ExecutionTrace {
    pub nodes: Vec<NodeOutcome>,
    pub outputs: Vec<OutputRecord>,
    pub failure: Option<FailureRecord>,
    pub duration: Duration,
}

impl ExecutionTrace {
    fn new() -> Self {
        Self {
            nodes: Vec::new(),
            outputs: Vec::new(),
            failure: None,
            duration: Duration::ZERO,
        }
    }

    fn record(&mut self, node_id: NodeId, status: NodeStatus) {
        self.nodes.push(NodeOutcome { node_id, status });
    }

    /// How many times a node ran in this pass (loop bodies run re-entrantly).
    pub fn completions(&self, node_id: NodeId) -> usize {
        self.nodes
            .iter()
            .filter(|o| o.node_id == node_id && o.status == NodeStatus::Completed)
            .count()
    }
}

type StepResult = Result<Option<ExecutionFailure>, EngineError>;

/// Executes one validated graph at a time.
///
/// Node execution is single-threaded and ordered per the plan; the only
/// suspension point is the sandbox call inside RUN_FUNCTION. Each execution
/// owns its frame and trace, so independent executions share no mutable
/// state and may run fully in parallel.
pub struct GraphExecutor {
    sandbox: Arc<dyn SandboxRunner>,
    config: ExecutorConfig,
    event_tx: Option<ProgressSender>,
}

impl GraphExecutor {
    pub fn new(sandbox: Arc<dyn SandboxRunner>) -> Self {
        Self {
            sandbox,
            config: ExecutorConfig::default(),
            event_tx: None,
        }
    }

    pub fn with_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_progress(mut self, tx: ProgressSender) -> Self {
        self.event_tx = Some(tx);
        self
    }

    /// Execute the graph with the given INPUT bindings and return a verdict.
    pub async fn execute(
        &self,
        graph: &Graph,
        bindings: &InputBindings,
    ) -> Result<Verdict, EngineError> {
        let (verdict, _) = self.execute_with_trace(graph, bindings).await?;
        Ok(verdict)
    }

    /// Execute and also hand back the full trace for grader-side inspection.
    pub async fn execute_with_trace(
        &self,
        graph: &Graph,
        bindings: &InputBindings,
    ) -> Result<(Verdict, ExecutionTrace), EngineError> {
        let start = Instant::now();
        let plan = ExecutionPlan::from_graph(graph);
        let registry = ExecutorRegistry::new(
            bindings.clone(),
            self.sandbox.clone(),
            self.config.environment.clone(),
            self.config.sandbox_grace,
        );

        let mut frame = ExecutionFrame::new();
        let mut trace = ExecutionTrace::new();

        self.event_tx.send_event(ExecutionEvent::GraphStarted {
            total_nodes: graph.nodes().len(),
        });

        let halted = match self.config.overall_deadline {
            None => {
                self.run_plan(graph, &plan, &registry, &mut frame, &mut trace)
                    .await?
            }
            Some(deadline) => {
                let run = self.run_plan(graph, &plan, &registry, &mut frame, &mut trace);
                match tokio::time::timeout(deadline, run).await {
                    Ok(result) => result?,
                    // Cancelling drops the pending work; nothing outside this
                    // execution is affected.
                    Err(_) => Some(ExecutionFailure::unattributed(
                        FailureKind::Timeout,
                        format!("execution exceeded the overall {:?} deadline", deadline),
                    )),
                }
            }
        };

        if let Some(failure) = halted {
            warn!(
                kind = failure.kind.as_str(),
                node_id = failure.node_id,
                "graph execution halted: {}",
                failure.message
            );
            trace.failure = Some(FailureRecord::from(failure));
        }
        trace.duration = start.elapsed();

        let verdict = ResultEvaluator::new(self.config.policy).evaluate(&trace);
        self.event_tx.send_event(ExecutionEvent::GraphCompleted {
            passed: verdict.passed,
            duration: trace.duration,
        });

        Ok((verdict, trace))
    }

    /// Run one plan (the whole graph, a branch arm, or a loop body).
    ///
    /// Boxed because branch and loop units recurse into their sub-plans.
    fn run_plan<'a>(
        &'a self,
        graph: &'a Graph,
        plan: &'a ExecutionPlan,
        registry: &'a ExecutorRegistry,
        frame: &'a mut ExecutionFrame,
        trace: &'a mut ExecutionTrace,
    ) -> Pin<Box<dyn Future<Output = StepResult> + Send + 'a>> {
        Box::pin(async move {
            for unit in &plan.units {
                let halted = match unit {
                    ExecutionUnit::Node(node_id) => {
                        self.run_node(graph, *node_id, registry, frame, trace).await?
                    }
                    ExecutionUnit::Branch(branch) => {
                        self.run_branch(graph, branch, registry, frame, trace).await?
                    }
                    ExecutionUnit::Loop(loop_unit) => {
                        self.run_loop(graph, loop_unit, registry, frame, trace)
                            .await?
                    }
                };
                if halted.is_some() {
                    return Ok(halted);
                }
            }
            Ok(None)
        })
    }

    /// Gather a node's inputs from the bus, execute it, and publish its
    /// outputs. A consumer of an Unbound socket is skipped, not errored --
    /// unless it is a terminal OUTPUT node, which fails the pass.
    async fn run_node(
        &self,
        graph: &Graph,
        node_id: NodeId,
        registry: &ExecutorRegistry,
        frame: &mut ExecutionFrame,
        trace: &mut ExecutionTrace,
    ) -> StepResult {
        let Some(node) = graph.node(node_id) else {
            return Ok(None);
        };
        let kind = node.kind();

        let mut inputs = BoundInputs::new();
        for socket in &node.inputs {
            // Validation guarantees exactly one feeding edge.
            let Some(edge) = graph.incoming(node_id, &socket.id) else {
                continue;
            };
            let Some(value) = frame.read(&edge.from_ref()) else {
                if kind == NodeKind::Output {
                    let failure = ExecutionFailure::new(
                        FailureKind::UnboundOutput,
                        node_id,
                        format!("OUTPUT socket '{}' resolved to Unbound", socket.id),
                    );
                    trace.record(node_id, NodeStatus::Failed);
                    self.event_tx.send_event(ExecutionEvent::node_failed(
                        node_id,
                        failure.kind,
                        failure.message.clone(),
                    ));
                    return Ok(Some(failure));
                }
                debug!(node_id, socket = %socket.id, "skipping consumer of unbound socket");
                trace.record(node_id, NodeStatus::Skipped);
                self.event_tx.send_event(ExecutionEvent::node_skipped(
                    node_id,
                    format!("input socket '{}' is unbound", socket.id),
                ));
                return Ok(None);
            };

            let value = match edge.coercion {
                Some(coercion) => coercion.apply(value),
                None => value.clone(),
            };
            // Guard against a bad value reaching the executor despite
            // validation (an ANY-typed producer can emit anything).
            if !socket.ty.admits(&value) {
                let failure = ExecutionFailure::type_mismatch(
                    node_id,
                    format!(
                        "socket '{}' declares {} but received {}",
                        socket.id,
                        socket.ty,
                        value.socket_type()
                    ),
                );
                trace.record(node_id, NodeStatus::Failed);
                self.event_tx.send_event(ExecutionEvent::node_failed(
                    node_id,
                    failure.kind,
                    failure.message.clone(),
                ));
                return Ok(Some(failure));
            }
            inputs.insert(socket.id.clone(), value);
        }

        let Some(executor) = registry.for_kind(kind) else {
            return Ok(None);
        };

        self.event_tx
            .send_event(ExecutionEvent::node_started(node_id, kind));
        let started = Instant::now();

        match executor.execute(node, &inputs).await {
            Ok(outputs) => {
                if let Some(failure) = self.publish_outputs(node, outputs, frame) {
                    trace.record(node_id, NodeStatus::Failed);
                    self.event_tx.send_event(ExecutionEvent::node_failed(
                        node_id,
                        failure.kind,
                        failure.message.clone(),
                    ));
                    return Ok(Some(failure));
                }
                if kind == NodeKind::Output {
                    trace
                        .outputs
                        .extend(OutputExecutor::collect_records(node, &inputs));
                }
                trace.record(node_id, NodeStatus::Completed);
                self.event_tx.send_event(ExecutionEvent::node_completed(
                    node_id,
                    started.elapsed(),
                ));
                Ok(None)
            }
            Err(ExecutorError::Failure(failure)) => {
                trace.record(node_id, NodeStatus::Failed);
                self.event_tx.send_event(ExecutionEvent::node_failed(
                    node_id,
                    failure.kind,
                    failure.message.clone(),
                ));
                Ok(Some(failure))
            }
            Err(ExecutorError::Unavailable(unavailable)) => {
                error!(node_id, "sandbox collaborator unreachable: {}", unavailable);
                Err(EngineError::CollaboratorUnavailable(unavailable.to_string()))
            }
        }
    }

    /// Write executor outputs to the bus, checking declared socket schemas.
    fn publish_outputs(
        &self,
        node: &NodeDefinition,
        outputs: Vec<(String, Value)>,
        frame: &mut ExecutionFrame,
    ) -> Option<ExecutionFailure> {
        for (socket_id, value) in outputs {
            let Some(socket) = node.output(&socket_id) else {
                return Some(ExecutionFailure::runtime(
                    node.id,
                    format!("executor produced undeclared socket '{}'", socket_id),
                ));
            };
            if !socket.ty.admits(&value) {
                return Some(ExecutionFailure::type_mismatch(
                    node.id,
                    format!(
                        "socket '{}' declares {} but produced {}",
                        socket_id,
                        socket.ty,
                        value.socket_type()
                    ),
                ));
            }
            if let Err(err) = frame.write(SocketRef::new(node.id, socket_id), value) {
                return Some(ExecutionFailure::runtime(node.id, err.to_string()));
            }
        }
        None
    }

    /// Exactly one branch executes per pass; the unchosen branch's sockets
    /// stay unbound so its downstream consumers are skipped.
    async fn run_branch(
        &self,
        graph: &Graph,
        branch: &BranchUnit,
        registry: &ExecutorRegistry,
        frame: &mut ExecutionFrame,
        trace: &mut ExecutionTrace,
    ) -> StepResult {
        let condition = match frame.read(&branch.condition) {
            None => {
                trace.record(branch.node_id, NodeStatus::Skipped);
                self.event_tx.send_event(ExecutionEvent::node_skipped(
                    branch.node_id,
                    "condition is unbound",
                ));
                return Ok(None);
            }
            Some(value) => match value.as_bool() {
                Some(condition) => condition,
                None => {
                    trace.record(branch.node_id, NodeStatus::Failed);
                    return Ok(Some(ExecutionFailure::type_mismatch(
                        branch.node_id,
                        format!("condition resolved to {}, expected BOOLEAN", value.socket_type()),
                    )));
                }
            },
        };

        debug!(node_id = branch.node_id, condition, "branch evaluated");
        self.event_tx.send_event(ExecutionEvent::BranchEvaluated {
            node_id: branch.node_id,
            condition,
        });

        let chosen = if condition {
            &branch.then_plan
        } else {
            &branch.else_plan
        };
        let halted = self.run_plan(graph, chosen, registry, frame, trace).await?;
        if halted.is_some() {
            return Ok(halted);
        }

        trace.record(branch.node_id, NodeStatus::Completed);
        Ok(None)
    }

    /// Run a loop region: each iteration gets a fresh child scope seeded
    /// with the previous iteration's carried values. The mandatory bound
    /// turns a runaway predicate into a failure instead of an infinite run.
    async fn run_loop(
        &self,
        graph: &Graph,
        loop_unit: &LoopUnit,
        registry: &ExecutorRegistry,
        frame: &mut ExecutionFrame,
        trace: &mut ExecutionTrace,
    ) -> StepResult {
        let mut carry: BTreeMap<SocketRef, Value> = BTreeMap::new();
        let mut iterations: u32 = 0;

        loop {
            // while-style predicates are checked before entering the body.
            match &loop_unit.predicate {
                PlannedPredicate::Count(count) => {
                    if iterations >= *count {
                        break;
                    }
                }
                PlannedPredicate::Condition {
                    source,
                    post_check: false,
                } => match frame.read(source) {
                    None => {
                        trace.record(loop_unit.node_id, NodeStatus::Skipped);
                        self.event_tx.send_event(ExecutionEvent::node_skipped(
                            loop_unit.node_id,
                            "predicate is unbound",
                        ));
                        return Ok(None);
                    }
                    Some(value) => match value.as_bool() {
                        Some(true) => {}
                        Some(false) => break,
                        None => {
                            trace.record(loop_unit.node_id, NodeStatus::Failed);
                            return Ok(Some(ExecutionFailure::type_mismatch(
                                loop_unit.node_id,
                                format!(
                                    "predicate resolved to {}, expected BOOLEAN",
                                    value.socket_type()
                                ),
                            )));
                        }
                    },
                },
                PlannedPredicate::Condition {
                    post_check: true, ..
                } => {}
            }

            if iterations >= loop_unit.max_iterations {
                trace.record(loop_unit.node_id, NodeStatus::Failed);
                let failure = ExecutionFailure::new(
                    FailureKind::LoopBoundExceeded,
                    loop_unit.node_id,
                    format!(
                        "loop exceeded its {}-iteration bound",
                        loop_unit.max_iterations
                    ),
                );
                self.event_tx.send_event(ExecutionEvent::node_failed(
                    loop_unit.node_id,
                    failure.kind,
                    failure.message.clone(),
                ));
                return Ok(Some(failure));
            }

            self.event_tx.send_event(ExecutionEvent::LoopIterationStarted {
                node_id: loop_unit.node_id,
                iteration: iterations,
            });

            frame.push_scope(std::mem::take(&mut carry));
            let halted = self
                .run_plan(graph, &loop_unit.body, registry, frame, trace)
                .await?;
            if halted.is_some() {
                // The whole execution unwinds; no need to restore the frame.
                return Ok(halted);
            }

            // do-while predicates live inside the body: read them before the
            // iteration scope is discarded.
            let continue_loop = match &loop_unit.predicate {
                PlannedPredicate::Condition {
                    source,
                    post_check: true,
                } => match frame.read(source).map(Value::as_bool) {
                    Some(Some(keep_going)) => keep_going,
                    _ => {
                        trace.record(loop_unit.node_id, NodeStatus::Failed);
                        return Ok(Some(ExecutionFailure::type_mismatch(
                            loop_unit.node_id,
                            "body did not produce a BOOLEAN predicate this iteration",
                        )));
                    }
                },
                _ => true,
            };

            carry = loop_unit
                .carried
                .iter()
                .filter_map(|socket| frame.read(socket).map(|v| (socket.clone(), v.clone())))
                .collect();
            frame.pop_scope();
            iterations += 1;

            if !continue_loop {
                break;
            }
        }

        self.event_tx.send_event(ExecutionEvent::LoopCompleted {
            node_id: loop_unit.node_id,
            iterations,
        });

        // Export the final carried values so downstream consumers see them.
        for (socket, value) in carry {
            if let Err(err) = frame.write(socket, value) {
                trace.record(loop_unit.node_id, NodeStatus::Failed);
                return Ok(Some(ExecutionFailure::runtime(
                    loop_unit.node_id,
                    err.to_string(),
                )));
            }
        }

        trace.record(loop_unit.node_id, NodeStatus::Completed);
        Ok(None)
    }
}
