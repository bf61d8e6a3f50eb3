// Control-Flow Resolver
// Expands a validated graph into a concrete, deterministic execution plan

use crate::definition::{NodeConfig, NodeId, SocketRef, CONDITION_SOCKET, PREDICATE_SOCKET};
use crate::graph::Graph;

/// Ordered execution units for one graph (or one control-flow region).
///
/// The order is a pure function of the graph: topological over data
/// dependencies, with definition order breaking ties between independent
/// siblings. Runtime branch/loop decisions are the only other input to the
/// realized execution order.
#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub units: Vec<ExecutionUnit>,
}

#[derive(Debug, Clone)]
pub enum ExecutionUnit {
    /// A single non-control-flow node.
    Node(NodeId),
    /// An IF_ELSE region; exactly one sub-plan runs per pass.
    Branch(BranchUnit),
    /// A LOOP region; the body sub-plan runs once per iteration.
    Loop(LoopUnit),
}

#[derive(Debug, Clone)]
pub struct BranchUnit {
    pub node_id: NodeId,
    /// Producer socket feeding the condition.
    pub condition: SocketRef,
    pub then_plan: ExecutionPlan,
    pub else_plan: ExecutionPlan,
}

#[derive(Debug, Clone)]
pub struct LoopUnit {
    pub node_id: NodeId,
    pub predicate: PlannedPredicate,
    pub max_iterations: u32,
    /// Producer sockets whose values carry across iterations and are
    /// exported on normal termination.
    pub carried: Vec<SocketRef>,
    pub body: ExecutionPlan,
}

#[derive(Debug, Clone)]
pub enum PlannedPredicate {
    /// Run the body exactly `count` times.
    Count(u32),
    /// Re-evaluate the producer socket each iteration. `post_check` is set
    /// when the producer lives inside the body (the loop back-edge): its
    /// first value only exists after one body pass, so the loop runs
    /// do-while style.
    Condition { source: SocketRef, post_check: bool },
}

impl ExecutionPlan {
    /// Resolve the execution plan of a validated graph.
    pub fn from_graph(graph: &Graph) -> Self {
        Self::for_members(graph, &graph.top_level_members())
    }

    fn for_members(graph: &Graph, members: &[NodeId]) -> Self {
        let mut units = Vec::with_capacity(members.len());

        for node_id in graph.layer_order(members) {
            let Some(node) = graph.node(node_id) else {
                continue;
            };

            match &node.config {
                NodeConfig::IfElse {
                    then_nodes,
                    else_nodes,
                } => {
                    // Validation guarantees the condition socket is fed.
                    let Some(edge) = graph.incoming(node_id, CONDITION_SOCKET) else {
                        debug_assert!(false, "unfed condition socket survived validation");
                        continue;
                    };
                    units.push(ExecutionUnit::Branch(BranchUnit {
                        node_id,
                        condition: edge.from_ref(),
                        then_plan: Self::for_members(graph, then_nodes),
                        else_plan: Self::for_members(graph, else_nodes),
                    }));
                }
                NodeConfig::Loop {
                    predicate,
                    max_iterations,
                    body_nodes,
                    carried,
                } => {
                    let planned = match predicate {
                        crate::definition::LoopPredicate::Count { count } => {
                            PlannedPredicate::Count(*count)
                        }
                        crate::definition::LoopPredicate::Condition => {
                            let Some(edge) = graph.incoming(node_id, PREDICATE_SOCKET) else {
                                debug_assert!(false, "unfed predicate socket survived validation");
                                continue;
                            };
                            PlannedPredicate::Condition {
                                source: edge.from_ref(),
                                post_check: graph.is_back_edge(edge.id),
                            }
                        }
                    };
                    units.push(ExecutionUnit::Loop(LoopUnit {
                        node_id,
                        predicate: planned,
                        max_iterations: *max_iterations,
                        carried: carried.clone(),
                        body: Self::for_members(graph, body_nodes),
                    }));
                }
                _ => units.push(ExecutionUnit::Node(node_id)),
            }
        }

        Self { units }
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{
        EdgeDefinition, LoopPredicate, NodeDefinition, SocketDefinition, TestcaseDefinition,
    };
    use crate::value::{SocketType, Value};

    fn node_ids(plan: &ExecutionPlan) -> Vec<NodeId> {
        plan.units
            .iter()
            .map(|unit| match unit {
                ExecutionUnit::Node(id) => *id,
                ExecutionUnit::Branch(branch) => branch.node_id,
                ExecutionUnit::Loop(l) => l.node_id,
            })
            .collect()
    }

    fn input_node(id: NodeId, sockets: Vec<SocketDefinition>) -> NodeDefinition {
        NodeDefinition {
            id,
            inputs: Vec::new(),
            outputs: sockets,
            config: NodeConfig::Input,
        }
    }

    fn output_node(id: NodeId, sockets: Vec<SocketDefinition>) -> NodeDefinition {
        NodeDefinition {
            id,
            inputs: sockets,
            outputs: Vec::new(),
            config: NodeConfig::Output,
        }
    }

    fn string_match_node(id: NodeId) -> NodeDefinition {
        NodeDefinition {
            id,
            inputs: vec![
                SocketDefinition::new("left", SocketType::Any),
                SocketDefinition::new("right", SocketType::Any),
            ],
            outputs: vec![SocketDefinition::new("matched", SocketType::Boolean)],
            config: NodeConfig::StringMatch,
        }
    }

    #[test]
    fn test_linear_plan_is_flat_and_ordered() {
        let definition = TestcaseDefinition {
            id: 1,
            nodes: vec![
                input_node(
                    1,
                    vec![
                        SocketDefinition::new("a", SocketType::Any).with_data(Value::Int(1)),
                        SocketDefinition::new("b", SocketType::Any).with_data(Value::Int(1)),
                    ],
                ),
                string_match_node(2),
                output_node(3, vec![SocketDefinition::new("ok", SocketType::Boolean)]),
            ],
            edges: vec![
                EdgeDefinition::new(1, (1, "a"), (2, "left")),
                EdgeDefinition::new(2, (1, "b"), (2, "right")),
                EdgeDefinition::new(3, (2, "matched"), (3, "ok")),
            ],
        };

        let graph = Graph::from_definition(&definition).unwrap();
        let plan = ExecutionPlan::from_graph(&graph);
        assert_eq!(node_ids(&plan), vec![1, 2, 3]);
        assert!(plan
            .units
            .iter()
            .all(|u| matches!(u, ExecutionUnit::Node(_))));
    }

    #[test]
    fn test_branch_members_leave_the_top_level() {
        let definition = TestcaseDefinition {
            id: 1,
            nodes: vec![
                input_node(
                    1,
                    vec![
                        SocketDefinition::new("cond", SocketType::Boolean)
                            .with_data(Value::Bool(true)),
                        SocketDefinition::new("a", SocketType::Any).with_data(Value::Int(1)),
                        SocketDefinition::new("b", SocketType::Any).with_data(Value::Int(1)),
                    ],
                ),
                NodeDefinition {
                    id: 2,
                    inputs: vec![SocketDefinition::new(CONDITION_SOCKET, SocketType::Boolean)],
                    outputs: Vec::new(),
                    config: NodeConfig::IfElse {
                        then_nodes: vec![3],
                        else_nodes: vec![],
                    },
                },
                string_match_node(3),
                output_node(4, vec![SocketDefinition::new("ok", SocketType::Boolean)]),
            ],
            edges: vec![
                EdgeDefinition::new(1, (1, "cond"), (2, CONDITION_SOCKET)),
                EdgeDefinition::new(2, (1, "a"), (3, "left")),
                EdgeDefinition::new(3, (1, "b"), (3, "right")),
                EdgeDefinition::new(4, (3, "matched"), (4, "ok")),
            ],
        };

        let graph = Graph::from_definition(&definition).unwrap();
        let plan = ExecutionPlan::from_graph(&graph);
        assert_eq!(node_ids(&plan), vec![1, 2, 4]);

        let ExecutionUnit::Branch(branch) = &plan.units[1] else {
            panic!("expected a branch unit");
        };
        assert_eq!(branch.condition, SocketRef::new(1, "cond"));
        assert_eq!(node_ids(&branch.then_plan), vec![3]);
        assert!(branch.else_plan.is_empty());
    }

    #[test]
    fn test_loop_back_edge_predicate_is_post_checked() {
        let definition = TestcaseDefinition {
            id: 1,
            nodes: vec![
                input_node(
                    1,
                    vec![
                        SocketDefinition::new("a", SocketType::Any).with_data(Value::Int(1)),
                        SocketDefinition::new("b", SocketType::Any).with_data(Value::Int(1)),
                    ],
                ),
                NodeDefinition {
                    id: 2,
                    inputs: vec![SocketDefinition::new(PREDICATE_SOCKET, SocketType::Boolean)],
                    outputs: Vec::new(),
                    config: NodeConfig::Loop {
                        predicate: LoopPredicate::Condition,
                        max_iterations: 5,
                        body_nodes: vec![3],
                        carried: vec![SocketRef::new(3, "matched")],
                    },
                },
                string_match_node(3),
                output_node(4, vec![SocketDefinition::new("ok", SocketType::Boolean)]),
            ],
            edges: vec![
                EdgeDefinition::new(1, (1, "a"), (3, "left")),
                EdgeDefinition::new(2, (1, "b"), (3, "right")),
                EdgeDefinition::new(3, (3, "matched"), (2, PREDICATE_SOCKET)),
                EdgeDefinition::new(4, (3, "matched"), (4, "ok")),
            ],
        };

        let graph = Graph::from_definition(&definition).unwrap();
        assert!(graph.is_back_edge(3));

        let plan = ExecutionPlan::from_graph(&graph);
        assert_eq!(node_ids(&plan), vec![1, 2, 4]);

        let ExecutionUnit::Loop(loop_unit) = &plan.units[1] else {
            panic!("expected a loop unit");
        };
        assert_eq!(loop_unit.max_iterations, 5);
        assert_eq!(node_ids(&loop_unit.body), vec![3]);
        match &loop_unit.predicate {
            PlannedPredicate::Condition { source, post_check } => {
                assert_eq!(*source, SocketRef::new(3, "matched"));
                assert!(*post_check);
            }
            other => panic!("wrong predicate: {:?}", other),
        }
    }
}
