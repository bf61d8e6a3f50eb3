// Graph Model & Validator
// Builds a validated, indexed graph from a test-case definition

use crate::definition::{
    EdgeDefinition, LoopPredicate, NodeConfig, NodeDefinition, NodeId, NodeKind, SocketRef,
    TestcaseDefinition, ValidationError, ValidationErrorKind, ARG_SOCKET_PREFIX, CONDITION_SOCKET,
    FILE_SOCKET, KWARG_SOCKET_PREFIX, PREDICATE_SOCKET,
};
use crate::value::SocketType;

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet, VecDeque};

/// A validated test-case graph.
///
/// Construction runs every structural and type check; once a `Graph` exists
/// the resolver and executor can assume the invariants hold. The definition
/// itself is treated as read-only configuration.
#[derive(Debug, Clone)]
pub struct Graph {
    nodes: Vec<NodeDefinition>,
    node_index: HashMap<NodeId, usize>,
    in_edges: HashMap<NodeId, Vec<EdgeDefinition>>,
    out_edges: HashMap<NodeId, Vec<EdgeDefinition>>,
    /// Direct owner of each control-flow region member.
    region_owner: HashMap<NodeId, NodeId>,
    /// Edges feeding a LOOP predicate socket from inside that loop's body.
    back_edge_ids: HashSet<i64>,
}

impl Graph {
    /// Validate a test-case definition.
    ///
    /// Checks, in order: unique ids and per-kind socket schemas, region
    /// well-formedness, edge endpoint existence, socket directions, single
    /// feed per IN socket, type compatibility, acyclicity of the non-loop
    /// scheduling structure, and reachability. Fails fast with the first
    /// violated invariant; never partially succeeds.
    pub fn from_definition(definition: &TestcaseDefinition) -> Result<Self, ValidationError> {
        let mut node_index = HashMap::new();
        for (i, node) in definition.nodes.iter().enumerate() {
            if node_index.insert(node.id, i).is_some() {
                return Err(ValidationError::for_node(
                    ValidationErrorKind::DuplicateId,
                    node.id,
                    format!("node id {} appears more than once", node.id),
                ));
            }
        }

        for node in &definition.nodes {
            check_node_schema(node)?;
        }

        let region_owner = build_region_ownership(&definition.nodes, &node_index)?;

        let graph = Self {
            nodes: definition.nodes.clone(),
            node_index,
            in_edges: HashMap::new(),
            out_edges: HashMap::new(),
            region_owner,
            back_edge_ids: HashSet::new(),
        };
        let graph = graph.index_edges(&definition.edges)?;

        graph.check_sockets_fed()?;
        graph.check_carried_sockets()?;
        graph.check_acyclic()?;
        graph.check_reachability()?;

        Ok(graph)
    }

    /// Index edges, checking endpoint existence, directions, single feed and
    /// type compatibility along the way.
    fn index_edges(mut self, edges: &[EdgeDefinition]) -> Result<Self, ValidationError> {
        let mut fed: HashSet<SocketRef> = HashSet::new();

        for edge in edges {
            let from_node = self.node(edge.from_node_id).ok_or_else(|| {
                ValidationError::for_edge(
                    ValidationErrorKind::UnknownReference,
                    edge.id,
                    format!("edge references unknown node {}", edge.from_node_id),
                )
            })?;
            let to_node = self.node(edge.to_node_id).ok_or_else(|| {
                ValidationError::for_edge(
                    ValidationErrorKind::UnknownReference,
                    edge.id,
                    format!("edge references unknown node {}", edge.to_node_id),
                )
            })?;

            // Direction: producer must be an OUT socket, consumer an IN socket.
            let from_socket = match from_node.output(&edge.from_socket_id) {
                Some(socket) => socket,
                None if from_node.input(&edge.from_socket_id).is_some() => {
                    return Err(ValidationError::for_edge(
                        ValidationErrorKind::DirectionMismatch,
                        edge.id,
                        format!(
                            "socket {}.{} is an IN socket and cannot produce",
                            edge.from_node_id, edge.from_socket_id
                        ),
                    ));
                }
                None => {
                    return Err(ValidationError::for_edge(
                        ValidationErrorKind::UnknownReference,
                        edge.id,
                        format!(
                            "edge references unknown socket {}.{}",
                            edge.from_node_id, edge.from_socket_id
                        ),
                    ));
                }
            };
            let to_socket = match to_node.input(&edge.to_socket_id) {
                Some(socket) => socket,
                None if to_node.output(&edge.to_socket_id).is_some() => {
                    return Err(ValidationError::for_edge(
                        ValidationErrorKind::DirectionMismatch,
                        edge.id,
                        format!(
                            "socket {}.{} is an OUT socket and cannot consume",
                            edge.to_node_id, edge.to_socket_id
                        ),
                    ));
                }
                None => {
                    return Err(ValidationError::for_edge(
                        ValidationErrorKind::UnknownReference,
                        edge.id,
                        format!(
                            "edge references unknown socket {}.{}",
                            edge.to_node_id, edge.to_socket_id
                        ),
                    ));
                }
            };

            if !fed.insert(edge.to_ref()) {
                return Err(ValidationError::for_edge(
                    ValidationErrorKind::SocketFeed,
                    edge.id,
                    format!(
                        "IN socket {}.{} is fed by more than one edge",
                        edge.to_node_id, edge.to_socket_id
                    ),
                ));
            }

            let produced = match edge.coercion {
                None => from_socket.ty,
                Some(coercion) => coercion.output_type(from_socket.ty).ok_or_else(|| {
                    ValidationError::for_edge(
                        ValidationErrorKind::IncompatibleTypes,
                        edge.id,
                        format!("coercion {:?} does not apply to {}", coercion, from_socket.ty),
                    )
                })?,
            };
            if !to_socket.ty.accepts(produced) {
                return Err(ValidationError::for_edge(
                    ValidationErrorKind::IncompatibleTypes,
                    edge.id,
                    format!("{} cannot flow into {}", produced, to_socket.ty),
                ));
            }

            if self.is_loop_back_edge(edge) {
                self.back_edge_ids.insert(edge.id);
            }

            self.out_edges
                .entry(edge.from_node_id)
                .or_default()
                .push(edge.clone());
            self.in_edges
                .entry(edge.to_node_id)
                .or_default()
                .push(edge.clone());
        }

        Ok(self)
    }

    /// An edge is a loop back-edge when it feeds a LOOP predicate socket from
    /// inside that loop's own body. Back-edges carry the re-evaluated
    /// predicate and are excluded from the scheduling structure.
    fn is_loop_back_edge(&self, edge: &EdgeDefinition) -> bool {
        let Some(to_node) = self.node(edge.to_node_id) else {
            return false;
        };
        let is_condition_loop = matches!(
            to_node.config,
            NodeConfig::Loop {
                predicate: LoopPredicate::Condition,
                ..
            }
        );
        is_condition_loop
            && edge.to_socket_id == PREDICATE_SOCKET
            && self.is_within(edge.from_node_id, edge.to_node_id)
    }

    /// Every declared IN socket must be fed by exactly one edge; "at most
    /// one" is enforced during indexing, "at least one" here.
    fn check_sockets_fed(&self) -> Result<(), ValidationError> {
        for node in &self.nodes {
            for socket in &node.inputs {
                let connected = self
                    .in_edges(node.id)
                    .iter()
                    .any(|e| e.to_socket_id == socket.id);
                if !connected {
                    return Err(ValidationError::for_node(
                        ValidationErrorKind::SocketFeed,
                        node.id,
                        format!("IN socket {}.{} is not connected", node.id, socket.id),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Carried sockets of a LOOP must be OUT sockets of that loop's own body.
    fn check_carried_sockets(&self) -> Result<(), ValidationError> {
        for node in &self.nodes {
            let NodeConfig::Loop { carried, .. } = &node.config else {
                continue;
            };
            for socket_ref in carried {
                let owner_ok = self.is_within(socket_ref.node, node.id);
                let socket_ok = self
                    .node(socket_ref.node)
                    .and_then(|n| n.output(&socket_ref.socket))
                    .is_some();
                if !owner_ok || !socket_ok {
                    return Err(ValidationError::for_node(
                        ValidationErrorKind::InvalidRegion,
                        node.id,
                        format!(
                            "carried socket {} is not an OUT socket of loop {}'s body",
                            socket_ref, node.id
                        ),
                    ));
                }
            }
        }
        Ok(())
    }

    /// The scheduling structure must be acyclic: contract every region into
    /// its owning node and require a topological order at every layer
    /// (top level, each branch arm, each loop body), ignoring back-edges.
    fn check_acyclic(&self) -> Result<(), ValidationError> {
        let mut layers: Vec<Vec<NodeId>> = vec![self.top_level_members()];
        for node in &self.nodes {
            match &node.config {
                NodeConfig::IfElse {
                    then_nodes,
                    else_nodes,
                } => {
                    layers.push(then_nodes.clone());
                    layers.push(else_nodes.clone());
                }
                NodeConfig::Loop { body_nodes, .. } => layers.push(body_nodes.clone()),
                _ => {}
            }
        }

        for members in layers {
            let (order, stuck) = self.layer_order_inner(&members);
            if order.len() != members.len() {
                let offender = stuck.unwrap_or_else(|| members.first().copied().unwrap_or(0));
                return Err(ValidationError::for_node(
                    ValidationErrorKind::CyclicDependency,
                    offender,
                    format!("circular dependency involving node {}", offender),
                ));
            }
        }
        Ok(())
    }

    /// Every non-control-flow node must be reachable from an INPUT node and
    /// reach an OUTPUT node. Control-flow nodes act as pass-through barriers:
    /// reaching a region owner or any member reaches the whole region, which
    /// the traversal models with owner<->member links.
    fn check_reachability(&self) -> Result<(), ValidationError> {
        let mut forward: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let mut reverse: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
        let link = |a: NodeId, b: NodeId, fwd: &mut HashMap<NodeId, Vec<NodeId>>,
                    rev: &mut HashMap<NodeId, Vec<NodeId>>| {
            fwd.entry(a).or_default().push(b);
            rev.entry(b).or_default().push(a);
        };

        for edges in self.out_edges.values() {
            for edge in edges {
                link(edge.from_node_id, edge.to_node_id, &mut forward, &mut reverse);
            }
        }
        for (&member, &owner) in &self.region_owner {
            link(owner, member, &mut forward, &mut reverse);
            link(member, owner, &mut forward, &mut reverse);
        }

        let bfs = |seeds: Vec<NodeId>, adj: &HashMap<NodeId, Vec<NodeId>>| -> HashSet<NodeId> {
            let mut seen: HashSet<NodeId> = seeds.iter().copied().collect();
            let mut queue: VecDeque<NodeId> = seeds.into();
            while let Some(id) = queue.pop_front() {
                for &next in adj.get(&id).map(Vec::as_slice).unwrap_or_default() {
                    if seen.insert(next) {
                        queue.push_back(next);
                    }
                }
            }
            seen
        };

        let inputs: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.kind() == NodeKind::Input)
            .map(|n| n.id)
            .collect();
        let outputs: Vec<NodeId> = self
            .nodes
            .iter()
            .filter(|n| n.kind() == NodeKind::Output)
            .map(|n| n.id)
            .collect();

        let from_input = bfs(inputs, &forward);
        let to_output = bfs(outputs, &reverse);

        for node in &self.nodes {
            if node.kind().is_control_flow() {
                continue;
            }
            if !from_input.contains(&node.id) {
                return Err(ValidationError::for_node(
                    ValidationErrorKind::Unreachable,
                    node.id,
                    format!("node {} is not reachable from any INPUT node", node.id),
                ));
            }
            if !to_output.contains(&node.id) {
                return Err(ValidationError::for_node(
                    ValidationErrorKind::Unreachable,
                    node.id,
                    format!("node {} cannot reach any OUTPUT node", node.id),
                ));
            }
        }
        Ok(())
    }

    pub fn node(&self, id: NodeId) -> Option<&NodeDefinition> {
        self.node_index.get(&id).map(|&i| &self.nodes[i])
    }

    pub fn nodes(&self) -> &[NodeDefinition] {
        &self.nodes
    }

    /// Incoming edges of a node, in definition order.
    pub fn in_edges(&self, id: NodeId) -> &[EdgeDefinition] {
        self.in_edges.get(&id).map(Vec::as_slice).unwrap_or_default()
    }

    /// The single edge feeding an IN socket, if any.
    pub fn incoming(&self, id: NodeId, socket_id: &str) -> Option<&EdgeDefinition> {
        self.in_edges(id).iter().find(|e| e.to_socket_id == socket_id)
    }

    /// Direct owner of a region member.
    pub fn region_owner(&self, id: NodeId) -> Option<NodeId> {
        self.region_owner.get(&id).copied()
    }

    pub fn is_back_edge(&self, edge_id: i64) -> bool {
        self.back_edge_ids.contains(&edge_id)
    }

    /// Whether `node` lies (transitively) inside the region owned by `owner`.
    pub fn is_within(&self, node: NodeId, owner: NodeId) -> bool {
        let mut current = node;
        // Ownership chains are acyclic by construction; the bound is a guard
        // against malformed maps.
        for _ in 0..self.nodes.len() {
            match self.region_owner.get(&current) {
                Some(&direct) if direct == owner => return true,
                Some(&direct) => current = direct,
                None => return false,
            }
        }
        false
    }

    /// Nodes not owned by any region, in definition order.
    pub fn top_level_members(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| !self.region_owner.contains_key(&n.id))
            .map(|n| n.id)
            .collect()
    }

    /// Deterministic execution order of one layer: topological over the
    /// contracted dependency structure, siblings tie-broken by definition
    /// order. Validation has already rejected cycles, so every member is
    /// returned.
    pub fn layer_order(&self, members: &[NodeId]) -> Vec<NodeId> {
        let (order, _) = self.layer_order_inner(members);
        debug_assert_eq!(order.len(), members.len());
        order
    }

    fn layer_order_inner(&self, members: &[NodeId]) -> (Vec<NodeId>, Option<NodeId>) {
        let member_set: HashSet<NodeId> = members.iter().copied().collect();

        // Representative of a node within this layer: itself, or the
        // outermost region owner that is a layer member.
        let rep = |mut id: NodeId| -> Option<NodeId> {
            for _ in 0..=self.nodes.len() {
                if member_set.contains(&id) {
                    return Some(id);
                }
                id = *self.region_owner.get(&id)?;
            }
            None
        };

        let mut in_degree: HashMap<NodeId, usize> =
            members.iter().map(|&id| (id, 0)).collect();
        let mut adjacent: HashMap<NodeId, Vec<NodeId>> = HashMap::new();

        for edges in self.out_edges.values() {
            for edge in edges {
                if self.back_edge_ids.contains(&edge.id) {
                    continue;
                }
                let (Some(a), Some(b)) = (rep(edge.from_node_id), rep(edge.to_node_id)) else {
                    continue;
                };
                if a == b {
                    continue;
                }
                adjacent.entry(a).or_default().push(b);
                *in_degree.entry(b).or_insert(0) += 1;
            }
        }

        let decl_index = |id: NodeId| self.node_index.get(&id).copied().unwrap_or(usize::MAX);

        let mut ready: BinaryHeap<Reverse<(usize, NodeId)>> = in_degree
            .iter()
            .filter(|(_, &deg)| deg == 0)
            .map(|(&id, _)| Reverse((decl_index(id), id)))
            .collect();

        let mut order = Vec::with_capacity(members.len());
        while let Some(Reverse((_, id))) = ready.pop() {
            order.push(id);
            for &next in adjacent.get(&id).map(Vec::as_slice).unwrap_or_default() {
                if let Some(deg) = in_degree.get_mut(&next) {
                    *deg -= 1;
                    if *deg == 0 {
                        ready.push(Reverse((decl_index(next), next)));
                    }
                }
            }
        }

        let stuck = members
            .iter()
            .copied()
            .find(|id| in_degree.get(id).is_some_and(|&d| d > 0));
        (order, stuck)
    }
}

/// Per-kind socket schema checks: a node's kind fixes which sockets and
/// configuration are legal.
fn check_node_schema(node: &NodeDefinition) -> Result<(), ValidationError> {
    let mut socket_ids = HashSet::new();
    for socket in node.inputs.iter().chain(node.outputs.iter()) {
        if !socket_ids.insert(socket.id.as_str()) {
            return Err(ValidationError::for_node(
                ValidationErrorKind::DuplicateId,
                node.id,
                format!("socket id '{}' appears more than once on node {}", socket.id, node.id),
            ));
        }
    }

    let invalid = |message: String| {
        Err(ValidationError::for_node(
            ValidationErrorKind::InvalidConfig,
            node.id,
            message,
        ))
    };

    match &node.config {
        NodeConfig::Input => {
            if !node.inputs.is_empty() {
                return invalid(format!("INPUT node {} cannot declare input sockets", node.id));
            }
            if node.outputs.is_empty() {
                return invalid(format!("INPUT node {} must declare at least one output", node.id));
            }
        }
        NodeConfig::Output => {
            if node.inputs.is_empty() {
                return invalid(format!("OUTPUT node {} must declare at least one input", node.id));
            }
            if !node.outputs.is_empty() {
                return invalid(format!("OUTPUT node {} cannot declare output sockets", node.id));
            }
        }
        NodeConfig::RunFunction { .. } => {
            match node.input(FILE_SOCKET) {
                Some(socket)
                    if matches!(socket.ty, SocketType::File | SocketType::Any) => {}
                Some(_) => {
                    return invalid(format!(
                        "RUN_FUNCTION node {} socket '{}' must be FILE-typed",
                        node.id, FILE_SOCKET
                    ));
                }
                None => {
                    return invalid(format!(
                        "RUN_FUNCTION node {} must declare a '{}' input",
                        node.id, FILE_SOCKET
                    ));
                }
            }
            if node.outputs.is_empty() {
                return invalid(format!(
                    "RUN_FUNCTION node {} must declare a return output",
                    node.id
                ));
            }
            // Argument routing is by socket name; anything else would be
            // silently dropped at dispatch time.
            for socket in &node.inputs {
                let recognised = socket.id == FILE_SOCKET
                    || socket.id.starts_with(ARG_SOCKET_PREFIX)
                    || socket.id.starts_with(KWARG_SOCKET_PREFIX);
                if !recognised {
                    return invalid(format!(
                        "RUN_FUNCTION node {} socket '{}' must be '{}', '{}<n>' or '{}<name>'",
                        node.id, socket.id, FILE_SOCKET, ARG_SOCKET_PREFIX, KWARG_SOCKET_PREFIX
                    ));
                }
            }
        }
        NodeConfig::StringMatch | NodeConfig::Compare { .. } => {
            if node.inputs.len() != 2 {
                return invalid(format!(
                    "comparison node {} must declare exactly two inputs",
                    node.id
                ));
            }
            match node.outputs.as_slice() {
                [socket] if matches!(socket.ty, SocketType::Boolean | SocketType::Any) => {}
                _ => {
                    return invalid(format!(
                        "comparison node {} must declare exactly one BOOLEAN output",
                        node.id
                    ));
                }
            }
        }
        NodeConfig::IfElse { .. } => {
            match node.input(CONDITION_SOCKET) {
                Some(socket)
                    if matches!(socket.ty, SocketType::Boolean | SocketType::Any) => {}
                _ => {
                    return invalid(format!(
                        "IF_ELSE node {} must declare a BOOLEAN '{}' input",
                        node.id, CONDITION_SOCKET
                    ));
                }
            }
        }
        NodeConfig::Loop {
            predicate,
            max_iterations,
            ..
        } => {
            if *max_iterations == 0 {
                return invalid(format!(
                    "LOOP node {} must declare max_iterations >= 1",
                    node.id
                ));
            }
            if *predicate == LoopPredicate::Condition {
                match node.input(PREDICATE_SOCKET) {
                    Some(socket)
                        if matches!(socket.ty, SocketType::Boolean | SocketType::Any) => {}
                    _ => {
                        return invalid(format!(
                            "LOOP node {} must declare a BOOLEAN '{}' input",
                            node.id, PREDICATE_SOCKET
                        ));
                    }
                }
            }
        }
    }
    Ok(())
}

/// Build the member -> owner map for every control-flow region, rejecting
/// unknown members, overlapping regions and ownership cycles.
fn build_region_ownership(
    nodes: &[NodeDefinition],
    node_index: &HashMap<NodeId, usize>,
) -> Result<HashMap<NodeId, NodeId>, ValidationError> {
    let mut region_owner: HashMap<NodeId, NodeId> = HashMap::new();

    for node in nodes {
        for member in node.region_members() {
            if !node_index.contains_key(&member) {
                return Err(ValidationError::for_node(
                    ValidationErrorKind::UnknownReference,
                    node.id,
                    format!("region of node {} references unknown node {}", node.id, member),
                ));
            }
            if member == node.id {
                return Err(ValidationError::for_node(
                    ValidationErrorKind::InvalidRegion,
                    node.id,
                    format!("node {} cannot be a member of its own region", node.id),
                ));
            }
            if region_owner.insert(member, node.id).is_some() {
                return Err(ValidationError::for_node(
                    ValidationErrorKind::InvalidRegion,
                    member,
                    format!("node {} belongs to more than one control-flow region", member),
                ));
            }
        }
    }

    // Ownership must form a forest.
    for &start in region_owner.keys() {
        let mut current = start;
        let mut steps = 0;
        while let Some(&owner) = region_owner.get(&current) {
            steps += 1;
            if steps > nodes.len() {
                return Err(ValidationError::for_node(
                    ValidationErrorKind::InvalidRegion,
                    start,
                    format!("control-flow regions around node {} form a cycle", start),
                ));
            }
            current = owner;
        }
    }

    Ok(region_owner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::{CompareOp, SocketDefinition};
    use crate::value::{EdgeCoercion, Value};

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

    fn testcase(nodes: Vec<NodeDefinition>, edges: Vec<EdgeDefinition>) -> TestcaseDefinition {
        TestcaseDefinition { id: 1, nodes, edges }
    }

    fn linear_testcase() -> TestcaseDefinition {
        testcase(
            vec![
                input_node(
                    1,
                    vec![
                        SocketDefinition::new("actual", SocketType::String)
                            .with_data(Value::Str("a".to_string())),
                        SocketDefinition::new("expected", SocketType::String)
                            .with_data(Value::Str("a".to_string())),
                    ],
                ),
                string_match_node(2),
                output_node(3, vec![SocketDefinition::new("ok", SocketType::Boolean)]),
            ],
            vec![
                EdgeDefinition::new(1, (1, "actual"), (2, "left")),
                EdgeDefinition::new(2, (1, "expected"), (2, "right")),
                EdgeDefinition::new(3, (2, "matched"), (3, "ok")),
            ],
        )
    }

    #[test]
    fn test_valid_linear_graph() {
        let graph = Graph::from_definition(&linear_testcase()).unwrap();
        assert_eq!(graph.nodes().len(), 3);
        assert_eq!(graph.layer_order(&graph.top_level_members()), vec![1, 2, 3]);
    }

    #[test]
    fn test_validation_is_deterministic() {
        let definition = linear_testcase();
        let a = Graph::from_definition(&definition).map(|g| g.top_level_members());
        let b = Graph::from_definition(&definition).map(|g| g.top_level_members());
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_duplicate_node_id_rejected() {
        let mut definition = linear_testcase();
        definition.nodes.push(input_node(
            1,
            vec![SocketDefinition::new("x", SocketType::Integer).with_data(Value::Int(1))],
        ));
        let err = Graph::from_definition(&definition).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::DuplicateId);
    }

    #[test]
    fn test_unknown_socket_rejected() {
        let mut definition = linear_testcase();
        definition.edges[0].from_socket_id = "missing".to_string();
        let err = Graph::from_definition(&definition).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::UnknownReference);
        assert_eq!(err.edge_id, Some(1));
    }

    #[test]
    fn test_direction_mismatch_rejected() {
        let mut definition = linear_testcase();
        // Try to produce from the comparison node's IN socket.
        definition.edges[2].from_socket_id = "left".to_string();
        let err = Graph::from_definition(&definition).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::DirectionMismatch);
    }

    #[test]
    fn test_double_fed_socket_rejected() {
        let mut definition = linear_testcase();
        definition
            .edges
            .push(EdgeDefinition::new(4, (1, "expected"), (2, "left")));
        let err = Graph::from_definition(&definition).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::SocketFeed);
        assert_eq!(err.edge_id, Some(4));
    }

    #[test]
    fn test_unconnected_socket_rejected() {
        let mut definition = linear_testcase();
        definition.edges.remove(1);
        let err = Graph::from_definition(&definition).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::SocketFeed);
        assert_eq!(err.node_id, Some(2));
    }

    #[test]
    fn test_incompatible_types_rejected() {
        let mut definition = linear_testcase();
        definition.nodes[2].inputs[0].ty = SocketType::Integer;
        let err = Graph::from_definition(&definition).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::IncompatibleTypes);
    }

    #[test]
    fn test_declared_coercion_accepted() {
        let mut definition = linear_testcase();
        definition.nodes[0].outputs[0].ty = SocketType::Boolean;
        definition.nodes[0].outputs[0].data = Some(Value::Bool(true));
        definition.edges[0].coercion = Some(EdgeCoercion::ToString);
        definition.nodes[1].inputs[0].ty = SocketType::String;
        assert!(Graph::from_definition(&definition).is_ok());
    }

    #[test]
    fn test_integer_widens_into_float() {
        let definition = testcase(
            vec![
                input_node(
                    1,
                    vec![
                        SocketDefinition::new("x", SocketType::Integer).with_data(Value::Int(1)),
                        SocketDefinition::new("y", SocketType::Float)
                            .with_data(Value::Float(1.0)),
                    ],
                ),
                NodeDefinition {
                    id: 2,
                    inputs: vec![
                        SocketDefinition::new("left", SocketType::Float),
                        SocketDefinition::new("right", SocketType::Float),
                    ],
                    outputs: vec![SocketDefinition::new("result", SocketType::Boolean)],
                    config: NodeConfig::Compare {
                        operator: CompareOp::Equal,
                        tolerance: None,
                    },
                },
                output_node(3, vec![SocketDefinition::new("ok", SocketType::Boolean)]),
            ],
            vec![
                EdgeDefinition::new(1, (1, "x"), (2, "left")),
                EdgeDefinition::new(2, (1, "y"), (2, "right")),
                EdgeDefinition::new(3, (2, "result"), (3, "ok")),
            ],
        );
        assert!(Graph::from_definition(&definition).is_ok());
    }

    #[test]
    fn test_cycle_rejected() {
        // Two comparison nodes feeding each other's inputs.
        let definition = testcase(
            vec![
                input_node(
                    1,
                    vec![SocketDefinition::new("x", SocketType::Any).with_data(Value::Int(1))],
                ),
                string_match_node(2),
                string_match_node(3),
                output_node(4, vec![SocketDefinition::new("ok", SocketType::Boolean)]),
            ],
            vec![
                EdgeDefinition::new(1, (1, "x"), (2, "left")),
                EdgeDefinition::new(2, (3, "matched"), (2, "right")),
                EdgeDefinition::new(3, (2, "matched"), (3, "left")),
                EdgeDefinition::new(4, (1, "x"), (3, "right")),
                EdgeDefinition::new(5, (3, "matched"), (4, "ok")),
            ],
        );
        let err = Graph::from_definition(&definition).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::CyclicDependency);
    }

    #[test]
    fn test_unreachable_node_rejected() {
        // Node 4 consumes node 1's output but leads nowhere.
        let mut definition = linear_testcase();
        definition.nodes[0]
            .outputs
            .push(SocketDefinition::new("extra", SocketType::Any).with_data(Value::Int(1)));
        definition.nodes.push(NodeDefinition {
            id: 4,
            inputs: vec![
                SocketDefinition::new("left", SocketType::Any),
                SocketDefinition::new("right", SocketType::Any),
            ],
            outputs: vec![SocketDefinition::new("matched", SocketType::Boolean)],
            config: NodeConfig::StringMatch,
        });
        definition
            .edges
            .push(EdgeDefinition::new(4, (1, "extra"), (4, "left")));
        definition
            .edges
            .push(EdgeDefinition::new(5, (1, "extra"), (4, "right")));
        let err = Graph::from_definition(&definition).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::Unreachable);
        assert_eq!(err.node_id, Some(4));
    }

    #[test]
    fn test_overlapping_regions_rejected() {
        let mut definition = linear_testcase();
        definition.nodes.push(NodeDefinition {
            id: 5,
            inputs: vec![SocketDefinition::new(CONDITION_SOCKET, SocketType::Boolean)],
            outputs: Vec::new(),
            config: NodeConfig::IfElse {
                then_nodes: vec![2],
                else_nodes: vec![2],
            },
        });
        definition
            .edges
            .push(EdgeDefinition::new(6, (2, "matched"), (5, CONDITION_SOCKET)));
        let err = Graph::from_definition(&definition).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidRegion);
    }

    #[test]
    fn test_zero_iteration_bound_rejected() {
        let mut definition = linear_testcase();
        definition.nodes.push(NodeDefinition {
            id: 6,
            inputs: Vec::new(),
            outputs: Vec::new(),
            config: NodeConfig::Loop {
                predicate: LoopPredicate::Count { count: 1 },
                max_iterations: 0,
                body_nodes: Vec::new(),
                carried: Vec::new(),
            },
        });
        let err = Graph::from_definition(&definition).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::InvalidConfig);
        assert_eq!(err.node_id, Some(6));
    }

    #[test]
    fn test_sibling_order_follows_definition_order() {
        // Two independent comparison chains; definition order breaks the tie.
        let definition = testcase(
            vec![
                input_node(
                    1,
                    vec![
                        SocketDefinition::new("a", SocketType::Any).with_data(Value::Int(1)),
                        SocketDefinition::new("b", SocketType::Any).with_data(Value::Int(2)),
                    ],
                ),
                string_match_node(5),
                string_match_node(2),
                output_node(
                    7,
                    vec![
                        SocketDefinition::new("first", SocketType::Boolean),
                        SocketDefinition::new("second", SocketType::Boolean),
                    ],
                ),
            ],
            vec![
                EdgeDefinition::new(1, (1, "a"), (5, "left")),
                EdgeDefinition::new(2, (1, "b"), (5, "right")),
                EdgeDefinition::new(3, (1, "a"), (2, "left")),
                EdgeDefinition::new(4, (1, "b"), (2, "right")),
                EdgeDefinition::new(5, (5, "matched"), (7, "first")),
                EdgeDefinition::new(6, (2, "matched"), (7, "second")),
            ],
        );
        let graph = Graph::from_definition(&definition).unwrap();
        // Node 5 is defined before node 2, so it runs first despite the ids.
        assert_eq!(graph.layer_order(&graph.top_level_members()), vec![1, 5, 2, 7]);
    }
}
