// Task Definition Wire Model
// The JSON shape a task author produces: nodes, sockets, edges, test cases

use crate::value::{EdgeCoercion, SocketType, Value};

use serde::{Deserialize, Serialize};

use std::fmt;

/// Node identifier, unique within a graph.
pub type NodeId = i64;

/// Edge identifier, unique within a graph.
pub type EdgeId = i64;

/// Reserved node id for the synthetic INPUT node carrying submitted inputs.
pub const USER_INPUT_NODE_ID: NodeId = 0;

/// Socket id of the condition input on an IF_ELSE node.
pub const CONDITION_SOCKET: &str = "condition";

/// Socket id of the predicate input on a LOOP node with a CONDITION predicate.
pub const PREDICATE_SOCKET: &str = "predicate";

/// Prefix naming the positional-argument sockets of a RUN_FUNCTION node.
pub const ARG_SOCKET_PREFIX: &str = "arg";

/// Prefix naming the keyword-argument sockets of a RUN_FUNCTION node.
/// The socket id is `kwarg.<name>`.
pub const KWARG_SOCKET_PREFIX: &str = "kwarg.";

/// Socket id carrying the submitted module on a RUN_FUNCTION node.
pub const FILE_SOCKET: &str = "file";

/// Address of a socket: (node id, socket id).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SocketRef {
    #[serde(rename = "node_id")]
    pub node: NodeId,
    #[serde(rename = "socket_id")]
    pub socket: String,
}

impl SocketRef {
    pub fn new(node: NodeId, socket: impl Into<String>) -> Self {
        Self {
            node,
            socket: socket.into(),
        }
    }
}

impl fmt::Display for SocketRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.node, self.socket)
    }
}

/// A declared socket on a node.
///
/// `data` carries the literal an INPUT node emits on this socket; sockets of
/// required (caller-supplied) inputs leave it empty. `visibility` only
/// matters on OUTPUT node inputs and defaults to grading-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SocketDefinition {
    pub id: String,
    #[serde(rename = "type", default)]
    pub ty: SocketType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default)]
    pub visibility: Visibility,
}

impl SocketDefinition {
    pub fn new(id: impl Into<String>, ty: SocketType) -> Self {
        Self {
            id: id.into(),
            ty,
            data: None,
            visibility: Visibility::Private,
        }
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = Some(data);
        self
    }

    pub fn public(mut self) -> Self {
        self.visibility = Visibility::Public;
        self
    }
}

/// Whether a realized OUTPUT value is shown to the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Public,
    #[default]
    Private,
}

/// Comparison operator of a COMPARE node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompareOp {
    Equal,
    NotEqual,
    Less,
    LessEqual,
    Greater,
    GreaterEqual,
}

impl CompareOp {
    /// Ordering operators require numeric or string operands.
    pub fn is_ordering(self) -> bool {
        !matches!(self, CompareOp::Equal | CompareOp::NotEqual)
    }
}

/// Iteration contract of a LOOP node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum LoopPredicate {
    /// Run the body a fixed number of times.
    #[serde(rename = "COUNT")]
    Count { count: u32 },
    /// Re-evaluate the boolean bound to the node's `predicate` socket each
    /// iteration.
    #[serde(rename = "CONDITION")]
    Condition,
}

/// Kind-specific node configuration, tagged by the node's `type` field so an
/// illegal configuration is rejected at parse time rather than discovered
/// mid-execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeConfig {
    #[serde(rename = "INPUT")]
    Input,

    #[serde(rename = "OUTPUT")]
    Output,

    #[serde(rename = "RUN_FUNCTION")]
    RunFunction {
        function_name: String,
        /// Overrides the task environment's time limit for this node.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        time_limit_secs: Option<u64>,
        /// Overrides the task environment's memory limit for this node.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        memory_limit_mb: Option<u64>,
    },

    #[serde(rename = "STRING_MATCH")]
    StringMatch,

    #[serde(rename = "COMPARE")]
    Compare {
        operator: CompareOp,
        /// Absolute tolerance for numeric equality. Comparison is exact
        /// unless this is declared.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tolerance: Option<f64>,
    },

    #[serde(rename = "IF_ELSE")]
    IfElse {
        then_nodes: Vec<NodeId>,
        else_nodes: Vec<NodeId>,
    },

    #[serde(rename = "LOOP")]
    Loop {
        predicate: LoopPredicate,
        /// Hard iteration bound; breaching it is a LOOP_BOUND_EXCEEDED
        /// failure, never an unbounded run.
        max_iterations: u32,
        body_nodes: Vec<NodeId>,
        /// OUT sockets of body nodes whose values survive into the next
        /// iteration and are exported when the loop terminates normally.
        #[serde(default)]
        carried: Vec<SocketRef>,
    },
}

/// Kind discriminant of a node, derived from its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Input,
    Output,
    RunFunction,
    StringMatch,
    Compare,
    IfElse,
    Loop,
}

impl NodeKind {
    pub fn is_control_flow(self) -> bool {
        matches!(self, NodeKind::IfElse | NodeKind::Loop)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Input => "INPUT",
            NodeKind::Output => "OUTPUT",
            NodeKind::RunFunction => "RUN_FUNCTION",
            NodeKind::StringMatch => "STRING_MATCH",
            NodeKind::Compare => "COMPARE",
            NodeKind::IfElse => "IF_ELSE",
            NodeKind::Loop => "LOOP",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One step of the grading pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDefinition {
    pub id: NodeId,
    #[serde(default)]
    pub inputs: Vec<SocketDefinition>,
    #[serde(default)]
    pub outputs: Vec<SocketDefinition>,
    #[serde(flatten)]
    pub config: NodeConfig,
}

impl NodeDefinition {
    pub fn kind(&self) -> NodeKind {
        match self.config {
            NodeConfig::Input => NodeKind::Input,
            NodeConfig::Output => NodeKind::Output,
            NodeConfig::RunFunction { .. } => NodeKind::RunFunction,
            NodeConfig::StringMatch => NodeKind::StringMatch,
            NodeConfig::Compare { .. } => NodeKind::Compare,
            NodeConfig::IfElse { .. } => NodeKind::IfElse,
            NodeConfig::Loop { .. } => NodeKind::Loop,
        }
    }

    pub fn input(&self, socket_id: &str) -> Option<&SocketDefinition> {
        self.inputs.iter().find(|s| s.id == socket_id)
    }

    pub fn output(&self, socket_id: &str) -> Option<&SocketDefinition> {
        self.outputs.iter().find(|s| s.id == socket_id)
    }

    /// Node ids of the control-flow region(s) this node owns, in declaration
    /// order. Empty for non-control-flow nodes.
    pub fn region_members(&self) -> Vec<NodeId> {
        match &self.config {
            NodeConfig::IfElse {
                then_nodes,
                else_nodes,
            } => then_nodes.iter().chain(else_nodes.iter()).copied().collect(),
            NodeConfig::Loop { body_nodes, .. } => body_nodes.clone(),
            _ => Vec::new(),
        }
    }
}

/// A directed connection from one producer OUT socket to one consumer IN
/// socket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeDefinition {
    pub id: EdgeId,
    pub from_node_id: NodeId,
    pub from_socket_id: String,
    pub to_node_id: NodeId,
    pub to_socket_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coercion: Option<EdgeCoercion>,
}

impl EdgeDefinition {
    pub fn new(
        id: EdgeId,
        from: (NodeId, impl Into<String>),
        to: (NodeId, impl Into<String>),
    ) -> Self {
        Self {
            id,
            from_node_id: from.0,
            from_socket_id: from.1.into(),
            to_node_id: to.0,
            to_socket_id: to.1.into(),
            coercion: None,
        }
    }

    pub fn from_ref(&self) -> SocketRef {
        SocketRef::new(self.from_node_id, self.from_socket_id.clone())
    }

    pub fn to_ref(&self) -> SocketRef {
        SocketRef::new(self.to_node_id, self.to_socket_id.clone())
    }
}

/// One test-case graph of a task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestcaseDefinition {
    pub id: i64,
    pub nodes: Vec<NodeDefinition>,
    pub edges: Vec<EdgeDefinition>,
}

/// An input the submitter must provide (typically the solution file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequiredInputDefinition {
    /// Socket id on the synthetic user-input node.
    pub id: String,
    #[serde(rename = "type", default)]
    pub ty: SocketType,
}

/// A submitted value for one required input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInput {
    pub id: String,
    pub data: Value,
}

/// One graded problem: environment, required inputs, and test-case graphs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDefinition {
    pub id: i64,
    pub environment: crate::sandbox::RunnerEnvironment,
    #[serde(default)]
    pub required_inputs: Vec<RequiredInputDefinition>,
    pub testcases: Vec<TestcaseDefinition>,
}
