// Definition Module
// Wire-format task definitions and their validation errors

pub mod error;
pub mod models;

pub use error::{ValidationError, ValidationErrorKind};
pub use models::{
    CompareOp, EdgeDefinition, EdgeId, LoopPredicate, NodeConfig, NodeDefinition, NodeId, NodeKind,
    RequiredInputDefinition, SocketDefinition, SocketRef, TaskDefinition, TestcaseDefinition,
    UserInput, Visibility, ARG_SOCKET_PREFIX, CONDITION_SOCKET, FILE_SOCKET, KWARG_SOCKET_PREFIX,
    PREDICATE_SOCKET, USER_INPUT_NODE_ID,
};
