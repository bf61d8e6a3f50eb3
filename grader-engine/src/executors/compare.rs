// Comparison Executors
// STRING_MATCH and COMPARE: deterministic, pure comparisons

use crate::definition::{CompareOp, NodeConfig, NodeDefinition};
use crate::error::ExecutionFailure;
use crate::executors::{BoundInputs, ExecutorError, NodeExecutor, NodeOutputs};
use crate::value::Value;

use std::cmp::Ordering;

fn comparison_sockets(node: &NodeDefinition) -> (&str, &str, &str) {
    // Validation guarantees exactly two inputs and one output.
    let left = node.inputs.first().map(|s| s.id.as_str()).unwrap_or("left");
    let right = node.inputs.get(1).map(|s| s.id.as_str()).unwrap_or("right");
    let out = node
        .outputs
        .first()
        .map(|s| s.id.as_str())
        .unwrap_or("result");
    (left, right, out)
}

/// Compares the stringified forms of its two inputs for exact equality.
pub struct StringMatchExecutor;

impl StringMatchExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StringMatchExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NodeExecutor for StringMatchExecutor {
    async fn execute(
        &self,
        node: &NodeDefinition,
        inputs: &BoundInputs,
    ) -> Result<NodeOutputs, ExecutorError> {
        let (left_id, right_id, out_id) = comparison_sockets(node);
        let left = inputs.require(node.id, left_id)?;
        let right = inputs.require(node.id, right_id)?;

        let matched = left.as_string() == right.as_string();
        Ok(vec![(out_id.to_string(), Value::Bool(matched))])
    }
}

/// Compares two inputs with a configured operator.
///
/// Numeric operands compare numerically (exact unless a tolerance is
/// declared), strings lexicographically; ordering anything else is a type
/// mismatch.
pub struct CompareExecutor;

impl CompareExecutor {
    pub fn new() -> Self {
        Self
    }

    fn evaluate(
        node: &NodeDefinition,
        operator: CompareOp,
        tolerance: Option<f64>,
        left: &Value,
        right: &Value,
    ) -> Result<bool, ExecutionFailure> {
        if let (Some(a), Some(b)) = (left.as_number(), right.as_number()) {
            let equal = match tolerance {
                Some(tolerance) => (a - b).abs() <= tolerance,
                None => a == b,
            };
            return Ok(match operator {
                CompareOp::Equal => equal,
                CompareOp::NotEqual => !equal,
                CompareOp::Less => a < b,
                CompareOp::LessEqual => a <= b,
                CompareOp::Greater => a > b,
                CompareOp::GreaterEqual => a >= b,
            });
        }

        if let (Value::Str(a), Value::Str(b)) = (left, right) {
            let ordering = a.cmp(b);
            return Ok(match operator {
                CompareOp::Equal => ordering == Ordering::Equal,
                CompareOp::NotEqual => ordering != Ordering::Equal,
                CompareOp::Less => ordering == Ordering::Less,
                CompareOp::LessEqual => ordering != Ordering::Greater,
                CompareOp::Greater => ordering == Ordering::Greater,
                CompareOp::GreaterEqual => ordering != Ordering::Less,
            });
        }

        if !operator.is_ordering() && left.socket_type() == right.socket_type() {
            let equal = left == right;
            return Ok(if operator == CompareOp::Equal {
                equal
            } else {
                !equal
            });
        }

        Err(ExecutionFailure::type_mismatch(
            node.id,
            format!(
                "cannot apply {:?} to {} and {}",
                operator,
                left.socket_type(),
                right.socket_type()
            ),
        ))
    }
}

impl Default for CompareExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl NodeExecutor for CompareExecutor {
    async fn execute(
        &self,
        node: &NodeDefinition,
        inputs: &BoundInputs,
    ) -> Result<NodeOutputs, ExecutorError> {
        let NodeConfig::Compare {
            operator,
            tolerance,
        } = &node.config
        else {
            return Err(ExecutionFailure::runtime(
                node.id,
                "node routed to COMPARE executor without a COMPARE config",
            )
            .into());
        };

        let (left_id, right_id, out_id) = comparison_sockets(node);
        let left = inputs.require(node.id, left_id)?;
        let right = inputs.require(node.id, right_id)?;

        let result = Self::evaluate(node, *operator, *tolerance, left, right)?;
        Ok(vec![(out_id.to_string(), Value::Bool(result))])
    }
}
