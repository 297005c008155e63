// crates/flowgate-engine/src/eval.rs
// ============================================================================
// Module: Condition & Transform Evaluation
// Description: The minimal total evaluator and the transform kinds.
// Purpose: Keep node-level data shaping pure and side-effect-free.
// Dependencies: flowgate-core, serde_json
// ============================================================================

//! ## Overview
//! The condition evaluator is the single sanctioned one: the literal strings
//! `"true"` and `"false"` evaluate to themselves; any other (or absent)
//! expression evaluates to whether the gathered input map is non-empty. It
//! is total: no input can make it fail a step. Transforms reshape the input
//! map without touching the outside world.

// ============================================================================
// SECTION: Imports
// ============================================================================

use flowgate_core::TransformKind;
use serde_json::Map;
use serde_json::Value;
use serde_json::json;

// ============================================================================
// SECTION: Condition Evaluation
// ============================================================================

/// Evaluates a condition node over its gathered inputs.
///
/// Returns the node output `{passed, condition}`. Total over all inputs: a
/// malformed expression degrades to the non-empty-inputs rule rather than
/// failing the step.
#[must_use]
pub fn evaluate_condition(condition: Option<&str>, inputs: &Map<String, Value>) -> Value {
    let passed = match condition.map(str::trim) {
        Some("true") => true,
        Some("false") => false,
        _ => !inputs.is_empty(),
    };
    json!({
        "passed": passed,
        "condition": condition,
    })
}

// ============================================================================
// SECTION: Transforms
// ============================================================================

/// Applies a transform node to its gathered inputs.
///
/// Passthrough forwards the input map unchanged; merge folds every object
/// input into one object (later keys win); extract merges and then keeps
/// only the configured fields.
#[must_use]
pub fn apply_transform(
    transformation: TransformKind,
    fields: Option<&[String]>,
    inputs: &Map<String, Value>,
) -> Value {
    match transformation {
        TransformKind::Passthrough => Value::Object(inputs.clone()),
        TransformKind::Merge => Value::Object(merge_inputs(inputs)),
        TransformKind::Extract => {
            let merged = merge_inputs(inputs);
            let wanted = fields.unwrap_or_default();
            let extracted: Map<String, Value> = merged
                .into_iter()
                .filter(|(key, _)| wanted.iter().any(|field| field == key))
                .collect();
            Value::Object(extracted)
        }
    }
}

/// Folds every object-valued input into one map; non-object inputs are kept
/// under their producing node's id.
fn merge_inputs(inputs: &Map<String, Value>) -> Map<String, Value> {
    let mut merged = Map::new();
    for (node_id, output) in inputs {
        match output {
            Value::Object(fields) => {
                for (key, value) in fields {
                    merged.insert(key.clone(), value.clone());
                }
            }
            other => {
                merged.insert(node_id.clone(), other.clone());
            }
        }
    }
    merged
}
