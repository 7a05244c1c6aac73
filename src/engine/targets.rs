//! Target pass: the target table and the default/initial target lists.

use super::condition::evaluate_condition;
use super::expand::{Scope, expand};
use super::properties::LogicalNode;
use crate::document::{Document, Node};
use crate::{EvaluationError, Item, NameMap, Property, TargetDescriptor, TaskDescriptor};
use std::sync::Arc;

#[derive(Debug, Default)]
pub(crate) struct TargetPassOutput {
    pub targets: NameMap<TargetDescriptor>,
    pub default_targets: Vec<String>,
    pub initial_targets: Vec<String>,
}

/// Expand a `;`-separated name list, dropping empty entries.
fn name_list(text: Option<&str>, scope: &Scope<'_>) -> Result<Vec<String>, crate::ExpressionError> {
    let Some(text) = text else { return Ok(Vec::new()) };
    Ok(expand(text, scope)?.split(';').map(str::trim).filter(|s| !s.is_empty()).map(String::from).collect())
}

fn scope_for<'a>(doc: &'a Document, properties: &'a NameMap<Property>, items: &'a [Item]) -> Scope<'a> {
    Scope::new(properties, doc.directory()).with_items(items).with_this_file(&doc.path)
}

pub(crate) fn evaluate_targets(
    logical: &[LogicalNode],
    documents: &[Arc<Document>],
    properties: &NameMap<Property>,
    items: &[Item],
) -> Result<TargetPassOutput, EvaluationError> {
    let mut out = TargetPassOutput::default();
    for entry in logical {
        let Node::Target(target) = entry.node() else { continue };
        let scope = scope_for(&entry.document, properties, items);
        let location = &target.location;
        let is_active = match &target.condition {
            Some(c) => evaluate_condition(c, &scope).map_err(EvaluationError::expression(location))?,
            None => true,
        };
        let list = |text: &Option<String>| name_list(text.as_deref(), &scope).map_err(EvaluationError::expression(location));
        let descriptor = TargetDescriptor {
            name: target.name.clone(),
            condition: target.condition.clone(),
            is_active,
            depends_on: list(&target.depends_on_targets)?,
            before_targets: list(&target.before_targets)?,
            after_targets: list(&target.after_targets)?,
            inputs: target.inputs.clone(),
            outputs: target.outputs.clone(),
            returns: target.returns.clone(),
            tasks: target
                .tasks
                .iter()
                .map(|t| TaskDescriptor { name: t.name.clone(), condition: t.condition.clone(), parameters: t.parameters.clone() })
                .collect(),
            location: location.clone(),
        };
        if out.targets.contains_key(&target.name) {
            tracing::debug!(name = %target.name, at = %location, "target redefined");
        }
        out.targets.insert(target.name.clone(), descriptor);
    }

    let mut seen_initial = std::collections::HashSet::new();
    for doc in documents {
        let scope = scope_for(doc, properties, items);
        let location = doc.location();
        if out.default_targets.is_empty() {
            out.default_targets =
                name_list(doc.default_targets.as_deref(), &scope).map_err(EvaluationError::expression(&location))?;
        }
        for name in name_list(doc.initial_targets.as_deref(), &scope).map_err(EvaluationError::expression(&location))? {
            if seen_initial.insert(name.to_ascii_lowercase()) {
                out.initial_targets.push(name);
            }
        }
    }
    if out.default_targets.is_empty() {
        if let Some(first) = out.targets.keys().next() {
            out.default_targets.push(first.to_string());
        }
    }
    Ok(out)
}
