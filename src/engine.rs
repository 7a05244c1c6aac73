//! Evaluation engine.
//!
//! This module is the entry point for turning a [`Document`] tree into an
//! [`EvaluatedSnapshot`]. It is split into focused submodules under
//! `src/engine/`; the coordinator in `api.rs` only calls [`evaluate`].
//!
//! ## How the parts work together
//!
//! ```text
//! root Document ──┐   EvaluationContext (globals, env, tools version)
//!                 │        │
//!                 v        v
//!        evaluate_properties (properties.rs)
//!          - seed env < reserved < globals
//!          - walk nodes in textual order ─── Import ──> ImportResolver (imports.rs)
//!          - flatten to LogicalNode order  <── walk ──   - condition, expand, glob
//!                 │                                      - cache, cycle chain
//!                 v
//!        evaluate_items (items.rs)
//!          - definitions, Include/Exclude/Remove/Update
//!          - globs (glob.rs), metadata (expand.rs)
//!                 │
//!                 v
//!        evaluate_targets (targets.rs)
//!                 │
//!                 v
//!          EvaluatedSnapshot
//! ```
//!
//! Every pass sees expressions through a [`Scope`]; `expression.rs` parses
//! reference syntax, `expand.rs` expands it, `functions.rs` implements property
//! functions and `condition.rs` evaluates conditions.
//!
//! ## Debugging
//!
//! Pass boundaries log at `debug`, individual imports and globs at `trace`.
//! The CLI reads its filter from `BUILDEVAL_LOG`.

#[path = "engine/condition.rs"]
mod condition;
#[path = "engine/expand.rs"]
mod expand;
#[path = "engine/expression.rs"]
mod expression;
#[path = "engine/functions.rs"]
mod functions;
#[path = "engine/glob.rs"]
mod glob;
#[path = "engine/imports.rs"]
mod imports;
#[path = "engine/items.rs"]
mod items;
#[path = "engine/metrics.rs"]
mod metrics;
#[path = "engine/properties.rs"]
mod properties;
#[path = "engine/targets.rs"]
mod targets;

pub use condition::evaluate_condition;
pub use expand::{MetadataSource, Scope, expand};
pub use self::glob::{GlobMatch, resolve_glob};
pub use metrics::{EvaluationMetrics, PassMetrics};

pub(crate) use expression::is_identifier;
pub(crate) use self::glob::normalize_path;

use crate::api::{EvaluationContext, LoadSettings};
use crate::document::Document;
use crate::{DocumentLoader, EvaluatedSnapshot, EvaluationError};
use std::sync::Arc;
use std::time::Instant;

/// Run all passes over `root`. Nothing is published on error.
pub(crate) fn evaluate(
    root: &Arc<Document>,
    context: &EvaluationContext,
    loader: &dyn DocumentLoader,
    settings: LoadSettings,
    version: u64,
) -> Result<EvaluatedSnapshot, EvaluationError> {
    let _span = tracing::debug_span!("evaluate", project = %root.path.display(), version).entered();
    let started = Instant::now();
    let mut metrics = EvaluationMetrics::default();

    let t = Instant::now();
    let mut resolver = imports::ImportResolver::new(loader, settings, root);
    let props = properties::evaluate_properties(root, context, &mut resolver)?;
    metrics.properties = PassMetrics { duration: t.elapsed(), produced: props.properties.len() };
    metrics.imports = props.imports.len();
    metrics.documents_loaded = resolver.loads;
    tracing::debug!(elapsed = ?metrics.properties.duration, properties = props.properties.len(), imports = props.imports.len(), "property pass finished");

    let t = Instant::now();
    let items = items::evaluate_items(&props.logical, &props.properties, root.directory())?;
    metrics.items = PassMetrics { duration: t.elapsed(), produced: items.items.len() };
    metrics.glob_expansions = items.glob_expansions;
    tracing::debug!(elapsed = ?metrics.items.duration, items = items.items.len(), "item pass finished");

    let t = Instant::now();
    let targets = targets::evaluate_targets(&props.logical, &props.documents, &props.properties, &items.items)?;
    metrics.targets = PassMetrics { duration: t.elapsed(), produced: targets.targets.len() };
    tracing::debug!(elapsed = ?metrics.targets.duration, targets = targets.targets.len(), "target pass finished");

    metrics.total = started.elapsed();
    Ok(EvaluatedSnapshot {
        version,
        tools_version: context.tools_version.clone(),
        directory: Arc::from(root.directory()),
        properties: props.properties,
        items: items.items,
        item_definitions: items.definitions,
        imports: props.imports,
        targets: targets.targets,
        default_targets: targets.default_targets,
        initial_targets: targets.initial_targets,
        conditioned_properties: props.conditioned,
        metrics,
    })
}
