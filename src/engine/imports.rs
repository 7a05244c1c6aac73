//! Import resolution.
//!
//! The resolver is created once per evaluation run. It owns the run's document
//! cache (so a file imported twice is parsed once) and the chain of documents
//! currently being walked, which is what turns `a -> b -> a` into
//! [`ImportError::Cycle`] instead of unbounded recursion.
//!
//! Duplicate imports are not collapsed: every import site yields its own
//! [`ResolvedImport`], and the property pass walks the document again.

use super::condition::evaluate_condition;
use super::expand::{Scope, expand};
use super::glob::{normalize_path, resolve_glob};
use crate::document::{Document, ImportElement};
use crate::{DocumentLoader, EvaluationError, ImportError, LoadSettings, ResolvedImport};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub(crate) struct ImportResolver<'l> {
    loader: &'l dyn DocumentLoader,
    settings: LoadSettings,
    cache: HashMap<PathBuf, Arc<Document>>,
    chain: Vec<PathBuf>,
    pub(crate) loads: usize,
}

impl<'l> ImportResolver<'l> {
    pub(crate) fn new(loader: &'l dyn DocumentLoader, settings: LoadSettings, root: &Document) -> Self {
        ImportResolver {
            loader,
            settings,
            cache: HashMap::new(),
            chain: vec![normalize_path(&root.path)],
            loads: 0,
        }
    }

    /// Push `document` onto the active chain before walking it.
    pub(crate) fn enter(&mut self, document: &Document) {
        self.chain.push(normalize_path(&document.path));
    }

    pub(crate) fn leave(&mut self) {
        self.chain.pop();
    }

    /// Resolve one `Import` element of `importer`. Returns nothing when the condition is false.
    pub(crate) fn resolve(
        &mut self,
        element: &ImportElement,
        importer: &Document,
        scope: &Scope<'_>,
    ) -> Result<Vec<ResolvedImport>, EvaluationError> {
        let location = &element.location;
        if let Some(condition) = &element.condition {
            if !evaluate_condition(condition, scope).map_err(EvaluationError::expression(location))? {
                tracing::trace!(project = %element.project, "import skipped by condition");
                return Ok(Vec::new());
            }
        }

        let expanded = expand(&element.project, scope).map_err(EvaluationError::expression(location))?;
        if expanded.trim().is_empty() {
            return Err(EvaluationError::import(location, ImportError::EmptyProject));
        }
        let wildcard = expanded.contains(['*', '?']);
        let matches = resolve_glob(&expanded, importer.directory()).map_err(EvaluationError::glob(location))?;

        let mut resolved = Vec::with_capacity(matches.len());
        for m in matches {
            let path = normalize_path(&importer.directory().join(&m.path));
            if self.chain.contains(&path) {
                let mut chain = self.chain.clone();
                chain.push(path);
                return Err(EvaluationError::import(location, ImportError::Cycle { chain }));
            }
            let Some(imported) = self.load(&path, wildcard, element)? else { continue };
            tracing::trace!(importer = %importer.path.display(), imported = %path.display(), "import resolved");
            resolved.push(ResolvedImport {
                importing_element: location.clone(),
                project: element.project.clone(),
                imported,
                is_implicit: false,
            });
        }
        Ok(resolved)
    }

    /// Load a document through the cache; `None` when a setting says to skip it.
    fn load(
        &mut self,
        path: &Path,
        from_wildcard: bool,
        element: &ImportElement,
    ) -> Result<Option<Arc<Document>>, EvaluationError> {
        if let Some(doc) = self.cache.get(path) {
            return Ok(Some(doc.clone()));
        }
        if !from_wildcard && !self.loader.exists(path) {
            if self.settings.contains(LoadSettings::IGNORE_MISSING_IMPORTS) {
                tracing::warn!(path = %path.display(), at = %element.location, "skipping missing import");
                return Ok(None);
            }
            return Err(EvaluationError::import(&element.location, ImportError::NotFound { path: path.to_path_buf() }));
        }
        match self.loader.load(path) {
            Ok(mut doc) => {
                doc.path = Arc::from(path);
                let doc = Arc::new(doc);
                self.loads += 1;
                self.cache.insert(path.to_path_buf(), doc.clone());
                Ok(Some(doc))
            }
            Err(err) if self.settings.contains(LoadSettings::IGNORE_INVALID_IMPORTS) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping invalid import");
                Ok(None)
            }
            Err(err) => Err(EvaluationError::import(
                &element.location,
                ImportError::Invalid { path: path.to_path_buf(), source: Box::new(err) },
            )),
        }
    }
}
