use crate::cache::{CacheEntry, DiskSource, FileCache, FileSource};
use crate::config::{MissingIncludePolicy, RenderConfig, Syntax};
use crate::document::Document;
use crate::error::{Result, WeaveError};
use crate::flatten::{FlattenOptions, flatten};
use crate::fs_utils::normalize_reference;
use crate::include::IncludeResolver;
use crate::substitute::{Substituted, VariableSubstitutor};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::time::SystemTime;

/// Owns the file cache and compiled syntax for a build.
///
/// Rendering resolves includes first, then substitutes variables in the
/// fully included text.
#[derive(Debug)]
pub struct Renderer<S = DiskSource> {
    config: RenderConfig,
    syntax: Syntax,
    cache: FileCache<S>,
}

impl Renderer<DiskSource> {
    /// Creates a renderer reading includes from `config.base_dir`
    ///
    /// # Errors
    ///
    /// Returns `WeaveError::InvalidPattern` if a configured pattern is unusable.
    pub fn new(config: RenderConfig) -> Result<Self> {
        let source = DiskSource::new(config.base_dir.clone());
        Self::with_source(config, source)
    }
}

impl<S: FileSource> Renderer<S> {
    /// Creates a renderer over a custom file source
    ///
    /// # Errors
    ///
    /// Returns `WeaveError::InvalidPattern` if a configured pattern is unusable.
    pub fn with_source(config: RenderConfig, source: S) -> Result<Self> {
        let syntax = config.syntax()?;
        let cache = FileCache::new(source, config.freshness);
        Ok(Self {
            config,
            syntax,
            cache,
        })
    }

    pub fn syntax(&self) -> &Syntax {
        &self.syntax
    }

    pub fn cache(&self) -> &FileCache<S> {
        &self.cache
    }

    /// Renders `text` with `variables`, which must be a JSON object
    ///
    /// # Errors
    ///
    /// - `WeaveError::InvalidInput` if `variables` is not an object.
    /// - Include resolution errors (`NotFound`, `CyclicInclude`, `IncludeDepthExceeded`).
    pub fn render(&mut self, text: &str, variables: &Value) -> Result<String> {
        Ok(self.render_detailed(text, variables)?.text)
    }

    /// Like [`Renderer::render`], also returning the unresolved variable keys
    ///
    /// # Errors
    ///
    /// Same as [`Renderer::render`].
    pub fn render_detailed(&mut self, text: &str, variables: &Value) -> Result<Substituted> {
        let variables = as_mapping(variables)?;
        let resolved = self.resolver().resolve(text, None)?;
        Ok(self.substitutor().substitute(&resolved, variables))
    }

    /// Renders a document in place.
    ///
    /// `document.contents` is replaced by the rendered text and
    /// `document.modified` advances to the newest included file's mtime.
    ///
    /// # Errors
    ///
    /// Same as [`Renderer::render`]. The document is left untouched on error.
    pub fn render_document(
        &mut self,
        document: &mut Document,
        variables: &Value,
    ) -> Result<Substituted> {
        let variables = as_mapping(variables)?;
        let mut modified = document.modified;
        let resolved = self.resolver().resolve(&document.contents, Some(&mut modified))?;
        let rendered = self.substitutor().substitute(&resolved, variables);

        tracing::debug!(path = %document.path.display(), "rendered document");
        document.contents.clone_from(&rendered.text);
        document.modified = modified;
        Ok(rendered)
    }

    /// Seeds the cache with known content for `path`
    pub fn set_cache(
        &mut self,
        path: &str,
        content: impl Into<String>,
        timestamp: Option<SystemTime>,
    ) {
        self.cache.set(normalize_reference(path), content, timestamp);
    }

    /// Returns the current content of `path` through the cache
    ///
    /// # Errors
    ///
    /// Returns `WeaveError::NotFound` if the file doesn't exist.
    pub fn get_string(&mut self, path: &str) -> Result<String> {
        Ok(self.cache.get(&normalize_reference(path))?.to_string())
    }

    /// Returns the cache entry for `path`, refreshed if stale
    ///
    /// # Errors
    ///
    /// Returns `WeaveError::NotFound` if the file doesn't exist.
    pub fn get_file(&mut self, path: &str) -> Result<CacheEntry> {
        self.cache.get_entry(&normalize_reference(path)).cloned()
    }

    /// Flattens structured records into substitution-ready variables
    ///
    /// # Errors
    ///
    /// Returns `WeaveError::InvalidInput` if a record is not an object.
    pub fn flatten(&self, records: &Value, options: &FlattenOptions) -> Result<Map<String, Value>> {
        flatten(records, options)
    }

    /// Include targets that cannot be found anywhere in the include tree of
    /// `text`, in order of first appearance
    ///
    /// # Errors
    ///
    /// Returns `WeaveError::CyclicInclude` or `WeaveError::IncludeDepthExceeded`
    /// when the include tree cannot be walked.
    pub fn missing_includes(&mut self, text: &str) -> Result<Vec<PathBuf>> {
        let mut resolver = IncludeResolver::new(
            &mut self.cache,
            &self.syntax,
            MissingIncludePolicy::Warn,
            self.config.max_include_depth,
        );
        resolver.resolve(text, None)?;
        Ok(resolver.unresolved().to_vec())
    }

    fn resolver(&mut self) -> IncludeResolver<'_, S> {
        IncludeResolver::new(
            &mut self.cache,
            &self.syntax,
            self.config.missing_include,
            self.config.max_include_depth,
        )
    }

    fn substitutor(&self) -> VariableSubstitutor<'_> {
        VariableSubstitutor::new(&self.syntax, self.config.missing_variable)
    }
}

fn as_mapping(variables: &Value) -> Result<&Map<String, Value>> {
    variables
        .as_object()
        .ok_or_else(|| WeaveError::invalid_input("variables must be a JSON object"))
}
