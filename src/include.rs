//! Recursive include expansion.
//!
//! Each include directive is replaced by the cached content of the file it
//! names, and that content is expanded in turn. One resolve call keeps a stack
//! of the files currently being expanded: entering a file already on the stack
//! is a [`WeaveError::CyclicInclude`], and nesting past the configured limit is
//! a [`WeaveError::IncludeDepthExceeded`].

use crate::cache::{FileCache, FileSource};
use crate::config::{MissingIncludePolicy, Syntax};
use crate::error::{Result, WeaveError};
use crate::fs_utils::normalize_reference;
use crate::lexer::{Token, tokenize};
use std::path::PathBuf;
use std::time::SystemTime;

/// Expands include directives against a [`FileCache`]
pub struct IncludeResolver<'a, S> {
    cache: &'a mut FileCache<S>,
    syntax: &'a Syntax,
    missing: MissingIncludePolicy,
    max_depth: usize,
    unresolved: Vec<PathBuf>,
}

impl<'a, S: FileSource> IncludeResolver<'a, S> {
    pub fn new(
        cache: &'a mut FileCache<S>,
        syntax: &'a Syntax,
        missing: MissingIncludePolicy,
        max_depth: usize,
    ) -> Self {
        Self {
            cache,
            syntax,
            missing,
            max_depth,
            unresolved: Vec::new(),
        }
    }

    /// Include targets skipped under the `warn` policy, in order of first appearance
    pub fn unresolved(&self) -> &[PathBuf] {
        &self.unresolved
    }

    /// Expands every include directive in `text`, transitively.
    ///
    /// With `main_modified` set, the timestamp is advanced to the newest
    /// modification time among all files pulled in.
    ///
    /// # Errors
    ///
    /// - `WeaveError::NotFound` for a missing include under the `fail` policy.
    /// - `WeaveError::CyclicInclude` if a file includes itself, directly or not.
    /// - `WeaveError::IncludeDepthExceeded` past the nesting limit.
    pub fn resolve(
        &mut self,
        text: &str,
        main_modified: Option<&mut SystemTime>,
    ) -> Result<String> {
        let mut stack = Vec::new();
        let mut newest = None;
        let resolved = self.expand(text, &mut stack, &mut newest)?;

        if let Some(main) = main_modified
            && let Some(newest) = newest
            && newest > *main
        {
            tracing::debug!("advancing document freshness to newest include");
            *main = newest;
        }
        Ok(resolved)
    }

    fn expand(
        &mut self,
        text: &str,
        stack: &mut Vec<PathBuf>,
        newest: &mut Option<SystemTime>,
    ) -> Result<String> {
        let mut result = String::with_capacity(text.len());

        for token in tokenize(text, self.syntax) {
            let (raw, reference) = match token {
                Token::Include { raw, path } => (raw, path),
                other => {
                    result.push_str(other.raw());
                    continue;
                }
            };

            let path = normalize_reference(reference);
            if stack.contains(&path) {
                let mut chain = stack.clone();
                chain.push(path);
                return Err(WeaveError::CyclicInclude { chain });
            }
            if stack.len() >= self.max_depth {
                return Err(WeaveError::IncludeDepthExceeded {
                    path,
                    limit: self.max_depth,
                });
            }

            let (content, modified) = match self.cache.get_entry(&path) {
                Ok(entry) => (entry.content.clone(), entry.last_checked),
                Err(WeaveError::NotFound { path })
                    if self.missing == MissingIncludePolicy::Warn =>
                {
                    tracing::warn!("File not found: {}", path.display());
                    if !self.unresolved.contains(&path) {
                        self.unresolved.push(path);
                    }
                    result.push_str(raw);
                    continue;
                }
                Err(e) => return Err(e),
            };

            if newest.is_none_or(|seen| modified > seen) {
                *newest = Some(modified);
            }

            tracing::trace!(path = %path.display(), depth = stack.len(), "expanding include");
            stack.push(path);
            let expanded = self.expand(&content, stack, newest)?;
            stack.pop();
            result.push_str(&expanded);
        }

        Ok(result)
    }
}
