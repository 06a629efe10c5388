//! # textweave
//!
//! A build-time text preprocessor. It expands include directives with the
//! contents of other files and substitutes variable placeholders with values
//! from a JSON mapping. Included files go through a modification-time aware
//! cache, so repeated renders in one build only re-read files that changed.
//!
//! ## Features
//!
//! - `{% include "partials/nav.html" %}` inlines another file, recursively
//! - `{{ title }}` substitutes a variable, with one level of indirection
//! - `{{ site.nav.0 }}` reaches into nested values
//! - Cyclic includes are reported instead of recursing forever
//! - Rendering a [`Document`] advances its freshness to its newest include
//! - Nested records flatten into `a.b.c` style variables
//!
//! ## Usage
//!
//! ### As a Library
//!
//! ```no_run
//! use serde_json::json;
//! use textweave::{RenderConfig, Renderer};
//!
//! let mut renderer = Renderer::new(RenderConfig::default())?;
//! let page = renderer.render(
//!     "{% include \"header.html\" %}<p>{{ body }}</p>",
//!     &json!({ "title": "Home", "body": "Welcome" }),
//! )?;
//! println!("{page}");
//! # Ok::<(), textweave::WeaveError>(())
//! ```
//!
//! ### As a CLI Tool
//!
//! ```bash
//! # Render a template with variables
//! textweave page.html --var title=Home -o out/page.html
//!
//! # Render from stdin with variables from a JSON file
//! echo '{{ site.name }}' | textweave --vars site.json
//! ```

pub mod cache;
pub mod config;
pub mod document;
pub mod error;
pub mod flatten;
pub mod frontmatter;
pub mod fs_utils;
pub mod include;
pub mod lexer;
pub mod renderer;
pub mod substitute;

// Re-export main types and functions for convenience
pub use cache::{CacheEntry, DiskSource, FileCache, FileSource, MemorySource};
pub use config::{
    FreshnessCheck, MissingIncludePolicy, MissingVariablePolicy, RenderConfig, Syntax,
};
pub use document::Document;
pub use error::{Result, WeaveError};
pub use flatten::{FlattenOptions, flatten};
pub use frontmatter::{parse_header, parse_page};
pub use include::IncludeResolver;
pub use lexer::{TemplateReference, Token, find_includes, find_variables, tokenize};
pub use renderer::Renderer;
pub use substitute::{Substituted, VariableSubstitutor};
