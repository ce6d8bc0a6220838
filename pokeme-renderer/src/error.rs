//! Error types for pokeme-renderer.

use std::error::Error as _;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    /// Undefined key or malformed placeholder expression.
    #[error("cannot render {name}: {}", chain(.error))]
    Tera { name: String, error: tera::Error },

    /// A `{{` with no closing `}}` after it.
    #[error("cannot render {name}: placeholder opened at byte {offset} is never closed")]
    Unclosed { name: String, offset: usize },

    /// The secret mapping could not be turned into a template context.
    #[error("cannot build template context: {0}")]
    Context(tera::Error),
}

/// Tera nests the useful part ("Variable `x` not found") under a generic
/// "Failed to render" wrapper.
fn chain(err: &tera::Error) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(inner) = source {
        parts.push(inner.to_string());
        source = inner.source();
    }
    parts.join(": ")
}
