//! Tera rendering of secret placeholders.
//!
//! Only `{{ … }}` spans are template syntax. Each one is expanded on its own
//! with Tera against the secret mapping; everything between them is copied
//! verbatim, so `{%`, `{#` and the like in shell scripts or format strings
//! are never interpreted. An undefined key fails the render instead of
//! leaving the literal placeholder on disk. Output is never HTML-escaped.

use tera::{Context, Tera};

use pokeme_core::Secrets;

use crate::context::secret_context;
use crate::error::RenderError;

const OPEN: &str = "{{";
const CLOSE: &str = "}}";

/// True when `source` contains a `{{` placeholder opening.
pub fn has_placeholders(source: &str) -> bool {
    source.contains(OPEN)
}

pub struct SecretRenderer {
    context: Context,
}

impl SecretRenderer {
    pub fn new(secrets: &Secrets) -> Result<Self, RenderError> {
        Ok(Self {
            context: secret_context(secrets)?,
        })
    }

    /// Render `source`; `name` only labels errors.
    ///
    /// Text without placeholders is returned unchanged.
    pub fn render(&self, name: &str, source: &str) -> Result<String, RenderError> {
        if !has_placeholders(source) {
            return Ok(source.to_string());
        }

        let mut rendered = String::with_capacity(source.len());
        let mut rest = source;
        while let Some(start) = rest.find(OPEN) {
            rendered.push_str(&rest[..start]);
            let inner = &rest[start + OPEN.len()..];
            let end = inner.find(CLOSE).ok_or_else(|| RenderError::Unclosed {
                name: name.to_string(),
                offset: source.len() - rest.len() + start,
            })?;
            let placeholder = &rest[start..start + OPEN.len() + end + CLOSE.len()];
            rendered.push_str(&self.expand(name, placeholder)?);
            rest = &inner[end + CLOSE.len()..];
        }
        rendered.push_str(rest);

        tracing::trace!(template = name, bytes = rendered.len(), "rendered");
        Ok(rendered)
    }

    fn expand(&self, name: &str, placeholder: &str) -> Result<String, RenderError> {
        Tera::one_off(placeholder, &self.context, false).map_err(|error| RenderError::Tera {
            name: name.to_string(),
            error,
        })
    }
}

impl std::fmt::Debug for SecretRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretRenderer").finish_non_exhaustive()
    }
}
