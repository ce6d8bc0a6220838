//! # pokeme-renderer
//!
//! Substitutes `{{key}}` placeholders in deployed configuration files with
//! values from the secret mapping.
//!
//! ## Usage
//!
//! ```rust
//! use pokeme_core::Secrets;
//! use pokeme_renderer::SecretRenderer;
//!
//! let secrets: Secrets = [("db_password", "hunter2")].into_iter().collect();
//! let renderer = SecretRenderer::new(&secrets).unwrap();
//! let out = renderer.render("app.env", "DB_PASSWORD={{db_password}}\n").unwrap();
//! assert_eq!(out, "DB_PASSWORD=hunter2\n");
//! ```

pub mod context;
pub mod engine;
pub mod error;

pub use context::secret_context;
pub use engine::{has_placeholders, SecretRenderer};
pub use error::RenderError;
