//! Template context built from the secret mapping.

use pokeme_core::Secrets;
use tera::Context;

use crate::error::RenderError;

/// Every secret becomes a top-level template variable.
pub fn secret_context(secrets: &Secrets) -> Result<Context, RenderError> {
    Context::from_serialize(secrets).map_err(RenderError::Context)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_become_top_level_variables() {
        let secrets: Secrets = [("token", "abc"), ("db_user", "app")].into_iter().collect();
        let ctx = secret_context(&secrets).unwrap();
        assert_eq!(ctx.get("token").and_then(|v| v.as_str()), Some("abc"));
        assert_eq!(ctx.get("db_user").and_then(|v| v.as_str()), Some("app"));
        assert!(ctx.get("missing").is_none());
    }

    #[test]
    fn empty_mapping_gives_empty_context() {
        let ctx = secret_context(&Secrets::new()).unwrap();
        assert!(ctx.into_json().as_object().is_some_and(|m| m.is_empty()));
    }
}
