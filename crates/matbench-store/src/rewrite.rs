use matbench_core::{MatbenchError, Settings};
use serde_json::Value;

/// Normalizes the settings of an ingested record before it is indexed.
///
/// Returning `Ok(None)` skips the record; the registry still remembers its
/// import key so the same directory is not reconsidered. Implementations must
/// not depend on registry state.
pub trait RewriteSettings {
    /// Produces the processed settings for a record.
    fn rewrite(
        &self,
        import_settings: &Settings,
        results: &Value,
        is_long_term_storage: bool,
    ) -> Result<Option<Settings>, MatbenchError>;
}

impl<F> RewriteSettings for F
where
    F: Fn(&Settings, &Value, bool) -> Result<Option<Settings>, MatbenchError>,
{
    fn rewrite(
        &self,
        import_settings: &Settings,
        results: &Value,
        is_long_term_storage: bool,
    ) -> Result<Option<Settings>, MatbenchError> {
        self(import_settings, results, is_long_term_storage)
    }
}

/// Keeps import settings unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityRewrite;

impl RewriteSettings for IdentityRewrite {
    fn rewrite(
        &self,
        import_settings: &Settings,
        _results: &Value,
        _is_long_term_storage: bool,
    ) -> Result<Option<Settings>, MatbenchError> {
        Ok(Some(import_settings.clone()))
    }
}
