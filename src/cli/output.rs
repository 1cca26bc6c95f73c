//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::StoreError;

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &StoreError) -> String {
    match e {
        StoreError::InvalidIdentityKey { key } => format!(
            "{} (use --id-key to pick another identity attribute, or --id-key '' to always create)",
            StoreError::InvalidIdentityKey { key: key.clone() }
        ),
        StoreError::InvalidPredicate(_) => format!("{} (see --help for the --where syntax)", e),
        other => other.to_string(),
    }
}
