//! Store configuration.

use serde::{Deserialize, Serialize};

use crate::EcsError;

/// Group capacity used when an archetype is created without an explicit size.
pub const DEFAULT_GROUP_SIZE: usize = 1600;

/// Tunables for a [`Store`](crate::store::Store).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Entities per group for `Store::create_entity`.
    pub default_group_size: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            default_group_size: DEFAULT_GROUP_SIZE,
        }
    }
}

impl StoreConfig {
    /// Reject values the store cannot honour.
    pub fn validate(&self) -> Result<(), EcsError> {
        if self.default_group_size == 0 {
            return Err(EcsError::InvalidConfig(
                "default_group_size must be at least 1".to_owned(),
            ));
        }
        if self.default_group_size > u32::MAX as usize {
            return Err(EcsError::InvalidConfig(format!(
                "default_group_size must not exceed {}",
                u32::MAX
            )));
        }
        Ok(())
    }
}
