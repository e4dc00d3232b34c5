use crate::config::AuthzConfig;

/// Identity rules used to classify the caller before any lookup.
#[derive(Debug, Clone)]
pub struct ActorPolicy {
    pub support_user_id: String,
    /// Exclusive bounds of the internal service account band.
    pub service_account_min: u64,
    pub service_account_max: u64,
}

impl ActorPolicy {
    pub fn from_config(config: &AuthzConfig) -> Self {
        Self {
            support_user_id: config.support_user_id.clone(),
            service_account_min: config.service_account_min,
            service_account_max: config.service_account_max,
        }
    }

    pub fn is_support(&self, user_id: &str) -> bool {
        user_id == self.support_user_id
    }

    /// Numeric ids strictly inside the reserved band, support excluded.
    pub fn is_service_account(&self, user_id: &str) -> bool {
        if self.is_support(user_id) {
            return false;
        }
        match user_id.trim().parse::<u64>() {
            Ok(id) => id > self.service_account_min && id < self.service_account_max,
            Err(_) => false,
        }
    }
}

impl Default for ActorPolicy {
    fn default() -> Self {
        Self::from_config(&AuthzConfig::default())
    }
}
