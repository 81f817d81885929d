//! Unified key builder for everything the core writes into the KV cache.
//!
//! All keys share a configurable prefix so multiple environments can share a
//! Redis instance without collisions.

use crate::Config;

pub struct KeyBuilder {
    prefix: String,
}

impl KeyBuilder {
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.redis.key_prefix.clone())
    }

    /// Share grant cache entry (§4.5-cache), keyed by `share_id`.
    #[must_use]
    pub fn share(&self, share_id: &str) -> String {
        format!("{}share:{}", self.prefix, share_id)
    }

    /// Pub/Sub channel used to fan cache invalidations out to every node.
    #[must_use]
    pub fn cache_invalidation_channel(&self) -> String {
        format!("{}cache:invalidate", self.prefix)
    }
}

impl Default for KeyBuilder {
    fn default() -> Self {
        Self::new("notevault:")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn share_key_uses_prefix() {
        let kb = KeyBuilder::new("prod:");
        assert_eq!(kb.share("sh_abc"), "prod:share:sh_abc");
    }

    #[test]
    fn default_prefix_is_notevault() {
        assert_eq!(KeyBuilder::default().share("x"), "notevault:share:x");
    }
}
