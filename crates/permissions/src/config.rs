//! View configuration.

/// Tuning knobs for a [`PermissionResults`](crate::PermissionResults) view.
///
/// Derived views inherit the configuration of the view they come from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ViewConfig {
    enumeration_batch: usize,
    description_limit: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            enumeration_batch: 16,
            description_limit: 100,
        }
    }
}

impl ViewConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how many values each enumeration step materializes (at least 1).
    pub fn enumeration_batch(mut self, batch: usize) -> Self {
        self.enumeration_batch = batch.max(1);
        self
    }

    /// Sets how many values `Display` prints before eliding the rest.
    pub fn description_limit(mut self, limit: usize) -> Self {
        self.description_limit = limit;
        self
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.enumeration_batch
    }

    #[inline]
    pub fn max_described(&self) -> usize {
        self.description_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewConfig::default();
        assert_eq!(config.batch_size(), 16);
        assert_eq!(config.max_described(), 100);
    }

    #[test]
    fn test_builder() {
        let config = ViewConfig::new().enumeration_batch(0).description_limit(3);
        assert_eq!(config.batch_size(), 1);
        assert_eq!(config.max_described(), 3);
    }
}
