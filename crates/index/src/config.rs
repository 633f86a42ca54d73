//! Construction-time configuration for index instances.

/// Default minimum degree for the multiway tree variant.
pub const DEFAULT_MIN_DEGREE: usize = 2;

/// Index configuration options.
///
/// Only the multiway tree variant reads these; the binary variants and the
/// flat fallback have no tunables.
#[derive(Debug, Clone, bon::Builder)]
pub struct IndexConfig {
    /// Minimum degree `t` of the multiway tree (must be at least 2).
    /// Every non-root node holds between `t - 1` and `2t - 1` keys.
    #[builder(default = DEFAULT_MIN_DEGREE)]
    pub min_degree: usize,
    /// Whether the multiway tree rejects duplicate keys the way the binary
    /// variants do (default false: duplicates are accepted).
    #[builder(default = false)]
    pub reject_duplicates: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self { min_degree: DEFAULT_MIN_DEGREE, reject_duplicates: false }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults_match_default_impl() {
        let from_builder = IndexConfig::builder().build();
        let from_default = IndexConfig::default();

        assert_eq!(from_builder.min_degree, from_default.min_degree);
        assert_eq!(from_builder.reject_duplicates, from_default.reject_duplicates);
    }

    #[test]
    fn test_builder_overrides() {
        let config = IndexConfig::builder().min_degree(4).reject_duplicates(true).build();
        assert_eq!(config.min_degree, 4);
        assert!(config.reject_duplicates);
    }
}
