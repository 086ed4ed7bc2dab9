/// How `add` picks the identifier of a new record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IdStrategy {
    /// Highest identifier ever seen in this process plus one. Deleting the
    /// newest record never frees its identifier for reuse.
    #[default]
    Monotonic,
    /// One plus the highest identifier currently present (1 when empty).
    /// Reissues the identifier of a deleted newest record.
    MaxPlusOne,
}

/// Record store configuration
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Unit of measure given to materials and requests created without one
    pub default_unit: String,

    /// Identifier assignment policy
    pub id_strategy: IdStrategy,
}

impl StoreConfig {
    pub const DEFAULT_UNIT: &'static str = "pcs";

    pub fn new() -> Self {
        Self {
            default_unit: Self::DEFAULT_UNIT.to_string(),
            id_strategy: IdStrategy::default(),
        }
    }

    /// Set the default unit of measure
    pub fn default_unit(mut self, unit: &str) -> Self {
        self.default_unit = unit.to_string();
        self
    }

    /// Set the identifier strategy
    pub fn id_strategy(mut self, strategy: IdStrategy) -> Self {
        self.id_strategy = strategy;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}
