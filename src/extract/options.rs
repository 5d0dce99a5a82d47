//! Extraction options.

/// Options for one extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Extract pages on the rayon thread pool
    pub parallel: bool,

    /// Object numbers at or above this are ignored
    pub max_objects: u32,

    /// How deeply form XObjects may nest before they are skipped
    pub max_form_depth: u8,
}

impl ExtractOptions {
    /// Create new extract options with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable parallel page extraction.
    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Disable parallel page extraction.
    pub fn sequential(mut self) -> Self {
        self.parallel = false;
        self
    }

    /// Set the object number ceiling.
    pub fn with_max_objects(mut self, max_objects: u32) -> Self {
        self.max_objects = max_objects;
        self
    }

    /// Set the form XObject nesting bound.
    pub fn with_max_form_depth(mut self, depth: u8) -> Self {
        self.max_form_depth = depth;
        self
    }
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            parallel: true,
            max_objects: 8_388_608,
            max_form_depth: 8,
        }
    }
}
