//! Stage options.

use serde::{Deserialize, Serialize};

/// Options shared by every stage of a chain.
///
/// Children created through `then`/`all` inherit their parent's options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StageOptions {
    /// Dispose the stage after a successful outermost `start()` instead of
    /// returning it to `Idle`.
    pub auto_dispose: bool,
}

impl StageOptions {
    /// Creates the default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `auto_dispose`.
    #[must_use]
    pub const fn with_auto_dispose(mut self, auto_dispose: bool) -> Self {
        self.auto_dispose = auto_dispose;
        self
    }

    /// Parses options from a JSON document. Missing fields use defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = StageOptions::new();
        assert!(!options.auto_dispose);
    }

    #[test]
    fn test_builder() {
        let options = StageOptions::new().with_auto_dispose(true);
        assert!(options.auto_dispose);
    }

    #[test]
    fn test_from_json() {
        let options = StageOptions::from_json(r#"{"auto_dispose": true}"#).unwrap();
        assert!(options.auto_dispose);

        let options = StageOptions::from_json("{}").unwrap();
        assert_eq!(options, StageOptions::default());

        assert!(StageOptions::from_json("[1]").is_err());
    }
}
