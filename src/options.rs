//! Configuration for [`crate::clean_confluence_html`]

use serde::{Deserialize, Serialize};

/// Options controlling which stages of the cleaning pipeline run
///
/// All stages are enabled by default. The serde representation uses the
/// camelCase keys of the tool arguments (`removeMetadata`, `expandMacros`,
/// `convertTables`) and fills missing keys with `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CleanerOptions {
    /// Strip `class`, `style` and `data-*` attributes (default: true)
    ///
    /// `language-*` class tokens survive so code blocks keep their tag.
    pub remove_metadata: bool,

    /// Rewrite Confluence macros and layout markup into plain HTML (default: true)
    pub expand_macros: bool,

    /// Convert tables to Markdown pipe tables (default: true)
    ///
    /// When disabled, table markup is passed through as HTML.
    pub convert_tables: bool,
}

impl Default for CleanerOptions {
    fn default() -> Self {
        Self {
            remove_metadata: true,
            expand_macros: true,
            convert_tables: true,
        }
    }
}

impl CleanerOptions {
    /// Create options with every stage enabled
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_remove_metadata(mut self, enabled: bool) -> Self {
        self.remove_metadata = enabled;
        self
    }

    #[must_use]
    pub fn with_expand_macros(mut self, enabled: bool) -> Self {
        self.expand_macros = enabled;
        self
    }

    #[must_use]
    pub fn with_convert_tables(mut self, enabled: bool) -> Self {
        self.convert_tables = enabled;
        self
    }
}
