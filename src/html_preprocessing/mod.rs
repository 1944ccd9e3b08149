//! HTML preprocessing passes run before Markdown conversion.
//!
//! Each pass takes an HTML string, owns its parsed tree for the duration of the
//! pass and returns a new HTML string. They are applied in this order:
//!
//! 1. [`process_confluence_macros`]: macros, layouts and viewer widgets
//! 2. [`remove_confluence_metadata`]: `class`/`style`/`data-*` attributes
//! 3. [`normalize_table_cells`]: block content inside table cells

pub mod dom;
pub mod macro_expansion;
pub mod macros;
pub mod metadata_cleaning;
pub mod svg_diagram;
pub mod table_cells;

pub use macro_expansion::{normalize_storage_markup, process_confluence_macros};
pub use macros::{MacroBody, MacroDescriptor, MacroKind, expand_macro};
pub use metadata_cleaning::remove_confluence_metadata;
pub use svg_diagram::{DiagramEdge, DiagramGraph, DiagramNode, convert_svg_to_mermaid};
pub use table_cells::normalize_table_cells;
