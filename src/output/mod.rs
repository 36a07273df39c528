// src/output/mod.rs
// =============================================================================
// Presentation of a crawl: everything that turns events and results into
// something a person (or another program) sees.
//
// Submodules:
// - progress: live progress from the event channel
// - render:   markdown -> styled terminal text
// - files:    one .md file per page
// - json:     machine-readable results
// =============================================================================

pub mod files;
pub mod json;
pub mod progress;
pub mod render;

pub use files::write_files;
pub use json::to_json;
pub use render::render_results;
