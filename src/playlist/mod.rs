//! M3U playlist handling
//!
//! `parser` turns raw playlist text into channel drafts; `generator` renders
//! stored channels back out. Generated output round-trips through the parser
//! for ids, titles, groups, logos, DRM fields and URLs.

pub mod generator;
pub mod parser;

pub use generator::generate_playlist;
pub use parser::M3uParser;
