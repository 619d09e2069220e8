//! Content processing pipeline: detect → clean → extract.

pub mod clean;
pub mod detect;
pub mod extract;

pub use clean::{clean_html, CleanOptions};
pub use detect::{detect_content_type, ContentType};
pub use extract::{ExtractError, Extractor};
