pub mod logging;
pub mod text;

pub use text::{collapse_whitespace, escape_html, escape_xml, truncate_text};
