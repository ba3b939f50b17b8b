//! Helper functions for templates
//!
//! Date formatting, URL generation and HTML escaping shared by the
//! generator, the server and the template filters.

mod date;
mod html;
mod url;

pub use date::*;
pub use html::*;
pub use url::*;
