//! Parsing context for listing pages

/// Where a listing page came from
#[derive(Debug, Clone)]
pub struct ParseContext {
    /// 1-based listing page index
    pub page_index: u32,

    /// Category label attached to every extracted row
    pub category: String,

    /// Base URL for resolving relative links
    pub base_url: String,
}

impl ParseContext {
    pub fn new(page_index: u32, category: &str, base_url: &str) -> Self {
        Self {
            page_index,
            category: category.to_string(),
            base_url: base_url.to_string(),
        }
    }
}
