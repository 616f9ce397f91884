//! Category side menu parser
//!
//! Top-level categories are the menu anchors that are not subcategory links.

use scraper::{Html, Selector};
use tracing::warn;

use super::config::CategoryMenuSelectors;
use super::{ParsingError, ParsingResult};
use crate::infrastructure::config::utils::resolve_url;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryLink {
    pub name: String,
    pub url: String,
}

pub struct CategoryMenuParser {
    menu_selector: String,
    menu: Selector,
    link: Selector,
    sub_link: Selector,
}

impl CategoryMenuParser {
    pub fn new() -> ParsingResult<Self> {
        Self::with_config(&CategoryMenuSelectors::default())
    }

    pub fn with_config(selectors: &CategoryMenuSelectors) -> ParsingResult<Self> {
        let compile = |s: &str| Selector::parse(s).map_err(|e| ParsingError::invalid_selector(s, e));
        Ok(Self {
            menu_selector: selectors.menu.clone(),
            menu: compile(&selectors.menu)?,
            link: compile(&selectors.link)?,
            sub_link: compile(&selectors.sub_link)?,
        })
    }

    /// Top-level `(name, url)` pairs of the side menu, in page order
    pub fn parse(&self, body: &str, page_url: &str, base_url: &str) -> ParsingResult<Vec<CategoryLink>> {
        let document = Html::parse_document(body);
        let menu = document
            .select(&self.menu)
            .next()
            .ok_or_else(|| ParsingError::CategoryMenuMissing {
                selector: self.menu_selector.clone(),
                url: page_url.to_string(),
            })?;

        let mut categories = Vec::new();
        for anchor in menu.select(&self.link) {
            if self.sub_link.matches(&anchor) {
                continue;
            }

            let name = anchor.text().flat_map(str::split_whitespace).collect::<Vec<_>>().join(" ");
            let href = anchor.value().attr("href").unwrap_or_default();
            if name.is_empty() || href.trim().is_empty() {
                warn!("⚠️ Skipping menu entry with empty name or link (name '{}', href '{}')", name, href);
                continue;
            }

            match resolve_url(base_url, href) {
                Some(url) => categories.push(CategoryLink { name, url }),
                None => warn!(
                    "⚠️ Skipping category '{}': {}",
                    name,
                    ParsingError::UrlResolutionFailed {
                        url: href.to_string(),
                        reason: format!("cannot join with {base_url}"),
                    }
                ),
            }
        }
        Ok(categories)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MENU: &str = r#"<html><body>
        <div class="block-categories">
          <ul class="category-sub-menu">
            <li><a href="https://www.rtrvalladolid.es/117-coches">Coches</a>
              <ul><li><a class="category-sub-link" href="/118-amortiguadores">Amortiguadores</a></li></ul>
            </li>
            <li><a href="/200-motos">  Motos
                 y quads </a></li>
            <li><a href="">Vacía</a></li>
            <li><a href="/300-sin-nombre">   </a></li>
          </ul>
        </div></body></html>"#;

    #[test]
    fn test_top_level_categories_only() {
        let parser = CategoryMenuParser::new().unwrap();
        let categories = parser
            .parse(MENU, "https://www.rtrvalladolid.es", "https://www.rtrvalladolid.es")
            .unwrap();

        assert_eq!(
            categories,
            vec![
                CategoryLink {
                    name: "Coches".to_string(),
                    url: "https://www.rtrvalladolid.es/117-coches".to_string(),
                },
                CategoryLink {
                    name: "Motos y quads".to_string(),
                    url: "https://www.rtrvalladolid.es/200-motos".to_string(),
                },
            ]
        );
    }

    #[test]
    fn test_missing_menu_is_an_error() {
        let parser = CategoryMenuParser::new().unwrap();
        let err = parser
            .parse("<html><body></body></html>", "https://x.es", "https://x.es")
            .unwrap_err();
        assert!(matches!(err, ParsingError::CategoryMenuMissing { .. }));
    }
}
