//! Category discovery
//!
//! Categories come from configuration when listed there, otherwise from the
//! side menu of the storefront home page.

use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::errors::PipelineError;
use crate::infrastructure::config::CategoryConfig;
use crate::infrastructure::http_client::PageFetcher;
use crate::infrastructure::parsing::{CategoryLink, CategoryMenuParser};
use crate::infrastructure::retry_manager::RetryingRunner;

pub struct CategoryDiscovery {
    fetcher: Arc<dyn PageFetcher>,
    runner: RetryingRunner,
    parser: CategoryMenuParser,
    base_url: String,
    configured: Vec<CategoryLink>,
}

impl CategoryDiscovery {
    pub fn new(
        fetcher: Arc<dyn PageFetcher>,
        runner: RetryingRunner,
        parser: CategoryMenuParser,
        base_url: &str,
        configured: &[CategoryConfig],
    ) -> Self {
        Self {
            fetcher,
            runner,
            parser,
            base_url: base_url.to_string(),
            configured: configured
                .iter()
                .map(|c| CategoryLink {
                    name: c.name.trim().to_string(),
                    url: c.url.trim().to_string(),
                })
                .collect(),
        }
    }

    /// Top-level categories in menu order.
    ///
    /// An unreachable or menu-less home page is logged and yields no
    /// categories, so a full crawl still ends with a (degenerate) summary.
    pub async fn discover(&self) -> Vec<CategoryLink> {
        match self.try_discover().await {
            Ok(categories) => categories,
            Err(e) => {
                error!("❌ {}", e);
                Vec::new()
            }
        }
    }

    /// Like `discover`, but a failed menu fetch or parse is an error
    pub async fn try_discover(&self) -> Result<Vec<CategoryLink>, PipelineError> {
        if !self.configured.is_empty() {
            info!("📂 Using {} configured categories", self.configured.len());
            return Ok(self.configured.clone());
        }

        let url = &self.base_url;
        let page = self
            .runner
            .run("category menu", || self.fetcher.fetch(url))
            .await
            .ok_or_else(|| PipelineError::CategoryDiscovery {
                message: format!("could not fetch {url}"),
            })?;

        if page.is_not_found() {
            return Err(PipelineError::CategoryDiscovery {
                message: format!("{url} answered 404"),
            });
        }

        let categories = self
            .parser
            .parse(&page.body, &page.url, &self.base_url)
            .map_err(|e| PipelineError::CategoryDiscovery { message: e.to_string() })?;

        if categories.is_empty() {
            warn!("⚠️ Category menu at {} has no usable entries", url);
        } else {
            info!("📂 Discovered {} categories", categories.len());
        }
        Ok(categories)
    }

    /// Category by name, ignoring case and surrounding whitespace
    pub async fn find(&self, name: &str) -> Result<CategoryLink, PipelineError> {
        let wanted = name.trim().to_lowercase();
        self.try_discover()
            .await?
            .into_iter()
            .find(|c| c.name.to_lowercase() == wanted)
            .ok_or_else(|| PipelineError::UnknownCategory {
                name: name.trim().to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::errors::FetchError;
    use crate::infrastructure::retry_manager::RetryPolicy;
    use crate::test_utils::{ScriptedFetcher, TEST_BASE_URL, category_menu_html, not_found_html};
    use std::time::Duration;

    fn discovery(fetcher: ScriptedFetcher, configured: &[CategoryConfig]) -> CategoryDiscovery {
        CategoryDiscovery::new(
            Arc::new(fetcher),
            RetryingRunner::new(RetryPolicy {
                max_attempts: 2,
                delay: Duration::ZERO,
            }),
            CategoryMenuParser::new().unwrap(),
            TEST_BASE_URL,
            configured,
        )
    }

    #[tokio::test]
    async fn test_discovers_top_level_menu_entries() {
        let fetcher = ScriptedFetcher::new().page(
            TEST_BASE_URL,
            &category_menu_html(&[("Motos y quads", "/12-motos"), ("Coches", "/13-coches")]),
        );

        let categories = discovery(fetcher, &[]).discover().await;
        assert_eq!(
            categories,
            vec![
                CategoryLink {
                    name: "Motos y quads".to_string(),
                    url: format!("{TEST_BASE_URL}/12-motos"),
                },
                CategoryLink {
                    name: "Coches".to_string(),
                    url: format!("{TEST_BASE_URL}/13-coches"),
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_configured_categories_skip_the_menu() {
        let fetcher = ScriptedFetcher::new();
        let configured = [CategoryConfig {
            name: " Coches ".to_string(),
            url: "https://www.rtrvalladolid.es/13-coches".to_string(),
        }];
        let discovery = discovery(fetcher, &configured);

        let found = discovery.find("COCHES").await.unwrap();
        assert_eq!(found.name, "Coches");
    }

    #[tokio::test]
    async fn test_unknown_category_is_reported() {
        let fetcher = ScriptedFetcher::new().page(TEST_BASE_URL, &category_menu_html(&[("Coches", "/13-coches")]));

        let err = discovery(fetcher, &[]).find("Barcos").await.unwrap_err();
        assert!(matches!(err, PipelineError::UnknownCategory { name } if name == "Barcos"));
    }

    #[tokio::test]
    async fn test_unreachable_home_page_yields_no_categories() {
        let unreachable = || {
            ScriptedFetcher::new().error(
                TEST_BASE_URL,
                FetchError::Network {
                    url: TEST_BASE_URL.to_string(),
                    message: "dns error".to_string(),
                },
            )
        };

        assert!(discovery(unreachable(), &[]).discover().await.is_empty());

        let err = discovery(unreachable(), &[]).try_discover().await.unwrap_err();
        assert!(matches!(err, PipelineError::CategoryDiscovery { .. }));
        let err = discovery(unreachable(), &[]).find("Coches").await.unwrap_err();
        assert!(matches!(err, PipelineError::CategoryDiscovery { .. }));
    }

    #[tokio::test]
    async fn test_home_page_without_menu_yields_no_categories() {
        let fetcher = ScriptedFetcher::new().page(TEST_BASE_URL, "<html><body></body></html>");
        let discovery = discovery(fetcher, &[]);

        assert!(discovery.discover().await.is_empty());
        let err = discovery.try_discover().await.unwrap_err();
        assert!(matches!(err, PipelineError::CategoryDiscovery { .. }));
    }

    #[tokio::test]
    async fn test_missing_home_page_yields_no_categories() {
        let fetcher = ScriptedFetcher::new().status(TEST_BASE_URL, 404, &not_found_html());
        assert!(discovery(fetcher, &[]).discover().await.is_empty());
    }
}
