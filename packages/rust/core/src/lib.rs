//! Core enrichment logic for Grimoire.
//!
//! This crate ties the search, scraping and text-model components into the
//! per-product [`EnrichmentPipeline`] and runs it over a whole catalog with
//! [`BatchRunner`].

pub mod batch;
pub mod generator;
pub mod llm;
pub mod pipeline;

pub use batch::{BatchOutcome, BatchProgress, BatchRunner, SilentBatchProgress, StopFlag};
pub use generator::DescriptionGenerator;
pub use llm::{GeminiModel, ModelError, TextModel};
pub use pipeline::EnrichmentPipeline;

#[cfg(test)]
pub(crate) mod test_support {
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use grimoire_scraper::{ImageFetcher, ImageResolver, http_client};
    use grimoire_search::{ImageSearch, PageLocator, SearchError, SearchKind, SearchProvider};
    use grimoire_shared::{HttpConfig, ImagePolicy};
    use url::Url;
    use uuid::Uuid;

    use crate::generator::DescriptionGenerator;
    use crate::llm::{ModelError, TextModel};
    use crate::pipeline::EnrichmentPipeline;

    pub fn temp_image_dir() -> PathBuf {
        std::env::temp_dir().join(format!("grimoire-core-test-{}", Uuid::now_v7()))
    }

    /// Search provider with one canned outcome per kind.
    pub struct ScriptedSearch {
        web: Result<Option<Url>, SearchError>,
        image: Result<Option<Url>, SearchError>,
        calls: Mutex<Vec<SearchKind>>,
    }

    impl ScriptedSearch {
        pub fn new(
            web: Result<Option<Url>, SearchError>,
            image: Result<Option<Url>, SearchError>,
        ) -> Arc<Self> {
            Arc::new(Self {
                web,
                image,
                calls: Mutex::new(Vec::new()),
            })
        }

        pub fn kinds(&self) -> Vec<SearchKind> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl SearchProvider for ScriptedSearch {
        async fn top_result(
            &self,
            _query: &str,
            kind: SearchKind,
        ) -> Result<Option<Url>, SearchError> {
            self.calls.lock().unwrap().push(kind);
            match kind {
                SearchKind::Web => self.web.clone(),
                SearchKind::Image => self.image.clone(),
            }
        }

        fn name(&self) -> &'static str {
            "scripted"
        }
    }

    /// Text model with one canned reply.
    pub struct ScriptedModel {
        reply: Result<String, ModelError>,
    }

    impl ScriptedModel {
        pub fn new(reply: Result<&str, ModelError>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
            })
        }
    }

    #[async_trait]
    impl TextModel for ScriptedModel {
        async fn complete(&self, _prompt: &str) -> Result<String, ModelError> {
            self.reply.clone()
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    /// Pipeline over the given stubs that may talk to local mock servers.
    pub fn pipeline_with(
        search: Arc<dyn SearchProvider>,
        model: Arc<dyn TextModel>,
        image_dir: &Path,
    ) -> EnrichmentPipeline {
        let client = http_client(&HttpConfig::default()).unwrap();
        EnrichmentPipeline::new(
            PageLocator::new(search.clone()),
            ImageResolver::new(client.clone(), ImagePolicy::default(), ImageSearch::new(search))
                .allow_private_hosts(),
            ImageFetcher::new(client, image_dir).allow_private_hosts(),
            DescriptionGenerator::new(model),
        )
    }
}
