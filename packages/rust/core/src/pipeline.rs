//! Per-product enrichment: page → image → download → descriptions → record.

use std::sync::Arc;

use tracing::{info, instrument};

use grimoire_scraper::{ImageFetcher, ImageResolver, http_client};
use grimoire_search::{GoogleSearch, ImageSearch, PageLocator, SearchProvider};
use grimoire_shared::{
    AppConfig, Credentials, EnrichmentResult, ImageSource, ProductInput, Result, RunSettings,
    Throttle,
};

use crate::generator::DescriptionGenerator;
use crate::llm::{GeminiModel, TextModel};

/// Composes the enrichment components for one product at a time.
///
/// `enrich` is total: every external failure is absorbed by the component
/// that hit it, so each input yields exactly one record.
pub struct EnrichmentPipeline {
    locator: PageLocator,
    resolver: ImageResolver,
    fetcher: ImageFetcher,
    generator: DescriptionGenerator,
}

impl EnrichmentPipeline {
    pub fn new(
        locator: PageLocator,
        resolver: ImageResolver,
        fetcher: ImageFetcher,
        generator: DescriptionGenerator,
    ) -> Self {
        Self {
            locator,
            resolver,
            fetcher,
            generator,
        }
    }

    /// Wire the production components: Google search, the scraping HTTP
    /// client and Gemini. One throttle per API is shared by every call.
    pub fn from_config(
        config: &AppConfig,
        settings: &RunSettings,
        credentials: &Credentials,
    ) -> Result<Self> {
        let search_throttle = Arc::new(Throttle::per_minute(
            "search",
            config.search.requests_per_minute,
        ));
        let model_throttle = Arc::new(Throttle::per_minute(
            "gemini",
            config.gemini.requests_per_minute,
        ));

        let search: Arc<dyn SearchProvider> =
            Arc::new(GoogleSearch::new(&config.search, credentials, search_throttle)?);
        let model: Arc<dyn TextModel> =
            Arc::new(GeminiModel::new(&config.gemini, credentials, model_throttle)?);
        let client = http_client(&config.http)?;

        Ok(Self::new(
            PageLocator::new(search.clone()),
            ImageResolver::new(
                client.clone(),
                config.image_policy.clone(),
                ImageSearch::new(search),
            ),
            ImageFetcher::new(client, &settings.image_dir),
            DescriptionGenerator::new(model),
        ))
    }

    /// Enrich one product.
    #[instrument(skip_all, fields(sku = %input.sku, name = %input.name))]
    pub async fn enrich(&self, input: &ProductInput) -> EnrichmentResult {
        let page = self.locator.locate(&input.name).await;

        let image = ImageSource::from(self.resolver.resolve(page.as_ref(), &input.name).await);
        if image == ImageSource::NotFound {
            info!("no image found after all attempts");
        }

        let local_image = self.fetcher.fetch(&image, &input.sku).await;
        let descriptions = self.generator.generate(&input.name).await;

        EnrichmentResult::new(input.clone(), page, image, local_image, descriptions)
    }
}
