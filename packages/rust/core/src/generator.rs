//! Marketing copy generation.
//!
//! One prompt per product asks the model for two sections, introduced by
//! [`SHORT_MARKER`] and [`LONG_MARKER`]. The response is split on those
//! markers; anything else is replaced by fixed placeholder copy so the
//! export never carries a half-parsed answer.

use std::sync::Arc;

use tracing::{debug, instrument, warn};

use grimoire_shared::Descriptions;

use crate::llm::TextModel;

pub const SHORT_MARKER: &str = "[SHORT DESCRIPTION]";
pub const LONG_MARKER: &str = "[LONG DESCRIPTION HTML]";

const PARSE_FAILED_SHORT: &str = "Error extracting short description";
const PARSE_FAILED_LONG: &str = "<p>Error extracting long description.</p>";
const GENERATION_FAILED_SHORT: &str = "Error generating description";
const GENERATION_FAILED_LONG: &str = "<p>Error generating description.</p>";

/// Placeholder pair used when the model answered without both markers.
pub fn parse_failed() -> Descriptions {
    Descriptions {
        short: PARSE_FAILED_SHORT.to_string(),
        long: PARSE_FAILED_LONG.to_string(),
    }
}

/// Placeholder pair used when the model call itself failed.
pub fn generation_failed() -> Descriptions {
    Descriptions {
        short: GENERATION_FAILED_SHORT.to_string(),
        long: GENERATION_FAILED_LONG.to_string(),
    }
}

/// Whether a description pair is one of the placeholder pairs.
pub fn is_placeholder(short: &str, long: &str) -> bool {
    (short == PARSE_FAILED_SHORT && long == PARSE_FAILED_LONG)
        || (short == GENERATION_FAILED_SHORT && long == GENERATION_FAILED_LONG)
}

/// Asks a [`TextModel`] for short and long product descriptions.
#[derive(Clone)]
pub struct DescriptionGenerator {
    model: Arc<dyn TextModel>,
}

impl DescriptionGenerator {
    pub fn new(model: Arc<dyn TextModel>) -> Self {
        Self { model }
    }

    /// Generate descriptions for `name`. Never fails: model and parse
    /// failures yield their placeholder pairs.
    #[instrument(skip(self), fields(model = self.model.name()))]
    pub async fn generate(&self, name: &str) -> Descriptions {
        let prompt = build_prompt(name);

        match self.model.complete(&prompt).await {
            Ok(text) => parse_sections(&text).unwrap_or_else(|| {
                warn!("model response is missing section markers");
                parse_failed()
            }),
            Err(e) if e.is_quota() => {
                warn!(error = %e, "text model quota exceeded");
                generation_failed()
            }
            Err(e) => {
                warn!(error = %e, "description generation failed");
                generation_failed()
            }
        }
    }
}

/// Prompt asking for both sections for one product.
pub fn build_prompt(name: &str) -> String {
    format!(
        "For the product '{name}', write two distinct sales descriptions:\n\
         \n\
         {SHORT_MARKER}\n\
         (An attractive, direct summary of the product in 1 or 2 lines of plain text.)\n\
         \n\
         {LONG_MARKER}\n\
         (A complete e-commerce description formatted as HTML. Use <p> paragraphs, \
         <ul><li>...</li></ul> lists and <strong> to highlight key features. Do not \
         include <html> or <body> tags, only the inner HTML of a product container.)\n"
    )
}

/// Split a model response into its two sections.
///
/// The short section runs from the first [`SHORT_MARKER`] to the first
/// [`LONG_MARKER`] after it; the long section is everything after that.
/// Returns `None` when either marker is absent or out of order.
pub fn parse_sections(text: &str) -> Option<Descriptions> {
    let short_start = text.find(SHORT_MARKER)? + SHORT_MARKER.len();
    let long_offset = text[short_start..].find(LONG_MARKER)?;
    let short_end = short_start + long_offset;
    let long_start = short_end + LONG_MARKER.len();

    let descriptions = Descriptions {
        short: text[short_start..short_end].trim().to_string(),
        long: text[long_start..].trim().to_string(),
    };
    debug!(
        short_len = descriptions.short.len(),
        long_len = descriptions.long.len(),
        "parsed model sections"
    );
    Some(descriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ModelError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct CannedModel {
        reply: Result<String, ModelError>,
        prompts: Mutex<Vec<String>>,
    }

    impl CannedModel {
        fn new(reply: Result<&str, ModelError>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl TextModel for CannedModel {
        async fn complete(&self, prompt: &str) -> Result<String, ModelError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone()
        }

        fn name(&self) -> &str {
            "canned"
        }
    }

    #[test]
    fn prompt_names_product_and_markers() {
        let prompt = build_prompt("Drill Pro 500");
        assert!(prompt.contains("'Drill Pro 500'"));
        let short = prompt.find(SHORT_MARKER).unwrap();
        let long = prompt.find(LONG_MARKER).unwrap();
        assert!(short < long);
    }

    #[test]
    fn parses_both_sections() {
        let text = "Sure!\n[SHORT DESCRIPTION]\n  A great widget.  \n[LONG DESCRIPTION HTML]\n<p>Details.</p>\n";
        let parsed = parse_sections(text).unwrap();
        assert_eq!(parsed.short, "A great widget.");
        assert_eq!(parsed.long, "<p>Details.</p>");
    }

    #[test]
    fn missing_long_marker_is_none() {
        assert_eq!(parse_sections("[SHORT DESCRIPTION] only short"), None);
    }

    #[test]
    fn missing_short_marker_is_none() {
        assert_eq!(parse_sections("[LONG DESCRIPTION HTML]<p>x</p>"), None);
    }

    #[test]
    fn long_marker_before_short_is_none() {
        assert_eq!(
            parse_sections("[LONG DESCRIPTION HTML]<p>x</p>[SHORT DESCRIPTION] y"),
            None
        );
    }

    #[test]
    fn empty_sections_are_kept() {
        let parsed = parse_sections("[SHORT DESCRIPTION][LONG DESCRIPTION HTML]").unwrap();
        assert_eq!(parsed.short, "");
        assert_eq!(parsed.long, "");
    }

    #[test]
    fn placeholders_are_recognised() {
        let parse = parse_failed();
        let generation = generation_failed();
        assert!(is_placeholder(&parse.short, &parse.long));
        assert!(is_placeholder(&generation.short, &generation.long));
        assert!(!is_placeholder("Short.", "<p>Long.</p>"));
    }

    #[tokio::test]
    async fn generate_sends_one_prompt() {
        let model = CannedModel::new(Ok(
            "[SHORT DESCRIPTION] Short. [LONG DESCRIPTION HTML] <p>Long.</p>",
        ));
        let generator = DescriptionGenerator::new(model.clone());

        let descriptions = generator.generate("Widget").await;

        assert_eq!(descriptions.short, "Short.");
        assert_eq!(descriptions.long, "<p>Long.</p>");
        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("'Widget'"));
    }

    #[tokio::test]
    async fn unparsable_reply_gets_parse_placeholders() {
        let generator = DescriptionGenerator::new(CannedModel::new(Ok("no markers here")));
        assert_eq!(generator.generate("Widget").await, parse_failed());
    }

    #[tokio::test]
    async fn failed_call_gets_generation_placeholders() {
        let quota = DescriptionGenerator::new(CannedModel::new(Err(ModelError::QuotaExceeded(
            "daily limit".into(),
        ))));
        assert_eq!(quota.generate("Widget").await, generation_failed());

        let network = DescriptionGenerator::new(CannedModel::new(Err(ModelError::Request(
            "connection reset".into(),
        ))));
        let descriptions = network.generate("Widget").await;
        assert_eq!(descriptions.short, "Error generating description");
        assert_eq!(descriptions.long, "<p>Error generating description.</p>");
    }
}
