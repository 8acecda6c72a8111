use crate::error::AdapterError;
use crate::gemini::GeminiClient;

/// Translate a monitoring topic into a Persian search query. Empty model
/// output falls back to the original topic rather than producing a blank
/// query.
pub async fn translate_topic(gemini: &GeminiClient, model: &str, topic: &str) -> Result<String, AdapterError> {
    let prompt = format!(
        "Translate this monitoring topic '{topic}' into a high-quality Persian search query \
         optimized for finding news articles in Iranian media. \
         Return ONLY the Persian string, no explanations or quotes."
    );

    let text = gemini.generate(model, &prompt).await?;
    if text.is_empty() {
        Ok(topic.trim().to_string())
    } else {
        Ok(text)
    }
}
