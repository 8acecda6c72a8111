use std::collections::HashMap;

use crate::error::AdapterError;
use crate::gemini::GeminiClient;
use crate::models::ArticleResult;
use crate::registry::normalize_domain;

/// Returned without a model invocation when the search stage found nothing.
pub const NO_ARTICLES_MESSAGE: &str =
    "No relevant articles were found for this topic within the selected sources.";

const EMPTY_OUTPUT_FALLBACK: &str = "Analysis complete, but no text was generated.";

/// Per-article character cap in the prompt context.
const ARTICLE_TEXT_LIMIT: usize = 3000;

/// Produce an intelligence briefing for a topic from the retrieved articles.
/// An empty article list short-circuits to [`NO_ARTICLES_MESSAGE`].
pub async fn analyze_articles(
    gemini: &GeminiClient,
    model: &str,
    topic: &str,
    articles: &[ArticleResult],
    leanings: &HashMap<String, String>,
) -> Result<String, AdapterError> {
    if articles.is_empty() {
        return Ok(NO_ARTICLES_MESSAGE.to_string());
    }

    let prompt = build_prompt(topic, articles, leanings);
    let text = gemini.generate(model, &prompt).await?;
    if text.is_empty() {
        Ok(EMPTY_OUTPUT_FALLBACK.to_string())
    } else {
        Ok(text)
    }
}

fn leaning_for<'a>(domain: &str, leanings: &'a HashMap<String, String>) -> &'a str {
    let key = normalize_domain(domain);
    leanings
        .get(&key)
        .or_else(|| leanings.get(domain))
        .map(String::as_str)
        .unwrap_or("Unknown")
}

fn build_prompt(topic: &str, articles: &[ArticleResult], leanings: &HashMap<String, String>) -> String {
    let context = articles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            let leaning = leaning_for(&a.domain, leanings);
            let text: String = a.text.chars().take(ARTICLE_TEXT_LIMIT).collect();
            format!(
                "Source {n}\nDomain: {domain}\nLeaning: {leaning}\nTitle: {title}\nURL: {url}\nContent (truncated): {text}...",
                n = i + 1,
                domain = a.domain,
                title = a.title,
                url = a.url,
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    format!(
        "You are an expert intelligence analyst specializing in Iranian affairs.\n\
         \n\
         TOPIC: {topic}\n\
         \n\
         TASK:\n\
         Read the following Persian articles found on specific Iranian domains.\n\
         Produce a concise, decision-oriented intelligence briefing in English using Markdown.\n\
         \n\
         OUTPUT FORMAT (use these exact headings):\n\
         ## Executive Summary\n\
         (2-3 sentences)\n\
         \n\
         ## Narratives by Bloc\n\
         (Group by leaning when possible: Principlist, State, Reformist, Moderate, Economic. If Unknown, say so.)\n\
         \n\
         ## Key Themes\n\
         - Bullet points\n\
         \n\
         ## Significance\n\
         - **Level:** Low / Medium / High\n\
         - **Rationale:** 1-3 bullets referencing specific sources (Source 1, Source 2...)\n\
         \n\
         ## What to watch next\n\
         - Bullet points with concrete follow-up angles\n\
         \n\
         ## Sources\n\
         - A bullet list: Source N — Title (Domain) — URL\n\
         \n\
         RULES:\n\
         - Stay objective; do not add facts not supported by the provided text.\n\
         - When making a claim, reference sources like (Source 1) or (Sources 2-3).\n\
         - If the articles disagree, explicitly describe the disagreement.\n\
         \n\
         DATA:\n\
         {context}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_client(base_url: &str) -> GeminiClient {
        GeminiClient::new("test-key", Duration::from_secs(5))
            .unwrap()
            .with_base_url(base_url.to_string())
    }

    fn article(domain: &str, text: &str) -> ArticleResult {
        ArticleResult {
            title: "Headline".to_string(),
            url: format!("https://{domain}/a"),
            published_date: None,
            author: None,
            text: text.to_string(),
            domain: domain.to_string(),
        }
    }

    #[tokio::test]
    async fn empty_article_list_short_circuits_without_model_call() {
        let server = MockServer::start().await;

        Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

        let client = test_client(&server.uri());
        let summary = analyze_articles(&client, "gemini-test", "Nuclear Program", &[], &HashMap::new())
            .await
            .unwrap();
        assert_eq!(summary, NO_ARTICLES_MESSAGE);
    }

    #[tokio::test]
    async fn returns_model_summary() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": "## Executive Summary\nCoverage diverges." }] } }]
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let articles = vec![article("kayhan.ir", "متن مقاله")];
        let summary = analyze_articles(&client, "gemini-test", "Nuclear Program", &articles, &HashMap::new())
            .await
            .unwrap();
        assert!(summary.starts_with("## Executive Summary"));
    }

    #[tokio::test]
    async fn empty_model_output_yields_fallback_message() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": []
            })))
            .mount(&server)
            .await;

        let client = test_client(&server.uri());
        let articles = vec![article("kayhan.ir", "متن")];
        let summary = analyze_articles(&client, "gemini-test", "Nuclear Program", &articles, &HashMap::new())
            .await
            .unwrap();
        assert_eq!(summary, EMPTY_OUTPUT_FALLBACK);
    }

    #[test]
    fn prompt_truncates_long_articles() {
        let long_text = "x".repeat(ARTICLE_TEXT_LIMIT + 500);
        let articles = vec![article("kayhan.ir", &long_text)];
        let prompt = build_prompt("Topic", &articles, &HashMap::new());
        // The full article body never lands in the prompt.
        assert!(!prompt.contains(&long_text));
        assert!(prompt.contains(&"x".repeat(ARTICLE_TEXT_LIMIT)));
    }

    #[test]
    fn prompt_annotates_leanings_with_normalized_lookup() {
        let mut leanings = HashMap::new();
        leanings.insert("kayhan.ir".to_string(), "Principlist".to_string());

        let articles = vec![article("www.kayhan.ir", "متن"), article("mystery.ir", "متن")];
        let prompt = build_prompt("Topic", &articles, &leanings);
        assert!(prompt.contains("Leaning: Principlist"));
        assert!(prompt.contains("Leaning: Unknown"));
    }
}
