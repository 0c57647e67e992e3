use std::sync::OnceLock;

use regex::Regex;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::MediaSearchError;
use crate::core::config::MediaSettings;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: &'static str,
}

/// Google Custom Search when both keys are configured and it returns
/// anything; DuckDuckGo otherwise.
pub async fn perform_search(
    client: &Client,
    settings: &MediaSettings,
    query: &str,
) -> Result<Vec<SearchResult>, MediaSearchError> {
    let api_key = settings.google_search_api_key.as_deref().unwrap_or("");
    let engine_id = settings.google_search_engine_id.as_deref().unwrap_or("");

    if !api_key.is_empty() && !engine_id.is_empty() {
        match google_search(client, query, api_key, engine_id).await {
            Ok(results) if !results.is_empty() => return Ok(results),
            Ok(_) => debug!("Google search returned nothing; trying DuckDuckGo"),
            Err(err) => debug!(error = %err, "Google search failed; trying DuckDuckGo"),
        }
    }

    duckduckgo_search(client, query).await
}

/// Searches for `"{query} filetype:pdf"` and keeps links that look like PDFs.
pub async fn search_pdfs(
    client: &Client,
    settings: &MediaSettings,
    query: &str,
    limit: usize,
) -> Result<Vec<SearchResult>, MediaSearchError> {
    let results = perform_search(client, settings, &format!("{} filetype:pdf", query)).await?;
    Ok(keep_pdf_links(results, limit))
}

pub fn keep_pdf_links(results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    results
        .into_iter()
        .filter(|r| r.url.to_lowercase().contains("pdf"))
        .take(limit)
        .collect()
}

async fn google_search(
    client: &Client,
    query: &str,
    api_key: &str,
    engine_id: &str,
) -> Result<Vec<SearchResult>, MediaSearchError> {
    let url = format!(
        "https://www.googleapis.com/customsearch/v1?key={}&cx={}&q={}",
        api_key,
        engine_id,
        urlencoding::encode(query)
    );

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(MediaSearchError::Status {
            provider: "google",
            status: response.status().as_u16(),
        });
    }

    let payload: Value = response.json().await?;
    Ok(parse_google_items(&payload))
}

fn parse_google_items(payload: &Value) -> Vec<SearchResult> {
    let Some(items) = payload.get("items").and_then(|v| v.as_array()) else {
        return Vec::new();
    };

    let mut results = Vec::new();
    for item in items {
        let title = item.get("title").and_then(|v| v.as_str()).unwrap_or("");
        let url = item.get("link").and_then(|v| v.as_str()).unwrap_or("");
        let snippet = item.get("snippet").and_then(|v| v.as_str()).unwrap_or("");
        if !title.is_empty() && !url.is_empty() {
            results.push(SearchResult {
                title: title.to_string(),
                url: url.to_string(),
                snippet: snippet.to_string(),
                source: "Google Search",
            });
        }
    }
    results
}

async fn duckduckgo_search(
    client: &Client,
    query: &str,
) -> Result<Vec<SearchResult>, MediaSearchError> {
    let url = format!(
        "https://html.duckduckgo.com/html/?q={}",
        urlencoding::encode(query)
    );

    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(MediaSearchError::Status {
            provider: "duckduckgo",
            status: response.status().as_u16(),
        });
    }

    let html = response.text().await?;
    Ok(parse_duckduckgo_html(&html))
}

fn result_link_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<a[^>]*class="result__a"[^>]*href="([^"]+)"[^>]*>(.*?)</a>"#).ok()
    })
    .as_ref()
}

fn snippet_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"class="result__snippet"[^>]*>(.*?)</a>"#).ok())
        .as_ref()
}

fn tag_regex() -> Option<&'static Regex> {
    static RE: OnceLock<Option<Regex>> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]+>").ok()).as_ref()
}

fn strip_tags(fragment: &str) -> String {
    let text = match tag_regex() {
        Some(re) => re.replace_all(fragment, "").into_owned(),
        None => fragment.to_string(),
    };
    text.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#x27;", "'")
        .trim()
        .to_string()
}

/// Result links on the HTML endpoint are redirects carrying the target in
/// the `uddg` parameter.
fn resolve_redirect(href: &str) -> String {
    let href = href.replace("&amp;", "&");
    if let Some(start) = href.find("uddg=") {
        let encoded = href[start + 5..].split('&').next().unwrap_or("");
        if let Ok(decoded) = urlencoding::decode(encoded) {
            return decoded.into_owned();
        }
    }
    if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href
    }
}

fn parse_duckduckgo_html(html: &str) -> Vec<SearchResult> {
    let (Some(links), Some(snippets)) = (result_link_regex(), snippet_regex()) else {
        return Vec::new();
    };

    let snippets: Vec<String> = snippets
        .captures_iter(html)
        .map(|caps| strip_tags(&caps[1]))
        .collect();

    links
        .captures_iter(html)
        .enumerate()
        .filter_map(|(index, caps)| {
            let url = resolve_redirect(&caps[1]);
            let title = strip_tags(&caps[2]);
            if url.is_empty() || title.is_empty() {
                return None;
            }
            Some(SearchResult {
                title,
                url,
                snippet: snippets.get(index).cloned().unwrap_or_default(),
                source: "DuckDuckGo Search",
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DDG_PAGE: &str = r#"
<div class="result">
  <a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fncert.nic.in%2Fpdf%2Fncf2023.pdf&amp;rut=abc">NCF <b>2023</b> Foundational Stage</a>
  <a class="result__snippet" href="x">National Curriculum <b>Framework</b></a>
</div>
<div class="result">
  <a rel="nofollow" class="result__a" href="https://example.org/blog/fractions">Teaching fractions</a>
  <a class="result__snippet" href="y">A blog post</a>
</div>
"#;

    #[test]
    fn duckduckgo_html_is_parsed_and_redirects_resolved() {
        let results = parse_duckduckgo_html(DDG_PAGE);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].url, "https://ncert.nic.in/pdf/ncf2023.pdf");
        assert_eq!(results[0].title, "NCF 2023 Foundational Stage");
        assert_eq!(results[0].snippet, "National Curriculum Framework");
        assert_eq!(results[1].url, "https://example.org/blog/fractions");
    }

    #[test]
    fn only_pdf_links_are_kept() {
        let kept = keep_pdf_links(parse_duckduckgo_html(DDG_PAGE), 5);
        assert_eq!(kept.len(), 1);
        assert!(kept[0].url.ends_with(".pdf"));
    }

    #[test]
    fn google_items_without_link_are_dropped() {
        let payload = json!({
            "items": [
                { "title": "NCF", "link": "https://a.example/ncf.pdf", "snippet": "s" },
                { "title": "No link" }
            ]
        });
        let results = parse_google_items(&payload);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].source, "Google Search");
    }
}
