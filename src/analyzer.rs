use crate::error::{Error, Result};
use crate::extract::{clean_text, extract_html_text};
use crate::llm::ChatClient;
use futures::stream::{self, StreamExt};
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

pub const FETCH_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Context gathered from a URL list: the labeled page blocks plus how many
/// URLs contributed and how many were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContextBundle {
    pub content: String,
    pub fetched: usize,
    pub skipped: usize,
}

impl ContextBundle {
    fn push_page(&mut self, url: &str, text: &str) {
        self.content.push_str(&format!("\nContent summary for URL {}:\n", url));
        self.content.push_str(text);
        self.content.push_str("\n---\n");
        self.fetched += 1;
    }
}

pub fn build_prompt(question: &str, content: &str) -> String {
    format!(
        "Analyze the following content from the URLs and answer: {}\n\nContent:\n{}",
        question, content
    )
}

/// Answers questions using the text of the pages listed in a URL file as
/// context. Borrows the [`ChatClient`]; several analyzers can share one.
pub struct UrlAnalyzer<'a> {
    client: &'a ChatClient,
    urls_file: PathBuf,
    http: Client,
}

impl<'a> UrlAnalyzer<'a> {
    pub fn new(client: &'a ChatClient, urls_file: impl Into<PathBuf>) -> Self {
        Self {
            client,
            urls_file: urls_file.into(),
            http: Client::new(),
        }
    }

    pub fn urls_file(&self) -> &Path {
        &self.urls_file
    }

    pub async fn analyze(&self, question: &str) -> Result<String> {
        let urls = self.load_urls().await?;
        let bundle = self.collect_context(&urls).await?;

        tracing::info!(
            "Context collected from {} of {} URLs ({} skipped)",
            bundle.fetched,
            urls.len(),
            bundle.skipped
        );

        let prompt = build_prompt(question, &bundle.content);
        self.client.create_chat_completion(&prompt).await
    }

    /// Reads the URL list: every non-empty line is a URL candidate, taken
    /// verbatim apart from the line ending.
    pub async fn load_urls(&self) -> Result<Vec<String>> {
        let raw = tokio::fs::read_to_string(&self.urls_file)
            .await
            .map_err(|source| Error::FileAccess {
                path: self.urls_file.clone(),
                source,
            })?;

        let urls: Vec<String> = raw
            .lines()
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect();

        if urls.is_empty() {
            return Err(Error::NoUrlsFound {
                path: self.urls_file.clone(),
            });
        }

        tracing::info!(
            "Loaded {} URLs from {}",
            urls.len(),
            self.urls_file.display()
        );
        Ok(urls)
    }

    /// Fetches `urls` one after another. Pages that cannot be fetched are
    /// skipped; only a run where every page fails is an error.
    pub async fn collect_context(&self, urls: &[String]) -> Result<ContextBundle> {
        let total = urls.len();
        let bundle = stream::iter(urls.iter().enumerate())
            .then(|(index, url)| async move {
                tracing::info!("Processing URL {}/{}: {}", index + 1, total, url);
                (url, self.fetch_page(url).await)
            })
            .fold(ContextBundle::default(), |mut bundle, (url, page)| async move {
                match page {
                    Some(text) => bundle.push_page(url, &text),
                    None => bundle.skipped += 1,
                }
                bundle
            })
            .await;

        if bundle.content.is_empty() {
            return Err(Error::NoContentRetrieved);
        }
        Ok(bundle)
    }

    async fn fetch_page(&self, url: &str) -> Option<String> {
        let host = extract_host(url);

        let response = match self
            .http
            .get(url)
            .header(USER_AGENT, FETCH_USER_AGENT)
            .header(ACCEPT, "text/html")
            .timeout(FETCH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, host = ?host, error = %e, "Failed to fetch URL, skipping");
                return None;
            }
        };

        if response.status() != StatusCode::OK {
            tracing::warn!(
                url,
                status = response.status().as_u16(),
                "URL returned non-OK status, skipping"
            );
            return None;
        }

        let body = match response.text().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(url, error = %e, "Failed to read HTML body, skipping");
                return None;
            }
        };

        let text = clean_text(&extract_html_text(&body));
        tracing::debug!(url, chars = text.chars().count(), "Extracted page text");
        Some(text)
    }
}

fn extract_host(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(|s| s.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ClientOption;
    use mockito::{Matcher, Server};
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_urls(lines: &[&str]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        file
    }

    fn client_for(server: &Server) -> ChatClient {
        ChatClient::new("sk-test", [ClientOption::BaseUrl(server.url())]).unwrap()
    }

    #[tokio::test]
    async fn missing_file_is_a_file_access_error() {
        let client = ChatClient::new("sk-test", Vec::new()).unwrap();
        let analyzer = UrlAnalyzer::new(&client, "/definitely/not/here/urls.txt");
        let err = analyzer.analyze("anything").await.unwrap_err();
        assert!(matches!(err, Error::FileAccess { .. }), "got {:?}", err);
    }

    #[tokio::test]
    async fn blank_url_file_fails_before_any_request() {
        let mut server = Server::new_async().await;
        let api = server
            .mock("POST", "/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let file = write_urls(&["", "", ""]);
        let client = client_for(&server);
        let analyzer = UrlAnalyzer::new(&client, file.path());
        let err = analyzer.analyze("question").await.unwrap_err();
        assert!(matches!(err, Error::NoUrlsFound { .. }), "got {:?}", err);
        api.assert_async().await;
    }

    #[tokio::test]
    async fn loads_non_empty_lines_in_order() {
        let file = write_urls(&["http://a.example", "", "http://b.example\r"]);
        let client = ChatClient::new("sk-test", Vec::new()).unwrap();
        let analyzer = UrlAnalyzer::new(&client, file.path());
        assert_eq!(
            analyzer.load_urls().await.unwrap(),
            vec!["http://a.example".to_string(), "http://b.example".to_string()]
        );
    }

    #[tokio::test]
    async fn whitespace_lines_are_kept_as_candidates() {
        let file = write_urls(&["   ", "  http://a.example  "]);
        let client = ChatClient::new("sk-test", Vec::new()).unwrap();
        let analyzer = UrlAnalyzer::new(&client, file.path());
        assert_eq!(
            analyzer.load_urls().await.unwrap(),
            vec!["   ".to_string(), "  http://a.example  ".to_string()]
        );
    }

    #[tokio::test]
    async fn whitespace_only_file_reaches_the_fetch_loop() {
        let mut server = Server::new_async().await;
        let api = server
            .mock("POST", "/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let file = write_urls(&["   ", "\t"]);
        let client = client_for(&server);
        let analyzer = UrlAnalyzer::new(&client, file.path());
        let err = analyzer.analyze("question").await.unwrap_err();
        assert!(matches!(err, Error::NoContentRetrieved), "got {:?}", err);
        api.assert_async().await;
    }

    #[tokio::test]
    async fn all_fetches_failing_is_no_content() {
        let mut server = Server::new_async().await;
        let _missing = server
            .mock("GET", "/missing")
            .with_status(404)
            .create_async()
            .await;
        let api = server
            .mock("POST", "/chat/completions")
            .expect(0)
            .create_async()
            .await;

        let missing = format!("{}/missing", server.url());
        let file = write_urls(&["http://127.0.0.1:1/unreachable", missing.as_str(), "not a url"]);
        let client = client_for(&server);
        let analyzer = UrlAnalyzer::new(&client, file.path());
        let err = analyzer.analyze("question").await.unwrap_err();
        assert!(matches!(err, Error::NoContentRetrieved), "got {:?}", err);
        api.assert_async().await;
    }

    #[tokio::test]
    async fn collects_labeled_blocks_and_skips_failures() {
        let mut server = Server::new_async().await;
        let page = server
            .mock("GET", "/hello")
            .match_header("user-agent", FETCH_USER_AGENT)
            .match_header("accept", "text/html")
            .with_status(200)
            .with_header("content-type", "text/html")
            .with_body("<p>Hello   world</p>")
            .create_async()
            .await;
        let _broken = server
            .mock("GET", "/broken")
            .with_status(500)
            .create_async()
            .await;

        let hello = format!("{}/hello", server.url());
        let broken = format!("{}/broken", server.url());
        let client = client_for(&server);
        let analyzer = UrlAnalyzer::new(&client, "unused.txt");

        let bundle = analyzer
            .collect_context(&[broken.clone(), hello.clone()])
            .await
            .unwrap();
        assert_eq!(
            bundle.content,
            format!("\nContent summary for URL {}:\nHello world\n---\n", hello)
        );
        assert_eq!(bundle.fetched, 1);
        assert_eq!(bundle.skipped, 1);
        page.assert_async().await;
    }

    #[tokio::test]
    async fn analyze_sends_prompt_with_context() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/hello")
            .with_status(200)
            .with_body("<html><body><p>Hello   world</p></body></html>")
            .create_async()
            .await;
        let api = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("What does the page say\\?".to_string()),
                Matcher::Regex("Content summary for URL".to_string()),
                Matcher::Regex("Hello world".to_string()),
            ]))
            .with_status(200)
            .with_body(
                r#"{"id":"c","object":"chat.completion","created":1,"choices":[{"message":{"role":"assistant","content":"It greets the world."}}]}"#,
            )
            .create_async()
            .await;

        let hello = format!("{}/hello", server.url());
        let file = write_urls(&[hello.as_str()]);
        let client = client_for(&server);
        let analyzer = UrlAnalyzer::new(&client, file.path());

        let answer = analyzer.analyze("What does the page say?").await.unwrap();
        assert_eq!(answer, "It greets the world.");
        api.assert_async().await;
    }

    #[tokio::test]
    async fn api_errors_propagate_unchanged() {
        let mut server = Server::new_async().await;
        let _page = server
            .mock("GET", "/hello")
            .with_status(200)
            .with_body("<p>hi</p>")
            .create_async()
            .await;
        let _api = server
            .mock("POST", "/chat/completions")
            .with_status(503)
            .create_async()
            .await;

        let hello = format!("{}/hello", server.url());
        let file = write_urls(&[hello.as_str()]);
        let client = client_for(&server);
        let err = UrlAnalyzer::new(&client, file.path())
            .analyze("q")
            .await
            .unwrap_err();
        assert_eq!(err.as_api_error().map(|e| e.code), Some(503));
    }

    #[test]
    fn prompt_embeds_question_and_content() {
        let prompt = build_prompt("Why?", "\nContent summary for URL u:\ntext\n---\n");
        assert!(prompt.starts_with("Analyze the following content from the URLs and answer: Why?"));
        assert!(prompt.ends_with("Content:\n\nContent summary for URL u:\ntext\n---\n"));
    }

    #[test]
    fn extracts_host_for_logging() {
        assert_eq!(
            extract_host("https://docs.rs/scraper").as_deref(),
            Some("docs.rs")
        );
        assert!(extract_host("not a url").is_none());
    }
}
