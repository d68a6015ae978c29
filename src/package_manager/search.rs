//! 远程索引搜索：请求 PyPI 搜索页并从 HTML 片段中提取结果
//!
//! 解析依赖页面的具体标记（结果列表 `<ul>` 与分页 `<div>` 的原文属性），
//! 页面改版后这里是唯一需要调整的地方。

use super::types::{SearchResultItem, SearchResultPage};
use crate::error::{PipError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use regex::Regex;
use reqwest::Client;
use std::sync::OnceLock;
use url::Url;

/// 关键词为空时附加的分类过滤，使默认列表稳定
pub const DEFAULT_CATEGORY: &str = "Development Status :: 5 - Production/Stable";

#[async_trait]
pub trait IndexSearch: Send + Sync {
    async fn search_remote_index(&self, keyword: &str, page: u32) -> Result<SearchResultPage>;
}

/// 基于 reqwest 的 PyPI 搜索
pub struct PypiIndex {
    client: Client,
    search_url: String,
}

impl PypiIndex {
    pub fn new(search_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            search_url: search_url.into(),
        }
    }

    pub fn search_url(&self, keyword: &str, page: u32) -> Result<Url> {
        let mut url = Url::parse(&self.search_url).map_err(|e| PipError::Parse {
            message: format!("无效的搜索地址 {}: {}", self.search_url, e),
        })?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", keyword);
            query.append_pair("page", &page.to_string());
            if keyword.is_empty() {
                query.append_pair("c", DEFAULT_CATEGORY);
            }
        }
        Ok(url)
    }
}

#[async_trait]
impl IndexSearch for PypiIndex {
    async fn search_remote_index(&self, keyword: &str, page: u32) -> Result<SearchResultPage> {
        let url = self.search_url(keyword, page)?;
        log::debug!("GET {}", url);

        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        parse_search_page(&body, page)
    }
}

fn pattern(cell: &'static OnceLock<Regex>, re: &str) -> &'static Regex {
    cell.get_or_init(|| Regex::new(re).unwrap())
}

fn results_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    pattern(
        &PATTERN,
        r#"(?s)<ul class="unstyled" aria-label="Search results">.*?</ul>"#,
    )
}

fn pagination_block() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    pattern(
        &PATTERN,
        r#"(?s)<div class="button-group button-group--pagination">.*?</div>"#,
    )
}

fn element(name: &'static str) -> &'static Regex {
    static LI: OnceLock<Regex> = OnceLock::new();
    static SPAN: OnceLock<Regex> = OnceLock::new();
    static P: OnceLock<Regex> = OnceLock::new();
    static A: OnceLock<Regex> = OnceLock::new();
    match name {
        "li" => pattern(&LI, r"(?s)<li\b[^>]*>(.*?)</li>"),
        "span" => pattern(&SPAN, r"(?s)<span\b[^>]*>(.*?)</span>"),
        "p" => pattern(&P, r"(?s)<p\b[^>]*>(.*?)</p>"),
        _ => pattern(&A, r"(?s)<a\b[^>]*>(.*?)</a>"),
    }
}

fn time_attr() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    pattern(&PATTERN, r#"<time\b[^>]*\bdatetime="([^"]*)""#)
}

fn tag() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    pattern(&PATTERN, r"<[^>]*>")
}

/// 去掉标签、解码实体并压缩空白
fn inner_text(markup: &str) -> String {
    let stripped = tag().replace_all(markup, "");
    decode_entities(&stripped)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn entity() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    pattern(&PATTERN, r"&(#[xX][0-9a-fA-F]+|#[0-9]+|[A-Za-z][A-Za-z0-9]*);")
}

fn named_entity(name: &str) -> Option<&'static str> {
    let s = match name {
        "amp" => "&",
        "lt" => "<",
        "gt" => ">",
        "quot" => "\"",
        "apos" => "'",
        "nbsp" => " ",
        "ndash" => "\u{2013}",
        "mdash" => "\u{2014}",
        "lsquo" => "\u{2018}",
        "rsquo" => "\u{2019}",
        "ldquo" => "\u{201C}",
        "rdquo" => "\u{201D}",
        "hellip" => "\u{2026}",
        "copy" => "\u{00A9}",
        "reg" => "\u{00AE}",
        "trade" => "\u{2122}",
        _ => return None,
    };
    Some(s)
}

/// 解码命名实体与数字实体；无法识别的原样保留
fn decode_entities(text: &str) -> String {
    if !text.contains('&') {
        return text.to_string();
    }
    entity()
        .replace_all(text, |caps: &regex::Captures| {
            let body = &caps[1];
            let decoded = match body.strip_prefix('#') {
                Some(num) => num
                    .strip_prefix(['x', 'X'])
                    .map(|hex| u32::from_str_radix(hex, 16))
                    .unwrap_or_else(|| num.parse())
                    .ok()
                    .and_then(char::from_u32)
                    .map(String::from),
                None => named_entity(body).map(str::to_string),
            };
            decoded.unwrap_or_else(|| caps[0].to_string())
        })
        .into_owned()
}

fn parse_released(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%z")
        .or_else(|_| DateTime::parse_from_rfc3339(value))
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// 解析一行结果：h3 中依次为名称、版本、发布时间，p 为简介
fn parse_result_row(row: &str) -> Option<SearchResultItem> {
    let spans: Vec<&str> = element("span")
        .captures_iter(row)
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();

    let name = inner_text(spans.first()?);
    if name.is_empty() {
        return None;
    }
    let version = spans.get(1).map(|s| inner_text(s)).unwrap_or_default();
    let released = spans
        .get(2)
        .and_then(|s| time_attr().captures(s))
        .and_then(|c| parse_released(&c[1]));
    let detail = element("p")
        .captures(row)
        .map(|c| inner_text(&c[1]))
        .unwrap_or_default();

    Some(SearchResultItem {
        name,
        description: version.clone(),
        version,
        detail,
        released,
    })
}

/// 分页区倒数第二个链接为最后一页页码
fn parse_total_pages(pagination: &str) -> u32 {
    let links: Vec<String> = element("a")
        .captures_iter(pagination)
        .map(|c| inner_text(&c[1]))
        .collect();

    links
        .len()
        .checked_sub(2)
        .and_then(|i| links[i].parse::<u32>().ok())
        .filter(|&n| n > 0)
        .unwrap_or(1)
}

/// 从搜索页 HTML 中提取结果列表与总页数；总页数不小于 `page`
pub fn parse_search_page(html: &str, page: u32) -> Result<SearchResultPage> {
    let results = results_block().find(html).ok_or(PipError::NoResult)?;

    let list = element("li")
        .captures_iter(results.as_str())
        .filter_map(|c| parse_result_row(&c[1]))
        .collect();

    let total_pages = pagination_block()
        .find(html)
        .map(|m| parse_total_pages(m.as_str()))
        .unwrap_or(1)
        .max(page);

    Ok(SearchResultPage { list, total_pages })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<form action="/search/"><input name="q"></form>
<ul class="unstyled" aria-label="Search results">
  <li>
    <a class="package-snippet" href="/project/requests/">
      <h3 class="package-snippet__title">
        <span class="package-snippet__name">requests</span>
        <span class="package-snippet__version">2.31.0</span>
        <span class="package-snippet__created"><time datetime="2023-05-22T15:12:42+0000" data-controller="localized-time">May 22, 2023</time></span>
      </h3>
      <p class="package-snippet__description">Python HTTP for Humans.</p>
    </a>
  </li>
  <li>
    <a class="package-snippet" href="/project/requests-oauthlib/">
      <h3 class="package-snippet__title">
        <span class="package-snippet__name">requests-oauthlib</span>
        <span class="package-snippet__version">1.3.1</span>
        <span class="package-snippet__created"><time datetime="2022-01-29T01:36:22+0000">Jan 29, 2022</time></span>
      </h3>
      <p class="package-snippet__description">OAuthlib authentication support for Requests &amp; friends.</p>
    </a>
  </li>
</ul>
<div class="button-group button-group--pagination">
  <a href="/search/?q=requests&amp;page=1" class="button button-group__button">Previous</a>
  <a href="/search/?q=requests&amp;page=1" class="button button-group__button button--primary">1</a>
  <a href="/search/?q=requests&amp;page=2" class="button button-group__button">2</a>
  <a href="/search/?q=requests&amp;page=42" class="button button-group__button">42</a>
  <a href="/search/?q=requests&amp;page=2" class="button button-group__button">Next</a>
</div>
</body></html>"#;

    #[test]
    fn test_parse_results() {
        let page = parse_search_page(PAGE, 1).unwrap();
        assert_eq!(page.list.len(), 2);
        assert_eq!(page.total_pages, 42);

        let first = &page.list[0];
        assert_eq!(first.name, "requests");
        assert_eq!(first.version, "2.31.0");
        assert_eq!(first.description, "2.31.0");
        assert_eq!(first.detail, "Python HTTP for Humans.");
        assert_eq!(
            first.released.map(|d| d.to_rfc3339()),
            Some("2023-05-22T15:12:42+00:00".to_string())
        );
        assert_eq!(
            page.list[1].detail,
            "OAuthlib authentication support for Requests & friends."
        );
    }

    #[test]
    fn test_missing_results_block() {
        let err = parse_search_page("<html><p>There were no results</p></html>", 1).unwrap_err();
        assert!(matches!(err, PipError::NoResult));
    }

    #[test]
    fn test_total_pages_floor() {
        assert_eq!(parse_search_page(PAGE, 50).unwrap().total_pages, 50);

        let without_pagination = PAGE.split("<div class=\"button-group").next().unwrap();
        assert_eq!(parse_search_page(without_pagination, 1).unwrap().total_pages, 1);
        assert_eq!(parse_search_page(without_pagination, 3).unwrap().total_pages, 3);
    }

    #[test]
    fn test_total_pages_not_numeric() {
        let html = r#"<ul class="unstyled" aria-label="Search results"></ul>
<div class="button-group button-group--pagination"><a>Previous</a><a>Next</a></div>"#;
        let page = parse_search_page(html, 1).unwrap();
        assert!(page.list.is_empty());
        assert_eq!(page.total_pages, 1);
    }

    #[test]
    fn test_search_url_with_category_only_for_empty_keyword() {
        let index = PypiIndex::new("https://pypi.org/search/");
        let url = index.search_url("flask", 2).unwrap();
        assert_eq!(url.as_str(), "https://pypi.org/search/?q=flask&page=2");

        let url = index.search_url("", 1).unwrap();
        let pairs: Vec<(String, String)> = url.query_pairs().into_owned().collect();
        assert_eq!(pairs[2], ("c".to_string(), DEFAULT_CATEGORY.to_string()));
    }

    #[test]
    fn test_decode_entities() {
        assert_eq!(decode_entities("a &amp; b &#39;c&#x27; &bogus; &"), "a & b 'c' &bogus; &");
    }

    #[test]
    fn test_decode_long_and_numeric_entities() {
        assert_eq!(decode_entities("&#128512; &#x1F600; &hellip;"), "\u{1F600} \u{1F600} \u{2026}");
        assert_eq!(decode_entities("&#99999999999; &unknownentity;"), "&#99999999999; &unknownentity;");
        assert_eq!(decode_entities("a&b; c & d"), "a&b; c & d");
    }

    /// 本地 HTTP 服务，对第一个请求返回给定状态与正文
    async fn serve_once(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut buf).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => request.extend_from_slice(&buf[..n]),
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{}/search/", addr)
    }

    #[tokio::test]
    async fn test_remote_index_parses_served_page() {
        let index = PypiIndex::new(serve_once("200 OK", PAGE).await);
        let page = index.search_remote_index("requests", 1).await.unwrap();
        assert_eq!(page.list.len(), 2);
        assert_eq!(page.list[0].name, "requests");
        assert_eq!(page.list[1].detail, "OAuthlib authentication support for Requests & friends.");
        assert_eq!(page.total_pages, 42);
    }

    #[tokio::test]
    async fn test_remote_index_error_status() {
        let index = PypiIndex::new(serve_once("500 Internal Server Error", "oops").await);
        let err = index.search_remote_index("requests", 1).await.unwrap_err();
        assert!(matches!(err, PipError::Http(_)));
    }

    #[tokio::test]
    async fn test_remote_index_page_without_results() {
        let index = PypiIndex::new(serve_once("200 OK", "<html><body>maintenance</body></html>").await);
        let err = index.search_remote_index("requests", 1).await.unwrap_err();
        assert!(matches!(err, PipError::NoResult));
    }
}
