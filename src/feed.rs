use std::time::Duration;

use quick_xml::events::Event;
use quick_xml::Reader;
use reqwest::{header, Client, StatusCode};
use tracing::{debug, warn};

use crate::config::Config;
use crate::error::FeedError;

/// Outcome of a single feed poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedResult {
    Success(u32),
    AuthRequired,
    TransientError,
}

pub struct FeedClient {
    client: Client,
    feed_url: String,
    cookie: Option<String>,
}

impl FeedClient {
    pub fn new(config: &Config) -> Result<Self, FeedError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("GmailCounter/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            feed_url: config.feed_url.clone(),
            cookie: config.cookie.clone(),
        })
    }

    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    /// Issue one GET against the feed and classify the response.
    pub async fn fetch(&self) -> FeedResult {
        debug!("Fetching feed: {}", self.feed_url);

        let mut request = self.client.get(&self.feed_url);
        if let Some(cookie) = &self.cookie {
            request = request.header(header::COOKIE, cookie);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                warn!("Feed request failed: {}", e);
                return FeedResult::TransientError;
            }
        };

        let status = response.status();
        debug!("Request status: {}", status.as_u16());

        match status {
            StatusCode::OK => match response.text().await {
                Ok(body) => Self::classify_body(&body),
                Err(e) => {
                    warn!("Failed to read feed body: {}", e);
                    FeedResult::TransientError
                }
            },
            StatusCode::UNAUTHORIZED => FeedResult::AuthRequired,
            other => {
                warn!("Unexpected feed status {}, retrying on next tick", other);
                FeedResult::TransientError
            }
        }
    }

    /// A 200 body without a readable count is treated like a server hiccup.
    pub fn classify_body(body: &str) -> FeedResult {
        match Self::parse_fullcount(body) {
            Ok(count) => FeedResult::Success(count),
            Err(e) => {
                warn!("Ignoring malformed feed response: {}", e);
                FeedResult::TransientError
            }
        }
    }

    pub fn parse_fullcount(xml: &str) -> Result<u32, FeedError> {
        let text = Self::first_element_text(xml, "fullcount")?.ok_or(FeedError::MissingCount)?;
        text.parse::<u32>()
            .map_err(|_| FeedError::MalformedCount(text))
    }

    /// Trimmed, unescaped text of the first element whose local name is `tag`.
    pub fn first_element_text(xml: &str, tag: &str) -> Result<Option<String>, FeedError> {
        let mut reader = Reader::from_str(xml);
        let mut text: Option<String> = None;

        loop {
            match reader.read_event()? {
                Event::Start(e) if text.is_none() && e.local_name().as_ref() == tag.as_bytes() => {
                    text = Some(String::new());
                }
                Event::Empty(e) if e.local_name().as_ref() == tag.as_bytes() => {
                    return Ok(Some(String::new()));
                }
                Event::Text(t) => {
                    if let Some(buf) = text.as_mut() {
                        buf.push_str(&t.unescape()?);
                    }
                }
                Event::CData(t) => {
                    if let Some(buf) = text.as_mut() {
                        buf.push_str(&String::from_utf8_lossy(&t));
                    }
                }
                Event::End(e) if e.local_name().as_ref() == tag.as_bytes() => {
                    if let Some(buf) = text {
                        return Ok(Some(buf.trim().to_string()));
                    }
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }
}
