//! Headless browser navigation
//!
//! Every call launches its own Chromium process, performs one action,
//! captures a full-page screenshot and the visible page text, then tears
//! the browser down whether or not the action succeeded.

use super::{optional_str, require_str, soft_fail, Tool};
use crate::error::AgentError;
use crate::models::ToolParams;
use crate::Result;
use chrono::{DateTime, Local};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::ScreenshotParams;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

/// Characters of page text handed back to the model
pub const TEXT_LIMIT: usize = 5000;
/// Buttons and links each
pub const ELEMENT_LIMIT: usize = 10;

const SESSION_TIMEOUT: Duration = Duration::from_secs(90);
const SETTLE_DELAY: Duration = Duration::from_millis(750);

const TEXT_SCRIPT: &str = "document.body ? document.body.innerText : ''";

const ELEMENTS_SCRIPT: &str = r#"(() => {
  const clean = s => (s || '').replace(/\s+/g, ' ').trim();
  const buttons = Array.from(document.querySelectorAll('button'))
    .map(b => clean(b.innerText))
    .filter(t => t.length > 0);
  const links = Array.from(document.querySelectorAll('a'))
    .map(a => ({ text: clean(a.innerText), href: a.getAttribute('href') }))
    .filter(l => l.text.length > 0);
  return JSON.stringify({ buttons, links });
})()"#;

const SCROLL_SCRIPT: &str = "window.scrollBy(0, window.innerHeight)";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserAction {
    Visit {
        url: String,
    },
    Click {
        url: Option<String>,
        selector: String,
    },
    Type {
        url: Option<String>,
        selector: String,
        text: String,
    },
    Scroll {
        url: Option<String>,
    },
}

impl BrowserAction {
    pub fn from_params(params: &ToolParams) -> Result<Self> {
        let action = optional_str(params, "action")
            .unwrap_or("visit")
            .to_lowercase();
        let url = optional_str(params, "url").map(validate_url).transpose()?;

        match action.as_str() {
            "visit" => {
                let url = url.ok_or_else(|| {
                    AgentError::InvalidToolInput("URL required for 'visit'".to_string())
                })?;
                Ok(BrowserAction::Visit { url })
            }
            "click" => {
                let selector = require_str(params, "selector").map_err(|_| {
                    AgentError::InvalidToolInput("Selector required for 'click'".to_string())
                })?;
                Ok(BrowserAction::Click {
                    url,
                    selector: selector.to_string(),
                })
            }
            "type" => match (optional_str(params, "selector"), optional_str(params, "text")) {
                (Some(selector), Some(text)) => Ok(BrowserAction::Type {
                    url,
                    selector: selector.to_string(),
                    text: text.to_string(),
                }),
                _ => Err(AgentError::InvalidToolInput(
                    "Selector and text required for 'type'".to_string(),
                )),
            },
            "scroll" => Ok(BrowserAction::Scroll { url }),
            other => Err(AgentError::InvalidToolInput(format!(
                "Unknown browser action '{}'. Use visit, click, type or scroll.",
                other
            ))),
        }
    }

    fn url(&self) -> Option<&str> {
        match self {
            BrowserAction::Visit { url } => Some(url),
            BrowserAction::Click { url, .. }
            | BrowserAction::Type { url, .. }
            | BrowserAction::Scroll { url } => url.as_deref(),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            BrowserAction::Visit { .. } => "visit",
            BrowserAction::Click { .. } => "click",
            BrowserAction::Type { .. } => "type",
            BrowserAction::Scroll { .. } => "scroll",
        }
    }
}

fn validate_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)
        .map_err(|e| AgentError::InvalidToolInput(format!("Invalid URL '{}': {}", raw, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed.to_string()),
        scheme => Err(AgentError::InvalidToolInput(format!(
            "Unsupported URL scheme '{}'",
            scheme
        ))),
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageLink {
    pub text: String,
    pub href: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveElements {
    #[serde(default)]
    pub buttons: Vec<String>,
    #[serde(default)]
    pub links: Vec<PageLink>,
}

impl ActiveElements {
    fn bounded(mut self, limit: usize) -> Self {
        self.buttons.truncate(limit);
        self.links.truncate(limit);
        self
    }
}

/// Tool output; `content_summary` and `screenshot` form the observation envelope
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BrowseReport {
    pub url: String,
    pub screenshot: String,
    pub content_summary: String,
    pub active_elements: ActiveElements,
}

/// Collapse whitespace runs and cut to `limit` characters
pub fn condense_text(raw: &str, limit: usize) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .take(limit)
        .collect()
}

pub fn screenshot_path(dir: &Path, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("shot_{}.png", at.format("%Y%m%d_%H%M%S_%3f")))
}

fn browser_err(e: impl std::fmt::Display) -> AgentError {
    AgentError::Browser(e.to_string())
}

/// Run `fut` until `deadline`, naming `stage` in the timeout error
async fn within<T, F>(deadline: Instant, stage: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout_at(deadline, fut).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::Browser(format!(
            "{} timed out after {}s",
            stage,
            SESSION_TIMEOUT.as_secs()
        ))),
    }
}

pub struct BrowserTool {
    screenshots_dir: PathBuf,
    headless: bool,
}

impl BrowserTool {
    pub fn new(screenshots_dir: impl Into<PathBuf>, headless: bool) -> Self {
        Self {
            screenshots_dir: screenshots_dir.into(),
            headless,
        }
    }

    async fn browse(&self, params: &ToolParams) -> Result<String> {
        let action = BrowserAction::from_params(params)?;
        info!(action = action.label(), url = ?action.url(), "Starting browser session");

        let report = self.run_session(&action).await?;
        Ok(serde_json::to_string_pretty(&report)?)
    }

    async fn run_session(&self, action: &BrowserAction) -> Result<BrowseReport> {
        let mut builder = BrowserConfig::builder().window_size(1280, 720);
        if !self.headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(AgentError::Browser)?;

        // One deadline covers launch and the action
        let deadline = Instant::now() + SESSION_TIMEOUT;
        let launch = async { Browser::launch(config).await.map_err(browser_err) };
        let (mut browser, mut handler) = within(deadline, "launch", launch).await?;
        let driver = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let result = within(deadline, "session", self.drive(&browser, action)).await;

        // Teardown runs on every path
        if let Err(e) = browser.close().await {
            warn!(error = %e, "Browser close failed");
        }
        if let Err(e) = browser.wait().await {
            debug!(error = %e, "Browser process wait failed");
        }
        driver.abort();

        result
    }

    async fn drive(&self, browser: &Browser, action: &BrowserAction) -> Result<BrowseReport> {
        let page = browser.new_page("about:blank").await.map_err(browser_err)?;

        if let Some(url) = action.url() {
            page.goto(url).await.map_err(browser_err)?;
            page.wait_for_navigation().await.map_err(browser_err)?;
        }

        match action {
            BrowserAction::Visit { .. } => {}
            BrowserAction::Click { selector, .. } => {
                let element = page.find_element(selector.as_str()).await.map_err(browser_err)?;
                element.click().await.map_err(browser_err)?;
            }
            BrowserAction::Type { selector, text, .. } => {
                let element = page.find_element(selector.as_str()).await.map_err(browser_err)?;
                element.click().await.map_err(browser_err)?;
                element.type_str(text).await.map_err(browser_err)?;
                element.press_key("Enter").await.map_err(browser_err)?;
            }
            BrowserAction::Scroll { .. } => {
                page.evaluate(SCROLL_SCRIPT).await.map_err(browser_err)?;
            }
        }
        tokio::time::sleep(SETTLE_DELAY).await;

        fs::create_dir_all(&self.screenshots_dir).await?;
        let shot = screenshot_path(&self.screenshots_dir, Local::now());
        page.save_screenshot(ScreenshotParams::builder().full_page(true).build(), &shot)
            .await
            .map_err(browser_err)?;

        let text: String = page
            .evaluate(TEXT_SCRIPT)
            .await
            .map_err(browser_err)?
            .into_value()?;
        let elements_json: String = page
            .evaluate(ELEMENTS_SCRIPT)
            .await
            .map_err(browser_err)?
            .into_value()?;
        let elements: ActiveElements = serde_json::from_str(&elements_json)?;
        let url = page.url().await.map_err(browser_err)?.unwrap_or_default();

        debug!(url = %url, screenshot = %shot.display(), "Browser action complete");

        Ok(BrowseReport {
            url,
            screenshot: shot.display().to_string(),
            content_summary: condense_text(&text, TEXT_LIMIT),
            active_elements: elements.bounded(ELEMENT_LIMIT),
        })
    }
}

#[async_trait::async_trait]
impl Tool for BrowserTool {
    fn name(&self) -> &str {
        "browse_web"
    }

    fn description(&self) -> &str {
        "Navigate and interact with websites. Params: 'action' (visit, click, type, scroll), 'url' (for visit), 'selector' (for click/type), 'text' (for type)."
    }

    async fn execute(&self, params: &ToolParams) -> String {
        soft_fail(self.browse(params).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ObservationEnvelope;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn params(value: Value) -> ToolParams {
        value.as_object().cloned().unwrap()
    }

    #[tokio::test]
    async fn test_stalled_stage_hits_the_deadline() {
        let deadline = Instant::now() + Duration::from_millis(20);
        let stuck = std::future::pending::<Result<()>>();

        let err = within(deadline, "launch", stuck).await.unwrap_err();
        assert!(matches!(err, AgentError::Browser(ref msg) if msg.starts_with("launch timed out")));

        // A stage finishing in time keeps its own result
        let later = Instant::now() + Duration::from_secs(5);
        assert_eq!(within(later, "session", async { Ok(7) }).await.unwrap(), 7);
    }

    #[test]
    fn test_action_defaults_to_visit() {
        let action =
            BrowserAction::from_params(&params(json!({"url": "https://www.geckoterminal.com"})))
                .unwrap();
        assert_eq!(
            action,
            BrowserAction::Visit {
                url: "https://www.geckoterminal.com/".to_string()
            }
        );
    }

    #[test]
    fn test_action_requirements() {
        let err = BrowserAction::from_params(&params(json!({"action": "visit"}))).unwrap_err();
        assert!(err.to_string().contains("URL required for 'visit'"));

        let err = BrowserAction::from_params(&params(json!({"action": "click"}))).unwrap_err();
        assert!(err.to_string().contains("Selector required for 'click'"));

        let err = BrowserAction::from_params(&params(json!({"action": "type", "selector": "#q"})))
            .unwrap_err();
        assert!(err.to_string().contains("Selector and text required"));

        let err = BrowserAction::from_params(&params(json!({"action": "hover"}))).unwrap_err();
        assert!(err.to_string().contains("Unknown browser action 'hover'"));
    }

    #[test]
    fn test_action_rejects_non_http_urls() {
        let err = BrowserAction::from_params(&params(json!({"url": "file:///etc/passwd"})))
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported URL scheme 'file'"));

        assert!(BrowserAction::from_params(&params(json!({"url": "not a url"}))).is_err());
    }

    #[test]
    fn test_click_and_scroll_may_navigate_first() {
        let action = BrowserAction::from_params(&params(json!({
            "action": "CLICK", "selector": "button.trade", "url": "https://example.com/pool"
        })))
        .unwrap();
        assert_eq!(action.url(), Some("https://example.com/pool"));

        let scroll = BrowserAction::from_params(&params(json!({"action": "scroll"}))).unwrap();
        assert_eq!(scroll, BrowserAction::Scroll { url: None });
    }

    #[test]
    fn test_condense_text() {
        assert_eq!(condense_text("  Price\n\n  $1.20 \t 24h ", 100), "Price $1.20 24h");
        assert_eq!(condense_text("abcdef", 3), "abc");
        assert_eq!(condense_text(&"é".repeat(10), 4).chars().count(), 4);
    }

    #[test]
    fn test_elements_are_bounded() {
        let elements = ActiveElements {
            buttons: (0..25).map(|i| format!("b{}", i)).collect(),
            links: (0..12)
                .map(|i| PageLink {
                    text: format!("l{}", i),
                    href: None,
                })
                .collect(),
        }
        .bounded(ELEMENT_LIMIT);

        assert_eq!(elements.buttons.len(), 10);
        assert_eq!(elements.links.len(), 10);
    }

    #[test]
    fn test_screenshot_path_is_timestamped() {
        let at = Local.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap();
        let path = screenshot_path(Path::new("reports/screenshots"), at);
        assert_eq!(
            path,
            PathBuf::from("reports/screenshots/shot_20240309_140507_000.png")
        );
    }

    #[test]
    fn test_report_is_an_observation_envelope() {
        let report = BrowseReport {
            url: "https://example.com/".to_string(),
            screenshot: "reports/screenshots/shot.png".to_string(),
            content_summary: "Example Domain".to_string(),
            active_elements: ActiveElements::default(),
        };

        let raw = serde_json::to_string_pretty(&report).unwrap();
        let envelope = ObservationEnvelope::parse(&raw).unwrap();
        assert_eq!(envelope.content_summary, "Example Domain");
        assert_eq!(
            envelope.screenshot.as_deref(),
            Some("reports/screenshots/shot.png")
        );
    }

    #[tokio::test]
    async fn test_invalid_params_fail_soft() {
        let tool = BrowserTool::new("reports/screenshots", true);
        let out = tool.execute(&params(json!({"action": "visit"}))).await;
        assert!(out.starts_with("[Error]"));
    }
}
