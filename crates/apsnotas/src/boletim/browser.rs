//! Headless browser access for the APSWeb portal.
//!
//! The scraping pipeline only talks to [`PortalPage`] and [`PortalSession`],
//! so it runs unchanged against the real Chromium-backed implementation or
//! against the in-memory fake used by the tests.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Element, Page};
use futures::StreamExt;
use rand::Rng;
use serde::Deserialize;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Errors raised by the browser layer.
#[derive(Debug, Error, Clone)]
pub enum BrowserError {
    /// Chromium could not be started or a fresh page could not be opened
    #[error("failed to launch browser: {0}")]
    Launch(String),

    /// A navigation failed outright (DNS, connection refused, bad URL)
    #[error("navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    /// A navigation did not complete within the allowed time
    #[error("navigation did not complete within {0:?}")]
    NavigationTimeout(Duration),

    /// A DOM query, click, keystroke or script evaluation failed
    #[error("page interaction failed: {0}")]
    Interaction(String),
}

/// One `<option>` of a `<select>` control.
#[derive(Debug, Clone, Deserialize)]
pub struct SelectOption {
    pub text: String,
    pub value: String,
}

/// A single open portal page.
///
/// Handles returned by `find`/`find_all` stay valid until the next
/// navigation; using one afterwards yields [`BrowserError::Interaction`].
#[async_trait]
pub trait PortalPage: Send + Sync {
    type Handle: Send + Sync;

    /// Navigates to `url` and waits for the load to settle.
    async fn goto(&self, url: &str) -> Result<(), BrowserError>;

    /// URL the page is currently on.
    async fn current_url(&self) -> Result<String, BrowserError>;

    /// First element matching `selector`, if any.
    async fn find(&self, selector: &str) -> Result<Option<Self::Handle>, BrowserError>;

    /// All elements matching `selector`, in document order.
    async fn find_all(&self, selector: &str) -> Result<Vec<Self::Handle>, BrowserError>;

    /// Visible text of an element, empty when the element has none.
    async fn text_of(&self, handle: &Self::Handle) -> Result<String, BrowserError>;

    /// Attribute value of an element.
    async fn attr_of(
        &self,
        handle: &Self::Handle,
        name: &str,
    ) -> Result<Option<String>, BrowserError>;

    async fn click(&self, handle: &Self::Handle) -> Result<(), BrowserError>;

    /// Clears an input and types `text` into it, one key at a time.
    async fn clear_and_type(&self, handle: &Self::Handle, text: &str)
        -> Result<(), BrowserError>;

    /// Presses Enter with the element focused.
    async fn press_enter(&self, handle: &Self::Handle) -> Result<(), BrowserError>;

    /// Options of a `<select>` element.
    async fn options_of(&self, handle: &Self::Handle) -> Result<Vec<SelectOption>, BrowserError>;

    /// Sets the value of a `<select>` and fires the usual DOM events.
    async fn select_value(&self, handle: &Self::Handle, value: &str)
        -> Result<(), BrowserError>;

    /// Submits the first `<form>` on the page. Returns false when there is none.
    async fn submit_form(&self) -> Result<bool, BrowserError>;

    /// Waits up to `timeout` for a pending navigation. Ok(false) means the
    /// page never moved; transport failures surface as errors.
    async fn wait_for_navigation(&self, timeout: Duration) -> Result<bool, BrowserError>;

    /// `document.body.innerText` of the current page.
    async fn body_text(&self) -> Result<String, BrowserError>;

    /// Full HTML of the current page.
    async fn html(&self) -> Result<String, BrowserError>;
}

/// An exclusive browser session owning one [`PortalPage`].
#[async_trait]
pub trait PortalSession: Send {
    type Page: PortalPage;

    fn page(&self) -> &Self::Page;

    /// Tears the session down. Consumes the session so no handle can outlive
    /// the browser process.
    async fn close(self);
}

/// Waits for a navigation to settle, treating transport failures the same as
/// "nothing happened". Submit and link-follow strategies use this so a flaky
/// wait falls through to the next strategy instead of aborting the run.
pub(crate) async fn try_settle<P: PortalPage>(page: &P, timeout: Duration) -> bool {
    match page.wait_for_navigation(timeout).await {
        Ok(settled) => settled,
        Err(e) => {
            debug!("navigation wait failed: {e}");
            false
        }
    }
}

/// How to start the local Chromium.
#[derive(Debug, Clone)]
pub struct BrowserLaunchConfig {
    /// Run without a visible window.
    pub headless: bool,
    /// Explicit Chromium/Chrome executable; auto-detected when absent.
    pub executable: Option<String>,
}

impl Default for BrowserLaunchConfig {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
        }
    }
}

fn interaction(e: chromiumoxide::error::CdpError) -> BrowserError {
    BrowserError::Interaction(e.to_string())
}

/// Per-keystroke delay with a little jitter so typing does not look robotic.
fn typing_pause(base_ms: u64) -> Duration {
    // ThreadRng is not Send; keep it out of any await scope.
    let jitter = rand::thread_rng().gen_range(0..=base_ms / 2);
    Duration::from_millis(base_ms + jitter)
}

/// [`PortalPage`] backed by a real Chromium tab over CDP.
pub struct CdpPage {
    page: Page,
    goto_timeout: Duration,
    type_delay_ms: u64,
}

#[async_trait]
impl PortalPage for CdpPage {
    type Handle = Element;

    async fn goto(&self, url: &str) -> Result<(), BrowserError> {
        let navigate = async {
            self.page.goto(url).await.map_err(|e| BrowserError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
            self.page
                .wait_for_navigation()
                .await
                .map_err(|e| BrowserError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            Ok(())
        };
        match tokio::time::timeout(self.goto_timeout, navigate).await {
            Ok(result) => result,
            Err(_) => Err(BrowserError::NavigationTimeout(self.goto_timeout)),
        }
    }

    async fn current_url(&self) -> Result<String, BrowserError> {
        self.page
            .url()
            .await
            .map_err(interaction)?
            .ok_or_else(|| BrowserError::Interaction("page reported no url".to_string()))
    }

    async fn find(&self, selector: &str) -> Result<Option<Element>, BrowserError> {
        // find_element errors when nothing matches; that is the None case.
        match self.page.find_element(selector).await {
            Ok(element) => Ok(Some(element)),
            Err(_) => Ok(None),
        }
    }

    async fn find_all(&self, selector: &str) -> Result<Vec<Element>, BrowserError> {
        self.page.find_elements(selector).await.map_err(interaction)
    }

    async fn text_of(&self, handle: &Element) -> Result<String, BrowserError> {
        Ok(handle
            .inner_text()
            .await
            .map_err(interaction)?
            .unwrap_or_default())
    }

    async fn attr_of(
        &self,
        handle: &Element,
        name: &str,
    ) -> Result<Option<String>, BrowserError> {
        handle.attribute(name).await.map_err(interaction)
    }

    async fn click(&self, handle: &Element) -> Result<(), BrowserError> {
        handle.click().await.map(|_| ()).map_err(interaction)
    }

    async fn clear_and_type(&self, handle: &Element, text: &str) -> Result<(), BrowserError> {
        handle.click().await.map_err(interaction)?;
        handle
            .call_js_fn(
                "function() { \
                     this.value = ''; \
                     this.dispatchEvent(new Event('input', { bubbles: true })); \
                 }",
                false,
            )
            .await
            .map_err(interaction)?;
        for ch in text.chars() {
            handle
                .type_str(&ch.to_string())
                .await
                .map_err(interaction)?;
            tokio::time::sleep(typing_pause(self.type_delay_ms)).await;
        }
        Ok(())
    }

    async fn press_enter(&self, handle: &Element) -> Result<(), BrowserError> {
        handle
            .press_key("Enter")
            .await
            .map(|_| ())
            .map_err(interaction)
    }

    async fn options_of(&self, handle: &Element) -> Result<Vec<SelectOption>, BrowserError> {
        let returns = handle
            .call_js_fn(
                "function() { \
                     return JSON.stringify(Array.from(this.options || []).map(o => ({ \
                         text: (o.textContent || '').trim(), \
                         value: o.value, \
                     }))); \
                 }",
                false,
            )
            .await
            .map_err(interaction)?;
        let Some(serde_json::Value::String(raw)) = returns.result.value else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw)
            .map_err(|e| BrowserError::Interaction(format!("malformed option list: {e}")))
    }

    async fn select_value(&self, handle: &Element, value: &str) -> Result<(), BrowserError> {
        // Serialize through serde_json so the value lands in the script as a
        // proper JS string literal regardless of quotes in it.
        let literal = serde_json::Value::String(value.to_string()).to_string();
        let script = format!(
            "function() {{ \
                 this.value = {literal}; \
                 this.dispatchEvent(new Event('input', {{ bubbles: true }})); \
                 this.dispatchEvent(new Event('change', {{ bubbles: true }})); \
             }}"
        );
        handle
            .call_js_fn(&script, false)
            .await
            .map(|_| ())
            .map_err(interaction)
    }

    async fn submit_form(&self) -> Result<bool, BrowserError> {
        let result = self
            .page
            .evaluate(
                "(() => { \
                     const form = document.querySelector('form'); \
                     if (!form) return false; \
                     form.submit(); \
                     return true; \
                 })()",
            )
            .await
            .map_err(interaction)?;
        Ok(result.into_value::<bool>().unwrap_or(false))
    }

    async fn wait_for_navigation(&self, timeout: Duration) -> Result<bool, BrowserError> {
        match tokio::time::timeout(timeout, self.page.wait_for_navigation()).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) => Err(interaction(e)),
            Err(_) => Ok(false),
        }
    }

    async fn body_text(&self) -> Result<String, BrowserError> {
        let result = self
            .page
            .evaluate("(() => document.body ? document.body.innerText : '')()")
            .await
            .map_err(interaction)?;
        Ok(result.into_value::<String>().unwrap_or_default())
    }

    async fn html(&self) -> Result<String, BrowserError> {
        self.page.content().await.map_err(interaction)
    }
}

/// A launched Chromium plus the page the pipeline drives.
pub struct CdpSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: CdpPage,
}

impl CdpSession {
    /// Launches Chromium and opens a blank page.
    pub async fn launch(
        launch: &BrowserLaunchConfig,
        goto_timeout: Duration,
        type_delay_ms: u64,
    ) -> Result<Self, BrowserError> {
        let mut builder = BrowserConfig::builder()
            .no_sandbox()
            .arg("--disable-setuid-sandbox")
            .arg("--disable-dev-shm-usage")
            .window_size(1366, 768);
        if !launch.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &launch.executable {
            builder = builder.chrome_executable(path);
        }
        let config = builder
            .build()
            .map_err(|e| BrowserError::Launch(format!("bad browser config: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        // The handler must be pumped for the whole session or CDP stalls.
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| BrowserError::Launch(e.to_string()))?;

        Ok(Self {
            browser,
            handler_task,
            page: CdpPage {
                page,
                goto_timeout,
                type_delay_ms,
            },
        })
    }
}

#[async_trait]
impl PortalSession for CdpSession {
    type Page = CdpPage;

    fn page(&self) -> &CdpPage {
        &self.page
    }

    async fn close(mut self) {
        if let Err(e) = self.browser.close().await {
            warn!("browser close failed, killing the process: {e}");
            self.browser.kill().await;
        }
        if let Err(e) = self.browser.wait().await {
            debug!("waiting for browser exit: {e}");
        }
        self.handler_task.abort();
    }
}
