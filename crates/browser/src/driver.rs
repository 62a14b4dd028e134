//! Page interaction seam.
//!
//! The check flow drives the site through this trait so it can be tested
//! against a scripted fake without a real browser.

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use creneau_core::{Error, Result};

use crate::session::BrowserSession;

/// Minimal set of page actions the booking flow needs.
#[async_trait]
pub trait PageDriver: Send + Sync {
    /// Navigate to a URL.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Click the first element matching a CSS selector.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Click the first element matching an XPath expression.
    async fn click_xpath(&self, xpath: &str) -> Result<()>;

    /// Focus an element and type text into it.
    async fn fill(&self, selector: &str, text: &str) -> Result<()>;

    /// Poll until a selector matches or the timeout elapses.
    /// Returns whether the element appeared.
    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool>;

    /// Poll until an XPath expression matches or the timeout elapses.
    async fn wait_for_xpath(&self, xpath: &str, timeout: Duration) -> Result<bool>;

    /// Whether a selector currently matches anything.
    async fn exists(&self, selector: &str) -> Result<bool>;

    /// Whether an XPath expression currently matches anything.
    async fn exists_xpath(&self, xpath: &str) -> Result<bool>;

    /// Evaluate a JS expression and return its JSON value.
    async fn eval_json(&self, expression: &str) -> Result<Value>;
}

fn escape_single_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('\'', "\\'")
}

fn escape_double_quoted(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

/// Pull the returned value out of a Runtime.evaluate result.
fn eval_value(result: &Value) -> Value {
    result
        .get("result")
        .and_then(|r| r.get("value"))
        .cloned()
        .unwrap_or(Value::Null)
}

#[async_trait]
impl PageDriver for BrowserSession {
    async fn goto(&self, url: &str) -> Result<()> {
        debug!(url = url, "Navigating");
        self.cdp.navigate(url).await?;
        Ok(())
    }

    async fn click(&self, selector: &str) -> Result<()> {
        let escaped = escape_single_quoted(selector);
        let js = format!(
            concat!(
                "(function() {{ var el = document.querySelector('{}');",
                " if (!el) return false;",
                " el.scrollIntoView({{block: 'center'}});",
                " el.click(); return true; }})()"
            ),
            escaped
        );
        let result = self.cdp.evaluate_js(&js).await?;
        if eval_value(&result).as_bool() != Some(true) {
            return Err(Error::Navigation(format!("element not found: {}", selector)));
        }
        // Brief wait for UI update
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn click_xpath(&self, xpath: &str) -> Result<()> {
        let escaped = escape_double_quoted(xpath);
        let js = format!(
            concat!(
                "(function() {{ var r = document.evaluate(\"{}\", document, null,",
                " XPathResult.FIRST_ORDERED_NODE_TYPE, null);",
                " var el = r.singleNodeValue;",
                " if (!el) return false;",
                " el.scrollIntoView({{block: 'center'}});",
                " el.click(); return true; }})()"
            ),
            escaped
        );
        let result = self.cdp.evaluate_js(&js).await?;
        if eval_value(&result).as_bool() != Some(true) {
            return Err(Error::Navigation(format!("element not found: {}", xpath)));
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
        Ok(())
    }

    async fn fill(&self, selector: &str, text: &str) -> Result<()> {
        let escaped = escape_single_quoted(selector);
        let js = format!(
            concat!(
                "(function() {{ var el = document.querySelector('{}');",
                " if (!el) return false;",
                " el.focus(); el.value = ''; return true; }})()"
            ),
            escaped
        );
        let result = self.cdp.evaluate_js(&js).await?;
        if eval_value(&result).as_bool() != Some(true) {
            return Err(Error::Navigation(format!("element not found: {}", selector)));
        }
        self.cdp.insert_text(text).await?;
        Ok(())
    }

    async fn wait_for(&self, selector: &str, timeout: Duration) -> Result<bool> {
        let start = std::time::Instant::now();
        loop {
            if self.exists(selector).await? {
                return Ok(true);
            }
            if start.elapsed() > timeout {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    async fn wait_for_xpath(&self, xpath: &str, timeout: Duration) -> Result<bool> {
        let start = std::time::Instant::now();
        loop {
            if self.exists_xpath(xpath).await? {
                return Ok(true);
            }
            if start.elapsed() > timeout {
                return Ok(false);
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
    }

    async fn exists(&self, selector: &str) -> Result<bool> {
        let escaped = escape_single_quoted(selector);
        let js = format!("!!document.querySelector('{}')", escaped);
        let result = self.cdp.evaluate_js(&js).await?;
        Ok(eval_value(&result).as_bool() == Some(true))
    }

    async fn exists_xpath(&self, xpath: &str) -> Result<bool> {
        let escaped = escape_double_quoted(xpath);
        let js = format!(
            concat!(
                "!!document.evaluate(\"{}\", document, null,",
                " XPathResult.FIRST_ORDERED_NODE_TYPE, null).singleNodeValue"
            ),
            escaped
        );
        let result = self.cdp.evaluate_js(&js).await?;
        Ok(eval_value(&result).as_bool() == Some(true))
    }

    async fn eval_json(&self, expression: &str) -> Result<Value> {
        let result = self.cdp.evaluate_js(expression).await?;
        Ok(eval_value(&result))
    }
}
