//! In-memory browser for exercising automation flows
//!
//! A [`ScriptedBrowser`] describes a page: which selectors exist, whether
//! navigation reaches a given URL, whether loads complete. Every session
//! launched from it records the actions performed against it, so tests can
//! assert on the exact sequence and on whether the session was closed.

use async_trait::async_trait;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::{BrowserError, BrowserLauncher, BrowserSession, ElementRef};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserAction {
    Launch,
    Goto(String),
    Fill { selector: String, text: String },
    PressEnter(String),
    Click(String),
    SetInputFile { selector: String, path: PathBuf },
    WaitForUrl(String),
    WaitForLoad,
    Close,
}

#[derive(Debug, Default)]
struct PageState {
    present: HashSet<String>,
    reachable_urls: Vec<String>,
    load_completes: bool,
    navigation_fails: bool,
    launch_fails: bool,
    actions: Vec<BrowserAction>,
    launches: usize,
    closes: usize,
}

/// Shared script and action log; cheap to clone
#[derive(Debug, Clone, Default)]
pub struct ScriptedBrowser {
    state: Arc<Mutex<PageState>>,
}

impl ScriptedBrowser {
    /// A page where nothing is present and nothing loads
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark selectors as present on the page
    pub fn with_elements(self, selectors: &[&str]) -> Self {
        self.lock().present.extend(selectors.iter().map(|s| s.to_string()));
        self
    }

    /// URLs that `wait_for_url` will observe (prefix match)
    pub fn reaching(self, url: &str) -> Self {
        self.lock().reachable_urls.push(url.to_string());
        self
    }

    pub fn with_load_completing(self, completes: bool) -> Self {
        self.lock().load_completes = completes;
        self
    }

    pub fn with_failing_navigation(self) -> Self {
        self.lock().navigation_fails = true;
        self
    }

    pub fn with_failing_launch(self) -> Self {
        self.lock().launch_fails = true;
        self
    }

    pub fn remove_element(&self, selector: &str) {
        self.lock().present.remove(selector);
    }

    pub fn launcher(&self) -> ScriptedLauncher {
        ScriptedLauncher {
            browser: self.clone(),
        }
    }

    pub fn actions(&self) -> Vec<BrowserAction> {
        self.lock().actions.clone()
    }

    pub fn launches(&self) -> usize {
        self.lock().launches
    }

    /// True when every launched session has been closed
    pub fn all_closed(&self) -> bool {
        let state = self.lock();
        state.closes >= state.launches
    }

    /// Text filled into the element matched by `selector`, if any
    pub fn filled(&self, selector: &str) -> Option<String> {
        self.lock().actions.iter().rev().find_map(|action| match action {
            BrowserAction::Fill { selector: s, text } if s == selector => Some(text.clone()),
            _ => None,
        })
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, action: BrowserAction) {
        self.lock().actions.push(action);
    }
}

pub struct ScriptedLauncher {
    browser: ScriptedBrowser,
}

#[async_trait]
impl BrowserLauncher for ScriptedLauncher {
    async fn launch(&self) -> Result<Box<dyn BrowserSession>, BrowserError> {
        {
            let mut state = self.browser.lock();
            if state.launch_fails {
                return Err(BrowserError::Http("connection refused".to_string()));
            }
            state.launches += 1;
            state.actions.push(BrowserAction::Launch);
        }
        Ok(Box::new(ScriptedSession {
            browser: self.browser.clone(),
            closed: Mutex::new(false),
        }))
    }
}

struct ScriptedSession {
    browser: ScriptedBrowser,
    closed: Mutex<bool>,
}

impl ScriptedSession {
    fn element(selector: &str) -> ElementRef {
        ElementRef {
            id: format!("el-{}", selector),
            selector: selector.to_string(),
        }
    }
}

#[async_trait]
impl BrowserSession for ScriptedSession {
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.browser.record(BrowserAction::Goto(url.to_string()));
        if self.browser.lock().navigation_fails {
            return Err(BrowserError::Timeout {
                what: format!("{} to load", url),
                after: timeout,
            });
        }
        Ok(())
    }

    async fn wait_for(&self, selectors: &[&str], timeout: Duration) -> Result<ElementRef, BrowserError> {
        match self.find(selectors).await? {
            Some(element) => Ok(element),
            None => Err(BrowserError::Timeout {
                what: selectors.join(", "),
                after: timeout,
            }),
        }
    }

    async fn find(&self, selectors: &[&str]) -> Result<Option<ElementRef>, BrowserError> {
        let state = self.browser.lock();
        Ok(selectors
            .iter()
            .find(|s| state.present.contains(**s))
            .map(|s| Self::element(s)))
    }

    async fn fill(&self, element: &ElementRef, text: &str) -> Result<(), BrowserError> {
        self.browser.record(BrowserAction::Fill {
            selector: element.selector.clone(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn press_enter(&self, element: &ElementRef) -> Result<(), BrowserError> {
        self.browser
            .record(BrowserAction::PressEnter(element.selector.clone()));
        Ok(())
    }

    async fn click(&self, element: &ElementRef) -> Result<(), BrowserError> {
        self.browser.record(BrowserAction::Click(element.selector.clone()));
        Ok(())
    }

    async fn set_input_file(&self, element: &ElementRef, path: &Path) -> Result<(), BrowserError> {
        self.browser.record(BrowserAction::SetInputFile {
            selector: element.selector.clone(),
            path: path.to_path_buf(),
        });
        Ok(())
    }

    async fn wait_for_url(&self, url: &str, timeout: Duration) -> Result<(), BrowserError> {
        self.browser.record(BrowserAction::WaitForUrl(url.to_string()));
        let reached = self
            .browser
            .lock()
            .reachable_urls
            .iter()
            .any(|u| u.starts_with(url));
        if reached {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                what: format!("URL {}", url),
                after: timeout,
            })
        }
    }

    async fn wait_for_load(&self, timeout: Duration) -> Result<(), BrowserError> {
        self.browser.record(BrowserAction::WaitForLoad);
        if self.browser.lock().load_completes {
            Ok(())
        } else {
            Err(BrowserError::Timeout {
                what: "page load".to_string(),
                after: timeout,
            })
        }
    }

    async fn close(&self) -> Result<(), BrowserError> {
        let mut closed = self.closed.lock().unwrap_or_else(|p| p.into_inner());
        if !*closed {
            *closed = true;
            let mut state = self.browser.lock();
            state.closes += 1;
            state.actions.push(BrowserAction::Close);
        }
        Ok(())
    }
}
