//! X (Twitter) publisher driven through browser automation
//!
//! X offers no posting API for this use, so the publisher logs in through
//! the web UI and uses the composer like a person would. The flow is an
//! explicit state machine:
//!
//! ```text
//! Start -> LoggedOut -> CredentialsSubmitted -> Authenticated -> ComposerOpen
//!       -> TextEntered -> [MediaAttached] -> Submitted -> Done
//! ```
//!
//! Any step can move to `Failed`, which is absorbing. The browser session is
//! closed whichever way the run ends.

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

use super::Publisher;
use crate::browser::{BrowserError, BrowserLauncher, BrowserSession};
use crate::config::Config;
use crate::error::PlatformError;
use crate::types::PlatformId;

const LOGIN_URL: &str = "https://x.com/login";
const HOME_URL: &str = "https://x.com/home";

const USERNAME_INPUTS: &[&str] = &["input[name=\"text\"]", "input[autocomplete=\"username\"]"];
const PASSWORD_INPUTS: &[&str] = &["input[name=\"password\"]"];
const NEW_POST_BUTTONS: &[&str] = &[
    "a[aria-label=\"Post\"]",
    "a[data-testid=\"SideNav_NewPost_Button\"]",
];
const COMPOSER_TEXTAREAS: &[&str] = &[
    "div[aria-label=\"Post text\"]",
    "div[data-testid=\"tweetTextarea_0\"]",
];
const FILE_INPUTS: &[&str] = &["input[type=\"file\"]"];
const SUBMIT_BUTTONS: &[&str] = &[
    "div[data-testid=\"tweetButtonInline\"]",
    "div[data-testid=\"tweetButton\"]",
    "button[data-testid=\"tweetButtonInline\"]",
];

pub const NOT_CONFIGURED: &str = "X credentials not configured. Please set them in Settings.";
pub const POSTED: &str = "Posted to X";

/// Timeouts and settle delays for one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XTimings {
    pub page_load: Duration,
    pub field_wait: Duration,
    pub home_wait: Duration,
    pub load_wait: Duration,
    pub composer_settle: Duration,
    pub media_settle: Duration,
    pub submit_settle: Duration,
}

impl Default for XTimings {
    fn default() -> Self {
        Self {
            page_load: Duration::from_secs(60),
            field_wait: Duration::from_secs(30),
            home_wait: Duration::from_secs(60),
            load_wait: Duration::from_secs(60),
            composer_settle: Duration::from_secs(1),
            media_settle: Duration::from_secs(4),
            submit_settle: Duration::from_secs(5),
        }
    }
}

impl XTimings {
    /// Default timeouts with no settle delays
    pub fn immediate() -> Self {
        Self {
            composer_settle: Duration::ZERO,
            media_settle: Duration::ZERO,
            submit_settle: Duration::ZERO,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum XState {
    Start,
    LoggedOut,
    CredentialsSubmitted,
    Authenticated,
    ComposerOpen,
    TextEntered,
    MediaAttached,
    Submitted,
    Done,
    Failed { step: String, reason: String },
}

/// States visited by one run and how it ended
#[derive(Debug)]
pub struct XRun {
    pub states: Vec<XState>,
    pub outcome: Result<String, PlatformError>,
}

#[derive(Debug)]
struct StepFailure {
    step: &'static str,
    reason: String,
}

fn at(step: &'static str) -> impl FnOnce(BrowserError) -> StepFailure {
    move |e| StepFailure {
        step,
        reason: e.to_string(),
    }
}

struct XCredentials {
    login: String,
    password: SecretString,
}

pub struct XPublisher {
    credentials: Option<XCredentials>,
    launcher: Arc<dyn BrowserLauncher>,
    timings: XTimings,
}

impl XPublisher {
    /// Blank login or password leaves the publisher unconfigured
    pub fn new(
        login: Option<String>,
        password: Option<String>,
        launcher: Arc<dyn BrowserLauncher>,
    ) -> Self {
        let login = login.map(|l| l.trim().to_string()).filter(|l| !l.is_empty());
        let password = password.filter(|p| !p.trim().is_empty());
        let credentials = match (login, password) {
            (Some(login), Some(password)) => Some(XCredentials {
                login,
                password: SecretString::from(password),
            }),
            _ => None,
        };

        Self {
            credentials,
            launcher,
            timings: XTimings::default(),
        }
    }

    /// Credentials from `[platforms.x]`
    pub fn from_config(config: &Config, launcher: Arc<dyn BrowserLauncher>) -> Self {
        let creds = config.credentials(PlatformId::X);
        Self::new(
            creds.and_then(|c| c.login()).map(str::to_string),
            creds.and_then(|c| c.secret()).map(str::to_string),
            launcher,
        )
    }

    pub fn with_timings(mut self, timings: XTimings) -> Self {
        self.timings = timings;
        self
    }

    pub fn is_configured(&self) -> bool {
        self.credentials.is_some()
    }

    /// Drive the full flow and report every state visited
    pub async fn run(&self, text: &str, media: Option<&Path>) -> XRun {
        let mut states = vec![XState::Start];

        let Some(credentials) = &self.credentials else {
            return XRun {
                states,
                outcome: Err(PlatformError::NotConfigured(NOT_CONFIGURED.to_string())),
            };
        };

        let session = match self.launcher.launch().await {
            Ok(session) => session,
            Err(e) => {
                let failure = at("launch")(e);
                states.push(XState::Failed {
                    step: failure.step.to_string(),
                    reason: failure.reason.clone(),
                });
                return XRun {
                    states,
                    outcome: Err(automation_error(failure)),
                };
            }
        };

        let mut state = XState::Start;
        let outcome = loop {
            match self.step(session.as_ref(), &state, credentials, text, media).await {
                Ok(XState::Done) => {
                    states.push(XState::Done);
                    break Ok(POSTED.to_string());
                }
                Ok(next) => {
                    tracing::debug!("X: {:?} -> {:?}", state, next);
                    states.push(next.clone());
                    state = next;
                }
                Err(failure) => {
                    states.push(XState::Failed {
                        step: failure.step.to_string(),
                        reason: failure.reason.clone(),
                    });
                    break Err(automation_error(failure));
                }
            }
        };

        if let Err(e) = session.close().await {
            tracing::warn!("Failed to close X browser session: {}", e);
        }

        XRun { states, outcome }
    }

    async fn step(
        &self,
        session: &dyn BrowserSession,
        state: &XState,
        credentials: &XCredentials,
        text: &str,
        media: Option<&Path>,
    ) -> Result<XState, StepFailure> {
        match state {
            XState::Start => {
                session
                    .goto(LOGIN_URL, self.timings.page_load)
                    .await
                    .map_err(at("open login"))?;
                Ok(XState::LoggedOut)
            }
            XState::LoggedOut => {
                self.submit_username(session, credentials).await?;
                Ok(XState::CredentialsSubmitted)
            }
            XState::CredentialsSubmitted => {
                self.submit_password(session, credentials).await?;
                self.await_home(session).await?;
                Ok(XState::Authenticated)
            }
            XState::Authenticated => {
                self.open_composer(session).await?;
                Ok(XState::ComposerOpen)
            }
            XState::ComposerOpen => {
                self.enter_text(session, text).await?;
                Ok(XState::TextEntered)
            }
            XState::TextEntered => {
                if self.attach_media(session, media).await? {
                    Ok(XState::MediaAttached)
                } else {
                    self.submit(session).await?;
                    Ok(XState::Submitted)
                }
            }
            XState::MediaAttached => {
                self.submit(session).await?;
                Ok(XState::Submitted)
            }
            XState::Submitted | XState::Done => Ok(XState::Done),
            XState::Failed { step, reason } => Err(StepFailure {
                step: "resume",
                reason: format!("{} step already failed: {}", step, reason),
            }),
        }
    }

    async fn submit_username(
        &self,
        session: &dyn BrowserSession,
        credentials: &XCredentials,
    ) -> Result<(), StepFailure> {
        let username = session
            .wait_for(USERNAME_INPUTS, self.timings.field_wait)
            .await
            .map_err(at("username"))?;
        session
            .fill(&username, &credentials.login)
            .await
            .map_err(at("username"))?;
        session.press_enter(&username).await.map_err(at("username"))?;
        Ok(())
    }

    async fn submit_password(
        &self,
        session: &dyn BrowserSession,
        credentials: &XCredentials,
    ) -> Result<(), StepFailure> {
        let password = session
            .wait_for(PASSWORD_INPUTS, self.timings.field_wait)
            .await
            .map_err(at("password"))?;
        session
            .fill(&password, credentials.password.expose_secret())
            .await
            .map_err(at("password"))?;
        session.press_enter(&password).await.map_err(at("password"))?;
        Ok(())
    }

    async fn await_home(&self, session: &dyn BrowserSession) -> Result<(), StepFailure> {
        if let Err(e) = session.wait_for_url(HOME_URL, self.timings.home_wait).await {
            tracing::warn!("X: home page not reached ({}), waiting for page load instead", e);
            session
                .wait_for_load(self.timings.load_wait)
                .await
                .map_err(at("authenticate"))?;
        }
        Ok(())
    }

    async fn open_composer(&self, session: &dyn BrowserSession) -> Result<(), StepFailure> {
        let target = match session.find(NEW_POST_BUTTONS).await.map_err(at("composer"))? {
            Some(button) => Some(button),
            None => session
                .find(COMPOSER_TEXTAREAS)
                .await
                .map_err(at("composer"))?,
        };
        if let Some(element) = target {
            session.click(&element).await.map_err(at("composer"))?;
        }
        settle(self.timings.composer_settle).await;
        Ok(())
    }

    async fn enter_text(&self, session: &dyn BrowserSession, text: &str) -> Result<(), StepFailure> {
        let textarea = session
            .find(COMPOSER_TEXTAREAS)
            .await
            .map_err(at("text"))?
            .ok_or_else(|| StepFailure {
                step: "text",
                reason: "composer textarea not found.".to_string(),
            })?;
        session.fill(&textarea, text).await.map_err(at("text"))?;
        Ok(())
    }

    /// True when a file was attached; a missing file or file input is skipped
    async fn attach_media(
        &self,
        session: &dyn BrowserSession,
        media: Option<&Path>,
    ) -> Result<bool, StepFailure> {
        let Some(path) = media.filter(|p| p.exists()) else {
            return Ok(false);
        };
        let Some(input) = session.find(FILE_INPUTS).await.map_err(at("media"))? else {
            tracing::debug!("X: no file input found, posting without media");
            return Ok(false);
        };
        session
            .set_input_file(&input, path)
            .await
            .map_err(at("media"))?;
        settle(self.timings.media_settle).await;
        Ok(true)
    }

    async fn submit(&self, session: &dyn BrowserSession) -> Result<(), StepFailure> {
        let button = session
            .find(SUBMIT_BUTTONS)
            .await
            .map_err(at("submit"))?
            .ok_or_else(|| StepFailure {
                step: "submit",
                reason: "tweet button not found.".to_string(),
            })?;
        session.click(&button).await.map_err(at("submit"))?;
        settle(self.timings.submit_settle).await;
        Ok(())
    }
}

#[async_trait]
impl Publisher for XPublisher {
    fn platform(&self) -> PlatformId {
        PlatformId::X
    }

    async fn publish(&self, text: &str, media: Option<&Path>) -> Result<String, PlatformError> {
        self.run(text, media).await.outcome
    }
}

fn automation_error(failure: StepFailure) -> PlatformError {
    PlatformError::Automation {
        platform: PlatformId::X.to_string(),
        step: failure.step.to_string(),
        reason: failure.reason,
    }
}

async fn settle(delay: Duration) {
    if !delay.is_zero() {
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::browser::{BrowserAction, ScriptedBrowser};
    use tempfile::TempDir;

    fn logged_in_page() -> ScriptedBrowser {
        ScriptedBrowser::new()
            .with_elements(&[
                "input[name=\"text\"]",
                "input[name=\"password\"]",
                "a[data-testid=\"SideNav_NewPost_Button\"]",
                "div[data-testid=\"tweetTextarea_0\"]",
                "div[data-testid=\"tweetButton\"]",
            ])
            .reaching(HOME_URL)
    }

    fn publisher(browser: &ScriptedBrowser) -> XPublisher {
        XPublisher::new(
            Some("rocketeer".to_string()),
            Some("hunter2".to_string()),
            Arc::new(browser.launcher()),
        )
        .with_timings(XTimings::immediate())
    }

    fn step_of(outcome: &Result<String, PlatformError>) -> Option<String> {
        match outcome {
            Err(PlatformError::Automation { step, .. }) => Some(step.clone()),
            _ => None,
        }
    }

    #[tokio::test]
    async fn test_happy_path_without_media() {
        let browser = logged_in_page();
        let run = publisher(&browser).run("Hello X", None).await;

        assert_eq!(run.outcome.as_deref(), Ok(POSTED));
        assert_eq!(
            run.states,
            vec![
                XState::Start,
                XState::LoggedOut,
                XState::CredentialsSubmitted,
                XState::Authenticated,
                XState::ComposerOpen,
                XState::TextEntered,
                XState::Submitted,
                XState::Done,
            ]
        );
        assert_eq!(browser.filled("input[name=\"text\"]").as_deref(), Some("rocketeer"));
        assert_eq!(browser.filled("input[name=\"password\"]").as_deref(), Some("hunter2"));
        assert_eq!(
            browser.filled("div[data-testid=\"tweetTextarea_0\"]").as_deref(),
            Some("Hello X")
        );
        assert_eq!(browser.actions()[1], BrowserAction::Goto(LOGIN_URL.to_string()));
        assert!(browser.all_closed());
    }

    #[tokio::test]
    async fn test_media_is_attached_when_input_present() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("abc.png");
        std::fs::write(&image, b"png").unwrap();

        let browser = logged_in_page().with_elements(&["input[type=\"file\"]"]);
        let run = publisher(&browser).run("With media", Some(&image)).await;

        assert!(run.outcome.is_ok());
        assert!(run.states.contains(&XState::MediaAttached));
        assert!(browser.actions().contains(&BrowserAction::SetInputFile {
            selector: "input[type=\"file\"]".to_string(),
            path: image.clone(),
        }));
    }

    #[tokio::test]
    async fn test_missing_file_input_skips_media() {
        let dir = TempDir::new().unwrap();
        let image = dir.path().join("abc.png");
        std::fs::write(&image, b"png").unwrap();

        let browser = logged_in_page();
        let run = publisher(&browser).run("No input", Some(&image)).await;

        assert!(run.outcome.is_ok());
        assert!(!run.states.contains(&XState::MediaAttached));
    }

    #[tokio::test]
    async fn test_nonexistent_media_is_ignored() {
        let browser = logged_in_page().with_elements(&["input[type=\"file\"]"]);
        let run = publisher(&browser)
            .run("Ghost media", Some(Path::new("/nonexistent/abc.png")))
            .await;

        assert!(run.outcome.is_ok());
        assert!(!run.states.contains(&XState::MediaAttached));
    }

    #[tokio::test]
    async fn test_missing_password_field_fails_and_closes() {
        let browser = logged_in_page();
        browser.remove_element("input[name=\"password\"]");

        let run = publisher(&browser).run("Hello", None).await;

        assert_eq!(step_of(&run.outcome).as_deref(), Some("password"));
        assert_eq!(
            &run.states[..3],
            &[XState::Start, XState::LoggedOut, XState::CredentialsSubmitted]
        );
        assert_eq!(run.states.len(), 4);
        assert!(matches!(
            run.states.last(),
            Some(XState::Failed { step, .. }) if step == "password"
        ));
        assert_eq!(browser.filled("input[name=\"text\"]").as_deref(), Some("rocketeer"));
        assert!(browser.all_closed());
    }

    #[tokio::test]
    async fn test_load_fallback_when_home_not_reached() {
        let browser = ScriptedBrowser::new()
            .with_elements(&[
                "input[autocomplete=\"username\"]",
                "input[name=\"password\"]",
                "div[aria-label=\"Post text\"]",
                "div[data-testid=\"tweetButtonInline\"]",
            ])
            .with_load_completing(true);

        let run = publisher(&browser).run("Degraded", None).await;

        assert!(run.outcome.is_ok());
        assert!(browser.actions().contains(&BrowserAction::WaitForLoad));
        // inline composer clicked when no new-post button exists
        assert!(browser
            .actions()
            .contains(&BrowserAction::Click("div[aria-label=\"Post text\"]".to_string())));
    }

    #[tokio::test]
    async fn test_authentication_fails_when_nothing_loads() {
        let browser = ScriptedBrowser::new()
            .with_elements(&["input[name=\"text\"]", "input[name=\"password\"]"])
            .with_load_completing(false);

        let run = publisher(&browser).run("Hello", None).await;

        assert_eq!(step_of(&run.outcome).as_deref(), Some("authenticate"));
        assert!(browser.all_closed());
    }

    #[tokio::test]
    async fn test_missing_textarea() {
        let browser = logged_in_page();
        browser.remove_element("div[data-testid=\"tweetTextarea_0\"]");

        let run = publisher(&browser).run("Hello", None).await;

        match run.outcome {
            Err(PlatformError::Automation { step, reason, .. }) => {
                assert_eq!(step, "text");
                assert_eq!(reason, "composer textarea not found.");
            }
            other => panic!("Expected text step failure, got {:?}", other),
        }
        assert!(browser.all_closed());
    }

    #[tokio::test]
    async fn test_missing_tweet_button() {
        let browser = logged_in_page();
        browser.remove_element("div[data-testid=\"tweetButton\"]");

        let run = publisher(&browser).run("Hello", None).await;

        assert_eq!(step_of(&run.outcome).as_deref(), Some("submit"));
        assert!(run
            .outcome
            .unwrap_err()
            .to_string()
            .contains("tweet button not found."));
        assert!(browser.all_closed());
    }

    #[tokio::test]
    async fn test_login_page_timeout() {
        let browser = logged_in_page().with_failing_navigation();
        let run = publisher(&browser).run("Hello", None).await;

        assert_eq!(step_of(&run.outcome).as_deref(), Some("open login"));
        assert!(browser.all_closed());
    }

    #[tokio::test]
    async fn test_unconfigured_never_launches() {
        let browser = logged_in_page();
        let publisher = XPublisher::new(
            Some("rocketeer".to_string()),
            Some("   ".to_string()),
            Arc::new(browser.launcher()),
        );

        assert!(!publisher.is_configured());
        let err = publisher.publish("Hello", None).await.unwrap_err();
        assert_eq!(err, PlatformError::NotConfigured(NOT_CONFIGURED.to_string()));
        assert_eq!(browser.launches(), 0);
    }

    #[tokio::test]
    async fn test_launch_failure() {
        let browser = ScriptedBrowser::new().with_failing_launch();
        let run = publisher(&browser).run("Hello", None).await;

        assert_eq!(step_of(&run.outcome).as_deref(), Some("launch"));
    }
}
