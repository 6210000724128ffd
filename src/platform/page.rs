use std::env;

use crate::monitor::NavigationTiming;

/// Description of a DOM element, detached from the host's object model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementInfo {
    /// Upper-case tag name as reported by `Element.tagName`.
    pub tag_name: String,
    pub id: String,
    pub class_name: String,
    /// Resolved `src` property (scripts, images, media).
    pub src: Option<String>,
    /// Resolved `href` property (stylesheets, links).
    pub href: Option<String>,
}

impl ElementInfo {
    pub fn new(tag_name: impl Into<String>) -> Self {
        Self {
            tag_name: tag_name.into(),
            ..Default::default()
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_class(mut self, class_name: impl Into<String>) -> Self {
        self.class_name = class_name.into();
        self
    }

    pub fn with_src(mut self, src: impl Into<String>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.href = Some(href.into());
        self
    }

    /// URL of the external asset this element loads, if any.
    pub fn resource_url(&self) -> Option<&str> {
        self.src
            .as_deref()
            .filter(|src| !src.is_empty())
            .or_else(|| self.href.as_deref().filter(|href| !href.is_empty()))
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.class_name.split_whitespace()
    }

    pub fn lower_tag(&self) -> String {
        self.tag_name.to_ascii_lowercase()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

/// Read access to the hosting page.
///
/// Hit-testing is optional: hosts without a layout engine keep the defaults, which
/// disables the white-screen check.
pub trait PageContext: Send + Sync {
    fn title(&self) -> String;
    fn url(&self) -> String;
    fn user_agent(&self) -> String;

    fn viewport(&self) -> Option<Viewport> {
        None
    }

    fn element_from_point(&self, _x: f64, _y: f64) -> Option<ElementInfo> {
        None
    }

    fn referrer(&self) -> String {
        String::new()
    }

    /// BCP 47 tag of the preferred language, e.g. `en-US`.
    fn language(&self) -> String {
        String::new()
    }

    /// Size of the physical screen, as opposed to the [`viewport`](PageContext::viewport).
    fn screen(&self) -> Option<Viewport> {
        None
    }

    /// Marks of the current navigation, when the host records them.
    fn navigation_timing(&self) -> Option<NavigationTiming> {
        None
    }
}

/// Fixed page description, used on native targets and in tests.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StaticPage {
    pub title: String,
    pub url: String,
    pub user_agent: String,
    pub referrer: String,
    pub language: String,
    pub screen: Option<Viewport>,
    pub navigation_timing: Option<NavigationTiming>,
}

impl StaticPage {
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        user_agent: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            user_agent: user_agent.into(),
            ..Default::default()
        }
    }

    /// Reads `PAGE_MONITOR_TITLE`, `PAGE_MONITOR_URL`, `PAGE_MONITOR_USER_AGENT` and
    /// `PAGE_MONITOR_REFERRER`; the language comes from the POSIX `LANG` locale.
    pub fn from_env() -> Self {
        Self {
            title: env::var("PAGE_MONITOR_TITLE").unwrap_or_default(),
            url: env::var("PAGE_MONITOR_URL").unwrap_or_default(),
            user_agent: env::var("PAGE_MONITOR_USER_AGENT").unwrap_or_else(|_| {
                format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"))
            }),
            referrer: env::var("PAGE_MONITOR_REFERRER").unwrap_or_default(),
            language: env::var("LANG")
                .map(|locale| language_tag(&locale))
                .unwrap_or_default(),
            ..Default::default()
        }
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = referrer.into();
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    pub fn with_screen(mut self, screen: Viewport) -> Self {
        self.screen = Some(screen);
        self
    }

    pub fn with_navigation_timing(mut self, timing: NavigationTiming) -> Self {
        self.navigation_timing = Some(timing);
        self
    }
}

/// `en_US.UTF-8` becomes `en-US`; the `C` and `POSIX` locales carry no language.
fn language_tag(locale: &str) -> String {
    let name = locale.split(['.', '@']).next().unwrap_or_default();
    if name.is_empty() || name == "C" || name == "POSIX" {
        return String::new();
    }
    name.replace('_', "-")
}

impl PageContext for StaticPage {
    fn title(&self) -> String {
        self.title.clone()
    }

    fn url(&self) -> String {
        self.url.clone()
    }

    fn user_agent(&self) -> String {
        self.user_agent.clone()
    }

    fn referrer(&self) -> String {
        self.referrer.clone()
    }

    fn language(&self) -> String {
        self.language.clone()
    }

    fn screen(&self) -> Option<Viewport> {
        self.screen
    }

    fn navigation_timing(&self) -> Option<NavigationTiming> {
        self.navigation_timing
    }
}

/// Page context for the current host: the live document on wasm, [`StaticPage::from_env`]
/// elsewhere.
pub fn default_page_context() -> std::sync::Arc<dyn PageContext> {
    #[cfg(all(feature = "wasm-web", target_arch = "wasm32"))]
    {
        return std::sync::Arc::new(crate::platform::browser::BrowserPage);
    }
    #[cfg(not(all(feature = "wasm-web", target_arch = "wasm32")))]
    {
        std::sync::Arc::new(StaticPage::from_env())
    }
}
