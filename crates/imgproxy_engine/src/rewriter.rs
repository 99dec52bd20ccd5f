use std::cell::{Ref, RefCell};

use imgproxy_core::vocab::{self, LAZY_ATTRIBUTES, LAZY_SRCSET_ATTRIBUTES};
use imgproxy_core::{
    first_url, is_candidate_background, rewrite_srcset, DedupLedger, ImageLikePolicy, LedgerKey,
    PageLocation, ProxyConfig, Resolution, Surface, UrlResolver,
};
use imgproxy_logging::{abbreviate, proxy_debug};

use crate::guard::{isolate, RewriteError};
use crate::page::{ElementAccess, NodeId, Page, PageError, Property, QueryScope};

/// Per-surface counters of applied rewrites.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteStats {
    pub sources: usize,
    pub srcsets: usize,
    pub lazy_attributes: usize,
    pub posters: usize,
    pub backgrounds: usize,
    pub stylesheet_rules: usize,
    pub host_entries: usize,
    pub requests: usize,
}

impl RewriteStats {
    pub fn total(&self) -> usize {
        self.sources
            + self.srcsets
            + self.lazy_attributes
            + self.posters
            + self.backgrounds
            + self.stylesheet_rules
            + self.host_entries
            + self.requests
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewriteMode {
    /// Skip URLs the ledger has already seen.
    Deduplicated,
    /// Rewrite regardless of the ledger; the proxy-marker check still applies.
    Forced,
}

/// Shared rewrite state: configuration, resolver and the dedup ledger.
///
/// Every rewrite path checks the ledger, stores the shadow attribute, marks
/// the ledger, and only then performs the visible write.
pub struct Rewriter {
    config: ProxyConfig,
    location: PageLocation,
    resolver: UrlResolver,
    image_like: ImageLikePolicy,
    ledger: RefCell<DedupLedger>,
    stats: RefCell<RewriteStats>,
}

impl Rewriter {
    pub fn new(config: ProxyConfig, location: PageLocation) -> Self {
        let resolver = UrlResolver::from_config(&config);
        let ledger = DedupLedger::new(config.prevent_duplicates);
        Self {
            config,
            location,
            resolver,
            image_like: ImageLikePolicy::default(),
            ledger: RefCell::new(ledger),
            stats: RefCell::new(RewriteStats::default()),
        }
    }

    pub fn with_image_like_policy(mut self, policy: ImageLikePolicy) -> Self {
        self.image_like = policy;
        self
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn location(&self) -> &PageLocation {
        &self.location
    }

    pub fn resolver(&self) -> &UrlResolver {
        &self.resolver
    }

    pub fn image_like(&self) -> &ImageLikePolicy {
        &self.image_like
    }

    pub fn ledger(&self) -> Ref<'_, DedupLedger> {
        self.ledger.borrow()
    }

    pub fn stats(&self) -> RewriteStats {
        *self.stats.borrow()
    }

    pub(crate) fn record(&self, bump: impl FnOnce(&mut RewriteStats)) {
        bump(&mut self.stats.borrow_mut());
    }

    pub fn resolve(&self, value: &str) -> Resolution {
        self.resolver.resolve(value, &self.location)
    }

    /// The proxied form of `value`, or `value` unchanged when it is rejected.
    pub fn rewrite_url_string(&self, value: &str) -> String {
        self.resolver.rewrite(value, &self.location)
    }

    pub(crate) fn admits(&self, key: &LedgerKey, mode: RewriteMode) -> bool {
        mode == RewriteMode::Forced || self.ledger.borrow().should_process(key)
    }

    pub(crate) fn mark(&self, key: &LedgerKey) {
        self.ledger.borrow_mut().mark_processed(key);
    }

    /// Setter path for `src` and `poster`: returns the value to forward.
    ///
    /// Any accepted value is forwarded proxied. A ledger hit only skips the
    /// bookkeeping, so repeating an assignment never reverts the element.
    pub(crate) fn intercept_url_write(
        &self,
        element: &mut dyn ElementAccess,
        property: Property,
        value: &str,
    ) -> Result<String, RewriteError> {
        let Resolution::Proxied { absolute, proxied } = self.resolve(value) else {
            return Ok(value.to_string());
        };
        let key = match property {
            Property::Poster => LedgerKey::namespaced(Surface::Poster, absolute),
            Property::Src | Property::Srcset => LedgerKey::url(absolute),
        };
        let shadow = vocab::shadow_attribute(property.attribute_name());
        if !self.admits(&key, RewriteMode::Deduplicated) {
            if !element.has_attribute(&shadow) {
                element.set_attribute(&shadow, value)?;
            }
            return Ok(proxied);
        }
        element.set_attribute(&shadow, value)?;
        self.mark(&key);
        self.record(|s| match property {
            Property::Poster => s.posters += 1,
            Property::Src | Property::Srcset => s.sources += 1,
        });
        proxy_debug!("intercepted {} write: {}", property.attribute_name(), abbreviate(value));
        Ok(proxied)
    }

    /// Setter path for `srcset`: returns the value to forward.
    pub(crate) fn intercept_srcset_write(
        &self,
        element: &mut dyn ElementAccess,
        value: &str,
    ) -> Result<String, RewriteError> {
        if value.trim().is_empty() || self.resolver.contains_marker(value) {
            return Ok(value.to_string());
        }
        let rewritten = self.rewrite_srcset_value(value);
        if rewritten == value {
            return Ok(value.to_string());
        }
        element.set_attribute(&vocab::shadow_attribute("srcset"), value)?;
        self.mark(&LedgerKey::namespaced(Surface::Srcset, value));
        self.record(|s| s.srcsets += 1);
        Ok(rewritten)
    }

    pub fn rewrite_srcset_value(&self, value: &str) -> String {
        rewrite_srcset(value, |url| match self.resolve(url) {
            Resolution::Proxied { proxied, .. } => Some(proxied),
            Resolution::Rejected(_) => None,
        })
    }

    /// Single-image rewrite: `src`, `srcset`, then every lazy attribute.
    pub fn rewrite_image(
        &self,
        element: &mut dyn ElementAccess,
        mode: RewriteMode,
    ) -> Result<bool, RewriteError> {
        let mut processed = self.rewrite_src(element, mode)?;
        processed |= self.rewrite_srcset_attribute(element, mode)?;
        processed |= self.rewrite_lazy_attributes(element, mode);
        Ok(processed)
    }

    /// Lazy-loading attributes on any element, each isolated from the others.
    pub fn rewrite_lazy_attributes(&self, element: &mut dyn ElementAccess, mode: RewriteMode) -> bool {
        let mut processed = false;
        for name in LAZY_ATTRIBUTES {
            processed |= isolate(name, || self.rewrite_lazy_attribute(element, name, mode));
        }
        processed
    }

    fn rewrite_src(&self, element: &mut dyn ElementAccess, mode: RewriteMode) -> Result<bool, RewriteError> {
        let Some(original) = element.attribute("src").map(str::to_string) else {
            return Ok(false);
        };
        let Resolution::Proxied { absolute, proxied } = self.resolve(&original) else {
            return Ok(false);
        };
        let key = LedgerKey::url(absolute);
        if !self.admits(&key, mode) {
            return Ok(false);
        }
        element.set_attribute(&vocab::shadow_attribute("src"), &original)?;
        self.mark(&key);
        element.set_attribute("src", &proxied)?;
        self.record(|s| s.sources += 1);
        proxy_debug!("rewrote image src: {}", abbreviate(&original));
        Ok(true)
    }

    fn rewrite_srcset_attribute(
        &self,
        element: &mut dyn ElementAccess,
        mode: RewriteMode,
    ) -> Result<bool, RewriteError> {
        let Some(original) = element.attribute("srcset").map(str::to_string) else {
            return Ok(false);
        };
        if original.trim().is_empty() || self.resolver.contains_marker(&original) {
            return Ok(false);
        }
        let key = LedgerKey::namespaced(Surface::Srcset, original.as_str());
        if !self.admits(&key, mode) {
            return Ok(false);
        }
        let rewritten = self.rewrite_srcset_value(&original);
        if rewritten == original {
            return Ok(false);
        }
        element.set_attribute(&vocab::shadow_attribute("srcset"), &original)?;
        self.mark(&key);
        element.set_attribute("srcset", &rewritten)?;
        self.record(|s| s.srcsets += 1);
        Ok(true)
    }

    fn rewrite_lazy_attribute(
        &self,
        element: &mut dyn ElementAccess,
        name: &str,
        mode: RewriteMode,
    ) -> Result<bool, RewriteError> {
        let shadow = vocab::shadow_attribute(name);
        if element.has_attribute(&shadow) {
            return Ok(false);
        }
        let Some(original) = element.attribute(name).map(str::to_string) else {
            return Ok(false);
        };

        let (key, rewritten) = if LAZY_SRCSET_ATTRIBUTES.contains(&name) {
            if original.trim().is_empty() || self.resolver.contains_marker(&original) {
                return Ok(false);
            }
            let rewritten = self.rewrite_srcset_value(&original);
            if rewritten == original {
                return Ok(false);
            }
            (LedgerKey::namespaced(Surface::Attribute(name.to_string()), original.as_str()), rewritten)
        } else {
            let Resolution::Proxied { absolute, proxied } = self.resolve(&original) else {
                return Ok(false);
            };
            (LedgerKey::namespaced(Surface::Attribute(name.to_string()), absolute), proxied)
        };

        if !self.admits(&key, mode) {
            return Ok(false);
        }
        element.set_attribute(&shadow, &original)?;
        self.mark(&key);
        element.set_attribute(name, &rewritten)?;
        self.record(|s| s.lazy_attributes += 1);
        proxy_debug!("rewrote {name}: {}", abbreviate(&original));
        Ok(true)
    }

    /// `poster` on audio/video. The shadow attribute doubles as the dedup signal.
    pub fn rewrite_poster(&self, element: &mut dyn ElementAccess) -> Result<bool, RewriteError> {
        let shadow = vocab::shadow_attribute("poster");
        if element.has_attribute(&shadow) {
            return Ok(false);
        }
        let Some(original) = element.attribute("poster").map(str::to_string) else {
            return Ok(false);
        };
        let Resolution::Proxied { absolute, proxied } = self.resolve(&original) else {
            return Ok(false);
        };
        let key = LedgerKey::namespaced(Surface::Poster, absolute);
        if !self.admits(&key, RewriteMode::Deduplicated) {
            return Ok(false);
        }
        element.set_attribute(&shadow, &original)?;
        self.mark(&key);
        element.set_attribute("poster", &proxied)?;
        self.record(|s| s.posters += 1);
        proxy_debug!("rewrote poster: {}", abbreviate(&original));
        Ok(true)
    }

    /// Inline `background-image`, overwritten in place.
    pub fn rewrite_inline_background(
        &self,
        element: &mut dyn ElementAccess,
    ) -> Result<bool, RewriteError> {
        let Some(value) = element.inline_style("background-image") else {
            return Ok(false);
        };
        if !is_candidate_background(&value, self.resolver.marker()) {
            return Ok(false);
        }
        let Some(url) = first_url(&value).map(str::to_string) else {
            return Ok(false);
        };
        let Resolution::Proxied { absolute, proxied } = self.resolve(&url) else {
            return Ok(false);
        };
        let key = LedgerKey::namespaced(Surface::Background, absolute);
        if !self.admits(&key, RewriteMode::Deduplicated) {
            return Ok(false);
        }
        self.mark(&key);
        element.set_inline_style("background-image", &format!("url(\"{proxied}\")"))?;
        self.record(|s| s.backgrounds += 1);
        proxy_debug!("rewrote background: {}", abbreviate(&url));
        Ok(true)
    }

    /// Whether any exclusion selector matches. Invalid selectors never match.
    pub fn should_skip(&self, page: &dyn Page, node: NodeId) -> bool {
        self.config
            .exclude_selectors
            .iter()
            .any(|selector| page.matches(node, selector).unwrap_or(false))
    }

    /// Rewrites whatever image surfaces `node` carries.
    pub fn rewrite_element(
        &self,
        page: &mut dyn Page,
        node: NodeId,
        mode: RewriteMode,
    ) -> Result<bool, RewriteError> {
        if self.should_skip(page, node) {
            return Ok(false);
        }
        let css = self.config.process_css_backgrounds;
        let element = page.element_mut(node).ok_or(PageError::NotAnElement(node))?;
        let tag = element.tag_name().to_string();
        let mut processed = match tag.as_str() {
            "img" => self.rewrite_image(element, mode)?,
            "video" | "audio" => self.rewrite_poster(element)?,
            _ => self.rewrite_lazy_attributes(element, mode),
        };
        if css {
            processed |= self.rewrite_inline_background(element)?;
        }
        Ok(processed)
    }

    /// Images and media posters below `root`, each isolated from the others.
    pub fn sweep_subtree(&self, page: &mut dyn Page, root: QueryScope) -> Result<usize, RewriteError> {
        let mut count = 0;
        for node in page.query_all(root, "img")? {
            if self.should_skip(page, node) {
                continue;
            }
            count += usize::from(isolate("image", || {
                let element = page.element_mut(node).ok_or(PageError::NotAnElement(node))?;
                self.rewrite_image(element, RewriteMode::Deduplicated)
            }));
        }
        for node in page.query_all(root, "video[poster], audio[poster]")? {
            if self.should_skip(page, node) {
                continue;
            }
            count += usize::from(isolate("poster", || {
                let element = page.element_mut(node).ok_or(PageError::NotAnElement(node))?;
                self.rewrite_poster(element)
            }));
        }
        Ok(count)
    }
}
