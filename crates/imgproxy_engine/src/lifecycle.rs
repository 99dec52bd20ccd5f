//! The engine's context object: installation, event dispatch and teardown.

use std::cell::Ref;
use std::rc::Rc;
use std::time::Duration;

use imgproxy_core::vocab::{self, NAMESPACE};
use imgproxy_core::{
    classify, ConfigError, DedupLedger, PageSignals, ProxyConfig, SiteCategories, SiteCategory,
    HOST_DATA_GLOBAL,
};
use imgproxy_logging::{proxy_debug, proxy_error, proxy_info, set_debug_enabled};
use thiserror::Error;

use crate::css::{sweep_inline_backgrounds, CssEngine};
use crate::guard::isolate;
use crate::intercept::ElementInterceptor;
use crate::network::NetworkInterceptor;
use crate::observer::MutationBatch;
use crate::page::{
    InterceptionPoint, ListenerKind, MutationRecord, NetworkPoint, NodeId, ObserveOptions,
    ObserverId, Page, PageEvent, Property, QueryScope, TimerId,
};
use crate::rewriter::{RewriteMode, RewriteStats, Rewriter};
use crate::scan;
use crate::scheduler::{jittered, Debounce, Registry, Task};

const LAZY_SCAN_FACTOR: f64 = 1.5;
const IFRAME_SCAN_FACTOR: f64 = 2.0;

#[derive(Debug, Error)]
pub enum InstallError {
    #[error("an image proxy is already installed on this page")]
    AlreadyInstalled,
    #[error("domain {0} is excluded")]
    DomainExcluded(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] ConfigError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Uninitialized,
    Initializing,
    DomPending,
    Running,
    Stopped,
}

/// Interception points whose hooks the platform refused.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DegradedHooks {
    pub element: Vec<InterceptionPoint>,
    pub network: Vec<NetworkPoint>,
}

impl DegradedHooks {
    pub fn is_empty(&self) -> bool {
        self.element.is_empty() && self.network.is_empty()
    }
}

pub struct ImageProxy {
    rewriter: Rc<Rewriter>,
    registry: Registry,
    css: CssEngine,
    categories: SiteCategories,
    state: LifecycleState,
    viewport: Debounce,
    degraded: DegradedHooks,
}

impl ImageProxy {
    /// Installs every interception the configuration enables and starts the
    /// DOM-dependent features now or once the document is ready.
    pub fn install(page: &mut dyn Page, config: ProxyConfig) -> Result<Self, InstallError> {
        config.validate()?;
        let hostname = page.location().hostname().to_string();
        if config.is_domain_excluded(&hostname) {
            return Err(InstallError::DomainExcluded(hostname));
        }
        if !page.claim_namespace(NAMESPACE) {
            return Err(InstallError::AlreadyInstalled);
        }
        set_debug_enabled(config.debug);

        let rewriter = Rc::new(Rewriter::new(config, page.location().clone()));
        let mut proxy = Self {
            rewriter,
            registry: Registry::new(),
            css: CssEngine::new(),
            categories: SiteCategories::empty(),
            state: LifecycleState::Uninitialized,
            viewport: Debounce::default(),
            degraded: DegradedHooks::default(),
        };
        proxy.state = LifecycleState::Initializing;
        proxy.install_hooks(page);
        page.add_listener(ListenerKind::BeforeUnload);

        let config = proxy.rewriter.config();
        if !config.wait_for_dom_ready || page.is_ready() {
            proxy.setup_dom(page);
        } else {
            let fallback = Duration::from_millis(config.dom_ready_fallback_ms);
            proxy.state = LifecycleState::DomPending;
            page.add_listener(ListenerKind::DomContentLoaded);
            proxy.registry.once(page, fallback, Task::DomReadyFallback);
            proxy_debug!("waiting for document readiness");
        }
        proxy_info!("image proxy installed on {}", proxy.rewriter.location().origin());
        Ok(proxy)
    }

    fn install_hooks(&mut self, page: &mut dyn Page) {
        let config = self.rewriter.config();
        let mut points = Vec::new();
        if config.direct_prototype_intercept {
            points.extend([Property::Src, Property::Srcset, Property::Poster].map(InterceptionPoint::Property));
        }
        if config.process_dynamic_images {
            points.extend([InterceptionPoint::Insertion, InterceptionPoint::HtmlAssignment]);
        }

        let hooks = Rc::new(ElementInterceptor::new(Rc::clone(&self.rewriter)));
        for point in points {
            if let Err(err) = page.install_element_hooks(point, hooks.clone()) {
                proxy_error!("failed to intercept {point:?}: {err}");
                self.degraded.element.push(point);
            }
        }

        if config.intercept_network {
            let hooks = Rc::new(NetworkInterceptor::new(Rc::clone(&self.rewriter)));
            for point in [NetworkPoint::XhrOpen, NetworkPoint::Fetch] {
                if let Err(err) = page.install_network_hooks(point, hooks.clone()) {
                    proxy_error!("failed to intercept {point:?}: {err}");
                    self.degraded.network.push(point);
                }
            }
        }
    }

    fn setup_dom(&mut self, page: &mut dyn Page) {
        if !matches!(self.state, LifecycleState::Initializing | LifecycleState::DomPending) {
            return;
        }
        self.state = LifecycleState::Running;
        let rewriter = Rc::clone(&self.rewriter);
        let config = rewriter.config();

        if config.site_specific_handling {
            self.categories = detect_categories(page);
            if !self.categories.is_empty() {
                proxy_info!("detected site categories: {:?}", self.categories);
            }
        }

        let initial = isolate("initial sweep", || scan::general_scan(page, &rewriter));
        proxy_debug!("initial sweep rewrote {initial} images");
        if config.process_css_backgrounds {
            isolate("initial inline sweep", || sweep_inline_backgrounds(page, &rewriter));
            let delay = Duration::from_millis(config.css_sweep_delay_ms);
            self.registry.once(page, delay, Task::StylesheetSweep);
            self.registry.every(
                page,
                Duration::from_millis(config.inline_style_interval_ms),
                Task::InlineStyleScan,
            );
        }

        let base = config.scan_interval();
        let jitter = Duration::from_millis(config.scan_jitter_ms);
        self.registry.every(page, jittered(base, jitter, 1.0), Task::GeneralScan);

        if config.process_dynamic_images {
            let options = ObserveOptions {
                child_list: true,
                subtree: true,
                attribute_filter: vocab::observed_attributes(),
            };
            match page.observe_mutations(options) {
                Ok(observer) => self.registry.add_observer(observer),
                Err(err) => proxy_error!("mutation observer unavailable: {err}"),
            }
            self.registry.every(page, jittered(base, jitter, LAZY_SCAN_FACTOR), Task::LazyScan);
            self.registry.every(page, jittered(base, jitter, IFRAME_SCAN_FACTOR), Task::IframeScan);
            page.add_listener(ListenerKind::Scroll);
            page.add_listener(ListenerKind::Resize);
        }

        if config.site_specific_handling {
            for category in SiteCategory::ALL {
                let detected = self.categories.contains(category.flag());
                let period = category.profile().scan_interval(detected, config);
                self.registry.every(page, period, Task::CategoryScan(category));
            }
        }
    }

    /// Single dispatch entry for every platform callback.
    pub fn handle(&mut self, page: &mut dyn Page, event: PageEvent) {
        match event {
            // HTML-assignment hooks outlive teardown, so their sweeps do too.
            PageEvent::DeferredSweep(root) => self.deferred_sweep(page, root),
            _ if self.state == LifecycleState::Stopped => {}
            PageEvent::DomContentLoaded => {
                if self.state == LifecycleState::DomPending {
                    self.setup_dom(page);
                }
            }
            PageEvent::Timer(timer) => self.on_timer(page, timer),
            PageEvent::Mutations { observer, records } => self.on_mutations(page, observer, &records),
            PageEvent::Scroll | PageEvent::Resize => self.on_viewport_change(page),
            PageEvent::BeforeUnload => self.stop(page),
        }
    }

    fn on_timer(&mut self, page: &mut dyn Page, timer: TimerId) {
        let Some(task) = self.registry.fired(timer) else {
            return;
        };
        let rewriter = Rc::clone(&self.rewriter);
        match task {
            Task::DomReadyFallback => {
                if self.state == LifecycleState::DomPending {
                    proxy_debug!("readiness signal missed; starting DOM features");
                    self.setup_dom(page);
                }
            }
            Task::GeneralScan => {
                isolate("general scan", || scan::general_scan(page, &rewriter));
            }
            Task::LazyScan => {
                isolate("lazy scan", || scan::lazy_scan(page, &rewriter));
            }
            Task::IframeScan => {
                isolate("iframe scan", || scan::iframe_scan(page, &rewriter));
            }
            Task::InlineStyleScan => {
                isolate("inline style scan", || sweep_inline_backgrounds(page, &rewriter));
            }
            Task::StylesheetSweep => {
                let css = &mut self.css;
                isolate("stylesheet sweep", || css.sweep_stylesheets(page, &rewriter));
            }
            Task::CategoryScan(category) => {
                isolate(category.name(), || scan::category_scan(page, &rewriter, category.profile()));
            }
            Task::ViewportDebounce => {
                let quiet = self.scroll_quiet_period();
                match self.viewport.elapsed(page.now(), quiet) {
                    Ok(()) => {
                        isolate("viewport scan", || scan::viewport_scan(page, &rewriter));
                    }
                    Err(remaining) => {
                        let timer = self.registry.once(page, remaining, Task::ViewportDebounce);
                        self.viewport.armed(timer);
                    }
                }
            }
        }
    }

    fn on_mutations(&mut self, page: &mut dyn Page, observer: ObserverId, records: &[MutationRecord]) {
        if !self.registry.has_observer(observer) {
            return;
        }
        let batch = isolate("mutation batch", || {
            MutationBatch::collect(page, records).map(Some)
        });
        if let Some(batch) = batch.filter(|batch| !batch.is_empty()) {
            batch.process(page, &self.rewriter);
        }
    }

    fn on_viewport_change(&mut self, page: &mut dyn Page) {
        let quiet = self.scroll_quiet_period();
        if let Some(delay) = self.viewport.trigger(page.now(), quiet) {
            let timer = self.registry.once(page, delay, Task::ViewportDebounce);
            self.viewport.armed(timer);
        }
    }

    fn scroll_quiet_period(&self) -> Duration {
        Duration::from_millis(self.rewriter.config().scroll_debounce_ms)
    }

    fn deferred_sweep(&mut self, page: &mut dyn Page, root: NodeId) {
        let rewriter = Rc::clone(&self.rewriter);
        let count = isolate("deferred sweep", || {
            let mut count = usize::from(rewriter.rewrite_element(page, root, RewriteMode::Deduplicated)?);
            count += rewriter.sweep_subtree(page, QueryScope::Subtree(root))?;
            Ok(count)
        });
        proxy_debug!("deferred sweep rewrote {count} elements");
    }

    /// Clears every registered timer and disconnects every observer.
    /// Installed hooks stay in place. Calling it twice is harmless.
    pub fn stop(&mut self, page: &mut dyn Page) {
        if self.state == LifecycleState::Stopped {
            return;
        }
        self.registry.clear(page);
        self.viewport.reset();
        self.state = LifecycleState::Stopped;
        proxy_info!("image proxy stopped; {} rewrites applied", self.stats().total());
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    pub fn categories(&self) -> SiteCategories {
        self.categories
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn css(&self) -> &CssEngine {
        &self.css
    }

    pub fn degraded_hooks(&self) -> &DegradedHooks {
        &self.degraded
    }

    pub fn rewriter(&self) -> &Rewriter {
        &self.rewriter
    }

    pub fn ledger(&self) -> Ref<'_, DedupLedger> {
        self.rewriter.ledger()
    }

    pub fn stats(&self) -> RewriteStats {
        self.rewriter.stats()
    }

    pub fn rewrite_url_string(&self, value: &str) -> String {
        self.rewriter.rewrite_url_string(value)
    }

    /// Rewrites one element on demand, outside any scan.
    pub fn rewrite_if_needed(&self, page: &mut dyn Page, node: NodeId) -> bool {
        isolate("rewrite", || {
            self.rewriter.rewrite_element(page, node, RewriteMode::Deduplicated)
        })
    }
}

fn detect_categories(page: &mut dyn Page) -> SiteCategories {
    let has_host_data = page
        .host_global_mut(HOST_DATA_GLOBAL)
        .is_some_and(|value| value.is_array());
    let title = page.title();
    let body = page.body_text();
    let location = page.location().clone();
    let signals = PageSignals {
        title: &title,
        hostname: location.hostname(),
        body_text: body.as_deref(),
        has_host_data,
    };
    let page: &dyn Page = page;
    classify(&signals, |selector| {
        page.query_all(QueryScope::Document, selector)
            .is_ok_and(|nodes| !nodes.is_empty())
    })
}
