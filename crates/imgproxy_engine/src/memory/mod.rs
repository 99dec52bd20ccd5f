//! An in-memory page: enough of a browser document for the engine to run
//! against, driven by a virtual clock.
//!
//! Host-script actions such as [`MemoryPage::set_property`] or
//! [`MemoryPage::set_inner_html`] go through the installed hooks exactly as
//! page scripts would. [`MemoryPage::settle`] and [`MemoryPage::run_for`]
//! deliver the resulting callbacks to an [`ImageProxy`].

mod css;
mod dom;
mod selector;

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use imgproxy_core::PageLocation;
use imgproxy_logging::{proxy_trace, proxy_warn};
use serde_json::Value;

use crate::lifecycle::ImageProxy;
use crate::page::{
    CssRule, ElementAccess, ElementHooks, HtmlAssignment, InterceptionPoint, ListenerKind,
    MutationRecord, NetworkHooks, NetworkPoint, NodeId, ObserveOptions, ObserverId, Page,
    PageError, PageEvent, Property, QueryScope, Rect, RequestTarget, SheetId, TimerId,
};

use self::css::parse_stylesheet;
use self::dom::Dom;
use self::selector::SelectorList;

const DEFAULT_VIEWPORT_HEIGHT: f64 = 800.0;
const MAX_IMPORT_DEPTH: usize = 8;
const MAX_SETTLE_TURNS: usize = 10_000;

#[derive(Debug, Clone, Copy)]
struct ScheduledTimer {
    due: Duration,
    period: Option<Duration>,
}

#[derive(Debug, Clone)]
enum Frame {
    Document(NodeId),
    CrossOrigin(String),
}

/// One call through a network entry point.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub point: NetworkPoint,
    pub method: Option<String>,
    pub requested: String,
    /// What reached the native implementation.
    pub forwarded: String,
}

pub struct MemoryPage {
    location: PageLocation,
    dom: Dom,
    ready: bool,
    clock: Duration,
    next_timer: u64,
    timers: BTreeMap<TimerId, ScheduledTimer>,
    next_observer: u64,
    observers: BTreeMap<ObserverId, ObserveOptions>,
    child_records: Vec<MutationRecord>,
    queue: VecDeque<PageEvent>,
    listeners: HashSet<ListenerKind>,
    namespaces: HashSet<String>,
    element_hooks: HashMap<InterceptionPoint, Rc<dyn ElementHooks>>,
    network_hooks: HashMap<NetworkPoint, Rc<dyn NetworkHooks>>,
    sealed: HashSet<InterceptionPoint>,
    sealed_network: HashSet<NetworkPoint>,
    globals: HashMap<String, Value>,
    layout: HashMap<NodeId, Rect>,
    viewport_height: f64,
    scroll_y: f64,
    requests: Vec<Request>,
    resources: HashMap<String, String>,
    frames: HashMap<NodeId, Frame>,
    denied_sheets: HashSet<SheetId>,
    added_rules: HashMap<SheetId, Vec<String>>,
}

impl MemoryPage {
    /// A fully loaded page.
    pub fn new(html: &str, location: PageLocation) -> Self {
        let mut page = Self::loading(html, location);
        page.ready = true;
        page
    }

    /// A page whose document is parsed but not yet ready. Call
    /// [`MemoryPage::finish_loading`] to fire the readiness event.
    pub fn loading(html: &str, location: PageLocation) -> Self {
        let mut dom = Dom::new();
        dom.load_document(Dom::ROOT, html);
        let mut page = Self {
            location,
            dom,
            ready: false,
            clock: Duration::ZERO,
            next_timer: 1,
            timers: BTreeMap::new(),
            next_observer: 1,
            observers: BTreeMap::new(),
            child_records: Vec::new(),
            queue: VecDeque::new(),
            listeners: HashSet::new(),
            namespaces: HashSet::new(),
            element_hooks: HashMap::new(),
            network_hooks: HashMap::new(),
            sealed: HashSet::new(),
            sealed_network: HashSet::new(),
            globals: HashMap::new(),
            layout: HashMap::new(),
            viewport_height: DEFAULT_VIEWPORT_HEIGHT,
            scroll_y: 0.0,
            requests: Vec::new(),
            resources: HashMap::new(),
            frames: HashMap::new(),
            denied_sheets: HashSet::new(),
            added_rules: HashMap::new(),
        };
        page.index_frames();
        page
    }

    /// Registers a same- or cross-origin resource body (stylesheets, frame
    /// documents) under its absolute URL.
    pub fn add_resource(&mut self, url: &str, body: &str) {
        self.resources.insert(url.to_string(), body.to_string());
    }

    pub fn set_global(&mut self, name: &str, value: Value) {
        self.globals.insert(name.to_string(), value);
    }

    pub fn global(&self, name: &str) -> Option<&Value> {
        self.globals.get(name)
    }

    /// Makes hook installation at `point` fail, as a non-configurable
    /// property would.
    pub fn seal(&mut self, point: InterceptionPoint) {
        self.sealed.insert(point);
    }

    pub fn seal_network(&mut self, point: NetworkPoint) {
        self.sealed_network.insert(point);
    }

    /// Makes reading `sheet` fail as a cross-origin sheet would.
    pub fn deny_sheet(&mut self, sheet: SheetId) {
        self.denied_sheets.insert(sheet);
    }

    pub fn has_element_hooks(&self, point: InterceptionPoint) -> bool {
        self.element_hooks.contains_key(&point)
    }

    pub fn has_network_hooks(&self, point: NetworkPoint) -> bool {
        self.network_hooks.contains_key(&point)
    }

    pub fn active_timers(&self) -> usize {
        self.timers.len()
    }

    pub fn active_observers(&self) -> usize {
        self.observers.len()
    }

    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn document(&self) -> NodeId {
        Dom::ROOT
    }

    /// Matching elements in document order; empty for invalid selectors.
    pub fn select(&self, selector: &str) -> Vec<NodeId> {
        self.query_all(QueryScope::Document, selector).unwrap_or_default()
    }

    pub fn first(&self, selector: &str) -> Option<NodeId> {
        self.select(selector).into_iter().next()
    }

    pub fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.dom.element(node)?.attribute(name).map(str::to_string)
    }

    pub fn inline_style_of(&self, node: NodeId, property: &str) -> Option<String> {
        self.dom.element(node)?.inline_style(property)
    }

    /// Rules added to `sheet` through the object model.
    pub fn inserted_rules(&self, sheet: SheetId) -> &[String] {
        self.added_rules.get(&sheet).map(Vec::as_slice).unwrap_or_default()
    }

    /// The sheet created with the given element id, if any.
    pub fn sheet_by_id(&self, id: &str) -> Option<SheetId> {
        self.style_sheets()
            .into_iter()
            .find(|sheet| self.attribute(NodeId(sheet.0), "id").as_deref() == Some(id))
    }

    pub fn set_layout(&mut self, node: NodeId, top: f64, height: f64) {
        self.layout.insert(
            node,
            Rect {
                top,
                bottom: top + height,
            },
        );
    }

    pub fn to_html(&self) -> String {
        let extra = |node: NodeId| {
            self.added_rules
                .get(&SheetId(node.0))
                .map(|rules| format!("\n{}\n", rules.join("\n")))
        };
        self.dom.serialize_children(Dom::ROOT, &extra)
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.dom.create_element(tag)
    }

    /// Assigns an element property the way a script would, through any
    /// installed setter hook.
    pub fn set_property(&mut self, node: NodeId, property: Property, value: &str) -> Result<(), PageError> {
        let hook = self.element_hooks.get(&InterceptionPoint::Property(property)).cloned();
        let element = self.dom.element_mut(node).ok_or(PageError::NotAnElement(node))?;
        let applies = match property {
            Property::Src | Property::Srcset => element.tag_name() == "img",
            Property::Poster => element.tag_name() == "video",
        };
        let forwarded = match hook {
            Some(hook) if applies => hook.on_property_write(element, property, value),
            _ => value.to_string(),
        };
        element.set_attribute(property.attribute_name(), &forwarded)
    }

    /// `setAttribute`: never intercepted.
    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> Result<(), PageError> {
        let element = self.dom.element_mut(node).ok_or(PageError::NotAnElement(node))?;
        element.set_attribute(name, value)
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<(), PageError> {
        self.insert_node(parent, child, None)
    }

    pub fn insert_before(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), PageError> {
        self.insert_node(parent, child, reference)
    }

    fn insert_node(
        &mut self,
        parent: NodeId,
        child: NodeId,
        reference: Option<NodeId>,
    ) -> Result<(), PageError> {
        if let Some(hook) = self.element_hooks.get(&InterceptionPoint::Insertion).cloned() {
            if let Some(element) = self.dom.element_mut(child) {
                hook.before_insert(element);
            }
        }
        if self.dom.root_of(child) != Dom::ROOT {
            self.discard_changes(child);
        }
        self.dom.insert(parent, child, reference)?;
        self.child_records.push(MutationRecord::ChildList {
            target: parent,
            added: vec![child],
        });
        self.index_frames();
        Ok(())
    }

    pub fn set_inner_html(&mut self, node: NodeId, html: &str) -> Result<(), PageError> {
        self.dom.element(node).ok_or(PageError::NotAnElement(node))?;
        self.dom.clear_children(node);
        let added = self.dom.load_fragment(Some(node), html);
        if !added.is_empty() {
            self.child_records.push(MutationRecord::ChildList { target: node, added });
        }
        self.index_frames();
        let parent = self.dom.parent(node);
        self.after_assignment(node, HtmlAssignment::Inner, parent);
        Ok(())
    }

    pub fn set_outer_html(&mut self, node: NodeId, html: &str) -> Result<(), PageError> {
        self.dom.element(node).ok_or(PageError::NotAnElement(node))?;
        let parent = self
            .dom
            .parent(node)
            .ok_or_else(|| PageError::Unsupported("outer HTML of a detached node".into()))?;
        let added = self.dom.load_fragment(None, html);
        for id in &added {
            self.dom.insert(parent, *id, Some(node))?;
        }
        self.dom.detach(node);
        if !added.is_empty() {
            self.child_records.push(MutationRecord::ChildList { target: parent, added });
        }
        self.index_frames();
        self.after_assignment(node, HtmlAssignment::Outer, Some(parent));
        Ok(())
    }

    fn after_assignment(&mut self, target: NodeId, kind: HtmlAssignment, parent: Option<NodeId>) {
        let Some(hook) = self.element_hooks.get(&InterceptionPoint::HtmlAssignment).cloned() else {
            return;
        };
        if let Some(root) = hook.after_html_assignment(target, kind, parent) {
            self.queue.push_back(PageEvent::DeferredSweep(root));
        }
    }

    pub fn xhr_open(&mut self, method: &str, url: &str) -> String {
        self.request(
            NetworkPoint::XhrOpen,
            RequestTarget {
                method: Some(method.to_string()),
                url: url.to_string(),
            },
        )
    }

    pub fn fetch(&mut self, url: &str, method: Option<&str>) -> String {
        self.request(
            NetworkPoint::Fetch,
            RequestTarget {
                method: method.map(str::to_string),
                url: url.to_string(),
            },
        )
    }

    fn request(&mut self, point: NetworkPoint, target: RequestTarget) -> String {
        let forwarded = match self.network_hooks.get(&point).cloned() {
            Some(hook) => hook.on_request(point, &target),
            None => target.url.clone(),
        };
        self.requests.push(Request {
            point,
            method: target.method,
            requested: target.url,
            forwarded: forwarded.clone(),
        });
        forwarded
    }

    pub fn scroll_to(&mut self, y: f64) {
        self.scroll_y = y;
        self.emit(ListenerKind::Scroll, PageEvent::Scroll);
    }

    pub fn resize(&mut self, viewport_height: f64) {
        self.viewport_height = viewport_height;
        self.emit(ListenerKind::Resize, PageEvent::Resize);
    }

    pub fn finish_loading(&mut self) {
        if self.ready {
            return;
        }
        self.ready = true;
        self.emit(ListenerKind::DomContentLoaded, PageEvent::DomContentLoaded);
    }

    pub fn unload(&mut self) {
        self.emit(ListenerKind::BeforeUnload, PageEvent::BeforeUnload);
    }

    fn emit(&mut self, kind: ListenerKind, event: PageEvent) {
        if self.listeners.contains(&kind) {
            self.queue.push_back(event);
        }
    }

    /// Delivers pending mutation records and queued events until both run dry.
    pub fn settle(&mut self, proxy: &mut ImageProxy) {
        for _ in 0..MAX_SETTLE_TURNS {
            let mutations = self.take_mutation_events();
            if !mutations.is_empty() {
                for event in mutations {
                    proxy.handle(self, event);
                }
                continue;
            }
            match self.queue.pop_front() {
                Some(event) => proxy.handle(self, event),
                None => return,
            }
        }
        proxy_warn!("page did not settle after {MAX_SETTLE_TURNS} turns");
    }

    /// Advances the virtual clock, firing due timers in order.
    pub fn run_for(&mut self, proxy: &mut ImageProxy, duration: Duration) {
        let deadline = self.clock + duration;
        self.settle(proxy);
        while let Some((timer, due)) = self.next_due(deadline) {
            self.clock = due;
            match self.timers.get_mut(&timer) {
                Some(ScheduledTimer {
                    due,
                    period: Some(period),
                }) => *due += *period,
                _ => {
                    self.timers.remove(&timer);
                }
            }
            proxy.handle(self, PageEvent::Timer(timer));
            self.settle(proxy);
        }
        self.clock = deadline;
    }

    fn next_due(&self, deadline: Duration) -> Option<(TimerId, Duration)> {
        self.timers
            .iter()
            .filter(|(_, timer)| timer.due <= deadline)
            .min_by_key(|(id, timer)| (timer.due, **id))
            .map(|(id, timer)| (*id, timer.due))
    }

    fn discard_changes(&mut self, node: NodeId) {
        let mut subtree = self.dom.descendants(node);
        subtree.push(node);
        for id in subtree {
            if let Some(element) = self.dom.element_mut(id) {
                element.take_changes();
            }
        }
    }

    fn take_mutation_events(&mut self) -> Vec<PageEvent> {
        let mut records = std::mem::take(&mut self.child_records);
        for (id, element) in self.dom.elements_mut() {
            for name in element.take_changes() {
                records.push(MutationRecord::Attribute { target: id, name });
            }
        }
        records.retain(|record| {
            let target = match record {
                MutationRecord::ChildList { target, .. } | MutationRecord::Attribute { target, .. } => *target,
            };
            self.dom.root_of(target) == Dom::ROOT
        });
        if records.is_empty() {
            return Vec::new();
        }

        self.observers
            .iter()
            .filter_map(|(observer, options)| {
                let visible: Vec<MutationRecord> = records
                    .iter()
                    .filter(|record| match record {
                        MutationRecord::ChildList { .. } => options.child_list,
                        MutationRecord::Attribute { name, .. } => {
                            options.attribute_filter.is_empty()
                                || options.attribute_filter.iter().any(|wanted| wanted == name)
                        }
                    })
                    .cloned()
                    .collect();
                (!visible.is_empty()).then(|| PageEvent::Mutations {
                    observer: *observer,
                    records: visible,
                })
            })
            .collect()
    }

    /// Builds content documents for iframes seen for the first time.
    fn index_frames(&mut self) {
        let frames: Vec<NodeId> = self
            .dom
            .descendants(Dom::ROOT)
            .into_iter()
            .filter(|id| !self.frames.contains_key(id))
            .filter(|id| self.dom.element(*id).is_some_and(|el| el.tag_name() == "iframe"))
            .collect();
        for id in frames {
            let srcdoc = self.attribute(id, "srcdoc");
            let src = self.attribute(id, "src");
            let frame = match (srcdoc, src) {
                (Some(html), _) => Frame::Document(self.frame_from_html(&html)),
                (None, Some(src)) if !self.location.is_same_origin(&src) => Frame::CrossOrigin(src),
                (None, Some(src)) => {
                    let body = self
                        .location
                        .href()
                        .join(&src)
                        .ok()
                        .and_then(|url| self.resources.get(url.as_str()).cloned())
                        .unwrap_or_default();
                    Frame::Document(self.frame_from_html(&body))
                }
                (None, None) => Frame::Document(self.frame_from_html("")),
            };
            self.frames.insert(id, frame);
        }
    }

    fn frame_from_html(&mut self, html: &str) -> NodeId {
        let document = self.dom.create_document();
        self.dom.load_document(document, html);
        document
    }

    fn absolute(&self, href: &str) -> String {
        self.location
            .href()
            .join(href)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| href.to_string())
    }

    fn sheet_element(&self, sheet: SheetId) -> Result<(NodeId, &str), PageError> {
        let node = NodeId(sheet.0);
        let element = self.dom.element(node).ok_or(PageError::MissingNode(node))?;
        match element.tag_name() {
            tag @ ("style" | "link") => Ok((node, tag)),
            _ => Err(PageError::Unsupported("not a stylesheet owner".into())),
        }
    }

    fn resolve_imports(&self, rules: Vec<CssRule>, depth: usize) -> Vec<CssRule> {
        rules
            .into_iter()
            .map(|rule| match rule {
                CssRule::Import { href, .. } => {
                    let rules = self.load_import(&href, depth);
                    CssRule::Import { href, rules }
                }
                CssRule::Media { condition, rules } => CssRule::Media {
                    condition,
                    rules: self.resolve_imports(rules, depth),
                },
                other => other,
            })
            .collect()
    }

    fn load_import(&self, href: &str, depth: usize) -> Result<Vec<CssRule>, PageError> {
        let absolute = self.absolute(href);
        if !self.location.is_same_origin(&absolute) {
            return Err(PageError::CrossOrigin(absolute));
        }
        if depth >= MAX_IMPORT_DEPTH {
            return Err(PageError::Unsupported(format!("import depth exceeded at {absolute}")));
        }
        let text = self.resources.get(&absolute).map(String::as_str).unwrap_or_default();
        Ok(self.resolve_imports(parse_stylesheet(text), depth + 1))
    }
}

impl Page for MemoryPage {
    fn location(&self) -> &PageLocation {
        &self.location
    }

    fn title(&self) -> String {
        self.dom
            .find_tag(Dom::ROOT, "title")
            .map(|title| self.dom.text_content(title).trim().to_string())
            .unwrap_or_default()
    }

    fn body_text(&self) -> Option<String> {
        self.dom
            .find_tag(Dom::ROOT, "body")
            .map(|body| self.dom.text_content(body))
    }

    fn is_ready(&self) -> bool {
        self.ready
    }

    fn now(&self) -> Duration {
        self.clock
    }

    fn claim_namespace(&mut self, name: &str) -> bool {
        self.namespaces.insert(name.to_string())
    }

    fn query_all(&self, scope: QueryScope, selector: &str) -> Result<Vec<NodeId>, PageError> {
        let list = SelectorList::parse(selector)?;
        let root = match scope {
            QueryScope::Document => Dom::ROOT,
            QueryScope::Subtree(node) => {
                self.dom.node(node).ok_or(PageError::MissingNode(node))?;
                node
            }
        };
        Ok(self
            .dom
            .descendants(root)
            .into_iter()
            .filter(|node| list.matches(&self.dom, *node))
            .collect())
    }

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, PageError> {
        let list = SelectorList::parse(selector)?;
        self.dom.node(node).ok_or(PageError::MissingNode(node))?;
        Ok(list.matches(&self.dom, node))
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.dom.parent(node)
    }

    fn element(&self, node: NodeId) -> Option<&dyn ElementAccess> {
        self.dom.element(node).map(|element| element as &dyn ElementAccess)
    }

    fn element_mut(&mut self, node: NodeId) -> Option<&mut dyn ElementAccess> {
        self.dom
            .element_mut(node)
            .map(|element| element as &mut dyn ElementAccess)
    }

    fn bounding_rect(&self, node: NodeId) -> Option<Rect> {
        self.layout.get(&node).map(|rect| Rect {
            top: rect.top - self.scroll_y,
            bottom: rect.bottom - self.scroll_y,
        })
    }

    fn viewport_height(&self) -> f64 {
        self.viewport_height
    }

    fn frame_document(&self, frame: NodeId) -> Result<NodeId, PageError> {
        match self.frames.get(&frame) {
            Some(Frame::Document(document)) => Ok(*document),
            Some(Frame::CrossOrigin(src)) => Err(PageError::CrossOrigin(src.clone())),
            None => Err(PageError::Unsupported(format!("{frame:?} has no content document"))),
        }
    }

    fn style_sheets(&self) -> Vec<SheetId> {
        self.dom
            .descendants(Dom::ROOT)
            .into_iter()
            .filter(|node| {
                self.dom.element(*node).is_some_and(|el| match el.tag_name() {
                    "style" => true,
                    "link" => el.attribute("rel").is_some_and(|rel| {
                        rel.split_ascii_whitespace()
                            .any(|token| token.eq_ignore_ascii_case("stylesheet"))
                    }),
                    _ => false,
                })
            })
            .map(|node| SheetId(node.0))
            .collect()
    }

    fn sheet_href(&self, sheet: SheetId) -> Option<String> {
        let (node, tag) = self.sheet_element(sheet).ok()?;
        if tag != "link" {
            return None;
        }
        let href = self.dom.element(node)?.attribute("href")?;
        Some(self.absolute(href))
    }

    fn sheet_rules(&self, sheet: SheetId) -> Result<Vec<CssRule>, PageError> {
        let (node, tag) = self.sheet_element(sheet)?;
        if self.denied_sheets.contains(&sheet) {
            return Err(PageError::CrossOrigin(format!("sheet {}", sheet.0)));
        }
        let mut rules = if tag == "style" {
            parse_stylesheet(&self.dom.text_content(node))
        } else {
            let href = self.sheet_href(sheet).unwrap_or_default();
            if !self.location.is_same_origin(&href) {
                return Err(PageError::CrossOrigin(href));
            }
            parse_stylesheet(self.resources.get(&href).map(String::as_str).unwrap_or_default())
        };
        for text in self.inserted_rules(sheet) {
            rules.extend(parse_stylesheet(text));
        }
        Ok(self.resolve_imports(rules, 0))
    }

    fn create_style_sheet(&mut self, id: &str) -> Result<SheetId, PageError> {
        let parent = self
            .dom
            .find_tag(Dom::ROOT, "head")
            .or_else(|| self.dom.find_tag(Dom::ROOT, "html"))
            .ok_or_else(|| PageError::Unsupported("document has no head".into()))?;
        let style = self.dom.create_element("style");
        if let Some(element) = self.dom.element_mut(style) {
            element.set_attribute("id", id)?;
            element.take_changes();
        }
        self.dom.insert(parent, style, None)?;
        self.child_records.push(MutationRecord::ChildList {
            target: parent,
            added: vec![style],
        });
        Ok(SheetId(style.0))
    }

    fn insert_rule(&mut self, sheet: SheetId, rule: &str) -> Result<usize, PageError> {
        let existing = self.sheet_rules(sheet)?.len();
        if parse_stylesheet(rule).is_empty() {
            return Err(PageError::Unsupported(format!("unparsable rule: {rule}")));
        }
        self.added_rules.entry(sheet).or_default().push(rule.to_string());
        proxy_trace!("inserted rule {existing} into sheet {}", sheet.0);
        Ok(existing)
    }

    fn host_global_mut(&mut self, name: &str) -> Option<&mut Value> {
        self.globals.get_mut(name)
    }

    fn set_timeout(&mut self, delay: Duration) -> TimerId {
        self.schedule(delay, None)
    }

    fn set_interval(&mut self, period: Duration) -> TimerId {
        let period = period.max(Duration::from_millis(1));
        self.schedule(period, Some(period))
    }

    fn clear_timer(&mut self, timer: TimerId) {
        self.timers.remove(&timer);
    }

    fn observe_mutations(&mut self, options: ObserveOptions) -> Result<ObserverId, PageError> {
        let observer = ObserverId(self.next_observer);
        self.next_observer += 1;
        self.observers.insert(observer, options);
        Ok(observer)
    }

    fn disconnect_observer(&mut self, observer: ObserverId) {
        self.observers.remove(&observer);
    }

    fn add_listener(&mut self, kind: ListenerKind) {
        self.listeners.insert(kind);
    }

    fn install_element_hooks(
        &mut self,
        point: InterceptionPoint,
        hooks: Rc<dyn ElementHooks>,
    ) -> Result<(), PageError> {
        if self.sealed.contains(&point) {
            return Err(PageError::NotConfigurable(point));
        }
        self.element_hooks.insert(point, hooks);
        Ok(())
    }

    fn install_network_hooks(
        &mut self,
        point: NetworkPoint,
        hooks: Rc<dyn NetworkHooks>,
    ) -> Result<(), PageError> {
        if self.sealed_network.contains(&point) {
            return Err(PageError::NetworkNotConfigurable(point));
        }
        self.network_hooks.insert(point, hooks);
        Ok(())
    }
}

impl MemoryPage {
    fn schedule(&mut self, delay: Duration, period: Option<Duration>) -> TimerId {
        let timer = TimerId(self.next_timer);
        self.next_timer += 1;
        self.timers.insert(
            timer,
            ScheduledTimer {
                due: self.clock + delay,
                period,
            },
        );
        timer
    }
}
