//! The adapter boundary between the engine and the page platform.
//!
//! Everything platform-specific lives behind [`Page`] and [`ElementAccess`].
//! The engine never patches the platform itself: it hands hook objects to the
//! substrate, which calls them at the named interception points, and it
//! receives every platform callback as a [`PageEvent`].

use std::rc::Rc;
use std::time::Duration;

use imgproxy_core::PageLocation;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SheetId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObserverId(pub u64);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PageError {
    #[error("cross-origin access denied: {0}")]
    CrossOrigin(String),
    #[error("interception point {0:?} is not configurable")]
    NotConfigurable(InterceptionPoint),
    #[error("network entry point {0:?} is not configurable")]
    NetworkNotConfigurable(NetworkPoint),
    #[error("invalid selector: {0}")]
    InvalidSelector(String),
    #[error("node {0:?} does not exist")]
    MissingNode(NodeId),
    #[error("node {0:?} is not an element")]
    NotAnElement(NodeId),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
}

impl PageError {
    /// Failures the platform raises routinely; callers skip them without logging.
    pub fn is_expected(&self) -> bool {
        matches!(self, PageError::CrossOrigin(_))
    }
}

/// Image-bearing element properties with intercepted setters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Property {
    Src,
    Srcset,
    Poster,
}

impl Property {
    pub fn attribute_name(self) -> &'static str {
        match self {
            Property::Src => "src",
            Property::Srcset => "srcset",
            Property::Poster => "poster",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HtmlAssignment {
    Inner,
    Outer,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterceptionPoint {
    Property(Property),
    /// `appendChild` / `insertBefore`.
    Insertion,
    /// `innerHTML` / `outerHTML` assignment.
    HtmlAssignment,
}

impl InterceptionPoint {
    pub const ALL: [InterceptionPoint; 5] = [
        InterceptionPoint::Property(Property::Src),
        InterceptionPoint::Property(Property::Srcset),
        InterceptionPoint::Property(Property::Poster),
        InterceptionPoint::Insertion,
        InterceptionPoint::HtmlAssignment,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NetworkPoint {
    XhrOpen,
    Fetch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestTarget {
    /// `None` when the caller did not state a method (fetch defaults to GET).
    pub method: Option<String>,
    pub url: String,
}

impl RequestTarget {
    pub fn is_get(&self) -> bool {
        self.method
            .as_deref()
            .map_or(true, |method| method.eq_ignore_ascii_case("GET"))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerKind {
    DomContentLoaded,
    Scroll,
    Resize,
    BeforeUnload,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryScope {
    Document,
    /// Descendants of the node, excluding the node itself.
    Subtree(NodeId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    pub key_text: String,
    pub background_image: Option<String>,
}

/// Snapshot of one stylesheet rule, as much of it as the engine needs.
#[derive(Debug, Clone, PartialEq)]
pub enum CssRule {
    Style {
        selector: String,
        background_image: Option<String>,
    },
    Media {
        condition: String,
        rules: Vec<CssRule>,
    },
    Import {
        href: String,
        /// `Err` when the imported sheet is not readable.
        rules: Result<Vec<CssRule>, PageError>,
    },
    Keyframes {
        name: String,
        frames: Vec<Keyframe>,
    },
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObserveOptions {
    pub child_list: bool,
    pub subtree: bool,
    pub attribute_filter: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationRecord {
    ChildList { target: NodeId, added: Vec<NodeId> },
    Attribute { target: NodeId, name: String },
}

/// Platform callbacks delivered to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PageEvent {
    DomContentLoaded,
    Timer(TimerId),
    Mutations {
        observer: ObserverId,
        records: Vec<MutationRecord>,
    },
    Scroll,
    Resize,
    /// Next-turn sweep requested by an HTML-assignment hook.
    DeferredSweep(NodeId),
    BeforeUnload,
}

/// Reads and raw writes on one element. Writes here bypass every hook: they
/// are the platform's original setters.
pub trait ElementAccess {
    /// Lowercase tag name.
    fn tag_name(&self) -> &str;

    fn attribute(&self, name: &str) -> Option<&str>;

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }

    fn set_attribute(&mut self, name: &str, value: &str) -> Result<(), PageError>;

    fn has_class(&self, class: &str) -> bool;

    /// Value of one inline style declaration, e.g. `background-image`.
    fn inline_style(&self, property: &str) -> Option<String>;

    fn set_inline_style(&mut self, property: &str, value: &str) -> Result<(), PageError>;
}

/// Callbacks the substrate invokes at element interception points.
pub trait ElementHooks {
    /// Returns the value to forward to the original setter.
    fn on_property_write(&self, element: &mut dyn ElementAccess, property: Property, value: &str)
        -> String;

    /// Runs before an element is inserted into the tree.
    fn before_insert(&self, element: &mut dyn ElementAccess);

    /// Runs after the platform performed an HTML assignment. A returned node
    /// must be delivered back as [`PageEvent::DeferredSweep`] on the next turn.
    fn after_html_assignment(
        &self,
        target: NodeId,
        kind: HtmlAssignment,
        parent: Option<NodeId>,
    ) -> Option<NodeId>;
}

/// Callbacks the substrate invokes at request-initiation entry points.
pub trait NetworkHooks {
    /// Returns the URL to forward to the native implementation.
    fn on_request(&self, point: NetworkPoint, request: &RequestTarget) -> String;
}

/// The page platform as the engine sees it.
pub trait Page {
    fn location(&self) -> &PageLocation;
    fn title(&self) -> String;
    fn body_text(&self) -> Option<String>;
    /// Whether the document body exists.
    fn is_ready(&self) -> bool;
    /// Monotonic time since the page started.
    fn now(&self) -> Duration;

    /// Claims a page-wide name. Returns `false` when it was already claimed.
    fn claim_namespace(&mut self, name: &str) -> bool;

    fn query_all(&self, scope: QueryScope, selector: &str) -> Result<Vec<NodeId>, PageError>;
    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, PageError>;
    fn parent(&self, node: NodeId) -> Option<NodeId>;
    fn element(&self, node: NodeId) -> Option<&dyn ElementAccess>;
    fn element_mut(&mut self, node: NodeId) -> Option<&mut dyn ElementAccess>;
    fn bounding_rect(&self, node: NodeId) -> Option<Rect>;
    fn viewport_height(&self) -> f64;
    /// Root of a frame's content document. Cross-origin frames fail with
    /// [`PageError::CrossOrigin`].
    fn frame_document(&self, frame: NodeId) -> Result<NodeId, PageError>;

    fn style_sheets(&self) -> Vec<SheetId>;
    fn sheet_href(&self, sheet: SheetId) -> Option<String>;
    fn sheet_rules(&self, sheet: SheetId) -> Result<Vec<CssRule>, PageError>;
    fn create_style_sheet(&mut self, id: &str) -> Result<SheetId, PageError>;
    fn insert_rule(&mut self, sheet: SheetId, rule: &str) -> Result<usize, PageError>;

    /// Mutable view of a host global; arbitrary shape.
    fn host_global_mut(&mut self, name: &str) -> Option<&mut serde_json::Value>;

    fn set_timeout(&mut self, delay: Duration) -> TimerId;
    fn set_interval(&mut self, period: Duration) -> TimerId;
    fn clear_timer(&mut self, timer: TimerId);

    fn observe_mutations(&mut self, options: ObserveOptions) -> Result<ObserverId, PageError>;
    fn disconnect_observer(&mut self, observer: ObserverId);

    fn add_listener(&mut self, kind: ListenerKind);

    fn install_element_hooks(
        &mut self,
        point: InterceptionPoint,
        hooks: Rc<dyn ElementHooks>,
    ) -> Result<(), PageError>;
    fn install_network_hooks(
        &mut self,
        point: NetworkPoint,
        hooks: Rc<dyn NetworkHooks>,
    ) -> Result<(), PageError>;
}
