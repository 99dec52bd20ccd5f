//! Image proxy engine: interception, reconciliation and lifecycle on top of
//! an abstract page substrate.
mod css;
mod guard;
mod intercept;
mod lifecycle;
pub mod memory;
mod network;
mod observer;
pub mod page;
mod rewriter;
mod scan;
mod scheduler;

pub use css::{sweep_inline_backgrounds, CssEngine};
pub use guard::{isolate, RewriteError};
pub use intercept::ElementInterceptor;
pub use lifecycle::{DegradedHooks, ImageProxy, InstallError, LifecycleState};
pub use memory::MemoryPage;
pub use network::NetworkInterceptor;
pub use observer::MutationBatch;
pub use page::{
    CssRule, ElementAccess, ElementHooks, HtmlAssignment, InterceptionPoint, Keyframe,
    ListenerKind, MutationRecord, NetworkHooks, NetworkPoint, NodeId, ObserveOptions, ObserverId,
    Page, PageError, PageEvent, Property, QueryScope, Rect, RequestTarget, SheetId, TimerId,
};
pub use rewriter::{RewriteMode, RewriteStats, Rewriter};
pub use scan::{
    category_scan, general_scan, iframe_scan, lazy_scan, reconcile_host_data, viewport_scan,
};
pub use scheduler::{jittered, Debounce, Registry, Task};
