use std::rc::Rc;

use imgproxy_logging::{abbreviate, proxy_debug, proxy_trace};

use crate::guard::isolate;
use crate::page::{ElementAccess, ElementHooks, HtmlAssignment, NodeId, Property};
use crate::rewriter::{RewriteMode, Rewriter};

/// Hooks for property setters, node insertion and HTML assignment.
///
/// Failures never leave the hook: a setter always forwards some value, the
/// unmodified one when anything goes wrong.
pub struct ElementInterceptor {
    rewriter: Rc<Rewriter>,
}

impl ElementInterceptor {
    pub fn new(rewriter: Rc<Rewriter>) -> Self {
        Self { rewriter }
    }
}

impl ElementHooks for ElementInterceptor {
    fn on_property_write(
        &self,
        element: &mut dyn ElementAccess,
        property: Property,
        value: &str,
    ) -> String {
        let outcome = match property {
            Property::Src | Property::Poster => {
                self.rewriter.intercept_url_write(element, property, value)
            }
            Property::Srcset => self.rewriter.intercept_srcset_write(element, value),
        };
        match outcome {
            Ok(forwarded) => forwarded,
            Err(err) => {
                proxy_debug!(
                    "{} setter fell back to original value {}: {err}",
                    property.attribute_name(),
                    abbreviate(value)
                );
                value.to_string()
            }
        }
    }

    fn before_insert(&self, element: &mut dyn ElementAccess) {
        if element.tag_name() != "img" {
            return;
        }
        isolate("insertion", || {
            self.rewriter.rewrite_image(element, RewriteMode::Deduplicated)
        });
    }

    fn after_html_assignment(
        &self,
        target: NodeId,
        kind: HtmlAssignment,
        parent: Option<NodeId>,
    ) -> Option<NodeId> {
        let root = match kind {
            HtmlAssignment::Inner => Some(target),
            HtmlAssignment::Outer => parent,
        };
        proxy_trace!("html assignment ({kind:?}) schedules sweep of {root:?}");
        root
    }
}
