use std::rc::Rc;

use imgproxy_core::Resolution;
use imgproxy_logging::{abbreviate, proxy_debug};

use crate::page::{NetworkHooks, NetworkPoint, RequestTarget};
use crate::rewriter::Rewriter;

/// Redirects image-like GET requests through the proxy.
///
/// Only the target URL ever changes. Method, headers and body are left to the
/// native implementation.
pub struct NetworkInterceptor {
    rewriter: Rc<Rewriter>,
}

impl NetworkInterceptor {
    pub fn new(rewriter: Rc<Rewriter>) -> Self {
        Self { rewriter }
    }

    fn redirect(&self, request: &RequestTarget) -> Option<String> {
        if !request.is_get() {
            return None;
        }
        let location = self.rewriter.location();
        if !self.rewriter.image_like().is_image_like(&request.url, location) {
            return None;
        }
        match self.rewriter.resolve(&request.url) {
            Resolution::Proxied { proxied, .. } => Some(proxied),
            Resolution::Rejected(_) => None,
        }
    }
}

impl NetworkHooks for NetworkInterceptor {
    fn on_request(&self, point: NetworkPoint, request: &RequestTarget) -> String {
        match self.redirect(request) {
            Some(proxied) => {
                self.rewriter.record(|s| s.requests += 1);
                proxy_debug!("redirected {point:?} request: {}", abbreviate(&request.url));
                proxied
            }
            None => request.url.clone(),
        }
    }
}
