use std::collections::HashSet;

use imgproxy_core::vocab::{ACTIVE_CLASS_MARKERS, INLINE_BACKGROUND_SELECTOR};
use imgproxy_logging::proxy_trace;

use crate::guard::{isolate, RewriteError};
use crate::page::{MutationRecord, NodeId, Page, PageError, QueryScope};
use crate::rewriter::{RewriteMode, Rewriter};

#[derive(Debug, Default)]
struct Worklist {
    order: Vec<NodeId>,
    seen: HashSet<NodeId>,
}

impl Worklist {
    fn push(&mut self, node: NodeId) {
        if self.seen.insert(node) {
            self.order.push(node);
        }
    }

    fn extend(&mut self, nodes: impl IntoIterator<Item = NodeId>) {
        for node in nodes {
            self.push(node);
        }
    }
}

/// Candidates collected from one batch of mutation records. An element that
/// appears in several records of the batch is processed once.
#[derive(Debug, Default)]
pub struct MutationBatch {
    images: Worklist,
    posters: Worklist,
    backgrounds: Worklist,
}

impl MutationBatch {
    pub fn collect(page: &dyn Page, records: &[MutationRecord]) -> Result<Self, RewriteError> {
        let mut batch = Self::default();
        for record in records {
            match record {
                MutationRecord::ChildList { added, .. } => {
                    for &node in added {
                        batch.add_subtree(page, node)?;
                    }
                }
                MutationRecord::Attribute { target, name } => {
                    batch.add_attribute_change(page, *target, name)?;
                }
            }
        }
        Ok(batch)
    }

    pub fn len(&self) -> usize {
        self.images.order.len() + self.posters.order.len() + self.backgrounds.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn add_node(&mut self, page: &dyn Page, node: NodeId) {
        let Some(element) = page.element(node) else {
            return;
        };
        match element.tag_name() {
            "img" => self.images.push(node),
            "video" | "audio" if element.has_attribute("poster") => self.posters.push(node),
            _ => {}
        }
        if element.inline_style("background-image").is_some() {
            self.backgrounds.push(node);
        }
    }

    fn add_subtree(&mut self, page: &dyn Page, node: NodeId) -> Result<(), PageError> {
        if page.element(node).is_none() {
            return Ok(());
        }
        self.add_node(page, node);
        let scope = QueryScope::Subtree(node);
        self.images.extend(page.query_all(scope, "img")?);
        self.posters.extend(page.query_all(scope, "video[poster], audio[poster]")?);
        self.backgrounds.extend(page.query_all(scope, INLINE_BACKGROUND_SELECTOR)?);
        Ok(())
    }

    fn add_attribute_change(&mut self, page: &dyn Page, node: NodeId, name: &str) -> Result<(), PageError> {
        let Some(element) = page.element(node) else {
            return Ok(());
        };
        match name {
            "class" => {
                if ACTIVE_CLASS_MARKERS.iter().any(|class| element.has_class(class)) {
                    self.add_subtree(page, node)?;
                }
            }
            "style" => self.backgrounds.push(node),
            "poster" => self.posters.push(node),
            _ => self.images.push(node),
        }
        Ok(())
    }

    /// Processes each worklist once. Returns the number of changed elements.
    pub fn process(&self, page: &mut dyn Page, rewriter: &Rewriter) -> usize {
        let mut count = 0;
        for &node in &self.images.order {
            count += usize::from(isolate("mutated element", || {
                rewriter.rewrite_element(page, node, RewriteMode::Deduplicated)
            }));
        }
        for &node in &self.posters.order {
            if rewriter.should_skip(page, node) {
                continue;
            }
            count += usize::from(isolate("mutated poster", || {
                let element = page.element_mut(node).ok_or(PageError::NotAnElement(node))?;
                rewriter.rewrite_poster(element)
            }));
        }
        if rewriter.config().process_css_backgrounds {
            for &node in &self.backgrounds.order {
                if rewriter.should_skip(page, node) {
                    continue;
                }
                count += usize::from(isolate("mutated background", || {
                    let element = page.element_mut(node).ok_or(PageError::NotAnElement(node))?;
                    rewriter.rewrite_inline_background(element)
                }));
            }
        }
        if count > 0 {
            proxy_trace!("mutation batch rewrote {count} elements");
        }
        count
    }
}
