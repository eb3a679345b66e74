//! Radix tree over path segments.
//!
//! Each node is one segment. Literal children match a request segment
//! exactly; parameter children match any single segment and record it.
//! Routes sit on terminal nodes, one per method. Lookup is O(k) in the number
//! of segments, independent of the number of registered routes, with
//! backtracking when a literal branch dead-ends.

use crate::route::{ParamVec, Route, Segment};
use http::Method;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct RadixNode {
    /// Literal segment this node matches (empty for the root and param nodes)
    segment: String,
    /// Parameter name when this node is a wildcard
    param_name: Option<Arc<str>>,
    /// Routes terminating here, in registration order
    routes: Vec<Arc<Route>>,
    children: Vec<RadixNode>,
    /// Different parameter names at the same position get separate children
    param_children: Vec<RadixNode>,
}

impl RadixNode {
    pub(crate) fn root() -> Self {
        Self::default()
    }

    fn literal(segment: &str) -> Self {
        Self {
            segment: segment.to_string(),
            ..Self::default()
        }
    }

    fn param(name: &Arc<str>) -> Self {
        Self {
            param_name: Some(Arc::clone(name)),
            ..Self::default()
        }
    }

    pub(crate) fn insert(&mut self, segments: &[Segment], route: Arc<Route>) {
        let Some((segment, remaining)) = segments.split_first() else {
            self.routes.push(route);
            return;
        };

        match segment {
            Segment::Param(name) => {
                let pos = self
                    .param_children
                    .iter()
                    .position(|c| c.param_name.as_deref() == Some(name.as_ref()));
                let child = match pos {
                    Some(i) => &mut self.param_children[i],
                    None => {
                        self.param_children.push(RadixNode::param(name));
                        let last = self.param_children.len() - 1;
                        &mut self.param_children[last]
                    }
                };
                child.insert(remaining, route);
            }
            Segment::Literal(lit) => {
                let pos = self.children.iter().position(|c| c.segment == *lit);
                let child = match pos {
                    Some(i) => &mut self.children[i],
                    None => {
                        self.children.push(RadixNode::literal(lit));
                        let last = self.children.len() - 1;
                        &mut self.children[last]
                    }
                };
                child.insert(remaining, route);
            }
        }
    }

    /// Find the route for `method`, filling `params` in template order.
    pub(crate) fn search(
        &self,
        segments: &[&str],
        method: &Method,
        params: &mut ParamVec,
    ) -> Option<Arc<Route>> {
        let Some((segment, remaining)) = segments.split_first() else {
            return self
                .routes
                .iter()
                .find(|r| r.method() == method)
                .map(Arc::clone);
        };

        for child in &self.children {
            if child.segment == *segment {
                if let Some(route) = child.search(remaining, method, params) {
                    return Some(route);
                }
            }
        }

        for child in &self.param_children {
            if let Some(name) = &child.param_name {
                params.push((Arc::clone(name), (*segment).to_string()));
                if let Some(route) = child.search(remaining, method, params) {
                    return Some(route);
                }
                // Backtrack
                params.pop();
            }
        }

        None
    }

    /// Methods of every route whose template matches `segments`.
    pub(crate) fn allowed(&self, segments: &[&str], out: &mut Vec<Method>) {
        let Some((segment, remaining)) = segments.split_first() else {
            for route in &self.routes {
                if !out.contains(route.method()) {
                    out.push(route.method().clone());
                }
            }
            return;
        };
        for child in &self.children {
            if child.segment == *segment {
                child.allowed(remaining, out);
            }
        }
        for child in &self.param_children {
            child.allowed(remaining, out);
        }
    }
}
