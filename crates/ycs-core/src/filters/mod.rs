//! Content filtering rules
//!
//! Predicates decide, hiders act. Predicates only read the element tree and
//! never mutate; hiders set `display:none` and report how many elements were
//! newly hidden, so running a hider twice over the same tree hides nothing the
//! second time.

pub mod members;
pub mod shorts;
pub mod sponsorship;

pub use members::{hide_members_only, is_members_only};
pub use shorts::{hide_shorts, is_short_video, is_shorts_section, is_shorts_shelf};
pub use sponsorship::{filter_sponsored, is_sponsorship_item, should_intercept};

/// The slice of the DOM element API the filters need.
pub trait DomElement: Sized + Clone {
    /// Lowercase tag name.
    fn tag_name(&self) -> String;
    fn attribute(&self, name: &str) -> Option<String>;
    fn has_class(&self, class: &str) -> bool;
    fn children(&self) -> Vec<Self>;
    fn parent(&self) -> Option<Self>;
    fn text_content(&self) -> String;
    /// Inline `display:none` is set.
    fn is_hidden(&self) -> bool;
    fn hide(&self);

    fn is_tag(&self, tag: &str) -> bool {
        self.tag_name().eq_ignore_ascii_case(tag)
    }

    fn has_attribute(&self, name: &str) -> bool {
        self.attribute(name).is_some()
    }
}

/// All descendants of `root` in document order, `root` excluded.
pub fn descendants<E: DomElement>(root: &E) -> Vec<E> {
    let mut out = Vec::new();
    let mut stack: Vec<E> = root.children().into_iter().rev().collect();
    while let Some(el) = stack.pop() {
        stack.extend(el.children().into_iter().rev());
        out.push(el);
    }
    out
}

/// First descendant matching `pred`.
pub fn find_descendant<E, P>(root: &E, pred: P) -> Option<E>
where
    E: DomElement,
    P: Fn(&E) -> bool,
{
    let mut stack: Vec<E> = root.children().into_iter().rev().collect();
    while let Some(el) = stack.pop() {
        if pred(&el) {
            return Some(el);
        }
        stack.extend(el.children().into_iter().rev());
    }
    None
}

/// Nearest inclusive ancestor matching `pred`.
pub fn closest<E, P>(el: &E, pred: P) -> Option<E>
where
    E: DomElement,
    P: Fn(&E) -> bool,
{
    let mut current = Some(el.clone());
    while let Some(node) = current {
        if pred(&node) {
            return Some(node);
        }
        current = node.parent();
    }
    None
}

/// Hide `el` unless already hidden. Returns whether it was newly hidden.
pub(crate) fn hide_once<E: DomElement>(el: &E) -> bool {
    if el.is_hidden() {
        false
    } else {
        el.hide();
        true
    }
}
