//! Shorts hiding on feed and search pages

use super::{descendants, find_descendant, hide_once, DomElement};
use crate::url::PageKind;

const SECTION_TAG: &str = "ytd-rich-section-renderer";
const SHELF_TAG: &str = "ytd-rich-shelf-renderer";
const SEARCH_SHELF_TAG: &str = "grid-shelf-view-model";
const SEARCH_VIDEO_TAG: &str = "ytd-video-renderer";

const LOCKUP_TAGS: [&str; 2] = ["ytm-shorts-lockup-view-model", "ytm-shorts-lockup-view-model-v2"];
const LOCKUP_CLASS: &str = "shortsLockupViewModelHost";

fn is_shorts_link<E: DomElement>(el: &E) -> bool {
    el.is_tag("a") && el.attribute("href").is_some_and(|href| href.contains("/shorts/"))
}

/// Feed section holding a Shorts shelf (`ytd-rich-shelf-renderer[is-shorts]`).
pub fn is_shorts_section<E: DomElement>(section: &E) -> bool {
    find_descendant(section, |el| el.is_tag(SHELF_TAG) && el.has_attribute("is-shorts")).is_some()
}

/// Search-page shelf made of Shorts lockups or links to `/shorts/`.
pub fn is_shorts_shelf<E: DomElement>(shelf: &E) -> bool {
    find_descendant(shelf, |el| {
        LOCKUP_TAGS.iter().any(|tag| el.is_tag(tag)) || el.has_class(LOCKUP_CLASS) || is_shorts_link(el)
    })
    .is_some()
}

/// Individual search result that is a Short.
pub fn is_short_video<E: DomElement>(renderer: &E) -> bool {
    find_descendant(renderer, |el| {
        if is_shorts_link(el) {
            return true;
        }
        if el.is_tag("ytd-thumbnail-overlay-time-status-renderer")
            && el.attribute("overlay-style").as_deref() == Some("SHORTS")
        {
            return true;
        }
        el.has_class("yt-badge-shape__text") && el.text_content().contains("SHORTS")
    })
    .is_some()
}

fn hide_matching<E, F, P>(root: &E, select: F, pred: P) -> usize
where
    E: DomElement,
    F: Fn(&E) -> bool,
    P: Fn(&E) -> bool,
{
    descendants(root)
        .into_iter()
        .filter(|el| select(el) && pred(el))
        .filter(|el| hide_once(el))
        .count()
}

/// Hide Shorts under `root` for the given page. Returns the number newly hidden.
pub fn hide_shorts<E: DomElement>(root: &E, kind: PageKind) -> usize {
    let hidden = match kind {
        PageKind::Home | PageKind::Subscriptions => {
            hide_matching(root, |el| el.is_tag(SECTION_TAG), is_shorts_section)
        }
        PageKind::Search => {
            hide_matching(root, |el| el.is_tag(SEARCH_SHELF_TAG), is_shorts_shelf)
                + hide_matching(root, |el| el.is_tag(SEARCH_VIDEO_TAG), is_short_video)
        }
        _ => 0,
    };
    if hidden > 0 {
        log::info!(target: "ycs::shorts", "Hidden {} Shorts elements on {} page", hidden, kind.name());
    }
    hidden
}
