//! Members-only video hiding

use super::{closest, descendants, find_descendant, hide_once, DomElement};

const MEMBERS_BADGE_CLASS: &str = "badge-style-type-members-only";

/// Video item renderers across grid, search and sidebar layouts.
const ITEM_TAGS: [&str; 3] = ["ytd-rich-grid-media", "ytd-video-renderer", "ytd-compact-video-renderer"];

/// Grid cell wrapping an item; hiding it keeps the grid layout intact.
const GRID_CELL_TAG: &str = "ytd-rich-item-renderer";

fn is_video_item<E: DomElement>(el: &E) -> bool {
    ITEM_TAGS.iter().any(|tag| el.is_tag(tag))
}

/// The item carries a "Members only" badge somewhere below it.
pub fn is_members_only<E: DomElement>(item: &E) -> bool {
    find_descendant(item, |el| el.has_class(MEMBERS_BADGE_CLASS)).is_some()
}

/// Hide every members-only item under `root`. Returns the number newly hidden.
pub fn hide_members_only<E: DomElement>(root: &E) -> usize {
    let mut hidden = 0;
    for item in descendants(root).into_iter().filter(|el| is_video_item(el)) {
        if !is_members_only(&item) {
            continue;
        }
        let target = closest(&item, |el| el.is_tag(GRID_CELL_TAG)).unwrap_or(item);
        if hide_once(&target) {
            hidden += 1;
        }
    }
    if hidden > 0 {
        log::info!(target: "ycs::members", "Hidden {} members-only videos", hidden);
    }
    hidden
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::TestNode;

    fn grid_item(members: bool) -> TestNode {
        let mut media = TestNode::new("ytd-rich-grid-media");
        if members {
            media = media.child(TestNode::new("div").class("badge-style-type-members-only"));
        }
        TestNode::new("ytd-rich-item-renderer").child(media)
    }

    #[test]
    fn test_hides_exactly_marked_items() {
        let grid = TestNode::new("div")
            .child(grid_item(true))
            .child(grid_item(false))
            .child(grid_item(true))
            .child(grid_item(false))
            .child(grid_item(false));

        assert_eq!(hide_members_only(&grid), 2);
        let cells: Vec<_> = grid.children();
        let hidden: Vec<bool> = cells.iter().map(|c| c.is_hidden()).collect();
        assert_eq!(hidden, vec![true, false, true, false, false]);

        // Re-running on an unchanged grid hides nothing more
        assert_eq!(hide_members_only(&grid), 0);
    }

    #[test]
    fn test_hides_item_itself_outside_grid() {
        let list = TestNode::new("div").child(
            TestNode::new("ytd-compact-video-renderer")
                .child(TestNode::new("span").class("badge-style-type-members-only")),
        );
        assert_eq!(hide_members_only(&list), 1);
        assert!(list.children()[0].is_hidden());
    }

    #[test]
    fn test_predicate() {
        assert!(is_members_only(&grid_item(true)));
        assert!(!is_members_only(&grid_item(false)));
    }
}
