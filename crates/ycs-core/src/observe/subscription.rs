//! Observation handles and the host interface that creates them
//!
//! A `Subscription` disconnects its observer or listener when dropped, so a
//! watcher releases everything it acquired simply by dropping its handles.

use std::fmt;

use crate::filters::DomElement;

/// Cancelable handle for a mutation observer or event listener.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A handle with nothing to release.
    pub fn noop() -> Self {
        Self { cancel: None }
    }

    /// Release now instead of at drop.
    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

bitflags::bitflags! {
    /// `MutationObserverInit` switches.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ObserveOptions: u8 {
        const CHILD_LIST = 1 << 0;
        const ATTRIBUTES = 1 << 1;
        const CHARACTER_DATA = 1 << 2;
        const SUBTREE = 1 << 3;
    }
}

bitflags::bitflags! {
    /// Media element lifecycle events, captured at document level.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct MediaEvents: u8 {
        const LOADSTART = 1 << 0;
        const LOADEDMETADATA = 1 << 1;
        const CANPLAY = 1 << 2;
        const PLAYING = 1 << 3;
        const PLAY = 1 << 4;
        const TIMEUPDATE = 1 << 5;
        const SEEKED = 1 << 6;

        /// Wide net used until the first player has been seen.
        const WARMUP = Self::LOADSTART.bits()
            | Self::LOADEDMETADATA.bits()
            | Self::CANPLAY.bits()
            | Self::PLAYING.bits()
            | Self::PLAY.bits()
            | Self::TIMEUPDATE.bits()
            | Self::SEEKED.bits();
    }
}

impl MediaEvents {
    /// Parse a DOM event type.
    pub fn from_event_type(s: &str) -> Self {
        match s {
            "loadstart" => Self::LOADSTART,
            "loadedmetadata" => Self::LOADEDMETADATA,
            "canplay" => Self::CANPLAY,
            "playing" => Self::PLAYING,
            "play" => Self::PLAY,
            "timeupdate" => Self::TIMEUPDATE,
            "seeked" => Self::SEEKED,
            _ => Self::empty(),
        }
    }

    /// DOM event type names contained in this set.
    pub fn event_types(self) -> Vec<&'static str> {
        let names = [
            (Self::LOADSTART, "loadstart"),
            (Self::LOADEDMETADATA, "loadedmetadata"),
            (Self::CANPLAY, "canplay"),
            (Self::PLAYING, "playing"),
            (Self::PLAY, "play"),
            (Self::TIMEUPDATE, "timeupdate"),
            (Self::SEEKED, "seeked"),
        ];
        names
            .into_iter()
            .filter(|(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
            .collect()
    }
}

/// DOM nodes the observation layer waits for or observes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Target {
    Body,
    /// Item container of a rich grid (home, subscriptions, channel tabs).
    RichGridContents,
    /// The grid renderer itself; rebuilt attributes signal filter chip clicks.
    RichGridParent,
    /// Result list on the search page.
    SearchResults,
    /// Up-next sidebar item list.
    SuggestionsItems,
    /// Extra section wrapper inside the sidebar list for signed-in users.
    SuggestionsItemSection,
}

impl Target {
    pub fn selector(self) -> &'static str {
        match self {
            Self::Body => "body",
            Self::RichGridContents => "#contents.ytd-rich-grid-renderer",
            Self::RichGridParent => "#primary > ytd-rich-grid-renderer",
            Self::SearchResults => "ytd-search #contents.ytd-section-list-renderer",
            Self::SuggestionsItems => "#secondary-inner ytd-watch-next-secondary-results-renderer #items",
            Self::SuggestionsItemSection => {
                "#secondary-inner ytd-watch-next-secondary-results-renderer #items ytd-item-section-renderer"
            }
        }
    }
}

/// Identifies which watcher a mutation callback belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchKey {
    AwaitGrid,
    Grid,
    AwaitSuggestions,
    Suggestions,
}

/// The live document, as far as observation and filtering need it.
///
/// Callbacks produced by `observe` and `listen_media` are routed back into the
/// observation layer by the host (`on_mutation`, `on_media_event`).
pub trait PageHost {
    type Element: DomElement;

    fn exists(&self, target: Target) -> bool;

    /// Observe every element matching `target`. Empty when none exist.
    fn observe(&self, target: Target, options: ObserveOptions, key: WatchKey) -> Vec<Subscription>;

    /// Capture-phase document listeners for `events`.
    fn listen_media(&self, events: MediaEvents) -> Subscription;

    /// Root element for filtering passes.
    fn root(&self) -> Option<Self::Element>;
}
