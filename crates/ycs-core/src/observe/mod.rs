//! DOM observation layer
//!
//! Tracks the page the user is on and emits `Trigger`s when player features or
//! content filters need to run again. The layer never touches a clock: every
//! entry point takes `now`, timers are deadlines, and the host calls `tick` at
//! `next_deadline()`.
//!
//! Page-scoped watchers live inside the `PageWatch` state. Moving to another
//! state drops the previous one's subscriptions, so teardown on navigation is
//! a plain assignment.

mod debounce;
mod subscription;
mod video;

pub use debounce::{earliest, Debounce, Timer};
pub use subscription::{MediaEvents, ObserveOptions, PageHost, Subscription, Target, WatchKey};
pub use video::VideoWatcher;

use serde::Deserialize;

use crate::settings::ExtensionSettings;
use crate::types::Millis;
use crate::url::PageKind;

// =============================================================================
// Configuration
// =============================================================================

/// Timing knobs for observation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ObserverConfig {
    /// Quiet period for grid and sidebar mutation bursts.
    pub debounce_ms: Millis,
    /// Extra filter pass after a grid debounce fires, for lazily rendered badges.
    pub late_pass_ms: Millis,
    /// How long a click in the player's settings menu suppresses re-apply.
    pub menu_window_ms: Millis,
    /// Quiet period between a new video source and the re-apply.
    pub apply_debounce_ms: Millis,
}

impl Default for ObserverConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 100,
            late_pass_ms: 650,
            menu_window_ms: 2_000,
            apply_debounce_ms: 100,
        }
    }
}

// =============================================================================
// Triggers and navigation
// =============================================================================

/// Work the orchestrator has to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Trigger {
    /// Sync and inject every player feature.
    ApplyPlayerFeatures,
    /// Run the enabled DOM content filters.
    FilterContent,
}

/// What reported the URL change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationSource {
    Initial,
    PushState,
    ReplaceState,
    PopState,
    /// YouTube's `yt-page-data-updated` event.
    PageDataUpdated,
    /// Settings changed; watchers are rebuilt for the current URL.
    SettingsChanged,
}

/// Which content filters are on, as far as observation cares.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterPlan {
    pub members_only: bool,
    pub shorts: bool,
}

impl FilterPlan {
    pub fn from_settings(settings: &ExtensionSettings) -> Self {
        Self {
            members_only: settings.hide_members_only_videos.enabled,
            shorts: settings.hide_shorts.enabled,
        }
    }

    pub fn any(self) -> bool {
        self.members_only || self.shorts
    }
}

// =============================================================================
// Page watch state
// =============================================================================

/// Observable phase of the page watcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchState {
    Idle,
    AwaitingGrid,
    WatchingGrid,
    AwaitingSuggestions,
    WatchingSuggestions,
}

enum PageWatch {
    Idle,
    AwaitingGrid {
        target: Target,
        _waiter: Vec<Subscription>,
    },
    WatchingGrid {
        _subs: Vec<Subscription>,
    },
    AwaitingSuggestions {
        _waiter: Vec<Subscription>,
    },
    WatchingSuggestions {
        _subs: Vec<Subscription>,
    },
}

impl PageWatch {
    fn state(&self) -> WatchState {
        match self {
            Self::Idle => WatchState::Idle,
            Self::AwaitingGrid { .. } => WatchState::AwaitingGrid,
            Self::WatchingGrid { .. } => WatchState::WatchingGrid,
            Self::AwaitingSuggestions { .. } => WatchState::AwaitingSuggestions,
            Self::WatchingSuggestions { .. } => WatchState::WatchingSuggestions,
        }
    }
}

const CONTENT_MUTATIONS: ObserveOptions = ObserveOptions::CHILD_LIST
    .union(ObserveOptions::ATTRIBUTES)
    .union(ObserveOptions::CHARACTER_DATA);

const TREE_MUTATIONS: ObserveOptions = ObserveOptions::CHILD_LIST.union(ObserveOptions::SUBTREE);

// =============================================================================
// Observation layer
// =============================================================================

pub struct ObservationLayer {
    config: ObserverConfig,
    video: VideoWatcher,
    page: PageWatch,
    kind: PageKind,
    content: Debounce,
    late_pass: Timer,
}

impl Default for ObservationLayer {
    fn default() -> Self {
        Self::new(ObserverConfig::default())
    }
}

impl ObservationLayer {
    pub fn new(config: ObserverConfig) -> Self {
        Self {
            video: VideoWatcher::new(&config),
            page: PageWatch::Idle,
            kind: PageKind::Other,
            content: Debounce::new(config.debounce_ms),
            late_pass: Timer::default(),
            config,
        }
    }

    pub fn config(&self) -> &ObserverConfig {
        &self.config
    }

    pub fn state(&self) -> WatchState {
        self.page.state()
    }

    /// Kind of the page last reported through `on_url_change`.
    pub fn page_kind(&self) -> PageKind {
        self.kind
    }

    pub fn video(&self) -> &VideoWatcher {
        &self.video
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn start_video<H: PageHost>(&mut self, host: &H) {
        self.video.start(host);
    }

    pub fn stop_video(&mut self) {
        self.video.stop();
    }

    /// Release every subscription and clear every deadline.
    pub fn stop(&mut self) {
        self.teardown_page();
        self.video.stop();
    }

    fn teardown_page(&mut self) {
        self.page = PageWatch::Idle;
        self.content.cancel();
        self.late_pass.cancel();
    }

    // -------------------------------------------------------------------------
    // Navigation
    // -------------------------------------------------------------------------

    /// Re-dispatch page-scoped watchers for `url`.
    ///
    /// Every report tears down the previous watchers first, even when the URL
    /// did not change, since YouTube may have rebuilt the page.
    pub fn on_url_change<H: PageHost>(
        &mut self,
        host: &H,
        url: &str,
        source: NavigationSource,
        filters: FilterPlan,
    ) -> Vec<Trigger> {
        self.teardown_page();
        self.kind = PageKind::classify(url);
        log::debug!(target: "ycs::core", "URL changed ({:?}): {} page", source, self.kind.name());

        if self.kind.is_grid() && filters.any() {
            self.enter_grid(host, Target::RichGridContents)
        } else if self.kind == PageKind::Search && filters.shorts {
            self.enter_grid(host, Target::SearchResults)
        } else if self.kind == PageKind::Watch && filters.members_only {
            self.enter_suggestions(host)
        } else {
            Vec::new()
        }
    }

    fn enter_grid<H: PageHost>(&mut self, host: &H, target: Target) -> Vec<Trigger> {
        if host.exists(target) {
            return self.attach_grid(host, target);
        }
        log::debug!(target: "ycs::core", "Waiting for {}", target.selector());
        self.page = PageWatch::AwaitingGrid {
            target,
            _waiter: host.observe(Target::Body, TREE_MUTATIONS, WatchKey::AwaitGrid),
        };
        Vec::new()
    }

    fn attach_grid<H: PageHost>(&mut self, host: &H, target: Target) -> Vec<Trigger> {
        let mut subs = host.observe(target, CONTENT_MUTATIONS, WatchKey::Grid);
        if target == Target::RichGridContents {
            // Filter chips rebuild the grid renderer's attributes without touching its children
            subs.extend(host.observe(Target::RichGridParent, ObserveOptions::ATTRIBUTES, WatchKey::Grid));
        }
        log::debug!(target: "ycs::core", "Observing {} ({} handles)", target.selector(), subs.len());
        self.page = PageWatch::WatchingGrid { _subs: subs };
        vec![Trigger::FilterContent]
    }

    fn enter_suggestions<H: PageHost>(&mut self, host: &H) -> Vec<Trigger> {
        if host.exists(Target::SuggestionsItems) {
            return self.attach_suggestions(host);
        }
        self.page = PageWatch::AwaitingSuggestions {
            _waiter: host.observe(Target::Body, TREE_MUTATIONS, WatchKey::AwaitSuggestions),
        };
        Vec::new()
    }

    fn attach_suggestions<H: PageHost>(&mut self, host: &H) -> Vec<Trigger> {
        let target = if host.exists(Target::SuggestionsItemSection) {
            Target::SuggestionsItemSection
        } else {
            Target::SuggestionsItems
        };
        let subs = host.observe(target, TREE_MUTATIONS, WatchKey::Suggestions);
        log::debug!(target: "ycs::core", "Observing suggestions at {}", target.selector());
        self.page = PageWatch::WatchingSuggestions { _subs: subs };
        vec![Trigger::FilterContent]
    }

    // -------------------------------------------------------------------------
    // Host callbacks
    // -------------------------------------------------------------------------

    /// A mutation observer created for `key` fired.
    ///
    /// Callbacks that do not match the current state were queued before a
    /// teardown and are ignored.
    pub fn on_mutation<H: PageHost>(&mut self, host: &H, key: WatchKey, now: Millis) -> Vec<Trigger> {
        match (&self.page, key) {
            (PageWatch::AwaitingGrid { target, .. }, WatchKey::AwaitGrid) => {
                let target = *target;
                if host.exists(target) {
                    self.attach_grid(host, target)
                } else {
                    Vec::new()
                }
            }
            (PageWatch::AwaitingSuggestions { .. }, WatchKey::AwaitSuggestions) => {
                if host.exists(Target::SuggestionsItems) {
                    self.attach_suggestions(host)
                } else {
                    Vec::new()
                }
            }
            (PageWatch::WatchingGrid { .. }, WatchKey::Grid)
            | (PageWatch::WatchingSuggestions { .. }, WatchKey::Suggestions) => {
                self.content.trigger(now);
                Vec::new()
            }
            _ => Vec::new(),
        }
    }

    pub fn on_media_event<H: PageHost>(&mut self, host: &H, event: MediaEvents, src: &str, now: Millis) {
        self.video.on_media_event(host, event, src, now);
    }

    pub fn on_settings_menu_click(&mut self, now: Millis) {
        self.video.on_settings_menu_click(now);
    }

    /// The tab's visibility changed.
    pub fn on_visibility_change(&mut self, visible: bool, filters: FilterPlan) -> Vec<Trigger> {
        if visible && filters.any() {
            vec![Trigger::FilterContent]
        } else {
            Vec::new()
        }
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    /// Collect the triggers whose deadlines have passed.
    pub fn tick(&mut self, now: Millis) -> Vec<Trigger> {
        let mut triggers = Vec::new();

        if self.video.poll(now) {
            triggers.push(Trigger::ApplyPlayerFeatures);
        }

        let mut filter = false;
        if self.content.fire(now) {
            filter = true;
            if self.page.state() == WatchState::WatchingGrid {
                self.late_pass.schedule(now.saturating_add(self.config.late_pass_ms));
            }
        }
        if self.late_pass.fire(now) {
            filter = true;
        }
        if filter {
            triggers.push(Trigger::FilterContent);
        }

        triggers
    }

    /// When the host should call `tick` next.
    pub fn next_deadline(&self) -> Option<Millis> {
        earliest([
            self.video.deadline(),
            self.content.deadline(),
            self.late_pass.deadline(),
        ])
    }
}
