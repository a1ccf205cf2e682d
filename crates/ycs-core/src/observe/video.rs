//! Video element watcher
//!
//! Detects a new video source behind YouTube's persistent `<video>` element and
//! schedules one re-apply of the player features for it.

use super::debounce::Debounce;
use super::subscription::{MediaEvents, PageHost, Subscription};
use super::ObserverConfig;
use crate::types::Millis;

pub struct VideoWatcher {
    events: MediaEvents,
    listener: Option<Subscription>,
    last_src: Option<String>,
    warmed_up: bool,
    menu_window: Millis,
    suppress_until: Option<Millis>,
    apply: Debounce,
}

impl VideoWatcher {
    pub fn new(config: &ObserverConfig) -> Self {
        Self {
            events: MediaEvents::WARMUP,
            listener: None,
            last_src: None,
            warmed_up: false,
            menu_window: config.menu_window_ms,
            suppress_until: None,
            apply: Debounce::new(config.apply_debounce_ms),
        }
    }

    pub fn start<H: PageHost>(&mut self, host: &H) {
        if self.listener.is_some() {
            return;
        }
        log::debug!(target: "ycs::core", "Setting up video player listener ({:?})", self.events.event_types());
        self.listener = Some(host.listen_media(self.events));
    }

    pub fn stop(&mut self) {
        self.listener = None;
        self.apply.cancel();
        self.suppress_until = None;
    }

    pub fn is_running(&self) -> bool {
        self.listener.is_some()
    }

    /// Events currently listened to.
    pub fn events(&self) -> MediaEvents {
        self.events
    }

    /// A click landed inside the player's own settings menu.
    pub fn on_settings_menu_click(&mut self, now: Millis) {
        self.suppress_until = Some(now.saturating_add(self.menu_window));
    }

    /// Handle a captured media event. Returns whether a re-apply was scheduled.
    pub fn on_media_event<H: PageHost>(
        &mut self,
        host: &H,
        event: MediaEvents,
        src: &str,
        now: Millis,
    ) -> bool {
        if !self.is_running() || !self.events.intersects(event) {
            return false;
        }
        if self.last_src.as_deref() == Some(src) {
            return false;
        }
        self.last_src = Some(src.to_string());

        if self.suppress_until.is_some_and(|until| now < until) {
            log::info!(target: "ycs::core", "User initiated quality change detected - skipping default settings");
            return false;
        }

        log::info!(target: "ycs::core", "Video source changed ({:?})", event.event_types());

        if !self.warmed_up {
            self.warmed_up = true;
            self.events = MediaEvents::LOADSTART;
            self.listener = None;
            self.listener = Some(host.listen_media(self.events));
            log::debug!(target: "ycs::core", "Optimized video events for SPA navigation");
        }

        self.apply.trigger(now);
        true
    }

    /// Whether the debounced re-apply is due.
    pub fn poll(&mut self, now: Millis) -> bool {
        self.apply.fire(now)
    }

    pub fn deadline(&self) -> Option<Millis> {
        self.apply.deadline()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeHost;

    fn watcher() -> VideoWatcher {
        VideoWatcher::new(&ObserverConfig::default())
    }

    #[test]
    fn test_narrows_after_first_source() {
        let host = FakeHost::default();
        let mut w = watcher();
        w.start(&host);
        assert_eq!(host.media_listeners(), vec![MediaEvents::WARMUP]);

        assert!(w.on_media_event(&host, MediaEvents::TIMEUPDATE, "blob:1", 0));
        assert_eq!(w.events(), MediaEvents::LOADSTART);
        assert_eq!(host.media_listeners(), vec![MediaEvents::LOADSTART]);

        // Events outside the narrowed set are stale deliveries
        assert!(!w.on_media_event(&host, MediaEvents::PLAYING, "blob:2", 10));
        assert!(w.on_media_event(&host, MediaEvents::LOADSTART, "blob:2", 20));
    }

    #[test]
    fn test_same_source_ignored() {
        let host = FakeHost::default();
        let mut w = watcher();
        w.start(&host);
        assert!(w.on_media_event(&host, MediaEvents::LOADSTART, "blob:1", 0));
        assert!(!w.on_media_event(&host, MediaEvents::LOADSTART, "blob:1", 5));
    }

    #[test]
    fn test_menu_click_suppresses_for_window() {
        let host = FakeHost::default();
        let mut w = watcher();
        w.start(&host);
        w.on_settings_menu_click(1_000);
        assert!(!w.on_media_event(&host, MediaEvents::LOADSTART, "blob:1", 2_500));
        assert!(w.on_media_event(&host, MediaEvents::LOADSTART, "blob:2", 3_000));
    }

    #[test]
    fn test_burst_applies_once() {
        let host = FakeHost::default();
        let mut w = watcher();
        w.start(&host);
        w.on_media_event(&host, MediaEvents::LOADSTART, "blob:1", 0);
        w.on_media_event(&host, MediaEvents::LOADSTART, "blob:2", 40);
        assert!(!w.poll(100));
        assert!(w.poll(140));
        assert!(!w.poll(400));
    }

    #[test]
    fn test_stop_releases_listener() {
        let host = FakeHost::default();
        let mut w = watcher();
        w.start(&host);
        w.on_media_event(&host, MediaEvents::LOADSTART, "blob:1", 0);
        w.stop();
        assert!(host.media_listeners().is_empty());
        assert!(!w.poll(1_000));
        assert!(!w.on_media_event(&host, MediaEvents::LOADSTART, "blob:9", 1_000));
    }
}
