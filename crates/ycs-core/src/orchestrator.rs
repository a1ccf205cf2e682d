//! Settings orchestrator
//!
//! The content-script context object. Owns the settings snapshot, the
//! observation layer and one preference bridge, and routes both entry points
//! (explicit settings messages and page-driven triggers) into the same
//! idempotent re-apply path.
//!
//! Every method takes `&self`. State lives in `RefCell`/`Cell` fields and no
//! borrow is held across an `.await`, so host callbacks may re-enter between
//! suspension points.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value;

use crate::bridge::{ApplyOutcome, PageContext, PreferenceBridge};
use crate::filters::{hide_members_only, hide_shorts};
use crate::message::{FeatureUpdate, MessageError, PageMessage, RuntimeMessage};
use crate::observe::{
    FilterPlan, MediaEvents, NavigationSource, ObservationLayer, ObserverConfig, PageHost, Trigger, WatchKey,
    WatchState,
};
use crate::settings::ExtensionSettings;
use crate::store::{SettingsStorage, SettingsStore, StoreConfig};
use crate::types::{Feature, Millis};
use crate::url::PageKind;

/// Content-script configuration, accepted as JSON by the wasm constructor.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContentConfig {
    pub store: StoreConfig,
    pub observer: ObserverConfig,
}

/// Elements hidden by one filtering pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FilterReport {
    pub members_only: usize,
    pub shorts: usize,
}

impl FilterReport {
    pub fn total(&self) -> usize {
        self.members_only + self.shorts
    }
}

pub struct Orchestrator<S, C, H> {
    store: SettingsStore<S>,
    page: C,
    host: H,
    bridge: PreferenceBridge,
    layer: RefCell<ObservationLayer>,
    settings: RefCell<Rc<ExtensionSettings>>,
    location: RefCell<String>,
    running: Cell<bool>,
}

impl<S, C, H> Orchestrator<S, C, H>
where
    S: SettingsStorage,
    C: PageContext,
    H: PageHost,
{
    pub fn new(storage: S, page: C, host: H, config: ContentConfig) -> Self {
        Self {
            store: SettingsStore::with_config(storage, &config.store),
            page,
            host,
            bridge: PreferenceBridge::new(&config.store),
            layer: RefCell::new(ObservationLayer::new(config.observer)),
            settings: RefCell::new(Rc::new(ExtensionSettings::default())),
            location: RefCell::new(String::new()),
            running: Cell::new(false),
        }
    }

    /// Current snapshot. Holders keep the version they were given.
    pub fn settings(&self) -> Rc<ExtensionSettings> {
        self.settings.borrow().clone()
    }

    pub fn store(&self) -> &SettingsStore<S> {
        &self.store
    }

    pub fn page(&self) -> &C {
        &self.page
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn page_kind(&self) -> PageKind {
        PageKind::classify(&self.location.borrow())
    }

    pub fn watch_state(&self) -> WatchState {
        self.layer.borrow().state()
    }

    /// When the host should call `tick` next.
    pub fn next_deadline(&self) -> Option<Millis> {
        self.layer.borrow().next_deadline()
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    /// Load settings, seed the page store and start observing `url`.
    pub async fn start(&self, url: &str) {
        if self.running.get() {
            log::warn!(target: "ycs::core", "Content script already started");
            return;
        }
        *self.location.borrow_mut() = url.to_string();

        let settings = self.store.load().await;
        self.running.set(true);
        self.replace_snapshot(settings);
        log::info!(target: "ycs::core", "Content script started on {} page", self.page_kind().name());

        let snapshot = self.settings();
        for feature in Feature::ALL {
            self.bridge.write(&self.page, feature, &snapshot);
        }
        // The fetch interceptor has to be in place before the page's next API call
        if snapshot.hide_members_only_videos.enabled {
            self.log_outcome(
                Feature::HideMembersOnly,
                self.bridge.activate(&self.page, Feature::HideMembersOnly, self.page_kind()),
            );
        }

        self.refresh_video_watcher();
        self.dispatch(NavigationSource::Initial).await;
    }

    /// Release every observer and listener.
    pub fn stop(&self) {
        if !self.running.replace(false) {
            return;
        }
        self.layer.borrow_mut().stop();
        log::info!(target: "ycs::core", "Content script stopped");
    }

    // -------------------------------------------------------------------------
    // Runtime messages
    // -------------------------------------------------------------------------

    /// Validate and handle an untyped runtime message.
    pub async fn handle_message(&self, raw: &Value) -> Result<(), MessageError> {
        let message = RuntimeMessage::from_value(raw)?;
        self.handle(message).await;
        Ok(())
    }

    pub async fn handle(&self, message: RuntimeMessage) {
        match message {
            RuntimeMessage::UpdateSettings(settings) => self.update_settings(*settings).await,
            RuntimeMessage::Feature(update) => self.update_feature(update).await,
        }
    }

    async fn update_settings(&self, settings: ExtensionSettings) {
        log::info!(target: "ycs::core", "Settings updated");
        self.replace_snapshot(settings);
        self.refresh_video_watcher();

        let kind = self.page_kind();
        for feature in Feature::ALL {
            let outcome = self.bridge.apply(&self.store, &self.page, feature, kind).await;
            self.log_outcome(feature, outcome);
        }
        self.dispatch(NavigationSource::SettingsChanged).await;
    }

    async fn update_feature(&self, update: FeatureUpdate) {
        let feature = update.feature();
        log::debug!(target: feature.log_target(), "Received {} update", feature);

        let next = update.applied_to(&self.settings());
        self.replace_snapshot(next);

        if let FeatureUpdate::AudioNormalizer {
            toggle_state: Some(toggle_state),
            ..
        } = update
        {
            self.post(&PageMessage::AudioNormalizerUpdate { toggle_state });
        }

        let snapshot = self.settings();
        self.bridge.write(&self.page, feature, &snapshot);
        let outcome = self.bridge.activate(&self.page, feature, self.page_kind());
        self.log_outcome(feature, outcome);

        match feature {
            Feature::HideMembersOnly | Feature::HideShorts => {
                self.dispatch(NavigationSource::SettingsChanged).await;
            }
            _ => self.refresh_video_watcher(),
        }
    }

    // -------------------------------------------------------------------------
    // Host callbacks
    // -------------------------------------------------------------------------

    /// The host saw a navigation to `url`.
    pub async fn on_url_change(&self, url: &str, source: NavigationSource) {
        *self.location.borrow_mut() = url.to_string();
        if self.running.get() {
            self.dispatch(source).await;
        }
    }

    pub async fn on_mutation(&self, key: WatchKey, now: Millis) {
        if !self.running.get() {
            return;
        }
        let triggers = self.layer.borrow_mut().on_mutation(&self.host, key, now);
        self.run(triggers).await;
    }

    pub fn on_media_event(&self, event: MediaEvents, src: &str, now: Millis) {
        if self.running.get() {
            self.layer.borrow_mut().on_media_event(&self.host, event, src, now);
        }
    }

    pub fn on_settings_menu_click(&self, now: Millis) {
        self.layer.borrow_mut().on_settings_menu_click(now);
    }

    pub async fn on_visibility_change(&self, visible: bool) {
        if !self.running.get() {
            return;
        }
        let plan = FilterPlan::from_settings(&self.settings());
        let triggers = self.layer.borrow_mut().on_visibility_change(visible, plan);
        self.run(triggers).await;
    }

    /// Run whatever became due by `now`.
    pub async fn tick(&self, now: Millis) {
        if !self.running.get() {
            return;
        }
        let triggers = self.layer.borrow_mut().tick(now);
        self.run(triggers).await;
    }

    // -------------------------------------------------------------------------
    // Re-apply paths
    // -------------------------------------------------------------------------

    /// Sync and activate every enabled player feature for the current page.
    pub async fn apply_player_features(&self) {
        let kind = self.page_kind();
        log::debug!(target: "ycs::core", "Applying player features on {} page", kind.name());
        for feature in Feature::PLAYER {
            if !self.settings().is_enabled(feature) {
                continue;
            }
            let outcome = self.bridge.apply(&self.store, &self.page, feature, kind).await;
            self.log_outcome(feature, outcome);
        }
    }

    /// One pass of the enabled DOM filters over the document.
    pub fn filter_content(&self) -> FilterReport {
        let settings = self.settings();
        let mut report = FilterReport::default();
        if !settings.any_filter_enabled() {
            return report;
        }
        let Some(root) = self.host.root() else {
            log::debug!(target: "ycs::core", "No document root to filter");
            return report;
        };
        if settings.hide_members_only_videos.enabled {
            report.members_only = hide_members_only(&root);
        }
        if settings.hide_shorts.enabled {
            report.shorts = hide_shorts(&root, self.page_kind());
        }
        report
    }

    async fn run(&self, triggers: Vec<Trigger>) {
        for trigger in triggers {
            match trigger {
                Trigger::ApplyPlayerFeatures => self.apply_player_features().await,
                Trigger::FilterContent => {
                    self.filter_content();
                }
            }
        }
    }

    /// Rebuild page-scoped watchers for the current location.
    async fn dispatch(&self, source: NavigationSource) {
        let url = self.location.borrow().clone();
        let plan = FilterPlan::from_settings(&self.settings());
        let triggers = self.layer.borrow_mut().on_url_change(&self.host, &url, source, plan);
        self.run(triggers).await;
    }

    /// The video watcher only runs while some player feature is enabled.
    fn refresh_video_watcher(&self) {
        let wanted = self.settings().any_player_feature_enabled();
        let mut layer = self.layer.borrow_mut();
        match (wanted, layer.video().is_running()) {
            (true, false) => layer.start_video(&self.host),
            (false, true) => {
                log::debug!(target: "ycs::core", "No player feature enabled, stopping video listener");
                layer.stop_video();
            }
            _ => {}
        }
    }

    /// Swap in a new snapshot and broadcast it to the page context.
    fn replace_snapshot(&self, settings: ExtensionSettings) {
        let message = PageMessage::SettingsUpdate {
            settings: settings.clone(),
        };
        *self.settings.borrow_mut() = Rc::new(settings);
        self.post(&message);
    }

    fn post(&self, message: &PageMessage) {
        if let Err(e) = self.page.post_message(message) {
            log::error!(target: "ycs::core", "Failed to post page message: {}", e);
        }
    }

    fn log_outcome(&self, feature: Feature, outcome: ApplyOutcome) {
        match outcome {
            ApplyOutcome::Injected(script) => {
                log::debug!(target: feature.log_target(), "Injected {}", script.path())
            }
            ApplyOutcome::Skipped(reason) => {
                log::debug!(target: feature.log_target(), "Skipped {}: {:?}", feature, reason)
            }
            ApplyOutcome::Disabled | ApplyOutcome::AlreadyActive(_) | ApplyOutcome::Failed => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::SkipReason;
    use crate::filters::DomElement;
    use crate::observe::Target;
    use crate::player::{apply_speed, apply_volume, feature_setting, Player, SpeedPlan, VolumeOutcome};
    use crate::settings::{CompressorSettings, Quality, VideoSpeedSetting, VolumeSetting};
    use crate::testing::{FakeHost, FakePage, FakePlayer, MemoryStorage, TestNode};
    use crate::types::PageScript;
    use serde_json::json;

    type TestOrchestrator = Orchestrator<MemoryStorage, FakePage, FakeHost>;

    fn orchestrator(stored: Value) -> TestOrchestrator {
        Orchestrator::new(
            MemoryStorage::with_value(stored),
            FakePage::default(),
            FakeHost::default(),
            ContentConfig::default(),
        )
    }

    fn with_feature(key: &str, record: Value) -> Value {
        let mut value = ExtensionSettings::default_value();
        value[key] = record;
        value
    }

    /// A new source played at `now`, then the apply debounce elapsed.
    async fn play_video(o: &TestOrchestrator, src: &str, now: Millis) {
        o.on_media_event(MediaEvents::LOADSTART, src, now);
        o.tick(now + 100).await;
    }

    fn grid_item(members: bool) -> TestNode {
        let mut media = TestNode::new("ytd-rich-grid-media");
        if members {
            media = media.child(TestNode::new("div").class("badge-style-type-members-only"));
        }
        TestNode::new("ytd-rich-item-renderer").child(media)
    }

    #[tokio::test]
    async fn test_start_seeds_page_store_and_broadcasts() {
        let o = orchestrator(with_feature("volume", json!({"enabled": true, "value": 30})));
        o.start("https://www.youtube.com/watch?v=abc").await;

        assert!(o.is_running());
        assert_eq!(o.settings().volume.value, 30);
        match o.page().posted().first() {
            Some(PageMessage::SettingsUpdate { settings }) => assert!(settings.volume.enabled),
            other => panic!("unexpected {:?}", other),
        }
        let blob = o.page().blob();
        for feature in Feature::ALL {
            assert!(blob.get(feature.key()).is_some(), "{} missing", feature);
        }
        assert_eq!(o.host().media_listeners(), vec![MediaEvents::WARMUP]);
        // Player scripts wait for a video source
        assert!(o.page().injected().is_empty());
    }

    #[tokio::test]
    async fn test_no_video_listener_without_player_features() {
        let o = orchestrator(ExtensionSettings::default_value());
        o.start("https://www.youtube.com/watch?v=abc").await;
        assert!(o.host().media_listeners().is_empty());
    }

    #[tokio::test]
    async fn test_speed_not_injected_on_shorts() {
        let stored = with_feature("videoSpeed", json!({"enabled": true, "value": 2.5, "applyToShorts": false}));
        let o = orchestrator(stored);
        o.start("https://www.youtube.com/shorts/xyz").await;
        play_video(&o, "blob:a", 0).await;

        assert!(o.page().injected().is_empty());
        assert_eq!(
            o.bridge.activate(o.page(), Feature::VideoSpeed, PageKind::Shorts),
            ApplyOutcome::Skipped(SkipReason::ShortsExcluded)
        );
    }

    #[tokio::test]
    async fn test_speed_on_watch_uses_element_rate() {
        let stored = with_feature("videoSpeed", json!({"enabled": true, "value": 2.5, "applyToShorts": false}));
        let o = orchestrator(stored);
        o.start("https://www.youtube.com/watch?v=abc").await;
        play_video(&o, "blob:a", 0).await;

        assert_eq!(o.page().injected(), vec![PageScript::VideoSpeed]);

        // What the injected script does with the page store
        let blob = o.page().blob();
        let setting: VideoSpeedSetting = feature_setting(blob.as_object().unwrap(), Feature::VideoSpeed).unwrap();
        let player = FakePlayer::default();
        assert_eq!(apply_speed(&player, &setting), Some(SpeedPlan::ViaElement(2.5)));
        assert_eq!(player.element_rate(), Some(2.5));
        assert_eq!(player.api_rate(), None);
    }

    #[tokio::test]
    async fn test_reapply_does_not_stack_persistent_scripts() {
        let mut stored = with_feature("hideMembersOnlyVideos", json!({"enabled": true}));
        stored["videoQuality"] = json!({"enabled": true, "value": "hd1080"});
        let o = orchestrator(stored.clone());
        o.start("https://www.youtube.com/watch?v=abc").await;
        assert_eq!(o.page().injection_count(PageScript::MembersFetchInterceptor), 1);

        play_video(&o, "blob:a", 0).await;
        let blob_once = o.page().blob();
        o.apply_player_features().await;
        o.handle_message(&json!({"action": "updateSettings", "settings": stored}))
            .await
            .unwrap();

        assert_eq!(o.page().blob(), blob_once);
        assert_eq!(o.page().injection_count(PageScript::MembersFetchInterceptor), 1);
        assert_eq!(o.page().injection_count(PageScript::VideoQuality), 3);
    }

    #[tokio::test]
    async fn test_volume_reapplied_for_each_video() {
        let o = orchestrator(with_feature("volume", json!({"enabled": true, "value": 30})));
        o.start("https://www.youtube.com/watch?v=abc").await;
        let player = FakePlayer::default();
        let run_volume_script = || {
            let blob = o.page().blob();
            let setting: VolumeSetting = feature_setting(blob.as_object().unwrap(), Feature::Volume).unwrap();
            apply_volume(&player, &setting)
        };

        play_video(&o, "blob:a", 0).await;
        assert_eq!(o.page().injection_count(PageScript::Volume), 1);
        assert_eq!(run_volume_script(), VolumeOutcome::Set(30.0));

        // The next video starts at whatever the user left it on
        player.set_volume(70.0);
        play_video(&o, "blob:b", 1_000).await;
        assert_eq!(o.page().injection_count(PageScript::Volume), 2);
        assert_eq!(run_volume_script(), VolumeOutcome::Set(30.0));

        o.handle_message(&json!({"feature": "volume", "value": 45, "enabled": true}))
            .await
            .unwrap();
        assert_eq!(o.page().injection_count(PageScript::Volume), 3);
        assert_eq!(run_volume_script(), VolumeOutcome::Set(45.0));
    }

    #[tokio::test]
    async fn test_normalizer_custom_settings_reach_page() {
        let stored = with_feature(
            "audioNormalizer",
            json!({"enabled": true, "value": "medium", "manualActivation": false}),
        );
        let o = orchestrator(stored);
        o.start("https://www.youtube.com/watch?v=abc").await;

        let custom = json!({"threshold": -20.0, "boost": 2.0, "ratio": 8.0, "attack": 0.005, "release": 0.5});
        o.handle_message(&json!({
            "feature": "audioNormalizer",
            "value": "custom",
            "customSettings": custom.clone()
        }))
        .await
        .unwrap();

        let expected = CompressorSettings {
            threshold: -20.0,
            boost: 2.0,
            ratio: 8.0,
            attack: 0.005,
            release: 0.5,
        };
        assert_eq!(o.settings().audio_normalizer.custom_settings, Some(expected));
        assert_eq!(o.page().blob()["audioNormalizer"]["customSettings"], custom);
        match o.page().posted().last() {
            Some(PageMessage::SettingsUpdate { settings }) => {
                assert_eq!(settings.audio_normalizer.custom_settings, Some(expected))
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_same_source_applies_once() {
        let o = orchestrator(with_feature("videoQuality", json!({"enabled": true, "value": "hd720"})));
        o.start("https://www.youtube.com/watch?v=abc").await;

        play_video(&o, "blob:a", 0).await;
        play_video(&o, "blob:a", 500).await;
        assert_eq!(o.page().injection_count(PageScript::VideoQuality), 1);

        play_video(&o, "blob:b", 1_000).await;
        assert_eq!(o.page().injection_count(PageScript::VideoQuality), 2);
    }

    #[tokio::test]
    async fn test_settings_menu_click_suppresses_reapply() {
        let o = orchestrator(with_feature("videoQuality", json!({"enabled": true, "value": "hd720"})));
        o.start("https://www.youtube.com/watch?v=abc").await;
        play_video(&o, "blob:a", 0).await;

        o.on_settings_menu_click(1_000);
        play_video(&o, "blob:b", 1_500).await;
        assert_eq!(o.page().injection_count(PageScript::VideoQuality), 1);

        play_video(&o, "blob:c", 4_000).await;
        assert_eq!(o.page().injection_count(PageScript::VideoQuality), 2);
    }

    #[tokio::test]
    async fn test_members_hidden_on_grid_and_rerun_is_noop() {
        let o = orchestrator(with_feature("hideMembersOnlyVideos", json!({"enabled": true})));
        let grid = TestNode::new("div")
            .child(grid_item(true))
            .child(grid_item(false))
            .child(grid_item(false))
            .child(grid_item(true));
        o.host().set_root(grid.clone());
        o.host().add_target(Target::RichGridContents);

        o.start("https://www.youtube.com/").await;
        assert_eq!(o.watch_state(), WatchState::WatchingGrid);
        assert_eq!(o.page().injected(), vec![PageScript::MembersFetchInterceptor]);
        let hidden: Vec<bool> = grid.children().iter().map(|c| c.is_hidden()).collect();
        assert_eq!(hidden, vec![true, false, false, true]);
        assert_eq!(o.filter_content(), FilterReport::default());

        // Streamed-in items are caught by the debounced pass
        grid.append(grid_item(true));
        o.on_mutation(WatchKey::Grid, 1_000).await;
        assert_eq!(o.next_deadline(), Some(1_100));
        o.tick(1_100).await;
        assert!(grid.children()[4].is_hidden());
        assert_eq!(o.next_deadline(), Some(1_750));
    }

    #[tokio::test]
    async fn test_grid_attaches_once_container_appears() {
        let o = orchestrator(with_feature("hideShorts", json!({"enabled": true})));
        let root = TestNode::new("div").child(
            TestNode::new("ytd-rich-section-renderer")
                .child(TestNode::new("ytd-rich-shelf-renderer").attr("is-shorts", "")),
        );
        o.host().set_root(root.clone());

        o.start("https://www.youtube.com/feed/subscriptions").await;
        assert_eq!(o.watch_state(), WatchState::AwaitingGrid);
        assert!(!root.children()[0].is_hidden());

        o.host().add_target(Target::RichGridContents);
        o.on_mutation(WatchKey::AwaitGrid, 10).await;
        assert_eq!(o.watch_state(), WatchState::WatchingGrid);
        assert!(root.children()[0].is_hidden());
    }

    #[tokio::test]
    async fn test_url_change_tears_down_watchers() {
        let o = orchestrator(with_feature("hideMembersOnlyVideos", json!({"enabled": true})));
        o.host().add_target(Target::RichGridContents);
        o.host().add_target(Target::RichGridParent);
        o.start("https://www.youtube.com/").await;
        assert_eq!(o.host().observer_count(WatchKey::Grid), 2);

        o.on_mutation(WatchKey::Grid, 0).await;
        o.on_url_change("https://www.youtube.com/playlist?list=x", NavigationSource::PushState)
            .await;
        assert_eq!(o.watch_state(), WatchState::Idle);
        assert_eq!(o.host().observer_count(WatchKey::Grid), 0);
        assert_eq!(o.next_deadline(), None);
    }

    #[tokio::test]
    async fn test_feature_message_replaces_snapshot() {
        let o = orchestrator(ExtensionSettings::default_value());
        o.start("https://www.youtube.com/watch?v=abc").await;
        let before = o.settings();

        o.handle_message(&json!({"feature": "videoQuality", "quality": "hd1080", "enabled": true}))
            .await
            .unwrap();

        let after = o.settings();
        assert!(!before.video_quality.enabled);
        assert!(after.video_quality.enabled);
        assert_eq!(after.video_quality.value, Quality::Hd1080);
        assert_eq!(o.page().blob()["videoQuality"]["value"], json!("hd1080"));
        assert_eq!(o.page().injected(), vec![PageScript::VideoQuality]);
        // The video listener starts once a player feature is on
        assert_eq!(o.host().media_listeners(), vec![MediaEvents::WARMUP]);
    }

    #[tokio::test]
    async fn test_normalizer_toggle_posts_update() {
        let stored = with_feature(
            "audioNormalizer",
            json!({"enabled": true, "value": "medium", "manualActivation": true}),
        );
        let o = orchestrator(stored);
        o.start("https://www.youtube.com/watch?v=abc").await;

        o.handle_message(&json!({"feature": "audioNormalizer", "toggleState": true}))
            .await
            .unwrap();
        assert!(o
            .page()
            .posted()
            .contains(&PageMessage::AudioNormalizerUpdate { toggle_state: true }));
        assert_eq!(o.page().injected(), vec![PageScript::AudioNormalizer]);

        o.handle_message(&json!({"feature": "audioNormalizer", "toggleState": false}))
            .await
            .unwrap();
        assert_eq!(o.page().injection_count(PageScript::AudioNormalizer), 1);
    }

    #[tokio::test]
    async fn test_update_settings_redispatches_filters() {
        let o = orchestrator(ExtensionSettings::default_value());
        o.host().add_target(Target::RichGridContents);
        o.start("https://www.youtube.com/").await;
        assert_eq!(o.watch_state(), WatchState::Idle);

        let mut settings = ExtensionSettings::default_value();
        settings["hideShorts"] = json!({"enabled": true});
        o.store().storage().set("settings", settings.clone()).await.unwrap();
        o.handle_message(&json!({"action": "updateSettings", "settings": settings}))
            .await
            .unwrap();

        assert!(o.settings().hide_shorts.enabled);
        assert_eq!(o.watch_state(), WatchState::WatchingGrid);
        assert_eq!(o.page().blob()["hideShorts"]["enabled"], json!(true));
    }

    #[tokio::test]
    async fn test_visibility_runs_one_pass() {
        let o = orchestrator(with_feature("hideMembersOnlyVideos", json!({"enabled": true})));
        let grid = TestNode::new("div");
        o.host().set_root(grid.clone());
        o.start("https://www.youtube.com/feed/history").await;

        grid.append(grid_item(true));
        o.on_visibility_change(false).await;
        assert!(!grid.children()[0].is_hidden());
        o.on_visibility_change(true).await;
        assert!(grid.children()[0].is_hidden());
    }

    #[tokio::test]
    async fn test_invalid_message_rejected() {
        let o = orchestrator(ExtensionSettings::default_value());
        o.start("https://www.youtube.com/").await;
        let posted = o.page().posted().len();
        assert!(o.handle_message(&json!({"action": "reload"})).await.is_err());
        assert_eq!(o.page().posted().len(), posted);
    }

    #[tokio::test]
    async fn test_stop_releases_everything() {
        let mut stored = with_feature("hideMembersOnlyVideos", json!({"enabled": true}));
        stored["volume"] = json!({"enabled": true, "value": 10});
        let o = orchestrator(stored);
        o.host().add_target(Target::RichGridContents);
        o.start("https://www.youtube.com/").await;

        o.stop();
        assert!(!o.is_running());
        assert!(o.host().media_listeners().is_empty());
        assert_eq!(o.host().observer_count(WatchKey::Grid), 0);

        // Callbacks queued before teardown are ignored
        o.on_mutation(WatchKey::Grid, 5).await;
        assert_eq!(o.next_deadline(), None);
    }
}
