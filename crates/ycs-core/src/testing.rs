//! In-memory doubles of the collaborator traits, shared by the unit tests.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::Value;

use crate::bridge::{PageContext, PageError};
use crate::filters::DomElement;
use crate::message::PageMessage;
use crate::observe::{MediaEvents, ObserveOptions, PageHost, Subscription, Target, WatchKey};
use crate::player::{CaptionTrack, Player, PlayerError};
use crate::retry::Sleep;
use crate::settings::Quality;
use crate::store::{SettingsStorage, StorageError};
use crate::types::{Millis, PageScript};

// =============================================================================
// Storage
// =============================================================================

#[derive(Default)]
pub struct MemoryStorage {
    values: RefCell<HashMap<String, Value>>,
    writes: Cell<usize>,
    fail_reads: Cell<bool>,
    fail_writes: Cell<bool>,
}

impl MemoryStorage {
    /// Storage holding `value` under the default `settings` key.
    pub fn with_value(value: Value) -> Self {
        let storage = Self::default();
        storage.values.borrow_mut().insert("settings".to_string(), value);
        storage
    }

    pub fn writes(&self) -> usize {
        self.writes.get()
    }

    pub fn value(&self) -> Option<Value> {
        self.values.borrow().get("settings").cloned()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.set(fail);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.set(fail);
    }
}

impl SettingsStorage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        if self.fail_reads.get() {
            return Err(StorageError::Read("injected failure".to_string()));
        }
        Ok(self.values.borrow().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        if self.fail_writes.get() {
            return Err(StorageError::Write("injected failure".to_string()));
        }
        self.writes.set(self.writes.get() + 1);
        self.values.borrow_mut().insert(key.to_string(), value);
        Ok(())
    }
}

// =============================================================================
// Page context
// =============================================================================

#[derive(Default)]
pub struct FakePage {
    items: RefCell<HashMap<String, String>>,
    injected: RefCell<Vec<PageScript>>,
    posted: RefCell<Vec<PageMessage>>,
    fail_injections: Cell<bool>,
}

impl FakePage {
    pub fn injected(&self) -> Vec<PageScript> {
        self.injected.borrow().clone()
    }

    pub fn injection_count(&self, script: PageScript) -> usize {
        self.injected.borrow().iter().filter(|s| **s == script).count()
    }

    pub fn posted(&self) -> Vec<PageMessage> {
        self.posted.borrow().clone()
    }

    pub fn fail_injections(&self, fail: bool) {
        self.fail_injections.set(fail);
    }

    /// Parsed composite page-store blob.
    pub fn blob(&self) -> Value {
        self.items
            .borrow()
            .get("YCS_SETTINGS")
            .and_then(|raw| serde_json::from_str(raw).ok())
            .unwrap_or(Value::Null)
    }
}

impl PageContext for FakePage {
    fn get_item(&self, key: &str) -> Option<String> {
        self.items.borrow().get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), PageError> {
        self.items.borrow_mut().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn inject(&self, script: PageScript) -> Result<(), PageError> {
        if self.fail_injections.get() {
            return Err(PageError::Inject(script.path().to_string()));
        }
        self.injected.borrow_mut().push(script);
        Ok(())
    }

    fn post_message(&self, message: &PageMessage) -> Result<(), PageError> {
        self.posted.borrow_mut().push(message.clone());
        Ok(())
    }
}

// =============================================================================
// DOM
// =============================================================================

struct NodeData {
    tag: String,
    attributes: RefCell<HashMap<String, String>>,
    classes: RefCell<Vec<String>>,
    text: RefCell<String>,
    children: RefCell<Vec<TestNode>>,
    parent: RefCell<Weak<NodeData>>,
    hidden: Cell<bool>,
}

/// Element tree built in tests with a small builder API.
#[derive(Clone)]
pub struct TestNode(Rc<NodeData>);

impl TestNode {
    pub fn new(tag: &str) -> Self {
        Self(Rc::new(NodeData {
            tag: tag.to_ascii_lowercase(),
            attributes: RefCell::new(HashMap::new()),
            classes: RefCell::new(Vec::new()),
            text: RefCell::new(String::new()),
            children: RefCell::new(Vec::new()),
            parent: RefCell::new(Weak::new()),
            hidden: Cell::new(false),
        }))
    }

    pub fn child(self, child: TestNode) -> Self {
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child);
        self
    }

    pub fn class(self, class: &str) -> Self {
        self.0.classes.borrow_mut().push(class.to_string());
        self
    }

    pub fn attr(self, name: &str, value: &str) -> Self {
        self.0.attributes.borrow_mut().insert(name.to_string(), value.to_string());
        self
    }

    pub fn text(self, text: &str) -> Self {
        *self.0.text.borrow_mut() = text.to_string();
        self
    }

    /// Append a child to an already built tree.
    pub fn append(&self, child: TestNode) {
        *child.0.parent.borrow_mut() = Rc::downgrade(&self.0);
        self.0.children.borrow_mut().push(child);
    }
}

impl DomElement for TestNode {
    fn tag_name(&self) -> String {
        self.0.tag.clone()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.attributes.borrow().get(name).cloned()
    }

    fn has_class(&self, class: &str) -> bool {
        self.0.classes.borrow().iter().any(|c| c == class)
    }

    fn children(&self) -> Vec<Self> {
        self.0.children.borrow().clone()
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent.borrow().upgrade().map(TestNode)
    }

    fn text_content(&self) -> String {
        let mut text = self.0.text.borrow().clone();
        for child in self.0.children.borrow().iter() {
            text.push_str(&child.text_content());
        }
        text
    }

    fn is_hidden(&self) -> bool {
        self.0.hidden.get()
    }

    fn hide(&self) {
        self.0.hidden.set(true);
    }
}

// =============================================================================
// Page host
// =============================================================================

#[derive(Default)]
struct HostState {
    next_id: u64,
    targets: Vec<Target>,
    observers: HashMap<u64, (Target, WatchKey)>,
    media: HashMap<u64, MediaEvents>,
    root: Option<TestNode>,
}

/// Page host whose targets appear when a test says so.
#[derive(Default, Clone)]
pub struct FakeHost {
    state: Rc<RefCell<HostState>>,
}

impl FakeHost {
    pub fn add_target(&self, target: Target) {
        self.state.borrow_mut().targets.push(target);
    }

    pub fn set_root(&self, root: TestNode) {
        self.state.borrow_mut().root = Some(root);
    }

    /// Live observers created for `key`.
    pub fn observer_count(&self, key: WatchKey) -> usize {
        self.state.borrow().observers.values().filter(|(_, k)| *k == key).count()
    }

    pub fn observed_targets(&self, key: WatchKey) -> Vec<Target> {
        self.state
            .borrow()
            .observers
            .values()
            .filter(|(_, k)| *k == key)
            .map(|(t, _)| *t)
            .collect()
    }

    /// Event sets of the live media listeners.
    pub fn media_listeners(&self) -> Vec<MediaEvents> {
        self.state.borrow().media.values().copied().collect()
    }

    fn next_id(&self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.next_id += 1;
        state.next_id
    }
}

impl PageHost for FakeHost {
    type Element = TestNode;

    fn exists(&self, target: Target) -> bool {
        target == Target::Body || self.state.borrow().targets.contains(&target)
    }

    fn observe(&self, target: Target, _options: ObserveOptions, key: WatchKey) -> Vec<Subscription> {
        if !self.exists(target) {
            return Vec::new();
        }
        let id = self.next_id();
        self.state.borrow_mut().observers.insert(id, (target, key));
        let state = Rc::downgrade(&self.state);
        vec![Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.borrow_mut().observers.remove(&id);
            }
        })]
    }

    fn listen_media(&self, events: MediaEvents) -> Subscription {
        let id = self.next_id();
        self.state.borrow_mut().media.insert(id, events);
        let state = Rc::downgrade(&self.state);
        Subscription::new(move || {
            if let Some(state) = state.upgrade() {
                state.borrow_mut().media.remove(&id);
            }
        })
    }

    fn root(&self) -> Option<TestNode> {
        self.state.borrow().root.clone()
    }
}

// =============================================================================
// Player
// =============================================================================

pub struct FakePlayer {
    qualities: Option<Vec<String>>,
    quality: RefCell<Option<Quality>>,
    live: Cell<bool>,
    duration: Cell<Option<f64>>,
    api_rate: Cell<Option<f64>>,
    element_rate: Cell<Option<f64>>,
    captions: Vec<CaptionTrack>,
    caption: RefCell<Option<CaptionTrack>>,
    audio_tracks: Vec<String>,
    audio_track: RefCell<Option<String>>,
    volume: Cell<f64>,
    failures: Cell<u32>,
}

impl Default for FakePlayer {
    fn default() -> Self {
        Self {
            qualities: None,
            quality: RefCell::new(None),
            live: Cell::new(false),
            duration: Cell::new(Some(600.0)),
            api_rate: Cell::new(None),
            element_rate: Cell::new(None),
            captions: Vec::new(),
            caption: RefCell::new(None),
            audio_tracks: Vec::new(),
            audio_track: RefCell::new(None),
            volume: Cell::new(80.0),
            failures: Cell::new(0),
        }
    }
}

impl FakePlayer {
    pub fn with_qualities(mut self, levels: &[&str]) -> Self {
        self.qualities = Some(levels.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_captions(mut self, tracks: Vec<CaptionTrack>) -> Self {
        self.captions = tracks;
        self
    }

    pub fn with_audio_tracks(mut self, tracks: Vec<String>, current: Option<String>) -> Self {
        self.audio_tracks = tracks;
        *self.audio_track.borrow_mut() = current;
        self
    }

    /// Make the next `n` fallible calls throw.
    pub fn fail_calls(&self, n: u32) {
        self.failures.set(n);
    }

    pub fn quality_range(&self) -> Option<Quality> {
        *self.quality.borrow()
    }

    pub fn api_rate(&self) -> Option<f64> {
        self.api_rate.get()
    }

    pub fn element_rate(&self) -> Option<f64> {
        self.element_rate.get()
    }

    pub fn caption(&self) -> Option<CaptionTrack> {
        self.caption.borrow().clone()
    }

    fn call(&self) -> Result<(), PlayerError> {
        let left = self.failures.get();
        if left > 0 {
            self.failures.set(left - 1);
            return Err(PlayerError::Call("player not ready".to_string()));
        }
        Ok(())
    }
}

impl Player for FakePlayer {
    fn available_quality_levels(&self) -> Option<Vec<String>> {
        self.qualities.clone()
    }

    fn playback_quality(&self) -> Option<String> {
        self.quality.borrow().map(|q| q.as_str().to_string())
    }

    fn set_playback_quality_range(&self, quality: Quality) -> bool {
        *self.quality.borrow_mut() = Some(quality);
        true
    }

    fn is_live(&self) -> bool {
        self.live.get()
    }

    fn duration(&self) -> Option<f64> {
        self.duration.get()
    }

    fn supports_playback_rate(&self) -> bool {
        true
    }

    fn set_playback_rate(&self, rate: f64) -> bool {
        self.api_rate.set(Some(rate));
        true
    }

    fn set_element_playback_rate(&self, rate: f64) -> bool {
        self.element_rate.set(Some(rate));
        true
    }

    fn caption_tracks(&self) -> Result<Vec<CaptionTrack>, PlayerError> {
        self.call()?;
        Ok(self.captions.clone())
    }

    fn set_caption_track(&self, track: Option<&CaptionTrack>) -> Result<(), PlayerError> {
        self.call()?;
        *self.caption.borrow_mut() = track.cloned();
        Ok(())
    }

    fn audio_tracks(&self) -> Result<Vec<String>, PlayerError> {
        self.call()?;
        Ok(self.audio_tracks.clone())
    }

    fn current_audio_track(&self) -> Option<String> {
        self.audio_track.borrow().clone()
    }

    fn set_audio_track(&self, id: &str) -> Result<(), PlayerError> {
        self.call()?;
        *self.audio_track.borrow_mut() = Some(id.to_string());
        Ok(())
    }

    fn volume(&self) -> Option<f64> {
        Some(self.volume.get())
    }

    fn set_volume(&self, volume: f64) -> bool {
        self.volume.set(volume);
        true
    }
}

// =============================================================================
// Time
// =============================================================================

/// Sleeper that returns immediately and remembers what it was asked.
#[derive(Default)]
pub struct RecordingSleep {
    delays: RefCell<Vec<Millis>>,
}

impl RecordingSleep {
    pub fn delays(&self) -> Vec<Millis> {
        self.delays.borrow().clone()
    }
}

impl Sleep for RecordingSleep {
    async fn sleep(&self, ms: Millis) {
        self.delays.borrow_mut().push(ms);
    }
}
