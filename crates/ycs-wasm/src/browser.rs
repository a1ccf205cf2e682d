//! Browser implementations of the core collaborator traits

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Object, Promise, Reflect};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys::{Document, Element, Event, EventTarget, HtmlElement, MutationObserver, MutationObserverInit, Window};

use ycs_core::bridge::{PageContext, PageError};
use ycs_core::filters::DomElement;
use ycs_core::observe::{MediaEvents, ObserveOptions, PageHost, Subscription, Target, WatchKey};
use ycs_core::retry::Sleep;
use ycs_core::store::{SettingsStorage, StorageError};
use ycs_core::types::{Millis, ScriptMode};
use ycs_core::{PageMessage, PageScript};

pub fn window() -> Result<Window, JsValue> {
    web_sys::window().ok_or_else(|| JsValue::from_str("No window"))
}

pub fn now() -> Millis {
    js_sys::Date::now() as Millis
}

/// Readable text for a thrown JS value.
pub fn describe(err: &JsValue) -> String {
    if let Some(text) = err.as_string() {
        return text;
    }
    if let Some(error) = err.dyn_ref::<js_sys::Error>() {
        return String::from(error.message());
    }
    format!("{:?}", err)
}

fn chrome_object(path: &[&str]) -> Option<JsValue> {
    let mut current = Reflect::get(&js_sys::global(), &"chrome".into()).ok()?;
    for key in path {
        if current.is_undefined() || current.is_null() {
            return None;
        }
        current = Reflect::get(&current, &JsValue::from_str(key)).ok()?;
    }
    (!current.is_undefined() && !current.is_null()).then_some(current)
}

/// Absolute URL of a bundled extension file.
pub fn runtime_url(path: &str) -> Option<String> {
    let runtime = chrome_object(&["runtime"])?;
    let get_url: Function = Reflect::get(&runtime, &"getURL".into()).ok()?.dyn_into().ok()?;
    get_url.call1(&runtime, &JsValue::from_str(path)).ok()?.as_string()
}

pub fn to_js(value: &impl serde::Serialize) -> Result<JsValue, JsValue> {
    let text = serde_json::to_string(value).map_err(|e| JsValue::from_str(&e.to_string()))?;
    js_sys::JSON::parse(&text)
}

pub fn from_js(value: &JsValue) -> Result<Value, JsValue> {
    if value.is_undefined() {
        return Ok(Value::Null);
    }
    let text: String = js_sys::JSON::stringify(value)?.into();
    serde_json::from_str(&text).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Add an event listener that is removed when the returned handle drops.
pub fn listen<F>(target: &EventTarget, name: &'static str, capture: bool, handler: F) -> Result<Subscription, JsValue>
where
    F: FnMut(Event) + 'static,
{
    let callback = Closure::<dyn FnMut(Event)>::new(handler);
    target.add_event_listener_with_callback_and_bool(name, callback.as_ref().unchecked_ref(), capture)?;
    let target = target.clone();
    Ok(Subscription::new(move || {
        let _ = target.remove_event_listener_with_callback_and_bool(name, callback.as_ref().unchecked_ref(), capture);
    }))
}

// =============================================================================
// Extension storage
// =============================================================================

/// `chrome.storage.local`.
pub struct ExtensionStorage {
    area: Object,
}

impl ExtensionStorage {
    pub fn local() -> Result<Self, JsValue> {
        let area = chrome_object(&["storage", "local"])
            .ok_or_else(|| JsValue::from_str("chrome.storage.local is not available"))?;
        Ok(Self {
            area: area.unchecked_into(),
        })
    }

    async fn call(&self, method: &str, arg: &JsValue) -> Result<JsValue, String> {
        let function: Function = Reflect::get(&self.area, &JsValue::from_str(method))
            .map_err(|e| describe(&e))?
            .dyn_into()
            .map_err(|_| format!("storage.local.{} is not a function", method))?;
        let promise: Promise = function
            .call1(&self.area, arg)
            .map_err(|e| describe(&e))?
            .dyn_into()
            .map_err(|_| format!("storage.local.{} did not return a promise", method))?;
        JsFuture::from(promise).await.map_err(|e| describe(&e))
    }
}

impl SettingsStorage for ExtensionStorage {
    async fn get(&self, key: &str) -> Result<Option<Value>, StorageError> {
        let items = self.call("get", &JsValue::from_str(key)).await.map_err(StorageError::Read)?;
        let value = Reflect::get(&items, &JsValue::from_str(key)).map_err(|e| StorageError::Read(describe(&e)))?;
        if value.is_undefined() || value.is_null() {
            return Ok(None);
        }
        from_js(&value).map(Some).map_err(|e| StorageError::Read(describe(&e)))
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), StorageError> {
        let items = Object::new();
        let value = to_js(&value).map_err(|e| StorageError::Write(describe(&e)))?;
        Reflect::set(&items, &JsValue::from_str(key), &value).map_err(|e| StorageError::Write(describe(&e)))?;
        self.call("set", &items).await.map_err(StorageError::Write)?;
        Ok(())
    }
}

// =============================================================================
// Page context
// =============================================================================

/// The page's `localStorage`, `<script>` injection and `postMessage`.
pub struct PageWindow {
    window: Window,
}

impl PageWindow {
    pub fn new(window: Window) -> Self {
        Self { window }
    }

    fn storage(&self) -> Result<web_sys::Storage, PageError> {
        self.window
            .local_storage()
            .map_err(|e| PageError::Store(describe(&e)))?
            .ok_or_else(|| PageError::Store("localStorage is not available".to_string()))
    }
}

impl PageContext for PageWindow {
    fn get_item(&self, key: &str) -> Option<String> {
        self.storage().ok()?.get_item(key).ok().flatten()
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), PageError> {
        self.storage()?
            .set_item(key, value)
            .map_err(|e| PageError::Store(describe(&e)))
    }

    fn inject(&self, script: PageScript) -> Result<(), PageError> {
        let fail = |e: JsValue| PageError::Inject(format!("{}: {}", script.path(), describe(&e)));
        let document = self
            .window
            .document()
            .ok_or_else(|| PageError::Inject("no document".to_string()))?;
        let src = runtime_url(script.path()).ok_or_else(|| PageError::Inject("chrome.runtime.getURL unavailable".to_string()))?;

        let element: web_sys::HtmlScriptElement = document.create_element("script").map_err(fail)?.unchecked_into();
        element.set_src(&src);
        if script.mode() == ScriptMode::OneShot {
            let node = element.clone();
            let onload = Closure::once_into_js(move || node.remove());
            element.set_onload(Some(onload.unchecked_ref()));
        }

        let parent: Element = match document.head() {
            Some(head) => head.into(),
            None => document
                .document_element()
                .ok_or_else(|| PageError::Inject("empty document".to_string()))?,
        };
        parent.append_child(&element).map_err(fail)?;
        Ok(())
    }

    fn post_message(&self, message: &PageMessage) -> Result<(), PageError> {
        let value = to_js(message).map_err(|e| PageError::Post(describe(&e)))?;
        self.window
            .post_message(&value, "*")
            .map_err(|e| PageError::Post(describe(&e)))
    }
}

// =============================================================================
// DOM
// =============================================================================

#[derive(Clone)]
pub struct DomNode(pub Element);

impl DomElement for DomNode {
    fn tag_name(&self) -> String {
        self.0.tag_name().to_ascii_lowercase()
    }

    fn attribute(&self, name: &str) -> Option<String> {
        self.0.get_attribute(name)
    }

    fn has_class(&self, class: &str) -> bool {
        self.0
            .get_attribute("class")
            .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
    }

    fn children(&self) -> Vec<Self> {
        let list = self.0.children();
        (0..list.length()).filter_map(|i| list.item(i)).map(DomNode).collect()
    }

    fn parent(&self) -> Option<Self> {
        self.0.parent_element().map(DomNode)
    }

    fn text_content(&self) -> String {
        self.0.text_content().unwrap_or_default()
    }

    fn is_hidden(&self) -> bool {
        self.0
            .dyn_ref::<HtmlElement>()
            .and_then(|el| el.style().get_property_value("display").ok())
            .is_some_and(|display| display == "none")
    }

    fn hide(&self) {
        if let Some(el) = self.0.dyn_ref::<HtmlElement>() {
            let _ = el.style().set_property("display", "none");
        }
    }
}

// =============================================================================
// Page host
// =============================================================================

/// Callback raised by an observer or listener the host created.
#[derive(Debug, Clone)]
pub enum HostEvent {
    Mutation(WatchKey),
    Media { event: MediaEvents, src: String },
}

type Sink = Rc<RefCell<Option<Rc<dyn Fn(HostEvent)>>>>;

fn emit(sink: &Sink, event: HostEvent) {
    let handler = sink.borrow().clone();
    if let Some(handler) = handler {
        handler(event);
    }
}

fn observer_init(options: ObserveOptions) -> MutationObserverInit {
    let init = MutationObserverInit::new();
    init.set_child_list(options.contains(ObserveOptions::CHILD_LIST));
    init.set_attributes(options.contains(ObserveOptions::ATTRIBUTES));
    init.set_character_data(options.contains(ObserveOptions::CHARACTER_DATA));
    init.set_subtree(options.contains(ObserveOptions::SUBTREE));
    init
}

/// `MutationObserver`s and capture-phase media listeners on the live document.
#[derive(Clone)]
pub struct DocumentHost {
    document: Document,
    sink: Sink,
}

impl DocumentHost {
    pub fn new(document: Document) -> Self {
        Self {
            document,
            sink: Rc::new(RefCell::new(None)),
        }
    }

    /// Where observer and listener callbacks are delivered.
    pub fn set_sink(&self, handler: impl Fn(HostEvent) + 'static) {
        *self.sink.borrow_mut() = Some(Rc::new(handler));
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    fn query_all(&self, target: Target) -> Vec<Element> {
        let Ok(list) = self.document.query_selector_all(target.selector()) else {
            return Vec::new();
        };
        (0..list.length())
            .filter_map(|i| list.item(i))
            .filter_map(|node| node.dyn_into::<Element>().ok())
            .collect()
    }
}

impl PageHost for DocumentHost {
    type Element = DomNode;

    fn exists(&self, target: Target) -> bool {
        matches!(self.document.query_selector(target.selector()), Ok(Some(_)))
    }

    fn observe(&self, target: Target, options: ObserveOptions, key: WatchKey) -> Vec<Subscription> {
        let elements = self.query_all(target);
        if elements.is_empty() {
            return Vec::new();
        }

        let sink = self.sink.clone();
        let callback = Closure::<dyn FnMut(js_sys::Array, MutationObserver)>::new(move |_records, _observer| {
            emit(&sink, HostEvent::Mutation(key));
        });
        let observer = match MutationObserver::new(callback.as_ref().unchecked_ref()) {
            Ok(observer) => observer,
            Err(e) => {
                log::error!(target: "ycs::core", "Cannot create observer for {}: {}", target.selector(), describe(&e));
                return Vec::new();
            }
        };

        let init = observer_init(options);
        for element in &elements {
            if let Err(e) = observer.observe_with_options(element, &init) {
                log::warn!(target: "ycs::core", "Cannot observe {}: {}", target.selector(), describe(&e));
            }
        }

        vec![Subscription::new(move || {
            observer.disconnect();
            drop(callback);
        })]
    }

    fn listen_media(&self, events: MediaEvents) -> Subscription {
        let sink = self.sink.clone();
        let callback = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
            let Some(video) = event
                .target()
                .and_then(|t| t.dyn_into::<Element>().ok())
                .filter(|el| el.tag_name().eq_ignore_ascii_case("video"))
            else {
                return;
            };
            let src = Reflect::get(&video, &"src".into())
                .ok()
                .and_then(|v| v.as_string())
                .unwrap_or_default();
            emit(
                &sink,
                HostEvent::Media {
                    event: MediaEvents::from_event_type(&event.type_()),
                    src,
                },
            );
        });

        let names = events.event_types();
        for name in &names {
            let _ = self
                .document
                .add_event_listener_with_callback_and_bool(name, callback.as_ref().unchecked_ref(), true);
        }

        let document = self.document.clone();
        Subscription::new(move || {
            for name in &names {
                let _ = document.remove_event_listener_with_callback_and_bool(name, callback.as_ref().unchecked_ref(), true);
            }
        })
    }

    fn root(&self) -> Option<DomNode> {
        self.document.body().map(|body| DomNode(body.into()))
    }
}

// =============================================================================
// Time
// =============================================================================

/// `setTimeout` as a future.
pub struct TimeoutSleep;

impl Sleep for TimeoutSleep {
    async fn sleep(&self, ms: Millis) {
        let promise = Promise::new(&mut |resolve, _reject| {
            let scheduled = web_sys::window()
                .map(|w| w.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms.min(i32::MAX as u64) as i32));
            if !matches!(scheduled, Some(Ok(_))) {
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}
