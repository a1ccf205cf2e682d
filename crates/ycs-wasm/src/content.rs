//! Content-script runtime
//!
//! Wires browser events into the orchestrator. Observer and listener callbacks
//! only schedule work with `spawn_local`, so a watcher is never torn down from
//! inside its own running callback. After every handled event the single tick
//! timer is re-armed at the orchestrator's next deadline.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use js_sys::{Function, Promise, Reflect};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys::{Element, Event, Window};

use ycs_core::observe::{NavigationSource, Subscription};
use ycs_core::{ContentConfig, Orchestrator};

use crate::browser::{describe, from_js, listen, now, window, DocumentHost, ExtensionStorage, HostEvent, PageWindow};

type BrowserOrchestrator = Orchestrator<ExtensionStorage, PageWindow, DocumentHost>;

/// Class of the player's native settings popup.
const SETTINGS_MENU_SELECTOR: &str = ".ytp-settings-menu";

struct Runtime {
    orchestrator: BrowserOrchestrator,
    window: Window,
    timer: Cell<Option<i32>>,
    tick: Closure<dyn FnMut()>,
    listeners: RefCell<Vec<Subscription>>,
}

impl Runtime {
    fn location(&self) -> String {
        self.window.location().href().unwrap_or_default()
    }

    async fn on_host_event(&self, event: HostEvent) {
        match event {
            HostEvent::Mutation(key) => self.orchestrator.on_mutation(key, now()).await,
            HostEvent::Media { event, src } => self.orchestrator.on_media_event(event, &src, now()),
        }
        self.schedule();
    }

    async fn navigate(&self, source: NavigationSource) {
        self.orchestrator.on_url_change(&self.location(), source).await;
        self.schedule();
    }

    /// Re-arm the tick timer at the next deadline.
    fn schedule(&self) {
        if let Some(id) = self.timer.take() {
            self.window.clear_timeout_with_handle(id);
        }
        let Some(deadline) = self.orchestrator.next_deadline() else {
            return;
        };
        let delay = deadline.saturating_sub(now()).min(i32::MAX as u64) as i32;
        match self
            .window
            .set_timeout_with_callback_and_timeout_and_arguments_0(self.tick.as_ref().unchecked_ref(), delay)
        {
            Ok(id) => self.timer.set(Some(id)),
            Err(e) => log::error!(target: "ycs::core", "Cannot schedule timer: {}", describe(&e)),
        }
    }

    fn install_listeners(self: &Rc<Self>) -> Result<(), JsValue> {
        let document = self
            .window
            .document()
            .ok_or_else(|| JsValue::from_str("No document"))?;
        let mut listeners = Vec::new();

        let weak = Rc::downgrade(self);
        listeners.push(listen(&self.window, "popstate", false, move |_| {
            spawn_with(&weak, |rt| async move { rt.navigate(NavigationSource::PopState).await });
        })?);

        let weak = Rc::downgrade(self);
        listeners.push(listen(&document, "yt-page-data-updated", false, move |_| {
            spawn_with(&weak, |rt| async move { rt.navigate(NavigationSource::PageDataUpdated).await });
        })?);

        let weak = Rc::downgrade(self);
        let doc = document.clone();
        listeners.push(listen(&document, "visibilitychange", false, move |_| {
            let visible = !doc.hidden();
            spawn_with(&weak, move |rt| async move {
                rt.orchestrator.on_visibility_change(visible).await;
                rt.schedule();
            });
        })?);

        let weak = Rc::downgrade(self);
        listeners.push(listen(&document, "click", true, move |event: Event| {
            let in_menu = event
                .target()
                .and_then(|t| t.dyn_into::<Element>().ok())
                .and_then(|el| el.closest(SETTINGS_MENU_SELECTOR).ok().flatten())
                .is_some();
            if let (true, Some(rt)) = (in_menu, weak.upgrade()) {
                rt.orchestrator.on_settings_menu_click(now());
            }
        })?);

        listeners.push(self.listen_runtime_messages()?);
        self.wrap_history("pushState", NavigationSource::PushState)?;
        self.wrap_history("replaceState", NavigationSource::ReplaceState)?;

        *self.listeners.borrow_mut() = listeners;
        Ok(())
    }

    /// `chrome.runtime.onMessage`.
    fn listen_runtime_messages(self: &Rc<Self>) -> Result<Subscription, JsValue> {
        let on_message = Reflect::get(&js_sys::global(), &"chrome".into())
            .and_then(|chrome| Reflect::get(&chrome, &"runtime".into()))
            .and_then(|runtime| Reflect::get(&runtime, &"onMessage".into()))?;
        if on_message.is_undefined() {
            log::warn!(target: "ycs::core", "chrome.runtime.onMessage is not available");
            return Ok(Subscription::noop());
        }

        let weak = Rc::downgrade(self);
        let callback = Closure::<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>::new(
            move |message: JsValue, _sender: JsValue, _respond: JsValue| {
                let value = match from_js(&message) {
                    Ok(value) => value,
                    Err(e) => {
                        log::error!(target: "ycs::core", "Unreadable runtime message: {}", describe(&e));
                        return JsValue::FALSE;
                    }
                };
                spawn_with(&weak, move |rt| async move {
                    if let Err(e) = rt.orchestrator.handle_message(&value).await {
                        log::warn!(target: "ycs::core", "Ignoring runtime message: {}", e);
                    }
                    rt.schedule();
                });
                JsValue::FALSE
            },
        );

        let add: Function = Reflect::get(&on_message, &"addListener".into())?.dyn_into()?;
        add.call1(&on_message, callback.as_ref())?;
        Ok(Subscription::new(move || {
            let remove = Reflect::get(&on_message, &"removeListener".into())
                .ok()
                .and_then(|f| f.dyn_into::<Function>().ok());
            if let Some(remove) = remove {
                let _ = remove.call1(&on_message, callback.as_ref());
            }
        }))
    }

    /// Report SPA navigations made through the History API.
    fn wrap_history(self: &Rc<Self>, method: &'static str, source: NavigationSource) -> Result<(), JsValue> {
        let history = self.window.history()?;
        let original: Function = Reflect::get(&history, &method.into())?.dyn_into()?;
        let target = history.clone();
        let weak = Rc::downgrade(self);
        let wrapper = Closure::<dyn FnMut(JsValue, JsValue, JsValue) -> JsValue>::new(
            move |state: JsValue, title: JsValue, url: JsValue| {
                let result = original.call3(&target, &state, &title, &url).unwrap_or(JsValue::UNDEFINED);
                spawn_with(&weak, move |rt| async move { rt.navigate(source).await });
                result
            },
        );
        Reflect::set(&history, &method.into(), wrapper.as_ref())?;
        // The wrapper stays installed for the page lifetime
        wrapper.forget();
        Ok(())
    }
}

fn spawn_with<F, Fut>(weak: &Weak<Runtime>, task: F)
where
    F: FnOnce(Rc<Runtime>) -> Fut,
    Fut: std::future::Future<Output = ()> + 'static,
{
    if let Some(rt) = weak.upgrade() {
        spawn_local(task(rt));
    }
}

/// The extension's content script.
#[wasm_bindgen]
pub struct ContentScript {
    runtime: Rc<Runtime>,
}

#[wasm_bindgen]
impl ContentScript {
    /// `config_json` overrides `ContentConfig` defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<ContentScript, JsValue> {
        let config: ContentConfig = match config_json {
            Some(json) => {
                serde_json::from_str(&json).map_err(|e| JsValue::from_str(&format!("Invalid config: {}", e)))?
            }
            None => ContentConfig::default(),
        };

        let window = window()?;
        let document = window.document().ok_or_else(|| JsValue::from_str("No document"))?;
        let storage = ExtensionStorage::local()?;
        let host = DocumentHost::new(document);
        let page = PageWindow::new(window.clone());

        let runtime = Rc::new_cyclic(|weak: &Weak<Runtime>| {
            let events = weak.clone();
            host.set_sink(move |event| {
                spawn_with(&events, move |rt| async move { rt.on_host_event(event).await });
            });

            let timer = weak.clone();
            let tick = Closure::<dyn FnMut()>::new(move || {
                if let Some(rt) = timer.upgrade() {
                    rt.timer.set(None);
                    spawn_local(async move {
                        rt.orchestrator.tick(now()).await;
                        rt.schedule();
                    });
                }
            });

            Runtime {
                orchestrator: Orchestrator::new(storage, page, host.clone(), config),
                window,
                timer: Cell::new(None),
                tick,
                listeners: RefCell::new(Vec::new()),
            }
        });

        Ok(ContentScript { runtime })
    }

    /// Load settings, attach listeners and observe the current page.
    pub fn start(&self) -> Promise {
        let rt = self.runtime.clone();
        future_to_promise(async move {
            let url = rt.location();
            rt.orchestrator.start(&url).await;
            rt.install_listeners()?;
            rt.schedule();
            Ok(JsValue::UNDEFINED)
        })
    }

    pub fn stop(&self) {
        self.runtime.listeners.borrow_mut().clear();
        if let Some(id) = self.runtime.timer.take() {
            self.runtime.window.clear_timeout_with_handle(id);
        }
        self.runtime.orchestrator.stop();
    }

    /// Handle a runtime message delivered by the caller instead of `onMessage`.
    #[wasm_bindgen(js_name = handleMessage)]
    pub fn handle_message(&self, message: JsValue) -> Promise {
        let rt = self.runtime.clone();
        future_to_promise(async move {
            let value = from_js(&message)?;
            rt.orchestrator
                .handle_message(&value)
                .await
                .map_err(|e| JsValue::from_str(&e.to_string()))?;
            rt.schedule();
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Milliseconds timestamp of the next pending timer.
    #[wasm_bindgen(js_name = nextDeadline)]
    pub fn next_deadline(&self) -> Option<f64> {
        self.runtime.orchestrator.next_deadline().map(|ms| ms as f64)
    }

    #[wasm_bindgen(js_name = pageKind)]
    pub fn page_kind(&self) -> String {
        self.runtime.orchestrator.page_kind().name().to_string()
    }
}
