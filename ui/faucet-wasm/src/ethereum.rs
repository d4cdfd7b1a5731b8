//! `window.ethereum` (EIP-1193) bindings.
//!
//! [`InjectedProvider`] adapts the injected object to [`WalletProvider`]; JS
//! listener closures are kept alive here until removed.

use async_trait::async_trait;
use fd_chain_client::{Listener, ListenerId, ProviderError, ProviderEvent, ProviderEventKind, WalletProvider};
use fd_core::ProviderDetector;
use fd_types::{ChainId, WalletAddress};
use serde::Serialize;
use serde_json::Value;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;

/// How long to wait for a late-injected provider, as `@metamask/detect-provider` does.
pub const DETECT_TIMEOUT_MS: i32 = 3_000;

const INITIALIZED_EVENT: &str = "ethereum#initialized";

#[wasm_bindgen]
extern "C" {
    #[derive(Clone)]
    pub type Ethereum;

    #[wasm_bindgen(method, catch)]
    fn request(this: &Ethereum, args: &JsValue) -> Result<js_sys::Promise, JsValue>;

    #[wasm_bindgen(method)]
    fn on(this: &Ethereum, event: &str, listener: &js_sys::Function);

    #[wasm_bindgen(method, js_name = removeListener)]
    fn remove_listener(this: &Ethereum, event: &str, listener: &js_sys::Function);
}

#[derive(Serialize)]
struct RequestArguments<'a> {
    method: &'a str,
    params: &'a Value,
}

type JsListener = Closure<dyn FnMut(JsValue)>;

pub struct InjectedProvider {
    ethereum: Ethereum,
    next_id: Cell<u64>,
    closures: RefCell<HashMap<ListenerId, (ProviderEventKind, JsListener)>>,
}

impl InjectedProvider {
    pub fn new(ethereum: Ethereum) -> Self {
        Self {
            ethereum,
            next_id: Cell::new(1),
            closures: RefCell::new(HashMap::new()),
        }
    }

    fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, ProviderError> {
        let serializer = serde_wasm_bindgen::Serializer::json_compatible();
        value
            .serialize(&serializer)
            .map_err(|err| ProviderError::Transport(err.to_string()))
    }
}

/// Wallet errors are `{ code, message }` objects; anything else is a transport failure.
fn provider_error(err: JsValue) -> ProviderError {
    let field = |name: &str| js_sys::Reflect::get(&err, &JsValue::from_str(name)).ok();
    let message = field("message").and_then(|m| m.as_string());
    let code = field("code").and_then(|c| c.as_f64());
    match (code, message) {
        (Some(code), Some(message)) => ProviderError::rpc(code as i64, message),
        (None, Some(message)) => ProviderError::Transport(message),
        _ => ProviderError::Transport(format!("{err:?}")),
    }
}

fn decode_event(kind: ProviderEventKind, payload: JsValue) -> Option<ProviderEvent> {
    match kind {
        ProviderEventKind::AccountsChanged => {
            let accounts: Vec<String> = serde_wasm_bindgen::from_value(payload).ok()?;
            Some(ProviderEvent::AccountsChanged(
                accounts.iter().map(|a| WalletAddress::from(a.as_str())).collect(),
            ))
        }
        ProviderEventKind::ChainChanged => payload
            .as_string()
            .map(|chain| ProviderEvent::ChainChanged(ChainId(chain))),
    }
}

#[async_trait(?Send)]
impl WalletProvider for InjectedProvider {
    fn name(&self) -> &str {
        "window.ethereum"
    }

    async fn request(&self, method: &str, params: Value) -> Result<Value, ProviderError> {
        let args = Self::to_js(&RequestArguments {
            method,
            params: &params,
        })?;
        let pending = self.ethereum.request(&args).map_err(provider_error)?;
        let result = JsFuture::from(pending).await.map_err(provider_error)?;
        if result.is_undefined() || result.is_null() {
            return Ok(Value::Null);
        }
        serde_wasm_bindgen::from_value(result)
            .map_err(|err| ProviderError::decode(method, err.to_string()))
    }

    fn on(&self, kind: ProviderEventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let closure = Closure::wrap(Box::new(move |payload: JsValue| {
            if let Some(event) = decode_event(kind, payload) {
                listener(&event);
            }
        }) as Box<dyn FnMut(JsValue)>);
        self.ethereum
            .on(kind.as_str(), closure.as_ref().unchecked_ref());
        self.closures.borrow_mut().insert(id, (kind, closure));
        id
    }

    fn remove_listener(&self, kind: ProviderEventKind, id: ListenerId) -> bool {
        let removed = self.closures.borrow_mut().remove(&id);
        match removed {
            Some((registered, closure)) if registered == kind => {
                self.ethereum
                    .remove_listener(kind.as_str(), closure.as_ref().unchecked_ref());
                true
            }
            Some(entry) => {
                self.closures.borrow_mut().insert(id, entry);
                false
            }
            None => false,
        }
    }

    fn listener_count(&self, kind: ProviderEventKind) -> usize {
        self.closures
            .borrow()
            .values()
            .filter(|(registered, _)| *registered == kind)
            .count()
    }

    /// Not every injected provider is a Node-style emitter.
    fn set_max_listeners(&self, max: usize) {
        let target: &JsValue = self.ethereum.as_ref();
        let Ok(method) = js_sys::Reflect::get(target, &JsValue::from_str("setMaxListeners")) else {
            return;
        };
        if let Some(method) = method.dyn_ref::<js_sys::Function>() {
            method.call1(target, &JsValue::from_f64(max as f64)).ok();
        }
    }

    async fn pause(&self, duration: Duration) {
        let millis = u32::try_from(duration.as_millis()).unwrap_or(u32::MAX);
        gloo_timers::future::TimeoutFuture::new(millis).await;
    }
}

impl Drop for InjectedProvider {
    fn drop(&mut self) {
        for (kind, closure) in self.closures.get_mut().values() {
            self.ethereum
                .remove_listener(kind.as_str(), closure.as_ref().unchecked_ref());
        }
    }
}

fn injected() -> Option<Ethereum> {
    let window = web_sys::window()?;
    let value = js_sys::Reflect::get(&window, &JsValue::from_str("ethereum")).ok()?;
    if value.is_undefined() || value.is_null() {
        return None;
    }
    Some(value.unchecked_into())
}

/// Resolve `window.ethereum`, waiting up to `timeout_ms` for a late injection.
pub async fn detect_ethereum(timeout_ms: i32) -> Option<Ethereum> {
    if let Some(ethereum) = injected() {
        return Some(ethereum);
    }
    let window = web_sys::window()?;

    let waiting = js_sys::Promise::new(&mut |resolve, _reject| {
        let options = web_sys::AddEventListenerOptions::new();
        options.set_once(true);
        window
            .add_event_listener_with_callback_and_add_event_listener_options(
                INITIALIZED_EVENT,
                &resolve,
                &options,
            )
            .ok();
        window
            .set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, timeout_ms)
            .ok();
    });
    JsFuture::from(waiting).await.ok();
    injected()
}

/// Detects the injected wallet once; later calls reuse the same provider.
#[derive(Default)]
pub struct InjectedDetector {
    found: RefCell<Option<Rc<dyn WalletProvider>>>,
}

#[async_trait(?Send)]
impl ProviderDetector for InjectedDetector {
    async fn detect(&self) -> Option<Rc<dyn WalletProvider>> {
        let cached = self.found.borrow().clone();
        if let Some(provider) = cached {
            return Some(provider);
        }
        let ethereum = detect_ethereum(DETECT_TIMEOUT_MS).await?;
        let provider: Rc<dyn WalletProvider> = Rc::new(InjectedProvider::new(ethereum));
        *self.found.borrow_mut() = Some(provider.clone());
        Some(provider)
    }
}
