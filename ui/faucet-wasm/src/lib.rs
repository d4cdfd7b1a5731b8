//! Faucet dApp WASM frontend.
//!
//! Detects `window.ethereum`, binds the Faucet session through `fd-core` and
//! renders the result into a static page.

pub mod dom;
pub mod ethereum;
pub mod events;
pub mod render;
pub mod state;

use fd_core::{FaucetApp, FaucetConfig};
use std::rc::Rc;
use wasm_bindgen::prelude::*;

/// WASM entry point – called automatically when the module is instantiated.
#[wasm_bindgen(start)]
pub async fn start() -> Result<(), JsValue> {
    // Improve panic messages in the browser console
    console_error_panic_hook::set_once();

    init().await
}

async fn init() -> Result<(), JsValue> {
    let els = dom::Elements::bind()?;
    let app = Rc::new(FaucetApp::new(
        FaucetConfig::default(),
        Rc::new(ethereum::InjectedDetector::default()),
    ));
    state::install(app.clone());
    events::watch_wallet(&app, &els);
    render::render(&els, &app.view());

    app.mount().await;
    let view = app.view();
    if view.install_prompt {
        gloo_console::warn!("Please, Install Metamask wallet.");
    }
    render::render(&els, &view);

    events::bind_events(&els)
}

/// Detach wallet listeners, e.g. before the page swaps this client out.
#[wasm_bindgen]
pub fn unmount() {
    if let Some(app) = state::take() {
        app.unmount();
        gloo_console::log!("faucet client unmounted");
    }
}
