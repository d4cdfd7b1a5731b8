//! Event binding.
//!
//! Button clicks and wallet notifications both end in a `settle` followed by a
//! render; async work is spawned with `wasm_bindgen_futures::spawn_local`.

use crate::dom::Elements;
use crate::render::render;
use crate::state;
use fd_core::FaucetApp;
use std::rc::Rc;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

/// Attach an async click handler that runs `$action` against the app, then re-renders.
macro_rules! on_click_app {
    ($el:expr, $els:expr, $action:expr) => {{
        let els = $els.clone();
        let cb = Closure::wrap(Box::new(move |_: web_sys::MouseEvent| {
            let els2 = els.clone();
            wasm_bindgen_futures::spawn_local(async move {
                let Some(app) = state::app() else {
                    return;
                };
                render_busy(&els2, true);
                $action(app.clone()).await;
                render_busy(&els2, false);
                render(&els2, &app.view());
            });
        }) as Box<dyn FnMut(_)>);
        $el.add_event_listener_with_callback("click", cb.as_ref().unchecked_ref())?;
        cb.forget();
    }};
}

/// Bind all UI event listeners. Call once after mount.
pub fn bind_events(els: &Elements) -> Result<(), JsValue> {
    on_click_app!(els.connect_btn, els, |app: Rc<FaucetApp>| async move {
        if let Err(err) = app.connect().await {
            gloo_console::warn!(format!("connect failed: {err}"));
        }
    });
    on_click_app!(els.donate_btn, els, |app: Rc<FaucetApp>| async move {
        match app.donate().await {
            Ok(receipt) => gloo_console::log!(format!("Donation successful: {}", receipt.transaction_hash)),
            Err(err) => gloo_console::warn!(err.to_string()),
        }
    });
    on_click_app!(els.withdraw_btn, els, |app: Rc<FaucetApp>| async move {
        match app.withdraw().await {
            Ok(receipt) => gloo_console::log!(format!("Withdrawal successful: {}", receipt.transaction_hash)),
            Err(err) => gloo_console::warn!(err.to_string()),
        }
    });
    Ok(())
}

/// Wallet notifications schedule a settle and a render on the next tick.
pub fn watch_wallet(app: &FaucetApp, els: &Elements) {
    let els = els.clone();
    app.on_change(move || {
        let els2 = els.clone();
        wasm_bindgen_futures::spawn_local(async move {
            if let Some(app) = state::app() {
                app.settle().await;
                render(&els2, &app.view());
            }
        });
    });
}

fn render_busy(els: &Elements, busy: bool) {
    els.donate_btn.set_disabled(busy);
    els.withdraw_btn.set_disabled(busy);
}
