//! DOM element bindings.
//!
//! All fields are resolved once at startup from these ids: `faucetApp`,
//! `loading`, `installPrompt`, `connectBtn`, `donateBtn`, `withdrawBtn`,
//! `accountAddress`, `accountBalance`, `errorBanner`.

use wasm_bindgen::prelude::*;
use web_sys::{Document, Element, HtmlButtonElement};

// ── Helpers ──

fn doc() -> Result<Document, JsValue> {
    web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| JsValue::from_str("no document"))
}

pub fn by_id(id: &str) -> Option<Element> {
    doc().ok()?.get_element_by_id(id)
}

pub fn by_id_typed<T: JsCast>(id: &str) -> Option<T> {
    by_id(id).and_then(|e| e.dyn_into::<T>().ok())
}

pub fn set_text(el: &Element, text: &str) {
    el.set_text_content(Some(text));
}

pub fn toggle_class(el: &Element, cls: &str, force: bool) {
    let _ = el.class_list().toggle_with_force(cls, force);
}

/// `hidden` is the only visibility switch the page stylesheet needs.
pub fn set_visible(el: &Element, visible: bool) {
    toggle_class(el, "hidden", !visible);
}

macro_rules! get_el {
    ($id:expr) => {
        by_id($id).ok_or_else(|| JsValue::from_str(&format!("missing element #{}", $id)))?
    };
}

macro_rules! get_button {
    ($id:expr) => {
        by_id_typed::<HtmlButtonElement>($id)
            .ok_or_else(|| JsValue::from_str(&format!("missing button #{}", $id)))?
    };
}

#[derive(Clone)]
pub struct Elements {
    pub app: Element,
    pub loading: Element,
    pub install_prompt: Element,

    pub connect_btn: HtmlButtonElement,
    pub donate_btn: HtmlButtonElement,
    pub withdraw_btn: HtmlButtonElement,

    pub account_address: Element,
    pub account_balance: Element,
    pub error_banner: Element,
}

impl Elements {
    /// Resolve all DOM references. Call once after DOMContentLoaded.
    pub fn bind() -> Result<Elements, JsValue> {
        Ok(Elements {
            app: get_el!("faucetApp"),
            loading: get_el!("loading"),
            install_prompt: get_el!("installPrompt"),

            connect_btn: get_button!("connectBtn"),
            donate_btn: get_button!("donateBtn"),
            withdraw_btn: get_button!("withdrawBtn"),

            account_address: get_el!("accountAddress"),
            account_balance: get_el!("accountBalance"),
            error_banner: get_el!("errorBanner"),
        })
    }
}
