//! Global application state.
//!
//! Uses `RefCell`-wrapped `thread_local!` storage (WASM is single-threaded).
//! The app is cloned out before any await so no borrow spans a suspension.

use fd_core::FaucetApp;
use std::cell::RefCell;
use std::rc::Rc;

thread_local! {
    static APP: RefCell<Option<Rc<FaucetApp>>> = const { RefCell::new(None) };
}

pub fn install(app: Rc<FaucetApp>) {
    APP.with(|slot| *slot.borrow_mut() = Some(app));
}

pub fn app() -> Option<Rc<FaucetApp>> {
    APP.with(|slot| slot.borrow().clone())
}

pub fn take() -> Option<Rc<FaucetApp>> {
    APP.with(|slot| slot.borrow_mut().take())
}
