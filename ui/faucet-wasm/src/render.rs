use crate::dom::{self, Elements};
use fd_core::AppView;

pub fn render(els: &Elements, view: &AppView) {
    dom::set_visible(&els.loading, !view.loaded);
    dom::set_visible(&els.app, view.loaded && !view.install_prompt);
    dom::set_visible(&els.install_prompt, view.loaded && view.install_prompt);

    let account = view
        .account
        .as_ref()
        .map(|a| a.to_string())
        .unwrap_or_else(|| "not connected".to_string());
    dom::set_text(&els.account_address, &account);
    dom::set_text(&els.account_balance, &format!("{} ETH", view.balance));

    els.connect_btn.set_text_content(Some(view.connect_label));
    els.connect_btn.set_disabled(view.connected);
    els.donate_btn.set_disabled(!view.actions_enabled);
    els.withdraw_btn.set_disabled(!view.actions_enabled);

    match &view.error {
        Some(message) => {
            dom::set_text(&els.error_banner, message);
            dom::set_visible(&els.error_banner, true);
        }
        None => {
            dom::set_text(&els.error_banner, "");
            dom::set_visible(&els.error_banner, false);
        }
    }
}
