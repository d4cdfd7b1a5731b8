//! Event emitter shared by the native provider implementations.

use crate::{Listener, ListenerId, ProviderEvent, ProviderEventKind};
use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Threshold used until `set_max_listeners` is called, as in the node event emitter.
pub const DEFAULT_EMITTER_MAX_LISTENERS: usize = 10;

pub struct ListenerRegistry {
    listeners: RefCell<HashMap<ProviderEventKind, Vec<(ListenerId, Listener)>>>,
    next_id: Cell<u64>,
    max_listeners: Cell<usize>,
    warned: RefCell<HashSet<ProviderEventKind>>,
}

impl Default for ListenerRegistry {
    fn default() -> Self {
        Self {
            listeners: RefCell::new(HashMap::new()),
            next_id: Cell::new(1),
            max_listeners: Cell::new(DEFAULT_EMITTER_MAX_LISTENERS),
            warned: RefCell::new(HashSet::new()),
        }
    }
}

impl ListenerRegistry {
    pub fn on(&self, kind: ProviderEventKind, listener: Listener) -> ListenerId {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(id.0 + 1);

        let count = {
            let mut guard = self.listeners.borrow_mut();
            let entries = guard.entry(kind).or_default();
            entries.push((id, listener));
            entries.len()
        };

        let max = self.max_listeners.get();
        if max > 0 && count > max && self.warned.borrow_mut().insert(kind) {
            warn!(
                "possible listener leak: {} {} listeners added, max is {}",
                count, kind, max
            );
        }

        id
    }

    pub fn remove(&self, kind: ProviderEventKind, id: ListenerId) -> bool {
        let mut guard = self.listeners.borrow_mut();
        let Some(entries) = guard.get_mut(&kind) else {
            return false;
        };
        let before = entries.len();
        entries.retain(|(existing, _)| *existing != id);
        entries.len() != before
    }

    pub fn count(&self, kind: ProviderEventKind) -> usize {
        self.listeners
            .borrow()
            .get(&kind)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// `0` disables the leak warning.
    pub fn set_max(&self, max: usize) {
        self.max_listeners.set(max);
    }

    pub fn max(&self) -> usize {
        self.max_listeners.get()
    }

    /// Deliver `event` to a snapshot of the current listeners, in registration order.
    pub fn emit(&self, event: &ProviderEvent) -> usize {
        let snapshot: Vec<Listener> = self
            .listeners
            .borrow()
            .get(&event.kind())
            .map(|entries| entries.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in &snapshot {
            listener(event);
        }
        snapshot.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fd_types::ChainId;
    use std::rc::Rc;

    fn counting_listener(hits: &Rc<Cell<u32>>) -> Listener {
        let hits = hits.clone();
        Rc::new(move |_| hits.set(hits.get() + 1))
    }

    #[test]
    fn removal_is_by_id_and_per_event() {
        let registry = ListenerRegistry::default();
        let hits = Rc::new(Cell::new(0));

        let a = registry.on(ProviderEventKind::ChainChanged, counting_listener(&hits));
        let b = registry.on(ProviderEventKind::ChainChanged, counting_listener(&hits));
        assert_eq!(registry.count(ProviderEventKind::ChainChanged), 2);
        assert_eq!(registry.count(ProviderEventKind::AccountsChanged), 0);

        assert!(!registry.remove(ProviderEventKind::AccountsChanged, a));
        assert!(registry.remove(ProviderEventKind::ChainChanged, a));
        assert!(!registry.remove(ProviderEventKind::ChainChanged, a));

        let delivered = registry.emit(&ProviderEvent::ChainChanged(ChainId::from_number(1)));
        assert_eq!(delivered, 1);
        assert_eq!(hits.get(), 1);

        assert!(registry.remove(ProviderEventKind::ChainChanged, b));
        assert_eq!(registry.count(ProviderEventKind::ChainChanged), 0);
    }

    fn leak_warned(registry: &ListenerRegistry, kind: ProviderEventKind) -> bool {
        registry.warned.borrow().contains(&kind)
    }

    #[test]
    fn warns_once_past_threshold() {
        let registry = ListenerRegistry::default();
        let hits = Rc::new(Cell::new(0));

        for _ in 0..DEFAULT_EMITTER_MAX_LISTENERS {
            registry.on(ProviderEventKind::AccountsChanged, counting_listener(&hits));
        }
        assert!(!leak_warned(&registry, ProviderEventKind::AccountsChanged));

        registry.on(ProviderEventKind::AccountsChanged, counting_listener(&hits));
        assert!(leak_warned(&registry, ProviderEventKind::AccountsChanged));
        assert!(!leak_warned(&registry, ProviderEventKind::ChainChanged));
    }

    #[test]
    fn raised_threshold_suppresses_warning() {
        let registry = ListenerRegistry::default();
        registry.set_max(20);
        let hits = Rc::new(Cell::new(0));
        for _ in 0..20 {
            registry.on(ProviderEventKind::ChainChanged, counting_listener(&hits));
        }
        assert!(!leak_warned(&registry, ProviderEventKind::ChainChanged));
    }

    #[test]
    fn listener_may_detach_itself_during_emit() {
        let registry = Rc::new(ListenerRegistry::default());
        let own_id = Rc::new(Cell::new(None));

        let listener: Listener = {
            let registry = registry.clone();
            let own_id = own_id.clone();
            Rc::new(move |_| {
                if let Some(id) = own_id.get() {
                    registry.remove(ProviderEventKind::AccountsChanged, id);
                }
            })
        };
        own_id.set(Some(registry.on(ProviderEventKind::AccountsChanged, listener)));

        assert_eq!(registry.emit(&ProviderEvent::AccountsChanged(Vec::new())), 1);
        assert_eq!(registry.count(ProviderEventKind::AccountsChanged), 0);
    }
}
