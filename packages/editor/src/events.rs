//! # Editor Events
//!
//! Typed publish/subscribe for the three notifications the editor emits.
//! Handlers run synchronously, in subscription order, in the same turn as
//! the change that caused them. For one transition the order is fixed:
//!
//! ```text
//! update          only when the document changed
//! outlineChange   only when the outline differs from the last one emitted
//! selectionChange for every applied transaction
//! ```
//!
//! Disposal is explicit: [`Subscription::unsubscribe`] consumes the
//! subscription, so a registration is removed exactly once. Dropping a
//! subscription keeps the handler registered.

use crate::errors::EditorError;
use crate::views::outline::Outline;
use folio_model::Selection;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::str::FromStr;
use tracing::trace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventName {
    Update,
    OutlineChange,
    SelectionChange,
}

impl EventName {
    pub const ALL: [EventName; 3] = [EventName::Update, EventName::OutlineChange, EventName::SelectionChange];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventName::Update => "update",
            EventName::OutlineChange => "outlineChange",
            EventName::SelectionChange => "selectionChange",
        }
    }
}

impl fmt::Display for EventName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventName {
    type Err = EditorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|name| name.as_str() == s).ok_or_else(|| {
            let valid: Vec<&str> = Self::ALL.iter().map(|n| n.as_str()).collect();
            EditorError::invalid_argument(format!(
                "unknown event '{}', expected one of: {}",
                s,
                valid.join(", ")
            ))
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EditorEvent {
    Update,
    OutlineChange(Outline),
    SelectionChange(Selection),
}

impl EditorEvent {
    pub fn name(&self) -> EventName {
        match self {
            EditorEvent::Update => EventName::Update,
            EditorEvent::OutlineChange(_) => EventName::OutlineChange,
            EditorEvent::SelectionChange(_) => EventName::SelectionChange,
        }
    }
}

pub type Handler = Rc<dyn Fn(&EditorEvent)>;

struct Registration {
    id: u64,
    name: EventName,
    handler: Handler,
}

#[derive(Default)]
pub struct EventBus {
    registrations: RefCell<Vec<Registration>>,
    next_id: Cell<u64>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriptions", &self.registrations.borrow().len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn subscribe(self: &Rc<Self>, name: EventName, handler: impl Fn(&EditorEvent) + 'static) -> Subscription {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.registrations.borrow_mut().push(Registration {
            id,
            name,
            handler: Rc::new(handler),
        });
        trace!(event = %name, id, "subscribed");
        Subscription {
            bus: Rc::downgrade(self),
            id,
        }
    }

    /// Deliver to every handler registered for the event's name. Handlers
    /// may subscribe or unsubscribe while being called; that takes effect
    /// from the next event.
    pub fn emit(&self, event: &EditorEvent) {
        let name = event.name();
        let handlers: Vec<Handler> = self
            .registrations
            .borrow()
            .iter()
            .filter(|r| r.name == name)
            .map(|r| r.handler.clone())
            .collect();
        for handler in handlers {
            handler(event);
        }
    }

    pub fn emit_all(&self, events: Vec<EditorEvent>) {
        for event in &events {
            self.emit(event);
        }
    }

    pub fn subscriber_count(&self, name: EventName) -> usize {
        self.registrations.borrow().iter().filter(|r| r.name == name).count()
    }

    pub fn clear(&self) {
        self.registrations.borrow_mut().clear();
    }

    fn remove(&self, id: u64) -> bool {
        let mut registrations = self.registrations.borrow_mut();
        let before = registrations.len();
        registrations.retain(|r| r.id != id);
        registrations.len() != before
    }
}

/// Handle returned by `subscribe`
#[must_use = "keep the subscription to unsubscribe later"]
#[derive(Debug)]
pub struct Subscription {
    bus: Weak<EventBus>,
    id: u64,
}

impl Subscription {
    /// Remove the handler. Returns false when the editor is already gone.
    pub fn unsubscribe(self) -> bool {
        self.bus.upgrade().map_or(false, |bus| bus.remove(self.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorder(bus: &Rc<EventBus>, name: EventName) -> (Rc<RefCell<Vec<EditorEvent>>>, Subscription) {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let subscription = bus.subscribe(name, move |e| sink.borrow_mut().push(e.clone()));
        (seen, subscription)
    }

    #[test]
    fn test_event_names() {
        assert_eq!("outlineChange".parse::<EventName>().unwrap(), EventName::OutlineChange);
        let err = "change".parse::<EventName>().unwrap_err();
        let message = err.to_string();
        assert!(matches!(err, EditorError::InvalidArgument(_)));
        for name in ["update", "outlineChange", "selectionChange"] {
            assert!(message.contains(name), "{message}");
        }
    }

    #[test]
    fn test_delivery_by_name() {
        let bus = EventBus::new();
        let (updates, _u) = recorder(&bus, EventName::Update);
        let (selections, _s) = recorder(&bus, EventName::SelectionChange);
        bus.emit_all(vec![EditorEvent::Update, EditorEvent::SelectionChange(Selection::cursor(2))]);
        assert_eq!(*updates.borrow(), [EditorEvent::Update]);
        assert_eq!(*selections.borrow(), [EditorEvent::SelectionChange(Selection::cursor(2))]);
    }

    #[test]
    fn test_unsubscribe_once() {
        let bus = EventBus::new();
        let (updates, subscription) = recorder(&bus, EventName::Update);
        bus.emit(&EditorEvent::Update);
        assert!(subscription.unsubscribe());
        bus.emit(&EditorEvent::Update);
        assert_eq!(updates.borrow().len(), 1);
        assert_eq!(bus.subscriber_count(EventName::Update), 0);
    }

    #[test]
    fn test_handler_may_subscribe_during_emit() {
        let bus = EventBus::new();
        let inner_bus = bus.clone();
        let _s = bus.subscribe(EventName::Update, move |_| {
            let _late = inner_bus.subscribe(EventName::Update, |_| {});
        });
        bus.emit(&EditorEvent::Update);
        assert_eq!(bus.subscriber_count(EventName::Update), 2);
    }

    #[test]
    fn test_unsubscribe_after_bus_is_gone() {
        let bus = EventBus::new();
        let subscription = bus.subscribe(EventName::Update, |_| {});
        drop(bus);
        assert!(!subscription.unsubscribe());
    }
}
