//! Chart host callback messages and handler registration.
//!
//! The host reports user interaction as `<name>_~_<args>` strings, with
//! multiple arguments joined by `;;;`. The search box uses the name
//! `search<chart_id>`; other widgets use the name they were created with
//! and are routed through [`EventRegistry::register`].

use std::collections::BTreeMap;

use tracing::debug;

const NAME_SEPARATOR: &str = "_~_";
const ARG_SEPARATOR: &str = ";;;";
const SEARCH_PREFIX: &str = "search";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackMessage {
    pub name: String,
    pub args: Vec<String>,
}

impl CallbackMessage {
    /// `None` when the separator is missing or the name is empty.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim_end_matches(['\r', '\n']);
        let (name, args) = raw.split_once(NAME_SEPARATOR)?;
        if name.is_empty() {
            return None;
        }
        Some(Self {
            name: name.to_string(),
            args: args.split(ARG_SEPARATOR).map(str::to_string).collect(),
        })
    }

    pub fn first_arg(&self) -> &str {
        self.args.first().map(String::as_str).unwrap_or("")
    }
}

/// Returned by registration; pass to [`EventRegistry::remove`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HandlerId(u64);

type Handler = Box<dyn FnMut(&CallbackMessage) + Send>;

struct Registration {
    name: String,
    handler: Handler,
}

/// Routes callback messages to registered handlers. Handlers for the same
/// name run in registration order.
pub struct EventRegistry {
    chart_id: String,
    next_id: u64,
    handlers: BTreeMap<HandlerId, Registration>,
}

impl EventRegistry {
    pub fn new(chart_id: impl Into<String>) -> Self {
        Self {
            chart_id: chart_id.into(),
            next_id: 0,
            handlers: BTreeMap::new(),
        }
    }

    pub fn chart_id(&self) -> &str {
        &self.chart_id
    }

    /// Handler receives the search query text.
    pub fn register_search_handler<F>(&mut self, mut handler: F) -> HandlerId
    where
        F: FnMut(&str) + Send + 'static,
    {
        let name = format!("{}{}", SEARCH_PREFIX, self.chart_id);
        self.register(name, move |msg: &CallbackMessage| handler(msg.first_arg()))
    }

    pub fn register<F>(&mut self, name: String, handler: F) -> HandlerId
    where
        F: FnMut(&CallbackMessage) + Send + 'static,
    {
        let id = HandlerId(self.next_id);
        self.next_id += 1;
        self.handlers.insert(
            id,
            Registration {
                name,
                handler: Box::new(handler),
            },
        );
        id
    }

    /// Returns `false` if the handler was already removed.
    pub fn remove(&mut self, id: HandlerId) -> bool {
        self.handlers.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Parse and route one raw message. Returns the number of handlers run.
    pub fn dispatch(&mut self, raw: &str) -> usize {
        let Some(msg) = CallbackMessage::parse(raw) else {
            debug!(raw, "ignoring malformed callback message");
            return 0;
        };
        let mut invoked = 0;
        for reg in self.handlers.values_mut().filter(|r| r.name == msg.name) {
            (reg.handler)(&msg);
            invoked += 1;
        }
        if invoked == 0 {
            debug!(name = %msg.name, "no handler registered for callback");
        }
        invoked
    }
}
