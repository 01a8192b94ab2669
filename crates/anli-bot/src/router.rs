//! The event router.
//!
//! Three dispatch tables keyed on the typed event envelope: command name,
//! component key, modal key. Component and modal keys support prefix
//! entries for parameterised ids that carry a `:`-delimited payload; exact
//! matches win, then the longest registered prefix. Matched handlers run
//! as spawned tasks so the event loop never blocks on a slow handler.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use tracing::{debug, warn};

use anli_core::chat::{ChatEvent, ChatEventKind};

pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
pub type Handler<A> = Arc<dyn Fn(Arc<A>, ChatEvent) -> HandlerFuture + Send + Sync>;

pub struct EventRouter<A> {
  commands:           HashMap<String, Handler<A>>,
  components:         HashMap<String, Handler<A>>,
  component_prefixes: Vec<(String, Handler<A>)>,
  modals:             HashMap<String, Handler<A>>,
  modal_prefixes:     Vec<(String, Handler<A>)>,
  reaction_add:       Option<Handler<A>>,
  reaction_remove:    Option<Handler<A>>,
}

impl<A> Default for EventRouter<A> {
  fn default() -> Self {
    Self {
      commands:           HashMap::new(),
      components:         HashMap::new(),
      component_prefixes: Vec::new(),
      modals:             HashMap::new(),
      modal_prefixes:     Vec::new(),
      reaction_add:       None,
      reaction_remove:    None,
    }
  }
}

impl<A: Send + Sync + 'static> EventRouter<A> {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn command(&mut self, name: &str, handler: Handler<A>) -> &mut Self {
    self.commands.insert(name.to_string(), handler);
    self
  }

  pub fn component(&mut self, key: &str, handler: Handler<A>) -> &mut Self {
    self.components.insert(key.to_string(), handler);
    self
  }

  /// Register for every component key starting with `prefix` (ending in
  /// `:`); the handler parses the payload out of the key itself.
  pub fn component_prefix(&mut self, prefix: &str, handler: Handler<A>) -> &mut Self {
    self.component_prefixes.push((prefix.to_string(), handler));
    self
  }

  pub fn modal(&mut self, key: &str, handler: Handler<A>) -> &mut Self {
    self.modals.insert(key.to_string(), handler);
    self
  }

  pub fn modal_prefix(&mut self, prefix: &str, handler: Handler<A>) -> &mut Self {
    self.modal_prefixes.push((prefix.to_string(), handler));
    self
  }

  pub fn on_reaction_add(&mut self, handler: Handler<A>) -> &mut Self {
    self.reaction_add = Some(handler);
    self
  }

  pub fn on_reaction_remove(&mut self, handler: Handler<A>) -> &mut Self {
    self.reaction_remove = Some(handler);
    self
  }

  /// Route one event. The handler runs as a fire-and-forget task; the
  /// return value says only whether a handler was found.
  pub fn dispatch(&self, app: Arc<A>, event: ChatEvent) -> bool {
    let handler = match &event.kind {
      ChatEventKind::Command { name, .. } => self.commands.get(name).cloned(),
      ChatEventKind::Component { key } => {
        lookup_keyed(&self.components, &self.component_prefixes, key)
      }
      ChatEventKind::ModalSubmit { key, .. } => {
        lookup_keyed(&self.modals, &self.modal_prefixes, key)
      }
      ChatEventKind::ReactionAdd { .. } => self.reaction_add.clone(),
      ChatEventKind::ReactionRemove { .. } => self.reaction_remove.clone(),
    };

    match handler {
      Some(handler) => {
        debug!(kind = ?event.kind, "dispatching event");
        tokio::spawn(handler(app, event));
        true
      }
      None => {
        warn!(kind = ?event.kind, "no handler registered, event dropped");
        false
      }
    }
  }
}

/// Exact match first, then the longest matching prefix.
fn lookup_keyed<A>(
  exact: &HashMap<String, Handler<A>>,
  prefixes: &[(String, Handler<A>)],
  key: &str,
) -> Option<Handler<A>> {
  if let Some(handler) = exact.get(key) {
    return Some(handler.clone());
  }
  prefixes
    .iter()
    .filter(|(prefix, _)| key.starts_with(prefix.as_str()))
    .max_by_key(|(prefix, _)| prefix.len())
    .map(|(_, handler)| handler.clone())
}

/// Wrap an `async fn(Arc<A>, ChatEvent)` as a boxed [`Handler`].
pub fn handler<A, F, Fut>(f: F) -> Handler<A>
where
  F: Fn(Arc<A>, ChatEvent) -> Fut + Send + Sync + 'static,
  Fut: Future<Output = ()> + Send + 'static,
{
  Arc::new(move |app, event| Box::pin(f(app, event)))
}
