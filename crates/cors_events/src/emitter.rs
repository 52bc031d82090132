//! Request/response exchange between execution contexts over the shared value channel.
//!
//! A call is a two-phase exchange on three slots of a call record. The caller writes
//! `arguments` and `state = 0`, watches `state`, and appends the call id to the queue key of the
//! event. The listener context watches the queue key; for each queued id it awaits its handler,
//! writes `return`, waits [`EmitterConfig::completion_delay_ms`], flips `state` to `1` and drops
//! the id from the queue. The flip wakes the caller, which reads `return`, resolves the call and
//! deletes the record.

use std::{
    cell::{Cell, RefCell},
    collections::HashMap,
    fmt,
    future::Future,
    pin::Pin,
    rc::{Rc, Weak},
    task::{Context, Poll},
};

use futures::{channel::oneshot, FutureExt};
use leptos::logging;
use serde_json::Value;
use userscript_host::{HostFuture, HostRuntime, ListenerId, TabContext, ValueChange, ValueStore};

use crate::{
    config::EmitterConfig,
    error::CorsError,
    keys::{CallId, CallKey, CallSlot, EventName, QueueKey},
    queue::{self, CallQueue},
    state::CallState,
};

/// Type-erased event handler. Receives the emitted arguments, resolves to the return value.
pub type EventHandler = Rc<dyn Fn(Vec<Value>) -> HostFuture<'static, Value>>;

/// Response delivered to the caller of [`CorsEventEmitter::emit`].
#[derive(Debug, Clone, PartialEq)]
pub struct CallReply {
    /// Value of the `return` slot when the state changed.
    pub value: Option<Value>,
    /// Whether the state change was written by another execution context.
    pub remote: bool,
    /// Decoded new state. `None` when the state slot was deleted instead of flipped.
    pub state: Option<CallState>,
}

type CallResult = Result<CallReply, CorsError>;

/// Resolves its call at most once, whichever side gets there first.
#[derive(Clone)]
struct Completion(Rc<RefCell<Option<oneshot::Sender<CallResult>>>>);

impl Completion {
    fn new(sender: oneshot::Sender<CallResult>) -> Self {
        Self(Rc::new(RefCell::new(Some(sender))))
    }

    fn resolve(&self, result: CallResult) {
        if let Some(sender) = self.0.borrow_mut().take() {
            // The caller may have dropped its PendingCall; nothing left to notify then.
            let _ = sender.send(result);
        }
    }
}

/// Handle to an emitted call. Resolves once the remote side answers.
///
/// There is no timeout: a call nobody listens for stays pending until dropped.
pub struct PendingCall {
    id: CallId,
    receiver: oneshot::Receiver<CallResult>,
}

impl PendingCall {
    /// Id of the call record backing this call.
    pub fn call_id(&self) -> &CallId {
        &self.id
    }
}

impl fmt::Debug for PendingCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCall").field("id", &self.id).finish()
    }
}

impl Future for PendingCall {
    type Output = CallResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.receiver
            .poll_unpin(cx)
            .map(|received| received.unwrap_or(Err(CorsError::Dropped)))
    }
}

struct EmitterInner {
    store: Rc<dyn ValueStore>,
    tabs: Rc<dyn TabContext>,
    runtime: Rc<dyn HostRuntime>,
    config: EmitterConfig,
    listeners: RefCell<HashMap<QueueKey, Registration>>,
}

/// Store subscription of one `on` call and the worker it wakes.
struct Registration {
    id: ListenerId,
    worker: Rc<QueueWorker>,
}

/// Cross-context event emitter.
///
/// Construct one per execution context and pass clones to whoever needs it; clones share the
/// listener registry.
#[derive(Clone)]
pub struct CorsEventEmitter {
    inner: Rc<EmitterInner>,
}

impl fmt::Debug for CorsEventEmitter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CorsEventEmitter")
            .field("config", &self.inner.config)
            .field("listeners", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl CorsEventEmitter {
    /// Creates an emitter over the given host services.
    pub fn new(
        store: Rc<dyn ValueStore>,
        tabs: Rc<dyn TabContext>,
        runtime: Rc<dyn HostRuntime>,
        config: EmitterConfig,
    ) -> Self {
        Self {
            inner: Rc::new(EmitterInner {
                store,
                tabs,
                runtime,
                config,
                listeners: RefCell::new(HashMap::new()),
            }),
        }
    }

    /// Active configuration.
    pub fn config(&self) -> &EmitterConfig {
        &self.inner.config
    }

    /// Starts a remote call of event `name` and returns immediately.
    ///
    /// The returned [`PendingCall`] resolves exactly once: with the handler's value when the
    /// listener flips the call state, or with an error when the call could not be dispatched.
    pub fn emit(&self, name: &str, args: Vec<Value>) -> PendingCall {
        let id = CallId::generate();
        let (sender, receiver) = oneshot::channel();
        let completion = Completion::new(sender);

        match EventName::new(name) {
            Some(event) => {
                let inner = Rc::clone(&self.inner);
                let call = id.clone();
                self.inner.runtime.spawn_local(Box::pin(async move {
                    if let Err(err) = inner.dispatch(&event, &call, args, &completion).await {
                        logging::warn!("cors emit `{event}` failed: {err}");
                        completion.resolve(Err(err));
                    }
                }));
            }
            None => completion.resolve(Err(CorsError::InvalidEventName(name.to_string()))),
        }

        PendingCall { id, receiver }
    }

    /// Callback form of [`Self::emit`]: `callback(value, remote)` runs once the call completes.
    ///
    /// A call that fails to dispatch is logged and its callback never runs.
    pub fn emit_with<F>(&self, name: &str, args: Vec<Value>, callback: F)
    where
        F: FnOnce(Option<Value>, bool) + 'static,
    {
        let pending = self.emit(name, args);
        self.inner.runtime.spawn_local(Box::pin(async move {
            match pending.await {
                Ok(reply) => callback(reply.value, reply.remote),
                Err(err) => logging::warn!("cors call dropped without reply: {err}"),
            }
        }));
    }

    /// Registers `handler` for event `name` in the current tab.
    ///
    /// Registration is idempotent per tab and name: a second call returns the id of the existing
    /// subscription and leaves `handler` unused. Only writes from other execution contexts are
    /// serviced.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name, a failed tab lookup or a failed queue reset.
    pub async fn on<F, Fut>(&self, name: &str, handler: F) -> Result<ListenerId, CorsError>
    where
        F: Fn(Vec<Value>) -> Fut + 'static,
        Fut: Future<Output = Value> + 'static,
    {
        let event =
            EventName::new(name).ok_or_else(|| CorsError::InvalidEventName(name.to_string()))?;
        let handler: EventHandler =
            Rc::new(move |args: Vec<Value>| -> HostFuture<'static, Value> {
                Box::pin(handler(args))
            });
        EmitterInner::listen(&self.inner, event, handler).await
    }

    /// Removes the listener registered for `name` in the current tab.
    ///
    /// Returns whether a listener was removed. Records of calls already in flight are left alone.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a failed tab lookup.
    pub async fn off(&self, name: &str) -> Result<bool, CorsError> {
        let event =
            EventName::new(name).ok_or_else(|| CorsError::InvalidEventName(name.to_string()))?;
        let queue_key = self.inner.queue_key(event).await?;
        let removed = self.inner.listeners.borrow_mut().remove(&queue_key);
        match removed {
            Some(registration) => {
                // A call already handed to the handler still completes; nothing after it is
                // picked up.
                registration.worker.active.set(false);
                self.inner.store.remove_change_listener(registration.id);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Whether a listener for `name` is registered in this emitter for the current tab.
    ///
    /// # Errors
    ///
    /// Returns an error for an invalid name or a failed tab lookup.
    pub async fn is_listening(&self, name: &str) -> Result<bool, CorsError> {
        let event =
            EventName::new(name).ok_or_else(|| CorsError::InvalidEventName(name.to_string()))?;
        let queue_key = self.inner.queue_key(event).await?;
        Ok(self.inner.listeners.borrow().contains_key(&queue_key))
    }
}

impl EmitterInner {
    async fn queue_key(&self, event: EventName) -> Result<QueueKey, CorsError> {
        let tab = self.tabs.current_tab().await.map_err(CorsError::Tab)?;
        Ok(QueueKey::new(tab, event))
    }

    async fn dispatch(
        &self,
        event: &EventName,
        id: &CallId,
        args: Vec<Value>,
        completion: &Completion,
    ) -> Result<(), CorsError> {
        let queue_key = self.queue_key(event.clone()).await?.to_string();
        let state_key = CallKey::new(id, CallSlot::State).to_string();

        self.store
            .set_value(&state_key, CallState::Pending.to_value())
            .map_err(CorsError::Store)?;
        self.store
            .set_value(
                &CallKey::new(id, CallSlot::Arguments).to_string(),
                Value::Array(args),
            )
            .map_err(CorsError::Store)?;

        // Holds the subscription until the first notification; emptied to make it one-shot.
        let subscription = Rc::new(Cell::new(None::<ListenerId>));
        let listener = {
            let store = Rc::downgrade(&self.store);
            let subscription = Rc::clone(&subscription);
            let completion = completion.clone();
            let id = id.clone();
            move |change: &ValueChange| {
                let Some(listener_id) = subscription.take() else {
                    return;
                };
                let Some(store) = store.upgrade() else {
                    return;
                };
                store.remove_change_listener(listener_id);
                let value = store.get_value(&CallKey::new(&id, CallSlot::Return).to_string());
                completion.resolve(Ok(CallReply {
                    value,
                    remote: change.remote,
                    state: CallState::from_value(change.new_value.as_ref()),
                }));
                discard_record(&*store, &id);
            }
        };
        subscription.set(Some(
            self.store
                .add_change_listener(&state_key, Box::new(listener)),
        ));

        if let Err(err) = queue::append(
            &*self.store,
            &queue_key,
            id,
            self.config.queue_cas_attempts,
        ) {
            if let Some(listener_id) = subscription.take() {
                self.store.remove_change_listener(listener_id);
            }
            discard_record(&*self.store, id);
            return Err(err);
        }
        Ok(())
    }

    async fn listen(
        this: &Rc<Self>,
        event: EventName,
        handler: EventHandler,
    ) -> Result<ListenerId, CorsError> {
        let queue_key = this.queue_key(event).await?;
        if let Some(existing) = this.listeners.borrow().get(&queue_key) {
            return Ok(existing.id);
        }

        let key = queue_key.to_string();
        // Anything queued before this listener existed belongs to a previous page session.
        this.store
            .set_value(&key, Value::String(String::new()))
            .map_err(CorsError::Store)?;

        let worker = Rc::new(QueueWorker {
            emitter: Rc::downgrade(this),
            key: key.clone(),
            handler,
            busy: Cell::new(false),
            active: Cell::new(true),
        });
        let id = this.store.add_change_listener(&key, {
            let worker = Rc::clone(&worker);
            Box::new(move |change: &ValueChange| {
                if change.remote {
                    QueueWorker::wake(&worker);
                }
            })
        });
        this.listeners
            .borrow_mut()
            .insert(queue_key, Registration { id, worker });
        Ok(id)
    }
}

fn discard_record(store: &dyn ValueStore, id: &CallId) {
    for slot in CallSlot::ALL {
        let key = CallKey::new(id, slot).to_string();
        if let Err(err) = store.delete_value(&key) {
            logging::warn!("failed to delete `{key}`: {err}");
        }
    }
}

/// Services one queue key. At most one drain runs per worker at a time.
struct QueueWorker {
    emitter: Weak<EmitterInner>,
    key: String,
    handler: EventHandler,
    busy: Cell<bool>,
    /// Cleared by `off`; the drain loop stops before taking the next id.
    active: Cell<bool>,
}

impl QueueWorker {
    fn wake(this: &Rc<Self>) {
        if !this.active.get() || this.busy.replace(true) {
            return;
        }
        let Some(inner) = this.emitter.upgrade() else {
            this.busy.set(false);
            return;
        };
        let worker = Rc::clone(this);
        inner.runtime.spawn_local(Box::pin(async move {
            worker.drain().await;
            worker.busy.set(false);
        }));
    }

    async fn drain(&self) {
        loop {
            if !self.active.get() {
                return;
            }
            let Some(inner) = self.emitter.upgrade() else {
                return;
            };
            let queue = CallQueue::parse(inner.store.get_value(&self.key).as_ref());
            let Some(id) = queue.next(inner.config.queue_order).cloned() else {
                return;
            };
            if let Err(err) = self.service(&inner, &id).await {
                logging::warn!("cors listener `{}` failed on call {id}: {err}", self.key);
                return;
            }
        }
    }

    async fn service(&self, inner: &EmitterInner, id: &CallId) -> Result<(), CorsError> {
        let attempts = inner.config.queue_cas_attempts;
        let Some(arguments) = inner
            .store
            .get_value(&CallKey::new(id, CallSlot::Arguments).to_string())
        else {
            // Record already swept or completed; only the queue entry is left.
            queue::remove(&*inner.store, &self.key, id, attempts)?;
            return Ok(());
        };
        let args = match arguments {
            Value::Array(items) => items,
            other => vec![other],
        };

        let value = (self.handler)(args).await;
        inner
            .store
            .set_value(&CallKey::new(id, CallSlot::Return).to_string(), value)
            .map_err(CorsError::Store)?;

        inner.runtime.sleep_ms(inner.config.completion_delay_ms).await;

        inner
            .store
            .set_value(
                &CallKey::new(id, CallSlot::State).to_string(),
                CallState::Confirmed.to_value(),
            )
            .map_err(CorsError::Store)?;
        queue::remove(&*inner.store, &self.key, id, attempts)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use futures::executor::LocalPool;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use userscript_host::{FixedTabContext, LocalPoolRuntime, MemoryValueStore, TabId};

    use super::*;

    struct UnavailableTabs;

    impl TabContext for UnavailableTabs {
        fn current_tab<'a>(&'a self) -> HostFuture<'a, Result<TabId, String>> {
            Box::pin(async { Err("GM_getTab unavailable".to_string()) })
        }
    }

    #[test]
    fn failed_tab_lookup_resolves_the_call_with_an_error() {
        let mut pool = LocalPool::new();
        let store = MemoryValueStore::default();
        let emitter = CorsEventEmitter::new(
            Rc::new(store.clone()),
            Rc::new(UnavailableTabs),
            Rc::new(LocalPoolRuntime::new(pool.spawner())),
            EmitterConfig::default(),
        );

        let result = pool.run_until(emitter.emit("ask", vec![json!(1)]));
        assert_eq!(
            result,
            Err(CorsError::Tab("GM_getTab unavailable".to_string()))
        );
        assert_eq!(store.list_keys(), Some(Vec::new()));

        let result = pool.run_until(emitter.on("ask", |_| async { Value::Null }));
        assert_eq!(
            result,
            Err(CorsError::Tab("GM_getTab unavailable".to_string()))
        );
    }

    #[test]
    fn dropping_every_store_handle_resolves_pending_calls_as_dropped() {
        let mut pool = LocalPool::new();
        let store = MemoryValueStore::default();
        let emitter = CorsEventEmitter::new(
            Rc::new(store.clone()),
            Rc::new(FixedTabContext::new("tab")),
            Rc::new(LocalPoolRuntime::new(pool.spawner())),
            EmitterConfig::default(),
        );

        let pending = emitter.emit("ask", Vec::new());
        pool.run_until_stalled();
        assert_eq!(store.listener_count(), 1);

        drop(emitter);
        drop(store);
        assert_eq!(pool.run_until(pending), Err(CorsError::Dropped));
    }

    #[test]
    fn pending_call_exposes_a_well_formed_id() {
        let pool = LocalPool::new();
        let emitter = CorsEventEmitter::new(
            Rc::new(MemoryValueStore::default()),
            Rc::new(FixedTabContext::new("tab")),
            Rc::new(LocalPoolRuntime::new(pool.spawner())),
            EmitterConfig::default(),
        );
        let pending = emitter.emit("ask", Vec::new());
        assert!(CallId::parse(pending.call_id().as_str()).is_some());
        assert_eq!(emitter.config().completion_delay_ms, 100);
    }
}
