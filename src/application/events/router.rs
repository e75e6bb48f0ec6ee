//! Event router - in-process publish/subscribe between plugins

use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, trace, warn};

use crate::application::errors::EventError;
use crate::domain::entities::Event;

/// Handle returned by `subscribe`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

/// Subscriber side of the router
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &Event) -> Result<(), EventError>;
}

struct FnHandler<F>(F);

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), EventError>> + Send + 'static,
{
    async fn handle(&self, event: &Event) -> Result<(), EventError> {
        (self.0)(event.clone()).await
    }
}

/// Outcome of one publish call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    pub event_id: String,
    pub delivered: usize,
    pub failed: usize,
}

struct Subscription {
    id: SubscriptionId,
    handler: Arc<dyn EventHandler>,
}

/// Fan-out router for internal events
///
/// Subscribers of a topic run one after another in subscription order. The
/// subscriber list is copied before dispatch, so handlers may publish or
/// (un)subscribe without deadlocking; a nested publish is its own pass.
#[derive(Default)]
pub struct EventRouter {
    subscribers: RwLock<HashMap<String, Vec<Subscription>>>,
    next_id: AtomicU64,
    in_flight: AtomicUsize,
    idle: Notify,
}

/// Counts a running dispatch pass for `drain`
struct InFlight<'a>(&'a EventRouter);

impl<'a> InFlight<'a> {
    fn enter(router: &'a EventRouter) -> Self {
        router.in_flight.fetch_add(1, Ordering::SeqCst);
        Self(router)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.0.in_flight.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.0.idle.notify_waiters();
        }
    }
}

impl EventRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, topic: &str, handler: Arc<dyn EventHandler>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers
            .entry(topic.to_string())
            .or_default()
            .push(Subscription { id, handler });
        debug!("Subscribed {} to '{}'", id, topic);
        id
    }

    /// Subscribe an async closure
    pub fn subscribe_fn<F, Fut>(&self, topic: &str, f: F) -> SubscriptionId
    where
        F: Fn(Event) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), EventError>> + Send + 'static,
    {
        self.subscribe(topic, Arc::new(FnHandler(f)))
    }

    /// Returns false when the subscription was already gone
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let mut removed = false;
        subscribers.retain(|_, subs| {
            let before = subs.len();
            subs.retain(|s| s.id != id);
            removed |= subs.len() != before;
            !subs.is_empty()
        });
        if removed {
            debug!("Unsubscribed {}", id);
        }
        removed
    }

    fn snapshot(&self, topic: &str) -> Vec<(SubscriptionId, Arc<dyn EventHandler>)> {
        let subscribers = self
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        subscribers
            .get(topic)
            .map(|subs| subs.iter().map(|s| (s.id, Arc::clone(&s.handler))).collect())
            .unwrap_or_default()
    }

    /// Deliver `payload` to every current subscriber of `topic`.
    ///
    /// Handler failures are logged and counted, never returned.
    pub async fn publish(&self, topic: &str, payload: Value) -> DispatchReport {
        let event = Event::new(topic, payload);
        let handlers = self.snapshot(topic);
        let mut report = DispatchReport {
            event_id: event.id.clone(),
            delivered: 0,
            failed: 0,
        };

        if handlers.is_empty() {
            trace!("No subscribers for '{}', dropping event {}", topic, event.id);
            return report;
        }

        let _in_flight = InFlight::enter(self);
        for (id, handler) in handlers {
            match handler.handle(&event).await {
                Ok(()) => report.delivered += 1,
                Err(e) => {
                    report.failed += 1;
                    warn!("Handler {} failed on '{}' (event {}): {}", id, topic, event.id, e);
                }
            }
        }

        report
    }

    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.subscribers
            .read()
            .map(|s| s.get(topic).map(Vec::len).unwrap_or(0))
            .unwrap_or(0)
    }

    /// Topics with at least one subscriber, sorted
    pub fn topics(&self) -> Vec<String> {
        let mut topics: Vec<String> = self
            .subscribers
            .read()
            .map(|s| s.keys().cloned().collect())
            .unwrap_or_default();
        topics.sort();
        topics
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait for running dispatch passes. Returns false if `grace` ran out.
    pub async fn drain(&self, grace: Duration) -> bool {
        let wait = async {
            loop {
                let notified = self.idle.notified();
                if self.in_flight() == 0 {
                    return;
                }
                notified.await;
            }
        };
        tokio::time::timeout(grace, wait).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    type Ready = std::future::Ready<Result<(), EventError>>;

    fn recorder(
        log: &Arc<Mutex<Vec<String>>>,
        name: &'static str,
    ) -> impl Fn(Event) -> Ready + Send + Sync + 'static {
        let log = Arc::clone(log);
        move |event: Event| {
            log.lock().unwrap().push(format!("{}:{}", name, event.topic));
            std::future::ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn test_fan_out_in_subscription_order() {
        let router = EventRouter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        for name in ["first", "second", "third"] {
            router.subscribe_fn("greeting", recorder(&log, name));
        }
        router.subscribe_fn("other", recorder(&log, "other"));

        let report = router.publish("greeting", json!({"user": "U1"})).await;

        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 0);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["first:greeting", "second:greeting", "third:greeting"]
        );
    }

    #[tokio::test]
    async fn test_failing_handler_does_not_stop_siblings() {
        let router = EventRouter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        router.subscribe_fn("topic", recorder(&log, "h1"));
        router.subscribe_fn("topic", |event: Event| async move {
            Err(EventError::handler(event.topic, "boom"))
        });
        router.subscribe_fn("topic", recorder(&log, "h3"));
        router.subscribe_fn("topic", recorder(&log, "h4"));

        let report = router.publish("topic", Value::Null).await;

        assert_eq!(report.delivered, 3);
        assert_eq!(report.failed, 1);
        assert_eq!(*log.lock().unwrap(), vec!["h1:topic", "h3:topic", "h4:topic"]);
    }

    #[tokio::test]
    async fn test_nested_publish_is_independent_pass() {
        let router = Arc::new(EventRouter::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_router = Arc::clone(&router);
        let inner_log = Arc::clone(&log);
        router.subscribe_fn("outer", move |_event: Event| {
            let router = Arc::clone(&inner_router);
            let log = Arc::clone(&inner_log);
            async move {
                log.lock().unwrap().push("outer-1 start".to_string());
                router.publish("inner", json!({})).await;
                log.lock().unwrap().push("outer-1 end".to_string());
                Ok(())
            }
        });
        router.subscribe_fn("outer", recorder(&log, "outer-2"));
        router.subscribe_fn("inner", recorder(&log, "inner-1"));
        router.subscribe_fn("inner", recorder(&log, "inner-2"));

        let report = tokio::time::timeout(Duration::from_secs(2), router.publish("outer", json!({})))
            .await
            .expect("nested publish deadlocked");

        assert_eq!(report.delivered, 2);
        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "outer-1 start",
                "inner-1:inner",
                "inner-2:inner",
                "outer-1 end",
                "outer-2:outer"
            ]
        );
    }

    #[tokio::test]
    async fn test_unsubscribe_and_unknown_topic() {
        let router = EventRouter::new();
        let log = Arc::new(Mutex::new(Vec::new()));
        let id = router.subscribe_fn("topic", recorder(&log, "gone"));
        router.subscribe_fn("topic", recorder(&log, "kept"));

        assert!(router.unsubscribe(id));
        assert!(!router.unsubscribe(id));
        assert_eq!(router.subscriber_count("topic"), 1);

        router.publish("topic", Value::Null).await;
        let report = router.publish("nobody-listens", Value::Null).await;

        assert_eq!(report.delivered, 0);
        assert_eq!(*log.lock().unwrap(), vec!["kept:topic"]);
        assert_eq!(router.topics(), vec!["topic"]);
    }

    #[tokio::test]
    async fn test_subscribe_from_handler_does_not_deadlock() {
        let router = Arc::new(EventRouter::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let inner_router = Arc::clone(&router);
        let inner_log = Arc::clone(&log);
        router.subscribe_fn("topic", move |_event: Event| {
            inner_router.subscribe_fn("topic", recorder(&inner_log, "late"));
            std::future::ready(Ok(()))
        });

        router.publish("topic", Value::Null).await;
        assert!(log.lock().unwrap().is_empty());
        assert_eq!(router.subscriber_count("topic"), 2);
    }

    #[tokio::test]
    async fn test_drain_waits_for_in_flight_dispatch() {
        let router = Arc::new(EventRouter::new());
        router.subscribe_fn("slow", |_event: Event| async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        });

        let publisher = Arc::clone(&router);
        let task = tokio::spawn(async move { publisher.publish("slow", Value::Null).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert_eq!(router.in_flight(), 1);
        assert!(router.drain(Duration::from_secs(2)).await);
        assert_eq!(router.in_flight(), 0);
        assert_eq!(task.await.unwrap().delivered, 1);
    }

    #[tokio::test]
    async fn test_drain_gives_up_after_grace() {
        let router = Arc::new(EventRouter::new());
        router.subscribe_fn("stuck", |_event: Event| async {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(())
        });

        let publisher = Arc::clone(&router);
        let task = tokio::spawn(async move { publisher.publish("stuck", Value::Null).await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        assert!(!router.drain(Duration::from_millis(20)).await);
        task.abort();
    }
}
