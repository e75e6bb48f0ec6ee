//! Hello responder - greets users who say hello
//!
//! Keeps a greeting counter and editable settings in its own namespace and
//! exposes both on a dashboard tab.

use async_trait::async_trait;
use regex_lite::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, Instrument};

use crate::application::errors::BotError;
use crate::domain::entities::TabMetadata;
use crate::domain::traits::{
    listener_fn, route_fn, Method, OutgoingMessage, RouteRequest, RouteResponse,
};
use crate::infrastructure::storage::NamespacedStore;
use crate::plugins::trait_def::{Plugin, PluginContext};

const COUNTER_KEY: &str = "greetings_sent";
const SETTINGS_KEY: &str = "settings";
/// Topic published after every greeting
pub const GREETED_TOPIC: &str = "hello.greeted";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HelloSettings {
    pub greeting_template: String,
    pub broadcast: bool,
}

impl Default for HelloSettings {
    fn default() -> Self {
        Self {
            greeting_template: "Hey there {mention}!".to_string(),
            broadcast: false,
        }
    }
}

impl HelloSettings {
    pub fn render(&self, user: &str) -> String {
        let mention = format!("<@{}>", user);
        self.greeting_template
            .replace("{mention}", &mention)
            .replace("{user}", &mention)
    }

    async fn load(store: &NamespacedStore) -> Self {
        match store.get_as::<HelloSettings>(SETTINGS_KEY).await {
            Ok(Some(settings)) => settings,
            Ok(None) => Self::default(),
            Err(e) => {
                debug!("Ignoring unreadable settings: {}", e);
                Self::default()
            }
        }
    }
}

/// Whole word "hello", any case
fn greeting_pattern() -> Result<Regex, BotError> {
    Regex::new(r"(?i)\bhello\b").map_err(|e| BotError::Internal(e.to_string()))
}

#[derive(Default)]
pub struct HelloPlugin;

impl HelloPlugin {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Plugin for HelloPlugin {
    fn key(&self) -> &str {
        "hello"
    }

    fn name(&self) -> &str {
        "Hello Responder"
    }

    fn description(&self) -> &str {
        "Greets users when they say hello."
    }

    async fn register(&self, ctx: &PluginContext) -> Result<(), BotError> {
        let dashboard = ctx.dashboard();
        let templates = ctx.config().dashboard.template_root.join("hello");
        if templates.is_dir() {
            dashboard.add_template_dir("hello", &templates)?;
        }
        dashboard.register_tab(
            "hello",
            "main",
            TabMetadata::new("Hello Plugin", "hello/tab.html")
                .with_description("Monitor greetings sent by the Hello responder.")
                .with_icon("wave")
                .with_order(10),
        )?;

        let pattern = greeting_pattern()?;
        let plugin_ctx = ctx.clone();
        ctx.transport().on(
            "message",
            listener_fn(move |event: Value| {
                let pattern = pattern.clone();
                let ctx = plugin_ctx.clone();
                let span = ctx.span();
                async move { greet(&ctx, &pattern, event).await }.instrument(span)
            }),
        );
        Ok(())
    }

    async fn register_routes(&self, ctx: &PluginContext) -> Result<(), BotError> {
        let store = ctx.store();
        ctx.routes().add_route(
            Method::Get,
            "/admin/tabs/hello",
            route_fn(move |_req: RouteRequest| {
                let store = store.clone();
                async move {
                    let count: u64 = store.get_as(COUNTER_KEY).await?.unwrap_or(0);
                    let settings = HelloSettings::load(&store).await;
                    Ok(RouteResponse::json(json!({
                        "stats": { "greetings_sent": count },
                        "settings": settings,
                    })))
                }
            }),
        )?;

        let store = ctx.store();
        ctx.routes().add_route(
            Method::Post,
            "/admin/tabs/hello/settings",
            route_fn(move |req: RouteRequest| {
                let store = store.clone();
                async move {
                    let defaults = HelloSettings::default();
                    let greeting_template = req
                        .form
                        .get("greeting_template")
                        .map(|t| t.trim().to_string())
                        .filter(|t| !t.is_empty())
                        .unwrap_or(defaults.greeting_template);
                    let settings = HelloSettings {
                        greeting_template,
                        broadcast: req.form.get("broadcast").map(String::as_str) == Some("on"),
                    };
                    store.set_as(SETTINGS_KEY, &settings).await?;
                    Ok(RouteResponse::redirect("/admin/tabs/hello"))
                }
            }),
        )?;
        Ok(())
    }
}

async fn greet(ctx: &PluginContext, pattern: &Regex, event: Value) -> Result<(), BotError> {
    if event.get("bot_id").is_some() {
        return Ok(());
    }
    let text = event.get("text").and_then(Value::as_str).unwrap_or_default();
    if !pattern.is_match(text) {
        return Ok(());
    }

    let user = event.get("user").and_then(Value::as_str).unwrap_or("someone");
    let channel = event.get("channel").and_then(Value::as_str).unwrap_or_default();
    let store = ctx.store();
    let settings = HelloSettings::load(&store).await;

    let thread_ts = event
        .get("thread_ts")
        .or_else(|| event.get("ts"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let reply = OutgoingMessage::new(channel, settings.render(user))
        .in_thread(thread_ts)
        .with_broadcast(settings.broadcast);
    ctx.transport().send_message(reply).await?;
    debug!("Responded to hello from {}", user);

    let count: u64 = store.get_as(COUNTER_KEY).await?.unwrap_or(0) + 1;
    store.set_as(COUNTER_KEY, &count).await?;

    ctx.events()
        .publish(
            GREETED_TOPIC,
            json!({ "user": user, "channel": channel, "count": count }),
        )
        .await;
    Ok(())
}
