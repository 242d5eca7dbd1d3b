//! Run-scoped context shared between plugins.
//!
//! [`ContextStore`] is the global namespace every plugin can read and the
//! orchestrator promotes results into. [`PluginContext`] is one plugin's
//! view: frozen options with a private, mutable overlay merged on top.

use std::sync::{Arc, PoisonError, RwLock};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use shipwright_config::merge::{deep_merge, lookup};

use crate::PluginResult;

fn empty_object() -> Value {
    Value::Object(Map::new())
}

/// Shared handle to the global context.
///
/// Clones share the same underlying state; writes are visible to every
/// holder immediately.
#[derive(Debug, Clone)]
pub struct ContextStore {
    inner: Arc<RwLock<Value>>,
}

impl Default for ContextStore {
    fn default() -> Self {
        Self::new(empty_object())
    }
}

impl ContextStore {
    /// Creates a store seeded with `initial`.
    #[must_use]
    pub fn new(initial: Value) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Returns a copy of the value at a dotted path.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<Value> {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        lookup(&guard, path).cloned()
    }

    /// Returns the string at a dotted path.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get(path)
            .and_then(|v| v.as_str().map(String::from))
    }

    /// Returns a copy of the whole context.
    #[must_use]
    pub fn snapshot(&self) -> Value {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Deep-merges `partial` into the context. Last writer wins.
    pub fn merge(&self, partial: Value) {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        deep_merge(&mut guard, partial);
    }
}

/// One plugin's view of the run context.
///
/// Cloning shares the overlay, so a clone observes later `set_context`
/// calls.
#[derive(Debug, Clone)]
pub struct PluginContext {
    namespace: String,
    options: Arc<Value>,
    overlay: Arc<RwLock<Value>>,
    global: ContextStore,
}

impl PluginContext {
    /// Creates a context for `namespace` with frozen `options`.
    #[must_use]
    pub fn new(namespace: impl Into<String>, options: Value, global: ContextStore) -> Self {
        Self {
            namespace: namespace.into(),
            options: Arc::new(options),
            overlay: Arc::new(RwLock::new(empty_object())),
            global,
        }
    }

    /// Returns the plugin namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Returns the frozen options.
    #[must_use]
    pub fn options(&self) -> &Value {
        &self.options
    }

    /// Deserializes the frozen options into a typed structure.
    ///
    /// # Errors
    ///
    /// Returns an error if the options do not match `T`.
    pub fn options_as<T: DeserializeOwned>(&self) -> PluginResult<T> {
        Ok(serde_json::from_value(self.options.as_ref().clone())?)
    }

    /// Returns the global context.
    #[must_use]
    pub fn global(&self) -> &ContextStore {
        &self.global
    }

    /// Returns options merged with the overlay, whole or at a dotted path.
    #[must_use]
    pub fn get_context(&self, path: Option<&str>) -> Option<Value> {
        let mut merged = self.options.as_ref().clone();
        let overlay = self
            .overlay
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        deep_merge(&mut merged, overlay);
        match path {
            None => Some(merged),
            Some(path) => lookup(&merged, path).cloned(),
        }
    }

    /// Returns the string at a dotted path.
    #[must_use]
    pub fn get_str(&self, path: &str) -> Option<String> {
        self.get_context(Some(path))
            .and_then(|v| v.as_str().map(String::from))
    }

    /// Returns the boolean at a dotted path, `false` when absent.
    #[must_use]
    pub fn get_bool(&self, path: &str) -> bool {
        self.get_context(Some(path))
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    /// Deep-merges `partial` into the private overlay.
    pub fn set_context(&self, partial: Value) {
        let mut guard = self.overlay.write().unwrap_or_else(PoisonError::into_inner);
        deep_merge(&mut guard, partial);
    }

    /// Appends a non-fatal warning under the overlay's `warnings` key.
    ///
    /// The orchestrator copies these into the release record.
    pub fn push_warning(&self, message: impl Into<String>) {
        let mut guard = self.overlay.write().unwrap_or_else(PoisonError::into_inner);
        let Some(overlay) = guard.as_object_mut() else {
            return;
        };
        let entry = overlay
            .entry("warnings")
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(warnings) = entry {
            warnings.push(Value::String(message.into()));
        }
    }

    /// Returns the warnings pushed so far.
    #[must_use]
    pub fn warnings(&self) -> Vec<String> {
        self.get_context(Some("warnings"))
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[test]
    fn test_store_merge_and_get() {
        let store = ContextStore::default();
        store.merge(json!({"repo": {"owner": "acme"}}));
        store.merge(json!({"repo": {"project": "rocket"}, "version": "1.1.0"}));

        assert_eq!(store.get_str("repo.owner").as_deref(), Some("acme"));
        assert_eq!(store.get_str("version").as_deref(), Some("1.1.0"));
        assert!(store.get("missing").is_none());
    }

    #[test]
    fn test_store_clones_share_state() {
        let store = ContextStore::default();
        let other = store.clone();
        other.merge(json!({"tagName": "1.1.0"}));
        assert_eq!(store.get_str("tagName").as_deref(), Some("1.1.0"));
    }

    #[test]
    fn test_store_last_writer_wins() {
        let store = ContextStore::new(json!({"version": "1.0.0"}));
        store.merge(json!({"version": "1.1.0"}));
        store.merge(json!({"version": "2.0.0"}));
        assert_eq!(store.snapshot(), json!({"version": "2.0.0"}));
    }

    #[test]
    fn test_get_context_overlays_options() {
        let ctx = PluginContext::new(
            "git",
            json!({"push": true, "tag-name": "${version}"}),
            ContextStore::default(),
        );
        ctx.set_context(json!({"push": false, "isTagged": true}));

        assert_eq!(
            ctx.get_context(None),
            Some(json!({"push": false, "tag-name": "${version}", "isTagged": true}))
        );
        assert!(!ctx.get_bool("push"));
        assert!(ctx.get_bool("isTagged"));
        assert_eq!(ctx.options()["push"], json!(true));
    }

    #[test]
    fn test_set_context_does_not_touch_global() {
        let global = ContextStore::default();
        let ctx = PluginContext::new("npm", json!({}), global.clone());
        ctx.set_context(json!({"isReleased": true}));
        assert!(global.get("isReleased").is_none());
    }

    #[test]
    fn test_clone_shares_overlay() {
        let ctx = PluginContext::new("git", json!({}), ContextStore::default());
        let observer = ctx.clone();
        ctx.set_context(json!({"isCommitted": true}));
        assert!(observer.get_bool("isCommitted"));
    }

    #[test]
    fn test_push_warning_appends() {
        let ctx = PluginContext::new("git", json!({}), ContextStore::default());
        assert!(ctx.warnings().is_empty());

        ctx.push_warning("nothing to commit");
        ctx.push_warning("tag already pushed");
        assert_eq!(ctx.warnings(), ["nothing to commit", "tag already pushed"]);
    }

    #[test]
    fn test_options_as() {
        #[derive(Deserialize)]
        #[serde(rename_all = "kebab-case")]
        struct Options {
            push_repo: String,
        }

        let ctx = PluginContext::new(
            "git",
            json!({"push-repo": "upstream"}),
            ContextStore::default(),
        );
        let options: Options = ctx.options_as().unwrap();
        assert_eq!(options.push_repo, "upstream");
    }
}
