//! Chain runner: threads one value through every entry of a hook.
//!
//! Entries run one after another in ascending priority order, each awaited
//! before the next starts because each may depend on the previous entry's
//! output. An entry's `data` replaces the current value only when it sets
//! `modified`; `stop` truncates the chain.
//!
//! A failing entry (error, panic or timeout) is logged and treated as
//! `modified: false, stop: false`. No secondary event is emitted.

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use quill_core::result::AppResult;

use super::definitions::HookContext;
use super::registry::HookRegistry;
use crate::guard::guarded;

impl HookRegistry {
    /// Runs the chain registered under `hook` and returns the final value.
    ///
    /// With no entries the initial value is returned unchanged.
    pub async fn run_hook_chain(
        &self,
        hook: impl AsRef<str>,
        initial: Value,
        ctx: &HookContext,
    ) -> Value {
        let hook = hook.as_ref();
        let chain = self.chain(hook).await;
        if chain.is_empty() {
            return initial;
        }

        let mut ctx = ctx.clone();
        ctx.hook = hook.to_string();

        debug!(hook = %hook, entry_count = chain.len(), "Running hook chain");

        let mut current = initial;
        for entry in &chain {
            let step = entry.handler.handle(current.clone(), &ctx);
            match guarded(step, self.handler_timeout).await {
                Ok(result) => {
                    if result.modified {
                        current = result.data;
                    }
                    if result.stop {
                        debug!(
                            hook = %hook,
                            plugin_id = %entry.plugin_id,
                            entry_id = %entry.id,
                            "Hook chain stopped"
                        );
                        break;
                    }
                }
                Err(failure) => {
                    warn!(
                        hook = %hook,
                        plugin_id = %entry.plugin_id,
                        entry_id = %entry.id,
                        error = %failure,
                        "Hook handler failed; continuing with unchanged value"
                    );
                }
            }
        }

        current
    }

    /// Typed convenience over [`run_hook_chain`](Self::run_hook_chain).
    ///
    /// Fails only when the input cannot be serialized or the final value
    /// does not deserialize into `T`.
    pub async fn run_hook_chain_as<T>(
        &self,
        hook: impl AsRef<str>,
        initial: &T,
        ctx: &HookContext,
    ) -> AppResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let value = serde_json::to_value(initial)?;
        let result = self.run_hook_chain(hook, value, ctx).await;
        Ok(serde_json::from_value(result)?)
    }
}
