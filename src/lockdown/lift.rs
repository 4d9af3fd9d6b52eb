//! Emergency lift from a physical key press
//!
//! Only built with the `allow-lift` feature. The lift handler is registered in
//! a [`TriggerTable`], a SysRq-style map of single keys to handlers fed by the
//! console input layer. The op is flagged `disable_userspace`, so the same key
//! injected from a software trigger file is ignored.
//!
//! ```text
//! keyboard ──► handle_key('x', Console)   ──► lift: level = none
//! /proc/…  ──► handle_key('x', Userspace) ──► ignored
//! ```

use std::collections::HashMap;

use super::reason::Level;
use super::state::LockdownState;
use crate::metrics;

/// Key bound to the lift.
pub const LOCKDOWN_LIFT_KEY: char = 'x';

/// Who delivered a key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerOrigin {
    /// Physical console: keyboard or serial break.
    Console,
    /// A software trigger such as a write to a trigger file.
    Userspace,
}

/// A handler bound to one key.
pub struct KeyOp {
    pub help_msg: String,
    pub action_msg: &'static str,
    /// Refuse presses whose origin is [`TriggerOrigin::Userspace`].
    pub disable_userspace: bool,
    handler: Box<dyn Fn(char) + Send + Sync>,
}

impl KeyOp {
    pub fn new(
        help_msg: impl Into<String>,
        action_msg: &'static str,
        disable_userspace: bool,
        handler: impl Fn(char) + Send + Sync + 'static,
    ) -> Self {
        Self {
            help_msg: help_msg.into(),
            action_msg,
            disable_userspace,
            handler: Box::new(handler),
        }
    }
}

/// Key-press dispatch table owned by the input layer.
#[derive(Default)]
pub struct TriggerTable {
    ops: HashMap<char, KeyOp>,
}

impl TriggerTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `op` to `key`. Fails if the key is taken.
    pub fn register(&mut self, key: char, op: KeyOp) -> Result<(), KeyOp> {
        if self.ops.contains_key(&key) {
            return Err(op);
        }
        self.ops.insert(key, op);
        Ok(())
    }

    pub fn is_registered(&self, key: char) -> bool {
        self.ops.contains_key(&key)
    }

    pub fn help(&self, key: char) -> Option<&str> {
        self.ops.get(&key).map(|op| op.help_msg.as_str())
    }

    /// Dispatch a key press. Returns whether a handler ran.
    pub fn handle_key(&self, key: char, origin: TriggerOrigin) -> bool {
        let Some(op) = self.ops.get(&key) else {
            return false;
        };
        if op.disable_userspace && origin == TriggerOrigin::Userspace {
            tracing::warn!(target: "lockdown", key = %key, "trigger ignored: disabled from userspace");
            return false;
        }
        tracing::info!(target: "lockdown", key = %key, "{}", op.action_msg);
        (op.handler)(key);
        true
    }
}

/// Register the lift key if there is anything to lift. Returns whether it
/// registered.
pub fn register_lift(state: &'static LockdownState, table: &mut TriggerTable) -> bool {
    if state.level() == Level::None {
        return false;
    }

    let op = KeyOp::new(
        format!("unSB({})", LOCKDOWN_LIFT_KEY),
        "Disabling Secure Boot restrictions",
        true,
        move |_key| lift_lockdown(state),
    );
    match table.register(LOCKDOWN_LIFT_KEY, op) {
        Ok(()) => true,
        Err(_) => {
            tracing::error!(target: "lockdown", key = %LOCKDOWN_LIFT_KEY, "lift key already bound");
            false
        }
    }
}

fn lift_lockdown(state: &LockdownState) {
    if state.level() == Level::None {
        return;
    }
    tracing::warn!(target: "lockdown", "Lifting lockdown");
    let previous = state.lift();
    tracing::debug!(target: "lockdown", previous = %previous, "lockdown lifted");
    metrics::record_lift();
}
