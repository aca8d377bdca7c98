//! User resolution for Woof commands.
//!
//! Every command that touches a wallet, a walk, or a personal drop needs to
//! know whose it is. The user is resolved through a chain:
//!
//! 1. `--as <user>`: explicit per-command override
//! 2. `WOOF_USER` env var: process/session level
//! 3. `user` in `~/.woof/config.toml`: default for a single-user setup

use std::env;

use crate::config::Config;

/// Environment variable consulted after `--as`.
pub const USER_ENV: &str = "WOOF_USER";

/// Error message shown when no user can be resolved.
pub const USER_REQUIRED: &str = "user required: pass --as <user>, \
    set WOOF_USER, or add `user = \"...\"` to ~/.woof/config.toml";

/// Resolve the acting user from the tiered resolution chain.
///
/// Checks in order: explicit `--as` value, `WOOF_USER`, the config file.
/// Returns [`USER_REQUIRED`] when none of them yield a value.
pub fn resolve_user(explicit: Option<&str>, config: &Config) -> Result<String, String> {
    let from_env = env::var(USER_ENV).ok();
    resolve_from(explicit, from_env.as_deref(), config)
}

fn resolve_from(
    explicit: Option<&str>,
    from_env: Option<&str>,
    config: &Config,
) -> Result<String, String> {
    explicit
        .into_iter()
        .chain(from_env)
        .chain(config.user())
        .find(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| USER_REQUIRED.to_string())
}
