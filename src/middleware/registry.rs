//! Command registrations and first-token matching.
//!
//! A [`CommandSpec`] is created once at startup and immutable afterwards;
//! dispatch order among registrations is insertion order. Matching accepts
//! `/name` (plus `!name` when configured) with an optional `@BotUsername`
//! suffix, case-insensitively.

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::BoxFuture;
use teloxide::types::Message;

use crate::bot::dispatcher::{AppState, ThrottledBot};
use crate::permissions::{Access, BotRight};

/// Everything a command handler gets to work with.
pub struct CommandCtx {
    pub bot: ThrottledBot,
    pub msg: Message,
    pub state: AppState,
    pub args: Vec<String>,
}

/// A handler returns `Some(log)` to have the middleware mirror the event
/// into the chat's log channel, or `None` for no further action.
pub type HandlerResult = anyhow::Result<Option<String>>;

type Handler = Arc<dyn Fn(CommandCtx) -> BoxFuture<'static, HandlerResult> + Send + Sync>;

/// One registered command: names, access requirement and dispatch flags.
#[derive(Clone)]
pub struct CommandSpec {
    /// Name plus aliases; the first entry is canonical. Lowercase.
    pub names: &'static [&'static str],

    /// Who may run it.
    pub access: Access,

    /// A right the bot itself must hold right now, checked fresh.
    pub bot_requires: Option<BotRight>,

    /// May admins toggle this command off per chat?
    pub disableable: bool,

    /// When disabled, do chat admins still get through?
    pub admin_ok: bool,

    handler: Handler,
}

impl CommandSpec {
    pub fn new<F>(names: &'static [&'static str], access: Access, handler: F) -> Self
    where
        F: Fn(CommandCtx) -> BoxFuture<'static, HandlerResult> + Send + Sync + 'static,
    {
        Self {
            names,
            access,
            bot_requires: None,
            disableable: true,
            admin_ok: false,
            handler: Arc::new(handler),
        }
    }

    #[must_use]
    pub fn bot_requires(mut self, right: BotRight) -> Self {
        self.bot_requires = Some(right);
        self
    }

    #[must_use]
    pub fn not_disableable(mut self) -> Self {
        self.disableable = false;
        self
    }

    #[must_use]
    pub fn admin_ok(mut self) -> Self {
        self.admin_ok = true;
        self
    }

    pub fn name(&self) -> &'static str {
        self.names[0]
    }

    pub fn invoke(&self, ctx: CommandCtx) -> BoxFuture<'static, HandlerResult> {
        (self.handler)(ctx)
    }
}

/// Outcome of matching a message's first token against the registry.
pub enum Lookup<'a> {
    /// A registered command addressed to this bot (or to nobody).
    Matched {
        spec: &'a CommandSpec,
        name: String,
        args: Vec<String>,
    },
    /// A registered command explicitly addressed to a different bot.
    ForeignBot,
    /// Command-shaped but matching no registration; blue-text cleaner input.
    Unknown { token: String },
    /// Not a command at all.
    NotCommand,
}

/// The immutable table of command registrations.
pub struct CommandRegistry {
    specs: Vec<CommandSpec>,
    by_name: HashMap<&'static str, usize>,
    prefixes: Vec<char>,
}

impl CommandRegistry {
    pub fn new(allow_excl: bool) -> Self {
        let prefixes = if allow_excl {
            vec!['/', '!']
        } else {
            vec!['/']
        };
        Self {
            specs: Vec::new(),
            by_name: HashMap::new(),
            prefixes,
        }
    }

    /// Register a command. Names must be unique across registrations.
    pub fn register(&mut self, spec: CommandSpec) {
        let index = self.specs.len();
        for &name in spec.names {
            let prior = self.by_name.insert(name, index);
            debug_assert!(prior.is_none(), "duplicate command name '{}'", name);
        }
        self.specs.push(spec);
    }

    pub fn find(&self, name: &str) -> Option<&CommandSpec> {
        self.by_name.get(name).map(|&i| &self.specs[i])
    }

    pub fn is_known(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Canonical names of commands admins may disable, insertion order.
    pub fn disableable_names(&self) -> Vec<&'static str> {
        self.specs
            .iter()
            .filter(|s| s.disableable)
            .map(|s| s.name())
            .collect()
    }

    pub fn prefixes(&self) -> &[char] {
        &self.prefixes
    }

    /// Match a message text against the registry.
    pub fn lookup(&self, text: &str, bot_username: &str) -> Lookup<'_> {
        let mut tokens = text.split_whitespace();
        let first = match tokens.next() {
            Some(t) => t,
            None => return Lookup::NotCommand,
        };

        let prefix = match first.chars().next() {
            Some(c) if self.prefixes.contains(&c) => c,
            _ => return Lookup::NotCommand,
        };

        let body = &first[prefix.len_utf8()..];
        if body.is_empty() {
            return Lookup::NotCommand;
        }

        let (raw_name, mention) = match body.split_once('@') {
            Some((n, m)) => (n, Some(m)),
            None => (body, None),
        };
        let name = raw_name.to_lowercase();

        let spec = match self.find(&name) {
            Some(spec) => spec,
            None => {
                return Lookup::Unknown {
                    token: name,
                };
            }
        };

        if let Some(mention) = mention {
            if !mention.eq_ignore_ascii_case(bot_username) {
                return Lookup::ForeignBot;
            }
        }

        Lookup::Matched {
            spec,
            name,
            args: tokens.map(String::from).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: CommandCtx) -> BoxFuture<'static, HandlerResult> {
        Box::pin(async { Ok(None) })
    }

    fn registry(allow_excl: bool) -> CommandRegistry {
        let mut reg = CommandRegistry::new(allow_excl);
        reg.register(CommandSpec::new(&["ban"], Access::Public, noop));
        reg.register(CommandSpec::new(&["setflood"], Access::Public, noop));
        reg
    }

    #[test]
    fn test_matches_plain_command() {
        let reg = registry(false);
        match reg.lookup("/ban", "ThisBot") {
            Lookup::Matched { name, args, .. } => {
                assert_eq!(name, "ban");
                assert!(args.is_empty());
            }
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn test_mention_of_this_bot_matches_with_args() {
        let reg = registry(false);
        match reg.lookup("/ban@ThisBot arg1", "ThisBot") {
            Lookup::Matched { args, .. } => assert_eq!(args, vec!["arg1".to_string()]),
            _ => panic!("expected match"),
        }
    }

    #[test]
    fn test_mention_of_other_bot_never_matches() {
        let reg = registry(false);
        assert!(matches!(
            reg.lookup("/ban@OtherBot", "ThisBot"),
            Lookup::ForeignBot
        ));
    }

    #[test]
    fn test_mention_is_case_insensitive() {
        let reg = registry(false);
        assert!(matches!(
            reg.lookup("/BAN@thisbot x", "ThisBot"),
            Lookup::Matched { .. }
        ));
    }

    #[test]
    fn test_unknown_command_is_reported_for_cleanup() {
        let reg = registry(false);
        match reg.lookup("/frobnicate now", "ThisBot") {
            Lookup::Unknown { token } => assert_eq!(token, "frobnicate"),
            _ => panic!("expected unknown"),
        }
    }

    #[test]
    fn test_excl_prefix_only_when_enabled() {
        assert!(matches!(
            registry(false).lookup("!ban", "ThisBot"),
            Lookup::NotCommand
        ));
        assert!(matches!(
            registry(true).lookup("!ban", "ThisBot"),
            Lookup::Matched { .. }
        ));
    }

    #[test]
    fn test_plain_text_is_not_command() {
        let reg = registry(false);
        assert!(matches!(reg.lookup("hello there", "ThisBot"), Lookup::NotCommand));
        assert!(matches!(reg.lookup("/", "ThisBot"), Lookup::NotCommand));
        assert!(matches!(reg.lookup("", "ThisBot"), Lookup::NotCommand));
    }

    #[test]
    fn test_disableable_names_follow_insertion_order() {
        let mut reg = CommandRegistry::new(false);
        reg.register(CommandSpec::new(&["b"], Access::Public, noop));
        reg.register(CommandSpec::new(&["a"], Access::Public, noop).not_disableable());
        reg.register(CommandSpec::new(&["c"], Access::Public, noop));
        assert_eq!(reg.disableable_names(), vec!["b", "c"]);
    }
}
