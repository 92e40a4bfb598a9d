use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info};

use super::fuzzy::best_match;
use super::{Command, CommandKind};

/// Registry of all commands, keyed by lower-cased name.
///
/// Filled once at startup and read-only afterwards.
#[derive(Default)]
pub struct CommandRegistry {
    commands: HashMap<String, Arc<dyn Command>>,
    /// Keys in first-registration order
    order: Vec<String>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a command. A later registration under the same name replaces the earlier one.
    pub fn register(&mut self, command: Arc<dyn Command>) {
        let key = command.name().to_lowercase();
        info!("Registered command: {} ({})", key, command.description());
        if self.commands.insert(key.clone(), command).is_none() {
            self.order.push(key);
        }
    }

    /// Exact lookup first, then the closest key if it is similar enough.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<dyn Command>> {
        let key = name.to_lowercase();
        if let Some(command) = self.commands.get(&key) {
            return Some(command.clone());
        }

        let (matched, ratio) = best_match(&key, self.order.iter().map(String::as_str))?;
        debug!(query = %key, %matched, ratio, "Fuzzy command match");
        self.commands.get(matched).cloned()
    }

    /// First registered command of the given kind
    pub fn find_by_kind(&self, kind: CommandKind) -> Option<Arc<dyn Command>> {
        self.order
            .iter()
            .filter_map(|key| self.commands.get(key))
            .find(|command| command.kind() == kind)
            .cloned()
    }

    /// All commands, highest priority first, then by name.
    pub fn list(&self) -> Vec<Arc<dyn Command>> {
        let mut commands: Vec<Arc<dyn Command>> = self.commands.values().cloned().collect();
        commands.sort_by(|a, b| {
            b.priority()
                .cmp(&a.priority())
                .then_with(|| a.name().cmp(b.name()))
        });
        commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    #[allow(dead_code)]
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use async_trait::async_trait;

    use super::*;
    use crate::commands::ParsedCommand;

    struct Named {
        name: &'static str,
        reply: &'static str,
        kind: CommandKind,
        priority: i32,
    }

    fn named(name: &'static str, reply: &'static str) -> Arc<dyn Command> {
        Arc::new(Named {
            name,
            reply,
            kind: CommandKind::Help,
            priority: 0,
        })
    }

    #[async_trait]
    impl Command for Named {
        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            self.reply
        }

        fn priority(&self) -> i32 {
            self.priority
        }

        fn kind(&self) -> CommandKind {
            self.kind
        }

        fn can_execute(&self, _parsed: &ParsedCommand) -> bool {
            true
        }

        async fn execute(&self, parsed: &mut ParsedCommand) -> Result<()> {
            parsed.set_response(self.reply);
            Ok(())
        }
    }

    #[test]
    fn exact_and_case_insensitive_lookup() {
        let mut registry = CommandRegistry::new();
        registry.register(named("!foo", "foo"));

        assert_eq!(registry.find_by_name("!foo").unwrap().description(), "foo");
        assert_eq!(registry.find_by_name("!FOO").unwrap().description(), "foo");
    }

    #[test]
    fn fuzzy_lookup_above_threshold_only() {
        let mut registry = CommandRegistry::new();
        registry.register(named("!foo", "foo"));

        // 75% similar
        assert!(registry.find_by_name("!fo").is_some());
        assert!(registry.find_by_name("!bar").is_none());
        assert!(registry.find_by_name("!f").is_none());
    }

    #[test]
    fn last_registration_wins() {
        let mut registry = CommandRegistry::new();
        registry.register(named("!foo", "first"));
        registry.register(named("!Foo", "second"));

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.find_by_name("!foo").unwrap().description(), "second");
    }

    #[test]
    fn find_by_kind_returns_first_registered() {
        let mut registry = CommandRegistry::new();
        registry.register(named("!help", "help"));
        registry.register(Arc::new(Named {
            name: "@polybot",
            reply: "mention",
            kind: CommandKind::Mention,
            priority: 0,
        }));

        assert_eq!(
            registry.find_by_kind(CommandKind::Mention).unwrap().name(),
            "@polybot"
        );
        assert_eq!(registry.find_by_kind(CommandKind::Help).unwrap().name(), "!help");
        assert!(registry.find_by_kind(CommandKind::Reminder).is_none());
    }

    #[test]
    fn list_orders_by_priority_then_name() {
        let mut registry = CommandRegistry::new();
        registry.register(named("!b", "b"));
        registry.register(named("!a", "a"));
        registry.register(Arc::new(Named {
            name: "!z",
            reply: "z",
            kind: CommandKind::Help,
            priority: 10,
        }));

        let names: Vec<String> = registry.list().iter().map(|c| c.name().to_string()).collect();
        assert_eq!(names, vec!["!z", "!a", "!b"]);
        assert!(!registry.is_empty());
    }
}
