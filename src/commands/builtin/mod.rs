pub mod censor;
pub mod help;
pub mod layout;
pub mod mention;
pub mod reminder;
pub mod role;

use std::sync::Arc;

use super::registry::CommandRegistry;
use crate::permissions::RoleStore;
use crate::stores::CensorWordStore;

use self::mention::ReplyGenerator;

/// Collaborators the built-in commands need
pub struct BuiltinDeps {
    pub bot_name: String,
    pub roles: Arc<dyn RoleStore>,
    pub censor_words: Arc<dyn CensorWordStore>,
    pub replies: Arc<dyn ReplyGenerator>,
}

/// Register every built-in command. The help command goes last so its
/// listing covers everything else.
pub fn register_builtin_commands(registry: &mut CommandRegistry, deps: BuiltinDeps) {
    registry.register(Arc::new(censor::AddCensorCommand::new(deps.censor_words.clone())));
    registry.register(Arc::new(censor::RemoveCensorCommand::new(deps.censor_words)));
    registry.register(Arc::new(role::SetRoleCommand::new(deps.roles)));
    registry.register(Arc::new(reminder::ReminderCommand::new()));
    registry.register(Arc::new(layout::LayoutFixCommand));
    registry.register(Arc::new(mention::MentionCommand::new(
        &deps.bot_name,
        deps.replies,
    )));

    let help = help::HelpCommand::from_registry(registry);
    registry.register(Arc::new(help));
}
