use teloxide::utils::command::BotCommands;

#[derive(BotCommands, Clone)]
#[command(
    rename_rule = "lowercase",
    description = "These commands are supported:"
)]
pub enum Command {
    #[command(description = "Start over and show the main menu.")]
    Start,
    #[command(description = "Display this text.")]
    Help,
}
