use rupa_core::hub::Hub;

#[derive(Clone)]
pub struct BotDependencies {
    pub hub: Hub,
}
