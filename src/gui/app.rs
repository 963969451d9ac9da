use iced::{Element, Task};

use super::{
    AppState, Message,
    screens::{Screen, ScreenData, ScreenMessage},
    widgets::{Mode, layout},
};
use crate::config::AppConfig;

pub struct FireSmokeApp {
    state: AppState,
    screen: ScreenData,
}

impl FireSmokeApp {
    pub fn new(config: AppConfig) -> Self {
        let state = AppState::new(config);
        let screen = ScreenData::for_mode(Mode::Train, &state);
        Self { state, screen }
    }

    pub fn update(&mut self, message: Message) -> Task<Message> {
        self.screen
            .update(message, &mut self.state)
            .map(|message| match message {
                ScreenMessage::ScreenMessage(message) => message,
                ScreenMessage::ParentMessage(never) => match never {},
            })
    }

    pub fn view(&self) -> Element<'_, Message> {
        let content = self.screen.view().map(|message| match message {
            ScreenMessage::ScreenMessage(message) => message,
            ScreenMessage::ParentMessage(never) => match never {},
        });
        layout(self.screen.mode(), Message::ChangeMode, content)
    }
}

/// Open the desktop window and block until it is closed
pub fn run(config: AppConfig) -> anyhow::Result<()> {
    iced::application(
        move || FireSmokeApp::new(config.clone()),
        FireSmokeApp::update,
        FireSmokeApp::view,
    )
    .title("Fire and Smoke Detection")
    .run()
    .map_err(|e| anyhow::anyhow!("GUI failed: {}", e))
}
