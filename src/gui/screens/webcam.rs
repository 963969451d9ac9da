use std::convert::Infallible;

use iced::{
    Element, Task,
    widget::{button, column, row, text},
};

use crate::gui::{
    AppState,
    screens::{
        Screen, ScreenMessage,
        live::{Camera, LiveEvent, LiveView},
    },
};

pub struct WebcamScreen {
    index: i32,
    live: LiveView,
}

#[derive(Debug, Clone)]
pub enum WebcamMessage {
    Start,
    Stop,
    Live(LiveEvent),
}

impl WebcamScreen {
    pub fn new(state: &AppState) -> Self {
        Self {
            index: state.config.stream.webcam_index,
            live: LiveView::default(),
        }
    }
}

impl Screen for WebcamScreen {
    type Message = WebcamMessage;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let running = self.live.is_running();
        let controls = row![
            button("Start Webcam")
                .on_press_maybe((!running).then_some(ScreenMessage::ScreenMessage(WebcamMessage::Start))),
            button("Stop Webcam")
                .on_press_maybe(running.then_some(ScreenMessage::ScreenMessage(WebcamMessage::Stop))),
        ]
        .spacing(12);

        column![
            text("Real-time Webcam Detection").size(28),
            text(format!("Camera index {}", self.index)),
            controls,
            self.live.view(),
        ]
        .spacing(16)
        .into()
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            WebcamMessage::Start => self
                .live
                .start(Camera::Local(self.index), state.config.clone())
                .map(|event| ScreenMessage::ScreenMessage(WebcamMessage::Live(event))),
            WebcamMessage::Stop => {
                self.live.stop();
                Task::none()
            }
            WebcamMessage::Live(event) => {
                self.live.handle(event);
                Task::none()
            }
        }
    }
}
