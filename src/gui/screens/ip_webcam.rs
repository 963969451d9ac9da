use std::convert::Infallible;

use iced::{
    Element, Task,
    widget::{button, column, row, text, text_input},
};

use crate::gui::{
    AppState,
    screens::{
        Screen, ScreenMessage,
        live::{Camera, LiveEvent, LiveView},
    },
    widgets::error_text,
};

#[derive(Default)]
pub struct IpWebcamScreen {
    url: String,
    error: Option<String>,
    live: LiveView,
}

#[derive(Debug, Clone)]
pub enum IpWebcamMessage {
    UrlChanged(String),
    Start,
    Stop,
    Live(LiveEvent),
}

impl Screen for IpWebcamScreen {
    type Message = IpWebcamMessage;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let running = self.live.is_running();
        let url_input = text_input("http://192.168.1.10:8080/video", &self.url).on_input_maybe(
            (!running).then_some(|url| ScreenMessage::ScreenMessage(IpWebcamMessage::UrlChanged(url))),
        );
        let controls = row![
            button("Start IP Webcam").on_press_maybe(
                (!running).then_some(ScreenMessage::ScreenMessage(IpWebcamMessage::Start))
            ),
            button("Stop IP Webcam").on_press_maybe(
                running.then_some(ScreenMessage::ScreenMessage(IpWebcamMessage::Stop))
            ),
        ]
        .spacing(12);

        let mut content = column![
            text("IP Webcam Detection").size(28),
            text("Enter IP Webcam URL"),
            url_input,
            controls,
        ]
        .spacing(16);
        if let Some(error) = &self.error {
            content = content.push(error_text(error));
        }
        content.push(self.live.view()).into()
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            IpWebcamMessage::UrlChanged(url) => {
                self.url = url;
                Task::none()
            }
            IpWebcamMessage::Start => {
                let url = self.url.trim();
                if url.is_empty() {
                    self.error = Some("Please enter IP Webcam URL".to_string());
                    return Task::none();
                }
                self.error = None;
                self.live
                    .start(Camera::Network(url.to_string()), state.config.clone())
                    .map(|event| ScreenMessage::ScreenMessage(IpWebcamMessage::Live(event)))
            }
            IpWebcamMessage::Stop => {
                self.live.stop();
                Task::none()
            }
            IpWebcamMessage::Live(event) => {
                self.live.handle(event);
                Task::none()
            }
        }
    }
}
