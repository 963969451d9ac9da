pub mod image_detect;
pub mod ip_webcam;
pub mod live;
pub mod train;
pub mod webcam;

use iced::{Element, Task};

use crate::gui::{AppState, Message, widgets::Mode};

pub enum ScreenMessage<S: Screen> {
    ScreenMessage(S::Message),
    ParentMessage(S::ParentMessage),
}

impl<S: Screen> Clone for ScreenMessage<S>
where
    S::Message: Clone,
    S::ParentMessage: Clone,
{
    fn clone(&self) -> Self {
        match self {
            Self::ScreenMessage(m) => Self::ScreenMessage(m.clone()),
            Self::ParentMessage(m) => Self::ParentMessage(m.clone()),
        }
    }
}

impl<S: Screen> std::fmt::Debug for ScreenMessage<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ScreenMessage(m) => f.debug_tuple("ScreenMessage").field(m).finish(),
            Self::ParentMessage(m) => f.debug_tuple("ParentMessage").field(m).finish(),
        }
    }
}

pub trait Screen: Sized {
    type Message: std::fmt::Debug;
    type ParentMessage: std::fmt::Debug;
    fn view(&self) -> Element<'_, ScreenMessage<Self>>;
    fn update(&mut self, message: Self::Message, state: &mut AppState)
    -> Task<ScreenMessage<Self>>;
}

pub enum ScreenData {
    Train(train::TrainScreen),
    Image(image_detect::ImageScreen),
    Webcam(webcam::WebcamScreen),
    IpWebcam(ip_webcam::IpWebcamScreen),
}

impl ScreenData {
    pub fn for_mode(mode: Mode, state: &AppState) -> Self {
        match mode {
            Mode::Train => ScreenData::Train(train::TrainScreen::default()),
            Mode::Image => ScreenData::Image(image_detect::ImageScreen::default()),
            Mode::Webcam => ScreenData::Webcam(webcam::WebcamScreen::new(state)),
            Mode::IpWebcam => ScreenData::IpWebcam(ip_webcam::IpWebcamScreen::default()),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            ScreenData::Train(_) => Mode::Train,
            ScreenData::Image(_) => Mode::Image,
            ScreenData::Webcam(_) => Mode::Webcam,
            ScreenData::IpWebcam(_) => Mode::IpWebcam,
        }
    }
}

fn lift<S: Screen<ParentMessage = std::convert::Infallible> + 'static>(
    task: Task<ScreenMessage<S>>,
    wrap: fn(ScreenMessage<S>) -> Message,
) -> Task<ScreenMessage<ScreenData>>
where
    S::Message: Send,
{
    task.map(wrap).map(ScreenMessage::ScreenMessage)
}

impl Screen for ScreenData {
    type Message = Message;
    type ParentMessage = std::convert::Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        match self {
            ScreenData::Train(screen) => screen.view().map(Message::Train),
            ScreenData::Image(screen) => screen.view().map(Message::Image),
            ScreenData::Webcam(screen) => screen.view().map(Message::Webcam),
            ScreenData::IpWebcam(screen) => screen.view().map(Message::IpWebcam),
        }
        .map(ScreenMessage::ScreenMessage)
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match (self, message) {
            (x, Message::ChangeMode(mode)) => {
                if x.mode() != mode {
                    // dropping the old screen stops any stream it runs
                    *x = ScreenData::for_mode(mode, state);
                }
                Task::none()
            }
            (ScreenData::Train(page), Message::Train(ScreenMessage::ScreenMessage(msg))) => {
                lift(page.update(msg, state), Message::Train)
            }
            (ScreenData::Image(page), Message::Image(ScreenMessage::ScreenMessage(msg))) => {
                lift(page.update(msg, state), Message::Image)
            }
            (ScreenData::Webcam(page), Message::Webcam(ScreenMessage::ScreenMessage(msg))) => {
                lift(page.update(msg, state), Message::Webcam)
            }
            (ScreenData::IpWebcam(page), Message::IpWebcam(ScreenMessage::ScreenMessage(msg))) => {
                lift(page.update(msg, state), Message::IpWebcam)
            }
            // Late results for a screen that is no longer shown
            _ => Task::none(),
        }
    }
}
