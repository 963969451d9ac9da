use crate::gui::{
    screens::{
        ScreenMessage, image_detect::ImageScreen, ip_webcam::IpWebcamScreen, train::TrainScreen,
        webcam::WebcamScreen,
    },
    widgets::Mode,
};

#[derive(Debug, Clone)]
pub enum Message {
    Train(ScreenMessage<TrainScreen>),
    Image(ScreenMessage<ImageScreen>),
    Webcam(ScreenMessage<WebcamScreen>),
    IpWebcam(ScreenMessage<IpWebcamScreen>),
    ChangeMode(Mode),
}
