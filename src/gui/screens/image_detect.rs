use std::convert::Infallible;
use std::sync::Arc;

use iced::{
    Element, Length, Task,
    widget::{button, column, image as picture, image::Handle, row, text},
};
use rfd::AsyncFileDialog;

use crate::{
    config::AppConfig,
    detection::{Annotator, YoloSegDetector, detect_image, load_upload},
    gui::{
        AppState,
        screens::{Screen, ScreenMessage},
        widgets::{error_text, frame_handle},
    },
};

#[derive(Debug, Clone)]
pub struct DetectedImage {
    input: Handle,
    output: Handle,
    count: usize,
}

#[derive(Default)]
pub struct ImageScreen {
    file_name: Option<String>,
    busy: bool,
    result: Option<Result<DetectedImage, String>>,
}

#[derive(Debug, Clone)]
pub enum ImageMessage {
    Pick,
    Picked(Option<(String, Vec<u8>)>),
    Detected(Result<DetectedImage, String>),
}

fn run_detection(config: &AppConfig, bytes: &[u8]) -> anyhow::Result<DetectedImage> {
    let input = load_upload(bytes)?;
    let detection = config.detection();
    let annotator = Annotator::from_font_option(detection.label_font.as_deref())?;
    let mut detector = YoloSegDetector::load(detection)?;
    let result = detect_image(&mut detector, &annotator, input)?;
    Ok(DetectedImage {
        input: frame_handle(&result.input),
        output: frame_handle(&result.annotated),
        count: result.detections.len(),
    })
}

async fn detect(config: Arc<AppConfig>, bytes: Vec<u8>) -> Result<DetectedImage, String> {
    match tokio::task::spawn_blocking(move || run_detection(&config, &bytes)).await {
        Ok(result) => result.map_err(|e| format!("{:#}", e)),
        Err(e) => Err(format!("detection task aborted: {}", e)),
    }
}

impl Screen for ImageScreen {
    type Message = ImageMessage;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let mut content = column![
            text("Upload Image").size(28),
            button("Choose an image (jpg, jpeg, png)")
                .on_press_maybe((!self.busy).then_some(ScreenMessage::ScreenMessage(ImageMessage::Pick))),
        ]
        .spacing(16);

        if let Some(name) = &self.file_name {
            content = content.push(text(format!("Selected: {}", name)));
        }
        if self.busy {
            content = content.push(text("Detecting..."));
        }
        match &self.result {
            Some(Ok(detected)) => {
                content = content
                    .push(text(format!("{} objects detected", detected.count)))
                    .push(
                        row![
                            column![text("Uploaded Image"), picture(detected.input.clone())]
                                .spacing(8)
                                .width(Length::FillPortion(1)),
                            column![text("Detected Objects"), picture(detected.output.clone())]
                                .spacing(8)
                                .width(Length::FillPortion(1)),
                        ]
                        .spacing(16),
                    );
            }
            Some(Err(message)) => content = content.push(error_text(message)),
            None => {}
        }
        content.into()
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            ImageMessage::Pick => Task::perform(
                async {
                    let handle = AsyncFileDialog::new()
                        .add_filter("Images", &["jpg", "jpeg", "png"])
                        .pick_file()
                        .await?;
                    Some((handle.file_name(), handle.read().await))
                },
                |picked| ScreenMessage::ScreenMessage(ImageMessage::Picked(picked)),
            ),
            ImageMessage::Picked(None) => Task::none(),
            ImageMessage::Picked(Some((name, bytes))) => {
                self.file_name = Some(name);
                self.busy = true;
                self.result = None;
                Task::perform(detect(state.config.clone(), bytes), |result| {
                    ScreenMessage::ScreenMessage(ImageMessage::Detected(result))
                })
            }
            ImageMessage::Detected(result) => {
                self.busy = false;
                self.result = Some(result);
                Task::none()
            }
        }
    }
}
