use std::convert::Infallible;
use std::sync::Arc;

use iced::{
    Element, Task,
    widget::{button, column, text},
};
use tracing::error;

use crate::{
    config::AppConfig,
    gui::{
        AppState,
        screens::{Screen, ScreenMessage},
        widgets::error_text,
    },
    pipeline::TrainPipeline,
};

#[derive(Debug, Clone, Default)]
enum Status {
    #[default]
    Idle,
    Running,
    Done(String),
    Failed(String),
}

#[derive(Debug, Clone, Default)]
pub struct TrainScreen {
    status: Status,
}

#[derive(Debug, Clone)]
pub enum TrainMessage {
    Start,
    Finished(Result<String, String>),
}

async fn train(config: Arc<AppConfig>) -> Result<String, String> {
    let joined = tokio::task::spawn_blocking(move || {
        let result = TrainPipeline::new(config)?.run_pipeline()?;
        Ok::<_, anyhow::Error>(result)
    })
    .await;

    match joined {
        Ok(Ok(result)) => {
            let mut message = format!(
                "Training completed. Weights saved to {}",
                result.trained_weights_path.display()
            );
            if let Some(exported) = &result.exported_model_path {
                message.push_str(&format!("; detector model at {}", exported.display()));
            }
            Ok(message)
        }
        Ok(Err(e)) => {
            error!("{:#}", e);
            Err(format!("{:#}", e))
        }
        Err(e) => Err(format!("training task aborted: {}", e)),
    }
}

impl Screen for TrainScreen {
    type Message = TrainMessage;
    type ParentMessage = Infallible;

    fn view(&self) -> Element<'_, ScreenMessage<Self>> {
        let running = matches!(self.status, Status::Running);
        let mut content = column![
            text("Train Model").size(28),
            button("Start Training")
                .on_press_maybe((!running).then_some(ScreenMessage::ScreenMessage(TrainMessage::Start))),
        ]
        .spacing(16);

        content = match &self.status {
            Status::Idle => content,
            Status::Running => content.push(text("Training in progress... This may take a while.")),
            Status::Done(message) => content.push(text(message)),
            Status::Failed(message) => content.push(error_text(message)),
        };
        content.into()
    }

    fn update(
        &mut self,
        message: Self::Message,
        state: &mut AppState,
    ) -> Task<ScreenMessage<Self>> {
        match message {
            TrainMessage::Start => {
                self.status = Status::Running;
                Task::perform(train(state.config.clone()), |result| {
                    ScreenMessage::ScreenMessage(TrainMessage::Finished(result))
                })
            }
            TrainMessage::Finished(result) => {
                self.status = match result {
                    Ok(message) => Status::Done(message),
                    Err(message) => Status::Failed(message),
                };
                Task::none()
            }
        }
    }
}
