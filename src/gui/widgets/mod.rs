use iced::{
    Color, Element, Length, Theme, border,
    widget::{column, container, container::Style, image::Handle, radio, row, text},
};
use iced_widget::container::bordered_box;
use image::buffer::ConvertBuffer;
use image::{RgbImage, RgbaImage};

/// Sidebar entries, one per screen
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Train,
    Image,
    Webcam,
    IpWebcam,
}

impl Mode {
    pub const ALL: [Mode; 4] = [Mode::Train, Mode::Image, Mode::Webcam, Mode::IpWebcam];

    pub fn label(self) -> &'static str {
        match self {
            Mode::Train => "Train Model",
            Mode::Image => "Upload Image",
            Mode::Webcam => "Webcam Detection",
            Mode::IpWebcam => "IP Webcam Detection",
        }
    }

    fn style(self, current: Self) -> impl Fn(&Theme) -> Style {
        move |theme: &Theme| {
            let style = bordered_box(theme).border(border::width(2));
            // highlight the active mode
            if self == current {
                let mut rgba = theme.palette().background.into_rgba8();
                rgba[0] /= 2;
                rgba[1] /= 2;
                rgba[2] /= 2;
                style.background(Color::from_rgb8(rgba[0], rgba[1], rgba[2]))
            } else {
                style.background(theme.palette().background)
            }
        }
    }
}

pub fn layout<'a, Message>(
    current: Mode,
    on_select: impl Fn(Mode) -> Message + Copy + 'a,
    main_content: impl Into<Element<'a, Message>>,
) -> Element<'a, Message>
where
    Message: Clone + 'a,
{
    let modes = Mode::ALL.iter().fold(column![].spacing(6), |col, mode| {
        col.push(
            container(radio(mode.label(), *mode, Some(current), on_select))
                .style(mode.style(current))
                .padding(10)
                .width(Length::Fill),
        )
    });

    container(row![
        container(column![text("Fire & Smoke Detection").size(22), modes].spacing(16))
            .padding(16)
            .width(Length::FillPortion(1))
            .height(Length::Fill),
        container(main_content.into())
            .padding(16)
            .width(Length::FillPortion(4)),
    ])
    .center_x(Length::Fill)
    .center_y(Length::Fill)
    .into()
}

/// Upload an RGB frame as an image widget handle
pub fn frame_handle(frame: &RgbImage) -> Handle {
    let rgba: RgbaImage = frame.convert();
    Handle::from_rgba(rgba.width(), rgba.height(), rgba.into_raw())
}

/// Red error line
pub fn error_text<'a, Message: 'a>(message: &'a str) -> Element<'a, Message> {
    text(message).color(Color::from_rgb(0.9, 0.2, 0.2)).into()
}
