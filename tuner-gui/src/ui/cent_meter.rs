//! # Cent Meter Widget
//!
//! A horizontal deviation meter from -50 to +50 cents with a tick every
//! 10 cents. The needle turns green while the session reports the string
//! in tune, otherwise it is colored by how far off the pitch is.

use iced::widget::canvas::{self, Geometry, Path, Stroke};
use iced::widget::container;
use iced::{Color, Element, Point, Rectangle, Renderer, Size, Theme, mouse};

/// Maximum cent deviation range for the meter display.
const METER_RANGE: f32 = 50.0;

/// Tick spacing in cents.
const TICK_STEP: f32 = 10.0;

const IN_TUNE_GREEN: Color = Color {
    r: 0.2,
    g: 0.86,
    b: 0.6,
    a: 1.0,
};

pub struct CentMeter {
    /// Current cent deviation (None if no pitch detected)
    cents: Option<f32>,
    in_tune: bool,
}

impl CentMeter {
    pub fn new(cents: Option<f32>, in_tune: bool) -> Self {
        Self { cents, in_tune }
    }

    pub fn view<'a>(self) -> Element<'a, crate::Message> {
        container(
            canvas::Canvas::new(self)
                .width(iced::Length::Fill)
                .height(iced::Length::Fixed(80.0)),
        )
        .into()
    }

    fn needle_color(&self, cents: f32) -> Color {
        if self.in_tune {
            IN_TUNE_GREEN
        } else if cents.abs() < 5.0 {
            Color::from_rgb(0.8, 0.8, 0.8)
        } else if cents.abs() < 20.0 {
            Color::from_rgb8(0xFF, 0xC3, 0x00)
        } else {
            Color::from_rgb8(0xFF, 0x33, 0x33)
        }
    }
}

impl<Message> canvas::Program<Message> for CentMeter {
    type State = ();

    fn draw(
        &self,
        _state: &Self::State,
        renderer: &Renderer,
        _theme: &Theme,
        bounds: Rectangle,
        _cursor: mouse::Cursor,
    ) -> Vec<Geometry> {
        let mut frame = canvas::Frame::new(renderer, bounds.size());

        let background = Path::rectangle(Point::ORIGIN, bounds.size());
        frame.fill(&background, Color::from_rgb8(0x30, 0x30, 0x38));

        let to_x = |cents: f32| (cents + METER_RANGE) / (2.0 * METER_RANGE) * bounds.width;

        // Scale ticks, long at the ends and the center.
        let ticks = (2.0 * METER_RANGE / TICK_STEP) as i32;
        for i in 0..=ticks {
            let cents = -METER_RANGE + i as f32 * TICK_STEP;
            let length = if i % 5 == 0 { bounds.height * 0.4 } else { bounds.height * 0.2 };
            let tick = Path::line(Point::new(to_x(cents), 0.0), Point::new(to_x(cents), length));
            frame.stroke(
                &tick,
                Stroke::default()
                    .with_width(2.0)
                    .with_color(Color::from_rgb8(0xC0, 0xC0, 0xC0)),
            );
        }

        if let Some(c) = self.cents {
            let clamped = c.clamp(-METER_RANGE, METER_RANGE);
            let needle = Path::rectangle(
                Point::new(to_x(clamped) - 2.0, 0.0),
                Size::new(4.0, bounds.height),
            );
            frame.fill(&needle, self.needle_color(c));
        }

        vec![frame.into_geometry()]
    }
}
