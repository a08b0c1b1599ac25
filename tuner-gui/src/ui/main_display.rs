//! # Main Display Module
//!
//! This module contains the main display components and layout logic
//! for the Soundwise tuner.

use iced::widget::{
    Space, button, checkbox, column, container, horizontal_space, row, text, text_input,
};
use iced::{Alignment, Color, Element, Length, Theme};
use soundwise_core::NoteSample;
use soundwise_core::instrument::{self, StringTarget};

use super::cent_meter::CentMeter;
use crate::Message;

type ButtonStyle = fn(&Theme, button::Status) -> button::Style;

const MESSAGE_GREEN: Color = Color {
    r: 0.29,
    g: 0.87,
    b: 0.5,
    a: 1.0,
};

const WARNING_RED: Color = Color {
    r: 0.94,
    g: 0.27,
    b: 0.27,
    a: 1.0,
};

/// Everything the main view needs, borrowed from the application state.
pub struct TunerView<'a> {
    pub reference_input: &'a str,
    pub reference_error: Option<&'a str>,
    pub reference_hz: f64,
    pub auto_mode: bool,
    pub follow_reference: bool,
    pub instrument_id: &'static str,
    pub strings: &'static [StringTarget],
    pub selected_string: usize,
    pub target_hz: f64,
    pub sample: Option<&'a NoteSample>,
    pub in_tune: bool,
    pub banner: Option<&'a str>,
    pub audio_status: Option<&'a str>,
}

/// Creates the complete main application view
pub fn create_main_view(view: TunerView<'_>) -> Element<'_, Message> {
    let title = text("Instrument Tuner").size(28);

    let mut content = column![
        create_header(&view),
        Space::with_height(10),
        title,
        Space::with_height(10),
        create_instrument_row(view.instrument_id),
        text("Select String").size(18),
        create_string_row(view.strings, view.selected_string),
        Space::with_height(10),
        create_meter_panel(&view),
    ]
    .spacing(10)
    .align_x(Alignment::Center);

    if let Some(banner) = view.banner {
        content = content.push(text(banner).size(20).color(MESSAGE_GREEN));
    }
    if let Some(status) = view.audio_status {
        content = content.push(text(status).size(14).color(WARNING_RED));
    }

    container(content.padding(20).max_width(900))
        .width(Length::Fill)
        .height(Length::Fill)
        .center_x(Length::Fill)
        .into()
}

/// Reference pitch entry and the mode toggles.
fn create_header<'a>(view: &TunerView<'a>) -> Element<'a, Message> {
    let reference = row![
        text("A4 =").size(16),
        text_input("440", view.reference_input)
            .on_input(Message::ReferenceInputChanged)
            .on_submit(Message::ReferenceSubmitted)
            .width(Length::Fixed(90.0)),
        text("Hz").size(16),
        button(text("Set").size(14))
            .padding([4, 10])
            .on_press(Message::ReferenceSubmitted),
    ]
    .spacing(8)
    .align_y(Alignment::Center);

    let mut reference_column = column![reference].spacing(4);
    if let Some(error) = view.reference_error {
        reference_column = reference_column.push(text(error).size(12).color(WARNING_RED));
    }

    row![
        reference_column,
        horizontal_space(),
        checkbox("Auto mode", view.auto_mode).on_toggle(Message::AutoModeToggled),
        Space::with_width(16),
        checkbox("Targets follow A4", view.follow_reference)
            .on_toggle(Message::FollowReferenceToggled),
    ]
    .align_y(Alignment::Center)
    .into()
}

/// One button per instrument in the profile table.
fn create_instrument_row<'a>(selected: &'static str) -> Element<'a, Message> {
    instrument::profiles()
        .iter()
        .fold(row![].spacing(8), |row, profile| {
            let style: ButtonStyle = if profile.id == selected {
                button::primary
            } else {
                button::secondary
            };
            row.push(
                button(text(profile.display_name).size(18))
                    .padding([8, 16])
                    .style(style)
                    .on_press(Message::InstrumentSelected(profile.id)),
            )
        })
        .into()
}

/// One button per string, the selected one highlighted.
fn create_string_row<'a>(strings: &'static [StringTarget], selected: usize) -> Element<'a, Message> {
    strings
        .iter()
        .enumerate()
        .fold(row![].spacing(8), |row, (index, string)| {
            let style: ButtonStyle = if index == selected {
                button::primary
            } else {
                button::secondary
            };
            row.push(
                button(text(string.label).size(18))
                    .padding([8, 16])
                    .style(style)
                    .on_press(Message::StringSelected(index)),
            )
        })
        .into()
}

/// Cent meter, note name and frequency readouts.
fn create_meter_panel<'a>(view: &TunerView<'a>) -> Element<'a, Message> {
    let (note_text, freq_text, cents_text, cents) = match view.sample {
        Some(sample) => (
            sample.label(),
            format!("{:.1} Hz", sample.frequency_hz),
            format!("{:+} cents", sample.cents_offset),
            Some(sample.cents_offset as f32),
        ),
        None => (
            "--".to_string(),
            "-- Hz".to_string(),
            String::new(),
            None,
        ),
    };

    let target_text = format!(
        "Target {:.2} Hz (A4 = {} Hz)",
        view.target_hz, view.reference_hz
    );

    container(
        column![
            CentMeter::new(cents, view.in_tune).view(),
            Space::with_height(10),
            text(note_text).size(56),
            row![text(freq_text).size(22), text(cents_text).size(16)]
                .spacing(12)
                .align_y(Alignment::Center),
            text(target_text).size(14),
        ]
        .spacing(5)
        .align_x(Alignment::Center)
        .padding(15),
    )
    .width(Length::Fill)
    .into()
}
