//! Discrete requests from the control surface.

use std::str::FromStr;

use thiserror::Error;

use crate::profile::{ColorPreset, HighlightStyle};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ControlRequest {
    PresetSelected(ColorPreset),
    NextPreset,
    StyleChanged(HighlightStyle),
    ToggleStyle,
    ToleranceChanged { hue: f32, sat: f32, val: f32 },
    CalibrateRequested,
    AdvancedPanelToggled(bool),
    BasicModeRequested,
    AdvancedModeRequested,
}

/// A line the control surface could not turn into a request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ParseRequestError(String);

fn parse_tolerance(word: Option<&str>, name: &str) -> Result<f32, ParseRequestError> {
    let word = word.ok_or_else(|| ParseRequestError(format!("tol: missing {} value", name)))?;
    word.parse::<f32>()
        .map_err(|_| ParseRequestError(format!("tol: '{}' is not a number", word)))
}

impl FromStr for ControlRequest {
    type Err = ParseRequestError;

    /// Parses the line-oriented command form, e.g. `preset blue` or `tol 0.05 0.3 0.4`.
    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let command = words
            .next()
            .ok_or_else(|| ParseRequestError("empty command".into()))?
            .to_ascii_lowercase();

        let request = match command.as_str() {
            "preset" => {
                let name = words
                    .next()
                    .ok_or_else(|| ParseRequestError("preset: missing name".into()))?;
                ControlRequest::PresetSelected(name.parse().map_err(ParseRequestError)?)
            }
            "next" => ControlRequest::NextPreset,
            "style" => {
                let name = words
                    .next()
                    .ok_or_else(|| ParseRequestError("style: expected bw or glow".into()))?;
                ControlRequest::StyleChanged(name.parse().map_err(ParseRequestError)?)
            }
            "toggle-style" => ControlRequest::ToggleStyle,
            "tol" => ControlRequest::ToleranceChanged {
                hue: parse_tolerance(words.next(), "hue")?,
                sat: parse_tolerance(words.next(), "saturation")?,
                val: parse_tolerance(words.next(), "value")?,
            },
            "calibrate" => ControlRequest::CalibrateRequested,
            "panel" => match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("on") | Some("show") => ControlRequest::AdvancedPanelToggled(true),
                Some("off") | Some("hide") => ControlRequest::AdvancedPanelToggled(false),
                _ => return Err(ParseRequestError("panel: expected on or off".into())),
            },
            "basic" => ControlRequest::BasicModeRequested,
            "advanced" => ControlRequest::AdvancedModeRequested,
            other => return Err(ParseRequestError(format!("unknown command '{}'", other))),
        };

        if let Some(extra) = words.next() {
            return Err(ParseRequestError(format!(
                "{}: unexpected argument '{}'",
                command, extra
            )));
        }
        Ok(request)
    }
}
