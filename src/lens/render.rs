//! Overlay renderer
//!
//! Rendering is split in two: [`build_draw_list`] turns the store's state
//! into a plain list of draw commands, and [`paint`] replays that list on an
//! egui painter. Neither step touches the annotation store.

use egui::{Color32, Painter, Pos2, Rounding, TextureId};

use crate::geometry::{Rect, ViewSize};
use crate::lens::{CapturedImage, DisplayedAnnotation};

/// Fill used for every annotation box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HighlightStyle {
    /// RGBA, unmultiplied
    pub fill: [u8; 4],
}

impl Default for HighlightStyle {
    fn default() -> Self {
        // Translucent blue, ARGB 0x600000FF
        Self { fill: [0, 0, 255, 0x60] }
    }
}

/// A single primitive of the overlay, in display space
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    /// Draw the whole captured image stretched into `dest`
    Image { dest: Rect },
    /// Fill `rect` with an RGBA color
    FillRect { rect: Rect, color: [u8; 4] },
}

/// Build the draw sequence for the current state.
///
/// The image fills the whole view with the same stretch that produced the
/// annotation ratios, so boxes line up with the pixels under them.
pub fn build_draw_list(
    image: Option<&CapturedImage>,
    annotations: &[DisplayedAnnotation],
    view: ViewSize,
    style: &HighlightStyle,
) -> Vec<DrawCommand> {
    if image.is_none() {
        return Vec::new();
    }

    let mut commands = Vec::with_capacity(annotations.len() + 1);
    commands.push(DrawCommand::Image { dest: view.as_rect() });
    commands.extend(annotations.iter().map(|annotation| DrawCommand::FillRect {
        rect: annotation.bounding_box,
        color: style.fill,
    }));
    commands
}

/// Replay a draw list, offsetting display coordinates by `origin`
pub fn paint(painter: &Painter, origin: Pos2, commands: &[DrawCommand], texture: Option<TextureId>) {
    for command in commands {
        match command {
            DrawCommand::Image { dest } => {
                let Some(texture) = texture else {
                    continue;
                };
                painter.image(
                    texture,
                    to_egui_rect(origin, *dest),
                    egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                    Color32::WHITE,
                );
            }
            DrawCommand::FillRect { rect, color } => {
                painter.rect_filled(
                    to_egui_rect(origin, *rect),
                    Rounding::ZERO,
                    Color32::from_rgba_unmultiplied(color[0], color[1], color[2], color[3]),
                );
            }
        }
    }
}

fn to_egui_rect(origin: Pos2, rect: Rect) -> egui::Rect {
    egui::Rect::from_min_max(
        origin + egui::vec2(rect.left, rect.top),
        origin + egui::vec2(rect.right, rect.bottom),
    )
}
