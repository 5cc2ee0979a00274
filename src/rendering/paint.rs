/// Paint command list produced from a slide layout

use super::layout::{ElementType, LayoutNode};
use crate::css::Rgb;
use crate::fonts::FontFace;

#[derive(Debug, Clone)]
pub enum PaintCommand {
    SolidRect {
        x: i32,
        y: i32,
        width: u32,
        height: u32,
        rgba: (u8, u8, u8, u8),
    },
    Text {
        x: i32,
        y: i32,
        text: String,
        color: Rgb,
        face: FontFace,
    },
}

fn opaque(c: Rgb) -> (u8, u8, u8, u8) {
    (c.0, c.1, c.2, 255)
}

/// Build the display list: a full-canvas fill first, then layout nodes in
/// order so later boxes paint over earlier ones.
pub fn build_display_list(
    nodes: &[LayoutNode],
    width: u32,
    height: u32,
    background: Rgb,
) -> Vec<PaintCommand> {
    let mut cmds = Vec::with_capacity(nodes.len() + 1);
    cmds.push(PaintCommand::SolidRect {
        x: 0,
        y: 0,
        width,
        height,
        rgba: opaque(background),
    });
    for node in nodes {
        let r = node.rect;
        match &node.elem_type {
            ElementType::Background(c) | ElementType::Rule(c) => {
                if r.width > 0 && r.height > 0 {
                    cmds.push(PaintCommand::SolidRect {
                        x: r.x,
                        y: r.y,
                        width: r.width,
                        height: r.height,
                        rgba: opaque(*c),
                    });
                }
            }
            ElementType::Text { text, color, face } => cmds.push(PaintCommand::Text {
                x: r.x,
                y: r.y,
                text: text.clone(),
                color: *color,
                face: *face,
            }),
        }
    }
    cmds
}
