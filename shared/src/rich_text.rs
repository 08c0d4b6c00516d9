//! Markup understood by the game's chat renderer

pub const RED: &str = "<color=#ff0000>";
pub const MAGENTA: &str = "<color=#ff00ff>";

pub fn bold(text: &str) -> String {
    format!("<b>{}</b>", text)
}

pub fn italic(text: &str) -> String {
    format!("<i>{}</i>", text)
}

pub fn size(text: &str, size: i32) -> String {
    format!("<size={}>{}</size>", size, text)
}
