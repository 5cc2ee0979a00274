//! Inline style parsing: declaration lists, colors and lengths.

use std::fmt;

/// Ordered list of CSS declarations as found in a `style` attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StyleMap {
    decls: Vec<(String, String)>,
}

impl StyleMap {
    /// Parse `prop: value; prop: value`. Malformed declarations are skipped.
    pub fn parse(s: &str) -> Self {
        let mut map = StyleMap::default();
        for decl in s.split(';') {
            if let Some((k, v)) = decl.split_once(':') {
                let (k, v) = (k.trim(), v.trim());
                if !k.is_empty() && !v.is_empty() {
                    map.set(k, v);
                }
            }
        }
        map
    }

    pub fn get(&self, prop: &str) -> Option<&str> {
        self.decls
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(prop))
            .map(|(_, v)| v.as_str())
    }

    /// Set `prop`, keeping its original position when it already exists.
    pub fn set(&mut self, prop: &str, value: &str) {
        let prop = prop.to_ascii_lowercase();
        match self.decls.iter_mut().find(|(k, _)| *k == prop) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.decls.push((prop, value.to_string())),
        }
    }

    pub fn merge(&mut self, other: &StyleMap) {
        for (k, v) in &other.decls {
            self.set(k, v);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.decls.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn is_empty(&self) -> bool {
        self.decls.is_empty()
    }

    pub fn len(&self) -> usize {
        self.decls.len()
    }
}

impl fmt::Display for StyleMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.decls.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}: {}", k, v)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(0xff, 0xff, 0xff);
    /// Default text color of the editor toolbar.
    pub const INK: Rgb = Rgb(0x11, 0x11, 0x11);

    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Parse `#rgb`, `#rrggbb`, `rgb(r, g, b)`/`rgba(...)` and a few keywords.
pub fn parse_color(value: &str) -> Option<Rgb> {
    let v = value.trim().to_ascii_lowercase();
    if let Some(hex) = v.strip_prefix('#') {
        let digits: Vec<u8> = hex
            .chars()
            .map(|c| c.to_digit(16).map(|d| d as u8))
            .collect::<Option<_>>()?;
        return match digits.as_slice() {
            [r, g, b] => Some(Rgb(r * 17, g * 17, b * 17)),
            [r1, r2, g1, g2, b1, b2] => Some(Rgb(r1 * 16 + r2, g1 * 16 + g2, b1 * 16 + b2)),
            _ => None,
        };
    }
    if let Some(args) = v
        .strip_prefix("rgba(")
        .or_else(|| v.strip_prefix("rgb("))
        .and_then(|s| s.strip_suffix(')'))
    {
        let parts: Vec<u8> = args
            .split(',')
            .take(3)
            .map(|p| p.trim().parse::<f32>().ok().map(|n| n.clamp(0.0, 255.0).round() as u8))
            .collect::<Option<_>>()?;
        return match parts.as_slice() {
            [r, g, b] => Some(Rgb(*r, *g, *b)),
            _ => None,
        };
    }
    match v.as_str() {
        "black" => Some(Rgb(0, 0, 0)),
        "white" => Some(Rgb::WHITE),
        "red" => Some(Rgb(0xff, 0, 0)),
        "green" => Some(Rgb(0, 0x80, 0)),
        "blue" => Some(Rgb(0, 0, 0xff)),
        "gray" | "grey" => Some(Rgb(0x80, 0x80, 0x80)),
        "navy" => Some(Rgb(0, 0, 0x80)),
        "orange" => Some(Rgb(0xff, 0xa5, 0)),
        "purple" => Some(Rgb(0x80, 0, 0x80)),
        "yellow" => Some(Rgb(0xff, 0xff, 0)),
        _ => None,
    }
}

/// Resolve a length to pixels. `em` and `%` are relative to `parent_px`.
pub fn parse_length_px(value: &str, parent_px: f32) -> Option<f32> {
    let v = value.trim().to_ascii_lowercase();
    let (num, factor) = if let Some(n) = v.strip_suffix("px") {
        (n, 1.0)
    } else if let Some(n) = v.strip_suffix("rem") {
        (n, 16.0)
    } else if let Some(n) = v.strip_suffix("em") {
        (n, parent_px)
    } else if let Some(n) = v.strip_suffix("pt") {
        (n, 96.0 / 72.0)
    } else if let Some(n) = v.strip_suffix('%') {
        (n, parent_px / 100.0)
    } else {
        (v.as_str(), 1.0)
    };
    let n: f32 = num.trim().parse().ok()?;
    (n.is_finite() && n >= 0.0).then_some(n * factor)
}
