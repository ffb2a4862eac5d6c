use colored::Color;

pub const PRIMARY: Color = Color::TrueColor { r: 94, g: 234, b: 212 };
pub const ACCENT: Color = Color::TrueColor { r: 250, g: 204, b: 21 };
pub const SEPARATOR: Color = Color::TrueColor { r: 100, g: 116, b: 139 };
pub const TEXT_DEFAULT: Color = Color::TrueColor { r: 226, g: 232, b: 240 };
pub const IPV4_ADDR: Color = Color::TrueColor { r: 96, g: 165, b: 250 };
pub const IPV6_ADDR: Color = Color::TrueColor { r: 167, g: 139, b: 250 };
pub const MAC_ADDR: Color = Color::TrueColor { r: 244, g: 114, b: 182 };
pub const LATENCY: Color = Color::TrueColor { r: 134, g: 239, b: 172 };
pub const PORT: Color = Color::TrueColor { r: 251, g: 146, b: 60 };
