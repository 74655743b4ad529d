//! Text encodings for managed file content

use std::fmt;

/// Supported content encodings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Encoding {
    #[default]
    Utf8,
    Ascii,
    Latin1,
}

impl Encoding {
    /// Parse a case-insensitive encoding name
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_lowercase().as_str() {
            "utf-8" | "utf8" => Some(Self::Utf8),
            "ascii" => Some(Self::Ascii),
            "latin-1" | "iso-8859-1" => Some(Self::Latin1),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
        }
    }

    fn max_char(&self) -> u32 {
        match self {
            Self::Utf8 => u32::from(char::MAX),
            Self::Ascii => 0x7F,
            Self::Latin1 => 0xFF,
        }
    }

    /// Encode text, failing on the first unrepresentable character
    pub fn encode(&self, text: &str) -> Result<Vec<u8>, String> {
        match self {
            Self::Utf8 => Ok(text.as_bytes().to_vec()),
            Self::Ascii | Self::Latin1 => text
                .chars()
                .map(|c| {
                    u8::try_from(u32::from(c))
                        .ok()
                        .filter(|b| u32::from(*b) <= self.max_char())
                        .ok_or_else(|| format!("character {c:?} is not representable"))
                })
                .collect(),
        }
    }

    /// Decode bytes, failing on the first invalid byte
    pub fn decode(&self, bytes: &[u8]) -> Result<String, String> {
        match self {
            Self::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string()),
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(pos) => Err(format!("byte 0x{:02x} at offset {pos} is not ascii", bytes[pos])),
                None => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
            },
            Self::Latin1 => Ok(bytes.iter().map(|b| char::from(*b)).collect()),
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
