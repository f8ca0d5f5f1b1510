//! The closed set of properties an observer can set on a component.

use std::fmt;
use std::str::FromStr;

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PropertyKey {
    Disabled,
    Focus,
    Animation,
    Data,
    Value,
    Visible,
    Text,
    Color,
    Alt,
    Src,
    Opacity,
    Background,
    Absolute,
    Width,
    Height,
}

impl PropertyKey {
    pub const ALL: [PropertyKey; 15] = [
        PropertyKey::Disabled,
        PropertyKey::Focus,
        PropertyKey::Animation,
        PropertyKey::Data,
        PropertyKey::Value,
        PropertyKey::Visible,
        PropertyKey::Text,
        PropertyKey::Color,
        PropertyKey::Alt,
        PropertyKey::Src,
        PropertyKey::Opacity,
        PropertyKey::Background,
        PropertyKey::Absolute,
        PropertyKey::Width,
        PropertyKey::Height,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PropertyKey::Disabled => "disabled",
            PropertyKey::Focus => "focus",
            PropertyKey::Animation => "animation",
            PropertyKey::Data => "data",
            PropertyKey::Value => "value",
            PropertyKey::Visible => "visible",
            PropertyKey::Text => "text",
            PropertyKey::Color => "color",
            PropertyKey::Alt => "alt",
            PropertyKey::Src => "src",
            PropertyKey::Opacity => "opacity",
            PropertyKey::Background => "background",
            PropertyKey::Absolute => "absolute",
            PropertyKey::Width => "width",
            PropertyKey::Height => "height",
        }
    }
}

impl FromStr for PropertyKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| Error::UnknownProperty(s.to_string()))
    }
}

impl fmt::Display for PropertyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_key() {
        for key in PropertyKey::ALL {
            assert_eq!(key.as_str().parse::<PropertyKey>().unwrap(), key);
        }
    }

    #[test]
    fn test_unknown_key() {
        let err = "colour".parse::<PropertyKey>().unwrap_err();
        assert!(matches!(err, Error::UnknownProperty(ref k) if k == "colour"));
        assert_eq!(err.to_string(), "Unknown property 'colour' for Component");
    }

    #[test]
    fn test_keys_are_case_sensitive() {
        assert!("Text".parse::<PropertyKey>().is_err());
    }
}
