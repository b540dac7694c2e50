// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Au-Zone Technologies. All Rights Reserved.

//! Element settings and the schema describing them.
//!
//! Each element publishes a static list of [`PropertySpec`]s. Values are read
//! and written as strings through [`Properties::set`] and
//! [`Properties::get`], which validate against the schema before touching
//! the settings.

use crate::{
    decoder::DEFAULT_MAX_BUFFERED,
    error::{Error, Result},
    format::HwBufferMode,
};
use serde_json::{json, Value};
use std::{fmt, path::PathBuf, str::FromStr};

/// Value domain of a property.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    String,
    UInt { min: u64, max: u64 },
    Choice(&'static [&'static str]),
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PropertySpec {
    pub name: &'static str,
    pub nick: &'static str,
    pub blurb: &'static str,
    pub kind: Kind,
    /// Default in string form; empty for an unset string.
    pub default: &'static str,
}

impl PropertySpec {
    pub fn to_json(&self) -> Value {
        let mut value = json!({
            "name": self.name,
            "nick": self.nick,
            "blurb": self.blurb,
            "default": self.default,
        });
        match self.kind {
            Kind::String => value["type"] = json!("string"),
            Kind::UInt { min, max } => {
                value["type"] = json!("uint");
                value["minimum"] = json!(min);
                value["maximum"] = json!(max);
            }
            Kind::Choice(choices) => {
                value["type"] = json!("enum");
                value["choices"] = json!(choices);
            }
        }
        value
    }

    fn parse(&self, text: &str) -> Result<Parsed> {
        let invalid = || Error::InvalidProperty {
            name: self.name.to_string(),
            value: text.to_string(),
        };
        match self.kind {
            Kind::String => Ok(Parsed::Text(text.to_string())),
            Kind::UInt { min, max } => {
                let value: u64 = text.trim().parse().map_err(|_| invalid())?;
                if value < min || value > max {
                    return Err(invalid());
                }
                Ok(Parsed::UInt(value))
            }
            Kind::Choice(choices) => choices
                .iter()
                .find(|c| **c == text)
                .map(|c| Parsed::Choice(c))
                .ok_or_else(invalid),
        }
    }
}

/// A property value that passed schema validation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parsed {
    Text(String),
    UInt(u64),
    Choice(&'static str),
}

impl Parsed {
    fn uint(self) -> u64 {
        match self {
            Self::UInt(v) => v,
            _ => 0,
        }
    }

    fn text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::Choice(s) => s.to_string(),
            Self::UInt(v) => v.to_string(),
        }
    }
}

/// Settings object driven by a property schema.
pub trait Properties {
    fn schema(&self) -> &'static [PropertySpec];

    /// Stores an already validated value.
    fn store(&mut self, name: &str, value: Parsed);

    /// Current value of a property known to the schema, in string form.
    fn load(&self, name: &str) -> String;

    fn spec(&self, name: &str) -> Result<&'static PropertySpec> {
        self.schema()
            .iter()
            .find(|spec| spec.name == name)
            .ok_or_else(|| Error::UnknownProperty(name.to_string()))
    }

    fn set(&mut self, name: &str, value: &str) -> Result<()> {
        let parsed = self.spec(name)?.parse(value)?;
        self.store(name, parsed);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<String> {
        self.spec(name)?;
        Ok(self.load(name))
    }
}

/// JSON description of an element's properties.
pub fn schema_json(element: &str, schema: &[PropertySpec]) -> Value {
    json!({
        "element": element,
        "properties": schema.iter().map(PropertySpec::to_json).collect::<Vec<_>>(),
    })
}

pub const ENCODER_PROPERTIES: &[PropertySpec] = &[PropertySpec {
    name: "cntl-file",
    nick: "Control file location",
    blurb: "Control file holding the encoder settings",
    kind: Kind::String,
    default: "",
}];

pub const DECODER_PROPERTIES: &[PropertySpec] = &[
    PropertySpec {
        name: "buffer-size",
        nick: "Max buffer size",
        blurb: "Limit of buffered compressed input in kB, 0 for no limit",
        kind: Kind::UInt {
            min: 0,
            max: u32::MAX as u64,
        },
        default: "1000",
    },
    PropertySpec {
        name: "hw-buffer",
        nick: "HW buffer",
        blurb: "Pass hardware buffers downstream: auto, yes or no",
        kind: Kind::Choice(&["auto", "yes", "no"]),
        default: "auto",
    },
];

const COORDINATE: Kind = Kind::UInt {
    min: 0,
    max: u32::MAX as u64,
};

pub const SINK_PROPERTIES: &[PropertySpec] = &[
    PropertySpec {
        name: "width",
        nick: "Width",
        blurb: "Output width, 0 for the source width",
        kind: COORDINATE,
        default: "0",
    },
    PropertySpec {
        name: "height",
        nick: "Height",
        blurb: "Output height, 0 for the source height",
        kind: COORDINATE,
        default: "0",
    },
    PropertySpec {
        name: "x",
        nick: "X",
        blurb: "Horizontal position of the output",
        kind: COORDINATE,
        default: "0",
    },
    PropertySpec {
        name: "y",
        nick: "Y",
        blurb: "Vertical position of the output",
        kind: COORDINATE,
        default: "0",
    },
    PropertySpec {
        name: "zoom",
        nick: "Zoom",
        blurb: "Zoom level: orig, full, double or half",
        kind: Kind::Choice(&["orig", "full", "double", "half"]),
        default: "orig",
    },
];

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct EncoderSettings {
    pub control_file: Option<PathBuf>,
}

impl Properties for EncoderSettings {
    fn schema(&self) -> &'static [PropertySpec] {
        ENCODER_PROPERTIES
    }

    fn store(&mut self, _name: &str, value: Parsed) {
        let path = value.text();
        self.control_file = (!path.is_empty()).then(|| PathBuf::from(path));
    }

    fn load(&self, _name: &str) -> String {
        self.control_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default()
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DecoderSettings {
    /// Limit of buffered input in kB.
    pub buffer_size: u32,
    pub hw_buffer: HwBufferMode,
}

impl Default for DecoderSettings {
    fn default() -> Self {
        Self {
            buffer_size: (DEFAULT_MAX_BUFFERED / 1024) as u32,
            hw_buffer: HwBufferMode::default(),
        }
    }
}

impl DecoderSettings {
    /// Buffer limit in bytes.
    pub fn max_buffered(&self) -> usize {
        self.buffer_size as usize * 1024
    }
}

impl Properties for DecoderSettings {
    fn schema(&self) -> &'static [PropertySpec] {
        DECODER_PROPERTIES
    }

    fn store(&mut self, name: &str, value: Parsed) {
        match name {
            "buffer-size" => self.buffer_size = value.uint() as u32,
            "hw-buffer" => {
                if let Ok(mode) = value.text().parse() {
                    self.hw_buffer = mode;
                }
            }
            _ => {}
        }
    }

    fn load(&self, name: &str) -> String {
        match name {
            "buffer-size" => self.buffer_size.to_string(),
            "hw-buffer" => self.hw_buffer.to_string(),
            _ => String::new(),
        }
    }
}

/// Destination size policy of the display sink when no explicit size is
/// set.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
pub enum Zoom {
    /// Source size.
    #[default]
    Orig,
    /// Whole screen.
    Full,
    Double,
    Half,
}

impl fmt::Display for Zoom {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            Self::Orig => "orig",
            Self::Full => "full",
            Self::Double => "double",
            Self::Half => "half",
        })
    }
}

impl FromStr for Zoom {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "orig" => Ok(Self::Orig),
            "full" => Ok(Self::Full),
            "double" => Ok(Self::Double),
            "half" => Ok(Self::Half),
            other => Err(Error::InvalidProperty {
                name: "zoom".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct SinkSettings {
    pub width: u32,
    pub height: u32,
    pub x: u32,
    pub y: u32,
    pub zoom: Zoom,
}

impl Properties for SinkSettings {
    fn schema(&self) -> &'static [PropertySpec] {
        SINK_PROPERTIES
    }

    fn store(&mut self, name: &str, value: Parsed) {
        match name {
            "width" => self.width = value.uint() as u32,
            "height" => self.height = value.uint() as u32,
            "x" => self.x = value.uint() as u32,
            "y" => self.y = value.uint() as u32,
            "zoom" => {
                if let Ok(zoom) = value.text().parse() {
                    self.zoom = zoom;
                }
            }
            _ => {}
        }
    }

    fn load(&self, name: &str) -> String {
        match name {
            "width" => self.width.to_string(),
            "height" => self.height.to_string(),
            "x" => self.x.to_string(),
            "y" => self.y.to_string(),
            "zoom" => self.zoom.to_string(),
            _ => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_schema() {
        let dec = DecoderSettings::default();
        for spec in DECODER_PROPERTIES {
            assert_eq!(dec.get(spec.name).unwrap(), spec.default);
        }
        let sink = SinkSettings::default();
        for spec in SINK_PROPERTIES {
            assert_eq!(sink.get(spec.name).unwrap(), spec.default);
        }
        let enc = EncoderSettings::default();
        assert_eq!(enc.get("cntl-file").unwrap(), "");
    }

    #[test]
    fn set_and_get() {
        let mut dec = DecoderSettings::default();
        dec.set("buffer-size", "0").unwrap();
        dec.set("hw-buffer", "yes").unwrap();
        assert_eq!(dec.max_buffered(), 0);
        assert_eq!(dec.hw_buffer, HwBufferMode::Yes);

        let mut sink = SinkSettings::default();
        sink.set("zoom", "double").unwrap();
        sink.set("x", "16").unwrap();
        assert_eq!(sink.zoom, Zoom::Double);
        assert_eq!(sink.get("x").unwrap(), "16");

        let mut enc = EncoderSettings::default();
        enc.set("cntl-file", "/etc/h264.ctl").unwrap();
        assert_eq!(enc.control_file, Some(PathBuf::from("/etc/h264.ctl")));
    }

    #[test]
    fn rejects_bad_values() {
        let mut dec = DecoderSettings::default();
        assert!(matches!(
            dec.set("hw-buffer", "maybe"),
            Err(Error::InvalidProperty { .. })
        ));
        assert!(dec.set("buffer-size", "-1").is_err());
        assert!(matches!(
            dec.set("bitrate", "1"),
            Err(Error::UnknownProperty(name)) if name == "bitrate"
        ));
        assert_eq!(dec, DecoderSettings::default());
    }

    #[test]
    fn json_schema() {
        let schema = schema_json("sh-video-dec", DECODER_PROPERTIES);
        assert_eq!(schema["element"], "sh-video-dec");
        assert_eq!(schema["properties"][0]["name"], "buffer-size");
        assert_eq!(schema["properties"][0]["type"], "uint");
        assert_eq!(schema["properties"][1]["choices"][2], "no");
    }
}
