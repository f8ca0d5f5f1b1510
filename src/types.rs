//! Core types for spark-bind.
//!
//! These types flow between the application logic, the runtime registries and
//! the host view tree. `Value` is the closed data model every property and
//! every record is expressed in.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Value
// =============================================================================

/// Dynamic data value bound to views.
///
/// Equality is structural: two values are equal when their contents are,
/// which is what the property cache relies on to skip redundant work. NaN
/// equals NaN so a repeated NaN is not reported as a change.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    #[default]
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Number(a), Value::Number(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::List(a), Value::List(b)) => a == b,
            (Value::Map(a), Value::Map(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Empty map, the payload of events that carry no data.
    pub fn empty_map() -> Self {
        Value::Map(BTreeMap::new())
    }

    /// Build a map from key/value pairs.
    pub fn map<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut BTreeMap<String, Value>> {
        match self {
            Value::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Field lookup on a map. Non-maps have no fields.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.as_map().and_then(|map| map.get(field))
    }

    pub fn get_mut(&mut self, field: &str) -> Option<&mut Value> {
        self.as_map_mut().and_then(|map| map.get_mut(field))
    }

    /// Insert a field, turning the value into a map if it is not one yet.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        if !matches!(self, Value::Map(_)) {
            *self = Value::empty_map();
        }
        if let Value::Map(map) = self {
            map.insert(field.into(), value.into());
        }
    }

    /// Truthiness as the declarative layer sees it.
    ///
    /// `null`, `false`, `0`, `NaN` and `""` are falsy; lists and maps are
    /// truthy even when empty.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::List(_) | Value::Map(_) => true,
        }
    }

    /// Stable identity of a record: `key`, else `id`, else `value`.
    ///
    /// Null fields do not count. Non-map records have no identity.
    pub fn identifier(&self) -> Option<&Value> {
        let map = self.as_map()?;
        ["key", "id", "value"]
            .iter()
            .filter_map(|field| map.get(*field))
            .find(|v| !v.is_null())
    }

    /// Display label of a record: `name`, else `title`, else `text`.
    pub fn display_name(&self) -> Option<&str> {
        let map = self.as_map()?;
        ["name", "title", "text"]
            .iter()
            .filter_map(|field| map.get(*field))
            .find_map(|v| v.as_str())
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<i32> for Value {
    fn from(value: i32) -> Self {
        Value::Number(value as f64)
    }
}

impl From<usize> for Value {
    fn from(value: usize) -> Self {
        Value::Number(value as f64)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Vec<Value>> for Value {
    fn from(value: Vec<Value>) -> Self {
        Value::List(value)
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(value: BTreeMap<String, Value>) -> Self {
        Value::Map(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::List(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => {
                Value::Map(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match serde_json::to_string(self) {
            Ok(json) => f.write_str(&json),
            Err(_) => f.write_str("<unserializable>"),
        }
    }
}

// =============================================================================
// LocalContext
// =============================================================================

/// The `{ state, index }` pair bound to a view subtree.
///
/// List items get their record and position; the mounted root usually gets
/// the global state and index 0. `index` is `-1` when a view has no scope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocalContext {
    pub state: Value,
    pub index: f64,
}

impl LocalContext {
    pub fn new(state: impl Into<Value>, index: f64) -> Self {
        Self {
            state: state.into(),
            index,
        }
    }

    /// Context of a view bound outside any scope.
    pub fn detached() -> Self {
        Self {
            state: Value::Null,
            index: -1.0,
        }
    }
}

impl Default for LocalContext {
    fn default() -> Self {
        Self::detached()
    }
}

// =============================================================================
// Identities
// =============================================================================

/// Declared identity of a view in its layout (e.g. `"title"`, `"items"`).
///
/// Many native instances share one key when a layout is inflated repeatedly
/// (list items). Event registrations are made per key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ViewKey(String);

impl ViewKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ViewKey {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ViewKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ViewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Host-assigned name of one native node. Opaque to the runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NativeId(pub u64);

impl fmt::Display for NativeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "n{}", self.0)
    }
}

/// What kind of native control a node is. Decides which properties apply
/// and which interaction signals it can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ViewKind {
    /// Holds children; the target of list reconciliation.
    Container,
    /// Read-only text.
    Text,
    /// Pressable text.
    Button,
    /// Editable single-line text.
    Input,
    /// Two-state toggle with a label.
    Checkbox,
    /// Drop-down selection over a list of options.
    Select,
    Image,
    #[default]
    Other,
}

impl ViewKind {
    /// Kinds that display a text label.
    pub fn is_text_like(self) -> bool {
        matches!(
            self,
            ViewKind::Text | ViewKind::Button | ViewKind::Input | ViewKind::Checkbox
        )
    }
}

/// Size reported by the host, in device pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Margins applied by the `absolute` property, in device pixels.
/// `None` sides are left unanchored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Margins {
    pub top: Option<i32>,
    pub right: Option<i32>,
    pub bottom: Option<i32>,
    pub left: Option<i32>,
}

/// One entry of a select control.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectOption {
    pub id: Option<Value>,
    pub label: String,
}

// =============================================================================
// Color
// =============================================================================

/// ARGB color with 8-bit channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }

    pub const TRANSPARENT: Self = Self::new(0, 0, 0, 0);
    pub const BLACK: Self = Self::rgb(0, 0, 0);
    pub const WHITE: Self = Self::rgb(255, 255, 255);
    pub const RED: Self = Self::rgb(255, 0, 0);
    pub const GREEN: Self = Self::rgb(0, 255, 0);
    pub const BLUE: Self = Self::rgb(0, 0, 255);
    pub const YELLOW: Self = Self::rgb(255, 255, 0);
    pub const CYAN: Self = Self::rgb(0, 255, 255);
    pub const MAGENTA: Self = Self::rgb(255, 0, 255);
    pub const GRAY: Self = Self::rgb(0x88, 0x88, 0x88);
    pub const LIGHT_GRAY: Self = Self::rgb(0xcc, 0xcc, 0xcc);
    pub const DARK_GRAY: Self = Self::rgb(0x44, 0x44, 0x44);

    /// Parse `#RRGGBB` or `#AARRGGBB`.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.trim().strip_prefix('#')?;

        fn hex_byte(s: &str, i: usize) -> Option<u8> {
            u8::from_str_radix(s.get(i..i + 2)?, 16).ok()
        }

        match hex.len() {
            6 => Some(Self::rgb(
                hex_byte(hex, 0)?,
                hex_byte(hex, 2)?,
                hex_byte(hex, 4)?,
            )),
            8 => Some(Self::new(
                hex_byte(hex, 2)?,
                hex_byte(hex, 4)?,
                hex_byte(hex, 6)?,
                hex_byte(hex, 0)?,
            )),
            _ => None,
        }
    }

    /// Parse a color string: hex forms or a basic color name.
    ///
    /// Returns `None` for anything else; callers treat that as "no change".
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.starts_with('#') {
            return Self::from_hex(input);
        }

        match input.to_lowercase().as_str() {
            "transparent" => Some(Self::TRANSPARENT),
            "black" => Some(Self::BLACK),
            "white" => Some(Self::WHITE),
            "red" => Some(Self::RED),
            "green" => Some(Self::GREEN),
            "blue" => Some(Self::BLUE),
            "yellow" => Some(Self::YELLOW),
            "cyan" | "aqua" => Some(Self::CYAN),
            "magenta" | "fuchsia" => Some(Self::MAGENTA),
            "gray" | "grey" => Some(Self::GRAY),
            "lightgray" | "lightgrey" => Some(Self::LIGHT_GRAY),
            "darkgray" | "darkgrey" => Some(Self::DARK_GRAY),
            _ => None,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
