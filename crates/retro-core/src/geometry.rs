//! Screen regions and match results

use crate::value::{Value, ValueMap};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Rectangular screen area in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Region {
    pub fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self { x, y, w, h }
    }

    pub fn center(&self) -> (i32, i32) {
        (self.x + self.w / 2, self.y + self.h / 2)
    }

    pub fn contains(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.x + self.w && y >= self.y && y < self.y + self.h
    }

    /// Read a region from a script value: a map with `x`, `y`, `w`, `h`
    /// or a four-element list
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Map(map) => Some(Self {
                x: i32::try_from(map.get("x")?.as_int()?).ok()?,
                y: i32::try_from(map.get("y")?.as_int()?).ok()?,
                w: i32::try_from(map.get("w")?.as_int()?).ok()?,
                h: i32::try_from(map.get("h")?.as_int()?).ok()?,
            }),
            Value::List(items) if items.len() == 4 => {
                let mut coords = [0i32; 4];
                for (slot, item) in coords.iter_mut().zip(items) {
                    *slot = i32::try_from(item.as_int()?).ok()?;
                }
                Some(Self::new(coords[0], coords[1], coords[2], coords[3]))
            }
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        let mut map = ValueMap::new();
        map.insert("x".into(), Value::Int(i64::from(self.x)));
        map.insert("y".into(), Value::Int(i64::from(self.y)));
        map.insert("w".into(), Value::Int(i64::from(self.w)));
        map.insert("h".into(), Value::Int(i64::from(self.h)));
        Value::Map(map)
    }
}

/// A located, confidence-scored detection result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Match {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
    pub confidence: f64,
    pub timestamp: DateTime<Utc>,
}

impl Match {
    /// Create a match stamped with the current time
    pub fn new(x: i32, y: i32, w: i32, h: i32, confidence: f64) -> Self {
        Self {
            x,
            y,
            w,
            h,
            confidence,
            timestamp: Utc::now(),
        }
    }

    pub fn region(&self) -> Region {
        Region::new(self.x, self.y, self.w, self.h)
    }

    pub fn center(&self) -> (i32, i32) {
        self.region().center()
    }

    /// Script-facing map: `x`, `y`, `w`, `h`, `confidence`, `center_x`, `center_y`
    pub fn to_value(&self) -> Value {
        let (cx, cy) = self.center();
        let mut map = ValueMap::new();
        map.insert("x".into(), Value::Int(i64::from(self.x)));
        map.insert("y".into(), Value::Int(i64::from(self.y)));
        map.insert("w".into(), Value::Int(i64::from(self.w)));
        map.insert("h".into(), Value::Int(i64::from(self.h)));
        map.insert("confidence".into(), Value::Float(self.confidence));
        map.insert("center_x".into(), Value::Int(i64::from(cx)));
        map.insert("center_y".into(), Value::Int(i64::from(cy)));
        Value::Map(map)
    }
}
