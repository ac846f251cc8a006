use anyhow::{anyhow, Result};
use serde::{Deserialize, Serialize};

pub const BALL_CLASS_ID: u32 = 0;
pub const GOALKEEPER_CLASS_ID: u32 = 1;
pub const PLAYER_CLASS_ID: u32 = 2;
pub const REFEREE_CLASS_ID: u32 = 3;

/// Object classes produced by the soccer detection models.
///
/// Class ids are a fixed convention shared with the models and are not
/// configurable per run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum ObjectClass {
    Ball,
    Goalkeeper,
    Player,
    Referee,
}

impl ObjectClass {
    pub fn class_id(self) -> u32 {
        match self {
            ObjectClass::Ball => BALL_CLASS_ID,
            ObjectClass::Goalkeeper => GOALKEEPER_CLASS_ID,
            ObjectClass::Player => PLAYER_CLASS_ID,
            ObjectClass::Referee => REFEREE_CLASS_ID,
        }
    }

    pub fn from_class_id(id: u32) -> Result<Self> {
        match id {
            BALL_CLASS_ID => Ok(ObjectClass::Ball),
            GOALKEEPER_CLASS_ID => Ok(ObjectClass::Goalkeeper),
            PLAYER_CLASS_ID => Ok(ObjectClass::Player),
            REFEREE_CLASS_ID => Ok(ObjectClass::Referee),
            other => Err(anyhow!("unknown class id {}", other)),
        }
    }
}

impl TryFrom<u32> for ObjectClass {
    type Error = anyhow::Error;

    fn try_from(id: u32) -> Result<Self> {
        Self::from_class_id(id)
    }
}

impl From<ObjectClass> for u32 {
    fn from(class: ObjectClass) -> u32 {
        class.class_id()
    }
}

/// A point in frame pixel space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Point) -> f32 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Axis-aligned box in frame pixels (`x1,y1` top-left, `x2,y2` bottom-right).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f32; 4]", into = "[f32; 4]")]
pub struct BoundingBox {
    pub x1: f32,
    pub y1: f32,
    pub x2: f32,
    pub y2: f32,
}

impl BoundingBox {
    pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
        Self { x1, y1, x2, y2 }
    }

    pub fn top_left(&self) -> Point {
        Point::new(self.x1, self.y1)
    }

    pub fn center(&self) -> Point {
        Point::new((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }

    pub fn width(&self) -> f32 {
        (self.x2 - self.x1).max(0.0)
    }

    pub fn height(&self) -> f32 {
        (self.y2 - self.y1).max(0.0)
    }

    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Intersection over union; zero for disjoint or degenerate boxes.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let ix = (self.x2.min(other.x2) - self.x1.max(other.x1)).max(0.0);
        let iy = (self.y2.min(other.y2) - self.y1.max(other.y1)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }
}

impl From<[f32; 4]> for BoundingBox {
    fn from(v: [f32; 4]) -> Self {
        Self::new(v[0], v[1], v[2], v[3])
    }
}

impl From<BoundingBox> for [f32; 4] {
    fn from(b: BoundingBox) -> Self {
        [b.x1, b.y1, b.x2, b.y2]
    }
}

/// One observed object instance in a single frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class_id")]
    pub class: ObjectClass,
    pub bbox: BoundingBox,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tracker_id: Option<u64>,
}

impl Detection {
    pub fn new(class: ObjectClass, bbox: BoundingBox) -> Self {
        Self {
            class,
            bbox,
            confidence: None,
            tracker_id: None,
        }
    }

    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = Some(confidence);
        self
    }
}

/// Keep only detections of `class`, preserving input order.
pub fn filter_class(detections: &[Detection], class: ObjectClass) -> Vec<Detection> {
    detections
        .iter()
        .filter(|d| d.class == class)
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn class_ids_follow_model_convention() {
        assert_eq!(ObjectClass::Ball.class_id(), 0);
        assert_eq!(ObjectClass::Goalkeeper.class_id(), 1);
        assert_eq!(ObjectClass::Player.class_id(), 2);
        assert_eq!(ObjectClass::Referee.class_id(), 3);
        assert!(ObjectClass::from_class_id(4).is_err());
    }

    #[test]
    fn box_geometry() {
        let b = BoundingBox::new(10.0, 20.0, 30.0, 60.0);
        assert_eq!(b.top_left(), Point::new(10.0, 20.0));
        assert_eq!(b.center(), Point::new(20.0, 40.0));
        assert_eq!(b.area(), 800.0);
        assert_eq!(b.iou(&b), 1.0);
        assert_eq!(b.iou(&BoundingBox::new(100.0, 100.0, 110.0, 110.0)), 0.0);
    }

    #[test]
    fn detection_json_uses_class_id_and_array_box() {
        let json = r#"{"class_id":1,"bbox":[0,0,40,80],"confidence":0.7}"#;
        let d: Detection = serde_json::from_str(json).unwrap();
        assert_eq!(d.class, ObjectClass::Goalkeeper);
        assert_eq!(d.bbox.center(), Point::new(20.0, 40.0));
        assert_eq!(d.confidence, Some(0.7));
        assert!(d.tracker_id.is_none());

        assert!(serde_json::from_str::<Detection>(r#"{"class_id":9,"bbox":[0,0,1,1]}"#).is_err());
    }
}
