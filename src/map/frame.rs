use std::collections::HashMap;
use std::sync::Arc;

use crate::linalg::{dtype, Vector2, Vector3};
use crate::residuals::ImuPreintegrator;
use crate::variables::{ImuBias, SE3};

use super::feature::Feature;

/// A single-channel intensity image. Decoding a sensor's raw bytes into
/// this form is a collaborator's concern (§1); the core only stores and
/// indexes into already-decoded pixels.
#[derive(Debug, Clone)]
pub struct Image {
    pub width: usize,
    pub height: usize,
    pub data: Arc<[u8]>,
}

impl Image {
    pub fn new(width: usize, height: usize, data: Arc<[u8]>) -> Self {
        debug_assert_eq!(data.len(), width * height);
        Self { width, height, data }
    }

    pub fn at(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.width + x]
    }
}

/// An optional semantic bounding box carried on a frame for informational
/// use by an external object-detection collaborator (§3); the core never
/// inspects these itself.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub x: dtype,
    pub y: dtype,
    pub w: dtype,
    pub h: dtype,
    pub label: u32,
}

/// One stereo frame: its estimated pose/velocity/bias, the two image
/// buffers the frontend tracks against, the features currently attached
/// to it, and (if the keyframe this frame follows has an IMU gap to it)
/// an accumulated preintegration. Owned by [`super::Map`] once promoted
/// to a keyframe; features are owned inline here, their back-references
/// to landmarks resolved as plain `u64` ids (§9's arena-plus-index
/// design — non-owning references are indices, not pointers).
#[derive(Debug, Clone)]
pub struct Frame {
    pub id: u64,
    pub time: dtype,
    pub pose: SE3,
    /// Valid only once the inertial initializer has succeeded and this
    /// frame has a preintegration behind it.
    pub velocity: Vector3,
    pub imu_bias: ImuBias,

    pub image_left: Option<Image>,
    pub image_right: Option<Image>,

    /// landmark id -> Feature, left image.
    pub features_left: HashMap<u64, Feature>,
    /// landmark id -> Feature, right image.
    pub features_right: HashMap<u64, Feature>,

    pub preintegration: Option<ImuPreintegrator>,
    /// Non-owning back-reference to the immediately preceding keyframe.
    pub last_keyframe: Option<u64>,
    /// Whether this frame participates in IMU residuals.
    pub b_imu: bool,

    pub objects: Option<Vec<BoundingBox>>,
}

impl Frame {
    pub fn new(id: u64, time: dtype, pose: SE3) -> Self {
        Self {
            id,
            time,
            pose,
            velocity: Vector3::zeros(),
            imu_bias: ImuBias::zeros(),
            image_left: None,
            image_right: None,
            features_left: HashMap::new(),
            features_right: HashMap::new(),
            preintegration: None,
            last_keyframe: None,
            b_imu: false,
            objects: None,
        }
    }

    pub fn with_images(mut self, left: Image, right: Image) -> Self {
        self.image_left = Some(left);
        self.image_right = Some(right);
        self
    }

    /// Drops the frame's image buffers; called by the frontend once a
    /// non-keyframe frame has finished tracking so the strong reference
    /// doesn't outlive its use (§3: "frontend drops after tracking
    /// unless promoted to keyframe").
    pub fn drop_images(&mut self) {
        self.image_left = None;
        self.image_right = None;
    }

    pub fn attach_feature_left(&mut self, landmark: u64, keypoint: Vector2) {
        self.features_left.insert(
            landmark,
            Feature {
                frame: self.id,
                landmark,
                keypoint,
                is_on_left_image: true,
            },
        );
    }

    pub fn attach_feature_right(&mut self, landmark: u64, keypoint: Vector2) {
        self.features_right.insert(
            landmark,
            Feature {
                frame: self.id,
                landmark,
                keypoint,
                is_on_left_image: false,
            },
        );
    }

    pub fn detach_feature(&mut self, landmark: u64) {
        self.features_left.remove(&landmark);
        self.features_right.remove(&landmark);
    }

    pub fn feature_count(&self) -> usize {
        self.features_left.len()
    }
}
