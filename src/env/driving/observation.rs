use burn::tensor::{backend::Backend, Tensor};
use ndarray::Array3;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    common::{
        spaces::{shared_rng, Space},
        to_tensor::ToTensorF,
        utils::fit_to_length,
    },
    error::{ConfigurationError, SensorUnavailable},
};

use super::{
    backend::SensorFrame,
    catalog::{ScenarioDescriptor, Situation},
};

/// Situation code reported when sensors had nothing to give.
pub const UNKNOWN_SITUATION: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservationShapes {
    pub image_height: usize,
    pub image_width: usize,
    pub point_cloud_points: usize,
    pub point_cloud_channels: usize,
    pub num_situations: usize,
}

impl Default for ObservationShapes {
    fn default() -> Self {
        Self {
            image_height: 360,
            image_width: 640,
            point_cloud_points: 500,
            point_cloud_channels: 4,
            num_situations: Situation::ALL.len(),
        }
    }
}

impl ObservationShapes {
    pub fn image_dim(&self) -> (usize, usize, usize) {
        (self.image_height, self.image_width, 3)
    }

    pub fn point_cloud_len(&self) -> usize {
        self.point_cloud_points * self.point_cloud_channels
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.image_height == 0 || self.image_width == 0 {
            return Err(ConfigurationError::InvalidShape(
                "image dimensions must be positive".to_string(),
            ));
        }
        if self.point_cloud_len() == 0 {
            return Err(ConfigurationError::InvalidShape(
                "point cloud length must be positive".to_string(),
            ));
        }
        // every catalog situation code must fit the observation space
        if self.num_situations != Situation::ALL.len() {
            return Err(ConfigurationError::InvalidShape(format!(
                "num_situations must be {}, got {}",
                Situation::ALL.len(),
                self.num_situations
            )));
        }

        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    /// H x W x 3 camera frame.
    pub image: Array3<u8>,
    pub point_cloud: Vec<f32>,
    pub position: [f32; 3],
    pub target_position: [f32; 3],
    pub situation: i32,
}

impl Observation {
    pub fn zeroed(shapes: &ObservationShapes) -> Self {
        Self {
            image: Array3::zeros(shapes.image_dim()),
            point_cloud: vec![0.0; shapes.point_cloud_len()],
            position: [0.0; 3],
            target_position: [0.0; 3],
            situation: UNKNOWN_SITUATION,
        }
    }

    /// Position, target and situation code packed for vector policy heads.
    pub fn state_vector(&self) -> Vec<f32> {
        let mut v = Vec::with_capacity(7);
        v.extend_from_slice(&self.position);
        v.extend_from_slice(&self.target_position);
        v.push(self.situation as f32);
        v
    }

    pub fn image_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 3> {
        self.image.clone().to_tensor(device)
    }

    pub fn point_cloud_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        self.point_cloud.clone().to_tensor(device)
    }

    pub fn state_tensor<B: Backend>(&self, device: &B::Device) -> Tensor<B, 1> {
        self.state_vector().to_tensor(device)
    }
}

/// Builds fixed-shape observations from raw vehicle sensor frames.
#[derive(Debug, Clone)]
pub struct ObservationAssembler {
    shapes: ObservationShapes,
}

impl ObservationAssembler {
    pub fn new(shapes: ObservationShapes) -> Self {
        Self { shapes }
    }

    pub fn shapes(&self) -> &ObservationShapes {
        &self.shapes
    }

    pub fn assemble(
        &self,
        frame: Result<SensorFrame, SensorUnavailable>,
        descriptor: &ScenarioDescriptor,
    ) -> Observation {
        let frame = match frame {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!(error = %e, "using zeroed observation");
                return Observation::zeroed(&self.shapes);
            }
        };

        let image = if frame.image.dim() == self.shapes.image_dim() {
            frame.image
        } else {
            tracing::warn!(
                got = ?frame.image.dim(),
                expected = ?self.shapes.image_dim(),
                "camera frame has the wrong shape, zeroing image"
            );
            Array3::zeros(self.shapes.image_dim())
        };

        Observation {
            image,
            point_cloud: fit_to_length(frame.point_cloud, self.shapes.point_cloud_len()),
            position: frame.position,
            target_position: descriptor.target.geodetic.to_array(),
            situation: descriptor.situation.code(),
        }
    }
}

/// Space of observations with the configured shapes.
#[derive(Debug, Clone)]
pub struct ObservationSpace {
    shapes: ObservationShapes,
}

impl From<ObservationShapes> for ObservationSpace {
    fn from(shapes: ObservationShapes) -> Self {
        Self { shapes }
    }
}

impl Space<Observation> for ObservationSpace {
    fn contains(&self, sample: &Observation) -> bool {
        sample.image.dim() == self.shapes.image_dim()
            && sample.point_cloud.len() == self.shapes.point_cloud_len()
            && (sample.situation == UNKNOWN_SITUATION
                || (0..self.shapes.num_situations as i32).contains(&sample.situation))
    }

    fn sample(&mut self) -> Observation {
        let mut rng = shared_rng();
        let (h, w, c) = self.shapes.image_dim();

        Observation {
            image: Array3::from_shape_fn((h, w, c), |_| rng.gen::<u8>()),
            point_cloud: (0..self.shapes.point_cloud_len())
                .map(|_| rng.gen_range(-100.0..100.0))
                .collect(),
            position: [(); 3].map(|_| rng.gen_range(-1000.0..1000.0)),
            target_position: [(); 3].map(|_| rng.gen_range(-1000.0..1000.0)),
            situation: rng.gen_range(0..self.shapes.num_situations as i32),
        }
    }

    fn shape(&self) -> Observation {
        Observation::zeroed(&self.shapes)
    }
}
