use burn::tensor::{backend::Backend, Tensor, TensorData};
use ndarray::Array3;

pub trait ToTensorF<const D: usize>: Clone {
    fn to_tensor<B: Backend>(self, device: &B::Device) -> Tensor<B, D>;
}

impl ToTensorF<1> for Vec<f32> {
    fn to_tensor<B: Backend>(self, device: &B::Device) -> Tensor<B, 1> {
        let n = self.len();

        Tensor::from_data(TensorData::new(self, [n]).convert::<B::FloatElem>(), device)
    }
}

impl ToTensorF<2> for Vec<Vec<f32>> {
    fn to_tensor<B: Backend>(self, device: &B::Device) -> Tensor<B, 2> {
        let n0 = self.len();
        let n1 = self.first().map(|row| row.len()).unwrap_or(0);
        let data: Vec<f32> = self.concat();

        Tensor::from_data(
            TensorData::new(data, [n0, n1]).convert::<B::FloatElem>(),
            device,
        )
    }
}

/// Camera frames keep their H x W x C layout; pixel values are not rescaled.
impl ToTensorF<3> for Array3<u8> {
    fn to_tensor<B: Backend>(self, device: &B::Device) -> Tensor<B, 3> {
        let (h, w, c) = self.dim();
        let data: Vec<f32> = self.iter().map(|&px| px as f32).collect();

        Tensor::from_data(
            TensorData::new(data, [h, w, c]).convert::<B::FloatElem>(),
            device,
        )
    }
}

#[cfg(test)]
mod test {
    use burn::{backend::NdArray, tensor::Tensor};
    use ndarray::Array3;

    use super::ToTensorF;

    #[test]
    fn test_to_tensor_vec_f32() {
        let d: Vec<f32> = vec![1.1, 2.2];
        let t: Tensor<NdArray, 1> = d.to_tensor(&Default::default());

        assert_eq!(t.shape().dims, [2]);
    }

    #[test]
    fn test_to_tensor_vec_vec_f32() {
        let d: Vec<Vec<f32>> = vec![vec![1.1, 2.2], vec![3.3, 4.4], vec![1.0, 0.0]];
        let t: Tensor<NdArray, 2> = d.to_tensor(&Default::default());

        assert_eq!(t.shape().dims, [3, 2]);
    }

    #[test]
    fn test_image_to_tensor_keeps_layout() {
        let mut img = Array3::<u8>::zeros((2, 4, 3));
        img[[1, 2, 0]] = 255;
        let t: Tensor<NdArray, 3> = img.to_tensor(&Default::default());

        assert_eq!(t.shape().dims, [2, 4, 3]);
        assert_eq!(t.sum().into_scalar(), 255.0);
    }
}
