//! Burn module behind the fraud classifier.

use burn::backend::NdArray;
use burn::backend::ndarray::NdArrayDevice;
use burn::module::Param;
use burn::nn::{Initializer, Linear, LinearConfig};
use burn::prelude::*;
use burn::record::{BinBytesRecorder, FullPrecisionSettings, Recorder};
use burn::tensor::activation::sigmoid;
use fraud_structs::FEATURE_COUNT;

/// Backend used for scoring and for (de)serializing trained weights.
pub(crate) type InferenceBackend = NdArray;

pub(crate) fn inference_device() -> NdArrayDevice {
    NdArrayDevice::default()
}

/// Single linear layer followed by a sigmoid: logistic regression over
/// standardised features.
#[derive(Module, Debug)]
pub struct FraudNet<B: Backend> {
    linear: Linear<B>,
}

impl<B: Backend> FraudNet<B> {
    /// Creates a network with all weights at zero.
    pub fn new(device: &B::Device) -> Self {
        let linear = LinearConfig::new(FEATURE_COUNT, 1)
            .with_initializer(Initializer::Zeros)
            .init(device);
        Self { linear }
    }

    /// Rebuilds a network from extracted weights.
    pub(crate) fn from_parameters(weights: &[f32], bias: f32, device: &B::Device) -> Self {
        let mut net = Self::new(device);
        net.linear.weight = Param::from_tensor(
            Tensor::<B, 1>::from_floats(weights, device).reshape([FEATURE_COUNT, 1]),
        );
        net.linear.bias = Some(Param::from_tensor(Tensor::<B, 1>::from_floats(
            [bias],
            device,
        )));
        net
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// * `input` - Tensor of shape [`batch_size`, `FEATURE_COUNT`]
    ///
    /// # Returns
    ///
    /// Tensor of shape [`batch_size`, 1] holding fraud probabilities.
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        sigmoid(self.linear.forward(input))
    }

    /// Weights in feature order and the bias.
    pub(crate) fn parameters(&self) -> Result<(Vec<f32>, f32), String> {
        let weights = self
            .linear
            .weight
            .val()
            .into_data()
            .to_vec::<f32>()
            .map_err(|e| format!("weights: {e:?}"))?;

        let bias = match &self.linear.bias {
            Some(bias) => bias
                .val()
                .into_data()
                .to_vec::<f32>()
                .map_err(|e| format!("bias: {e:?}"))?
                .first()
                .copied()
                .unwrap_or(0.0),
            None => 0.0,
        };

        Ok((weights, bias))
    }
}

impl FraudNet<InferenceBackend> {
    /// Encodes the weights with burn's binary recorder.
    pub(crate) fn to_record_bytes(&self) -> Result<Vec<u8>, String> {
        BinBytesRecorder::<FullPrecisionSettings>::default()
            .record(self.clone().into_record(), ())
            .map_err(|e| format!("{e:?}"))
    }

    /// Decodes weights written by [`FraudNet::to_record_bytes`].
    pub(crate) fn from_record_bytes(bytes: Vec<u8>) -> Result<Self, String> {
        let device = inference_device();
        let record = BinBytesRecorder::<FullPrecisionSettings>::default()
            .load::<FraudNetRecord<InferenceBackend>>(bytes, &device)
            .map_err(|e| format!("{e:?}"))?;
        Ok(Self::new(&device).load_record(record))
    }
}
