use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

#[enum_dispatch]
pub trait ActivFunc {
    fn evaluate(&self, x: f32) -> f32;
    /// Derivative expressed through both the weighted input and the already computed output.
    fn derivative(&self, inp: f32, out: f32) -> f32;
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Sigmoid;
impl ActivFunc for Sigmoid {
    fn evaluate(&self, x: f32) -> f32 {
        1. / (1. + (-x).exp())
    }
    fn derivative(&self, _: f32, out: f32) -> f32 {
        out * (1. - out)
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct Identity;
impl ActivFunc for Identity {
    fn evaluate(&self, x: f32) -> f32 {
        x
    }
    fn derivative(&self, _: f32, _: f32) -> f32 {
        1.
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct TanH;
impl ActivFunc for TanH {
    fn evaluate(&self, x: f32) -> f32 {
        x.tanh()
    }
    fn derivative(&self, _inp: f32, out: f32) -> f32 {
        1. - out * out
    }
}

#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub struct ReLU;
impl ActivFunc for ReLU {
    fn evaluate(&self, x: f32) -> f32 {
        f32::max(x, 0.)
    }
    fn derivative(&self, inp: f32, _out: f32) -> f32 {
        if inp > 0. {
            1.
        } else {
            0.
        }
    }
}

/// Serializable choice of activation function stored inside every layer.
#[enum_dispatch(ActivFunc)]
#[derive(Clone, Copy, Serialize, Deserialize, Debug, PartialEq)]
pub enum Activation {
    Sigmoid(Sigmoid),
    Identity(Identity),
    TanH(TanH),
    ReLU(ReLU),
}
