pub mod a_funcs;
pub mod cli;
pub mod config;
pub mod data;
pub mod error;
pub mod initializer;
pub mod layers;
pub mod loss;
pub mod models;
pub mod network;
pub mod optimizer;
pub mod storage;
pub mod trainer;

pub use config::{Hyperparameters, OptimizerKind};
pub use error::Error;
