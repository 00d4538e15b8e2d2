mod common;

use stack_surrogate::{
    a_funcs::{Identity, Sigmoid},
    initializer::{Ones, Xavier},
    layers::{DenseBuilder, MapBuilder},
    models::{CombinedModel, ForwardModel, InverseModel, Model},
    network::{FeedForward, LinearBuilder, Network},
};

use std::fs;

fn raw_parameters<M: Model>(model: &M) -> Vec<Vec<f32>> {
    model.parameters().iter().map(|p| p.raw().to_vec()).collect()
}

#[test]
fn save_and_load() -> anyhow::Result<()> {
    let mut network = LinearBuilder::new(3)
        .layer(DenseBuilder::new(Sigmoid, Xavier::new(), 5, true, true))
        .layer(MapBuilder::new(Identity, Ones))
        .build::<FeedForward>()?;

    let ser = serde_json::to_string(&network)?;
    let mut loaded: FeedForward = serde_json::from_str(&ser)?;

    let input = [1., 2., 3.];
    let correct = network.predict(&input).to_vec();
    let prediction = loaded.predict(&input).to_vec();

    assert_eq!(correct, prediction, "Network structure damaged during saving.");
    Ok(())
}

#[test]
fn models_survive_a_round_trip() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let params = common::params();
    let spectrum: Vec<f32> = (0..params.spectrum_len()).map(|i| i as f32 * 0.1).collect();

    let mut inverse = InverseModel::new(&params);
    inverse.save(dir.path().join("inverse.json"))?;
    let mut loaded = InverseModel::from_file(dir.path().join("inverse.json"))?;
    let expected = inverse.predict(&spectrum);
    let expected = (expected.discrete.to_vec(), expected.continuous.to_vec());
    let actual = loaded.predict(&spectrum);
    assert_eq!(expected, (actual.discrete.to_vec(), actual.continuous.to_vec()));

    let mut forward = ForwardModel::new(&params);
    forward.save(dir.path().join("forward.json"))?;
    let mut loaded = ForwardModel::from_file(dir.path().join("forward.json"))?;
    let labels = [0.5; 18];
    assert_eq!(forward.predict(&labels).to_vec(), loaded.predict(&labels).to_vec());
    Ok(())
}

#[test]
fn exported_inverse_is_value_identical() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let params = common::params();
    let combined = CombinedModel::new(InverseModel::new(&params), ForwardModel::new(&params))?;
    let expected = raw_parameters(combined.inverse());

    assert_eq!(raw_parameters(&combined.extract_inverse()), expected);

    let path = dir.path().join("exported.json");
    combined.into_inverse().save(&path)?;
    let reloaded = InverseModel::from_file(&path)?;
    assert_eq!(raw_parameters(&reloaded), expected);
    Ok(())
}

#[test]
fn truncated_model_file_is_rejected() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("forward.json");
    ForwardModel::new(&common::params()).save(&path)?;

    let mut value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
    value["network"]["weights"]
        .as_array_mut()
        .expect("weights are stored as an array")
        .truncate(3);
    fs::write(&path, value.to_string())?;

    assert!(ForwardModel::from_file(&path).is_err());
    Ok(())
}
