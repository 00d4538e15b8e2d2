use ndarray::{Array2, Array3, Axis};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use super::{Batch, Labels};
use crate::config::{CONTINUOUS_OUTPUTS, DISCRETE_OUTPUTS};
use crate::error::{Error, Result};

/// Geometry of one patterned layer of a stack.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LayerParams {
    pub width: f32,
    pub length: f32,
    pub thickness: f32,
    #[serde(rename = "periode")]
    pub period: f32,
}

/// How the two layers are put together.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SpacerParams {
    pub spacer_height: f32,
    pub angle: f32,
}

/// Parameter record of one sample, stored as a `[layer1, layer2, stack]` triple.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct StackParams(pub LayerParams, pub LayerParams, pub SpacerParams);

impl StackParams {
    /// The continuous label row: both layers as width, length, thickness and period, then the
    /// spacer height and the angle.
    pub fn columns(&self) -> [f32; CONTINUOUS_OUTPUTS] {
        let StackParams(l1, l2, stack) = self;
        [
            l1.width,
            l1.length,
            l1.thickness,
            l1.period,
            l2.width,
            l2.length,
            l2.thickness,
            l2.period,
            stack.spacer_height,
            stack.angle,
        ]
    }
}

/// A batch as it is stored, before the parameter records are unpacked.
#[derive(Clone, Debug, PartialEq)]
pub struct RawBatch {
    pub spectra: Array3<f32>,
    pub discrete: Array2<f32>,
    pub params: Vec<StackParams>,
}

impl RawBatch {
    /// Checks that all three parts describe the same samples and unpacks the continuous labels.
    pub fn decode(self, id: &str) -> Result<Batch> {
        let samples = self.spectra.len_of(Axis(0));
        if self.discrete.nrows() != samples || self.params.len() != samples {
            return Err(Error::malformed(
                id,
                format!(
                    "{} spectra, {} discrete labels and {} parameter records",
                    samples,
                    self.discrete.nrows(),
                    self.params.len()
                ),
            ));
        }
        if self.discrete.ncols() != DISCRETE_OUTPUTS {
            return Err(Error::malformed(
                id,
                format!(
                    "discrete labels have {} columns instead of {}",
                    self.discrete.ncols(),
                    DISCRETE_OUTPUTS
                ),
            ));
        }

        let flat = self.params.iter().flat_map(|p| p.columns()).collect();
        let continuous = Array2::from_shape_vec((samples, CONTINUOUS_OUTPUTS), flat)
            .map_err(|e| Error::malformed(id, e))?;

        Ok(Batch {
            spectra: self.spectra,
            labels: Labels {
                discrete: self.discrete,
                continuous,
            },
        })
    }
}

/// Anything batches can be drawn from.
pub trait BatchSource {
    /// Identifiers of every batch currently available.
    fn list(&self) -> Result<Vec<String>>;

    /// Loads and decodes a single batch.
    fn load(&self, id: &str) -> Result<Batch>;

    /// Where the batches come from, for diagnostics.
    fn location(&self) -> &Path;
}

/// Batches stored as JSON files in a directory with `X`, `Y` and `params` subdirectories.
#[derive(Clone, Debug)]
pub struct BatchStore {
    dir: PathBuf,
    model_inputs: Option<usize>,
    batch_size: Option<usize>,
}

const EXTENSION: &str = "json";

impl BatchStore {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        Self {
            dir: dir.into(),
            model_inputs: None,
            batch_size: None,
        }
    }

    /// Rejects batches whose spectra don't have exactly `model_inputs` points.
    pub fn model_inputs(mut self, model_inputs: usize) -> Self {
        self.model_inputs = Some(model_inputs);
        self
    }

    /// Batch size the store was generated with. Batches of another size still load but are
    /// reported.
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = Some(batch_size);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, part: &str, id: &str) -> PathBuf {
        self.dir.join(part).join(format!("{}.{}", id, EXTENSION))
    }

    /// Creates the subdirectories of an empty store.
    pub fn create_dirs(&self) -> Result<()> {
        for part in &["X", "Y", "params"] {
            let path = self.dir.join(part);
            fs::create_dir_all(&path).map_err(|source| Error::Io { path, source })?;
        }
        Ok(())
    }

    /// Reads a batch without decoding the parameter records.
    pub fn load_raw(&self, id: &str) -> Result<RawBatch> {
        let spectra: Vec<Vec<[f32; 2]>> = self.read(id, "X")?;
        let discrete: Vec<Vec<f32>> = self.read(id, "Y")?;
        let params: Vec<StackParams> = self.read(id, "params")?;

        let points = spectra.first().map_or(0, Vec::len);
        if let Some(expected) = self.model_inputs {
            if points != expected {
                return Err(Error::malformed(
                    id,
                    format!("spectra have {} points instead of {}", points, expected),
                ));
            }
        }

        if spectra.iter().any(|s| s.len() != points) {
            return Err(Error::malformed(id, "spectra differ in length"));
        }
        let samples = spectra.len();
        match self.batch_size {
            Some(size) if size != samples => {
                log::warn!("Batch {} has {} samples, expected {}", id, samples, size)
            }
            _ => (),
        }
        let flat: Vec<f32> = spectra.into_iter().flatten().flatten().collect();
        let spectra = Array3::from_shape_vec((samples, points, 2), flat)
            .map_err(|e| Error::malformed(id, e))?;

        let width = discrete.first().map_or(0, Vec::len);
        if discrete.iter().any(|r| r.len() != width) {
            return Err(Error::malformed(id, "discrete label rows differ in length"));
        }
        let rows = discrete.len();
        let flat: Vec<f32> = discrete.into_iter().flatten().collect();
        let discrete =
            Array2::from_shape_vec((rows, width), flat).map_err(|e| Error::malformed(id, e))?;

        Ok(RawBatch {
            spectra,
            discrete,
            params,
        })
    }

    /// Writes a batch in the layout [load](BatchSource::load) reads.
    pub fn write(&self, id: &str, batch: &RawBatch) -> Result<()> {
        let spectra: Vec<Vec<[f32; 2]>> = batch
            .spectra
            .outer_iter()
            .map(|s| s.outer_iter().map(|p| [p[0], p[1]]).collect())
            .collect();
        let discrete: Vec<Vec<f32>> = batch.discrete.outer_iter().map(|r| r.to_vec()).collect();

        self.write_part(id, "X", &spectra)?;
        self.write_part(id, "Y", &discrete)?;
        self.write_part(id, "params", &batch.params)
    }

    fn read<T: DeserializeOwned>(&self, id: &str, part: &str) -> Result<T> {
        let path = self.path(part, id);
        let file = match File::open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(Error::MissingBatch {
                    id: id.to_owned(),
                    path,
                })
            }
            Err(source) => return Err(Error::Io { path, source }),
        };
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| Error::malformed(id, format!("{}: {}", path.display(), e)))
    }

    fn write_part<T: Serialize + ?Sized>(&self, id: &str, part: &str, value: &T) -> Result<()> {
        let path = self.path(part, id);
        let res = File::create(&path).and_then(|file| {
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, value)?;
            writer.flush()
        });
        res.map_err(|source| Error::Io { path, source })
    }
}

impl BatchSource for BatchStore {
    fn list(&self) -> Result<Vec<String>> {
        let path = self.dir.join("X");
        let entries = fs::read_dir(&path).map_err(|source| Error::Io {
            path: path.clone(),
            source,
        })?;

        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| Error::Io {
                path: path.clone(),
                source,
            })?;
            let file = entry.path();
            if file.extension().map_or(true, |e| e != EXTENSION) {
                continue;
            }
            if let Some(stem) = file.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_owned());
            }
        }
        // read_dir order is platform dependent, seeded runs need a stable listing
        ids.sort();
        Ok(ids)
    }

    fn load(&self, id: &str) -> Result<Batch> {
        self.load_raw(id)?.decode(id)
    }

    fn location(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    fn layer(base: f32) -> LayerParams {
        LayerParams {
            width: base,
            length: base + 1.,
            thickness: base + 2.,
            period: base + 3.,
        }
    }

    fn raw_batch(samples: usize, points: usize) -> RawBatch {
        RawBatch {
            spectra: Array3::from_shape_fn((samples, points, 2), |(s, p, c)| {
                (s * 100 + p * 2 + c) as f32
            }),
            discrete: Array2::from_shape_fn((samples, DISCRETE_OUTPUTS), |(s, c)| {
                ((s + c) % 2) as f32
            }),
            params: (0..samples)
                .map(|s| {
                    let s = s as f32 * 10.;
                    StackParams(
                        layer(s),
                        layer(s + 4.),
                        SpacerParams {
                            spacer_height: s + 8.,
                            angle: s + 9.,
                        },
                    )
                })
                .collect(),
        }
    }

    fn store() -> (tempfile::TempDir, BatchStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = BatchStore::new(dir.path());
        store.create_dirs().unwrap();
        (dir, store)
    }

    #[test]
    fn continuous_columns_follow_layer_order() {
        let batch = raw_batch(2, 3).decode("a").unwrap();
        assert_eq!(batch.labels.continuous.dim(), (2, CONTINUOUS_OUTPUTS));
        assert_eq!(batch.labels.continuous_row(0)[0], 0.);
        assert_eq!(batch.labels.continuous_row(0)[9], 9.);
        let expected: Vec<f32> = (10..20).map(|x| x as f32).collect();
        assert_eq!(batch.labels.continuous_row(1), &expected[..]);
    }

    #[test]
    fn params_use_stored_field_names() {
        let json = r#"[
            {"width": 1, "length": 2, "thickness": 3, "periode": 4, "material": "Au"},
            {"width": 5, "length": 6, "thickness": 7, "periode": 8},
            {"spacer_height": 9, "angle": 10}
        ]"#;
        let params: StackParams = serde_json::from_str(json).unwrap();
        assert_eq!(
            params.columns(),
            [1., 2., 3., 4., 5., 6., 7., 8., 9., 10.]
        );
    }

    #[test]
    fn stored_batches_load_unchanged() {
        let (_dir, store) = store();
        let raw = raw_batch(3, 4);
        store.write("b0", &raw).unwrap();

        assert_eq!(store.list().unwrap(), vec!["b0".to_owned()]);
        assert_eq!(store.load_raw("b0").unwrap(), raw);

        let batch = store.load("b0").unwrap();
        assert_eq!(batch.len(), 3);
        assert_eq!(batch.spectra, raw.spectra);
    }

    #[test]
    fn listing_only_counts_batch_files() {
        let (dir, store) = store();
        store.write("b1", &raw_batch(1, 2)).unwrap();
        store.write("b0", &raw_batch(1, 2)).unwrap();
        fs::write(dir.path().join("X").join("notes.txt"), "not a batch").unwrap();

        assert_eq!(store.list().unwrap(), vec!["b0".to_owned(), "b1".to_owned()]);
    }

    #[test]
    fn missing_label_file_is_reported() {
        let (dir, store) = store();
        store.write("b0", &raw_batch(2, 2)).unwrap();
        fs::remove_file(dir.path().join("Y").join("b0.json")).unwrap();

        match store.load("b0") {
            Err(Error::MissingBatch { id, path }) => {
                assert_eq!(id, "b0");
                assert!(path.ends_with("Y/b0.json"));
            }
            other => panic!("Expected a missing batch, got {:?}", other),
        }
    }

    #[test]
    fn undecodable_files_are_malformed() {
        let (dir, store) = store();
        store.write("b0", &raw_batch(2, 2)).unwrap();
        fs::write(dir.path().join("params").join("b0.json"), "[1, 2").unwrap();

        assert!(matches!(
            store.load("b0"),
            Err(Error::MalformedBatch { .. })
        ));
    }

    #[test]
    fn disagreeing_sample_counts_are_malformed() {
        let mut raw = raw_batch(2, 2);
        raw.discrete = arr2(&[[0.; DISCRETE_OUTPUTS]]);
        assert!(matches!(
            raw.decode("b0"),
            Err(Error::MalformedBatch { .. })
        ));
    }

    #[test]
    fn wrong_spectrum_length_is_malformed() {
        let (_dir, store) = store();
        store.write("b0", &raw_batch(2, 3)).unwrap();
        let store = store.model_inputs(5);

        assert!(matches!(
            store.load("b0"),
            Err(Error::MalformedBatch { .. })
        ));
    }

    #[test]
    fn missing_directory_is_an_io_error() {
        let store = BatchStore::new("/definitely/not/a/batch/dir");
        assert!(matches!(store.list(), Err(Error::Io { .. })));
    }
}
