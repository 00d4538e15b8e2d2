/// Loss of a single prediction together with the derivatives of the loss with respect to the prediction.
pub struct Loss {
    pub loss: f32,
    pub grads: Vec<f32>,
}

pub trait LossFunc {
    fn eval(&self, val: &[f32], target: &[f32]) -> Loss;
}

fn assert_same_len(val: &[f32], target: &[f32]) {
    assert_eq!(
        val.len(),
        target.len(),
        "Value vector must be the same length as target vector. val: {}, target: {}",
        val.len(),
        target.len()
    );
}

#[derive(Clone, Copy, Debug, Default)]
pub struct MeanSquared;

impl LossFunc for MeanSquared {
    fn eval(&self, val: &[f32], target: &[f32]) -> Loss {
        assert_same_len(val, target);

        let recip = 1. / val.len() as f32;
        let mut grads = Vec::with_capacity(val.len());
        let mut loss = 0.;
        for (val, target) in val.iter().copied().zip(target.iter().copied()) {
            let diff = val - target;
            loss += diff * diff;
            grads.push(2. * diff * recip);
        }

        Loss {
            loss: loss * recip,
            grads,
        }
    }
}

/// Cross entropy over binary outputs, each in `(0, 1)`.
#[derive(Clone, Copy, Debug)]
pub struct BinaryCrossEntropy {
    epsilon: f32,
}

impl Default for BinaryCrossEntropy {
    fn default() -> Self {
        Self { epsilon: 1e-7 }
    }
}

impl LossFunc for BinaryCrossEntropy {
    fn eval(&self, val: &[f32], target: &[f32]) -> Loss {
        assert_same_len(val, target);

        let recip = 1. / val.len() as f32;
        let mut grads = Vec::with_capacity(val.len());
        let mut loss = 0.;
        for (val, target) in val.iter().copied().zip(target.iter().copied()) {
            let p = val.max(self.epsilon).min(1. - self.epsilon);
            loss -= target * p.ln() + (1. - target) * (1. - p).ln();
            grads.push((p - target) / (p * (1. - p)) * recip);
        }

        Loss {
            loss: loss * recip,
            grads,
        }
    }
}

pub fn mean_absolute_error(val: &[f32], target: &[f32]) -> f32 {
    assert_same_len(val, target);
    val.iter()
        .zip(target)
        .map(|(v, t)| (v - t).abs())
        .sum::<f32>()
        / val.len() as f32
}

/// Fraction of one-hot choices of width `group` whose most likely entry is the target's.
pub fn choice_accuracy(val: &[f32], target: &[f32], group: usize) -> f32 {
    assert_same_len(val, target);
    let argmax = |xs: &[f32]| {
        xs.iter()
            .enumerate()
            .fold((0, f32::NEG_INFINITY), |best, (i, x)| {
                if *x > best.1 {
                    (i, *x)
                } else {
                    best
                }
            })
            .0
    };
    let choices = val.chunks(group).zip(target.chunks(group));
    let total = choices.len();
    let hits = choices.filter(|(v, t)| argmax(v) == argmax(t)).count();
    hits as f32 / total as f32
}
