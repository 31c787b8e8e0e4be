use anyhow::Result;
use burn::{
    nn::{Dropout, DropoutConfig, Linear, LinearConfig},
    prelude::*,
    tensor::activation::{log_softmax, sigmoid, tanh},
};

use crate::data::batcher::CharBatcher;

// NOTE: #[derive(Config)] already generates Clone and Serialize/Deserialize
// internally; do NOT add them again or you get conflicting impls.
#[derive(Config, Debug)]
pub struct CharLstmConfig {
    pub vocab_size:   usize,
    pub hidden_width: usize,
    pub num_layers:   usize,
    #[config(default = 0.0)]
    pub dropout:      f64,
}

impl CharLstmConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> CharLstm<B> {
        let layers = (0..self.num_layers)
            .map(|l| {
                let input_width = if l == 0 { self.vocab_size } else { self.hidden_width };
                LstmLayer {
                    input_to_gates:  LinearConfig::new(input_width, 4 * self.hidden_width).init(device),
                    hidden_to_gates: LinearConfig::new(self.hidden_width, 4 * self.hidden_width).init(device),
                }
            })
            .collect();
        CharLstm {
            layers,
            decoder:      LinearConfig::new(self.hidden_width, self.vocab_size).init(device),
            dropout:      DropoutConfig::new(self.dropout).init(),
            vocab_size:   self.vocab_size,
            hidden_width: self.hidden_width,
        }
    }
}

#[derive(Module, Debug)]
pub struct LstmLayer<B: Backend> {
    pub input_to_gates:  Linear<B>,
    pub hidden_to_gates: Linear<B>,
}

impl<B: Backend> LstmLayer<B> {
    /// One LSTM cell update. Gate order in the 4H projection: input, forget, output, candidate.
    pub fn forward(&self, x: Tensor<B, 2>, prev: &LayerState<B>) -> LayerState<B> {
        let gates = self.input_to_gates.forward(x)
            + self.hidden_to_gates.forward(prev.hidden.clone());
        let mut chunks = gates.chunk(4, 1).into_iter();
        let (Some(i), Some(f), Some(o), Some(g)) =
            (chunks.next(), chunks.next(), chunks.next(), chunks.next())
        else {
            unreachable!("chunk(4) yields four gates");
        };

        let cell   = sigmoid(f) * prev.cell.clone() + sigmoid(i) * tanh(g);
        let hidden = sigmoid(o) * tanh(cell.clone());
        LayerState { cell, hidden }
    }
}

/// Cell and hidden state of one layer, both [batch, hidden_width]
#[derive(Clone, Debug)]
pub struct LayerState<B: Backend> {
    pub cell:   Tensor<B, 2>,
    pub hidden: Tensor<B, 2>,
}

#[derive(Clone, Debug)]
pub struct LstmState<B: Backend> {
    pub layers: Vec<LayerState<B>>,
}

impl<B: Backend> LstmState<B> {
    pub fn zeros(num_layers: usize, batch_size: usize, width: usize, device: &B::Device) -> Self {
        let layers = (0..num_layers)
            .map(|_| LayerState {
                cell:   Tensor::zeros([batch_size, width], device),
                hidden: Tensor::zeros([batch_size, width], device),
            })
            .collect();
        Self { layers }
    }

    /// Same values, cut off from the autodiff graph
    pub fn detach(&self) -> Self {
        let layers = self
            .layers
            .iter()
            .map(|s| LayerState {
                cell:   s.cell.clone().detach(),
                hidden: s.hidden.clone().detach(),
            })
            .collect();
        Self { layers }
    }

    pub fn batch_size(&self) -> usize {
        self.layers.first().map_or(0, |s| s.hidden.dims()[0])
    }
}

pub struct ModelStep<B: Backend> {
    /// [batch, vocab] log-probabilities of the next character
    pub log_probs: Tensor<B, 2>,
    pub state:     LstmState<B>,
}

#[derive(Module, Debug)]
pub struct CharLstm<B: Backend> {
    pub layers:       Vec<LstmLayer<B>>,
    pub decoder:      Linear<B>,
    pub dropout:      Dropout,
    pub vocab_size:   usize,
    pub hidden_width: usize,
}

impl<B: Backend> CharLstm<B> {
    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn device(&self) -> B::Device {
        self.decoder.weight.val().device()
    }

    pub fn zero_state(&self, batch_size: usize) -> LstmState<B> {
        LstmState::zeros(self.num_layers(), batch_size, self.hidden_width, &self.device())
    }

    /// Advance every layer by one timestep.
    ///
    /// input_ids: [batch] → log_probs: [batch, vocab]. Dropout sits between
    /// layers and before the decoder; it is a no-op outside autodiff backends.
    pub fn step(&self, input_ids: &[u32], state: &LstmState<B>) -> Result<ModelStep<B>> {
        let batcher = CharBatcher::<B>::new(self.device());
        let mut x   = batcher.one_hot(input_ids, self.vocab_size)?;

        let mut next = Vec::with_capacity(self.layers.len());
        for (l, (layer, prev)) in self.layers.iter().zip(&state.layers).enumerate() {
            if l > 0 {
                x = self.dropout.forward(x);
            }
            let s = layer.forward(x, prev);
            x = s.hidden.clone();
            next.push(s);
        }

        let logits = self.decoder.forward(self.dropout.forward(x));
        Ok(ModelStep {
            log_probs: log_softmax(logits, 1),
            state:     LstmState { layers: next },
        })
    }
}

/// Batch-mean negative log-likelihood of `targets` under `log_probs`.
pub fn nll_loss<B: Backend>(log_probs: Tensor<B, 2>, targets: &[u32]) -> Tensor<B, 1> {
    let batcher = CharBatcher::<B>::new(log_probs.device());
    log_probs.gather(1, batcher.targets(targets)).mean().neg()
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    fn model(dropout: f64) -> CharLstm<TestBackend> {
        CharLstmConfig::new(5, 8, 2)
            .with_dropout(dropout)
            .init(&Default::default())
    }

    #[test]
    fn test_step_shapes() {
        let m    = model(0.0);
        let out  = m.step(&[0, 3, 4], &m.zero_state(3)).unwrap();
        assert_eq!(out.log_probs.dims(), [3, 5]);
        assert_eq!(out.state.layers.len(), 2);
        for s in &out.state.layers {
            assert_eq!(s.cell.dims(), [3, 8]);
            assert_eq!(s.hidden.dims(), [3, 8]);
        }
    }

    #[test]
    fn test_log_probs_normalised() {
        let m   = model(0.0);
        let out = m.step(&[1, 2], &m.zero_state(2)).unwrap();
        let sums = out.log_probs.exp().sum_dim(1).into_data().to_vec::<f32>().unwrap();
        for s in sums {
            assert!((s - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_inference_backend_ignores_dropout() {
        // Dropout is only active on autodiff backends
        let m = model(0.5);
        let a = m.step(&[1, 2], &m.zero_state(2)).unwrap().log_probs;
        let b = m.step(&[1, 2], &m.zero_state(2)).unwrap().log_probs;
        let diff = (a - b).abs().max().into_scalar().elem::<f32>();
        assert_eq!(diff, 0.0);
    }

    #[test]
    fn test_nll_matches_manual_gather() {
        let m   = model(0.0);
        let out = m.step(&[0, 1], &m.zero_state(2)).unwrap();
        let lp  = out.log_probs.clone().into_data().to_vec::<f32>().unwrap();
        let expected = -(lp[2] + lp[5 + 4]) / 2.0;
        let loss = nll_loss(out.log_probs, &[2, 4]).into_scalar().elem::<f32>();
        assert!((loss - expected).abs() < 1e-5);
    }

    #[test]
    fn test_state_changes_with_input() {
        let m  = model(0.0);
        let s1 = m.step(&[0], &m.zero_state(1)).unwrap().state;
        let s2 = m.step(&[1], &m.zero_state(1)).unwrap().state;
        let diff = (s1.layers[1].hidden.clone() - s2.layers[1].hidden.clone())
            .abs()
            .max()
            .into_scalar()
            .elem::<f32>();
        assert!(diff > 0.0);
        assert_eq!(s1.batch_size(), 1);
    }

    #[test]
    fn test_step_rejects_id_outside_vocabulary() {
        let m = model(0.0);
        assert!(m.step(&[0, 5], &m.zero_state(2)).is_err());
    }
}
