// ============================================================
// Layer 4 — Character Batcher
// ============================================================
// Converts host-side id columns into tensors on the target
// device. The model never sees raw ids: every timestep's
// input column becomes a one-hot matrix, and every target
// column becomes an Int index matrix for the NLL gather.
//
// How a column is encoded:
//   ids     [2, 0]           (batch of 2, vocab of 3)
//   one-hot [[0, 0, 1],
//            [1, 0, 0]]      shape [batch, vocab]
//   targets [[2], [0]]       shape [batch, 1]
//
// One-hot inputs carry no parameters, so no gradient can ever
// reach the inputs.
//
// Reference: Burn Book §4 (Batcher)

use anyhow::Result;
use burn::prelude::*;

use crate::domain::error::CharLstmError;

#[derive(Clone, Debug)]
pub struct CharBatcher<B: Backend> {
    /// The device to create tensors on
    pub device: B::Device,
}

impl<B: Backend> CharBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    /// One-hot encode a column of ids, shape [ids.len(), vocab_size]
    pub fn one_hot(&self, ids: &[u32], vocab_size: usize) -> Result<Tensor<B, 2>> {
        let mut flat = vec![0.0f32; ids.len() * vocab_size];
        for (row, &id) in ids.iter().enumerate() {
            if id as usize >= vocab_size {
                return Err(CharLstmError::UnknownId { id, size: vocab_size }.into());
            }
            flat[row * vocab_size + id as usize] = 1.0;
        }
        Ok(Tensor::<B, 2>::from_data(TensorData::new(flat, [ids.len(), vocab_size]), &self.device))
    }

    /// Target ids as a gather index, shape [ids.len(), 1]
    pub fn targets(&self, ids: &[u32]) -> Tensor<B, 2, Int> {
        let flat: Vec<i32> = ids.iter().map(|&id| id as i32).collect();
        Tensor::<B, 1, Int>::from_ints(flat.as_slice(), &self.device)
            .reshape([ids.len(), 1])
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type TestBackend = NdArray;

    #[test]
    fn test_one_hot_rows() {
        let batcher = CharBatcher::<TestBackend>::new(Default::default());
        let x       = batcher.one_hot(&[2, 0], 3).unwrap();
        assert_eq!(x.dims(), [2, 3]);

        let values = x.into_data().to_vec::<f32>().unwrap();
        assert_eq!(values, vec![0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_one_hot_rejects_id_past_vocabulary() {
        let batcher = CharBatcher::<TestBackend>::new(Default::default());
        // Id 3 would otherwise land in the next row of a vocab-3 matrix
        let err = batcher.one_hot(&[3, 0], 3).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CharLstmError>(),
            Some(CharLstmError::UnknownId { id: 3, size: 3 })
        ));
    }

    #[test]
    fn test_targets_shape() {
        let batcher = CharBatcher::<TestBackend>::new(Default::default());
        let y       = batcher.targets(&[4, 1, 3]);
        assert_eq!(y.dims(), [3, 1]);
    }
}
