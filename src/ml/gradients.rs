// ============================================================
// Layer 5 — Gradient Clipping
// ============================================================
// Elementwise clipping of an accumulated gradient buffer.
//
// GradientsParams is keyed by parameter id, so the only way to
// reach every gradient is to walk the module's parameters with
// a ModuleVisitor and look each id up. It is the same walk burn uses
// to build GradientsParams in the first place.
//
// While walking we also collect the squared norms needed for
// the grad/param ratio printed in the progress line.

use burn::{
    module::{ModuleVisitor, ParamId},
    optim::GradientsParams,
    prelude::*,
    tensor::backend::AutodiffBackend,
};

use crate::ml::model::CharLstm;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientStats {
    /// L2 norm of all gradients after clipping
    pub grad_norm:   f64,
    /// L2 norm of all parameters
    pub param_norm:  f64,
}

/// Clamp every gradient element of `model` into `[-clip_value, clip_value]`.
/// A non-positive `clip_value` leaves the gradients untouched.
pub fn clip_gradients<B: AutodiffBackend>(
    model:      &CharLstm<B>,
    grads:      &mut GradientsParams,
    clip_value: f64,
) -> GradientStats {
    let mut clipper = GradientClipper {
        grads,
        clip: (clip_value > 0.0).then_some(clip_value),
        grad_sq: 0.0,
        param_sq: 0.0,
    };
    model.visit(&mut clipper);

    GradientStats {
        grad_norm:  clipper.grad_sq.sqrt(),
        param_norm: clipper.param_sq.sqrt(),
    }
}

struct GradientClipper<'a> {
    grads:    &'a mut GradientsParams,
    clip:     Option<f64>,
    grad_sq:  f64,
    param_sq: f64,
}

impl<B: AutodiffBackend> ModuleVisitor<B> for GradientClipper<'_> {
    fn visit_float<const D: usize>(&mut self, id: ParamId, tensor: &Tensor<B, D>) {
        self.param_sq += tensor
            .clone()
            .inner()
            .powf_scalar(2.0)
            .sum()
            .into_scalar()
            .elem::<f64>();

        // Parameters that took no part in the loss have no gradient
        let Some(grad) = self.grads.remove::<B::InnerBackend, D>(id) else {
            return;
        };
        let grad = match self.clip {
            Some(c) => grad.clamp(-c, c),
            None    => grad,
        };

        self.grad_sq += grad.clone().powf_scalar(2.0).sum().into_scalar().elem::<f64>();

        self.grads.register::<B::InnerBackend, D>(id, grad);
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::{Autodiff, NdArray};

    use crate::ml::model::{nll_loss, CharLstmConfig};

    type TestBackend = Autodiff<NdArray>;

    /// Largest absolute gradient element, read without modifying `grads`
    struct MaxAbs<'a> {
        grads: &'a GradientsParams,
        max:   f64,
    }

    impl<B: AutodiffBackend> ModuleVisitor<B> for MaxAbs<'_> {
        fn visit_float<const D: usize>(&mut self, id: ParamId, _: &Tensor<B, D>) {
            if let Some(g) = self.grads.get::<B::InnerBackend, D>(id) {
                self.max = self.max.max(g.abs().max().into_scalar().elem::<f64>());
            }
        }
    }

    fn max_abs(model: &CharLstm<TestBackend>, grads: &GradientsParams) -> f64 {
        let mut v = MaxAbs { grads, max: 0.0 };
        model.visit(&mut v);
        v.max
    }

    fn grads_for(model: &CharLstm<TestBackend>, scale: f32) -> GradientsParams {
        let out  = model.step(&[0, 1, 2], &model.zero_state(3)).unwrap();
        let loss = nll_loss(out.log_probs, &[1, 2, 0]).mul_scalar(scale);
        GradientsParams::from_grads(loss.backward(), model)
    }

    #[test]
    fn test_every_element_within_bound() {
        let model = CharLstmConfig::new(3, 4, 2).init::<TestBackend>(&Default::default());

        let mut raw   = grads_for(&model, 1000.0);
        assert!(max_abs(&model, &raw) > 1e-3, "test needs gradients larger than the bound");
        let unclipped = clip_gradients(&model, &mut raw, 0.0);

        let mut grads = grads_for(&model, 1000.0);
        let stats     = clip_gradients(&model, &mut grads, 1e-3);
        assert!(max_abs(&model, &grads) <= 1e-3 + 1e-9);
        assert!(stats.grad_norm < unclipped.grad_norm);

        // A second walk sees the clipped values that were registered back
        let again = clip_gradients(&model, &mut grads, 0.0);
        assert!((again.grad_norm - stats.grad_norm).abs() < 1e-6);
    }

    #[test]
    fn test_disabled_clip_keeps_norm() {
        let model     = CharLstmConfig::new(3, 4, 1).init::<TestBackend>(&Default::default());
        let mut grads = grads_for(&model, 1.0);

        let first  = clip_gradients(&model, &mut grads, 0.0);
        let second = clip_gradients(&model, &mut grads, -1.0);
        assert!(first.grad_norm > 0.0);
        assert!(first.param_norm > 0.0);
        assert!((first.grad_norm - second.grad_norm).abs() < 1e-9);
    }
}
