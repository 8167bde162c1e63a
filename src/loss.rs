//! Loss models applied by the emulator to DATA packets.
//!
//! The emulator asks a [`LossModel`] once per DATA packet whether to drop
//! it.  ACK and END packets never reach the model.
//!
//! | Model           | Behaviour                                            |
//! |-----------------|------------------------------------------------------|
//! | [`Bernoulli`]   | Drop each packet independently with probability `p`. |
//! | [`ScriptedLoss`]| Drop the first transmission of selected seqnums.     |
//! | [`NoLoss`]      | Transparent pass-through.                            |
//!
//! [`Bernoulli`] can be seeded so lossy runs are reproducible.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Decides whether a DATA packet is lost in transit.
pub trait LossModel: Send {
    /// Called once per DATA packet, in arrival order.
    fn should_drop(&mut self, seqnum: u32) -> bool;
}

/// Independent loss with a fixed probability.
#[derive(Debug, Clone)]
pub struct Bernoulli {
    probability: f64,
    rng: StdRng,
}

impl Bernoulli {
    /// `probability` is clamped to `[0, 1]`; NaN counts as no loss.
    /// [`crate::config::EmulatorConfig`] rejects both before the model is built.
    pub fn new(probability: f64, seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self { probability, rng }
    }

    pub fn probability(&self) -> f64 {
        self.probability
    }
}

impl LossModel for Bernoulli {
    fn should_drop(&mut self, _seqnum: u32) -> bool {
        self.rng.random_bool(self.probability)
    }
}

/// Deterministic loss: the first arrival of each listed seqnum is dropped,
/// every later arrival (the retransmissions) passes.
#[derive(Debug, Clone, Default)]
pub struct ScriptedLoss {
    pending: HashSet<u32>,
}

impl ScriptedLoss {
    pub fn drop_first(seqnums: impl IntoIterator<Item = u32>) -> Self {
        Self {
            pending: seqnums.into_iter().collect(),
        }
    }

    /// Seqnums whose first transmission has not been seen yet.
    pub fn remaining(&self) -> usize {
        self.pending.len()
    }
}

impl LossModel for ScriptedLoss {
    fn should_drop(&mut self, seqnum: u32) -> bool {
        self.pending.remove(&seqnum)
    }
}

/// Never drops anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoLoss;

impl LossModel for NoLoss {
    fn should_drop(&mut self, _seqnum: u32) -> bool {
        false
    }
}

impl<L: LossModel + ?Sized> LossModel for Box<L> {
    fn should_drop(&mut self, seqnum: u32) -> bool {
        (**self).should_drop(seqnum)
    }
}
