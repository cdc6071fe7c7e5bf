use crate::error::{TrainingError, TrainingResult};
use std::num::NonZeroU32;

/// Number of epochs between checkpoints. Always at least one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckpointCadence(NonZeroU32);

impl CheckpointCadence {
    /// Accepts the raw, possibly negative, value given on the command line.
    pub fn new(epochs: i64) -> TrainingResult<Self> {
        u32::try_from(epochs)
            .ok()
            .and_then(NonZeroU32::new)
            .map(Self)
            .ok_or_else(|| {
                TrainingError::InvalidConfig(format!(
                    "checkpoint cadence must be a positive number of epochs, got {epochs}"
                ))
            })
    }

    #[must_use]
    pub fn epochs(self) -> u32 {
        self.0.get()
    }
}

#[must_use]
pub fn should_checkpoint(epochs_since_checkpoint: u32, cadence: CheckpointCadence) -> bool {
    epochs_since_checkpoint >= cadence.epochs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cadence_rejects_non_positive() {
        for raw in [0, -3] {
            assert!(matches!(
                CheckpointCadence::new(raw),
                Err(TrainingError::InvalidConfig(_))
            ));
        }
        assert!(CheckpointCadence::new(i64::from(u32::MAX) + 1).is_err());
        assert_eq!(CheckpointCadence::new(5).unwrap().epochs(), 5);
    }

    #[test]
    fn test_should_checkpoint_matches_threshold() {
        for cadence in 1..=6 {
            let c = CheckpointCadence::new(cadence).unwrap();
            for k in 0..20 {
                assert_eq!(
                    should_checkpoint(k, c),
                    i64::from(k) >= cadence,
                    "k={k} cadence={cadence}"
                );
            }
        }
    }

    #[test]
    fn test_checkpoints_fall_on_multiples_of_cadence() {
        let cadence = CheckpointCadence::new(3).unwrap();
        let mut since = 0;
        let mut taken = Vec::new();
        for epoch in 1..=10 {
            since += 1;
            if should_checkpoint(since, cadence) {
                taken.push(epoch);
                since = 0;
            }
        }
        assert_eq!(taken, vec![3, 6, 9]);
    }
}
