use crate::config::MainTrialConfig;
use rand::Rng;
use rand::seq::SliceRandom;
use trustcal_core::{Trial, TrialType};

pub type TrialSet = Vec<Trial>;

/// Builds the main block: regular trials in random order with the salient
/// trials inserted one after another at positions drawn from their windows.
///
/// Insertions are applied to the growing list in ascending percentage order,
/// so each draw indexes the list as it stands after the previous insertions.
pub fn generate_main_trials<R: Rng + ?Sized>(config: &MainTrialConfig, rng: &mut R) -> TrialSet {
    let placements: Vec<(Trial, usize)> = config
        .insertion_order()
        .into_iter()
        .map(|slot| {
            let (start, end) = slot.window;
            (Trial::salient(slot.percentage), rng.random_range(start..end))
        })
        .collect();

    let mut pool = config.regular_pool();
    pool.shuffle(rng);
    pool.truncate(config.regular_count);

    let mut trials = TrialSet::with_capacity(config.trial_count());
    trials.extend(pool.into_iter().map(Trial::regular));
    for (trial, position) in placements {
        let position = position.min(trials.len());
        trials.insert(position, trial);
    }
    trials
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequencerEvent {
    Continue,
    PhaseComplete,
}

/// Practice and main trial lists plus the cursor into whichever is current.
#[derive(Debug, Clone)]
pub struct TrialSequencer {
    practice: TrialSet,
    main: TrialSet,
    current: TrialSet,
    mode: TrialType,
    cursor: usize,
}

impl TrialSequencer {
    pub fn new(practice: TrialSet, main: TrialSet) -> Self {
        Self {
            current: practice.clone(),
            practice,
            main,
            mode: TrialType::Practice,
            cursor: 0,
        }
    }

    pub fn mode(&self) -> TrialType {
        self.mode
    }

    pub fn is_practice(&self) -> bool {
        self.mode == TrialType::Practice
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    pub fn is_exhausted(&self) -> bool {
        self.cursor >= self.current.len()
    }

    /// Trial under the cursor; `None` once the set is exhausted.
    pub fn current(&self) -> Option<Trial> {
        self.current.get(self.cursor).copied()
    }

    pub fn practice_trials(&self) -> &[Trial] {
        &self.practice
    }

    pub fn main_trials(&self) -> &[Trial] {
        &self.main
    }

    pub fn advance(&mut self) -> SequencerEvent {
        if self.cursor < self.current.len() {
            self.cursor += 1;
        }
        if self.is_exhausted() {
            SequencerEvent::PhaseComplete
        } else {
            SequencerEvent::Continue
        }
    }

    pub fn reset(&mut self, set: TrialSet, mode: TrialType) {
        self.current = set;
        self.mode = mode;
        self.cursor = 0;
    }

    pub fn switch_to_main(&mut self) {
        let main = self.main.clone();
        self.reset(main, TrialType::Experimental);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn cursor_never_passes_set_length() {
        let mut seq = TrialSequencer::new(vec![Trial::regular(30), Trial::regular(50)], vec![]);
        assert_eq!(seq.current(), Some(Trial::regular(30)));
        assert_eq!(seq.advance(), SequencerEvent::Continue);
        assert_eq!(seq.advance(), SequencerEvent::PhaseComplete);
        assert_eq!(seq.advance(), SequencerEvent::PhaseComplete);
        assert_eq!(seq.cursor(), 2);
        assert_eq!(seq.current(), None);
    }

    #[test]
    fn switching_to_main_resets_cursor() {
        let mut rng = StdRng::seed_from_u64(5);
        let main = generate_main_trials(&MainTrialConfig::default(), &mut rng);
        let mut seq = TrialSequencer::new(vec![Trial::regular(30)], main.clone());
        seq.advance();
        seq.switch_to_main();
        assert_eq!(seq.mode(), TrialType::Experimental);
        assert_eq!(seq.cursor(), 0);
        assert_eq!(seq.len(), 36);
        assert_eq!(seq.current(), main.first().copied());
    }

    #[test]
    fn sequential_insertion_against_growing_list() {
        let config = MainTrialConfig::default();
        let mut rng = StdRng::seed_from_u64(42);
        let trials = generate_main_trials(&config, &mut rng);
        let salient: Vec<(usize, u8)> = trials
            .iter()
            .enumerate()
            .filter(|(_, t)| t.is_salient)
            .map(|(i, t)| (i, t.percentage))
            .collect();
        assert_eq!(salient.iter().map(|s| s.1).collect::<Vec<_>>(), vec![25, 35, 45, 55]);
        for ((index, _), slot) in salient.iter().zip(config.insertion_order()) {
            assert!((slot.window.0..slot.window.1).contains(index));
        }
    }
}
