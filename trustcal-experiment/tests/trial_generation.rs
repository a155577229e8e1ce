use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::HashSet;
use trustcal_core::{Recommendation, Trial};
use trustcal_experiment::{MainTrialConfig, generate_main_trials};

proptest! {
    #[test]
    fn main_block_shape_holds_for_any_seed(seed in any::<u64>()) {
        let config = MainTrialConfig::default();
        let trials = generate_main_trials(&config, &mut StdRng::seed_from_u64(seed));
        prop_assert_eq!(trials.len(), 36);

        let salient: Vec<&Trial> = trials.iter().filter(|t| t.is_salient).collect();
        prop_assert_eq!(salient.len(), 4);
        let mut salient_percentages: Vec<u8> = salient.iter().map(|t| t.percentage).collect();
        salient_percentages.sort_unstable();
        prop_assert_eq!(salient_percentages, vec![25, 35, 45, 55]);
        let regular: HashSet<u8> = trials
            .iter()
            .filter(|t| !t.is_salient)
            .map(|t| t.percentage)
            .collect();
        prop_assert_eq!(regular.len(), 32);
        for p in &regular {
            prop_assert!((20..=60).contains(p));
            prop_assert!(![25, 35, 45, 55].contains(p));
        }
    }

    #[test]
    fn salient_trials_land_in_their_windows(seed in any::<u64>()) {
        let config = MainTrialConfig::default();
        let trials = generate_main_trials(&config, &mut StdRng::seed_from_u64(seed));
        for slot in &config.salient {
            let index = trials
                .iter()
                .position(|t| t.is_salient && t.percentage == slot.percentage);
            prop_assert!(index.is_some(), "{}% missing", slot.percentage);
            let index = index.unwrap_or_default();
            prop_assert!(
                (slot.window.0..slot.window.1).contains(&index),
                "{}% at {} outside {:?}",
                slot.percentage,
                index,
                slot.window
            );
        }
    }

    #[test]
    fn salient_trials_invert_the_recommendation(seed in any::<u64>()) {
        let config = MainTrialConfig::default();
        let trials = generate_main_trials(&config, &mut StdRng::seed_from_u64(seed));
        for t in trials {
            let truthful = if t.percentage >= 40 {
                Recommendation::Discard
            } else {
                Recommendation::Keep
            };
            if t.is_salient {
                prop_assert_eq!(t.recommendation(), truthful.inverted());
            } else {
                prop_assert_eq!(t.recommendation(), truthful);
            }
        }
    }
}
