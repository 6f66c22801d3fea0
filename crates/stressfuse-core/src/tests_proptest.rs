use proptest::prelude::*;

// Property-based checks for the channel and score invariants.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calibration::baseline::{Baseline, BaselineCalibrator, BaselineSample};
    use crate::channels::piezo::{classify, PiezoLevel, WindowSummary};
    use crate::channels::pulse::PulseChannel;
    use crate::clock::elapsed_ms;
    use crate::config::{BaselineConfig, PiezoConfig, PulseConfig, ScoreConfig};
    use crate::score::{ScoreAggregator, ScoreInputs};

    fn level() -> impl Strategy<Value = PiezoLevel> {
        prop_oneof![
            Just(PiezoLevel::Normal),
            Just(PiezoLevel::Medium),
            Just(PiezoLevel::High),
            Just(PiezoLevel::Movement),
        ]
    }

    proptest! {
        #[test]
        fn test_elapsed_is_wrap_safe(start in any::<u32>(), delta in 0u32..u32::MAX / 2) {
            prop_assert_eq!(elapsed_ms(start.wrapping_add(delta), start), delta);
        }
    }

    // Intervals outside 500..=1333 ms imply BPM outside [45, 120].
    proptest! {
        #[test]
        fn test_implausible_interval_leaves_buffer(
            start in any::<u32>(),
            delta in prop_oneof![0u32..500, 1_334u32..100_000],
        ) {
            let mut ch = PulseChannel::new(PulseConfig::default());
            ch.tick(start, 900, true);
            let before = ch.state().history;
            let filled = ch.state().filled;

            let accepted = ch.tick(start.wrapping_add(delta), 900, true);

            prop_assert!(!accepted);
            prop_assert_eq!(ch.state().history, before);
            prop_assert_eq!(ch.state().filled, filled);
        }
    }

    proptest! {
        #[test]
        fn test_movement_has_priority(
            window_max in 0.0f32..10_000.0,
            ratio_max in 0.0f32..100_000.0,
            active_ms in 0u32..10_000,
            spikes in 8u32..500,
        ) {
            let cfg = PiezoConfig::default();
            let summary = WindowSummary { window_max, ratio_max, active_ms, spike_count: spikes };
            prop_assert_eq!(classify(&summary, &cfg), PiezoLevel::Movement);
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(500))]

        #[test]
        fn test_score_always_bounded(
            bpm_base in -500.0f32..500.0,
            temp_base in -100.0f32..100.0,
            bpm in prop::option::of(-500.0f32..500.0),
            temp in prop::option::of(-100.0f32..100.0),
            piezo in level(),
            window_max in -1_000.0f32..1_000.0,
            gsr in -1_000.0f32..1_000.0,
        ) {
            let baseline = Baseline {
                bpm: bpm_base,
                temp_c: temp_base,
                piezo_envelope: 1.0,
                spike_threshold: 20.0,
            };
            let mut agg = ScoreAggregator::new(ScoreConfig::default());
            let b = agg.compute(&baseline, &ScoreInputs {
                bpm_avg: bpm,
                temp_c: temp,
                piezo_level: piezo,
                piezo_window_max: window_max,
                gsr_contribution: gsr,
            });
            prop_assert!((0.0..=100.0).contains(&b.total), "total = {}", b.total);
            prop_assert!(b.piezo_term <= 40.0);
            prop_assert!((0.0..=30.0).contains(&b.gsr_term));
        }
    }

    proptest! {
        #[test]
        fn test_baseline_completes_once(pattern in prop::collection::vec(any::<bool>(), 30..200)) {
            let mut cal = BaselineCalibrator::new(BaselineConfig::default());
            let mut qualifying = 0u32;
            let mut completions = 0u32;

            for contact in pattern {
                let sample = BaselineSample {
                    contact,
                    bpm_avg: 72.0,
                    temp_c: Some(34.0),
                    piezo_envelope: 2.0,
                };
                if contact && !cal.is_done() {
                    qualifying += 1;
                }
                if cal.accumulate(&sample).is_some() {
                    completions += 1;
                    prop_assert_eq!(qualifying, 30);
                }
            }

            prop_assert!(completions <= 1);
            prop_assert_eq!(cal.is_done(), qualifying >= 30);
        }
    }
}
