//! # Integration Tests
//!
//! Cross-crate and end-to-end scenario tests.
//!
//! Covers:
//! - Store unit/time invariants
//! - Model fit quality, prediction-interval coverage, round-trip inversion
//! - Stability idempotence and transitions
//! - Swapper nominal-mode scheduling
//! - Presenter onset propagation with appended slides and display stalls
//! - Cross-domain sync points built from a loaded blueprint
//!
//! Deterministic timing throughout via `ManualClock`.

#[cfg(test)]
mod support {
    use std::sync::Arc;

    use contracts::{ManualClock, SharedClock, SwapStoreConfig, Time};
    use sync_engine::SwapStore;

    /// 16.667 ms, the nominal period used across the scenarios.
    pub const FRAME: Time = Time::from_nanos(16_667_000);

    /// A store on a fresh manual clock.
    pub fn manual_store(name: &str, config: SwapStoreConfig) -> (Arc<ManualClock>, Arc<SwapStore>) {
        let manual = ManualClock::shared();
        let clock: SharedClock = manual.clone();
        let store = SwapStore::new(name, config, clock);
        (manual, store)
    }

    /// Feed `n` swaps at a fixed period, advancing the clock per swap.
    /// The first swap lands at the clock's current time.
    pub fn feed_uniform(store: &SwapStore, clock: &ManualClock, n: usize, period: Time) {
        for i in 0..n {
            if i > 0 {
                clock.advance(period);
            }
            store.store_swap_time(clock.now());
        }
    }
}

#[cfg(test)]
mod store_invariants {
    use super::support::*;
    use contracts::{SwapStoreConfig, Time};

    #[test]
    fn test_inferred_units_are_consecutive() {
        let (clock, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
        );
        feed_uniform(&store, &clock, 50, FRAME);

        store.with_data(|data| {
            for pair in data.windows(2) {
                assert_eq!(pair[1].unit - pair[0].unit, store.units_per_swap());
                assert!(pair[1].time >= pair[0].time);
            }
        });
    }

    #[test]
    fn test_inferred_units_advance_by_units_per_swap() {
        let (clock, store) = manual_store(
            "audio",
            SwapStoreConfig {
                nominal_swap_period: Time::from_millis(10),
                units_per_swap: 480,
                ..Default::default()
            },
        );
        feed_uniform(&store, &clock, 20, Time::from_millis(10));

        store.with_data(|data| {
            for pair in data.windows(2) {
                assert_eq!(pair[1].unit - pair[0].unit, 480);
            }
        });
        assert_eq!(store.next_swap_unit(), 20 * 480);
    }

    #[test]
    fn test_times_nondecreasing_under_jitter() {
        let (clock, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
        );
        // Alternating short and long intervals, all positive
        for i in 0..40 {
            let jitter = if i % 2 == 0 {
                Time::from_micros(200)
            } else {
                -Time::from_micros(200)
            };
            clock.advance(FRAME + jitter);
            store.store_swap_time(clock.now());
        }
        store.with_data(|data| {
            for pair in data.windows(2) {
                assert!(pair[1].time >= pair[0].time);
            }
        });
    }
}

#[cfg(test)]
mod model_scenarios {
    use super::support::*;
    use contracts::{LinearModelConfig, SwapData, SwapStoreConfig, Time};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use sync_engine::LinearModel;

    /// Standard normal via Box-Muller, scaled to `sigma`.
    fn gaussian(rng: &mut StdRng, sigma: f64) -> f64 {
        let u1: f64 = rng.random::<f64>().max(1e-12);
        let u2: f64 = rng.random();
        sigma * (-2.0 * u1.ln()).sqrt() * (std::f64::consts::TAU * u2).cos()
    }

    /// Scenario 1: an exact 60-sample grid fits with near-zero error.
    #[test]
    fn test_exact_grid_fit() {
        let (clock, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
        );
        feed_uniform(&store, &clock, 60, FRAME);

        let model = LinearModel::new(
            std::sync::Arc::clone(&store),
            LinearModelConfig {
                sample_size: 60,
                auto_update: false,
            },
        );
        assert!(model.fit());

        let fitted = model.fitted().unwrap();
        assert_eq!(fitted.n, 60);
        assert!((fitted.slope - FRAME.as_millis_f64()).abs() < 1e-6, "slope {}", fitted.slope);
        assert!(fitted.intercept.abs() < 1e-6, "intercept {}", fitted.intercept);
        assert!(fitted.mse < 1e-9, "mse {}", fitted.mse);

        // Half-width at the mean unit is far below a microsecond
        let at_mean = model.predict_time(fitted.x_bar);
        assert!(at_mean.usable);
        assert!(at_mean.uncertainty <= Time::from_micros(1));
    }

    /// Scenario 2: with Gaussian noise, withheld samples land inside
    /// their prediction intervals.
    #[test]
    fn test_noisy_fit_interval_coverage() {
        let (_, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                sample_size: 60,
                ..Default::default()
            },
        );
        let mut rng = StdRng::seed_from_u64(7);
        let sigma_ms = 0.1;
        let truth = |unit: u64| -> Time {
            Time::from_nanos(unit as i64 * FRAME.as_nanos())
        };

        for unit in 0..60u64 {
            let noise = Time::from_millis_f64(gaussian(&mut rng, sigma_ms));
            store.store_swap(SwapData::new(truth(unit) + noise, unit));
        }

        let model = LinearModel::new(
            std::sync::Arc::clone(&store),
            LinearModelConfig {
                sample_size: 60,
                auto_update: false,
            },
        );
        assert!(model.fit());

        // In-window coverage of the fitted samples
        let in_window = store.with_data(|data| {
            let covered = data
                .iter()
                .filter(|sample| {
                    let pred = model.predict_time(sample.unit as f64);
                    (pred.pred - sample.time).abs() <= pred.uncertainty
                })
                .count();
            covered as f64 / data.len() as f64
        });
        assert!(in_window >= 0.9, "in-window coverage {in_window}");

        // Withheld samples beyond the window
        let mut covered = 0usize;
        let withheld = 40usize;
        for k in 0..withheld {
            let unit = 60 + k as u64;
            let actual = truth(unit) + Time::from_millis_f64(gaussian(&mut rng, sigma_ms));
            let pred = model.predict_time(unit as f64);
            assert!(pred.usable);
            if (pred.pred - actual).abs() <= pred.uncertainty {
                covered += 1;
            }
        }
        let coverage = covered as f64 / withheld as f64;
        assert!(coverage >= 0.9, "withheld coverage {coverage}");
    }

    /// Round-trip: inverting a predicted time recovers the unit.
    #[test]
    fn test_round_trip_unit_inversion() {
        let (clock, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
        );
        feed_uniform(&store, &clock, 40, FRAME);

        let model = LinearModel::new(
            std::sync::Arc::clone(&store),
            LinearModelConfig {
                sample_size: 40,
                auto_update: false,
            },
        );
        assert!(model.fit());

        for unit in 0..40u64 {
            let time = model.calculate_time(unit as f64);
            let back = model.calculate_swap_unit(time);
            assert_eq!(back.round() as u64, unit, "unit {unit} inverted to {back}");
        }
    }
}

#[cfg(test)]
mod stability_scenarios {
    use super::support::*;
    use contracts::{StabilityVerifierConfig, SwapStatus, SwapStoreConfig, Time};
    use sync_engine::StabilityVerifier;
    use std::sync::Arc;

    fn verifier_over(
        store: &Arc<sync_engine::SwapStore>,
        sample_size: usize,
    ) -> StabilityVerifier {
        StabilityVerifier::new(
            Arc::clone(store),
            StabilityVerifierConfig {
                sample_size,
                auto_update: false,
                ..Default::default()
            },
        )
    }

    #[test]
    fn test_status_is_idempotent() {
        let (clock, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
        );
        feed_uniform(&store, &clock, 15, FRAME);

        let verifier = verifier_over(&store, 10);
        let first = verifier.get_status();
        let second = verifier.get_status();
        assert_eq!(first, second);
        assert_eq!(first, SwapStatus::SwappingStably);
    }

    #[test]
    fn test_even_spacing_becomes_stable() {
        let (clock, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
        );
        let verifier = verifier_over(&store, 10);
        assert_eq!(verifier.get_status(), SwapStatus::InsufficientData);

        feed_uniform(&store, &clock, 12, FRAME);
        assert_eq!(verifier.get_status(), SwapStatus::SwappingStably);
    }

    #[test]
    fn test_mixed_intervals_inside_tolerance_are_stable() {
        let (clock, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
        );
        // Intervals alternate 0.45 of nominal above and below: inside
        // the default 0.5 tolerance.
        let high = FRAME + Time::from_nanos((FRAME.as_nanos() as f64 * 0.45) as i64);
        let low = FRAME - Time::from_nanos((FRAME.as_nanos() as f64 * 0.45) as i64);
        store.store_swap_time(clock.now());
        for i in 0..14 {
            clock.advance(if i % 2 == 0 { high } else { low });
            store.store_swap_time(clock.now());
        }

        let verifier = verifier_over(&store, 10);
        assert_eq!(verifier.get_status(), SwapStatus::SwappingStably);
    }

    #[test]
    fn test_single_long_interval_is_unstable() {
        let (clock, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
        );
        feed_uniform(&store, &clock, 8, FRAME);
        // One interval beyond (1 + tolerance) x nominal
        clock.advance(Time::from_nanos(FRAME.as_nanos() * 2));
        store.store_swap_time(clock.now());

        let verifier = verifier_over(&store, 8);
        assert_eq!(verifier.get_status(), SwapStatus::SwappingUnstably);
    }

    /// Scenario 3: one bad interval poisons the window, then washes out.
    #[test]
    fn test_bad_interval_washes_out_of_window() {
        let (clock, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
        );
        let verifier = verifier_over(&store, 10);

        feed_uniform(&store, &clock, 59, FRAME);
        assert_eq!(verifier.get_status(), SwapStatus::SwappingStably);

        // A 33.3 ms interval, double the nominal
        clock.advance(Time::from_micros(33_300));
        store.store_swap_time(clock.now());
        assert_eq!(verifier.get_status(), SwapStatus::SwappingUnstably);

        // Ten more nominal samples push the bad interval out
        for _ in 0..10 {
            clock.advance(FRAME);
            store.store_swap_time(clock.now());
        }
        assert_eq!(verifier.get_status(), SwapStatus::SwappingStably);
    }
}

#[cfg(test)]
mod swapper_scenarios {
    use super::support::*;
    use contracts::{
        DataClientConfig, DisplaySwapperConfig, SwapStoreConfig, SwapperMode, Time,
    };
    use parking_lot::Mutex;
    use presenter::{DisplaySwapper, SharedDisplay};
    use sources::MockDisplay;
    use std::sync::Arc;
    use sync_engine::DataClient;

    /// Nominal mode: a swap is due exactly when the remaining slack
    /// drops below the safety buffer.
    #[test]
    fn test_nominal_mode_swap_window() {
        let (clock, store) = manual_store(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
        );
        let client = Arc::new(DataClient::new(
            Arc::clone(&store),
            DataClientConfig::default(),
        ));
        let display: SharedDisplay = Arc::new(Mutex::new(Box::new(MockDisplay::simulated(
            clock.clone(),
            FRAME,
        ))));
        let buffer = Time::from_millis(2);
        let swapper = DisplaySwapper::new(
            display,
            client,
            DisplaySwapperConfig {
                pre_swap_safety_buffer: buffer,
                mode: SwapperMode::NominalPeriod,
            },
        );

        let t0 = clock.now();
        store.store_swap_time(t0);

        // Right after the swap: a full period of slack
        assert_eq!(swapper.estimated_time_to_next_swap(), FRAME);
        assert!(!swapper.should_swap());

        // Slack just above the buffer
        clock.set_nanos((t0 + FRAME - buffer - Time::from_micros(500)).as_nanos());
        assert!(!swapper.should_swap());

        // Slack exactly at the buffer boundary is not yet due
        clock.set_nanos((t0 + FRAME - buffer).as_nanos());
        assert!(!swapper.should_swap());

        // Inside the buffer
        clock.set_nanos((t0 + FRAME - buffer + Time::from_micros(500)).as_nanos());
        assert!(swapper.should_swap());
    }
}

#[cfg(test)]
mod sync_point_scenarios {
    use super::support::*;
    use config_loader::{ConfigFormat, ConfigLoader};
    use contracts::{ManualClock, SharedClock, SwapData, Time};
    use std::sync::Arc;
    use sync_engine::{DataClient, DomainSynchronizer, SwapStore};

    const BLUEPRINT_TOML: &str = r#"
[display]
name = "display"
refresh_rate_hz = 60.0

[audio]
name = "audio"
sample_rate_hz = 48000.0
buffer_size = 480

[client]
data_collection_duration_ms = 1000.0
auto_update = true
swap_period_tolerance = 0.5
stoppage_period_multiplier = 4.0
"#;

    /// Scenario 4: a display-anchored sync point maps into audio
    /// sample frames.
    #[test]
    fn test_cross_domain_sync_point() {
        let blueprint = ConfigLoader::load_from_str(BLUEPRINT_TOML, ConfigFormat::Toml).unwrap();
        let manual = ManualClock::shared();
        let clock: SharedClock = manual.clone();

        let display_store = SwapStore::new(
            blueprint.display.name.clone(),
            blueprint.display.store_config(),
            Arc::clone(&clock),
        );
        let audio_spec = blueprint.audio.as_ref().unwrap();
        let audio_store = SwapStore::new(
            audio_spec.name.clone(),
            audio_spec.store_config(),
            Arc::clone(&clock),
        );

        let display_client = Arc::new(DataClient::new(
            Arc::clone(&display_store),
            blueprint.client.client_config(),
        ));
        let audio_client = Arc::new(DataClient::new(
            Arc::clone(&audio_store),
            blueprint.client.client_config(),
        ));

        let sync = DomainSynchronizer::new(Arc::clone(&clock));
        sync.add_data_client("display", display_client).unwrap();
        sync.add_data_client("audio", audio_client).unwrap();

        // Display swaps every 1/60 s; audio buffers every 10 ms carrying
        // 480 sample frames. Both run to ~1.7 s.
        let frame = display_store.nominal_swap_period();
        for k in 0..=102i64 {
            display_store.store_swap_time(Time::from_nanos(k * frame.as_nanos()));
        }
        for k in 0..=170u64 {
            audio_store.store_swap(SwapData::new(Time::from_millis(10 * k as i64), 480 * k));
        }
        manual.set_nanos(Time::from_millis(1705).as_nanos());

        assert!(sync.all_ready(), "status:\n{}", sync.status_string());

        let point = sync.get_sync_point_for_unit("display", 100).unwrap();
        assert!(point.valid());

        // Root time: display unit 100 at ~1666.7 ms
        let expected_root = Time::from_nanos(100 * frame.as_nanos());
        assert!(
            (point.time.pred - expected_root).abs() < Time::from_millis(1),
            "root {} expected {}",
            point.time.pred,
            expected_root
        );

        // Audio maps to ~80_000 sample frames, within two buffers
        let audio = &point.clients["audio"];
        assert!(audio.ready);
        assert!(
            (audio.prediction.pred - 80_000.0).abs() <= 960.0,
            "audio unit {}",
            audio.prediction.pred
        );

        let unknown = sync.get_sync_point_for_unit("midi", 100);
        assert!(unknown.is_err());
    }
}

#[cfg(test)]
mod presenter_scenarios {
    use super::support::*;
    use contracts::{
        DataClientConfig, DisplaySwapperConfig, ManualClock, RenderContent, SharedClock,
        SlidePresenterConfig, SlideStatus, SwapStoreConfig, Time,
    };
    use observability::PresentationStatsAggregator;
    use parking_lot::Mutex;
    use presenter::{FinalSlideOutcome, SharedDisplay, Slide, SlidePresenter};
    use sources::MockDisplay;
    use std::sync::Arc;
    use sync_engine::{DataClient, SwapStore};

    fn draw() -> RenderContent {
        RenderContent::Draw(Arc::new(|| {}))
    }

    /// Presenter over a simulated display that advances the manual clock
    /// one vsync per swap. The safety buffer exceeds the frame period so
    /// every update tick issues exactly one swap.
    fn rig(configure: impl FnOnce(&mut MockDisplay)) -> (SlidePresenter, Arc<ManualClock>) {
        let manual = ManualClock::shared();
        let clock: SharedClock = manual.clone();
        let store = SwapStore::new(
            "display",
            SwapStoreConfig {
                nominal_swap_period: FRAME,
                ..Default::default()
            },
            clock,
        );
        let client = Arc::new(DataClient::new(
            Arc::clone(&store),
            DataClientConfig::default(),
        ));

        let mut mock = MockDisplay::simulated(manual.clone(), FRAME);
        configure(&mut mock);
        let display: SharedDisplay = Arc::new(Mutex::new(Box::new(mock)));

        let presenter = SlidePresenter::setup(
            display,
            client,
            DisplaySwapperConfig {
                pre_swap_safety_buffer: FRAME + Time::from_millis(1),
                ..Default::default()
            },
            SlidePresenterConfig {
                pre_swap_cpu_hogging_duration: Time::ZERO,
                ..Default::default()
            },
        )
        .unwrap();
        (presenter, manual)
    }

    /// Scenario 5: three 200 ms slides, a 1 ms final slide whose
    /// callback appends two 100 ms slides, all on an ideal display.
    #[test]
    fn test_final_slide_callback_appends_and_rebasing() {
        let (mut presenter, _clock) = rig(|_| {});

        for name in ["a", "b", "c"] {
            presenter.append_slide(Slide::new(name, draw(), Time::from_millis(200)));
        }
        presenter.append_slide(Slide::new("final", draw(), Time::from_millis(1)));

        presenter.set_final_slide_callback(Box::new({
            let mut fired = 0usize;
            move || {
                fired += 1;
                if fired == 1 {
                    FinalSlideOutcome::append(vec![
                        Slide::new("d", draw(), Time::from_millis(100)),
                        Slide::new("e", draw(), Time::from_millis(100)),
                    ])
                } else {
                    FinalSlideOutcome::done()
                }
            }
        }));

        presenter.present_slides().unwrap();

        assert_eq!(presenter.slide_count(), 6);
        assert!(presenter
            .slides()
            .iter()
            .all(|s| s.status() == SlideStatus::Finished));

        // 200 ms at 60 Hz rounds to 12 frames; 100 ms to 6; 1 ms to the
        // single-frame minimum.
        let counts = presenter.actual_frame_counts();
        let expected = [
            ("a", 12u64),
            ("b", 12),
            ("c", 12),
            ("final", 1),
            ("d", 6),
            ("e", 6),
        ];
        for ((name, frames), (want_name, want_frames)) in counts.iter().zip(expected.iter()) {
            assert_eq!(name.as_str(), *want_name);
            assert_eq!(frames, want_frames, "slide {name}");
        }

        // Appended slides are rebased off the final slide's actual onset
        let final_slide = presenter.slide_by_name("final").unwrap();
        let d = presenter.slide_by_name("d").unwrap();
        assert_eq!(
            d.intended().start_time,
            final_slide.actual().start_time + Time::from_millis(1)
        );
        assert_eq!(
            d.intended().start_frame,
            final_slide.actual().start_frame + 1
        );

        assert!(presenter.check_for_presentation_errors().is_clean());

        // Aggregated timing errors stay tiny on an ideal display
        let mut stats = PresentationStatsAggregator::new();
        for slide in presenter.slides() {
            stats.record_slide(
                slide.intended().start_time,
                slide.actual().start_time,
                slide.intended().duration,
                slide.actual().duration,
            );
        }
        let summary = stats.summary();
        assert_eq!(summary.slides_presented, 6);
        // Onsets land on the frame grid, so no slide misses its
        // intended onset by a full frame period.
        assert!(summary.onset_error_ms.max < FRAME.as_millis_f64());
    }

    /// Scenario 6: a two-frame stall inside the second slide stretches
    /// its actual duration, inflates its actual frame count via the
    /// display's jumped frame numbers, and shifts the third slide's
    /// actual onset past its intended one.
    #[test]
    fn test_two_frame_stall_shifts_downstream_onsets() {
        // Display frame 18 lands mid-slide-b (frames 12..24)
        let (mut presenter, _clock) = rig(|mock| mock.schedule_stall(18, 2));

        for name in ["a", "b", "c"] {
            presenter.append_slide(Slide::new(name, draw(), Time::from_millis(200)));
        }
        presenter.present_slides().unwrap();

        let a = presenter.slide_by_name("a").unwrap();
        let b = presenter.slide_by_name("b").unwrap();
        let c = presenter.slide_by_name("c").unwrap();

        // a is untouched; b carries the stall as two extra frame
        // periods of actual duration.
        assert_eq!(a.actual().duration, Time::from_nanos(12 * FRAME.as_nanos()));
        assert_eq!(a.actual().frame_count, 12);
        assert_eq!(b.actual().duration, Time::from_nanos(14 * FRAME.as_nanos()));

        // b was shown for 12 committed swaps, but the display skipped
        // two vsyncs during the stall: 14 frames actually elapsed.
        assert_eq!(b.actual().frame_count, 14);
        assert_eq!(b.intended().frame_count, 12);
        assert_eq!(
            c.actual().start_frame - b.actual().start_frame,
            14
        );

        // PropagateDelays: c's intended onset is rebased from b's
        // actual onset plus b's full intended duration.
        assert_eq!(
            c.intended().start_time,
            b.actual().start_time + Time::from_millis(200)
        );
        assert_eq!(
            c.actual().start_time - b.actual().start_time,
            Time::from_nanos(14 * FRAME.as_nanos())
        );

        let errors = presenter.check_for_presentation_errors();
        assert_eq!(errors.incorrect_frame_counts, vec!["b".to_string()]);
        // The stall pushed c's back-buffer copy past its intended onset
        assert_eq!(errors.late_copies, vec!["c".to_string()]);
    }

    /// Propagate-delays invariant: every intended onset equals the
    /// predecessor's actual onset plus the predecessor's intended
    /// duration.
    #[test]
    fn test_propagate_delays_invariant() {
        let (mut presenter, _clock) = rig(|mock| mock.schedule_stall(5, 1));

        for (name, ms) in [("s0", 100), ("s1", 150), ("s2", 100), ("s3", 200)] {
            presenter.append_slide(Slide::new(name, draw(), Time::from_millis(ms)));
        }
        presenter.present_slides().unwrap();

        let slides = presenter.slides();
        for i in 1..slides.len() {
            assert_eq!(
                slides[i].intended().start_time,
                slides[i - 1].actual().start_time + slides[i - 1].intended().duration,
                "slide {}",
                slides[i].name()
            );
        }
    }
}
