//! End-to-end replay tests: scenario setup and playback against a recording
//! chart, plus property tests for the feed's push guarantees.

mod common;

use chartreplay::domain::feed::{ReplayFeed, RunOutcome, StopHandle};
use chartreplay::domain::overlay::{OverlayPoint, overlay_samples};
use chartreplay::domain::scenario::{ReplayConfig, Scenario};
use chartreplay::domain::split::SplitPoint;
use chartreplay::ports::chart_port::{ChartReplaySink, SeriesHandle};
use common::*;
use proptest::prelude::*;
use std::time::Duration;

fn instant_config() -> ReplayConfig {
    ReplayConfig {
        interval: Duration::ZERO,
        ..ReplayConfig::default()
    }
}

mod scenario_playback {
    use super::*;

    #[test]
    fn setup_then_play_drives_chart_in_order() {
        let data = MockDataPort::new().with_bars("ohlcv", generate_bars(0, 10, 100.0));
        let scenario = Scenario::new(instant_config());
        let mut chart = RecordingChart::new();

        let session = scenario.setup(&mut chart, "ohlcv").unwrap();
        let summary = scenario
            .play(&mut chart, &session, &data, "ohlcv", &StopHandle::new())
            .unwrap();

        assert_eq!(
            &chart.calls[..4],
            &[
                ChartCall::Legend(true),
                ChartCall::Textbox("symbol".into(), "ohlcv".into()),
                ChartCall::Search,
                ChartCall::CreateOverlay("HL50".into()),
            ]
        );
        assert_eq!(chart.calls[4], ChartCall::Spinner(true));
        assert_eq!(chart.calls[5], ChartCall::Spinner(false));
        assert_eq!(chart.sets(), vec![vec![0, 60, 120, 180, 240]]);
        assert_eq!(
            chart.calls[7],
            ChartCall::TopbarText("symbol".into(), "ohlcv".into())
        );
        match &chart.calls[8] {
            ChartCall::SetOverlay(0, points) => assert_eq!(points.len(), 5),
            other => panic!("expected SetOverlay, got {other:?}"),
        }

        // bar at index 5 is withheld by the split gap
        assert_eq!(chart.updates(), vec![360, 420, 480, 540]);
        assert_eq!(summary.bars_pushed, 4);
        assert_eq!(summary.overlays_pushed, 4);
        assert_eq!(summary.outcome, RunOutcome::Completed);
    }

    #[test]
    fn each_bar_update_is_followed_by_its_overlay() {
        let data = MockDataPort::new().with_bars("ohlcv", generate_bars(0, 6, 100.0));
        let scenario = Scenario::new(instant_config());
        let mut chart = RecordingChart::new();
        let session = scenario.setup(&mut chart, "ohlcv").unwrap();
        scenario
            .play(&mut chart, &session, &data, "ohlcv", &StopHandle::new())
            .unwrap();

        let tail: Vec<&ChartCall> = chart
            .calls
            .iter()
            .skip_while(|c| !matches!(c, ChartCall::Update(_)))
            .collect();
        // generate_bars: high = close + 1, low = close - 2 → midpoint = close - 0.5
        assert_eq!(
            tail,
            vec![
                &ChartCall::Update(240),
                &ChartCall::UpdateOverlay(
                    0,
                    OverlayPoint {
                        time: 240,
                        value: 103.5
                    }
                ),
                &ChartCall::Update(300),
                &ChartCall::UpdateOverlay(
                    0,
                    OverlayPoint {
                        time: 300,
                        value: 104.5
                    }
                ),
            ]
        );
    }

    #[test]
    fn column_values_with_gaps_skip_overlay_pushes() {
        let bars = vec![
            make_bar_with_value(1, Some(5.0)),
            make_bar_with_value(2, None),
            make_bar_with_value(3, Some(7.0)),
        ];
        let data = MockDataPort::new().with_bars("HL", bars);
        let scenario = Scenario::new(ReplayConfig {
            value_column: Some("HL".into()),
            split_ratio: 0.0,
            split_gap: 0,
            ..instant_config()
        });
        let mut chart = RecordingChart::new();
        let session = scenario.setup(&mut chart, "HL").unwrap();
        let summary = scenario
            .play(&mut chart, &session, &data, "HL", &StopHandle::new())
            .unwrap();

        assert_eq!(chart.updates(), vec![1, 2, 3]);
        assert_eq!(
            chart.overlay_updates(),
            vec![
                OverlayPoint {
                    time: 1,
                    value: 5.0
                },
                OverlayPoint {
                    time: 3,
                    value: 7.0
                }
            ]
        );
        assert_eq!(summary.overlays_skipped, 1);
    }

    #[test]
    fn disabled_overlay_creates_no_series() {
        let data = MockDataPort::new().with_bars("ohlcv", generate_bars(0, 4, 100.0));
        let scenario = Scenario::new(ReplayConfig {
            overlay: None,
            ..instant_config()
        });
        let mut chart = RecordingChart::new();
        let session = scenario.setup(&mut chart, "ohlcv").unwrap();
        assert_eq!(session.overlay, None);
        scenario
            .play(&mut chart, &session, &data, "ohlcv", &StopHandle::new())
            .unwrap();
        assert!(chart.overlay_updates().is_empty());
        assert!(
            !chart
                .calls
                .iter()
                .any(|c| matches!(c, ChartCall::CreateOverlay(_) | ChartCall::SetOverlay(..)))
        );
    }

    #[test]
    fn unsorted_dataset_fails_before_any_push() {
        let mut bars = generate_bars(0, 6, 100.0);
        bars.swap(1, 4);
        let data = MockDataPort::new().with_bars("ohlcv", bars);
        let scenario = Scenario::new(instant_config());
        let mut chart = RecordingChart::new();
        let session = scenario.setup(&mut chart, "ohlcv").unwrap();

        let err = scenario
            .play(&mut chart, &session, &data, "ohlcv", &StopHandle::new())
            .unwrap_err();

        assert!(matches!(err, ReplayError::InvalidInput { .. }));
        assert!(chart.sets().is_empty());
        assert!(chart.updates().is_empty());
        // spinner is cleared even when loading fails
        assert_eq!(chart.calls.last(), Some(&ChartCall::Spinner(false)));
    }

    #[test]
    fn single_bar_dataset_pushes_nothing() {
        let data = MockDataPort::new().with_bars("one", generate_bars(0, 1, 100.0));
        let scenario = Scenario::new(instant_config());
        let mut chart = RecordingChart::new();
        let session = scenario.setup(&mut chart, "one").unwrap();
        let summary = scenario
            .play(&mut chart, &session, &data, "one", &StopHandle::new())
            .unwrap();
        assert_eq!(chart.sets(), vec![Vec::<i64>::new()]);
        assert!(chart.updates().is_empty());
        assert_eq!(summary.outcome, RunOutcome::Completed);
    }

    #[test]
    fn sink_failure_aborts_remaining_replay() {
        let data = MockDataPort::new().with_bars("ohlcv", generate_bars(0, 10, 100.0));
        let scenario = Scenario::new(instant_config());
        let mut chart = RecordingChart {
            fail_update_at: Some(420),
            ..RecordingChart::new()
        };
        let session = scenario.setup(&mut chart, "ohlcv").unwrap();
        let err = scenario
            .play(&mut chart, &session, &data, "ohlcv", &StopHandle::new())
            .unwrap_err();
        assert!(matches!(err, ReplayError::Sink(_)));
        assert_eq!(chart.updates(), vec![360]);
    }

    #[test]
    fn stopped_handle_prevents_replay_but_not_initial_frame() {
        let data = MockDataPort::new().with_bars("ohlcv", generate_bars(0, 10, 100.0));
        let scenario = Scenario::new(instant_config());
        let mut chart = RecordingChart::new();
        let session = scenario.setup(&mut chart, "ohlcv").unwrap();
        let stop = StopHandle::new();
        stop.stop();
        let summary = scenario
            .play(&mut chart, &session, &data, "ohlcv", &stop)
            .unwrap();
        assert_eq!(chart.sets().len(), 1);
        assert!(chart.updates().is_empty());
        assert_eq!(summary.outcome, RunOutcome::Stopped);
    }

    #[test]
    fn custom_topbar_text_survives_first_replay() {
        let data = MockDataPort::new().with_bars("ohlcv", generate_bars(0, 4, 100.0));
        let mut config = instant_config();
        config.chart.topbar_text = Some("Example".into());
        config.chart.legend = false;
        config.chart.search = false;
        let scenario = Scenario::new(config);
        let mut chart = RecordingChart::new();

        let session = scenario.setup(&mut chart, "ohlcv").unwrap();
        assert!(session.keep_label);
        assert_eq!(
            chart.calls,
            vec![
                ChartCall::Textbox("symbol".into(), "Example".into()),
                ChartCall::CreateOverlay("HL50".into()),
            ]
        );

        scenario
            .play(&mut chart, &session, &data, "ohlcv", &StopHandle::new())
            .unwrap();
        assert!(
            !chart
                .calls
                .iter()
                .any(|c| matches!(c, ChartCall::TopbarText(..)))
        );
    }
}

mod feed_properties {
    use super::*;

    #[test]
    fn midpoint_overlay_example() {
        let bars = vec![
            make_bar_with_value(1, Some(5.0)),
            make_bar_with_value(2, None),
            make_bar_with_value(3, Some(7.0)),
        ];
        let overlays = overlay_samples(&bars);
        let feed = ReplayFeed::initialize(bars, overlays, Duration::ZERO).unwrap();
        let mut chart = RecordingChart::new();
        let mut sink = ChartReplaySink::new(&mut chart, Some(SeriesHandle(0)));
        feed.run(&mut sink).unwrap();

        let pushed: Vec<(i64, f64)> = chart
            .overlay_updates()
            .iter()
            .map(|p| (p.time, p.value))
            .collect();
        assert_eq!(pushed, vec![(1, 5.0), (3, 7.0)]);
    }

    fn times(n: usize) -> Vec<i64> {
        (0..n as i64).map(|i| 1_000 + i * 60).collect()
    }

    proptest! {
        #[test]
        fn pushes_match_post_split_bars(
            n in 1usize..80,
            ratio in 0.0f64..=1.0,
            gap in 0usize..3,
        ) {
            let bars = generate_bars(1_000, n, 50.0);
            let split = SplitPoint::from_ratio(n, ratio, gap);
            let feed = ReplayFeed::initialize_split(bars, vec![], split, Duration::ZERO).unwrap();
            let mut chart = RecordingChart::new();
            let mut sink = ChartReplaySink::new(&mut chart, None);
            let summary = feed.run(&mut sink).unwrap();

            let expected: Vec<i64> = times(n)[split.replay_start(n)..].to_vec();
            prop_assert_eq!(chart.updates(), expected);
            prop_assert_eq!(summary.bars_pushed, split.replay_len(n));
            prop_assert_eq!(summary.cursor, n);
        }

        #[test]
        fn overlay_pushed_iff_value_present(
            values in proptest::collection::vec(proptest::option::of(-1e6f64..1e6), 1..60),
        ) {
            let bars: Vec<Bar> = values
                .iter()
                .enumerate()
                .map(|(i, v)| make_bar_with_value(i as i64, *v))
                .collect();
            let overlays = overlay_samples(&bars);
            let feed = ReplayFeed::initialize(bars, overlays, Duration::ZERO).unwrap();
            let mut chart = RecordingChart::new();
            let mut sink = ChartReplaySink::new(&mut chart, Some(SeriesHandle(0)));
            feed.run(&mut sink).unwrap();

            let expected: Vec<i64> = values
                .iter()
                .enumerate()
                .filter(|(_, v)| v.is_some())
                .map(|(i, _)| i as i64)
                .collect();
            let pushed: Vec<i64> = chart.overlay_updates().iter().map(|p| p.time).collect();
            prop_assert_eq!(pushed, expected);
        }

        #[test]
        fn no_push_after_stop(n in 1usize..40, k in 1usize..40) {
            let bars = generate_bars(0, n, 10.0);
            let feed = ReplayFeed::initialize(bars, vec![], Duration::ZERO).unwrap();
            let stop = feed.stop_handle();
            let mut sink = StopAfter { stop, after: k, pushed: 0 };
            let summary = feed.run(&mut sink).unwrap();

            prop_assert_eq!(sink.pushed, k.min(n));
            if k < n {
                prop_assert_eq!(summary.outcome, RunOutcome::Stopped);
            } else {
                prop_assert_eq!(summary.outcome, RunOutcome::Completed);
            }
        }
    }

    struct StopAfter {
        stop: StopHandle,
        after: usize,
        pushed: usize,
    }

    impl chartreplay::ports::chart_port::ReplaySink for StopAfter {
        fn update(&mut self, _bar: &Bar) -> Result<(), SinkError> {
            assert!(!self.stop.is_stopped(), "pushed after stop");
            self.pushed += 1;
            if self.pushed == self.after {
                self.stop.stop();
            }
            Ok(())
        }

        fn update_overlay(&mut self, _point: &OverlayPoint) -> Result<(), SinkError> {
            Ok(())
        }
    }
}
