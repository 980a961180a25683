//! End-to-end checks of the provider, evaluator and refresh cycle through the public API.

use std::collections::HashSet;
use std::io::Write;

use chrono::Utc;
use scrap_monitor::aggregation::group_by_machine;
use scrap_monitor::config::{Config, MachineProfile};
use scrap_monitor::dashboard::{Dashboard, Selection};
use scrap_monitor::error::{SelectionError, SourceError};
use scrap_monitor::evaluator::AlertEvaluator;
use scrap_monitor::provider::simulated::SimulatedProvider;
use scrap_monitor::provider::{create_provider, MetricsProvider};
use scrap_monitor::types::{AlertLevel, ProductionRecord, Snapshot, TimeWindow};

fn seeded_config(seed: u64) -> Config {
    let mut config = Config::default();
    config.generator.seed = Some(seed);
    config.alerting.log_banners = false;
    config
}

#[tokio::test]
async fn snapshots_hold_invariants_for_any_selection() {
    let provider = create_provider(&seeded_config(21)).unwrap();
    let machines = provider.machine_list();
    assert!(!machines.is_empty());

    for window in TimeWindow::ALL {
        for take in 1..=machines.len() {
            let selection: Vec<String> = machines.iter().skip(take - 1).take(take).cloned().collect();
            let snap = provider.snapshot(&selection, window).await.unwrap();
            let allowed: HashSet<&str> = selection.iter().map(String::as_str).collect();
            for r in &snap.records {
                assert!(allowed.contains(r.machine_id.as_str()));
                assert!(r.scrap_quantity <= r.total_production);
                if r.total_production > 0 {
                    let expected = 100.0 * r.scrap_quantity as f64 / r.total_production as f64;
                    assert!((r.scrap_rate - expected).abs() < 1e-6);
                } else {
                    assert_eq!(r.scrap_rate, 0.0);
                }
            }
        }
    }
}

#[tokio::test]
async fn empty_selection_fails_fast() {
    let provider = create_provider(&seeded_config(1)).unwrap();
    let result = provider.snapshot(&[], TimeWindow::LastDay).await;
    assert!(matches!(
        result,
        Err(SourceError::Selection(SelectionError::EmptyMachineSelection))
    ));
}

#[test]
fn unknown_window_token_is_a_selection_error() {
    let err = "fortnight".parse::<TimeWindow>().unwrap_err();
    assert_eq!(err, SelectionError::UnknownWindow("fortnight".into()));
    assert!(err.to_string().contains("1h, 8h, 24h, 7d"));
}

#[test]
fn evaluator_thresholds_on_synthetic_snapshots() {
    let evaluator = AlertEvaluator::new(&Config::default());
    let build = |scrap: u32| {
        let now = Utc::now();
        let records = ["M001", "M002", "M003"]
            .iter()
            .map(|m| ProductionRecord::new(now, *m, 500, scrap, 3.0, 0.0))
            .collect();
        Snapshot::new(TimeWindow::LastHour, vec![], records)
    };

    // 30 / 500 = 6%
    let alerts = evaluator.evaluate(&build(30));
    let critical: Vec<_> = alerts.iter().filter(|a| a.level == AlertLevel::Critical).collect();
    assert_eq!(critical.len(), 1);
    assert!(critical[0].message.starts_with("Overall scrap rate is 6.00%"));

    // 5 / 500 = 1%
    assert!(evaluator.evaluate(&build(5)).is_empty());

    // still 1% overall, but spread unevenly across machines
    let now = Utc::now();
    let uneven = Snapshot::new(
        TimeWindow::LastHour,
        vec![],
        vec![
            ProductionRecord::new(now, "M001", 1000, 5, 3.0, 0.0),
            ProductionRecord::new(now, "M002", 1000, 15, 3.0, 0.0),
        ],
    );
    assert!(evaluator.evaluate(&uneven).is_empty());

    let empty = Snapshot::new(TimeWindow::LastHour, vec![], vec![]);
    assert!(evaluator.evaluate(&empty).is_empty());
}

#[test]
fn generated_stoppages_are_caught_on_every_window() {
    let mut config = seeded_config(17);
    config.machines = vec![
        MachineProfile::new("P1", 12_000.0, 2.0, 5.0),
        MachineProfile::new("P2", 12_000.0, 2.0, 5.0),
        MachineProfile::new("P3", 12_000.0, 2.0, 5.0),
    ];
    config.generator.downtime_probability = 0.5;
    config.generator.production_variation = 0.1;
    config.generator.scrap_rate_variation = 0.2;
    config.generator.spike_scrap_multiplier = 4.0;
    let provider = SimulatedProvider::new(&config).unwrap();
    let evaluator = AlertEvaluator::new(&config);

    for window in TimeWindow::ALL {
        let snap = provider.generate(&provider.machine_list(), window, Utc::now()).unwrap();
        let stoppage = config.thresholds.stoppage_minutes(window.interval_minutes());
        assert!(
            snap.records.iter().any(|r| r.downtime_minutes >= stoppage),
            "no stoppages generated for {}",
            window
        );
        let alerts = evaluator.evaluate(&snap);
        assert!(
            alerts.iter().any(|a| a.rule == "downtime_correlation"),
            "no downtime alert for {}: {:?}",
            window,
            alerts
        );
    }
}

#[test]
fn grouping_the_same_snapshot_twice_is_identical() {
    let provider = SimulatedProvider::new(&seeded_config(4)).unwrap();
    let snap = provider
        .generate(&provider.machine_list(), TimeWindow::LastWeek, Utc::now())
        .unwrap();
    let first = group_by_machine(&snap);
    let second = group_by_machine(&snap);
    assert_eq!(first, second);
    assert_eq!(first.len(), provider.machine_list().len());
    let total: u64 = first.iter().map(|g| g.total_production).sum();
    assert_eq!(total, snap.total_production());
}

#[tokio::test]
async fn supplementary_panels_are_well_formed() {
    let config = seeded_config(8);
    let provider = create_provider(&config).unwrap();

    let causes = provider.root_causes().await.unwrap();
    assert!(!causes.is_empty());

    let shifts = provider.shift_summary().await.unwrap();
    assert_eq!(shifts.len(), config.shifts.len());
    assert!(shifts.iter().all(|s| (0.0..=100.0).contains(&s.scrap_rate)));
}

#[tokio::test]
async fn dashboard_runs_from_a_config_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        r#"
[dashboard]
site = "line-4"
default_window = "8h"

[generator]
seed = 99

[alerting]
log_banners = false

[[machines]]
id = "CNC-1"
base_production_per_hour = 90.0
base_scrap_rate = 2.0
unit_cost = 40.0

[[machines]]
id = "CNC-2"
base_production_per_hour = 70.0
base_scrap_rate = 6.5
unit_cost = 40.0
"#
    )
    .unwrap();

    let config = Config::load(file.path().to_str().unwrap()).unwrap();
    assert_eq!(config.dashboard.site, "line-4");

    let dashboard = Dashboard::from_config(&config).unwrap();
    assert_eq!(dashboard.machine_list(), vec!["CNC-1", "CNC-2"]);

    let window: TimeWindow = config.dashboard.default_window.parse().unwrap();
    let selection = dashboard.default_selection(config.dashboard.default_machine_count, window);
    assert_eq!(selection.machines.len(), 2);

    let report = dashboard.refresh(&selection).await.unwrap();
    assert!(!report.stale);
    let snap = report.snapshot.as_ref().unwrap();
    assert_eq!(snap.len(), 2 * TimeWindow::LastEightHours.samples_per_machine());
    assert_eq!(report.machines.len(), 2);
    assert!(report.kpis.is_some());

    // the report is what the shell serializes
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["selection"]["window"], "8h");
    assert!(json["snapshot"]["records"].as_array().unwrap().len() > 0);
}

#[tokio::test]
async fn refresh_rejects_unknown_machines() {
    let dashboard = Dashboard::from_config(&seeded_config(2)).unwrap();
    let err = dashboard
        .refresh(&Selection::new(vec!["M404".into()], TimeWindow::LastHour))
        .await
        .unwrap_err();
    assert_eq!(err, SelectionError::UnknownMachine("M404".into()));
}
