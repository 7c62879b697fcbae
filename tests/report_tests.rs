// /tests/report_tests.rs
use fillbench::report::{header_line, row_line};
use fillbench::runner::{BenchmarkRunner, FixedProbe, Row};
use fillbench::{BenchConfig, DeviceSet, Measurement, Reporter, Strategy};

fn cpu_only_runner(lengths: Vec<usize>) -> BenchmarkRunner<FixedProbe> {
    let config = BenchConfig {
        lengths,
        hold_on_exit: false,
        ..BenchConfig::default()
    };
    BenchmarkRunner::new(config, FixedProbe(DeviceSet::cpu_only()))
}

fn unavailable_row(length: usize) -> Row {
    Row {
        length,
        cells: Strategy::ALL
            .iter()
            .map(|&s| (s, Measurement::Unavailable))
            .collect(),
    }
}

#[test]
fn test_header_labels() {
    let fields: Vec<String> = header_line().split_whitespace().map(String::from).collect();
    assert_eq!(fields, vec!["Length", "SingleThread", "TPL", "CLA", "CUDA"]);
}

#[test]
fn test_length_field_thousands_separated() {
    let line = row_line(&unavailable_row(2_146_435_071));
    assert!(line.starts_with("2,146,435,071       "));

    let line = row_line(&unavailable_row(10));
    assert_eq!(line.split_whitespace().next(), Some("10"));
}

#[test]
fn test_end_to_end_without_gpus() {
    let runner = cpu_only_runner(vec![1000]);
    let mut reporter = Reporter::new(Vec::new());
    let rows = runner.run(&mut reporter).expect("write to Vec cannot fail");

    let text = String::from_utf8(reporter.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(text.matches("SingleThread").count(), 1);
    assert!(lines[0].starts_with("Length"));
    assert_eq!(lines[1], "");
    assert_eq!(lines.len(), 3);

    let fields: Vec<&str> = lines[2].split_whitespace().collect();
    assert_eq!(fields.len(), 5);
    assert_eq!(fields[0], "1,000");
    assert!(fields[1].chars().all(|c| c.is_ascii_digit() || c == ','));
    assert!(fields[2].chars().all(|c| c.is_ascii_digit() || c == ','));
    assert_eq!(fields[3], "N/A");
    assert_eq!(fields[4], "N/A");

    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].measurement(Strategy::Portable), Some(&Measurement::Unavailable));
    assert_eq!(rows[0].measurement(Strategy::Cuda), Some(&Measurement::Unavailable));
}

#[test]
fn test_zero_length_completes_immediately() {
    let runner = cpu_only_runner(vec![0]);
    let row = runner.run_row(0);
    for strategy in [Strategy::Sequential, Strategy::Parallel] {
        match row.measurement(strategy) {
            Some(Measurement::Elapsed(d)) => assert!(d.as_millis() < 1000, "{:?} took {:?}", strategy, d),
            other => panic!("{:?} did not complete: {:?}", strategy, other),
        }
    }
}

#[test]
fn test_sweep_prints_header_once() {
    let runner = cpu_only_runner(vec![10, 1_000, 10_000]);
    let mut reporter = Reporter::new(Vec::new());
    runner.run(&mut reporter).unwrap();

    let text = String::from_utf8(reporter.into_inner()).unwrap();
    assert_eq!(text.matches("Length").count(), 1);
    let lengths: Vec<&str> = text
        .lines()
        .skip(2)
        .filter_map(|l| l.split_whitespace().next())
        .collect();
    assert_eq!(lengths, vec!["10", "1,000", "10,000"]);
}
