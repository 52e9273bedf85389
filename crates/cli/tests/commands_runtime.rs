use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use demand_cli::commands::{analyze, config};
use serde_json::Value;
use tempfile::TempDir;

const HEADER: &str = "store_id,product_id,date,quantity_sold";

fn write_csv(dir: &TempDir, name: &str, rows: &[&str]) -> PathBuf {
    let path = dir.path().join(name);
    let mut body = String::from(HEADER);
    for row in rows {
        body.push('\n');
        body.push_str(row);
    }
    fs::write(&path, body).expect("write csv fixture");
    path
}

fn spike_and_rise_csv(dir: &TempDir) -> PathBuf {
    let spike = [100, 100, 100, 100, 100, 100, 250];
    let rise = [100, 102, 98, 101, 99, 100, 140];
    let mut rows = Vec::new();
    for (day, (spike_qty, rise_qty)) in spike.iter().zip(rise).enumerate() {
        let date = format!("2025-06-{:02}", day + 1);
        rows.push(format!("north,cough-syrup,{date},{}", spike_qty / 2));
        rows.push(format!("south,cough-syrup,{date},{}", spike_qty - spike_qty / 2));
        rows.push(format!("north,vitamin-d,{date},{rise_qty}"));
    }
    let rows: Vec<&str> = rows.iter().map(String::as_str).collect();
    write_csv(dir, "sales.csv", &rows)
}

fn args(input: &Path) -> analyze::AnalyzeArgs {
    let mut args = analyze::AnalyzeArgs::new(input);
    args.report_date = chrono::NaiveDate::from_ymd_opt(2025, 6, 8);
    args
}

#[test]
fn analyze_prints_text_report_for_valid_input() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = spike_and_rise_csv(&dir);

        let result = analyze::run(&args(&input));
        assert_eq!(result.exit_code, 0, "expected successful analysis: {}", result.output);
        assert!(result.output.starts_with("DAILY DEMAND SUMMARY REPORT - 2025-06-08"));
        assert!(result.output.contains("Stores detected   : 2"));
        assert!(result.output.contains("Product: cough-syrup"));
        assert!(result.output.contains("Detected Trend       : spiky"));
        assert!(result.output.contains("INCREASE_STOCK"));
    });
}

#[test]
fn analyze_emits_json_report_when_requested() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = spike_and_rise_csv(&dir);
        let mut args = args(&input);
        args.format = "json".parse().expect("json format");

        let result = analyze::run(&args);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["report_date"], "2025-06-08");
        assert_eq!(payload["entries"][0]["product_id"], "cough-syrup");
        assert_eq!(payload["entries"][0]["action"], "review_data");
        assert_eq!(payload["entries"][1]["trend"], "increasing");
    });
}

#[test]
fn analyze_writes_report_file_and_returns_success_envelope() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = spike_and_rise_csv(&dir);
        let output = dir.path().join("report.txt");
        let mut args = args(&input);
        args.output = Some(output.clone());

        let result = analyze::run(&args);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "analyze");
        assert_eq!(payload["status"], "ok");

        let written = fs::read_to_string(&output).expect("report file exists");
        assert!(written.contains("DETAILED PRODUCT-LEVEL INSIGHTS"));
    });
}

#[test]
fn analyze_rejects_negative_quantity_with_input_exit_code() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = write_csv(
            &dir,
            "bad.csv",
            &["north,saline,2025-06-01,4", "north,saline,2025-06-02,-1"],
        );

        let result = analyze::run(&args(&input));
        assert_eq!(result.exit_code, 3);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "input_validation");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("row 3"), "unexpected message: {message}");
        assert!(message.contains("saline"));
    });
}

#[test]
fn analyze_rejects_missing_columns() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("partial.csv");
        fs::write(&path, "product_id,quantity_sold\nsaline,4\n").expect("write csv");

        let result = analyze::run(&args(&path));
        assert_eq!(result.exit_code, 3);
        let payload = parse_payload(&result.output);
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("store_id") && message.contains("date"));
    });
}

#[test]
fn analyze_rejects_invalid_rule_configuration() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = spike_and_rise_csv(&dir);
        let mut args = args(&input);
        args.window_size = Some(2);

        let result = analyze::run(&args);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn analyze_reports_unwritable_output() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = spike_and_rise_csv(&dir);
        let mut args = args(&input);
        args.output = Some(dir.path().join("missing-dir").join("report.txt"));

        let result = analyze::run(&args);
        assert_eq!(result.exit_code, 4);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "output_write");
    });
}

#[test]
fn analyze_applies_env_and_cli_overrides() {
    with_env(&[("DEMAND_SIGNAL_MIN_DATA_POINTS", "10"), ("DEMAND_SIGNAL_WINDOW_SIZE", "14")], || {
        let dir = TempDir::new().expect("temp dir");
        let input = spike_and_rise_csv(&dir);

        let from_env = analyze::run(&args(&input));
        assert_eq!(from_env.exit_code, 0);
        assert!(from_env.output.contains("Products flagged for REVIEW"));
        assert!(!from_env.output.contains("INCREASE_STOCK"));

        let mut cli_args = args(&input);
        cli_args.min_data_points = Some(3);
        let from_cli = analyze::run(&cli_args);
        assert_eq!(from_cli.exit_code, 0);
        assert!(from_cli.output.contains("INCREASE_STOCK"));
    });
}

#[test]
fn analyze_reads_explicit_config_file() {
    with_env(&[], || {
        let dir = TempDir::new().expect("temp dir");
        let input = spike_and_rise_csv(&dir);
        let config_path = dir.path().join("demand-signal.toml");
        let lenient = "[engine]\nspiky_jump_threshold = 2.0\nspiky_volatility_threshold = 2.0\n";
        fs::write(&config_path, lenient).expect("write config");

        let mut with_file = args(&input);
        with_file.config = Some(config_path);
        let result = analyze::run(&with_file);
        assert_eq!(result.exit_code, 0);
        assert!(!result.output.contains("Detected Trend       : spiky"));

        let mut missing = args(&input);
        missing.config = Some(dir.path().join("absent.toml"));
        let result = analyze::run(&missing);
        assert_eq!(result.exit_code, 2);
    });
}

#[test]
fn config_reports_source_attribution() {
    with_env(&[("DEMAND_SIGNAL_WINDOW_SIZE", "14")], || {
        let dir = TempDir::new().expect("temp dir");
        let config_path = dir.path().join("demand-signal.toml");
        fs::write(&config_path, "[engine]\nstable_band = 0.3\n\n[logging]\nformat = \"json\"\n")
            .expect("write config");

        let result = config::run(Some(config_path.as_path()));
        assert_eq!(result.exit_code, 0);

        let output = &result.output;
        assert!(
            output.contains("engine.window_size = 14 (source: env (DEMAND_SIGNAL_WINDOW_SIZE))")
        );
        assert!(output.contains("engine.increase_threshold = 0.3 (source: file ("));
        assert!(output.contains("engine.decrease_threshold = -0.3 (source: file ("));
        assert!(output.contains("logging.format = json (source: file ("));
        assert!(output.contains("engine.min_data_points = 3 (source: default)"));
    });
}

#[test]
fn config_reports_validation_failure() {
    with_env(&[("DEMAND_SIGNAL_WINDOW_SIZE", "zero")], || {
        let result = config::run(None);
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["error_class"], "config_validation");
        let message = payload["message"].as_str().unwrap_or("");
        assert!(message.contains("DEMAND_SIGNAL_WINDOW_SIZE"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard = match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };

    let keys = [
        "DEMAND_SIGNAL_WINDOW_SIZE",
        "DEMAND_SIGNAL_MIN_DATA_POINTS",
        "DEMAND_SIGNAL_STABLE_BAND",
        "DEMAND_SIGNAL_INCREASE_THRESHOLD",
        "DEMAND_SIGNAL_DECREASE_THRESHOLD",
        "DEMAND_SIGNAL_SPIKY_VOLATILITY_THRESHOLD",
        "DEMAND_SIGNAL_SPIKY_JUMP_THRESHOLD",
        "DEMAND_SIGNAL_FILL_MISSING_DATES",
        "DEMAND_SIGNAL_LOGGING_LEVEL",
        "DEMAND_SIGNAL_LOGGING_FORMAT",
        "DEMAND_SIGNAL_LOG_LEVEL",
        "DEMAND_SIGNAL_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
