//! Composition layer tests: surfaces built purely out of proxy calls.

mod support;

use std::time::Duration;

use courier::{Args, ResultPolicy, Runtime, RuntimeConfig, Surface, DrawOptions, Timeout};
use serde_json::json;

use support::{ScriptedBackend, log_lines, log_position, new_log};

fn fast_config() -> RuntimeConfig {
    RuntimeConfig {
        min_pause: Duration::from_millis(1),
        max_pause: Duration::from_millis(5),
        drain_rounds: 10,
        call_timeout: Timeout::Duration(Duration::from_secs(5)),
    }
}

/// Blocks until everything enqueued on the method channel has executed.
fn flush(surface: &Surface) {
    surface
        .proxy()
        .call_method(
            surface.canvas().clone(),
            "region_count",
            Args::none(),
            ResultPolicy::Return,
        )
        .unwrap();
}

#[test]
fn plot_labels_series_and_refreshes_legend() {
    let log = new_log();
    let runtime = Runtime::spawn(ScriptedBackend::new(log.clone()), fast_config()).unwrap();

    let mut surface = Surface::new(runtime.proxy()).unwrap();
    assert_eq!(surface.canvas().as_str(), "o0");

    let opts = DrawOptions {
        legend: Some("speed".to_owned()),
        ..DrawOptions::default()
    };
    surface.plot(&[1.0, 2.0], &[3.0, 4.0], &opts).unwrap();
    assert_eq!(surface.series_count(), 1);
    flush(&surface);

    let lines = log_lines(&log);
    assert!(lines.contains(&"call:figure".to_owned()));
    assert!(lines.contains(&"canvas.add_subplot".to_owned()));
    assert!(
        log_position(&log, "region1.plot:[1.0,2.0]") < log_position(&log, "region1.legend")
    );

    runtime.shutdown();
}

#[test]
fn plot_fill_shades_under_the_line() {
    let log = new_log();
    let runtime = Runtime::spawn(ScriptedBackend::new(log.clone()), fast_config()).unwrap();

    let mut surface = Surface::new(runtime.proxy()).unwrap();
    surface
        .plot_fill(&[0.0, 1.0], &[2.0, 3.0], &DrawOptions::default(), 0.3)
        .unwrap();
    flush(&surface);

    assert!(
        log_position(&log, "region1.plot:[0.0,1.0]")
            < log_position(&log, "region1.fill_between:[0.0,1.0]")
    );

    runtime.shutdown();
}

#[test]
fn histogram_defaults_edge_color_to_series_color() {
    let log = new_log();
    let runtime = Runtime::spawn(ScriptedBackend::new(log), fast_config()).unwrap();

    let mut surface = Surface::new(runtime.proxy()).unwrap();
    let opts = DrawOptions {
        color: Some(json!([0.1, 0.2, 0.3])),
        ..DrawOptions::default()
    };
    surface.histogram(&[1.0, 1.0, 2.0, 5.0], &opts, None).unwrap();

    // The backend records the keyword names of the last drawing call; the
    // blocking stats call queues behind the hist on the same category.
    let stats = surface
        .proxy()
        .call_method("o1", "stats", Args::none(), ResultPolicy::Return)
        .unwrap()
        .unwrap();
    let last_kw = stats.value().unwrap()["last_kw"].clone();
    let names: Vec<String> = serde_json::from_value(last_kw).unwrap();
    assert!(names.contains(&"edgecolor".to_owned()));
    assert!(names.contains(&"alpha".to_owned()));
    assert!(names.contains(&"lw".to_owned()));

    runtime.shutdown();
}

#[test]
fn subregions_share_the_worker_and_stay_ordered() {
    let log = new_log();
    let runtime = Runtime::spawn(ScriptedBackend::new(log.clone()), fast_config()).unwrap();

    let mut parent = Surface::new(runtime.proxy()).unwrap();
    let mut child = parent.subregion(2, 2, 0, 0).unwrap();

    child.plot(&[1.0], &[2.0], &DrawOptions::default()).unwrap();
    parent.plot(&[3.0], &[4.0], &DrawOptions::default()).unwrap();
    flush(&parent);

    // The child got the first region, the parent lazily created the second,
    // and the child's draw was enqueued (and so executed) first.
    assert!(
        log_position(&log, "region1.plot:[1.0]") < log_position(&log, "region2.plot:[3.0]")
    );

    runtime.shutdown();
}

#[test]
fn set_style_goes_through_the_stateless_namespace() {
    let log = new_log();
    let runtime = Runtime::spawn(ScriptedBackend::new(log.clone()), fast_config()).unwrap();

    let surface = Surface::new(runtime.proxy()).unwrap();
    surface.set_style("whitegrid").unwrap();

    // Flush the namespaced channel with a blocking call on it.
    surface
        .proxy()
        .call_namespaced("palette_len", Args::none(), courier::ReturnPolicy::Return)
        .unwrap();
    assert!(log_lines(&log).contains(&"style:set_style".to_owned()));

    runtime.shutdown();
}
