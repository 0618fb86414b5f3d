//! Integration tests for the `cron` module.
//!
//! Modules are driven through the public `Processor` and the dynamic
//! registry, the same way a host or the CLI drives them.

use polyclock_core::dsp::clock::{Cron, CronInputs, RunState};
use polyclock_core::dsp::get_constructors;
use polyclock_core::{Module, Processor, ProcessorConfig, Sampleable};
use serde_json::json;

const SAMPLE_RATE: f32 = 48000.0;

// ─── Helpers ──────────────────────────────────────────────────────────────────

fn processor(idle_skip: u32) -> Processor<Cron> {
    Processor::new(ProcessorConfig {
        sample_rate: SAMPLE_RATE,
        idle_skip,
    })
}

fn make_module(module_type: &str) -> Box<dyn Sampleable> {
    let constructors = get_constructors();
    let constructor = constructors
        .get(module_type)
        .unwrap_or_else(|| panic!("no constructor for '{module_type}'"));
    constructor(&ProcessorConfig::default())
}

fn stop() -> CronInputs {
    CronInputs {
        stop: 10.0,
        ..Default::default()
    }
}

fn start() -> CronInputs {
    CronInputs {
        start: 10.0,
        ..Default::default()
    }
}

fn cont() -> CronInputs {
    CronInputs {
        cont: 10.0,
        ..Default::default()
    }
}

fn port(module: &dyn Sampleable, name: &str) -> f32 {
    module
        .get_poly_sample(name)
        .unwrap_or_else(|| panic!("no port '{name}'"))
        .get(0)
}

// ─── Sequencer ────────────────────────────────────────────────────────────────

#[test]
fn continue_from_stopped_runs_without_reset() {
    let mut p = processor(1);
    p.step(&stop());
    p.step(&CronInputs::default());
    p.step(&cont());
    assert_eq!(p.module().run_state(), RunState::Running);
    assert_eq!(p.module().outputs().reset, 0.0);
}

#[test]
fn start_from_stopped_emits_one_reset() {
    let mut p = processor(1);
    p.step(&stop());
    p.step(&CronInputs::default());
    let mut resets = 0;
    for _ in 0..5 {
        p.step(&start());
        if p.module().outputs().reset > 0.0 {
            resets += 1;
        }
    }
    assert_eq!(resets, 1);
    assert_eq!(p.module().run_state(), RunState::Running);
    assert_eq!(p.module().transport().divider(), 0);
}

/// Start edge, then skipped frames, then a processed frame ends in the same
/// state as the undecimated run.
#[test]
fn start_edge_survives_skipped_frames() {
    let frames: Vec<CronInputs> = std::iter::once(stop())
        .chain(std::iter::repeat_with(CronInputs::default).take(3))
        .chain(std::iter::repeat_with(start).take(9))
        .collect();

    let mut plain = processor(1);
    let mut skipping = processor(4);
    let mut plain_resets = 0;
    let mut skipping_resets = 0;
    for inputs in &frames {
        plain.step(inputs);
        skipping.step(inputs);
        plain_resets += (plain.module().outputs().reset > 0.0) as usize;
        skipping_resets += (skipping.module().outputs().reset > 0.0) as usize;
    }

    // stop and start each fire once in both runs
    assert_eq!(plain_resets, 2);
    assert_eq!(skipping_resets, 2);
    assert_eq!(plain.module().run_state(), skipping.module().run_state());
    assert_eq!(
        plain.module().transport().divider(),
        skipping.module().transport().divider()
    );
    assert_eq!(plain.module().outputs().run, skipping.module().outputs().run);
}

/// Run the same frames with and without decimation and return the final run
/// state and the number of reset pulses seen by each.
fn compare_decimated(
    frames: &[CronInputs],
    idle_skip: u32,
) -> ((RunState, usize), (RunState, usize)) {
    let mut plain = processor(1);
    let mut skipping = processor(idle_skip);
    let mut plain_resets = 0;
    let mut skipping_resets = 0;
    for inputs in frames {
        plain.step(inputs);
        skipping.step(inputs);
        plain_resets += (plain.module().outputs().reset > 0.0) as usize;
        skipping_resets += (skipping.module().outputs().reset > 0.0) as usize;
    }
    (
        (plain.module().run_state(), plain_resets),
        (skipping.module().run_state(), skipping_resets),
    )
}

#[test]
fn one_frame_start_on_a_decimated_frame_is_not_lost() {
    let mut frames = vec![stop()];
    frames.extend(std::iter::repeat_with(CronInputs::default).take(4));
    // Frame 5 falls between the frames idle_skip 4 would process
    frames.push(start());
    frames.extend(std::iter::repeat_with(CronInputs::default).take(4));

    let (plain, skipping) = compare_decimated(&frames, 4);
    assert_eq!(plain, (RunState::Running, 2));
    assert_eq!(skipping, plain);
}

#[test]
fn one_frame_stop_and_continue_on_decimated_frames_are_not_lost() {
    let mut frames = vec![CronInputs::default(); 3];
    frames.push(stop());
    frames.extend(std::iter::repeat_with(CronInputs::default).take(6));
    frames.push(cont());
    frames.extend(std::iter::repeat_with(CronInputs::default).take(3));

    let (plain, skipping) = compare_decimated(&frames, 8);
    assert_eq!(plain, (RunState::Running, 1));
    assert_eq!(skipping, plain);
}

#[test]
fn one_frame_clock_reset_on_a_decimated_frame_is_not_lost() {
    let mut p = processor(4);
    play_clock(&mut p, 3, 10);
    assert_eq!(p.module().transport().divider(), 3);
    p.step(&CronInputs::default());
    p.step(&CronInputs {
        clock_reset: 10.0,
        ..Default::default()
    });
    p.step(&CronInputs::default());
    assert_eq!(p.module().transport().divider(), 0);
}

// ─── Tempo ────────────────────────────────────────────────────────────────────

fn play_clock(p: &mut Processor<Cron>, pulses: usize, period: usize) {
    for _ in 0..pulses {
        for frame in 0..period {
            p.step(&CronInputs {
                clock: if frame == 0 { 10.0 } else { 0.0 },
                ..Default::default()
            });
        }
    }
}

#[test]
fn tempo_is_unchanged_by_decimation() {
    let mut plain = processor(1);
    let mut skipping = processor(16);
    // 240 BPM: 500 frames per pulse
    play_clock(&mut plain, 50, 500);
    play_clock(&mut skipping, 50, 500);
    let a = plain.module().outputs().bpm;
    let b = skipping.module().outputs().bpm;
    assert!((a - 1.0).abs() < 1e-3, "bpm = {a}");
    assert!((a - b).abs() < 1e-5, "{a} != {b}");
}

#[test]
fn history_is_cleared_by_reset() {
    let mut p = processor(1);
    play_clock(&mut p, 30, 100);
    assert!(p.module().tempo().is_some());
    p.reset();
    assert_eq!(p.module().tempo(), None);
    assert_eq!(p.module().clock().elapsed_frames(), 0);
}

// ─── Latency table ────────────────────────────────────────────────────────────

#[test]
fn latency_offset_survives_selection_changes() {
    let mut module = make_module("cron");
    module.try_update_params(json!({ "channel": 3.0 })).unwrap();
    module.step();
    module.try_update_params(json!({ "latency": 7.5 })).unwrap();
    module.step();
    module.try_update_params(json!({ "channel": 1.0 })).unwrap();
    module.step();
    assert_eq!(module.get_params()["latency"], json!(0.0));
    module.try_update_params(json!({ "channel": 3.0 })).unwrap();
    module.step();
    assert_eq!(module.get_params()["latency"], json!(7.5));
}

#[test]
fn persisted_latency_is_restored() {
    let mut module = make_module("cron");
    module.try_update_params(json!({ "channel": 16.0 })).unwrap();
    module.step();
    module.try_update_params(json!({ "latency": -20.0 })).unwrap();
    module.step();
    let state = module.save_state();

    let mut restored = make_module("cron");
    restored.load_state(&state);
    assert_eq!(restored.save_state(), state);
}

#[test]
fn outputs_are_reachable_by_port_name() {
    let mut module = make_module("cron");
    module.step();
    assert_eq!(port(module.as_ref(), "run"), 10.0);
    assert_eq!(port(module.as_ref(), "clock"), 0.0);
    assert_eq!(module.get_module_type(), "cron");
    assert_eq!(module.output_schemas().len(), 5);
    assert_eq!(<Cron as Module>::get_schema().name, "cron");
}
