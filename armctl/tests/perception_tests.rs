// tests/perception_tests.rs
//
// Frame ingestion through the public handle and into the engine.

#[path = "arm_testkit.rs"]
mod arm_testkit;

use arm_testkit::{fast_config, run_until_agent_driven, scene, ScriptedFactory};
use armctl::config::PerceptionConfig;
use armctl::engine::Engine;
use armctl::error::ControlError;
use armctl::perception::{PerceptionBuffer, PerceptionTensor, PlanarBgrConverter};
use armctl::sim::KinematicArmSim;
use armctl::types::ImageFrame;
use armctl::Config;

#[test]
fn rendered_frame_converts_to_declared_dimensions() {
    let cfg = Config::default();
    let frame = KinematicArmSim::new(&cfg).render();
    assert_eq!(frame.bytes_per_pixel(), 3);

    let buf = PerceptionBuffer::new();
    buf.ingest(&frame).unwrap();

    let mut tensor = PerceptionTensor::new(cfg.perception);
    assert!(buf.take_into(&mut tensor, &PlanarBgrConverter).unwrap());
    assert_eq!(tensor.width, 64);
    assert_eq!(tensor.height, 64);
    assert_eq!(tensor.channels, 3);
    assert_eq!(tensor.len(), 64 * 64 * 3);
    assert!(tensor.as_slice().iter().all(|v| (0.0..=255.0).contains(v)));
}

#[test]
fn larger_frames_are_resampled() {
    let buf = PerceptionBuffer::new();
    let mut data = vec![0u8; 128 * 128 * 3];
    // top-left quadrant red
    for y in 0..64 {
        for x in 0..64 {
            data[(y * 128 + x) * 3] = 255;
        }
    }
    buf.ingest_frame(&data, 128, 128, 3).unwrap();

    let cfg = PerceptionConfig {
        width: 64,
        height: 64,
        channels: 3,
    };
    let mut tensor = PerceptionTensor::new(cfg);
    buf.take_into(&mut tensor, &PlanarBgrConverter).unwrap();
    // red lands in the last plane
    assert_eq!(tensor.get(2, 0, 0), Some(255.0));
    assert_eq!(tensor.get(2, 40, 40), Some(0.0));
    assert_eq!(tensor.get(0, 0, 0), Some(0.0));
}

#[test]
fn rejected_frames_do_not_reach_the_agent() {
    let cfg = fast_config();
    let mut engine = Engine::new(cfg.clone(), ScriptedFactory::new(vec![0])).unwrap();
    let mut host = scene(&cfg);
    let mut t = 0.0;
    run_until_agent_driven(&mut engine, &mut host, &mut t);

    let rgba = ImageFrame::packed(64, 64, 4, vec![0; 64 * 64 * 4]);
    assert_eq!(
        engine.perception_handle().ingest(&rgba),
        Err(ControlError::Format { bits_per_pixel: 32 })
    );

    t += 0.01;
    let report = engine.on_update(&mut host, t);
    assert!(!report.had_new_frame);
    assert_eq!(report.frame_count, 0);
    assert_eq!(engine.perception_handle().stats().frames_rejected, 1);
}

#[test]
fn newest_frame_is_the_one_consumed() {
    let buf = PerceptionBuffer::new();
    let producer = buf.clone();
    producer
        .ingest(&ImageFrame::packed(2, 2, 3, vec![1; 12]))
        .unwrap();
    producer
        .ingest(&ImageFrame::packed(2, 2, 3, vec![2; 12]))
        .unwrap();

    let mut tensor = PerceptionTensor::new(PerceptionConfig {
        width: 2,
        height: 2,
        channels: 3,
    });
    assert!(buf.take_into(&mut tensor, &PlanarBgrConverter).unwrap());
    assert!(tensor.as_slice().iter().all(|v| *v == 2.0));
    assert_eq!(buf.stats().frames_replaced, 1);
    assert!(!buf.is_ready());
}

#[test]
fn truncated_frame_leaves_pending_frame_for_the_agent() {
    let cfg = fast_config();
    let factory = ScriptedFactory::new(vec![0]);
    let mut engine = Engine::new(cfg.clone(), factory).unwrap();
    let mut host = scene(&cfg);
    let mut t = 0.0;
    run_until_agent_driven(&mut engine, &mut host, &mut t);

    let perception = engine.perception_handle();
    perception.ingest(&arm_testkit::frame()).unwrap();
    let truncated = ImageFrame::packed(64, 64, 3, vec![0; 64 * 64 * 3 - 1]);
    assert_eq!(perception.ingest(&truncated).unwrap_err().tag(), "frame_size");

    t += 0.01;
    let report = engine.on_update(&mut host, t);
    assert!(report.had_new_frame);
    assert_eq!(report.frame_count, 1);
    assert!(report.failures.iter().all(|e| e.tag() != "conversion"));
    assert_eq!(report.action, Some(0));
}
