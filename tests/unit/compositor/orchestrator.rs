use super::*;
use crate::{
    engine::{PropertyValue, memory::MemoryEngine},
    foundation::core::{Canvas, LinkStatus},
    layout::table::{LayoutRule, LayoutSlot},
    source::media::SourceStatus,
};

fn config() -> CompositorConfig {
    CompositorConfig {
        bus_poll_ms: 10,
        ..CompositorConfig::default()
    }
}

fn compositor() -> (MemoryEngine, Compositor) {
    let engine = MemoryEngine::new();
    let c = Compositor::new(engine.handle(), config()).unwrap();
    (engine, c)
}

fn side_by_side() -> Layout {
    let rule = LayoutRule::new()
        .with_slot(LayoutSlot::with_symmetric_borders(0, 0, 640, 720, 180, 0))
        .with_slot(LayoutSlot::with_symmetric_borders(640, 0, 640, 720, 180, 0));
    Layout::new(Canvas::new(1280, 720)).with_rule(2, rule).unwrap()
}

fn xpos(engine: &MemoryEngine, port: &str) -> Option<PropertyValue> {
    engine.pad_property("videomixer_1", port, "xpos")
}

#[test]
fn new_installs_the_mixing_stage() {
    let (engine, c) = compositor();
    assert_eq!(c.pipeline_name(), "pipeline_0");
    assert_eq!(c.state(), PipelineState::Stopped);
    assert_eq!(
        engine.elements_in("pipeline_0"),
        ["audiomixer_1", "filter_1", "videomixer_1"]
    );
    assert!(c.sources().is_empty());
}

#[test]
fn invalid_config_is_rejected_before_touching_the_engine() {
    let engine = MemoryEngine::new();
    let cfg = CompositorConfig {
        canvas: Canvas::new(0, 0),
        ..config()
    };
    assert!(matches!(
        Compositor::new(engine.handle(), cfg).err(),
        Some(MixError::Validation(_))
    ));
    assert!(engine.state_of("pipeline_0").is_none());
}

#[test]
fn two_sources_are_placed_side_by_side() {
    let (engine, mut c) = compositor();
    c.set_layout(side_by_side()).unwrap();
    let factory = c.source_factory();

    let a = c.attach_source(factory.test(640, 720, None).unwrap()).unwrap();
    assert_eq!(c.source(a).unwrap().geometry().position, None);
    let b = c.attach_source(factory.test(640, 720, None).unwrap()).unwrap();

    assert_eq!(xpos(&engine, "sink_0"), Some(PropertyValue::Int(0)));
    assert_eq!(xpos(&engine, "sink_1"), Some(PropertyValue::Int(640)));
    assert_eq!(c.source(b).unwrap().geometry().borders, [0, -180, 0, -180]);
    assert_eq!(engine.property("box_3", "left"), Some(PropertyValue::Int(-180)));
    assert_eq!(engine.property("box_3", "right"), Some(PropertyValue::Int(-180)));
}

#[test]
fn slots_follow_attachment_order() {
    let (_engine, mut c) = compositor();
    c.set_layout(Layout::uniform_grid(Canvas::new(1280, 720), 4))
        .unwrap();
    let factory = c.source_factory();
    let ids: Vec<SourceId> = (0..3)
        .map(|_| c.attach_source(factory.test(320, 240, None).unwrap()).unwrap())
        .collect();

    let positions: Vec<_> = ids
        .iter()
        .map(|id| c.source(*id).unwrap().geometry().position)
        .collect();
    assert_eq!(positions, [Some((0, 0)), Some((640, 0)), Some((0, 360))]);
    assert_eq!(c.source(ids[2]).unwrap().geometry().size, (640, 360));
}

#[test]
fn attaching_the_same_source_twice_is_refused() {
    let (_engine, mut c) = compositor();
    let src = c.source_factory().test(320, 240, None).unwrap();
    c.attach_source(src.clone()).unwrap();
    assert!(matches!(
        c.attach_source(src),
        Err(MixError::Validation(_))
    ));
    assert_eq!(c.sources().len(), 1);
}

#[test]
fn failed_attach_leaves_no_trace() {
    let (engine, mut c) = compositor();
    engine.refuse_request_pads("videomixer_1");
    let src = c.source_factory().test(320, 240, None).unwrap();

    assert!(c.attach_source(src.clone()).is_err());
    assert!(c.sources().is_empty());
    assert_eq!(src.status(), SourceStatus::Unbound);
    assert_eq!(engine.elements_in("pipeline_0").len(), 3);
}

#[test]
fn detach_releases_nodes_and_port_then_relayouts() {
    let (engine, mut c) = compositor();
    c.set_layout(Layout::uniform_grid(Canvas::new(1280, 720), 2))
        .unwrap();
    let factory = c.source_factory();
    let a = c.attach_source(factory.test(320, 240, None).unwrap()).unwrap();
    let b = c.attach_source(factory.test(320, 240, None).unwrap()).unwrap();
    assert_eq!(c.source(b).unwrap().geometry().position, Some((640, 0)));

    let gone = c.detach_source(a).unwrap();
    assert_eq!(gone.status(), SourceStatus::Unbound);
    assert!(engine.pipeline_of("box_2").is_none());
    assert_eq!(engine.request_pads("videomixer_1"), ["sink_1"]);
    assert_eq!(c.sources().len(), 1);

    let remaining = c.source(b).unwrap().geometry();
    assert_eq!(remaining.position, Some((0, 0)));
    assert_eq!(remaining.size, (1280, 720));
    assert_eq!(xpos(&engine, "sink_1"), Some(PropertyValue::Int(0)));

    assert!(matches!(
        c.detach_source(a),
        Err(MixError::Validation(_))
    ));
}

#[test]
fn network_source_is_mixed_once_its_pads_arrive() {
    let (engine, mut c) = compositor();
    let mut layout = Layout::new(Canvas::new(1280, 720));
    layout
        .add_rule(1, LayoutRule::new().with_slot(LayoutSlot::new(40, 30, 1200, 660)))
        .unwrap();
    c.set_layout(layout).unwrap();

    let cam = c
        .attach_source(c.source_factory().rtsp("rtsp://cam/1", 0, 1200, 660).unwrap())
        .unwrap();
    assert_eq!(c.source(cam).unwrap().status(), SourceStatus::Bound);
    assert!(engine.request_pads("videomixer_1").is_empty());

    engine
        .emit_pad_added("source_2", "recv_rtp_src_0", "application/x-rtp,media=video")
        .unwrap();
    assert!(engine.request_pads("videomixer_1").is_empty());
    engine
        .emit_pad_added("decodebin_2", "src_0", "video/x-raw")
        .unwrap();

    assert_eq!(c.source(cam).unwrap().status(), SourceStatus::Linked);
    assert_eq!(xpos(&engine, "sink_0"), Some(PropertyValue::Int(40)));
    assert_eq!(
        engine.pad_property("videomixer_1", "sink_0", "ypos"),
        Some(PropertyValue::Int(30))
    );
}

#[test]
fn camera_refused_by_the_mixer_reports_failure() {
    let (engine, mut c) = compositor();
    let cam = c
        .attach_source(c.source_factory().rtsp("rtsp://cam/1", 0, 640, 360).unwrap())
        .unwrap();
    engine.force_pad_link_status("videomixer_1", LinkStatus::NoFormat);

    engine
        .emit_pad_added("source_2", "recv_rtp_src_0", "application/x-rtp,media=video")
        .unwrap();
    engine
        .emit_pad_added("decodebin_2", "src_0", "video/x-raw")
        .unwrap();

    let camera = c.source(cam).unwrap();
    assert!(matches!(camera.status(), SourceStatus::Failed(_)));
    assert!(camera.wait_connected(std::time::Duration::from_millis(10)).is_err());
    assert!(engine.request_pads("videomixer_1").is_empty());

    c.detach_source(cam).unwrap();
    assert_eq!(engine.pipeline_of("box_2"), None);
}

#[test]
fn set_layout_without_a_rule_keeps_the_layout() {
    let (_engine, mut c) = compositor();
    c.attach_source(c.source_factory().test(320, 240, None).unwrap())
        .unwrap();
    let err = c.set_layout(side_by_side()).unwrap_err();
    assert!(err.is_layout_resolution());
    assert!(c.layout().is_some());
    assert_eq!(c.sources()[0].geometry().position, None);
}

#[test]
fn lifecycle_follows_requests() {
    let (engine, mut c) = compositor();
    c.start().unwrap();
    assert_eq!(c.state(), PipelineState::Playing);
    assert_eq!(engine.state_of("pipeline_0"), Some(EngineState::Playing));
    c.pause().unwrap();
    assert_eq!(c.state(), PipelineState::Paused);
    c.stop().unwrap();
    assert_eq!(c.state(), PipelineState::Stopped);
    assert_eq!(engine.state_of("pipeline_0"), Some(EngineState::Null));
}

#[test]
fn refused_transition_keeps_the_local_state() {
    let (engine, mut c) = compositor();
    c.start().unwrap();
    engine.refuse_state_changes(true);
    assert!(matches!(c.pause(), Err(MixError::Lifecycle(_))));
    assert_eq!(c.state(), PipelineState::Playing);
    engine.refuse_state_changes(false);
}

#[test]
fn end_of_stream_is_terminal() {
    let (engine, mut c) = compositor();
    c.start().unwrap();
    c.send_eos().unwrap();
    assert!(engine.eos_sent("pipeline_0"));
    assert_eq!(c.state(), PipelineState::EndOfStream);

    c.start().unwrap();
    c.pause().unwrap();
    assert_eq!(c.state(), PipelineState::EndOfStream);
    assert_eq!(engine.state_of("pipeline_0"), Some(EngineState::Playing));

    c.stop().unwrap();
    assert_eq!(c.state(), PipelineState::EndOfStream);
    assert_eq!(engine.state_of("pipeline_0"), Some(EngineState::Null));
}

#[test]
fn refused_end_of_stream_still_ends_the_session() {
    let (engine, mut c) = compositor();
    engine.refuse_eos(true);
    assert!(matches!(c.send_eos(), Err(MixError::Lifecycle(_))));
    assert_eq!(c.state(), PipelineState::EndOfStream);
    assert!(!engine.eos_sent("pipeline_0"));
}

#[test]
fn bus_events_report_state_changes() {
    let (_engine, mut c) = compositor();
    let events = c.bus_events().unwrap();
    c.start().unwrap();
    let changed = events
        .iter()
        .find(|e| matches!(e, BusEvent::StateChanged { .. }))
        .unwrap();
    assert_eq!(
        changed,
        BusEvent::StateChanged {
            source: Some("pipeline_0".to_string()),
            old: EngineState::Null,
            new: EngineState::Playing,
        }
    );
}

#[test]
fn dropping_a_running_compositor_releases_the_pipeline() {
    let (engine, mut c) = compositor();
    c.start().unwrap();
    drop(c);
    assert_eq!(engine.state_of("pipeline_0"), Some(EngineState::Null));
}

#[test]
fn audio_and_sinks_hang_off_the_mixers() {
    let (engine, mut c) = compositor();
    let tone = engine.make_element("audiotestsrc", "tone").unwrap();
    let port = c.attach_audio(tone).unwrap();
    assert_eq!(port.parent_name().as_deref(), Some("audiomixer_1"));

    let stray = engine.make_element("audiotestsrc", "stray").unwrap();
    engine.refuse_add("stray");
    assert!(matches!(
        c.attach_audio(stray),
        Err(MixError::GraphMutation(_))
    ));

    let convert = engine.make_element("videoconvert", "convert").unwrap();
    let sink = engine.make_element("fakesink", "audio_out").unwrap();
    c.add(&convert).unwrap();
    c.add(&sink).unwrap();
    c.link_video_sink(&convert).unwrap();
    c.link_audio_sink(&sink).unwrap();
    assert!(engine.is_linked("filter_1", "convert"));
    assert!(engine.is_linked("audiomixer_1", "audio_out"));
}
