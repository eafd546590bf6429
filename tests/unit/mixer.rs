use super::*;
use crate::{
    engine::memory::MemoryEngine,
    foundation::core::LinkStatus,
    source::factory::SourceFactory,
};

struct Rig {
    engine: MemoryEngine,
    pipeline: PipelineRef,
    stage: MixingStage,
    sources: SourceFactory,
}

fn rig() -> Rig {
    let engine = MemoryEngine::new();
    let ids = NodeIds::new();
    let pipeline = engine.new_pipeline("p").unwrap();
    let stage = MixingStage::new(&engine, &ids, &CompositorConfig::default()).unwrap();
    stage.install(&pipeline).unwrap();
    let sources = SourceFactory::with_ids(engine.handle(), ids);
    Rig {
        engine,
        pipeline,
        stage,
        sources,
    }
}

#[test]
fn install_adds_and_links_the_mixing_nodes() {
    let r = rig();
    assert_eq!(
        r.engine.elements_in("p"),
        ["audiomixer_0", "filter_0", "videomixer_0"]
    );
    assert!(r.engine.is_linked("videomixer_0", "filter_0"));
    assert_eq!(
        r.engine.property("videomixer_0", "background"),
        Some(PropertyValue::Int(1))
    );
    assert_eq!(
        r.engine.property("filter_0", "caps").map(|c| c.to_string()),
        Some("video/x-raw,width=1280,height=720".to_string())
    );
    assert_eq!(r.stage.video_output().name(), "filter_0");
    assert_eq!(r.stage.audio_output().name(), "audiomixer_0");
}

#[test]
fn missing_mixer_factory_fails_construction() {
    let engine = MemoryEngine::new();
    engine.fail_factory("compositor");
    let err = MixingStage::new(&engine, &NodeIds::new(), &CompositorConfig::default())
        .err()
        .unwrap();
    assert!(matches!(err, MixError::Construction(_)));
}

#[test]
fn connected_source_gets_an_opaque_port() {
    let r = rig();
    let src = r.sources.test(640, 360, None).unwrap();
    src.bind(&r.pipeline).unwrap();

    assert_eq!(r.stage.link_source(&src).unwrap(), PortLink::Linked);
    assert_eq!(src.status(), SourceStatus::Linked);
    assert_eq!(r.engine.request_pads("videomixer_0"), ["sink_0"]);
    assert_eq!(
        r.engine.pad_property("videomixer_0", "sink_0", "alpha"),
        Some(PropertyValue::Float(1.0))
    );
    assert_eq!(
        r.engine.pad_peer("box_1", "src"),
        Some(("videomixer_0".to_string(), "sink_0".to_string()))
    );
}

#[test]
fn refused_port_link_gives_the_port_back() {
    let r = rig();
    let src = r.sources.test(640, 360, None).unwrap();
    src.bind(&r.pipeline).unwrap();
    r.engine
        .force_pad_link_status("videomixer_0", LinkStatus::NoFormat);

    let err = r.stage.link_source(&src).unwrap_err();
    assert!(matches!(
        err,
        MixError::LinkRefusal {
            status: LinkStatus::NoFormat,
            ..
        }
    ));
    assert!(r.engine.request_pads("videomixer_0").is_empty());
    assert!(src.output_port().is_none());
}

#[test]
fn exhausted_mixer_is_a_construction_error() {
    let r = rig();
    let src = r.sources.test(640, 360, None).unwrap();
    src.bind(&r.pipeline).unwrap();
    r.engine.refuse_request_pads("videomixer_0");
    assert!(matches!(
        r.stage.link_source(&src),
        Err(MixError::Construction(_))
    ));
}

#[test]
fn network_source_is_linked_only_after_its_pads_appear() {
    let r = rig();
    let src = r.sources.uri("file:///clip.mp4", 640, 360).unwrap();
    src.bind(&r.pipeline).unwrap();

    assert_eq!(r.stage.link_source(&src).unwrap(), PortLink::Deferred);
    assert!(r.engine.request_pads("videomixer_0").is_empty());

    r.engine
        .emit_pad_added("source_1", "src_0", "audio/x-raw")
        .unwrap();
    assert!(r.engine.request_pads("videomixer_0").is_empty());

    r.engine
        .emit_pad_added("source_1", "src_1", "video/x-raw")
        .unwrap();
    assert_eq!(r.engine.request_pads("videomixer_0"), ["sink_0"]);
    assert_eq!(src.status(), SourceStatus::Linked);
}

#[test]
fn refused_deferred_mixer_link_fails_the_source() {
    let r = rig();
    let src = r.sources.rtsp("rtsp://cam/1", 0, 640, 360).unwrap();
    src.bind(&r.pipeline).unwrap();
    assert_eq!(r.stage.link_source(&src).unwrap(), PortLink::Deferred);
    r.engine
        .force_pad_link_status("videomixer_0", LinkStatus::NoFormat);

    r.engine
        .emit_pad_added("source_1", "recv_rtp_src_0", "application/x-rtp,media=video")
        .unwrap();
    r.engine
        .emit_pad_added("decodebin_1", "src_0", "video/x-raw")
        .unwrap();

    assert!(matches!(src.status(), SourceStatus::Failed(_)));
    assert!(src
        .wait_connected(std::time::Duration::from_millis(10))
        .is_err());
    assert!(r.engine.request_pads("videomixer_0").is_empty());
}

#[test]
fn unbound_source_cannot_be_mixed() {
    let r = rig();
    let src = r.sources.test(640, 360, None).unwrap();
    assert!(matches!(
        r.stage.link_source(&src),
        Err(MixError::GraphMutation(_))
    ));
    assert!(r.engine.request_pads("videomixer_0").is_empty());
}

#[test]
fn audio_elements_get_their_own_ports() {
    let r = rig();
    let tone = r.engine.make_element("audiotestsrc", "tone").unwrap();
    assert!(r.pipeline.add(&tone));
    let port = r.stage.link_audio(&tone).unwrap();
    assert_eq!(port.name(), "sink_0");
    assert_eq!(
        r.engine.pad_peer("tone", "src"),
        Some(("audiomixer_0".to_string(), "sink_0".to_string()))
    );

    let stray = r.engine.make_element("audiotestsrc", "stray").unwrap();
    let err = r.stage.link_audio(&stray).err().unwrap();
    assert!(matches!(
        err,
        MixError::LinkRefusal {
            status: LinkStatus::WrongHierarchy,
            ..
        }
    ));
    assert_eq!(r.engine.request_pads("audiomixer_0"), ["sink_0"]);
}

#[test]
fn released_ports_are_not_reused_by_name() {
    let r = rig();
    let first = r.stage.video().allocate_port().unwrap();
    r.stage.video().release_port(&first);
    let second = r.stage.video().allocate_port().unwrap();
    assert_eq!(first.name(), "sink_0");
    assert_eq!(second.name(), "sink_1");
    assert_eq!(r.engine.request_pads("videomixer_0"), ["sink_1"]);
}
