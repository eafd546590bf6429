use super::*;
use crate::{
    engine::{PropertyValue, memory::MemoryEngine},
    foundation::core::PipelineState,
    layout::table::LayoutRule,
    source::media::SourceStatus,
};

const TWO_UP: &str = r#"{
    "compositor": { "canvas": { "width": 1280, "height": 720 }, "bus_poll_ms": 10 },
    "layout": {
        "canvas": { "width": 1280, "height": 720 },
        "rules": {
            "2": [
                { "x": 0, "y": 0, "width": 640, "height": 720, "border_left": 180, "border_right": 180 },
                { "x": 640, "y": 0, "width": 640, "height": 720, "border_left": 180, "border_right": 180 }
            ]
        }
    },
    "sources": [
        { "kind": "test", "width": 640, "height": 720 },
        { "kind": "test", "width": 640, "height": 720, "pattern": 18 }
    ]
}"#;

#[test]
fn empty_config_uses_defaults() {
    let cfg: CompositorConfig = serde_json::from_str("{}").unwrap();
    assert_eq!(cfg, CompositorConfig::default());
    assert_eq!(cfg.canvas, Canvas::new(1280, 720));
    assert_eq!(cfg.video_mixer, "compositor");
    cfg.validate().unwrap();
}

#[test]
fn validate_rejects_degenerate_settings() {
    let cases = [
        CompositorConfig {
            canvas: Canvas::new(0, 720),
            ..CompositorConfig::default()
        },
        CompositorConfig {
            pad_template: " ".to_string(),
            ..CompositorConfig::default()
        },
        CompositorConfig {
            bus_poll_ms: 0,
            ..CompositorConfig::default()
        },
        CompositorConfig {
            bus_capacity: 0,
            ..CompositorConfig::default()
        },
    ];
    for cfg in cases {
        assert!(matches!(cfg.validate(), Err(MixError::Validation(_))), "{cfg:?}");
    }
}

#[test]
fn source_specs_are_tagged_by_kind() {
    let spec: SourceSpec =
        serde_json::from_str(r#"{"kind":"rtsp","location":"rtsp://cam/1","width":640,"height":360}"#)
            .unwrap();
    assert_eq!(
        spec,
        SourceSpec::Rtsp {
            location: "rtsp://cam/1".to_string(),
            latency_ms: 200,
            width: 640,
            height: 360,
        }
    );

    let spec: SourceSpec =
        serde_json::from_str(r#"{"kind":"live_push","codec":"h264","width":320,"height":240}"#)
            .unwrap();
    assert_eq!(
        spec,
        SourceSpec::LivePush {
            codec: Codec::H264,
            width: 320,
            height: 240,
        }
    );

    assert!(serde_json::from_str::<SourceSpec>(r#"{"kind":"webcam"}"#).is_err());
}

#[test]
fn build_names_nodes_from_the_factory_counter() {
    let engine = MemoryEngine::new();
    let factory = SourceFactory::new(engine.handle());
    let spec = SourceSpec::Raw {
        factory: "ximagesrc".to_string(),
        width: 800,
        height: 600,
    };
    let source = spec.build(&factory).unwrap();
    assert_eq!(source.node_names(), ["source_0", "box_0"]);
    assert_eq!(
        engine.property("source_0", "caps").map(|c| c.to_string()),
        Some("video/x-raw,width=800,height=600".to_string())
    );
}

#[test]
fn scene_parses_and_rejects_bad_json() {
    let scene = SceneSpec::from_json_str(TWO_UP).unwrap();
    assert_eq!(scene.sources.len(), 2);
    assert_eq!(scene.compositor.bus_poll_ms, 10);
    assert_eq!(scene.layout.as_ref().map(|l| l.counts().count()), Some(1));

    let err = SceneSpec::from_json_str("{ nope").unwrap_err();
    assert!(matches!(err, MixError::Config(_)));
}

#[test]
fn scene_rejects_a_layout_for_another_canvas() {
    let mut scene = SceneSpec::from_json_str(TWO_UP).unwrap();
    scene.compositor.canvas = Canvas::new(1920, 1080);
    let err = scene.validate().unwrap_err();
    assert!(err.to_string().contains("differs from compositor canvas"));
}

#[test]
fn missing_scene_file_reports_the_path() {
    let err = SceneSpec::from_json_file(Path::new("/definitely/not/here.json")).unwrap_err();
    assert!(err.to_string().contains("/definitely/not/here.json"));
}

#[test]
fn assemble_attaches_and_lays_out_every_source() {
    let engine = MemoryEngine::new();
    let scene = SceneSpec::from_json_str(TWO_UP).unwrap();
    let compositor = scene.assemble(engine.handle()).unwrap();

    assert_eq!(compositor.state(), PipelineState::Stopped);
    assert_eq!(compositor.sources().len(), 2);
    let first = &compositor.sources()[0];
    let second = &compositor.sources()[1];
    assert_eq!(first.status(), SourceStatus::Linked);
    assert_eq!(first.geometry().position, Some((0, 0)));
    assert_eq!(second.geometry().position, Some((640, 0)));
    assert_eq!(second.geometry().borders, [0, -180, 0, -180]);
    assert_eq!(engine.property("source_3", "pattern"), Some(PropertyValue::Int(18)));
    assert_eq!(engine.property("source_2", "pattern"), None);
}

#[test]
fn assemble_tolerates_a_layout_without_a_matching_rule() {
    let engine = MemoryEngine::new();
    let mut scene = SceneSpec::from_json_str(TWO_UP).unwrap();
    scene.sources.pop();
    let compositor = scene.assemble(engine.handle()).unwrap();
    assert_eq!(compositor.sources().len(), 1);
    assert_eq!(compositor.sources()[0].geometry().position, None);
    assert!(compositor.layout().is_some());
}

#[test]
fn layout_in_scene_survives_serialization() {
    let layout = Layout::new(Canvas::new(640, 360))
        .with_rule(1, LayoutRule::grid(Canvas::new(640, 360), 1))
        .unwrap();
    let scene = SceneSpec {
        compositor: CompositorConfig {
            canvas: Canvas::new(640, 360),
            ..CompositorConfig::default()
        },
        layout: Some(layout),
        sources: vec![SourceSpec::Uri {
            uri: "file:///clip.mp4".to_string(),
            width: 640,
            height: 360,
        }],
    };
    let json = serde_json::to_string(&scene).unwrap();
    assert_eq!(SceneSpec::from_json_str(&json).unwrap(), scene);
}
