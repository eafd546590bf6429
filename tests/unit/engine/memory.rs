use super::*;

fn pipeline_with(engine: &MemoryEngine, name: &str, elements: &[(&str, &str)]) -> PipelineRef {
    let pipeline = engine.new_pipeline(name).unwrap();
    for (factory, el_name) in elements {
        let el = engine.make_element(factory, el_name).unwrap();
        assert!(pipeline.add(&el));
    }
    pipeline
}

fn element(engine: &MemoryEngine, name: &str) -> ElementRef {
    Arc::new(MemoryElement {
        name: name.to_string(),
        graph: engine.graph.clone(),
    })
}

#[test]
fn element_links_require_a_shared_pipeline() {
    let engine = MemoryEngine::new();
    let p = pipeline_with(&engine, "p", &[("videotestsrc", "src0")]);
    let orphan = engine.make_element("videobox", "box0").unwrap();
    let src = element(&engine, "src0");

    assert!(!src.link(&orphan));
    assert!(p.add(&orphan));
    assert!(src.link(&orphan));
    assert!(engine.is_linked("src0", "box0"));
    assert!(!src.link(&orphan), "src pad is already linked");

    assert!(src.unlink(&orphan));
    assert!(!engine.is_linked("src0", "box0"));
}

#[test]
fn adding_an_element_twice_is_refused() {
    let engine = MemoryEngine::new();
    let p1 = engine.new_pipeline("p1").unwrap();
    let p2 = engine.new_pipeline("p2").unwrap();
    let el = engine.make_element("queue", "q").unwrap();
    assert!(p1.add(&el));
    assert!(!p1.add(&el));
    assert!(!p2.add(&el));
    assert!(p1.remove(&el));
    assert!(!p1.remove(&el));
    assert!(p2.add(&el));
    assert_eq!(engine.pipeline_of("q").as_deref(), Some("p2"));
}

#[test]
fn removal_unlinks_every_pad() {
    let engine = MemoryEngine::new();
    let p = pipeline_with(
        &engine,
        "p",
        &[("videotestsrc", "a"), ("queue", "b"), ("videobox", "c")],
    );
    assert!(element(&engine, "a").link(&element(&engine, "b")));
    assert!(element(&engine, "b").link(&element(&engine, "c")));
    assert!(p.remove(&element(&engine, "b")));
    assert!(!engine.is_linked("a", "b"));
    assert!(!engine.is_linked("b", "c"));
    assert_eq!(engine.pad_peer("a", "src"), None);
}

#[test]
fn dynamic_factories_expose_pads_late() {
    let engine = MemoryEngine::new();
    let _p = pipeline_with(&engine, "p", &[("decodebin", "dec"), ("videoscale", "scale")]);
    let dec = element(&engine, "dec");
    assert!(dec.static_pad("src").is_err());
    assert!(!dec.link(&element(&engine, "scale")));

    let seen = Arc::new(Mutex::new(Vec::<(String, Option<String>)>::new()));
    let sink = seen.clone();
    dec.connect_pad_added(Arc::new(move |el, pad| {
        sink.lock().push((el.name(), pad.media_type()));
    }));
    engine.emit_pad_added("dec", "src_0", "video/x-raw").unwrap();
    assert_eq!(
        seen.lock().as_slice(),
        &[("dec".to_string(), Some("video/x-raw".to_string()))]
    );
    assert!(engine.emit_pad_added("dec", "src_0", "video/x-raw").is_err());
}

#[test]
fn emitted_pads_keep_their_caps_fields() {
    let engine = MemoryEngine::new();
    let _p = pipeline_with(&engine, "p", &[("rtspsrc", "cam")]);
    engine
        .emit_pad_added("cam", "recv_rtp_src_0", "application/x-rtp,media=video,payload=96")
        .unwrap();
    let pad = element(&engine, "cam").static_pad("recv_rtp_src_0").unwrap();
    let caps = pad.caps().unwrap();
    assert_eq!(caps.media_type(), "application/x-rtp");
    assert_eq!(caps.get("media"), Some("video"));
    assert!(engine.emit_pad_added("cam", "recv_rtp_src_1", "").is_err());
}

#[test]
fn remove_hook_runs_without_the_graph_lock() {
    let engine = MemoryEngine::new();
    let p = pipeline_with(&engine, "p", &[("queue", "q")]);
    let inside = engine.clone();
    let seen = Arc::new(Mutex::new(None));
    let sink = seen.clone();
    engine.before_remove("q", move || {
        *sink.lock() = inside.pipeline_of("q");
    });
    assert!(p.remove(&element(&engine, "q")));
    assert_eq!(seen.lock().as_deref(), Some("p"));
    assert_eq!(engine.pipeline_of("q"), None);
}

#[test]
fn request_pads_are_numbered_and_releasable() {
    let engine = MemoryEngine::new();
    let _p = pipeline_with(&engine, "p", &[("compositor", "mix")]);
    let mix = element(&engine, "mix");
    let tpl = mix.pad_template("sink_%u").unwrap();
    assert!(mix.pad_template("src_%u").is_err());

    let a = mix.request_pad(&tpl).unwrap();
    let b = mix.request_pad(&tpl).unwrap();
    assert_eq!(a.name(), "sink_0");
    assert_eq!(b.name(), "sink_1");
    assert_eq!(engine.request_pads("mix"), ["sink_0", "sink_1"]);

    assert!(mix.release_request_pad(&a));
    assert!(!mix.release_request_pad(&a));
    assert_eq!(engine.request_pads("mix"), ["sink_1"]);

    engine.refuse_request_pads("mix");
    assert!(mix.request_pad(&tpl).is_err());
}

#[test]
fn pad_link_statuses() {
    let engine = MemoryEngine::new();
    let _p = pipeline_with(
        &engine,
        "p",
        &[("videobox", "box"), ("videobox", "box2"), ("compositor", "mix")],
    );
    let mix = element(&engine, "mix");
    let tpl = mix.pad_template("sink_%u").unwrap();
    let port = mix.request_pad(&tpl).unwrap();
    let src = element(&engine, "box").static_pad("src").unwrap();
    let src2 = element(&engine, "box2").static_pad("src").unwrap();

    assert_eq!(port.link(&src), LinkStatus::WrongDirection);
    assert_eq!(src.link(&port), LinkStatus::Ok);
    assert_eq!(src2.link(&port), LinkStatus::WasLinked);
    assert!(src.unlink(&port));
    assert_eq!(engine.pad_peer("mix", "sink_0"), None);

    engine.force_pad_link_status("mix", LinkStatus::NoFormat);
    assert_eq!(src2.link(&port), LinkStatus::NoFormat);
}

#[test]
fn state_and_eos_are_posted_on_the_bus() {
    let engine = MemoryEngine::new();
    let p = engine.new_pipeline("p").unwrap();
    let bus = p.bus().unwrap();
    assert!(!bus.have_pending());

    assert!(p.set_state(EngineState::Playing));
    assert_eq!(p.current_state(), EngineState::Playing);
    assert!(p.send_eos());
    assert!(engine.eos_sent("p"));

    let first = bus.pop().unwrap();
    assert_eq!(
        first.kind,
        MessageKind::StateChanged {
            old: EngineState::Null,
            new: EngineState::Playing
        }
    );
    assert_eq!(bus.pop().unwrap().kind, MessageKind::Eos);
    assert!(bus.timed_pop(Duration::from_millis(10)).is_none());

    engine.refuse_state_changes(true);
    engine.refuse_eos(true);
    assert!(!p.set_state(EngineState::Null));
    assert!(!p.send_eos());
    assert_eq!(engine.state_of("p"), Some(EngineState::Playing));
}

#[test]
fn timed_pop_wakes_on_post() {
    let engine = MemoryEngine::new();
    let p = engine.new_pipeline("p").unwrap();
    let bus = p.bus().unwrap();
    let poster = engine.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(20));
        poster
            .post_message("p", BusMessage::new(MessageKind::Info, None, "hello"))
            .unwrap();
    });
    let msg = bus.timed_pop(Duration::from_secs(5)).unwrap();
    assert_eq!(msg.detail, "hello");
    handle.join().unwrap();
}

#[test]
fn push_buffer_only_into_appsrc_in_a_pipeline() {
    let engine = MemoryEngine::new();
    let p = engine.new_pipeline("p").unwrap();
    let app = engine.make_element("appsrc", "app").unwrap();
    let q = engine.make_element("queue", "q").unwrap();
    assert!(app.push_buffer(Bytes::from_static(b"x")).is_err());
    assert!(p.add(&app));
    assert!(p.add(&q));
    app.push_buffer(Bytes::from_static(b"a")).unwrap();
    app.push_buffer(Bytes::from_static(b"b")).unwrap();
    assert!(q.push_buffer(Bytes::from_static(b"c")).is_err());
    assert_eq!(
        engine.pushed_buffers("app"),
        [Bytes::from_static(b"a"), Bytes::from_static(b"b")]
    );
}

#[test]
fn faults_cover_construction_and_mutation() {
    let engine = MemoryEngine::new();
    engine.fail_factory("rtspsrc");
    assert!(matches!(
        engine.make_element("rtspsrc", "cam"),
        Err(MixError::Construction(_))
    ));
    assert!(engine.make_element("queue", "q").is_ok());
    assert!(engine.make_element("queue", "q").is_err());
    assert!(engine.new_pipeline("p").is_ok());
    assert!(engine.new_pipeline("p").is_err());

    engine.clear_faults();
    assert!(engine.make_element("rtspsrc", "cam").is_ok());
}

#[test]
fn snapshot_lists_links_and_properties() {
    let engine = MemoryEngine::new();
    let _p = pipeline_with(&engine, "p", &[("videotestsrc", "a"), ("videobox", "b")]);
    let a = element(&engine, "a");
    a.set_property("pattern", PropertyValue::from(18));
    assert!(a.link(&element(&engine, "b")));

    let snap = engine.snapshot("p").unwrap();
    assert_eq!(snap.links, ["a.src -> b.sink"]);
    assert_eq!(snap.elements.len(), 2);
    assert_eq!(snap.elements[0].properties.get("pattern").map(String::as_str), Some("18"));
    assert!(engine.snapshot("missing").is_err());
}
