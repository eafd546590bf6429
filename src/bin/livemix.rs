use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
    time::Duration,
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use livemix::VirtualDisplay as _;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "livemix", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the slot geometry a layout assigns to N sources.
    Layout(LayoutArgs),
    /// Assemble a scene on the in-memory engine and print the resulting graph.
    Plan(PlanArgs),
    /// Start and stop a virtual display.
    Display(DisplayArgs),
    /// Play a scene on GStreamer.
    #[cfg(feature = "gstreamer")]
    Run(RunArgs),
}

#[derive(Parser, Debug)]
struct LayoutArgs {
    /// Input layout JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Number of attached sources.
    #[arg(long)]
    count: usize,
}

#[derive(Parser, Debug)]
struct PlanArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,
}

#[derive(Parser, Debug)]
struct DisplayArgs {
    /// X display id.
    #[arg(long, default_value = ":99")]
    id: String,

    /// Keep the display up this long before stopping it.
    #[arg(long, default_value_t = 0)]
    hold_secs: u64,
}

#[cfg(feature = "gstreamer")]
#[derive(Parser, Debug)]
struct RunArgs {
    /// Input scene JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Play this long, then send end-of-stream.
    #[arg(long, default_value_t = 10)]
    seconds: u64,

    /// Video sink factory.
    #[arg(long, default_value = "autovideosink")]
    sink: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Layout(args) => cmd_layout(args),
        Command::Plan(args) => cmd_plan(args),
        Command::Display(args) => cmd_display(args),
        #[cfg(feature = "gstreamer")]
        Command::Run(args) => cmd_run(args),
    }
}

fn read_layout_json(path: &Path) -> anyhow::Result<livemix::Layout> {
    let f = File::open(path).with_context(|| format!("open layout '{}'", path.display()))?;
    let layout: livemix::Layout =
        serde_json::from_reader(BufReader::new(f)).with_context(|| "parse layout JSON")?;
    Ok(layout)
}

fn cmd_layout(args: LayoutArgs) -> anyhow::Result<()> {
    let layout = read_layout_json(&args.in_path)?;
    let rule = layout.resolve(args.count)?;
    println!("{}", serde_json::to_string_pretty(rule)?);
    Ok(())
}

#[derive(serde::Serialize)]
struct Plan {
    graph: livemix::GraphSnapshot,
    sources: Vec<PlannedSource>,
}

#[derive(serde::Serialize)]
struct PlannedSource {
    id: livemix::SourceId,
    kind: livemix::SourceKind,
    status: livemix::SourceStatus,
    nodes: Vec<String>,
    geometry: livemix::SourceGeometry,
}

fn cmd_plan(args: PlanArgs) -> anyhow::Result<()> {
    let scene = livemix::SceneSpec::from_json_file(&args.in_path)?;
    let engine = livemix::MemoryEngine::new();
    let compositor = scene
        .assemble(engine.handle())
        .with_context(|| format!("assemble scene '{}'", args.in_path.display()))?;

    let plan = Plan {
        graph: engine.snapshot(&compositor.pipeline_name())?,
        sources: compositor
            .sources()
            .iter()
            .map(|s| PlannedSource {
                id: s.id(),
                kind: s.kind(),
                status: s.status(),
                nodes: s.node_names(),
                geometry: s.geometry(),
            })
            .collect(),
    };
    println!("{}", serde_json::to_string_pretty(&plan)?);
    Ok(())
}

fn cmd_display(args: DisplayArgs) -> anyhow::Result<()> {
    let mut display = livemix::Xvfb::new(livemix::XvfbConfig::new(&args.id));
    display
        .start()
        .with_context(|| format!("start display '{}'", args.id))?;
    eprintln!("display {} is up", args.id);
    std::thread::sleep(Duration::from_secs(args.hold_secs));
    display.stop();
    Ok(())
}

#[cfg(feature = "gstreamer")]
fn cmd_run(args: RunArgs) -> anyhow::Result<()> {
    use std::time::Instant;

    use livemix::Engine as _;

    let scene = livemix::SceneSpec::from_json_file(&args.in_path)?;
    let engine = livemix::GstEngine::new()?;
    let mut compositor = scene.assemble(engine.handle())?;

    let convert = engine.make_element("videoconvert", "run_convert")?;
    let sink = engine.make_element(&args.sink, "run_sink")?;
    compositor.add(&convert)?;
    compositor.add(&sink)?;
    compositor.link_video_sink(&convert)?;
    if !convert.link(&sink) {
        anyhow::bail!("failed to link videoconvert -> {}", args.sink);
    }

    let events = compositor
        .bus_events()
        .context("pipeline has no bus to watch")?;
    compositor.start()?;
    eprintln!("playing {} for {}s", compositor.pipeline_name(), args.seconds);

    let deadline = Instant::now() + Duration::from_secs(args.seconds);
    while let Some(left) = deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(left) {
            Ok(livemix::BusEvent::Error { source, detail }) => {
                anyhow::bail!("pipeline error from {}: {detail}", source.unwrap_or_default());
            }
            Ok(livemix::BusEvent::EndOfStream) => break,
            Ok(_) => {}
            Err(_) => break,
        }
    }

    compositor.send_eos()?;
    // Give the muxers a chance to finalize before tearing down.
    let drain_deadline = Instant::now() + Duration::from_secs(5);
    while let Some(left) = drain_deadline.checked_duration_since(Instant::now()) {
        match events.recv_timeout(left) {
            Ok(livemix::BusEvent::EndOfStream) | Err(_) => break,
            Ok(_) => {}
        }
    }
    compositor.stop()?;
    Ok(())
}
