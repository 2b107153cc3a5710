use criterion::{Criterion, black_box, criterion_group, criterion_main};
use gadget_canvas::bridge::{CallContext, RESIZE_IFRAME, SET_TITLE};
use gadget_canvas::loader::{MapFinder, MemorySource};
use gadget_canvas::logging::NullSink;
use gadget_canvas::{
    BackendResponse, CanvasConfig, CanvasRuntime, GadgetSpec, GroupSpec, HostEvent, HostPage,
    HtmlRenderer, LayoutEngine, LifecycleLoggerPlugin, Logger, OutboxTransport, ResolutionService,
    Result, RpcCall,
};
use serde_json::json;

fn group(gadgets: usize) -> GroupSpec {
    GroupSpec {
        number_of_columns: 3,
        customizable: true,
        name: "bench".into(),
        viewer_id: "1".into(),
        owner_id: "1".into(),
        view: "home".into(),
        gadgets: (0..gadgets)
            .map(|i| {
                GadgetSpec::new(i.to_string(), format!("http://g/{i}.xml"), i % 3, i / 3)
                    .with_title(format!("Gadget {i}"))
            })
            .collect(),
    }
}

fn render_group(c: &mut Criterion) {
    let spec = group(24);
    c.bench_function("render_group_24", |b| {
        b.iter(|| {
            let mut page = HostPage::new("http://host/");
            page.add_container("canvas").expect("container");
            let mut layout =
                LayoutEngine::build(black_box(&spec), CanvasConfig::default()).expect("layout");
            layout.render(&mut page, "canvas", None).expect("render");
            let root = page.document.body();
            HtmlRenderer::with_default()
                .render_to_string(&page.document, root)
                .expect("markup")
        });
    });
}

fn rpc_script(c: &mut Criterion) {
    let script = rpc_events();
    c.bench_function("runtime_rpc_script", |b| {
        b.iter(|| {
            let mut runtime = build_runtime().expect("runtime");
            runtime
                .run_scripted(black_box(script.clone()))
                .expect("scripted run");
        });
    });
}

fn resolve_bundle(c: &mut Criterion) {
    let mut finder = MapFinder::new();
    let mut source = MemorySource::new();
    for i in 0..40 {
        let file = format!("/lib/{i}.js");
        let deps: Vec<String> = (0..i).step_by(7).map(|d| format!("/lib/{d}.js")).collect();
        let deps: Vec<&str> = deps.iter().map(String::as_str).collect();
        finder = finder.with(&file, &deps);
        source = source.with(&file, "var x = 1;\n");
    }
    let files: Vec<String> = (30..40).map(|i| format!("/lib/{i}.js")).collect();
    c.bench_function("resolve_and_bundle_cold", |b| {
        b.iter(|| {
            let mut service = ResolutionService::new(finder.clone(), source.clone(), false);
            service.execute(black_box(files.clone())).expect("manifest")
        });
    });
}

fn build_runtime() -> Result<CanvasRuntime> {
    let mut page = HostPage::new("http://host/portal");
    page.add_container("canvas")?;
    let outbox = OutboxTransport::new();
    let logger = Logger::new(NullSink);
    let mut runtime =
        CanvasRuntime::new(page, CanvasConfig::default(), outbox)?.with_logger(logger.clone());
    runtime.register_plugin(LifecycleLoggerPlugin::new(logger));
    let request_id = runtime.render_gadget_group("canvas", "bench", None);
    runtime.post(HostEvent::Backend(BackendResponse::GroupFetched {
        request_id,
        group: group(12),
    }));
    Ok(runtime)
}

fn rpc_events() -> Vec<HostEvent> {
    let mut events = Vec::new();
    for i in 0..200 {
        let sender = CallContext::from_frame(format!("Application-{}", i % 12));
        events.push(HostEvent::Rpc(RpcCall::new(
            RESIZE_IFRAME,
            sender.clone(),
            vec![json!(100 + i)],
        )));
        events.push(HostEvent::Rpc(RpcCall::new(
            SET_TITLE,
            sender,
            vec![json!(format!("<b>title {i}</b>"))],
        )));
    }
    events
}

criterion_group!(benches, render_group, rpc_script, resolve_bundle);
criterion_main!(benches);
