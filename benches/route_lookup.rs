use brrtapi::registry::RouteRegistry;
use brrtapi::{App, EngineRequest, Route, RouteConfig};
use criterion::{criterion_group, criterion_main, Criterion};
use http::Method;
use serde_json::json;
use std::hint::black_box;

const PATHS: &[(&str, &[&str])] = &[
    ("/", &["GET"]),
    ("/zoo/animals", &["GET", "POST"]),
    ("/zoo/animals/{id}", &["GET", "PUT", "PATCH", "DELETE"]),
    ("/zoo/animals/{id}/toys/{toy_id}", &["GET"]),
    (
        "/zoo/{category}/animals/{id}/habitats/{habitat_id}/sections/{section_id}",
        &["GET"],
    ),
    (
        "/inventory/{warehouse_id}/feeds/{feed_id}/items/{item_id}/batches/{batch_id}",
        &["POST"],
    ),
    ("/complex/{a}/{b}/{c}/{d}/{e}/{f}/{g}/{h}/{i}", &["GET"]),
    ("/zoo/health", &["HEAD", "OPTIONS"]),
];

fn ok() -> RouteConfig {
    RouteConfig::new().handler(|_| async { Ok(json!({ "ok": true })) })
}

fn registry() -> RouteRegistry {
    let mut registry = RouteRegistry::new();
    for (path, methods) in PATHS {
        for method in *methods {
            let method = Method::from_bytes(method.as_bytes()).expect("valid method");
            registry
                .register(Route::new(method, path, ok()).expect("valid route"))
                .expect("no conflict");
        }
    }
    // Filler routes so lookup is measured against a realistic registry size
    for i in 0..200 {
        let path = format!("/filler/r{i}/{{id}}");
        registry
            .register(Route::new(Method::GET, &path, ok()).expect("valid route"))
            .expect("no conflict");
    }
    registry.freeze();
    registry
}

fn bench_route_lookup(c: &mut Criterion) {
    let registry = registry();
    let requests = [
        (Method::GET, "/zoo/animals/123"),
        (Method::GET, "/zoo/animals/123/toys/456"),
        (Method::GET, "/zoo/cats/animals/123/habitats/88/sections/5"),
        (Method::POST, "/inventory/1/feeds/2/items/3/batches/4"),
        (Method::GET, "/complex/1/2/3/4/5/6/7/8/9"),
        (Method::GET, "/filler/r150/9"),
    ];
    c.bench_function("route_lookup", |b| {
        b.iter(|| {
            for (method, path) in &requests {
                let found = registry.find(method, path);
                black_box(&found);
            }
        })
    });
    c.bench_function("route_lookup_miss", |b| {
        b.iter(|| black_box(registry.find(&Method::GET, "/zoo/animals/1/unknown")))
    });
}

fn bench_pipeline(c: &mut Criterion) {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime");
    let mut app = App::default();
    app.get(
        "/users/{id}",
        RouteConfig::new()
            .params(json!({
                "type": "object",
                "properties": { "id": { "type": "integer" } },
                "required": ["id"]
            }))
            .handler(|ctx| async move { Ok(json!({ "id": ctx.params()["id"] })) }),
    )
    .expect("valid route");
    let engine = app.build().expect("engine");

    c.bench_function("pipeline_get_user", |b| {
        b.iter(|| {
            let response =
                runtime.block_on(engine.handle(EngineRequest::new(Method::GET, "/users/42")));
            black_box(response)
        })
    });
}

criterion_group!(benches, bench_route_lookup, bench_pipeline);
criterion_main!(benches);
