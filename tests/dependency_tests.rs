use brrtapi::testing::TestClient;
use brrtapi::{App, Dependency, EngineError, RouteConfig};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[derive(Debug)]
struct Pool {
    opened: usize,
}

#[derive(Debug)]
struct Session {
    user: String,
}

type Seen<T> = Arc<Mutex<Vec<Arc<T>>>>;

#[tokio::test]
async fn test_singleton_is_shared_request_values_are_not() {
    let pools: Seen<Pool> = Arc::default();
    let sessions: Seen<Session> = Arc::default();
    let opened = Arc::new(AtomicUsize::new(0));

    let o = Arc::clone(&opened);
    let mut app = App::default();
    app.provide(
        "pool",
        Dependency::singleton(move |_| {
            let o = Arc::clone(&o);
            async move {
                Ok(Pool {
                    opened: o.fetch_add(1, Ordering::SeqCst) + 1,
                })
            }
        }),
    );

    let (p, s) = (Arc::clone(&pools), Arc::clone(&sessions));
    app.get(
        "/me",
        RouteConfig::new()
            .dependency(
                "session",
                Dependency::request(|ctx| async move {
                    ctx.get::<Pool>("pool")?;
                    let user = ctx.header("x-user").unwrap_or("anonymous").to_string();
                    Ok(Session { user })
                })
                .requires("pool"),
            )
            .handler(move |ctx| {
                let (p, s) = (Arc::clone(&p), Arc::clone(&s));
                async move {
                    let session = ctx.dependency::<Session>("session")?;
                    p.lock().push(ctx.dependency::<Pool>("pool")?);
                    s.lock().push(Arc::clone(&session));
                    Ok(json!({ "user": session.user }))
                }
            }),
    )
    .unwrap();
    let client = TestClient::new(app.build().unwrap());

    for user in ["ada", "grace"] {
        let response = client.get("/me").header("x-user", user).send().await;
        response.assert_status(200).assert_json(&json!({ "user": user }));
    }

    let pools = pools.lock();
    let sessions = sessions.lock();
    assert_eq!(pools.len(), 2);
    assert!(Arc::ptr_eq(&pools[0], &pools[1]));
    assert_eq!(pools[0].opened, 1);
    assert_eq!(opened.load(Ordering::SeqCst), 1);
    assert!(!Arc::ptr_eq(&sessions[0], &sessions[1]));
}

#[tokio::test]
async fn test_request_cleanup_runs_once_per_request() {
    let closed = Arc::new(AtomicUsize::new(0));
    let c = Arc::clone(&closed);

    let mut app = App::default();
    app.get(
        "/tx",
        RouteConfig::new()
            .dependency(
                "tx",
                Dependency::request(|_| async { Ok(Session { user: "tx".into() }) })
                    .on_cleanup(move |_tx: Arc<Session>| {
                        let c = Arc::clone(&c);
                        async move {
                            c.fetch_add(1, Ordering::SeqCst);
                            Ok(())
                        }
                    }),
            )
            .handler(|_| async { Ok(json!(null)) }),
    )
    .unwrap();
    let client = TestClient::new(app.build().unwrap());

    for _ in 0..3 {
        client.get("/tx").send().await.assert_status(200);
    }
    assert_eq!(closed.load(Ordering::SeqCst), 3);
}

#[test]
fn test_graph_errors_fail_registration() {
    let mut app = App::default();
    app.provide("a", Dependency::request(|_| async { Ok(1u8) }).requires("b"));
    app.provide("b", Dependency::request(|_| async { Ok(2u8) }).requires("a"));
    let cycle = app.get(
        "/cycle",
        RouteConfig::new()
            .dependency("root", Dependency::request(|_| async { Ok(0u8) }).requires("a"))
            .handler(|_| async { Ok(json!(null)) }),
    );
    assert!(matches!(cycle, Err(EngineError::DependencyCycle { .. })));

    app.provide("per_request", Dependency::request(|_| async { Ok(3u8) }));
    let scope = app.get(
        "/scope",
        RouteConfig::new()
            .dependency(
                "cache",
                Dependency::singleton(|_| async { Ok(4u8) }).requires("per_request"),
            )
            .handler(|_| async { Ok(json!(null)) }),
    );
    assert!(matches!(scope, Err(EngineError::DependencyScope { .. })));
    assert!(app.registry().is_empty());
}
