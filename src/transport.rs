//! # Transport Module
//!
//! The engine does not own sockets. A [`TransportAdapter`] is whatever HTTP
//! server the application runs on: it accepts one callback per
//! (method, path) and turns wire requests into [`EngineRequest`]s.
//!
//! [`crate::pipeline::Engine::mount`] registers every route of a built engine
//! with an adapter; each callback runs the full request pipeline and returns
//! a [`Dispatched`]. The adapter writes its [`EngineResponse`] out and only
//! then runs the [`AfterResponse`], which starts the request's background
//! tasks.
//!
//! [`EngineResponse`]: crate::pipeline::EngineResponse
//! [`AfterResponse`]: crate::pipeline::AfterResponse
//!
//! The adapter is expected to pass every request for a mounted path to its
//! callback unchanged (raw path, raw query, headers, body). Method and path
//! matching happens again inside the engine, so an adapter that routes
//! coarsely still gets 404/405 answers right.

use crate::pipeline::{Dispatched, EngineRequest};
use futures::future::BoxFuture;
use http::Method;
use std::net::SocketAddr;
use std::sync::Arc;

/// Request callback handed to the transport, one per mounted route
pub type TransportCallback =
    Arc<dyn Fn(EngineRequest) -> BoxFuture<'static, Dispatched> + Send + Sync>;

/// Interface an HTTP server implements to host an engine.
pub trait TransportAdapter {
    /// Route requests for `method` + `path` template to `callback`.
    fn register(
        &mut self,
        method: &Method,
        path: &str,
        callback: TransportCallback,
    ) -> anyhow::Result<()>;

    /// Start accepting connections and return the bound address.
    ///
    /// Port `0` asks for any free port.
    fn listen(&mut self, port: u16) -> BoxFuture<'_, anyhow::Result<SocketAddr>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::App;
    use crate::route::RouteConfig;
    use anyhow::bail;
    use http::StatusCode;
    use serde_json::json;
    use std::net::{IpAddr, Ipv4Addr};

    #[derive(Default)]
    struct RecordingTransport {
        routes: Vec<(Method, String, TransportCallback)>,
        listening: Option<u16>,
    }

    impl RecordingTransport {
        fn callback(&self, method: &Method, path: &str) -> Option<&TransportCallback> {
            self.routes
                .iter()
                .find(|(m, p, _)| m == method && p == path)
                .map(|(_, _, cb)| cb)
        }
    }

    impl TransportAdapter for RecordingTransport {
        fn register(
            &mut self,
            method: &Method,
            path: &str,
            callback: TransportCallback,
        ) -> anyhow::Result<()> {
            if self.listening.is_some() {
                bail!("cannot register {method} {path} after listen");
            }
            self.routes.push((method.clone(), path.to_string(), callback));
            Ok(())
        }

        fn listen(&mut self, port: u16) -> BoxFuture<'_, anyhow::Result<SocketAddr>> {
            self.listening = Some(port);
            let port = if port == 0 { 40_000 } else { port };
            Box::pin(async move { Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port)) })
        }
    }

    fn engine() -> crate::pipeline::Engine {
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
        .unwrap();
        app.build().unwrap()
    }

    #[tokio::test]
    async fn mount_registers_every_route_including_docs() {
        let engine = engine();
        let mut transport = RecordingTransport::default();
        let mounted = engine.mount(&mut transport).unwrap();

        assert_eq!(mounted, engine.registry().len());
        assert!(transport.callback(&Method::GET, "/users/{id}").is_some());
        assert!(transport.callback(&Method::GET, "/openapi.json").is_some());

        let addr = transport.listen(0).await.unwrap();
        assert_eq!(addr.port(), 40_000);
    }

    #[tokio::test]
    async fn callback_runs_the_pipeline() {
        let engine = engine();
        let mut transport = RecordingTransport::default();
        engine.mount(&mut transport).unwrap();

        let callback = transport.callback(&Method::GET, "/users/{id}").unwrap();
        let (response, after) = callback(EngineRequest::new(Method::GET, "/users/123"))
            .await
            .into_parts();
        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body, json!({ "id": 123 }));
        assert_eq!(after.pending(), 0);

        let dispatched = callback(EngineRequest::new(Method::GET, "/users/abc")).await;
        assert_eq!(dispatched.response.status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(dispatched.after.run(), 0);
    }

    #[tokio::test]
    async fn adapter_errors_abort_mounting() {
        let engine = engine();
        let mut transport = RecordingTransport::default();
        transport.listen(8080).await.unwrap();
        assert!(engine.mount(&mut transport).is_err());
    }
}
