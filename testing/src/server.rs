// Copyright AGNTCY Contributors (https://github.com/agntcy)
// SPDX-License-Identifier: Apache-2.0

use std::io;
use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::runtime::{Builder, Runtime};
use tokio_stream::wrappers::TcpListenerStream;
use tokio_util::sync::CancellationToken;
use tonic::transport::Server;
use tracing::{error, info};

use crate::mock::MockUpsf;
use upsf_proto::UpsfServiceServer;

/// A [`MockUpsf`] served over loopback TCP on an ephemeral port.
/// The server stops when this value is dropped.
pub struct MockServer {
    addr: SocketAddr,
    mock: MockUpsf,
    shutdown: CancellationToken,
    runtime: Option<Runtime>,
}

impl MockServer {
    /// Serves `mock` on the current runtime.
    pub async fn start(mock: MockUpsf) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();

        tokio::spawn(serve(mock.clone(), listener, shutdown.clone()));
        info!(%addr, "mock upsf server started");

        Ok(MockServer {
            addr,
            mock,
            shutdown,
            runtime: None,
        })
    }

    /// Serves `mock` on a runtime owned by the server, for callers that are
    /// not async themselves.
    pub fn start_in_background(mock: MockUpsf) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("upsf-mock")
            .enable_all()
            .build()?;

        let mut server = runtime.block_on(Self::start(mock))?;
        server.runtime = Some(runtime);
        Ok(server)
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn host(&self) -> String {
        self.addr.ip().to_string()
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn mock(&self) -> &MockUpsf {
        &self.mock
    }
}

impl Drop for MockServer {
    fn drop(&mut self) {
        // open watch streams would hold the graceful shutdown forever
        self.mock.close_streams();
        self.shutdown.cancel();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

async fn serve(mock: MockUpsf, listener: TcpListener, shutdown: CancellationToken) {
    let incoming = TcpListenerStream::new(listener);
    let result = Server::builder()
        .add_service(UpsfServiceServer::new(mock))
        .serve_with_incoming_shutdown(incoming, async move { shutdown.cancelled().await })
        .await;

    if let Err(e) = result {
        error!(error = %e, "mock upsf server failed");
    }
}
