//! # Handler de Conexiones TCP
//! src/http/responder.rs
//!
//! Lee un request, actualiza las estadísticas del worker y responde con los
//! headers de planificación:
//!
//! | Header                | Valor                                           |
//! |-----------------------|-------------------------------------------------|
//! | `Stat-Req-Arrival`    | llegada, `segundos.microsegundos` desde epoch   |
//! | `Stat-Req-Dispatch`   | espera en pending, `segundos.microsegundos`     |
//! | `Stat-Thread-Id`      | índice del worker                               |
//! | `Stat-Thread-Count`   | requests atendidos por el worker                |
//! | `Stat-Thread-Static`  | requests estáticos atendidos por el worker      |
//! | `Stat-Thread-Dynamic` | requests dinámicos atendidos por el worker      |

use crate::http::{ParseError, Request, Response, StatusCode};
use crate::server::{ConnectionHandler, Dispatch};
use crate::stats::WorkerStats;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::{Duration, SystemTime};
use tracing::{debug, warn};

/// Tamaño máximo del request que se lee
const READ_BUFFER_SIZE: usize = 8192;

/// Handler por defecto del servidor TCP
#[derive(Debug, Clone)]
pub struct StatsResponder {
    read_timeout: Duration,
}

impl StatsResponder {
    pub fn new() -> Self {
        Self { read_timeout: Duration::from_secs(5) }
    }

    /// Cambia cuánto se espera a que el cliente mande su request
    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    fn respond(&self, stream: &mut TcpStream, dispatch: &Dispatch, stats: &WorkerStats) -> io::Result<()> {
        stream.set_read_timeout(Some(self.read_timeout))?;

        let mut buffer = [0u8; READ_BUFFER_SIZE];
        let bytes_read = stream.read(&mut buffer)?;
        if bytes_read == 0 {
            debug!(connection = %dispatch.connection, "peer closed before sending a request");
            return Ok(());
        }

        let response = match Request::parse(&buffer[..bytes_read]) {
            Ok(request) => {
                stats.record(request.kind());
                debug!(
                    connection = %dispatch.connection,
                    worker = dispatch.worker,
                    method = request.method().as_str(),
                    uri = request.uri(),
                    "request served"
                );
                let body = serde_json::json!({
                    "method": request.method().as_str(),
                    "uri": request.uri(),
                    "kind": request.kind(),
                });
                Response::json(&body.to_string())
            }
            Err(e) => {
                stats.record_error();
                debug!(connection = %dispatch.connection, "bad request: {}", e);
                let status = match &e {
                    ParseError::UnsupportedMethod(_) => StatusCode::NotImplemented,
                    _ => StatusCode::BadRequest,
                };
                Response::error(status, &format!("Invalid: {}", e))
            }
        };

        let response = with_stat_headers(response, dispatch, stats);
        stream.write_all(&response.to_bytes())?;
        stream.flush()
    }
}

impl Default for StatsResponder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionHandler<TcpStream> for StatsResponder {
    fn serve(&self, stream: &mut TcpStream, dispatch: &Dispatch, stats: &WorkerStats) {
        if let Err(e) = self.respond(stream, dispatch, stats) {
            warn!(connection = %dispatch.connection, worker = dispatch.worker, "I/O error: {}", e);
        }
    }

    fn close(&self, stream: TcpStream) {
        // Si el peer ya cerró, shutdown falla con NotConnected; no importa
        if let Err(e) = stream.shutdown(Shutdown::Both) {
            debug!("shutdown: {}", e);
        }
    }
}

fn with_stat_headers(response: Response, dispatch: &Dispatch, stats: &WorkerStats) -> Response {
    let arrival = dispatch
        .arrival
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or(Duration::ZERO);

    response
        .with_header("Stat-Req-Arrival", &format_timeval(arrival))
        .with_header("Stat-Req-Dispatch", &format_timeval(dispatch.queue_delay()))
        .with_header("Stat-Thread-Id", &dispatch.worker.to_string())
        .with_header("Stat-Thread-Count", &stats.total_hits().to_string())
        .with_header("Stat-Thread-Static", &stats.static_hits().to_string())
        .with_header("Stat-Thread-Dynamic", &stats.dynamic_hits().to_string())
}

/// `segundos.microsegundos`, como un `struct timeval`
fn format_timeval(duration: Duration) -> String {
    format!("{}.{:06}", duration.as_secs(), duration.subsec_micros())
}
