//! # Parsing de la Request Line HTTP/1.0
//! src/http/request.rs
//!
//! El núcleo no interpreta HTTP; acá solo se lee la primera línea para
//! saber qué se pidió y clasificarlo como estático o dinámico.
//!
//! ```text
//! GET /cgi-bin/output.cgi?5 HTTP/1.0\r\n
//! ```

use crate::stats::RequestKind;
use thiserror::Error;

/// Métodos HTTP soportados
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    GET,
    HEAD,
    POST,
}

impl Method {
    fn parse(s: &str) -> Result<Self, ParseError> {
        match s {
            "GET" => Ok(Method::GET),
            "HEAD" => Ok(Method::HEAD),
            "POST" => Ok(Method::POST),
            _ => Err(ParseError::UnsupportedMethod(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
        }
    }
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Request vacío
    #[error("Empty request")]
    EmptyRequest,

    /// Formato inválido de la request line
    #[error("Invalid request line format")]
    InvalidRequestLine,

    /// Método HTTP no soportado
    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    /// Versión HTTP incorrecta
    #[error("Invalid HTTP version: {0}")]
    InvalidHttpVersion(String),
}

/// Request line parseada
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    method: Method,
    uri: String,
    version: String,
}

impl Request {
    /// Parsea la request line desde los bytes recibidos
    ///
    /// Solo mira la primera línea; headers y body se ignoran.
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use http_dispatch::http::Request;
    /// use http_dispatch::stats::RequestKind;
    ///
    /// let request = Request::parse(b"GET /cgi-bin/output.cgi?3 HTTP/1.0\r\n\r\n").unwrap();
    /// assert_eq!(request.path(), "/cgi-bin/output.cgi");
    /// assert_eq!(request.kind(), RequestKind::Dynamic);
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(buffer).map_err(|_| ParseError::InvalidRequestLine)?;

        let line = text.lines().next().unwrap_or("").trim();
        if line.is_empty() {
            return Err(ParseError::EmptyRequest);
        }

        // Debe tener exactamente 3 partes: METHOD URI VERSION
        let parts: Vec<&str> = line.split_whitespace().collect();
        if parts.len() != 3 {
            return Err(ParseError::InvalidRequestLine);
        }

        let method = Method::parse(parts[0])?;
        let uri = parts[1].to_string();
        let version = parts[2].to_string();
        if version != "HTTP/1.0" && version != "HTTP/1.1" {
            return Err(ParseError::InvalidHttpVersion(version));
        }

        Ok(Request { method, uri, version })
    }

    pub fn method(&self) -> Method {
        self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// URI sin la query
    pub fn path(&self) -> &str {
        self.uri.split('?').next().unwrap_or(&self.uri)
    }

    pub fn query(&self) -> Option<&str> {
        self.uri.split_once('?').map(|(_, query)| query)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    /// Todo lo que tenga "cgi" en la URI es contenido dinámico
    pub fn kind(&self) -> RequestKind {
        if self.uri.contains("cgi") {
            RequestKind::Dynamic
        } else {
            RequestKind::Static
        }
    }
}
