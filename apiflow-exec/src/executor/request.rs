use std::time::{Duration, Instant};

use apiflow_core::compress::{self, CompressError, CompressKind};
use apiflow_core::error::{Classify, ErrorKind};
use apiflow_core::types::{BodyKind, Endpoint, Example, ExampleParam, RawBody};
use apiflow_core::varsystem::{substitute, VarError, VarLookup};

use crate::executor::http::{HttpClient, HttpError, HttpResponse, PreparedRequest};

const BOUNDARY_LEN: usize = 30;

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error("VAR_MISSING: {0}")]
    VarMissing(#[from] VarError),
    #[error("UNSUPPORTED_ENCODING: {0}")]
    UnsupportedEncoding(String),
    #[error("invalid url {0:?}")]
    InvalidUrl(String),
    #[error("body: {0}")]
    Compress(CompressError),
}

impl From<CompressError> for BuildError {
    fn from(e: CompressError) -> Self {
        match e {
            CompressError::Unsupported(enc) => BuildError::UnsupportedEncoding(enc),
            other => BuildError::Compress(other),
        }
    }
}

impl Classify for BuildError {
    fn kind(&self) -> ErrorKind {
        match self {
            BuildError::VarMissing(_) | BuildError::InvalidUrl(_) => ErrorKind::InvalidArgument,
            BuildError::UnsupportedEncoding(_) => ErrorKind::Unsupported,
            BuildError::Compress(_) => ErrorKind::Internal,
        }
    }
}

/// The effective parts of one example, after any overlay has been applied.
#[derive(Debug, Clone, Copy)]
pub struct RequestParts<'a> {
    pub endpoint: &'a Endpoint,
    pub example: &'a Example,
    pub queries: &'a [ExampleParam],
    pub headers: &'a [ExampleParam],
    pub raw_body: Option<&'a RawBody>,
    pub form_body: &'a [ExampleParam],
    pub url_body: &'a [ExampleParam],
}

/// Template and assemble a request. Disabled rows are skipped everywhere.
pub fn build_request<L>(parts: RequestParts<'_>, vars: &L) -> Result<PreparedRequest, BuildError>
where
    L: VarLookup + ?Sized,
{
    let mut url = substitute(vars, &parts.endpoint.url)?;

    let queries = templated(parts.queries, vars)?;
    let mut headers = templated(parts.headers, vars)?;

    let mut encoding = None;
    for (k, v) in &headers {
        if k.eq_ignore_ascii_case("content-encoding") {
            encoding = Some(CompressKind::from_content_encoding(v)?);
        }
    }

    let body = match parts.example.body_kind {
        BodyKind::Raw => match parts.raw_body {
            Some(raw) => compress::decompress(raw.compress_kind, &raw.data)?,
            None => Vec::new(),
        },
        BodyKind::FormArray => {
            let fields = templated(parts.form_body, vars)?;
            let boundary: String = std::iter::repeat_with(fastrand::alphanumeric)
                .take(BOUNDARY_LEN)
                .collect();
            if !headers.iter().any(|(k, _)| k.eq_ignore_ascii_case("content-type")) {
                headers.push((
                    "Content-Type".to_string(),
                    format!("multipart/form-data; boundary={boundary}"),
                ));
            }
            multipart(&fields, &boundary)
        }
        BodyKind::UrlEncoded => {
            let fields = templated(parts.url_body, vars)?;
            if !fields.is_empty() {
                let encoded = fields
                    .iter()
                    .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
                    .collect::<Vec<_>>()
                    .join("&");
                url.push(if url.contains('?') { '&' } else { '?' });
                url.push_str(&encoded);
            }
            Vec::new()
        }
        BodyKind::Unspecified => Vec::new(),
    };

    let body = match encoding {
        Some(kind) => compress::compress(kind, &body)?,
        None => body,
    };

    url::Url::parse(&url).map_err(|_| BuildError::InvalidUrl(url.clone()))?;

    Ok(PreparedRequest {
        method: parts.endpoint.method.clone(),
        url,
        headers,
        queries,
        body,
    })
}

fn templated<L>(rows: &[ExampleParam], vars: &L) -> Result<Vec<(String, String)>, VarError>
where
    L: VarLookup + ?Sized,
{
    rows.iter()
        .filter(|r| r.enabled)
        .map(|r| Ok((r.key.clone(), substitute(vars, &r.value)?)))
        .collect()
}

fn multipart(fields: &[(String, String)], boundary: &str) -> Vec<u8> {
    let mut out = String::new();
    for (k, v) in fields {
        out.push_str(&format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{v}\r\n",
            k.replace('"', "%22")
        ));
    }
    out.push_str(&format!("--{boundary}--\r\n"));
    out.into_bytes()
}

#[derive(Debug, Clone)]
pub struct Dispatched {
    pub response: HttpResponse,
    pub duration: Duration,
}

/// Send an already prepared request and time it.
pub async fn send_prepared(
    client: &dyn HttpClient,
    req: PreparedRequest,
    timeout: Duration,
    max_response_bytes: usize,
) -> Result<Dispatched, HttpError> {
    let started = Instant::now();
    tracing::debug!(method = %req.method, url = %req.url, "dispatch");
    let response = client.send(req, timeout, max_response_bytes).await?;
    Ok(Dispatched {
        response,
        duration: started.elapsed(),
    })
}
