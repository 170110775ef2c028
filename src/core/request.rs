//! Request construction for streamget
//!
//! Picks a direct or proxy-tunnelled transport for a [`RequestDescriptor`] and
//! wraps the resulting `reqwest` request in an abortable [`RequestHandle`].

use std::time::Duration;

use log::debug;
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, PROXY_AUTHORIZATION, USER_AGENT};
use reqwest::{redirect, Client, ClientBuilder, Proxy, Request, Response};
use tokio_util::sync::CancellationToken;

use crate::core::error::{Error, Result};
use crate::core::options::{ProxyDescriptor, RequestDescriptor, Scheme};
use crate::core::redirect::Origin;

/// Transport settings shared by every client streamget builds
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    pub tcp_keepalive: Duration,
    pub pool_idle_timeout: Duration,
    pub user_agent: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            tcp_keepalive: Duration::from_secs(60),
            pool_idle_timeout: Duration::from_secs(90),
            user_agent: crate::core::options::USER_AGENT.to_string(),
        }
    }
}

/// Client used for every request that does not go through a proxy
static GLOBAL_CLIENT: Lazy<Client> = Lazy::new(|| {
    client_builder(&TransportConfig::default())
        .build()
        .expect("Failed to create HTTP client")
});

/// Base builder; redirects and decompression are handled by the downloader
///
/// Environment proxies are ignored so that a descriptor without a proxy
/// always connects directly.
fn client_builder(config: &TransportConfig) -> ClientBuilder {
    ClientBuilder::new()
        .no_proxy()
        .redirect(redirect::Policy::none())
        .no_gzip()
        .tcp_keepalive(config.tcp_keepalive)
        .pool_idle_timeout(config.pool_idle_timeout)
        .connect_timeout(config.connect_timeout)
        .user_agent(config.user_agent.clone())
}

/// How a request reaches its target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelKind {
    Direct,
    HttpOverHttp,
    HttpOverHttps,
    HttpsOverHttp,
    HttpsOverHttps,
}

impl TunnelKind {
    pub fn select(target: Scheme, proxy: Option<Scheme>) -> Self {
        match (target, proxy) {
            (_, None) => TunnelKind::Direct,
            (Scheme::Http, Some(Scheme::Http)) => TunnelKind::HttpOverHttp,
            (Scheme::Http, Some(Scheme::Https)) => TunnelKind::HttpOverHttps,
            (Scheme::Https, Some(Scheme::Http)) => TunnelKind::HttpsOverHttp,
            (Scheme::Https, Some(Scheme::Https)) => TunnelKind::HttpsOverHttps,
        }
    }
}

/// Cloneable cancellation switch for a request or a whole download
#[derive(Debug, Clone, Default)]
pub struct AbortHandle {
    token: CancellationToken,
}

impl AbortHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.token.cancel();
    }

    pub fn is_aborted(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once [`AbortHandle::abort`] has been called
    pub async fn aborted(&self) {
        self.token.cancelled().await
    }
}

/// A built, not yet sent, HTTP request
#[derive(Debug)]
pub struct RequestHandle {
    tunnel: TunnelKind,
    origin: Origin,
    client: Client,
    request: Request,
    abort: AbortHandle,
}

impl RequestHandle {
    pub fn tunnel(&self) -> TunnelKind {
        self.tunnel
    }

    pub fn origin(&self) -> &Origin {
        &self.origin
    }

    pub fn url(&self) -> &reqwest::Url {
        self.request.url()
    }

    /// Headers that will be sent to the target
    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        self.request.headers_mut()
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    pub fn abort(&self) {
        self.abort.abort();
    }

    /// Send the request headers immediately and wait for the response head
    ///
    /// Resolves to [`Error::Aborted`] if the handle is aborted first.
    pub async fn send(self) -> Result<Response> {
        let RequestHandle {
            client,
            request,
            abort,
            ..
        } = self;

        if abort.is_aborted() {
            return Err(Error::Aborted);
        }

        tokio::select! {
            _ = abort.aborted() => Err(Error::Aborted),
            result = client.execute(request) => result.map_err(Error::from),
        }
    }
}

/// Client for one transport path, reusable for every request taking it
///
/// A download builds its route once and reuses it across redirect hops, so
/// a proxied download keeps one connection pool and one TLS setup.
#[derive(Debug, Clone)]
pub struct Route {
    client: Client,
    proxy_scheme: Option<Scheme>,
    forward_headers: HeaderMap,
}

impl Route {
    /// Direct route, or one tunnelling through `proxy`
    pub fn new(proxy: Option<&ProxyDescriptor>, config: &TransportConfig) -> Result<Self> {
        match proxy {
            None => Ok(Route {
                client: direct_client(config)?,
                proxy_scheme: None,
                forward_headers: HeaderMap::new(),
            }),
            Some(proxy) => proxied_route(proxy, config),
        }
    }

    /// Headers to attach for a `target` request
    ///
    /// Custom proxy headers can only travel on forward-proxied plain HTTP
    /// requests; a CONNECT tunnel for an HTTPS target carries none.
    fn headers_for(&self, target: Scheme) -> HeaderMap {
        if target == Scheme::Http {
            return self.forward_headers.clone();
        }
        for name in self.forward_headers.keys() {
            debug!("Proxy header {name} is not carried by HTTPS tunnels");
        }
        HeaderMap::new()
    }
}

/// Build a request with its own abort handle
pub fn build_request(desc: &RequestDescriptor) -> Result<RequestHandle> {
    build_request_with(desc, AbortHandle::new(), &TransportConfig::default())
}

/// Build a request sharing `abort` with other requests of the same download
pub fn build_request_with(
    desc: &RequestDescriptor,
    abort: AbortHandle,
    config: &TransportConfig,
) -> Result<RequestHandle> {
    let route = Route::new(desc.proxy.as_ref(), config)?;
    build_request_on(desc, &route, abort)
}

/// Build a request on an existing route
///
/// The route must have been built for `desc.proxy`.
pub fn build_request_on(
    desc: &RequestDescriptor,
    route: &Route,
    abort: AbortHandle,
) -> Result<RequestHandle> {
    let tunnel = TunnelKind::select(desc.scheme, route.proxy_scheme);
    let url = desc.url()?;
    let client = route.client.clone();

    let mut builder = client
        .request(desc.method.clone(), url)
        .headers(route.headers_for(desc.scheme));
    if let Some(auth) = &desc.auth {
        builder = builder.basic_auth(&auth.username, auth.password.as_deref());
    }
    let request = builder.build()?;

    debug!("Prepared {} {} via {:?}", request.method(), request.url(), tunnel);

    Ok(RequestHandle {
        tunnel,
        origin: desc.origin(),
        client,
        request,
        abort,
    })
}

fn direct_client(config: &TransportConfig) -> Result<Client> {
    if *config == TransportConfig::default() {
        return Ok(GLOBAL_CLIENT.clone());
    }
    Ok(client_builder(config).build()?)
}

/// Route through `proxy`
///
/// `User-Agent` and `Proxy-Authorization` reach the proxy in every mode and
/// are configured on the client. Other headers are kept for forwarding.
fn proxied_route(proxy: &ProxyDescriptor, config: &TransportConfig) -> Result<Route> {
    let proxy_url = format!("{}://{}:{}", proxy.scheme, proxy.host, proxy.port);
    let mut reqwest_proxy = Proxy::all(&proxy_url)
        .map_err(|e| Error::Validation(format!("invalid proxy {proxy_url}: {e}")))?;

    if let Some(credential) = &proxy.credential {
        reqwest_proxy = reqwest_proxy.basic_auth(
            &credential.username,
            credential.password.as_deref().unwrap_or(""),
        );
    }

    let mut builder = client_builder(config);
    let mut forward_headers = HeaderMap::new();

    for (name, value) in &proxy.headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| Error::Validation(format!("invalid proxy header name: {name}")))?;
        let header_value = HeaderValue::from_str(value)
            .map_err(|_| Error::Validation(format!("invalid value for proxy header {name}")))?;

        if header_name == USER_AGENT {
            builder = builder.user_agent(header_value);
        } else if header_name == PROXY_AUTHORIZATION {
            reqwest_proxy = reqwest_proxy.custom_http_auth(header_value);
        } else {
            forward_headers.insert(header_name, header_value);
        }
    }

    Ok(Route {
        client: builder.proxy(reqwest_proxy).build()?,
        proxy_scheme: Some(proxy.scheme),
        forward_headers,
    })
}
