//! Transport port and the behavior that installs one as `send`

use std::sync::Arc;

use async_trait::async_trait;
use querykit_domain::{LogLevel, QueryResult, RawResponse, RequestInit};

use crate::behaviors::markers::strip_marker_headers;
use crate::queryable::Queryable;
use crate::timeline::{Behavior, Observer};

/// Performs the actual network call for one request.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, url: &str, init: &RequestInit) -> QueryResult<RawResponse>;
}

/// Registers a transport as the sole `send` observer.
#[derive(Clone)]
pub struct UseTransport {
    transport: Arc<dyn Transport>,
}

impl UseTransport {
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self { transport: Arc::new(transport) }
    }

    pub fn from_arc(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }
}

impl Behavior<Queryable> for UseTransport {
    fn apply(self, mut target: Queryable) -> Queryable {
        let transport = self.transport;
        target.on_mut().send.replace(Observer::send(move |ctx, url, mut init| {
            let transport = Arc::clone(&transport);
            async move {
                strip_marker_headers(&mut init);
                ctx.log(format!("Sending {} {url}", init.method), LogLevel::Verbose);
                let response = transport.send(&url, &init).await?;
                ctx.log(format!("Received {} from {url}", response.status), LogLevel::Verbose);
                Ok(response)
            }
        }));
        target
    }
}
