/// Transport session: the current transport plus the settings it was built with
use std::sync::Arc;

use super::transport::{HttpTransport, SessionSettings, Transport};
use crate::errors::NetworkResult;

/// Builds a transport for a set of session settings
pub type TransportFactory = Arc<dyn Fn(SessionSettings) -> NetworkResult<Arc<dyn Transport>> + Send + Sync>;

pub fn http_transport_factory() -> TransportFactory {
    Arc::new(|settings: SessionSettings| -> NetworkResult<Arc<dyn Transport>> {
        Ok(Arc::new(HttpTransport::new(settings)?))
    })
}

pub(crate) struct Session {
    pub(crate) settings: SessionSettings,
    pub(crate) transport: Arc<dyn Transport>,
}

impl Session {
    pub(crate) fn build(settings: SessionSettings, factory: &TransportFactory) -> NetworkResult<Self> {
        let transport = factory(settings)?;
        Ok(Self { settings, transport })
    }
}
