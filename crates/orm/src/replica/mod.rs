//! Read replicas discovered through DNS.
//!
//! A replica DSN names a domain instead of a host. [`ReplicaSelector`]
//! resolves the domain, opens one connection per address and keeps the list
//! fresh in the background. [`MasterSlaves`] sends reads to the selected
//! replica and everything else to the primary.

mod dsn;
mod master_slaves;
mod selector;

pub use dsn::Dsn;
pub use master_slaves::MasterSlaves;
pub use selector::{Replica, ReplicaSelector, ReplicaSelectorConfig, ReplicaSet, discover};

use std::net::IpAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::{ConnectivityError, OrmResult};
use crate::session::Connection;

/// Turns a domain into addresses.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Resolves `domain`; `port` is passed for resolvers that need it.
    async fn resolve(&self, domain: &str, port: u16) -> OrmResult<Vec<IpAddr>>;
}

/// Resolves through the operating system.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemResolver;

#[async_trait]
impl HostResolver for SystemResolver {
    async fn resolve(&self, domain: &str, port: u16) -> OrmResult<Vec<IpAddr>> {
        let addrs = tokio::net::lookup_host((domain, port))
            .await
            .map_err(|e| ConnectivityError::Resolution {
                domain: domain.to_string(),
                message: e.to_string(),
            })?;
        let mut ips: Vec<IpAddr> = addrs.map(|addr| addr.ip()).collect();
        ips.sort();
        ips.dedup();
        Ok(ips)
    }
}

/// Opens connections from DSNs.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a connection named `name` to `dsn`.
    async fn connect(&self, name: &str, dsn: &str) -> OrmResult<Arc<dyn Connection>>;
}
