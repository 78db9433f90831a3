//! fleetcfg-client: Clients for the inventory, connector and dispatcher services
//!
//! Each external service is reached through a capability trait
//! ([`HostDirectory`], [`Connector`], [`Dispatcher`]). The HTTP
//! implementations live in [`inventory`], [`connector`] and [`dispatcher`];
//! [`replay`] holds scripted doubles for tests.
//!
//! # Examples
//!
//! ```no_run
//! use fleetcfg_client::{HostDirectory, InventoryClient, OrgContext};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let inventory = InventoryClient::new("http://host-inventory-service:8000")?;
//! let org = OrgContext::new("12345");
//!
//! let page = inventory.list(&org, 1).await?;
//! println!("{} of {} hosts", page.count, page.total);
//! # Ok(())
//! # }
//! ```

pub mod connector;
pub mod dispatcher;
pub mod error;
pub mod http;
pub mod inventory;
pub mod replay;
pub mod traits;
pub mod types;

pub use connector::ConnectorClient;
pub use dispatcher::DispatcherClient;
pub use error::{ClientError, Result};
pub use http::HttpClient;
pub use inventory::InventoryClient;
pub use traits::{Connector, Dispatcher, HostDirectory};
pub use types::{ConnectionStatus, Directive, HostPage, OrgContext, RunCreated, RunInput};
