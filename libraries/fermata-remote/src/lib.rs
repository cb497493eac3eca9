//! Fermata remote session server
//!
//! Lets browsers and phones drive the player over a WebSocket. A client
//! authenticates within a short window, receives the full player state, and
//! from then on gets every state change pushed while sending control events
//! back.
//!
//! ```no_run
//! use fermata_remote::{RemoteAuth, RemoteConfig, RemoteServer};
//! # async fn example(controller: fermata_playback::ControllerHandle) -> fermata_remote::Result<()> {
//! let config = RemoteConfig::default();
//! let auth = RemoteAuth::from_config(&config);
//! let server = RemoteServer::start(&config, auth, controller).await?;
//! println!("listening on {}", server.local_addr());
//! server.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod config;
pub mod error;
pub mod hub;
mod middleware;
pub mod outbound;
pub mod protocol;
pub mod server;
pub mod session;
pub mod state;

pub use auth::RemoteAuth;
pub use config::RemoteConfig;
pub use error::{RemoteError, Result};
pub use protocol::{ClientEvent, CloseDisposition, RemoteState, ServerEvent, PROTOCOL_VERSION};
pub use server::{create_router, RemoteServer};
