//! IO modules - external system interfaces
//!
//! - `resource` - LAN address resolution and vote URIs
//! - `qr` - QR encoding and PNG rendering
//! - `persistence` - Pack files on disk
//! - `fs_init` - Startup directory layout
//! - `http` - Poll HTTP server

pub mod fs_init;
pub mod http;
pub mod persistence;
pub mod qr;
pub mod resource;

// Re-export commonly used types
pub use fs_init::FileSystemInitializer;
pub use http::{start_http_server, AppState};
pub use persistence::{DeleteRejection, PackError, PackStore};
pub use qr::{PngQrCodec, QrCodec};
pub use resource::{LanAddressResolver, LocalResourceEncoder, StaticAddress, UdpProbeResolver};
