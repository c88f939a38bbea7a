// SPDX-License-Identifier: MIT OR Apache-2.0
//! Dev-Nexus umbrella crate.
//!
//! Re-exports every workspace crate under one roof so collaborators that
//! embed the knowledge base (the dashboard, the analyzer CLI) can depend
//! on a single package.  The service binary lives in `nexus-server`.

pub use nexus_auth as auth;
pub use nexus_config as config;
pub use nexus_core as core;
pub use nexus_error as error;
pub use nexus_extractor as extractor;
pub use nexus_peers as peers;
pub use nexus_server as server;
pub use nexus_similarity as similarity;
pub use nexus_skills as skills;
pub use nexus_store as store;
