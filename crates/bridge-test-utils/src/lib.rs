//! Shared test fixtures for the commit-bridge workspace.
//!
//! Used only as a dev-dependency; never published.
//!
//! # Modules
//!
//! - [`store`]: content-addressed object store with real ref semantics
//! - [`memory`]: [`InMemoryHost`], a `RepositoryHost` with fault injection
//! - [`fake_github`]: [`FakeGithub`], the GitHub Git Data API over HTTP
//! - [`fake_render`]: [`FakeRender`], Render's create-deploy endpoint
//! - [`server`]: run any router on an ephemeral port

pub mod fake_github;
pub mod fake_render;
pub mod memory;
pub mod server;
pub mod store;

pub use fake_github::FakeGithub;
pub use fake_render::FakeRender;
pub use memory::{HostCall, InMemoryHost};
pub use server::TestServer;
pub use store::{ObjectStore, StoredCommit};

use bridge_git::RepoCoordinate;

/// Repository coordinate used across tests.
pub fn test_repo() -> RepoCoordinate {
    RepoCoordinate::new("octo", "site")
}
