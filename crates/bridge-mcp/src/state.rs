//! Shared server state

use std::sync::Arc;
use std::time::Instant;

use bridge_config::BridgeConfig;
use bridge_deploy::RenderClient;
use bridge_git::{CommitBuilder, GithubHost, RepoCoordinate, RepositoryHost};

use crate::Result;

/// Commit builder over whichever host the server was started with.
pub type SharedBuilder = CommitBuilder<Arc<dyn RepositoryHost>>;

/// Everything a request handler needs. Cheap to clone.
#[derive(Clone)]
pub struct AppState {
    builder: Arc<SharedBuilder>,
    repository: RepoCoordinate,
    render: Option<RenderClient>,
    render_service_id: Option<String>,
    started: Instant,
}

impl AppState {
    pub fn new(builder: SharedBuilder, repository: RepoCoordinate) -> Self {
        Self {
            builder: Arc::new(builder),
            repository,
            render: None,
            render_service_id: None,
            started: Instant::now(),
        }
    }

    /// Enable deploys; `service_id` is used when a request names none.
    pub fn with_render(mut self, client: RenderClient, service_id: Option<String>) -> Self {
        self.render = Some(client);
        self.render_service_id = service_id;
        self
    }

    /// Wire up GitHub and, when configured, Render.
    pub fn from_config(config: &BridgeConfig) -> Result<Self> {
        let github = &config.github;
        let host: Arc<dyn RepositoryHost> = Arc::new(GithubHost::with_api_base(
            github.token.clone(),
            github.api_base.clone(),
        )?);
        let builder = CommitBuilder::new(host, github.default_branch.clone())
            .with_timeout(config.server.commit_timeout());
        let mut state = Self::new(
            builder,
            RepoCoordinate::new(github.owner.clone(), github.repo.clone()),
        );

        match &config.render {
            Some(render) if render.is_configured() => {
                let client =
                    RenderClient::with_api_base(render.api_key.clone(), render.api_base.clone())?;
                state = state.with_render(client, render.service_id.clone());
            }
            _ => tracing::info!("Render deploys disabled: RENDER_API_KEY not set"),
        }
        Ok(state)
    }

    pub fn builder(&self) -> &SharedBuilder {
        &self.builder
    }

    pub fn repository(&self) -> &RepoCoordinate {
        &self.repository
    }

    pub fn render(&self) -> Option<&RenderClient> {
        self.render.as_ref()
    }

    pub fn render_service_id(&self) -> Option<&str> {
        self.render_service_id.as_deref()
    }

    pub fn uptime_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }
}
