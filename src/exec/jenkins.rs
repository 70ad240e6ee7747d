// src/exec/jenkins.rs

//! Jenkins implementation of [`BuildServer`] over its JSON API.

use std::time::Duration;

use reqwest::{Client, RequestBuilder, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::config::model::ServerConfig;
use crate::errors::{FlowError, Result};

use super::backend::{BoxFuture, BuildServer};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobInfo {
    #[serde(default)]
    in_queue: bool,
    #[serde(default)]
    buildable: bool,
}

#[derive(Debug, Deserialize)]
struct BuildInfo {
    #[serde(default)]
    building: bool,
}

/// Client for one Jenkins server.
#[derive(Debug, Clone)]
pub struct JenkinsClient {
    name: String,
    base: Url,
    user: Option<String>,
    token: Option<String>,
    http: Client,
}

impl JenkinsClient {
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let base = Url::parse(&server.url)
            .map_err(|e| FlowError::Config(format!("invalid [server].url '{}': {e}", server.url)))?;

        let http = Client::builder().timeout(REQUEST_TIMEOUT).build()?;

        Ok(Self {
            name: server.name.clone(),
            base,
            user: server.user.clone(),
            token: server.token.clone(),
            http,
        })
    }

    /// `{base}/job/a/job/b/{tail..}` for a job named `a/b`.
    fn job_url(&self, job: &str, tail: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                FlowError::Config(format!("build server url '{}' cannot be a base", self.base))
            })?;
            segments.pop_if_empty();
            for part in job.split('/').filter(|p| !p.is_empty()) {
                segments.push("job");
                segments.push(part);
            }
            segments.extend(tail);
        }
        Ok(url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.user {
            Some(user) => request.basic_auth(user, self.token.as_deref()),
            None => request,
        }
    }

    async fn job_info(&self, job: &str, tree: &str) -> Result<Option<JobInfo>> {
        let mut url = self.job_url(job, &["api", "json"])?;
        url.query_pairs_mut().append_pair("tree", tree);

        let response = self.authorized(self.http.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        Ok(Some(response.error_for_status()?.json().await?))
    }

    async fn post_build(&self, job: &str) -> Result<bool> {
        let url = self.job_url(job, &["build"])?;
        let response = self.authorized(self.http.post(url)).send().await?;

        // Parameterized jobs reject a plain build request.
        let response = if response.status() == StatusCode::BAD_REQUEST {
            debug!(job, "retrying as parameterized build");
            let url = self.job_url(job, &["buildWithParameters"])?;
            self.authorized(self.http.post(url)).send().await?
        } else {
            response
        };

        match response.status() {
            status if status.is_success() => {
                info!(job, server = %self.name, "build triggered");
                Ok(true)
            }
            StatusCode::NOT_FOUND => {
                warn!(job, server = %self.name, "job not found on build server");
                Ok(false)
            }
            _ => {
                response.error_for_status()?;
                Ok(false)
            }
        }
    }

    async fn build_running(&self, job: &str, number: u64) -> Result<bool> {
        if self.job_info(job, "inQueue").await?.is_some_and(|i| i.in_queue) {
            return Ok(true);
        }

        let number = number.to_string();
        let mut url = self.job_url(job, &[number.as_str(), "api", "json"])?;
        url.query_pairs_mut().append_pair("tree", "building");

        let response = self.authorized(self.http.get(url)).send().await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let info: BuildInfo = response.error_for_status()?.json().await?;
        Ok(info.building)
    }
}

impl BuildServer for JenkinsClient {
    fn trigger<'a>(&'a self, job: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(self.post_build(job))
    }

    fn is_in_queue<'a>(&'a self, job: &'a str) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            Ok(self
                .job_info(job, "inQueue")
                .await?
                .is_some_and(|info| info.in_queue))
        })
    }

    fn is_building<'a>(&'a self, job: &'a str, number: u64) -> BoxFuture<'a, Result<bool>> {
        Box::pin(self.build_running(job, number))
    }

    fn is_buildable<'a>(
        &'a self,
        name: &'a str,
        target: Option<&'a str>,
    ) -> BoxFuture<'a, Result<bool>> {
        Box::pin(async move {
            if target.is_some_and(|target| target != self.name) {
                debug!(job = name, ?target, server = %self.name, "job targets another server");
                return Ok(false);
            }

            Ok(self
                .job_info(name, "buildable")
                .await?
                .is_some_and(|info| info.buildable))
        })
    }
}
