// src/interception/channel.rs
//! The interception channel seam
//!
//! Commands flow back to the pause channel through this trait: resuming a
//! held exchange (optionally with substituted content) and fetching a held
//! response's body. Implementations adapt whatever protocol actually holds
//! the traffic; the engine only sees these two calls.

use crate::utils::errors::{EngineError, Result};
use crate::utils::ids::PauseId;
use crate::wire::Header;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

/// Content substituted into an exchange when resuming it
///
/// `None` fields leave the original value on the wire untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResumeOverrides {
    pub method: Option<String>,
    pub url: Option<String>,
    pub headers: Option<Vec<Header>>,
    pub body: Option<String>,
}

impl ResumeOverrides {
    pub fn is_empty(&self) -> bool {
        self.method.is_none() && self.url.is_none() && self.headers.is_none() && self.body.is_none()
    }

    pub fn with_headers(headers: Vec<Header>) -> Self {
        Self {
            headers: Some(headers),
            ..Default::default()
        }
    }
}

/// Command channel back to the pause source
#[async_trait]
pub trait InterceptionChannel: Send + Sync {
    /// Release a held exchange, substituting content when overrides are given
    async fn resume(&self, pause_id: &PauseId, overrides: Option<ResumeOverrides>) -> Result<()>;

    /// Retrieve the body of an exchange held at response stage
    async fn fetch_response_body(&self, pause_id: &PauseId) -> Result<String>;
}

/// A command issued through a [`ScriptedChannel`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IssuedCommand {
    Resume {
        pause_id: PauseId,
        overrides: Option<ResumeOverrides>,
    },
    FetchBody {
        pause_id: PauseId,
    },
}

/// Scriptable channel for tests and local development
///
/// Records every issued command and answers body fetches from scripted
/// values. Individual pause ids can be scripted to fail.
#[derive(Default)]
pub struct ScriptedChannel {
    commands: Mutex<Vec<IssuedCommand>>,
    bodies: Mutex<HashMap<PauseId, String>>,
    failing_resumes: Mutex<HashSet<PauseId>>,
    failing_bodies: Mutex<HashSet<PauseId>>,
}

impl ScriptedChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the body returned for a pause id; unscripted ids return empty
    pub fn script_body(&self, pause_id: impl Into<PauseId>, body: impl Into<String>) {
        self.bodies.lock().insert(pause_id.into(), body.into());
    }

    /// Make `resume` fail for a pause id
    pub fn fail_resume_for(&self, pause_id: impl Into<PauseId>) {
        self.failing_resumes.lock().insert(pause_id.into());
    }

    /// Make `fetch_response_body` fail for a pause id
    pub fn fail_body_for(&self, pause_id: impl Into<PauseId>) {
        self.failing_bodies.lock().insert(pause_id.into());
    }

    /// Every command issued so far, in order
    pub fn issued(&self) -> Vec<IssuedCommand> {
        self.commands.lock().clone()
    }

    /// How many resumes were issued for a pause id
    pub fn resume_count(&self, pause_id: &PauseId) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| matches!(c, IssuedCommand::Resume { pause_id: p, .. } if p == pause_id))
            .count()
    }

    /// The overrides of the last resume issued for a pause id
    pub fn last_resume_overrides(&self, pause_id: &PauseId) -> Option<Option<ResumeOverrides>> {
        self.commands
            .lock()
            .iter()
            .rev()
            .find_map(|c| match c {
                IssuedCommand::Resume {
                    pause_id: p,
                    overrides,
                } if p == pause_id => Some(overrides.clone()),
                _ => None,
            })
    }
}

#[async_trait]
impl InterceptionChannel for ScriptedChannel {
    async fn resume(&self, pause_id: &PauseId, overrides: Option<ResumeOverrides>) -> Result<()> {
        self.commands.lock().push(IssuedCommand::Resume {
            pause_id: pause_id.clone(),
            overrides,
        });
        if self.failing_resumes.lock().contains(pause_id) {
            return Err(EngineError::ChannelFailed(format!(
                "scripted resume failure for {}",
                pause_id
            )));
        }
        Ok(())
    }

    async fn fetch_response_body(&self, pause_id: &PauseId) -> Result<String> {
        self.commands.lock().push(IssuedCommand::FetchBody {
            pause_id: pause_id.clone(),
        });
        if self.failing_bodies.lock().contains(pause_id) {
            return Err(EngineError::ChannelFailed(format!(
                "scripted body failure for {}",
                pause_id
            )));
        }
        Ok(self
            .bodies
            .lock()
            .get(pause_id)
            .cloned()
            .unwrap_or_default())
    }
}
