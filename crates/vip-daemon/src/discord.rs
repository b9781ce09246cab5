//! Discord REST implementation of [`MemberPlatform`].
//!
//! Only per-member endpoints are used; the full guild member list is never
//! fetched. No retry here: a failed call surfaces as a [`PortError`] and the
//! engine records it against that member.

use std::time::Duration;

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use vip_reconcile::{MemberPlatform, PlatformMember, PortError};

use crate::config::DiscordConfig;

const AUDIT_LOG_REASON: &str = "VIP reconciliation";

#[derive(Debug, Deserialize)]
struct GuildMemberDto {
    user: Option<UserDto>,
    #[serde(default)]
    roles: Vec<String>,
    joined_at: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserDto {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RoleDto {
    id: String,
}

#[derive(Clone, Debug)]
pub struct DiscordPlatform {
    http: reqwest::Client,
    config: DiscordConfig,
}

impl DiscordPlatform {
    pub fn new(config: DiscordConfig) -> Result<Self, PortError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .map_err(|e| PortError::Transport(format!("http client: {e}")))?;
        Ok(Self { http, config })
    }

    /// `{api_base}/guilds/{guild_id}/{segments..}`, each segment
    /// percent-encoded so no id can change the request target.
    fn url(&self, segments: &[&str]) -> Result<Url, PortError> {
        let mut url = Url::parse(&self.config.api_base)
            .map_err(|e| PortError::Transport(format!("invalid api base: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| {
                PortError::Transport(format!(
                    "api base cannot carry a path: {}",
                    self.config.api_base
                ))
            })?
            .pop_if_empty()
            .push("guilds")
            .push(&self.config.guild_id)
            .extend(segments);
        Ok(url)
    }

    fn auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("Authorization", format!("Bot {}", self.config.token))
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, PortError> {
        self.auth(req)
            .send()
            .await
            .map_err(|e| PortError::Transport(e.to_string()))
    }

    async fn role_mutation(
        &self,
        method: reqwest::Method,
        member_id: &str,
        role_id: &str,
    ) -> Result<(), PortError> {
        check_member_id(member_id)?;
        let url = self.url(&["members", member_id, "roles", role_id])?;
        let resp = self
            .send(
                self.http
                    .request(method, url)
                    .header("X-Audit-Log-Reason", AUDIT_LOG_REASON),
            )
            .await?;
        ensure_success(resp).await.map(|_| ())
    }
}

#[async_trait]
impl MemberPlatform for DiscordPlatform {
    async fn role_exists(&self, role_id: &str) -> Result<bool, PortError> {
        let resp = self.send(self.http.get(self.url(&["roles"])?)).await?;
        let roles: Vec<RoleDto> = ensure_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Decode(e.to_string()))?;
        Ok(roles.iter().any(|r| r.id == role_id))
    }

    async fn fetch_member(&self, member_id: &str) -> Result<Option<PlatformMember>, PortError> {
        check_member_id(member_id)?;
        let resp = self
            .send(self.http.get(self.url(&["members", member_id])?))
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let dto: GuildMemberDto = ensure_success(resp)
            .await?
            .json()
            .await
            .map_err(|e| PortError::Decode(e.to_string()))?;
        Ok(Some(member_from_dto(member_id, dto)))
    }

    async fn add_role(&self, member_id: &str, role_id: &str) -> Result<(), PortError> {
        self.role_mutation(reqwest::Method::PUT, member_id, role_id)
            .await
    }

    async fn remove_role(&self, member_id: &str, role_id: &str) -> Result<(), PortError> {
        self.role_mutation(reqwest::Method::DELETE, member_id, role_id)
            .await
    }
}

/// Discord ids are snowflakes: non-empty, ASCII digits only.
pub fn is_snowflake(id: &str) -> bool {
    !id.is_empty() && id.len() <= 20 && id.bytes().all(|b| b.is_ascii_digit())
}

fn check_member_id(member_id: &str) -> Result<(), PortError> {
    if is_snowflake(member_id) {
        return Ok(());
    }
    Err(PortError::Rejected {
        status: None,
        message: format!("invalid member id {member_id:?}"),
    })
}

fn member_from_dto(requested_id: &str, dto: GuildMemberDto) -> PlatformMember {
    PlatformMember {
        member_id: dto
            .user
            .map(|u| u.id)
            .unwrap_or_else(|| requested_id.to_string()),
        joined_at_ms: dto
            .joined_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.timestamp_millis()),
        role_ids: dto.roles,
    }
}

async fn ensure_success(resp: reqwest::Response) -> Result<reqwest::Response, PortError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(PortError::Rejected {
        status: Some(status.as_u16()),
        message: body,
    })
}
