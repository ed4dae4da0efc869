//! Caller identity and authorisation.
//!
//! Authentication itself lives outside Judgeflow; an [`AccessGuard`] only
//! maps an opaque session token to a [`Caller`]. The APIs receive the
//! caller explicitly on every operation.

use std::collections::HashMap;

use async_trait::async_trait;
use judgeflow_state::{Assignment, JudgeId};
use serde::{Deserialize, Serialize};

use crate::config::AccessConfig;
use crate::domain::{Result, ReviewError};

/// Who is making a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "role", content = "judge_id")]
pub enum Caller {
    Admin,
    Judge(JudgeId),
    Anonymous,
}

impl Caller {
    /// Parse an identity string: `admin` or `judge:<id>`.
    pub fn parse(identity: &str) -> Option<Self> {
        let identity = identity.trim();
        if identity.eq_ignore_ascii_case("admin") {
            return Some(Caller::Admin);
        }
        let (role, id) = identity.split_once(':')?;
        if role.trim().eq_ignore_ascii_case("judge") && !id.trim().is_empty() {
            return Some(Caller::Judge(JudgeId::new(id.trim())));
        }
        None
    }

    /// Admin operations: create, delete, lock, roster, scoreboard.
    pub fn require_admin(&self) -> Result<()> {
        match self {
            Caller::Admin => Ok(()),
            Caller::Judge(judge_id) => Err(ReviewError::unauthorized(format!(
                "judge {judge_id} cannot perform administrative operations"
            ))),
            Caller::Anonymous => Err(ReviewError::Unauthenticated),
        }
    }

    /// Judge operations act on the caller's own identity.
    pub fn require_judge(&self) -> Result<&JudgeId> {
        match self {
            Caller::Judge(judge_id) => Ok(judge_id),
            Caller::Admin => Err(ReviewError::unauthorized(
                "operation requires a judge session",
            )),
            Caller::Anonymous => Err(ReviewError::Unauthenticated),
        }
    }

    /// A judge may only act on assignments they hold.
    pub fn require_holder(&self, assignment: &Assignment) -> Result<&JudgeId> {
        let judge_id = self.require_judge()?;
        if assignment.judge_id != *judge_id {
            return Err(ReviewError::unauthorized(format!(
                "assignment {} belongs to another judge",
                assignment.id
            )));
        }
        Ok(judge_id)
    }

    /// Viewing documents is open to admins and judges.
    pub fn require_authenticated(&self) -> Result<()> {
        match self {
            Caller::Anonymous => Err(ReviewError::Unauthenticated),
            _ => Ok(()),
        }
    }

    pub fn judge_id(&self) -> Option<&JudgeId> {
        match self {
            Caller::Judge(judge_id) => Some(judge_id),
            _ => None,
        }
    }
}

/// Resolves a session token to a caller.
#[async_trait]
pub trait AccessGuard: Send + Sync {
    /// `None` and unknown tokens both resolve to [`Caller::Anonymous`].
    async fn resolve(&self, token: Option<&str>) -> Caller;
}

/// Static token table, typically from the `[access]` config section.
#[derive(Debug, Clone, Default)]
pub struct TokenAccessGuard {
    tokens: HashMap<String, Caller>,
}

impl TokenAccessGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, caller: Caller) -> Self {
        self.tokens.insert(token.into(), caller);
        self
    }

    /// Build from config, rejecting unparseable identities.
    pub fn from_config(config: &AccessConfig) -> Result<Self> {
        let mut guard = Self::new();
        for (token, identity) in &config.tokens {
            let caller = Caller::parse(identity).ok_or_else(|| {
                ReviewError::Config(format!(
                    "access token identity must be `admin` or `judge:<id>`, got {identity:?}"
                ))
            })?;
            guard.tokens.insert(token.clone(), caller);
        }
        Ok(guard)
    }
}

#[async_trait]
impl AccessGuard for TokenAccessGuard {
    async fn resolve(&self, token: Option<&str>) -> Caller {
        token
            .and_then(|t| self.tokens.get(t.trim()))
            .cloned()
            .unwrap_or(Caller::Anonymous)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ErrorKind;
    use chrono::Utc;
    use judgeflow_state::IdeaId;

    #[test]
    fn parse_identities() {
        assert_eq!(Caller::parse("admin"), Some(Caller::Admin));
        assert_eq!(
            Caller::parse("judge: sara "),
            Some(Caller::Judge(JudgeId::from("sara")))
        );
        assert_eq!(Caller::parse("judge:"), None);
        assert_eq!(Caller::parse("root"), None);
    }

    #[test]
    fn role_checks() {
        let judge = Caller::Judge(JudgeId::from("j1"));
        assert!(Caller::Admin.require_admin().is_ok());
        assert_eq!(
            judge.require_admin().unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
        assert_eq!(
            Caller::Anonymous.require_admin().unwrap_err().kind(),
            ErrorKind::Unauthenticated
        );
        assert_eq!(
            Caller::Admin.require_judge().unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn holder_check() {
        let assignment =
            Assignment::pending(IdeaId::from("i1"), JudgeId::from("j1"), Utc::now());
        assert!(Caller::Judge(JudgeId::from("j1"))
            .require_holder(&assignment)
            .is_ok());
        assert_eq!(
            Caller::Judge(JudgeId::from("j2"))
                .require_holder(&assignment)
                .unwrap_err()
                .kind(),
            ErrorKind::Unauthorized
        );
    }

    #[tokio::test]
    async fn token_guard_resolves_configured_tokens() {
        let mut config = AccessConfig::default();
        config.tokens.insert("t1".into(), "admin".into());
        config.tokens.insert("t2".into(), "judge:j9".into());
        let guard = TokenAccessGuard::from_config(&config).unwrap();

        assert_eq!(guard.resolve(Some("t1")).await, Caller::Admin);
        assert_eq!(
            guard.resolve(Some("t2")).await,
            Caller::Judge(JudgeId::from("j9"))
        );
        assert_eq!(guard.resolve(Some("nope")).await, Caller::Anonymous);
        assert_eq!(guard.resolve(None).await, Caller::Anonymous);

        config.tokens.insert("t3".into(), "superuser".into());
        assert!(TokenAccessGuard::from_config(&config).is_err());
    }
}
