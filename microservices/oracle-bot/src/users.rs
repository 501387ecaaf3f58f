//! In-memory user directory: locale preference and admin membership

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use oracle_core::UserId;
use oracle_menu::{AccessError, AccessPolicy, Locale, LocaleSource};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

use crate::i18n::Catalog;

#[derive(Debug, Clone)]
pub struct UserProfile {
    pub locale: Locale,
    pub first_seen: DateTime<Utc>,
}

pub struct UserDirectory {
    profiles: DashMap<UserId, UserProfile>,
    admins: HashSet<UserId>,
    default_locale: Locale,
}

impl UserDirectory {
    pub fn new(admins: impl IntoIterator<Item = UserId>, default_locale: Locale) -> Self {
        Self {
            profiles: DashMap::new(),
            admins: admins.into_iter().collect(),
            default_locale,
        }
    }

    /// Record contact from `user`. On first contact the locale is detected
    /// from the transport language code. Returns true for a new user.
    pub fn observe(&self, user: UserId, language_code: Option<&str>, catalog: &Catalog) -> bool {
        if self.profiles.contains_key(&user) {
            return false;
        }

        let mut created = false;
        self.profiles.entry(user).or_insert_with(|| {
            created = true;
            UserProfile {
                locale: catalog.normalize_language_code(language_code),
                first_seen: Utc::now(),
            }
        });

        if created {
            info!(user_id = %user, language_code = ?language_code, "New user");
        }
        created
    }

    pub fn set_locale(&self, user: UserId, locale: Locale) {
        info!(user_id = %user, locale = %locale, "User changed language");
        self.profiles
            .entry(user)
            .and_modify(|profile| profile.locale = locale.clone())
            .or_insert_with(|| UserProfile {
                locale,
                first_seen: Utc::now(),
            });
    }

    pub fn locale(&self, user: UserId) -> Locale {
        self.profiles
            .get(&user)
            .map(|profile| profile.locale.clone())
            .unwrap_or_else(|| self.default_locale.clone())
    }

    pub fn profile(&self, user: UserId) -> Option<UserProfile> {
        self.profiles.get(&user).map(|profile| profile.value().clone())
    }

    pub fn is_admin(&self, user: UserId) -> bool {
        self.admins.contains(&user)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }
}

#[async_trait]
impl AccessPolicy for UserDirectory {
    async fn is_privileged(&self, user: UserId) -> Result<bool, AccessError> {
        let granted = self.is_admin(user);
        debug!(user_id = %user, granted, "Admin check");
        Ok(granted)
    }
}

#[async_trait]
impl LocaleSource for UserDirectory {
    async fn locale_for(&self, user: UserId) -> Locale {
        self.locale(user)
    }
}

/// Bounds every check of the wrapped policy; a check that overruns is an
/// `AccessError::Timeout`, which the evaluator turns into a denial.
pub struct TimedPolicy {
    inner: Arc<dyn AccessPolicy>,
    timeout: Duration,
}

impl TimedPolicy {
    pub fn new(inner: Arc<dyn AccessPolicy>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

#[async_trait]
impl AccessPolicy for TimedPolicy {
    async fn is_privileged(&self, user: UserId) -> Result<bool, AccessError> {
        tokio::time::timeout(self.timeout, self.inner.is_privileged(user))
            .await
            .map_err(|_| AccessError::Timeout)?
    }
}
