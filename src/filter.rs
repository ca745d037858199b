//! Conversation filter: the pure decision of whether a conversation is
//! synced at all. No side effects, callable standalone.

use std::collections::HashSet;

use crate::config::FilterConfig;
use crate::types::ConversationKind;

pub struct ChatFilter {
    global_include: HashSet<i64>,
    global_exclude: HashSet<i64>,
    direct: Scope,
    groups: Scope,
    channels: Scope,
}

struct Scope {
    enabled: bool,
    include: HashSet<i64>,
    exclude: HashSet<i64>,
}

impl ChatFilter {
    pub fn new(config: &FilterConfig) -> Self {
        let scope = |enabled: bool, include: &[i64], exclude: &[i64]| Scope {
            enabled,
            include: include.iter().copied().collect(),
            exclude: exclude.iter().copied().collect(),
        };

        Self {
            global_include: config.include.iter().copied().collect(),
            global_exclude: config.exclude.iter().copied().collect(),
            direct: scope(
                config.direct.enabled,
                &config.direct.include,
                &config.direct.exclude,
            ),
            groups: scope(
                config.groups.enabled,
                &config.groups.include,
                &config.groups.exclude,
            ),
            channels: scope(
                config.channels.enabled,
                &config.channels.include,
                &config.channels.exclude,
            ),
        }
    }

    /// Whether to sync a conversation. Exclusion always wins over inclusion;
    /// with no include list configured in either scope, everything not
    /// excluded passes.
    pub fn should_sync(&self, kind: ConversationKind, id: i64) -> bool {
        let scope = match kind {
            ConversationKind::Direct => &self.direct,
            ConversationKind::Group => &self.groups,
            ConversationKind::Channel => &self.channels,
        };

        if !scope.enabled {
            return false;
        }
        if self.global_exclude.contains(&id) || scope.exclude.contains(&id) {
            return false;
        }

        let has_include_list = !self.global_include.is_empty() || !scope.include.is_empty();
        if has_include_list {
            self.global_include.contains(&id) || scope.include.contains(&id)
        } else {
            true
        }
    }
}
