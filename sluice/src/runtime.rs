//! Wiring a configured gateway: providers, tools, approvals, store, hooks.

use std::sync::Arc;

use schat::{
    ChatEventStore, ChatPolicy, ChatService, InMemoryChatEventStore, JsonlChatEventStore,
    TurnHooks,
};
use sobserve::{ObservabilityHooks, SafeProviderHooks, SafeToolHooks, SafeTurnHooks};
use sprovider::ProviderHooks;
use sserver::AppState;
use stooling::{
    ApprovalHandler, ApprovalQueue, AutoApprove, ToolRegistry, ToolRuntimeHooks,
    register_builtin_tools,
};

use crate::config::{ApprovalMode, ConfigError, SluiceConfig};
use crate::providers::{advertised_models, build_provider_registry};

/// Builds the server state, reading API keys from the process environment.
pub fn build_app_state(config: &SluiceConfig) -> Result<AppState, ConfigError> {
    build_app_state_with_env(config, |variable| std::env::var(variable).ok())
}

pub fn build_app_state_with_env<F>(
    config: &SluiceConfig,
    lookup_env: F,
) -> Result<AppState, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    config.validate()?;

    let observability = ObservabilityHooks::new().with_metrics(config.metrics);
    let provider_hooks: Arc<dyn ProviderHooks> = Arc::new(SafeProviderHooks::new(observability));
    let tool_hooks: Arc<dyn ToolRuntimeHooks> = Arc::new(SafeToolHooks::new(observability));
    let turn_hooks: Arc<dyn TurnHooks> = Arc::new(SafeTurnHooks::new(observability));

    let providers = build_provider_registry(config, provider_hooks, lookup_env)?;
    let tools = build_tool_registry(config);
    let store = build_store(config)?;

    let mut policy = ChatPolicy::default().with_max_tool_rounds(config.max_tool_rounds);
    if let Some(prompt) = &config.system_prompt {
        policy = policy.with_system_prompt(prompt.clone());
    }

    let queue = match config.tools.approval {
        ApprovalMode::Auto => None,
        ApprovalMode::Queue => Some(Arc::new(ApprovalQueue::new())),
    };
    let approvals: Arc<dyn ApprovalHandler> = match &queue {
        Some(queue) => queue.clone(),
        None => Arc::new(AutoApprove),
    };

    let chat = ChatService::builder(Arc::new(providers))
        .tools(Arc::new(tools))
        .approvals(approvals)
        .store(store)
        .hooks(turn_hooks)
        .tool_hooks(tool_hooks)
        .policy(policy)
        .build();

    let mut state = AppState::new(chat).with_models(advertised_models(config));
    if let Some(queue) = queue {
        state = state.with_approvals(queue);
    }
    Ok(state)
}

fn build_tool_registry(config: &SluiceConfig) -> ToolRegistry {
    let mut tools = ToolRegistry::new();
    if config.tools.builtin {
        register_builtin_tools(&mut tools, config.tools.workspace_root.as_deref());
    }
    tools
}

fn build_store(config: &SluiceConfig) -> Result<Arc<dyn ChatEventStore>, ConfigError> {
    match &config.history_dir {
        Some(dir) => {
            let store = JsonlChatEventStore::new(dir).map_err(|err| {
                ConfigError::io(format!(
                    "failed to open history directory '{}': {}",
                    dir.display(),
                    err.message
                ))
            })?;
            Ok(Arc::new(store))
        }
        None => Ok(Arc::new(InMemoryChatEventStore::new())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigErrorKind;

    fn any_key(_: &str) -> Option<String> {
        Some("test-key".to_string())
    }

    #[test]
    fn queue_mode_exposes_approvals_over_http() {
        let config = SluiceConfig::from_toml_str(
            r#"
            [tools]
            approval = "queue"
            "#,
        )
        .expect("config should parse");

        let state = build_app_state_with_env(&config, any_key).expect("state should build");
        assert!(state.approvals.is_some());
        assert!(state.chat.tools().definitions().iter().any(|tool| tool.name == "current_time"));
    }

    #[test]
    fn file_tools_and_jsonl_history_follow_config() {
        let workspace = tempfile::tempdir().expect("workspace should be created");
        let history = tempfile::tempdir().expect("history should be created");
        let mut config = SluiceConfig::default();
        config.tools.workspace_root = Some(workspace.path().to_path_buf());
        config.history_dir = Some(history.path().join("threads"));
        config.max_tool_rounds = 3;
        config.providers[0].models = vec!["claude-sonnet-4-5".to_string()];

        let state = build_app_state_with_env(&config, any_key).expect("state should build");

        let names = state
            .chat
            .tools()
            .definitions()
            .into_iter()
            .map(|tool| tool.name)
            .collect::<Vec<_>>();
        assert!(names.contains(&"read_file".to_string()));
        assert!(names.contains(&"write_file".to_string()));
        assert!(history.path().join("threads").is_dir());
        assert_eq!(state.chat.policy().max_tool_rounds, 3);
        assert!(state.approvals.is_none());
        assert_eq!(state.models.len(), 1);
    }

    #[test]
    fn missing_key_stops_startup() {
        let error = build_app_state_with_env(&SluiceConfig::default(), |_| None)
            .err()
            .expect("state should not build");
        assert_eq!(error.kind, ConfigErrorKind::MissingCredential);
    }
}
