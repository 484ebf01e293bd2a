//! `stepwright run` — execute a plan against a saved DOM snapshot.

use std::path::PathBuf;
use std::sync::Arc;

use stepwright_cache::{CachingLlmClient, ContentAddressableCache};
use stepwright_config::AppConfig;
use stepwright_core::cache::CacheKind;
use stepwright_core::event::{EventBus, InferenceEvent};
use stepwright_core::provider::LlmClient;
use stepwright_executor::{ExecutionContext, StepExecutor, default_registry, parse_plan};
use stepwright_inference::Engines;
use stepwright_security::Variables;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::info;

use super::cache::{open_store, policy};
use crate::page::SnapshotPage;

pub struct RunArgs {
    pub plan: PathBuf,
    pub dom: PathBuf,
    pub screenshot: Option<PathBuf>,
    pub variables: Variables,
    pub output: Option<PathBuf>,
    pub no_cache: bool,
}

pub async fn run(args: RunArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let plan = parse_plan(&std::fs::read_to_string(&args.plan)?)
        .map_err(|e| format!("Invalid plan {}: {e}", args.plan.display()))?;
    let dom = std::fs::read_to_string(&args.dom)?;
    let screenshot = args.screenshot.as_ref().map(std::fs::read).transpose()?;

    let events = Arc::new(EventBus::new(4096));
    let mut rx = events.subscribe();

    let mut client = stepwright_providers::build_client(&config)?;
    let mut actions_cache = None;
    if !args.no_cache && config.cache.backend != "none" {
        let store = open_store(&config.cache).await?;
        let llm_cache = ContentAddressableCache::new(store.clone(), CacheKind::Llm, policy(&config.cache))
            .with_events(events.clone());
        client = Arc::new(CachingLlmClient::new(client, Arc::new(llm_cache))) as Arc<dyn LlmClient>;
        actions_cache = Some(Arc::new(
            ContentAddressableCache::new(store, CacheKind::Actions, policy(&config.cache))
                .with_events(events.clone()),
        ));
    }

    let engines = Engines::new(client, &config.inference, None, Some(events.clone()));
    let executor = StepExecutor::new(default_registry(engines, actions_cache));

    let page = Arc::new(SnapshotPage::new(dom, screenshot));
    let mut ctx = ExecutionContext::new(page.clone(), args.variables, events.clone());
    info!(request_id = %ctx.request_id, steps = plan.len(), "Starting run");

    let results = executor.run(&plan, &mut ctx).await;

    let (mut hits, mut misses) = (0usize, 0usize);
    loop {
        match rx.try_recv() {
            Ok(event) => {
                if let InferenceEvent::CacheLookup { hit, .. } = event.as_ref() {
                    if *hit {
                        hits += 1;
                    } else {
                        misses += 1;
                    }
                }
            }
            Err(TryRecvError::Lagged(_)) => continue,
            Err(_) => break,
        }
    }
    info!(
        executed = results.len(),
        actions_recorded = page.performed_count(),
        cache_hits = hits,
        cache_misses = misses,
        "Run finished"
    );

    let json = serde_json::to_string_pretty(&results)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, &json)?;
            println!("Wrote {} step results to {}", results.len(), path.display());
        }
        None => println!("{json}"),
    }

    let halted = results.len() < plan.len()
        || results
            .iter()
            .zip(&plan)
            .any(|(result, step)| !result.success && !step.optional);
    if halted {
        return Err("plan did not complete: a required step failed".into());
    }
    Ok(())
}
