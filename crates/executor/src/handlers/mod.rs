//! Built-in step handlers, one per inference operation.

pub mod act;
pub mod assert;
pub mod discover;
pub mod extract;
pub mod observe;
pub mod visual_check;

use std::sync::Arc;

use stepwright_cache::ContentAddressableCache;
use stepwright_inference::Engines;

use crate::handler::HandlerRegistry;

pub use act::ActHandler;
pub use assert::AssertHandler;
pub use discover::DiscoverHandler;
pub use extract::ExtractHandler;
pub use observe::ObserveHandler;
pub use visual_check::VisualCheckHandler;

/// A registry with every built-in handler.
///
/// `actions_cache`, when given, lets `act` steps reuse actions resolved
/// earlier for the same instruction on the same DOM.
pub fn default_registry(
    engines: Engines,
    actions_cache: Option<Arc<ContentAddressableCache>>,
) -> HandlerRegistry {
    let Engines {
        act,
        assert,
        observe,
        extract,
        discover,
        visual_check,
    } = engines;

    let mut act_handler = ActHandler::new(act);
    if let Some(cache) = actions_cache {
        act_handler = act_handler.with_cache(cache);
    }

    let mut registry = HandlerRegistry::new();
    registry.register(Box::new(act_handler));
    registry.register(Box::new(AssertHandler::new(assert)));
    registry.register(Box::new(ObserveHandler::new(observe)));
    registry.register(Box::new(ExtractHandler::new(extract)));
    registry.register(Box::new(DiscoverHandler::new(discover)));
    registry.register(Box::new(VisualCheckHandler::new(visual_check)));
    registry
}
