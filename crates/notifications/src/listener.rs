use async_trait::async_trait;
use domain::ShopEvent;

use crate::Result;

/// Reacts to events delivered by the [`EventBus`](crate::EventBus).
///
/// Listeners run outside the transaction that produced the event and see
/// only committed work. Errors are logged by the bus and never reach the
/// publisher.
#[async_trait]
pub trait EventListener: Send + Sync {
    /// Returns the name used in logs.
    fn name(&self) -> &'static str;

    /// Handles one event. Events a listener does not care about are ignored.
    async fn handle(&self, event: &ShopEvent) -> Result<()>;
}
