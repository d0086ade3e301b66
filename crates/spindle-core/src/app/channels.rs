//! Channel injection - submit の前に provider へ通信路を渡す

use std::sync::Arc;

use crate::domain::ProviderError;
use crate::ports::{Channel, ChannelSlot, ExecutionProvider};

/// Fill the provider's channel slot.
///
/// - `Single`: exactly one channel is required
/// - `Multi`: at least one channel is required; replaces the current list
/// - no slot: the provider manages its own connectivity, passing channels is an error
pub fn inject_channels(
    provider: &mut dyn ExecutionProvider,
    channels: Vec<Arc<dyn Channel>>,
) -> Result<(), ProviderError> {
    let label = provider.label().to_string();
    let Some(slot) = provider.channels_mut() else {
        return Err(ProviderError::permanent(format!(
            "provider '{label}' manages its own connectivity and takes no channels"
        )));
    };

    match slot {
        ChannelSlot::Single(current) => {
            let [channel]: [Arc<dyn Channel>; 1] = channels.try_into().map_err(|given: Vec<_>| {
                ProviderError::permanent(format!(
                    "provider '{label}' needs exactly one channel, got {}",
                    given.len()
                ))
            })?;
            *current = Some(channel);
        }
        ChannelSlot::Multi(current) => {
            if channels.is_empty() {
                return Err(ProviderError::permanent(format!(
                    "provider '{label}' needs at least one channel"
                )));
            }
            *current = channels;
        }
    }
    tracing::debug!(provider = %label, "channels injected");
    Ok(())
}

/// Check that a provider declaring a channel slot has had it filled.
pub fn ensure_transport_ready(provider: &dyn ExecutionProvider) -> Result<(), ProviderError> {
    match provider.channels() {
        Some(slot) if !slot.is_ready() => Err(ProviderError::permanent(format!(
            "provider '{}' has no channel injected yet",
            provider.label()
        ))),
        _ => Ok(()),
    }
}
