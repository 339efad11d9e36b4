use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use tracing::{debug, info, trace};

use crate::client::DnsClient;
use crate::error::TransferError;
use crate::model::{ResolvedEndpoint, Target, TransferResult};
use crate::output::PendingZoneFile;

/// Tries AXFR against a zone's endpoints in order until one succeeds
pub struct TransferEngine {
    client: Arc<dyn DnsClient>,
    transfer_timeout: Duration,
}

impl TransferEngine {
    pub fn new(client: Arc<dyn DnsClient>, transfer_timeout: Duration) -> Self {
        Self {
            client,
            transfer_timeout,
        }
    }

    /// Endpoints are attempted strictly in the given order. The first
    /// successful transfer is written to `destination` and ends the loop.
    pub async fn attempt(
        &self,
        zone: &Target,
        endpoints: &[ResolvedEndpoint],
        destination: &Path,
    ) -> TransferResult {
        let mut last_error: Option<TransferError> = None;

        for endpoint in endpoints {
            match self.attempt_endpoint(zone, endpoint, destination).await {
                Ok(record_count) => {
                    info!(
                        "Transferred {} from {}: {} records written to {}",
                        zone,
                        endpoint,
                        record_count,
                        destination.display()
                    );
                    return TransferResult::Success {
                        record_count,
                        path: destination.to_path_buf(),
                    };
                }
                Err(e) => {
                    debug!("AXFR of {} from {} failed: {}", zone, endpoint, e);
                    last_error = Some(e);
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no endpoints".to_string());
        debug!("No transfer for {}: {}", zone, reason);
        TransferResult::Failure { reason }
    }

    async fn attempt_endpoint(
        &self,
        zone: &Target,
        endpoint: &ResolvedEndpoint,
        destination: &Path,
    ) -> Result<usize, TransferError> {
        // Created on the first message, so refusals never touch the disk
        let mut pending: Option<PendingZoneFile> = None;

        let streamed = timeout(
            self.transfer_timeout,
            self.stream_records(zone, endpoint, destination, &mut pending),
        )
        .await
        .map_err(|_| TransferError::Timeout(self.transfer_timeout))
        .and_then(|result| result);

        match (streamed, pending) {
            (Ok(()), Some(file)) if file.records_written() > 0 => {
                let record_count = file.records_written();
                file.commit().await?;
                Ok(record_count)
            }
            (Ok(()), file) => {
                if let Some(file) = file {
                    file.discard().await;
                }
                Err(TransferError::EmptyTransfer)
            }
            (Err(e), file) => {
                if let Some(file) = file {
                    file.discard().await;
                }
                Err(e)
            }
        }
    }

    async fn stream_records(
        &self,
        zone: &Target,
        endpoint: &ResolvedEndpoint,
        destination: &Path,
        pending: &mut Option<PendingZoneFile>,
    ) -> Result<(), TransferError> {
        let mut messages = self.client.zone_transfer(endpoint.ip, &zone.fqdn()).await?;

        while let Some(message) = messages.next().await {
            let message = message?;
            trace!(
                "{} from {}: message with {} answers",
                zone,
                endpoint,
                message.answers.len()
            );

            if pending.is_none() {
                *pending = Some(PendingZoneFile::create(destination).await?);
            }
            if let Some(file) = pending.as_mut() {
                for record in &message.answers {
                    file.write_record(record).await?;
                }
            }
        }
        Ok(())
    }
}
