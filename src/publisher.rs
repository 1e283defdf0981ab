use tracing::{error, info};

use crate::models::Category;
use crate::normalize::{self, CAPTION_LIMIT, CAPTION_TEMPLATE};
use crate::store::EventStore;
use crate::telegram::{MessageChannel, SendOptions};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PublishReport {
    pub sent: usize,
    pub failed: usize,
}

/// Sends queued events to a channel and marks the ones that went out.
pub struct Publisher<'a, C: MessageChannel> {
    store: &'a EventStore,
    channel: &'a C,
    template: &'a str,
    limit: usize,
    options: SendOptions,
}

impl<'a, C: MessageChannel> Publisher<'a, C> {
    pub fn new(store: &'a EventStore, channel: &'a C) -> Self {
        Self {
            store,
            channel,
            template: CAPTION_TEMPLATE,
            limit: CAPTION_LIMIT,
            options: SendOptions::default(),
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// One attempt per queued event. Failures stay queued for the next run.
    pub fn publish_pending(&self) -> PublishReport {
        let mut report = PublishReport::default();

        for event in self.store.get_category_publish() {
            let caption = normalize::render_caption(&event, self.template, self.limit);
            if let Err(err) = self.channel.send(&event.image, &caption, &self.options) {
                error!(event_id = %event.id, error_kind = "fetch", "error send message: {err}");
                report.failed += 1;
                continue;
            }

            if !self.store.set_category(&event.id, Category::Published) {
                error!(event_id = %event.id, "sent but could not mark as published");
            }
            report.sent += 1;
        }

        info!(sent = report.sent, failed = report.failed, "publish run finished");
        report
    }
}
