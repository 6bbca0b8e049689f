use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{Instrument, debug, info_span, warn};

use crate::domain::{Command, Message};
use crate::fetcher::PageSource;

/// Runs the model's commands on the tokio runtime and reports back through a channel.
pub struct FetchWorker {
    handle: Handle,
    source: Arc<dyn PageSource>,
    tx: UnboundedSender<Message>,
}

impl FetchWorker {
    pub fn new(handle: Handle, source: Arc<dyn PageSource>) -> (Self, UnboundedReceiver<Message>) {
        let (tx, rx) = unbounded_channel();
        (Self { handle, source, tx }, rx)
    }

    pub fn dispatch(&self, command: Command) {
        match command {
            Command::Fetch {
                generation,
                page,
                page_size,
            } => {
                debug!("Dispatching fetch {generation} for page {page}");
                let source = Arc::clone(&self.source);
                let tx = self.tx.clone();
                let span = info_span!("fetch", generation, page, page_size);
                self.handle.spawn(
                    async move {
                        let result = source.fetch_page(page, page_size).await;
                        if tx.send(Message::FetchFinished { generation, result }).is_err() {
                            warn!("Model is gone, dropping fetch result");
                        }
                    }
                    .instrument(span),
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::{FetchError, Page};
    use async_trait::async_trait;

    struct OnePage;

    #[async_trait]
    impl PageSource for OnePage {
        async fn fetch_page(&self, page: usize, page_size: usize) -> Result<Page, FetchError> {
            Ok(Page {
                records: Vec::new(),
                total_count: page * page_size,
            })
        }
    }

    #[tokio::test]
    async fn delivers_fetch_result() {
        let (worker, mut rx) = FetchWorker::new(Handle::current(), Arc::new(OnePage));
        worker.dispatch(Command::Fetch {
            generation: 7,
            page: 3,
            page_size: 10,
        });

        match rx.recv().await {
            Some(Message::FetchFinished { generation, result }) => {
                assert_eq!(generation, 7);
                assert_eq!(result.unwrap().total_count, 30);
            }
            other => panic!("unexpected message {other:?}"),
        }
    }
}
