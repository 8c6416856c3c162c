//! Reads for the position flush: unlike orders, positions never leave the
//! daemon process, so there's no Redis hot key to pipeline-read — the
//! source wraps the same `PositionBook` the paper-fill path mutates.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use sfp_errors::PipelineError;
use sfp_portfolio::PositionBook;
use sfp_types::position::Position;

#[async_trait]
pub trait PositionSource: Send + Sync {
    async fn fetch_many(&self, keys: &[(String, String)]) -> Result<Vec<Option<Position>>, PipelineError>;
}

pub struct BookPositionSource {
    book: Arc<RwLock<PositionBook>>,
}

impl BookPositionSource {
    pub fn new(book: Arc<RwLock<PositionBook>>) -> Self {
        Self { book }
    }
}

#[async_trait]
impl PositionSource for BookPositionSource {
    async fn fetch_many(&self, keys: &[(String, String)]) -> Result<Vec<Option<Position>>, PipelineError> {
        let book = self.book.read().await;
        Ok(keys.iter().map(|(user_id, symbol)| book.position(user_id, symbol, None)).collect())
    }
}
