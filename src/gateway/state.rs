use std::sync::Arc;

use crate::pool::VerifierPool;

#[derive(Clone)]
pub struct HandlerState {
    pub pool: Arc<VerifierPool>,
}

impl HandlerState {
    pub fn new(pool: Arc<VerifierPool>) -> Self {
        Self { pool }
    }
}
