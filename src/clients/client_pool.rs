//! 模型客户端池
//!
//! 每个工作任务通过 `acquire` 借出一个客户端，租约释放时自动归还。
//! 客户端按需由工厂函数创建，空闲的客户端会被复用。

use super::ModelClient;
use anyhow::Result;
use std::ops::Deref;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

type ClientFactory = dyn Fn() -> Result<Box<dyn ModelClient>> + Send + Sync;

/// 客户端池
pub struct ClientPool {
    factory: Box<ClientFactory>,
    idle: Mutex<Vec<Box<dyn ModelClient>>>,
    created: AtomicUsize,
}

impl ClientPool {
    pub fn new<F>(factory: F) -> Arc<Self>
    where
        F: Fn() -> Result<Box<dyn ModelClient>> + Send + Sync + 'static,
    {
        Arc::new(Self {
            factory: Box::new(factory),
            idle: Mutex::new(Vec::new()),
            created: AtomicUsize::new(0),
        })
    }

    /// 借出一个客户端，没有空闲客户端时调用工厂创建
    pub fn acquire(self: &Arc<Self>) -> Result<ClientLease> {
        let reused = self
            .idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop();

        let client = match reused {
            Some(client) => client,
            None => {
                let client = (self.factory)()?;
                let total = self.created.fetch_add(1, Ordering::Relaxed) + 1;
                debug!("创建新的模型客户端，累计 {} 个", total);
                client
            }
        };

        Ok(ClientLease {
            client: Some(client),
            pool: Arc::clone(self),
        })
    }

    /// 已创建的客户端数量
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::Relaxed)
    }

    /// 当前空闲的客户端数量
    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    fn release(&self, client: Box<dyn ModelClient>) {
        self.idle
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(client);
    }
}

/// 客户端租约，Drop 时归还到池中
pub struct ClientLease {
    client: Option<Box<dyn ModelClient>>,
    pool: Arc<ClientPool>,
}

impl Deref for ClientLease {
    type Target = dyn ModelClient;

    fn deref(&self) -> &Self::Target {
        // client 只在 drop 中被取走
        self.client.as_deref().expect("client taken before drop")
    }
}

impl Drop for ClientLease {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            self.pool.release(client);
        }
    }
}
