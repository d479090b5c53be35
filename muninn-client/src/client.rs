use std::sync::Arc;

use crate::config::{self, ClientConfig};
use crate::error::Result;
use crate::net::pool::Pool;
use crate::proto::{
    FieldType, Request, Response, TextErrors, UpdateOp, Value, FLAG_ADD, FLAG_REPLACE, FLAG_RETURN,
};

/// Handle over a pool of server connections. Cloning is cheap; every
/// clone dispatches into the same pool. Each call acquires an idle
/// session, performs the round trip and returns the session to the
/// ready queue before propagating the result.
#[derive(Clone, Debug)]
pub struct Client {
    pool: Arc<Pool>,
    errors: TextErrors,
}

impl Client {
    /// Open a client per `cfg`. With `lazy` set the handler returns
    /// immediately and the first call waits for readiness; otherwise
    /// this resolves once the pool has settled.
    pub async fn connect(cfg: ClientConfig) -> Result<Client> {
        config::validate(&cfg)?;
        let errors = cfg.errors;
        let lazy = cfg.lazy;
        let pool = Pool::start(cfg);
        if !lazy {
            pool.wait_ready().await?;
        }
        Ok(Client { pool, errors })
    }

    /// Stop reconnects, close every connection and wait for the drain.
    pub async fn disconnect(&self) {
        self.pool.disconnect().await;
    }

    /// Server round trip with an empty body.
    pub async fn ping(&self) -> Result<Response> {
        let session = self.pool.acquire().await?;
        let result = session.ping().await;
        self.pool.release(session);
        let frame = result?;
        Response::parse(frame.header, frame.body, &[], self.errors)
    }

    /// Insert a tuple; fails when the primary key already exists.
    pub async fn insert(&self, space: u32, tuple: &[Value]) -> Result<Response> {
        self.request(Request::Insert { space, flags: FLAG_ADD, tuple }, &[]).await
    }

    /// Insert a tuple and return it; fails when the primary key already
    /// exists.
    pub async fn insert_ret(
        &self,
        space: u32,
        field_types: &[FieldType],
        tuple: &[Value],
    ) -> Result<Response> {
        self.request(Request::Insert { space, flags: FLAG_ADD | FLAG_RETURN, tuple }, field_types)
            .await
    }

    /// Insert a tuple, overwriting any existing tuple with the same
    /// primary key.
    pub async fn replace(&self, space: u32, tuple: &[Value]) -> Result<Response> {
        self.request(Request::Insert { space, flags: 0, tuple }, &[]).await
    }

    /// Like [`Client::replace`], returning the stored tuple.
    pub async fn replace_ret(
        &self,
        space: u32,
        field_types: &[FieldType],
        tuple: &[Value],
    ) -> Result<Response> {
        self.request(Request::Insert { space, flags: FLAG_RETURN, tuple }, field_types).await
    }

    /// Replace an existing tuple; fails when the primary key is absent.
    pub async fn replace_req(&self, space: u32, tuple: &[Value]) -> Result<Response> {
        self.request(Request::Insert { space, flags: FLAG_REPLACE, tuple }, &[]).await
    }

    /// Like [`Client::replace_req`], returning the stored tuple.
    pub async fn replace_req_ret(
        &self,
        space: u32,
        field_types: &[FieldType],
        tuple: &[Value],
    ) -> Result<Response> {
        self.request(
            Request::Insert { space, flags: FLAG_REPLACE | FLAG_RETURN, tuple },
            field_types,
        )
        .await
    }

    /// Select by key on `index`, returning all matches.
    pub async fn select(
        &self,
        space: u32,
        index: u32,
        field_types: &[FieldType],
        key: &[Value],
    ) -> Result<Response> {
        self.select_ext(space, index, 0, u32::MAX, field_types, key).await
    }

    /// Select with explicit `offset` and `limit`.
    pub async fn select_ext(
        &self,
        space: u32,
        index: u32,
        offset: u32,
        limit: u32,
        field_types: &[FieldType],
        key: &[Value],
    ) -> Result<Response> {
        self.request(Request::Select { space, index, offset, limit, key }, field_types).await
    }

    /// Apply `ops` to the tuple at `key`.
    pub async fn update(&self, space: u32, key: &[Value], ops: &[UpdateOp]) -> Result<Response> {
        self.request(Request::Update { space, flags: 0, key, ops }, &[]).await
    }

    /// Like [`Client::update`], returning the updated tuple.
    pub async fn update_ret(
        &self,
        space: u32,
        field_types: &[FieldType],
        key: &[Value],
        ops: &[UpdateOp],
    ) -> Result<Response> {
        self.request(Request::Update { space, flags: FLAG_RETURN, key, ops }, field_types).await
    }

    /// Delete the tuple at `key`.
    pub async fn delete(&self, space: u32, key: &[Value]) -> Result<Response> {
        self.request(Request::Delete { space, flags: 0, key }, &[]).await
    }

    /// Like [`Client::delete`], returning the deleted tuple.
    pub async fn delete_ret(
        &self,
        space: u32,
        field_types: &[FieldType],
        key: &[Value],
    ) -> Result<Response> {
        self.request(Request::Delete { space, flags: FLAG_RETURN, key }, field_types).await
    }

    /// Invoke a server-side procedure.
    pub async fn call(
        &self,
        proc: &str,
        field_types: &[FieldType],
        args: &[Value],
    ) -> Result<Response> {
        self.request(Request::Call { flags: 0, proc, args }, field_types).await
    }

    async fn request(&self, request: Request<'_>, field_types: &[FieldType]) -> Result<Response> {
        let session = self.pool.acquire().await?;
        let result = session.send(request).await;
        // the session goes back to the queue before any error propagates
        self.pool.release(session);
        let frame = result?;
        Response::parse(frame.header, frame.body, field_types, self.errors)
    }
}
