//! Sentinel-returning wrapper around [SigningService] for embedding applications.
//!
//! Every operation returns `-1` on failure and writes exactly one diagnostic line
//! (`<operation>: <error>`) to the diagnostics writer. Panics raised anywhere below the
//! boundary are caught and reported the same way. Output buffers are only written when the
//! whole operation succeeds.

use crate::{
    registry::SessionId,
    service::SigningService,
    session::Account,
    Error, Result,
};
use std::{
    any::Any,
    io::{self, Write},
    panic::{catch_unwind, AssertUnwindSafe},
    sync::{Mutex, PoisonError},
};
use tracing::warn;
use tradesign_types::{
    CancelOrder, CreateOrder, Element, CANCEL_ORDER_FIELDS, CREATE_ORDER_FIELDS, SIGNATURE_LENGTH,
};

/// Returned by every operation on failure.
pub const FAILURE: i64 = -1;

/// Returned by sign operations on success.
pub const SUCCESS: i32 = 0;

pub struct Boundary<W: Write + Send = io::Stderr> {
    service: SigningService,
    diagnostics: Mutex<W>,
}

impl Boundary<io::Stderr> {
    /// Wrap `service`, reporting failures on stderr.
    pub fn new(service: SigningService) -> Self {
        Self::with_diagnostics(service, io::stderr())
    }
}

impl<W: Write + Send> Boundary<W> {
    pub fn with_diagnostics(service: SigningService, diagnostics: W) -> Self {
        Self {
            service,
            diagnostics: Mutex::new(diagnostics),
        }
    }

    pub fn service(&self) -> &SigningService {
        &self.service
    }

    /// Consume the boundary, returning the diagnostics writer.
    pub fn into_diagnostics(self) -> W {
        self.diagnostics
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn report(&self, operation: &str, err: &Error) {
        self.service.metrics().failures.inc();
        warn!(operation, kind = %err.kind(), %err, "operation failed");

        let mut diagnostics = self
            .diagnostics
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        // Nowhere left to report a failing diagnostics writer.
        let _ = writeln!(diagnostics, "{operation}: {err}");
        let _ = diagnostics.flush();
    }

    fn guard<T>(&self, operation: &str, f: impl FnOnce() -> Result<T>) -> Option<T> {
        let result = catch_unwind(AssertUnwindSafe(f))
            .unwrap_or_else(|payload| Err(Error::Internal(panic_message(payload.as_ref()))));
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                self.report(operation, &err);
                None
            }
        }
    }

    fn guard_i64(&self, operation: &str, f: impl FnOnce() -> Result<i64>) -> i64 {
        self.guard(operation, f).unwrap_or(FAILURE)
    }

    fn guard_status(&self, operation: &str, f: impl FnOnce() -> Result<()>) -> i32 {
        match self.guard(operation, f) {
            Some(()) => SUCCESS,
            None => FAILURE as i32,
        }
    }

    /// Return the handle for `private_key`, creating a session if the key is new.
    pub fn get_or_create_session(
        &self,
        endpoint: &str,
        private_key: &str,
        chain_id: i32,
        api_key_index: i32,
        account_index: i64,
    ) -> i32 {
        let handle = self.guard("get_or_create_session", || {
            let account = Account {
                chain_id: narrow("chain_id", chain_id.into())?,
                account_index,
                api_key_index: narrow("api_key_index", api_key_index.into())?,
            };
            let id = self
                .service
                .get_or_create_session(endpoint, private_key, account)?;
            narrow::<i32>("session handle", id.index() as i64)
        });
        handle.unwrap_or(FAILURE as i32)
    }

    pub fn get_next_nonce(&self, handle: i32) -> i64 {
        self.guard_i64("get_next_nonce", || {
            self.service.next_nonce(session_id(handle)?)
        })
    }

    pub fn advance_next_nonce(&self, handle: i32) -> i64 {
        self.guard_i64("advance_next_nonce", || {
            self.service.advance_nonce(session_id(handle)?)
        })
    }

    pub fn rewind_next_nonce(&self, handle: i32) -> i64 {
        self.guard_i64("rewind_next_nonce", || {
            self.service.rewind_nonce(session_id(handle)?)
        })
    }

    /// Sign a create-order transaction, writing its 16 field elements into `elements` and
    /// its signature into `signature`.
    #[allow(clippy::too_many_arguments)]
    pub fn sign_create_order(
        &self,
        handle: i32,
        elements: &mut [Element],
        signature: &mut [u8],
        market_index: i32,
        client_order_index: i64,
        base_amount: i64,
        price: i32,
        is_ask: i32,
        order_type: i32,
        time_in_force: i32,
        reduce_only: i32,
        trigger_price: i32,
        order_expiry: i64,
        nonce: i64,
        expired_at: i64,
    ) -> i32 {
        self.guard_status("sign_create_order", || {
            check_len("elements", CREATE_ORDER_FIELDS, elements.len())?;
            check_len("signature", SIGNATURE_LENGTH, signature.len())?;
            let order = CreateOrder {
                market_index: narrow("market_index", market_index.into())?,
                client_order_index,
                base_amount,
                price: narrow("price", price.into())?,
                is_ask: narrow("is_ask", is_ask.into())?,
                order_type: narrow("order_type", order_type.into())?,
                time_in_force: narrow("time_in_force", time_in_force.into())?,
                reduce_only: narrow("reduce_only", reduce_only.into())?,
                trigger_price: narrow("trigger_price", trigger_price.into())?,
                order_expiry,
            };
            let signed =
                self.service
                    .sign_create_order(session_id(handle)?, &order, nonce, expired_at)?;
            elements.copy_from_slice(&signed.elements);
            signature.copy_from_slice(signed.signature.as_bytes());
            Ok(())
        })
    }

    /// Sign a cancel-order transaction, writing its 8 field elements into `elements` and its
    /// signature into `signature`.
    #[allow(clippy::too_many_arguments)]
    pub fn sign_cancel_order(
        &self,
        handle: i32,
        elements: &mut [Element],
        signature: &mut [u8],
        market_index: i32,
        order_index: i64,
        nonce: i64,
        expired_at: i64,
    ) -> i32 {
        self.guard_status("sign_cancel_order", || {
            check_len("elements", CANCEL_ORDER_FIELDS, elements.len())?;
            check_len("signature", SIGNATURE_LENGTH, signature.len())?;
            let cancel = CancelOrder {
                market_index: narrow("market_index", market_index.into())?,
                order_index,
            };
            let signed =
                self.service
                    .sign_cancel_order(session_id(handle)?, &cancel, nonce, expired_at)?;
            elements.copy_from_slice(&signed.elements);
            signature.copy_from_slice(signed.signature.as_bytes());
            Ok(())
        })
    }

    pub fn get_auth_token(&self, handle: i32, signature: &mut [u8], deadline: i64) -> i32 {
        self.guard_status("get_auth_token", || {
            check_len("signature", SIGNATURE_LENGTH, signature.len())?;
            let token = self.service.auth_token(session_id(handle)?, deadline)?;
            signature.copy_from_slice(token.as_bytes());
            Ok(())
        })
    }
}

fn session_id(handle: i32) -> Result<SessionId> {
    usize::try_from(handle)
        .map(SessionId::from)
        .map_err(|_| Error::UnknownSession(handle.into()))
}

fn narrow<T: TryFrom<i64>>(field: &'static str, value: i64) -> Result<T> {
    T::try_from(value).map_err(|_| Error::OutOfRange { field, value })
}

fn check_len(name: &'static str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(Error::BufferLength {
            name,
            expected,
            got,
        });
    }
    Ok(())
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return format!("panic: {message}");
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return format!("panic: {message}");
    }
    "panic".to_string()
}
