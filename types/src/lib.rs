pub mod field;
pub use field::{Element, FieldError};
pub mod transaction;
pub use transaction::{
    AuthToken, CancelOrder, CreateOrder, Signature, TxDigest, TxHeader, TxType,
    CANCEL_ORDER_FIELDS, CREATE_ORDER_FIELDS, DIGEST_LENGTH, SIGNATURE_LENGTH,
};
