use crate::field::{elements_from_canonical_le_bytes, Element, FieldError};
use std::fmt;

/// Length of a signature accepted by the venue.
pub const SIGNATURE_LENGTH: usize = 80;

/// Length of the digest produced by hashing an encoded transaction.
pub const DIGEST_LENGTH: usize = 40;

/// Number of field elements in an encoded create-order transaction.
pub const CREATE_ORDER_FIELDS: usize = 16;

/// Number of field elements in an encoded cancel-order transaction.
pub const CANCEL_ORDER_FIELDS: usize = 8;

/// Instruction-type tags, as numbered by the venue's L2 transaction set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum TxType {
    CreateOrder = 14,
    CancelOrder = 15,
}

impl TxType {
    pub fn tag(self) -> u32 {
        self as u32
    }
}

/// Digest of an encoded transaction (5 little-endian extension limbs).
pub type TxDigest = [u8; DIGEST_LENGTH];

/// A signature of exactly [SIGNATURE_LENGTH] bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct Signature([u8; SIGNATURE_LENGTH]);

impl Signature {
    pub fn as_bytes(&self) -> &[u8; SIGNATURE_LENGTH] {
        &self.0
    }
}

impl TryFrom<Vec<u8>> for Signature {
    /// The rejected length.
    type Error = usize;

    fn try_from(value: Vec<u8>) -> Result<Self, Self::Error> {
        let len = value.len();
        <[u8; SIGNATURE_LENGTH]>::try_from(value)
            .map(Self)
            .map_err(|_| len)
    }
}

impl AsRef<[u8]> for Signature {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature(")?;
        for byte in &self.0[..8] {
            write!(f, "{byte:02x}")?;
        }
        write!(f, "..)")
    }
}

/// Fields shared by every nonce-bound transaction. They occupy the first six positions of
/// every encoding, in this order: chain id, tag, nonce, expiry, account index, api key index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TxHeader {
    pub chain_id: u32,
    pub nonce: i64,
    pub expired_at: i64,
    pub account_index: i64,
    pub api_key_index: u8,
}

impl TxHeader {
    fn write(&self, tx_type: TxType, elements: &mut [Element]) {
        elements[0] = Element::from_u32(self.chain_id);
        elements[1] = Element::from_u32(tx_type.tag());
        elements[2] = Element::from_i64(self.nonce);
        elements[3] = Element::from_i64(self.expired_at);
        elements[4] = Element::from_i64(self.account_index);
        elements[5] = Element::from_u32(self.api_key_index as u32);
    }
}

/// Create a limit, market, or trigger order.
///
/// Fields: [chain_id] [tag=14] [nonce] [expired_at] [account_index] [api_key_index]
/// [market_index] [client_order_index] [base_amount] [price] [is_ask] [order_type]
/// [time_in_force] [reduce_only] [trigger_price] [order_expiry]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CreateOrder {
    pub market_index: i16,
    pub client_order_index: i64,
    pub base_amount: i64,
    pub price: u32,
    pub is_ask: u8,
    pub order_type: u8,
    pub time_in_force: u8,
    pub reduce_only: u8,
    pub trigger_price: u32,
    pub order_expiry: i64,
}

impl CreateOrder {
    pub fn encode(&self, header: &TxHeader) -> [Element; CREATE_ORDER_FIELDS] {
        let mut elements = [Element::ZERO; CREATE_ORDER_FIELDS];
        header.write(TxType::CreateOrder, &mut elements);

        // Sign-extending, matching the venue's widening of the market index.
        elements[6] = Element::from_u32(self.market_index as u32);
        elements[7] = Element::from_i64(self.client_order_index);
        elements[8] = Element::from_i64(self.base_amount);
        elements[9] = Element::from_u32(self.price);
        elements[10] = Element::from_u32(self.is_ask as u32);
        elements[11] = Element::from_u32(self.order_type as u32);
        elements[12] = Element::from_u32(self.time_in_force as u32);
        elements[13] = Element::from_u32(self.reduce_only as u32);
        elements[14] = Element::from_u32(self.trigger_price);
        elements[15] = Element::from_i64(self.order_expiry);
        elements
    }
}

/// Cancel a resting order.
///
/// Fields: [chain_id] [tag=15] [nonce] [expired_at] [account_index] [api_key_index]
/// [market_index] [order_index]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CancelOrder {
    pub market_index: i16,
    pub order_index: i64,
}

impl CancelOrder {
    pub fn encode(&self, header: &TxHeader) -> [Element; CANCEL_ORDER_FIELDS] {
        let mut elements = [Element::ZERO; CANCEL_ORDER_FIELDS];
        header.write(TxType::CancelOrder, &mut elements);
        elements[6] = Element::from_u32(self.market_index as u32);
        elements[7] = Element::from_i64(self.order_index);
        elements
    }
}

/// The text message signed to obtain an auth token. Not nonce-bound.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthToken {
    pub deadline: i64,
    pub account_index: i64,
    pub api_key_index: u8,
}

impl AuthToken {
    pub fn encode(&self) -> Result<Vec<Element>, FieldError> {
        elements_from_canonical_le_bytes(self.to_string().as_bytes())
    }
}

impl fmt::Display for AuthToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.deadline, self.account_index, self.api_key_index
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header() -> TxHeader {
        TxHeader {
            chain_id: 1,
            nonce: 5,
            expired_at: 100,
            account_index: 7,
            api_key_index: 2,
        }
    }

    fn values<const N: usize>(elements: [Element; N]) -> Vec<u64> {
        elements.iter().map(|element| element.value()).collect()
    }

    #[test]
    fn test_create_order_field_order() {
        let order = CreateOrder {
            market_index: 3,
            client_order_index: 42,
            base_amount: 1000,
            price: 500,
            is_ask: 1,
            order_type: 0,
            time_in_force: 0,
            reduce_only: 0,
            trigger_price: 0,
            order_expiry: 0,
        };
        assert_eq!(
            values(order.encode(&header())),
            vec![1, 14, 5, 100, 7, 2, 3, 42, 1000, 500, 1, 0, 0, 0, 0, 0]
        );
    }

    #[test]
    fn test_cancel_order_field_order() {
        let cancel = CancelOrder {
            market_index: 3,
            order_index: 9001,
        };
        assert_eq!(
            values(cancel.encode(&header())),
            vec![1, 15, 5, 100, 7, 2, 3, 9001]
        );
    }

    #[test]
    fn test_negative_market_index_sign_extends() {
        let cancel = CancelOrder {
            market_index: -1,
            order_index: 0,
        };
        assert_eq!(cancel.encode(&header())[6].value(), u32::MAX as u64);
    }

    #[test]
    fn test_negative_fields_encode_as_reduced_twos_complement() {
        let order = CreateOrder {
            client_order_index: -2,
            order_expiry: -1,
            ..Default::default()
        };
        let elements = order.encode(&header());
        assert_eq!(elements[7].value(), 0xFFFF_FFFD);
        assert_eq!(elements[15].value(), 0xFFFF_FFFE);

        let header = TxHeader {
            expired_at: -1,
            ..header()
        };
        assert_eq!(order.encode(&header)[3].value(), 0xFFFF_FFFE);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let order = CreateOrder {
            market_index: 12,
            base_amount: 77,
            ..Default::default()
        };
        assert_eq!(order.encode(&header()), order.encode(&header()));
    }

    #[test]
    fn test_auth_token_message() {
        let token = AuthToken {
            deadline: 1_700_000_000,
            account_index: 7,
            api_key_index: 2,
        };
        assert_eq!(token.to_string(), "1700000000:7:2");

        let elements = token.encode().unwrap();
        // "1700000000:7:2" is 14 bytes.
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0].to_le_bytes(), *b"17000000");
        let mut tail = [0u8; 8];
        tail[..6].copy_from_slice(b"00:7:2");
        assert_eq!(elements[1].to_le_bytes(), tail);
    }

    #[test]
    fn test_signature_rejects_wrong_length() {
        assert_eq!(Signature::try_from(vec![0u8; 79]), Err(79));
        assert_eq!(Signature::try_from(vec![0u8; 81]), Err(81));
        let signature = Signature::try_from(vec![7u8; SIGNATURE_LENGTH]).unwrap();
        assert_eq!(signature.as_bytes(), &[7u8; SIGNATURE_LENGTH]);
    }
}
