use base64::{
    engine::general_purpose::{STANDARD, STANDARD_NO_PAD},
    Engine as _,
};

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BytesValue(Vec<u8>);

impl BytesValue {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Accepts padded and unpadded standard base64.
    pub fn from_base64(value: &str) -> Result<Self, base64::DecodeError> {
        STANDARD
            .decode(value)
            .or_else(|_| STANDARD_NO_PAD.decode(value))
            .map(Self)
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.0)
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for BytesValue {
    fn from(value: Vec<u8>) -> Self {
        Self::new(value)
    }
}

impl From<&[u8]> for BytesValue {
    fn from(value: &[u8]) -> Self {
        Self::new(value.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base64_roundtrip() {
        let bytes = BytesValue::new(vec![1, 2, 3, 4]);
        let encoded = bytes.to_base64();
        assert_eq!(encoded, "AQIDBA==");
        let decoded = BytesValue::from_base64(&encoded).unwrap();
        assert_eq!(decoded.as_slice(), &[1, 2, 3, 4]);
    }

    #[test]
    fn accepts_unpadded_input() {
        let decoded = BytesValue::from_base64("AQIDBA").unwrap();
        assert_eq!(decoded.as_slice(), &[1, 2, 3, 4]);
    }
}
