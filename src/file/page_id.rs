use std::fmt;

use crate::file::page::PAGE_SIZE;

/// Identifies a page by its position in the backing file.
///
/// Page `n` lives at byte offset `n * PAGE_SIZE`. The value `-1` is reserved
/// to mean "no page".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageId(i32);

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PageIdError {
    #[error("A serialized page id must be {expected} bytes, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },
}

impl PageId {
    pub const INVALID: PageId = PageId(-1);

    /// Number of bytes produced by [`PageId::serialize`].
    pub const SERIALIZED_LEN: usize = std::mem::size_of::<i32>();

    pub const fn new(id: i32) -> Self {
        Self(id)
    }

    pub fn value(&self) -> i32 {
        self.0
    }

    /// Negative identifiers, the sentinel included, never address a page.
    pub fn is_valid(&self) -> bool {
        self.0 >= 0
    }

    pub fn serialize(&self) -> [u8; Self::SERIALIZED_LEN] {
        self.0.to_le_bytes()
    }

    pub fn deserialize(bytes: &[u8]) -> Result<Self, PageIdError> {
        let arr: [u8; Self::SERIALIZED_LEN] =
            bytes.try_into().map_err(|_| PageIdError::SizeMismatch {
                expected: Self::SERIALIZED_LEN,
                actual: bytes.len(),
            })?;
        Ok(Self(i32::from_le_bytes(arr)))
    }

    /// Byte offset of this page in the backing file. The multiplication is
    /// done in 64 bits so large ids do not wrap.
    pub fn offset(&self) -> Option<u64> {
        if !self.is_valid() {
            return None;
        }
        Some(self.0 as u64 * PAGE_SIZE as u64)
    }

    pub fn next(&self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl Default for PageId {
    fn default() -> Self {
        Self::INVALID
    }
}

impl From<i32> for PageId {
    fn from(id: i32) -> Self {
        Self(id)
    }
}

impl fmt::Display for PageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if *self == Self::INVALID {
            write!(f, "page <invalid>")
        } else {
            write!(f, "page {}", self.0)
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn sentinel_is_invalid() {
        assert!(!PageId::INVALID.is_valid());
        assert!(!PageId::new(-1).is_valid());
        assert_eq!(PageId::default(), PageId::INVALID);
    }

    #[test]
    fn non_negative_ids_are_valid_and_other_negatives_are_not() {
        assert!(PageId::new(0).is_valid());
        assert!(PageId::new(i32::MAX).is_valid());
        assert!(!PageId::new(-2).is_valid());
        assert!(!PageId::new(i32::MIN).is_valid());
    }

    #[test]
    fn serialize_is_little_endian_twos_complement() {
        assert_eq!(PageId::new(0).serialize(), [0, 0, 0, 0]);
        assert_eq!(PageId::new(1).serialize(), [1, 0, 0, 0]);
        assert_eq!(PageId::new(-1).serialize(), [255, 255, 255, 255]);
        assert_eq!(PageId::new(-2).serialize(), [254, 255, 255, 255]);
    }

    #[test]
    fn deserialize_known_vectors() {
        let cases: [(&[u8], i32); 4] = [
            (&[0, 0, 0, 0], 0),
            (&[1, 0, 0, 0], 1),
            (&[255, 255, 255, 255], -1),
            (&[254, 255, 255, 255], -2),
        ];
        for (bytes, expected) in cases {
            assert!(matches!(PageId::deserialize(bytes), Ok(id) if id.value() == expected));
        }
    }

    #[test]
    fn deserialize_rejects_wrong_length() {
        let res = PageId::deserialize(&[1, 0, 0]);
        assert!(matches!(
            res,
            Err(PageIdError::SizeMismatch {
                expected: 4,
                actual: 3
            })
        ));

        let res = PageId::deserialize(&[1, 0, 0, 0, 0]);
        assert!(matches!(res, Err(PageIdError::SizeMismatch { actual: 5, .. })));
    }

    #[test]
    fn offset_does_not_overflow_32_bits() {
        assert_eq!(PageId::new(0).offset(), Some(0));
        assert_eq!(PageId::new(3).offset(), Some(3 * 4096));
        assert_eq!(
            PageId::new(i32::MAX).offset(),
            Some(i32::MAX as u64 * 4096)
        );
        assert_eq!(PageId::INVALID.offset(), None);
    }

    #[test]
    fn display() {
        assert_eq!(PageId::new(7).to_string(), "page 7");
        assert_eq!(PageId::INVALID.to_string(), "page <invalid>");
    }
}
