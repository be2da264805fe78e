//! Zero-based page number checked against the document, convertible to
//! MuPDF's `i32` index and lopdf's one-based page number.

use crate::error::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PageIndex(i32);

impl PageIndex {
    pub fn checked(page: usize, total: usize) -> Result<Self, Error> {
        let invalid = || Error::PdfInvalidPage { page, total };
        if page >= total {
            return Err(invalid());
        }
        i32::try_from(page).map(Self).map_err(|_| invalid())
    }

    pub const fn lopdf_number(self) -> u32 {
        (self.0 + 1).cast_unsigned()
    }
}

impl From<PageIndex> for i32 {
    fn from(index: PageIndex) -> Self {
        index.0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_checked_range() {
        assert_eq!(i32::from(PageIndex::checked(3, 4).unwrap()), 3);
        assert!(matches!(
            PageIndex::checked(4, 4),
            Err(Error::PdfInvalidPage { page: 4, total: 4 })
        ));
    }

    #[test]
    fn test_lopdf_numbers_are_one_based() {
        assert_eq!(PageIndex::checked(0, 1).unwrap().lopdf_number(), 1);
        assert_eq!(PageIndex::checked(5, 9).unwrap().lopdf_number(), 6);
    }
}
