use crate::{PteMetaError, arena::MemoryRegion};

/// Byte produced by the pattern for offset `index`.
pub type PatternFn = fn(usize) -> u8;

/// Default pattern: the low byte of the offset.
pub fn low_byte(index: usize) -> u8 {
    (index & 0xff) as u8
}

/// Writes and re-checks a deterministic byte pattern over a region.
///
/// Metadata lives outside ordinary page contents, so the pattern must
/// survive every metadata operation unchanged.
#[derive(Debug, Clone, Copy)]
pub struct PatternOracle {
    pattern: PatternFn,
}

impl Default for PatternOracle {
    fn default() -> Self {
        Self::new(low_byte)
    }
}

impl PatternOracle {
    /// Creates an oracle for the given pattern.
    pub fn new(pattern: PatternFn) -> Self {
        Self { pattern }
    }

    /// Returns the expected byte at `index`.
    pub fn expected(&self, index: usize) -> u8 {
        (self.pattern)(index)
    }

    /// Writes the pattern into every byte of the region.
    pub fn stamp(&self, region: &mut MemoryRegion) {
        for (index, byte) in region.as_mut_slice().iter_mut().enumerate() {
            *byte = (self.pattern)(index);
        }
    }

    /// Re-reads every byte and reports the first mismatch.
    pub fn verify(&self, region: &MemoryRegion, stage: &str) -> Result<(), PteMetaError> {
        self.verify_bytes(region.as_slice(), stage)
    }

    /// Checks a plain byte slice against the pattern.
    pub fn verify_bytes(&self, bytes: &[u8], stage: &str) -> Result<(), PteMetaError> {
        let mismatch = bytes
            .iter()
            .enumerate()
            .find(|&(index, &byte)| byte != (self.pattern)(index));

        match mismatch {
            Some((offset, &observed)) => {
                let expected = (self.pattern)(offset);
                tracing::error!(stage, offset, expected, observed, "pattern mismatch");

                Err(PteMetaError::PatternMismatch {
                    stage: stage.to_owned(),
                    offset,
                    expected,
                    observed,
                })
            }
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn low_byte_wraps() {
        assert_eq!(low_byte(0), 0);
        assert_eq!(low_byte(255), 255);
        assert_eq!(low_byte(256), 0);
        assert_eq!(low_byte(0x1234), 0x34);
    }

    #[test]
    fn first_mismatch_is_reported() {
        let oracle = PatternOracle::default();
        let mut bytes = (0..1024).map(low_byte).collect::<Vec<_>>();
        assert!(oracle.verify_bytes(&bytes, "clean").is_ok());

        bytes[700] ^= 0xff;
        bytes[900] ^= 0xff;

        match oracle.verify_bytes(&bytes, "after set_pte_meta mdp=0") {
            Err(PteMetaError::PatternMismatch {
                stage,
                offset,
                expected,
                observed,
            }) => {
                assert_eq!(stage, "after set_pte_meta mdp=0");
                assert_eq!(offset, 700);
                assert_eq!(expected, low_byte(700));
                assert_eq!(observed, low_byte(700) ^ 0xff);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn custom_pattern() {
        let oracle = PatternOracle::new(|index| (index as u8).wrapping_mul(3));
        assert_eq!(oracle.expected(2), 6);
        assert!(oracle.verify_bytes(&[0, 3, 6, 9], "custom").is_ok());
        assert!(oracle.verify_bytes(&[0, 1, 2, 3], "custom").is_err());
    }
}
